//! Wire protocol for resumable single-file transfers.
//!
//! A session runs over one TCP connection: the sender announces the file
//! with a [`TransferHeader`], the receiver answers with the number of bytes
//! it already holds, and the sender streams the remainder before shutting
//! down its write half.
//!
//! # Wire format
//!
//! See the [`wire`] module for the byte layout.

pub mod error;
pub mod io;
pub mod wire;

pub use error::TransferError;
pub use wire::TransferHeader;

use std::time::Duration;

/// Default TCP port the receiver listens on.
pub const DEFAULT_PORT: u16 = 9000;

/// Payload chunk size (64 KiB).
///
/// Not protocol-significant: the receiver accepts any chunking.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Maximum length of a transfer name in bytes.
pub const MAX_NAME_LEN: usize = 1024;

/// Width of the resume offset on the wire.
pub const OFFSET_LEN: usize = 8;

/// Timeout for establishing the TCP connection (sender).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for receiving the transfer header (receiver).
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum silence on the connection while streaming (receiver).
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// How long the sender waits for the receiver to close after the payload.
pub const CLOSE_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
