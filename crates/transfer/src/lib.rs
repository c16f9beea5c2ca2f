//! Resumable single-file transfer sessions.
//!
//! The receiver stages incoming bytes under `<name>.part`, tells the sender
//! how much it already holds, and renames the staging file into place once
//! the sender has delivered the rest.

mod negotiate;
mod progress;
mod receiver;
mod sender;
mod server;

pub use negotiate::{accept_offset, offer_offset};
pub use progress::{ProgressCallback, SendProgress};
pub use receiver::{ReceiveReport, ReceiverConfig, ReceiverSession, ReceiverState};
pub use sender::{SendReport, SenderSession, SenderState, connect};
pub use server::ReceiveServer;

pub use resend_protocol::TransferError;
