//! Resume offset handshake.
//!
//! Runs once per session, after the header and before any payload byte.

use tokio::io::{AsyncRead, AsyncWrite};

use resend_protocol::TransferError;
use resend_protocol::wire::{read_offset, write_offset};
use resend_staging::{StagingFile, StagingPaths};

/// Receiver side: opens the staging file and announces its length.
///
/// The announced offset is the length observed right after opening, so it
/// never exceeds what is actually staged.
pub async fn offer_offset<W: AsyncWrite + Unpin>(
    writer: &mut W,
    paths: StagingPaths,
    resume_completed: bool,
) -> Result<StagingFile, TransferError> {
    let sink = StagingFile::open(paths, resume_completed).await?;
    write_offset(writer, sink.len()).await?;
    Ok(sink)
}

/// Sender side: reads the offset the receiver announced.
pub async fn accept_offset<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u64, TransferError> {
    read_offset(reader).await
}
