//! Receiver side of a transfer session.
//!
//! `AwaitName -> Negotiating -> Streaming -> Finalizing -> {Promoted, Failed}`

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use resend_protocol::io::read_some;
use resend_protocol::wire::read_header;
use resend_protocol::{CHUNK_SIZE, HANDSHAKE_TIMEOUT, IDLE_TIMEOUT, TransferError};
use resend_staging::{NameLocks, StagingFile, StagingPaths, TransferName};

use crate::negotiate::offer_offset;

/// Settings shared by every receiver session.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Destination root; staging and final files live under it.
    pub root: PathBuf,
    /// Limit for receiving the transfer header.
    pub handshake_timeout: Duration,
    /// Limit for silence on the connection while streaming.
    pub idle_timeout: Duration,
    /// Continue from an already promoted file when no staging file exists.
    pub resume_completed: bool,
}

impl ReceiverConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
            resume_completed: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    AwaitName,
    Negotiating,
    Streaming,
    Finalizing,
    Promoted,
    Failed,
}

/// Outcome of a promoted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveReport {
    pub name: String,
    pub final_path: PathBuf,
    /// Offset announced to the sender.
    pub resumed_from: u64,
    /// Payload bytes received during this session.
    pub received: u64,
    /// Final size of the promoted file.
    pub size: u64,
}

/// One receiver session; handles exactly one connection.
pub struct ReceiverSession {
    config: Arc<ReceiverConfig>,
    locks: NameLocks,
    cancel: CancellationToken,
    state: ReceiverState,
}

impl ReceiverSession {
    pub fn new(config: Arc<ReceiverConfig>, locks: NameLocks, cancel: CancellationToken) -> Self {
        Self {
            config,
            locks,
            cancel,
            state: ReceiverState::AwaitName,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    fn transition(&mut self, next: ReceiverState) {
        debug!(from = ?self.state, to = ?next, "receiver state");
        self.state = next;
    }

    /// Runs the session to completion over `stream`.
    ///
    /// On any failure after the staging file was opened, its bytes are
    /// synced to disk and left in place as the resume point.
    pub async fn run<S>(&mut self, stream: &mut S) -> Result<ReceiveReport, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.drive(stream).await;
        if result.is_err() {
            self.transition(ReceiverState::Failed);
        }
        result
    }

    async fn drive<S>(&mut self, stream: &mut S) -> Result<ReceiveReport, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let header = self
            .guarded(self.config.handshake_timeout, read_header(stream))
            .await?;
        let name = TransferName::parse(&header.name)?;
        let paths = StagingPaths::prepare(&self.config.root, &name).await?;
        let _guard = self
            .locks
            .try_acquire(&paths.final_path)
            .ok_or_else(|| TransferError::NameInUse(name.to_string()))?;

        self.transition(ReceiverState::Negotiating);
        // Only a strictly shorter promoted file can be a prefix of the announced one.
        let seed = self.config.resume_completed && shorter_than(&paths.final_path, header.size).await;
        let mut sink = offer_offset(stream, paths, seed).await?;
        let resumed_from = sink.len();
        info!(
            name = %name,
            offset = resumed_from,
            size = header.size,
            seeded = sink.seeded_from_final(),
            "receiving file"
        );

        self.transition(ReceiverState::Streaming);
        if let Err(e) = self.stream_payload(stream, &mut sink, header.size).await {
            if let Err(sync_err) = sink.finalize().await {
                warn!(name = %name, "failed to sync staging file: {sync_err}");
            }
            return Err(e);
        }

        self.transition(ReceiverState::Finalizing);
        sink.finalize().await?;
        let staged = sink.len();
        if staged < header.size {
            return Err(TransferError::Incomplete {
                expected: header.size,
                staged,
            });
        }
        if staged > header.size {
            return Err(TransferError::OffsetMismatch {
                offset: staged,
                local_size: header.size,
            });
        }

        let paths = sink.promote().await?;
        self.transition(ReceiverState::Promoted);
        info!(name = %name, path = %paths.final_path.display(), size = staged, "file saved");

        Ok(ReceiveReport {
            name: name.to_string(),
            final_path: paths.final_path,
            resumed_from,
            received: staged - resumed_from,
            size: staged,
        })
    }

    /// Appends payload chunks until the sender shuts down its write half.
    async fn stream_payload<S>(
        &self,
        stream: &mut S,
        sink: &mut StagingFile,
        declared: u64,
    ) -> Result<(), TransferError>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = self
                .guarded(self.config.idle_timeout, async {
                    read_some(stream, &mut buf)
                        .await
                        .map_err(TransferError::Read)
                })
                .await?;
            if n == 0 {
                debug!(staged = sink.len(), "end of payload");
                return Ok(());
            }
            if sink.len() + n as u64 > declared {
                return Err(TransferError::Protocol(format!(
                    "sender exceeded its declared size of {declared} bytes"
                )));
            }
            sink.append(&buf[..n]).await?;
        }
    }

    /// Bounds `fut` by `limit` and aborts it when the server shuts down.
    async fn guarded<T, F>(&self, limit: Duration, fut: F) -> Result<T, TransferError>
    where
        F: Future<Output = Result<T, TransferError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            result = tokio::time::timeout(limit, fut) => {
                result.unwrap_or(Err(TransferError::Timeout))
            }
        }
    }
}

async fn shorter_than(path: &Path, size: u64) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len() < size)
        .unwrap_or(false)
}
