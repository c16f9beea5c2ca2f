//! Sender side of a transfer session.
//!
//! `Connect -> SendName -> Negotiating -> Streaming -> Done`

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use resend_protocol::io::{read_some, write_full};
use resend_protocol::wire::write_header;
use resend_protocol::{CHUNK_SIZE, CLOSE_WAIT_TIMEOUT, TransferError, TransferHeader};

use crate::negotiate::accept_offset;
use crate::progress::{ProgressCallback, SendProgress};

/// Connects to a receiver, bounded by `timeout`.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TransferError> {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            info!(host, port, "connected to receiver");
            Ok(stream)
        }
        Ok(Err(e)) => Err(TransferError::Connect(e)),
        Err(_) => Err(TransferError::Timeout),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Connect,
    SendName,
    Negotiating,
    Streaming,
    Done,
}

/// Outcome of a completed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub name: String,
    /// Size of the local file.
    pub size: u64,
    /// Offset the receiver announced.
    pub resumed_from: u64,
    /// Payload bytes sent during this session.
    pub sent: u64,
}

/// Sends one local file under a transfer name.
pub struct SenderSession {
    name: String,
    local_path: PathBuf,
    progress: Option<ProgressCallback>,
    close_timeout: Duration,
    state: SenderState,
}

impl SenderSession {
    pub fn new(name: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            progress: None,
            close_timeout: CLOSE_WAIT_TIMEOUT,
            state: SenderState::Connect,
        }
    }

    /// Registers a callback invoked after every chunk is sent.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// How long to wait for the receiver to hang up after the payload.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    fn transition(&mut self, next: SenderState) {
        debug!(from = ?self.state, to = ?next, "sender state");
        self.state = next;
    }

    /// Runs the session over an established connection.
    ///
    /// No payload byte is sent unless the receiver's offset fits inside the
    /// local file.
    pub async fn run<S>(&mut self, stream: &mut S) -> Result<SendReport, TransferError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut file = File::open(&self.local_path).await?;
        let size = file.metadata().await?.len();

        self.transition(SenderState::SendName);
        let header = TransferHeader {
            name: self.name.clone(),
            size,
        };
        write_header(stream, &header).await?;

        self.transition(SenderState::Negotiating);
        let offset = accept_offset(stream).await?;
        if offset > size {
            return Err(TransferError::OffsetMismatch {
                offset,
                local_size: size,
            });
        }
        info!(name = %self.name, offset, size, "receiver ready");

        self.transition(SenderState::Streaming);
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(TransferError::Read)?;

        let mut position = offset;
        let mut buf = vec![0u8; CHUNK_SIZE];
        while position < size {
            let to_read = ((size - position) as usize).min(buf.len());
            let n = read_some(&mut file, &mut buf[..to_read])
                .await
                .map_err(TransferError::Read)?;
            if n == 0 {
                return Err(TransferError::Read(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "local file shrank during transfer",
                )));
            }

            write_full(stream, &buf[..n])
                .await
                .map_err(TransferError::Write)?;
            position += n as u64;

            if let Some(callback) = &self.progress {
                callback(SendProgress {
                    resumed_from: offset,
                    position,
                    total: size,
                });
            }
        }

        stream.flush().await.map_err(TransferError::Write)?;
        stream.shutdown().await.map_err(TransferError::Write)?;
        self.wait_for_close(stream).await?;

        self.transition(SenderState::Done);
        info!(name = %self.name, sent = position - offset, "file sent");

        Ok(SendReport {
            name: self.name.clone(),
            size,
            resumed_from: offset,
            sent: position - offset,
        })
    }

    /// Waits for the receiver to close its side, its only acknowledgement.
    async fn wait_for_close<S: AsyncRead + Unpin>(
        &self,
        stream: &mut S,
    ) -> Result<(), TransferError> {
        let mut byte = [0u8; 1];
        match tokio::time::timeout(self.close_timeout, read_some(stream, &mut byte)).await {
            Ok(Ok(0)) => Ok(()),
            Ok(Ok(_)) => Err(TransferError::Protocol(
                "unexpected data from receiver after offset".into(),
            )),
            Ok(Err(e)) => Err(TransferError::Read(e)),
            Err(_) => {
                warn!(name = %self.name, "receiver did not close the connection");
                Err(TransferError::Timeout)
            }
        }
    }
}
