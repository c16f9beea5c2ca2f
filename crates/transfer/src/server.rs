//! Connection acceptor (receiver side).
//!
//! Accepts connections serially and runs one [`ReceiverSession`] per
//! connection in its own task. A failing or panicking session only ends
//! its own task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use resend_protocol::TransferError;
use resend_staging::NameLocks;

use crate::receiver::{ReceiverConfig, ReceiverSession};

/// Accept loop for receiver sessions.
pub struct ReceiveServer {
    config: Arc<ReceiverConfig>,
    locks: NameLocks,
    cancel: CancellationToken,
    sessions: TaskTracker,
}

impl ReceiveServer {
    pub fn new(config: ReceiverConfig, cancel: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            locks: NameLocks::new(),
            cancel,
            sessions: TaskTracker::new(),
        }
    }

    /// Binds the listening socket.
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener, TransferError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "receiver listening");
        Ok(listener)
    }

    /// Accepts connections until cancelled, then waits for in-flight
    /// sessions to wind down.
    pub async fn run(&self, listener: TcpListener) -> Result<(), TransferError> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("receiver shutting down");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.spawn_session(stream, peer),
                        Err(e) => error!("accept error: {e}"),
                    }
                }
            }
        }

        drop(listener);
        self.sessions.close();
        self.sessions.wait().await;
        Ok(())
    }

    fn spawn_session(&self, mut stream: TcpStream, peer: SocketAddr) {
        let config = Arc::clone(&self.config);
        let locks = self.locks.clone();
        let cancel = self.cancel.clone();
        let span = info_span!("session", id = %Uuid::new_v4(), %peer);

        self.sessions.spawn(
            async move {
                info!("connection accepted");
                let mut session = ReceiverSession::new(config, locks, cancel);
                match session.run(&mut stream).await {
                    Ok(report) => info!(
                        name = %report.name,
                        resumed_from = report.resumed_from,
                        received = report.received,
                        "transfer complete"
                    ),
                    Err(e) => error!(kind = e.kind(), state = ?session.state(), "transfer failed: {e}"),
                }
            }
            .instrument(span),
        );
    }
}
