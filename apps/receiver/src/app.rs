//! Wires the configuration to the accept loop and waits for shutdown.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use resend_transfer::ReceiveServer;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the receiver until SIGINT.
pub async fn run(config: Config) -> anyhow::Result<()> {
    serve(config, async {
        tokio::signal::ctrl_c().await?;
        tracing::info!("SIGINT received, shutting down");
        Ok::<(), std::io::Error>(())
    })
    .await
}

/// Runs the accept loop until `shutdown` resolves or the loop itself ends.
async fn serve<F>(config: Config, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let root = prepare_root(&config.destination).await?;
    tracing::info!(root = %root.display(), "destination ready");

    let cancel = CancellationToken::new();
    let server = ReceiveServer::new(config.receiver_config(root), cancel.clone());
    let listener = ReceiveServer::bind(SocketAddr::new(config.bind, config.port)).await?;

    let mut server_task = tokio::spawn(async move { server.run(listener).await });

    tokio::select! {
        result = shutdown => result?,
        result = &mut server_task => {
            tracing::warn!("accept loop exited unexpectedly");
            result??;
            return Ok(());
        }
    }

    cancel.cancel();
    server_task.await??;
    Ok(())
}

/// Creates the destination root if needed and returns its canonical form.
async fn prepare_root(destination: &Path) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(destination).await?;
    Ok(tokio::fs::canonicalize(destination).await?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn prepare_root_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("Downloads/incoming");

        let root = prepare_root(&dest).await.unwrap();
        assert!(root.is_dir());
        assert!(root.is_absolute());
        assert!(root.ends_with("Downloads/incoming"));
    }

    #[tokio::test]
    async fn serve_stops_when_shutdown_resolves() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            bind: "127.0.0.1".parse().unwrap(),
            port: 0,
            destination: tmp.path().join("inbox"),
            ..Config::default()
        };

        let shutdown = async { Ok::<(), std::io::Error>(()) };
        tokio::time::timeout(Duration::from_secs(5), serve(config, shutdown))
            .await
            .unwrap()
            .unwrap();
        assert!(tmp.path().join("inbox").is_dir());
    }

    #[tokio::test]
    async fn serve_propagates_shutdown_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            bind: "127.0.0.1".parse().unwrap(),
            port: 0,
            destination: tmp.path().to_path_buf(),
            ..Config::default()
        };

        let err = serve(config, async {
            Err::<(), _>(std::io::Error::other("no signal handler"))
        })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no signal handler"));
    }
}
