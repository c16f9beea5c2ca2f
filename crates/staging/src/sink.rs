use std::path::Path;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use resend_protocol::TransferError;
use resend_protocol::io::write_full;

use crate::name::StagingPaths;

/// Append-only staging file for one transfer.
///
/// Bytes handed to [`append`](Self::append) are written in order; after
/// [`finalize`](Self::finalize) returns they are on stable storage.
#[derive(Debug)]
pub struct StagingFile {
    file: File,
    paths: StagingPaths,
    len: u64,
    seeded_from_final: bool,
}

impl StagingFile {
    /// Opens (or creates) the staging file without truncating it.
    ///
    /// When no staging file exists but a final file does and
    /// `resume_completed` is set, the final file is copied to the staging
    /// path first so the transfer continues from its length. The final file
    /// itself is left untouched until the next promotion replaces it.
    pub async fn open(paths: StagingPaths, resume_completed: bool) -> Result<Self, TransferError> {
        let mut seeded_from_final = false;
        if resume_completed && !is_file(&paths.staging).await && is_file(&paths.final_path).await {
            seed_from_final(&paths).await?;
            seeded_from_final = true;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&paths.staging)
            .await?;
        let len = file.metadata().await?.len();

        debug!(
            path = %paths.staging.display(),
            len,
            seeded_from_final,
            "staging file opened"
        );

        Ok(Self {
            file,
            paths,
            len,
            seeded_from_final,
        })
    }

    /// Number of bytes staged so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether [`open`](Self::open) started from a copy of the final file.
    pub fn seeded_from_final(&self) -> bool {
        self.seeded_from_final
    }

    /// Appends `buf` at the end of the staging file.
    pub async fn append(&mut self, buf: &[u8]) -> Result<(), TransferError> {
        write_full(&mut self.file, buf)
            .await
            .map_err(TransferError::Write)?;
        self.len += buf.len() as u64;
        Ok(())
    }

    /// Flushes and forces every appended byte to stable storage.
    pub async fn finalize(&mut self) -> Result<(), TransferError> {
        self.file.flush().await.map_err(TransferError::Write)?;
        self.file.sync_all().await.map_err(TransferError::Write)?;
        Ok(())
    }

    /// Finalizes and renames the staging file over the final path.
    ///
    /// An existing final file is replaced atomically. On failure the
    /// staging file stays where it is, complete and durable, so a later
    /// session can promote it without receiving any payload.
    pub async fn promote(mut self) -> Result<StagingPaths, TransferError> {
        self.finalize().await?;
        let Self { file, paths, .. } = self;
        drop(file);
        promote(&paths.staging, &paths.final_path).await?;
        Ok(paths)
    }
}

/// Atomically renames `staging` to `final_path` (same filesystem).
///
/// Never deletes `staging` on failure.
pub async fn promote(staging: &Path, final_path: &Path) -> Result<(), TransferError> {
    tokio::fs::rename(staging, final_path)
        .await
        .map_err(|source| TransferError::Promote {
            from: staging.to_path_buf(),
            to: final_path.to_path_buf(),
            source,
        })?;

    if let Some(dir) = final_path.parent() {
        if let Err(e) = sync_dir(dir).await {
            warn!(dir = %dir.display(), "failed to sync directory after rename: {e}");
        }
    }
    Ok(())
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Copies the final file to the staging path and makes the copy durable.
///
/// A crash mid-copy leaves a prefix of the final file, which is still a
/// valid resume point.
async fn seed_from_final(paths: &StagingPaths) -> Result<(), TransferError> {
    let copied = tokio::fs::copy(&paths.final_path, &paths.staging).await?;
    let staged = OpenOptions::new().write(true).open(&paths.staging).await?;
    staged.sync_all().await.map_err(TransferError::Write)?;
    debug!(
        from = %paths.final_path.display(),
        bytes = copied,
        "staging file seeded from final file"
    );
    Ok(())
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
