//! Error types for transfer sessions.

use std::io;
use std::path::PathBuf;

/// Errors produced by either side of a transfer session.
///
/// Interrupted system calls never show up here; the primitives in
/// [`crate::io`] retry them.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("connect error: {0}")]
    Connect(#[source] io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(
        "offset mismatch: receiver holds {offset} bytes but local file has only {local_size}"
    )]
    OffsetMismatch { offset: u64, local_size: u64 },

    #[error("read error: {0}")]
    Read(#[source] io::Error),

    #[error("write error: {0}")]
    Write(#[source] io::Error),

    #[error("promote error: {} -> {}: {source}", from.display(), to.display())]
    Promote {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid transfer name: {0}")]
    InvalidName(String),

    #[error("transfer name already in use: {0}")]
    NameInUse(String),

    #[error("incomplete transfer: expected {expected} bytes, staged {staged}")]
    Incomplete { expected: u64, staged: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransferError {
    /// Short, stable name of the error kind, used in logs and exit messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "ConnectError",
            Self::Timeout => "TimeoutError",
            Self::Protocol(_) => "ProtocolError",
            Self::OffsetMismatch { .. } => "OffsetMismatchError",
            Self::Read(_) => "ReadError",
            Self::Write(_) => "WriteError",
            Self::Promote { .. } => "PromoteError",
            Self::InvalidName(_) => "InvalidNameError",
            Self::NameInUse(_) => "NameInUseError",
            Self::Incomplete { .. } => "IncompleteError",
            Self::Cancelled => "Cancelled",
            Self::Io(_) => "IoError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_distinct() {
        let errors = [
            TransferError::Connect(io::Error::other("x")),
            TransferError::Timeout,
            TransferError::Protocol("x".into()),
            TransferError::OffsetMismatch {
                offset: 2,
                local_size: 1,
            },
            TransferError::Read(io::Error::other("x")),
            TransferError::Write(io::Error::other("x")),
            TransferError::InvalidName("x".into()),
            TransferError::NameInUse("x".into()),
            TransferError::Incomplete {
                expected: 2,
                staged: 1,
            },
            TransferError::Cancelled,
        ];
        let mut kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn offset_mismatch_message_names_both_sizes() {
        let err = TransferError::OffsetMismatch {
            offset: 12,
            local_size: 11,
        };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("11"));
    }
}
