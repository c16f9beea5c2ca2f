/// Snapshot handed to the sender's progress callback after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendProgress {
    /// Byte offset the receiver already held when the session started.
    pub resumed_from: u64,
    /// Bytes of the local file now held by the receiver (including the resumed prefix).
    pub position: u64,
    /// Total size of the local file.
    pub total: u64,
}

/// Callback invoked with send progress. Purely informational.
pub type ProgressCallback = Box<dyn Fn(SendProgress) + Send + Sync>;
