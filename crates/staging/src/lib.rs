//! On-disk state of a transfer.
//!
//! A transfer named `n` is staged at `<root>/n.part` and promoted to
//! `<root>/n` by an atomic rename once every byte has arrived. The staging
//! file is append-only, so its length is always the resume point.

mod lock;
mod name;
mod sink;

pub use lock::{NameGuard, NameLocks};
pub use name::{STAGING_SUFFIX, StagingPaths, TransferName};
pub use sink::{StagingFile, promote};
