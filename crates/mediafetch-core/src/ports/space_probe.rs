//! Free-space probe port.

use std::path::Path;

use crate::download::DownloadResult;

/// Reports free space for the filesystem holding a path.
///
/// The disk guard calls this after every eviction, so implementations
/// should re-query rather than cache.
pub trait SpaceProbe: Send + Sync {
    /// Free bytes available on the filesystem containing `root`.
    fn free_bytes(&self, root: &Path) -> DownloadResult<u64>;
}
