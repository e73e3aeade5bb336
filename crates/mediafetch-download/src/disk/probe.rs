//! `sysinfo`-backed free-space probe.

use std::path::{Path, PathBuf};

use sysinfo::Disks;

use mediafetch_core::{DownloadError, DownloadResult, SpaceProbe};

/// Reads free space from the mounted disk holding the storage root.
///
/// The disk list is refreshed on every call so evictions are observed
/// immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoSpaceProbe;

impl SysinfoSpaceProbe {
    /// Create a new probe.
    pub const fn new() -> Self {
        Self
    }
}

impl SpaceProbe for SysinfoSpaceProbe {
    fn free_bytes(&self, root: &Path) -> DownloadResult<u64> {
        let target = existing_ancestor(root);
        let disks = Disks::new_with_refreshed_list();

        disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(sysinfo::Disk::available_space)
            .ok_or_else(|| {
                DownloadError::io(
                    "NotFound",
                    format!("no mounted disk holds {}", target.display()),
                )
            })
    }
}

/// Canonical form of the closest existing ancestor of `path`.
///
/// The storage root may not exist yet on first start.
fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find_map(|candidate| candidate.canonicalize().ok())
        .unwrap_or_else(|| path.to_path_buf())
}
