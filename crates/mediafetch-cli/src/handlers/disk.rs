//! Disk handler: free space, thresholds and what eviction could reclaim.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use mediafetch_core::{DownloadConfig, humanize_size};
use mediafetch_download::{DiskGuard, SysinfoSpaceProbe};

use crate::error::CliError;
use crate::presentation::print_separator;

/// Where free space stands relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskLevel {
    /// Above the warning threshold.
    Ok,
    /// Below the warning threshold; downloads still start.
    Low,
    /// Below the hard floor; admissions will evict files or be refused.
    BelowFloor,
}

/// Snapshot of the storage root's disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskReport {
    /// Storage root.
    pub root: PathBuf,
    /// Free bytes on its filesystem.
    pub free_bytes: u64,
    /// Hard floor.
    pub min_free_bytes: u64,
    /// Soft-warning threshold.
    pub warning_bytes: u64,
    /// Files eviction could delete.
    pub evictable_files: usize,
    /// Their total size.
    pub evictable_bytes: u64,
}

impl DiskReport {
    /// Collect a report through a disk guard.
    pub fn collect(guard: &DiskGuard) -> Result<Self, CliError> {
        let candidates = guard.eviction_candidates();
        Ok(Self {
            root: guard.root().to_path_buf(),
            free_bytes: guard.free_bytes()?,
            min_free_bytes: guard.min_free_bytes(),
            warning_bytes: guard.warning_bytes(),
            evictable_files: candidates.len(),
            evictable_bytes: candidates.iter().map(|c| c.size).sum(),
        })
    }

    /// Level of the free space.
    pub const fn level(&self) -> DiskLevel {
        if self.free_bytes < self.min_free_bytes {
            DiskLevel::BelowFloor
        } else if self.free_bytes < self.warning_bytes {
            DiskLevel::Low
        } else {
            DiskLevel::Ok
        }
    }

    /// Text rendering.
    pub fn render(&self) -> String {
        let status = match self.level() {
            DiskLevel::Ok => "ok",
            DiskLevel::Low => "low (soft warning)",
            DiskLevel::BelowFloor => "below the minimum, new downloads will evict old files",
        };
        [
            format!("Storage root: {}", self.root.display()),
            format!("Free:         {}", humanize_size(self.free_bytes)),
            format!("Minimum free: {}", humanize_size(self.min_free_bytes)),
            format!("Warning at:   {}", humanize_size(self.warning_bytes)),
            format!("Status:       {status}"),
            format!(
                "Evictable:    {} file(s), {}",
                self.evictable_files,
                humanize_size(self.evictable_bytes)
            ),
        ]
        .join("\n")
    }
}

/// Execute the disk command.
pub fn execute(config: &DownloadConfig) -> Result<()> {
    let guard = DiskGuard::from_config(Arc::new(SysinfoSpaceProbe::new()), config);
    let report = DiskReport::collect(&guard)?;
    println!("{}", report.render());
    if report.level() != DiskLevel::Ok {
        print_separator();
        println!("Free some space or lower MIN_FREE_DISK_MB / DISK_WARNING_MB.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediafetch_core::{DownloadResult, SpaceProbe};
    use std::path::Path;

    struct Fixed(u64);

    impl SpaceProbe for Fixed {
        fn free_bytes(&self, _root: &Path) -> DownloadResult<u64> {
            Ok(self.0)
        }
    }

    fn report(free: u64) -> DiskReport {
        DiskReport {
            root: PathBuf::from("/media"),
            free_bytes: free,
            min_free_bytes: 200,
            warning_bytes: 500,
            evictable_files: 0,
            evictable_bytes: 0,
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(report(1000).level(), DiskLevel::Ok);
        assert_eq!(report(500).level(), DiskLevel::Ok);
        assert_eq!(report(499).level(), DiskLevel::Low);
        assert_eq!(report(199).level(), DiskLevel::BelowFloor);
    }

    #[test]
    fn test_collect_counts_evictable_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Movies/A (2020)")).unwrap();
        std::fs::write(dir.path().join("Movies/A (2020)/A (2020).mkv"), vec![0u8; 300]).unwrap();
        std::fs::write(dir.path().join("clip.mp4"), vec![0u8; 100]).unwrap();
        std::fs::create_dir_all(dir.path().join(".partial")).unwrap();
        std::fs::write(dir.path().join(".partial/1-x.mkv.10.part"), vec![0u8; 5]).unwrap();

        let config = DownloadConfig::default().with_storage_root(dir.path());
        let guard = DiskGuard::from_config(Arc::new(Fixed(4096)), &config);
        let report = DiskReport::collect(&guard).unwrap();

        assert_eq!(report.free_bytes, 4096);
        assert_eq!(report.evictable_files, 2);
        assert_eq!(report.evictable_bytes, 400);
        assert_eq!(report.level(), DiskLevel::BelowFloor);
        assert!(report.render().contains("below the minimum"));
    }
}
