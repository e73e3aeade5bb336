//! Sweep handler: runs the startup partial-file sweep on demand.

use anyhow::Result;
use mediafetch_core::DownloadConfig;
use mediafetch_download::{SweepReport, sweep_partials};

use crate::error::CliError;

/// Text rendering of a sweep.
pub fn render(report: &SweepReport) -> String {
    if report.removed.is_empty() && report.promoted.is_empty() {
        return "Nothing staged.".to_string();
    }
    let mut lines = Vec::new();
    for path in &report.promoted {
        lines.push(format!("✓ kept {}", path.display()));
    }
    for path in &report.removed {
        lines.push(format!("✗ removed {}", path.display()));
    }
    lines.push(format!(
        "{} kept, {} removed",
        report.promoted.len(),
        report.removed.len()
    ));
    lines.join("\n")
}

/// Execute the sweep command.
pub fn execute(config: &DownloadConfig) -> Result<()> {
    let report = sweep_partials(config).map_err(CliError::from)?;
    println!("{}", render(&report));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_keeps_complete_and_removes_partial() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DownloadConfig::default().with_storage_root(dir.path());
        let staging = config.staging_dir();
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("1-done.mkv.100.part"), vec![0u8; 99]).unwrap();
        std::fs::write(staging.join("2-half.mkv.100.part"), vec![0u8; 50]).unwrap();

        let report = sweep_partials(&config).unwrap();
        let text = render(&report);

        assert!(dir.path().join("Other/done.mkv").exists());
        assert!(text.contains("kept"));
        assert!(text.ends_with("1 kept, 1 removed"));
    }

    #[test]
    fn test_empty_sweep() {
        assert_eq!(render(&SweepReport::default()), "Nothing staged.");
    }
}
