//! Staged in-flight files and the startup sweep.
//!
//! Transfers write into `<root>/.partial/<id>-<filename>.<declared>.part`
//! (or `.unsized.part` when the source gave no size). Nothing survives a
//! restart as a resumable transfer: at startup every staged file is either
//! judged complete and moved to where a normal completion would have put
//! it, or deleted.

use std::path::{Path, PathBuf};

use mediafetch_core::classify::flat_path;
use mediafetch_core::{DownloadConfig, DownloadResult, ItemId, classify};

use crate::placement::{place, remove_if_exists};

const PART_SUFFIX: &str = ".part";
const UNSIZED: &str = "unsized";

/// What the startup sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Staged files deleted as incomplete.
    pub removed: Vec<PathBuf>,
    /// Files judged complete and moved out of staging.
    pub promoted: Vec<PathBuf>,
}

/// Staging path for an item.
pub fn staged_path(staging: &Path, id: ItemId, filename: &str, declared: Option<u64>) -> PathBuf {
    let size_tag = declared.map_or_else(|| UNSIZED.to_string(), |size| size.to_string());
    let name = flat_path(filename);
    staging.join(format!("{id}-{}.{size_tag}{PART_SUFFIX}", name.display()))
}

#[derive(Debug, PartialEq, Eq)]
struct StagedName {
    filename: String,
    declared: Option<u64>,
}

fn parse_staged(name: &str) -> Option<StagedName> {
    let stem = name.strip_suffix(PART_SUFFIX)?;
    let (rest, size_tag) = stem.rsplit_once('.')?;
    let declared = if size_tag == UNSIZED {
        None
    } else {
        Some(size_tag.parse().ok()?)
    };
    let (id, filename) = rest.split_once('-')?;
    if filename.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(StagedName {
        filename: filename.to_string(),
        declared,
    })
}

/// Library path for a recovered file: the organized layout when it is on
/// and the name classifies, `<root>/<filename>` otherwise.
fn recovered_destination(config: &DownloadConfig, filename: &str) -> PathBuf {
    let root = &config.storage_root;
    if config.organize {
        if let Some(destination) = classify(filename).destination(root) {
            return destination;
        }
    }
    root.join(flat_path(filename))
}

/// Sweep the staging directory of a previous run.
///
/// Files below `completeness_ratio` of their declared size, unsized files
/// and unrecognized names are deleted. The rest move into the library
/// (organized layout when enabled) unless a file is already at that path.
pub fn sweep_partials(config: &DownloadConfig) -> DownloadResult<SweepReport> {
    let staging = config.staging_dir();
    let mut report = SweepReport::default();

    let entries = match std::fs::read_dir(&staging) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e.into()),
    };

    let mut staged: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.path())
        .collect();
    staged.sort();

    for path in staged {
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let parsed = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_staged);

        let keep = parsed.as_ref().and_then(|staged_name| {
            let declared = staged_name.declared?;
            config
                .meets_completeness(size, declared)
                .then(|| recovered_destination(config, &staged_name.filename))
        });

        match keep {
            Some(destination) if !destination.exists() => {
                place(&path, &destination)?;
                tracing::info!(
                    target: "mediafetch.download",
                    path = %destination.display(),
                    size,
                    "Recovered complete file from staging"
                );
                report.promoted.push(destination);
            }
            _ => {
                remove_if_exists(&path)?;
                tracing::info!(
                    target: "mediafetch.download",
                    path = %path.display(),
                    size,
                    "Removed incomplete staged file"
                );
                report.removed.push(path);
            }
        }
    }

    Ok(report)
}
