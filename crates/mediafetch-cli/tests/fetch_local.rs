//! End-to-end fetch of local files through the real engine.

use std::path::Path;
use std::sync::Arc;

use mediafetch_cli::handlers::fetch::{FetchArgs, execute_with};
use mediafetch_cli::presentation::ProgressBoard;
use mediafetch_cli::sources::CliSource;
use mediafetch_cli::{CliContext, CliError};
use mediafetch_core::{
    ChannelEmitter, ChosenCategory, DownloadConfig, DownloadResult, NoopPlayer, SpaceProbe,
};
use mediafetch_download::{DownloadManagerDeps, build_download_manager};
use tempfile::TempDir;

struct PlentyOfSpace;

impl SpaceProbe for PlentyOfSpace {
    fn free_bytes(&self, _root: &Path) -> DownloadResult<u64> {
        Ok(u64::MAX / 2)
    }
}

fn context(root: &Path) -> CliContext {
    let config = DownloadConfig::default()
        .with_storage_root(root)
        .with_disk_thresholds(0, 0);
    let sources = Arc::new(CliSource::new().unwrap());
    let (emitter, events) = ChannelEmitter::new(256);
    let manager = build_download_manager(DownloadManagerDeps {
        source: sources.clone(),
        event_emitter: Arc::new(emitter),
        player: Arc::new(NoopPlayer),
        space_probe: Arc::new(PlentyOfSpace),
        config: config.clone(),
    });
    CliContext {
        config,
        manager,
        events,
        sources,
        kodi: None,
    }
}

fn args(sources: Vec<String>, category: Option<ChosenCategory>) -> FetchArgs {
    FetchArgs {
        sources,
        category,
        play: false,
    }
}

#[tokio::test]
async fn fetches_movie_into_library_layout() {
    let incoming = TempDir::new().unwrap();
    let library = TempDir::new().unwrap();
    let source = incoming.path().join("Movie.Title.2022.1080p.mkv");
    std::fs::write(&source, vec![7u8; 200_000]).unwrap();

    let mut ctx = context(library.path());
    let summary = execute_with(
        &mut ctx,
        &args(vec![source.display().to_string()], None),
        &mut ProgressBoard::hidden(),
    )
    .await
    .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    let placed = library
        .path()
        .join("Movies/Movie Title (2022)/Movie Title (2022).mkv");
    assert_eq!(std::fs::metadata(&placed).unwrap().len(), 200_000);
    assert!(source.exists());
}

#[tokio::test]
async fn undetermined_file_uses_the_given_category() {
    let incoming = TempDir::new().unwrap();
    let library = TempDir::new().unwrap();
    let source = incoming.path().join("2012.mkv");
    std::fs::write(&source, b"not really video").unwrap();

    let mut ctx = context(library.path());
    let summary = execute_with(
        &mut ctx,
        &args(
            vec![source.display().to_string()],
            Some(ChosenCategory::Movie),
        ),
        &mut ProgressBoard::hidden(),
    )
    .await
    .unwrap();

    assert_eq!(summary.completed, 1);
    assert!(library.path().join("Movies/2012/2012.mkv").exists());
}

#[tokio::test]
async fn missing_and_non_media_sources_fail_the_run() {
    let incoming = TempDir::new().unwrap();
    let library = TempDir::new().unwrap();
    let notes = incoming.path().join("notes.txt");
    std::fs::write(&notes, b"hello").unwrap();
    let missing = incoming.path().join("gone.mkv");

    let mut ctx = context(library.path());
    let err = execute_with(
        &mut ctx,
        &args(
            vec![notes.display().to_string(), missing.display().to_string()],
            None,
        ),
        &mut ProgressBoard::hidden(),
    )
    .await
    .unwrap_err();

    let cli_err = err.downcast_ref::<CliError>().unwrap();
    assert!(matches!(cli_err, CliError::Incomplete { failed: 2, total: 2 }));
    assert_eq!(cli_err.exit_code(), 1);
}
