//! Fetch handler.
//!
//! Submits every source, renders progress until each tracked item reaches a
//! final event, and decides what to do with finished files: with `--play`,
//! Kodi plays the file when it is idle and only shows a notification when
//! something else is already playing.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use mediafetch_core::{
    ChosenCategory, DownloadConfig, DownloadEvent, DownloadRequest, ItemId, MediaProbe,
};
use mediafetch_download::SubmitOutcome;

use crate::bootstrap::{CliContext, bootstrap};
use crate::error::CliError;
use crate::kodi::KodiClient;
use crate::presentation::ProgressBoard;
use crate::sources::{CliSource, SourceInfo};

/// How often the loop checks whether the manager went idle without a
/// final event reaching the terminal (events are dropped when the channel
/// is full).
const IDLE_CHECK: Duration = Duration::from_secs(1);
/// How long the manager must stay idle before missing finals are given up
/// on. Longer than the player query that precedes `ReadyToPlay`.
const IDLE_GRACE: Duration = Duration::from_secs(10);

/// Fetch command arguments passed from the CLI.
#[derive(Debug, Clone)]
pub struct FetchArgs {
    /// URLs or local paths.
    pub sources: Vec<String>,
    /// Category for items the classifier leaves undetermined.
    pub category: Option<ChosenCategory>,
    /// Hand finished files to Kodi.
    pub play: bool,
}

/// Counters for one fetch run.
#[derive(Debug, Default)]
pub struct FetchSummary {
    /// Items still waiting for a final event.
    pending: HashSet<ItemId>,
    /// Sources handed to the command.
    pub total: usize,
    /// Files now in the library (fetched or already present).
    pub completed: usize,
    /// Sources that failed, were refused or were cancelled.
    pub failed: usize,
    /// Duplicates of items already in flight.
    pub skipped: usize,
}

impl FetchSummary {
    fn into_result(self) -> Result<Self, CliError> {
        if self.failed > 0 {
            return Err(CliError::Incomplete {
                failed: self.failed,
                total: self.total,
            });
        }
        Ok(self)
    }
}

/// Execute the fetch command.
pub async fn execute(config: DownloadConfig, args: FetchArgs) -> Result<FetchSummary> {
    let mut ctx = bootstrap(config, args.play).await?;
    execute_with(&mut ctx, &args, &mut ProgressBoard::new()).await
}

/// Run a fetch against an already bootstrapped context.
pub async fn execute_with(
    ctx: &mut CliContext,
    args: &FetchArgs,
    board: &mut ProgressBoard,
) -> Result<FetchSummary> {
    let mut summary = FetchSummary {
        total: args.sources.len(),
        ..FetchSummary::default()
    };

    for raw in &args.sources {
        let request = match prepare_request(&ctx.sources, raw).await {
            Ok(request) => request,
            Err(err) => {
                board.println(format!("✗ {raw}: {err}"));
                summary.failed += 1;
                continue;
            }
        };
        let label = request.filename.clone();

        match ctx.manager.submit(request).await {
            Ok(outcome) => {
                record_outcome(ctx, board, &mut summary, outcome, label, args.category).await;
            }
            Err(err) => {
                board.println(format!("✗ {label}: {}", err.user_message()));
                summary.failed += 1;
            }
        }
    }

    drive(ctx, board, &mut summary, args.play).await;
    ctx.manager.shutdown().await;

    board.println(format!(
        "Done: {} completed, {} failed, {} skipped",
        summary.completed, summary.failed, summary.skipped
    ));
    Ok(summary.into_result()?)
}

/// Describe a source and turn it into a request.
///
/// Local files must look like playable media; remote sources only get a
/// warning, since servers often send a generic content type.
async fn prepare_request(sources: &CliSource, raw: &str) -> Result<DownloadRequest, CliError> {
    let info = sources.describe(raw).await?;
    check_media(raw, &info)?;
    Ok(DownloadRequest::new(info.source, info.filename).with_declared_size(info.declared_size))
}

fn check_media(raw: &str, info: &SourceInfo) -> Result<(), CliError> {
    let mut probe = MediaProbe::for_filename(&info.filename);
    if let Some(mime) = &info.mime {
        probe = probe.with_mime(mime);
    }
    let check = probe.check();
    if check.is_media() {
        return Ok(());
    }
    if info.local {
        return Err(CliError::Arguments(format!("{raw} is not a playable media file")));
    }
    tracing::warn!(source = raw, mime = ?info.mime, "Source does not look like playable media");
    Ok(())
}

async fn record_outcome(
    ctx: &CliContext,
    board: &mut ProgressBoard,
    summary: &mut FetchSummary,
    outcome: SubmitOutcome,
    label: String,
    category: Option<ChosenCategory>,
) {
    match outcome {
        SubmitOutcome::Active(id) | SubmitOutcome::Queued { id, .. } => {
            board.track(id, label);
            summary.pending.insert(id);
        }
        SubmitOutcome::AwaitingCategory(id) => {
            board.track(id, label.clone());
            summary.pending.insert(id);
            match category {
                Some(choice) => {
                    if let Err(err) = ctx.manager.resolve_category(id, choice).await {
                        // A disk refusal also arrives as an event; count it once.
                        if summary.pending.remove(&id) {
                            summary.failed += 1;
                        }
                        board.println(format!("✗ {label}: {}", err.user_message()));
                    }
                }
                None => {
                    board.println(format!(
                        "✗ {label}: cannot tell whether this is a movie or a series; rerun with --category movie|series|other"
                    ));
                    if ctx.manager.cancel(id).await.is_err() && summary.pending.remove(&id) {
                        summary.failed += 1;
                    }
                }
            }
        }
        SubmitOutcome::AlreadyPresent { path } => {
            board.println(format!(
                "✓ {label} is already in the library at {}",
                path.display()
            ));
            summary.completed += 1;
        }
        SubmitOutcome::Duplicate { existing, state } => {
            board.println(format!(
                "• {label} is already being fetched (item {existing}, {state})"
            ));
            summary.skipped += 1;
        }
    }
}

/// Consume events until every tracked item has reached a final event.
///
/// Ctrl-C shuts the manager down; the resulting `Cancelled` events end the
/// loop normally.
async fn drive(
    ctx: &mut CliContext,
    board: &ProgressBoard,
    summary: &mut FetchSummary,
    play: bool,
) {
    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
    let mut interrupted = false;
    let mut idle_check = tokio::time::interval(IDLE_CHECK);
    let mut idle_since: Option<Instant> = None;

    while !summary.pending.is_empty() {
        tokio::select! {
            biased;
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                board.println("Interrupted, cancelling transfers...");
                ctx.manager.shutdown().await;
            }
            event = ctx.events.recv() => {
                let Some(event) = event else { break };
                idle_since = None;
                handle_event(ctx.kodi.as_deref(), board, summary, &event, play).await;
            }
            _ = idle_check.tick() => {
                if ctx.manager.status().await.is_idle() {
                    let since = *idle_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= IDLE_GRACE {
                        tracing::warn!(
                            missing = summary.pending.len(),
                            "No final status received for some items"
                        );
                        summary.failed += summary.pending.len();
                        summary.pending.clear();
                    }
                } else {
                    idle_since = None;
                }
            }
        }
    }
}

async fn handle_event(
    kodi: Option<&KodiClient>,
    board: &ProgressBoard,
    summary: &mut FetchSummary,
    event: &DownloadEvent,
    play: bool,
) {
    board.apply(event);

    let Some(id) = event.id() else {
        return;
    };
    if !event.is_final() || !summary.pending.remove(&id) {
        return;
    }

    match event {
        DownloadEvent::ReadyToPlay {
            path,
            already_playing,
            ..
        } => {
            summary.completed += 1;
            if let (true, Some(kodi)) = (play, kodi) {
                hand_to_player(kodi, board, path, *already_playing).await;
            }
        }
        _ => summary.failed += 1,
    }
}

async fn hand_to_player(
    kodi: &KodiClient,
    board: &ProgressBoard,
    path: &Path,
    already_playing: bool,
) {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let result = if already_playing {
        kodi.notify("Download complete", &name)
            .await
            .map(|()| format!("Saved {name}; Kodi is busy, sent a notification"))
    } else {
        kodi.play(path).await.map(|()| format!("▶ Playing {name} on Kodi"))
    };

    match result {
        Ok(line) => board.println(line),
        Err(err) => board.println(format!("⚠ {name} is saved but Kodi did not respond: {err}")),
    }
}
