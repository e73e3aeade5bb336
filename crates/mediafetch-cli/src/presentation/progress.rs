//! Terminal progress bars driven by download events.

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use mediafetch_core::{DownloadEvent, ItemId, SoftWarning, humanize_size};

const TICK: Duration = Duration::from_millis(250);

fn bytes_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▓░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {bytes} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// One bar per tracked item, updated from the event stream.
///
/// Items start as spinners and switch to a byte bar once their size is
/// known. Soft warnings are printed above the bars; other events for
/// untracked items are ignored.
pub struct ProgressBoard {
    multi: MultiProgress,
    bars: HashMap<ItemId, ProgressBar>,
    labels: HashMap<ItemId, String>,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBoard {
    /// Board drawing to stderr.
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Board that draws nothing.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    /// Start showing an item under `label`.
    pub fn track(&mut self, id: ItemId, label: impl Into<String>) {
        let label = label.into();
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style());
        bar.set_message(label.clone());
        bar.enable_steady_tick(TICK);
        self.bars.insert(id, bar);
        self.labels.insert(id, label);
    }

    /// Print a line above the bars.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.multi.println(line.as_ref()).is_err() {
            eprintln!("{}", line.as_ref());
        }
    }

    /// Bar of a tracked item.
    pub fn bar(&self, id: ItemId) -> Option<&ProgressBar> {
        self.bars.get(&id)
    }

    fn label(&self, id: ItemId) -> String {
        self.labels
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("item {id}"))
    }

    /// Update the board for one event.
    pub fn apply(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::SoftWarning { id, warning } => self.warn(*id, warning),
            DownloadEvent::DiskRefused {
                id,
                shortfall_bytes,
                ..
            } => self.abandon(
                *id,
                format!(
                    "✗ {}: not enough disk space, short by {}",
                    self.label(*id),
                    humanize_size(*shortfall_bytes)
                ),
            ),
            DownloadEvent::Failed {
                id,
                reason,
                attempts,
                ..
            } => self.abandon(
                *id,
                format!("✗ {}: {reason} (after {attempts} attempt(s))", self.label(*id)),
            ),
            DownloadEvent::Cancelled { id } => {
                self.abandon(*id, format!("✗ {} cancelled", self.label(*id)));
            }
            DownloadEvent::Completed { id, path, bytes, .. } => {
                if let Some(bar) = self.bars.get(id) {
                    bar.set_position(*bytes);
                    bar.finish_with_message(format!("✓ {}", path.display()));
                }
            }
            other => self.update(other),
        }
    }

    fn update(&self, event: &DownloadEvent) {
        let Some(id) = event.id() else {
            return;
        };
        let Some(bar) = self.bars.get(&id) else {
            return;
        };
        let label = self.label(id);

        match event {
            DownloadEvent::Queued { position, .. } => {
                bar.set_message(format!("{label} (queued #{position})"));
            }
            DownloadEvent::AwaitingCategory { .. } => {
                bar.set_message(format!("{label} (needs a category)"));
            }
            DownloadEvent::Started { attempt, .. } => {
                bar.set_position(0);
                if *attempt > 1 {
                    bar.set_message(format!("{label} (attempt {attempt})"));
                } else {
                    bar.set_message(label);
                }
            }
            DownloadEvent::Progress {
                bytes_transferred,
                declared_size,
                ..
            } => {
                if let Some(total) = *declared_size {
                    if bar.length() != Some(total) {
                        bar.set_length(total);
                        bar.set_style(bytes_style());
                    }
                }
                bar.set_position(*bytes_transferred);
            }
            DownloadEvent::Paused {
                bytes_transferred, ..
            } => {
                bar.set_position(*bytes_transferred);
                bar.set_message(format!("{label} (paused)"));
            }
            DownloadEvent::Resumed { .. } => bar.set_message(label),
            _ => {}
        }
    }

    /// Submission errors are reported by the caller, so untracked items
    /// are skipped here.
    fn abandon(&self, id: ItemId, message: String) {
        if let Some(bar) = self.bars.get(&id) {
            bar.abandon_with_message(message);
        }
    }

    fn warn(&self, id: Option<ItemId>, warning: &SoftWarning) {
        let subject = id.map_or_else(String::new, |id| format!("{}: ", self.label(id)));
        let line = match warning {
            SoftWarning::LowDisk {
                free_bytes,
                threshold_bytes,
            } => format!(
                "⚠ {subject}low disk space, {} free (warning below {})",
                humanize_size(*free_bytes),
                humanize_size(*threshold_bytes)
            ),
            SoftWarning::SizeMismatch { declared, actual } => format!(
                "⚠ {subject}received {} but the source announced {}",
                humanize_size(*actual),
                humanize_size(*declared)
            ),
        };
        self.println(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediafetch_core::{ErrorClass, MediaCategory};
    use std::path::PathBuf;

    fn board_with(id: ItemId) -> ProgressBoard {
        let mut board = ProgressBoard::hidden();
        board.track(id, "Movie.Title.2022.mkv");
        board
    }

    #[test]
    fn test_progress_switches_to_byte_bar() {
        let id = ItemId::new(1);
        let board = board_with(id);

        board.apply(&DownloadEvent::started(id, 1));
        board.apply(&DownloadEvent::progress(id, 512, Some(2048)));

        let bar = board.bar(id).unwrap();
        assert_eq!(bar.length(), Some(2048));
        assert_eq!(bar.position(), 512);
        assert!(!bar.is_finished());
    }

    #[test]
    fn test_queue_and_pause_messages() {
        let id = ItemId::new(2);
        let board = board_with(id);

        board.apply(&DownloadEvent::queued(id, 3));
        assert_eq!(board.bar(id).unwrap().message(), "Movie.Title.2022.mkv (queued #3)");

        board.apply(&DownloadEvent::Paused {
            id,
            bytes_transferred: 10,
        });
        assert!(board.bar(id).unwrap().message().ends_with("(paused)"));

        board.apply(&DownloadEvent::Resumed {
            id,
            bytes_transferred: 10,
        });
        assert_eq!(board.bar(id).unwrap().message(), "Movie.Title.2022.mkv");
    }

    #[test]
    fn test_retry_shows_attempt_and_resets_position() {
        let id = ItemId::new(3);
        let board = board_with(id);

        board.apply(&DownloadEvent::progress(id, 100, Some(200)));
        board.apply(&DownloadEvent::started(id, 2));

        let bar = board.bar(id).unwrap();
        assert_eq!(bar.position(), 0);
        assert!(bar.message().contains("attempt 2"));
    }

    #[test]
    fn test_terminal_events_finish_the_bar() {
        let done = ItemId::new(4);
        let failed = ItemId::new(5);
        let mut board = board_with(done);
        board.track(failed, "bad.mkv");

        board.apply(&DownloadEvent::Completed {
            id: done,
            path: PathBuf::from("/lib/Movies/Movie Title (2022)/Movie Title (2022).mkv"),
            category: MediaCategory::Movie,
            bytes: 2048,
        });
        board.apply(&DownloadEvent::failed(failed, "gone", ErrorClass::SourceExpired, 1));

        assert!(board.bar(done).unwrap().is_finished());
        assert!(board.bar(done).unwrap().message().starts_with('✓'));
        assert!(board.bar(failed).unwrap().is_finished());
        assert!(board.bar(failed).unwrap().message().contains("gone"));
    }

    #[test]
    fn test_untracked_events_are_ignored() {
        let board = ProgressBoard::hidden();
        board.apply(&DownloadEvent::progress(ItemId::new(9), 1, None));
        board.apply(&DownloadEvent::low_disk(None, 1, 2));
        assert!(board.bar(ItemId::new(9)).is_none());
    }
}
