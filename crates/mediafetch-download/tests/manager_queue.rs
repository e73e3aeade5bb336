//! Admission, slot accounting and FIFO promotion.

mod common;

use std::sync::Arc;

use common::{FixedProbe, Harness, Plan, movie};
use mediafetch_core::classify::MOVIES_DIR;
use mediafetch_core::{
    ChosenCategory, DownloadError, DownloadEvent, DownloadRequest, DownloadState, ItemId,
    MediaCategory, NoopPlayer, SoftWarning, SourceRef,
};
use mediafetch_download::SubmitOutcome;
use mediafetch_download::partials::staged_path;

fn started_order(harness: &Harness) -> Vec<ItemId> {
    harness
        .events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::Started { id, .. } => Some(*id),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn sixth_submission_waits_at_position_one() {
    let mut h = Harness::new(|c| c.with_max_concurrent(5));
    h.source.close_gate();

    let mut ids = Vec::new();
    for n in 1..=5 {
        let outcome = h.manager.submit(h.request(&movie(n), 256)).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Active(_)), "{outcome:?}");
        ids.push(outcome.id().unwrap());
    }
    let sixth = h.manager.submit(h.request(&movie(6), 256)).await.unwrap();
    let SubmitOutcome::Queued { id: sixth_id, position } = sixth else {
        panic!("expected queued, got {sixth:?}");
    };
    assert_eq!(position, 1);

    let status = h.manager.status().await;
    assert_eq!(status.active.len(), 5);
    assert_eq!(status.queued.len(), 1);
    assert_eq!(status.queued[0].position, Some(1));
    assert_eq!(status.max_concurrent, 5);

    h.source.open_gate();
    for id in ids.iter().copied().chain([sixth_id]) {
        assert!(matches!(h.wait_final(id).await, DownloadEvent::ReadyToPlay { .. }));
    }
    assert!(h.manager.status().await.is_idle());
}

#[tokio::test]
async fn queued_items_start_in_submission_order() {
    let mut h = Harness::new(|c| c.with_max_concurrent(1));
    h.source.close_gate();

    let a = h.manager.submit(h.request(&movie(1), 128)).await.unwrap();
    let b = h.manager.submit(h.request(&movie(2), 128)).await.unwrap();
    let c = h.manager.submit(h.request(&movie(3), 128)).await.unwrap();
    assert!(matches!(b, SubmitOutcome::Queued { position: 1, .. }));
    assert!(matches!(c, SubmitOutcome::Queued { position: 2, .. }));

    h.source.open_gate();
    let last = c.id().unwrap();
    h.wait_final(last).await;

    assert_eq!(
        started_order(&h),
        vec![a.id().unwrap(), b.id().unwrap(), last]
    );
}

#[tokio::test]
async fn completed_file_lands_in_library_layout() {
    let mut h = Harness::new(|c| c);
    let outcome = h
        .manager
        .submit(h.request("Movie.Title.2022.1080p.mkv", 300))
        .await
        .unwrap();
    let id = outcome.id().unwrap();

    let DownloadEvent::ReadyToPlay {
        path,
        category,
        already_playing,
        ..
    } = h.wait_final(id).await
    else {
        panic!("expected ready_to_play");
    };

    let expected = h
        .root()
        .join("Movies/Movie Title (2022)/Movie Title (2022).mkv");
    assert_eq!(path, expected);
    assert_eq!(category, MediaCategory::Movie);
    assert!(!already_playing);
    assert_eq!(std::fs::metadata(&expected).unwrap().len(), 300);
    assert_eq!(
        h.names_for(id),
        vec!["started", "completed", "ready_to_play"]
    );
    let staging = h.root().join(".partial");
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    h.manager.shutdown().await;
    assert!(!staging.exists(), "staging is pruned at shutdown");
}

#[tokio::test]
async fn organize_off_keeps_original_name() {
    let mut h = Harness::new(|c| c.with_organize(false));
    let outcome = h
        .manager
        .submit(h.request("Show.Name.S01E02.mkv", 100))
        .await
        .unwrap();
    let id = outcome.id().unwrap();

    let DownloadEvent::ReadyToPlay { path, category, .. } = h.wait_final(id).await else {
        panic!("expected ready_to_play");
    };
    assert_eq!(path, h.root().join("Show.Name.S01E02.mkv"));
    assert_eq!(category, MediaCategory::Series);
}

#[tokio::test]
async fn undetermined_item_waits_for_category() {
    let mut h = Harness::new(|c| c);
    let outcome = h.manager.submit(h.request("2012.mkv", 64)).await.unwrap();
    let SubmitOutcome::AwaitingCategory(id) = outcome else {
        panic!("expected awaiting category, got {outcome:?}");
    };
    h.wait_for(|e| matches!(e, DownloadEvent::AwaitingCategory { .. }))
        .await;

    let status = h.manager.status().await;
    assert_eq!(status.awaiting_category.len(), 1);
    assert!(status.active.is_empty());

    let err = h.manager.pause(id).await.unwrap_err();
    assert!(matches!(err, DownloadError::InvalidState { .. }));

    let resolved = h
        .manager
        .resolve_category(id, ChosenCategory::Movie)
        .await
        .unwrap();
    assert_eq!(resolved, SubmitOutcome::Active(id));

    let DownloadEvent::ReadyToPlay { path, .. } = h.wait_final(id).await else {
        panic!("expected ready_to_play");
    };
    assert_eq!(path, h.root().join(MOVIES_DIR).join("2012/2012.mkv"));
}

#[tokio::test]
async fn resolve_category_rejects_items_not_parked() {
    let mut h = Harness::new(|c| c);
    h.source.close_gate();
    let id = h
        .manager
        .submit(h.request(&movie(1), 64))
        .await
        .unwrap()
        .id()
        .unwrap();

    let err = h
        .manager
        .resolve_category(id, ChosenCategory::Other)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DownloadError::InvalidState {
            state: DownloadState::Active,
            ..
        }
    ));

    let err = h
        .manager
        .resolve_category(ItemId::new(999), ChosenCategory::Other)
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::NotFound { .. }));

    h.source.open_gate();
    h.wait_final(id).await;
}

#[tokio::test]
async fn forced_category_skips_classifier() {
    let mut h = Harness::new(|c| c);
    let request = h
        .request("Movie.Title.2022.mkv", 32)
        .with_category(ChosenCategory::Other);
    let id = h.manager.submit(request).await.unwrap().id().unwrap();

    let DownloadEvent::ReadyToPlay { path, category, .. } = h.wait_final(id).await else {
        panic!("expected ready_to_play");
    };
    assert_eq!(category, MediaCategory::Other);
    assert_eq!(path, h.root().join("Other/Movie.Title.2022.mkv"));
}

#[tokio::test]
async fn complete_file_on_disk_is_not_downloaded_again() {
    let h = Harness::new(|c| c.with_organize(false));
    std::fs::write(h.root().join("clip.mp4"), vec![0u8; 99]).unwrap();

    let outcome = h.manager.submit(h.request("clip.mp4", 100)).await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::AlreadyPresent {
            path: h.root().join("clip.mp4")
        }
    );
    assert!(h.source.opens().is_empty());
}

#[tokio::test]
async fn incomplete_file_on_disk_is_replaced() {
    let mut h = Harness::new(|c| c.with_organize(false));
    std::fs::write(h.root().join("clip.mp4"), vec![0u8; 50]).unwrap();

    let outcome = h.manager.submit(h.request("clip.mp4", 100)).await.unwrap();
    let id = outcome.id().unwrap();
    assert_eq!(outcome, SubmitOutcome::Active(id));

    h.wait_final(id).await;
    assert_eq!(std::fs::metadata(h.root().join("clip.mp4")).unwrap().len(), 100);
}

#[tokio::test]
async fn duplicate_submission_reports_existing_item() {
    let mut h = Harness::new(|c| c);
    h.source.close_gate();
    let first = h.manager.submit(h.request(&movie(1), 64)).await.unwrap();
    let id = first.id().unwrap();

    let again = h.manager.submit(h.request(&movie(1), 64)).await.unwrap();
    assert_eq!(
        again,
        SubmitOutcome::Duplicate {
            existing: id,
            state: DownloadState::Active
        }
    );

    h.manager.pause(id).await.unwrap();
    let again = h.manager.submit(h.request(&movie(1), 64)).await.unwrap();
    assert_eq!(
        again,
        SubmitOutcome::Duplicate {
            existing: id,
            state: DownloadState::Active
        },
        "a paused duplicate is resumed"
    );

    h.source.open_gate();
    assert!(matches!(h.wait_final(id).await, DownloadEvent::ReadyToPlay { .. }));
    assert_eq!(h.manager.status().await.active.len(), 0);
}

#[tokio::test]
async fn disk_refusal_rejects_admission() {
    let mut h = Harness::with_parts(|c| c, FixedProbe::new(100), Arc::new(NoopPlayer));
    std::fs::write(h.root().join("old.mkv"), vec![0u8; 10]).unwrap();

    let request = h.request(&movie(1), 1000);
    let err = h.manager.submit(request).await.unwrap_err();
    assert_eq!(err, DownloadError::disk_refused(100, 1000));

    let event = h
        .wait_for(|e| matches!(e, DownloadEvent::DiskRefused { .. }))
        .await;
    let DownloadEvent::DiskRefused {
        shortfall_bytes, ..
    } = event
    else {
        unreachable!();
    };
    assert_eq!(shortfall_bytes, 900);
    assert!(h.manager.status().await.is_idle());
    assert!(h.source.opens().is_empty());
    assert!(!h.root().join("old.mkv").exists(), "eviction ran before refusing");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_evict_without_blocking_the_runtime() {
    let h = Harness::with_parts(|c| c, FixedProbe::new(100), Arc::new(NoopPlayer));
    let shelf = h.root().join("Other");
    std::fs::create_dir_all(&shelf).unwrap();
    for n in 0..16 {
        std::fs::write(shelf.join(format!("old-{n}.mkv")), vec![0u8; 10]).unwrap();
    }

    let submits: Vec<_> = (1..=8)
        .map(|n| {
            let manager = h.manager.clone();
            let request = h.request(&movie(n), 1000);
            tokio::spawn(async move { manager.submit(request).await })
        })
        .collect();
    for submit in submits {
        let err = submit.await.unwrap().unwrap_err();
        assert_eq!(err, DownloadError::disk_refused(100, 1000));
    }

    assert!(!shelf.exists(), "evicted files and their folder are gone");
    assert!(h.manager.status().await.is_idle());
    assert!(h.source.opens().is_empty());
}

#[tokio::test]
async fn low_disk_emits_soft_warning_but_admits() {
    let mut h = Harness::with_parts(
        |c| c.with_disk_thresholds(0, 1),
        FixedProbe::new(4096),
        Arc::new(NoopPlayer),
    );
    let id = h
        .manager
        .submit(h.request(&movie(1), 64))
        .await
        .unwrap()
        .id()
        .unwrap();

    let warning = h
        .wait_for(|e| matches!(e, DownloadEvent::SoftWarning { .. }))
        .await;
    assert_eq!(
        warning,
        DownloadEvent::SoftWarning {
            id: Some(id),
            warning: SoftWarning::LowDisk {
                free_bytes: 4096,
                threshold_bytes: 1024 * 1024
            }
        }
    );
    assert!(matches!(h.wait_final(id).await, DownloadEvent::ReadyToPlay { .. }));
}

#[tokio::test]
async fn short_transfer_emits_size_mismatch() {
    let mut h = Harness::new(|c| c);
    let name = movie(1);
    h.source.script(&name, [Plan::Serve { size: 500, chunk: 100 }]);
    let request =
        DownloadRequest::new(SourceRef::new(&name), &name).with_declared_size(Some(1000));
    let id = h.manager.submit(request).await.unwrap().id().unwrap();

    h.wait_final(id).await;
    assert!(h.events.iter().any(|e| matches!(
        e,
        DownloadEvent::SoftWarning {
            warning: SoftWarning::SizeMismatch {
                declared: 1000,
                actual: 500
            },
            ..
        }
    )));
    assert!(h.events.iter().any(|e| matches!(
        e,
        DownloadEvent::Completed { bytes: 500, .. }
    )));
}

#[tokio::test]
async fn staged_file_uses_partial_dir_while_active() {
    let h = Harness::new(|c| c);
    h.source.close_gate();
    let name = movie(1);
    let id = h
        .manager
        .submit(h.request(&name, 64))
        .await
        .unwrap()
        .id()
        .unwrap();

    let staged = staged_path(&h.manager.config().staging_dir(), id, &name, Some(64));
    let appeared = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !staged.exists() {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(appeared.is_ok(), "staged file at {}", staged.display());

    h.manager.shutdown().await;
    assert!(!staged.exists());
}
