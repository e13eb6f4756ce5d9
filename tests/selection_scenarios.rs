mod common;

use common::{files, is_run, selector, sequence_ids, MB};
use lsm_compaction_policy::{
    compaction::skip_large_files,
    config::{MAX_FILES_KEY, MAX_SIZE_KEY, MIN_FILES_KEY, THROTTLE_POINT_KEY},
    CompactionKind, CompactionOrigin, FileId, SelectionError, StoreFile, StoreFileMeta,
};

const GB: &str = "1073741824";

#[test]
fn uniform_files_yield_minor_oldest_first_run() {
    let selector = selector(
        &[(MIN_FILES_KEY, "3"), (MAX_FILES_KEY, "10"), (MAX_SIZE_KEY, GB)],
        100,
    );
    let files = files(&[10 * MB; 12]);

    let request = selector
        .select_compaction(&files, &[], false, false, false)
        .expect("select");
    let ids = sequence_ids(request.files());
    assert!((3..=10).contains(&ids.len()), "selected {ids:?}");
    assert!(is_run(&ids));
    assert_eq!(ids[0], 1);
    assert_eq!(request.kind(), CompactionKind::Minor);
    assert_eq!(request.origin(), CompactionOrigin::Background);
    assert!(!request.is_all_files());
}

#[test]
fn oversized_reference_survives_size_filter() {
    let reference = StoreFileMeta::new(FileId::new(), 1, 5 * 1024 * MB, 1_001).reference(true);
    let mut candidates = vec![reference];
    for seq in 2..=4 {
        candidates.push(StoreFileMeta::new(FileId::new(), seq, 10 * MB, 1_000 + seq));
    }

    let kept = skip_large_files(candidates.clone(), 1024 * MB).expect("skip");
    assert_eq!(sequence_ids(&kept), vec![1, 2, 3, 4]);

    let selector = selector(&[(MAX_SIZE_KEY, GB)], 100);
    let request = selector
        .select_compaction(&candidates, &[], false, false, false)
        .expect("select");
    assert!(request.files().iter().any(|f| f.sequence_id() == 1));
    assert!(request.is_major());
}

#[test]
fn selection_starts_after_compacting_files() {
    let selector = selector(&[], 100);
    let files = files(&[10 * MB; 5]);
    let compacting = &files[..2];

    let eligible = selector
        .pre_select_compaction(&files, compacting)
        .expect("pre-select");
    assert_eq!(sequence_ids(&eligible), vec![3, 4, 5]);

    let request = selector
        .select_compaction(&files, compacting, false, false, false)
        .expect("select");
    assert!(request.files().iter().all(|f| f.sequence_id() > 2));
}

#[test]
fn single_file_needs_no_compaction() {
    let selector = selector(&[(MIN_FILES_KEY, "2")], 100);
    let files = files(&[10 * MB]);

    assert!(!selector.needs_compaction(&files, &[]));
    let request = selector
        .select_compaction(&files, &[], false, false, false)
        .expect("select");
    assert!(request.is_empty());
}

#[test]
fn user_forced_major_ignores_file_limit() {
    let selector = selector(&[(MAX_FILES_KEY, "10")], 100);
    let files = files(&[10 * MB; 15]);

    let request = selector
        .select_compaction(&files, &[], true, false, true)
        .expect("select");
    assert_eq!(request.len(), 15);
    assert_eq!(request.kind(), CompactionKind::Major);
    assert_eq!(request.origin(), CompactionOrigin::User);
    assert!(request.is_all_files());

    // Without the user flag the file limit applies and nothing is major.
    let request = selector
        .select_compaction(&files, &[], false, false, true)
        .expect("select");
    assert_eq!(request.kind(), CompactionKind::Minor);
    assert!(request.len() <= 10);
}

#[test]
fn admission_and_throttle_boundaries() {
    let selector = selector(&[(MIN_FILES_KEY, "3"), (THROTTLE_POINT_KEY, "1000")], 100);
    let files = files(&[MB; 5]);

    assert!(selector.needs_compaction(&files, &files[..2]));
    assert!(!selector.needs_compaction(&files, &files[..3]));
    assert!(!selector.throttle_compaction(1000));
    assert!(selector.throttle_compaction(1001));

    selector.settings().set_min_files_to_compact(2);
    assert!(selector.needs_compaction(&files, &files[..3]));
}

#[test]
fn selections_are_contiguous_and_never_overlap_compacting_files() {
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..200 {
        let count = rng.usize(0..24);
        let sizes: Vec<u64> = (0..count).map(|_| rng.u64(1..400) * MB).collect();
        let sorted = files(&sizes);
        let compacting_len = if count == 0 { 0 } else { rng.usize(0..count) };
        let compacting = sorted[..compacting_len].to_vec();
        let mut shuffled = sorted.clone();
        rng.shuffle(&mut shuffled);

        let selector = selector(&[(MAX_SIZE_KEY, GB)], rng.u64(4..30));
        let request = selector
            .select_compaction(&shuffled, &compacting, rng.bool(), rng.bool(), false)
            .expect("select");
        let ids = sequence_ids(request.files());
        assert!(is_run(&ids), "gap in {ids:?}");
        if let Some(newest) = compacting.last() {
            assert!(ids.iter().all(|seq| *seq > newest.sequence_id()));
        }
    }
}

#[test]
fn missing_compacting_file_fails_selection() {
    let selector = selector(&[], 100);
    let store_files = files(&[MB; 4]);
    let stranger = files(&[MB; 6]).pop().expect("file");

    let err = selector
        .select_compaction(&store_files, &[stranger.clone()], false, false, false)
        .expect_err("unknown compacting file");
    assert!(matches!(
        err,
        SelectionError::CompactingFileMissing { file } if file == stranger.file_id()
    ));
}

#[test]
fn major_compaction_time_is_reproducible() {
    let selector = selector(&[], 100);
    let files = files(&[MB, 2 * MB, 3 * MB]);
    let mut reversed = files.clone();
    reversed.reverse();

    let next = selector.next_major_compact_time(&files);
    assert_eq!(selector.next_major_compact_time(&reversed), next);
    assert!(!next.is_zero());
    assert!(selector
        .next_major_compact_time::<StoreFileMeta>(&[])
        .is_zero());
}

#[test]
fn misconfigured_bounds_select_nothing_without_failing() {
    let files = files(&[10 * MB; 20]);
    let compacting = &files[..3];

    // min above max, and a negative size bound clamped to zero. 20 - 3 + 1 >= 4
    // flags the store as possibly stuck.
    for pairs in [
        &[(MIN_FILES_KEY, "12"), (MAX_FILES_KEY, "3"), (MAX_SIZE_KEY, "-5")][..],
        &[(MIN_FILES_KEY, "12"), (MAX_FILES_KEY, "3")][..],
    ] {
        let selector = selector(pairs, 4);
        let request = selector
            .select_compaction(&files, compacting, false, false, false)
            .expect("misconfiguration is not an error");
        assert!(request.is_empty());
        assert!(!request.is_major());
    }
}

#[test]
fn huge_files_do_not_break_window_search() {
    let files = files(&[1 << 63, 1 << 63, 10 * MB, 10 * MB]);

    let request = selector(&[], 100)
        .select_compaction(&files, &[], false, false, false)
        .expect("select");
    assert!(request.is_empty());

    let request = selector(&[], 2)
        .select_compaction(&files, &[], false, false, false)
        .expect("select");
    assert_eq!(sequence_ids(request.files()), vec![2, 3, 4]);
    assert_eq!(request.kind(), CompactionKind::Minor);
}
