mod common;

use chrono::{NaiveDate, NaiveDateTime};
use common::{all_bytes, days_ago, file_names, write_archive, TIME_FORMAT};
use logrotate::{
    archive_name_at, list_archives, parse_size, split_filename, time_from_name, Compression, Error,
    RetentionPolicy, RotatingFile,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

const UNITS: [(&str, u32); 8] = [
    ("", 0),
    ("b", 0),
    ("k", 1),
    ("KB", 1),
    ("MiB", 2),
    ("g", 3),
    ("Tb", 4),
    ("PIB", 5),
];

fn arb_timestamp() -> impl Strategy<Value = NaiveDateTime> {
    (1970i32..2200, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60, 0u32..1000).prop_map(
        |(y, mo, d, h, mi, s, ms)| {
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_milli_opt(h, mi, s, ms)
                .unwrap()
        },
    )
}

fn arb_file_name() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9_]{0,8}", prop_oneof![Just(""), Just(".log"), Just(".txt")])
        .prop_map(|(stem, ext)| format!("{stem}{ext}"))
}

/// A unit index and a magnitude whose scaled size still fits in a `u64`.
fn arb_size_in_range() -> impl Strategy<Value = (usize, i64)> {
    (0..UNITS.len()).prop_flat_map(|unit| {
        let fits = (u64::MAX >> (10 * UNITS[unit].1)).min(1_000_000) as i64;
        (Just(unit), 1i64..=fits)
    })
}

// Sizes scale by powers of 1024, whatever the unit spelling.
proptest! {
    #[test]
    fn prop_size_units((unit, n) in arb_size_in_range()) {
        let (suffix, rank) = UNITS[unit];
        let parsed = parse_size(&format!("{n}{suffix}")).unwrap();
        prop_assert_eq!(parsed, (n as u64) << (10 * rank));
    }
}

// Sizes too large for a u64 are rejected rather than wrapped.
proptest! {
    #[test]
    fn prop_size_overflow(extra in 0i64..1_000_000, unit in 2..UNITS.len()) {
        let (suffix, rank) = UNITS[unit];
        let n = (1i64 << (64 - 10 * rank)) + extra;
        let err = parse_size(&format!("{n}{suffix}")).unwrap_err();
        prop_assert!(matches!(err, Error::InvalidSize(_)));
    }
}

// Non-positive magnitudes disable the threshold.
proptest! {
    #[test]
    fn prop_size_non_positive(n in i64::MIN..=0, unit in 0..UNITS.len()) {
        let (suffix, _) = UNITS[unit];
        prop_assert_eq!(parse_size(&format!("{n}{suffix}")).unwrap(), 0);
    }
}

// An archive name carries its timestamp back out at millisecond precision.
proptest! {
    #[test]
    fn prop_archive_name_round_trip(name in arb_file_name(), at in arb_timestamp()) {
        let active = Path::new("/var/log").join(&name);
        let archive = archive_name_at(&active, TIME_FORMAT, at);
        prop_assert_eq!(archive.parent(), Some(Path::new("/var/log")));

        let (prefix, ext) = split_filename(&active);
        let file_name = archive.file_name().unwrap().to_str().unwrap();
        let parsed = time_from_name(TIME_FORMAT, file_name, &format!("{prefix}-"), &ext).unwrap();
        prop_assert_eq!(parsed, at);
    }
}

// Archive names sort in timestamp order.
proptest! {
    #[test]
    fn prop_archive_names_sort_chronologically(a in arb_timestamp(), b in arb_timestamp()) {
        let active = Path::new("app.log");
        let name_a = archive_name_at(active, TIME_FORMAT, a);
        let name_b = archive_name_at(active, TIME_FORMAT, b);
        prop_assert_eq!(name_a.cmp(&name_b), a.cmp(&b));
    }
}

// The plan keeps exactly the newest archives within both caps and
// deletes everything else.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_retention_plan(
        ages in proptest::collection::btree_set(1i64..60, 0..12),
        max_archives in 0usize..6,
        max_days in 0u64..40,
    ) {
        let dir = tempdir().unwrap();
        for &days in &ages {
            write_archive(dir.path(), "app", days_ago(days), ".log", b"x");
        }
        let archives = list_archives(&dir.path().join("app.log"), TIME_FORMAT, Compression::Gzip).unwrap();
        prop_assert_eq!(archives.len(), ages.len());

        let policy = RetentionPolicy {
            max_archives,
            max_age: Duration::from_secs(max_days * 24 * 60 * 60),
            compress: None,
        };
        let plan = policy.plan(archives, chrono::Local::now().naive_local());

        let mut expected: Vec<i64> = ages
            .iter()
            .copied()
            .filter(|&d| max_days == 0 || d < max_days as i64)
            .collect();
        if max_archives > 0 {
            expected.truncate(max_archives);
        }

        prop_assert_eq!(plan.keep.len(), expected.len());
        prop_assert_eq!(plan.keep.len() + plan.delete.len(), ages.len());
        let kept: BTreeSet<_> = plan.keep.iter().map(|a| a.path()).collect();
        let deleted: BTreeSet<_> = plan.delete.iter().map(|a| a.path()).collect();
        prop_assert!(kept.is_disjoint(&deleted));
        for pair in plan.keep.windows(2) {
            prop_assert!(pair[0].timestamp() > pair[1].timestamp());
        }
        if let (Some(oldest_kept), Some(newest_deleted)) = (plan.keep.last(), plan.delete.iter().map(|a| a.timestamp()).max()) {
            prop_assert!(oldest_kept.timestamp() > newest_deleted);
        }
    }
}

// Size-triggered rotation never loses or reorders bytes, and no file
// grows past the threshold.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_rotation_preserves_bytes(
        threshold in 8u64..64,
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..8), 0..40),
    ) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let log = RotatingFile::builder()
            .file(&path)
            .rotate_size(threshold.to_string())
            .open()
            .unwrap();

        let mut expected = Vec::new();
        for chunk in &chunks {
            log.append(chunk).unwrap();
            expected.extend_from_slice(chunk);
        }
        log.wait_for_retention();

        // Archive names sort before the active file and among themselves
        // by timestamp, so the directory reads back in write order.
        prop_assert_eq!(all_bytes(dir.path()), expected);
        for name in file_names(dir.path()) {
            prop_assert!(fs::metadata(dir.path().join(&name)).unwrap().len() <= threshold);
        }
    }
}
