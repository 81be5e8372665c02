// Property-based tests for the reconciliation building blocks.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use tvmerge_recon::config::MatchingConfig;
use tvmerge_recon::identity::IdentityAllocator;
use tvmerge_recon::matcher::ChannelMatcher;
use tvmerge_recon::normalize::NameNormalizer;
use tvmerge_recon::timeline::{overlaps, parse_wire_timestamp, ScheduleBook};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Channel-like names assembled from fragments that exercise separators,
/// quality tags and the protected 4K names.
fn arb_name() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        Just("CCTV"),
        Just("4K"),
        Just("4k"),
        Just(" "),
        Just("-"),
        Just("_"),
        Just("("),
        Just(")"),
        Just("HDR"),
        Just("hdr"),
        Just("超清"),
        Just("爱上"),
        Just("卫视"),
        Just("5"),
        Just("+"),
        Just("\t"),
    ];
    prop::collection::vec(fragment, 0..8).prop_map(|parts| parts.concat())
}

/// Program on one of three channels: (channel, start minute, length minutes).
fn arb_program() -> impl Strategy<Value = (usize, u32, u32)> {
    (0usize..3, 0u32..1380, 0u32..120)
}

fn wire(minute: u32) -> String {
    format!("20250101{:02}{:02}00 +0800", minute / 60 % 24, minute % 60)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn normalize_is_idempotent(name in arb_name()) {
        let normalizer = NameNormalizer::new(&MatchingConfig::default());
        let once = normalizer.normalize(&name);
        prop_assert_eq!(normalizer.normalize(&once), once);
    }

    #[test]
    fn accepted_intervals_never_overlap(programs in prop::collection::vec(arb_program(), 0..40)) {
        let mut book = ScheduleBook::new();
        for (channel, start, len) in &programs {
            let stop = (start + len).min(1439);
            book.try_accept(&channel.to_string(), &wire(*start), &wire(stop), "t");
        }

        let mut by_channel: HashMap<&str, Vec<_>> = HashMap::new();
        for p in book.programs() {
            let s = parse_wire_timestamp(&p.start).unwrap();
            let e = parse_wire_timestamp(&p.stop).unwrap();
            prop_assert!(s < e);
            by_channel.entry(p.channel.as_str()).or_default().push((s, e));
        }
        for intervals in by_channel.values() {
            for (i, a) in intervals.iter().enumerate() {
                for b in &intervals[i + 1..] {
                    prop_assert!(!overlaps(*a, *b));
                }
            }
        }
    }

    #[test]
    fn second_overlapping_program_never_wins(start in 0u32..1200, len in 1u32..120, shift in 0u32..119) {
        let shift = shift % len;
        let mut book = ScheduleBook::new();
        prop_assert!(book.try_accept("1", &wire(start), &wire(start + len), "first"));
        let before = book.len();
        prop_assert!(!book.try_accept("1", &wire(start + shift), &wire(start + shift + len), "second"));
        prop_assert_eq!(book.len(), before);
    }

    #[test]
    fn matcher_is_deterministic(local in arb_name(), candidates in prop::collection::vec(arb_name(), 0..6)) {
        let matcher = ChannelMatcher::new(&MatchingConfig::default());
        let local = matcher.normalizer().normalize(&local);
        let first = matcher.best_match(&local, &candidates, true).map(str::to_string);
        let second = matcher.best_match(&local, &candidates, true).map(str::to_string);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn allocator_ids_are_unique(
        names in prop::collection::vec("[a-e]{1,2}", 0..30),
        used in prop::collection::hash_set(1u64..20, 0..10),
    ) {
        let used: HashSet<String> = used.into_iter().map(|n| format!("ext_{n}")).collect();
        let mut alloc = IdentityAllocator::new("ext_");
        let mut seen: HashMap<String, String> = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            let id = alloc.allocate(&i.to_string(), name, &used);
            prop_assert!(!used.contains(&id));
            if let Some(previous) = seen.get(name) {
                prop_assert_eq!(previous, &id);
            }
            seen.insert(name.clone(), id);
        }
        let distinct: HashSet<&String> = seen.values().collect();
        prop_assert_eq!(distinct.len(), seen.len());
    }
}
