//! Property tests for artifact naming and snapshot path matching.

use poolstats_core::domain::{
    epoch_dir_name, metas_file_name, parse_epoch_dir, parse_metas_file, parse_stats_file,
    stats_file_name,
};
use poolstats_core::snapshot::match_snapshot_path;
use poolstats_core::{Epoch, Slot};
use proptest::prelude::*;

proptest! {
    /// Every formatted name parses back to its epoch.
    #[test]
    fn names_parse_back(e in any::<u64>()) {
        let epoch = Epoch(e);
        prop_assert_eq!(parse_epoch_dir(&epoch_dir_name(epoch)), Some(epoch));
        prop_assert_eq!(parse_metas_file(&metas_file_name(epoch)), Some(epoch));
        prop_assert_eq!(parse_stats_file(&stats_file_name(epoch)), Some(epoch));
    }

    /// Parsers never confuse one artifact kind for another.
    #[test]
    fn parsers_are_disjoint(e in any::<u64>()) {
        let epoch = Epoch(e);
        prop_assert_eq!(parse_stats_file(&metas_file_name(epoch)), None);
        prop_assert_eq!(parse_metas_file(&stats_file_name(epoch)), None);
        prop_assert_eq!(parse_epoch_dir(&stats_file_name(epoch)), None);
    }

    /// Arbitrary trailing text after a valid name is rejected.
    #[test]
    fn trailing_text_is_rejected(e in 0u64..100_000, tail in "[a-z.~]{1,8}") {
        let name = format!("{}{}", stats_file_name(Epoch(e)), tail);
        prop_assert_eq!(parse_stats_file(&name), None);
    }

    /// A well-formed snapshot path matches only its own epoch and slot.
    #[test]
    fn snapshot_path_matches_own_coordinates(
        e in 0u64..10_000,
        s in 0u64..1_000_000_000,
        warehouse in "[a-z0-9-]{1,24}",
        hash in "[A-Za-z0-9]{1,44}",
    ) {
        let name = format!("{e}/{warehouse}/snapshot-{s}-{hash}.tar.zst");
        prop_assert_eq!(match_snapshot_path(&name, Epoch(e), Slot(s)), Some(warehouse.as_str()));
        prop_assert_eq!(match_snapshot_path(&name, Epoch(e + 1), Slot(s)), None);
        prop_assert_eq!(match_snapshot_path(&name, Epoch(e), Slot(s + 1)), None);
    }
}
