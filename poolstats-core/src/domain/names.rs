//! Artifact naming.
//!
//! Every place that routes a file or directory by epoch goes through these
//! functions. Parsers match the whole name: a prefix, one or more ASCII
//! digits, and a suffix. Anything else (backup copies, temp files, other
//! tooling's output) is ignored by returning `None`.

use super::ids::Epoch;

const EPOCH_DIR_PREFIX: &str = "epoch_";
const METAS_PREFIX: &str = "stake_pool_metas_";
const STATS_PREFIX: &str = "stats_";
const JSON_SUFFIX: &str = ".json";

/// Published index of all stats artifacts.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// `epoch_<epoch>`
pub fn epoch_dir_name(epoch: Epoch) -> String {
    format!("{EPOCH_DIR_PREFIX}{epoch}")
}

/// `stake_pool_metas_<epoch>.json`
pub fn metas_file_name(epoch: Epoch) -> String {
    format!("{METAS_PREFIX}{epoch}{JSON_SUFFIX}")
}

/// `stats_<epoch>.json`
pub fn stats_file_name(epoch: Epoch) -> String {
    format!("{STATS_PREFIX}{epoch}{JSON_SUFFIX}")
}

pub fn parse_epoch_dir(name: &str) -> Option<Epoch> {
    parse_keyed(name, EPOCH_DIR_PREFIX, "")
}

pub fn parse_metas_file(name: &str) -> Option<Epoch> {
    parse_keyed(name, METAS_PREFIX, JSON_SUFFIX)
}

pub fn parse_stats_file(name: &str) -> Option<Epoch> {
    parse_keyed(name, STATS_PREFIX, JSON_SUFFIX)
}

fn parse_keyed(name: &str, prefix: &str, suffix: &str) -> Option<Epoch> {
    let digits = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().map(Epoch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_names() {
        assert_eq!(parse_epoch_dir("epoch_516"), Some(Epoch(516)));
        assert_eq!(parse_metas_file("stake_pool_metas_600.json"), Some(Epoch(600)));
        assert_eq!(parse_stats_file("stats_1000.json"), Some(Epoch(1000)));
    }

    #[test]
    fn rejects_partial_and_decorated_names() {
        assert_eq!(parse_epoch_dir("epoch_"), None);
        assert_eq!(parse_epoch_dir("epoch_516_old"), None);
        assert_eq!(parse_epoch_dir("xepoch_516"), None);
        assert_eq!(parse_stats_file("stats_516.json.bak"), None);
        assert_eq!(parse_stats_file("stats_516.jsonx"), None);
        assert_eq!(parse_stats_file("stats_-1.json"), None);
        assert_eq!(parse_stats_file("stats_+5.json"), None);
        assert_eq!(parse_stats_file("stake_pool_metas_516.json"), None);
        assert_eq!(parse_metas_file("stats_516.json"), None);
        assert_eq!(parse_metas_file("manifest.json"), None);
    }

    #[test]
    fn rejects_numbers_that_overflow() {
        assert_eq!(parse_stats_file("stats_99999999999999999999999.json"), None);
    }

    #[test]
    fn formatted_names_parse_back() {
        let e = Epoch(742);
        assert_eq!(parse_epoch_dir(&epoch_dir_name(e)), Some(e));
        assert_eq!(parse_metas_file(&metas_file_name(e)), Some(e));
        assert_eq!(parse_stats_file(&stats_file_name(e)), Some(e));
    }
}
