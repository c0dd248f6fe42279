use std::io::Write;

use super::LibraryConfig;
use crate::error::ConfigError;

#[test]
fn test_defaults_match_the_lending_rules() {
    let config = LibraryConfig::default();
    assert_eq!(config.lending.initial_borrow_limit, 3);
    assert_eq!(config.lending.loyalty_interval, 3);
    assert_eq!(config.lending.top_k, 5);
    assert!(!config.lending.audit_unmatched_returns);
    assert!((config.repair.archive_probability - 0.30).abs() < f64::EPSILON);
    assert_eq!(config.repair.threshold, 5);
    assert!(config.repair.seed.is_none());
    assert!(!config.repair.dedupe_archive);
    assert!(!config.repair.prune_repaired_archive);
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_partial_document_keeps_other_defaults() {
    let config = LibraryConfig::from_toml_str(
        "[repair]\nseed = 42\nprune_repaired_archive = true\ndedupe_archive = true\n",
    )
    .unwrap();

    assert_eq!(config.repair.seed, Some(42));
    assert!(config.repair.prune_repaired_archive);
    assert!(config.repair.dedupe_archive);
    assert_eq!(config.lending, LibraryConfig::default().lending);
}

#[test]
fn test_out_of_range_probability_is_rejected() {
    let result = LibraryConfig::from_toml_str("[repair]\narchive_probability = 1.5\n");
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let result = LibraryConfig::from_toml_str("[lending\n");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_loads_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[lending]\ninitial_borrow_limit = 1\naudit_unmatched_returns = true").unwrap();

    let config = LibraryConfig::load(file.path()).unwrap();
    assert_eq!(config.lending.initial_borrow_limit, 1);
    assert!(config.lending.audit_unmatched_returns);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let result = LibraryConfig::load(std::path::Path::new("/nonexistent/circulation.toml"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}
