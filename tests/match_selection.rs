use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rust_data_loader::ingestion::FormatRegistry;
use rust_data_loader::loader::{DataLoader, GetDataOptions};
use rust_data_loader::select::MatchStrategy;
use rust_data_loader::LoadError;
use tempfile::TempDir;

fn write_with_mtime(dir: &Path, name: &str, secs_after_epoch: u64) {
    let path = dir.join(name);
    fs::write(&path, "id\n1\n").unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs_after_epoch))
        .unwrap();
}

fn loader(dir: &Path) -> DataLoader {
    let registry = Arc::new(FormatRegistry::with_builtin_handlers(&BTreeMap::new()));
    DataLoader::new(dir, registry).unwrap()
}

fn selected_names(loader: &DataLoader, pattern: &str, strategy: MatchStrategy) -> Vec<String> {
    loader
        .resolve_source(pattern, strategy)
        .unwrap()
        .iter()
        .map(|p| p.path().file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn first_is_lexicographic_and_idempotent() {
    let dir = TempDir::new().unwrap();
    write_with_mtime(dir.path(), "b.csv", 3_000);
    write_with_mtime(dir.path(), "a.csv", 1_000);
    write_with_mtime(dir.path(), "c.csv", 2_000);
    let loader = loader(dir.path());

    let once = selected_names(&loader, "*.csv", MatchStrategy::First);
    let twice = selected_names(&loader, "*.csv", MatchStrategy::First);
    assert_eq!(once, vec!["a.csv"]);
    assert_eq!(once, twice);
}

#[test]
fn latest_picks_newest_modification_time() {
    let dir = TempDir::new().unwrap();
    write_with_mtime(dir.path(), "report_a.csv", 1_000_000);
    write_with_mtime(dir.path(), "report_b.csv", 2_000_000);
    write_with_mtime(dir.path(), "report_c.csv", 1_500_000);

    let names = selected_names(&loader(dir.path()), "report_*.csv", MatchStrategy::Latest);
    assert_eq!(names, vec!["report_b.csv"]);
}

#[test]
fn latest_tie_falls_back_to_lexicographic_minimum() {
    let dir = TempDir::new().unwrap();
    write_with_mtime(dir.path(), "z.csv", 5_000_000);
    write_with_mtime(dir.path(), "m.csv", 5_000_000);
    write_with_mtime(dir.path(), "a.csv", 1_000_000);

    let names = selected_names(&loader(dir.path()), "*.csv", MatchStrategy::Latest);
    assert_eq!(names, vec!["m.csv"]);
}

#[test]
fn all_returns_every_match_sorted() {
    let dir = TempDir::new().unwrap();
    for name in ["data_3.csv", "data_1.csv", "data_2.csv"] {
        write_with_mtime(dir.path(), name, 1_000);
    }

    let names = selected_names(&loader(dir.path()), "data_*.csv", MatchStrategy::All);
    assert_eq!(names, vec!["data_1.csv", "data_2.csv", "data_3.csv"]);
}

#[test]
fn empty_match_set_is_no_match_for_every_strategy() {
    let dir = TempDir::new().unwrap();
    write_with_mtime(dir.path(), "a.csv", 1_000);
    let loader = loader(dir.path());

    for strategy in [MatchStrategy::First, MatchStrategy::Latest, MatchStrategy::All] {
        let opts = GetDataOptions::default()
            .with_match_strategy(strategy)
            .with_validation(false);
        let err = loader.get_data("missing_*.csv", &opts).unwrap_err();
        assert!(matches!(err, LoadError::NoMatch { strategy: s } if s == strategy));
    }
}

#[test]
fn empty_match_set_fails_validation_first_when_enabled() {
    let dir = TempDir::new().unwrap();
    let err = loader(dir.path())
        .get_data("missing_*.csv", &GetDataOptions::default())
        .unwrap_err();
    assert!(matches!(err, LoadError::SourceNotFound { .. }));
}
