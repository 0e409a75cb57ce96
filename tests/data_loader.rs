use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use rust_data_loader::ingestion::{FormatOptions, FormatRegistry};
use rust_data_loader::loader::{DataLoader, GetDataOptions};
use rust_data_loader::select::MatchStrategy;
use rust_data_loader::types::Value;
use rust_data_loader::LoadError;
use tempfile::TempDir;

/// `id,amount` CSV with ids `start..start + rows`.
fn write_csv(dir: &Path, rel: &str, start: i64, rows: i64) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut content = String::from("id,amount\n");
    for id in start..start + rows {
        content.push_str(&format!("{id},{}.5\n", id * 10));
    }
    fs::write(path, content).unwrap();
}

fn loader(dir: &Path) -> DataLoader {
    let registry = Arc::new(FormatRegistry::with_builtin_handlers(&BTreeMap::new()));
    DataLoader::new(dir, registry).unwrap()
}

fn all() -> GetDataOptions {
    GetDataOptions::default().with_match_strategy(MatchStrategy::All)
}

#[test]
fn all_strategy_concatenates_in_lexicographic_order() {
    let dir = TempDir::new().unwrap();
    write_csv(dir.path(), "data_2024-01-16.csv", 100, 12);
    write_csv(dir.path(), "data_2024-01-15.csv", 0, 10);

    let loader = loader(dir.path());
    let ds = loader.get_data("data_*.csv", &all()).unwrap();
    assert_eq!(ds.row_count(), 22);
    assert_eq!(ds.rows[0][0], Value::Int64(0));
    assert_eq!(ds.rows[10][0], Value::Int64(100));

    let first = loader.get_data("data_*.csv", &GetDataOptions::default()).unwrap();
    assert_eq!(first.row_count(), 10);
}

#[test]
fn traversal_attempt_reads_nothing() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("data/sources");
    fs::create_dir_all(&base).unwrap();

    let loader = loader(&base);
    for validate in [true, false] {
        let err = loader
            .get_data("../../etc/passwd", &GetDataOptions::default().with_validation(validate))
            .unwrap_err();
        assert!(matches!(err, LoadError::PathTraversal { .. }), "{err}");
    }
}

#[test]
fn literal_path_loads_one_file() {
    let dir = TempDir::new().unwrap();
    write_csv(dir.path(), "nested/one.csv", 1, 3);

    let ds = loader(dir.path())
        .get_data("nested/one.csv", &GetDataOptions::default())
        .unwrap();
    assert_eq!(ds.column_names(), vec!["id", "amount"]);
    assert_eq!(ds.rows[2], vec![Value::Int64(3), Value::Float64(30.5)]);
}

#[test]
fn missing_literal_path_depends_on_validation() {
    let dir = TempDir::new().unwrap();
    let loader = loader(dir.path());

    let validated = loader.get_data("absent.csv", &GetDataOptions::default()).unwrap_err();
    assert!(matches!(validated, LoadError::SourceNotFound { .. }));

    let unvalidated = loader
        .get_data("absent.csv", &GetDataOptions::default().with_validation(false))
        .unwrap_err();
    assert!(matches!(unvalidated, LoadError::Csv(_) | LoadError::Io(_)));
}

#[test]
fn directory_is_not_a_valid_literal_source() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("folder.csv")).unwrap();
    let err = loader(dir.path()).validate_source("folder.csv").unwrap_err();
    assert!(matches!(err, LoadError::SourceNotFound { .. }));
}

#[test]
fn format_override_applies_to_every_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.dat"), "id\n1\n").unwrap();
    fs::write(dir.path().join("b.dat"), "id\n2\n").unwrap();

    let loader = loader(dir.path());
    let err = loader.get_data("*.dat", &all()).unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat { .. }));

    let ds = loader.get_data("*.dat", &all().with_format("csv")).unwrap();
    assert_eq!(ds.column("id").unwrap(), vec![&Value::Int64(1), &Value::Int64(2)]);
}

#[test]
fn one_bad_file_fails_the_whole_load() {
    let dir = TempDir::new().unwrap();
    write_csv(dir.path(), "part_1.csv", 0, 5);
    fs::write(dir.path().join("part_2.csv"), "other\nx\n").unwrap();

    let err = loader(dir.path()).get_data("part_*.csv", &all()).unwrap_err();
    assert!(matches!(err, LoadError::SchemaMismatch { .. }));
}

#[test]
fn integer_and_float_parts_widen_to_float() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.csv"), "v\n1\n").unwrap();
    fs::write(dir.path().join("b.csv"), "v\n2.5\n").unwrap();

    let ds = loader(dir.path()).get_data("*.csv", &all()).unwrap();
    assert_eq!(ds.column("v").unwrap(), vec![&Value::Float64(1.0), &Value::Float64(2.5)]);
}

#[test]
fn parallel_parsing_preserves_selection_order() {
    let dir = TempDir::new().unwrap();
    for i in 0..8 {
        write_csv(dir.path(), &format!("chunk_{i}.csv"), i * 100, 50);
    }

    let sequential = loader(dir.path()).get_data("chunk_*.csv", &all()).unwrap();
    let parallel = loader(dir.path())
        .with_parallel_parsing(true)
        .get_data("chunk_*.csv", &all())
        .unwrap();
    assert_eq!(sequential, parallel);
    assert_eq!(parallel.row_count(), 400);
}

#[test]
fn per_call_options_reach_the_handler() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("semi.csv"), "id;name\n1;Ada\n").unwrap();

    let opts = GetDataOptions::default().with_options(FormatOptions {
        delimiter: Some(';'),
        columns: Some(vec!["name".to_string()]),
        ..Default::default()
    });
    let ds = loader(dir.path()).get_data("semi.csv", &opts).unwrap();
    assert_eq!(ds.rows, vec![vec![Value::Utf8("Ada".to_string())]]);
}

#[test]
fn resolve_source_does_not_parse() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.csv"), "\"unterminated").unwrap();

    let files = loader(dir.path())
        .resolve_source("*.csv", MatchStrategy::All)
        .unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].path().ends_with("broken.csv"));
}

#[test]
fn base_directory_must_exist() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(FormatRegistry::new());
    let err = DataLoader::new(dir.path().join("missing"), registry).unwrap_err();
    assert!(matches!(err, LoadError::Configuration { .. }));
}
