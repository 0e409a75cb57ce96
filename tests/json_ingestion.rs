use std::fs;

use rust_data_loader::ingestion::json::{ingest_json_from_path, ingest_json_from_str, JsonHandler};
use rust_data_loader::ingestion::FormatHandler;
use rust_data_loader::types::{DataType, Field, Schema, Value};
use rust_data_loader::LoadError;
use tempfile::TempDir;

fn schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64),
        Field::new("user.name", DataType::Utf8),
        Field::new("active", DataType::Bool),
    ])
}

#[test]
fn ingest_json_array_with_nested_field() {
    let input = r#"
    [
      {"id": 1, "user": {"name": "Ada"}, "active": true},
      {"id": 2, "user": {"name": "Grace"}, "active": false}
    ]
    "#;

    let ds = ingest_json_from_str(input, Some(&schema())).unwrap();
    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.rows[0][1], Value::Utf8("Ada".to_string()));
}

#[test]
fn ingest_ndjson_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.ndjson");
    fs::write(
        &path,
        "{\"id\":1,\"user\":{\"name\":\"Ada\"},\"active\":true}\n\n{\"id\":2,\"user\":{\"name\":\"Grace\"},\"active\":null}\n",
    )
    .unwrap();

    let ds = ingest_json_from_path(&path, Some(&schema())).unwrap();
    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.rows[1][2], Value::Null);
}

#[test]
fn ingest_json_errors_on_missing_required_field() {
    let input = r#"[{"id": 1, "active": true}]"#;
    let err = ingest_json_from_str(input, Some(&schema())).unwrap_err();
    assert!(err.to_string().contains("missing required field 'user.name'"));
}

#[test]
fn malformed_single_document_is_a_json_error() {
    let err = ingest_json_from_str(r#"{"id": 1,"#, None).unwrap_err();
    assert!(matches!(err, LoadError::Json(_)));
}

#[test]
fn handler_accepts_ndjson_hint() {
    let handler = JsonHandler::new();
    assert!(handler.can_handle("anything.log", Some("NDJSON")));
    assert!(handler.can_handle("events.Json", None));
    assert!(!handler.can_handle("events.csv", None));
}
