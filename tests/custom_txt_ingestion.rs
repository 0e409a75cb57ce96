use std::fs;

use rust_data_loader::ingestion::custom_txt::{ingest_custom_txt_from_str, CustomTxtHandler};
use rust_data_loader::ingestion::{FormatHandler, FormatOptions};
use rust_data_loader::types::{DataType, Field, Schema, Value};
use rust_data_loader::LoadError;
use tempfile::TempDir;

#[test]
fn handler_reads_default_separators_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("export.txt");
    fs::write(
        &path,
        "id*endf*city*endf*amount*endr*\n1*endf*Oslo*endf*10.5*endr*\n2*endf*Lima*endf*3*endr*\n",
    )
    .unwrap();

    let ds = CustomTxtHandler::new()
        .load(&path, &FormatOptions::default())
        .unwrap();
    assert_eq!(ds.column_names(), vec!["id", "city", "amount"]);
    assert_eq!(ds.schema.fields[2].data_type, DataType::Float64);
    assert_eq!(ds.rows[1][2], Value::Float64(3.0));
}

#[test]
fn configured_defaults_apply_unless_overridden() {
    let handler = CustomTxtHandler::with_defaults(FormatOptions {
        column_separator: Some("|".into()),
        row_separator: Some("\n".into()),
        ..Default::default()
    });
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipes.txt");
    fs::write(&path, "a|b\n1|2\n").unwrap();

    let ds = handler.load(&path, &FormatOptions::default()).unwrap();
    assert_eq!(ds.rows, vec![vec![Value::Int64(1), Value::Int64(2)]]);

    let keep_spaces = FormatOptions {
        strip_whitespace: Some(false),
        ..Default::default()
    };
    fs::write(&path, "a | b\n1|2\n").unwrap();
    let ds = handler.load(&path, &keep_spaces).unwrap();
    assert_eq!(ds.column_names(), vec!["a ", " b"]);
}

#[test]
fn unstripped_text_values_keep_their_whitespace() {
    let keep_spaces = FormatOptions {
        strip_whitespace: Some(false),
        ..Default::default()
    };
    let ds = ingest_custom_txt_from_str("name*endf*id*endr*  Ada  *endf* 4 *endr*", &keep_spaces).unwrap();
    assert_eq!(ds.rows[0][0], Value::Utf8("  Ada  ".to_string()));
    assert_eq!(ds.rows[0][1], Value::Int64(4));

    let stripped = ingest_custom_txt_from_str("name*endr*  Ada  *endr*", &FormatOptions::default()).unwrap();
    assert_eq!(stripped.rows[0][0], Value::Utf8("Ada".to_string()));
}

#[test]
fn schema_selects_and_types_columns() {
    let opts = FormatOptions {
        schema: Some(Schema::new(vec![Field::new("amount", DataType::Float64)])),
        ..Default::default()
    };
    let ds = ingest_custom_txt_from_str("id*endf*amount*endr*1*endf*2*endr*", &opts).unwrap();
    assert_eq!(ds.column_names(), vec!["amount"]);
    assert_eq!(ds.rows[0][0], Value::Float64(2.0));
}

#[test]
fn empty_separator_is_a_configuration_error() {
    let opts = FormatOptions {
        column_separator: Some(String::new()),
        ..Default::default()
    };
    let err = ingest_custom_txt_from_str("a", &opts).unwrap_err();
    assert!(matches!(err, LoadError::Configuration { .. }));
}

#[test]
fn answers_to_txt_alias() {
    let handler = CustomTxtHandler::new();
    assert!(handler.answers_to("TXT"));
    assert!(handler.can_handle("data.bin", Some("custom_txt")));
    assert!(!handler.can_handle("notes.txt", Some("csv")));
}
