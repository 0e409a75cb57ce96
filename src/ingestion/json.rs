//! JSON handler.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! With a schema, nested fields are addressed by dot paths (e.g. `user.name`). Without one, the
//! columns are the union of top-level keys (sorted), with types inferred from the values.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::{finish, FormatHandler, FormatOptions};

/// Handler for `.json` and `.ndjson` files.
#[derive(Debug, Clone, Default)]
pub struct JsonHandler {
    defaults: FormatOptions,
}

impl JsonHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: FormatOptions) -> Self {
        Self { defaults }
    }
}

impl FormatHandler for JsonHandler {
    fn name(&self) -> &str {
        "json"
    }

    fn aliases(&self) -> &[&str] {
        &["ndjson"]
    }

    fn supported_extensions(&self) -> &[&str] {
        &[".json", ".ndjson"]
    }

    fn load(&self, path: &Path, options: &FormatOptions) -> LoadResult<DataSet> {
        let opts = options.or(&self.defaults);
        let ds = ingest_json_from_path(path, opts.schema.as_ref())?;
        finish(ds, &opts)
    }
}

/// Ingest a JSON file into a [`DataSet`].
pub fn ingest_json_from_path(path: impl AsRef<Path>, schema: Option<&Schema>) -> LoadResult<DataSet> {
    let text = fs::read_to_string(path)?;
    ingest_json_from_str(&text, schema)
}

/// Ingest JSON from an in-memory string into a [`DataSet`].
pub fn ingest_json_from_str(input: &str, schema: Option<&Schema>) -> LoadResult<DataSet> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LoadError::schema("json input is empty"));
    }

    // First try parsing as a single JSON value (array or object).
    let values = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(v @ serde_json::Value::Object(_)) => vec![v],
        Ok(_) => {
            return Err(LoadError::schema(
                "json must be an object, an array of objects, or NDJSON",
            ));
        }
        Err(e) if !trimmed.contains('\n') => return Err(LoadError::Json(e)),
        Err(_) => {
            // Fall back to NDJSON.
            let mut values = Vec::new();
            for (i, line) in trimmed.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
                    LoadError::schema(format!("invalid ndjson at line {}: {}", i + 1, e))
                })?;
                values.push(v);
            }
            values
        }
    };

    match schema {
        Some(schema) => ingest_json_values(&values, schema, false),
        None => {
            let derived = derive_schema(&values)?;
            ingest_json_values(&values, &derived, true)
        }
    }
}

fn derive_schema(values: &[serde_json::Value]) -> LoadResult<Schema> {
    let mut keys = BTreeSet::new();
    for (idx0, v) in values.iter().enumerate() {
        let obj = v.as_object().ok_or_else(|| {
            LoadError::schema(format!("row {} is not a json object", idx0 + 1))
        })?;
        keys.extend(obj.keys().cloned());
    }

    let fields = keys
        .into_iter()
        .map(|key| {
            let column = values.iter().filter_map(|v| v.get(&key));
            let data_type = infer_json_type(column);
            Field::new(key, data_type)
        })
        .collect();
    Ok(Schema::new(fields))
}

fn infer_json_type<'a>(values: impl Iterator<Item = &'a serde_json::Value>) -> DataType {
    let mut seen = false;
    let (mut int, mut float, mut boolean) = (true, true, true);
    for v in values.filter(|v| !v.is_null()) {
        seen = true;
        int &= v.as_i64().is_some();
        float &= v.is_number();
        boolean &= v.is_boolean();
    }
    match (seen, int, float, boolean) {
        (false, ..) => DataType::Utf8,
        (true, true, _, _) => DataType::Int64,
        (true, _, true, _) => DataType::Float64,
        (true, _, _, true) => DataType::Bool,
        _ => DataType::Utf8,
    }
}

fn ingest_json_values(
    values: &[serde_json::Value],
    schema: &Schema,
    derived: bool,
) -> LoadResult<DataSet> {
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(values.len());

    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = v
            .as_object()
            .ok_or_else(|| LoadError::schema(format!("row {row_num} is not a json object")))?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let jv = if derived {
                obj.get(&field.name)
            } else {
                get_by_dot_path(obj, &field.name)
            };
            match jv {
                Some(jv) => row.push(convert_json_value(row_num, field, jv, derived)?),
                None if derived => row.push(Value::Null),
                None => {
                    return Err(LoadError::schema(format!(
                        "row {row_num} missing required field '{}'",
                        field.name
                    )));
                }
            }
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

fn get_by_dot_path<'a>(
    root: &'a serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        match current {
            serde_json::Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn convert_json_value(
    row: usize,
    field: &Field,
    v: &serde_json::Value,
    text_fallback: bool,
) -> LoadResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = |message: &str| LoadError::ParseError {
        row,
        column: field.name.clone(),
        raw: v.to_string(),
        message: message.to_string(),
    };

    match field.data_type {
        DataType::Utf8 => match v.as_str() {
            Some(s) => Ok(Value::Utf8(s.to_string())),
            None if text_fallback => Ok(Value::Utf8(v.to_string())),
            None => Err(mismatch("expected string")),
        },
        DataType::Bool => v.as_bool().map(Value::Bool).ok_or_else(|| mismatch("expected bool")),
        DataType::Int64 => {
            if let Some(n) = v.as_i64() {
                Ok(Value::Int64(n))
            } else if v.as_u64().is_some() {
                Err(mismatch("u64 out of range for i64"))
            } else {
                Err(mismatch("expected integer number"))
            }
        }
        DataType::Float64 => v.as_f64().map(Value::Float64).ok_or_else(|| mismatch("expected number")),
    }
}
