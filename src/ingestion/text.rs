//! Shared helpers for text-based formats (CSV, custom TXT).
//!
//! Handlers first split a file into a [`TextGrid`] of raw strings; [`grid_to_dataset`] then
//! either parses it into a caller-provided schema or derives one by type inference.

use crate::error::{LoadError, LoadResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Raw header + rows, before typing.
#[derive(Debug, Default)]
pub(crate) struct TextGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based row number of `rows[0]` as the user sees it in the file.
    pub first_row_number: usize,
    /// Keep surrounding whitespace in `Utf8` values. Typed values are always trimmed.
    pub keep_whitespace: bool,
}

/// Synthetic column names for header-less input: `column_1`, `column_2`, ...
pub(crate) fn generated_headers(width: usize) -> Vec<String> {
    (1..=width).map(|i| format!("column_{i}")).collect()
}

pub(crate) fn grid_to_dataset(grid: TextGrid, schema: Option<&Schema>) -> LoadResult<DataSet> {
    let (schema, col_idxs) = match schema {
        Some(schema) => {
            // Map schema fields -> grid column indexes (allows re-ordered columns).
            let mut col_idxs = Vec::with_capacity(schema.fields.len());
            for field in &schema.fields {
                match grid.headers.iter().position(|h| h == &field.name) {
                    Some(idx) => col_idxs.push(idx),
                    None => {
                        return Err(LoadError::schema(format!(
                            "missing required column '{}'. headers={:?}",
                            field.name, grid.headers
                        )));
                    }
                }
            }
            (schema.clone(), col_idxs)
        }
        None => {
            let fields = grid
                .headers
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let column = grid.rows.iter().map(|row| cell(row, idx));
                    Field::new(name.clone(), infer_data_type(column))
                })
                .collect();
            (Schema::new(fields), (0..grid.headers.len()).collect())
        }
    };

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(grid.rows.len());
    for (idx0, raw_row) in grid.rows.iter().enumerate() {
        let user_row = grid.first_row_number + idx0;
        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &col) in schema.fields.iter().zip(col_idxs.iter()) {
            row.push(parse_typed_value(
                user_row,
                &field.name,
                field.data_type,
                cell(raw_row, col),
                grid.keep_whitespace,
            )?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema, rows))
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

/// Narrowest type every non-empty value parses as; `Utf8` when nothing is known.
pub(crate) fn infer_data_type<'a>(values: impl Iterator<Item = &'a str>) -> DataType {
    let mut seen = false;
    let (mut int, mut float, mut boolean) = (true, true, true);
    for raw in values {
        let v = raw.trim();
        if v.is_empty() {
            continue;
        }
        seen = true;
        int &= v.parse::<i64>().is_ok();
        float &= v.parse::<f64>().is_ok();
        boolean &= v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false");
        if !(int || float || boolean) {
            return DataType::Utf8;
        }
    }

    match (seen, int, float, boolean) {
        (false, ..) => DataType::Utf8,
        (true, true, _, _) => DataType::Int64,
        (true, _, true, _) => DataType::Float64,
        (true, _, _, true) => DataType::Bool,
        _ => DataType::Utf8,
    }
}

pub(crate) fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: DataType,
    raw: &str,
    keep_whitespace: bool,
) -> LoadResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 if keep_whitespace => Ok(Value::Utf8(raw.to_owned())),
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed.parse::<i64>().map(Value::Int64).map_err(|e| {
            LoadError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Float64 => trimmed.parse::<f64>().map(Value::Float64).map_err(|e| {
            LoadError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool).map_err(|message| {
            LoadError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message,
            }
        }),
    }
}

pub(crate) fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_picks_narrowest_type() {
        assert_eq!(infer_data_type(["1", "", "-3"].into_iter()), DataType::Int64);
        assert_eq!(infer_data_type(["1", "2.5"].into_iter()), DataType::Float64);
        assert_eq!(infer_data_type(["TRUE", "false"].into_iter()), DataType::Bool);
        assert_eq!(infer_data_type(["1", "x"].into_iter()), DataType::Utf8);
        assert_eq!(infer_data_type(["", " "].into_iter()), DataType::Utf8);
    }

    #[test]
    fn derived_schema_parses_rows_and_nulls() {
        let grid = TextGrid {
            headers: vec!["id".into(), "name".into()],
            rows: vec![vec!["1".into(), "Ada".into()], vec!["2".into()]],
            first_row_number: 2,
            keep_whitespace: false,
        };
        let ds = grid_to_dataset(grid, None).unwrap();
        assert_eq!(ds.schema.fields[0].data_type, DataType::Int64);
        assert_eq!(ds.rows[1], vec![Value::Int64(2), Value::Null]);
    }

    #[test]
    fn parse_error_reports_user_row() {
        let grid = TextGrid {
            headers: vec!["id".into()],
            rows: vec![vec!["1".into()], vec!["oops".into()]],
            first_row_number: 2,
            keep_whitespace: false,
        };
        let schema = Schema::new(vec![Field::new("id", DataType::Int64)]);
        let err = grid_to_dataset(grid, Some(&schema)).unwrap_err();
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn kept_whitespace_applies_to_text_only() {
        let grid = TextGrid {
            headers: vec!["id".into(), "name".into()],
            rows: vec![vec![" 7 ".into(), "  Ada ".into()], vec!["8".into(), "   ".into()]],
            first_row_number: 2,
            keep_whitespace: true,
        };
        let ds = grid_to_dataset(grid, None).unwrap();
        assert_eq!(ds.rows[0], vec![Value::Int64(7), Value::Utf8("  Ada ".into())]);
        assert_eq!(ds.rows[1][1], Value::Null);
    }
}
