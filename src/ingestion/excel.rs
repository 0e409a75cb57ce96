#![cfg(feature = "excel")]

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{LoadError, LoadResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::text::parse_bool;
use super::{finish, FormatHandler, FormatOptions};

/// Handler for spreadsheet workbooks (`.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`).
#[derive(Debug, Clone, Default)]
pub struct ExcelHandler {
    defaults: FormatOptions,
}

impl ExcelHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: FormatOptions) -> Self {
        Self { defaults }
    }
}

impl FormatHandler for ExcelHandler {
    fn name(&self) -> &str {
        "excel"
    }

    fn aliases(&self) -> &[&str] {
        &["xlsx"]
    }

    fn supported_extensions(&self) -> &[&str] {
        &[".xlsx", ".xls", ".xlsm", ".xlsb", ".ods"]
    }

    fn load(&self, path: &Path, options: &FormatOptions) -> LoadResult<DataSet> {
        let opts = options.or(&self.defaults);
        let ds = ingest_excel_from_path(path, opts.sheet.as_deref(), opts.schema.as_ref())?;
        finish(ds, &opts)
    }
}

/// Ingest one sheet of a workbook into an in-memory `DataSet`.
///
/// Behavior:
/// - Picks `sheet_name` if provided; otherwise uses the first sheet in the workbook
/// - Detects the first non-empty row as the header row
/// - With a schema, validates that all schema fields exist as headers; without one, derives
///   column types from the cells
/// - Reads remaining rows and converts cells into typed `Value`s
pub fn ingest_excel_from_path(
    path: impl AsRef<Path>,
    sheet_name: Option<&str>,
    schema: Option<&Schema>,
) -> LoadResult<DataSet> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| LoadError::schema("workbook has no sheets"))?,
    };

    let range = workbook.worksheet_range(&sheet)?;
    ingest_sheet_range(&sheet, &range, schema).map_err(|e| wrap_schema_err_with_sheet(&sheet, e))
}

fn ingest_sheet_range(
    sheet: &str,
    range: &calamine::Range<Data>,
    schema: Option<&Schema>,
) -> LoadResult<DataSet> {
    let (header_row_idx, header_cells) = find_header_row(range)?;

    let (schema, col_idxs) = match schema {
        Some(schema) => {
            // Build a projection of schema field -> column index by searching header_cells.
            let mut col_idxs: Vec<usize> = Vec::with_capacity(schema.fields.len());
            for f in &schema.fields {
                match header_cells.iter().position(|h| h.trim() == f.name) {
                    Some(idx) => col_idxs.push(idx),
                    None => {
                        return Err(LoadError::schema(format!(
                            "missing required column '{}'. headers={:?}",
                            f.name, header_cells
                        )));
                    }
                }
            }
            (schema.clone(), col_idxs)
        }
        None => {
            let fields = header_cells
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let cells = range
                        .rows()
                        .skip(header_row_idx + 1)
                        .map(|row| row.get(idx).unwrap_or(&Data::Empty));
                    Field::new(name.trim(), infer_cell_type(cells))
                })
                .collect();
            (Schema::new(fields), (0..header_cells.len()).collect())
        }
    };

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row) in range.rows().enumerate().skip(header_row_idx + 1) {
        // Report 1-based row number (Excel-like).
        let user_row = idx0 + 1;

        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &col_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let cell = row.get(col_idx).unwrap_or(&Data::Empty);
            let col_label = format!("{sheet}:{name}", name = field.name);
            out_row.push(convert_cell(user_row, &col_label, field.data_type, cell)?);
        }
        rows.push(out_row);
    }

    Ok(DataSet::new(schema, rows))
}

fn wrap_schema_err_with_sheet(sheet: &str, err: LoadError) -> LoadError {
    match err {
        LoadError::SchemaMismatch { message } => LoadError::SchemaMismatch {
            message: format!("sheet '{sheet}': {message}"),
        },
        other => other,
    }
}

fn find_header_row(range: &calamine::Range<Data>) -> LoadResult<(usize, Vec<String>)> {
    range
        .rows()
        .enumerate()
        .find(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|(idx0, row)| (idx0, row.iter().map(cell_to_header_string).collect()))
        .ok_or_else(|| LoadError::schema("sheet has no non-empty rows (no header row found)"))
}

fn infer_cell_type<'a>(cells: impl Iterator<Item = &'a Data>) -> DataType {
    let mut seen = false;
    let (mut int, mut float, mut boolean) = (true, true, true);
    for c in cells.filter(|c| !matches!(c, Data::Empty)) {
        seen = true;
        int &= matches!(c, Data::Int(_)) || matches!(c, Data::Float(f) if f.fract() == 0.0);
        float &= matches!(c, Data::Int(_) | Data::Float(_));
        boolean &= matches!(c, Data::Bool(_));
    }
    match (seen, int, float, boolean) {
        (false, ..) => DataType::Utf8,
        (true, true, _, _) => DataType::Int64,
        (true, _, true, _) => DataType::Float64,
        (true, _, _, true) => DataType::Bool,
        _ => DataType::Utf8,
    }
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => "".to_string(),
    }
}

fn convert_cell(row: usize, column: &str, data_type: DataType, c: &Data) -> LoadResult<Value> {
    if matches!(c, Data::Empty) {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(cell_to_string(c))),
        DataType::Bool => parse_bool_cell(row, column, c).map(Value::Bool),
        DataType::Int64 => parse_i64_cell(row, column, c).map(Value::Int64),
        DataType::Float64 => parse_f64_cell(row, column, c).map(Value::Float64),
    }
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        _ => c.to_string(),
    }
}

fn cell_error(row: usize, column: &str, raw: String, message: impl Into<String>) -> LoadError {
    LoadError::ParseError {
        row,
        column: column.to_string(),
        raw,
        message: message.into(),
    }
}

fn parse_bool_cell(row: usize, column: &str, c: &Data) -> LoadResult<bool> {
    match c {
        Data::Bool(b) => Ok(*b),
        Data::Int(i) => Ok(*i != 0),
        Data::Float(f) => Ok(*f != 0.0),
        Data::String(s) => parse_bool(s).map_err(|message| cell_error(row, column, s.clone(), message)),
        _ => Err(cell_error(row, column, c.to_string(), "expected bool")),
    }
}

fn parse_i64_cell(row: usize, column: &str, c: &Data) -> LoadResult<i64> {
    match c {
        Data::Int(i) => Ok(*i),
        Data::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        Data::Float(_) => Err(cell_error(
            row,
            column,
            c.to_string(),
            "expected integer (got non-integer float)",
        )),
        Data::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| cell_error(row, column, s.clone(), e.to_string())),
        _ => Err(cell_error(row, column, c.to_string(), "expected integer")),
    }
}

fn parse_f64_cell(row: usize, column: &str, c: &Data) -> LoadResult<f64> {
    match c {
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| cell_error(row, column, s.clone(), e.to_string())),
        _ => Err(cell_error(row, column, c.to_string(), "expected number")),
    }
}
