//! Handler for text files with custom column and row separators.
//!
//! Example input with the default separators:
//!
//! ```text
//! id*endf*name*endr*1*endf*Ada*endr*2*endf*Grace*endr*
//! ```

use std::fs;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::types::DataSet;

use super::text::{generated_headers, grid_to_dataset, TextGrid};
use super::{finish, FormatHandler, FormatOptions};

pub const DEFAULT_COLUMN_SEPARATOR: &str = "*endf*";
pub const DEFAULT_ROW_SEPARATOR: &str = "*endr*";

/// Handler for `.txt` files; also answers to the `txt` hint.
#[derive(Debug, Clone, Default)]
pub struct CustomTxtHandler {
    defaults: FormatOptions,
}

impl CustomTxtHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: FormatOptions) -> Self {
        Self { defaults }
    }
}

impl FormatHandler for CustomTxtHandler {
    fn name(&self) -> &str {
        "custom_txt"
    }

    fn aliases(&self) -> &[&str] {
        &["txt"]
    }

    fn supported_extensions(&self) -> &[&str] {
        &[".txt"]
    }

    fn load(&self, path: &Path, options: &FormatOptions) -> LoadResult<DataSet> {
        let opts = options.or(&self.defaults);
        let content = fs::read_to_string(path)?;
        let ds = ingest_custom_txt_from_str(&content, &opts)?;
        finish(ds, &opts)
    }
}

/// Split `input` into rows and columns and build a dataset.
///
/// Blank rows are skipped. Data rows are padded with empty values or truncated to the header
/// width. Empty input yields an empty dataset.
pub fn ingest_custom_txt_from_str(input: &str, options: &FormatOptions) -> LoadResult<DataSet> {
    let col_sep = options
        .column_separator
        .as_deref()
        .unwrap_or(DEFAULT_COLUMN_SEPARATOR);
    let row_sep = options.row_separator.as_deref().unwrap_or(DEFAULT_ROW_SEPARATOR);
    if col_sep.is_empty() || row_sep.is_empty() {
        return Err(LoadError::config("custom_txt separators must not be empty"));
    }
    let has_header = options.has_header.unwrap_or(true);
    let strip = options.strip_whitespace.unwrap_or(true);

    let mut parsed: Vec<Vec<String>> = input
        .split(row_sep)
        .filter(|row| !row.trim().is_empty())
        .map(|row| {
            row.split(col_sep)
                .map(|c| {
                    let c = if strip { c.trim() } else { c };
                    c.to_owned()
                })
                .collect()
        })
        .collect();

    if parsed.is_empty() {
        return match options.schema.as_ref() {
            Some(schema) => Ok(DataSet::new(schema.clone(), Vec::new())),
            None => Ok(DataSet::empty()),
        };
    }

    let headers = if has_header {
        parsed.remove(0)
    } else {
        generated_headers(parsed[0].len())
    };

    let width = headers.len();
    for row in &mut parsed {
        row.resize(width, String::new());
    }

    let grid = TextGrid {
        headers,
        rows: parsed,
        first_row_number: if has_header { 2 } else { 1 },
        keep_whitespace: !strip,
    };
    grid_to_dataset(grid, options.schema.as_ref())
}
