//! CSV handler.

use std::path::Path;

use crate::error::LoadResult;
use crate::types::{DataSet, Schema};

use super::text::{generated_headers, grid_to_dataset, TextGrid};
use super::{ascii_delimiter, finish, FormatHandler, FormatOptions};

/// Handler for comma-separated (or custom-delimited) files.
#[derive(Debug, Clone, Default)]
pub struct CsvHandler {
    defaults: FormatOptions,
}

impl CsvHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler whose unset per-call options fall back to `defaults`.
    pub fn with_defaults(defaults: FormatOptions) -> Self {
        Self { defaults }
    }
}

impl FormatHandler for CsvHandler {
    fn name(&self) -> &str {
        "csv"
    }

    fn supported_extensions(&self) -> &[&str] {
        &[".csv"]
    }

    fn load(&self, path: &Path, options: &FormatOptions) -> LoadResult<DataSet> {
        let opts = options.or(&self.defaults);
        let delimiter = ascii_delimiter(opts.delimiter.unwrap_or(','))?;
        let has_header = opts.has_header.unwrap_or(true);

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(has_header)
            .delimiter(delimiter)
            .from_path(path)?;
        let ds = ingest_csv_from_reader(&mut rdr, opts.schema.as_ref())?;
        finish(ds, &opts)
    }
}

/// Ingest a CSV file with headers, using `,` as the delimiter.
///
/// Rules:
///
/// - With a schema, headers must contain all schema fields (order can differ) and each value is
///   parsed according to its field type.
/// - Without a schema, every header becomes a column and types are inferred.
pub fn ingest_csv_from_path(path: impl AsRef<Path>, schema: Option<&Schema>) -> LoadResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    ingest_csv_from_reader(&mut rdr, schema)
}

/// Ingest CSV data from an existing CSV reader.
///
/// A reader built with `has_headers(false)` gets `column_1..n` names.
pub fn ingest_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    schema: Option<&Schema>,
) -> LoadResult<DataSet> {
    let has_headers = rdr.has_headers();
    let headers: Vec<String> = if has_headers {
        rdr.headers()?.iter().map(str::to_owned).collect()
    } else {
        Vec::new()
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_owned).collect());
    }

    let headers = if has_headers {
        headers
    } else {
        generated_headers(rows.iter().map(Vec::len).max().unwrap_or(0))
    };

    let grid = TextGrid {
        headers,
        rows,
        // Report 1-based row numbers; the header occupies row 1 when present.
        first_row_number: if has_headers { 2 } else { 1 },
        keep_whitespace: false,
    };
    grid_to_dataset(grid, schema)
}
