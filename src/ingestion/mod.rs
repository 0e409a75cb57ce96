//! Format handlers and the registry that dispatches between them.
//!
//! A [`FormatHandler`] declares a name, the extensions it accepts and a capability probe
//! ([`FormatHandler::can_handle`]); it parses one file into a [`crate::types::DataSet`].
//! Handlers are collected in a [`FormatRegistry`], which picks exactly one handler per source
//! by priority, or by explicit name when a format override is given.
//!
//! Built-in handlers:
//! - [`csv::CsvHandler`] (`.csv`)
//! - [`parquet::ParquetHandler`] (`.parquet`, `.pqt`, `.pq`)
//! - [`json::JsonHandler`] (`.json`, `.ndjson`)
//! - [`custom_txt::CustomTxtHandler`] (`.txt` with custom column/row separators)
//! - `excel::ExcelHandler` (feature `excel`)

pub mod csv;
pub mod custom_txt;
#[cfg(feature = "excel")]
pub mod excel;
pub mod json;
pub mod parquet;
pub mod registry;
mod text;

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{LoadError, LoadResult};
use crate::types::{DataSet, Schema};

pub use registry::{default_registry, install_default_registry, FormatRegistry};

/// Options understood by the built-in handlers.
///
/// The same type carries per-format defaults (the `formats:` configuration section) and per-call
/// overrides. Fields a handler does not understand are ignored by it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Parse into this schema instead of deriving one from the file.
    pub schema: Option<Schema>,
    /// Keep only these columns, in this order.
    pub columns: Option<Vec<String>>,
    /// CSV field delimiter (ASCII only). Default `,`.
    pub delimiter: Option<char>,
    /// Whether the first row holds column names. Default `true`.
    pub has_header: Option<bool>,
    /// Custom TXT column separator. Default `*endf*`.
    pub column_separator: Option<String>,
    /// Custom TXT row separator. Default `*endr*`.
    pub row_separator: Option<String>,
    /// Custom TXT: trim whitespace around values. Default `true`.
    pub strip_whitespace: Option<bool>,
    /// Excel sheet name. Default: the first sheet.
    pub sheet: Option<String>,
}

impl FormatOptions {
    /// Field-by-field merge: values set on `self` win, the rest fall back to `defaults`.
    pub fn or(&self, defaults: &FormatOptions) -> FormatOptions {
        FormatOptions {
            schema: self.schema.clone().or_else(|| defaults.schema.clone()),
            columns: self.columns.clone().or_else(|| defaults.columns.clone()),
            delimiter: self.delimiter.or(defaults.delimiter),
            has_header: self.has_header.or(defaults.has_header),
            column_separator: self
                .column_separator
                .clone()
                .or_else(|| defaults.column_separator.clone()),
            row_separator: self
                .row_separator
                .clone()
                .or_else(|| defaults.row_separator.clone()),
            strip_whitespace: self.strip_whitespace.or(defaults.strip_whitespace),
            sheet: self.sheet.clone().or_else(|| defaults.sheet.clone()),
        }
    }
}

/// Capability interface every file format implements.
///
/// Implementors must be shareable across threads: a registry is built once and then only read.
pub trait FormatHandler: Send + Sync + fmt::Debug {
    /// Registry identity, lowercase (e.g. `csv`, `custom_txt`).
    fn name(&self) -> &str;

    /// Extra names accepted as a format hint.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Supported extensions, lowercase with a leading dot.
    fn supported_extensions(&self) -> &[&str];

    /// Capability probe.
    ///
    /// When `format_hint` is given it decides alone: the hint must name this handler (or one of
    /// its aliases). Otherwise the extension of `source` is matched case-insensitively against
    /// [`Self::supported_extensions`]. Handlers may override this with content sniffing.
    fn can_handle(&self, source: &str, format_hint: Option<&str>) -> bool {
        match format_hint {
            Some(hint) => self.answers_to(hint),
            None => has_extension(source, self.supported_extensions()),
        }
    }

    /// Parse the whole file into a dataset.
    fn load(&self, path: &Path, options: &FormatOptions) -> LoadResult<DataSet>;

    /// `true` if `name` is this handler's name or one of its aliases (case-insensitive).
    fn answers_to(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
            || self.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Case-insensitive extension check; `extensions` carry a leading dot.
pub fn has_extension(source: &str, extensions: &[&str]) -> bool {
    let Some(ext) = Path::new(source).extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

fn finish(ds: DataSet, options: &FormatOptions) -> LoadResult<DataSet> {
    match &options.columns {
        Some(columns) => ds.project(columns),
        None => Ok(ds),
    }
}

fn ascii_delimiter(c: char) -> LoadResult<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| LoadError::config(format!("delimiter must be a single ASCII character, got {c:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_extension("data/Report.CSV", &[".csv"]));
        assert!(has_extension("x.pQt", &[".parquet", ".pqt"]));
        assert!(!has_extension("x.csv.gz", &[".csv"]));
        assert!(!has_extension("no_extension", &[".csv"]));
    }

    #[test]
    fn options_merge_prefers_call_values() {
        let defaults = FormatOptions {
            delimiter: Some(';'),
            has_header: Some(false),
            ..Default::default()
        };
        let call = FormatOptions {
            delimiter: Some('\t'),
            ..Default::default()
        };
        let merged = call.or(&defaults);
        assert_eq!(merged.delimiter, Some('\t'));
        assert_eq!(merged.has_header, Some(false));
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        assert_eq!(ascii_delimiter(';').unwrap(), b';');
        assert!(ascii_delimiter('§').is_err());
    }
}
