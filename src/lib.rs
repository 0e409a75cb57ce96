//! `rust-data-loader` loads tabular files from a base directory into an in-memory
//! [`types::DataSet`].
//!
//! A source is either a literal path or a glob-like pattern (`*`, `?`, in any path segment).
//! Patterns are resolved against the base directory, never outside it, and reduced to the files
//! to load by a [`select::MatchStrategy`]. Each file is parsed by the handler a
//! [`ingestion::FormatRegistry`] picks for it, and multi-file results are concatenated in
//! lexicographic order.
//!
//! ## Formats
//!
//! | handler      | extensions                                | priority |
//! |--------------|-------------------------------------------|----------|
//! | `csv`        | `.csv`                                    | 10       |
//! | `parquet`    | `.parquet`, `.pqt`, `.pq`                 | 8        |
//! | `json`       | `.json`, `.ndjson`                        | 7        |
//! | `excel`      | `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods` | 6 (Cargo feature `excel`) |
//! | `custom_txt` | `.txt`                                    | 5        |
//!
//! Without an explicit schema, handlers derive column names from the file and infer
//! [`types::DataType::Int64`], [`types::DataType::Float64`], [`types::DataType::Bool`] or
//! [`types::DataType::Utf8`] per column. Empty cells map to [`types::Value::Null`].
//!
//! ## Quick example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use rust_data_loader::ingestion::FormatRegistry;
//! use rust_data_loader::loader::{DataLoader, GetDataOptions};
//! use rust_data_loader::select::MatchStrategy;
//!
//! # fn main() -> Result<(), rust_data_loader::LoadError> {
//! let registry = Arc::new(FormatRegistry::with_builtin_handlers(&BTreeMap::new()));
//! let loader = DataLoader::new("/data", registry)?;
//!
//! // data_2024-01-15.csv and data_2024-01-16.csv, stacked in that order.
//! let opts = GetDataOptions::default().with_match_strategy(MatchStrategy::All);
//! let ds = loader.get_data("data_*.csv", &opts)?;
//! println!("rows={}", ds.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration-driven loading
//!
//! ```no_run
//! use rust_data_loader::config::LoaderConfig;
//! use rust_data_loader::loader::DataLoader;
//!
//! # fn main() -> Result<(), rust_data_loader::LoadError> {
//! // Searches $DATA_LOADER_CONFIG_PATH, ./config/data_config.yaml, ./data_config.yaml, ...
//! let config = LoaderConfig::load(None)?;
//! let loader = DataLoader::from_config(&config)?;
//! let daily = loader.load_source("daily")?;
//! println!("rows={}", daily.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`resolve`]: pattern expansion with base-directory containment
//! - [`select`]: match strategies (`first`, `latest`, `all`)
//! - [`ingestion`]: format handlers and the priority registry
//! - [`loader`]: the load pipeline
//! - [`config`]: YAML configuration, discovery and environment overrides
//! - [`observability`]: observer hooks for load outcomes
//! - [`types`]: schema and dataset types
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod ingestion;
pub mod loader;
pub mod observability;
pub mod resolve;
pub mod select;
pub mod types;

pub use error::{LoadError, LoadResult};
