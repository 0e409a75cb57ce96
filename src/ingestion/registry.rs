//! Priority-ordered registry of [`FormatHandler`]s.
//!
//! Dispatch order is priority descending, then registration order ascending. A format override
//! bypasses priorities: it selects the handler registered under that name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{LoadError, LoadResult};

use super::csv::CsvHandler;
use super::custom_txt::CustomTxtHandler;
use super::json::JsonHandler;
use super::parquet::ParquetHandler;
use super::{FormatHandler, FormatOptions};

pub const CSV_PRIORITY: i32 = 10;
pub const PARQUET_PRIORITY: i32 = 8;
pub const JSON_PRIORITY: i32 = 7;
pub const EXCEL_PRIORITY: i32 = 6;
pub const CUSTOM_TXT_PRIORITY: i32 = 5;

#[derive(Clone)]
struct RegistryEntry {
    handler: Arc<dyn FormatHandler>,
    priority: i32,
    /// Position of the first registration under this name.
    seq: u64,
}

/// Ordered collection of format handlers.
///
/// Built once, then read: [`FormatRegistry::get_handler`] is a pure function of the registered
/// state, so independent registries can coexist.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    entries: Vec<RegistryEntry>,
    next_seq: u64,
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|e| (e.handler.name().to_string(), e.priority)),
            )
            .finish()
    }
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in handler at its default priority.
    ///
    /// `formats` maps a handler name (e.g. `csv`) to that handler's default options.
    pub fn with_builtin_handlers(formats: &BTreeMap<String, FormatOptions>) -> Self {
        let defaults = |name: &str| formats.get(name).cloned().unwrap_or_default();

        let mut registry = Self::new();
        registry.register(Arc::new(CsvHandler::with_defaults(defaults("csv"))), CSV_PRIORITY);
        registry.register(
            Arc::new(ParquetHandler::with_defaults(defaults("parquet"))),
            PARQUET_PRIORITY,
        );
        registry.register(Arc::new(JsonHandler::with_defaults(defaults("json"))), JSON_PRIORITY);
        #[cfg(feature = "excel")]
        registry.register(
            Arc::new(super::excel::ExcelHandler::with_defaults(defaults("excel"))),
            EXCEL_PRIORITY,
        );
        registry.register(
            Arc::new(CustomTxtHandler::with_defaults(defaults("custom_txt"))),
            CUSTOM_TXT_PRIORITY,
        );
        registry
    }

    /// Insert a handler, or replace the one registered under the same name.
    ///
    /// Re-registering a name keeps its original registration position; only the handler and
    /// priority change.
    pub fn register(&mut self, handler: Arc<dyn FormatHandler>, priority: i32) {
        let name = handler.name().to_ascii_lowercase();
        match self
            .entries
            .iter_mut()
            .find(|e| e.handler.name().eq_ignore_ascii_case(&name))
        {
            Some(entry) => {
                entry.handler = handler;
                entry.priority = priority;
            }
            None => {
                self.entries.push(RegistryEntry {
                    handler,
                    priority,
                    seq: self.next_seq,
                });
                self.next_seq += 1;
            }
        }

        self.entries
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        tracing::debug!(format = %name, priority, "registered format handler");
    }

    /// Pick the handler for `source`.
    ///
    /// - With `format_override`: the handler registered under that name; failing that, the first
    ///   handler whose probe accepts the name as a hint (aliases such as `txt`). Otherwise
    ///   [`LoadError::UnknownFormat`].
    /// - Without: the first handler in dispatch order whose probe accepts `source`, or
    ///   [`LoadError::UnsupportedFormat`].
    pub fn get_handler(
        &self,
        source: &str,
        format_override: Option<&str>,
    ) -> LoadResult<Arc<dyn FormatHandler>> {
        if let Some(name) = format_override {
            let found = self
                .entries
                .iter()
                .find(|e| e.handler.name().eq_ignore_ascii_case(name))
                .or_else(|| {
                    self.entries
                        .iter()
                        .find(|e| e.handler.can_handle(source, Some(name)))
                });
            return match found {
                Some(entry) => {
                    tracing::debug!(source, format = entry.handler.name(), "format override");
                    Ok(Arc::clone(&entry.handler))
                }
                None => Err(LoadError::UnknownFormat {
                    name: name.to_string(),
                    available: self.list_supported_formats(),
                }),
            };
        }

        match self.entries.iter().find(|e| e.handler.can_handle(source, None)) {
            Some(entry) => {
                tracing::debug!(source, format = entry.handler.name(), "format dispatched");
                Ok(Arc::clone(&entry.handler))
            }
            None => Err(LoadError::UnsupportedFormat {
                source_name: source.to_string(),
                available: self.list_supported_formats(),
            }),
        }
    }

    /// Registered handler names, in dispatch order.
    pub fn list_supported_formats(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.handler.name().to_string())
            .collect()
    }

    /// Every declared extension, deduplicated, in dispatch order.
    pub fn list_supported_extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for entry in &self.entries {
            for ext in entry.handler.supported_extensions() {
                let ext = ext.to_ascii_lowercase();
                if !out.contains(&ext) {
                    out.push(ext);
                }
            }
        }
        out
    }

    /// Priority of the handler registered under `name`.
    pub fn priority_of(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|e| e.handler.name().eq_ignore_ascii_case(name))
            .map(|e| e.priority)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every handler.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }
}

static DEFAULT_REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();

/// Install the process-wide default registry.
///
/// Succeeds exactly once; later calls hand the rejected registry back.
pub fn install_default_registry(registry: FormatRegistry) -> Result<(), FormatRegistry> {
    DEFAULT_REGISTRY.set(registry)
}

/// The process-wide default registry, if [`install_default_registry`] has been called.
pub fn default_registry() -> LoadResult<&'static FormatRegistry> {
    DEFAULT_REGISTRY.get().ok_or_else(|| {
        LoadError::config("default format registry has not been installed")
    })
}
