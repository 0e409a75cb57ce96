//! Loader orchestration.
//!
//! [`DataLoader::get_data`] runs one load end to end:
//!
//! 1. validation (optional): the literal path exists and is readable, or the pattern matches
//! 2. resolution: pattern expansion plus match selection, or the literal path alone
//! 3. dispatch: the registry picks one handler per selected file
//! 4. parsing: each file is loaded in selection order (optionally on the rayon pool)
//! 5. concatenation: parts are stacked in selection order
//!
//! Any failure aborts the whole call; a multi-file load never returns a partial dataset.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::config::{LoadDefaults, LoaderConfig, SourceSpec};
use crate::error::{LoadError, LoadResult};
use crate::ingestion::{FormatHandler, FormatOptions, FormatRegistry};
use crate::observability::{LoadContext, LoadObserver, LoadSeverity, LoadStats};
use crate::resolve::{canonical_base, is_pattern, resolve_literal, resolve_pattern, ResolvedPath};
use crate::select::{select, MatchStrategy};
use crate::types::DataSet;

/// Per-call options for [`DataLoader::get_data`].
///
/// Use [`Default`] for common cases: auto-detected format, `first` match, validation on.
#[derive(Debug, Clone, PartialEq)]
pub struct GetDataOptions {
    /// Explicit format name; bypasses extension-based dispatch.
    pub format: Option<String>,
    pub match_strategy: MatchStrategy,
    /// Check that the source exists before resolving it.
    pub validate_before_load: bool,
    /// Handler options for this call; override the per-format defaults field by field.
    pub options: FormatOptions,
}

impl Default for GetDataOptions {
    fn default() -> Self {
        Self {
            format: None,
            match_strategy: MatchStrategy::First,
            validate_before_load: true,
            options: FormatOptions::default(),
        }
    }
}

impl GetDataOptions {
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_match_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.match_strategy = strategy;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_before_load = validate;
        self
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }
}

/// Loads data sources below one base directory.
///
/// The registry is shared and read-only; a loader can be used from several threads at once.
pub struct DataLoader {
    base_directory: PathBuf,
    /// The base as the caller spelled it, made absolute; may differ from the canonical form
    /// when it goes through symlinks.
    given_base: PathBuf,
    registry: Arc<FormatRegistry>,
    observer: Option<Arc<dyn LoadObserver>>,
    alert_at_or_above: LoadSeverity,
    parallel: bool,
    defaults: LoadDefaults,
    sources: IndexMap<String, SourceSpec>,
}

impl fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoader")
            .field("base_directory", &self.base_directory)
            .field("given_base", &self.given_base)
            .field("registry", &self.registry)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .field("parallel", &self.parallel)
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DataLoader {
    /// Create a loader anchored at `base_directory`, which must be an existing directory.
    pub fn new(base_directory: impl AsRef<Path>, registry: Arc<FormatRegistry>) -> LoadResult<Self> {
        let given_base = std::path::absolute(base_directory.as_ref())?;
        let base_directory = canonical_base(&given_base)?;
        Ok(Self {
            base_directory,
            given_base,
            registry,
            observer: None,
            alert_at_or_above: LoadSeverity::Critical,
            parallel: false,
            defaults: LoadDefaults::default(),
            sources: IndexMap::new(),
        })
    }

    /// Build a loader from a parsed configuration: built-in handlers with the configured
    /// per-format defaults, the configured base directory, defaults and named sources.
    pub fn from_config(config: &LoaderConfig) -> LoadResult<Self> {
        config.validate()?;
        let registry = Arc::new(FormatRegistry::with_builtin_handlers(&config.formats));
        let mut loader = Self::new(config.base_directory(), registry)?;
        loader.parallel = config.defaults.parallel;
        loader.defaults = config.defaults.clone();
        loader.sources = config.sources.clone();
        tracing::debug!(
            base = %loader.base_directory.display(),
            sources = loader.sources.len(),
            "loader configured"
        );
        Ok(loader)
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Severity at or above which failures are also reported through `on_alert`.
    pub fn with_alert_threshold(mut self, severity: LoadSeverity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    /// Parse multi-file loads on the rayon pool. Output order stays the selection order.
    pub fn with_parallel_parsing(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Canonical base directory.
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Options built from the configured defaults.
    pub fn default_options(&self) -> GetDataOptions {
        GetDataOptions {
            format: None,
            match_strategy: self.defaults.match_strategy,
            validate_before_load: self.defaults.validate_before_load,
            options: FormatOptions::default(),
        }
    }

    /// Load `source` (a path or a pattern relative to the base directory) into one dataset.
    ///
    /// When an observer is configured, this reports:
    ///
    /// - `on_success` with row and file counts
    /// - `on_failure` with a computed severity
    /// - `on_alert` when that severity is at or above the alert threshold
    pub fn get_data(&self, source: &str, options: &GetDataOptions) -> LoadResult<DataSet> {
        let mut ctx = LoadContext {
            source: source.to_string(),
            files: Vec::new(),
            format: options.format.clone(),
        };

        let result = self.run(source, options, &mut ctx);

        match &result {
            Ok(ds) => {
                tracing::info!(source, files = ctx.files.len(), rows = ds.row_count(), "loaded");
                if let Some(obs) = &self.observer {
                    obs.on_success(
                        &ctx,
                        LoadStats {
                            rows: ds.row_count(),
                            files: ctx.files.len(),
                        },
                    );
                }
            }
            Err(e) => {
                if let Some(obs) = &self.observer {
                    let severity = LoadSeverity::for_error(e);
                    obs.on_failure(&ctx, severity, e);
                    if severity >= self.alert_at_or_above {
                        obs.on_alert(&ctx, severity, e);
                    }
                }
            }
        }

        result
    }

    fn run(&self, source: &str, options: &GetDataOptions, ctx: &mut LoadContext) -> LoadResult<DataSet> {
        if options.validate_before_load {
            self.validate_source(source)?;
        }

        let files = self.resolve_source(source, options.match_strategy)?;
        ctx.files = files.iter().map(|f| f.path().to_path_buf()).collect();

        let jobs = files
            .into_iter()
            .map(|file| {
                let handler = self
                    .registry
                    .get_handler(&file.path().to_string_lossy(), options.format.as_deref())?;
                Ok((file, handler))
            })
            .collect::<LoadResult<Vec<(ResolvedPath, Arc<dyn FormatHandler>)>>>()?;

        let parse = |(file, handler): &(ResolvedPath, Arc<dyn FormatHandler>)| {
            tracing::debug!(file = %file.path().display(), format = handler.name(), "parsing");
            handler.load(file.path(), &options.options)
        };
        let parts = if self.parallel && jobs.len() > 1 {
            jobs.par_iter().map(parse).collect::<LoadResult<Vec<DataSet>>>()?
        } else {
            jobs.iter().map(parse).collect::<LoadResult<Vec<DataSet>>>()?
        };

        DataSet::concat(parts)
    }

    /// Resolve `source` to the files a load would parse, without parsing them.
    ///
    /// Patterns go through expansion and selection; a literal path is returned as is (after
    /// containment checks), whether or not it exists.
    pub fn resolve_source(&self, source: &str, strategy: MatchStrategy) -> LoadResult<Vec<ResolvedPath>> {
        if is_pattern(source) {
            let matches = resolve_pattern(&self.given_base, source)?;
            select(matches, strategy)
        } else {
            let path = resolve_literal(&self.given_base, source)?;
            Ok(vec![ResolvedPath::new(path)])
        }
    }

    /// Check that `source` names something loadable.
    ///
    /// A literal path must be a readable regular file inside the base directory; a pattern must
    /// match at least one file. Failure is [`LoadError::SourceNotFound`], or
    /// [`LoadError::PathTraversal`] for sources that leave the base directory.
    pub fn validate_source(&self, source: &str) -> LoadResult<()> {
        let not_found = || {
            tracing::debug!(source, "source validation failed");
            LoadError::SourceNotFound {
                source_name: source.to_string(),
            }
        };

        if is_pattern(source) {
            let matches = resolve_pattern(&self.given_base, source)?;
            if matches.is_empty() {
                return Err(not_found());
            }
            return Ok(());
        }

        let path = resolve_literal(&self.given_base, source)?;
        if !path.is_file() {
            return Err(not_found());
        }
        let mut probe = [0u8; 1];
        File::open(&path)
            .and_then(|mut f| f.read(&mut probe))
            .map_err(|_| not_found())?;
        Ok(())
    }

    /// Names of the configured sources, in declaration order.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Load the configured source `name`.
    pub fn load_source(&self, name: &str) -> LoadResult<DataSet> {
        let spec = self.sources.get(name).ok_or_else(|| {
            LoadError::config(format!(
                "source '{name}' not found in configuration. available sources: {:?}",
                self.sources.keys().collect::<Vec<_>>()
            ))
        })?;
        self.load_spec(name, spec)
    }

    /// Load the first source declared in the configuration.
    pub fn load_default_source(&self) -> LoadResult<DataSet> {
        let (name, spec) = self
            .sources
            .first()
            .ok_or_else(|| LoadError::config("no sources found in configuration"))?;
        self.load_spec(name, spec)
    }

    /// Load every configured source, in declaration order.
    ///
    /// A failing source does not stop the others; its error is logged and returned in its slot.
    pub fn load_all_sources(&self) -> IndexMap<String, LoadResult<DataSet>> {
        self.sources
            .iter()
            .map(|(name, spec)| {
                let result = self.load_spec(name, spec);
                if let Err(e) = &result {
                    tracing::warn!(source = %name, error = %e, "failed to load source");
                }
                (name.clone(), result)
            })
            .collect()
    }

    /// Load a path or pattern directly, using the configured defaults.
    pub fn load_path(&self, path: &str, format: Option<&str>) -> LoadResult<DataSet> {
        let mut options = self.default_options();
        options.format = format.map(str::to_string);
        self.get_data(path, &options)
    }

    fn load_spec(&self, name: &str, spec: &SourceSpec) -> LoadResult<DataSet> {
        let source = spec.source(name)?;
        let options = GetDataOptions {
            format: spec.format.clone(),
            match_strategy: spec.match_strategy.unwrap_or(self.defaults.match_strategy),
            validate_before_load: spec
                .validate_before_load
                .unwrap_or(self.defaults.validate_before_load),
            options: spec.options.clone(),
        };
        tracing::debug!(
            source = name,
            path = source,
            strategy = %options.match_strategy,
            "loading configured source"
        );
        self.get_data(source, &options)
    }
}
