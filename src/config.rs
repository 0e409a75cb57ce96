//! YAML loader configuration.
//!
//! ```yaml
//! loader:
//!   type: local
//!   base_directory: data      # relative to this file; default: this file's directory
//! defaults:
//!   validate_before_load: true
//!   match_strategy: first
//!   parallel: false
//! formats:
//!   csv: { delimiter: ";" }
//! sources:
//!   daily:
//!     pattern: "data_*.csv"
//!     match_strategy: all
//!   lookup:
//!     path: lookup.parquet
//!     columns: [id, name]
//! ```
//!
//! Values can be overridden through `DATA_LOADER_*` environment variables, where `__` separates
//! nesting levels: `DATA_LOADER_DEFAULTS__MATCH_STRATEGY=latest` sets `defaults.match_strategy`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{LoadError, LoadResult};
use crate::ingestion::FormatOptions;
use crate::select::MatchStrategy;

/// Variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "DATA_LOADER_CONFIG_PATH";
/// Prefix of variables that override configuration values.
pub const ENV_PREFIX: &str = "DATA_LOADER_";
/// File name searched for during discovery.
pub const CONFIG_FILE_NAME: &str = "data_config.yaml";

const LOCAL_LOADER: &str = "local";

/// Parsed `data_config.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub loader: LoaderSection,
    pub defaults: LoadDefaults,
    /// Per-format handler defaults, keyed by handler name.
    pub formats: BTreeMap<String, FormatOptions>,
    /// Named sources, in declaration order.
    pub sources: IndexMap<String, SourceSpec>,
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    /// Loader backend. Only `local` exists.
    #[serde(rename = "type")]
    pub kind: String,
    pub base_directory: Option<PathBuf>,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            kind: LOCAL_LOADER.to_string(),
            base_directory: None,
        }
    }
}

/// Defaults applied to every load that does not say otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadDefaults {
    pub validate_before_load: bool,
    pub match_strategy: MatchStrategy,
    /// Parse multi-file loads in parallel.
    pub parallel: bool,
}

impl Default for LoadDefaults {
    fn default() -> Self {
        Self {
            validate_before_load: true,
            match_strategy: MatchStrategy::First,
            parallel: false,
        }
    }
}

/// One named source. Keys other than the ones below are handler options.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub match_strategy: Option<MatchStrategy>,
    #[serde(default)]
    pub validate_before_load: Option<bool>,
    #[serde(flatten)]
    pub options: FormatOptions,
}

impl SourceSpec {
    /// The literal path or pattern this source loads.
    pub fn source(&self, name: &str) -> LoadResult<&str> {
        match (&self.path, &self.pattern) {
            (Some(path), None) => Ok(path),
            (None, Some(pattern)) => Ok(pattern),
            (Some(_), Some(_)) => Err(LoadError::config(format!(
                "source '{name}' must set either 'path' or 'pattern', not both"
            ))),
            (None, None) => Err(LoadError::config(format!(
                "source '{name}' must contain either a 'path' or 'pattern' field"
            ))),
        }
    }
}

impl LoaderConfig {
    /// Load from an explicit path, or discover the file when `path` is `None`.
    pub fn load(path: Option<&Path>) -> LoadResult<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::discover(),
        }
    }

    /// Read and parse the file at `path`, applying environment overrides.
    pub fn from_path(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LoadError::config(format!(
                "configuration file not found at {}",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str_with_env(&text, env::vars())?;
        config.config_path = Some(fs::canonicalize(path)?);
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Search the standard locations and load the first file found.
    pub fn discover() -> LoadResult<Self> {
        let cwd = env::current_dir()?;
        let locations = search_locations(|key| env::var(key).ok(), &cwd);
        match locations.iter().find(|p| p.is_file()) {
            Some(found) => Self::from_path(found),
            None => Err(LoadError::config(format!(
                "{CONFIG_FILE_NAME} not found. searched: {}",
                locations
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Parse YAML text as is. Relative base directories resolve against the working directory.
    pub fn from_yaml_str(yaml: &str) -> LoadResult<Self> {
        Self::from_yaml_str_with_env(yaml, std::iter::empty())
    }

    /// Parse YAML text, then apply `DATA_LOADER_*` overrides taken from `vars`.
    pub fn from_yaml_str_with_env<I>(yaml: &str, vars: I) -> LoadResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut doc: YamlValue = serde_yaml::from_str(yaml)?;
        if doc.is_null() {
            doc = YamlValue::Mapping(Mapping::new());
        }
        apply_env_overrides(&mut doc, vars);
        let config: LoaderConfig = serde_yaml::from_value(doc)?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the file this configuration was read from.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Base directory for relative sources.
    ///
    /// A relative `loader.base_directory` is anchored at the configuration file's directory; an
    /// absent one defaults to that directory (or `.` for configurations not read from a file).
    pub fn base_directory(&self) -> PathBuf {
        let config_dir = self
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        match &self.loader.base_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => config_dir.join(dir),
            None => config_dir,
        }
    }

    pub fn validate(&self) -> LoadResult<()> {
        if !self.loader.kind.eq_ignore_ascii_case(LOCAL_LOADER) {
            return Err(LoadError::config(format!(
                "unsupported loader type '{}'. available: [\"{LOCAL_LOADER}\"]",
                self.loader.kind
            )));
        }
        for (name, spec) in &self.sources {
            spec.source(name)?;
        }
        Ok(())
    }
}

/// Discovery order for the configuration file.
fn search_locations(var: impl Fn(&str) -> Option<String>, cwd: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(explicit) = var(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        out.push(PathBuf::from(explicit));
    }
    out.push(cwd.join("config").join(CONFIG_FILE_NAME));
    out.push(cwd.join(CONFIG_FILE_NAME));

    let home = var("HOME").or_else(|| var("USERPROFILE")).map(PathBuf::from);
    if let Some(home) = &home {
        out.push(home.join(".data_loader").join(CONFIG_FILE_NAME));
    }
    match var("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(xdg) => out.push(PathBuf::from(xdg).join("data_loader").join(CONFIG_FILE_NAME)),
        None => {
            if let Some(home) = &home {
                out.push(home.join(".config").join("data_loader").join(CONFIG_FILE_NAME));
            }
        }
    }
    out
}

fn apply_env_overrides<I>(doc: &mut YamlValue, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        if key == CONFIG_PATH_ENV || rest.is_empty() {
            continue;
        }
        let path: Vec<String> = rest.split("__").map(str::to_ascii_lowercase).collect();
        if path.iter().any(String::is_empty) {
            continue;
        }
        tracing::debug!(variable = %key, "applying environment override");
        set_path(doc, &path, convert_env_value(&value));
    }
}

fn set_path(doc: &mut YamlValue, path: &[String], value: YamlValue) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = doc;
    for part in parents {
        if !current.is_mapping() {
            *current = YamlValue::Mapping(Mapping::new());
        }
        let YamlValue::Mapping(map) = current else {
            return;
        };
        current = map
            .entry(YamlValue::String(part.clone()))
            .or_insert_with(|| YamlValue::Mapping(Mapping::new()));
    }
    if !current.is_mapping() {
        *current = YamlValue::Mapping(Mapping::new());
    }
    if let YamlValue::Mapping(map) = current {
        map.insert(YamlValue::String(last.clone()), value);
    }
}

fn convert_env_value(raw: &str) -> YamlValue {
    if raw.eq_ignore_ascii_case("true") {
        return YamlValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return YamlValue::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return YamlValue::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        return YamlValue::Number(f.into());
    }
    YamlValue::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_values_convert_to_scalars() {
        assert_eq!(convert_env_value("FALSE"), YamlValue::Bool(false));
        assert_eq!(convert_env_value("42"), YamlValue::Number(42i64.into()));
        assert_eq!(convert_env_value("0.5"), YamlValue::Number(0.5.into()));
        assert_eq!(convert_env_value("latest"), YamlValue::String("latest".into()));
    }

    #[test]
    fn env_overrides_nested_keys() {
        let yaml = "defaults:\n  validate_before_load: true\n";
        let config = LoaderConfig::from_yaml_str_with_env(
            yaml,
            vars(&[
                ("DATA_LOADER_DEFAULTS__VALIDATE_BEFORE_LOAD", "false"),
                ("DATA_LOADER_DEFAULTS__MATCH_STRATEGY", "latest"),
                ("DATA_LOADER_CONFIG_PATH", "/ignored.yaml"),
                ("UNRELATED", "x"),
            ]),
        )
        .unwrap();
        assert!(!config.defaults.validate_before_load);
        assert_eq!(config.defaults.match_strategy, MatchStrategy::Latest);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config = LoaderConfig::from_yaml_str("").unwrap();
        assert_eq!(config.defaults, LoadDefaults::default());
        assert!(config.sources.is_empty());
        assert_eq!(config.base_directory(), PathBuf::from("."));
    }

    #[test]
    fn search_order_follows_env_then_cwd_then_home() {
        let env = |key: &str| match key {
            "DATA_LOADER_CONFIG_PATH" => Some("/etc/custom.yaml".to_string()),
            "HOME" => Some("/home/u".to_string()),
            _ => None,
        };
        let found = search_locations(env, Path::new("/work"));
        assert_eq!(
            found,
            vec![
                PathBuf::from("/etc/custom.yaml"),
                PathBuf::from("/work/config/data_config.yaml"),
                PathBuf::from("/work/data_config.yaml"),
                PathBuf::from("/home/u/.data_loader/data_config.yaml"),
                PathBuf::from("/home/u/.config/data_loader/data_config.yaml"),
            ]
        );
    }

    #[test]
    fn source_needs_exactly_one_of_path_or_pattern() {
        let both = "sources:\n  s:\n    path: a.csv\n    pattern: '*.csv'\n";
        assert!(matches!(
            LoaderConfig::from_yaml_str(both),
            Err(LoadError::Configuration { .. })
        ));
        let neither = "sources:\n  s:\n    format: csv\n";
        assert!(LoaderConfig::from_yaml_str(neither).is_err());
    }

    #[test]
    fn unknown_loader_type_is_rejected() {
        let err = LoaderConfig::from_yaml_str("loader:\n  type: github\n").unwrap_err();
        assert!(err.to_string().contains("github"));
    }
}
