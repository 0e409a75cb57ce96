//! Pattern resolution against a base directory.
//!
//! [`resolve_pattern`] expands a glob-like pattern (`*` and `?`, in any path segment) into the
//! set of files it matches below a base directory. Containment is enforced in two ways:
//!
//! - Before expansion the pattern is normalized lexically (`.` and `..` folded away). A pattern
//!   whose literal form leaves the base directory, through `..` segments or by being an absolute
//!   path elsewhere, fails with [`LoadError::PathTraversal`] and nothing is read.
//! - After expansion every match is canonicalized. Matches that land outside the canonical base
//!   directory (through symlinks) are dropped from the result.
//!
//! Recursive wildcards are never honoured: every `**` is rewritten to `*`, and each wildcard
//! segment matches entries at its own depth only.

use std::collections::BTreeSet;
use std::cmp::Ordering;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use glob::{MatchOptions, Pattern};

use crate::error::{LoadError, LoadResult};

/// An absolute, canonical path known to lie within the base directory it was resolved against.
///
/// Ordering and equality use the full path string. The modification time is read lazily, on
/// first use, and then cached for the lifetime of the value.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    path: PathBuf,
    modified: OnceLock<SystemTime>,
}

impl ResolvedPath {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            modified: OnceLock::new(),
        }
    }

    /// A path whose modification time is already known.
    pub fn with_modified(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            modified: OnceLock::from(modified),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }

    /// Last-modified timestamp, read from the filesystem on first call.
    pub fn modified(&self) -> LoadResult<SystemTime> {
        if let Some(t) = self.modified.get() {
            return Ok(*t);
        }
        let t = fs::metadata(&self.path)?.modified()?;
        Ok(*self.modified.get_or_init(|| t))
    }
}

impl PartialEq for ResolvedPath {
    fn eq(&self, other: &Self) -> bool {
        self.path.as_os_str() == other.path.as_os_str()
    }
}

impl Eq for ResolvedPath {}

impl Ord for ResolvedPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.as_os_str().cmp(other.path.as_os_str())
    }
}

impl PartialOrd for ResolvedPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for ResolvedPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.as_os_str().hash(state);
    }
}

/// `true` if `source` contains glob wildcards (`*` or `?`).
pub fn is_pattern(source: &str) -> bool {
    source.contains(['*', '?'])
}

/// Rewrite every run of `*` to a single `*`, so `**` never means recursive descent.
pub fn normalize_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut prev_star = false;
    for c in pattern.chars() {
        if c == '*' && prev_star {
            continue;
        }
        prev_star = c == '*';
        out.push(c);
    }
    out
}

/// Canonical form of an existing base directory.
pub fn canonical_base(base_directory: &Path) -> LoadResult<PathBuf> {
    if !base_directory.is_dir() {
        return Err(LoadError::config(format!(
            "base directory does not exist or is not a directory: {}",
            base_directory.display()
        )));
    }
    Ok(fs::canonicalize(base_directory)?)
}

/// Expand `pattern` below `base_directory`.
///
/// Relative patterns are anchored at the base directory; absolute patterns must point inside it,
/// spelled either through `base_directory` as given or through its canonical form. Only regular
/// files are returned, and entries that cannot be read are skipped. An empty set is a valid result.
pub fn resolve_pattern(base_directory: &Path, pattern: &str) -> LoadResult<BTreeSet<ResolvedPath>> {
    let base = canonical_base(base_directory)?;
    let normalized = normalize_pattern(pattern);
    let relative = contained_relative(base_directory, &base, &normalized)?;

    let mut out = BTreeSet::new();
    if relative.as_os_str().is_empty() {
        return Ok(out);
    }

    let glob_pattern = glob_pattern_for(&base, &relative)?;
    tracing::debug!(pattern, glob = %glob_pattern, "expanding pattern");

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    for entry in glob::glob_with(&glob_pattern, options)? {
        let candidate = match entry {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(path = %e.path().display(), error = %e.error(), "skipping unreadable path");
                continue;
            }
        };
        if !candidate.is_file() {
            continue;
        }
        let canonical = fs::canonicalize(&candidate)?;
        if !canonical.starts_with(&base) {
            tracing::warn!(
                candidate = %candidate.display(),
                resolved = %canonical.display(),
                base = %base.display(),
                "dropping match that escapes the base directory"
            );
            continue;
        }
        out.insert(ResolvedPath::new(canonical));
    }

    tracing::debug!(pattern, matches = out.len(), "pattern resolved");
    Ok(out)
}

/// Resolve a literal (wildcard-free) source to a path inside `base_directory`.
///
/// Absolute sources follow the same rules as in [`resolve_pattern`]. The path does not have to
/// exist. If it does, its canonical form must also be contained:
/// a literal path that leaves the base directory through a symlink is rejected, not dropped.
pub fn resolve_literal(base_directory: &Path, source: &str) -> LoadResult<PathBuf> {
    let base = canonical_base(base_directory)?;
    let relative = contained_relative(base_directory, &base, source)?;
    let full = base.join(relative);

    if !full.exists() {
        return Ok(full);
    }
    let canonical = fs::canonicalize(&full)?;
    if !canonical.starts_with(&base) {
        tracing::warn!(source, resolved = %canonical.display(), "literal path escapes base directory");
        return Err(LoadError::PathTraversal {
            path: source.to_string(),
            base_directory: base,
        });
    }
    Ok(canonical)
}

/// `true` if `path` exists and its canonical form lies within the canonical `base_directory`.
pub fn is_within_base(path: &Path, base_directory: &Path) -> bool {
    match (fs::canonicalize(path), fs::canonicalize(base_directory)) {
        (Ok(target), Ok(base)) => target.starts_with(base),
        _ => false,
    }
}

/// Lexically fold `source` against the base and return the part below it.
///
/// Absolute sources may name the base either as given or in canonical form.
fn contained_relative(given_base: &Path, base: &Path, source: &str) -> LoadResult<PathBuf> {
    let traversal = || {
        tracing::warn!(source, base = %base.display(), "path traversal attempt rejected");
        LoadError::PathTraversal {
            path: source.to_string(),
            base_directory: base.to_path_buf(),
        }
    };

    let source_path = Path::new(source);
    if source_path.is_absolute() {
        let folded = lexical_normalize(source_path);
        let given = std::path::absolute(given_base).map(|p| lexical_normalize(&p))?;
        folded
            .strip_prefix(base)
            .or_else(|_| folded.strip_prefix(&given))
            .map(Path::to_path_buf)
            .map_err(|_| traversal())
    } else {
        let folded = lexical_normalize(&base.join(source_path));
        folded
            .strip_prefix(base)
            .map(Path::to_path_buf)
            .map_err(|_| traversal())
    }
}

/// Fold `.` and `..` without touching the filesystem. `..` at the root stays at the root.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}

fn glob_pattern_for(base: &Path, relative: &Path) -> LoadResult<String> {
    let base_str = base
        .to_str()
        .ok_or_else(|| LoadError::config(format!("base directory is not valid UTF-8: {}", base.display())))?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str().ok_or_else(|| {
                LoadError::config(format!("pattern is not valid UTF-8: {}", relative.display()))
            })?),
            _ => {
                return Err(LoadError::config(format!(
                    "unexpected component in normalized pattern: {}",
                    relative.display()
                )));
            }
        }
    }

    let mut glob = Pattern::escape(base_str);
    for segment in segments {
        if !glob.ends_with(std::path::MAIN_SEPARATOR) && !glob.ends_with('/') {
            glob.push('/');
        }
        glob.push_str(segment);
    }
    Ok(glob)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_wildcards_collapse() {
        assert_eq!(normalize_pattern("a/**/b_*.csv"), "a/*/b_*.csv");
        assert_eq!(normalize_pattern("***.csv"), "*.csv");
        assert_eq!(normalize_pattern("plain.csv"), "plain.csv");
    }

    #[test]
    fn wildcard_detection() {
        assert!(is_pattern("data_*.csv"));
        assert!(is_pattern("file?.txt"));
        assert!(!is_pattern("reports/2024/summary.csv"));
    }

    #[test]
    fn lexical_folding() {
        assert_eq!(lexical_normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(lexical_normalize(Path::new("/../../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn relative_escape_is_traversal() {
        let base = Path::new("/data/sources");
        let err = contained_relative(base, base, "../../etc/passwd").unwrap_err();
        assert!(matches!(err, LoadError::PathTraversal { .. }));
    }

    #[test]
    fn dotdot_that_stays_inside_is_allowed() {
        let base = Path::new("/data/sources");
        let rel = contained_relative(base, base, "a/../b/*.csv").unwrap();
        assert_eq!(rel, PathBuf::from("b/*.csv"));
    }

    #[test]
    fn resolved_paths_order_by_full_string() {
        let a = ResolvedPath::new(PathBuf::from("/d/a-b.csv"));
        let b = ResolvedPath::new(PathBuf::from("/d/a/b.csv"));
        // '-' sorts before '/' in a plain string comparison.
        assert!(a < b);
    }
}
