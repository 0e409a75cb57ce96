//! Match selection: reduce a resolved match set to the files that get parsed.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{LoadError, LoadResult};
use crate::resolve::ResolvedPath;

/// How to reduce a set of pattern matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// The lexicographically smallest path.
    #[default]
    First,
    /// The most recently modified file. Ties go to the lexicographically smallest path.
    Latest,
    /// Every match, in lexicographic order.
    All,
}

impl MatchStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStrategy::First => "first",
            MatchStrategy::Latest => "latest",
            MatchStrategy::All => "all",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStrategy {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MatchStrategy::First),
            "latest" => Ok(MatchStrategy::Latest),
            "all" => Ok(MatchStrategy::All),
            other => Err(LoadError::config(format!(
                "unknown match strategy '{other}' (expected first, latest or all)"
            ))),
        }
    }
}

/// Apply `strategy` to `matches`.
///
/// The result is never empty: an empty input fails with [`LoadError::NoMatch`]. `First` and
/// `Latest` return exactly one path; `All` returns the whole set in ascending order.
pub fn select(matches: BTreeSet<ResolvedPath>, strategy: MatchStrategy) -> LoadResult<Vec<ResolvedPath>> {
    if matches.is_empty() {
        return Err(LoadError::NoMatch { strategy });
    }

    match strategy {
        MatchStrategy::All => Ok(matches.into_iter().collect()),
        MatchStrategy::First => Ok(matches.into_iter().take(1).collect()),
        MatchStrategy::Latest => {
            let mut iter = matches.into_iter();
            let Some(mut best) = iter.next() else {
                return Err(LoadError::NoMatch { strategy });
            };
            let mut best_time = best.modified()?;
            for candidate in iter {
                let t = candidate.modified()?;
                // Strictly newer only, so equal timestamps keep the earlier path.
                if t > best_time {
                    best = candidate;
                    best_time = t;
                }
            }
            Ok(vec![best])
        }
    }
}
