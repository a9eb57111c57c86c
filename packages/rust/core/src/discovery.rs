//! Source-tree enumeration.
//!
//! Patterns are globs relative to a base directory, matched with
//! `glob` using node-style rules: `*` never crosses a `/` and dotfiles
//! are only matched by patterns that spell out the leading dot.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};

use buildpipe_shared::{BuildError, Result, SourceFile};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Pattern matching every file with `ext` anywhere under the base directory.
pub fn extension_pattern(ext: &str) -> String {
    format!("**/*.{ext}")
}

/// Patterns for a set of extensions.
pub fn extension_patterns(exts: &[&str]) -> Vec<String> {
    exts.iter().map(|e| extension_pattern(e)).collect()
}

/// Find all regular files under `base` matching any of `patterns`.
///
/// Results are deduplicated, relative to `base`, and sorted.
pub fn find_files(base: &Path, patterns: &[String]) -> Result<Vec<SourceFile>> {
    let mut found = BTreeSet::new();

    for pattern in patterns {
        for path in matches(base, pattern)? {
            match path.strip_prefix(base) {
                Ok(relative) if is_contained(relative) => {
                    found.insert(relative.to_path_buf());
                }
                _ => warn!(path = %path.display(), "skipping match outside the base directory"),
            }
        }
    }

    debug!(base = %base.display(), patterns = patterns.len(), files = found.len(), "discovered files");
    Ok(found.into_iter().map(SourceFile::new).collect())
}

/// Whether at least one regular file under `base` matches `pattern`.
/// Stops at the first match.
pub fn any_file(base: &Path, pattern: &str) -> Result<bool> {
    Ok(matches(base, pattern)?.next().is_some())
}

/// A relative path made only of plain names, so joining it onto another
/// directory stays inside that directory.
fn is_contained(relative: &Path) -> bool {
    relative.components().all(|c| matches!(c, Component::Normal(_)))
}

fn matches(base: &Path, pattern: &str) -> Result<impl Iterator<Item = PathBuf>> {
    if Path::new(pattern).is_absolute() {
        return Err(BuildError::Pattern {
            pattern: pattern.to_string(),
            message: "patterns must be relative to the source directory".into(),
        });
    }
    if Path::new(pattern)
        .components()
        .any(|c| c == Component::ParentDir)
    {
        return Err(BuildError::Pattern {
            pattern: pattern.to_string(),
            message: "patterns must not leave the source directory".into(),
        });
    }

    let full = format!(
        "{}/{}",
        Pattern::escape(&base.to_string_lossy()).trim_end_matches('/'),
        pattern
    );

    let paths = glob::glob_with(&full, MATCH_OPTIONS).map_err(|e| BuildError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    Ok(paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "unreadable path during discovery");
                None
            }
        })
        .filter(|path| path.is_file()))
}
