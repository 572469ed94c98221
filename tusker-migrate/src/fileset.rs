//! Ordered sets of SQL files described by glob patterns.
//!
//! Each pattern is expanded on its own (with `**` recursion), its matches are
//! sorted lexically, and the per-pattern lists are concatenated in the order
//! the patterns were declared. A file matched by more than one pattern is
//! kept at its first position only.
//!
//! ```text
//! patterns = ["schema/types.sql", "schema/**/*.sql"]
//!
//! schema/types.sql            <- pattern 1
//! schema/a/tables.sql         <- pattern 2, sorted
//! schema/b/views.sql
//!                             (schema/types.sql from pattern 2 is skipped)
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};

use crate::error::{MigrateResult, MigrationError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// An ordered list of glob patterns resolving to SQL files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    patterns: Vec<String>,
    base_dir: Option<PathBuf>,
}

impl FileSet {
    /// Create a file set from patterns, in declaration order.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            base_dir: None,
        }
    }

    /// A file set containing every `*.sql` file directly inside `dir`.
    pub fn from_directory(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_string_lossy();
        let dir = dir.trim_end_matches('/');
        Self::new([format!("{}/*.sql", Pattern::escape(dir))])
    }

    /// Resolve relative patterns against `dir` instead of the working directory.
    pub fn relative_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// The configured patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check if no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Expand the patterns into absolute file paths.
    pub fn resolve(&self) -> MigrateResult<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in &self.patterns {
            let mut matches = self.expand(pattern)?;
            matches.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));

            if matches.is_empty() {
                warn!(pattern = %pattern, "Pattern did not match any files");
            }

            for path in matches {
                if seen.insert(path.clone()) {
                    debug!(pattern = %pattern, file = %path.display(), "Resolved file");
                    files.push(path);
                }
            }
        }

        Ok(files)
    }

    fn expand(&self, pattern: &str) -> MigrateResult<Vec<PathBuf>> {
        let full = match &self.base_dir {
            Some(base) if !Path::new(pattern).is_absolute() => {
                let base = base.to_string_lossy();
                format!("{}/{}", Pattern::escape(base.trim_end_matches('/')), pattern)
            }
            _ => pattern.to_string(),
        };

        let entries = glob::glob_with(&full, MATCH_OPTIONS)
            .map_err(|e| MigrationError::pattern(pattern, e.to_string()))?;

        let mut matches = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| {
                MigrationError::pattern(
                    pattern,
                    format!("cannot read {}: {}", e.path().display(), e.error()),
                )
            })?;
            if path.is_file() {
                matches.push(std::path::absolute(&path)?);
            }
        }

        Ok(matches)
    }
}

impl Default for FileSet {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "SELECT 1;").unwrap();
        path
    }

    fn names(dir: &Path, files: &[PathBuf]) -> Vec<String> {
        let base = std::path::absolute(dir).unwrap();
        files
            .iter()
            .map(|f| f.strip_prefix(&base).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_single_pattern_sorted_lexically() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.sql");
        touch(tmp.path(), "a.sql");
        touch(tmp.path(), "c.txt");

        let files = FileSet::new(["*.sql"]).relative_to(tmp.path()).resolve().unwrap();
        assert_eq!(names(tmp.path(), &files), vec!["a.sql", "b.sql"]);
    }

    #[test]
    fn test_patterns_keep_declaration_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "views/a.sql");
        touch(tmp.path(), "tables/z.sql");

        let files = FileSet::new(["tables/*.sql", "views/*.sql"])
            .relative_to(tmp.path())
            .resolve()
            .unwrap();
        assert_eq!(names(tmp.path(), &files), vec!["tables/z.sql", "views/a.sql"]);
    }

    #[test]
    fn test_recursive_pattern() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "schema/01/b.sql");
        touch(tmp.path(), "schema/01/a.sql");
        touch(tmp.path(), "schema/00.sql");

        let files = FileSet::new(["schema/**/*.sql"])
            .relative_to(tmp.path())
            .resolve()
            .unwrap();
        assert_eq!(
            names(tmp.path(), &files),
            vec!["schema/00.sql", "schema/01/a.sql", "schema/01/b.sql"]
        );
    }

    #[test]
    fn test_single_star_does_not_cross_directories() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "migrations/0001.sql");
        touch(tmp.path(), "migrations/archive/0000.sql");

        let files = FileSet::new(["migrations/*.sql"])
            .relative_to(tmp.path())
            .resolve()
            .unwrap();
        assert_eq!(names(tmp.path(), &files), vec!["migrations/0001.sql"]);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "types.sql");
        touch(tmp.path(), "tables.sql");

        let files = FileSet::new(["types.sql", "*.sql"])
            .relative_to(tmp.path())
            .resolve()
            .unwrap();
        assert_eq!(names(tmp.path(), &files), vec!["types.sql", "tables.sql"]);
    }

    #[test]
    fn test_no_matches_is_empty() {
        let tmp = TempDir::new().unwrap();
        let files = FileSet::new(["schema.sql"]).relative_to(tmp.path()).resolve().unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_from_directory() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "migrations/0002_b.sql");
        touch(tmp.path(), "migrations/0001_a.sql");
        touch(tmp.path(), "migrations/README.md");

        let set = FileSet::from_directory(tmp.path().join("migrations"));
        let files = set.resolve().unwrap();
        assert_eq!(
            names(tmp.path(), &files),
            vec!["migrations/0001_a.sql", "migrations/0002_b.sql"]
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let err = FileSet::new(["[unclosed"]).resolve().unwrap_err();
        assert!(matches!(err, MigrationError::Pattern { .. }));
    }
}
