//! Ordered file lists and glob expansion.

use std::ops::Index;
use std::sync::Arc;

use tracing::warn;

use crate::error::SourceError;

/// Characters that indicate a glob pattern.
const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Immutable, ordered list of file identifiers.
///
/// Indices stay stable for the lifetime of the list; clones share storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileList {
    files: Arc<[String]>,
}

impl FileList {
    /// Create a list from identifiers, keeping their order.
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a list holding one identifier.
    pub fn single(file: impl Into<String>) -> Self {
        Self::new([file.into()])
    }

    /// Create a list from paths or local glob patterns.
    ///
    /// Each pattern's matches are sorted; patterns keep their given order.
    /// With `glob_enabled == false` every entry is taken literally.
    ///
    /// # Errors
    /// - `SourceError::FileSystemError` if a pattern is invalid
    /// - `SourceError::NotFound` if a pattern matches nothing
    pub fn from_patterns<S: AsRef<str>>(
        patterns: &[S],
        glob_enabled: bool,
    ) -> Result<Self, SourceError> {
        let mut files = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if glob_enabled && is_glob_pattern(pattern) {
                files.extend(expand_local_glob(pattern)?);
            } else {
                files.push(pattern.to_string());
            }
        }
        Ok(Self::new(files))
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Identifier at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.files.get(index).map(String::as_str)
    }

    /// Iterate over identifiers in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }
}

impl Default for FileList {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl Index<usize> for FileList {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.files[index]
    }
}

impl<S: Into<String>> FromIterator<S> for FileList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Check if a path contains glob pattern characters.
///
/// # Example
/// ```
/// use recordchain::iter::is_glob_pattern;
///
/// assert!(is_glob_pattern("data/*.rcf"));
/// assert!(is_glob_pattern("data/part-[0-9].rcf"));
/// assert!(!is_glob_pattern("data/part-0.rcf"));
/// ```
pub fn is_glob_pattern(path: &str) -> bool {
    path.chars().any(|c| GLOB_CHARS.contains(&c))
}

/// Expand a local filesystem glob pattern to a sorted list of matching files.
///
/// # Errors
/// - `SourceError::FileSystemError` if the pattern is invalid
/// - `SourceError::NotFound` if no files match the pattern
pub fn expand_local_glob(pattern: &str) -> Result<Vec<String>, SourceError> {
    let entries = glob::glob(pattern).map_err(|e| {
        SourceError::FileSystemError(format!("Invalid glob pattern '{}': {}", pattern, e))
    })?;

    let mut paths: Vec<String> = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => match path.to_str() {
                Some(path_str) => paths.push(path_str.to_string()),
                None => warn!(path = %path.display(), "Skipping non UTF-8 path"),
            },
            Err(e) => warn!(pattern, error = %e, "Error accessing path"),
        }
    }

    if paths.is_empty() {
        return Err(SourceError::NotFound(format!(
            "No files match pattern: {}",
            pattern
        )));
    }

    // Sort for deterministic ordering
    paths.sort();
    Ok(paths)
}
