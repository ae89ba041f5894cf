//! Error types for extraction and dependency mapping.

/// Extraction could not find where a definition ends (or begins).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{file}:{line}: {message}")]
pub struct ParseError {
    pub file: String,
    /// 1-based line where scanning gave up
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(file: &str, line: usize, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }
}

/// The utility catalog holds an entry that cannot be attributed to a file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog function `{name}` has no defining file")]
    MissingFile { name: String },

    #[error("catalog entry from {file} has an empty function name")]
    EmptyName { file: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
