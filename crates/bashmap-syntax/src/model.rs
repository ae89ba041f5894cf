//! Output shapes shared by the extractor, duplicate detector and dependency mapper.

use crate::duplicates::{find_duplicates, DuplicateScope};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;

/// One function definition discovered in a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BashFunction {
    pub name: String,
    /// Text following an `Arguments:` marker in the comment block
    #[serde(serialize_with = "empty_if_none")]
    pub arguments: Option<String>,
    /// Comment lines preceding the definition (before any `Arguments:` marker)
    #[serde(serialize_with = "empty_if_none")]
    pub description: Option<String>,
    pub file: String,
    /// First line of the comment block, or `start` when there is none
    pub start_block: usize,
    pub start: usize,
    pub end: usize,
}

impl BashFunction {
    pub fn arguments(&self) -> &str {
        self.arguments.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Number of lines spanned by the comment block and body together.
    pub fn line_count(&self) -> usize {
        self.end - self.start_block + 1
    }
}

/// Functions from one scan together with the names defined more than once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FunctionSummary {
    pub functions: Vec<BashFunction>,
    pub duplicates: BTreeSet<String>,
}

impl FunctionSummary {
    pub fn new(functions: Vec<BashFunction>, scope: DuplicateScope) -> Self {
        let duplicates = find_duplicates(&functions, scope);
        Self {
            functions,
            duplicates,
        }
    }
}

/// Utility files and functions referenced by one analyzed file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileDependencies {
    pub file: String,
    pub files: BTreeSet<String>,
    pub functions: BTreeSet<String>,
}

impl FileDependencies {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn empty_if_none<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or_default())
}
