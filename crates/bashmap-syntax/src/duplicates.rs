//! Duplicate function-name detection.

use crate::model::BashFunction;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Where a name must be unique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateScope {
    /// Names redefined within one file
    #[default]
    PerFile,
    /// Names redefined anywhere in the scanned set
    Repository,
}

impl FromStr for DuplicateScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" | "per-file" => Ok(Self::PerFile),
            "repo" | "repository" => Ok(Self::Repository),
            _ => Err(format!("unknown scope: {s}. Use file or repo")),
        }
    }
}

impl fmt::Display for DuplicateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PerFile => "file",
            Self::Repository => "repo",
        })
    }
}

/// A duplicated name and every place it is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub name: String,
    /// (file, start line) per definition, in input order
    pub locations: Vec<(String, usize)>,
}

/// Names defined two or more times within `scope`.
pub fn find_duplicates(functions: &[BashFunction], scope: DuplicateScope) -> BTreeSet<String> {
    group_definitions(functions, scope)
        .into_iter()
        .filter(|(_, defs)| defs.len() > 1)
        .map(|((_, name), _)| name.to_string())
        .collect()
}

/// Like [`find_duplicates`], keeping the location of every definition.
///
/// Under [`DuplicateScope::PerFile`] a name redefined in two files yields one
/// group per file.
pub fn duplicate_locations(functions: &[BashFunction], scope: DuplicateScope) -> Vec<DuplicateGroup> {
    group_definitions(functions, scope)
        .into_iter()
        .filter(|(_, defs)| defs.len() > 1)
        .map(|((_, name), defs)| DuplicateGroup {
            name: name.to_string(),
            locations: defs
                .into_iter()
                .map(|f| (f.file.clone(), f.start))
                .collect(),
        })
        .collect()
}

/// Group definitions by (file, name) or by name alone, depending on scope.
fn group_definitions(
    functions: &[BashFunction],
    scope: DuplicateScope,
) -> BTreeMap<(Option<&str>, &str), Vec<&BashFunction>> {
    let mut groups: BTreeMap<(Option<&str>, &str), Vec<&BashFunction>> = BTreeMap::new();
    for func in functions {
        let file = match scope {
            DuplicateScope::PerFile => Some(func.file.as_str()),
            DuplicateScope::Repository => None,
        };
        groups.entry((file, func.name.as_str())).or_default().push(func);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn def(file: &str, name: &str, start: usize) -> BashFunction {
        BashFunction {
            name: name.to_string(),
            arguments: None,
            description: None,
            file: file.to_string(),
            start_block: start,
            start,
            end: start,
        }
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn empty_input_has_no_duplicates() {
        assert!(find_duplicates(&[], DuplicateScope::Repository).is_empty());
    }

    #[test]
    fn name_listed_once_regardless_of_count() {
        let defs = vec![def("a.sh", "foo", 1), def("a.sh", "foo", 5), def("a.sh", "foo", 9)];
        assert_eq!(find_duplicates(&defs, DuplicateScope::PerFile), set(&["foo"]));
    }

    #[test]
    fn per_file_scope_ignores_cross_file_redefinitions() {
        let defs = vec![def("a.sh", "log", 1), def("b.sh", "log", 1), def("b.sh", "warn", 3)];
        assert!(find_duplicates(&defs, DuplicateScope::PerFile).is_empty());
        assert_eq!(find_duplicates(&defs, DuplicateScope::Repository), set(&["log"]));
    }

    #[test]
    fn order_independent() {
        let defs = vec![
            def("a.sh", "x", 1),
            def("b.sh", "y", 1),
            def("a.sh", "y", 4),
            def("b.sh", "x", 7),
            def("a.sh", "z", 9),
        ];
        let mut reversed = defs.clone();
        reversed.reverse();
        let mut rotated = defs.clone();
        rotated.rotate_left(2);
        for scope in [DuplicateScope::PerFile, DuplicateScope::Repository] {
            let expected = find_duplicates(&defs, scope);
            assert_eq!(find_duplicates(&reversed, scope), expected);
            assert_eq!(find_duplicates(&rotated, scope), expected);
        }
    }

    #[test]
    fn locations_per_definition() {
        let defs = vec![def("a.sh", "foo", 3), def("b.sh", "foo", 2), def("a.sh", "foo", 10)];
        assert_eq!(
            duplicate_locations(&defs, DuplicateScope::PerFile),
            vec![DuplicateGroup {
                name: "foo".to_string(),
                locations: vec![("a.sh".to_string(), 3), ("a.sh".to_string(), 10)],
            }]
        );
        let repo = duplicate_locations(&defs, DuplicateScope::Repository);
        assert_eq!(repo[0].locations.len(), 3);
    }

    #[test]
    fn scope_parsing() {
        assert_eq!("file".parse::<DuplicateScope>(), Ok(DuplicateScope::PerFile));
        assert_eq!("repo".parse::<DuplicateScope>(), Ok(DuplicateScope::Repository));
        assert!("nope".parse::<DuplicateScope>().is_err());
        assert_eq!(DuplicateScope::Repository.to_string(), "repo");
    }
}
