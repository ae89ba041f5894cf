//! Utility dependency mapping.
//!
//! A [`Catalog`] maps utility function names to the files defining them.
//! [`Catalog::dependencies_of`] tokenizes the masked code of an analyzed
//! file and keeps every catalog name that appears as a whole word in command
//! position, so comments, string literals, plain arguments and `case`
//! patterns never count while command substitutions do.

use crate::error::CatalogError;
use crate::model::{BashFunction, FileDependencies};
use crate::scan::scan;
use std::collections::{BTreeMap, BTreeSet};

/// Known utility functions and their defining files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from extractor output over the utility directory.
    pub fn from_functions(functions: &[BashFunction]) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for func in functions {
            catalog.insert(&func.name, &func.file)?;
        }
        tracing::debug!(functions = catalog.len(), files = catalog.files().len(), "built utility catalog");
        Ok(catalog)
    }

    pub fn insert(&mut self, name: &str, file: &str) -> Result<(), CatalogError> {
        if name.is_empty() {
            return Err(CatalogError::EmptyName {
                file: file.to_string(),
            });
        }
        if file.is_empty() {
            return Err(CatalogError::MissingFile {
                name: name.to_string(),
            });
        }
        self.entries
            .entry(name.to_string())
            .or_default()
            .insert(file.to_string());
        Ok(())
    }

    /// Number of distinct function names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files defining `name`, if it is catalogued.
    pub fn defining_files(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(name)
    }

    /// Every file contributing at least one function.
    pub fn files(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Utility functions invoked by `text`, and the files defining them.
    ///
    /// Entries defined in `file` itself are skipped. A name defined in several
    /// utility files records all of them.
    pub fn dependencies_of(&self, file: &str, text: &str) -> FileDependencies {
        let mut deps = FileDependencies::new(file);

        let mut commands = CommandTokens::default();
        for line in scan(text) {
            for token in commands.calls(&line.code) {
                let Some(defining) = self.entries.get(token) else {
                    continue;
                };
                let mut used = false;
                for def_file in defining.iter().filter(|f| f.as_str() != file) {
                    deps.files.insert(def_file.clone());
                    used = true;
                }
                if used && deps.functions.insert(token.to_string()) {
                    tracing::trace!(file, line = line.number, function = token, "utility call");
                }
            }
        }

        tracing::debug!(
            file,
            functions = deps.functions.len(),
            files = deps.files.len(),
            "mapped dependencies"
        );
        deps
    }
}

/// Build a catalog from `utilities` and map the dependencies of one file.
pub fn map_dependencies(
    file: &str,
    text: &str,
    utilities: &[BashFunction],
) -> Result<FileDependencies, CatalogError> {
    Ok(Catalog::from_functions(utilities)?.dependencies_of(file, text))
}

/// Characters that end a word in masked code.
fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || b";&|()<>{}'\"`".contains(&b)
}

/// Reserved words after which a command name may follow.
const COMMAND_KEYWORDS: &[&str] = &["if", "then", "else", "elif", "do", "while", "until", "!", "time"];

/// Commands whose first operand (after options) is itself a command name.
const COMMAND_WRAPPERS: &[&str] = &["command", "exec", "nohup", "xargs", "trap"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaseState {
    /// Between `case` and `in`
    Subject,
    /// Reading `pat|pat)` before an arm body
    Pattern,
    Body,
}

/// Tracks command position across the masked lines of one file.
#[derive(Debug)]
struct CommandTokens {
    case_stack: Vec<CaseState>,
    command_pos: bool,
    /// Previous line ended with a `\` continuation
    continued: bool,
    /// Inside an `name=( ... )` array literal
    in_array: bool,
}

impl Default for CommandTokens {
    fn default() -> Self {
        Self {
            case_stack: Vec::new(),
            command_pos: true,
            continued: false,
            in_array: false,
        }
    }
}

impl CommandTokens {
    fn in_pattern(&self) -> bool {
        matches!(self.case_stack.last(), Some(CaseState::Subject | CaseState::Pattern))
    }

    fn set_case(&mut self, state: CaseState) {
        if let Some(top) = self.case_stack.last_mut() {
            *top = state;
        }
    }

    /// Words of one masked line that sit in command position.
    ///
    /// Skips arguments, `case` patterns, array elements, variable references
    /// (`$name`, `${name...}`) and the names of definition headers
    /// (`name()`, `function name`).
    fn calls<'a>(&mut self, code: &'a str) -> Vec<&'a str> {
        let bytes = code.as_bytes();
        let mut tokens = Vec::new();
        let mut after_dollar = false;
        let mut after_function_keyword = false;
        let mut after_wrapper = false;
        let mut redirect_target = false;
        let mut in_backtick = false;
        let mut prev = 0u8;
        let mut i = 0;

        if !self.continued {
            self.command_pos = true;
        }

        while i < bytes.len() {
            let b = bytes[i];
            if b.is_ascii_whitespace() {
                i += 1;
                continue;
            }
            if b == b'$' {
                after_dollar = true;
                prev = b;
                i += 1;
                continue;
            }
            if is_delimiter(b) {
                let next = bytes.get(i + 1).copied();
                self.delimiter(b, prev, next, after_dollar, &mut in_backtick);
                if b == b';' && matches!(next, Some(b';' | b'&')) {
                    i += 1;
                }
                if !(after_dollar && b == b'{') {
                    after_dollar = false;
                }
                redirect_target = matches!(b, b'<' | b'>') && next != Some(b'(');
                if b != b'<' && b != b'>' {
                    after_wrapper = false;
                }
                prev = b;
                i += 1;
                continue;
            }

            let start = i;
            while i < bytes.len() && !is_delimiter(bytes[i]) && bytes[i] != b'$' {
                i += 1;
            }
            let token = &code[start..i];
            let is_reference = after_dollar;
            let is_redirect_target = redirect_target;
            let is_definition = after_function_keyword || is_definition_header(&code[i..]);
            after_dollar = false;
            redirect_target = false;
            after_function_keyword = false;
            prev = bytes[i - 1];

            if self.in_array || is_redirect_target {
                continue;
            }
            match self.case_stack.last() {
                Some(CaseState::Subject) => {
                    if token == "in" {
                        self.set_case(CaseState::Pattern);
                    }
                    continue;
                }
                Some(CaseState::Pattern) => {
                    if token == "esac" {
                        self.case_stack.pop();
                        self.command_pos = false;
                    }
                    continue;
                }
                _ => {}
            }
            if is_reference || !self.command_pos {
                self.command_pos = false;
                continue;
            }

            match token {
                "case" => {
                    self.case_stack.push(CaseState::Subject);
                    self.command_pos = false;
                }
                "esac" => {
                    self.case_stack.pop();
                    self.command_pos = false;
                }
                "function" => after_function_keyword = true,
                _ if COMMAND_KEYWORDS.contains(&token) => {}
                _ if COMMAND_WRAPPERS.contains(&token) => after_wrapper = true,
                _ if after_wrapper && token.starts_with('-') => {}
                _ if is_assignment(token) => {}
                // Stay in command position so the `{` of the body opens a command
                _ if is_definition => {}
                _ => {
                    tokens.push(token);
                    after_wrapper = false;
                    self.command_pos = false;
                }
            }
        }

        self.continued = code.trim_end().ends_with('\\');
        tokens
    }

    fn delimiter(&mut self, b: u8, prev: u8, next: Option<u8>, after_dollar: bool, in_backtick: &mut bool) {
        if self.in_array {
            if b == b')' {
                self.in_array = false;
                self.command_pos = false;
            }
            return;
        }
        if self.in_pattern() {
            if b == b')' && self.case_stack.last() == Some(&CaseState::Pattern) {
                self.set_case(CaseState::Body);
                self.command_pos = true;
            }
            return;
        }
        match b {
            b';' => {
                // `;;`, `;&` and `;;&` end a case arm
                if matches!(next, Some(b';' | b'&')) && self.case_stack.last() == Some(&CaseState::Body) {
                    self.set_case(CaseState::Pattern);
                }
                self.command_pos = true;
            }
            b'&' if prev == b'>' || prev == b'<' => {}
            b'|' | b'&' => self.command_pos = true,
            b'(' if prev == b'=' => self.in_array = true,
            b'(' if matches!(prev, b'$' | b'<' | b'>') || self.command_pos => self.command_pos = true,
            b'{' if !after_dollar && (self.command_pos || prev == b')') => self.command_pos = true,
            b'`' => {
                *in_backtick = !*in_backtick;
                self.command_pos = *in_backtick;
            }
            b'"' | b'\'' | b')' | b'}' => self.command_pos = false,
            _ => {}
        }
    }
}

/// `name=value`, `name+=value` or `name[i]=value`.
fn is_assignment(token: &str) -> bool {
    let Some((lhs, _)) = token.split_once('=') else {
        return false;
    };
    let lhs = lhs.strip_suffix('+').unwrap_or(lhs);
    let name = lhs.split('[').next().unwrap_or(lhs);
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether the text right after a word is an empty `()` pair.
fn is_definition_header(rest: &str) -> bool {
    rest.trim_start()
        .strip_prefix('(')
        .is_some_and(|r| r.trim_start().starts_with(')'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_functions;
    use pretty_assertions::assert_eq;

    fn catalog(entries: &[(&str, &str)]) -> Catalog {
        let mut catalog = Catalog::new();
        for (name, file) in entries {
            catalog.insert(name, file).unwrap();
        }
        catalog
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn strings_scenario() {
        let utils = extract_functions("strings.sh", "# Arguments: str\ntrim() {\n  echo \"$1\"\n}\n").unwrap();
        let deps = map_dependencies("main.sh", "x=\"  hi \"\ntrim \"$x\"\n", &utils).unwrap();
        assert_eq!(deps.file, "main.sh");
        assert_eq!(deps.files, set(&["strings.sh"]));
        assert_eq!(deps.functions, set(&["trim"]));
    }

    #[test]
    fn token_boundaries() {
        let catalog = catalog(&[("log", "log.sh"), ("logger_init", "logger.sh")]);
        let deps = catalog.dependencies_of("main.sh", "logger_init\necho logging\n");
        assert_eq!(deps.functions, set(&["logger_init"]));
        assert_eq!(deps.files, set(&["logger.sh"]));
    }

    #[test]
    fn comments_and_strings_do_not_count() {
        let catalog = catalog(&[("trim", "strings.sh")]);
        let text = "# trim the input\necho \"trim me\" 'trim'\ncat <<EOF\ntrim\nEOF\n";
        assert!(catalog.dependencies_of("main.sh", text).is_empty());
    }

    #[test]
    fn command_substitutions_count() {
        let catalog = catalog(&[("trim", "strings.sh"), ("upper", "case.sh"), ("lower", "case.sh")]);
        let text = "a=\"$(trim \"$x\")\"\nb=`upper y`\nc=$(lower z)\n";
        let deps = catalog.dependencies_of("main.sh", text);
        assert_eq!(deps.functions, set(&["lower", "trim", "upper"]));
        assert_eq!(deps.files, set(&["case.sh", "strings.sh"]));
    }

    #[test]
    fn calls_after_separators_and_in_pipelines() {
        let catalog = catalog(&[("a", "u.sh"), ("b", "u.sh"), ("c", "u.sh"), ("d", "u.sh")]);
        let deps = catalog.dependencies_of("main.sh", "x && a; echo | b\nif c; then { d; }; fi\n");
        assert_eq!(deps.functions, set(&["a", "b", "c", "d"]));
    }

    #[test]
    fn arguments_and_case_patterns_are_not_calls() {
        let catalog = catalog(&[("log", "log.sh"), ("trim", "strings.sh")]);
        let text = "mkdir -p log\ncase $x in\n  trim) echo ;;\n  log|other) : ;;\nesac\n";
        let deps = catalog.dependencies_of("main.sh", text);
        assert!(deps.is_empty(), "{deps:?}");
    }

    #[test]
    fn case_arm_bodies_are_commands() {
        let catalog = catalog(&[("log", "log.sh"), ("trim", "strings.sh")]);
        let text = "case $1 in\n  -t) trim \"$2\" ;;\n  *)\n    log oops\n    ;;\nesac\nlog done\n";
        let deps = catalog.dependencies_of("main.sh", text);
        assert_eq!(deps.functions, set(&["log", "trim"]));
    }

    #[test]
    fn array_elements_are_not_calls() {
        let catalog = catalog(&[("trim", "strings.sh"), ("log", "log.sh")]);
        let deps = catalog.dependencies_of("main.sh", "steps=(trim\n  log)\nsteps+=(trim)\n");
        assert!(deps.is_empty(), "{deps:?}");
    }

    #[test]
    fn wrapped_commands_count() {
        let catalog = catalog(&[("trim", "strings.sh"), ("cleanup", "exit.sh"), ("log", "log.sh")]);
        let text = "trap cleanup EXIT\nprintf '%s' x | xargs -0 trim\ncommand log hi\n";
        let deps = catalog.dependencies_of("main.sh", text);
        assert_eq!(deps.functions, set(&["cleanup", "log", "trim"]));
    }

    #[test]
    fn calls_inside_one_line_bodies_and_after_assignments() {
        let catalog = catalog(&[("trim", "strings.sh"), ("log", "log.sh")]);
        let text = "pad() { trim \"$1\"; }\nfunction warn { LEVEL=warn log \"$@\"; }\n";
        let deps = catalog.dependencies_of("main.sh", text);
        assert_eq!(deps.functions, set(&["log", "trim"]));
    }

    #[test]
    fn continuation_lines_hold_arguments() {
        let catalog = catalog(&[("log", "log.sh")]);
        let deps = catalog.dependencies_of("main.sh", "tar -czf out.tgz \\\n  log\n");
        assert!(deps.is_empty(), "{deps:?}");
    }

    #[test]
    fn redirect_targets_are_not_calls() {
        let catalog = catalog(&[("log", "log.sh")]);
        let deps = catalog.dependencies_of("main.sh", "echo hi > log 2>&1\n> log\n");
        assert!(deps.is_empty(), "{deps:?}");
    }

    #[test]
    fn variable_references_are_not_calls() {
        let catalog = catalog(&[("trim", "strings.sh")]);
        let deps = catalog.dependencies_of("main.sh", "echo $trim ${trim} ${#trim} ${trim:-x}\n");
        assert!(deps.is_empty(), "{deps:?}");
    }

    #[test]
    fn assignments_and_paths_are_not_calls() {
        let catalog = catalog(&[("trim", "strings.sh")]);
        let deps = catalog.dependencies_of("main.sh", "x=trim\n./trim --trim\n");
        assert!(deps.is_empty(), "{deps:?}");
    }

    #[test]
    fn local_definitions_are_not_calls() {
        let catalog = catalog(&[("trim", "strings.sh"), ("log", "log.sh")]);
        let deps = catalog.dependencies_of("main.sh", "trim() { :; }\nfunction log {\n :\n}\n");
        assert!(deps.is_empty(), "{deps:?}");
    }

    #[test]
    fn self_references_are_skipped() {
        let catalog = catalog(&[("trim", "strings.sh"), ("pad", "strings.sh"), ("log", "log.sh")]);
        let deps = catalog.dependencies_of("strings.sh", "pad() {\n  trim \"$1\"\n  log x\n}\n");
        assert_eq!(deps.functions, set(&["log"]));
        assert_eq!(deps.files, set(&["log.sh"]));
    }

    #[test]
    fn multiply_defined_names_record_every_file() {
        let catalog = catalog(&[("log", "a.sh"), ("log", "b.sh")]);
        let deps = catalog.dependencies_of("main.sh", "log hi\n");
        assert_eq!(deps.files, set(&["a.sh", "b.sh"]));
    }

    #[test]
    fn files_are_closed_over_functions() {
        let catalog = catalog(&[("a", "one.sh"), ("b", "two.sh"), ("c", "three.sh")]);
        let deps = catalog.dependencies_of("main.sh", "a\nc\n");
        let expected: BTreeSet<String> = deps
            .functions
            .iter()
            .flat_map(|f| catalog.defining_files(f).into_iter().flatten().cloned())
            .collect();
        assert_eq!(deps.files, expected);
    }

    #[test]
    fn no_matches_is_empty_not_error() {
        let deps = map_dependencies("main.sh", "echo hi\n", &[]).unwrap();
        assert!(deps.files.is_empty());
        assert!(deps.functions.is_empty());
    }

    #[test]
    fn catalog_entry_without_file_is_rejected() {
        let mut bad = extract_functions("strings.sh", "trim() { :; }\n").unwrap();
        bad[0].file.clear();
        let err = map_dependencies("main.sh", "trim\n", &bad).unwrap_err();
        assert_eq!(err, CatalogError::MissingFile { name: "trim".to_string() });
    }

    #[test]
    fn catalog_entry_without_name_is_rejected() {
        let err = Catalog::new().insert("", "strings.sh").unwrap_err();
        assert!(matches!(err, CatalogError::EmptyName { .. }));
    }

    #[test]
    fn catalog_files() {
        let catalog = catalog(&[("a", "one.sh"), ("b", "one.sh"), ("c", "two.sh")]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.files().into_iter().collect::<Vec<_>>(), vec!["one.sh", "two.sh"]);
    }
}
