//! Function extraction — one pass over the masked lines of a script.
//!
//! Recognizes `name() { ... }`, `function name { ... }` and
//! `function name() { ... }`, with the opening brace either on the header
//! line or on a following line. Bodies are delimited by brace depth counted
//! over masked code, so braces inside strings, comments, heredocs and
//! `${...}` expansions never count. Definitions nested inside another
//! function body are part of that body and are not reported.

use crate::duplicates::DuplicateScope;
use crate::error::ParseError;
use crate::model::{BashFunction, FunctionSummary};
use crate::scan::{scan, SourceLine};
use regex::Regex;
use std::sync::LazyLock;

// `function name`, `function name()` or `name()`, then an optional `{`
static RE_FUNC_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[[:blank:]]*(?:",
        r"function[[:blank:]]+([A-Za-z0-9_:.@+][A-Za-z0-9_:.@+-]*)(?:[[:blank:]]*\([[:blank:]]*\))?",
        r"|([A-Za-z0-9_:.@+][A-Za-z0-9_:.@+-]*)[[:blank:]]*\([[:blank:]]*\)",
        r")[[:blank:]]*(\{)?"
    ))
    .unwrap()
});

static RE_ARGUMENTS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[[:blank:]]*arguments?[[:blank:]]*:[[:blank:]]*(.*)$").unwrap());

/// Extract every top-level function definition from a script.
pub fn extract_functions(file: &str, text: &str) -> Result<Vec<BashFunction>, ParseError> {
    let lines = scan(text);
    let mut state = ExtractState::new(file);

    for (idx, line) in lines.iter().enumerate() {
        state.process_line(&lines[..idx], line)?;
    }
    state.finish(lines.last().map_or(0, |l| l.number))?;

    tracing::debug!(file, count = state.functions.len(), "extracted functions");
    Ok(state.functions)
}

/// Extract a single file and summarize it.
pub fn summarize(file: &str, text: &str, scope: DuplicateScope) -> Result<FunctionSummary, ParseError> {
    Ok(FunctionSummary::new(extract_functions(file, text)?, scope))
}

/// A definition whose header has been seen but whose body is still open.
#[derive(Debug)]
struct OpenFunction {
    name: String,
    start: usize,
    start_block: usize,
    description: Option<String>,
    arguments: Option<String>,
}

struct ExtractState<'f> {
    file: &'f str,
    functions: Vec<BashFunction>,
    /// Header seen, `{` expected on a later line
    awaiting_brace: Option<OpenFunction>,
    /// Function body currently open, with the brace depth outside it
    body: Option<(OpenFunction, usize)>,
    /// Block braces currently open, bodies and groups alike
    depth: usize,
    /// Open `${...}` expansions
    param_depth: usize,
}

impl<'f> ExtractState<'f> {
    fn new(file: &'f str) -> Self {
        Self {
            file,
            functions: Vec::new(),
            awaiting_brace: None,
            body: None,
            depth: 0,
            param_depth: 0,
        }
    }

    fn process_line(&mut self, preceding: &[SourceLine<'_>], line: &SourceLine<'_>) -> Result<(), ParseError> {
        let code = line.code.as_str();
        let mut pos = 0;

        if let Some(pending) = self.awaiting_brace.take() {
            let trimmed = code.trim_start();
            if trimmed.is_empty() {
                self.awaiting_brace = Some(pending);
                return Ok(());
            }
            if !trimmed.starts_with('{') {
                return Err(ParseError::new(
                    self.file,
                    line.number,
                    format!("expected `{{` to open the body of function `{}`", pending.name),
                ));
            }
            pos = code.len() - trimmed.len() + 1;
            self.open_body(pending);
        }

        loop {
            if self.body.is_none() {
                if let Some(caps) = RE_FUNC_HEADER.captures(&code[pos..]) {
                    let name = caps
                        .get(1)
                        .or_else(|| caps.get(2))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    let header_end = pos + caps.get(0).map_or(0, |m| m.end());
                    let pending = if pos == 0 {
                        self.with_comment_block(name, line.number, preceding)
                    } else {
                        OpenFunction {
                            name,
                            start: line.number,
                            start_block: line.number,
                            description: None,
                            arguments: None,
                        }
                    };

                    if caps.get(3).is_some() {
                        pos = header_end;
                        self.open_body(pending);
                    } else if code[header_end..].trim().is_empty() {
                        self.awaiting_brace = Some(pending);
                        return Ok(());
                    } else {
                        return Err(ParseError::new(
                            self.file,
                            line.number,
                            format!("expected `{{` to open the body of function `{}`", pending.name),
                        ));
                    }
                }
            }

            match self.scan_braces(code, pos, line.number) {
                // A body closed mid-line; look for another definition after it
                Some(rest) => pos = skip_separators(code, rest),
                None => return Ok(()),
            }
        }
    }

    fn open_body(&mut self, pending: OpenFunction) {
        self.body = Some((pending, self.depth));
        self.depth += 1;
    }

    /// Update brace depth over `code[from..]`. Returns the position just past
    /// the `}` that closes the current function body, if one closes here.
    fn scan_braces(&mut self, code: &str, from: usize, line_number: usize) -> Option<usize> {
        let bytes = code.as_bytes();
        for i in from..bytes.len() {
            match bytes[i] {
                b'{' if i > 0 && bytes[i - 1] == b'$' => self.param_depth += 1,
                b'{' if self.param_depth == 0 => self.depth += 1,
                b'}' if self.param_depth > 0 => self.param_depth -= 1,
                b'}' => {
                    if self.depth == 0 {
                        tracing::trace!(file = self.file, line = line_number, "unmatched `}}` at top level");
                        continue;
                    }
                    self.depth -= 1;
                    if self.body.as_ref().is_some_and(|(_, base)| *base == self.depth) {
                        if let Some((open, _)) = self.body.take() {
                            self.close(open, line_number);
                        }
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn close(&mut self, open: OpenFunction, end: usize) {
        self.functions.push(BashFunction {
            name: open.name,
            arguments: open.arguments,
            description: open.description,
            file: self.file.to_string(),
            start_block: open.start_block,
            start: open.start,
            end,
        });
    }

    fn with_comment_block(&self, name: String, start: usize, preceding: &[SourceLine<'_>]) -> OpenFunction {
        let block: Vec<&SourceLine<'_>> = {
            let mut block: Vec<_> = preceding
                .iter()
                .rev()
                .take_while(|l| l.is_comment() && !l.is_shebang())
                .collect();
            block.reverse();
            block
        };
        let start_block = block.first().map_or(start, |l| l.number);
        let texts: Vec<&str> = block.iter().filter_map(|l| l.comment_text()).collect();
        let (description, arguments) = split_comment_block(&texts);

        OpenFunction {
            name,
            start,
            start_block,
            description,
            arguments,
        }
    }

    fn finish(&mut self, last_line: usize) -> Result<(), ParseError> {
        if let Some(pending) = self.awaiting_brace.take() {
            return Err(ParseError::new(
                self.file,
                last_line,
                format!(
                    "reached end of input before the body of function `{}` (line {})",
                    pending.name, pending.start
                ),
            ));
        }
        if let Some((open, _)) = self.body.take() {
            return Err(ParseError::new(
                self.file,
                last_line,
                format!(
                    "unterminated body of function `{}` starting at line {}",
                    open.name, open.start
                ),
            ));
        }
        Ok(())
    }
}

/// Split comment text into the description and the `Arguments:` section.
fn split_comment_block(texts: &[&str]) -> (Option<String>, Option<String>) {
    let marker = texts
        .iter()
        .enumerate()
        .find_map(|(i, t)| RE_ARGUMENTS_MARKER.captures(t).map(|caps| (i, caps)));

    match marker {
        Some((i, caps)) => {
            let mut arguments = vec![caps.get(1).map_or("", |m| m.as_str())];
            arguments.extend_from_slice(&texts[i + 1..]);
            (join_text(&texts[..i]), join_text(&arguments))
        }
        None => (join_text(texts), None),
    }
}

fn join_text(lines: &[&str]) -> Option<String> {
    let joined = lines.join("\n");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Skip whitespace and command separators after a closing brace.
fn skip_separators(code: &str, from: usize) -> usize {
    let rest = &code[from..];
    let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';' || c == '&');
    from + rest.len() - trimmed.len()
}
