//! Lexical scanning for bash sources.
//!
//! Produces a masked view of each line: comment text is split off, the
//! contents of quoted strings are blanked, and here-document bodies are
//! blanked entirely. Command substitutions inside double quotes (`"$(...)"`,
//! `` "`...`" ``) stay visible as code. Masked code keeps the byte length of
//! the raw line so columns line up with the original text.
//!
//! Quote handling follows bash: backslash is literal inside single quotes,
//! escapes the next character elsewhere, and `$'...'` honours escapes.

/// One scanned line of source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number
    pub number: usize,
    pub raw: &'a str,
    /// `raw` with comments and literal string contents replaced by spaces
    pub code: String,
    /// Text after the `#` of a comment that starts in code context
    pub comment: Option<&'a str>,
}

impl SourceLine<'_> {
    /// A line holding nothing but a comment.
    pub fn is_comment(&self) -> bool {
        self.comment.is_some() && self.code.trim().is_empty()
    }

    pub fn is_shebang(&self) -> bool {
        self.number == 1 && self.raw.starts_with("#!")
    }

    /// Comment text with the single space after `#` removed.
    pub fn comment_text(&self) -> Option<&str> {
        self.comment
            .map(|c| c.strip_prefix(' ').unwrap_or(c).trim_end())
    }
}

/// Scan a whole source text into masked lines.
pub fn scan(text: &str) -> Vec<SourceLine<'_>> {
    let mut scanner = Scanner::default();
    text.lines()
        .enumerate()
        .map(|(i, raw)| scanner.line(i + 1, raw))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// `$(...)` opened inside double quotes; counts nested parens
    Substitution(usize),
    /// `` `...` `` opened inside double quotes
    Backtick,
    Double,
    Single,
    AnsiC,
}

#[derive(Debug, Clone)]
struct Heredoc {
    delimiter: String,
    strip_tabs: bool,
}

#[derive(Debug, Default)]
struct Scanner {
    /// Empty stack means plain code
    stack: Vec<Context>,
    pending_heredocs: Vec<Heredoc>,
    active_heredoc: Option<Heredoc>,
}

impl Scanner {
    fn line<'a>(&mut self, number: usize, raw: &'a str) -> SourceLine<'a> {
        if let Some(doc) = self.active_heredoc.take() {
            let candidate = if doc.strip_tabs {
                raw.trim_start_matches('\t')
            } else {
                raw
            };
            if candidate != doc.delimiter {
                self.active_heredoc = Some(doc);
            } else {
                self.start_next_heredoc();
            }
            return SourceLine {
                number,
                raw,
                code: " ".repeat(raw.len()),
                comment: None,
            };
        }

        let mut code = String::with_capacity(raw.len());
        let mut comment = None;
        let chars: Vec<(usize, char)> = raw.char_indices().collect();
        let mut i = 0;

        while i < chars.len() {
            let (pos, ch) = chars[i];
            let next = chars.get(i + 1).map(|&(_, c)| c);

            match self.stack.last().copied() {
                None | Some(Context::Substitution(_)) | Some(Context::Backtick) => {
                    match ch {
                        '\\' => {
                            code.push(ch);
                            if let Some(c) = next {
                                // `\{`, `\}`, `\;` are literal; `\name` still runs `name`
                                if c.is_alphanumeric() || c == '_' {
                                    code.push(c);
                                } else {
                                    mask_char(&mut code, c);
                                }
                                i += 1;
                            }
                        }
                        '\'' => {
                            let ansi = i > 0 && chars[i - 1].1 == '$' && !is_escaped(&chars, i - 1);
                            self.stack.push(if ansi { Context::AnsiC } else { Context::Single });
                            code.push(ch);
                        }
                        '"' => {
                            self.stack.push(Context::Double);
                            code.push(ch);
                        }
                        '#' if i == 0 || starts_word(chars[i - 1].1) => {
                            comment = Some(&raw[pos + 1..]);
                            mask(&mut code, &raw[pos..]);
                            break;
                        }
                        '`' if self.stack.last() == Some(&Context::Backtick) => {
                            self.stack.pop();
                            code.push(ch);
                        }
                        '(' => {
                            if let Some(Context::Substitution(depth)) = self.stack.last_mut() {
                                *depth += 1;
                            }
                            code.push(ch);
                        }
                        ')' => {
                            if let Some(Context::Substitution(depth)) = self.stack.last_mut() {
                                if *depth == 0 {
                                    self.stack.pop();
                                } else {
                                    *depth -= 1;
                                }
                            }
                            code.push(ch);
                        }
                        '<' if next == Some('<')
                            && (i == 0 || chars[i - 1].1 != '<')
                            && chars.get(i + 2).map(|&(_, c)| c) != Some('<')
                            && !in_arithmetic(&code) =>
                        {
                            let consumed = self.heredoc_operator(&chars[i..]);
                            for &(_, c) in &chars[i..i + consumed] {
                                code.push(c);
                            }
                            i += consumed;
                            continue;
                        }
                        _ => code.push(ch),
                    }
                }
                Some(Context::Double) => match ch {
                    '\\' => {
                        mask_char(&mut code, ch);
                        if let Some(c) = next {
                            mask_char(&mut code, c);
                            i += 1;
                        }
                    }
                    '"' => {
                        self.stack.pop();
                        code.push(ch);
                    }
                    '$' if next == Some('(') => {
                        self.stack.push(Context::Substitution(0));
                        code.push_str("$(");
                        i += 1;
                    }
                    '`' => {
                        self.stack.push(Context::Backtick);
                        code.push(ch);
                    }
                    _ => mask_char(&mut code, ch),
                },
                Some(Context::Single) => {
                    if ch == '\'' {
                        self.stack.pop();
                        code.push(ch);
                    } else {
                        mask_char(&mut code, ch);
                    }
                }
                Some(Context::AnsiC) => match ch {
                    '\\' => {
                        mask_char(&mut code, ch);
                        if let Some(c) = next {
                            mask_char(&mut code, c);
                            i += 1;
                        }
                    }
                    '\'' => {
                        self.stack.pop();
                        code.push(ch);
                    }
                    _ => mask_char(&mut code, ch),
                },
            }
            i += 1;
        }

        if self.active_heredoc.is_none() {
            self.start_next_heredoc();
        }

        SourceLine {
            number,
            raw,
            code,
            comment,
        }
    }

    fn start_next_heredoc(&mut self) {
        if !self.pending_heredocs.is_empty() {
            self.active_heredoc = Some(self.pending_heredocs.remove(0));
        }
    }

    /// Record a `<<WORD` / `<<-WORD` operator starting at `chars[0]`.
    /// Returns the number of chars consumed, delimiter included.
    fn heredoc_operator(&mut self, chars: &[(usize, char)]) -> usize {
        let mut i = 2;
        let strip_tabs = chars.get(i).map(|&(_, c)| c) == Some('-');
        if strip_tabs {
            i += 1;
        }
        while chars.get(i).is_some_and(|&(_, c)| c == ' ' || c == '\t') {
            i += 1;
        }

        let mut delimiter = String::new();
        let mut quote: Option<char> = None;
        while let Some(&(_, c)) = chars.get(i) {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), c) => delimiter.push(c),
                (None, '\'' | '"') => quote = Some(c),
                (None, '\\') => {}
                (None, c) if c.is_whitespace() || ";&|()<>".contains(c) => break,
                (None, c) => delimiter.push(c),
            }
            i += 1;
        }

        if delimiter.is_empty() {
            // `<<` with no word (e.g. arithmetic shift); nothing to skip
            return 2;
        }
        self.pending_heredocs.push(Heredoc {
            delimiter,
            strip_tabs,
        });
        i
    }
}

/// Whether masked code so far leaves an `((` open, making `<<` a shift.
fn in_arithmetic(code: &str) -> bool {
    code.matches("((").count() > code.matches("))").count()
}

/// Whether a `#` following this character begins a comment.
fn starts_word(prev: char) -> bool {
    prev.is_whitespace() || ";&|()<>".contains(prev)
}

/// Count consecutive preceding backslashes. Odd = escaped, even = not.
fn is_escaped(chars: &[(usize, char)], i: usize) -> bool {
    let mut backslashes = 0;
    let mut j = i;
    while j > 0 && chars[j - 1].1 == '\\' {
        backslashes += 1;
        j -= 1;
    }
    backslashes % 2 == 1
}

fn mask_char(code: &mut String, ch: char) {
    for _ in 0..ch.len_utf8() {
        code.push(' ');
    }
}

fn mask(code: &mut String, text: &str) {
    code.extend(std::iter::repeat(' ').take(text.len()));
}
