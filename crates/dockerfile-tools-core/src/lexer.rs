//! Splits Dockerfile source into logical lines.
//!
//! Physical lines ending in the escape character are joined with the line
//! that follows. Comment lines are kept as inert [`SourceLine`]s so the parser
//! can attach them to the next instruction, and the comments at the top of
//! the file are scanned for parser directives (`# escape=`, `# syntax=`).

use std::iter::Enumerate;
use std::str::Lines;

use tracing::{debug, warn};

use crate::error::{Error, LineSpan};

pub const DEFAULT_ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub escape: char,
    pub syntax: Option<String>,
}

impl Default for Directives {
    fn default() -> Self {
        Self {
            escape: DEFAULT_ESCAPE,
            syntax: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub text: String,
    pub span: LineSpan,
    pub is_comment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lexed {
    pub directives: Directives,
    pub lines: Vec<SourceLine>,
}

pub fn split_lines(input: &str) -> Result<Lexed, Error> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut lexer = Lexer::new(input);

    let mut lines = Vec::new();
    while let Some(line) = lexer.next_line()? {
        lines.push(line);
    }

    Ok(Lexed {
        directives: lexer.directives,
        lines,
    })
}

struct Lexer<'a> {
    physical: Enumerate<Lines<'a>>,
    directives: Directives,
    seen_escape: bool,
    seen_syntax: bool,
    in_header: bool,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            physical: input.lines().enumerate(),
            directives: Directives::default(),
            seen_escape: false,
            seen_syntax: false,
            in_header: true,
        }
    }

    fn next_physical(&mut self) -> Option<(usize, &'a str)> {
        self.physical.next().map(|(index, line)| (index + 1, line))
    }

    fn next_line(&mut self) -> Result<Option<SourceLine>, Error> {
        while let Some((number, raw)) = self.next_physical() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(comment) = trimmed.strip_prefix('#') {
                if self.in_header {
                    self.directive(number, comment)?;
                }
                return Ok(Some(SourceLine {
                    text: comment.trim().to_string(),
                    span: LineSpan::single(number),
                    is_comment: true,
                }));
            }

            self.in_header = false;
            return self.join(number, raw).map(Some);
        }

        Ok(None)
    }

    fn join(&mut self, start: usize, first: &'a str) -> Result<SourceLine, Error> {
        let mut text = String::new();
        let mut end = start;
        let mut current = first;

        while let Some(head) = strip_continuation(current, self.directives.escape) {
            text.push_str(head);
            let (number, raw) = self.next_continued(end)?;
            end = number;
            current = raw;
        }
        text.push_str(current);

        Ok(SourceLine {
            text: text.trim().to_string(),
            span: LineSpan::new(start, end),
            is_comment: false,
        })
    }

    fn next_continued(&mut self, last: usize) -> Result<(usize, &'a str), Error> {
        while let Some((number, raw)) = self.next_physical() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                warn!(line = number, "empty continuation line");
                continue;
            }
            if trimmed.starts_with('#') {
                debug!(line = number, "dropping comment inside line continuation");
                continue;
            }
            return Ok((number, raw));
        }

        Err(Error::lex(last, "unterminated line continuation at end of file"))
    }

    fn directive(&mut self, line: usize, comment: &str) -> Result<(), Error> {
        let Some((name, value)) = comment.split_once('=') else {
            return Ok(());
        };
        let name = name.trim();
        let value = value.trim();
        if !is_directive_name(name) || value.is_empty() {
            return Ok(());
        }

        match name.to_ascii_lowercase().as_str() {
            "escape" => {
                if self.seen_escape {
                    return Err(Error::lex(line, "only one escape parser directive can be used"));
                }
                self.directives.escape = match value {
                    "\\" => '\\',
                    "`" => '`',
                    other => {
                        return Err(Error::lex(
                            line,
                            format!("invalid escape token '{other}' does not match ` or \\"),
                        ));
                    }
                };
                self.seen_escape = true;
            }
            "syntax" => {
                if self.seen_syntax {
                    return Err(Error::lex(line, "only one syntax parser directive can be used"));
                }
                self.directives.syntax = Some(value.to_string());
                self.seen_syntax = true;
            }
            other => debug!(line, directive = other, "ignoring unknown parser directive"),
        }

        Ok(())
    }
}

fn is_directive_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric())
}

/// Returns the line without its continuation marker when it ends in an
/// unescaped escape character (trailing blanks allowed).
fn strip_continuation(line: &str, escape: char) -> Option<&str> {
    let body = line.trim_end_matches([' ', '\t', '\r']);
    let run = body.chars().rev().take_while(|ch| *ch == escape).count();
    (run % 2 == 1).then(|| &body[..body.len() - escape.len_utf8()])
}
