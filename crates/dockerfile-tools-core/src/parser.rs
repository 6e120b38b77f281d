use tracing::debug;

use crate::error::Error;
use crate::lexer::{SourceLine, split_lines};
use crate::model::{Dockerfile, Node};

const REQUIRES_ARGUMENTS: &[&str] = &[
    "ADD",
    "ARG",
    "CMD",
    "COPY",
    "ENTRYPOINT",
    "ENV",
    "EXPOSE",
    "FROM",
    "HEALTHCHECK",
    "LABEL",
    "MAINTAINER",
    "ONBUILD",
    "RUN",
    "SHELL",
    "STOPSIGNAL",
    "USER",
    "VOLUME",
    "WORKDIR",
];

const ACCEPTS_JSON_FORM: &[&str] = &["ADD", "CMD", "COPY", "ENTRYPOINT", "RUN", "SHELL", "VOLUME"];

pub fn parse_dockerfile(input: &str) -> Result<Dockerfile, Error> {
    let lexed = split_lines(input)?;
    let escape = lexed.directives.escape;

    let mut root = Node::default();
    let mut comments = Vec::new();
    for line in lexed.lines {
        if line.is_comment {
            comments.push(line.text);
            continue;
        }

        let mut node = parse_instruction(&line, escape)?;
        node.prev_comment = std::mem::take(&mut comments);
        root.children.push(node);
    }

    if let (Some(first), Some(last)) = (root.children.first(), root.children.last()) {
        root.start_line = first.start_line;
        root.end_line = last.end_line;
    }

    debug!(
        instructions = root.children.len(),
        escape = %escape,
        "parsed dockerfile"
    );

    Ok(Dockerfile {
        ast: root,
        directives: lexed.directives,
    })
}

fn parse_instruction(line: &SourceLine, escape: char) -> Result<Node, Error> {
    let number = line.span.start;
    let text = line.text.as_str();
    let (keyword, rest) = match text.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest),
        None => (text, ""),
    };
    let keyword = keyword.to_ascii_uppercase();

    let (flags, rest) = split_flags(rest, escape);
    let unclosed_flag = flags
        .last()
        .is_some_and(|flag| token_end(flag, escape).is_err());
    if rest.is_empty() && unclosed_flag {
        debug!(line = number, "unterminated quote in flag, kept rest of line as the flag");
        let mut node = Node::token(keyword);
        node.flags = flags;
        return Ok(finish(node, line));
    }

    let (args, json) = match json_arguments(&keyword, rest) {
        Some(args) => (args, true),
        None => (
            tokenize(rest, escape).map_err(|msg| Error::parse(number, msg))?,
            false,
        ),
    };

    if !json && args.is_empty() && REQUIRES_ARGUMENTS.contains(&keyword.as_str()) {
        return Err(Error::parse(
            number,
            format!("{keyword} requires at least one argument"),
        ));
    }

    let mut node = Node::with_args(keyword, Node::chain(args));
    node.flags = flags;
    node.json = json;
    Ok(finish(node, line))
}

fn finish(mut node: Node, line: &SourceLine) -> Node {
    node.original = line.text.clone();
    node.start_line = line.span.start;
    node.end_line = line.span.end;
    node
}

/// Takes the `--flag` tokens directly after the keyword.
///
/// A flag with an unclosed quote runs to the end of the line and is kept
/// verbatim; whoever interprets the flag reports it.
fn split_flags(mut rest: &str, escape: char) -> (Vec<String>, &str) {
    let mut flags = Vec::new();
    loop {
        rest = rest.trim_start();
        if !rest.starts_with("--") {
            break;
        }

        let end = token_end(rest, escape).unwrap_or(rest.len());
        let token = &rest[..end];
        if token.len() <= 2 {
            break;
        }
        flags.push(token.to_string());
        rest = &rest[end..];
    }

    (flags, rest.trim())
}

fn json_arguments(keyword: &str, rest: &str) -> Option<Vec<String>> {
    if !rest.starts_with('[') || !ACCEPTS_JSON_FORM.contains(&keyword) {
        return None;
    }
    serde_json::from_str(rest).ok()
}

/// Splits on whitespace outside quotes. Quote characters stay in the token.
fn tokenize(mut rest: &str, escape: char) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(tokens);
        }

        let end = token_end(rest, escape)?;
        tokens.push(rest[..end].to_string());
        rest = &rest[end..];
    }
}

fn token_end(input: &str, escape: char) -> Result<usize, String> {
    let mut quote: Option<char> = None;
    let mut chars = input.char_indices();

    while let Some((index, ch)) = chars.next() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some('"') if ch == escape => {
                chars.next();
            }
            Some(_) => {}
            None if ch.is_whitespace() => return Ok(index),
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == escape => {
                chars.next();
            }
            None => {}
        }
    }

    match quote {
        Some(open) => Err(format!("unterminated quote ({open})")),
        None => Ok(input.len()),
    }
}
