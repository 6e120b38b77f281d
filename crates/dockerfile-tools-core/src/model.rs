use serde::Serialize;

use crate::lexer::Directives;

/// One instruction, or one token of an instruction's argument chain.
///
/// Only the root node has children. An instruction node's arguments hang off
/// `next` as an owned, singly-linked chain, so `FROM alpine AS build` is
/// `FROM -> alpine -> AS -> build`.
///
/// Dropping a chain is iterative, but serializing one nests a level per
/// token, so very long chains need a correspondingly large stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<Node>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub json: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub original: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prev_comment: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub start_line: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub end_line: usize,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl Node {
    pub fn token(text: impl Into<String>) -> Self {
        Self::with_args(text, None)
    }

    pub fn with_args(keyword: impl Into<String>, next: Option<Box<Node>>) -> Self {
        Self {
            keyword: keyword.into(),
            next,
            children: Vec::new(),
            flags: Vec::new(),
            json: false,
            original: String::new(),
            prev_comment: Vec::new(),
            start_line: 0,
            end_line: 0,
        }
    }

    /// Builds the argument chain for `tokens`, first token at the head.
    pub fn chain<I>(tokens: I) -> Option<Box<Node>>
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut head = None;
        for text in tokens.into_iter().rev() {
            head = Some(Box::new(Node::with_args(text, head)));
        }
        head
    }

    /// Iterates the argument chain after this node.
    pub fn args(&self) -> Args<'_> {
        Args {
            current: self.next.as_deref(),
        }
    }

    pub fn is_instruction(&self, keyword: &str) -> bool {
        self.keyword == keyword
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::token("")
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // Unlink iteratively so long chains don't recurse once per token.
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

pub struct Args<'a> {
    current: Option<&'a Node>,
}

impl<'a> Iterator for Args<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = node.next.as_deref();
        Some(node)
    }
}

/// A parsed document: the root node plus the directives found at its top.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dockerfile {
    pub ast: Node,
    pub directives: Directives,
}

impl Dockerfile {
    pub fn instructions(&self) -> impl Iterator<Item = &Node> {
        self.ast.children.iter()
    }
}
