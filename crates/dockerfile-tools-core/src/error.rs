use core::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn single(line: usize) -> Self {
        Self::new(line, line)
    }
}

#[derive(Debug)]
pub enum Error {
    PathResolution {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Lex {
        line: usize,
        msg: String,
    },
    Parse {
        line: usize,
        msg: String,
    },
    OptionParse {
        flag: String,
        msg: String,
    },
}

impl Error {
    pub fn path_resolution(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PathResolution {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn lex(line: usize, msg: impl Into<String>) -> Self {
        Self::Lex {
            line,
            msg: msg.into(),
        }
    }

    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        Self::Parse {
            line,
            msg: msg.into(),
        }
    }

    pub fn option_parse(flag: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::OptionParse {
            flag: flag.into(),
            msg: msg.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathResolution { path, source } => {
                write!(f, "error resolving path '{}': {source}", path.display())
            }
            Self::Read { path, source } => {
                write!(f, "error reading Dockerfile at '{}': {source}", path.display())
            }
            Self::Lex { line, msg } => write!(f, "dockerfile lex error at line {line}: {msg}"),
            Self::Parse { line, msg } => {
                write!(f, "dockerfile parse error at line {line}: {msg}")
            }
            Self::OptionParse { flag, msg } => {
                write!(f, "invalid mount options in '{flag}': {msg}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PathResolution { source, .. } | Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}
