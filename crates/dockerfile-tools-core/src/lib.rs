pub mod build_args;
pub mod cache_mount;
pub mod error;
pub mod exit_code;
pub mod lexer;
pub mod model;
pub mod ordered;
pub mod parser;
pub mod source;
pub mod stages;

pub use crate::build_args::{BuildArgs, Platform};
pub use crate::cache_mount::{CacheMounts, MountOptions, SkippedMount, list_cache_mounts};
pub use crate::error::{Error, LineSpan};
pub use crate::exit_code::ExitCode;
pub use crate::lexer::{Directives, SourceLine};
pub use crate::model::{Dockerfile, Node};
pub use crate::ordered::OrderedMap;
pub use crate::parser::parse_dockerfile;
pub use crate::source::Source;
pub use crate::stages::list_stages;
