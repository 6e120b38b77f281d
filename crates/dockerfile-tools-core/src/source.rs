use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;

/// Dockerfile contents together with the absolute path they were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub contents: String,
}

impl Source {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let path = std::path::absolute(path).map_err(|err| Error::path_resolution(path, err))?;
        let contents = std::fs::read_to_string(&path).map_err(|err| Error::read(&path, err))?;
        debug!(path = %path.display(), bytes = contents.len(), "read dockerfile");
        Ok(Self { path, contents })
    }
}
