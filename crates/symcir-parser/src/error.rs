//! Error types for symcir-parser.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("library '{0}' not found")]
    LibraryNotFound(String),

    #[error("recursive library reference: {0}")]
    RecursiveLibrary(PathBuf),

    #[error(transparent)]
    Core(#[from] symcir_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
