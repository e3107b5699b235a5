use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("chunk size must be a positive number, got {0}")]
    #[diagnostic(help("pass --chunk-size with a value of 1 or more"))]
    InvalidChunkSize(usize),

    #[error("max symbols per line must be a positive number, got {0}")]
    #[diagnostic(help("pass --max-symbols with a value of 1 or more"))]
    InvalidLineWidth(usize),

    #[error("worker count must be a positive number, got {0}")]
    InvalidWorkerCount(usize),

    #[error("missing required option: {0}")]
    MissingOption(&'static str),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read accession list at {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("cannot create output directory {0}")]
    OutputDir(String),

    #[error("failed to read API key at {path}: {message}")]
    ApiKeyRead { path: PathBuf, message: String },

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("result writer stopped unexpectedly")]
    SinkCrashed,

    #[error("interrupted")]
    Interrupted,
}
