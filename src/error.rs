//! Error types for each collaborator boundary.
//!
//! The engine never propagates these across a task boundary: the extractor
//! turns [`ReadError`] into a retry and [`ParseError`] into a permanent stop,
//! the loader turns [`WriteError`] into a logged, skipped batch. Only
//! [`ConfigError`] and sink-open failures reach the binary, which maps them
//! to exit statuses.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Transient failure reading a page from the source.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with error status {status}")]
    Status { url: String, status: u16 },

    #[error("source I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Structural failure: the payload does not match the expected encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot open output {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write to output: {0}")]
    Io(#[from] io::Error),

    #[error("output already closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("bad configuration file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
