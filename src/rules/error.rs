//! Rule file error types

use std::path::PathBuf;

use thiserror::Error;

use crate::error::WebError;

/// Errors raised while loading a rule file
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unknown module '{name}'")]
    UnknownModule { line: usize, name: String },

    #[error("line {line}: invalid arguments for {name}: {detail}")]
    InvalidModule {
        line: usize,
        name: String,
        detail: String,
    },

    #[error("line {line}: {detail}")]
    InvalidCondition { line: usize, detail: String },

    #[error("line {line}: invalid pattern for {key}: {source}")]
    InvalidPattern {
        line: usize,
        key: String,
        #[source]
        source: regex::Error,
    },
}

impl From<RuleError> for WebError {
    fn from(err: RuleError) -> Self {
        WebError::ConfigLoad(err.to_string())
    }
}
