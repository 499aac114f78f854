//! Error taxonomy shared by every pipeline stage.
//!
//! Each stage either succeeds (possibly with an empty result) or fails with
//! one of three categories, so a caller can tell "no file" from "bad data"
//! from "computation could not proceed".

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A required input file is missing from every candidate location.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    /// The file exists but its contents could not be parsed.
    #[error("parse failure: {0}")]
    ParseFailure(String),
    /// An aggregation or metric step hit an unexpected shape.
    #[error("compute failure: {0}")]
    ComputeFailure(String),
}

/// Category of a [`PipelineError`], without its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataUnavailable,
    ParseFailure,
    ComputeFailure,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            PipelineError::ParseFailure(_) => ErrorKind::ParseFailure,
            PipelineError::ComputeFailure(_) => ErrorKind::ComputeFailure,
        }
    }

    pub(crate) fn parse(context: &str, err: impl std::fmt::Display) -> Self {
        PipelineError::ParseFailure(format!("{context}: {err}"))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
