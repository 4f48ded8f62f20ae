//! Diagnostic rendering for parse failures.

use miette::{Diagnostic, SourceSpan};
use pybundle_core::BundleError;
use thiserror::Error;

/// A parse failure with its source attached, renderable by `miette`.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(pybundle::parser::error))]
pub struct ParseError {
    pub message: String,

    #[source_code]
    pub src: String,

    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, src: &str, offset: usize) -> Self {
        Self {
            message: message.into(),
            src: src.to_string(),
            span: Some(SourceSpan::from(offset..(offset + 1).min(src.len()))),
        }
    }

    /// Attaches `src` to a [`BundleError`]. Errors without a location get no label.
    pub fn from_error(error: &BundleError, src: &str) -> Self {
        match error {
            BundleError::Parse {
                message,
                span: Some(at),
            } => Self::new(message.clone(), src, at.start),
            other => Self {
                message: other.to_string(),
                src: src.to_string(),
                span: None,
            },
        }
    }
}
