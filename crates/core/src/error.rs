//! Error types for pybundle.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::Step;

/// Result type alias for pybundle operations.
pub type Result<T> = std::result::Result<T, BundleError>;

/// Main error type for pybundle.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("'{input}' is not a valid version string: {reason}")]
    Format { input: String, reason: String },

    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    #[error("Builder '{builder}' failed during {step}: {source}")]
    BuildStep {
        builder: String,
        step: Step,
        #[source]
        source: Box<BundleError>,
    },

    #[error("Product '{product}' of builder '{builder}' does not exist at {}", path.display())]
    MissingProduct {
        builder: String,
        product: String,
        path: PathBuf,
    },

    #[error(
        "Command failed: {command} (exit code: {}){}",
        exit_code.map_or_else(|| "none".to_string(), |code| code.to_string()),
        if stderr.trim().is_empty() { String::new() } else { format!("\n{}", stderr.trim_end()) }
    )]
    ShellCommand {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to rewrite '{old_ref}' to '{new_ref}' in {}: {source}", binary.display())]
    Relocation {
        binary: PathBuf,
        old_ref: String,
        new_ref: String,
        #[source]
        source: Box<BundleError>,
    },

    #[error("Builder '{0}' not found")]
    BuilderNotFound(String),

    #[error("Recipe '{0}' not found")]
    RecipeNotFound(String),

    #[error("Builders '{first}' and '{second}' both produce {}", path.display())]
    DuplicateProduct {
        first: String,
        second: String,
        path: PathBuf,
    },

    #[error("Unknown builder kind '{kind}' for builder '{builder}'")]
    UnknownBuilderKind { builder: String, kind: String },

    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Interpolation error: {message}")]
    Interpolation { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String, span: Option<Span> },

    #[error("Failed to read file: {}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BundleError {
    /// Returns the taxonomy name of the error, as shown to users.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Format { .. } => "FormatError",
            Self::DependencyCycle(_) => "DependencyCycleError",
            Self::BuildStep { .. } => "BuildStepError",
            Self::MissingProduct { .. } => "MissingProductError",
            Self::ShellCommand { .. } => "ShellCommandError",
            Self::Relocation { .. } => "RelocationError",
            Self::BuilderNotFound(_) => "BuilderNotFoundError",
            Self::RecipeNotFound(_) => "RecipeNotFoundError",
            Self::DuplicateProduct { .. } => "DuplicateProductError",
            Self::UnknownBuilderKind { .. } => "UnknownBuilderKindError",
            Self::InvalidSetting { .. } => "InvalidSettingError",
            Self::Interpolation { .. } => "InterpolationError",
            Self::Parse { .. } => "ParseError",
            Self::FileRead { .. } => "FileReadError",
            Self::Io(_) => "IoError",
        }
    }

    /// Creates a format error for an unparseable version string.
    pub fn format(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid setting error.
    pub fn invalid_setting(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Source span for error reporting.
#[derive(Debug, Clone)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}
