//! Error types for editor actions, project files and the execution sandbox.

use std::path::PathBuf;

use thiserror::Error;

/// A rejected user action. The model is never touched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum EditError {
    #[error("ID cannot be empty")]
    EmptyName,

    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("'{0}' is a reserved Python keyword")]
    ReservedKeyword(String),

    /// Name would shadow a binding the generated program itself defines.
    #[error("'{0}' is used by the generated program and cannot be an element ID")]
    ReservedBinding(String),

    /// The generated program would bind this name to two different things.
    #[error("'{0}' is already bound by another element in the generated program")]
    BindingClash(String),

    #[error("an element with ID '{0}' already exists")]
    DuplicateName(String),

    #[error("no element named '{0}'")]
    UnknownElement(String),

    #[error("{field} must be an integer, got '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    #[error("canvas {field} must be a positive integer, got '{value}'")]
    InvalidCanvasSize { field: &'static str, value: String },

    #[error("invalid radiobutton group '{group}': {reason}")]
    InvalidGroup { group: String, reason: String },
}

/// Failure to read or write a project file.
#[derive(Error, Debug)]
pub(crate) enum ProjectError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed project file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("element '{name}' in project file is invalid: {reason}")]
    InvalidElement { name: String, reason: EditError },

    #[error("project file has an invalid canvas: {0}")]
    InvalidCanvas(EditError),
}

/// Failure of the run/check collaborator. Never affects editor state.
#[derive(Error, Debug)]
pub(crate) enum RunError {
    #[error("could not write temporary program: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to launch '{python}': {source}")]
    Launch {
        python: String,
        #[source]
        source: std::io::Error,
    },

    #[error("verifier produced an unreadable report: {0}")]
    Report(String),

    #[error("verification did not finish within {0} ms")]
    Timeout(u64),
}
