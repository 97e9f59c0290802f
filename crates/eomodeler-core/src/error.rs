//! Error types for eomodeler-core

use thiserror::Error;

use crate::naming::NameKind;

/// Result type alias for eomodeler-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a single operation.
///
/// Recoverable outcomes (auto-renamed duplicates, missing entity files,
/// dangling references) are reported as [`crate::Failure`]s instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Model folder is missing its index file or the index is unreadable
    #[error("failed to load model at {path}: {message}")]
    ModelLoad {
        /// Path of the folder or index file
        path: String,
        /// Description of what went wrong
        message: String,
    },

    /// A name collision with no failures sink to resolve it
    #[error("{kind} name '{name}' is already in use in '{owner}'")]
    DuplicateName {
        /// Kind of object being named
        kind: NameKind,
        /// The conflicting name
        name: String,
        /// Model (or entity, for properties) that owns the conflict
        owner: String,
    },

    /// The renumbering loop ran out of attempts
    #[error("no unused {kind} name found for '{base}' after {attempts} attempts")]
    NoUnusedName {
        /// Kind of object being named
        kind: NameKind,
        /// Requested base name
        base: String,
        /// Number of numbered candidates tried
        attempts: usize,
    },

    /// A model with this name is already part of the group
    #[error("a model named '{name}' is already in the model group")]
    DuplicateModel {
        /// Model name
        name: String,
    },

    /// The model has never been loaded from or saved to a folder
    #[error("model '{name}' has no folder to save to")]
    NoFolder {
        /// Model name
        name: String,
    },

    /// Invalid value for a field
    #[error("invalid value: {message}")]
    InvalidValue {
        /// Description of what's invalid
        message: String,
    },

    /// Invalid settings value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// Failed to parse the YAML settings file
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Property list read/write error
    #[error("property list error: {0}")]
    Plist(#[from] eomodeler_plist::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
