//! Recoverable outcomes collected in a caller-supplied sink
//!
//! Passing a [`Failures`] sink to an operation opts into auto-healing:
//! collisions that can be fixed by renaming are fixed and recorded here
//! instead of being returned as hard errors. Load, resolve and verify
//! passes also append to the sink and keep going.

use std::path::PathBuf;

use thiserror::Error;

/// Caller-supplied collection of recoverable outcomes
pub type Failures = Vec<Failure>;

/// One recorded, recoverable outcome
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// An entity name collided; the pre-existing entity was renamed
    #[error(
        "model '{model}': entity name '{name}' was already in use, renamed the existing entity to '{renamed_to}'"
    )]
    DuplicateEntity {
        /// Owning model
        model: String,
        /// The contested name (kept by the newcomer)
        name: String,
        /// Generated name given to the pre-existing entity
        renamed_to: String,
    },

    /// A stored procedure name collided; the pre-existing one was renamed
    #[error(
        "model '{model}': stored procedure name '{name}' was already in use, renamed the existing one to '{renamed_to}'"
    )]
    DuplicateStoredProcedure {
        /// Owning model
        model: String,
        /// The contested name
        name: String,
        /// Generated name given to the pre-existing procedure
        renamed_to: String,
    },

    /// A database config name collided; the pre-existing one was renamed
    #[error(
        "model '{model}': database config name '{name}' was already in use, renamed the existing one to '{renamed_to}'"
    )]
    DuplicateDatabaseConfig {
        /// Owning model
        model: String,
        /// The contested name
        name: String,
        /// Generated name given to the pre-existing config
        renamed_to: String,
    },

    /// An attribute or relationship name collided within an entity
    #[error(
        "entity '{entity}': property name '{name}' was already in use, renamed the existing property to '{renamed_to}'"
    )]
    DuplicateProperty {
        /// Owning entity
        entity: String,
        /// The contested name
        name: String,
        /// Generated name given to the pre-existing property
        renamed_to: String,
    },

    /// An entity loaded from disk clashes with an entity in another model
    #[error(
        "model '{model}': entity '{name}' is already defined in model '{other_model}' and was not loaded"
    )]
    DuplicateAcrossModels {
        /// Model being loaded
        model: String,
        /// Entity name
        name: String,
        /// Model that already owns the name
        other_model: String,
    },

    /// A file listed in a model index does not exist
    #[error("the {kind} file {} was missing", .path.display())]
    MissingFile {
        /// What the file should have contained
        kind: &'static str,
        /// Expected location
        path: PathBuf,
    },

    /// A file exists but could not be read or decoded
    #[error("failed to read {}: {message}", .path.display())]
    UnreadableFile {
        /// File or folder path
        path: PathBuf,
        /// Underlying error
        message: String,
    },

    /// Structural problem found by a resolve or verify pass
    #[error("{path}: {message}")]
    Reference {
        /// Dotted path of the offending object (`Model.Entity.property`)
        path: String,
        /// Description of the problem
        message: String,
    },
}

impl Failure {
    /// Whether this outcome is an auto-rename performed to resolve a collision
    pub fn is_rename(&self) -> bool {
        matches!(
            self,
            Self::DuplicateEntity { .. }
                | Self::DuplicateStoredProcedure { .. }
                | Self::DuplicateDatabaseConfig { .. }
                | Self::DuplicateProperty { .. }
        )
    }

    pub(crate) fn reference(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reference {
            path: path.into(),
            message: message.into(),
        }
    }
}
