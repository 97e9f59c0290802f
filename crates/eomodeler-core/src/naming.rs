//! Name generation shared by every kind of model object

use std::fmt;

use crate::error::{Error, Result};

/// Kind of object whose name is being checked or generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// Model within a group
    Model,
    /// Entity (unique across the whole group)
    Entity,
    /// Attribute within an entity
    Attribute,
    /// Relationship within an entity
    Relationship,
    /// Stored procedure within a model
    StoredProcedure,
    /// Argument within a stored procedure
    Argument,
    /// Database config within a model
    DatabaseConfig,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Model => "model",
            Self::Entity => "entity",
            Self::Attribute => "attribute",
            Self::Relationship => "relationship",
            Self::StoredProcedure => "stored procedure",
            Self::Argument => "argument",
            Self::DatabaseConfig => "database config",
        };
        f.write_str(label)
    }
}

/// Return `base` if it is free, else the smallest `base + N` (N >= 1)
/// that is, trying at most `max_attempts` numbered candidates.
pub(crate) fn find_unused_name(
    kind: NameKind,
    base: &str,
    max_attempts: usize,
    is_taken: impl Fn(&str) -> bool,
) -> Result<String> {
    if !is_taken(base) {
        return Ok(base.to_string());
    }
    (1..=max_attempts)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !is_taken(candidate))
        .ok_or_else(|| Error::NoUnusedName {
            kind,
            base: base.to_string(),
            attempts: max_attempts,
        })
}

/// Longest common dotted package across the given class names.
///
/// Returns `None` when no class name is present at all, and `Some("")`
/// when the class names share no package (a class without a package
/// forces the empty result).
pub fn guess_package_name<I, S>(class_names: I) -> Option<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut guess: Option<Vec<String>> = None;
    for class_name in class_names.into_iter().flatten() {
        let class_name = class_name.as_ref();
        let package: Vec<&str> = match class_name.rfind('.') {
            Some(end) => class_name[..end].split('.').collect(),
            None => Vec::new(),
        };
        guess = Some(match guess {
            None => package.iter().map(|s| s.to_string()).collect(),
            Some(current) => current
                .into_iter()
                .zip(package.iter().copied())
                .take_while(|(a, b)| a.as_str() == *b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    guess.map(|segments| segments.join("."))
}
