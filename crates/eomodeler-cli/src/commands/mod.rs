//! CLI command implementations

pub mod new;
pub mod resave;
pub mod show;
pub mod verify;

use std::rc::Rc;

use anyhow::{Context, Result, bail};
use eomodeler_core::{Failure, Failures, Model, ModelGroup};

/// Open the model group at `root`, logging (not failing on) recoverable
/// load problems
pub fn open_group(root: &str, failures: &mut Failures) -> Result<Rc<ModelGroup>> {
    let group = ModelGroup::open(root, failures)
        .with_context(|| format!("Failed to open model group at {}", root))?;
    for failure in failures.iter() {
        tracing::warn!("{}", failure);
    }
    Ok(group)
}

/// The models a command applies to: all of them, or the one named
pub fn select_models(group: &ModelGroup, model: Option<&str>) -> Result<Vec<Rc<Model>>> {
    match model {
        Some(name) => match group.model_named(name) {
            Some(model) => Ok(vec![model]),
            None => bail!("No model named '{}'", name),
        },
        None => Ok(group.models().to_vec()),
    }
}

/// One line per failure, for terminal output
pub fn describe(failure: &Failure) -> String {
    let marker = if failure.is_rename() { "renamed" } else { "error" };
    format!("{}: {}", marker, failure)
}
