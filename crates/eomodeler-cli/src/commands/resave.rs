//! Resave models command

use anyhow::{Context, Result};
use eomodeler_core::Failures;

use super::{open_group, select_models};

/// Run the resave command
pub fn run(root: &str, model: Option<&str>) -> Result<()> {
    let mut failures = Failures::new();
    let group = open_group(root, &mut failures)?;
    for model in select_models(&group, model)? {
        let folder = model
            .save()
            .with_context(|| format!("Failed to save model {}", model.name()))?;
        println!("Saved {}", folder.display());
    }
    Ok(())
}
