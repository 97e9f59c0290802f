//! Verify model group command

use anyhow::{Result, bail};
use eomodeler_core::Failures;

use super::{describe, open_group};

/// Run the verify command
pub fn run(root: &str) -> Result<()> {
    tracing::info!("Verifying models in {}", root);

    let mut failures = Failures::new();
    let group = open_group(root, &mut failures)?;
    group.resolve(&mut failures);
    group.verify(&mut failures);

    for model in group.models().iter() {
        tracing::info!("✓ Model: {} ({} entities)", model.name(), model.entities().len());
    }
    for failure in &failures {
        println!("{}", describe(failure));
    }

    if !failures.is_empty() {
        bail!("Verification found {} problem(s)", failures.len());
    }
    tracing::info!("✓ All models are valid");
    Ok(())
}
