//! Create model command

use std::path::Path;

use anyhow::{Context, Result, bail};
use eomodeler_core::model::MODEL_FOLDER_EXTENSION;
use eomodeler_core::{ModelGroup, ModelerConfig};

/// Run the new command
pub fn run(dir: &str, name: &str, entities: &[String]) -> Result<()> {
    let dir = Path::new(dir);
    let folder = dir.join(format!("{}.{}", name, MODEL_FOLDER_EXTENSION));
    if folder.exists() {
        bail!("{} already exists", folder.display());
    }
    tracing::info!("Creating model {} in {}", name, dir.display());

    let config = ModelerConfig::load(dir).context("Failed to load eomodeler.yaml")?;
    let group = ModelGroup::with_config(config);
    let model = group.add_blank_model(name)?;
    for entity in entities {
        let entity = model
            .add_blank_entity(entity)
            .with_context(|| format!("Failed to add entity {}", entity))?;
        tracing::info!("✓ Entity: {}", entity.name());
    }

    let folder = model
        .save_to_folder(dir)
        .with_context(|| format!("Failed to write {}", folder.display()))?;
    println!("Created {}", folder.display());
    Ok(())
}
