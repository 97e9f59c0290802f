//! Show models command

use anyhow::{Context, Result};
use eomodeler_core::{Failures, Model};
use eomodeler_plist::{Dictionary, Value};

use super::{open_group, select_models};

/// Run the show command
pub fn run(root: &str, model: Option<&str>, json: bool) -> Result<()> {
    let mut failures = Failures::new();
    let group = open_group(root, &mut failures)?;
    group.resolve(&mut failures);
    let models = select_models(&group, model)?;

    if json {
        let dump: Dictionary = models
            .iter()
            .map(|model| (model.name(), persisted_form(model)))
            .collect();
        let text = serde_json::to_string_pretty(&Value::Dictionary(dump))
            .context("Failed to serialize models")?;
        println!("{}", text);
        return Ok(());
    }

    for model in &models {
        println!(
            "{} (version {}, adaptor {})",
            model.name(),
            model.version(),
            model.adaptor_name().as_deref().unwrap_or("none")
        );
        for entity in model.entities().iter() {
            println!(
                "  {} [{}] {} attributes, {} relationships",
                entity.name(),
                entity.class_name().as_deref().unwrap_or("-"),
                entity.attributes().len(),
                entity.relationships().len()
            );
        }
        for procedure in model.stored_procedures().iter() {
            println!("  {}()", procedure.name());
        }
    }
    Ok(())
}

/// Index plus every entity and stored procedure file, as written on save
fn persisted_form(model: &Model) -> Value {
    let mut form = Dictionary::new();
    form.insert("index".into(), model.to_map().into_value());
    let entities: Dictionary = model
        .entities()
        .iter()
        .map(|e| (e.name(), e.to_map().into_value()))
        .collect();
    form.insert("entities".into(), Value::Dictionary(entities));
    let procedures: Dictionary = model
        .stored_procedures()
        .iter()
        .map(|p| (p.name(), p.to_map().into_value()))
        .collect();
    if !procedures.is_empty() {
        form.insert("storedProcedures".into(), Value::Dictionary(procedures));
    }
    Value::Dictionary(form)
}
