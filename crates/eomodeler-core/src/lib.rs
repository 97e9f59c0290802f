//! EOModeler Core Library
//!
//! This crate provides the in-memory schema model for EOModeler:
//! - Model groups, models, entities, attributes and relationships
//! - Stored procedures and named database configs
//! - Prototype attribute resolution across a group
//! - Loading and saving `.eomodeld` folders
//! - Change notification with dirty tracking
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ ModelGroup  │────▶│    Model    │────▶│   Entity    │
//! │  (folder)   │     │ (.eomodeld) │     │  (.plist)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                          │         │
//!                                   Attribute   Relationship
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use eomodeler_core::{Failures, ModelGroup};
//!
//! let mut failures = Failures::new();
//! let group = ModelGroup::open("./models", &mut failures)?;
//! group.resolve(&mut failures);
//! group.verify(&mut failures);
//! for model in group.models().iter() {
//!     println!("Model: {} ({} entities)", model.name(), model.entities().len());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod config;
pub mod database_config;
pub mod entity;
pub mod error;
pub mod failure;
pub mod map;
pub mod model;
pub mod model_group;
pub mod naming;
pub mod notifier;
pub mod relationship;
pub mod stored_procedure;

pub use attribute::Attribute;
pub use config::ModelerConfig;
pub use database_config::DatabaseConfig;
pub use entity::{Entity, Property};
pub use error::{Error, Result};
pub use failure::{Failure, Failures};
pub use map::ModelMap;
pub use model::Model;
pub use model_group::ModelGroup;
pub use naming::{NameKind, guess_package_name};
pub use notifier::{ChangeNotifier, ListenerId, PropertyChange, PropertyValue};
pub use relationship::{Join, Relationship};
pub use stored_procedure::{ParameterDirection, StoredProcedure, StoredProcedureArgument};
