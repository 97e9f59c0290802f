//! Models: one schema and connection unit, persisted as one folder
//!
//! A [`Model`] owns its entities, stored procedures and database configs.
//! Entity names are unique across the whole [`ModelGroup`] the model
//! belongs to; procedure and config names are unique within the model.
//! Every committed change marks the model dirty.

mod persistence;
mod prototypes;

pub use persistence::{
    ENTITY_EXTENSION, FETCH_SPEC_EXTENSION, INDEX_FILE_NAME, MODEL_FOLDER_EXTENSION,
    STORED_PROCEDURE_EXTENSION,
};
pub(crate) use persistence::model_name_for_folder;

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::Mutex;

use eomodeler_plist::{Dictionary, Value};
use tracing::warn;

use crate::attribute::Attribute;
use crate::config::ModelerConfig;
use crate::database_config::DatabaseConfig;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::failure::{Failure, Failures};
use crate::model_group::ModelGroup;
use crate::naming::{self, NameKind, find_unused_name};
use crate::notifier::{
    ChangeNotifier, PropertyValue, cow_push, cow_remove, observable_fields, quiet_push,
    update_field,
};
use crate::stored_procedure::StoredProcedure;

#[derive(Debug, Default)]
struct ModelFields {
    name: String,
    version: String,
    adaptor_name: Option<String>,
    connection_dictionary: Dictionary,
    user_info: Dictionary,
    internal_info: Dictionary,
    deleted_entity_names_in_object_store: BTreeSet<String>,
    folder: Option<PathBuf>,
    raw: Dictionary,
}

/// One schema unit of a [`ModelGroup`]
#[derive(Debug)]
pub struct Model {
    this: Weak<Model>,
    group: RefCell<Weak<ModelGroup>>,
    fields: RefCell<ModelFields>,
    entities: RefCell<Rc<Vec<Rc<Entity>>>>,
    stored_procedures: RefCell<Rc<Vec<Rc<StoredProcedure>>>>,
    database_configs: RefCell<Rc<Vec<Rc<DatabaseConfig>>>>,
    pending_entity_deletions: RefCell<BTreeSet<String>>,
    pending_stored_procedure_deletions: RefCell<BTreeSet<String>>,
    dirty: Cell<bool>,
    prototype_cache: Mutex<Option<Rc<Vec<Rc<Attribute>>>>>,
    notifier: ChangeNotifier,
}

impl Model {
    /// `dirty` property
    pub const DIRTY: &'static str = "dirty";
    /// `name` property
    pub const NAME: &'static str = "name";
    /// `version` property
    pub const VERSION: &'static str = "version";
    /// `adaptorName` property
    pub const ADAPTOR_NAME: &'static str = "adaptorName";
    /// `connectionDictionary` property
    pub const CONNECTION_DICTIONARY: &'static str = "connectionDictionary";
    /// `userInfo` property
    pub const USER_INFO: &'static str = "userInfo";
    /// Entity collection replaced
    pub const ENTITIES: &'static str = "entities";
    /// A field of one entity changed
    pub const ENTITY: &'static str = "entity";
    /// Stored procedure collection replaced
    pub const STORED_PROCEDURES: &'static str = "storedProcedures";
    /// A field of one stored procedure changed
    pub const STORED_PROCEDURE: &'static str = "storedProcedure";
    /// Database config collection replaced
    pub const DATABASE_CONFIGS: &'static str = "databaseConfigs";
    /// A field of one database config changed
    pub const DATABASE_CONFIG: &'static str = "databaseConfig";

    /// Create a detached, empty model
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Self::with_version(name, ModelerConfig::default().default_model_version)
    }

    pub(crate) fn with_version(name: impl Into<String>, version: String) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            group: RefCell::new(Weak::new()),
            fields: RefCell::new(ModelFields {
                name: name.into(),
                version,
                ..Default::default()
            }),
            entities: RefCell::new(Rc::new(Vec::new())),
            stored_procedures: RefCell::new(Rc::new(Vec::new())),
            database_configs: RefCell::new(Rc::new(Vec::new())),
            pending_entity_deletions: RefCell::new(BTreeSet::new()),
            pending_stored_procedure_deletions: RefCell::new(BTreeSet::new()),
            dirty: Cell::new(false),
            prototype_cache: Mutex::new(None),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Owning group, if any
    pub fn group(&self) -> Option<Rc<ModelGroup>> {
        self.group.borrow().upgrade()
    }

    pub(crate) fn set_group(&self, group: Weak<ModelGroup>) {
        *self.group.borrow_mut() = group;
    }

    /// Settings of the owning group, or the defaults when detached
    pub fn config(&self) -> ModelerConfig {
        self.group().map(|g| g.config().clone()).unwrap_or_default()
    }

    /// Listener registry for this model
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Model name
    pub fn name(&self) -> String {
        self.fields.borrow().name.clone()
    }

    /// Rename; model names are unique within the group
    pub fn set_name(&self, name: &str) -> Result<()> {
        if let Some(group) = self.group()
            && group
                .model_named(name)
                .is_some_and(|other| !std::ptr::eq(Rc::as_ptr(&other), self))
        {
            return Err(Error::DuplicateModel {
                name: name.to_string(),
            });
        }
        if let Some(old) = update_field(&self.fields, |f| &mut f.name, name.to_string()) {
            self.fire(Self::NAME, old.into(), name.to_string().into());
        }
        Ok(())
    }

    observable_fields! {
        /// `EOModelVersion` string
        version / set_version: String => Self::VERSION;
        /// Adaptor (JDBC, JavaScript, ...)
        adaptor_name / set_adaptor_name: Option<String> => Self::ADAPTOR_NAME;
        /// Connection parameters
        connection_dictionary / set_connection_dictionary: Dictionary => Self::CONNECTION_DICTIONARY;
        /// Free-form annotations
        user_info / set_user_info: Dictionary => Self::USER_INFO;
    }

    /// Folder the model was last loaded from or saved to
    pub fn folder(&self) -> Option<PathBuf> {
        self.fields.borrow().folder.clone()
    }

    /// Names entities had before being renamed or removed, as recorded
    /// for the object store
    pub fn deleted_entity_names_in_object_store(&self) -> Vec<String> {
        self.fields
            .borrow()
            .deleted_entity_names_in_object_store
            .iter()
            .cloned()
            .collect()
    }

    fn connection_value(&self, key: &str) -> Option<String> {
        self.fields
            .borrow()
            .connection_dictionary
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set_connection_value(&self, key: &str, value: Option<String>) {
        let mut dictionary = self.connection_dictionary();
        match value {
            Some(v) => {
                dictionary.insert(key.to_string(), Value::String(v));
            }
            None => {
                dictionary.shift_remove(key);
            }
        }
        self.set_connection_dictionary(dictionary);
    }

    /// Connection `username`
    pub fn username(&self) -> Option<String> {
        self.connection_value("username")
    }

    /// Set the connection `username`
    pub fn set_username(&self, value: Option<String>) {
        self.set_connection_value("username", value);
    }

    /// Connection `password`
    pub fn password(&self) -> Option<String> {
        self.connection_value("password")
    }

    /// Set the connection `password`
    pub fn set_password(&self, value: Option<String>) {
        self.set_connection_value("password", value);
    }

    /// Connection `driver`
    pub fn driver(&self) -> Option<String> {
        self.connection_value("driver")
    }

    /// Set the connection `driver`
    pub fn set_driver(&self, value: Option<String>) {
        self.set_connection_value("driver", value);
    }

    /// Connection `URL`
    pub fn url(&self) -> Option<String> {
        self.connection_value("URL")
    }

    /// Set the connection `URL`
    pub fn set_url(&self, value: Option<String>) {
        self.set_connection_value("URL", value);
    }

    /// Connection `plugin`
    pub fn plugin(&self) -> Option<String> {
        self.connection_value("plugin")
    }

    /// Set the connection `plugin`
    pub fn set_plugin(&self, value: Option<String>) {
        self.set_connection_value("plugin", value);
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Set the dirty flag, notifying `dirty` listeners on a transition
    pub fn set_dirty(&self, dirty: bool) {
        if self.dirty.replace(dirty) != dirty {
            self.notifier.fire(Self::DIRTY, (!dirty).into(), dirty.into());
        }
    }

    // ---- entities ----

    /// Snapshot of the entity collection
    pub fn entities(&self) -> Rc<Vec<Rc<Entity>>> {
        Rc::clone(&self.entities.borrow())
    }

    /// Entity of this model by name
    pub fn entity_named(&self, name: &str) -> Option<Rc<Entity>> {
        self.entities.borrow().iter().find(|e| e.name() == name).cloned()
    }

    /// Entity by name across the owning group, then this model
    pub fn lookup_entity(&self, name: &str) -> Option<Rc<Entity>> {
        self.group()
            .and_then(|g| g.entity_named(name))
            .or_else(|| self.entity_named(name))
    }

    pub(crate) fn group_entities(&self) -> Vec<Rc<Entity>> {
        match self.group() {
            Some(group) if group.contains(self) => group.entities(),
            _ => self.entities().to_vec(),
        }
    }

    /// `base`, or the smallest `base + N` no model in the group uses
    pub fn find_unused_entity_name(&self, base: &str) -> Result<String> {
        find_unused_name(
            NameKind::Entity,
            base,
            self.config().max_unused_name_attempts,
            |candidate| self.lookup_entity(candidate).is_some(),
        )
    }

    /// Attach an entity.
    ///
    /// A clash with an entity of this model renames the existing entity
    /// when `failures` is supplied. Without a sink, or when the clash is
    /// with another model of the group, this fails with
    /// [`Error::DuplicateName`].
    pub fn add_entity(
        &self,
        entity: &Rc<Entity>,
        fire_events: bool,
        failures: Option<&mut Failures>,
    ) -> Result<()> {
        if self.entities.borrow().iter().any(|e| Rc::ptr_eq(e, entity)) {
            return Ok(());
        }
        let name = entity.name();
        if let Some(existing) = self.lookup_entity(&name)
            && !Rc::ptr_eq(&existing, entity)
        {
            let existing_model = existing.model();
            let same_model = existing_model
                .as_ref()
                .is_some_and(|m| std::ptr::eq(Rc::as_ptr(m), self));
            match failures {
                Some(failures) if same_model => {
                    let renamed_to = self.find_unused_entity_name(&name)?;
                    existing.set_name(&renamed_to)?;
                    warn!(model = %self.name(), %name, %renamed_to, "Renamed duplicate entity");
                    failures.push(Failure::DuplicateEntity {
                        model: self.name(),
                        name: name.clone(),
                        renamed_to,
                    });
                }
                _ => {
                    return Err(Error::DuplicateName {
                        kind: NameKind::Entity,
                        name,
                        owner: existing_model.map_or_else(|| self.name(), |m| m.name()),
                    });
                }
            }
        }
        if let Some(previous) = entity.model() {
            previous.remove_entity(entity);
        }
        entity.set_model(self.this.clone());
        self.pending_entity_deletions.borrow_mut().remove(&name);
        if fire_events {
            let (old, new) = cow_push(&self.entities, Rc::clone(entity));
            self.fire(Self::ENTITIES, PropertyValue::Entities(old), PropertyValue::Entities(new));
        } else {
            quiet_push(&self.entities, Rc::clone(entity));
            self.clear_cached_prototypes();
        }
        Ok(())
    }

    /// Detach an entity; its files are deleted on the next save. Returns
    /// false if it was not part of this model.
    pub fn remove_entity(&self, entity: &Rc<Entity>) -> bool {
        let Some((old, new)) = cow_remove(&self.entities, |e| Rc::ptr_eq(e, entity)) else {
            return false;
        };
        self.pending_entity_deletions.borrow_mut().insert(entity.name());
        self.fire(Self::ENTITIES, PropertyValue::Entities(old), PropertyValue::Entities(new));
        entity.set_model(Weak::new());
        true
    }

    /// Create and attach an entity with an unused name derived from
    /// `base`. Its class name uses the package the model's existing class
    /// names have in common.
    pub fn add_blank_entity(&self, base: &str) -> Result<Rc<Entity>> {
        let name = self.find_unused_entity_name(base)?;
        let class_name = match self.guess_package_name() {
            Some(package) if !package.is_empty() => format!("{}.{}", package, name),
            _ => name.clone(),
        };
        let entity = Entity::new(name.as_str());
        entity.set_external_name(Some(name));
        entity.set_class_name(Some(class_name));
        self.add_entity(&entity, true, None)?;
        Ok(entity)
    }

    /// Common dotted package of this model's entity class names
    pub fn guess_package_name(&self) -> Option<String> {
        Self::guess_package_name_for(&self.entities())
    }

    /// Common dotted package of the class names of `entities`
    pub fn guess_package_name_for(entities: &[Rc<Entity>]) -> Option<String> {
        naming::guess_package_name(entities.iter().map(|e| e.class_name()))
    }

    /// Names whose entity files will be deleted on the next save
    pub fn pending_entity_deletions(&self) -> Vec<String> {
        self.pending_entity_deletions.borrow().iter().cloned().collect()
    }

    pub(crate) fn entity_renamed(&self, old: &str, new: &str) {
        {
            let mut pending = self.pending_entity_deletions.borrow_mut();
            pending.insert(old.to_string());
            pending.remove(new);
        }
        {
            let mut fields = self.fields.borrow_mut();
            fields.deleted_entity_names_in_object_store.insert(old.to_string());
            fields.deleted_entity_names_in_object_store.remove(new);
        }
        for entity in self.group_entities() {
            entity.entity_renamed(old, new);
        }
    }

    pub(crate) fn entity_changed(&self, entity: &Rc<Entity>, property: &'static str) {
        if matches!(property, Entity::NAME | Entity::ATTRIBUTES | Entity::ATTRIBUTE) {
            self.clear_cached_prototypes();
        }
        self.fire(Self::ENTITY, PropertyValue::None, PropertyValue::Entity(Rc::clone(entity)));
    }

    // ---- stored procedures ----

    /// Snapshot of the stored procedure collection
    pub fn stored_procedures(&self) -> Rc<Vec<Rc<StoredProcedure>>> {
        Rc::clone(&self.stored_procedures.borrow())
    }

    /// Stored procedure by name
    pub fn stored_procedure_named(&self, name: &str) -> Option<Rc<StoredProcedure>> {
        self.stored_procedures
            .borrow()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// `base`, or the smallest `base + N` no procedure of this model uses
    pub fn find_unused_stored_procedure_name(&self, base: &str) -> Result<String> {
        find_unused_name(
            NameKind::StoredProcedure,
            base,
            self.config().max_unused_name_attempts,
            |candidate| self.stored_procedure_named(candidate).is_some(),
        )
    }

    /// Attach a stored procedure; a clash renames the existing one when
    /// `failures` is supplied and fails otherwise
    pub fn add_stored_procedure(
        &self,
        procedure: &Rc<StoredProcedure>,
        fire_events: bool,
        failures: Option<&mut Failures>,
    ) -> Result<()> {
        if self.stored_procedures.borrow().iter().any(|p| Rc::ptr_eq(p, procedure)) {
            return Ok(());
        }
        let name = procedure.name();
        if let Some(existing) = self.stored_procedure_named(&name) {
            let Some(failures) = failures else {
                return Err(Error::DuplicateName {
                    kind: NameKind::StoredProcedure,
                    name,
                    owner: self.name(),
                });
            };
            let renamed_to = self.find_unused_stored_procedure_name(&name)?;
            existing.set_name(&renamed_to)?;
            warn!(model = %self.name(), %name, %renamed_to, "Renamed duplicate stored procedure");
            failures.push(Failure::DuplicateStoredProcedure {
                model: self.name(),
                name: name.clone(),
                renamed_to,
            });
        }
        if let Some(previous) = procedure.model() {
            previous.remove_stored_procedure(procedure);
        }
        procedure.set_model(self.this.clone());
        self.pending_stored_procedure_deletions.borrow_mut().remove(&name);
        if fire_events {
            let (old, new) = cow_push(&self.stored_procedures, Rc::clone(procedure));
            self.fire(
                Self::STORED_PROCEDURES,
                PropertyValue::StoredProcedures(old),
                PropertyValue::StoredProcedures(new),
            );
        } else {
            quiet_push(&self.stored_procedures, Rc::clone(procedure));
        }
        Ok(())
    }

    /// Detach a stored procedure; its file is deleted on the next save
    pub fn remove_stored_procedure(&self, procedure: &Rc<StoredProcedure>) -> bool {
        let Some((old, new)) = cow_remove(&self.stored_procedures, |p| Rc::ptr_eq(p, procedure))
        else {
            return false;
        };
        self.pending_stored_procedure_deletions
            .borrow_mut()
            .insert(procedure.name());
        self.fire(
            Self::STORED_PROCEDURES,
            PropertyValue::StoredProcedures(old),
            PropertyValue::StoredProcedures(new),
        );
        procedure.set_model(Weak::new());
        true
    }

    /// Create and attach a stored procedure with an unused name
    pub fn add_blank_stored_procedure(&self, base: &str) -> Result<Rc<StoredProcedure>> {
        let procedure = StoredProcedure::new(self.find_unused_stored_procedure_name(base)?);
        self.add_stored_procedure(&procedure, true, None)?;
        Ok(procedure)
    }

    pub(crate) fn stored_procedure_renamed(&self, old: &str, new: &str) {
        let mut pending = self.pending_stored_procedure_deletions.borrow_mut();
        pending.insert(old.to_string());
        pending.remove(new);
    }

    pub(crate) fn stored_procedure_changed(&self, procedure: &Rc<StoredProcedure>) {
        self.fire(
            Self::STORED_PROCEDURE,
            PropertyValue::None,
            PropertyValue::StoredProcedure(Rc::clone(procedure)),
        );
    }

    // ---- database configs ----

    /// Snapshot of the stored database configs (without `Default`)
    pub fn database_configs(&self) -> Rc<Vec<Rc<DatabaseConfig>>> {
        Rc::clone(&self.database_configs.borrow())
    }

    /// The synthesized `Default` config followed by the stored ones
    pub fn database_configs_with_default(&self) -> Vec<Rc<DatabaseConfig>> {
        std::iter::once(self.create_default_database_config())
            .chain(self.database_configs().iter().cloned())
            .collect()
    }

    /// Config by name; `Default` yields a freshly synthesized config
    pub fn database_config_named(&self, name: &str) -> Option<Rc<DatabaseConfig>> {
        if name == DatabaseConfig::DEFAULT_NAME {
            return Some(self.create_default_database_config());
        }
        self.database_configs
            .borrow()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Config built from this model's own connection dictionary and its
    /// preferred prototype entity. Edits to it are not persisted.
    pub fn create_default_database_config(&self) -> Rc<DatabaseConfig> {
        let config = DatabaseConfig::new(DatabaseConfig::DEFAULT_NAME);
        config.set_adaptor_name(self.adaptor_name());
        config.set_connection_dictionary(self.connection_dictionary());
        config.set_prototype(self.preferred_prototype_entity().as_ref());
        config.set_model(self.this.clone());
        config
    }

    /// `base`, or the smallest `base + N` not used by a config of this
    /// model; `Default` is always taken
    pub fn find_unused_database_config_name(&self, base: &str) -> Result<String> {
        find_unused_name(
            NameKind::DatabaseConfig,
            base,
            self.config().max_unused_name_attempts,
            |candidate| self.database_config_named(candidate).is_some(),
        )
    }

    /// Attach a database config; a clash renames the existing one when
    /// `failures` is supplied. `Default` can never be added.
    pub fn add_database_config(
        &self,
        config: &Rc<DatabaseConfig>,
        fire_events: bool,
        failures: Option<&mut Failures>,
    ) -> Result<()> {
        if self.database_configs.borrow().iter().any(|c| Rc::ptr_eq(c, config)) {
            return Ok(());
        }
        let name = config.name();
        let duplicate = || Error::DuplicateName {
            kind: NameKind::DatabaseConfig,
            name: name.clone(),
            owner: self.name(),
        };
        if config.is_default() {
            return Err(duplicate());
        }
        if let Some(existing) = self.database_config_named(&name) {
            let Some(failures) = failures else {
                return Err(duplicate());
            };
            let renamed_to = self.find_unused_database_config_name(&name)?;
            existing.set_name(&renamed_to)?;
            warn!(model = %self.name(), %name, %renamed_to, "Renamed duplicate database config");
            failures.push(Failure::DuplicateDatabaseConfig {
                model: self.name(),
                name: name.clone(),
                renamed_to,
            });
        }
        if let Some(previous) = config.model() {
            previous.remove_database_config(config);
        }
        config.set_model(self.this.clone());
        if fire_events {
            let (old, new) = cow_push(&self.database_configs, Rc::clone(config));
            self.fire(
                Self::DATABASE_CONFIGS,
                PropertyValue::DatabaseConfigs(old),
                PropertyValue::DatabaseConfigs(new),
            );
        } else {
            quiet_push(&self.database_configs, Rc::clone(config));
        }
        Ok(())
    }

    /// Detach a database config
    pub fn remove_database_config(&self, config: &Rc<DatabaseConfig>) -> bool {
        let Some((old, new)) = cow_remove(&self.database_configs, |c| Rc::ptr_eq(c, config)) else {
            return false;
        };
        self.fire(
            Self::DATABASE_CONFIGS,
            PropertyValue::DatabaseConfigs(old),
            PropertyValue::DatabaseConfigs(new),
        );
        config.set_model(Weak::new());
        true
    }

    /// Create and attach a database config with an unused name
    pub fn add_blank_database_config(&self, base: &str) -> Result<Rc<DatabaseConfig>> {
        let config = DatabaseConfig::new(self.find_unused_database_config_name(base)?);
        self.add_database_config(&config, true, None)?;
        Ok(config)
    }

    pub(crate) fn database_config_changed(&self, config: &Rc<DatabaseConfig>) {
        self.fire(
            Self::DATABASE_CONFIG,
            PropertyValue::None,
            PropertyValue::DatabaseConfig(Rc::clone(config)),
        );
    }

    // ---- passes ----

    /// Materialize references of every entity
    pub fn resolve(&self, failures: &mut Failures) {
        for entity in self.entities().iter() {
            entity.resolve(failures);
        }
    }

    /// Structural checks on every entity and database config
    pub fn verify(&self, failures: &mut Failures) {
        for entity in self.entities().iter() {
            entity.verify(failures);
        }
        for config in self.database_configs().iter() {
            if let Some(prototype_name) = config.prototype_name()
                && config.prototype().is_none()
            {
                failures.push(Failure::reference(
                    format!("{}.{}", self.name(), config.name()),
                    format!("prototype entity '{}' does not exist", prototype_name),
                ));
            }
        }
    }

    /// Record a change: mark dirty, drop derived caches, then notify
    pub(crate) fn fire(&self, property: &'static str, old: PropertyValue, new: PropertyValue) {
        self.set_dirty(true);
        if matches!(
            property,
            Self::CONNECTION_DICTIONARY | Self::ADAPTOR_NAME | Self::ENTITIES
        ) {
            self.clear_cached_prototypes();
        }
        self.notifier.fire(property, old, new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_blank_entity_numbers_names() {
        let model = Model::new("M");
        let first = model.add_blank_entity("Person").unwrap();
        let second = model.add_blank_entity("Person").unwrap();
        assert_eq!(first.name(), "Person");
        assert_eq!(second.name(), "Person1");
        assert_eq!(second.external_name().as_deref(), Some("Person1"));
        assert_eq!(model.guess_package_name(), Some(String::new()));
    }

    #[test]
    fn test_blank_entity_uses_common_package() {
        let model = Model::new("M");
        let person = model.add_blank_entity("Person").unwrap();
        person.set_class_name(Some("com.example.shop.Person".into()));
        let order = model.add_blank_entity("Order").unwrap();
        assert_eq!(order.class_name().as_deref(), Some("com.example.shop.Order"));
    }

    #[test]
    fn test_guess_package_name_for_subset() {
        let model = Model::new("M");
        let person = model.add_blank_entity("Person").unwrap();
        person.set_class_name(Some("com.example.shop.Person".into()));
        let invoice = model.add_blank_entity("Invoice").unwrap();
        invoice.set_class_name(Some("com.example.billing.Invoice".into()));
        let order = model.add_blank_entity("Order").unwrap();
        order.set_class_name(Some("com.example.shop.Order".into()));

        assert_eq!(model.guess_package_name(), Some("com.example".to_string()));
        assert_eq!(
            Model::guess_package_name_for(&[Rc::clone(&person), Rc::clone(&order)]),
            Some("com.example.shop".to_string())
        );
        assert_eq!(Model::guess_package_name_for(&[]), None);
    }

    #[test]
    fn test_duplicate_without_sink_fails() {
        let model = Model::new("M");
        model.add_blank_entity("Person").unwrap();
        let err = model.add_entity(&Entity::new("Person"), true, None).unwrap_err();
        assert!(matches!(err, Error::DuplicateName { kind: NameKind::Entity, .. }));
        assert_eq!(model.entities().len(), 1);
    }

    #[test]
    fn test_duplicate_with_sink_renames_existing() {
        let model = Model::new("M");
        let original = model.add_blank_entity("Person").unwrap();
        let newcomer = Entity::new("Person");
        let mut failures = Failures::new();
        model.add_entity(&newcomer, true, Some(&mut failures)).unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(original.name(), "Person1");
        assert_eq!(newcomer.name(), "Person");
        assert!(Rc::ptr_eq(&model.entity_named("Person").unwrap(), &newcomer));
    }

    #[test]
    fn test_dirty_fires_once() {
        let model = Model::new("M");
        let transitions = Rc::new(Cell::new(0));
        let counter = Rc::clone(&transitions);
        model.notifier().subscribe(Model::DIRTY, move |_| counter.set(counter.get() + 1));

        model.set_adaptor_name(Some("JDBC".into()));
        model.set_username(Some("shop".into()));
        model.add_blank_entity("Person").unwrap();
        assert!(model.is_dirty());
        assert_eq!(transitions.get(), 1);
    }

    #[test]
    fn test_unchanged_value_does_not_dirty() {
        let model = Model::new("M");
        model.set_adaptor_name(None);
        model.set_version(model.version());
        assert!(!model.is_dirty());
    }

    #[test]
    fn test_remove_entity_detaches_and_records_deletion() {
        let model = Model::new("M");
        let person = model.add_blank_entity("Person").unwrap();
        assert!(model.remove_entity(&person));
        assert!(person.model().is_none());
        assert_eq!(model.pending_entity_deletions(), vec!["Person"]);
        assert!(!model.remove_entity(&person));

        model.add_blank_entity("Person").unwrap();
        assert!(model.pending_entity_deletions().is_empty());
    }

    #[test]
    fn test_rename_records_object_store_name() {
        let model = Model::new("M");
        let person = model.add_blank_entity("Person").unwrap();
        person.set_name("Customer").unwrap();
        assert_eq!(model.deleted_entity_names_in_object_store(), vec!["Person"]);
        assert_eq!(model.pending_entity_deletions(), vec!["Person"]);

        model.add_blank_entity("Order").unwrap();
        let err = person.set_name("Order").unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
    }

    #[test]
    fn test_stored_procedure_collision() {
        let model = Model::new("M");
        let existing = model.add_blank_stored_procedure("totals").unwrap();
        let newcomer = StoredProcedure::new("totals");
        assert!(model.add_stored_procedure(&newcomer, true, None).is_err());

        let mut failures = Failures::new();
        model.add_stored_procedure(&newcomer, true, Some(&mut failures)).unwrap();
        assert_eq!(existing.name(), "totals1");
        assert!(matches!(failures[0], Failure::DuplicateStoredProcedure { .. }));
    }

    #[test]
    fn test_default_database_config() {
        let model = Model::new("M");
        model.set_url(Some("jdbc:postgresql://localhost/shop".into()));
        let default = model.database_config_named("Default").unwrap();
        assert_eq!(
            default.connection_dictionary().get("URL").and_then(Value::as_str),
            Some("jdbc:postgresql://localhost/shop")
        );
        assert_eq!(model.database_configs_with_default().len(), 1);

        let err = model
            .add_database_config(&DatabaseConfig::new("Default"), true, Some(&mut Failures::new()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { kind: NameKind::DatabaseConfig, .. }));

        let blank = model.add_blank_database_config("Default").unwrap();
        assert_eq!(blank.name(), "Default1");
    }

    #[test]
    fn test_find_unused_entity_name() {
        let model = Model::new("M");
        assert_eq!(model.find_unused_entity_name("Foo").unwrap(), "Foo");
        model.add_blank_entity("Foo").unwrap();
        model.add_blank_entity("Foo2").unwrap();
        assert_eq!(model.find_unused_entity_name("Foo").unwrap(), "Foo1");
    }
}
