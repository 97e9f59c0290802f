//! Named connection settings for one deployment environment

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use eomodeler_plist::Dictionary;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::map::ModelMap;
use crate::model::Model;
use crate::naming::NameKind;
use crate::notifier::{ChangeNotifier, PropertyValue, observable_fields, update_field};

#[derive(Debug, Default)]
struct DatabaseConfigFields {
    name: String,
    adaptor_name: Option<String>,
    prototype_name: Option<String>,
    connection_dictionary: Dictionary,
    raw: Dictionary,
}

/// Connection parameters plus the prototype entity used with them
#[derive(Debug)]
pub struct DatabaseConfig {
    this: Weak<DatabaseConfig>,
    model: RefCell<Weak<Model>>,
    fields: RefCell<DatabaseConfigFields>,
    notifier: ChangeNotifier,
}

impl DatabaseConfig {
    /// Name of the config synthesized from the model's own connection
    pub const DEFAULT_NAME: &'static str = "Default";

    /// `name` property
    pub const NAME: &'static str = "name";
    /// `adaptorName` property
    pub const ADAPTOR_NAME: &'static str = "adaptorName";
    /// `prototype` property
    pub const PROTOTYPE: &'static str = "prototype";
    /// `connectionDictionary` property
    pub const CONNECTION_DICTIONARY: &'static str = "connectionDictionary";

    /// Create a detached config
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Self::with_fields(DatabaseConfigFields {
            name: name.into(),
            ..Default::default()
        })
    }

    fn with_fields(fields: DatabaseConfigFields) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            model: RefCell::new(Weak::new()),
            fields: RefCell::new(fields),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Owning model, if attached
    pub fn model(&self) -> Option<Rc<Model>> {
        self.model.borrow().upgrade()
    }

    pub(crate) fn set_model(&self, model: Weak<Model>) {
        *self.model.borrow_mut() = model;
    }

    /// Listener registry for this config
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Config name
    pub fn name(&self) -> String {
        self.fields.borrow().name.clone()
    }

    /// Whether this is the synthesized `Default` config
    pub fn is_default(&self) -> bool {
        self.fields.borrow().name == Self::DEFAULT_NAME
    }

    /// Rename; the name must be unused within the owning model, and
    /// `Default` is always taken. The synthesized `Default` config of a
    /// model cannot be renamed.
    pub fn set_name(&self, name: &str) -> Result<()> {
        if let Some(model) = self.model() {
            if self.is_default() {
                return Err(Error::InvalidValue {
                    message: format!(
                        "the {} config of model {} cannot be renamed",
                        Self::DEFAULT_NAME,
                        model.name()
                    ),
                });
            }
            let taken = name == Self::DEFAULT_NAME
                || model
                    .database_config_named(name)
                    .is_some_and(|existing| !std::ptr::eq(Rc::as_ptr(&existing), self));
            if taken {
                return Err(Error::DuplicateName {
                    kind: NameKind::DatabaseConfig,
                    name: name.to_string(),
                    owner: model.name(),
                });
            }
        }
        if let Some(old) = update_field(&self.fields, |f| &mut f.name, name.to_string()) {
            self.fire(Self::NAME, old.into(), name.to_string().into());
        }
        Ok(())
    }

    observable_fields! {
        /// Adaptor used with this config
        adaptor_name / set_adaptor_name: Option<String> => Self::ADAPTOR_NAME;
        /// Name of the prototype entity used with this config
        prototype_name / set_prototype_name: Option<String> => Self::PROTOTYPE;
        /// Connection parameters
        connection_dictionary / set_connection_dictionary: Dictionary => Self::CONNECTION_DICTIONARY;
    }

    /// The prototype entity, resolved through the owning model's group
    pub fn prototype(&self) -> Option<Rc<Entity>> {
        let name = self.prototype_name()?;
        self.model()?.lookup_entity(&name)
    }

    /// Point at a prototype entity (or clear it)
    pub fn set_prototype(&self, prototype: Option<&Rc<Entity>>) {
        self.set_prototype_name(prototype.map(|p| p.name()));
    }

    /// Build from one entry of the model's `databaseConfigs` map
    pub fn from_map(name: &str, mut map: ModelMap) -> Rc<DatabaseConfig> {
        Self::with_fields(DatabaseConfigFields {
            name: name.to_string(),
            adaptor_name: map.take_string("adaptorName"),
            prototype_name: map.take_string("prototypeName"),
            connection_dictionary: map.take_dictionary("connectionDictionary").unwrap_or_default(),
            raw: map.into_dictionary(),
        })
    }

    /// Persisted form (the name is the enclosing map key)
    pub fn to_map(&self) -> ModelMap {
        let f = self.fields.borrow();
        let mut map = ModelMap::new();
        map.set_string("adaptorName", f.adaptor_name.as_deref());
        map.set("connectionDictionary", f.connection_dictionary.clone());
        map.set_string("prototypeName", f.prototype_name.as_deref());
        map.extend(&f.raw);
        map
    }

    pub(crate) fn fire(&self, property: &'static str, old: PropertyValue, new: PropertyValue) {
        self.notifier.fire(property, old, new);
        // the synthesized Default config is not part of the model
        if self.is_default() {
            return;
        }
        if let (Some(model), Some(this)) = (self.model(), self.this.upgrade()) {
            model.database_config_changed(&this);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eomodeler_plist::from_str;

    #[test]
    fn test_map_round_trip() {
        let text = r#"{
            adaptorName = JDBC;
            connectionDictionary = {URL = "jdbc:postgresql://localhost/shop"; username = shop; };
            prototypeName = EOJDBCPostgresqlPrototypes;
        }"#;
        let config = DatabaseConfig::from_map(
            "Staging",
            ModelMap::from_value(from_str(text).unwrap()).unwrap(),
        );
        assert_eq!(config.name(), "Staging");
        assert_eq!(config.adaptor_name().as_deref(), Some("JDBC"));
        assert_eq!(config.connection_dictionary().len(), 2);
        assert!(config.prototype().is_none());

        let again = DatabaseConfig::from_map("Staging", config.to_map());
        assert_eq!(again.to_map(), config.to_map());
    }

    #[test]
    fn test_synthesized_default_cannot_be_renamed() {
        let model = Model::new("Shop");
        model.set_dirty(false);
        let default = model.create_default_database_config();

        let err = default.set_name("Production").unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert!(default.is_default());
        assert!(!model.is_dirty());

        // and an edit after the refused rename still stays out of the model
        default.set_adaptor_name(Some("JDBC".into()));
        assert!(!model.is_dirty());
        assert!(model.database_configs().is_empty());
    }

    #[test]
    fn test_detached_default_can_be_renamed() {
        let config = DatabaseConfig::new(DatabaseConfig::DEFAULT_NAME);
        config.set_name("Staging").unwrap();
        assert_eq!(config.name(), "Staging");
    }
}
