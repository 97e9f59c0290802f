//! Loading and saving `.eomodeld` folders
//!
//! ```text
//! Shop.eomodeld/
//!     index.eomodeld            model globals and the entity list
//!     Person.plist              one file per entity
//!     Person.fspec              fetch specifications, when there are any
//!     totals.storedProcedure    one file per stored procedure
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use eomodeler_plist::{Dictionary, Value};
use tracing::{debug, info, warn};

use super::Model;
use crate::database_config::DatabaseConfig;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::failure::{Failure, Failures};
use crate::map::ModelMap;
use crate::stored_procedure::StoredProcedure;

/// Extension of a model folder
pub const MODEL_FOLDER_EXTENSION: &str = "eomodeld";
/// Index file inside a model folder
pub const INDEX_FILE_NAME: &str = "index.eomodeld";
/// Extension of entity files
pub const ENTITY_EXTENSION: &str = "plist";
/// Extension of fetch specification files
pub const FETCH_SPEC_EXTENSION: &str = "fspec";
/// Extension of stored procedure files
pub const STORED_PROCEDURE_EXTENSION: &str = "storedProcedure";

const ENTITY_MODELER_KEY: &str = "_EntityModeler";
const DATABASE_CONFIGS_KEY: &str = "databaseConfigs";
const DELETED_IN_OBJECT_STORE_KEY: &str = "_deletedEntityNamesInObjectStore";

/// Model name implied by a folder path (`Shop.eomodeld` gives `Shop`)
pub(crate) fn model_name_for_folder(folder: &Path) -> String {
    let stem = if folder.extension().is_some_and(|ext| ext == MODEL_FOLDER_EXTENSION) {
        folder.file_stem()
    } else {
        folder.file_name()
    };
    stem.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

fn load_error(path: &Path, message: impl Into<String>) -> Error {
    Error::ModelLoad {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Read one element file, recording (rather than returning) problems
fn read_map(path: &Path, kind: &'static str, failures: &mut Failures) -> Option<ModelMap> {
    if !path.is_file() {
        warn!(path = %path.display(), "Missing {} file", kind);
        failures.push(Failure::MissingFile {
            kind,
            path: path.to_path_buf(),
        });
        return None;
    }
    let value = match eomodeler_plist::from_file(path) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable {} file", kind);
            failures.push(Failure::UnreadableFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
            return None;
        }
    };
    match ModelMap::from_value(value) {
        Some(map) => Some(map),
        None => {
            failures.push(Failure::UnreadableFile {
                path: path.to_path_buf(),
                message: format!("the {} file is not a dictionary", kind),
            });
            None
        }
    }
}

fn write_map(path: &Path, map: ModelMap) -> Result<()> {
    debug!(path = %path.display(), "Writing");
    eomodeler_plist::to_file(path, &map.into_value())?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Deleted");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn element_path(folder: &Path, name: &str, extension: &str) -> PathBuf {
    folder.join(format!("{}.{}", name, extension))
}

impl Model {
    /// Load a model folder into a new detached model named after it
    pub fn open(folder: impl AsRef<Path>, failures: &mut Failures) -> Result<Rc<Model>> {
        let folder = folder.as_ref();
        let model = Model::new(model_name_for_folder(folder));
        model.load_from_folder(folder, failures)?;
        Ok(model)
    }

    /// Read a model folder into this model.
    ///
    /// A missing or unparsable index fails the whole load. Missing or
    /// unreadable element files, and entities clashing with another model
    /// of the group, are recorded in `failures` and skipped. Loading does
    /// not fire collection events and leaves the model clean.
    pub fn load_from_folder(&self, folder: impl AsRef<Path>, failures: &mut Failures) -> Result<()> {
        let folder = folder.as_ref();
        let index_path = folder.join(INDEX_FILE_NAME);
        if !index_path.is_file() {
            return Err(load_error(&index_path, "index file does not exist"));
        }
        let value = eomodeler_plist::from_file(&index_path)
            .map_err(|e| load_error(&index_path, e.to_string()))?;
        let mut index = ModelMap::from_value(value)
            .ok_or_else(|| load_error(&index_path, "index file is not a dictionary"))?;

        let version = match index.take("EOModelVersion") {
            Some(Value::String(s)) => s,
            Some(Value::Integer(i)) => format!("{:?}", i as f64),
            Some(Value::Real(r)) => format!("{:?}", r),
            other => {
                return Err(load_error(
                    &index_path,
                    format!("unknown EOModelVersion format: {:?}", other),
                ));
            }
        };
        let adaptor_name = index.take_string("adaptorName");
        let connection_dictionary = index.take_dictionary("connectionDictionary").unwrap_or_default();
        let entity_entries = index.take_maps("entities");
        // derived from the entities on save
        index.take("entitiesWithSharedObjects");
        let stored_procedure_names = index.take_strings("storedProcedures");

        let mut internal_info = ModelMap::from(index.take_dictionary("internalInfo").unwrap_or_default());
        let deleted_in_object_store = internal_info.take_strings(DELETED_IN_OBJECT_STORE_KEY);

        let mut user_info = index.take_dictionary("userInfo").unwrap_or_default();
        let mut entity_modeler = user_info
            .shift_remove(ENTITY_MODELER_KEY)
            .and_then(ModelMap::from_value)
            .unwrap_or_default();
        let database_configs = entity_modeler.take_dictionary(DATABASE_CONFIGS_KEY).unwrap_or_default();
        let entity_modeler = entity_modeler.into_dictionary();
        if !entity_modeler.is_empty() {
            user_info.insert(ENTITY_MODELER_KEY.to_string(), Value::Dictionary(entity_modeler));
        }

        {
            let mut fields = self.fields.borrow_mut();
            fields.version = version;
            fields.adaptor_name = adaptor_name;
            fields.connection_dictionary = connection_dictionary;
            fields.user_info = user_info;
            fields.internal_info = internal_info.into_dictionary();
            fields.deleted_entity_names_in_object_store = deleted_in_object_store.into_iter().collect();
            fields.folder = Some(folder.to_path_buf());
            fields.raw = index.into_dictionary();
        }

        for mut entry in entity_entries {
            let Some(name) = entry.take_string("name") else {
                failures.push(Failure::reference(self.name(), "index lists an entity without a name"));
                continue;
            };
            self.load_entity(folder, &name, failures);
        }

        for name in stored_procedure_names {
            let path = element_path(folder, &name, STORED_PROCEDURE_EXTENSION);
            let Some(map) = read_map(&path, "stored procedure", failures) else {
                continue;
            };
            let procedure = StoredProcedure::from_map(map);
            if let Err(e) = self.add_stored_procedure(&procedure, false, Some(failures)) {
                failures.push(Failure::UnreadableFile {
                    path,
                    message: e.to_string(),
                });
            }
        }

        for (name, value) in database_configs {
            let Some(map) = ModelMap::from_value(value) else {
                failures.push(Failure::reference(
                    format!("{}.{}", self.name(), name),
                    "database config is not a dictionary",
                ));
                continue;
            };
            let config = DatabaseConfig::from_map(&name, map);
            if let Err(e) = self.add_database_config(&config, false, Some(failures)) {
                failures.push(Failure::reference(format!("{}.{}", self.name(), name), e.to_string()));
            }
        }

        self.pending_entity_deletions.borrow_mut().clear();
        self.pending_stored_procedure_deletions.borrow_mut().clear();
        self.clear_cached_prototypes();
        self.dirty.set(false);
        info!(
            model = %self.name(),
            entities = self.entities.borrow().len(),
            stored_procedures = self.stored_procedures.borrow().len(),
            "Loaded model"
        );
        Ok(())
    }

    fn load_entity(&self, folder: &Path, name: &str, failures: &mut Failures) {
        let path = element_path(folder, name, ENTITY_EXTENSION);
        let Some(map) = read_map(&path, "entity", failures) else {
            return;
        };
        let fspec_path = element_path(folder, name, FETCH_SPEC_EXTENSION);
        let fetch_specifications = if fspec_path.is_file() {
            read_map(&fspec_path, "fetch specification", failures)
        } else {
            None
        };
        let entity = Entity::from_map(map, fetch_specifications, failures);
        match self.add_entity(&entity, false, Some(failures)) {
            Ok(()) => debug!(model = %self.name(), entity = %name, "Loaded entity"),
            Err(Error::DuplicateName { owner, .. }) => {
                warn!(model = %self.name(), entity = %name, other_model = %owner, "Skipped entity defined in another model");
                failures.push(Failure::DuplicateAcrossModels {
                    model: self.name(),
                    name: entity.name(),
                    other_model: owner,
                });
            }
            Err(e) => failures.push(Failure::UnreadableFile {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Save into `parent` if it is a `.eomodeld` folder, else into
    /// `parent/<name>.eomodeld`. Returns the model folder.
    ///
    /// Files of entities and procedures removed or renamed since the last
    /// save are deleted. The dirty flag is left alone.
    pub fn save_to_folder(&self, parent: impl AsRef<Path>) -> Result<PathBuf> {
        let parent = parent.as_ref();
        let folder = if parent.extension().is_some_and(|ext| ext == MODEL_FOLDER_EXTENSION) {
            parent.to_path_buf()
        } else {
            parent.join(format!("{}.{}", self.name(), MODEL_FOLDER_EXTENSION))
        };
        fs::create_dir_all(&folder)?;

        write_map(&folder.join(INDEX_FILE_NAME), self.to_map())?;

        let deleted_entities: Vec<String> = self.pending_entity_deletions.borrow().iter().cloned().collect();
        for name in &deleted_entities {
            remove_if_exists(&element_path(&folder, name, ENTITY_EXTENSION))?;
            remove_if_exists(&element_path(&folder, name, FETCH_SPEC_EXTENSION))?;
        }
        for entity in self.entities().iter() {
            let name = entity.name();
            write_map(&element_path(&folder, &name, ENTITY_EXTENSION), entity.to_map())?;
            let fspec_path = element_path(&folder, &name, FETCH_SPEC_EXTENSION);
            match entity.fetch_specifications_to_map() {
                Some(map) => write_map(&fspec_path, map)?,
                None => remove_if_exists(&fspec_path)?,
            }
        }

        let deleted_procedures: Vec<String> = self
            .pending_stored_procedure_deletions
            .borrow()
            .iter()
            .cloned()
            .collect();
        for name in &deleted_procedures {
            remove_if_exists(&element_path(&folder, name, STORED_PROCEDURE_EXTENSION))?;
        }
        for procedure in self.stored_procedures().iter() {
            write_map(
                &element_path(&folder, &procedure.name(), STORED_PROCEDURE_EXTENSION),
                procedure.to_map(),
            )?;
        }

        self.pending_entity_deletions.borrow_mut().clear();
        self.pending_stored_procedure_deletions.borrow_mut().clear();
        self.fields.borrow_mut().folder = Some(folder.clone());
        info!(model = %self.name(), folder = %folder.display(), "Saved model");
        Ok(folder)
    }

    /// Save back into the folder the model came from
    pub fn save(&self) -> Result<PathBuf> {
        let folder = self.folder().ok_or_else(|| Error::NoFolder { name: self.name() })?;
        self.save_to_folder(folder)
    }

    /// Persisted form of the index file
    pub fn to_map(&self) -> ModelMap {
        let mut entities = self.entities().to_vec();
        entities.sort_by_key(|e| e.name());
        let mut procedure_names: Vec<String> = self.stored_procedures().iter().map(|p| p.name()).collect();
        procedure_names.sort();
        let mut configs = self.database_configs().to_vec();
        configs.sort_by_key(|c| c.name());

        let f = self.fields.borrow();
        let mut map = ModelMap::new();
        map.set_string("EOModelVersion", Some(&f.version));
        map.set_string("adaptorName", f.adaptor_name.as_deref());
        map.set("connectionDictionary", f.connection_dictionary.clone());
        map.set_array(
            "entities",
            entities
                .iter()
                .map(|entity| {
                    let mut entry = ModelMap::new();
                    entry.set_string("className", entity.class_name().as_deref());
                    entry.set_string("parent", entity.parent_name().as_deref());
                    entry.set_string("name", Some(&entity.name()));
                    entry.into_value()
                })
                .collect(),
        );
        map.set_strings(
            "entitiesWithSharedObjects",
            entities.iter().filter(|e| e.has_shared_objects()).map(|e| e.name()),
        );

        let mut internal_info = ModelMap::from(f.internal_info.clone());
        internal_info.set_strings(
            DELETED_IN_OBJECT_STORE_KEY,
            f.deleted_entity_names_in_object_store.iter().cloned(),
        );
        map.set_dictionary("internalInfo", &internal_info.into_dictionary());
        map.set_strings("storedProcedures", procedure_names);

        let mut user_info = f.user_info.clone();
        let mut entity_modeler = user_info
            .shift_remove(ENTITY_MODELER_KEY)
            .and_then(ModelMap::from_value)
            .unwrap_or_default();
        let configs: Dictionary = configs
            .iter()
            .map(|c| (c.name(), c.to_map().into_value()))
            .collect();
        entity_modeler.set_dictionary(DATABASE_CONFIGS_KEY, &configs);
        let entity_modeler = entity_modeler.into_dictionary();
        if !entity_modeler.is_empty() {
            user_info.insert(ENTITY_MODELER_KEY.to_string(), Value::Dictionary(entity_modeler));
        }
        map.set_dictionary("userInfo", &user_info);
        map.extend(&f.raw);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_for_folder() {
        assert_eq!(model_name_for_folder(Path::new("/tmp/Shop.eomodeld")), "Shop");
        assert_eq!(model_name_for_folder(Path::new("/tmp/Shop")), "Shop");
    }

    #[test]
    fn test_index_layout() {
        let model = Model::new("Shop");
        model.set_adaptor_name(Some("JDBC".into()));
        let person = model.add_blank_entity("Person").unwrap();
        person.set_fetch_specification("all", Dictionary::new());
        person.set_shared_object_fetch_specification_names(vec!["all".into()]);
        model.add_blank_entity("Address").unwrap();
        model.add_blank_stored_procedure("totals").unwrap();
        model.add_blank_database_config("Staging").unwrap();

        let index = model.to_map().into_dictionary();
        let keys: Vec<&str> = index.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "EOModelVersion",
                "adaptorName",
                "connectionDictionary",
                "entities",
                "entitiesWithSharedObjects",
                "storedProcedures",
                "userInfo",
            ]
        );
        let entities = index.get("entities").and_then(Value::as_array).unwrap();
        let first = entities[0].as_dictionary().unwrap();
        assert_eq!(first.get("name").and_then(Value::as_str), Some("Address"));
        assert_eq!(
            index.get("entitiesWithSharedObjects"),
            Some(&Value::Array(vec![Value::from("Person")]))
        );
        let configs = index
            .get("userInfo")
            .and_then(Value::as_dictionary)
            .and_then(|u| u.get(ENTITY_MODELER_KEY))
            .and_then(Value::as_dictionary)
            .and_then(|e| e.get(DATABASE_CONFIGS_KEY))
            .and_then(Value::as_dictionary)
            .unwrap();
        assert!(configs.contains_key("Staging"));
    }

    #[test]
    fn test_save_without_folder_fails() {
        let model = Model::new("Shop");
        assert!(matches!(model.save(), Err(Error::NoFolder { .. })));
    }
}
