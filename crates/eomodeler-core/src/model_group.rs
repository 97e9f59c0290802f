//! Model groups: the set of models whose entities can reference each other
//!
//! Entity names are unique across a group, and prototype entities defined
//! in one model serve every model of the group.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ModelerConfig;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::failure::{Failure, Failures};
use crate::model::{self, MODEL_FOLDER_EXTENSION, Model};
use crate::naming::{NameKind, find_unused_name};
use crate::notifier::{ChangeNotifier, PropertyValue, cow_push, cow_remove};

/// A set of models sharing one entity namespace
#[derive(Debug)]
pub struct ModelGroup {
    this: Weak<ModelGroup>,
    config: ModelerConfig,
    root: Option<PathBuf>,
    models: RefCell<Rc<Vec<Rc<Model>>>>,
    notifier: ChangeNotifier,
}

impl ModelGroup {
    /// Model collection replaced
    pub const MODELS: &'static str = "models";

    /// Empty group with default settings
    pub fn new() -> Rc<Self> {
        Self::with_config(ModelerConfig::default())
    }

    /// Empty group with the given settings
    pub fn with_config(config: ModelerConfig) -> Rc<Self> {
        Self::build(config, None)
    }

    fn build(config: ModelerConfig, root: Option<PathBuf>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            config,
            root,
            models: RefCell::new(Rc::new(Vec::new())),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Open a directory: read its `eomodeler.yaml` (if any), then load
    /// every model folder found below it.
    pub fn open(root: impl AsRef<Path>, failures: &mut Failures) -> Result<Rc<Self>> {
        let root = root.as_ref();
        let config = ModelerConfig::load(root)?;
        let group = Self::build(config, Some(root.to_path_buf()));
        let loaded = group.add_models_from_folder(root, failures)?;
        info!(root = %root.display(), models = loaded, failures = failures.len(), "Opened model group");
        Ok(group)
    }

    /// Settings shared by the models of this group
    pub fn config(&self) -> &ModelerConfig {
        &self.config
    }

    /// Directory the group was opened from
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Listener registry for this group
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Snapshot of the models
    pub fn models(&self) -> Rc<Vec<Rc<Model>>> {
        Rc::clone(&self.models.borrow())
    }

    /// Model by name
    pub fn model_named(&self, name: &str) -> Option<Rc<Model>> {
        self.models.borrow().iter().find(|m| m.name() == name).cloned()
    }

    /// Whether `model` is a member of this group
    pub fn contains(&self, model: &Model) -> bool {
        self.models
            .borrow()
            .iter()
            .any(|m| std::ptr::eq(Rc::as_ptr(m), model))
    }

    /// Add a model; model names are unique within a group
    pub fn add_model(&self, model: &Rc<Model>) -> Result<()> {
        if self.contains(model) {
            return Ok(());
        }
        if self.model_named(&model.name()).is_some() {
            return Err(Error::DuplicateModel { name: model.name() });
        }
        if let Some(previous) = model.group()
            && !std::ptr::eq(Rc::as_ptr(&previous), self)
        {
            previous.remove_model(model);
        }
        model.set_group(self.this.clone());
        let (old, new) = cow_push(&self.models, Rc::clone(model));
        self.clear_cached_prototypes();
        self.notifier
            .fire(Self::MODELS, PropertyValue::Models(old), PropertyValue::Models(new));
        Ok(())
    }

    /// Remove a model. Returns false if it was not a member.
    pub fn remove_model(&self, model: &Rc<Model>) -> bool {
        let Some((old, new)) = cow_remove(&self.models, |m| Rc::ptr_eq(m, model)) else {
            return false;
        };
        model.set_group(Weak::new());
        self.clear_cached_prototypes();
        model.clear_cached_prototypes();
        self.notifier
            .fire(Self::MODELS, PropertyValue::Models(old), PropertyValue::Models(new));
        true
    }

    /// `base`, or the smallest `base + N` no model of the group uses
    pub fn find_unused_model_name(&self, base: &str) -> Result<String> {
        find_unused_name(
            NameKind::Model,
            base,
            self.config.max_unused_name_attempts,
            |candidate| self.model_named(candidate).is_some(),
        )
    }

    /// Create and add an empty model with an unused name
    pub fn add_blank_model(&self, base: &str) -> Result<Rc<Model>> {
        let model = Model::with_version(
            self.find_unused_model_name(base)?,
            self.config.default_model_version.clone(),
        );
        self.add_model(&model)?;
        Ok(model)
    }

    /// Entity by name in any model of the group
    pub fn entity_named(&self, name: &str) -> Option<Rc<Entity>> {
        self.models.borrow().iter().find_map(|m| m.entity_named(name))
    }

    /// Every entity of every model, in model order
    pub fn entities(&self) -> Vec<Rc<Entity>> {
        self.models
            .borrow()
            .iter()
            .flat_map(|m| m.entities().iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Load one model folder into the group
    pub fn load_model(&self, folder: impl AsRef<Path>, failures: &mut Failures) -> Result<Rc<Model>> {
        let folder = folder.as_ref();
        let name = model::model_name_for_folder(folder);
        if self.model_named(&name).is_some() {
            return Err(Error::DuplicateModel { name });
        }
        let model = Model::with_version(name, self.config.default_model_version.clone());
        // attached first so entity names are checked against the whole group
        model.set_group(self.this.clone());
        if let Err(e) = model.load_from_folder(folder, failures) {
            model.set_group(Weak::new());
            return Err(e);
        }
        self.add_model(&model)?;
        Ok(model)
    }

    /// Load every `.eomodeld` folder below `dir`, recursing unless the
    /// settings say otherwise. Folders that fail to load are recorded and
    /// skipped. Returns the number of models loaded.
    pub fn add_models_from_folder(&self, dir: impl AsRef<Path>, failures: &mut Failures) -> Result<usize> {
        let dir = dir.as_ref();
        if dir.extension().is_some_and(|ext| ext == MODEL_FOLDER_EXTENSION) {
            self.load_model(dir, failures)?;
            return Ok(1);
        }

        let mut walker = WalkDir::new(dir).sort_by_file_name();
        if !self.config.recursive {
            walker = walker.max_depth(1);
        }
        let mut loaded = 0;
        let mut entries = walker.into_iter();
        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    failures.push(Failure::UnreadableFile {
                        path: e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_dir()
                || path.extension().is_none_or(|ext| ext != MODEL_FOLDER_EXTENSION)
            {
                continue;
            }
            entries.skip_current_dir();
            debug!(path = %path.display(), "Found model folder");
            match self.load_model(path, failures) {
                Ok(_) => loaded += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load model");
                    failures.push(Failure::UnreadableFile {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(loaded)
    }

    /// Materialize references across every model
    pub fn resolve(&self, failures: &mut Failures) {
        for model in self.models().iter() {
            model.resolve(failures);
        }
    }

    /// Structural checks on every model, plus entity names defined in
    /// more than one model
    pub fn verify(&self, failures: &mut Failures) {
        let mut owners: HashMap<String, String> = HashMap::new();
        for model in self.models().iter() {
            for entity in model.entities().iter() {
                let name = entity.name();
                match owners.get(&name) {
                    Some(other_model) => failures.push(Failure::DuplicateAcrossModels {
                        model: model.name(),
                        name,
                        other_model: other_model.clone(),
                    }),
                    None => {
                        owners.insert(name, model.name());
                    }
                }
            }
            model.verify(failures);
        }
    }

    /// Whether any model has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.models.borrow().iter().any(|m| m.is_dirty())
    }

    /// Save every model to its own folder, or under the group root for
    /// models that have never been saved
    pub fn save_all(&self) -> Result<Vec<PathBuf>> {
        let mut saved = Vec::new();
        for model in self.models().iter() {
            let folder = match (model.folder(), self.root()) {
                (Some(folder), _) => model.save_to_folder(folder)?,
                (None, Some(root)) => model.save_to_folder(root)?,
                (None, None) => return Err(Error::NoFolder { name: model.name() }),
            };
            saved.push(folder);
        }
        Ok(saved)
    }

    /// Drop the prototype cache of every model
    pub fn clear_cached_prototypes(&self) {
        for model in self.models.borrow().iter() {
            model.clear_own_prototype_cache();
        }
    }
}
