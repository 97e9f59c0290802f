//! Prototype attribute resolution
//!
//! Prototype attributes come from up to three entities looked up through
//! the group, in priority order: the default prototype entity, the
//! adaptor's (`EO<adaptor>Prototypes`) and, for JDBC, the driver's
//! (`EOJDBC<driver>Prototypes`). The first definition of a name wins.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::{MutexGuard, PoisonError};

use tracing::debug;

use super::Model;
use crate::attribute::Attribute;
use crate::entity::Entity;

const JDBC_ADAPTOR: &str = "JDBC";

impl Model {
    /// Name of the group-wide default prototype entity
    pub fn default_prototype_entity_name(&self) -> String {
        self.config().default_prototype_entity
    }

    /// `EO<adaptor>Prototypes`, when an adaptor is set
    pub fn adaptor_prototype_entity_name(&self) -> Option<String> {
        self.adaptor_name().map(|adaptor| format!("EO{}Prototypes", adaptor))
    }

    /// `EOJDBC<driver>Prototypes` for JDBC models, where the driver is the
    /// token between the first two colons of the connection URL
    pub fn driver_prototype_entity_name(&self) -> Option<String> {
        if self.adaptor_name().as_deref() != Some(JDBC_ADAPTOR) {
            return None;
        }
        let url = self.url()?;
        let mut parts = url.splitn(3, ':');
        let _scheme = parts.next()?;
        let driver = parts.next()?;
        // the driver token must be followed by a second colon
        parts.next()?;
        Some(format!("EOJDBC{}Prototypes", driver))
    }

    /// Most specific prototype entity available: driver, then adaptor,
    /// then default
    pub fn preferred_prototype_entity(&self) -> Option<Rc<Entity>> {
        [
            self.driver_prototype_entity_name(),
            self.adaptor_prototype_entity_name(),
            Some(self.default_prototype_entity_name()),
        ]
        .into_iter()
        .flatten()
        .find_map(|name| self.lookup_entity(&name))
    }

    /// Prototype attributes, computed on first use and cached until a
    /// connection or entity change invalidates them
    pub fn prototype_attributes(&self) -> Rc<Vec<Rc<Attribute>>> {
        let cached = self.lock_prototype_cache().clone();
        if let Some(cached) = cached {
            return cached;
        }
        // built unlocked: the lookups may read attributes of this very model
        let built = Rc::new(self.build_prototype_attributes());
        let mut cache = self.lock_prototype_cache();
        // a nested call may have filled the cache meanwhile; keep its list
        Rc::clone(cache.get_or_insert(built))
    }

    fn lock_prototype_cache(&self) -> MutexGuard<'_, Option<Rc<Vec<Rc<Attribute>>>>> {
        self.prototype_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn build_prototype_attributes(&self) -> Vec<Rc<Attribute>> {
        let candidates = [
            Some(self.default_prototype_entity_name()),
            self.adaptor_prototype_entity_name(),
            self.driver_prototype_entity_name(),
        ];
        let mut seen_entities = HashSet::new();
        let mut by_name: HashMap<String, Rc<Attribute>> = HashMap::new();
        let mut ordered = Vec::new();
        for entity_name in candidates.into_iter().flatten() {
            if !seen_entities.insert(entity_name.clone()) {
                continue;
            }
            let Some(entity) = self.lookup_entity(&entity_name) else {
                continue;
            };
            for attribute in entity.attributes().iter() {
                let name = attribute.name();
                if !by_name.contains_key(&name) {
                    by_name.insert(name, Rc::clone(attribute));
                    ordered.push(Rc::clone(attribute));
                }
            }
        }
        debug!(model = %self.name(), count = ordered.len(), "Built prototype attribute cache");
        ordered
    }

    /// Sorted names of the prototype attributes
    pub fn prototype_attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prototype_attributes().iter().map(|a| a.name()).collect();
        names.sort();
        names
    }

    /// Prototype attribute by name
    pub fn prototype_attribute_named(&self, name: &str) -> Option<Rc<Attribute>> {
        self.prototype_attributes()
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Drop the prototype cache of every model in the group (prototype
    /// entities may live in any of them), and always this model's own
    pub fn clear_cached_prototypes(&self) {
        if let Some(group) = self.group() {
            group.clear_cached_prototypes();
        }
        self.clear_own_prototype_cache();
    }

    pub(crate) fn clear_own_prototype_cache(&self) {
        *self
            .prototype_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn has_cached_prototypes(&self) -> bool {
        self.prototype_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
