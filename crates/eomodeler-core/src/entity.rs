//! Entities: the mapped, table-like units of a model

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use eomodeler_plist::{Dictionary, Value};
use tracing::warn;

use crate::attribute::Attribute;
use crate::config::ModelerConfig;
use crate::error::{Error, Result};
use crate::failure::{Failure, Failures};
use crate::map::ModelMap;
use crate::model::Model;
use crate::naming::{NameKind, find_unused_name};
use crate::notifier::{
    ChangeNotifier, PropertyValue, cow_push, cow_remove, observable_fields, update_field,
};
use crate::relationship::Relationship;

/// Either kind of entity property; attributes and relationships share
/// one namespace
#[derive(Debug, Clone)]
pub enum Property {
    /// Column-level property
    Attribute(Rc<Attribute>),
    /// Reference-valued property
    Relationship(Rc<Relationship>),
}

impl Property {
    /// Property name
    pub fn name(&self) -> String {
        match self {
            Self::Attribute(a) => a.name(),
            Self::Relationship(r) => r.name(),
        }
    }

    /// Whether this is exactly the given attribute
    pub fn is_attribute(&self, attribute: &Attribute) -> bool {
        matches!(self, Self::Attribute(a) if std::ptr::eq(Rc::as_ptr(a), attribute))
    }

    /// Whether this is exactly the given relationship
    pub fn is_relationship(&self, relationship: &Relationship) -> bool {
        matches!(self, Self::Relationship(r) if std::ptr::eq(Rc::as_ptr(r), relationship))
    }

    fn rename(&self, name: &str) -> Result<()> {
        match self {
            Self::Attribute(a) => a.set_name(name),
            Self::Relationship(r) => r.set_name(name),
        }
    }
}

#[derive(Debug, Default)]
struct EntityFields {
    name: String,
    class_name: Option<String>,
    external_name: Option<String>,
    parent_name: Option<String>,
    restricting_qualifier: Option<String>,
    is_abstract: bool,
    read_only: bool,
    caches_objects: bool,
    fetch_specifications: Dictionary,
    shared_object_fetch_specification_names: Vec<String>,
    user_info: Dictionary,
    raw: Dictionary,
}

/// One mapped table-equivalent definition within a [`Model`]
#[derive(Debug)]
pub struct Entity {
    this: Weak<Entity>,
    model: RefCell<Weak<Model>>,
    parent: RefCell<Weak<Entity>>,
    fields: RefCell<EntityFields>,
    attributes: RefCell<Rc<Vec<Rc<Attribute>>>>,
    relationships: RefCell<Rc<Vec<Rc<Relationship>>>>,
    notifier: ChangeNotifier,
}

impl Entity {
    /// `name` property
    pub const NAME: &'static str = "name";
    /// `className` property
    pub const CLASS_NAME: &'static str = "className";
    /// `externalName` property
    pub const EXTERNAL_NAME: &'static str = "externalName";
    /// `parent` property
    pub const PARENT: &'static str = "parent";
    /// `restrictingQualifier` property
    pub const RESTRICTING_QUALIFIER: &'static str = "restrictingQualifier";
    /// `abstractEntity` property
    pub const ABSTRACT: &'static str = "abstractEntity";
    /// `readOnly` property
    pub const READ_ONLY: &'static str = "readOnly";
    /// `cachesObjects` property
    pub const CACHES_OBJECTS: &'static str = "cachesObjects";
    /// Attribute collection replaced
    pub const ATTRIBUTES: &'static str = "attributes";
    /// A field of one attribute changed
    pub const ATTRIBUTE: &'static str = "attribute";
    /// Relationship collection replaced
    pub const RELATIONSHIPS: &'static str = "relationships";
    /// A field of one relationship changed
    pub const RELATIONSHIP: &'static str = "relationship";
    /// `fetchSpecifications` property
    pub const FETCH_SPECIFICATIONS: &'static str = "fetchSpecifications";
    /// `sharedObjectFetchSpecificationNames` property
    pub const SHARED_OBJECT_FETCH_SPECIFICATION_NAMES: &'static str =
        "sharedObjectFetchSpecificationNames";
    /// `userInfo` property
    pub const USER_INFO: &'static str = "userInfo";

    /// Create a detached entity
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Self::with_fields(EntityFields {
            name: name.into(),
            ..Default::default()
        })
    }

    fn with_fields(fields: EntityFields) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            model: RefCell::new(Weak::new()),
            parent: RefCell::new(Weak::new()),
            fields: RefCell::new(fields),
            attributes: RefCell::new(Rc::new(Vec::new())),
            relationships: RefCell::new(Rc::new(Vec::new())),
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

    /// Listener registry for this entity
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Entity name
    pub fn name(&self) -> String {
        self.fields.borrow().name.clone()
    }

    /// Rename the entity. The name must be unused across the owning
    /// model's whole group.
    pub fn set_name(&self, name: &str) -> Result<()> {
        let model = self.model();
        if let Some(model) = &model
            && let Some(existing) = model.lookup_entity(name)
            && !std::ptr::eq(Rc::as_ptr(&existing), self)
        {
            return Err(Error::DuplicateName {
                kind: NameKind::Entity,
                name: name.to_string(),
                owner: existing.model().map_or_else(|| model.name(), |m| m.name()),
            });
        }
        let Some(old) = update_field(&self.fields, |f| &mut f.name, name.to_string()) else {
            return Ok(());
        };
        if let Some(model) = &model {
            model.entity_renamed(&old, name);
        }
        self.fire(Self::NAME, old.into(), name.to_string().into());
        Ok(())
    }

    observable_fields! {
        /// Fully qualified class name
        class_name / set_class_name: Option<String> => Self::CLASS_NAME;
        /// Physical table name
        external_name / set_external_name: Option<String> => Self::EXTERNAL_NAME;
        /// Qualifier restricting the rows of a sub-entity
        restricting_qualifier / set_restricting_qualifier: Option<String> => Self::RESTRICTING_QUALIFIER;
        /// Abstract entities have no rows of their own
        is_abstract / set_abstract: bool => Self::ABSTRACT;
        /// Rows cannot be modified
        read_only / set_read_only: bool => Self::READ_ONLY;
        /// Fetched objects are cached
        caches_objects / set_caches_objects: bool => Self::CACHES_OBJECTS;
        /// Names of fetch specifications whose results are shared
        shared_object_fetch_specification_names / set_shared_object_fetch_specification_names: Vec<String> => Self::SHARED_OBJECT_FETCH_SPECIFICATION_NAMES;
        /// Free-form annotations
        user_info / set_user_info: Dictionary => Self::USER_INFO;
    }

    /// Whether any fetch specification shares its objects
    pub fn has_shared_objects(&self) -> bool {
        !self.fields.borrow().shared_object_fetch_specification_names.is_empty()
    }

    /// Parent entity: the resolved reference, else a lookup by name
    pub fn parent(&self) -> Option<Rc<Entity>> {
        if let Some(parent) = self.parent.borrow().upgrade() {
            return Some(parent);
        }
        let name = self.fields.borrow().parent_name.clone()?;
        self.model()?.lookup_entity(&name)
    }

    /// Parent name, following a rename of the resolved parent
    pub fn parent_name(&self) -> Option<String> {
        match self.parent.borrow().upgrade() {
            Some(parent) => Some(parent.name()),
            None => self.fields.borrow().parent_name.clone(),
        }
    }

    /// Set (or clear) the inheritance parent
    pub fn set_parent(&self, parent: Option<&Rc<Entity>>) {
        let old = self.parent_name();
        *self.parent.borrow_mut() = parent.map(Rc::downgrade).unwrap_or_default();
        let new = parent.map(|p| p.name());
        self.fields.borrow_mut().parent_name = new.clone();
        if old != new {
            self.fire(Self::PARENT, old.into(), new.into());
        }
    }

    /// Entities whose parent is this one, across the owning group
    pub fn children(&self) -> Vec<Rc<Entity>> {
        let Some(model) = self.model() else {
            return Vec::new();
        };
        model
            .group_entities()
            .into_iter()
            .filter(|e| e.parent().is_some_and(|p| std::ptr::eq(Rc::as_ptr(&p), self)))
            .collect()
    }

    /// Snapshot of the attribute collection
    pub fn attributes(&self) -> Rc<Vec<Rc<Attribute>>> {
        Rc::clone(&self.attributes.borrow())
    }

    /// Snapshot of the relationship collection
    pub fn relationships(&self) -> Rc<Vec<Rc<Relationship>>> {
        Rc::clone(&self.relationships.borrow())
    }

    /// Attribute by name
    pub fn attribute_named(&self, name: &str) -> Option<Rc<Attribute>> {
        self.attributes.borrow().iter().find(|a| a.name() == name).cloned()
    }

    /// Relationship by name
    pub fn relationship_named(&self, name: &str) -> Option<Rc<Relationship>> {
        self.relationships.borrow().iter().find(|r| r.name() == name).cloned()
    }

    /// Attribute or relationship by name
    pub fn property_named(&self, name: &str) -> Option<Property> {
        self.attribute_named(name)
            .map(Property::Attribute)
            .or_else(|| self.relationship_named(name).map(Property::Relationship))
    }

    /// Attributes flagged as primary key, in declaration order
    pub fn primary_key_attributes(&self) -> Vec<Rc<Attribute>> {
        self.attributes().iter().filter(|a| a.primary_key()).cloned().collect()
    }

    /// Names of every class property, attributes first
    pub fn class_property_names(&self) -> Vec<String> {
        let attributes = self.attributes();
        let relationships = self.relationships();
        attributes
            .iter()
            .filter(|a| a.class_property())
            .map(|a| a.name())
            .chain(relationships.iter().filter(|r| r.class_property()).map(|r| r.name()))
            .collect()
    }

    /// `base` or the smallest `base + N` no property of this entity uses
    pub fn find_unused_property_name(&self, base: &str) -> Result<String> {
        find_unused_name(
            NameKind::Attribute,
            base,
            self.config().max_unused_name_attempts,
            |candidate| self.property_named(candidate).is_some(),
        )
    }

    /// Attach an attribute. A name collision renames the existing
    /// property when `failures` is supplied and fails otherwise.
    pub fn add_attribute(&self, attribute: &Rc<Attribute>, failures: Option<&mut Failures>) -> Result<()> {
        if self.attributes.borrow().iter().any(|a| Rc::ptr_eq(a, attribute)) {
            return Ok(());
        }
        self.make_room(NameKind::Attribute, &attribute.name(), failures)?;
        if let Some(previous) = attribute.entity() {
            previous.remove_attribute(attribute);
        }
        attribute.set_entity(self.this.clone());
        let (old, new) = cow_push(&self.attributes, Rc::clone(attribute));
        self.fire(Self::ATTRIBUTES, PropertyValue::Attributes(old), PropertyValue::Attributes(new));
        Ok(())
    }

    /// Detach an attribute. Returns false if it was not part of this entity.
    pub fn remove_attribute(&self, attribute: &Rc<Attribute>) -> bool {
        let Some((old, new)) = cow_remove(&self.attributes, |a| Rc::ptr_eq(a, attribute)) else {
            return false;
        };
        self.fire(Self::ATTRIBUTES, PropertyValue::Attributes(old), PropertyValue::Attributes(new));
        attribute.set_entity(Weak::new());
        true
    }

    /// Create and attach an attribute with an unused name derived from `base`
    pub fn add_blank_attribute(&self, base: &str) -> Result<Rc<Attribute>> {
        let attribute = Attribute::new(self.find_unused_property_name(base)?);
        self.add_attribute(&attribute, None)?;
        Ok(attribute)
    }

    /// Attach a relationship; same collision policy as attributes
    pub fn add_relationship(
        &self,
        relationship: &Rc<Relationship>,
        failures: Option<&mut Failures>,
    ) -> Result<()> {
        if self.relationships.borrow().iter().any(|r| Rc::ptr_eq(r, relationship)) {
            return Ok(());
        }
        self.make_room(NameKind::Relationship, &relationship.name(), failures)?;
        if let Some(previous) = relationship.entity() {
            previous.remove_relationship(relationship);
        }
        relationship.set_entity(self.this.clone());
        let (old, new) = cow_push(&self.relationships, Rc::clone(relationship));
        self.fire(
            Self::RELATIONSHIPS,
            PropertyValue::Relationships(old),
            PropertyValue::Relationships(new),
        );
        Ok(())
    }

    /// Detach a relationship. Returns false if it was not part of this entity.
    pub fn remove_relationship(&self, relationship: &Rc<Relationship>) -> bool {
        let Some((old, new)) = cow_remove(&self.relationships, |r| Rc::ptr_eq(r, relationship))
        else {
            return false;
        };
        self.fire(
            Self::RELATIONSHIPS,
            PropertyValue::Relationships(old),
            PropertyValue::Relationships(new),
        );
        relationship.set_entity(Weak::new());
        true
    }

    /// Create and attach a relationship with an unused name derived from `base`
    pub fn add_blank_relationship(&self, base: &str) -> Result<Rc<Relationship>> {
        let relationship = Relationship::new(self.find_unused_property_name(base)?);
        self.add_relationship(&relationship, None)?;
        Ok(relationship)
    }

    fn make_room(&self, kind: NameKind, name: &str, failures: Option<&mut Failures>) -> Result<()> {
        let Some(existing) = self.property_named(name) else {
            return Ok(());
        };
        let Some(failures) = failures else {
            return Err(Error::DuplicateName {
                kind,
                name: name.to_string(),
                owner: self.name(),
            });
        };
        let renamed_to = self.find_unused_property_name(name)?;
        existing.rename(&renamed_to)?;
        warn!(entity = %self.name(), %name, %renamed_to, "Renamed duplicate property");
        failures.push(Failure::DuplicateProperty {
            entity: self.name(),
            name: name.to_string(),
            renamed_to,
        });
        Ok(())
    }

    /// Names of the fetch specifications, in persisted order
    pub fn fetch_specification_names(&self) -> Vec<String> {
        self.fields.borrow().fetch_specifications.keys().cloned().collect()
    }

    /// Raw definition of one fetch specification
    pub fn fetch_specification(&self, name: &str) -> Option<Dictionary> {
        self.fields
            .borrow()
            .fetch_specifications
            .get(name)
            .and_then(Value::as_dictionary)
            .cloned()
    }

    /// Add or replace a fetch specification
    pub fn set_fetch_specification(&self, name: &str, spec: Dictionary) {
        let old = self.fetch_specification_names();
        let previous = self
            .fields
            .borrow_mut()
            .fetch_specifications
            .insert(name.to_string(), Value::Dictionary(spec.clone()));
        if previous != Some(Value::Dictionary(spec)) {
            self.fire(
                Self::FETCH_SPECIFICATIONS,
                old.into(),
                self.fetch_specification_names().into(),
            );
        }
    }

    /// Remove a fetch specification, and its shared-objects entry
    pub fn remove_fetch_specification(&self, name: &str) -> bool {
        let old = self.fetch_specification_names();
        if self.fields.borrow_mut().fetch_specifications.shift_remove(name).is_none() {
            return false;
        }
        self.fire(
            Self::FETCH_SPECIFICATIONS,
            old.into(),
            self.fetch_specification_names().into(),
        );
        let mut shared = self.shared_object_fetch_specification_names();
        shared.retain(|n| n != name);
        self.set_shared_object_fetch_specification_names(shared);
        true
    }

    /// Build from an entity file and its optional fetch specification file.
    /// Duplicate property names inside the file are renamed and recorded.
    pub fn from_map(
        mut map: ModelMap,
        fetch_specifications: Option<ModelMap>,
        failures: &mut Failures,
    ) -> Rc<Entity> {
        let class_properties: HashSet<String> = map.take_strings("classProperties").into_iter().collect();
        let primary_keys: HashSet<String> = map.take_strings("primaryKeyAttributes").into_iter().collect();
        let locking: HashSet<String> = map.take_strings("attributesUsedForLocking").into_iter().collect();
        let attributes = map.take_maps("attributes");
        let relationships = map.take_maps("relationships");

        let mut specs = map.take_dictionary("fetchSpecificationDictionary").unwrap_or_default();
        if let Some(file) = fetch_specifications {
            specs.extend(file.into_dictionary());
        }

        let entity = Self::with_fields(EntityFields {
            name: map.take_string("name").unwrap_or_default(),
            class_name: map.take_string("className"),
            external_name: map.take_string("externalName"),
            parent_name: map.take_string("parent"),
            restricting_qualifier: map.take_string("restrictingQualifier"),
            is_abstract: map.take_bool("isAbstractEntity"),
            read_only: map.take_bool("isReadOnly"),
            caches_objects: map.take_bool("cachesObjects"),
            fetch_specifications: specs,
            shared_object_fetch_specification_names: map.take_strings("sharedObjectFetchSpecificationNames"),
            user_info: map.take_dictionary("userInfo").unwrap_or_default(),
            raw: map.into_dictionary(),
        });

        for attribute_map in attributes {
            let attribute = Attribute::from_map(attribute_map);
            let name = attribute.name();
            attribute.set_primary_key(primary_keys.contains(&name));
            attribute.set_class_property(class_properties.contains(&name));
            attribute.set_used_for_locking(locking.contains(&name));
            if let Err(e) = entity.add_attribute(&attribute, Some(failures)) {
                failures.push(Failure::reference(entity.name(), e.to_string()));
            }
        }
        for relationship_map in relationships {
            let relationship = Relationship::from_map(relationship_map);
            relationship.set_class_property(class_properties.contains(&relationship.name()));
            if let Err(e) = entity.add_relationship(&relationship, Some(failures)) {
                failures.push(Failure::reference(entity.name(), e.to_string()));
            }
        }
        entity
    }

    /// Persisted form of the entity file
    pub fn to_map(&self) -> ModelMap {
        let attributes = self.attributes();
        let relationships = self.relationships();
        let parent_name = self.parent_name();
        let names = |pick: fn(&Attribute) -> bool| -> Vec<String> {
            attributes.iter().filter(|a| pick(a)).map(|a| a.name()).collect()
        };

        let f = self.fields.borrow();
        let mut map = ModelMap::new();
        if !attributes.is_empty() {
            map.set_array(
                "attributes",
                attributes.iter().map(|a| a.to_map().into_value()).collect(),
            );
        }
        map.set_strings("attributesUsedForLocking", names(Attribute::used_for_locking));
        map.set_bool("cachesObjects", f.caches_objects);
        map.set_string("className", f.class_name.as_deref());
        map.set_strings("classProperties", self.class_property_names());
        map.set_string("externalName", f.external_name.as_deref());
        map.set("fetchSpecificationDictionary", Dictionary::new());
        map.set_bool("isAbstractEntity", f.is_abstract);
        map.set_bool("isReadOnly", f.read_only);
        map.set_string("name", Some(&f.name));
        map.set_string("parent", parent_name.as_deref());
        map.set_strings("primaryKeyAttributes", names(Attribute::primary_key));
        if !relationships.is_empty() {
            map.set_array(
                "relationships",
                relationships.iter().map(|r| r.to_map().into_value()).collect(),
            );
        }
        map.set_string("restrictingQualifier", f.restricting_qualifier.as_deref());
        map.set_strings(
            "sharedObjectFetchSpecificationNames",
            f.shared_object_fetch_specification_names.iter().cloned(),
        );
        map.set_dictionary("userInfo", &f.user_info);
        map.extend(&f.raw);
        map
    }

    /// Persisted form of the fetch specification file, `None` when there
    /// are no fetch specifications
    pub fn fetch_specifications_to_map(&self) -> Option<ModelMap> {
        let f = self.fields.borrow();
        if f.fetch_specifications.is_empty() {
            return None;
        }
        Some(ModelMap::from(f.fetch_specifications.clone()))
    }

    /// Materialize parent and relationship destination references
    pub fn resolve(&self, failures: &mut Failures) {
        let path = self.path();
        let parent_name = self.fields.borrow().parent_name.clone();
        if let Some(parent_name) = parent_name {
            match self.model().and_then(|m| m.lookup_entity(&parent_name)) {
                Some(parent) => *self.parent.borrow_mut() = Rc::downgrade(&parent),
                None => failures.push(Failure::reference(
                    &path,
                    format!("parent entity '{}' does not exist", parent_name),
                )),
            }
        }
        for relationship in self.relationships().iter() {
            relationship.resolve(&path, failures);
        }
    }

    /// Structural checks on the entity and its properties
    pub fn verify(&self, failures: &mut Failures) {
        let path = self.path();
        if self.class_name().is_none() {
            failures.push(Failure::reference(&path, "has no class name"));
        }
        if let Some(parent_name) = self.parent_name()
            && self.parent().is_none()
        {
            failures.push(Failure::reference(
                &path,
                format!("parent entity '{}' does not exist", parent_name),
            ));
        }
        if self.has_inheritance_cycle() {
            failures.push(Failure::reference(&path, "is its own ancestor"));
        }
        let specs = self.fetch_specification_names();
        for shared in self.shared_object_fetch_specification_names() {
            if !specs.contains(&shared) {
                failures.push(Failure::reference(
                    &path,
                    format!("shared fetch specification '{}' does not exist", shared),
                ));
            }
        }
        for attribute in self.attributes().iter() {
            attribute.verify(&path, failures);
        }
        for relationship in self.relationships().iter() {
            relationship.verify(&path, failures);
        }
    }

    fn has_inheritance_cycle(&self) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.parent();
        while let Some(entity) = current {
            if std::ptr::eq(Rc::as_ptr(&entity), self) {
                return true;
            }
            if !seen.insert(Rc::as_ptr(&entity)) {
                // a cycle above us, reported by its own members
                return false;
            }
            current = entity.parent();
        }
        false
    }

    fn path(&self) -> String {
        match self.model() {
            Some(model) => format!("{}.{}", model.name(), self.name()),
            None => self.name(),
        }
    }

    fn config(&self) -> ModelerConfig {
        self.model().map(|m| m.config()).unwrap_or_default()
    }

    pub(crate) fn attribute_changed(&self, attribute: &Rc<Attribute>, _property: &'static str) {
        self.fire(
            Self::ATTRIBUTE,
            PropertyValue::None,
            PropertyValue::Attribute(Rc::clone(attribute)),
        );
    }

    pub(crate) fn relationship_changed(&self, relationship: &Rc<Relationship>, _property: &'static str) {
        self.fire(
            Self::RELATIONSHIP,
            PropertyValue::None,
            PropertyValue::Relationship(Rc::clone(relationship)),
        );
    }

    /// Keep join attribute names in step with an attribute rename
    pub(crate) fn attribute_renamed(&self, old: &str, new: &str) {
        for relationship in self.relationships().iter() {
            relationship.rename_join_attribute(true, old, new);
        }
        let entities = match self.model() {
            Some(model) => model.group_entities(),
            None => Vec::new(),
        };
        for entity in entities {
            for relationship in entity.relationships().iter() {
                let points_here = relationship
                    .destination()
                    .is_some_and(|d| std::ptr::eq(Rc::as_ptr(&d), self));
                if points_here {
                    relationship.rename_join_attribute(false, old, new);
                }
            }
        }
    }

    /// Follow a rename of another entity in stored (unresolved) references
    pub(crate) fn entity_renamed(&self, old: &str, new: &str) {
        let mut fields = self.fields.borrow_mut();
        if fields.parent_name.as_deref() == Some(old) {
            fields.parent_name = Some(new.to_string());
        }
        drop(fields);
        for relationship in self.relationships().iter() {
            relationship.destination_renamed(old, new);
        }
    }

    pub(crate) fn fire(&self, property: &'static str, old: PropertyValue, new: PropertyValue) {
        self.notifier.fire(property, old, new);
        if let (Some(model), Some(this)) = (self.model(), self.this.upgrade()) {
            model.entity_changed(&this, property);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eomodeler_plist::from_str;

    const PERSON: &str = r#"{
        attributes = (
            {columnName = ID; name = id; prototypeName = id; },
            {columnName = NAME; name = name; prototypeName = varchar100; }
        );
        className = "com.example.Person";
        classProperties = (name, pets);
        externalName = PERSON;
        fetchSpecificationDictionary = {};
        name = Person;
        primaryKeyAttributes = (id);
        relationships = (
            {destination = Pet; isToMany = Y; joins = ({destinationAttribute = ownerID; sourceAttribute = id; }); name = pets; }
        );
    }"#;

    fn load(text: &str, failures: &mut Failures) -> Rc<Entity> {
        Entity::from_map(ModelMap::from_value(from_str(text).unwrap()).unwrap(), None, failures)
    }

    #[test]
    fn test_from_map_applies_entity_flags() {
        let mut failures = Failures::new();
        let entity = load(PERSON, &mut failures);
        assert!(failures.is_empty());
        assert_eq!(entity.name(), "Person");
        assert_eq!(entity.attributes().len(), 2);
        assert!(entity.attribute_named("id").unwrap().primary_key());
        assert!(!entity.attribute_named("id").unwrap().class_property());
        assert!(entity.relationship_named("pets").unwrap().class_property());
        assert_eq!(entity.class_property_names(), vec!["name", "pets"]);
    }

    #[test]
    fn test_to_map_matches_source_layout() {
        let mut failures = Failures::new();
        let entity = load(PERSON, &mut failures);
        let reloaded = Entity::from_map(entity.to_map(), None, &mut failures);
        assert_eq!(reloaded.to_map(), entity.to_map());
        assert!(failures.is_empty());
    }

    #[test]
    fn test_duplicate_property_in_file_is_renamed() {
        let mut failures = Failures::new();
        let entity = load(
            "{ name = Pet; attributes = ({name = owner; columnName = A; }); relationships = ({name = owner; destination = Person; }); }",
            &mut failures,
        );
        assert_eq!(failures.len(), 1);
        assert!(entity.attribute_named("owner1").is_some());
        assert!(entity.relationship_named("owner").is_some());
    }

    #[test]
    fn test_property_namespace_is_shared() {
        let entity = Entity::new("Person");
        entity.add_blank_attribute("name").unwrap();
        let rel = Relationship::new("name");
        let err = entity.add_relationship(&rel, None).unwrap_err();
        assert!(matches!(err, Error::DuplicateName { kind: NameKind::Relationship, .. }));

        let blank = entity.add_blank_relationship("name").unwrap();
        assert_eq!(blank.name(), "name1");
    }

    #[test]
    fn test_attribute_rename_updates_joins() {
        let mut failures = Failures::new();
        let entity = load(PERSON, &mut failures);
        entity.attribute_named("id").unwrap().set_name("personID").unwrap();
        let pets = entity.relationship_named("pets").unwrap();
        assert_eq!(pets.joins()[0].source_attribute, "personID");
    }

    #[test]
    fn test_collection_events_are_copy_on_write() {
        let entity = Entity::new("Person");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        entity.notifier().subscribe(Entity::ATTRIBUTES, move |change| {
            sink.borrow_mut().push((change.old.len(), change.new.len()));
        });
        let first = entity.add_blank_attribute("a").unwrap();
        let before = entity.attributes();
        entity.add_blank_attribute("b").unwrap();
        assert_eq!(before.len(), 1);
        entity.remove_attribute(&first);
        assert_eq!(
            *seen.borrow(),
            vec![(Some(0), Some(1)), (Some(1), Some(2)), (Some(2), Some(1))]
        );
    }

    #[test]
    fn test_fetch_specifications() {
        let entity = Entity::new("Person");
        let mut spec = Dictionary::new();
        spec.insert("entityName".into(), "Person".into());
        entity.set_fetch_specification("all", spec);
        entity.set_shared_object_fetch_specification_names(vec!["all".into()]);
        assert!(entity.has_shared_objects());
        assert!(entity.fetch_specifications_to_map().is_some());

        assert!(entity.remove_fetch_specification("all"));
        assert!(!entity.has_shared_objects());
        assert!(entity.fetch_specifications_to_map().is_none());
    }
}
