//! Relationships between entities

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use eomodeler_plist::{Dictionary, Value};

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::failure::{Failure, Failures};
use crate::map::ModelMap;
use crate::naming::NameKind;
use crate::notifier::{ChangeNotifier, PropertyValue, observable_fields, update_field};

/// Source/destination attribute pair of a relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Attribute on the owning entity
    pub source_attribute: String,
    /// Attribute on the destination entity
    pub destination_attribute: String,
}

impl Join {
    /// Pair two attribute names
    pub fn new(source_attribute: impl Into<String>, destination_attribute: impl Into<String>) -> Self {
        Self {
            source_attribute: source_attribute.into(),
            destination_attribute: destination_attribute.into(),
        }
    }

    fn from_map(mut map: ModelMap) -> Self {
        Self {
            source_attribute: map.take_string("sourceAttribute").unwrap_or_default(),
            destination_attribute: map.take_string("destinationAttribute").unwrap_or_default(),
        }
    }

    fn to_value(&self) -> Value {
        let mut map = ModelMap::new();
        map.set_string("destinationAttribute", Some(&self.destination_attribute));
        map.set_string("sourceAttribute", Some(&self.source_attribute));
        map.into_value()
    }
}

#[derive(Debug, Default)]
struct RelationshipFields {
    name: String,
    destination_name: Option<String>,
    to_many: bool,
    joins: Vec<Join>,
    join_semantic: Option<String>,
    delete_rule: Option<String>,
    owns_destination: bool,
    propagates_primary_key: bool,
    mandatory: bool,
    class_property: bool,
    definition: Option<String>,
    number_of_to_many_faults_to_batch_fetch: Option<i64>,
    user_info: Dictionary,
    raw: Dictionary,
}

/// A reference-valued property pointing at another [`Entity`]
#[derive(Debug)]
pub struct Relationship {
    this: Weak<Relationship>,
    entity: RefCell<Weak<Entity>>,
    destination: RefCell<Weak<Entity>>,
    fields: RefCell<RelationshipFields>,
    notifier: ChangeNotifier,
}

impl Relationship {
    /// `name` property
    pub const NAME: &'static str = "name";
    /// `destination` property
    pub const DESTINATION: &'static str = "destination";
    /// `toMany` property
    pub const TO_MANY: &'static str = "toMany";
    /// `joins` property
    pub const JOINS: &'static str = "joins";
    /// `joinSemantic` property
    pub const JOIN_SEMANTIC: &'static str = "joinSemantic";
    /// `deleteRule` property
    pub const DELETE_RULE: &'static str = "deleteRule";
    /// `ownsDestination` property
    pub const OWNS_DESTINATION: &'static str = "ownsDestination";
    /// `propagatesPrimaryKey` property
    pub const PROPAGATES_PRIMARY_KEY: &'static str = "propagatesPrimaryKey";
    /// `mandatory` property
    pub const MANDATORY: &'static str = "mandatory";
    /// `classProperty` property
    pub const CLASS_PROPERTY: &'static str = "classProperty";
    /// `definition` property
    pub const DEFINITION: &'static str = "definition";
    /// `numberOfToManyFaultsToBatchFetch` property
    pub const NUMBER_OF_TO_MANY_FAULTS_TO_BATCH_FETCH: &'static str =
        "numberOfToManyFaultsToBatchFetch";
    /// `userInfo` property
    pub const USER_INFO: &'static str = "userInfo";

    /// Create a detached relationship
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Self::with_fields(RelationshipFields {
            name: name.into(),
            ..Default::default()
        })
    }

    fn with_fields(fields: RelationshipFields) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            entity: RefCell::new(Weak::new()),
            destination: RefCell::new(Weak::new()),
            fields: RefCell::new(fields),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Owning entity, if attached
    pub fn entity(&self) -> Option<Rc<Entity>> {
        self.entity.borrow().upgrade()
    }

    pub(crate) fn set_entity(&self, entity: Weak<Entity>) {
        *self.entity.borrow_mut() = entity;
    }

    /// Listener registry for this relationship
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Relationship name
    pub fn name(&self) -> String {
        self.fields.borrow().name.clone()
    }

    /// Rename the relationship. Attributes and relationships share one
    /// namespace per entity.
    pub fn set_name(&self, name: &str) -> Result<()> {
        if let Some(entity) = self.entity() {
            let taken = entity
                .property_named(name)
                .is_some_and(|other| !other.is_relationship(self));
            if taken {
                return Err(Error::DuplicateName {
                    kind: NameKind::Relationship,
                    name: name.to_string(),
                    owner: entity.name(),
                });
            }
        }
        if let Some(old) = update_field(&self.fields, |f| &mut f.name, name.to_string()) {
            self.fire(Self::NAME, old.into(), name.to_string().into());
        }
        Ok(())
    }

    observable_fields! {
        /// Join semantic (inner, full outer, ...)
        join_semantic / set_join_semantic: Option<String> => Self::JOIN_SEMANTIC;
        /// Delete rule applied to the destination
        delete_rule / set_delete_rule: Option<String> => Self::DELETE_RULE;
        /// Destination objects are owned by the source
        owns_destination / set_owns_destination: bool => Self::OWNS_DESTINATION;
        /// Source primary key propagates to the destination
        propagates_primary_key / set_propagates_primary_key: bool => Self::PROPAGATES_PRIMARY_KEY;
        /// A destination is required
        mandatory / set_mandatory: bool => Self::MANDATORY;
        /// Exposed on the generated class
        class_property / set_class_property: bool => Self::CLASS_PROPERTY;
        /// Key path of a flattened relationship
        definition / set_definition: Option<String> => Self::DEFINITION;
        /// Free-form annotations
        user_info / set_user_info: Dictionary => Self::USER_INFO;
        /// Join pairs
        joins / set_joins: Vec<Join> => Self::JOINS;
    }

    /// Whether this relationship is defined by a key path
    pub fn is_flattened(&self) -> bool {
        self.fields.borrow().definition.is_some()
    }

    /// Append a join pair
    pub fn add_join(&self, join: Join) {
        let mut joins = self.joins();
        joins.push(join);
        self.set_joins(joins);
    }

    /// To-many cardinality
    pub fn to_many(&self) -> bool {
        self.fields.borrow().to_many
    }

    /// Change cardinality. Switching to to-one clears the batch-fetch size.
    pub fn set_to_many(&self, to_many: bool) {
        if update_field(&self.fields, |f| &mut f.to_many, to_many).is_some() {
            self.fire(Self::TO_MANY, (!to_many).into(), to_many.into());
        }
        if !to_many {
            let cleared = update_field(
                &self.fields,
                |f| &mut f.number_of_to_many_faults_to_batch_fetch,
                None,
            );
            if let Some(old) = cleared {
                self.fire(
                    Self::NUMBER_OF_TO_MANY_FAULTS_TO_BATCH_FETCH,
                    old.into(),
                    PropertyValue::None,
                );
            }
        }
    }

    /// Number of to-many faults fetched together
    pub fn number_of_to_many_faults_to_batch_fetch(&self) -> Option<i64> {
        self.fields.borrow().number_of_to_many_faults_to_batch_fetch
    }

    /// Set the batch-fetch size; only valid on a to-many relationship
    pub fn set_number_of_to_many_faults_to_batch_fetch(&self, size: Option<i64>) -> Result<()> {
        if size.is_some() && !self.to_many() {
            return Err(Error::InvalidValue {
                message: format!(
                    "relationship '{}' is to-one, batch fetch size only applies to to-many relationships",
                    self.name()
                ),
            });
        }
        let old = update_field(
            &self.fields,
            |f| &mut f.number_of_to_many_faults_to_batch_fetch,
            size,
        );
        if let Some(old) = old {
            self.fire(Self::NUMBER_OF_TO_MANY_FAULTS_TO_BATCH_FETCH, old.into(), size.into());
        }
        Ok(())
    }

    /// Destination entity: the resolved reference, else a lookup by name
    /// through the owning model's group
    pub fn destination(&self) -> Option<Rc<Entity>> {
        if let Some(destination) = self.destination.borrow().upgrade() {
            return Some(destination);
        }
        let name = self.fields.borrow().destination_name.clone()?;
        self.entity()?.model()?.lookup_entity(&name)
    }

    /// Destination name, following a rename of the resolved entity
    pub fn destination_name(&self) -> Option<String> {
        match self.destination.borrow().upgrade() {
            Some(destination) => Some(destination.name()),
            None => self.fields.borrow().destination_name.clone(),
        }
    }

    /// Point the relationship at an entity (or at nothing)
    pub fn set_destination(&self, destination: Option<&Rc<Entity>>) {
        let old = self.destination_name();
        *self.destination.borrow_mut() = destination.map(Rc::downgrade).unwrap_or_default();
        let new = destination.map(|d| d.name());
        self.fields.borrow_mut().destination_name = new.clone();
        if old != new {
            self.fire(Self::DESTINATION, old.into(), new.into());
        }
    }

    pub(crate) fn rename_join_attribute(&self, source: bool, old: &str, new: &str) {
        let mut joins = self.joins();
        let mut changed = false;
        for join in &mut joins {
            let slot = if source {
                &mut join.source_attribute
            } else {
                &mut join.destination_attribute
            };
            if slot == old {
                *slot = new.to_string();
                changed = true;
            }
        }
        if changed {
            self.set_joins(joins);
        }
    }

    pub(crate) fn destination_renamed(&self, old: &str, new: &str) {
        let mut fields = self.fields.borrow_mut();
        if fields.destination_name.as_deref() == Some(old) {
            fields.destination_name = Some(new.to_string());
        }
    }

    /// Build from one entry of an entity's `relationships` list
    pub fn from_map(mut map: ModelMap) -> Rc<Relationship> {
        let fields = RelationshipFields {
            name: map.take_string("name").unwrap_or_default(),
            destination_name: map.take_string("destination"),
            to_many: map.take_bool("isToMany"),
            joins: map.take_maps("joins").into_iter().map(Join::from_map).collect(),
            join_semantic: map.take_string("joinSemantic"),
            delete_rule: map.take_string("deleteRule"),
            owns_destination: map.take_bool("ownsDestination"),
            propagates_primary_key: map.take_bool("propagatesPrimaryKey"),
            mandatory: map.take_bool("isMandatory"),
            definition: map.take_string("definition"),
            number_of_to_many_faults_to_batch_fetch: map.take_i64("numberOfToManyFaultsToBatchFetch"),
            user_info: map.take_dictionary("userInfo").unwrap_or_default(),
            raw: map.into_dictionary(),
            ..Default::default()
        };
        Self::with_fields(fields)
    }

    /// Persisted form
    pub fn to_map(&self) -> ModelMap {
        let destination_name = self.destination_name();
        let f = self.fields.borrow();
        let mut map = ModelMap::new();
        map.set_string("definition", f.definition.as_deref());
        map.set_string("deleteRule", f.delete_rule.as_deref());
        map.set_string("destination", destination_name.as_deref());
        map.set_bool("isMandatory", f.mandatory);
        map.set_bool("isToMany", f.to_many);
        map.set_string("joinSemantic", f.join_semantic.as_deref());
        if !f.joins.is_empty() {
            map.set_array("joins", f.joins.iter().map(Join::to_value).collect());
        }
        map.set_string("name", Some(&f.name));
        if f.to_many {
            map.set_i64(
                "numberOfToManyFaultsToBatchFetch",
                f.number_of_to_many_faults_to_batch_fetch,
            );
        }
        map.set_bool("ownsDestination", f.owns_destination);
        map.set_bool("propagatesPrimaryKey", f.propagates_primary_key);
        map.set_dictionary("userInfo", &f.user_info);
        map.extend(&f.raw);
        map
    }

    /// Materialize the destination reference
    pub fn resolve(&self, path: &str, failures: &mut Failures) {
        if self.is_flattened() {
            return;
        }
        let path = format!("{}.{}", path, self.name());
        let Some(name) = self.fields.borrow().destination_name.clone() else {
            failures.push(Failure::reference(path, "has no destination entity"));
            return;
        };
        let destination = self.entity().and_then(|e| e.model()).and_then(|m| m.lookup_entity(&name));
        match destination {
            Some(destination) => *self.destination.borrow_mut() = Rc::downgrade(&destination),
            None => failures.push(Failure::reference(
                path,
                format!("destination entity '{}' does not exist", name),
            )),
        }
    }

    /// Structural checks on joins
    pub fn verify(&self, path: &str, failures: &mut Failures) {
        if self.is_flattened() {
            return;
        }
        let path = format!("{}.{}", path, self.name());
        let joins = self.joins();
        if joins.is_empty() {
            failures.push(Failure::reference(&path, "has no joins"));
        }
        let source = self.entity();
        let destination = self.destination();
        for join in &joins {
            if let Some(source) = &source
                && source.attribute_named(&join.source_attribute).is_none()
            {
                failures.push(Failure::reference(
                    &path,
                    format!("source attribute '{}' does not exist", join.source_attribute),
                ));
            }
            if let Some(destination) = &destination
                && destination.attribute_named(&join.destination_attribute).is_none()
            {
                failures.push(Failure::reference(
                    &path,
                    format!(
                        "destination attribute '{}' does not exist on '{}'",
                        join.destination_attribute,
                        destination.name()
                    ),
                ));
            }
        }
    }

    pub(crate) fn fire(&self, property: &'static str, old: PropertyValue, new: PropertyValue) {
        self.notifier.fire(property, old, new);
        if let (Some(entity), Some(this)) = (self.entity(), self.this.upgrade()) {
            entity.relationship_changed(&this, property);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eomodeler_plist::from_str;

    #[test]
    fn test_batch_size_only_on_to_many() {
        let rel = Relationship::new("orders");
        let err = rel.set_number_of_to_many_faults_to_batch_fetch(Some(10)).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));

        rel.set_to_many(true);
        rel.set_number_of_to_many_faults_to_batch_fetch(Some(10)).unwrap();
        assert_eq!(rel.number_of_to_many_faults_to_batch_fetch(), Some(10));

        rel.set_to_many(false);
        assert_eq!(rel.number_of_to_many_faults_to_batch_fetch(), None);
    }

    #[test]
    fn test_map_round_trip() {
        let text = r#"{
            destination = Order;
            isToMany = Y;
            joinSemantic = EOInnerJoin;
            joins = ({destinationAttribute = personID; sourceAttribute = id; });
            name = orders;
            numberOfToManyFaultsToBatchFetch = 5;
        }"#;
        let rel = Relationship::from_map(ModelMap::from_value(from_str(text).unwrap()).unwrap());
        assert!(rel.to_many());
        assert_eq!(rel.destination_name().as_deref(), Some("Order"));
        assert_eq!(rel.joins(), vec![Join::new("id", "personID")]);

        let again = Relationship::from_map(rel.to_map());
        assert_eq!(again.to_map(), rel.to_map());
        assert_eq!(again.number_of_to_many_faults_to_batch_fetch(), Some(5));
    }

    #[test]
    fn test_unresolved_destination_is_reported() {
        let rel = Relationship::new("owner");
        let mut failures = Failures::new();
        rel.resolve("Shop.Pet", &mut failures);
        assert_eq!(
            failures,
            vec![Failure::reference("Shop.Pet.owner", "has no destination entity")]
        );
    }
}
