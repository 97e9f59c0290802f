//! Attributes: column-level properties of an entity

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use eomodeler_plist::Dictionary;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::failure::{Failure, Failures};
use crate::map::ModelMap;
use crate::naming::NameKind;
use crate::notifier::{ChangeNotifier, PropertyValue, observable_fields};

#[derive(Debug, Default)]
struct AttributeFields {
    name: String,
    column_name: Option<String>,
    external_type: Option<String>,
    value_class_name: Option<String>,
    value_type: Option<String>,
    width: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
    allows_null: Option<bool>,
    definition: Option<String>,
    read_format: Option<String>,
    write_format: Option<String>,
    prototype_name: Option<String>,
    primary_key: bool,
    class_property: bool,
    used_for_locking: bool,
    user_info: Dictionary,
    raw: Dictionary,
}

/// A column (or derived value) of an [`Entity`]
///
/// Unset fields fall back to the attribute's prototype through the
/// `effective_*` getters.
#[derive(Debug)]
pub struct Attribute {
    this: Weak<Attribute>,
    entity: RefCell<Weak<Entity>>,
    fields: RefCell<AttributeFields>,
    notifier: ChangeNotifier,
}

macro_rules! inherited {
    ($( $effective:ident => $field:ident : $ty:ty ;)*) => {
        $(
            #[doc = concat!("`", stringify!($field), "`, or the prototype's when unset")]
            pub fn $effective(&self) -> $ty {
                self.$field().or_else(|| self.prototype().and_then(|p| p.$field()))
            }
        )*
    };
}

impl Attribute {
    /// `name` property
    pub const NAME: &'static str = "name";
    /// `columnName` property
    pub const COLUMN_NAME: &'static str = "columnName";
    /// `externalType` property
    pub const EXTERNAL_TYPE: &'static str = "externalType";
    /// `valueClassName` property
    pub const VALUE_CLASS_NAME: &'static str = "valueClassName";
    /// `valueType` property
    pub const VALUE_TYPE: &'static str = "valueType";
    /// `width` property
    pub const WIDTH: &'static str = "width";
    /// `precision` property
    pub const PRECISION: &'static str = "precision";
    /// `scale` property
    pub const SCALE: &'static str = "scale";
    /// `allowsNull` property
    pub const ALLOWS_NULL: &'static str = "allowsNull";
    /// `definition` property
    pub const DEFINITION: &'static str = "definition";
    /// `readFormat` property
    pub const READ_FORMAT: &'static str = "readFormat";
    /// `writeFormat` property
    pub const WRITE_FORMAT: &'static str = "writeFormat";
    /// `prototypeName` property
    pub const PROTOTYPE_NAME: &'static str = "prototypeName";
    /// `primaryKey` property
    pub const PRIMARY_KEY: &'static str = "primaryKey";
    /// `classProperty` property
    pub const CLASS_PROPERTY: &'static str = "classProperty";
    /// `usedForLocking` property
    pub const USED_FOR_LOCKING: &'static str = "usedForLocking";
    /// `userInfo` property
    pub const USER_INFO: &'static str = "userInfo";

    /// Create a detached attribute
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Self::with_fields(AttributeFields {
            name: name.into(),
            ..Default::default()
        })
    }

    fn with_fields(fields: AttributeFields) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            entity: RefCell::new(Weak::new()),
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

    /// Listener registry for this attribute
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Attribute name
    pub fn name(&self) -> String {
        self.fields.borrow().name.clone()
    }

    /// Rename the attribute. Fails if the owning entity already has a
    /// property with that name.
    pub fn set_name(&self, name: &str) -> Result<()> {
        if let Some(entity) = self.entity() {
            let taken = entity
                .property_named(name)
                .is_some_and(|other| !other.is_attribute(self));
            if taken {
                return Err(Error::DuplicateName {
                    kind: NameKind::Attribute,
                    name: name.to_string(),
                    owner: entity.name(),
                });
            }
        }
        let old = crate::notifier::update_field(&self.fields, |f| &mut f.name, name.to_string());
        if let Some(old) = old {
            self.fire(Self::NAME, old.clone().into(), name.to_string().into());
            if let Some(entity) = self.entity() {
                entity.attribute_renamed(&old, name);
            }
        }
        Ok(())
    }

    observable_fields! {
        /// Physical column name
        column_name / set_column_name: Option<String> => Self::COLUMN_NAME;
        /// Database type name
        external_type / set_external_type: Option<String> => Self::EXTERNAL_TYPE;
        /// Class of the mapped value
        value_class_name / set_value_class_name: Option<String> => Self::VALUE_CLASS_NAME;
        /// Value type code
        value_type / set_value_type: Option<String> => Self::VALUE_TYPE;
        /// Column width
        width / set_width: Option<i64> => Self::WIDTH;
        /// Numeric precision
        precision / set_precision: Option<i64> => Self::PRECISION;
        /// Numeric scale
        scale / set_scale: Option<i64> => Self::SCALE;
        /// Nullability; `None` when inherited
        allows_null / set_allows_null: Option<bool> => Self::ALLOWS_NULL;
        /// Derived-value expression
        definition / set_definition: Option<String> => Self::DEFINITION;
        /// Custom read expression
        read_format / set_read_format: Option<String> => Self::READ_FORMAT;
        /// Custom write expression
        write_format / set_write_format: Option<String> => Self::WRITE_FORMAT;
        /// Name of the prototype attribute this one inherits from
        prototype_name / set_prototype_name: Option<String> => Self::PROTOTYPE_NAME;
        /// Part of the entity's primary key
        primary_key / set_primary_key: bool => Self::PRIMARY_KEY;
        /// Exposed on the generated class
        class_property / set_class_property: bool => Self::CLASS_PROPERTY;
        /// Compared for optimistic locking
        used_for_locking / set_used_for_locking: bool => Self::USED_FOR_LOCKING;
        /// Free-form annotations
        user_info / set_user_info: Dictionary => Self::USER_INFO;
    }

    /// The prototype attribute named by `prototype_name`, resolved
    /// through the owning model's prototype cache
    pub fn prototype(&self) -> Option<Rc<Attribute>> {
        let name = self.prototype_name()?;
        let model = self.entity()?.model()?;
        model
            .prototype_attribute_named(&name)
            .filter(|p| !std::ptr::eq(Rc::as_ptr(p), self))
    }

    inherited! {
        effective_column_name => column_name: Option<String>;
        effective_external_type => external_type: Option<String>;
        effective_value_class_name => value_class_name: Option<String>;
        effective_value_type => value_type: Option<String>;
        effective_width => width: Option<i64>;
        effective_precision => precision: Option<i64>;
        effective_scale => scale: Option<i64>;
        effective_allows_null => allows_null: Option<bool>;
        effective_definition => definition: Option<String>;
        effective_read_format => read_format: Option<String>;
        effective_write_format => write_format: Option<String>;
    }

    /// Whether this attribute is derived rather than stored
    pub fn is_derived(&self) -> bool {
        self.effective_definition().is_some()
    }

    /// Copy of this attribute, detached from any entity
    pub fn duplicate(&self, name: &str) -> Rc<Attribute> {
        let f = self.fields.borrow();
        Self::with_fields(AttributeFields {
            name: name.to_string(),
            column_name: f.column_name.clone(),
            external_type: f.external_type.clone(),
            value_class_name: f.value_class_name.clone(),
            value_type: f.value_type.clone(),
            width: f.width,
            precision: f.precision,
            scale: f.scale,
            allows_null: f.allows_null,
            definition: f.definition.clone(),
            read_format: f.read_format.clone(),
            write_format: f.write_format.clone(),
            prototype_name: f.prototype_name.clone(),
            primary_key: f.primary_key,
            class_property: f.class_property,
            used_for_locking: f.used_for_locking,
            user_info: f.user_info.clone(),
            raw: f.raw.clone(),
        })
    }

    /// Build from one entry of an entity's `attributes` list. Entity-scoped
    /// flags are applied by the entity afterwards.
    pub fn from_map(mut map: ModelMap) -> Rc<Attribute> {
        let fields = AttributeFields {
            name: map.take_string("name").unwrap_or_default(),
            column_name: map.take_string("columnName"),
            external_type: map.take_string("externalType"),
            value_class_name: map.take_string("valueClassName"),
            value_type: map.take_string("valueType"),
            width: map.take_i64("width"),
            precision: map.take_i64("precision"),
            scale: map.take_i64("scale"),
            allows_null: map.take_optional_bool("allowsNull"),
            definition: map.take_string("definition"),
            read_format: map.take_string("readFormat"),
            write_format: map.take_string("writeFormat"),
            prototype_name: map.take_string("prototypeName"),
            user_info: map.take_dictionary("userInfo").unwrap_or_default(),
            raw: map.into_dictionary(),
            ..Default::default()
        };
        Self::with_fields(fields)
    }

    /// Persisted form
    pub fn to_map(&self) -> ModelMap {
        let f = self.fields.borrow();
        let mut map = ModelMap::new();
        map.set_optional_bool("allowsNull", f.allows_null);
        map.set_string("columnName", f.column_name.as_deref());
        map.set_string("definition", f.definition.as_deref());
        map.set_string("externalType", f.external_type.as_deref());
        map.set_string("name", Some(&f.name));
        map.set_i64("precision", f.precision);
        map.set_string("prototypeName", f.prototype_name.as_deref());
        map.set_string("readFormat", f.read_format.as_deref());
        map.set_i64("scale", f.scale);
        map.set_dictionary("userInfo", &f.user_info);
        map.set_string("valueClassName", f.value_class_name.as_deref());
        map.set_string("valueType", f.value_type.as_deref());
        map.set_i64("width", f.width);
        map.set_string("writeFormat", f.write_format.as_deref());
        map.extend(&f.raw);
        map
    }

    /// Structural checks; findings are appended to `failures`
    pub fn verify(&self, path: &str, failures: &mut Failures) {
        let path = format!("{}.{}", path, self.name());
        if let Some(prototype_name) = self.prototype_name()
            && self.prototype().is_none()
        {
            failures.push(Failure::reference(
                &path,
                format!("prototype '{}' does not exist", prototype_name),
            ));
        }
        if self.effective_column_name().is_none() && self.effective_definition().is_none() {
            failures.push(Failure::reference(
                &path,
                "has neither a column name nor a definition",
            ));
        }
        if self.primary_key() && self.effective_allows_null() == Some(true) {
            failures.push(Failure::reference(&path, "is a primary key but allows null"));
        }
    }

    pub(crate) fn fire(&self, property: &'static str, old: PropertyValue, new: PropertyValue) {
        self.notifier.fire(property, old, new);
        if let (Some(entity), Some(this)) = (self.entity(), self.this.upgrade()) {
            entity.attribute_changed(&this, property);
        }
    }
}
