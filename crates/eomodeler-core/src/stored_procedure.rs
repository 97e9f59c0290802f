//! Stored procedure definitions

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use eomodeler_plist::Dictionary;

use crate::error::{Error, Result};
use crate::map::ModelMap;
use crate::model::Model;
use crate::naming::NameKind;
use crate::notifier::{ChangeNotifier, PropertyValue, observable_fields, update_field};

/// Direction of a stored procedure argument, persisted as 0..=3
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParameterDirection {
    /// No value passed
    #[default]
    Void,
    /// Input only
    In,
    /// Output only
    Out,
    /// Input and output
    InOut,
}

impl ParameterDirection {
    /// Decode the persisted code; unknown codes read as `Void`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::In,
            2 => Self::Out,
            3 => Self::InOut,
            _ => Self::Void,
        }
    }

    /// Persisted code
    pub fn code(self) -> i64 {
        match self {
            Self::Void => 0,
            Self::In => 1,
            Self::Out => 2,
            Self::InOut => 3,
        }
    }
}

/// One argument of a stored procedure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredProcedureArgument {
    /// Argument name
    pub name: String,
    /// Physical parameter name
    pub column_name: Option<String>,
    /// Direction
    pub direction: ParameterDirection,
    /// Database type name
    pub external_type: Option<String>,
    /// Width
    pub width: Option<i64>,
    /// Nullability
    pub allows_null: Option<bool>,
    raw: Dictionary,
}

impl StoredProcedureArgument {
    /// Create an input argument
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: ParameterDirection::In,
            ..Default::default()
        }
    }

    fn from_map(mut map: ModelMap) -> Self {
        Self {
            name: map.take_string("name").unwrap_or_default(),
            column_name: map.take_string("columnName"),
            direction: ParameterDirection::from_code(map.take_i64("parameterDirection").unwrap_or(0)),
            external_type: map.take_string("externalType"),
            width: map.take_i64("width"),
            allows_null: map.take_optional_bool("allowsNull"),
            raw: map.into_dictionary(),
        }
    }

    fn to_map(&self) -> ModelMap {
        let mut map = ModelMap::new();
        map.set_optional_bool("allowsNull", self.allows_null);
        map.set_string("columnName", self.column_name.as_deref());
        map.set_string("externalType", self.external_type.as_deref());
        map.set_string("name", Some(&self.name));
        map.set("parameterDirection", self.direction.code());
        map.set_i64("width", self.width);
        map.extend(&self.raw);
        map
    }
}

#[derive(Debug, Default)]
struct StoredProcedureFields {
    name: String,
    external_name: Option<String>,
    arguments: Vec<StoredProcedureArgument>,
    user_info: Dictionary,
    raw: Dictionary,
}

/// A stored procedure owned by a [`Model`]
#[derive(Debug)]
pub struct StoredProcedure {
    this: Weak<StoredProcedure>,
    model: RefCell<Weak<Model>>,
    fields: RefCell<StoredProcedureFields>,
    notifier: ChangeNotifier,
}

impl StoredProcedure {
    /// `name` property
    pub const NAME: &'static str = "name";
    /// `externalName` property
    pub const EXTERNAL_NAME: &'static str = "externalName";
    /// `arguments` property
    pub const ARGUMENTS: &'static str = "arguments";
    /// `userInfo` property
    pub const USER_INFO: &'static str = "userInfo";

    /// Create a detached stored procedure
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Self::with_fields(StoredProcedureFields {
            name: name.into(),
            ..Default::default()
        })
    }

    fn with_fields(fields: StoredProcedureFields) -> Rc<Self> {
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

    /// Listener registry for this procedure
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Procedure name
    pub fn name(&self) -> String {
        self.fields.borrow().name.clone()
    }

    /// Rename; the name must be unused within the owning model
    pub fn set_name(&self, name: &str) -> Result<()> {
        let model = self.model();
        if let Some(model) = &model
            && let Some(existing) = model.stored_procedure_named(name)
            && !std::ptr::eq(Rc::as_ptr(&existing), self)
        {
            return Err(Error::DuplicateName {
                kind: NameKind::StoredProcedure,
                name: name.to_string(),
                owner: model.name(),
            });
        }
        let Some(old) = update_field(&self.fields, |f| &mut f.name, name.to_string()) else {
            return Ok(());
        };
        if let Some(model) = &model {
            model.stored_procedure_renamed(&old, name);
        }
        self.fire(Self::NAME, old.into(), name.to_string().into());
        Ok(())
    }

    observable_fields! {
        /// Physical procedure name
        external_name / set_external_name: Option<String> => Self::EXTERNAL_NAME;
        /// Arguments in call order
        arguments / set_arguments: Vec<StoredProcedureArgument> => Self::ARGUMENTS;
        /// Free-form annotations
        user_info / set_user_info: Dictionary => Self::USER_INFO;
    }

    /// Append an argument; argument names are unique per procedure
    pub fn add_argument(&self, argument: StoredProcedureArgument) -> Result<()> {
        let mut arguments = self.arguments();
        if arguments.iter().any(|a| a.name == argument.name) {
            return Err(Error::DuplicateName {
                kind: NameKind::Argument,
                name: argument.name,
                owner: self.name(),
            });
        }
        arguments.push(argument);
        self.set_arguments(arguments);
        Ok(())
    }

    /// Build from a `.storedProcedure` file
    pub fn from_map(mut map: ModelMap) -> Rc<StoredProcedure> {
        Self::with_fields(StoredProcedureFields {
            name: map.take_string("name").unwrap_or_default(),
            external_name: map.take_string("externalName"),
            arguments: map
                .take_maps("arguments")
                .into_iter()
                .map(StoredProcedureArgument::from_map)
                .collect(),
            user_info: map.take_dictionary("userInfo").unwrap_or_default(),
            raw: map.into_dictionary(),
        })
    }

    /// Persisted form
    pub fn to_map(&self) -> ModelMap {
        let f = self.fields.borrow();
        let mut map = ModelMap::new();
        if !f.arguments.is_empty() {
            map.set_array(
                "arguments",
                f.arguments.iter().map(|a| a.to_map().into_value()).collect(),
            );
        }
        map.set_string("externalName", f.external_name.as_deref());
        map.set_string("name", Some(&f.name));
        map.set_dictionary("userInfo", &f.user_info);
        map.extend(&f.raw);
        map
    }

    pub(crate) fn fire(&self, property: &'static str, old: PropertyValue, new: PropertyValue) {
        self.notifier.fire(property, old, new);
        if let (Some(model), Some(this)) = (self.model(), self.this.upgrade()) {
            model.stored_procedure_changed(&this);
        }
    }
}
