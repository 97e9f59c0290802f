//! Synchronous property-change notification
//!
//! Every mutable model object owns a [`ChangeNotifier`]. Listeners
//! subscribe by property name (or to every property) and are invoked on
//! the mutating thread, in registration order, after the new state is in
//! place. A panicking listener is not caught.
//!
//! Collection-valued properties are copy-on-write: a change event carries
//! the previous and the replacement `Rc<Vec<_>>`, never a collection that
//! was mutated in place.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use eomodeler_plist::Dictionary;

use crate::attribute::Attribute;
use crate::database_config::DatabaseConfig;
use crate::entity::Entity;
use crate::model::Model;
use crate::relationship::{Join, Relationship};
use crate::stored_procedure::{StoredProcedure, StoredProcedureArgument};

/// Old or new value carried by a [`PropertyChange`]
#[derive(Clone)]
pub enum PropertyValue {
    /// No value
    None,
    /// Flag
    Bool(bool),
    /// Number
    Int(i64),
    /// Text
    Text(String),
    /// Nested map (connection dictionaries, user info)
    Dictionary(Dictionary),
    /// List of names
    Names(Vec<String>),
    /// Single entity
    Entity(Rc<Entity>),
    /// Entity collection snapshot
    Entities(Rc<Vec<Rc<Entity>>>),
    /// Single attribute
    Attribute(Rc<Attribute>),
    /// Attribute collection snapshot
    Attributes(Rc<Vec<Rc<Attribute>>>),
    /// Single relationship
    Relationship(Rc<Relationship>),
    /// Relationship collection snapshot
    Relationships(Rc<Vec<Rc<Relationship>>>),
    /// Relationship joins
    Joins(Vec<Join>),
    /// Single stored procedure
    StoredProcedure(Rc<StoredProcedure>),
    /// Stored procedure collection snapshot
    StoredProcedures(Rc<Vec<Rc<StoredProcedure>>>),
    /// Stored procedure arguments
    Arguments(Vec<StoredProcedureArgument>),
    /// Single database config
    DatabaseConfig(Rc<DatabaseConfig>),
    /// Database config collection snapshot
    DatabaseConfigs(Rc<Vec<Rc<DatabaseConfig>>>),
    /// Model collection snapshot
    Models(Rc<Vec<Rc<Model>>>),
}

impl PropertyValue {
    /// Text view, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flag view, if this is a flag value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Number of elements for collection snapshots
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Entities(v) => Some(v.len()),
            Self::Attributes(v) => Some(v.len()),
            Self::Relationships(v) => Some(v.len()),
            Self::StoredProcedures(v) => Some(v.len()),
            Self::DatabaseConfigs(v) => Some(v.len()),
            Self::Models(v) => Some(v.len()),
            Self::Names(v) => Some(v.len()),
            Self::Joins(v) => Some(v.len()),
            Self::Arguments(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Whether this is [`PropertyValue::None`]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => write!(f, "Bool({})", b),
            Self::Int(i) => write!(f, "Int({})", i),
            Self::Text(s) => write!(f, "Text({:?})", s),
            Self::Dictionary(d) => write!(f, "Dictionary({} keys)", d.len()),
            Self::Names(n) => write!(f, "Names({:?})", n),
            Self::Entity(e) => write!(f, "Entity({})", e.name()),
            Self::Attribute(a) => write!(f, "Attribute({})", a.name()),
            Self::Relationship(r) => write!(f, "Relationship({})", r.name()),
            Self::StoredProcedure(p) => write!(f, "StoredProcedure({})", p.name()),
            Self::DatabaseConfig(c) => write!(f, "DatabaseConfig({})", c.name()),
            other => write!(f, "Collection({})", other.len().unwrap_or_default()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Option<String>> for PropertyValue {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::None, Self::Text)
    }
}

impl From<Option<i64>> for PropertyValue {
    fn from(i: Option<i64>) -> Self {
        i.map_or(Self::None, Self::Int)
    }
}

impl From<Option<bool>> for PropertyValue {
    fn from(b: Option<bool>) -> Self {
        b.map_or(Self::None, Self::Bool)
    }
}

impl From<Dictionary> for PropertyValue {
    fn from(d: Dictionary) -> Self {
        Self::Dictionary(d)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}

impl From<Vec<Join>> for PropertyValue {
    fn from(joins: Vec<Join>) -> Self {
        Self::Joins(joins)
    }
}

impl From<Vec<StoredProcedureArgument>> for PropertyValue {
    fn from(arguments: Vec<StoredProcedureArgument>) -> Self {
        Self::Arguments(arguments)
    }
}

/// A committed change to one property
#[derive(Debug, Clone)]
pub struct PropertyChange {
    /// Property name (one of the `*::NAME`-style constants)
    pub property: &'static str,
    /// Value before the change
    pub old: PropertyValue,
    /// Value after the change
    pub new: PropertyValue,
}

/// Callback invoked for each matching change
pub type Listener = Rc<dyn Fn(&PropertyChange)>;

/// Handle returned by [`ChangeNotifier::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    property: Option<String>,
    listener: Listener,
}

/// Per-object listener registry
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: Cell<u64>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl ChangeNotifier {
    /// Create an empty notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for changes to one property
    pub fn subscribe(&self, property: &str, listener: impl Fn(&PropertyChange) + 'static) -> ListenerId {
        self.register(Some(property.to_string()), Rc::new(listener))
    }

    /// Listen for changes to every property
    pub fn subscribe_all(&self, listener: impl Fn(&PropertyChange) + 'static) -> ListenerId {
        self.register(None, Rc::new(listener))
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Deliver a change to every listener registered for `property` and to
    /// every catch-all listener, in registration order.
    pub fn fire(&self, property: &'static str, old: PropertyValue, new: PropertyValue) {
        // snapshot first so listeners may (un)subscribe while being called
        let listeners: Vec<Listener> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.property.as_deref().is_none_or(|p| p == property))
            .map(|s| Rc::clone(&s.listener))
            .collect();
        if listeners.is_empty() {
            return;
        }
        let change = PropertyChange { property, old, new };
        for listener in listeners {
            listener(&change);
        }
    }

    fn register(&self, property: Option<String>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            property,
            listener,
        });
        id
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Replace one field of a `RefCell`-held struct, returning the old value
/// only if the value actually changed. The borrow is released before
/// returning so callers can notify safely.
pub(crate) fn update_field<S, T: PartialEq>(
    cell: &RefCell<S>,
    field: impl FnOnce(&mut S) -> &mut T,
    value: T,
) -> Option<T> {
    let mut state = cell.borrow_mut();
    let slot = field(&mut state);
    if *slot == value {
        return None;
    }
    Some(std::mem::replace(slot, value))
}

/// Copy-on-write append. Returns `(old, new)` snapshots.
pub(crate) fn cow_push<T: Clone>(cell: &RefCell<Rc<Vec<T>>>, item: T) -> (Rc<Vec<T>>, Rc<Vec<T>>) {
    let mut slot = cell.borrow_mut();
    let mut next = Vec::clone(&slot);
    next.push(item);
    let next = Rc::new(next);
    let old = std::mem::replace(&mut *slot, Rc::clone(&next));
    (old, next)
}

/// Copy-on-write removal of the first element matching `matches`.
/// Returns `None` (and leaves the collection untouched) if nothing matched.
pub(crate) fn cow_remove<T: Clone>(
    cell: &RefCell<Rc<Vec<T>>>,
    matches: impl Fn(&T) -> bool,
) -> Option<(Rc<Vec<T>>, Rc<Vec<T>>)> {
    let mut slot = cell.borrow_mut();
    let index = slot.iter().position(matches)?;
    let mut next = Vec::clone(&slot);
    next.remove(index);
    let next = Rc::new(next);
    let old = std::mem::replace(&mut *slot, Rc::clone(&next));
    Some((old, next))
}

/// In-place append used by bulk loads that do not notify
pub(crate) fn quiet_push<T: Clone>(cell: &RefCell<Rc<Vec<T>>>, item: T) {
    Rc::make_mut(&mut *cell.borrow_mut()).push(item);
}

/// Generates a getter and a notifying setter per field of `self.fields`.
/// The owning type provides `fn fire(&self, &'static str, PropertyValue, PropertyValue)`.
macro_rules! observable_fields {
    ($( $(#[$meta:meta])* $field:ident / $setter:ident : $ty:ty => $property:expr ;)*) => {
        $(
            $(#[$meta])*
            pub fn $field(&self) -> $ty {
                self.fields.borrow().$field.clone()
            }

            #[doc = concat!("Set `", stringify!($field), "`, notifying listeners if it changed")]
            pub fn $setter(&self, value: $ty) {
                if let Some(old) =
                    $crate::notifier::update_field(&self.fields, |f| &mut f.$field, value.clone())
                {
                    self.fire($property, old.into(), value.into());
                }
            }
        )*
    };
}

pub(crate) use observable_fields;
