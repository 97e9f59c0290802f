//! Typed, lenient access to persisted dictionaries
//!
//! Loading takes known keys out of a [`ModelMap`]; whatever is left is
//! kept on the object and appended when it is written back, so keys this
//! crate does not model survive a load/save cycle.

use eomodeler_plist::{Dictionary, Value};

/// Wrapper over one persisted dictionary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMap(Dictionary);

impl ModelMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a decoded value, if it is a dictionary
    pub fn from_value(value: Value) -> Option<Self> {
        value.into_dictionary().map(Self)
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Borrow a raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Remove a key and return its raw value
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Remove a string. Numbers are rendered as text.
    pub fn take_string(&mut self, key: &str) -> Option<String> {
        match self.take(key)? {
            Value::String(s) => Some(s),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(format!("{:?}", r)),
            Value::Boolean(b) => Some(if b { "Y" } else { "N" }.to_string()),
            _ => None,
        }
    }

    /// Remove a flag; absent or unrecognised means false
    pub fn take_bool(&mut self, key: &str) -> bool {
        self.take_optional_bool(key).unwrap_or(false)
    }

    /// Remove a flag, keeping the distinction between absent and false
    pub fn take_optional_bool(&mut self, key: &str) -> Option<bool> {
        self.take(key).and_then(|v| v.as_bool())
    }

    /// Remove an integer (an integer leaf or a numeric string)
    pub fn take_i64(&mut self, key: &str) -> Option<i64> {
        self.take(key).and_then(|v| v.as_i64())
    }

    /// Remove a nested dictionary
    pub fn take_dictionary(&mut self, key: &str) -> Option<Dictionary> {
        self.take(key).and_then(Value::into_dictionary)
    }

    /// Remove an array; absent or not an array yields an empty list
    pub fn take_array(&mut self, key: &str) -> Vec<Value> {
        match self.take(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }

    /// Remove a list of names, skipping non-string entries
    pub fn take_strings(&mut self, key: &str) -> Vec<String> {
        self.take_array(key)
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Remove a list of nested maps, skipping non-dictionary entries
    pub fn take_maps(&mut self, key: &str) -> Vec<ModelMap> {
        self.take_array(key)
            .into_iter()
            .filter_map(ModelMap::from_value)
            .collect()
    }

    /// Set a raw value
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Set a string, omitting the key when absent
    pub fn set_string(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(s) => self.set(key, s),
            None => {
                self.0.shift_remove(key);
            }
        }
    }

    /// Write a flag as `Y`, omitting it when false
    pub fn set_bool(&mut self, key: &str, value: bool) {
        if value {
            self.set(key, "Y");
        } else {
            self.0.shift_remove(key);
        }
    }

    /// Write a flag as `Y` or `N`, omitting it when unset
    pub fn set_optional_bool(&mut self, key: &str, value: Option<bool>) {
        match value {
            Some(b) => self.set(key, if b { "Y" } else { "N" }),
            None => {
                self.0.shift_remove(key);
            }
        }
    }

    /// Set an integer, omitting the key when absent
    pub fn set_i64(&mut self, key: &str, value: Option<i64>) {
        match value {
            Some(i) => self.set(key, i),
            None => {
                self.0.shift_remove(key);
            }
        }
    }

    /// Set a nested dictionary, omitting it when empty
    pub fn set_dictionary(&mut self, key: &str, value: &Dictionary) {
        if value.is_empty() {
            self.0.shift_remove(key);
        } else {
            self.set(key, value.clone());
        }
    }

    /// Set an array, even when empty
    pub fn set_array(&mut self, key: &str, items: Vec<Value>) {
        self.set(key, Value::Array(items));
    }

    /// Set a list of names, omitting it when empty
    pub fn set_strings<I, S>(&mut self, key: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<Value> = names.into_iter().map(|s| Value::String(s.into())).collect();
        if items.is_empty() {
            self.0.shift_remove(key);
        } else {
            self.set_array(key, items);
        }
    }

    /// Append preserved keys that were not written explicitly
    pub fn extend(&mut self, raw: &Dictionary) {
        for (key, value) in raw {
            if !self.0.contains_key(key) {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }

    /// Unwrap the underlying dictionary
    pub fn into_dictionary(self) -> Dictionary {
        self.0
    }

    /// Unwrap into a codec value
    pub fn into_value(self) -> Value {
        Value::Dictionary(self.0)
    }
}

impl From<Dictionary> for ModelMap {
    fn from(map: Dictionary) -> Self {
        Self(map)
    }
}
