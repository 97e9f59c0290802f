//! Property list value tree

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

/// Ordered string-keyed mapping. Lookups are by key; iteration (and
/// therefore writing) follows insertion order.
pub type Dictionary = IndexMap<String, Value>;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("valid regex"));

static REAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+\.[0-9]*|\.[0-9]+|[0-9]+)([eE][+-]?[0-9]+)?$").expect("valid regex")
});

/// A decoded property list node
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text leaf (quoted, or a bare token that is not a number or boolean)
    String(String),
    /// Bare decimal integer
    Integer(i64),
    /// Bare decimal number with a fraction or exponent
    Real(f64),
    /// Bare `true` / `false`
    Boolean(bool),
    /// `<hex>` blob
    Data(Vec<u8>),
    /// `( a, b, c )`
    Array(Vec<Value>),
    /// `{ key = value; }`
    Dictionary(Dictionary),
}

impl Value {
    /// Classify an unquoted token the same way the parser does.
    pub fn from_bare_token(token: &str) -> Self {
        if INTEGER.is_match(token) {
            if let Ok(number) = token.parse::<i64>() {
                return Self::Integer(number);
            }
        } else if REAL.is_match(token) {
            if let Ok(number) = token.parse::<f64>() {
                return Self::Real(number);
            }
        }
        match token {
            "true" => Self::Boolean(true),
            "false" => Self::Boolean(false),
            // the writer's spelling of non-finite reals
            "inf" | "+inf" => Self::Real(f64::INFINITY),
            "-inf" => Self::Real(f64::NEG_INFINITY),
            "NaN" => Self::Real(f64::NAN),
            _ => Self::String(token.to_string()),
        }
    }

    /// Borrow the string leaf, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of the value. Numeric strings are accepted since most
    /// model files quote every scalar.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean view of the value (`Y`, `YES`, `true`, `1` are true)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            Self::String(s) => match s.as_str() {
                "Y" | "y" | "YES" | "Yes" | "yes" | "true" | "TRUE" | "1" => Some(true),
                "N" | "n" | "NO" | "No" | "no" | "false" | "FALSE" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Borrow the nested array, if this is one
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the nested dictionary, if this is one
    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(map) => Some(map),
            _ => None,
        }
    }

    /// Consume the value, returning the dictionary if this is one
    pub fn into_dictionary(self) -> Option<Dictionary> {
        match self {
            Self::Dictionary(map) => Some(map),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Self::Real(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Dictionary> for Value {
    fn from(map: Dictionary) -> Self {
        Self::Dictionary(map)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Real(r) => serializer.serialize_f64(*r),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Data(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            Self::Array(items) => items.serialize(serializer),
            Self::Dictionary(map) => map.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_token_classification() {
        assert_eq!(Value::from_bare_token("42"), Value::Integer(42));
        assert_eq!(Value::from_bare_token("-7"), Value::Integer(-7));
        assert_eq!(Value::from_bare_token("2.1"), Value::Real(2.1));
        assert_eq!(Value::from_bare_token("1e3"), Value::Real(1000.0));
        assert_eq!(Value::from_bare_token("true"), Value::Boolean(true));
        assert_eq!(Value::from_bare_token("Y"), Value::String("Y".into()));
        assert_eq!(
            Value::from_bare_token("com.example.Person"),
            Value::String("com.example.Person".into())
        );
    }

    #[test]
    fn test_integer_overflow_stays_text() {
        let token = "99999999999999999999999";
        assert_eq!(Value::from_bare_token(token), Value::String(token.into()));
    }

    #[test]
    fn test_lenient_views() {
        assert_eq!(Value::from("Y").as_bool(), Some(true));
        assert_eq!(Value::from("N").as_bool(), Some(false));
        assert_eq!(Value::from("maybe").as_bool(), None);
        assert_eq!(Value::from("255").as_i64(), Some(255));
        assert_eq!(Value::Integer(3).as_str(), None);
    }

    #[test]
    fn test_serialize_to_json() {
        let mut map = Dictionary::new();
        map.insert("name".into(), "Person".into());
        map.insert("width".into(), Value::Integer(10));
        map.insert("blob".into(), Value::Data(vec![0xde, 0xad]));
        let json = serde_json::to_string(&Value::Dictionary(map)).unwrap();
        assert_eq!(json, r#"{"name":"Person","width":10,"blob":"dead"}"#);
    }
}
