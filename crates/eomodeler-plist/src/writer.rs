//! Value tree to property list text
//!
//! Output is deterministic: dictionaries are written in insertion order,
//! one entry per line, indented by four spaces per level.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::value::{Dictionary, Value};

const INDENT: &str = "    ";

/// Encode a value as property list text (with a trailing newline)
pub fn to_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out.push('\n');
    out
}

/// Encode a value and write it to `path`, creating parent directories
pub fn to_file(path: impl AsRef<Path>, value: &Value) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_string(value))?;
    tracing::debug!("Wrote property list {}", path.display());
    Ok(())
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::String(s) => write_string(out, s, false),
        Value::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        // Debug keeps a fraction or exponent so the token reads back as
        // Real; non-finite values come out as `inf`, `-inf` and `NaN`
        Value::Real(r) => {
            let _ = write!(out, "{:?}", r);
        }
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Data(bytes) => {
            out.push('<');
            out.push_str(&hex::encode(bytes));
            out.push('>');
        }
        Value::Array(items) => write_array(out, items, depth),
        Value::Dictionary(map) => write_dictionary(out, map, depth),
    }
}

fn write_dictionary(out: &mut String, map: &Dictionary, depth: usize) {
    if map.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    for (key, value) in map {
        indent(out, depth + 1);
        write_string(out, key, true);
        out.push_str(" = ");
        write_value(out, value, depth + 1);
        out.push_str(";\n");
    }
    indent(out, depth);
    out.push('}');
}

fn write_array(out: &mut String, items: &[Value], depth: usize) {
    if items.is_empty() {
        out.push_str("()");
        return;
    }
    out.push_str("(\n");
    for (index, item) in items.iter().enumerate() {
        indent(out, depth + 1);
        write_value(out, item, depth + 1);
        if index + 1 < items.len() {
            out.push(',');
        }
        out.push('\n');
    }
    indent(out, depth);
    out.push(')');
}

/// Keys are always text, so they only need quoting for their characters;
/// values also need quoting when the bare token would read back as a
/// number or boolean.
fn write_string(out: &mut String, s: &str, is_key: bool) {
    let bare_safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | ':' | '/' | '+' | '-'))
        && !s.contains("//")
        && !s.contains("/*");
    if bare_safe && (is_key || Value::from_bare_token(s) == Value::String(s.to_string())) {
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\U{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_nested() {
        let mut inner = Dictionary::new();
        inner.insert("URL".into(), "jdbc:h2:mem".into());
        let mut map = Dictionary::new();
        map.insert("name".into(), "Person".into());
        map.insert("connectionDictionary".into(), Value::Dictionary(inner));
        map.insert("empty".into(), Value::Array(vec![]));
        let text = to_string(&Value::Dictionary(map));
        assert_eq!(
            text,
            "{\n    name = Person;\n    connectionDictionary = {\n        URL = jdbc:h2:mem;\n    };\n    empty = ();\n}\n"
        );
    }

    #[test]
    fn test_numeric_looking_strings_are_quoted() {
        assert_eq!(to_string(&Value::from("2.1")), "\"2.1\"\n");
        assert_eq!(to_string(&Value::from("true")), "\"true\"\n");
        assert_eq!(to_string(&Value::Real(2.0)), "2.0\n");
        assert_eq!(to_string(&Value::Integer(7)), "7\n");
        assert_eq!(to_string(&Value::from("inf")), "\"inf\"\n");
        assert_eq!(to_string(&Value::from("NaN")), "\"NaN\"\n");
    }

    #[test]
    fn test_non_finite_reals() {
        assert_eq!(to_string(&Value::Real(f64::INFINITY)), "inf\n");
        assert_eq!(to_string(&Value::Real(f64::NEG_INFINITY)), "-inf\n");
        assert_eq!(to_string(&Value::Real(f64::NAN)), "NaN\n");
    }

    #[test]
    fn test_special_strings_are_quoted() {
        assert_eq!(to_string(&Value::from("")), "\"\"\n");
        assert_eq!(to_string(&Value::from("a b")), "\"a b\"\n");
        assert_eq!(to_string(&Value::from("say \"hi\"")), "\"say \\\"hi\\\"\"\n");
        assert_eq!(to_string(&Value::from("http://x")), "\"http://x\"\n");
    }

    #[test]
    fn test_write_array_items() {
        let value = Value::Array(vec!["a".into(), Value::Integer(1)]);
        assert_eq!(to_string(&value), "(\n    a,\n    1\n)\n");
    }
}
