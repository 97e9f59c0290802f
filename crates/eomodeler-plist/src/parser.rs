//! Property list text to value tree

use std::path::Path;

use crate::error::{Error, Result};
use crate::value::{Dictionary, Value};

/// Parse property list text into a value tree
pub fn from_str(input: &str) -> Result<Value> {
    Parser::new(input).parse_document()
}

/// Read and parse a property list file
pub fn from_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    tracing::debug!("Parsing property list {}", path.display());
    from_str(&contents)
}

/// Characters allowed in an unquoted token
pub(crate) fn is_bare_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | ':' | '/' | '+' | '-')
}

/// Recursive-descent parser over the input characters
pub struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Parser {
    /// Create a parser over the given text
    pub fn new(input: &str) -> Self {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Parse exactly one value followed by optional trailing whitespace
    pub fn parse_document(&mut self) -> Result<Value> {
        self.skip_whitespace()?;
        if self.peek().is_none() {
            return Err(self.error("empty property list"));
        }
        let value = self.parse_value()?;
        self.skip_whitespace()?;
        if let Some(c) = self.peek() {
            return Err(self.error(format!("unexpected trailing character '{}'", c)));
        }
        Ok(value)
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.peek() {
            Some('{') => self.parse_dictionary(),
            Some('(') => self.parse_array(),
            Some('"') => Ok(Value::String(self.parse_quoted()?)),
            Some('<') => self.parse_data(),
            Some(c) if is_bare_char(c) => Ok(Value::from_bare_token(&self.parse_bare())),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_dictionary(&mut self) -> Result<Value> {
        self.expect('{')?;
        let mut map = Dictionary::new();
        loop {
            self.skip_whitespace()?;
            if self.peek() == Some('}') {
                self.bump();
                break;
            }
            let key = self.parse_key()?;
            self.skip_whitespace()?;
            self.expect('=')?;
            self.skip_whitespace()?;
            let value = self.parse_value()?;
            self.skip_whitespace()?;
            match self.peek() {
                Some(';') => {
                    self.bump();
                }
                // a missing final semicolon is common in hand-edited files
                Some('}') => {}
                _ => return Err(self.error(format!("expected ';' after value for '{}'", key))),
            }
            map.insert(key, value);
        }
        Ok(Value::Dictionary(map))
    }

    fn parse_array(&mut self) -> Result<Value> {
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace()?;
            if self.peek() == Some(')') {
                self.bump();
                break;
            }
            items.push(self.parse_value()?);
            self.skip_whitespace()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => {}
                _ => return Err(self.error("expected ',' or ')' in array")),
            }
        }
        Ok(Value::Array(items))
    }

    fn parse_key(&mut self) -> Result<String> {
        match self.peek() {
            Some('"') => self.parse_quoted(),
            Some(c) if is_bare_char(c) => Ok(self.parse_bare()),
            Some(c) => Err(self.error(format!("expected dictionary key, found '{}'", c))),
            None => Err(self.error("unexpected end of input in dictionary")),
        }
    }

    fn parse_bare(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if !is_bare_char(c) || self.at_comment() {
                break;
            }
            token.push(c);
            self.bump();
        }
        token
    }

    fn parse_quoted(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(text),
                Some('\\') => text.push(self.parse_escape()?),
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_escape(&mut self) -> Result<char> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0c}',
            'v' => '\u{0b}',
            'U' | 'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    match self.peek().and_then(|h| h.to_digit(16)) {
                        Some(digit) => {
                            code = code * 16 + digit;
                            self.bump();
                        }
                        None => break,
                    }
                }
                char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"))?
            }
            other => other,
        })
    }

    fn parse_data(&mut self) -> Result<Value> {
        self.expect('<')?;
        let mut digits = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                Some(c) if c.is_whitespace() => {}
                Some(c) => return Err(self.error(format!("invalid character '{}' in data", c))),
                None => return Err(self.error("unterminated data")),
            }
        }
        hex::decode(&digits)
            .map(Value::Data)
            .map_err(|e| self.error(format!("invalid data: {}", e)))
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.error("unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn at_comment(&self) -> bool {
        self.peek() == Some('/') && matches!(self.peek_at(1), Some('/' | '*'))
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Syntax {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_index() {
        let text = r#"
{
    EOModelVersion = "2.1";
    adaptorName = JDBC;
    connectionDictionary = {URL = "jdbc:postgresql://localhost/db"; username = app; };
    entities = ({className = Person; name = Person; }, {className = Company; name = Company; });
}
"#;
        let value = from_str(text).unwrap();
        let map = value.as_dictionary().unwrap();
        assert_eq!(map.get("EOModelVersion"), Some(&Value::from("2.1")));
        assert_eq!(map.get("adaptorName"), Some(&Value::from("JDBC")));
        let entities = map.get("entities").unwrap().as_array().unwrap();
        assert_eq!(entities.len(), 2);
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(
            keys,
            ["EOModelVersion", "adaptorName", "connectionDictionary", "entities"]
        );
    }

    #[test]
    fn test_parse_comments_and_trailing_comma() {
        let text = "// header\n( a, /* inline */ b, )";
        let value = from_str(text).unwrap();
        assert_eq!(value, Value::Array(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_comment_ends_bare_token() {
        let value = from_str("{ name = Person//trailing note\n; path = a/b/*inline*/; }").unwrap();
        let map = value.as_dictionary().unwrap();
        assert_eq!(map.get("name"), Some(&Value::from("Person")));
        assert_eq!(map.get("path"), Some(&Value::from("a/b")));

        let value = from_str("(abc/*x*/, 1//y\n)").unwrap();
        assert_eq!(value, Value::Array(vec!["abc".into(), Value::Integer(1)]));
    }

    #[test]
    fn test_parse_escapes() {
        let value = from_str(r#""line\nnext \"quoted\" \U00e9""#).unwrap();
        assert_eq!(value, Value::from("line\nnext \"quoted\" \u{e9}"));
    }

    #[test]
    fn test_parse_data() {
        let value = from_str("<0fbd 7700>").unwrap();
        assert_eq!(value, Value::Data(vec![0x0f, 0xbd, 0x77, 0x00]));
    }

    #[test]
    fn test_missing_final_semicolon_accepted() {
        let value = from_str("{ a = 1; b = 2 }").unwrap();
        assert_eq!(value.as_dictionary().unwrap().len(), 2);
    }

    #[test]
    fn test_syntax_error_position() {
        let err = from_str("{\n  a = ;\n}").unwrap_err();
        match err {
            Error::Syntax { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 7);
            }
            _ => panic!("Expected syntax error"),
        }
    }

    #[test]
    fn test_trailing_content_rejected() {
        assert!(from_str("{ a = b; } extra").is_err());
        assert!(from_str("   ").is_err());
        assert!(from_str("\"unterminated").is_err());
    }
}
