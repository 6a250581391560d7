//! Cell values and row identity.
//!
//! [`Value`] is the dynamically typed payload carried by every cell of the
//! result relation. [`ResultType`] is the statically declared type of a
//! projected column, and [`RowKey`] is the hashable identity of a row.

use std::fmt;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL `NULL`, or a column with no query field.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl Value {
    /// Returns `true` if this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the number as `f64` for integer and float values.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the boolean if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text used by the default cell delegate. `Null` renders as empty.
    pub fn display_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Declared type of a projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    /// UTF-8 text.
    Text,
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Real,
    /// Boolean, stored as 0/1 by SQL backends.
    Boolean,
}

impl ResultType {
    /// Convert a raw value read from a backend into this type.
    ///
    /// Returns `None` when the value cannot represent this type. `Null` is
    /// valid for every type.
    pub fn coerce(self, value: Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (ResultType::Text, Value::Text(s)) => Some(Value::Text(s)),
            (ResultType::Text, other) => Some(Value::Text(other.display_text())),
            (ResultType::Integer, Value::Int(n)) => Some(Value::Int(n)),
            (ResultType::Integer, Value::Bool(b)) => Some(Value::Int(b as i64)),
            (ResultType::Real, Value::Float(n)) => Some(Value::Float(n)),
            (ResultType::Real, Value::Int(n)) => Some(Value::Float(n as f64)),
            (ResultType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
            (ResultType::Boolean, Value::Int(n)) => Some(Value::Bool(n != 0)),
            _ => None,
        }
    }

    /// Convert a value entered in the editor into this type.
    ///
    /// Text is parsed for the non-text types, and blank text becomes `Null`.
    /// Returns a message fit to show next to the field when the value does
    /// not fit.
    pub fn parse(self, value: Value) -> Result<Value, String> {
        let parsed = match (self, value) {
            (ResultType::Text, value) => self.coerce(value),
            (_, Value::Text(text)) => self.parse_text(text.trim()),
            (_, value) => self.coerce(value),
        };
        parsed.ok_or_else(|| self.expected().to_string())
    }

    fn parse_text(self, text: &str) -> Option<Value> {
        if text.is_empty() {
            return Some(Value::Null);
        }
        match self {
            ResultType::Text => Some(Value::Text(text.to_string())),
            ResultType::Integer => text.parse().ok().map(Value::Int),
            ResultType::Real => text
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Float),
            ResultType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }

    fn expected(self) -> &'static str {
        match self {
            ResultType::Text => "expected text",
            ResultType::Integer => "expected an integer",
            ResultType::Real => "expected a number",
            ResultType::Boolean => "expected true or false",
        }
    }
}

/// Stable identity of a row across refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    /// Integer key.
    Int(i64),
    /// Text key.
    Text(String),
}

impl RowKey {
    /// Build a key from a cell value. Only integer and text values qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(n) => Some(RowKey::Int(*n)),
            Value::Text(s) => Some(RowKey::Text(s.clone())),
            _ => None,
        }
    }

    /// The key as a cell value.
    pub fn to_value(&self) -> Value {
        match self {
            RowKey::Int(n) => Value::Int(*n),
            RowKey::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Int(n) => write!(f, "{n}"),
            RowKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RowKey {
    fn from(n: i64) -> Self {
        RowKey::Int(n)
    }
}

impl From<i32> for RowKey {
    fn from(n: i32) -> Self {
        RowKey::Int(n as i64)
    }
}

impl From<String> for RowKey {
    fn from(s: String) -> Self {
        RowKey::Text(s)
    }
}

impl From<&str> for RowKey {
    fn from(s: &str) -> Self {
        RowKey::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text() {
        assert_eq!(Value::Null.display_text(), "");
        assert_eq!(Value::from(3).display_text(), "3");
        assert_eq!(Value::from("Old").to_string(), "Old");
    }

    #[test]
    fn test_coerce() {
        assert_eq!(ResultType::Boolean.coerce(Value::Int(1)), Some(Value::Bool(true)));
        assert_eq!(ResultType::Real.coerce(Value::Int(2)), Some(Value::Float(2.0)));
        assert_eq!(ResultType::Integer.coerce(Value::Text("x".into())), None);
        assert_eq!(ResultType::Integer.coerce(Value::Null), Some(Value::Null));
    }

    #[test]
    fn test_parse_editor_text() {
        assert_eq!(ResultType::Integer.parse(Value::from(" 12 ")), Ok(Value::Int(12)));
        assert_eq!(ResultType::Integer.parse(Value::from("x")), Err("expected an integer".into()));
        assert_eq!(ResultType::Integer.parse(Value::from("1.5")), Err("expected an integer".into()));
        assert_eq!(ResultType::Real.parse(Value::from("2.5")), Ok(Value::Float(2.5)));
        assert_eq!(ResultType::Real.parse(Value::from("inf")), Err("expected a number".into()));
        assert_eq!(ResultType::Boolean.parse(Value::from("No")), Ok(Value::Bool(false)));
        assert_eq!(ResultType::Real.parse(Value::from("")), Ok(Value::Null));
        assert_eq!(ResultType::Text.parse(Value::Int(3)), Ok(Value::from("3")));
        assert_eq!(ResultType::Text.parse(Value::from(" a ")), Ok(Value::from(" a ")));
    }

    #[test]
    fn test_row_key_from_value() {
        assert_eq!(RowKey::from_value(&Value::Int(7)), Some(RowKey::Int(7)));
        assert_eq!(RowKey::from_value(&Value::Float(1.5)), None);
        assert_eq!(RowKey::from("a").to_value(), Value::from("a"));
    }
}
