//! Compiled-in setting descriptors and their declared value types.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::registry::MODULE_SEPARATOR;

/// Identity, default and documentation of one runtime setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigDescriptor {
    /// `module/dotted.key`
    pub id: String,
    pub module: String,
    pub key: String,
    pub description: String,
    pub default: Value,
}

impl ConfigDescriptor {
    pub fn new(
        module: impl Into<String>,
        key: impl Into<String>,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        let module = module.into();
        let key = key.into();
        Self {
            id: format!("{module}{MODULE_SEPARATOR}{key}"),
            module,
            key,
            description: description.into(),
            default,
        }
    }

    /// Declared type, taken from the default value.
    pub fn kind(&self) -> ValueKind {
        ValueKind::of(&self.default)
    }

    /// Whether `value` matches the declared type.
    pub fn accepts(&self, value: &Value) -> bool {
        self.kind().accepts(value)
    }
}

/// Shape of a JSON setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(n) if n.is_f64() => ValueKind::Float,
            Value::Number(_) => ValueKind::Integer,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// A `Null` declaration accepts anything; floats accept integers.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, ValueKind::of(value)) {
            (ValueKind::Null, _) => true,
            (ValueKind::Float, ValueKind::Integer) => true,
            (expected, actual) => expected == actual,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_default() {
        assert_eq!(ValueKind::of(&json!(8)), ValueKind::Integer);
        assert_eq!(ValueKind::of(&json!(-3)), ValueKind::Integer);
        assert_eq!(ValueKind::of(&json!(0.5)), ValueKind::Float);
        assert_eq!(ValueKind::of(&json!("x")), ValueKind::String);
        assert_eq!(ValueKind::of(&json!({"a": 1})), ValueKind::Object);
    }

    #[test]
    fn test_accepts() {
        let d = ConfigDescriptor::new("auth", "password.min", "min", json!(8));
        assert_eq!(d.id, "auth/password.min");
        assert!(d.accepts(&json!(10)));
        assert!(!d.accepts(&json!("10")));
        assert!(!d.accepts(&json!(1.5)));

        assert!(ValueKind::Float.accepts(&json!(2)));
        assert!(ValueKind::Null.accepts(&json!([1, 2])));
        assert!(!ValueKind::Bool.accepts(&Value::Null));
    }
}
