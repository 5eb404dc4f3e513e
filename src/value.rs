use std::fmt;
use std::ops::Index;

use linked_hash_map::LinkedHashMap;
use serde::ser::{Serialize, Serializer};

/// Key/value mapping. Keys keep the order in which they were first set.
pub type Map = LinkedHashMap<String, Value>;

/// Section name to section mapping, in document order.
pub type Sections = LinkedHashMap<String, Map>;

/// A parsed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Map(Map),
}

static NULL: Value = Value::Null;

// 2^53: above this not every integer has an exact f64.
const MAX_EXACT_INTEGER: f64 = 9007199254740992.0;

/// `n` as an integer, if it has no fraction and is exactly representable.
/// Such numbers are written and deserialized without a fraction.
pub(crate) fn integral(n: f64) -> Option<i64> {
    if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER {
        Some(n as i64)
    } else {
        None
    }
}

impl Default for Value {
    fn default() -> Value {
        Value::Null
    }
}

impl Value {
    /// Look up `key` if this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Value::Null
    }

    // Turn this value into a mapping (dropping any scalar) and return it.
    pub(crate) fn make_map(&mut self) -> &mut Map {
        if !matches!(self, Value::Map(_)) {
            *self = Value::Map(Map::new());
        }
        match self {
            Value::Map(m) => m,
            _ => unreachable!(),
        }
    }

    pub(crate) fn make_array(&mut self) -> &mut Vec<Value> {
        if !matches!(self, Value::Array(_)) {
            *self = Value::Array(Vec::new());
        }
        match self {
            Value::Array(a) => a,
            _ => unreachable!(),
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match *self {
            Value::Number(n) => integral(n),
            _ => None,
        }
    }
}

impl<'a> Index<&'a str> for Value {
    type Output = Value;

    fn index(&self, key: &'a str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Value {
        Value::Map(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Value {
        Value::Array(a)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => match self.as_integer() {
                Some(i) => write!(f, "{}", i),
                None => write!(f, "{}", n),
            },
            Value::String(s) => f.write_str(s),
            Value::Array(a) => {
                f.write_str("[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match self.as_integer() {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(a) => a.serialize(serializer),
            Value::Map(m) => m.serialize(serializer),
        }
    }
}

/// Deep-merge `source` into `target`.
///
/// Nested mappings present on both sides are merged recursively; any
/// other value from `source` replaces the one in `target`. Keys already
/// in `target` keep their position.
pub fn merge_into(target: &mut Map, source: Map) {
    for (key, value) in source {
        merge_entry(target, key, value);
    }
}

pub(crate) fn merge_entry(target: &mut Map, key: String, value: Value) {
    match value {
        Value::Map(new) => match target.get_mut(&key) {
            Some(Value::Map(old)) => merge_into(old, new),
            _ => overwrite(target, key, Value::Map(new)),
        },
        value => overwrite(target, key, value),
    }
}

/// Set `key`, keeping its position if it already exists.
pub(crate) fn overwrite(target: &mut Map, key: String, value: Value) {
    match target.get_mut(&key) {
        Some(slot) => *slot = value,
        None => {
            target.insert(key, value);
        }
    }
}

#[cfg(test)]
pub(crate) fn map(entries: Vec<(&str, Value)>) -> Map {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_deep_and_keeps_order() {
        let mut a = map(vec![
            ("key", "value".into()),
            (
                "redis",
                map(vec![("host", "x.x.x.x".into()), ("port", 7468.0.into())]).into(),
            ),
        ]);
        let b = map(vec![
            ("redis", map(vec![("port", 6379.0.into())]).into()),
            ("smtp", "127.0.0.1".into()),
        ]);
        merge_into(&mut a, b);

        let keys: Vec<_> = a.keys().cloned().collect();
        assert_eq!(keys, vec!["key", "redis", "smtp"]);
        let redis = Value::Map(a.clone())["redis"].clone();
        assert_eq!(redis["host"], Value::from("x.x.x.x"));
        assert_eq!(redis["port"], Value::Number(6379.0));
    }

    #[test]
    fn merge_replaces_arrays_and_scalars() {
        let mut a = map(vec![("list", vec![Value::from("a")].into()), ("x", map(vec![]).into())]);
        merge_into(&mut a, map(vec![("list", vec![Value::from("b")].into()), ("x", "y".into())]));
        assert_eq!(a["list"], Value::Array(vec!["b".into()]));
        assert_eq!(a["x"], Value::from("y"));
    }

    #[test]
    fn index_and_display() {
        let v = Value::Map(map(vec![
            ("n", 5.0.into()),
            ("f", 1.5.into()),
            ("a", vec![Value::Bool(true), Value::Null].into()),
        ]));
        assert!(v["missing"].is_null());
        assert_eq!(v["n"].as_f64(), Some(5.0));
        assert_eq!(v.to_string(), "{n: 5, f: 1.5, a: [true, null]}");
    }

    #[test]
    fn serialize_keeps_order_and_integers() {
        let v = Value::Map(map(vec![
            ("n", 5.0.into()),
            ("neg", (-2.0).into()),
            ("f", 1.5.into()),
            ("z", Value::Null),
            (
                "m",
                map(vec![("a", vec![Value::from("x"), true.into()].into())]).into(),
            ),
        ]));
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            r#"{"n":5,"neg":-2,"f":1.5,"z":null,"m":{"a":["x",true]}}"#
        );
        let json = serde_json::to_value(&v).unwrap();
        assert!(json["n"].is_i64());
        assert!(json["f"].is_f64());
    }

    #[test]
    fn make_map_replaces_scalar() {
        let mut v = Value::from("scalar");
        v.make_map().insert("k".to_string(), Value::Bool(false));
        assert_eq!(v["k"], Value::Bool(false));
        let mut v = Value::from("scalar");
        v.make_array().push(Value::Null);
        assert_eq!(v, Value::Array(vec![Value::Null]));
    }
}
