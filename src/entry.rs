use crate::error::{Error, ErrorCode, Result, TokenPos};
use crate::value::{overwrite, Map, Value};

/// One `key = value` line.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Value,
    /// Key was written as `key[]`: append instead of overwrite.
    pub is_array: bool,
    /// Key was a quoted string: never split on `.`.
    pub is_string_key: bool,
}

impl Entry {
    /// Store this entry in `target`.
    ///
    /// With `dot_key`, an unquoted key `a.b.c` is stored as nested
    /// mappings `a -> b -> c`. Intermediate components may not be empty.
    pub fn set(self, target: &mut Map, dot_key: bool) -> Result<()> {
        let Entry {
            key,
            value,
            is_array,
            is_string_key,
        } = self;

        let mut obj = target;
        let mut leaf = key.as_str();
        if !is_string_key && dot_key {
            if let Some(idx) = key.rfind('.') {
                for component in key[..idx].split('.') {
                    if component.is_empty() {
                        return Err(Error::new(ErrorCode::Key, "empty key", TokenPos::none()));
                    }
                    obj = obj
                        .entry(component.to_string())
                        .or_insert_with(|| Value::Map(Map::new()))
                        .make_map();
                }
                leaf = &key[idx + 1..];
            }
        }

        if is_array {
            obj.entry(leaf.to_string())
                .or_insert_with(|| Value::Array(Vec::new()))
                .make_array()
                .push(value);
        } else {
            overwrite(obj, leaf.to_string(), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::map;

    fn entry(key: &str, value: Value) -> Entry {
        Entry {
            key: key.to_string(),
            value,
            is_array: false,
            is_string_key: false,
        }
    }

    #[test]
    fn dotted_key_expands() {
        let mut m = Map::new();
        entry("x.y.z", 5.0.into()).set(&mut m, true).unwrap();
        let expected = map(vec![(
            "x",
            map(vec![("y", map(vec![("z", 5.0.into())]).into())]).into(),
        )]);
        assert_eq!(m, expected);

        let mut m = Map::new();
        entry("x.y.z", 5.0.into()).set(&mut m, false).unwrap();
        assert_eq!(m, map(vec![("x.y.z", 5.0.into())]));
    }

    #[test]
    fn quoted_key_is_not_split() {
        let mut m = Map::new();
        let mut e = entry("a.b", "v".into());
        e.is_string_key = true;
        e.set(&mut m, true).unwrap();
        assert_eq!(m, map(vec![("a.b", "v".into())]));
    }

    #[test]
    fn empty_component_is_an_error() {
        let mut m = Map::new();
        let err = entry("a..b", "v".into()).set(&mut m, true).unwrap_err();
        assert_eq!(err.code, ErrorCode::Key);
        let err = entry(".a", "v".into()).set(&mut m, true).unwrap_err();
        assert_eq!(err.code, ErrorCode::Key);
        // An empty leaf is a plain key.
        entry("a.", "v".into()).set(&mut m, true).unwrap();
        assert_eq!(m, map(vec![("a", map(vec![("", "v".into())]).into())]));
    }

    #[test]
    fn array_appends_in_order() {
        let mut m = Map::new();
        for v in &["v1", "v2"] {
            let mut e = entry("list.key", (*v).into());
            e.is_array = true;
            e.set(&mut m, true).unwrap();
        }
        assert_eq!(
            m,
            map(vec![(
                "list",
                map(vec![("key", vec![Value::from("v1"), "v2".into()].into())]).into()
            )])
        );
    }

    #[test]
    fn last_write_wins_in_place() {
        let mut m = Map::new();
        entry("a", "1".into()).set(&mut m, true).unwrap();
        entry("b", "2".into()).set(&mut m, true).unwrap();
        entry("a", "3".into()).set(&mut m, true).unwrap();
        assert_eq!(m, map(vec![("a", "3".into()), ("b", "2".into())]));
    }

    #[test]
    fn scalar_is_replaced_by_mapping() {
        let mut m = Map::new();
        entry("a", "1".into()).set(&mut m, true).unwrap();
        entry("a.b", "2".into()).set(&mut m, true).unwrap();
        assert_eq!(m, map(vec![("a", map(vec![("b", "2".into())]).into())]));
    }
}
