use std::str::FromStr;

use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{
    self, DeserializeSeed, Deserializer, EnumAccess, IntoDeserializer, Unexpected, VariantAccess,
    Visitor,
};

use crate::error::{Error, Result};
use crate::value::{integral, Value};

impl Value {
    fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Value::Null => Unexpected::Unit,
            Value::Bool(b) => Unexpected::Bool(*b),
            Value::Number(n) => Unexpected::Float(*n),
            Value::String(s) => Unexpected::Str(s),
            Value::Array(_) => Unexpected::Seq,
            Value::Map(_) => Unexpected::Map,
        }
    }

    fn invalid_type(&self, exp: &dyn de::Expected) -> Error {
        de::Error::invalid_type(self.unexpected(), exp)
    }

    // Numbers in an INI file are often still strings (quoted, or
    // with `native_type` off), so accept both.
    fn parse_expr<T>(self, name: &str) -> Result<T>
    where
        T: FromStr + NumCast,
    {
        let value = match self {
            Value::Number(n) => T::from_f64(n),
            Value::String(ref s) => FromStr::from_str(s.trim()).ok(),
            _ => None,
        };
        value.ok_or_else(|| de::Error::custom(format!("expected {} value, found {}", name, self)))
    }
}

// Exact conversion from the f64 a number is stored as.
trait NumCast: Sized {
    fn from_f64(n: f64) -> Option<Self>;
}

macro_rules! num_cast {
    (int: $($t:ty),*) => {$(
        impl NumCast for $t {
            fn from_f64(n: f64) -> Option<$t> {
                if n.fract() != 0.0 || n < <$t>::MIN as f64 || n > <$t>::MAX as f64 {
                    return None;
                }
                Some(n as $t)
            }
        }
    )*};
    (float: $($t:ty),*) => {$(
        impl NumCast for $t {
            fn from_f64(n: f64) -> Option<$t> {
                Some(n as $t)
            }
        }
    )*};
}
num_cast!(int: i8, i16, i32, i64, u8, u16, u32, u64);
num_cast!(float: f32, f64);

// `parse_expr` is generic over the number type; the next methods only
// differ in the type and the visitor call.
macro_rules! deserialize_number {
    ($($method:ident => $visit:ident, $t:ty, $name:expr;)*) => {$(
        fn $method<V>(self, visitor: V) -> Result<V::Value>
        where
            V: Visitor<'de>,
        {
            visitor.$visit(self.parse_expr::<$t>($name)?)
        }
    )*};
}

impl<'de> Deserializer<'de> for Value {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Number(n) => match integral(n) {
                Some(i) => visitor.visit_i64(i),
                None => visitor.visit_f64(n),
            },
            Value::String(s) => visitor.visit_string(s),
            Value::Array(a) => {
                let mut seq = SeqDeserializer::<_, Error>::new(a.into_iter());
                let v = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(v)
            }
            Value::Map(m) => {
                let mut map = MapDeserializer::<_, Error>::new(m.into_iter());
                let v = visitor.visit_map(&mut map)?;
                map.end()?;
                Ok(v)
            }
        }
    }

    // "true" and "false" are bools already when `native_type` is on.
    // Quoted, and with the usual config file spellings, they are strings.
    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let v = match self {
            Value::Bool(b) => b,
            Value::Number(n) if n == 1.0 => true,
            Value::Number(n) if n == 0.0 => false,
            Value::String(ref s) => match s.trim().to_lowercase().as_str() {
                "y" | "yes" | "t" | "true" | "on" | "1" => true,
                "n" | "no" | "f" | "false" | "off" | "0" => false,
                _ => return Err(self.invalid_type(&visitor)),
            },
            _ => return Err(self.invalid_type(&visitor)),
        };
        visitor.visit_bool(v)
    }

    deserialize_number! {
        deserialize_i8 => visit_i8, i8, "i8 integer";
        deserialize_i16 => visit_i16, i16, "i16 integer";
        deserialize_i32 => visit_i32, i32, "i32 integer";
        deserialize_i64 => visit_i64, i64, "i64 integer";
        deserialize_u8 => visit_u8, u8, "u8 integer";
        deserialize_u16 => visit_u16, u16, "u16 integer";
        deserialize_u32 => visit_u32, u32, "u32 integer";
        deserialize_u64 => visit_u64, u64, "u64 integer";
        deserialize_f32 => visit_f32, f32, "f32 float";
        deserialize_f64 => visit_f64, f64, "f64 float";
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    // Any scalar can be read as a string.
    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::String(s) => visitor.visit_string(s),
            Value::Bool(_) | Value::Number(_) => visitor.visit_string(self.to_string()),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::String(s) => visitor.visit_byte_buf(s.into_bytes()),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    // A key without a value can be configured to produce null.
    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::Null => visitor.visit_unit(),
            Value::String(ref s) if s.is_empty() => visitor.visit_unit(),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    // A single value where a list is expected is a list of one.
    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::Array(_) => self.deserialize_any(visitor),
            Value::Map(_) | Value::Null => Err(self.invalid_type(&visitor)),
            scalar => Value::Array(vec![scalar]).deserialize_any(visitor),
        }
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::Map(_) => self.deserialize_any(visitor),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    // `mode = fast` is a unit variant, `[mode.fast]` with keys below it
    // is a newtype or struct variant.
    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::String(s) => visitor.visit_enum(s.into_deserializer()),
            Value::Map(m) if m.len() == 1 => {
                let (variant, value) = m.into_iter().next().ok_or_else(|| {
                    <Error as de::Error>::custom("expected enum variant")
                })?;
                visitor.visit_enum(Enum { variant, value })
            }
            other => Err(<Error as de::Error>::invalid_type(
                other.unexpected(),
                &"string or map with a single key",
            )),
        }
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}

impl<'de> IntoDeserializer<'de, Error> for Value {
    type Deserializer = Value;

    fn into_deserializer(self) -> Value {
        self
    }
}

struct Enum {
    variant: String,
    value: Value,
}

// `EnumAccess` is provided to the `Visitor` to give it the ability to determine
// which variant of the enum is supposed to be deserialized.
impl<'de> EnumAccess<'de> for Enum {
    type Error = Error;
    type Variant = Value;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Value)>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(Value::String(self.variant))?;
        Ok((variant, self.value))
    }
}

// `VariantAccess` is provided to the `Visitor` to give it the ability to see
// the content of the single variant that it decided to deserialize.
impl<'de> VariantAccess<'de> for Value {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self {
            Value::Null => Ok(()),
            Value::Map(ref m) if m.is_empty() => Ok(()),
            Value::String(ref s) if s.is_empty() => Ok(()),
            other => Err(<Error as de::Error>::invalid_type(other.unexpected(), &"unit variant")),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::map;
    use crate::ErrorCode;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Deserialize, Debug, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Fast,
        Slow { factor: u32 },
        Named(String),
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Settings {
        port: u16,
        ratio: f64,
        verbose: bool,
        quiet: bool,
        #[serde(default)]
        missing: Option<String>,
        nothing: Option<String>,
        tags: Vec<String>,
        single: Vec<u32>,
        modes: Vec<Mode>,
        extra: HashMap<String, String>,
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn struct_from_value() {
        let v: Value = map(vec![
            ("port", s("8080")),
            ("ratio", 0.5.into()),
            ("verbose", s("yes")),
            ("quiet", false.into()),
            ("nothing", Value::Null),
            ("tags", vec![s("a"), s("b")].into()),
            ("single", 7.0.into()),
            (
                "modes",
                vec![
                    s("fast"),
                    map(vec![("slow", map(vec![("factor", s("3"))]).into())]).into(),
                    map(vec![("named", s("x"))]).into(),
                ]
                .into(),
            ),
            ("extra", map(vec![("k", s("v")), ("n", 1.0.into())]).into()),
        ])
        .into();

        let settings = Settings::deserialize(v).unwrap();
        let mut extra = HashMap::new();
        extra.insert("k".to_string(), "v".to_string());
        extra.insert("n".to_string(), "1".to_string());
        assert_eq!(
            settings,
            Settings {
                port: 8080,
                ratio: 0.5,
                verbose: true,
                quiet: false,
                missing: None,
                nothing: None,
                tags: vec!["a".to_string(), "b".to_string()],
                single: vec![7],
                modes: vec![
                    Mode::Fast,
                    Mode::Slow { factor: 3 },
                    Mode::Named("x".to_string())
                ],
                extra,
            }
        );
    }

    #[test]
    fn numbers_are_checked() {
        assert_eq!(u8::deserialize(Value::Number(255.0)).unwrap(), 255);
        assert!(u8::deserialize(Value::Number(256.0)).is_err());
        assert!(u32::deserialize(Value::Number(-1.0)).is_err());
        assert!(i32::deserialize(Value::Number(1.5)).is_err());
        assert_eq!(i64::deserialize(s(" -12 ")).unwrap(), -12);
        let err = u16::deserialize(s("lots")).unwrap_err();
        assert_eq!(err.code, ErrorCode::Custom);
        assert_eq!(f32::deserialize(Value::Number(1.5)).unwrap(), 1.5);
    }

    #[test]
    fn bools_and_strings() {
        assert!(bool::deserialize(s("On")).unwrap());
        assert!(!bool::deserialize(s("0")).unwrap());
        assert!(bool::deserialize(s("maybe")).is_err());
        assert_eq!(String::deserialize(Value::Number(3.0)).unwrap(), "3");
        assert_eq!(String::deserialize(Value::Bool(true)).unwrap(), "true");
        assert!(String::deserialize(Value::Array(vec![])).is_err());
    }

    #[test]
    fn self_describing_targets() {
        let v: Value = map(vec![("a", 1.0.into()), ("b", vec![s("x")].into())]).into();
        let m: HashMap<String, untyped::Any> = HashMap::deserialize(v).unwrap();
        assert_eq!(m["a"], untyped::Any::Int(1));
        assert_eq!(m["b"], untyped::Any::List(vec![untyped::Any::Str("x".into())]));
    }

    mod untyped {
        use serde::Deserialize;

        #[derive(Deserialize, Debug, PartialEq)]
        #[serde(untagged)]
        pub enum Any {
            Int(i64),
            Float(f64),
            Str(String),
            List(Vec<Any>),
        }
    }
}
