//! Field declarations and their normalized form.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::value::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use crate::Value;

/// Declared field type.
///
/// Several names are aliases of the same storage (`email`, `url`, `tel` and
/// `password` are all strings). Unknown names are kept as [`FieldType::Other`]
/// and only rejected when DDL is generated for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Email,
    Url,
    Tel,
    Password,
    Text,
    Int,
    Bool,
    Float,
    Double,
    Decimal,
    Date,
    DateTime,
    Time,
    /// Unix timestamp stored as an integer
    Timestamp,
    /// Structured value stored as JSON text
    Serialized,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Tel => "tel",
            FieldType::Password => "password",
            FieldType::Text => "text",
            FieldType::Int => "int",
            FieldType::Bool => "bool",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::Timestamp => "timestamp",
            FieldType::Serialized => "serialized",
            FieldType::Other(name) => name.as_str(),
        }
    }

    /// Whether the field is stored as a length-limited string.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Email | FieldType::Url | FieldType::Tel | FieldType::Password
        )
    }

    /// Type-level defaults, applied between global defaults and the declaration.
    fn type_defaults(&self) -> Field {
        let field = Field::new(self.clone());
        match self {
            t if t.is_string_like() => field.length(255),
            FieldType::Int => field.length(10).unsigned(true),
            FieldType::Bool => field.length(1).default(false),
            FieldType::Decimal => field.length(10).precision(2),
            FieldType::Timestamp => field.length(11),
            _ => field,
        }
    }

    /// Coerces a value into this field's in-memory representation.
    ///
    /// Values that cannot be coerced are kept as given.
    pub fn cast(&self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        match self {
            t if t.is_string_like() || *t == FieldType::Text => match value {
                Value::Int(_) | Value::Float(_) | Value::Date(_) | Value::DateTime(_) | Value::Time(_) => {
                    value.to_text().map(Value::String).unwrap_or(Value::Null)
                }
                Value::Bytes(bytes) => match String::from_utf8(bytes) {
                    Ok(s) => Value::String(s),
                    Err(e) => Value::Bytes(e.into_bytes()),
                },
                other => other,
            },
            FieldType::Int | FieldType::Timestamp => match value {
                Value::Bool(b) => Value::Int(i64::from(b)),
                Value::Float(f) => Value::Int(f.trunc() as i64),
                Value::String(ref s) => s.trim().parse().map(Value::Int).unwrap_or(value),
                other => other,
            },
            FieldType::Bool => match value.as_bool() {
                Some(b) => Value::Bool(b),
                None => value,
            },
            FieldType::Float | FieldType::Double | FieldType::Decimal => match value {
                Value::Int(i) => Value::Float(i as f64),
                Value::String(ref s) => s.trim().parse().map(Value::Float).unwrap_or(value),
                other => other,
            },
            FieldType::Date => match value {
                Value::DateTime(dt) => Value::Date(dt.date()),
                Value::String(ref s) => parse_date(s).map(Value::Date).unwrap_or(value),
                other => other,
            },
            FieldType::DateTime => match value {
                Value::Date(d) => Value::DateTime(d.and_time(NaiveTime::MIN)),
                Value::String(ref s) => parse_datetime(s).map(Value::DateTime).unwrap_or(value),
                other => other,
            },
            FieldType::Time => match value {
                Value::DateTime(dt) => Value::Time(dt.time()),
                Value::String(ref s) => NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
                    .map(Value::Time)
                    .unwrap_or(value),
                other => other,
            },
            FieldType::Serialized => match value {
                Value::String(ref s) => serde_json::from_str::<serde_json::Value>(s)
                    .map(Value::from_json)
                    .unwrap_or(value),
                other => other,
            },
            _ => value,
        }
    }

    /// Converts a value into the form written to storage.
    pub fn dump(&self, value: Value) -> Value {
        match (self, value) {
            (FieldType::Serialized, Value::Null) => Value::Null,
            (FieldType::Serialized, value) => Value::String(value.to_json().to_string()),
            (_, value) => value,
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

impl FromStr for FieldType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "string" | "varchar" => FieldType::String,
            "email" => FieldType::Email,
            "url" => FieldType::Url,
            "tel" => FieldType::Tel,
            "password" => FieldType::Password,
            "text" => FieldType::Text,
            "int" | "integer" => FieldType::Int,
            "bool" | "boolean" => FieldType::Bool,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "decimal" => FieldType::Decimal,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            "time" => FieldType::Time,
            "timestamp" => FieldType::Timestamp,
            "serialized" => FieldType::Serialized,
            other => FieldType::Other(other.to_string()),
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index or unique-key membership of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum KeyGroup {
    /// Not part of a key
    #[default]
    None,
    /// Key of its own
    Own,
    /// Member of a composite key with the given name
    Named(String),
}

impl KeyGroup {
    pub fn is_none(&self) -> bool {
        matches!(self, KeyGroup::None)
    }
}

/// A field as declared by an entity type.
///
/// Unset options fall back to the type defaults, then to the global
/// defaults, when the descriptor is built.
///
/// ```
/// use spot::Field;
///
/// let title = Field::string().required().length(120);
/// let id = Field::int().primary().serial();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    field_type: FieldType,
    default: Option<Value>,
    length: Option<u32>,
    precision: Option<u32>,
    required: Option<bool>,
    nullable: Option<bool>,
    unsigned: Option<bool>,
    fulltext: Option<bool>,
    primary: Option<bool>,
    serial: Option<bool>,
    index: Option<KeyGroup>,
    unique: Option<KeyGroup>,
}

impl Field {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            default: None,
            length: None,
            precision: None,
            required: None,
            nullable: None,
            unsigned: None,
            fulltext: None,
            primary: None,
            serial: None,
            index: None,
            unique: None,
        }
    }

    /// Declares a field by type name (`"string"`, `"int"`, `"email"`, ...).
    pub fn of(type_name: &str) -> Self {
        let field_type = match type_name.parse::<FieldType>() {
            Ok(t) => t,
            Err(never) => match never {},
        };
        Self::new(field_type)
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    pub fn int() -> Self {
        Self::new(FieldType::Int)
    }

    pub fn bool() -> Self {
        Self::new(FieldType::Bool)
    }

    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    pub fn double() -> Self {
        Self::new(FieldType::Double)
    }

    pub fn decimal() -> Self {
        Self::new(FieldType::Decimal)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn datetime() -> Self {
        Self::new(FieldType::DateTime)
    }

    pub fn time() -> Self {
        Self::new(FieldType::Time)
    }

    pub fn timestamp() -> Self {
        Self::new(FieldType::Timestamp)
    }

    pub fn serialized() -> Self {
        Self::new(FieldType::Serialized)
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = Some(unsigned);
        self
    }

    pub fn fulltext(mut self) -> Self {
        self.fulltext = Some(true);
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = Some(true);
        self
    }

    /// Auto-incrementing value assigned by the database.
    pub fn serial(mut self) -> Self {
        self.serial = Some(true);
        self
    }

    /// Index on this field alone.
    pub fn index(mut self) -> Self {
        self.index = Some(KeyGroup::Own);
        self
    }

    /// Membership in a composite index named `name`.
    pub fn index_named(mut self, name: &str) -> Self {
        self.index = Some(KeyGroup::Named(name.to_string()));
        self
    }

    /// Unique key on this field alone.
    pub fn unique(mut self) -> Self {
        self.unique = Some(KeyGroup::Own);
        self
    }

    /// Membership in a composite unique key named `name`.
    pub fn unique_named(mut self, name: &str) -> Self {
        self.unique = Some(KeyGroup::Named(name.to_string()));
        self
    }

    /// Fills options unset on `self` from `base`.
    fn or(self, base: Field) -> Field {
        Field {
            field_type: self.field_type,
            default: self.default.or(base.default),
            length: self.length.or(base.length),
            precision: self.precision.or(base.precision),
            required: self.required.or(base.required),
            nullable: self.nullable.or(base.nullable),
            unsigned: self.unsigned.or(base.unsigned),
            fulltext: self.fulltext.or(base.fulltext),
            primary: self.primary.or(base.primary),
            serial: self.serial.or(base.serial),
            index: self.index.or(base.index),
            unique: self.unique.or(base.unique),
        }
    }
}

/// A field after defaults have been merged. Every option is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub default: Value,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub required: bool,
    pub nullable: bool,
    pub unsigned: bool,
    pub fulltext: bool,
    pub primary: bool,
    pub serial: bool,
    pub index: KeyGroup,
    pub unique: KeyGroup,
}

impl FieldSpec {
    /// Merges global defaults, type defaults and the declaration, in
    /// increasing precedence.
    pub(crate) fn normalize(name: &str, declared: Field) -> Self {
        let type_defaults = declared.field_type.type_defaults();
        let merged = declared.or(type_defaults);
        let primary = merged.primary.unwrap_or(false);
        let default = merged
            .default
            .map(|v| merged.field_type.cast(v))
            .unwrap_or(Value::Null);

        Self {
            name: name.to_string(),
            default,
            length: merged.length,
            precision: merged.precision,
            required: merged.required.unwrap_or(false),
            nullable: !primary && merged.nullable.unwrap_or(true),
            unsigned: merged.unsigned.unwrap_or(false),
            fulltext: merged.fulltext.unwrap_or(false),
            primary,
            serial: merged.serial.unwrap_or(false),
            index: merged.index.unwrap_or_default(),
            unique: merged.unique.unwrap_or_default(),
            field_type: merged.field_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_aliases() {
        assert_eq!("email".parse::<FieldType>().unwrap(), FieldType::Email);
        assert_eq!("integer".parse::<FieldType>().unwrap(), FieldType::Int);
        assert_eq!("boolean".parse::<FieldType>().unwrap(), FieldType::Bool);
        assert_eq!(
            "geometry".parse::<FieldType>().unwrap(),
            FieldType::Other("geometry".to_string())
        );
    }

    #[test]
    fn test_normalize_applies_type_defaults() {
        let spec = FieldSpec::normalize("title", Field::string());
        assert_eq!(spec.length, Some(255));
        assert!(spec.nullable);
        assert!(!spec.required);
        assert_eq!(spec.default, Value::Null);

        let spec = FieldSpec::normalize("count", Field::int());
        assert_eq!(spec.length, Some(10));
        assert!(spec.unsigned);

        let spec = FieldSpec::normalize("flag", Field::bool());
        assert_eq!(spec.default, Value::Bool(false));

        let spec = FieldSpec::normalize("price", Field::decimal());
        assert_eq!((spec.length, spec.precision), (Some(10), Some(2)));
    }

    #[test]
    fn test_declaration_wins_over_type_defaults() {
        let spec = FieldSpec::normalize("title", Field::string().length(40).required());
        assert_eq!(spec.length, Some(40));
        assert!(spec.required);

        let spec = FieldSpec::normalize("delta", Field::int().unsigned(false));
        assert!(!spec.unsigned);
    }

    #[test]
    fn test_primary_is_not_nullable() {
        let spec = FieldSpec::normalize("id", Field::int().primary().serial().nullable(true));
        assert!(spec.primary);
        assert!(spec.serial);
        assert!(!spec.nullable);
    }

    #[test]
    fn test_cast_int_and_bool() {
        assert_eq!(FieldType::Int.cast(Value::from("42")), Value::Int(42));
        assert_eq!(FieldType::Int.cast(Value::from("x")), Value::from("x"));
        assert_eq!(FieldType::Bool.cast(Value::Int(1)), Value::Bool(true));
        assert_eq!(FieldType::Bool.cast(Value::from("0")), Value::Bool(false));
        assert_eq!(FieldType::String.cast(Value::Int(7)), Value::from("7"));
    }

    #[test]
    fn test_cast_datetime_from_text() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            FieldType::DateTime.cast(Value::from("2024-01-02 03:04:05")),
            Value::DateTime(expected)
        );
        assert_eq!(
            FieldType::Date.cast(Value::from("2024-01-02 03:04:05")),
            Value::Date(expected.date())
        );
    }

    #[test]
    fn test_serialized_round_trip() {
        let stored = FieldType::Serialized.dump(Value::Array(vec![Value::Int(1), Value::from("a")]));
        assert_eq!(stored, Value::from("[1,\"a\"]"));
        assert_eq!(
            FieldType::Serialized.cast(stored),
            Value::Array(vec![Value::Int(1), Value::from("a")])
        );
    }
}
