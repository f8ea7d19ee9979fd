//! Field type to native column type mapping.

use crate::descriptor::{FieldSpec, FieldType};
use crate::query::Dialect;
use crate::{Result, SpotError, Value};

/// A rendered native column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeType {
    /// Base type name as reported by introspection (`varchar`, `int`, ...)
    pub name: &'static str,
    /// Full type text used in DDL (`varchar(255)`, `int(10) UNSIGNED`, ...)
    pub sql: String,
    /// Whether the column can carry a DEFAULT clause
    pub accepts_default: bool,
}

impl Dialect {
    /// Maps a field to its native column type.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFieldType` for field types without a mapping.
    pub fn native_type(&self, field: &FieldSpec) -> Result<NativeType> {
        match self {
            Dialect::Mysql => mysql_type(field),
            Dialect::Sqlite => sqlite_type(field),
        }
    }

    /// Text of the DEFAULT value used in DDL and schema comparison.
    pub fn column_default(&self, field: &FieldSpec) -> Result<Option<String>> {
        if field.serial || !self.native_type(field)?.accepts_default {
            return Ok(None);
        }
        Ok(field.default.to_text())
    }

    /// DEFAULT value rendered as a SQL literal.
    pub(crate) fn default_literal(&self, field: &FieldSpec) -> Result<Option<String>> {
        if self.column_default(field)?.is_none() {
            return Ok(None);
        }
        let literal = match &field.default {
            Value::Bool(b) => i64::from(*b).to_string(),
            other => self.escape_literal(other),
        };
        Ok(Some(literal))
    }
}

fn unsupported(field: &FieldSpec) -> SpotError {
    SpotError::UnsupportedFieldType(format!("'{}' (field '{}')", field.field_type, field.name))
}

fn mysql_type(field: &FieldSpec) -> Result<NativeType> {
    let plain = |name: &'static str| NativeType {
        name,
        sql: name.to_string(),
        accepts_default: true,
    };
    let native = match &field.field_type {
        t if t.is_string_like() => NativeType {
            name: "varchar",
            sql: format!("varchar({})", field.length.unwrap_or(255)),
            accepts_default: true,
        },
        FieldType::Text | FieldType::Serialized => NativeType {
            name: "text",
            sql: "text".to_string(),
            accepts_default: false,
        },
        FieldType::Int => {
            let mut sql = match field.length {
                Some(len) => format!("int({})", len),
                None => "int".to_string(),
            };
            if field.unsigned {
                sql.push_str(" UNSIGNED");
            }
            NativeType {
                name: "int",
                sql,
                accepts_default: true,
            }
        }
        FieldType::Bool => NativeType {
            name: "tinyint",
            sql: format!("tinyint({})", field.length.unwrap_or(1)),
            accepts_default: true,
        },
        FieldType::Float => plain("float"),
        FieldType::Double => plain("double"),
        FieldType::Decimal => NativeType {
            name: "decimal",
            sql: format!(
                "decimal({},{})",
                field.length.unwrap_or(10),
                field.precision.unwrap_or(2)
            ),
            accepts_default: true,
        },
        FieldType::Date => plain("date"),
        FieldType::DateTime => plain("datetime"),
        FieldType::Time => plain("time"),
        FieldType::Timestamp => NativeType {
            name: "int",
            sql: format!("int({})", field.length.unwrap_or(11)),
            accepts_default: true,
        },
        _ => return Err(unsupported(field)),
    };
    Ok(native)
}

fn sqlite_type(field: &FieldSpec) -> Result<NativeType> {
    let plain = |name: &'static str, sql: &str| NativeType {
        name,
        sql: sql.to_string(),
        accepts_default: true,
    };
    let native = match &field.field_type {
        t if t.is_string_like() => NativeType {
            name: "varchar",
            sql: format!("VARCHAR({})", field.length.unwrap_or(255)),
            accepts_default: true,
        },
        FieldType::Text | FieldType::Serialized => plain("text", "TEXT"),
        FieldType::Int | FieldType::Timestamp => plain("integer", "INTEGER"),
        FieldType::Bool => plain("boolean", "BOOLEAN"),
        FieldType::Float => plain("float", "FLOAT"),
        FieldType::Double => plain("double", "DOUBLE"),
        FieldType::Decimal => NativeType {
            name: "decimal",
            sql: format!(
                "DECIMAL({},{})",
                field.length.unwrap_or(10),
                field.precision.unwrap_or(2)
            ),
            accepts_default: true,
        },
        FieldType::Date => plain("date", "DATE"),
        FieldType::DateTime => plain("datetime", "DATETIME"),
        FieldType::Time => plain("time", "TIME"),
        _ => return Err(unsupported(field)),
    };
    Ok(native)
}
