//! Row decoding and parameter binding for the SQLx backends.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

use crate::{Record, Result, SpotError, Value};

/// Extracts column `idx` as `T`, mapping NULL to [`Value::Null`].
fn extract<'r, R, T>(row: &'r R, idx: usize, column: &str, label: &str, wrap: fn(T) -> Value) -> Result<Value>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(v)) => Ok(wrap(v)),
        Ok(None) => Ok(Value::Null),
        Err(e) => Err(SpotError::Serialization(format!(
            "Failed to extract {} from column '{}': {}",
            label, column, e
        ))),
    }
}

fn text_or_bytes(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(s) => Value::String(s),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}

/// Converts a MySQL row into a [`Record`], keyed by column name.
pub(crate) fn mysql_row_to_record(row: &MySqlRow) -> Result<Record> {
    let mut record = Record::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let type_name = column.type_info().name().to_ascii_uppercase();

        let value = match type_name.as_str() {
            "NULL" => Value::Null,
            "BOOLEAN" => extract::<_, bool>(row, idx, name, "BOOLEAN", Value::Bool)?,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                extract::<_, i64>(row, idx, name, "INTEGER", Value::Int)?
            }
            t if t.ends_with("UNSIGNED") => extract::<_, u64>(row, idx, name, "UNSIGNED", Value::from)?,
            "YEAR" => extract::<_, u16>(row, idx, name, "YEAR", |v| Value::Int(i64::from(v)))?,
            "FLOAT" => extract::<_, f32>(row, idx, name, "FLOAT", |v| Value::Float(f64::from(v)))?,
            "DOUBLE" => extract::<_, f64>(row, idx, name, "DOUBLE", Value::Float)?,
            "DECIMAL" => extract::<_, Decimal>(row, idx, name, "DECIMAL", |d| {
                d.to_f64().map(Value::Float).unwrap_or_else(|| Value::String(d.to_string()))
            })?,
            "DATE" => extract::<_, NaiveDate>(row, idx, name, "DATE", Value::Date)?,
            "TIME" => extract::<_, NaiveTime>(row, idx, name, "TIME", Value::Time)?,
            "DATETIME" | "TIMESTAMP" => extract::<_, NaiveDateTime>(row, idx, name, "DATETIME", Value::DateTime)?,
            "VARCHAR" | "CHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" | "JSON" => {
                extract::<_, String>(row, idx, name, "STRING", Value::String)?
            }
            // binary collations and information_schema columns
            _ => extract::<_, Vec<u8>>(row, idx, name, "BYTES", text_or_bytes)?,
        };

        record.insert(name.to_string(), value);
    }

    Ok(record)
}

/// Converts a SQLite row into a [`Record`].
///
/// SQLite values carry their own storage class, which decides the decoding.
pub(crate) fn sqlite_row_to_record(row: &SqliteRow) -> Result<Record> {
    let mut record = Record::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            record.insert(name.to_string(), Value::Null);
            continue;
        }
        let storage = raw.type_info().name().to_ascii_uppercase();

        let value = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => extract::<_, i64>(row, idx, name, "INTEGER", Value::Int)?,
            "REAL" => extract::<_, f64>(row, idx, name, "REAL", Value::Float)?,
            "BLOB" => extract::<_, Vec<u8>>(row, idx, name, "BLOB", Value::Bytes)?,
            _ => extract::<_, String>(row, idx, name, "TEXT", Value::String)?,
        };

        record.insert(name.to_string(), value);
    }

    Ok(record)
}

/// Binds positional values to a MySQL query.
pub(crate) fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: Vec<Value>,
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(i64::from(b)),
            Value::Int(i) => query.bind(i),
            Value::Float(f) => query.bind(f),
            Value::Bytes(bytes) => query.bind(bytes),
            Value::Date(d) => query.bind(d),
            Value::DateTime(dt) => query.bind(dt),
            Value::Time(t) => query.bind(t),
            other => query.bind(other.to_text().unwrap_or_default()),
        };
    }
    query
}

/// Binds positional values to a SQLite query.
pub(crate) fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<Value>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(i64::from(b)),
            Value::Int(i) => query.bind(i),
            Value::Float(f) => query.bind(f),
            Value::Bytes(bytes) => query.bind(bytes),
            other => query.bind(other.to_text().unwrap_or_default()),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_or_bytes() {
        assert_eq!(text_or_bytes(b"int(10)".to_vec()), Value::from("int(10)"));
        assert_eq!(text_or_bytes(vec![0xff, 0xfe]), Value::Bytes(vec![0xff, 0xfe]));
    }

    #[tokio::test]
    async fn test_sqlite_row_decoding() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        let row = sqlx::query("SELECT 1 AS a, 2.5 AS b, 'x' AS c, NULL AS d, X'00FF' AS e")
            .fetch_one(&pool)
            .await
            .unwrap();
        let record = sqlite_row_to_record(&row).unwrap();
        assert_eq!(record.get("a"), Some(&Value::Int(1)));
        assert_eq!(record.get("b"), Some(&Value::Float(2.5)));
        assert_eq!(record.get("c"), Some(&Value::from("x")));
        assert_eq!(record.get("d"), Some(&Value::Null));
        assert_eq!(record.get("e"), Some(&Value::Bytes(vec![0x00, 0xff])));
    }

    #[tokio::test]
    async fn test_sqlite_binding() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        let query = bind_sqlite(
            sqlx::query("SELECT ? AS a, ? AS b, ? AS c"),
            vec![Value::Int(7), Value::Bool(true), Value::Null],
        );
        let row = query.fetch_one(&pool).await.unwrap();
        let record = sqlite_row_to_record(&row).unwrap();
        assert_eq!(record.get("a"), Some(&Value::Int(7)));
        assert_eq!(record.get("b"), Some(&Value::Int(1)));
        assert_eq!(record.get("c"), Some(&Value::Null));
    }
}
