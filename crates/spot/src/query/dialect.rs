//! SQL flavors supported by the adapter.

use std::fmt;
use std::str::FromStr;

use crate::value::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use crate::{Result, SpotError, Value};

/// SQL flavor used when rendering statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Mysql,
    Sqlite,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Detects the dialect from a connection URL scheme.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        let scheme = dsn.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(SpotError::Configuration(format!(
                "Unsupported connection scheme in '{}'",
                dsn
            ))),
        }
    }

    fn quote_char(&self) -> char {
        match self {
            Dialect::Mysql => '`',
            Dialect::Sqlite => '"',
        }
    }

    /// Quotes a SQL identifier.
    ///
    /// Handles database-qualified names by quoting each part separately.
    pub fn quote_identifier(&self, name: &str) -> String {
        let q = self.quote_char();
        name.split('.')
            .map(|part| format!("{q}{part}{q}"))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Renders a value as an inline SQL literal.
    pub fn escape_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => self.quote_string(s),
            Value::Date(d) => self.quote_string(&d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => self.quote_string(&dt.format(DATETIME_FORMAT).to_string()),
            Value::Time(t) => self.quote_string(&t.format(TIME_FORMAT).to_string()),
            Value::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                format!("X'{}'", hex)
            }
            Value::Json(json) => self.quote_string(&json.to_string()),
            Value::Array(items) => items
                .iter()
                .map(|item| self.escape_literal(item))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn quote_string(&self, s: &str) -> String {
        let mut escaped = s.replace('\'', "''");
        if *self == Dialect::Mysql {
            escaped = escaped.replace('\\', "\\\\");
        }
        format!("'{}'", escaped)
    }

    /// Whether a driver error means the datasource (table) does not exist.
    pub fn is_missing_table_error(&self, code: Option<&str>, message: &str) -> bool {
        match self {
            Dialect::Mysql => code == Some("42S02") || message.contains("doesn't exist"),
            Dialect::Sqlite => message.contains("no such table"),
        }
    }
}

impl FromStr for Dialect {
    type Err = SpotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(SpotError::Configuration(format!("Unknown SQL dialect '{}'", other))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
