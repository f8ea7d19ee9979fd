//! Rendered statements with named placeholders.
//!
//! Every placeholder in [`Statement::sql`] has exactly one entry in
//! [`Statement::binds`] and vice versa. The [`Binder`] guarantees this by
//! handing out unique names while the SQL text is being written.

use std::collections::HashMap;

use super::dialect::Dialect;
use super::helpers::placeholder_base;
use crate::value::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use crate::{Record, Result, SpotError, Value};

/// Allocates unique `:name` placeholders and records their values.
#[derive(Debug, Default)]
pub struct Binder {
    binds: Record,
    counters: HashMap<String, usize>,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under a placeholder derived from `field` and
    /// returns the placeholder text (`:status`, `:status_1`, ...).
    pub fn bind(&mut self, field: &str, value: Value) -> String {
        let base = placeholder_base(field);
        let counter = self.counters.entry(base.clone()).or_insert(0);
        let mut name = if *counter == 0 {
            base.clone()
        } else {
            format!("{}_{}", base, counter)
        };
        while self.binds.contains_key(&name) {
            *counter += 1;
            name = format!("{}_{}", base, counter);
        }
        *counter += 1;
        self.binds.insert(name.clone(), normalize_bind(value));
        format!(":{}", name)
    }

    pub fn len(&self) -> usize {
        self.binds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binds.is_empty()
    }

    pub fn into_binds(self) -> Record {
        self.binds
    }
}

/// Converts a value into its bound form: booleans become 0/1 and temporal
/// values become text in the canonical formats.
pub(crate) fn normalize_bind(value: Value) -> Value {
    match value {
        Value::Bool(b) => Value::Int(i64::from(b)),
        Value::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
        Value::Time(t) => Value::String(t.format(TIME_FORMAT).to_string()),
        Value::Json(json) => Value::String(json.to_string()),
        other => other,
    }
}

/// SQL text plus its named bind values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub binds: Record,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Record::new(),
        }
    }

    pub fn with_binds(sql: impl Into<String>, binds: Record) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }

    /// Placeholder names in the order they appear in the SQL text.
    pub fn placeholders(&self, dialect: Dialect) -> Vec<String> {
        scan_placeholders(&self.sql, dialect)
            .into_iter()
            .map(|(_, _, name)| name)
            .collect()
    }

    /// Rewrites named placeholders to positional `?` markers and returns
    /// the values in placeholder order.
    ///
    /// A placeholder without a bind value is an error.
    pub fn to_positional(&self, dialect: Dialect) -> Result<(String, Vec<Value>)> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut values = Vec::new();
        let mut cursor = 0;
        for (start, end, name) in scan_placeholders(&self.sql, dialect) {
            let value = self.binds.get(&name).ok_or_else(|| {
                SpotError::Query(format!("Missing bind value for placeholder ':{}'", name))
            })?;
            sql.push_str(&self.sql[cursor..start]);
            sql.push('?');
            values.push(normalize_bind(value.clone()));
            cursor = end;
        }
        sql.push_str(&self.sql[cursor..]);
        Ok((sql, values))
    }
}

/// Finds `:name` placeholders outside quoted text.
///
/// Returns `(start, end, name)` byte ranges. A `::` sequence is not a
/// placeholder. Backslash escapes inside quotes exist only in MySQL.
fn scan_placeholders(sql: &str, dialect: Dialect) -> Vec<(usize, usize, String)> {
    let backslash_escapes = dialect == Dialect::Mysql;
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if backslash_escapes && b == b'\\' && q != b'`' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => {
                quote = Some(b);
                i += 1;
            }
            b':' => {
                let prev_colon = i > 0 && bytes[i - 1] == b':';
                let next = bytes.get(i + 1).copied();
                let starts_name = matches!(next, Some(c) if c.is_ascii_alphabetic() || c == b'_');
                if prev_colon || !starts_name {
                    i += 1;
                    continue;
                }
                let start = i;
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                found.push((start, i, sql[start + 1..i].to_string()));
            }
            _ => i += 1,
        }
    }
    found
}
