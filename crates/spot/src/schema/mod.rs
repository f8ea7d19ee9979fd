//! Schema synchronization.
//!
//! Migration is additive: a missing table is created with all declared
//! columns and keys; an existing table gets missing columns added and
//! columns whose base type or default changed modified. Columns present in
//! the table but not declared are never dropped.

mod ddl;
mod diff;
mod types;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, instrument};

pub use ddl::{alter_table_sql, create_table_sql};
pub use diff::{ColumnChange, SchemaDiff};
pub use types::NativeType;

use crate::adapter::Adapter;
use crate::descriptor::FieldSpec;
use crate::{Record, Result, Value};

/// A column as reported by the database.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveColumn {
    pub name: String,
    /// Full native type text, e.g. `int(10) unsigned` or `VARCHAR(255)`
    pub column_type: String,
    /// Default as reported, possibly quoted
    pub default: Option<String>,
    pub nullable: bool,
}

impl LiveColumn {
    /// Base type name in lower case (`varchar(255)` -> `varchar`).
    pub fn base_type(&self) -> String {
        self.column_type
            .trim()
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Default with surrounding quotes removed; `NULL` counts as absent.
    pub fn normalized_default(&self) -> Option<String> {
        let raw = self.default.as_deref()?.trim();
        if raw.eq_ignore_ascii_case("null") {
            return None;
        }
        let unquoted = raw
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(|s| s.replace("''", "'"))
            .unwrap_or_else(|| raw.to_string());
        Some(unquoted)
    }

    /// Builds a column from an introspection row with `name`,
    /// `column_type`, `column_default` and `is_nullable` entries.
    pub(crate) fn from_record(record: &Record) -> Option<Self> {
        let text = |key: &str| match record.get(key) {
            Some(Value::Null) | None => None,
            Some(Value::Bytes(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Some(other) => other.to_text(),
        };
        let nullable = match record.get("is_nullable") {
            Some(Value::String(s)) => s.eq_ignore_ascii_case("yes"),
            Some(Value::Bytes(b)) => b.eq_ignore_ascii_case(b"yes"),
            Some(other) => other.as_bool().unwrap_or(true),
            None => true,
        };
        Some(Self {
            name: text("name")?,
            column_type: text("column_type").unwrap_or_default(),
            default: text("column_default"),
            nullable,
        })
    }
}

/// Table options for created and altered tables (MySQL).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MigrateOptions {
    pub engine: String,
    pub charset: String,
    pub collation: String,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            engine: "InnoDB".to_string(),
            charset: "utf8mb4".to_string(),
            collation: "utf8mb4_unicode_ci".to_string(),
        }
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MigrationReport {
    pub datasource: String,
    /// Whether the table was created
    pub created: bool,
    /// Statements executed, in order
    pub statements: Vec<String>,
    /// Human readable description of column changes
    pub changes: Vec<String>,
}

impl MigrationReport {
    /// True when the table already matched its fields.
    pub fn is_noop(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Creates or updates `datasource` so it holds every declared field.
///
/// Running it again against an up-to-date table executes nothing.
#[instrument(skip(adapter, fields, options), fields(adapter = adapter.name(), datasource = %datasource))]
pub async fn migrate<A: Adapter + ?Sized>(
    adapter: &A,
    datasource: &str,
    fields: &IndexMap<String, FieldSpec>,
    options: &MigrateOptions,
) -> Result<MigrationReport> {
    let dialect = adapter.dialect();
    let mut report = MigrationReport {
        datasource: datasource.to_string(),
        ..MigrationReport::default()
    };

    match adapter.describe_datasource(datasource).await? {
        None => {
            report.created = true;
            report.statements = create_table_sql(dialect, datasource, fields, options)?;
        }
        Some(columns) => {
            let diff = SchemaDiff::compare(dialect, fields, &columns)?;
            report.changes = diff.summary();
            report.statements = alter_table_sql(dialect, datasource, &diff, fields, options)?;
        }
    }

    for statement in &report.statements {
        adapter.execute_ddl(statement).await?;
    }

    if report.is_noop() {
        info!("Datasource is up to date");
    } else {
        info!(
            created = report.created,
            statements = report.statements.len(),
            "Datasource migrated"
        );
    }
    Ok(report)
}
