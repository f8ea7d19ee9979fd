//! CREATE TABLE and ALTER TABLE generation.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::warn;

use super::diff::{ColumnChange, SchemaDiff};
use super::MigrateOptions;
use crate::descriptor::{FieldSpec, FieldType, KeyGroup};
use crate::query::{validate_identifier, Dialect};
use crate::{Result, SpotError};

/// Key definitions collected from field declarations.
#[derive(Debug, Default)]
struct KeySet {
    primary: Vec<String>,
    /// key name -> columns
    unique: IndexMap<String, Vec<String>>,
    index: IndexMap<String, Vec<String>>,
    fulltext: Vec<String>,
}

impl KeySet {
    fn collect(fields: &IndexMap<String, FieldSpec>) -> Self {
        let mut keys = KeySet::default();
        let mut taken: HashSet<String> = HashSet::new();

        for field in fields.values() {
            if field.primary {
                keys.primary.push(field.name.clone());
            }
            if field.fulltext {
                keys.fulltext.push(field.name.clone());
            }
        }
        add_grouped(&mut keys.unique, &mut taken, fields, |f| &f.unique);
        add_grouped(&mut keys.index, &mut taken, fields, |f| &f.index);
        keys
    }
}

/// Adds keys for one kind. Named groups collapse into one composite key;
/// unnamed keys are named after their field, suffixed on collision.
fn add_grouped<F>(
    target: &mut IndexMap<String, Vec<String>>,
    taken: &mut HashSet<String>,
    fields: &IndexMap<String, FieldSpec>,
    group_of: F,
) where
    F: Fn(&FieldSpec) -> &KeyGroup,
{
    let mut named: IndexMap<String, String> = IndexMap::new();

    for field in fields.values() {
        match group_of(field) {
            KeyGroup::None => {}
            KeyGroup::Own => {
                let name = unique_key_name(&field.name, taken);
                target.insert(name, vec![field.name.clone()]);
            }
            KeyGroup::Named(group) => {
                let key_name = match named.get(group) {
                    Some(existing) => existing.clone(),
                    None => {
                        let name = unique_key_name(group, taken);
                        named.insert(group.clone(), name.clone());
                        name
                    }
                };
                target.entry(key_name).or_default().push(field.name.clone());
            }
        }
    }
}

fn unique_key_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 1;
    while taken.contains(&name) {
        name = format!("{}_{}", base, n);
        n += 1;
    }
    taken.insert(name.clone());
    name
}

fn quote_list(dialect: Dialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Storage engine after accounting for FULLTEXT columns.
fn effective_engine(fields: &IndexMap<String, FieldSpec>, options: &MigrateOptions) -> String {
    if fields.values().any(|f| f.fulltext) {
        "MyISAM".to_string()
    } else {
        options.engine.clone()
    }
}

/// Whether the single serial primary key can be declared inline.
fn inline_serial_key(dialect: Dialect, field: &FieldSpec, keys: &KeySet) -> bool {
    dialect == Dialect::Sqlite
        && field.serial
        && field.primary
        && keys.primary.len() == 1
        && matches!(field.field_type, FieldType::Int | FieldType::Timestamp)
}

/// Renders a column definition.
fn column_sql(dialect: Dialect, field: &FieldSpec, inline_key: bool) -> Result<String> {
    let native = dialect.native_type(field)?;
    let mut sql = format!("{} {}", dialect.quote_identifier(&field.name), native.sql);

    if inline_key {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        return Ok(sql);
    }

    sql.push_str(if field.nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = dialect.default_literal(field)? {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default);
    }
    if field.serial && dialect == Dialect::Mysql {
        sql.push_str(" AUTO_INCREMENT");
    }
    Ok(sql)
}

/// Generates the statements creating `datasource` from its fields.
///
/// MySQL produces a single statement with inline keys. SQLite produces the
/// CREATE TABLE followed by one CREATE INDEX per non-unique index; FULLTEXT
/// keys are skipped there.
pub fn create_table_sql(
    dialect: Dialect,
    datasource: &str,
    fields: &IndexMap<String, FieldSpec>,
    options: &MigrateOptions,
) -> Result<Vec<String>> {
    validate_identifier(datasource)?;
    let keys = KeySet::collect(fields);
    let table = dialect.quote_identifier(datasource);

    let mut lines = Vec::with_capacity(fields.len() + 4);
    let mut inlined = false;
    for field in fields.values() {
        let inline_key = inline_serial_key(dialect, field, &keys);
        inlined |= inline_key;
        lines.push(column_sql(dialect, field, inline_key)?);
    }

    if !keys.primary.is_empty() && !inlined {
        lines.push(format!("PRIMARY KEY ({})", quote_list(dialect, &keys.primary)));
    }

    let mut statements = Vec::new();
    match dialect {
        Dialect::Mysql => {
            for (name, columns) in &keys.unique {
                lines.push(format!(
                    "UNIQUE KEY {} ({})",
                    dialect.quote_identifier(name),
                    quote_list(dialect, columns)
                ));
            }
            for (name, columns) in &keys.index {
                lines.push(format!(
                    "KEY {} ({})",
                    dialect.quote_identifier(name),
                    quote_list(dialect, columns)
                ));
            }
            if !keys.fulltext.is_empty() {
                lines.push(format!("FULLTEXT ({})", quote_list(dialect, &keys.fulltext)));
            }
            statements.push(format!(
                "CREATE TABLE {} (\n{}\n) ENGINE={} DEFAULT CHARSET={} COLLATE={}",
                table,
                lines.join(",\n"),
                effective_engine(fields, options),
                options.charset,
                options.collation
            ));
        }
        Dialect::Sqlite => {
            for (name, columns) in &keys.unique {
                lines.push(format!(
                    "CONSTRAINT {} UNIQUE ({})",
                    dialect.quote_identifier(&format!("{}_{}", datasource, name)),
                    quote_list(dialect, columns)
                ));
            }
            if !keys.fulltext.is_empty() {
                warn!(
                    datasource = datasource,
                    columns = ?keys.fulltext,
                    "FULLTEXT keys are not supported by SQLite, skipping"
                );
            }
            statements.push(format!("CREATE TABLE {} (\n{}\n)", table, lines.join(",\n")));
            for (name, columns) in &keys.index {
                statements.push(format!(
                    "CREATE INDEX {} ON {} ({})",
                    dialect.quote_identifier(&format!("{}_{}", datasource, name)),
                    table,
                    quote_list(dialect, columns)
                ));
            }
        }
    }

    Ok(statements)
}

/// Generates the statements applying `diff` to an existing table.
///
/// # Errors
///
/// SQLite cannot modify columns in place; a diff containing a modification
/// returns `UnsupportedOperation` there.
pub fn alter_table_sql(
    dialect: Dialect,
    datasource: &str,
    diff: &SchemaDiff,
    fields: &IndexMap<String, FieldSpec>,
    options: &MigrateOptions,
) -> Result<Vec<String>> {
    validate_identifier(datasource)?;
    if diff.is_empty() {
        return Ok(Vec::new());
    }
    let table = dialect.quote_identifier(datasource);

    match dialect {
        Dialect::Mysql => {
            let mut parts = Vec::with_capacity(diff.changes.len() + 1);
            for change in &diff.changes {
                let column = column_sql(dialect, change.field(), false)?;
                match change {
                    ColumnChange::Add(_) => parts.push(format!("ADD COLUMN {}", column)),
                    ColumnChange::Modify { .. } => parts.push(format!("MODIFY COLUMN {}", column)),
                }
            }
            parts.push(format!("ENGINE={}", effective_engine(fields, options)));
            Ok(vec![format!("ALTER TABLE {} {}", table, parts.join(", "))])
        }
        Dialect::Sqlite => diff
            .changes
            .iter()
            .map(|change| match change {
                ColumnChange::Add(field) => Ok(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    table,
                    column_sql(dialect, field, false)?
                )),
                ColumnChange::Modify { field, live } => Err(SpotError::UnsupportedOperation(format!(
                    "SQLite cannot modify column '{}' of '{}' ({} -> {})",
                    field.name, datasource, live.column_type, field.field_type
                ))),
            })
            .collect(),
    }
}
