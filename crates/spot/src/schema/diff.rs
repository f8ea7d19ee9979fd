//! Comparison of declared fields against live columns.

use indexmap::IndexMap;

use super::LiveColumn;
use crate::descriptor::{FieldSpec, FieldType};
use crate::query::Dialect;
use crate::Result;

/// A single column change.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    /// Declared field without a live column
    Add(FieldSpec),
    /// Declared field whose live column differs in base type or default
    Modify { field: FieldSpec, live: LiveColumn },
}

impl ColumnChange {
    pub fn field(&self) -> &FieldSpec {
        match self {
            ColumnChange::Add(field) => field,
            ColumnChange::Modify { field, .. } => field,
        }
    }
}

/// Changes needed to bring an existing table in line with its fields.
///
/// Only base type and default are compared. Live columns without a
/// declared field are left alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaDiff {
    pub changes: Vec<ColumnChange>,
}

impl SchemaDiff {
    /// Compares declared `fields` with the `live` columns of a table.
    pub fn compare(dialect: Dialect, fields: &IndexMap<String, FieldSpec>, live: &[LiveColumn]) -> Result<Self> {
        let mut changes = Vec::new();

        for field in fields.values() {
            let existing = live
                .iter()
                .find(|col| col.name.eq_ignore_ascii_case(&field.name));

            match existing {
                None => changes.push(ColumnChange::Add(field.clone())),
                Some(col) => {
                    let native = dialect.native_type(field)?;
                    let desired_default = dialect.column_default(field)?;
                    let type_differs = col.base_type() != native.name;
                    let default_differs =
                        !defaults_match(field, col.normalized_default(), desired_default);
                    if type_differs || default_differs {
                        changes.push(ColumnChange::Modify {
                            field: field.clone(),
                            live: col.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self { changes })
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Human readable one-liners, in change order.
    pub fn summary(&self) -> Vec<String> {
        self.changes
            .iter()
            .map(|change| match change {
                ColumnChange::Add(field) => format!("add column {} ({})", field.name, field.field_type),
                ColumnChange::Modify { field, live } => format!(
                    "modify column {} ({} -> {})",
                    field.name, live.column_type, field.field_type
                ),
            })
            .collect()
    }
}

/// Numeric defaults compare by value, so a live `0.00` matches a declared `0`.
fn defaults_match(field: &FieldSpec, live: Option<String>, desired: Option<String>) -> bool {
    let numeric = matches!(
        field.field_type,
        FieldType::Int | FieldType::Float | FieldType::Double | FieldType::Decimal
    );
    match (live, desired) {
        (Some(live), Some(desired)) if numeric => {
            match (live.trim().parse::<f64>(), desired.trim().parse::<f64>()) {
                (Ok(a), Ok(b)) => a == b,
                _ => live == desired,
            }
        }
        (live, desired) => live == desired,
    }
}
