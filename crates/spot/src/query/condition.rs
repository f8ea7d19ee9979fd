//! Structured conditions and the condition-key parser.

use super::helpers::validate_identifier;
use super::types::Operator;
use crate::{Result, SpotError, Value};

/// A single `field <operator> value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    /// Creates a condition from its parts. The field name is validated.
    pub fn new(field: &str, operator: Operator, value: impl Into<Value>) -> Result<Self> {
        validate_identifier(field)?;
        Ok(Self {
            field: field.to_string(),
            operator,
            value: value.into(),
        })
    }

    /// Parses a condition key of the form `"field"` or `"field <op>"`.
    ///
    /// The field name ends at the first whitespace; the remainder (trimmed)
    /// is the operator token. A missing token means equality.
    ///
    /// ```
    /// use spot::{Condition, Operator};
    ///
    /// let cond = Condition::parse("status :gte", 5).unwrap();
    /// assert_eq!(cond.field, "status");
    /// assert_eq!(cond.operator, Operator::Gte);
    /// ```
    pub fn parse(key: &str, value: impl Into<Value>) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(SpotError::Query("Condition key cannot be empty".to_string()));
        }
        let (field, token) = match key.split_once(char::is_whitespace) {
            Some((field, rest)) => (field, rest.trim()),
            None => (key, ""),
        };
        let operator: Operator = token.parse()?;
        Self::new(field, operator, value)
    }
}

/// An ordered list of conditions forming one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    items: Vec<Condition>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every `(key, value)` pair with [`Condition::parse`].
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(), |conds, (key, value)| conds.add(key.as_ref(), value))
    }

    /// Adds a condition written as a key with an optional operator token.
    pub fn add(mut self, key: &str, value: impl Into<Value>) -> Result<Self> {
        self.items.push(Condition::parse(key, value)?);
        Ok(self)
    }

    /// Adds a structured condition.
    pub fn push(mut self, condition: Condition) -> Self {
        self.items.push(condition);
        self
    }

    /// Adds an equality condition.
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.with(field, Operator::Eq, value)
    }

    /// Adds a condition from its parts.
    pub fn with(self, field: &str, operator: Operator, value: impl Into<Value>) -> Result<Self> {
        Ok(self.push(Condition::new(field, operator, value)?))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.items.iter()
    }

    /// Applies `f` to every condition value, keeping field and operator.
    pub fn map_values<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&Value) -> Result<Value>,
    {
        let items = self
            .items
            .iter()
            .map(|cond| {
                Ok(Condition {
                    field: cond.field.clone(),
                    operator: cond.operator,
                    value: f(&cond.value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { items })
    }
}

impl FromIterator<Condition> for Conditions {
    fn from_iter<T: IntoIterator<Item = Condition>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Conditions {
    type Item = Condition;
    type IntoIter = std::vec::IntoIter<Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
