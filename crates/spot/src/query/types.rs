//! Query builder types and enums.

use std::fmt;
use std::str::FromStr;

use crate::{Result, SpotError};

/// Condition comparison operators.
///
/// Parsed from the operator token that follows the field name in a condition
/// key, e.g. `"status :gt"` or `"title ~="`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal (=), or IN when the value is a list
    Eq,
    /// Not equal (!=), or NOT IN when the value is a list
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// LIKE pattern matching
    Like,
    /// Regular expression match
    Regex,
    /// Full-text search (MATCH ... AGAINST)
    FullText,
    /// Contains all list members. Parsed but never rendered.
    All,
}

impl Operator {
    /// Returns the SQL operator string for plain binary comparisons.
    pub fn to_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::Regex => "REGEXP",
            Operator::FullText => "AGAINST",
            Operator::All => "ALL",
        }
    }

    /// Returns the canonical named token (`:eq`, `:gt`, ...).
    pub fn token(&self) -> &'static str {
        match self {
            Operator::Eq => ":eq",
            Operator::Ne => ":ne",
            Operator::Lt => ":lt",
            Operator::Lte => ":lte",
            Operator::Gt => ":gt",
            Operator::Gte => ":gte",
            Operator::Like => ":like",
            Operator::Regex => ":regex",
            Operator::FullText => ":fulltext",
            Operator::All => ":all",
        }
    }
}

impl FromStr for Operator {
    type Err = SpotError;

    fn from_str(token: &str) -> Result<Self> {
        match token.trim() {
            "" | "=" | ":eq" => Ok(Operator::Eq),
            "<>" | "!=" | ":ne" | ":not" => Ok(Operator::Ne),
            "<" | ":lt" => Ok(Operator::Lt),
            "<=" | ":lte" => Ok(Operator::Lte),
            ">" | ":gt" => Ok(Operator::Gt),
            ">=" | ":gte" => Ok(Operator::Gte),
            ":like" => Ok(Operator::Like),
            "~=" | "=~" | ":regex" => Ok(Operator::Regex),
            ":fulltext" => Ok(Operator::FullText),
            ":all" => Ok(Operator::All),
            other => Err(SpotError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Logical connective between conditions or condition groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Joiner {
    #[default]
    And,
    Or,
}

impl Joiner {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }
}

impl FromStr for Joiner {
    type Err = SpotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Joiner::And),
            "OR" => Ok(Joiner::Or),
            other => Err(SpotError::Query(format!("Unknown condition joiner '{}'", other))),
        }
    }
}

/// Sort order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending order
    #[default]
    Asc,
    /// Descending order
    Desc,
}

impl Direction {
    /// Returns the SQL keyword.
    pub fn to_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = SpotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            other => Err(SpotError::Query(format!("Unknown sort direction '{}'", other))),
        }
    }
}
