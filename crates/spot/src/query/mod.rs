//! Condition model, query builder and SQL rendering.
//!
//! Conditions are written either structurally or with the condition-key
//! micro-language: a field name optionally followed by an operator token.
//!
//! | Token                        | Operator |
//! |------------------------------|----------|
//! | *(none)*, `=`, `:eq`         | equal, or IN for a list |
//! | `<>`, `!=`, `:ne`, `:not`    | not equal, or NOT IN for a list |
//! | `<`, `:lt` / `<=`, `:lte`    | less than (or equal) |
//! | `>`, `:gt` / `>=`, `:gte`    | greater than (or equal) |
//! | `:like`                      | LIKE |
//! | `~=`, `=~`, `:regex`         | REGEXP (MySQL only) |
//! | `:fulltext`                  | MATCH ... AGAINST (MySQL only) |
//!
//! # Examples
//!
//! ```ignore
//! use spot::{Conditions, Dialect, Direction};
//!
//! let query = mapper.all::<Post>()?
//!     .where_clause(Conditions::new().add("status >=", 5)?)?
//!     .or_where(Conditions::new().eq("featured", true)?)?
//!     .order_by("date_created", Direction::Desc)?
//!     .limit(10);
//!
//! let stmt = Dialect::Mysql.build_select(&query)?;
//! // SELECT * FROM `posts` WHERE ( `status` >= :status ) OR ( `featured` = :featured )
//! //   ORDER BY `date_created` DESC LIMIT 10
//! ```

mod builder;
mod condition;
mod dialect;
pub(crate) mod helpers;
mod modify;
mod select;
mod statement;
mod types;


pub use builder::{ConditionGroup, Query};
pub use condition::{Condition, Conditions};
pub use dialect::Dialect;
pub use helpers::{validate_identifier, validate_identifier_part};
pub use statement::{Binder, Statement};
pub use types::{Direction, Joiner, Operator};
