//! Query builder helper functions.

use unicode_normalization::UnicodeNormalization;

use crate::{Result, SpotError};

/// Longest identifier accepted by MySQL.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Validates a SQL identifier (datasource or field name).
///
/// Supports both simple identifiers and database-qualified names
/// (e.g., "blog.posts").
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SpotError::Query("Identifier cannot be empty".to_string()));
    }

    if name.contains('.') {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() != 2 {
            return Err(SpotError::Query(format!(
                "Invalid qualified identifier '{}': must be in format 'database.table'",
                name
            )));
        }
        for part in parts {
            validate_identifier_part(part)?;
        }
        return Ok(());
    }

    validate_identifier_part(name)
}

/// Validates a single part of an identifier (no dots allowed).
///
/// Identifiers are always quoted when rendered, so reserved words are fine.
pub fn validate_identifier_part(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SpotError::Query("Identifier part cannot be empty".to_string()));
    }

    // Normalize to NFKC to prevent Unicode confusables
    let name = name.nfkc().collect::<String>();

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(SpotError::Query(format!(
            "Identifier '{}' exceeds maximum length of {}",
            name, MAX_IDENTIFIER_LEN
        )));
    }

    let first_char = name
        .chars()
        .next()
        .ok_or_else(|| SpotError::Query(format!("Identifier '{}' is empty or invalid", name)))?;
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(SpotError::Query(format!(
            "Identifier '{}' must start with a letter or underscore",
            name
        )));
    }

    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            return Err(SpotError::Query(format!(
                "Identifier '{}' contains invalid character '{}'",
                name, ch
            )));
        }
    }

    Ok(())
}

/// Turns a field name into a placeholder base name (`blog.posts` -> `blog_posts`).
pub(crate) fn placeholder_base(field: &str) -> String {
    let base: String = field
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    if base.is_empty() {
        "p".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("posts").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("blog.posts").is_ok());
        // quoted on output, so reserved words are accepted
        assert!(validate_identifier("order").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1posts").is_err());
        assert!(validate_identifier("posts; DROP TABLE x").is_err());
        assert!(validate_identifier("a.b.c").is_err());
        assert!(validate_identifier(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_placeholder_base() {
        assert_eq!(placeholder_base("status"), "status");
        assert_eq!(placeholder_base("blog.posts"), "blog_posts");
    }
}
