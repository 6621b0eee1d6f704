//! Entity name rules
//!
//! Names are hierarchical, path-like strings: they start with `/`, are 4 to
//! 1024 characters long, use only `[A-Za-z0-9.\-_/\\]` and never contain `//`.

use crate::error::{EntityError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Shortest allowed name, leading slash included
pub const MIN_NAME_LEN: usize = 4;

/// Longest allowed name, leading slash included
pub const MAX_NAME_LEN: usize = 1024;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/[A-Za-z0-9.\-_/\\]{3,1023}$").expect("entity name pattern is valid")
});

/// Check a name against the naming rules
pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}

/// Check a name, explaining which rule it breaks
pub fn validate_name(name: &str) -> Result<()> {
    if !name.starts_with('/') {
        return Err(EntityError::invalid_name(name, "must start with '/'"));
    }
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(EntityError::invalid_name(
            name,
            format!(
                "length {} is outside {}..={}",
                len, MIN_NAME_LEN, MAX_NAME_LEN
            ),
        ));
    }
    if name.contains("//") {
        return Err(EntityError::invalid_name(name, "must not contain '//'"));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(EntityError::invalid_name(
            name,
            "only letters, digits, '.', '-', '_', '/' and '\\' are allowed",
        ));
    }
    Ok(())
}
