//! Shared domain models.

mod item;
mod member;

pub use item::{CatalogItem, ItemKind, VariantTag};
pub use member::Member;

use crate::error::{LibraryError, Result};

/// Separator used for the held-item list inside a member row.
pub const HELD_DELIMITER: &str = ";";

/// Check that an identifier can be stored and referenced from a held list.
pub fn validate_id(field: &'static str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LibraryError::InvalidInput {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if id.trim() != id {
        return Err(LibraryError::InvalidInput {
            field,
            reason: "must not start or end with whitespace".to_string(),
        });
    }
    if let Some(ch) = id
        .chars()
        .find(|ch| matches!(*ch, ',' | '"' | ';' | '\n' | '\r'))
    {
        return Err(LibraryError::InvalidInput {
            field,
            reason: format!("must not contain {ch:?}"),
        });
    }
    Ok(())
}

/// Trim a free-text field and reject it if nothing is left.
pub fn normalize_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::InvalidInput {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if trimmed.contains(['\n', '\r']) {
        return Err(LibraryError::InvalidInput {
            field,
            reason: "must be a single line".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
