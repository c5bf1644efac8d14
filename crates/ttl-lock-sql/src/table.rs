//! Table name validation.
//!
//! Table names are interpolated into SQL text (identifiers cannot be bound as
//! parameters), so only plain identifiers are accepted.

use ttl_lock_core::error::{LockError, LockResult};

/// Default table holding lock rows.
pub const DEFAULT_TABLE: &str = "locks";

/// Longest accepted identifier (PostgreSQL truncates at 63 bytes).
pub const MAX_TABLE_NAME_LENGTH: usize = 63;

/// Checks that `table` matches `[A-Za-z_][A-Za-z0-9_]*` and fits
/// [`MAX_TABLE_NAME_LENGTH`].
pub fn validate_table_name(table: &str) -> LockResult<&str> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || table.len() > MAX_TABLE_NAME_LENGTH {
        return Err(LockError::InvalidArgument(format!(
            "invalid table name '{table}': expected a plain SQL identifier of at most {MAX_TABLE_NAME_LENGTH} characters"
        )));
    }
    Ok(table)
}
