pub mod access;
pub mod documents;
pub mod invitations;
pub mod projects;
pub mod reconcile;
pub mod revisions;
pub mod users;

#[cfg(test)]
pub mod testing;

use crate::error::{AppError, Result};

/// Maximum length of project, document and revision names.
pub const NAME_MAX_LEN: usize = 35;

/// Checks that `value` is between 1 and `max` characters long.
pub fn validate_length(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(AppError::bad_request(format!(
            "{field} must be between 1 and {max} characters"
        )));
    }
    Ok(())
}

pub fn validate_name(field: &str, value: &str) -> Result<()> {
    validate_length(field, value, NAME_MAX_LEN)
}
