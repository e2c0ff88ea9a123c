use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::errors::AppError;

static USER_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("user id pattern is valid"));

/// Parses `id` as a UUID, naming `field` in the error.
pub fn valid_uuid(id: &str, field: &str) -> Result<Uuid, AppError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Uuid::parse_str(id).map_err(|_| AppError::InvalidInput(format!("{} is not a valid UUID", field)))
}

/// User ids become the first segment of storage keys, so only path-safe
/// tokens are accepted.
pub fn valid_user_id(user_id: &str) -> Result<String, AppError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::InvalidInput("user_id is required".into()));
    }
    if !USER_ID_PATTERN.is_match(user_id) {
        return Err(AppError::InvalidInput(
            "user_id may only contain letters, digits, '-' or '_' (max 64)".into(),
        ));
    }
    Ok(user_id.to_string())
}
