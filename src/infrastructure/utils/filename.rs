use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::AppError;

static FORBIDDEN_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"|?*\x00-\x1f]"#).expect("filename pattern is valid"));

/// Reduces an uploaded filename to a single safe path component.
pub fn sanitize_filename(raw: &str, max_length: usize) -> Result<String, AppError> {
    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::InvalidInput("filename is required".into()));
    }
    if FORBIDDEN_CHARS.is_match(name) {
        return Err(AppError::InvalidInput("Filename contains invalid characters".into()));
    }
    if name.chars().count() > max_length {
        return Err(AppError::InvalidInput(format!(
            "Filename longer than {} characters",
            max_length
        )));
    }
    Ok(name.to_string())
}
