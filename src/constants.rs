use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Header carrying the caller identity resolved by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Multipart field holding the image bytes.
pub const UPLOAD_FILE_FIELD: &str = "file";

/// Multipart field holding the client-reported size before compression.
pub const UPLOAD_ORIGINAL_SIZE_FIELD: &str = "original_size";
