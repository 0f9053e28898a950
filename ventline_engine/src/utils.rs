//! Shared helpers and limits.

use chrono::Utc;

pub const APP_NAME: &str = "ventline_engine";

/// Longest accepted free-text body for posts, comments, and private messages.
pub const MAX_CONTENT_LEN: usize = 4096;

/// Longest accepted anonymous display name.
pub const MAX_NAME_LEN: usize = 30;

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}
