//! Small helpers for email handling.

use regex::Regex;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Build the frontend verification link included in outbound emails.
pub(crate) fn verification_link(frontend_base_url: &str, code: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/verification?code={code}")
}
