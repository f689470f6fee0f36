pub mod error;
pub mod extract;
pub mod response;
pub mod validate;

/// Trims an optional form field; blank input becomes `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
