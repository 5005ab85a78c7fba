//! API key format constants

/// Default API key prefix (for identification without exposing the key)
pub const API_KEY_PREFIX: &str = "agentui_";

/// Default minimum API key length, prefix included
pub const API_KEY_MIN_LENGTH: usize = 32;

/// Permissions granted to an API key caller that requests none
pub const DEFAULT_API_KEY_PERMISSIONS: &[&str] = &["basic"];

/// Permissions granted to an accepted OAuth2 client
pub const DEFAULT_OAUTH2_PERMISSIONS: &[&str] = &["basic", "chat", "advanced", "admin"];

/// Check an API key against a prefix list and minimum length.
///
/// Pure shape check; says nothing about whether the key is accepted.
pub fn is_well_formed_api_key(key: &str, prefixes: &[String], min_length: usize) -> bool {
    key.len() >= min_length
        && prefixes
            .iter()
            .any(|p| key.starts_with(p.as_str()) && key.len() > p.len())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
