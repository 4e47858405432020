//! Input validation utilities
//!
//! Logins and passwords travel through the chat front end as two
//! whitespace-separated words, so neither may contain whitespace.

use regex::Regex;
use std::sync::OnceLock;

/// Validate login
pub fn validate_login(login: &str) -> Result<(), String> {
    if login.is_empty() {
        return Err("Login is required".to_string());
    }

    if login.len() > 64 {
        return Err("Login must be at most 64 characters long".to_string());
    }

    static LOGIN_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = LOGIN_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.\-]+$").expect("Failed to compile login regex"));

    if !regex.is_match(login) {
        return Err(
            "Login can only contain letters, numbers, dots, dashes and underscores".to_string(),
        );
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    if password.chars().any(char::is_whitespace) {
        return Err("Password must not contain whitespace".to_string());
    }

    Ok(())
}

/// Validate and normalise an upload extension to the `.ext` form
pub fn normalize_extension(extension: &str) -> Result<String, String> {
    let trimmed = extension.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return Err("File extension is required".to_string());
    }

    if trimmed.len() > 16 || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("File extension must be 1-16 alphanumeric characters".to_string());
    }

    Ok(format!(".{}", trimmed.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_login() {
        assert!(validate_login("alice").is_ok());
        assert!(validate_login("a.b-c_1").is_ok());
        assert!(validate_login("").is_err());
        assert!(validate_login("al ice").is_err());
        assert!(validate_login(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("p1").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password("two words").is_err());
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".png").unwrap(), ".png");
        assert_eq!(normalize_extension("JPG").unwrap(), ".jpg");
        assert!(normalize_extension("").is_err());
        assert!(normalize_extension(".").is_err());
        assert!(normalize_extension("../etc").is_err());
    }
}
