//! Password strength validation.
//!
//! The minimum length comes from the vault's security policy.

use crate::error::{Result, VaultError};

/// Validate a new password against the vault's minimum length.
///
/// # Requirements
///
/// - Not empty or only whitespace
/// - At least `min_length` characters (counted as Unicode scalar values)
///
/// # Examples
///
/// ```
/// use keeptower_core::crypto::validate_password;
///
/// assert!(validate_password("correct-horse-battery", 12).is_ok());
/// assert!(validate_password("short", 12).is_err());
/// ```
pub fn validate_password(password: &str, min_length: u32) -> Result<()> {
    if password.trim().is_empty() {
        return Err(VaultError::WeakPassword(
            "Password cannot be empty".to_string(),
        ));
    }

    let length = password.chars().count();
    if length < min_length as usize {
        return Err(VaultError::WeakPassword(format!(
            "Password must be at least {} characters (got {})",
            min_length, length
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_password() {
        assert!(validate_password("my-secure-password-123", 12).is_ok());
        assert!(validate_password("exactly12chr", 12).is_ok());
    }

    #[test]
    fn test_password_too_short() {
        let result = validate_password("elevenchars", 12);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least 12 characters"));
    }

    #[test]
    fn test_password_empty() {
        assert!(validate_password("", 8).is_err());
        assert!(validate_password("   ", 1).is_err());
        assert!(validate_password("\n\t", 1).is_err());
    }

    #[test]
    fn test_multibyte_counts_characters() {
        // two bytes per character
        assert!(validate_password("ééééééééé", 9).is_ok());
        assert!(validate_password("éééééééé", 9).is_err());
    }
}
