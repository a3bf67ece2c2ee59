//! Local input validation for the onboarding screens.
//!
//! Everything here is pure: a failure means no collaborator was called.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum username length after trimming.
pub const MIN_USERNAME_LEN: usize = 3;

/// Minimum national number length after the leading zeros are stripped.
pub const MIN_PHONE_DIGITS: usize = 9;

/// Minimum OTP length accepted before asking the provider.
pub const MIN_CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("username must be at least {MIN_USERNAME_LEN} characters long")]
    UsernameTooShort,

    #[error("phone number must contain only digits")]
    PhoneNotNumeric,

    #[error("phone number must have at least {MIN_PHONE_DIGITS} digits")]
    PhoneTooShort,

    #[error("country calling code must be 1-3 digits")]
    InvalidCallingCode,

    #[error("verification code must be at least {MIN_CODE_LEN} digits")]
    CodeTooShort,

    #[error("verification code must contain only digits")]
    CodeNotNumeric,
}

/// An E.164 phone number (`+` followed by calling code and national digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Build an E.164 number from a calling code and what the user typed.
    ///
    /// Separators are dropped and exactly the leading run of `0` characters
    /// (the national trunk prefix) is stripped, so `("94", "0771234567")`
    /// becomes `+94771234567`.
    pub fn from_local(calling_code: &str, local: &str) -> Result<Self, ValidationError> {
        let calling_code = calling_code.trim().trim_start_matches('+');
        if calling_code.is_empty()
            || calling_code.len() > 3
            || !calling_code.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidCallingCode);
        }

        let compact: String = local
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();
        let national = compact.trim_start_matches('0');

        if !national.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::PhoneNotNumeric);
        }
        if national.len() < MIN_PHONE_DIGITS {
            return Err(ValidationError::PhoneTooShort);
        }

        Ok(Self(format!("+{calling_code}{national}")))
    }

    /// Wrap a number that is already in E.164 form (from storage or a token).
    pub fn from_e164(raw: &str) -> Result<Self, ValidationError> {
        let digits = raw.strip_prefix('+').unwrap_or(raw);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::PhoneNotNumeric);
        }
        if digits.len() < MIN_PHONE_DIGITS {
            return Err(ValidationError::PhoneTooShort);
        }
        Ok(Self(format!("+{digits}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A trimmed username of at least [`MIN_USERNAME_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < MIN_USERNAME_LEN {
            return Err(ValidationError::UsernameTooShort);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate an OTP locally, returning the trimmed code.
pub fn parse_code(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim();
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::CodeNotNumeric);
    }
    if code.len() < MIN_CODE_LEN {
        return Err(ValidationError::CodeTooShort);
    }
    Ok(code.to_string())
}
