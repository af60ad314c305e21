//! Validation rules for the phone, full name and code fields.
//!
//! All rules run on normalized input (see [`crate::digits`]), so
//! `۰۹۱۲۳۴۵۶۷۸۹` is accepted as `09123456789`.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::digits::{normalize_digits, CODE_LENGTH};
use crate::error::FieldError;

lazy_static! {
    // `[0-9]` rather than `\d`: the regex crate's `\d` is Unicode-aware.
    static ref PHONE_REGEX: Regex = Regex::new(r"^09[0-9]{9}$").expect("valid phone regex");
}

pub const FULL_NAME_MIN_CHARS: usize = 3;
pub const FULL_NAME_MAX_CHARS: usize = 50;

/// A validated Iranian mobile number: `09` followed by nine ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize numerals and validate against `^09[0-9]{9}$`.
    pub fn parse(input: &str) -> Result<Self, FieldError> {
        let normalized = normalize_digits(input);
        if normalized.is_empty() {
            return Err(FieldError::PhoneRequired);
        }
        if !PHONE_REGEX.is_match(&normalized) {
            return Err(FieldError::PhoneFormat);
        }
        Ok(Self(normalized))
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

impl TryFrom<String> for PhoneNumber {
    type Error = FieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

/// A validated verification code: exactly six ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn parse(input: &str) -> Result<Self, FieldError> {
        let normalized = normalize_digits(input);
        if normalized.is_empty() {
            return Err(FieldError::CodeRequired);
        }
        if normalized.len() != CODE_LENGTH || !normalized.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FieldError::CodeFormat);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim and length-check a full name (counted in characters, not bytes).
pub fn validate_full_name(input: &str) -> Result<String, FieldError> {
    let trimmed = input.trim();
    let chars = trimmed.chars().count();
    if chars == 0 {
        Err(FieldError::FullNameRequired)
    } else if chars < FULL_NAME_MIN_CHARS {
        Err(FieldError::FullNameTooShort)
    } else if chars > FULL_NAME_MAX_CHARS {
        Err(FieldError::FullNameTooLong)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Account type chosen at registration, wire-coded as the backend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UserType {
    #[default]
    #[serde(rename = "JS")]
    JobSeeker,
    #[serde(rename = "EM")]
    Employer,
}

impl UserType {
    pub fn code(&self) -> &'static str {
        match self {
            UserType::JobSeeker => "JS",
            UserType::Employer => "EM",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "JS" => Some(UserType::JobSeeker),
            "EM" => Some(UserType::Employer),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UserType::JobSeeker => "جوینده کار",
            UserType::Employer => "کارفرما",
        }
    }

    pub fn variants() -> &'static [UserType] {
        &[UserType::JobSeeker, UserType::Employer]
    }
}
