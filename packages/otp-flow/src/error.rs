//! Error taxonomy for the OTP flow.
//!
//! Three layers:
//! - [`FieldError`]: detected locally, never sent over the network, shown under a field
//! - [`AuthApiError`]: what the auth collaborator reported, already classified
//! - [`StorageError`]: key-value persistence failures (never abort the flow)
//! - [`ConfigError`]: rejected flow settings
//!
//! [`AuthApiError::placement`] decides where a collaborator error lands in the form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::machine::FlowKind;

/// Form field an error message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Phone,
    FullName,
    Code,
}

/// Local validation failures. Messages are the Persian strings shown inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("شماره تلفن الزامی است")]
    PhoneRequired,

    #[error("شماره تلفن باید با 09 شروع شده و 11 رقم باشد")]
    PhoneFormat,

    #[error("نام و نام خانوادگی الزامی است")]
    FullNameRequired,

    #[error("نام کامل باید حداقل ۳ کاراکتر باشد")]
    FullNameTooShort,

    #[error("نام کامل باید حداکثر ۵۰ کاراکتر باشد")]
    FullNameTooLong,

    #[error("کد تایید الزامی است")]
    CodeRequired,

    #[error("کد تایید باید ۶ رقم باشد")]
    CodeFormat,
}

impl FieldError {
    pub fn field(&self) -> Field {
        match self {
            FieldError::PhoneRequired | FieldError::PhoneFormat => Field::Phone,
            FieldError::FullNameRequired
            | FieldError::FullNameTooShort
            | FieldError::FullNameTooLong => Field::FullName,
            FieldError::CodeRequired | FieldError::CodeFormat => Field::Code,
        }
    }
}

/// Errors reported by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthApiError {
    /// Login requested for a phone that has no account.
    #[error("phone number is not registered")]
    PhoneNotFound,

    /// Registration requested for a phone that already has an account.
    #[error("phone number is already registered")]
    DuplicatePhone,

    /// Server-side field validation rejected the request.
    #[error("validation failed: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("invalid verification code")]
    InvalidCode,

    #[error("verification session expired")]
    ExpiredSession,

    /// Transport failure: the request never produced a usable response.
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },
}

/// Where a collaborator error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Inline under a form field.
    Field(Field),
    /// Leave the form and continue in the registration flow.
    RedirectToRegister,
    /// General, non-field banner.
    Banner,
}

impl AuthApiError {
    /// Map this error onto the form according to the flow it happened in.
    pub fn placement(&self, kind: FlowKind) -> Placement {
        match self {
            AuthApiError::PhoneNotFound => match kind {
                FlowKind::Login => Placement::RedirectToRegister,
                FlowKind::Register => Placement::Field(Field::Phone),
            },
            AuthApiError::DuplicatePhone => Placement::Field(Field::Phone),
            AuthApiError::InvalidCode | AuthApiError::ExpiredSession => {
                Placement::Field(Field::Code)
            }
            AuthApiError::Validation { field, .. } => match field.as_deref() {
                Some("phone") => Placement::Field(Field::Phone),
                Some("full_name") => Placement::Field(Field::FullName),
                Some("code") => Placement::Field(Field::Code),
                _ => Placement::Banner,
            },
            AuthApiError::Network(_) | AuthApiError::Unexpected { .. } => Placement::Banner,
        }
    }

    /// The Persian message shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            AuthApiError::PhoneNotFound => "شماره تلفن موجود نیست".to_string(),
            AuthApiError::DuplicatePhone => "این شماره تلفن قبلاً ثبت شده است".to_string(),
            AuthApiError::Validation { message, .. } => message.clone(),
            AuthApiError::InvalidCode => {
                "کد تایید نامعتبر است. لطفاً کد صحیح را وارد کنید.".to_string()
            }
            AuthApiError::ExpiredSession => {
                "کد تایید منقضی شده است. لطفاً دوباره درخواست کد کنید.".to_string()
            }
            AuthApiError::Network(_) => {
                "خطا در ارتباط با سرور. لطفاً دوباره تلاش کنید.".to_string()
            }
            AuthApiError::Unexpected { .. } => {
                "خطای غیرمنتظره رخ داد. لطفاً دوباره تلاش کنید.".to_string()
            }
        }
    }
}

/// Key-value persistence failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is not available: {0}")]
    Unavailable(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session window of {0}s cannot be represented")]
    InvalidWindow(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window must be between {min} and {max} seconds, got {seconds}")]
    WindowOutOfRange { seconds: u64, min: u64, max: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_not_found_redirects_only_on_login() {
        assert_eq!(
            AuthApiError::PhoneNotFound.placement(FlowKind::Login),
            Placement::RedirectToRegister
        );
        assert_eq!(
            AuthApiError::PhoneNotFound.placement(FlowKind::Register),
            Placement::Field(Field::Phone)
        );
    }

    #[test]
    fn test_code_errors_land_on_code_field() {
        for error in [AuthApiError::InvalidCode, AuthApiError::ExpiredSession] {
            assert_eq!(
                error.placement(FlowKind::Login),
                Placement::Field(Field::Code)
            );
        }
    }

    #[test]
    fn test_validation_field_routing() {
        let error = AuthApiError::Validation {
            field: Some("full_name".to_string()),
            message: "نام کامل باید بین 3 تا 50 کاراکتر باشد".to_string(),
        };
        assert_eq!(
            error.placement(FlowKind::Register),
            Placement::Field(Field::FullName)
        );
        assert_eq!(error.user_message(), "نام کامل باید بین 3 تا 50 کاراکتر باشد");

        let unknown = AuthApiError::Validation {
            field: None,
            message: "خطای اعتبارسنجی".to_string(),
        };
        assert_eq!(unknown.placement(FlowKind::Login), Placement::Banner);
    }

    #[test]
    fn test_network_errors_are_banners() {
        assert_eq!(
            AuthApiError::Network("connection refused".into()).placement(FlowKind::Register),
            Placement::Banner
        );
        assert_eq!(
            AuthApiError::Unexpected {
                status: 500,
                message: "boom".into()
            }
            .placement(FlowKind::Login),
            Placement::Banner
        );
    }

    #[test]
    fn test_field_error_fields() {
        assert_eq!(FieldError::PhoneFormat.field(), Field::Phone);
        assert_eq!(FieldError::FullNameTooShort.field(), Field::FullName);
        assert_eq!(FieldError::CodeFormat.field(), Field::Code);
    }
}
