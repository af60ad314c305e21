//! Auth collaborator seam.
//!
//! The REST backend that issues and validates OTPs. The flow only depends on
//! this trait; `maherkar-client` provides the HTTP implementation and the
//! integration tests provide a scripted mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthApiError;
use crate::machine::FlowKind;
use crate::validation::{OtpCode, PhoneNumber, UserType};

/// Payload for registration issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOtpRequest {
    pub phone: PhoneNumber,
    pub full_name: String,
    pub user_type: UserType,
}

/// A freshly issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub token: String,
    /// The backend echoes the generated code while the SMS gateway is
    /// unreliable. Only ever shown when explicitly configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
}

impl OtpChallenge {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            debug_code: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

/// Outcome of a successful validation. Login returns tokens only,
/// registration also returns the created user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub tokens: AuthTokens,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn issue_login_otp(&self, phone: &PhoneNumber) -> Result<OtpChallenge, AuthApiError>;

    async fn issue_register_otp(
        &self,
        request: &RegisterOtpRequest,
    ) -> Result<OtpChallenge, AuthApiError>;

    /// Validate `code` against the challenge `token`. Login and registration
    /// challenges are validated on different endpoints, hence `kind`.
    async fn validate_otp(
        &self,
        kind: FlowKind,
        token: &str,
        code: &OtpCode,
    ) -> Result<AuthResult, AuthApiError>;

    async fn check_phone_exists(&self, phone: &PhoneNumber) -> Result<bool, AuthApiError>;
}

#[async_trait]
impl<T: AuthApi + ?Sized> AuthApi for std::sync::Arc<T> {
    async fn issue_login_otp(&self, phone: &PhoneNumber) -> Result<OtpChallenge, AuthApiError> {
        (**self).issue_login_otp(phone).await
    }

    async fn issue_register_otp(
        &self,
        request: &RegisterOtpRequest,
    ) -> Result<OtpChallenge, AuthApiError> {
        (**self).issue_register_otp(request).await
    }

    async fn validate_otp(
        &self,
        kind: FlowKind,
        token: &str,
        code: &OtpCode,
    ) -> Result<AuthResult, AuthApiError> {
        (**self).validate_otp(kind, token, code).await
    }

    async fn check_phone_exists(&self, phone: &PhoneNumber) -> Result<bool, AuthApiError> {
        (**self).check_phone_exists(phone).await
    }
}
