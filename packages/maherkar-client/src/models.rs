//! Wire types for the auth endpoints.
//!
//! Issuance and registration responses arrive wrapped in a `Detail`
//! envelope, login validation returns a bare token pair. Each response type
//! converts into the matching `otp_flow` type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use otp_flow::{AuthTokens, AuthUser, OtpChallenge};

#[derive(Debug, Serialize)]
pub struct LoginOtpRequest<'a> {
    pub phone: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterOtpBody<'a> {
    pub phone: &'a str,
    pub full_name: &'a str,
    pub user_type: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ValidateOtpRequest<'a> {
    pub code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CheckPhoneRequest<'a> {
    pub phone: &'a str,
}

/// `201 {"Detail": {"Message": "...", "token": "...", "code": 123456}}`
#[derive(Debug, Deserialize)]
pub struct OtpIssuedResponse {
    #[serde(rename = "Detail")]
    pub detail: OtpIssuedDetail,
}

#[derive(Debug, Deserialize)]
pub struct OtpIssuedDetail {
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    pub token: String,
    /// Generated code, echoed while the SMS gateway is unreliable. Integer on
    /// the wire today; strings are accepted too.
    #[serde(default)]
    pub code: Option<Value>,
}

impl From<OtpIssuedResponse> for OtpChallenge {
    fn from(response: OtpIssuedResponse) -> Self {
        let debug_code = response.detail.code.and_then(|code| match code {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        OtpChallenge {
            token: response.detail.token,
            debug_code,
        }
    }
}

/// Login validation: `200 {"refresh": "...", "access": "..."}`
#[derive(Debug, Deserialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

impl From<TokenPair> for AuthTokens {
    fn from(pair: TokenPair) -> Self {
        AuthTokens {
            access: pair.access,
            refresh: pair.refresh,
        }
    }
}

/// Registration validation:
/// `201 {"Detail": {"Message": "...", "User": {...}, "Token": {"refresh", "access"}}}`
#[derive(Debug, Deserialize)]
pub struct RegisteredResponse {
    #[serde(rename = "Detail")]
    pub detail: RegisteredDetail,
}

#[derive(Debug, Deserialize)]
pub struct RegisteredDetail {
    #[serde(rename = "User")]
    pub user: RegisteredUser,
    #[serde(rename = "Token")]
    pub token: TokenPair,
}

#[derive(Debug, Deserialize)]
pub struct RegisteredUser {
    #[serde(default)]
    pub id: Option<i64>,
    pub phone: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

impl From<RegisteredUser> for AuthUser {
    fn from(user: RegisteredUser) -> Self {
        AuthUser {
            id: user.id,
            username: None,
            email: None,
            phone: user.phone,
            full_name: user.full_name,
            user_type: user.user_type,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckPhoneResponse {
    pub exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_response_with_numeric_code() {
        let body = r#"{"Detail": {"Message": "Otp created successfully", "token": "abc", "code": 482913}}"#;
        let response: OtpIssuedResponse = serde_json::from_str(body).unwrap();
        let challenge = OtpChallenge::from(response);
        assert_eq!(challenge.token, "abc");
        assert_eq!(challenge.debug_code.as_deref(), Some("482913"));
    }

    #[test]
    fn test_registered_response_ignores_password() {
        let body = r#"{"Detail": {
            "Message": "User created successfully",
            "User": {"phone": "09123456789", "user_type": "EM", "password": "x"},
            "Token": {"refresh": "r", "access": "a"}
        }}"#;
        let response: RegisteredResponse = serde_json::from_str(body).unwrap();
        let user = AuthUser::from(response.detail.user);
        assert_eq!(user.phone, "09123456789");
        assert_eq!(user.user_type.as_deref(), Some("EM"));
        assert_eq!(AuthTokens::from(response.detail.token).access, "a");
    }
}
