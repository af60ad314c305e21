//! REST client for the MaherKar authentication API.
//!
//! Implements [`otp_flow::AuthApi`] against the backend's `/auth/` routes:
//!
//! | operation | route |
//! |---|---|
//! | issue login code | `POST login-otp/` |
//! | validate login code | `POST login-validate-otp/{token}/` |
//! | issue registration code | `POST register-otp/` |
//! | validate registration code | `POST register-otp-validate/{token}/` |
//! | phone lookup | `POST check-phone/` |
//!
//! # Example
//!
//! ```rust,ignore
//! use maherkar_client::{MaherkarAuthClient, MaherkarOptions};
//!
//! let client = MaherkarAuthClient::new(MaherkarOptions::default())?;
//! let challenge = client.issue_login_otp(&phone).await?;
//! ```

pub mod classify;
pub mod models;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use otp_flow::{
    AuthApi, AuthApiError, AuthResult, FlowKind, OtpChallenge, OtpCode, PhoneNumber,
    RegisterOtpRequest,
};

use crate::classify::{classify, Operation};
use crate::models::{
    CheckPhoneRequest, CheckPhoneResponse, LoginOtpRequest, OtpIssuedResponse, RegisterOtpBody,
    RegisteredResponse, TokenPair, ValidateOtpRequest,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/auth";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct MaherkarOptions {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for MaherkarOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaherkarAuthClient {
    client: Client,
    options: MaherkarOptions,
}

impl MaherkarAuthClient {
    pub fn new(options: MaherkarOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(options.timeout).build()?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &MaherkarOptions {
        &self.options
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.options.base_url.trim_end_matches('/'), path)
    }

    /// POST `body` and decode a success response as `T`.
    async fn post<B, T>(&self, op: Operation, path: &str, body: &B) -> Result<T, AuthApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (status, text) = self.send(op, path, body).await?;
        if !status.is_success() {
            let error = classify(op, status.as_u16(), &text);
            debug!(?op, status = status.as_u16(), %error, "auth request rejected");
            return Err(error);
        }
        decode(status, &text)
    }

    async fn send<B>(&self, op: Operation, path: &str, body: &B) -> Result<(StatusCode, String), AuthApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(?op, error = %e, "auth request failed");
                AuthApiError::Network(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthApiError::Network(e.to_string()))?;
        Ok((status, text))
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T, AuthApiError> {
    serde_json::from_str(text).map_err(|e| {
        warn!(error = %e, "unparseable auth response");
        AuthApiError::Unexpected {
            status: status.as_u16(),
            message: format!("unparseable response: {}", e),
        }
    })
}

#[async_trait]
impl AuthApi for MaherkarAuthClient {
    async fn issue_login_otp(&self, phone: &PhoneNumber) -> Result<OtpChallenge, AuthApiError> {
        let body = LoginOtpRequest {
            phone: phone.as_str(),
        };
        let response: OtpIssuedResponse = self.post(Operation::IssueLoginOtp, "login-otp/", &body).await?;
        Ok(response.into())
    }

    async fn issue_register_otp(
        &self,
        request: &RegisterOtpRequest,
    ) -> Result<OtpChallenge, AuthApiError> {
        let body = RegisterOtpBody {
            phone: request.phone.as_str(),
            full_name: &request.full_name,
            user_type: request.user_type.code(),
        };
        let response: OtpIssuedResponse = self
            .post(Operation::IssueRegisterOtp, "register-otp/", &body)
            .await?;
        Ok(response.into())
    }

    async fn validate_otp(
        &self,
        kind: FlowKind,
        token: &str,
        code: &OtpCode,
    ) -> Result<AuthResult, AuthApiError> {
        let body = ValidateOtpRequest {
            code: code.as_str(),
        };
        match kind {
            FlowKind::Login => {
                let path = format!("login-validate-otp/{}/", token);
                let pair: TokenPair = self.post(Operation::ValidateOtp, &path, &body).await?;
                Ok(AuthResult {
                    tokens: pair.into(),
                    user: None,
                })
            }
            FlowKind::Register => {
                let path = format!("register-otp-validate/{}/", token);
                let response: RegisteredResponse =
                    self.post(Operation::ValidateOtp, &path, &body).await?;
                Ok(AuthResult {
                    tokens: response.detail.token.into(),
                    user: Some(response.detail.user.into()),
                })
            }
        }
    }

    async fn check_phone_exists(&self, phone: &PhoneNumber) -> Result<bool, AuthApiError> {
        let body = CheckPhoneRequest {
            phone: phone.as_str(),
        };
        let (status, text) = self.send(Operation::CheckPhone, "check-phone/", &body).await?;

        // Deployments without the lookup route: the uniqueness check at
        // issuance still reports duplicates.
        if status == StatusCode::NOT_FOUND {
            debug!("phone lookup route not available, assuming unregistered");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(classify(Operation::CheckPhone, status.as_u16(), &text));
        }
        let response: CheckPhoneResponse = decode(status, &text)?;
        Ok(response.exists)
    }
}
