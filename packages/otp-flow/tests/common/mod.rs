// Common test utilities: a scripted auth collaborator and flow harness.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use otp_flow::{
    AuthApi, AuthApiError, AuthResult, AuthTokens, AuthUser, FlowConfig, FlowKind, KeyValueStore,
    ManualClock, MemoryStore, OtpChallenge, OtpCode, OtpFlow, PhoneNumber, RegisterOtpRequest,
    StorageError,
};

pub const PHONE: &str = "09123456789";

pub type TestFlow = OtpFlow<MemoryStore, MockAuthApi, ManualClock>;

// =============================================================================
// Mock Auth API
// =============================================================================

/// A recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCall {
    IssueLogin(String),
    IssueRegister(RegisterOtpRequest),
    Validate {
        kind: FlowKind,
        token: String,
        code: String,
    },
    CheckPhone(String),
}

/// Responses are consumed in order; once a queue is empty the mock falls back
/// to success (`tok1`, `tok2`, ... for issuance, `false` for phone checks).
/// Clones share scripts and recorded calls.
#[derive(Clone, Default)]
pub struct MockAuthApi {
    issue_responses: Arc<Mutex<VecDeque<Result<OtpChallenge, AuthApiError>>>>,
    validate_responses: Arc<Mutex<VecDeque<Result<AuthResult, AuthApiError>>>>,
    check_responses: Arc<Mutex<VecDeque<Result<bool, AuthApiError>>>>,
    calls: Arc<Mutex<Vec<AuthCall>>>,
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str) -> Self {
        self.issue_responses
            .lock()
            .unwrap()
            .push_back(Ok(OtpChallenge::new(token)));
        self
    }

    pub fn with_challenge(self, challenge: OtpChallenge) -> Self {
        self.issue_responses.lock().unwrap().push_back(Ok(challenge));
        self
    }

    pub fn with_issue_error(self, error: AuthApiError) -> Self {
        self.issue_responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_validation(self, result: AuthResult) -> Self {
        self.validate_responses.lock().unwrap().push_back(Ok(result));
        self
    }

    pub fn with_validation_error(self, error: AuthApiError) -> Self {
        self.validate_responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_phone_exists(self, exists: bool) -> Self {
        self.check_responses.lock().unwrap().push_back(Ok(exists));
        self
    }

    pub fn calls(&self) -> Vec<AuthCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn issue_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, AuthCall::IssueLogin(_) | AuthCall::IssueRegister(_)))
            .count()
    }

    pub fn validate_calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                AuthCall::Validate { token, code, .. } => Some((token.clone(), code.clone())),
                _ => None,
            })
            .collect()
    }

    fn next_issue(&self) -> Result<OtpChallenge, AuthApiError> {
        let scripted = self.issue_responses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(OtpChallenge::new(format!("tok{}", self.issue_count()))))
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn issue_login_otp(&self, phone: &PhoneNumber) -> Result<OtpChallenge, AuthApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(AuthCall::IssueLogin(phone.to_string()));
        self.next_issue()
    }

    async fn issue_register_otp(
        &self,
        request: &RegisterOtpRequest,
    ) -> Result<OtpChallenge, AuthApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(AuthCall::IssueRegister(request.clone()));
        self.next_issue()
    }

    async fn validate_otp(
        &self,
        kind: FlowKind,
        token: &str,
        code: &OtpCode,
    ) -> Result<AuthResult, AuthApiError> {
        self.calls.lock().unwrap().push(AuthCall::Validate {
            kind,
            token: token.to_string(),
            code: code.to_string(),
        });
        let scripted = self.validate_responses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(tokens()))
    }

    async fn check_phone_exists(&self, phone: &PhoneNumber) -> Result<bool, AuthApiError> {
        self.calls
            .lock()
            .unwrap()
            .push(AuthCall::CheckPhone(phone.to_string()));
        let scripted = self.check_responses.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(false))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn phone() -> PhoneNumber {
    PhoneNumber::parse(PHONE).unwrap()
}

pub fn tokens() -> AuthResult {
    AuthResult {
        tokens: AuthTokens {
            access: "access-jwt".to_string(),
            refresh: "refresh-jwt".to_string(),
        },
        user: None,
    }
}

pub fn registered(full_name: &str) -> AuthResult {
    AuthResult {
        user: Some(AuthUser {
            id: Some(1),
            username: None,
            email: None,
            phone: PHONE.to_string(),
            full_name: Some(full_name.to_string()),
            user_type: Some("JS".to_string()),
        }),
        ..tokens()
    }
}

pub fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap())
}

pub fn flow(kind: FlowKind, api: &MockAuthApi, store: &MemoryStore, clock: &ManualClock) -> TestFlow {
    OtpFlow::new(
        kind,
        FlowConfig::default(),
        store.clone(),
        clock.clone(),
        api.clone(),
    )
}

// =============================================================================
// Failing store
// =============================================================================

/// A store whose every operation fails, as a blocked `localStorage` would.
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    attempts: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations attempted so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Unavailable("storage is disabled".to_string()))
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        self.fail()
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        self.fail()
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        self.fail()
    }
}
