//! OTP Session Store: one pending challenge per phone number, persisted in a
//! [`KeyValueStore`] so it survives reloads.
//!
//! Storage layout, namespaced per flow so login and register never collide:
//!
//! ```text
//! {flow}_otp_timer_{phone} -> {"endTime": <epoch ms>, "token": "...", "userInfo": {...}}
//! {flow}_otp_step_{phone}  -> "true"
//! ```
//!
//! `endTime` is the source of truth for expiry. The visible countdown is
//! always re-derived from it, never stored.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::StorageError;
use crate::machine::FlowKind;
use crate::storage::KeyValueStore;
use crate::validation::{PhoneNumber, UserType};

/// Fields captured at registration issuance, restored into the form on resume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
}

impl UserSnapshot {
    pub fn new(full_name: impl Into<String>, user_type: UserType) -> Self {
        Self {
            full_name: Some(full_name.into()),
            user_type: Some(user_type),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.user_type.is_none()
    }
}

/// A live OTP challenge for one phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpSession {
    pub phone: PhoneNumber,
    /// Challenge identifier required to validate a code. Always present for
    /// sessions written by [`SessionStore::start`].
    pub token: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// The UI had already advanced to code entry for this phone.
    pub pending_step: bool,
    pub user_snapshot: Option<UserSnapshot>,
}

impl OtpSession {
    /// `max(0, round((expires_at - now) / 1s))`.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        remaining_seconds(self.expires_at, now)
    }

    /// Whether this session can put the flow straight into code entry.
    pub fn is_resumable(&self) -> bool {
        self.pending_step && self.token.is_some()
    }
}

pub fn remaining_seconds(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (expires_at - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        ((millis + 500) / 1000) as u64
    }
}

/// Persisted shape of the timer key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimerRecord {
    end_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_info: Option<UserSnapshot>,
}

pub struct SessionStore<S, C> {
    store: S,
    clock: C,
    kind: FlowKind,
}

impl<S: KeyValueStore, C: Clock> SessionStore<S, C> {
    pub fn new(store: S, clock: C, kind: FlowKind) -> Self {
        Self { store, clock, kind }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn timer_key(&self, phone: &PhoneNumber) -> String {
        format!("{}_otp_timer_{}", self.kind.namespace(), phone)
    }

    pub fn step_key(&self, phone: &PhoneNumber) -> String {
        format!("{}_otp_step_{}", self.kind.namespace(), phone)
    }

    /// Read the live session for `phone`.
    ///
    /// Expired or unreadable records are purged and reported as absent.
    pub fn peek(&self, phone: &PhoneNumber) -> Result<Option<OtpSession>, StorageError> {
        let Some(raw) = self.store.get(&self.timer_key(phone))? else {
            return Ok(None);
        };

        let record: TimerRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(phone = %phone, error = %e, "unreadable otp timer record, purging");
                self.clear(phone)?;
                return Ok(None);
            }
        };

        let now = self.clock.now();
        let expires_at = match Utc.timestamp_millis_opt(record.end_time).single() {
            Some(at) if at > now => at,
            _ => {
                debug!(phone = %phone, "otp session expired, purging");
                self.clear(phone)?;
                return Ok(None);
            }
        };

        let pending_step = self
            .store
            .get(&self.step_key(phone))?
            .map(|v| v == "true")
            .unwrap_or(false);

        Ok(Some(OtpSession {
            phone: phone.clone(),
            token: record.token,
            expires_at,
            pending_step,
            user_snapshot: record.user_info.filter(|s| !s.is_empty()),
        }))
    }

    /// Record a freshly issued challenge, replacing any previous one for `phone`.
    pub fn start(
        &self,
        phone: &PhoneNumber,
        token: &str,
        window_seconds: u64,
        user_snapshot: Option<&UserSnapshot>,
    ) -> Result<OtpSession, StorageError> {
        let expires_at = i64::try_from(window_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|window| self.clock.now().checked_add_signed(window))
            .ok_or(StorageError::InvalidWindow(window_seconds))?;
        let record = TimerRecord {
            end_time: expires_at.timestamp_millis(),
            token: Some(token.to_string()),
            user_info: user_snapshot.cloned(),
        };

        self.store
            .set(&self.timer_key(phone), &serde_json::to_string(&record)?)?;
        self.store.set(&self.step_key(phone), "true")?;
        debug!(phone = %phone, window_seconds, "otp session started");

        Ok(OtpSession {
            phone: phone.clone(),
            token: record.token,
            expires_at,
            pending_step: true,
            user_snapshot: record.user_info,
        })
    }

    /// Remove the session for `phone` unconditionally.
    pub fn clear(&self, phone: &PhoneNumber) -> Result<(), StorageError> {
        self.store.remove(&self.timer_key(phone))?;
        self.store.remove(&self.step_key(phone))?;
        Ok(())
    }
}
