//! # otp-flow
//!
//! Phone-number OTP sign-in and registration for MaherKar.
//!
//! ## Core Concepts
//!
//! - [`SessionStore`]: one pending challenge per phone, persisted in a
//!   [`KeyValueStore`] so a reload can resume code entry
//! - [`Countdown`]: the visible resend timer, never the source of truth for expiry
//! - [`FlowMachine`]: pure step machine, `PhoneEntry -> [UserInfo] -> CodeEntry -> Completed`
//! - [`OtpFlow`]: driver that executes machine commands against storage and [`AuthApi`]
//!
//! ## Architecture
//!
//! ```text
//! UI intent
//!     │
//!     ▼
//! OtpFlow::dispatch ◄──────────── fact event ───────────┐
//!     │                                                 │
//!     ▼ decide()                                        │
//! FlowMachine ─► Some(FlowCommand) ─► OtpFlow::execute ─┤
//!                                         │             │
//!                                         ├─► SessionStore / CredentialStore
//!                                         ├─► AuthApi ──┘
//!                                         └─► Countdown
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use otp_flow::{FlowConfig, FlowKind, MemoryStore, OtpFlow, Step, SystemClock};
//!
//! let mut flow = OtpFlow::new(FlowKind::Login, FlowConfig::default(), MemoryStore::new(), SystemClock, api);
//! flow.submit_phone("۰۹۱۲۳۴۵۶۷۸۹").await;
//! assert_eq!(flow.step(), Step::CodeEntry);
//! flow.enter_code("123456").await; // auto-submits
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod credentials;
pub mod digits;
pub mod error;
pub mod flow;
pub mod machine;
pub mod session;
pub mod storage;
pub mod validation;

pub use api::{AuthApi, AuthResult, AuthTokens, AuthUser, OtpChallenge, RegisterOtpRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    check_window_seconds, FlowConfig, DEFAULT_WINDOW_SECONDS, MAX_WINDOW_SECONDS,
    MIN_WINDOW_SECONDS,
};
pub use countdown::Countdown;
pub use credentials::CredentialStore;
pub use digits::{format_countdown, normalize_digits, to_persian_digits, CODE_LENGTH};
pub use error::{AuthApiError, ConfigError, Field, FieldError, Placement, StorageError};
pub use flow::{Navigation, OtpFlow};
pub use machine::{
    FlowCommand, FlowEvent, FlowKind, FlowMachine, FormErrors, IssueRequest, LookupPurpose,
    Machine, Pending, Step,
};
pub use session::{OtpSession, SessionStore, UserSnapshot};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use validation::{validate_full_name, OtpCode, PhoneNumber, UserType};

#[cfg(feature = "web")]
pub use storage::LocalStorage;
