//! Step flow state machine.
//!
//! `PhoneEntry -> [UserInfo] -> CodeEntry -> Completed`; `UserInfo` only
//! exists in the registration flow.
//!
//! The machine is pure: [`Machine::decide`] takes an event, updates the form
//! state, and returns at most one [`FlowCommand`] describing the IO to
//! perform. Results of that IO come back as fact events. The driver in
//! [`crate::flow`] is the only thing that touches storage, the network, or
//! the countdown.
//!
//! # Guards
//!
//! - **Submitting**: while [`Pending`] is set, every submit is ignored.
//! - **Epochs**: each IO command carries the current epoch; `Back` and
//!   `EditPhone` bump it, so late results from abandoned requests are dropped.
//! - **Auto-submit memo**: a fully entered code is auto-submitted once per
//!   distinct value.

use tracing::{debug, info};

use crate::api::{AuthApi, AuthResult, OtpChallenge, RegisterOtpRequest};
use crate::digits::{normalize_digits, sanitize_code_input, CODE_LENGTH};
use crate::error::{AuthApiError, Field, Placement};
use crate::session::{OtpSession, UserSnapshot};
use crate::validation::{validate_full_name, OtpCode, PhoneNumber, UserType};

/// A state machine that interprets events and decides on commands.
///
/// - Called synchronously, no IO
/// - State lives inside the machine (`&mut self`)
/// - At most one command per event
pub trait Machine {
    type Event;
    type Command;

    fn decide(&mut self, event: &Self::Event) -> Option<Self::Command>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Login,
    Register,
}

impl FlowKind {
    /// Storage key prefix for this flow.
    pub fn namespace(&self) -> &'static str {
        match self {
            FlowKind::Login => "login",
            FlowKind::Register => "register",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PhoneEntry,
    UserInfo,
    CodeEntry,
    Completed,
}

/// The request currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    LookingUp,
    CheckingPhone,
    Issuing,
    Validating,
}

/// Why the session store is being consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPurpose {
    /// Restore the UI position on mount. Never issues a code.
    Resume,
    /// Phone field submitted.
    PhoneSubmit,
    /// Registration details submitted; reuse a live challenge if one exists.
    UserInfoSubmit,
}

/// Inline and banner messages currently shown by the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub code: Option<String>,
    pub general: Option<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none()
            && self.full_name.is_none()
            && self.code.is_none()
            && self.general.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueRequest {
    Login(PhoneNumber),
    Register(RegisterOtpRequest),
}

impl IssueRequest {
    pub fn phone(&self) -> &PhoneNumber {
        match self {
            IssueRequest::Login(phone) => phone,
            IssueRequest::Register(request) => &request.phone,
        }
    }

    /// Send this request through the collaborator.
    pub async fn send<A: AuthApi + ?Sized>(&self, api: &A) -> Result<OtpChallenge, AuthApiError> {
        match self {
            IssueRequest::Login(phone) => api.issue_login_otp(phone).await,
            IssueRequest::Register(request) => api.issue_register_otp(request).await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FlowEvent {
    // Intents from the form
    Mounted { phone: Option<String> },
    PhoneChanged { input: String },
    PhoneSubmitted { input: String },
    FullNameChanged { input: String },
    UserTypeSelected { user_type: UserType },
    UserInfoSubmitted { full_name: String, user_type: UserType },
    CodeChanged { input: String },
    CodeSubmitted { input: String },
    ResendRequested { remaining: u64 },
    BackRequested,
    EditPhoneRequested,

    // Facts from the driver
    SessionLookedUp {
        epoch: u64,
        phone: PhoneNumber,
        purpose: LookupPurpose,
        session: Option<OtpSession>,
        remaining: u64,
    },
    PhoneChecked { epoch: u64, exists: bool },
    PhoneCheckFailed { epoch: u64, error: AuthApiError },
    OtpIssued {
        epoch: u64,
        token: String,
        debug_code: Option<String>,
    },
    IssueFailed { epoch: u64, error: AuthApiError },
    OtpValidated { epoch: u64, result: AuthResult },
    ValidationFailed { epoch: u64, error: AuthApiError },
}

impl FlowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FlowEvent::Mounted { .. } => "mounted",
            FlowEvent::PhoneChanged { .. } => "phone_changed",
            FlowEvent::PhoneSubmitted { .. } => "phone_submitted",
            FlowEvent::FullNameChanged { .. } => "full_name_changed",
            FlowEvent::UserTypeSelected { .. } => "user_type_selected",
            FlowEvent::UserInfoSubmitted { .. } => "user_info_submitted",
            FlowEvent::CodeChanged { .. } => "code_changed",
            FlowEvent::CodeSubmitted { .. } => "code_submitted",
            FlowEvent::ResendRequested { .. } => "resend_requested",
            FlowEvent::BackRequested => "back_requested",
            FlowEvent::EditPhoneRequested => "edit_phone_requested",
            FlowEvent::SessionLookedUp { .. } => "session_looked_up",
            FlowEvent::PhoneChecked { .. } => "phone_checked",
            FlowEvent::PhoneCheckFailed { .. } => "phone_check_failed",
            FlowEvent::OtpIssued { .. } => "otp_issued",
            FlowEvent::IssueFailed { .. } => "issue_failed",
            FlowEvent::OtpValidated { .. } => "otp_validated",
            FlowEvent::ValidationFailed { .. } => "validation_failed",
        }
    }

    /// Epoch of the request a fact event answers. `None` for form intents.
    pub fn epoch(&self) -> Option<u64> {
        match self {
            FlowEvent::SessionLookedUp { epoch, .. }
            | FlowEvent::PhoneChecked { epoch, .. }
            | FlowEvent::PhoneCheckFailed { epoch, .. }
            | FlowEvent::OtpIssued { epoch, .. }
            | FlowEvent::IssueFailed { epoch, .. }
            | FlowEvent::OtpValidated { epoch, .. }
            | FlowEvent::ValidationFailed { epoch, .. } => Some(*epoch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FlowCommand {
    /// Peek the session store. Clear `discard` first when the phone changed.
    LookupSession {
        epoch: u64,
        phone: PhoneNumber,
        purpose: LookupPurpose,
        discard: Option<PhoneNumber>,
    },
    CheckPhone { epoch: u64, phone: PhoneNumber },
    IssueOtp { epoch: u64, request: IssueRequest },
    ValidateOtp { epoch: u64, token: String, code: OtpCode },
    /// Persist a new challenge and restart the countdown from the full window.
    StartSession {
        phone: PhoneNumber,
        token: String,
        window_seconds: u64,
        snapshot: Option<UserSnapshot>,
    },
    ResumeCountdown { seconds: u64 },
    StopCountdown,
    /// Clear the session, stop the countdown, signal completion.
    FinishSession { phone: PhoneNumber, result: AuthResult },
    RedirectToRegister { phone: PhoneNumber },
}

pub struct FlowMachine {
    kind: FlowKind,
    window_seconds: u64,
    step: Step,
    phone_input: String,
    phone: Option<PhoneNumber>,
    full_name: String,
    user_type: UserType,
    token: Option<String>,
    code: String,
    pending: Option<Pending>,
    last_auto_submitted: Option<String>,
    debug_code: Option<String>,
    errors: FormErrors,
    epoch: u64,
}

impl FlowMachine {
    pub fn new(kind: FlowKind, window_seconds: u64) -> Self {
        Self {
            kind,
            window_seconds,
            step: Step::PhoneEntry,
            phone_input: String::new(),
            phone: None,
            full_name: String::new(),
            user_type: UserType::default(),
            token: None,
            code: String::new(),
            pending: None,
            last_auto_submitted: None,
            debug_code: None,
            errors: FormErrors::default(),
            epoch: 0,
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn phone_input(&self) -> &str {
        &self.phone_input
    }

    /// The phone the flow is working with, once one has been accepted.
    pub fn phone(&self) -> Option<&PhoneNumber> {
        self.phone.as_ref()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Code echoed by the backend for the current challenge, when it sends one.
    pub fn debug_code(&self) -> Option<&str> {
        self.debug_code.as_deref()
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    /// Submit controls are disabled while this is true.
    pub fn is_submitting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // -------------------------------------------------------------------------
    // Form intents
    // -------------------------------------------------------------------------

    fn on_mounted(&mut self, phone: Option<&str>) -> Option<FlowCommand> {
        if self.step != Step::PhoneEntry || self.pending.is_some() {
            return None;
        }
        let raw = phone?;
        self.phone_input = normalize_digits(raw);
        let phone = PhoneNumber::parse(raw).ok()?;
        self.pending = Some(Pending::LookingUp);
        Some(FlowCommand::LookupSession {
            epoch: self.epoch,
            phone,
            purpose: LookupPurpose::Resume,
            discard: None,
        })
    }

    fn on_phone_submitted(&mut self, input: &str) -> Option<FlowCommand> {
        if self.step != Step::PhoneEntry || self.guard_pending("phone_submitted") {
            return None;
        }
        self.phone_input = normalize_digits(input);
        self.errors.phone = None;
        self.errors.general = None;

        let phone = match PhoneNumber::parse(input) {
            Ok(phone) => phone,
            Err(e) => {
                self.errors.phone = Some(e.to_string());
                return None;
            }
        };

        let discard = self.phone.take().filter(|previous| *previous != phone);
        if discard.is_some() {
            self.token = None;
        }
        self.phone = Some(phone.clone());
        self.pending = Some(Pending::LookingUp);
        Some(FlowCommand::LookupSession {
            epoch: self.epoch,
            phone,
            purpose: LookupPurpose::PhoneSubmit,
            discard,
        })
    }

    fn on_user_info_submitted(
        &mut self,
        full_name: &str,
        user_type: UserType,
    ) -> Option<FlowCommand> {
        if self.step != Step::UserInfo || self.guard_pending("user_info_submitted") {
            return None;
        }
        self.full_name = full_name.to_string();
        self.user_type = user_type;
        self.errors.full_name = None;
        self.errors.general = None;

        match validate_full_name(full_name) {
            Ok(name) => self.full_name = name,
            Err(e) => {
                self.errors.full_name = Some(e.to_string());
                return None;
            }
        }

        let Some(phone) = self.phone.clone() else {
            self.step = Step::PhoneEntry;
            return None;
        };
        self.pending = Some(Pending::LookingUp);
        Some(FlowCommand::LookupSession {
            epoch: self.epoch,
            phone,
            purpose: LookupPurpose::UserInfoSubmit,
            discard: None,
        })
    }

    fn on_code_changed(&mut self, input: &str) -> Option<FlowCommand> {
        if self.step != Step::CodeEntry {
            return None;
        }
        let code = sanitize_code_input(input);
        if code != self.code {
            self.errors.code = None;
        }
        self.code = code;

        if self.code.len() < CODE_LENGTH {
            self.last_auto_submitted = None;
            return None;
        }
        self.auto_submit()
    }

    /// Submit a complete code once per distinct value.
    fn auto_submit(&mut self) -> Option<FlowCommand> {
        if self.pending.is_some() {
            return None;
        }
        if self.last_auto_submitted.as_deref() == Some(self.code.as_str()) {
            debug!("code already auto-submitted, waiting for a change");
            return None;
        }

        self.last_auto_submitted = Some(self.code.clone());
        let code = OtpCode::parse(&self.code).ok()?;
        self.submit_code(code)
    }

    fn on_code_submitted(&mut self, input: &str) -> Option<FlowCommand> {
        if self.step != Step::CodeEntry || self.guard_pending("code_submitted") {
            return None;
        }
        let code = match OtpCode::parse(input) {
            Ok(code) => code,
            Err(e) => {
                self.errors.code = Some(e.to_string());
                return None;
            }
        };
        self.code = code.as_str().to_string();
        self.last_auto_submitted = Some(self.code.clone());
        self.submit_code(code)
    }

    fn submit_code(&mut self, code: OtpCode) -> Option<FlowCommand> {
        let Some(token) = self.token.clone() else {
            self.errors.code = Some(AuthApiError::ExpiredSession.user_message());
            return None;
        };
        self.errors.code = None;
        self.errors.general = None;
        self.pending = Some(Pending::Validating);
        Some(FlowCommand::ValidateOtp {
            epoch: self.epoch,
            token,
            code,
        })
    }

    fn on_resend_requested(&mut self, remaining: u64) -> Option<FlowCommand> {
        if self.step != Step::CodeEntry || self.guard_pending("resend_requested") {
            return None;
        }
        if remaining > 0 {
            debug!(remaining, "resend requested before countdown elapsed");
            return None;
        }
        let request = self.issue_request()?;
        self.code.clear();
        self.last_auto_submitted = None;
        self.errors.code = None;
        self.errors.general = None;
        self.pending = Some(Pending::Issuing);
        Some(FlowCommand::IssueOtp {
            epoch: self.epoch,
            request,
        })
    }

    fn on_back(&mut self) -> Option<FlowCommand> {
        match self.step {
            Step::PhoneEntry | Step::Completed => None,
            Step::UserInfo => {
                self.abandon();
                self.step = Step::PhoneEntry;
                None
            }
            Step::CodeEntry => {
                self.abandon();
                self.step = match self.kind {
                    FlowKind::Login => Step::PhoneEntry,
                    FlowKind::Register => Step::UserInfo,
                };
                Some(FlowCommand::StopCountdown)
            }
        }
    }

    fn on_edit_phone(&mut self) -> Option<FlowCommand> {
        match self.step {
            Step::PhoneEntry | Step::Completed => None,
            step => {
                self.abandon();
                self.step = Step::PhoneEntry;
                (step == Step::CodeEntry).then_some(FlowCommand::StopCountdown)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Facts
    // -------------------------------------------------------------------------

    fn on_session_looked_up(
        &mut self,
        phone: &PhoneNumber,
        purpose: LookupPurpose,
        session: Option<&OtpSession>,
        remaining: u64,
    ) -> Option<FlowCommand> {
        if self.pending != Some(Pending::LookingUp) {
            return None;
        }
        self.pending = None;

        if let Some(snapshot) = session.and_then(|s| s.user_snapshot.as_ref()) {
            self.restore_snapshot(snapshot);
        }

        match purpose {
            LookupPurpose::Resume => {
                let session = session.filter(|s| s.is_resumable())?;
                info!(phone = %phone, remaining, "resuming otp session");
                self.phone = Some(phone.clone());
                self.phone_input = phone.to_string();
                self.token = session.token.clone();
                self.enter_code_step();
                Some(FlowCommand::ResumeCountdown { seconds: remaining })
            }
            LookupPurpose::PhoneSubmit | LookupPurpose::UserInfoSubmit => {
                if let Some(session) = session.filter(|s| s.token.is_some()) {
                    info!(phone = %phone, remaining, "reusing live otp session");
                    self.token = session.token.clone();
                    self.enter_code_step();
                    return Some(FlowCommand::ResumeCountdown { seconds: remaining });
                }

                match (self.kind, purpose) {
                    (FlowKind::Register, LookupPurpose::PhoneSubmit) => {
                        self.pending = Some(Pending::CheckingPhone);
                        Some(FlowCommand::CheckPhone {
                            epoch: self.epoch,
                            phone: phone.clone(),
                        })
                    }
                    _ => {
                        let request = self.issue_request()?;
                        self.pending = Some(Pending::Issuing);
                        Some(FlowCommand::IssueOtp {
                            epoch: self.epoch,
                            request,
                        })
                    }
                }
            }
        }
    }

    fn on_phone_checked(&mut self, exists: bool) -> Option<FlowCommand> {
        if self.pending != Some(Pending::CheckingPhone) {
            return None;
        }
        self.pending = None;
        if exists {
            self.errors.phone = Some(AuthApiError::DuplicatePhone.user_message());
        } else {
            self.step = Step::UserInfo;
        }
        None
    }

    fn on_otp_issued(&mut self, token: &str, debug_code: Option<&str>) -> Option<FlowCommand> {
        if self.pending != Some(Pending::Issuing) {
            return None;
        }
        self.pending = None;
        let phone = self.phone.clone()?;
        info!(phone = %phone, flow = self.kind.namespace(), "otp issued");

        self.token = Some(token.to_string());
        self.debug_code = debug_code.map(str::to_string);
        self.enter_code_step();
        let snapshot = match self.kind {
            FlowKind::Login => None,
            FlowKind::Register => Some(UserSnapshot::new(self.full_name.clone(), self.user_type)),
        };
        Some(FlowCommand::StartSession {
            phone,
            token: token.to_string(),
            window_seconds: self.window_seconds,
            snapshot,
        })
    }

    fn on_otp_validated(&mut self, result: &AuthResult) -> Option<FlowCommand> {
        if self.pending != Some(Pending::Validating) {
            return None;
        }
        self.pending = None;
        let phone = self.phone.clone()?;
        info!(phone = %phone, flow = self.kind.namespace(), "otp validated");
        self.step = Step::Completed;
        Some(FlowCommand::FinishSession {
            phone,
            result: result.clone(),
        })
    }

    fn on_request_failed(&mut self, expected: Pending, error: &AuthApiError) -> Option<FlowCommand> {
        if self.pending != Some(expected) {
            return None;
        }
        self.pending = None;
        let command = self.apply_error(error);

        // A different full code typed during validation gets its own attempt.
        if command.is_none()
            && expected == Pending::Validating
            && self.step == Step::CodeEntry
            && self.code.len() == CODE_LENGTH
        {
            return self.auto_submit();
        }
        command
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn apply_error(&mut self, error: &AuthApiError) -> Option<FlowCommand> {
        let message = error.user_message();
        match error.placement(self.kind) {
            Placement::RedirectToRegister => {
                let phone = self.phone.clone()?;
                info!(phone = %phone, "phone not registered, redirecting to registration");
                Some(FlowCommand::RedirectToRegister { phone })
            }
            Placement::Field(field) => {
                debug!(?field, %error, "request rejected");
                if field == Field::Phone && self.step == Step::UserInfo {
                    self.step = Step::PhoneEntry;
                }
                let slot = match (self.step, field) {
                    (Step::PhoneEntry, Field::Phone) => &mut self.errors.phone,
                    (Step::UserInfo, Field::FullName) => &mut self.errors.full_name,
                    (Step::CodeEntry, Field::Code) => &mut self.errors.code,
                    _ => &mut self.errors.general,
                };
                *slot = Some(message);
                None
            }
            Placement::Banner => {
                debug!(%error, "request failed");
                self.errors.general = Some(message);
                None
            }
        }
    }

    fn issue_request(&self) -> Option<IssueRequest> {
        let phone = self.phone.clone()?;
        Some(match self.kind {
            FlowKind::Login => IssueRequest::Login(phone),
            FlowKind::Register => IssueRequest::Register(RegisterOtpRequest {
                phone,
                full_name: self.full_name.clone(),
                user_type: self.user_type,
            }),
        })
    }

    fn enter_code_step(&mut self) {
        self.step = Step::CodeEntry;
        self.code.clear();
        self.last_auto_submitted = None;
        self.errors.code = None;
    }

    fn restore_snapshot(&mut self, snapshot: &UserSnapshot) {
        if self.kind != FlowKind::Register {
            return;
        }
        if let Some(full_name) = &snapshot.full_name {
            self.full_name = full_name.clone();
        }
        if let Some(user_type) = snapshot.user_type {
            self.user_type = user_type;
        }
    }

    /// Leave the current step; in-flight results become stale.
    fn abandon(&mut self) {
        self.epoch += 1;
        self.pending = None;
        self.code.clear();
        self.last_auto_submitted = None;
        self.errors = FormErrors::default();
    }

    fn guard_pending(&self, event: &'static str) -> bool {
        if let Some(pending) = self.pending {
            debug!(event, ?pending, "submission in flight, ignoring");
            true
        } else {
            false
        }
    }
}

impl Machine for FlowMachine {
    type Event = FlowEvent;
    type Command = FlowCommand;

    fn decide(&mut self, event: &FlowEvent) -> Option<FlowCommand> {
        if self.step == Step::Completed {
            debug!(event = event.name(), "flow completed, ignoring event");
            return None;
        }
        if let Some(epoch) = event.epoch() {
            if epoch != self.epoch {
                debug!(
                    event = event.name(),
                    epoch,
                    current = self.epoch,
                    "stale result, ignoring"
                );
                return None;
            }
        }

        match event {
            FlowEvent::Mounted { phone } => self.on_mounted(phone.as_deref()),
            FlowEvent::PhoneChanged { input } => {
                if self.step == Step::PhoneEntry {
                    self.phone_input = normalize_digits(input);
                    self.errors.phone = None;
                }
                None
            }
            FlowEvent::PhoneSubmitted { input } => self.on_phone_submitted(input),
            FlowEvent::FullNameChanged { input } => {
                self.full_name = input.clone();
                self.errors.full_name = None;
                None
            }
            FlowEvent::UserTypeSelected { user_type } => {
                self.user_type = *user_type;
                None
            }
            FlowEvent::UserInfoSubmitted {
                full_name,
                user_type,
            } => self.on_user_info_submitted(full_name, *user_type),
            FlowEvent::CodeChanged { input } => self.on_code_changed(input),
            FlowEvent::CodeSubmitted { input } => self.on_code_submitted(input),
            FlowEvent::ResendRequested { remaining } => self.on_resend_requested(*remaining),
            FlowEvent::BackRequested => self.on_back(),
            FlowEvent::EditPhoneRequested => self.on_edit_phone(),
            FlowEvent::SessionLookedUp {
                phone,
                purpose,
                session,
                remaining,
                ..
            } => self.on_session_looked_up(phone, *purpose, session.as_ref(), *remaining),
            FlowEvent::PhoneChecked { exists, .. } => self.on_phone_checked(*exists),
            FlowEvent::PhoneCheckFailed { error, .. } => {
                self.on_request_failed(Pending::CheckingPhone, error)
            }
            FlowEvent::OtpIssued {
                token, debug_code, ..
            } => self.on_otp_issued(token, debug_code.as_deref()),
            FlowEvent::IssueFailed { error, .. } => self.on_request_failed(Pending::Issuing, error),
            FlowEvent::OtpValidated { result, .. } => self.on_otp_validated(result),
            FlowEvent::ValidationFailed { error, .. } => {
                self.on_request_failed(Pending::Validating, error)
            }
        }
    }
}
