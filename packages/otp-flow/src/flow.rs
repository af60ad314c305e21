//! Flow driver: runs [`FlowMachine`] commands against the session store, the
//! auth collaborator and the countdown.
//!
//! ```text
//! intent ──► machine.decide() ──► command ──► execute() ──► fact event ──┐
//!               ▲                                                         │
//!               └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop ends when the machine returns no command. Storage failures are
//! logged and never abort a transition; collaborator failures come back to
//! the machine as fact events and end up in [`FormErrors`].

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{AuthApi, AuthResult};
use crate::clock::Clock;
use crate::config::FlowConfig;
use crate::countdown::Countdown;
use crate::credentials::CredentialStore;
use crate::digits::{format_countdown, paste_code};
use crate::machine::{FlowCommand, FlowEvent, FlowKind, FlowMachine, FormErrors, Machine, Step};
use crate::session::SessionStore;
use crate::storage::KeyValueStore;
use crate::validation::{PhoneNumber, UserType};

/// Where the UI should go once the form is done with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Completed without a success callback.
    Home,
    /// Login found no account; continue in registration with the phone prefilled.
    Register { phone: PhoneNumber },
}

type SuccessCallback = Box<dyn FnMut(&AuthResult) + Send>;

pub struct OtpFlow<S, A, C> {
    machine: FlowMachine,
    sessions: SessionStore<S, C>,
    credentials: CredentialStore<S>,
    api: A,
    countdown: Countdown,
    on_success: Option<SuccessCallback>,
    result: Option<AuthResult>,
    navigation: Option<Navigation>,
}

impl<S, A, C> OtpFlow<S, A, C>
where
    S: KeyValueStore + Clone,
    A: AuthApi,
    C: Clock,
{
    pub fn new(kind: FlowKind, config: FlowConfig, store: S, clock: C, api: A) -> Self {
        Self {
            machine: FlowMachine::new(kind, config.window_seconds),
            sessions: SessionStore::new(store.clone(), clock, kind),
            credentials: CredentialStore::new(store),
            api,
            countdown: Countdown::new(),
            on_success: None,
            result: None,
            navigation: None,
        }
    }

    /// Called once with the validation result when the flow completes.
    /// Without a callback, completion navigates to [`Navigation::Home`].
    pub fn with_on_success<F>(mut self, on_success: F) -> Self
    where
        F: FnMut(&AuthResult) + Send + 'static,
    {
        self.on_success = Some(Box::new(on_success));
        self
    }

    // -------------------------------------------------------------------------
    // Intents
    // -------------------------------------------------------------------------

    /// Prefill the phone field and resume a pending code entry if one is live.
    pub async fn mount(&mut self, phone: Option<&str>) {
        self.dispatch(FlowEvent::Mounted {
            phone: phone.map(str::to_string),
        })
        .await;
    }

    /// Stop the countdown. The persisted session is left alone.
    pub fn unmount(&mut self) {
        self.countdown.stop();
    }

    pub async fn set_phone(&mut self, input: &str) {
        self.dispatch(FlowEvent::PhoneChanged {
            input: input.to_string(),
        })
        .await;
    }

    pub async fn submit_phone(&mut self, input: &str) {
        self.dispatch(FlowEvent::PhoneSubmitted {
            input: input.to_string(),
        })
        .await;
    }

    pub async fn set_full_name(&mut self, input: &str) {
        self.dispatch(FlowEvent::FullNameChanged {
            input: input.to_string(),
        })
        .await;
    }

    pub async fn set_user_type(&mut self, user_type: UserType) {
        self.dispatch(FlowEvent::UserTypeSelected { user_type }).await;
    }

    pub async fn submit_user_info(&mut self, full_name: &str, user_type: UserType) {
        self.dispatch(FlowEvent::UserInfoSubmitted {
            full_name: full_name.to_string(),
            user_type,
        })
        .await;
    }

    /// Replace the code field value. A full six-digit value auto-submits.
    pub async fn enter_code(&mut self, input: &str) {
        self.dispatch(FlowEvent::CodeChanged {
            input: input.to_string(),
        })
        .await;
    }

    /// Paste into the code field, appending to what is already there.
    pub async fn paste_code(&mut self, pasted: &str) {
        let merged = paste_code(self.machine.code(), pasted);
        self.enter_code(&merged).await;
    }

    pub async fn submit_code(&mut self, input: &str) {
        self.dispatch(FlowEvent::CodeSubmitted {
            input: input.to_string(),
        })
        .await;
    }

    pub async fn request_resend(&mut self) {
        let remaining = self.countdown.remaining();
        self.dispatch(FlowEvent::ResendRequested { remaining }).await;
    }

    pub async fn back(&mut self) {
        self.dispatch(FlowEvent::BackRequested).await;
    }

    pub async fn edit_phone(&mut self) {
        self.dispatch(FlowEvent::EditPhoneRequested).await;
    }

    // -------------------------------------------------------------------------
    // View state
    // -------------------------------------------------------------------------

    pub fn kind(&self) -> FlowKind {
        self.machine.kind()
    }

    pub fn step(&self) -> Step {
        self.machine.step()
    }

    /// Form state: field values, pending request, epoch.
    pub fn machine(&self) -> &FlowMachine {
        &self.machine
    }

    pub fn errors(&self) -> &FormErrors {
        self.machine.errors()
    }

    pub fn is_submitting(&self) -> bool {
        self.machine.is_submitting()
    }

    pub fn remaining(&self) -> u64 {
        self.countdown.remaining()
    }

    /// `m:ss` label for the resend countdown.
    pub fn countdown_label(&self) -> String {
        format_countdown(self.countdown.remaining())
    }

    pub fn can_resend(&self) -> bool {
        self.machine.step() == Step::CodeEntry
            && !self.machine.is_submitting()
            && self.countdown.can_resend()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<u64> {
        self.countdown.subscribe()
    }

    pub fn navigation(&self) -> Option<&Navigation> {
        self.navigation.as_ref()
    }

    pub fn result(&self) -> Option<&AuthResult> {
        self.result.as_ref()
    }

    /// Code echoed by the backend with the last issuance, if any.
    pub fn last_debug_code(&self) -> Option<&str> {
        self.machine.debug_code()
    }

    pub fn sessions(&self) -> &SessionStore<S, C> {
        &self.sessions
    }

    pub fn credentials(&self) -> &CredentialStore<S> {
        &self.credentials
    }

    // -------------------------------------------------------------------------
    // Machine loop
    // -------------------------------------------------------------------------

    async fn dispatch(&mut self, event: FlowEvent) {
        let mut next = Some(event);
        while let Some(event) = next.take() {
            let Some(command) = self.machine.decide(&event) else {
                break;
            };
            next = self.execute(command).await;
        }
    }

    async fn execute(&mut self, command: FlowCommand) -> Option<FlowEvent> {
        match command {
            FlowCommand::LookupSession {
                epoch,
                phone,
                purpose,
                discard,
            } => {
                if let Some(previous) = discard {
                    debug!(phone = %previous, "phone changed, clearing previous session");
                    if let Err(e) = self.sessions.clear(&previous) {
                        warn!(phone = %previous, error = %e, "failed to clear otp session");
                    }
                }
                let session = match self.sessions.peek(&phone) {
                    Ok(session) => session,
                    Err(e) => {
                        warn!(phone = %phone, error = %e, "failed to read otp session");
                        None
                    }
                };
                let remaining = session
                    .as_ref()
                    .map(|s| s.remaining_seconds(self.sessions.now()))
                    .unwrap_or(0);
                Some(FlowEvent::SessionLookedUp {
                    epoch,
                    phone,
                    purpose,
                    session,
                    remaining,
                })
            }

            FlowCommand::CheckPhone { epoch, phone } => {
                match self.api.check_phone_exists(&phone).await {
                    Ok(exists) => Some(FlowEvent::PhoneChecked { epoch, exists }),
                    Err(error) => Some(FlowEvent::PhoneCheckFailed { epoch, error }),
                }
            }

            FlowCommand::IssueOtp { epoch, request } => match request.send(&self.api).await {
                Ok(challenge) => Some(FlowEvent::OtpIssued {
                    epoch,
                    token: challenge.token,
                    debug_code: challenge.debug_code,
                }),
                Err(error) => {
                    debug!(phone = %request.phone(), %error, "otp issuance failed");
                    Some(FlowEvent::IssueFailed { epoch, error })
                }
            },

            FlowCommand::ValidateOtp { epoch, token, code } => {
                match self.api.validate_otp(self.machine.kind(), &token, &code).await {
                    Ok(result) => Some(FlowEvent::OtpValidated { epoch, result }),
                    Err(error) => Some(FlowEvent::ValidationFailed { epoch, error }),
                }
            }

            FlowCommand::StartSession {
                phone,
                token,
                window_seconds,
                snapshot,
            } => {
                if let Err(e) = self
                    .sessions
                    .start(&phone, &token, window_seconds, snapshot.as_ref())
                {
                    warn!(phone = %phone, error = %e, "failed to persist otp session");
                }
                self.countdown.start(window_seconds);
                None
            }

            FlowCommand::ResumeCountdown { seconds } => {
                self.countdown.start(seconds);
                None
            }

            FlowCommand::StopCountdown => {
                self.countdown.stop();
                None
            }

            FlowCommand::FinishSession { phone, result } => {
                self.countdown.stop();
                if let Err(e) = self.sessions.clear(&phone) {
                    warn!(phone = %phone, error = %e, "failed to clear otp session");
                }
                if let Err(e) = self.credentials.save(&result) {
                    warn!(error = %e, "failed to persist credentials");
                }
                self.complete(result);
                None
            }

            FlowCommand::RedirectToRegister { phone } => {
                self.navigation = Some(Navigation::Register { phone });
                None
            }
        }
    }

    fn complete(&mut self, result: AuthResult) {
        match self.on_success.as_mut() {
            Some(on_success) => on_success(&result),
            None => {
                info!(flow = self.machine.kind().namespace(), "no success callback, navigating home");
                self.navigation = Some(Navigation::Home);
            }
        }
        self.result = Some(result);
    }
}
