//! The registration state machine shared by every role.
//!
//! [`FlowController`] is driven like a GUI state: the presentation layer calls
//! [`FlowController::update`] with the user's actions, and every message the
//! controller posts into its inbox (API results, countdown ticks, the redirect
//! timer) must be fed back through `update` as well.
//!
//! `update` spawns its requests and timers on the current Tokio runtime: it
//! panics if called outside of one.

pub mod otp;
pub mod timer;

use std::{fmt, future::Future, sync::Arc, time::Duration};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use url::Url;

use crate::{
    client::{AuthToken, RegisterRequest, RegistrationApi},
    draft::{Attachment, AttachmentSlot, ProfileField, ProfileSubmission, RegistrationDraft},
    error::ApiErrorCategory,
    role::{FlowTable, Role},
    validation::{self, ValidationError},
};

use otp::OtpSession;
use timer::TimerHandle;

pub const DEFAULT_OTP_COUNTDOWN_SECS: u32 = 50;
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    /// Seconds before the OTP can be sent again.
    pub otp_countdown_secs: u32,
    /// Delay between the success screen and the redirect.
    pub redirect_delay: Duration,
    pub flows: FlowTable,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            otp_countdown_secs: DEFAULT_OTP_COUNTDOWN_SECS,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
            flows: FlowTable::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Registering,
    AwaitingOtp,
    CompletingProfile,
    Succeeded,
    Abandoned,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Succeeded | Step::Abandoned)
    }
}

/// What the presentation layer displays next to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    Invalid(ValidationError),
    Api(ApiErrorCategory),
}

impl FlowError {
    /// Form field the error belongs to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid(e) => Some(e.field()),
            Self::Api(e) => e.field(),
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "{}", e),
            Self::Api(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FlowError {}

impl From<ValidationError> for FlowError {
    fn from(e: ValidationError) -> Self {
        Self::Invalid(e)
    }
}

impl From<ApiErrorCategory> for FlowError {
    fn from(e: ApiErrorCategory) -> Self {
        Self::Api(e)
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    View(ViewMessage),
    Registered(Result<AuthToken, ApiErrorCategory>),
    VerificationSent(Result<(), ApiErrorCategory>),
    Verified(Result<(), ApiErrorCategory>),
    ProfileCompleted(Result<(), ApiErrorCategory>),
    /// One second of the OTP countdown, tagged with the countdown epoch.
    Tick(u64),
    RedirectDue,
}

#[derive(Debug, Clone)]
pub enum ViewMessage {
    FullNameEdited(String),
    EmailEdited(String),
    PhoneEdited(String),
    PasswordEdited(String),
    ConfirmPasswordEdited(String),
    AgreementToggled(bool),
    ProfileEdited(ProfileField, String),
    AttachmentSelected(AttachmentSlot, Option<Attachment>),
    DigitEdited(usize, String),
    DigitBackspace(usize),
    Resend,
    Submit,
    SelectAnotherRole,
}

impl From<ViewMessage> for Message {
    fn from(msg: ViewMessage) -> Self {
        Message::View(msg)
    }
}

pub struct FlowController {
    role: Role,
    settings: FlowSettings,
    api: Arc<dyn RegistrationApi>,
    sender: UnboundedSender<Message>,

    step: Step,
    draft: Option<RegistrationDraft>,
    token: Option<AuthToken>,
    otp: Option<OtpSession>,

    processing: bool,
    error: Option<FlowError>,

    redirect: Option<TimerHandle>,
    redirect_target: Option<Url>,
}

impl fmt::Debug for FlowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowController")
            .field("role", &self.role)
            .field("step", &self.step)
            .field("draft", &self.draft)
            .field("otp", &self.otp)
            .field("processing", &self.processing)
            .field("error", &self.error)
            .field("redirect_target", &self.redirect_target)
            .finish()
    }
}

impl FlowController {
    /// Returns the controller and the inbox its background tasks post into.
    pub fn new(
        role: Role,
        settings: FlowSettings,
        api: Arc<dyn RegistrationApi>,
    ) -> (Self, UnboundedReceiver<Message>) {
        let (sender, receiver) = unbounded_channel();
        tracing::info!("Starting {} registration", role);
        (
            Self {
                role,
                settings,
                api,
                sender,
                step: Step::Registering,
                draft: Some(RegistrationDraft::new(role)),
                token: None,
                otp: None,
                processing: false,
                error: None,
                redirect: None,
                redirect_target: None,
            },
            receiver,
        )
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// `None` once the flow reached a terminal step.
    pub fn draft(&self) -> Option<&RegistrationDraft> {
        self.draft.as_ref()
    }

    pub fn otp(&self) -> Option<&OtpSession> {
        self.otp.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.processing
    }

    pub fn error(&self) -> Option<&FlowError> {
        self.error.as_ref()
    }

    pub fn redirect_armed(&self) -> bool {
        self.redirect.is_some()
    }

    /// Where the user was sent once the redirect delay elapsed.
    pub fn redirect_target(&self) -> Option<&Url> {
        self.redirect_target.as_ref()
    }

    pub fn update(&mut self, message: Message) {
        match message {
            Message::View(msg) => self.on_view(msg),
            Message::Registered(res) => self.on_registered(res),
            Message::VerificationSent(res) => self.on_verification_sent(res),
            Message::Verified(res) => self.on_verified(res),
            Message::ProfileCompleted(res) => self.on_profile_completed(res),
            Message::Tick(epoch) => {
                if self.step == Step::AwaitingOtp {
                    if let Some(otp) = self.otp.as_mut() {
                        if !otp.tick(epoch) {
                            tracing::trace!("Ignoring tick of countdown {}", epoch);
                        }
                    }
                }
            }
            Message::RedirectDue => {
                if self.step == Step::Succeeded
                    && self.redirect.take().is_some()
                    && self.redirect_target.is_none()
                {
                    self.redirect_target = self.settings.flows.get(self.role).redirect_url.clone();
                    if let Some(url) = &self.redirect_target {
                        tracing::info!("Redirecting {} to {}", self.role, url);
                    }
                }
            }
        }
    }

    fn on_view(&mut self, msg: ViewMessage) {
        if let ViewMessage::SelectAnotherRole = msg {
            self.abandon();
            return;
        }
        if self.step.is_terminal() {
            return;
        }

        match (self.step, msg) {
            (Step::Registering, ViewMessage::Submit) => self.submit_registration(),
            (Step::AwaitingOtp, ViewMessage::Submit) => self.submit_otp(),
            (Step::CompletingProfile, ViewMessage::Submit) => self.submit_profile(),
            (Step::AwaitingOtp, ViewMessage::Resend) => self.resend(),
            (Step::AwaitingOtp, ViewMessage::DigitEdited(index, value)) => {
                if let Some(otp) = self.otp.as_mut() {
                    if otp.enter_digit(index, &value) {
                        self.error = None;
                    }
                }
            }
            (Step::AwaitingOtp, ViewMessage::DigitBackspace(index)) => {
                if let Some(otp) = self.otp.as_mut() {
                    otp.backspace(index);
                }
            }
            (Step::Registering, msg) => {
                let Some(draft) = self.draft.as_mut() else {
                    return;
                };
                match msg {
                    ViewMessage::FullNameEdited(v) => draft.full_name = v,
                    ViewMessage::EmailEdited(v) => draft.email = v,
                    ViewMessage::PhoneEdited(v) => {
                        draft.phone_number = validation::normalize_phone_digits(&v)
                    }
                    ViewMessage::PasswordEdited(v) => draft.password = v,
                    ViewMessage::ConfirmPasswordEdited(v) => draft.confirm_password = v,
                    ViewMessage::AgreementToggled(v) => draft.agreement_accepted = v,
                    _ => return,
                }
                self.error = None;
            }
            (Step::CompletingProfile, msg) => {
                let Some(draft) = self.draft.as_mut() else {
                    return;
                };
                match msg {
                    ViewMessage::ProfileEdited(field, value) => {
                        if !draft.profile.set(field, value) {
                            tracing::debug!("Rejected value for {:?}", field);
                            return;
                        }
                    }
                    ViewMessage::AttachmentSelected(slot, attachment) => {
                        draft.profile.set_attachment(slot, attachment)
                    }
                    _ => return,
                }
                self.error = None;
            }
            (step, msg) => {
                tracing::debug!("Ignoring {:?} in step {:?}", msg, step);
            }
        }
    }

    fn submit_registration(&mut self) {
        if self.reject_if_processing() {
            return;
        }
        let Some(draft) = self.draft.as_ref() else {
            return;
        };
        if let Err(e) = validation::validate_registration(draft) {
            self.error = Some(e.into());
            return;
        }

        let request = RegisterRequest::from(draft);
        let api = self.api.clone();
        self.processing = true;
        self.error = None;
        self.perform(
            async move { api.register(&request).await },
            Message::Registered,
        );
    }

    fn on_registered(&mut self, res: Result<AuthToken, ApiErrorCategory>) {
        if self.step != Step::Registering || !self.processing {
            tracing::debug!("Ignoring stale registration result");
            return;
        }
        match res {
            Ok(token) => {
                let email = self
                    .draft
                    .as_ref()
                    .map(|d| d.email.trim().to_string())
                    .unwrap_or_default();
                let mut otp = OtpSession::new(email, self.settings.otp_countdown_secs);
                otp.start_countdown(self.sender.clone());
                self.otp = Some(otp);
                self.token = Some(token.clone());
                self.set_step(Step::AwaitingOtp);

                // Still processing until the email is sent.
                let api = self.api.clone();
                self.perform(
                    async move { api.request_email_verification(&token).await },
                    Message::VerificationSent,
                );
            }
            Err(e) => {
                self.processing = false;
                self.fail(e);
            }
        }
    }

    fn on_verification_sent(&mut self, res: Result<(), ApiErrorCategory>) {
        if self.step != Step::AwaitingOtp || !self.processing {
            tracing::debug!("Ignoring stale verification email result");
            return;
        }
        self.processing = false;
        if let Err(e) = res {
            if let Some(otp) = self.otp.as_mut() {
                otp.expire();
            }
            self.fail(e);
        }
    }

    fn resend(&mut self) {
        if self.reject_if_processing() {
            return;
        }
        let (Some(otp), Some(token)) = (self.otp.as_mut(), self.token.clone()) else {
            return;
        };
        if !otp.resend_allowed() {
            tracing::debug!(
                "Resend requested with {} seconds left",
                otp.seconds_remaining()
            );
            return;
        }
        otp.reset();
        otp.start_countdown(self.sender.clone());

        let api = self.api.clone();
        self.processing = true;
        self.error = None;
        self.perform(
            async move { api.request_email_verification(&token).await },
            Message::VerificationSent,
        );
    }

    fn submit_otp(&mut self) {
        if self.reject_if_processing() {
            return;
        }
        let (Some(otp), Some(token)) = (self.otp.as_ref(), self.token.clone()) else {
            return;
        };
        let code = otp.code();
        if code.len() != otp::OTP_LENGTH {
            self.error = Some(ValidationError::IncompleteOtp.into());
            return;
        }

        let email = otp.target_email().to_string();
        let api = self.api.clone();
        self.processing = true;
        self.error = None;
        self.perform(
            async move { api.verify_code(&email, &code, &token).await },
            Message::Verified,
        );
    }

    fn on_verified(&mut self, res: Result<(), ApiErrorCategory>) {
        if self.step != Step::AwaitingOtp || !self.processing {
            tracing::debug!("Ignoring stale verification result");
            return;
        }
        self.processing = false;
        match res {
            Ok(()) => {
                // Stops the countdown.
                self.otp = None;
                if self.settings.flows.get(self.role).complete_profile {
                    self.set_step(Step::CompletingProfile);
                } else {
                    self.succeed();
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn submit_profile(&mut self) {
        if self.reject_if_processing() {
            return;
        }
        let (Some(draft), Some(token)) = (self.draft.as_ref(), self.token.clone()) else {
            return;
        };
        let today = chrono::Local::now().date_naive();
        if let Err(e) = validation::validate_profile(&draft.profile, today) {
            self.error = Some(e.into());
            return;
        }

        let submission = ProfileSubmission::from(draft);
        let role = self.role;
        let api = self.api.clone();
        self.processing = true;
        self.error = None;
        self.perform(
            async move { api.complete_profile(role, &submission, &token).await },
            Message::ProfileCompleted,
        );
    }

    fn on_profile_completed(&mut self, res: Result<(), ApiErrorCategory>) {
        if self.step != Step::CompletingProfile || !self.processing {
            tracing::debug!("Ignoring stale profile completion result");
            return;
        }
        self.processing = false;
        match res {
            Ok(()) => self.succeed(),
            Err(e) => self.fail(e),
        }
    }

    fn succeed(&mut self) {
        self.draft = None;
        self.token = None;
        self.otp = None;
        self.error = None;
        self.set_step(Step::Succeeded);

        if self.settings.flows.get(self.role).redirect_url.is_some() {
            self.redirect = Some(TimerHandle::after(
                self.settings.redirect_delay,
                self.sender.clone(),
                Message::RedirectDue,
            ));
        }
    }

    fn abandon(&mut self) {
        if self.step.is_terminal() {
            return;
        }
        self.draft = None;
        self.token = None;
        self.otp = None;
        self.error = None;
        self.processing = false;
        self.set_step(Step::Abandoned);
    }

    fn fail(&mut self, e: ApiErrorCategory) {
        tracing::warn!("{} registration, step {:?}: {}", self.role, self.step, e);
        self.error = Some(e.into());
    }

    fn reject_if_processing(&self) -> bool {
        if self.processing {
            tracing::debug!("A request is already in flight, ignoring the action");
        }
        self.processing
    }

    fn set_step(&mut self, step: Step) {
        tracing::info!("{} registration: {:?} -> {:?}", self.role, self.step, step);
        self.step = step;
    }

    /// Runs `fut` in the background and posts its result into the inbox.
    fn perform<F, T>(&self, fut: F, message: fn(T) -> Message)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let _ = sender.send(message(fut.await));
        });
    }
}
