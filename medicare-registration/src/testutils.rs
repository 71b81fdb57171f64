use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use crate::{
    client::{AuthToken, RegisterRequest, RegistrationApi},
    draft::ProfileSubmission,
    error::ApiErrorCategory,
    role::Role,
};

/// A call received by the [`MockApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Register(RegisterRequest),
    RequestEmailVerification,
    VerifyCode { email: String, code: String },
    CompleteProfile { role: Role, submission: ProfileSubmission },
}

/// Scripted [`RegistrationApi`]. Each operation pops its next result, and
/// succeeds once its script is empty.
#[derive(Debug, Default)]
pub struct MockApi {
    register: Mutex<VecDeque<Result<AuthToken, ApiErrorCategory>>>,
    send_email: Mutex<VecDeque<Result<(), ApiErrorCategory>>>,
    verify: Mutex<VecDeque<Result<(), ApiErrorCategory>>>,
    complete: Mutex<VecDeque<Result<(), ApiErrorCategory>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_register(self, result: Result<AuthToken, ApiErrorCategory>) -> Self {
        self.register.lock().unwrap().push_back(result);
        self
    }

    pub fn with_send_email(self, result: Result<(), ApiErrorCategory>) -> Self {
        self.send_email.lock().unwrap().push_back(result);
        self
    }

    pub fn with_verify(self, result: Result<(), ApiErrorCategory>) -> Self {
        self.verify.lock().unwrap().push_back(result);
        self
    }

    pub fn with_complete(self, result: Result<(), ApiErrorCategory>) -> Self {
        self.complete.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RegistrationApi for MockApi {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthToken, ApiErrorCategory> {
        self.record(Call::Register(request.clone()));
        self.register
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AuthToken::new("mock-token")))
    }

    async fn request_email_verification(&self, _token: &AuthToken) -> Result<(), ApiErrorCategory> {
        self.record(Call::RequestEmailVerification);
        self.send_email.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn verify_code(
        &self,
        email: &str,
        code: &str,
        _token: &AuthToken,
    ) -> Result<(), ApiErrorCategory> {
        self.record(Call::VerifyCode {
            email: email.to_string(),
            code: code.to_string(),
        });
        self.verify.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn complete_profile(
        &self,
        role: Role,
        submission: &ProfileSubmission,
        _token: &AuthToken,
    ) -> Result<(), ApiErrorCategory> {
        self.record(Call::CompleteProfile {
            role,
            submission: submission.clone(),
        });
        self.complete.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}
