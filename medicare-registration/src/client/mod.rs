pub mod api;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header,
    multipart::{Form, Part},
    Method, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;

pub use api::{AuthToken, RegisterRequest};
use api::{
    CompleteRegistrationResponse, RegisterResponse, VerifyEmailRequest, VerifyEmailResponse,
};

use crate::{
    draft::{AttachmentSlot, ProfileSubmission},
    error::{ApiErrorCategory, ErrorNormalizer, RawApiError},
    http::ResponseExt,
    role::Role,
};

/// Error code used when a verification answer says "not verified" without
/// telling why.
const OTP_INVALID: &str = "otp_invalid";
const PROFILE_REJECTED: &str = "Your profile could not be saved. Please review it and try again.";

/// The remote registration backend, as seen by the flow controller.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthToken, ApiErrorCategory>;

    /// Asks the backend to (re)send the OTP to the registered email.
    async fn request_email_verification(&self, token: &AuthToken) -> Result<(), ApiErrorCategory>;

    async fn verify_code(
        &self,
        email: &str,
        code: &str,
        token: &AuthToken,
    ) -> Result<(), ApiErrorCategory>;

    async fn complete_profile(
        &self,
        role: Role,
        submission: &ProfileSubmission,
        token: &AuthToken,
    ) -> Result<(), ApiErrorCategory>;
}

#[derive(Debug, Clone)]
pub struct RegistrationClient {
    http: reqwest::Client,
    api_url: String,
    normalizer: ErrorNormalizer,
}

impl RegistrationClient {
    pub fn new(
        api_url: &str,
        timeout: Duration,
        normalizer: ErrorNormalizer,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            normalizer,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&AuthToken>) -> RequestBuilder {
        let url = format!("{}/{}", self.api_url, path);
        tracing::debug!("Registration API request: {} {}", method, url);
        let builder = self
            .http
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        match token {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        }
    }

    fn fail(&self, operation: &str, raw: RawApiError) -> ApiErrorCategory {
        tracing::debug!("{} failed: {:?}", operation, raw);
        self.normalizer.normalize(raw)
    }

    async fn try_register(&self, request: &RegisterRequest) -> Result<AuthToken, RawApiError> {
        let mut request = request.clone();
        request.phone_number = crate::validation::normalize_phone_digits(&request.phone_number);

        let response = self
            .request(Method::POST, "auth/register", None)
            .json(&request)
            .send()
            .await?
            .check_success()
            .await?;
        let body: RegisterResponse = response.json().await?;
        Ok(AuthToken::new(body.token))
    }

    async fn try_request_email_verification(&self, token: &AuthToken) -> Result<(), RawApiError> {
        self.request(Method::GET, "auth/send-email", Some(token))
            .send()
            .await?
            .check_success()
            .await?;
        Ok(())
    }

    async fn try_verify_code(
        &self,
        email: &str,
        code: &str,
        token: &AuthToken,
    ) -> Result<(), RawApiError> {
        let response = self
            .request(Method::POST, "auth/verify-email", Some(token))
            .json(&VerifyEmailRequest { email, otp: code })
            .send()
            .await?
            .check_success()
            .await?;
        let body: VerifyEmailResponse = lenient_body(response).await?;
        if body.verified == Some(false) {
            return Err(RawApiError::Message(
                body.message.unwrap_or_else(|| OTP_INVALID.to_string()),
            ));
        }
        Ok(())
    }

    async fn try_complete_profile(
        &self,
        role: Role,
        submission: &ProfileSubmission,
        token: &AuthToken,
    ) -> Result<(), RawApiError> {
        let form = profile_form(submission)?;
        let response = self
            .request(
                Method::POST,
                &format!("{}/complete-registration", role.as_str()),
                Some(token),
            )
            .multipart(form)
            .send()
            .await?
            .check_success()
            .await?;
        let body: CompleteRegistrationResponse = lenient_body(response).await?;
        if body.success == Some(false) {
            return Err(RawApiError::Message(
                body.message.unwrap_or_else(|| PROFILE_REJECTED.to_string()),
            ));
        }
        Ok(())
    }
}

/// Success bodies of these endpoints may be empty.
async fn lenient_body<T: DeserializeOwned + Default>(response: Response) -> Result<T, RawApiError> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&text).map_err(|e| RawApiError::Other(e.to_string()))
}

fn profile_form(submission: &ProfileSubmission) -> Result<Form, RawApiError> {
    let profile = &submission.profile;
    let mut form = Form::new()
        .text("full_name", submission.full_name.clone())
        .text("email", submission.email.clone())
        .text("phone_number", submission.phone_number.clone())
        .text("date_of_birth", profile.date_of_birth.clone())
        .text("gender", profile.gender.as_str())
        .text("id_type", profile.id_type.as_str());
    if let Some(id_number) = &profile.id_number {
        form = form.text("id_number", id_number.clone());
    }
    form = form
        .text("nationality", profile.nationality.clone())
        .text("address", profile.address.clone())
        .text("postcode", profile.postcode.clone())
        .text("state", profile.state.clone())
        .text("city", profile.city.clone());

    for slot in [AttachmentSlot::ProfilePhoto, AttachmentSlot::IdDocument] {
        if let Some(attachment) = profile.attachment(slot) {
            let part = Part::bytes(attachment.bytes.clone())
                .file_name(attachment.file_name.clone())
                .mime_str(&attachment.content_type)?;
            form = form.part(slot.part_name(), part);
        }
    }
    Ok(form)
}

#[async_trait]
impl RegistrationApi for RegistrationClient {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthToken, ApiErrorCategory> {
        self.try_register(request)
            .await
            .map_err(|e| self.fail("register", e))
    }

    async fn request_email_verification(&self, token: &AuthToken) -> Result<(), ApiErrorCategory> {
        self.try_request_email_verification(token)
            .await
            .map_err(|e| self.fail("request_email_verification", e))
    }

    async fn verify_code(
        &self,
        email: &str,
        code: &str,
        token: &AuthToken,
    ) -> Result<(), ApiErrorCategory> {
        self.try_verify_code(email, code, token)
            .await
            .map_err(|e| self.fail("verify_code", e))
    }

    async fn complete_profile(
        &self,
        role: Role,
        submission: &ProfileSubmission,
        token: &AuthToken,
    ) -> Result<(), ApiErrorCategory> {
        self.try_complete_profile(role, submission, token)
            .await
            .map_err(|e| self.fail("complete_profile", e))
    }
}
