use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{draft::RegistrationDraft, role::Role, validation::normalize_phone_digits};

/// Bearer token handed out by the register endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(REDACTED)")
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Digits only, without the leading `+`.
    pub phone_number: String,
    pub role: Role,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("phone_number", &self.phone_number)
            .field("role", &self.role)
            .finish()
    }
}

impl From<&RegistrationDraft> for RegisterRequest {
    fn from(draft: &RegistrationDraft) -> Self {
        Self {
            email: draft.email.trim().to_string(),
            password: draft.password.clone(),
            name: draft.full_name.trim().to_string(),
            phone_number: normalize_phone_digits(&draft.phone_number),
            role: draft.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(alias = "access_token")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyEmailRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyEmailResponse {
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteRegistrationResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}
