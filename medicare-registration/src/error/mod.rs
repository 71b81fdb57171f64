//! Normalization of backend failures into [`ApiErrorCategory`].
//!
//! The registration backend answers failures in several shapes: a Laravel
//! style `errors` map keyed by field, a flat `message`, a bare `error` code,
//! or nothing useful at all. The presentation layer only ever sees one of the
//! categories below, while the specific backend wording is kept whenever the
//! backend gave one.

mod table;

pub use table::{MessageRule, MessageTable, Outcome, GENERIC_PHRASES};

use std::{fmt, sync::Arc};

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    Invalid,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    Email,
    Name,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// 401 without anything more specific.
    Rejected,
    InvalidCredentials,
    SessionExpired,
    AccountLocked,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Internal,
    RateLimited,
}

const GENERIC_BAD_REQUEST: &str = "Invalid request. Please check your input.";
const GENERIC_UNPROCESSABLE: &str = "Validation failed. Please check your input.";
const GENERIC_NOT_FOUND: &str = "The requested resource was not found.";
const GENERIC_UNKNOWN: &str = "An error occurred. Please try again.";

/// Failure of a remote operation, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCategory {
    Validation {
        field: Option<String>,
        reason: Option<ValidationReason>,
        message: String,
    },
    DuplicateResource {
        kind: Option<DuplicateKind>,
    },
    Auth {
        kind: AuthKind,
    },
    Network,
    Server {
        kind: ServerKind,
    },
    Unknown {
        message: String,
    },
}

impl ApiErrorCategory {
    /// Form field the error relates to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            Self::DuplicateResource {
                kind: Some(DuplicateKind::Email),
            } => Some("email"),
            Self::DuplicateResource {
                kind: Some(DuplicateKind::Name),
            } => Some("full_name"),
            Self::DuplicateResource {
                kind: Some(DuplicateKind::Phone),
            } => Some("phone_number"),
            _ => None,
        }
    }
}

impl fmt::Display for ApiErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Validation {
                reason: Some(ValidationReason::Expired),
                ..
            } => write!(f, "OTP code has expired. Please request a new one"),
            Self::Validation {
                field,
                reason: Some(ValidationReason::Invalid),
                ..
            } if field.as_deref() == Some("otp") => {
                write!(f, "Invalid OTP code. Please check and try again")
            }
            Self::Validation { message, .. } => write!(f, "{}", message),
            Self::DuplicateResource { kind } => match kind {
                Some(DuplicateKind::Email) => write!(
                    f,
                    "This email is already registered. Please use a different email or login"
                ),
                Some(DuplicateKind::Name) => write!(
                    f,
                    "This name is already taken. Please choose a different name"
                ),
                Some(DuplicateKind::Phone) => {
                    write!(f, "This phone number is already registered")
                }
                None => write!(
                    f,
                    "This email or name is already registered. Please use different credentials."
                ),
            },
            Self::Auth { kind } => match kind {
                AuthKind::Rejected => write!(f, "Authentication failed. Please login again."),
                AuthKind::InvalidCredentials => write!(f, "Invalid email or password"),
                AuthKind::SessionExpired => {
                    write!(f, "Your session has expired. Please login again")
                }
                AuthKind::AccountLocked => write!(
                    f,
                    "Your account has been locked. Please contact support"
                ),
                AuthKind::Forbidden => write!(
                    f,
                    "You do not have permission to perform this action."
                ),
            },
            Self::Network => write!(
                f,
                "Network error. Please check your internet connection."
            ),
            Self::Server { kind } => match kind {
                ServerKind::Internal => write!(f, "Server error. Please try again later."),
                ServerKind::RateLimited => write!(
                    f,
                    "Too many requests. Please wait a moment and try again."
                ),
            },
            Self::Unknown { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ApiErrorCategory {}

/// A failure as the API client observed it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawApiError {
    /// The server answered with a non-success status.
    Response { status: u16, body: String },
    /// No response was received at all.
    Transport(String),
    /// A plain message, for instance from a success body reporting a failure.
    Message(String),
    Other(String),
}

impl From<reqwest::Error> for RawApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_builder() || e.is_body() {
            Self::Other(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Response {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<crate::http::NotSuccessResponseInfo> for RawApiError {
    fn from(info: crate::http::NotSuccessResponseInfo) -> Self {
        Self::Response {
            status: info.status_code,
            body: info.text,
        }
    }
}

/// Error body of the registration backend.
#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorPayload {
    /// First field and first message of the `errors` entry, in the order the
    /// backend sent them.
    fn first_field_error(&self) -> Option<(Option<String>, String)> {
        match self.errors.as_ref()? {
            Value::Object(map) => {
                let (field, messages) = map.iter().next()?;
                let message = match messages {
                    Value::String(s) => s.clone(),
                    Value::Array(list) => list.first()?.as_str()?.to_string(),
                    _ => return None,
                };
                Some((Some(field.clone()), message))
            }
            Value::Array(list) => {
                let first = list.first()?;
                let message = match first {
                    Value::String(s) => s.clone(),
                    Value::Object(obj) => obj
                        .get("message")
                        .or_else(|| obj.get("msg"))
                        .and_then(Value::as_str)?
                        .to_string(),
                    _ => return None,
                };
                Some((None, message))
            }
            _ => None,
        }
    }
}

/// Maps raw failures to categories using an injected [`MessageTable`].
#[derive(Debug, Clone, Default)]
pub struct ErrorNormalizer {
    table: Arc<MessageTable>,
}

impl ErrorNormalizer {
    pub fn new(table: Arc<MessageTable>) -> Self {
        Self { table }
    }

    pub fn normalize(&self, raw: RawApiError) -> ApiErrorCategory {
        match raw {
            RawApiError::Response { status, body } => self.normalize_response(status, &body),
            RawApiError::Transport(e) => {
                tracing::debug!("No response received: {}", e);
                ApiErrorCategory::Network
            }
            RawApiError::Message(message) => {
                if let Some(category) = self.classify(&message) {
                    category
                } else if self.table.is_generic(&message) {
                    ApiErrorCategory::Unknown {
                        message: GENERIC_UNKNOWN.to_string(),
                    }
                } else {
                    ApiErrorCategory::Unknown { message }
                }
            }
            RawApiError::Other(description) => ApiErrorCategory::Unknown {
                message: description,
            },
        }
    }

    fn normalize_response(&self, status: u16, body: &str) -> ApiErrorCategory {
        // A body that is not the expected JSON (an HTML error page from a proxy
        // for instance) carries nothing we want to show.
        let payload: ErrorPayload = serde_json::from_str(body).unwrap_or_default();

        if let Some((field, message)) = payload.first_field_error() {
            return self
                .classify(&message)
                .unwrap_or(ApiErrorCategory::Validation {
                    field,
                    reason: None,
                    message,
                });
        }

        // A known `message` or `error` code wins, then the first backend text
        // that is not a generic phrase.
        let candidates: Vec<&String> = payload
            .message
            .iter()
            .chain(payload.error.iter())
            .filter(|m| !m.trim().is_empty())
            .collect();

        if let Some(category) = candidates.iter().find_map(|m| self.classify(m)) {
            return category;
        }

        if let Some(message) = candidates.into_iter().find(|m| !self.table.is_generic(m)) {
            return match status_fallback(status) {
                ApiErrorCategory::Validation { field, reason, .. } => ApiErrorCategory::Validation {
                    field,
                    reason,
                    message: message.clone(),
                },
                ApiErrorCategory::Unknown { .. } => ApiErrorCategory::Unknown {
                    message: message.clone(),
                },
                category => category,
            };
        }

        status_fallback(status)
    }

    fn classify(&self, message: &str) -> Option<ApiErrorCategory> {
        self.table.classify(message).map(|outcome| match outcome {
            Outcome::Duplicate(kind) => ApiErrorCategory::DuplicateResource { kind: Some(*kind) },
            Outcome::Auth(kind) => ApiErrorCategory::Auth { kind: *kind },
            Outcome::Invalid { field, reason } => ApiErrorCategory::Validation {
                field: Some(field.clone()),
                reason: Some(*reason),
                message: message.to_string(),
            },
        })
    }
}

fn status_fallback(status: u16) -> ApiErrorCategory {
    match status {
        400 => ApiErrorCategory::Validation {
            field: None,
            reason: None,
            message: GENERIC_BAD_REQUEST.to_string(),
        },
        401 => ApiErrorCategory::Auth {
            kind: AuthKind::Rejected,
        },
        403 => ApiErrorCategory::Auth {
            kind: AuthKind::Forbidden,
        },
        404 => ApiErrorCategory::Unknown {
            message: GENERIC_NOT_FOUND.to_string(),
        },
        409 => ApiErrorCategory::DuplicateResource { kind: None },
        422 => ApiErrorCategory::Validation {
            field: None,
            reason: None,
            message: GENERIC_UNPROCESSABLE.to_string(),
        },
        429 => ApiErrorCategory::Server {
            kind: ServerKind::RateLimited,
        },
        500..=599 => ApiErrorCategory::Server {
            kind: ServerKind::Internal,
        },
        _ => ApiErrorCategory::Unknown {
            message: GENERIC_UNKNOWN.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: serde_json::Value) -> RawApiError {
        RawApiError::Response {
            status,
            body: body.to_string(),
        }
    }

    fn normalize(raw: RawApiError) -> ApiErrorCategory {
        ErrorNormalizer::default().normalize(raw)
    }

    #[test]
    fn duplicate_email_message() {
        let category = normalize(response(
            409,
            serde_json::json!({"message": "The email has already been taken."}),
        ));
        assert_eq!(
            category,
            ApiErrorCategory::DuplicateResource {
                kind: Some(DuplicateKind::Email)
            }
        );
        assert_eq!(category.field(), Some("email"));
    }

    #[test]
    fn field_errors_keep_backend_wording() {
        let category = normalize(response(
            422,
            serde_json::json!({
                "message": "The given data was invalid.",
                "errors": {"email": ["The email must be a valid email address."]}
            }),
        ));
        assert_eq!(
            category,
            ApiErrorCategory::Validation {
                field: Some("email".to_string()),
                reason: None,
                message: "The email must be a valid email address.".to_string(),
            }
        );
        assert_eq!(
            category.to_string(),
            "The email must be a valid email address."
        );
    }

    #[test]
    fn first_field_in_backend_order() {
        // Neither alphabetical nor by length: the backend order must win.
        let body = r#"{"errors": {"phone_number": ["The phone number has already been taken."], "email": ["The email has already been taken."]}}"#;
        let category = normalize(RawApiError::Response {
            status: 422,
            body: body.to_string(),
        });
        assert_eq!(
            category,
            ApiErrorCategory::DuplicateResource {
                kind: Some(DuplicateKind::Phone)
            }
        );

        let category = normalize(response(
            422,
            serde_json::json!({"errors": {"postcode": "The postcode must be 5 digits."}}),
        ));
        assert_eq!(
            category,
            ApiErrorCategory::Validation {
                field: Some("postcode".to_string()),
                reason: None,
                message: "The postcode must be 5 digits.".to_string(),
            }
        );
    }

    #[test]
    fn field_errors_as_a_list() {
        let category = normalize(response(
            400,
            serde_json::json!({"errors": [{"msg": "The OTP has expired."}, "ignored"]}),
        ));
        assert_eq!(
            category,
            ApiErrorCategory::Validation {
                field: Some("otp".to_string()),
                reason: Some(ValidationReason::Expired),
                message: "The OTP has expired.".to_string(),
            }
        );
        assert_eq!(
            category.to_string(),
            "OTP code has expired. Please request a new one"
        );
    }

    #[test]
    fn otp_messages() {
        let category = normalize(response(
            400,
            serde_json::json!({"message": "The provided OTP is invalid."}),
        ));
        assert_eq!(
            category,
            ApiErrorCategory::Validation {
                field: Some("otp".to_string()),
                reason: Some(ValidationReason::Invalid),
                message: "The provided OTP is invalid.".to_string(),
            }
        );
        assert_eq!(
            category.to_string(),
            "Invalid OTP code. Please check and try again"
        );
    }

    #[test]
    fn error_code_is_classified() {
        assert_eq!(
            normalize(response(401, serde_json::json!({"error": "invalid_credentials"}))),
            ApiErrorCategory::Auth {
                kind: AuthKind::InvalidCredentials
            }
        );
        assert_eq!(
            normalize(response(409, serde_json::json!({"error": "phone_taken"}))),
            ApiErrorCategory::DuplicateResource {
                kind: Some(DuplicateKind::Phone)
            }
        );
    }

    #[test]
    fn error_code_behind_a_generic_message() {
        assert_eq!(
            normalize(response(
                400,
                serde_json::json!({"message": "Registration failed", "error": "email_taken"})
            )),
            ApiErrorCategory::DuplicateResource {
                kind: Some(DuplicateKind::Email)
            }
        );
        // An unknown code is still better than the generic message.
        assert_eq!(
            normalize(response(
                400,
                serde_json::json!({"message": "Something went wrong", "error": "Clinic code unknown"})
            )),
            ApiErrorCategory::Validation {
                field: None,
                reason: None,
                message: "Clinic code unknown".to_string(),
            }
        );
    }

    #[test]
    fn plain_messages() {
        assert_eq!(
            normalize(RawApiError::Message("Registration failed".to_string())),
            ApiErrorCategory::Unknown {
                message: GENERIC_UNKNOWN.to_string()
            }
        );
        assert_eq!(
            normalize(RawApiError::Message("Clinic is closed".to_string())),
            ApiErrorCategory::Unknown {
                message: "Clinic is closed".to_string()
            }
        );
    }

    #[test]
    fn generic_messages_fall_back_on_status() {
        assert_eq!(
            normalize(response(409, serde_json::json!({"message": "Conflict"}))),
            ApiErrorCategory::DuplicateResource { kind: None }
        );
        assert_eq!(
            normalize(response(
                500,
                serde_json::json!({"message": "Something went wrong"})
            )),
            ApiErrorCategory::Server {
                kind: ServerKind::Internal
            }
        );
        assert_eq!(
            normalize(response(
                400,
                serde_json::json!({"message": "Registration failed"})
            )),
            ApiErrorCategory::Validation {
                field: None,
                reason: None,
                message: GENERIC_BAD_REQUEST.to_string(),
            }
        );
    }

    #[test]
    fn specific_unmatched_messages_are_preserved() {
        assert_eq!(
            normalize(response(
                400,
                serde_json::json!({"message": "Postcode does not belong to the state."})
            )),
            ApiErrorCategory::Validation {
                field: None,
                reason: None,
                message: "Postcode does not belong to the state.".to_string(),
            }
        );
        assert_eq!(
            normalize(response(
                418,
                serde_json::json!({"message": "Registrations are paused."})
            )),
            ApiErrorCategory::Unknown {
                message: "Registrations are paused.".to_string(),
            }
        );
        // Categories without a message slot keep the status meaning.
        assert_eq!(
            normalize(response(
                429,
                serde_json::json!({"message": "Slow down, please."})
            )),
            ApiErrorCategory::Server {
                kind: ServerKind::RateLimited
            }
        );
    }

    #[test]
    fn status_fallback_table() {
        let cases = [
            (401, ApiErrorCategory::Auth { kind: AuthKind::Rejected }),
            (403, ApiErrorCategory::Auth { kind: AuthKind::Forbidden }),
            (
                404,
                ApiErrorCategory::Unknown {
                    message: GENERIC_NOT_FOUND.to_string(),
                },
            ),
            (409, ApiErrorCategory::DuplicateResource { kind: None }),
            (
                422,
                ApiErrorCategory::Validation {
                    field: None,
                    reason: None,
                    message: GENERIC_UNPROCESSABLE.to_string(),
                },
            ),
            (
                429,
                ApiErrorCategory::Server {
                    kind: ServerKind::RateLimited,
                },
            ),
            (
                503,
                ApiErrorCategory::Server {
                    kind: ServerKind::Internal,
                },
            ),
            (
                302,
                ApiErrorCategory::Unknown {
                    message: GENERIC_UNKNOWN.to_string(),
                },
            ),
        ];
        for (status, expected) in cases {
            // An HTML page from a reverse proxy is not an error payload.
            let raw = RawApiError::Response {
                status,
                body: "<html><body>Bad Gateway</body></html>".to_string(),
            };
            assert_eq!(normalize(raw), expected, "status {}", status);
        }
    }

    #[test]
    fn transport_and_other_failures() {
        assert_eq!(
            normalize(RawApiError::Transport("connection refused".to_string())),
            ApiErrorCategory::Network
        );
        assert_eq!(
            normalize(RawApiError::Other("expected value at line 1".to_string())),
            ApiErrorCategory::Unknown {
                message: "expected value at line 1".to_string()
            }
        );
        assert_eq!(
            normalize(RawApiError::Message("otp_invalid".to_string())),
            ApiErrorCategory::Validation {
                field: Some("otp".to_string()),
                reason: Some(ValidationReason::Invalid),
                message: "otp_invalid".to_string(),
            }
        );
        assert_eq!(
            normalize(RawApiError::Message("Try again tomorrow".to_string())),
            ApiErrorCategory::Unknown {
                message: "Try again tomorrow".to_string()
            }
        );
    }

    #[test]
    fn injected_table_replaces_builtin_phrases() {
        let table = MessageTable::new(
            vec![MessageRule::new(
                &["ic number", "used"],
                Outcome::Duplicate(DuplicateKind::Name),
            )],
            &[],
        );
        let normalizer = ErrorNormalizer::new(Arc::new(table));
        assert_eq!(
            normalizer.normalize(RawApiError::Message("IC number already used".to_string())),
            ApiErrorCategory::DuplicateResource {
                kind: Some(DuplicateKind::Name)
            }
        );
        // Without the built-in rules the taken email keeps the backend wording.
        assert_eq!(
            normalizer.normalize(RawApiError::Response {
                status: 400,
                body: r#"{"message": "The email has already been taken."}"#.to_string(),
            }),
            ApiErrorCategory::Validation {
                field: None,
                reason: None,
                message: "The email has already been taken.".to_string(),
            }
        );
    }
}
