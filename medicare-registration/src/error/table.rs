use super::{AuthKind, DuplicateKind, ValidationReason};

/// Phrases the backend uses when it has nothing specific to say.
pub const GENERIC_PHRASES: [&str; 7] = [
    "something went wrong",
    "internal server error",
    "bad request",
    "conflict",
    "registration failed",
    "verification failed",
    "an error occurred",
];

/// What a recognised backend message means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Duplicate(DuplicateKind),
    Auth(AuthKind),
    Invalid {
        field: String,
        reason: ValidationReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRule {
    /// Every needle must appear in the message.
    pub needles: Vec<String>,
    pub outcome: Outcome,
}

impl MessageRule {
    pub fn new(needles: &[&str], outcome: Outcome) -> Self {
        Self {
            needles: needles.iter().map(|n| fold(n)).collect(),
            outcome,
        }
    }

    fn matches(&self, folded_message: &str) -> bool {
        !self.needles.is_empty()
            && self
                .needles
                .iter()
                .all(|needle| folded_message.contains(needle.as_str()))
    }
}

/// Lookup table of known backend messages, error codes and Laravel phrasings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTable {
    rules: Vec<MessageRule>,
    generic_phrases: Vec<String>,
}

impl MessageTable {
    pub fn new(rules: Vec<MessageRule>, generic_phrases: &[&str]) -> Self {
        Self {
            rules,
            generic_phrases: generic_phrases.iter().map(|p| fold(p)).collect(),
        }
    }

    /// First matching rule wins.
    pub fn classify(&self, message: &str) -> Option<&Outcome> {
        let folded = fold(message);
        self.rules
            .iter()
            .find(|rule| rule.matches(&folded))
            .map(|rule| &rule.outcome)
    }

    pub fn is_generic(&self, message: &str) -> bool {
        let folded = fold(message);
        self.generic_phrases
            .iter()
            .any(|phrase| folded.contains(phrase.as_str()))
    }
}

impl Default for MessageTable {
    fn default() -> Self {
        use DuplicateKind::*;

        let otp = |reason| Outcome::Invalid {
            field: "otp".to_string(),
            reason,
        };

        let rules = vec![
            MessageRule::new(&["email", "already been taken"], Outcome::Duplicate(Email)),
            MessageRule::new(&["email", "already registered"], Outcome::Duplicate(Email)),
            MessageRule::new(&["email", "already exists"], Outcome::Duplicate(Email)),
            MessageRule::new(&["email taken"], Outcome::Duplicate(Email)),
            MessageRule::new(&["email exists"], Outcome::Duplicate(Email)),
            MessageRule::new(&["email unique"], Outcome::Duplicate(Email)),
            MessageRule::new(&["user already exists"], Outcome::Duplicate(Email)),
            MessageRule::new(&["phone", "already been taken"], Outcome::Duplicate(Phone)),
            MessageRule::new(&["phone", "already registered"], Outcome::Duplicate(Phone)),
            MessageRule::new(&["phone taken"], Outcome::Duplicate(Phone)),
            MessageRule::new(&["phone exists"], Outcome::Duplicate(Phone)),
            MessageRule::new(&["phone number unique"], Outcome::Duplicate(Phone)),
            MessageRule::new(&["name", "already been taken"], Outcome::Duplicate(Name)),
            MessageRule::new(&["name", "already registered"], Outcome::Duplicate(Name)),
            MessageRule::new(&["name taken"], Outcome::Duplicate(Name)),
            MessageRule::new(&["name exists"], Outcome::Duplicate(Name)),
            MessageRule::new(&["name unique"], Outcome::Duplicate(Name)),
            MessageRule::new(&["invalid credentials"], Outcome::Auth(AuthKind::InvalidCredentials)),
            MessageRule::new(
                &["credentials are incorrect"],
                Outcome::Auth(AuthKind::InvalidCredentials),
            ),
            MessageRule::new(&["account locked"], Outcome::Auth(AuthKind::AccountLocked)),
            MessageRule::new(&["account has been locked"], Outcome::Auth(AuthKind::AccountLocked)),
            MessageRule::new(&["unauthenticated"], Outcome::Auth(AuthKind::SessionExpired)),
            MessageRule::new(&["otp", "expired"], otp(ValidationReason::Expired)),
            MessageRule::new(&["otp", "invalid"], otp(ValidationReason::Invalid)),
        ];

        Self::new(rules, &GENERIC_PHRASES)
    }
}

/// Lowercases and turns the separators of error codes into spaces, so
/// `email_taken`, `email.unique` and "The email has already been taken." can
/// all be matched with plain words.
fn fold(s: &str) -> String {
    s.to_lowercase().replace(['_', '.'], " ")
}
