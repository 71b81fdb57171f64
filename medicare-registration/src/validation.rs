//! Checks run on the user's input before any step reaches the network.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::draft::{AttachmentSlot, ProfileDetails, RegistrationDraft};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

// E.164 numbers carry at most 15 digits, country code included.
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Password must contain uppercase, lowercase, number, and special character")]
    PasswordTooWeak,
    #[error("Passwords do not match. Please check and try again")]
    PasswordMismatch,
    #[error("Please enter a valid phone number")]
    InvalidPhone,
    #[error("Please accept the Terms of Service")]
    AgreementNotAccepted,
    #[error("This field is required")]
    Required(&'static str),
    #[error("Please enter a valid date of birth")]
    InvalidDateOfBirth,
    #[error("Please upload your {0}")]
    MissingAttachment(AttachmentSlot),
    #[error("Please enter the 6-digit code sent to your email")]
    IncompleteOtp,
}

impl ValidationError {
    /// Form field the error should be displayed next to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "email",
            Self::PasswordTooShort | Self::PasswordTooWeak => "password",
            Self::PasswordMismatch => "confirm_password",
            Self::InvalidPhone => "phone_number",
            Self::AgreementNotAccepted => "agreement",
            Self::Required(field) => field,
            Self::InvalidDateOfBirth => "date_of_birth",
            Self::MissingAttachment(slot) => slot.part_name(),
            Self::IncompleteOtp => "otp",
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Valid email pattern"))
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email_regex().is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// The length is checked before the composition, so a short and weak password
/// is only reported as too short.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARACTERS.contains(c));

    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(ValidationError::PasswordTooWeak);
    }

    Ok(())
}

pub fn validate_passwords_match(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Strips the leading `+`, spaces, dashes and any other separator.
pub fn normalize_phone_digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Returns the digits to store and transmit.
pub fn validate_phone_digits(phone: &str) -> Result<String, ValidationError> {
    let digits = normalize_phone_digits(phone);
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(digits)
}

/// International notation of a stored phone number.
pub fn format_phone_for_display(digits: &str) -> String {
    format!("+{}", digits)
}

pub fn validate_required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}

pub fn validate_date_of_birth(value: &str, today: NaiveDate) -> Result<(), ValidationError> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDateOfBirth)?;
    if date >= today {
        return Err(ValidationError::InvalidDateOfBirth);
    }
    Ok(())
}

/// Checks run before the registration form is submitted. The email is
/// checked as it will be sent, without surrounding whitespace.
pub fn validate_registration(draft: &RegistrationDraft) -> Result<(), ValidationError> {
    validate_required("full_name", &draft.full_name)?;
    validate_email(draft.email.trim())?;
    validate_phone_digits(&draft.phone_number)?;
    validate_password_strength(&draft.password)?;
    validate_passwords_match(&draft.password, &draft.confirm_password)?;
    if !draft.agreement_accepted {
        return Err(ValidationError::AgreementNotAccepted);
    }
    Ok(())
}

/// Checks run before the profile completion form is submitted.
pub fn validate_profile(profile: &ProfileDetails, today: NaiveDate) -> Result<(), ValidationError> {
    validate_date_of_birth(&profile.date_of_birth, today)?;
    validate_required("nationality", &profile.nationality)?;
    validate_required("address", &profile.address)?;
    validate_required("postcode", &profile.postcode)?;
    validate_required("state", &profile.state)?;
    validate_required("city", &profile.city)?;
    for slot in [AttachmentSlot::ProfilePhoto, AttachmentSlot::IdDocument] {
        if profile.attachment(slot).is_none() {
            return Err(ValidationError::MissingAttachment(slot));
        }
    }
    Ok(())
}
