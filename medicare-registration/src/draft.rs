use std::{fmt, str::FromStr};

use crate::role::Role;

/// A file picked by the user, handed untouched to the API client.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentSlot {
    ProfilePhoto,
    IdDocument,
}

impl AttachmentSlot {
    /// Name of the multipart part carrying the file.
    pub fn part_name(&self) -> &'static str {
        match self {
            Self::ProfilePhoto => "profile_photo",
            Self::IdDocument => "id_document",
        }
    }
}

impl fmt::Display for AttachmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProfilePhoto => write!(f, "profile photo"),
            Self::IdDocument => write!(f, "ID document"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdType {
    #[default]
    Nric,
    Passport,
}

impl IdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nric => "nric",
            Self::Passport => "passport",
        }
    }
}

impl FromStr for IdType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nric" => Ok(Self::Nric),
            "passport" => Ok(Self::Passport),
            _ => Err(()),
        }
    }
}

/// Editable text fields of the profile completion form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    DateOfBirth,
    Gender,
    IdType,
    IdNumber,
    Nationality,
    Address,
    Postcode,
    State,
    City,
}

/// Details collected after the email is verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDetails {
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub gender: Gender,
    pub id_type: IdType,
    pub id_number: Option<String>,
    pub nationality: String,
    pub address: String,
    pub postcode: String,
    pub state: String,
    pub city: String,
    pub profile_photo: Option<Attachment>,
    pub id_document: Option<Attachment>,
}

impl Default for ProfileDetails {
    fn default() -> Self {
        Self {
            date_of_birth: String::new(),
            gender: Gender::default(),
            id_type: IdType::default(),
            id_number: None,
            nationality: "MY".to_string(),
            address: String::new(),
            postcode: String::new(),
            state: String::new(),
            city: String::new(),
            profile_photo: None,
            id_document: None,
        }
    }
}

impl ProfileDetails {
    /// Returns false if the value does not fit the field, leaving it unchanged.
    pub fn set(&mut self, field: ProfileField, value: String) -> bool {
        match field {
            ProfileField::DateOfBirth => self.date_of_birth = value,
            ProfileField::Gender => match Gender::from_str(&value) {
                Ok(gender) => self.gender = gender,
                Err(()) => return false,
            },
            ProfileField::IdType => match IdType::from_str(&value) {
                Ok(id_type) => self.id_type = id_type,
                Err(()) => return false,
            },
            ProfileField::IdNumber => {
                self.id_number = (!value.trim().is_empty()).then_some(value);
            }
            ProfileField::Nationality => self.nationality = value,
            ProfileField::Address => self.address = value,
            ProfileField::Postcode => self.postcode = value,
            ProfileField::State => {
                // The city list depends on the state.
                if self.state != value {
                    self.city.clear();
                }
                self.state = value;
            }
            ProfileField::City => self.city = value,
        }
        true
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> Option<&Attachment> {
        match slot {
            AttachmentSlot::ProfilePhoto => self.profile_photo.as_ref(),
            AttachmentSlot::IdDocument => self.id_document.as_ref(),
        }
    }

    pub fn set_attachment(&mut self, slot: AttachmentSlot, attachment: Option<Attachment>) {
        match slot {
            AttachmentSlot::ProfilePhoto => self.profile_photo = attachment,
            AttachmentSlot::IdDocument => self.id_document = attachment,
        }
    }
}

/// Everything the user entered for one registration attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationDraft {
    pub role: Role,
    pub full_name: String,
    pub email: String,
    /// Digits only, country code included.
    pub phone_number: String,
    pub password: String,
    pub confirm_password: String,
    pub agreement_accepted: bool,
    pub profile: ProfileDetails,
}

impl RegistrationDraft {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            full_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            password: String::new(),
            confirm_password: String::new(),
            agreement_accepted: false,
            profile: ProfileDetails::default(),
        }
    }
}

impl fmt::Debug for RegistrationDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationDraft")
            .field("role", &self.role)
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("password", &"REDACTED")
            .field("confirm_password", &"REDACTED")
            .field("agreement_accepted", &self.agreement_accepted)
            .field("profile", &self.profile)
            .finish()
    }
}

/// Data sent to the profile completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSubmission {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub profile: ProfileDetails,
}

impl From<&RegistrationDraft> for ProfileSubmission {
    fn from(draft: &RegistrationDraft) -> Self {
        Self {
            full_name: draft.full_name.clone(),
            email: draft.email.clone(),
            phone_number: draft.phone_number.clone(),
            profile: draft.profile.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changing_state_clears_city() {
        let mut profile = ProfileDetails::default();
        assert!(profile.set(ProfileField::State, "Selangor".to_string()));
        assert!(profile.set(ProfileField::City, "Shah Alam".to_string()));
        assert_eq!(profile.city, "Shah Alam");

        // Same state again keeps the city.
        assert!(profile.set(ProfileField::State, "Selangor".to_string()));
        assert_eq!(profile.city, "Shah Alam");

        assert!(profile.set(ProfileField::State, "Kuala Lumpur".to_string()));
        assert!(profile.city.is_empty());
    }

    #[test]
    fn enumerated_profile_fields() {
        let mut profile = ProfileDetails::default();
        assert_eq!(profile.gender, Gender::Male);
        assert_eq!(profile.id_type, IdType::Nric);

        assert!(profile.set(ProfileField::Gender, "Female".to_string()));
        assert_eq!(profile.gender, Gender::Female);
        assert!(!profile.set(ProfileField::Gender, "other".to_string()));
        assert_eq!(profile.gender, Gender::Female);

        assert!(profile.set(ProfileField::IdType, "passport".to_string()));
        assert_eq!(profile.id_type, IdType::Passport);

        assert!(profile.set(ProfileField::IdNumber, "  ".to_string()));
        assert_eq!(profile.id_number, None);
        assert!(profile.set(ProfileField::IdNumber, "A1234567".to_string()));
        assert_eq!(profile.id_number.as_deref(), Some("A1234567"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut draft = RegistrationDraft::new(Role::Customer);
        draft.password = "Secr3t!pass".to_string();
        draft.confirm_password = "Secr3t!pass".to_string();
        draft.profile.profile_photo =
            Some(Attachment::new("me.png", "image/png", vec![0x89, 0x50, 0x4e]));

        let output = format!("{:?}", draft);
        assert!(!output.contains("Secr3t!pass"));
        assert!(output.contains("REDACTED"));
        assert!(output.contains("len: 3"));
        assert!(!output.contains("137"));
    }
}
