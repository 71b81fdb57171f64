use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

const CUSTOMER_LOGIN_URL: &str = "https://app.medicare.my/login";
const VENDOR_LOGIN_URL: &str = "https://vendor.medicare.my/login";
const DOCTOR_LOGIN_URL: &str = "https://doctor.medicare.my/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Nurse,
    Vendor,
    Doctor,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Customer, Role::Nurse, Role::Vendor, Role::Doctor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Nurse => "nurse",
            Role::Vendor => "vendor",
            Role::Doctor => "doctor",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Customer => "Customer",
            Role::Nurse => "Nurse",
            Role::Vendor => "Vendor",
            Role::Doctor => "Doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid role '{}', expected one of customer, nurse, vendor, doctor",
            self.0
        )
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "nurse" => Ok(Role::Nurse),
            "vendor" => Ok(Role::Vendor),
            "doctor" => Ok(Role::Doctor),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// How the flow of one role differs from the others once the email is verified.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct RoleFlow {
    /// Whether the role fills the profile form before succeeding.
    #[serde(default)]
    pub complete_profile: bool,
    /// Where the success screen sends the user. No redirect if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<Url>,
}

/// Flow variant of every role.
///
/// A role table given in the configuration file replaces the whole default row
/// of that role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlowTable {
    pub customer: RoleFlow,
    pub nurse: RoleFlow,
    pub vendor: RoleFlow,
    pub doctor: RoleFlow,
}

impl FlowTable {
    pub fn get(&self, role: Role) -> &RoleFlow {
        match role {
            Role::Customer => &self.customer,
            Role::Nurse => &self.nurse,
            Role::Vendor => &self.vendor,
            Role::Doctor => &self.doctor,
        }
    }
}

impl Default for FlowTable {
    fn default() -> Self {
        Self {
            customer: RoleFlow {
                complete_profile: true,
                redirect_url: Url::parse(CUSTOMER_LOGIN_URL).ok(),
            },
            // Nurses carry on in the mobile application.
            nurse: RoleFlow {
                complete_profile: false,
                redirect_url: None,
            },
            vendor: RoleFlow {
                complete_profile: false,
                redirect_url: Url::parse(VENDOR_LOGIN_URL).ok(),
            },
            doctor: RoleFlow {
                complete_profile: false,
                redirect_url: Url::parse(DOCTOR_LOGIN_URL).ok(),
            },
        }
    }
}
