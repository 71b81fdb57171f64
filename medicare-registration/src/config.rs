use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::{
    flow::{FlowSettings, DEFAULT_OTP_COUNTDOWN_SECS, DEFAULT_REDIRECT_DELAY},
    role::{FlowTable, Role},
};

pub const CONFIG_FILE_NAME: &str = "medicare.toml";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn deserialize_fromstr<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let string = String::deserialize(deserializer)?;
    T::from_str(&string)
        .map_err(|e| de::Error::custom(format!("Error parsing '{}': {}", string, e)))
}

pub fn serialize_to_string<T: std::fmt::Display, S: Serializer>(
    field: T,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.serialize_str(&field.to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

pub fn serialize_duration<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_secs())
}

fn default_loglevel() -> LevelFilter {
    LevelFilter::INFO
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_otp_countdown() -> u32 {
    DEFAULT_OTP_COUNTDOWN_SECS
}

fn default_redirect_delay() -> Duration {
    DEFAULT_REDIRECT_DELAY
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the registration API, e.g. `https://api.medicare.my/api`
    pub api_url: Url,
    /// What messages to log
    #[serde(
        deserialize_with = "deserialize_fromstr",
        serialize_with = "serialize_to_string",
        default = "default_loglevel"
    )]
    pub log_level: LevelFilter,
    /// Also write the logs to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration",
        default = "default_request_timeout"
    )]
    pub request_timeout_secs: Duration,
    #[serde(default = "default_otp_countdown")]
    pub otp_countdown_secs: u32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration",
        default = "default_redirect_delay"
    )]
    pub redirect_delay_secs: Duration,
    /// Per-role overrides of the flow variants
    #[serde(default)]
    pub flows: FlowTable,
}

#[derive(PartialEq, Eq, Debug)]
pub enum ConfigError {
    DatadirNotFound,
    FileNotFound,
    ReadingFile(String),
    Unexpected(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self {
            Self::DatadirNotFound => write!(f, "Could not locate the configuration directory."),
            Self::FileNotFound => write!(f, "Could not locate the configuration file."),
            Self::ReadingFile(e) => write!(f, "Failed to read configuration file: {}", e),
            Self::Unexpected(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound,
            _ => Self::ReadingFile(e.to_string()),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Get the absolute path to the MediCare configuration folder.
///
/// It's a "MediCare/" directory in the XDG standard configuration directory.
pub fn config_folder_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push("MediCare");
        path
    })
}

fn config_file_path() -> Option<PathBuf> {
    config_folder_path().map(|mut path| {
        path.push(CONFIG_FILE_NAME);
        path
    })
}

fn check_scheme(what: &str, url: &Url) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Unexpected(format!(
            "{} must be an http(s) URL, got scheme '{}'",
            what, scheme
        ))),
    }
}

impl Config {
    pub fn from_file(custom_path: Option<PathBuf>) -> Result<Config, ConfigError> {
        let config_file = match custom_path {
            Some(path) => path,
            None => config_file_path().ok_or(ConfigError::DatadirNotFound)?,
        };

        let content = std::fs::read_to_string(config_file)?;
        let config = toml::from_str::<Config>(&content)
            .map_err(|e| ConfigError::ReadingFile(format!("Parsing configuration file: {}", e)))?;
        config.check()?;

        Ok(config)
    }

    /// Make sure the settings are sane.
    pub fn check(&self) -> Result<(), ConfigError> {
        check_scheme("api_url", &self.api_url)?;
        if self.otp_countdown_secs == 0 {
            return Err(ConfigError::Unexpected(
                "otp_countdown_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs.is_zero() {
            return Err(ConfigError::Unexpected(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        for role in Role::ALL {
            if let Some(url) = &self.flows.get(role).redirect_url {
                check_scheme(&format!("flows.{}.redirect_url", role), url)?;
            }
        }

        Ok(())
    }

    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            otp_countdown_secs: self.otp_countdown_secs,
            redirect_delay: self.redirect_delay_secs,
            flows: self.flows.clone(),
        }
    }
}
