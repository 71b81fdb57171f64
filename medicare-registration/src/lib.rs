//! Registration core of the MediCare platform.
//!
//! Customers, nurses, vendors and doctors all go through the same steps:
//! a registration form, an email OTP check, an optional profile completion
//! and a success screen. [`flow::FlowController`] drives those steps against
//! the remote API through [`client::RegistrationApi`], while
//! [`error::ErrorNormalizer`] turns whatever the backend answers into one
//! stable taxonomy for the presentation layer.

pub mod client;
pub mod config;
pub mod draft;
pub mod error;
pub mod flow;
pub mod http;
pub mod logger;
pub mod role;
pub mod validation;

#[cfg(test)]
mod testutils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
