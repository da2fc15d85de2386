#![doc = include_str!("../README.md")]

pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod provider;
pub mod session;
pub mod token;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{ProviderConfig, SessionSettings};
pub use credential::CredentialSupplier;
#[cfg(feature = "http")]
pub use credential::RequestOptions;
pub use error::Error;
pub use gate::{AccessGate, GateDecision, decide};
pub use provider::{IdentityProvider, InitOptions, OnLoad, ProviderFactory};
pub use session::{Session, SessionManager, SessionStatus};
pub use token::{
    Claims, decode, expiration_time, expires_within, expires_within_at, is_expired, is_expired_at,
    roles,
};
