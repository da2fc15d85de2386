//! Session lifecycle against an external identity provider.
//!
//! A [`SessionManager`] is the single writer of session state. Everything
//! else (the credential supplier, the access gate, UI code) reads snapshots
//! or subscribes to changes.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sso_session::{ProviderConfig, SessionManager, SessionStatus};
//!
//! // 1. Implement IdentityProvider for your provider client
//! // 2. Hand the manager a factory building it from a ProviderConfig
//! let manager = SessionManager::new(|config: &ProviderConfig| MyProvider::new(config));
//!
//! // 3. Check for an existing session; arms background refresh when found
//! let status = manager.initialize(ProviderConfig::from_env()?).await?;
//! if status == SessionStatus::Unauthenticated {
//!     manager.login();
//! }
//!
//! // 4. Tear down on unmount
//! manager.teardown();
//! ```

mod manager;
mod refresh;
mod state;

pub use manager::SessionManager;
pub use state::{Session, SessionStatus};
