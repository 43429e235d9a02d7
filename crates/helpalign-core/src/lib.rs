//! HelpAlign client core.
//!
//! Restores patient and provider sessions from locally stored bearer tokens,
//! logs users in and out against the HelpAlign REST API, and exposes the
//! resulting session state to whatever renders it.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionBootstrap, SessionSnapshot, TokenStore};
pub use config::Config;
pub use models::{ActorProfile, Role};
