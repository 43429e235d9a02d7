//! Data models for HelpAlign entities.
//!
//! - `Role`: the two actor roles a session can represent, with their
//!   storage keys and endpoint paths
//! - `ActorProfile`: the "who am I" record returned by the backend
//! - `TokenResponse`: the credential handed out by a successful login

pub mod profile;
pub mod role;

pub use profile::{ActorProfile, TokenResponse};
pub use role::{ParseRoleError, Role};
