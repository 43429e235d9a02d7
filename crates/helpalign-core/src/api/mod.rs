//! REST API client module for the HelpAlign backend.
//!
//! This module provides the `ApiClient` for requesting tokens, validating
//! them against the per-role "who am I" endpoints, and logging out.
//!
//! Tokens are presented as bearer credentials on every authenticated call.

pub mod client;
pub mod error;

pub use client::{error_detail, ApiClient, LoginEncoding};
pub use error::ApiError;
