//! Authentication module for restoring and managing sessions.
//!
//! This module provides:
//! - `TokenStore`: Local key-value storage for bearer tokens (file, keychain, memory)
//! - `RoleSession`, `SessionSnapshot`: Per-role session state
//! - `SessionBootstrap`: Validates stored tokens at startup, logs in and out
//!
//! Patients and providers are independent: each has its own token key and
//! its own slot in the session state.

pub mod bootstrap;
pub mod session;
pub mod store;

pub use bootstrap::{CheckOutcome, LoginError, SessionBootstrap};
pub use session::{RoleSession, RoleStatus, SessionSnapshot};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, StoreError, TokenStore};
