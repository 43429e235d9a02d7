//! Startup restoration of patient and provider sessions.
//!
//! `SessionBootstrap` owns the session state of both roles. At startup it
//! reads each role's stored token, validates it against the role's "who am I"
//! endpoint and records the outcome. The two roles are checked concurrently
//! and never touch each other's token or state.
//!
//! Renderers read state through `snapshot()` or follow changes through the
//! watch channel returned by `subscribe()`.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::models::{ActorProfile, Role};

use super::{RoleSession, RoleStatus, SessionSnapshot, StoreError, TokenStore};

/// Result of validating one role's stored token.
#[derive(Debug)]
pub enum CheckOutcome {
    /// Nothing stored, no request made
    NoToken,
    Authenticated(ActorProfile),
    /// The backend answered with anything but a 200 and a readable profile;
    /// the token has been removed from storage
    Rejected(ApiError),
    /// No response arrived. The token is kept unless eviction on transport
    /// errors is enabled.
    Unreachable(ApiError),
}

impl CheckOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, CheckOutcome::Authenticated(_))
    }
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Username and password required")]
    MissingCredentials,

    #[error("Login failed: {0}")]
    Api(#[source] ApiError),

    #[error("Could not save token: {0}")]
    Storage(#[from] StoreError),

    #[error("Token was issued but could not be validated: {0}")]
    NotValidated(#[source] ApiError),
}

pub struct SessionBootstrap {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    evict_on_transport_error: bool,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionBootstrap {
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            api,
            store,
            evict_on_transport_error: false,
            state,
        }
    }

    /// Build the client and token store described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let bootstrap = Self::new(config.api_client()?, config.open_token_store()?)
            .evict_on_transport_error(config.evict_on_transport_error);
        Ok(bootstrap)
    }

    /// Also drop stored tokens when validation gets no response at all
    /// (connection refused, timeout, DNS failure).
    pub fn evict_on_transport_error(mut self, evict: bool) -> Self {
        self.evict_on_transport_error = evict;
        self
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    fn set_role(&self, role: Role, session: RoleSession) {
        debug!(%role, status = ?session.status(), "Session state changed");
        self.state.send_modify(|snapshot| *snapshot.slot_mut(role) = session);
    }

    /// Validate both roles' stored tokens and return the resulting state
    pub async fn run(&self) -> SessionSnapshot {
        info!("Restoring sessions");
        let outcomes = join_all(Role::ALL.iter().map(|role| self.check_role(*role))).await;
        debug!(?outcomes, "Session restore complete");
        self.snapshot()
    }

    /// Like `run`, but gives up as soon as `shutdown` completes.
    ///
    /// In-flight requests are dropped and their results discarded; roles
    /// still being checked go back to `Unknown`. Returns `None` when
    /// cancelled.
    pub async fn run_until<F>(&self, shutdown: F) -> Option<SessionSnapshot>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            snapshot = self.run() => Some(snapshot),
            _ = shutdown => {
                warn!("Session restore cancelled");
                self.state.send_modify(|snapshot| {
                    for role in Role::ALL {
                        let slot = snapshot.slot_mut(role);
                        if slot.status() == RoleStatus::Checking {
                            *slot = RoleSession::default();
                        }
                    }
                });
                None
            }
        }
    }

    /// Validate a single role's stored token
    pub async fn check_role(&self, role: Role) -> CheckOutcome {
        let token = match self.store.get(role.storage_key()) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(%role, "No stored token");
                self.set_role(role, RoleSession::unauthenticated());
                return CheckOutcome::NoToken;
            }
            Err(e) => {
                warn!(%role, error = %e, "Failed to read stored token");
                self.set_role(role, RoleSession::unauthenticated());
                return CheckOutcome::NoToken;
            }
        };

        self.set_role(role, RoleSession::checking());

        match self.api.fetch_profile(role, &token).await {
            Ok(profile) => {
                info!(%role, "Session restored");
                self.set_role(role, RoleSession::authenticated(profile.clone()));
                CheckOutcome::Authenticated(profile)
            }
            Err(e) if e.is_transport_failure() => {
                self.set_role(role, RoleSession::unauthenticated());
                if self.evict_on_transport_error {
                    warn!(%role, error = %e, "Could not validate token, removing it");
                    self.evict(role);
                } else {
                    warn!(%role, error = %e, "Could not validate token, keeping it for retry");
                }
                CheckOutcome::Unreachable(e)
            }
            Err(e) => {
                info!(%role, error = %e, "Stored token rejected, removing it");
                self.set_role(role, RoleSession::unauthenticated());
                self.evict(role);
                CheckOutcome::Rejected(e)
            }
        }
    }

    fn evict(&self, role: Role) {
        if let Err(e) = self.store.remove(role.storage_key()) {
            warn!(%role, error = %e, "Failed to remove stored token");
        }
    }

    /// Log in as `role`, store the issued token and validate it.
    ///
    /// Returns the profile the backend reports for the new token.
    pub async fn login(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> Result<ActorProfile, LoginError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let issued = match self.api.request_token(role, username, password).await {
            Ok(issued) => issued,
            Err(e) => {
                error!(%role, error = %e, "Login failed");
                // A session that is still valid stays as it was
                if !self.snapshot().is_logged_in(role) {
                    self.set_role(role, RoleSession::unauthenticated());
                }
                return Err(LoginError::Api(e));
            }
        };

        self.set_role(role, RoleSession::default());
        self.store.set(role.storage_key(), &issued.access_token)?;
        info!(%role, token_type = %issued.token_type, "Token issued");

        match self.check_role(role).await {
            CheckOutcome::Authenticated(profile) => Ok(profile),
            CheckOutcome::Rejected(e) | CheckOutcome::Unreachable(e) => {
                Err(LoginError::NotValidated(e))
            }
            CheckOutcome::NoToken => Err(LoginError::Storage(StoreError::Io(
                std::io::Error::new(std::io::ErrorKind::NotFound, "token missing after save"),
            ))),
        }
    }

    /// Log `role` out: revoke the token on the backend if possible, then
    /// forget it locally.
    pub async fn logout(&self, role: Role) -> Result<(), StoreError> {
        if let Some(token) = self.store.get(role.storage_key())? {
            if let Err(e) = self.api.logout(role, &token).await {
                warn!(%role, error = %e, "Backend logout failed, clearing local token anyway");
            }
        }

        self.set_role(role, RoleSession::unauthenticated());
        self.store.remove(role.storage_key())?;
        info!(%role, "Logged out");
        Ok(())
    }
}
