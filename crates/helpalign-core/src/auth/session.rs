use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ActorProfile, Role};

/// Where a role is in the startup validation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleStatus {
    /// Not checked yet
    #[default]
    Unknown,
    /// Validation request in flight
    Checking,
    Authenticated,
    Unauthenticated,
}

/// Session state of a single role.
///
/// Built through the constructors below so that a profile is present
/// exactly when the role is authenticated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleSession {
    status: RoleStatus,
    profile: Option<ActorProfile>,
    validated_at: Option<DateTime<Utc>>,
}

impl RoleSession {
    pub fn checking() -> Self {
        Self {
            status: RoleStatus::Checking,
            ..Self::default()
        }
    }

    pub fn authenticated(profile: ActorProfile) -> Self {
        Self {
            status: RoleStatus::Authenticated,
            profile: Some(profile),
            validated_at: Some(Utc::now()),
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            status: RoleStatus::Unauthenticated,
            ..Self::default()
        }
    }

    pub fn status(&self) -> RoleStatus {
        self.status
    }

    pub fn is_logged_in(&self) -> bool {
        self.status == RoleStatus::Authenticated
    }

    pub fn profile(&self) -> Option<&ActorProfile> {
        self.profile.as_ref()
    }

    pub fn validated_at(&self) -> Option<DateTime<Utc>> {
        self.validated_at
    }

    /// Time since the last successful validation
    pub fn validated_age(&self) -> Option<Duration> {
        self.validated_at.map(|at| Utc::now() - at)
    }
}

/// Read-only view of both roles' sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub patient: RoleSession,
    pub provider: RoleSession,
}

impl SessionSnapshot {
    pub fn get(&self, role: Role) -> &RoleSession {
        match role {
            Role::Patient => &self.patient,
            Role::Provider => &self.provider,
        }
    }

    pub(crate) fn slot_mut(&mut self, role: Role) -> &mut RoleSession {
        match role {
            Role::Patient => &mut self.patient,
            Role::Provider => &mut self.provider,
        }
    }

    pub fn is_logged_in(&self, role: Role) -> bool {
        self.get(role).is_logged_in()
    }

    /// Whether either role is signed in
    pub fn any_logged_in(&self) -> bool {
        Role::ALL.iter().any(|r| self.is_logged_in(*r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown_and_logged_out() {
        let session = RoleSession::default();
        assert_eq!(session.status(), RoleStatus::Unknown);
        assert!(!session.is_logged_in());
        assert!(session.profile().is_none());
        assert!(session.validated_age().is_none());
    }

    #[test]
    fn test_authenticated_carries_profile() {
        let profile = ActorProfile {
            name: Some("Jane Doe".to_string()),
            ..Default::default()
        };
        let session = RoleSession::authenticated(profile.clone());
        assert!(session.is_logged_in());
        assert_eq!(session.profile(), Some(&profile));
        assert!(session.validated_at().is_some());
    }

    #[test]
    fn test_snapshot_slots_are_independent() {
        let mut snapshot = SessionSnapshot::default();
        *snapshot.slot_mut(Role::Provider) = RoleSession::authenticated(ActorProfile::default());

        assert!(snapshot.is_logged_in(Role::Provider));
        assert!(!snapshot.is_logged_in(Role::Patient));
        assert!(snapshot.any_logged_in());
        assert_eq!(snapshot.get(Role::Patient).status(), RoleStatus::Unknown);
    }
}
