use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Actor role a session can represent. Patients and providers log in
/// separately and each keeps its own token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Provider,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Patient, Role::Provider];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Provider => "provider",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Provider => "Care Provider",
        }
    }

    /// Key the role's bearer token is stored under.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Role::Patient => "HA-patienttoken",
            Role::Provider => "HA-providertoken",
        }
    }

    /// "Who am I" endpoint used to validate a stored token.
    pub fn me_path(&self) -> &'static str {
        match self {
            Role::Patient => "/api/patient/me",
            Role::Provider => "/api/provider/me",
        }
    }

    pub fn token_path(&self) -> &'static str {
        match self {
            Role::Patient => "/api/patient/token",
            Role::Provider => "/api/provider/token",
        }
    }

    pub fn logout_path(&self) -> &'static str {
        match self {
            Role::Patient => "/api/patient/logout",
            Role::Provider => "/api/provider/logout",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role '{0}' (expected 'patient' or 'provider')")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "provider" => Ok(Role::Provider),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_are_distinct() {
        assert_eq!(Role::Patient.storage_key(), "HA-patienttoken");
        assert_eq!(Role::Provider.storage_key(), "HA-providertoken");
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Role::Patient.me_path(), "/api/patient/me");
        assert_eq!(Role::Provider.me_path(), "/api/provider/me");
        assert_eq!(Role::Provider.token_path(), "/api/provider/token");
        assert_eq!(Role::Patient.logout_path(), "/api/patient/logout");
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("patient".parse::<Role>(), Ok(Role::Patient));
        assert_eq!(" Provider ".parse::<Role>(), Ok(Role::Provider));
        assert!("doctor".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }
}
