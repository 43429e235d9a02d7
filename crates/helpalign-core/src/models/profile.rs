//! Profile and credential types returned by the HelpAlign backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile of the authenticated patient or provider.
///
/// Only the fields the client reads are typed; anything else the backend
/// sends is kept in `extra` so the record can be handed on unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActorProfile {
    /// Name to greet the user with.
    pub fn display_name(&self) -> Option<String> {
        if let Some(ref name) = self.name {
            if !name.trim().is_empty() {
                return Some(name.trim().to_string());
            }
        }

        let parts: Vec<&str> = [&self.given_name, &self.family_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return Some(parts.join(" "));
        }

        self.email.clone().filter(|e| !e.is_empty())
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Body of a successful token request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}
