//! Plain-text formatting for session state and login failures.

use chrono::Duration;

use helpalign_core::api::{error_detail, ApiError};
use helpalign_core::auth::{LoginError, RoleSession};
use helpalign_core::Role;

/// Human-friendly age such as "just now", "5m ago", "2h ago".
pub fn age_display(age: Duration) -> String {
    let minutes = age.num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// One status line per role, e.g. "Patient: signed in as Jane Doe (checked just now)"
pub fn role_line(role: Role, session: &RoleSession) -> String {
    match session.profile() {
        Some(profile) if session.is_logged_in() => {
            let name = profile
                .display_name()
                .unwrap_or_else(|| "unnamed account".to_string());
            match session.validated_age() {
                Some(age) => format!(
                    "{}: signed in as {} (checked {})",
                    role.display_name(),
                    name,
                    age_display(age)
                ),
                None => format!("{}: signed in as {}", role.display_name(), name),
            }
        }
        _ => format!("{}: not signed in", role.display_name()),
    }
}

/// Short message for a failed login
pub fn login_error_message(err: &LoginError) -> String {
    match err {
        LoginError::MissingCredentials => "Username and password required".to_string(),
        LoginError::Api(ApiError::BadRequest(body)) => {
            error_detail(body).unwrap_or_else(|| "Invalid username or password".to_string())
        }
        LoginError::Api(ApiError::Unauthorized) => "Invalid username or password".to_string(),
        LoginError::Api(ApiError::NetworkError(e)) if e.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        LoginError::Api(ApiError::NetworkError(_)) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        LoginError::Api(ApiError::RateLimited) => {
            "Server is busy. Please wait a moment and try again.".to_string()
        }
        LoginError::Api(e) => format!("Login failed: {}", e),
        LoginError::Storage(e) => format!("Logged in, but the token could not be saved: {}", e),
        LoginError::NotValidated(e) => {
            format!("Logged in, but the session could not be confirmed: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpalign_core::ActorProfile;

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(Duration::seconds(-30)), "just now");
        assert_eq!(age_display(Duration::seconds(20)), "just now");
        assert_eq!(age_display(Duration::minutes(5)), "5m ago");
        assert_eq!(age_display(Duration::minutes(89)), "1h ago");
        assert_eq!(age_display(Duration::minutes(90)), "2h ago");
        assert_eq!(age_display(Duration::hours(36)), "2d ago");
        assert_eq!(age_display(Duration::hours(30)), "1d ago");
    }

    #[test]
    fn test_role_line() {
        let signed_in = RoleSession::authenticated(ActorProfile {
            name: Some("Jane Doe".to_string()),
            ..Default::default()
        });
        assert_eq!(
            role_line(Role::Patient, &signed_in),
            "Patient: signed in as Jane Doe (checked just now)"
        );
        assert_eq!(
            role_line(Role::Provider, &RoleSession::unauthenticated()),
            "Care Provider: not signed in"
        );
    }

    #[test]
    fn test_login_error_message_uses_backend_detail() {
        let err = LoginError::Api(ApiError::BadRequest(
            r#"{"detail":"Incorrect username or password"}"#.to_string(),
        ));
        assert_eq!(login_error_message(&err), "Incorrect username or password");

        let err = LoginError::Api(ApiError::BadRequest("Bad Request".to_string()));
        assert_eq!(login_error_message(&err), "Invalid username or password");

        assert_eq!(
            login_error_message(&LoginError::Api(ApiError::RateLimited)),
            "Server is busy. Please wait a moment and try again."
        );
        assert!(login_error_message(&LoginError::NotValidated(ApiError::Unauthorized))
            .starts_with("Logged in, but"));
    }
}
