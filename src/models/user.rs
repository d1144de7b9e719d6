//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Account role. Mirrored into the session JWT as the `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Korisnik,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Korisnik => "korisnik",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "korisnik" => Ok(Role::Korisnik),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    /// User ID (also used as document ID)
    pub uid: String,
    /// Login email (lowercase)
    pub email: String,
    /// Name shown in the UI and on invoices
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    /// Blocked users cannot log in, pay or watch lessons
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub email_verified: bool,
    /// When the account was created
    pub created_at: String,
    /// Last successful login
    #[serde(default)]
    pub last_login: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Password credentials, kept apart from the profile document so that
/// profile reads never carry the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Argon2 PHC string
    pub password_hash: String,
    pub updated_at: String,
}

/// Email uniqueness index (`user_emails/{encoded email}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailIndex {
    pub uid: String,
}

/// Normalize an email for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"korisnik\"").unwrap(),
            Role::Korisnik
        );
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_missing_flags_default_to_regular_user() {
        let user: User = serde_json::from_value(serde_json::json!({
            "uid": "u1",
            "email": "ana@example.com",
            "display_name": "Ana",
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(user.role, Role::Korisnik);
        assert!(!user.blocked);
        assert!(!user.email_verified);
    }
}
