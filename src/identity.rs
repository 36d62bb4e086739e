//! Identity contract between the session engine and whoever authenticates users.
//!
//! Sessions never consult a global "current user"; the caller authenticates
//! first and hands the resulting [`Identity`] to the session builder.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an authenticated user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "Student"),
            Role::Instructor => write!(f, "Instructor"),
        }
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub role: Role,
    /// Display name
    pub name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: Role, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            name: name.into(),
        }
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

/// Username and password as entered.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,

    #[error("authentication rejected: {0}")]
    Rejected(String),
}

/// Authenticates credentials for a requested role.
pub trait IdentityProvider {
    fn authenticate(&self, credentials: &Credentials, role: Role) -> Result<Identity, AuthError>;
}

/// Accepts any non-empty username and password.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockIdentityProvider;

impl IdentityProvider for MockIdentityProvider {
    fn authenticate(&self, credentials: &Credentials, role: Role) -> Result<Identity, AuthError> {
        let username = credentials.username.trim();
        if username.is_empty() || credentials.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let id: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
        Ok(Identity::new(id, role, format!("{role} {username}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_accepts_credentials() {
        let identity = MockIdentityProvider
            .authenticate(&Credentials::new("alice", "secret"), Role::Student)
            .unwrap();

        assert_eq!(identity.role, Role::Student);
        assert_eq!(identity.name, "Student alice");
        assert_eq!(identity.id.len(), 9);
        assert!(identity.is_student());
    }

    #[test]
    fn test_mock_provider_rejects_empty() {
        let provider = MockIdentityProvider;
        assert_eq!(
            provider.authenticate(&Credentials::new("", "pw"), Role::Student),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            provider.authenticate(&Credentials::new("bob", ""), Role::Instructor),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn test_ids_are_distinct() {
        let creds = Credentials::new("carol", "pw");
        let a = MockIdentityProvider.authenticate(&creds, Role::Student).unwrap();
        let b = MockIdentityProvider.authenticate(&creds, Role::Student).unwrap();
        assert_ne!(a.id, b.id);
    }
}
