//! Keyed item types managed as collections on remote resources

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// An item identified by one or more key fields
///
/// Equality of the implementing type must be structural (key fields plus
/// value payload); [`Keyed::key`] extracts only the identifying part.
pub trait Keyed {
    type Key: Eq + Hash + Clone + fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// A `key=value` label attached to a resource
///
/// Identity is the whole pair, so an observed resource carrying two values
/// under one key is still a valid collection. Adapters that address labels
/// by key alone group a delta by [`Label::key`] themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

impl Label {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Keyed for Label {
    type Key = (String, String);

    fn key(&self) -> (String, String) {
        (self.key.clone(), self.value.clone())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A role granted to a user within a space
///
/// A user may hold several roles in the same space, so the whole pair is the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceRole {
    pub space_name: String,
    pub role: String,
}

impl SpaceRole {
    pub fn new(space_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            space_name: space_name.into(),
            role: role.into(),
        }
    }
}

impl Keyed for SpaceRole {
    type Key = (String, String);

    fn key(&self) -> (String, String) {
        (self.space_name.clone(), self.role.clone())
    }
}

impl fmt::Display for SpaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.space_name, self.role)
    }
}

/// A collaborator invited by email, optionally with a permission level
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collaborator {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

impl Collaborator {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            permission: None,
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }
}

impl Keyed for Collaborator {
    type Key = String;

    // Email addresses compare case-insensitively on the remote side
    fn key(&self) -> String {
        self.email.to_lowercase()
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.permission {
            Some(p) => write!(f, "{} ({})", self.email, p),
            None => write!(f, "{}", self.email),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_identity_is_key_and_value() {
        assert_ne!(Label::new("env", "prod").key(), Label::new("env", "dev").key());
        assert_eq!(
            Label::new("env", "prod").key(),
            ("env".to_string(), "prod".to_string())
        );
    }

    #[test]
    fn test_space_role_key_is_whole_pair() {
        let admin = SpaceRole::new("payments", "admin");
        let viewer = SpaceRole::new("payments", "viewer");
        assert_ne!(admin.key(), viewer.key());
        assert_eq!(admin.to_string(), "payments:admin");
    }

    #[test]
    fn test_collaborator_key_is_case_insensitive() {
        let a = Collaborator::new("Dev@Example.com");
        let b = Collaborator::new("dev@example.com").with_permission("write");
        assert_eq!(a.key(), b.key());
        assert_eq!(b.to_string(), "dev@example.com (write)");
    }

    #[test]
    fn test_label_deserializes_from_json() {
        let label: Label = serde_json::from_str(r#"{"key":"team","value":"x"}"#).unwrap();
        assert_eq!(label, Label::new("team", "x"));
    }
}
