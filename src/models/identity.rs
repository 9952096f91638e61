use serde::{Deserialize, Serialize};

/// The authenticated user. `email` is the join key for profile and history lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        }
    }

    /// Both fields are required for a usable identity.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_fields() {
        let id = Identity::new("  Ada ", " ada@example.com ");
        assert_eq!(id.name, "Ada");
        assert_eq!(id.email, "ada@example.com");
        assert!(id.is_complete());
    }

    #[test]
    fn blank_email_is_incomplete() {
        assert!(!Identity::new("Ada", "   ").is_complete());
    }
}
