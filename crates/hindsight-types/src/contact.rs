//! Per-user contact metadata kept by each agent.
//!
//! The store never interprets these values. The persona-scoring collaborator
//! reads and replaces them; Hindsight keeps and persists them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversation-agnostic side state an agent keeps about one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Accumulated affinity score.
    pub score: i32,
    /// Free-text descriptors (space separated tags, notes).
    pub descriptors: String,
}

impl ContactInfo {
    pub fn new(score: i32, descriptors: impl Into<String>) -> Self {
        Self {
            score,
            descriptors: descriptors.into(),
        }
    }
}

impl fmt::Display for ContactInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "score: {}", self.score)?;
        write!(f, "descriptors: {}", self.descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_contact_is_neutral() {
        let contact = ContactInfo::default();
        assert_eq!(contact.score, 0);
        assert!(contact.descriptors.is_empty());
    }

    #[test]
    fn display_lists_score_and_descriptors() {
        let contact = ContactInfo::new(-20, "grumpy chess");
        assert_eq!(contact.to_string(), "score: -20\ndescriptors: grumpy chess");
    }
}
