//! Line-level types: what a conversation remembers about a single message.
//!
//! A message is remembered as one rendered line of text ("Sender: text").
//! Queues hold [`LineEntry`] values in arrival order; reply graphs map a line
//! to the [`ReplyLink`] describing the line it answered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One remembered line with the moment it was recorded.
///
/// Immutable once created: queues only ever append or drop whole entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl LineEntry {
    /// Create an entry with an explicit timestamp.
    pub fn at(text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            created_at,
        }
    }

    /// Whether the entry is still within `ttl` of `now`.
    ///
    /// An entry exactly `ttl` old is still fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::TimeDelta) -> bool {
        now.signed_duration_since(self.created_at) <= ttl
    }
}

/// The predecessor side of a reply: the line that was replied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLink {
    pub prev_line: String,
    pub created_at: DateTime<Utc>,
}

impl ReplyLink {
    pub fn at(prev_line: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            prev_line: prev_line.into(),
            created_at,
        }
    }

    /// Whether the link has outlived `ttl` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::TimeDelta) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }
}

/// Line-chain capability supplied by the chat-platform connector.
///
/// `previous_line` is empty when the observed message was not a reply.
pub trait LineChain {
    fn current_line(&self) -> &str;
    fn previous_line(&self) -> &str;
    /// Sender identity, used only to key the contact book.
    fn sender(&self) -> &str;
}

/// A message as seen by one agent, already rendered into lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedMessage {
    pub sender: String,
    pub line: String,
    #[serde(default)]
    pub prev_line: String,
}

impl ObservedMessage {
    pub fn new(sender: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            line: line.into(),
            prev_line: String::new(),
        }
    }

    /// Mark this message as a reply to `prev_line`.
    pub fn replying_to(mut self, prev_line: impl Into<String>) -> Self {
        self.prev_line = prev_line.into();
        self
    }
}

impl LineChain for ObservedMessage {
    fn current_line(&self) -> &str {
        &self.line
    }

    fn previous_line(&self) -> &str {
        &self.prev_line
    }

    fn sender(&self) -> &str {
        &self.sender
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn entry_exactly_at_ttl_is_fresh() {
        let t0 = Utc::now();
        let entry = LineEntry::at("Ann: hi", t0);
        assert!(entry.is_fresh(t0 + TimeDelta::hours(1), TimeDelta::hours(1)));
        assert!(!entry.is_fresh(t0 + TimeDelta::minutes(61), TimeDelta::hours(1)));
    }

    #[test]
    fn link_expires_only_past_ttl() {
        let t0 = Utc::now();
        let link = ReplyLink::at("Bob: hey", t0);
        assert!(!link.is_expired(t0 + TimeDelta::hours(1), TimeDelta::hours(1)));
        assert!(link.is_expired(t0 + TimeDelta::minutes(61), TimeDelta::hours(1)));
    }

    #[test]
    fn observed_message_exposes_line_chain() {
        let msg = ObservedMessage::new("ann", "Ann: how are you?").replying_to("Bob: hello");
        assert_eq!(msg.current_line(), "Ann: how are you?");
        assert_eq!(msg.previous_line(), "Bob: hello");
        assert_eq!(msg.sender(), "ann");
    }

    #[test]
    fn observed_message_without_prev_line_deserializes() {
        let msg: ObservedMessage =
            serde_json::from_str(r#"{"sender":"ann","line":"Ann: hi"}"#).unwrap();
        assert_eq!(msg.previous_line(), "");
    }
}
