//! Assembled memory for one incoming message.
//!
//! Prompt builders receive a [`ConversationMemory`]: the recent window, the
//! reply chain ending in the incoming line, and the agent's contact book
//! rendered as text.

use std::fmt;

use hindsight_types::config::MemoryConfig;
use hindsight_types::line::LineChain;

use crate::store::{ContactBook, ConversationRecord};

/// Retrieval bounds applied when assembling memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub window: usize,
    pub chain: usize,
}

impl From<&MemoryConfig> for MemoryLimits {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            window: config.window_limit,
            chain: config.chain_limit,
        }
    }
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self::from(&MemoryConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationMemory {
    /// Most recent lines, oldest first.
    pub window: Vec<String>,
    /// Reply chain ending in the incoming line, oldest first.
    pub chain: Vec<String>,
    /// Rendered contact book.
    pub contacts: String,
}

impl ConversationMemory {
    pub fn assemble(
        record: &ConversationRecord,
        contacts: &ContactBook,
        message: &impl LineChain,
        limits: MemoryLimits,
    ) -> Self {
        Self {
            window: record.window(limits.window),
            chain: record.chain_for(message, limits.chain),
            contacts: contacts.to_string(),
        }
    }
}

impl fmt::Display for ConversationMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.contacts)?;
        writeln!(f)?;
        writeln!(f, "Recent messages:")?;
        writeln!(f, "{}", self.window.join("\n"))?;
        writeln!(f)?;
        writeln!(f, "Reply chain:")?;
        write!(f, "{}", self.chain.join("\n"))
    }
}
