//! Persisted snapshot layout.
//!
//! One [`RootSnapshot`] is written per save. Shared conversation queues are
//! stored once in `shared_queues`; a conversation that used a shared queue
//! carries no inline queue (`exclusive_queue == None`) and is relinked by its
//! conversation id on load.
//!
//! Timestamps are stored as whole unix seconds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contact::ContactInfo;
use crate::line::{LineEntry, ReplyLink};

/// Ordered list of lines, oldest first.
pub type LineList = Vec<LineRecord>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSnapshot {
    pub shared_queues: BTreeMap<i64, LineList>,
    pub agents: BTreeMap<String, AgentSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub contacts: BTreeMap<String, ContactInfo>,
    pub conversations: BTreeMap<i64, ConversationSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    /// Present only when the conversation owned its queue.
    pub exclusive_queue: Option<LineList>,
    pub reply_graph: BTreeMap<String, ReplyLinkRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub text: String,
    pub created_at_unix_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyLinkRecord {
    pub prev_line: String,
    pub created_at_unix_secs: i64,
}

fn from_unix_secs(secs: i64) -> DateTime<Utc> {
    // Out-of-range values collapse to the epoch and are swept on the next run.
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

impl From<&LineEntry> for LineRecord {
    fn from(entry: &LineEntry) -> Self {
        Self {
            text: entry.text.clone(),
            created_at_unix_secs: entry.created_at.timestamp(),
        }
    }
}

impl From<LineRecord> for LineEntry {
    fn from(record: LineRecord) -> Self {
        LineEntry::at(record.text, from_unix_secs(record.created_at_unix_secs))
    }
}

impl From<&ReplyLink> for ReplyLinkRecord {
    fn from(link: &ReplyLink) -> Self {
        Self {
            prev_line: link.prev_line.clone(),
            created_at_unix_secs: link.created_at.timestamp(),
        }
    }
}

impl From<ReplyLinkRecord> for ReplyLink {
    fn from(record: ReplyLinkRecord) -> Self {
        ReplyLink::at(record.prev_line, from_unix_secs(record.created_at_unix_secs))
    }
}

/// Aggregate counts over a store or a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub agents: usize,
    pub conversations: usize,
    pub shared_queues: usize,
    pub exclusive_queues: usize,
    /// Lines across all queues, each shared queue counted once.
    pub lines: usize,
    pub reply_links: usize,
    pub contacts: usize,
}

impl RootSnapshot {
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            agents: self.agents.len(),
            shared_queues: self.shared_queues.len(),
            lines: self.shared_queues.values().map(Vec::len).sum(),
            ..StoreStats::default()
        };

        for agent in self.agents.values() {
            stats.contacts += agent.contacts.len();
            stats.conversations += agent.conversations.len();
            for conversation in agent.conversations.values() {
                stats.reply_links += conversation.reply_graph.len();
                if let Some(queue) = &conversation.exclusive_queue {
                    stats.exclusive_queues += 1;
                    stats.lines += queue.len();
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, secs: i64) -> LineRecord {
        LineRecord {
            text: text.to_string(),
            created_at_unix_secs: secs,
        }
    }

    #[test]
    fn line_record_keeps_whole_seconds() {
        let created_at = DateTime::from_timestamp(1_700_000_000, 999_000_000).unwrap();
        let entry = LineEntry::at("Ann: hi", created_at);
        let record = LineRecord::from(&entry);
        assert_eq!(record.created_at_unix_secs, 1_700_000_000);

        let back = LineEntry::from(record);
        assert_eq!(back.text, "Ann: hi");
        assert_eq!(back.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn out_of_range_timestamp_falls_back_to_epoch() {
        let link = ReplyLink::from(ReplyLinkRecord {
            prev_line: "Bob: yo".to_string(),
            created_at_unix_secs: i64::MAX,
        });
        assert_eq!(link.created_at.timestamp(), 0);
    }

    #[test]
    fn stats_count_shared_lines_once() {
        let mut snapshot = RootSnapshot::default();
        snapshot
            .shared_queues
            .insert(-100, vec![line("a", 1), line("b", 2)]);

        for agent_id in ["luna", "sol"] {
            let mut agent = AgentSnapshot::default();
            agent.conversations.insert(
                -100,
                ConversationSnapshot {
                    exclusive_queue: None,
                    reply_graph: BTreeMap::from([(
                        "b".to_string(),
                        ReplyLinkRecord {
                            prev_line: "a".to_string(),
                            created_at_unix_secs: 2,
                        },
                    )]),
                },
            );
            agent.conversations.insert(
                7,
                ConversationSnapshot {
                    exclusive_queue: Some(vec![line("c", 3)]),
                    reply_graph: BTreeMap::new(),
                },
            );
            agent
                .contacts
                .insert("ann".to_string(), ContactInfo::new(10, "kind"));
            snapshot.agents.insert(agent_id.to_string(), agent);
        }

        let stats = snapshot.stats();
        assert_eq!(stats.agents, 2);
        assert_eq!(stats.conversations, 4);
        assert_eq!(stats.shared_queues, 1);
        assert_eq!(stats.exclusive_queues, 2);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.reply_links, 2);
        assert_eq!(stats.contacts, 2);
    }
}
