//! Conversation record: one queue plus one reply graph.

use chrono::{DateTime, Utc};
use hindsight_types::line::LineChain;
use tracing::debug;

use super::graph::ReplyGraph;
use super::queue::RecencyQueue;

/// Memory of one conversation as seen by one agent.
///
/// The record owns its reply graph. It owns its queue only when the queue is
/// exclusive; a shared queue is also referenced by the root store and by the
/// records of other agents in the same public conversation.
#[derive(Debug)]
pub struct ConversationRecord {
    queue: RecencyQueue,
    chains: ReplyGraph,
}

impl ConversationRecord {
    pub(crate) fn new(queue: RecencyQueue) -> Self {
        Self::with_parts(queue, ReplyGraph::new())
    }

    pub(crate) fn with_parts(queue: RecencyQueue, chains: ReplyGraph) -> Self {
        Self { queue, chains }
    }

    pub fn queue(&self) -> &RecencyQueue {
        &self.queue
    }

    pub fn chains(&self) -> &ReplyGraph {
        &self.chains
    }

    pub fn is_shared(&self) -> bool {
        self.queue.is_shared()
    }

    pub fn append_line(&self, line: &str) -> bool {
        self.queue.append(line)
    }

    pub fn append_reply_link(&self, last_line: &str, prev_line: &str) -> bool {
        self.chains.link(last_line, prev_line)
    }

    /// Remember a message the agent saw but will not answer.
    pub fn observe(&self, message: &impl LineChain) {
        self.observe_at(message, Utc::now());
    }

    pub fn observe_at(&self, message: &impl LineChain, at: DateTime<Utc>) {
        self.queue.append_at(message.current_line(), at);
    }

    /// Remember a message the agent answers: its line and its reply link.
    pub fn record(&self, message: &impl LineChain) {
        self.record_at(message, Utc::now());
    }

    pub fn record_at(&self, message: &impl LineChain, at: DateTime<Utc>) {
        let line = message.current_line();
        self.queue.append_at(line, at);
        self.chains.link_at(line, message.previous_line(), at);
        debug!(sender = message.sender(), "message recorded");
    }

    pub fn window(&self, limit: usize) -> Vec<String> {
        self.queue.window(limit)
    }

    pub fn chain(&self, last_line: &str, prev_line: &str, limit: usize) -> Vec<String> {
        self.chains.chain(last_line, prev_line, limit)
    }

    /// Reply chain ending in the message's own line.
    pub fn chain_for(&self, message: &impl LineChain, limit: usize) -> Vec<String> {
        self.chains
            .chain(message.current_line(), message.previous_line(), limit)
    }
}
