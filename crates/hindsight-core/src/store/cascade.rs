//! Consistent whole-store copies and restoring a store from one.
//!
//! A snapshot read-locks every level in one fixed global order:
//!
//! 1. every shared queue, ascending conversation id
//! 2. the agent table
//! 3. per agent, ascending id: its contact book, then its conversation map
//! 4. per conversation, ascending id: its queue (exclusive only), then its
//!    reply graph
//!
//! Data is copied while each lock is held. Guards are released in exact
//! reverse order once the copy is complete, and encoding happens after that.
//! This is the only path in the crate that holds more than one store lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hindsight_types::contact::ContactInfo;
use hindsight_types::line::{LineEntry, ReplyLink};
use hindsight_types::snapshot::{
    AgentSnapshot, ConversationSnapshot, LineList, LineRecord, ReplyLinkRecord, RootSnapshot,
};
use parking_lot::RawRwLock;
use parking_lot::RwLock;
use parking_lot::lock_api::ArcRwLockReadGuard;
use tracing::debug;

use super::{
    AgentDirectory, AgentMap, ContactBook, ConversationMap, ConversationRecord, RecencyQueue,
    ReplyGraph, RootStore,
};

type ReadGuard<T> = ArcRwLockReadGuard<RawRwLock, T>;

// Guards are held for their Drop only.
#[allow(dead_code)]
enum HeldGuard {
    Queue(ReadGuard<Vec<LineEntry>>),
    Graph(ReadGuard<HashMap<String, ReplyLink>>),
    Contacts(ReadGuard<BTreeMap<String, ContactInfo>>),
    Conversations(ReadGuard<ConversationMap>),
    Agents(ReadGuard<AgentMap>),
}

/// Read guards taken in cascade order, released last-in first-out on drop.
#[derive(Default)]
struct LockCascade {
    held: Vec<HeldGuard>,
}

impl LockCascade {
    fn queue(&mut self, queue: &RecencyQueue) -> LineList {
        let guard = queue.lock().read_arc();
        let lines = guard.iter().map(LineRecord::from).collect();
        self.held.push(HeldGuard::Queue(guard));
        lines
    }

    fn graph(&mut self, graph: &ReplyGraph) -> BTreeMap<String, ReplyLinkRecord> {
        let guard = graph.lock().read_arc();
        let links = guard
            .iter()
            .map(|(last_line, link)| (last_line.clone(), ReplyLinkRecord::from(link)))
            .collect();
        self.held.push(HeldGuard::Graph(guard));
        links
    }

    fn contacts(&mut self, book: &ContactBook) -> BTreeMap<String, ContactInfo> {
        let guard = book.lock().read_arc();
        let contacts = guard.clone();
        self.held.push(HeldGuard::Contacts(guard));
        contacts
    }

    fn conversations(
        &mut self,
        lock: &Arc<RwLock<ConversationMap>>,
    ) -> Vec<(i64, Arc<ConversationRecord>)> {
        let guard = lock.read_arc();
        let records = guard
            .iter()
            .map(|(id, record)| (*id, Arc::clone(record)))
            .collect();
        self.held.push(HeldGuard::Conversations(guard));
        records
    }

    fn agents(&mut self, lock: &Arc<RwLock<AgentMap>>) -> Vec<(String, Arc<AgentDirectory>)> {
        let guard = lock.read_arc();
        let agents = guard
            .iter()
            .map(|(id, directory)| (id.clone(), Arc::clone(directory)))
            .collect();
        self.held.push(HeldGuard::Agents(guard));
        agents
    }
}

impl Drop for LockCascade {
    fn drop(&mut self) {
        while let Some(guard) = self.held.pop() {
            drop(guard);
        }
    }
}

impl RootStore {
    /// Copy the whole store as one consistent point-in-time view.
    pub fn snapshot(&self) -> RootSnapshot {
        let mut cascade = LockCascade::default();
        let mut snapshot = RootSnapshot::default();

        for (conversation_id, queue) in &self.shared_queues {
            snapshot
                .shared_queues
                .insert(*conversation_id, cascade.queue(queue));
        }

        for (agent_id, directory) in cascade.agents(self.agents_lock()) {
            let contacts = cascade.contacts(directory.contacts());
            let mut conversations = BTreeMap::new();

            for (conversation_id, record) in cascade.conversations(directory.conversations_lock()) {
                // Shared queues were copied in step 1.
                let exclusive_queue = if record.is_shared() {
                    None
                } else {
                    Some(cascade.queue(record.queue()))
                };
                let reply_graph = cascade.graph(record.chains());
                conversations.insert(
                    conversation_id,
                    ConversationSnapshot {
                        exclusive_queue,
                        reply_graph,
                    },
                );
            }

            snapshot.agents.insert(
                agent_id,
                AgentSnapshot {
                    contacts,
                    conversations,
                },
            );
        }

        let held = cascade.held.len();
        drop(cascade);
        debug!(locks = held, agents = snapshot.agents.len(), "store snapshot copied");
        snapshot
    }

    /// Rebuild a store from a decoded snapshot.
    ///
    /// Shared queues are provisioned from `shared_conversation_ids` alone;
    /// shared data for any other id is dropped. A conversation stored as a
    /// back-reference to a shared queue that is no longer provisioned starts
    /// over with an empty exclusive queue and keeps its reply graph.
    pub fn from_snapshot(
        snapshot: RootSnapshot,
        shared_conversation_ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        let store = Self::new(shared_conversation_ids);

        for (conversation_id, lines) in snapshot.shared_queues {
            match store.shared_queue(conversation_id) {
                Some(queue) => {
                    *queue.lock().write() = lines.into_iter().map(LineEntry::from).collect();
                }
                None => debug!(conversation_id, "dropped shared queue no longer configured"),
            }
        }

        {
            let mut agents = store.agents_lock().write();
            for (agent_id, agent) in snapshot.agents {
                let conversations = agent
                    .conversations
                    .into_iter()
                    .map(|(conversation_id, conversation)| {
                        let record = store.restore_record(conversation_id, conversation);
                        (conversation_id, Arc::new(record))
                    })
                    .collect();
                let contacts = ContactBook::with_entries(agent.contacts);
                agents.insert(
                    agent_id,
                    Arc::new(AgentDirectory::with_parts(conversations, contacts)),
                );
            }
        }

        store
    }

    fn restore_record(
        &self,
        conversation_id: i64,
        conversation: ConversationSnapshot,
    ) -> ConversationRecord {
        let queue = match conversation.exclusive_queue {
            Some(lines) => {
                RecencyQueue::with_entries(false, lines.into_iter().map(LineEntry::from).collect())
            }
            None => self.shared_queue(conversation_id).cloned().unwrap_or_else(|| {
                debug!(conversation_id, "shared queue not configured, using an exclusive one");
                RecencyQueue::exclusive()
            }),
        };
        let links = conversation
            .reply_graph
            .into_iter()
            .map(|(last_line, link)| (last_line, ReplyLink::from(link)))
            .collect();
        ConversationRecord::with_parts(queue, ReplyGraph::with_links(links))
    }
}
