//! Hierarchical conversation store.
//!
//! ```text
//! RootStore
//! ├── shared_queues: conversation id -> RecencyQueue (fixed at startup)
//! └── agents: agent id -> AgentDirectory
//!     ├── contacts: ContactBook
//!     └── conversations: conversation id -> ConversationRecord
//!         ├── queue: RecencyQueue (exclusive, or a handle to a shared one)
//!         └── chains: ReplyGraph
//! ```
//!
//! Every level sits behind its own reader/writer lock. Foreground paths hold
//! one lock at a time: they clone the child handle out of a map and release
//! the map before touching the child. Only [`RootStore::snapshot`] holds many
//! locks at once, in the order documented in [`cascade`].

pub mod cascade;
pub mod contacts;
pub mod graph;
pub mod queue;
pub mod record;

use std::collections::BTreeMap;
use std::sync::Arc;

use hindsight_types::snapshot::StoreStats;
use parking_lot::RwLock;
use tracing::debug;

pub use contacts::ContactBook;
pub use graph::ReplyGraph;
pub use queue::RecencyQueue;
pub use record::ConversationRecord;

type ConversationMap = BTreeMap<i64, Arc<ConversationRecord>>;
type AgentMap = BTreeMap<String, Arc<AgentDirectory>>;

// ---------------------------------------------------------------------------
// AgentDirectory
// ---------------------------------------------------------------------------

/// Everything one agent remembers.
#[derive(Debug, Default)]
pub struct AgentDirectory {
    conversations: Arc<RwLock<ConversationMap>>,
    contacts: ContactBook,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_parts(conversations: ConversationMap, contacts: ContactBook) -> Self {
        Self {
            conversations: Arc::new(RwLock::new(conversations)),
            contacts,
        }
    }

    pub fn contacts(&self) -> &ContactBook {
        &self.contacts
    }

    pub fn conversation(&self, conversation_id: i64) -> Option<Arc<ConversationRecord>> {
        self.conversations.read().get(&conversation_id).cloned()
    }

    /// Fetch the record for `conversation_id`, creating it on first use.
    ///
    /// A new record links `shared` when given, otherwise it gets a fresh
    /// exclusive queue. The flag reports whether the record already existed.
    pub(crate) fn get_or_create(
        &self,
        conversation_id: i64,
        shared: Option<&RecencyQueue>,
    ) -> (Arc<ConversationRecord>, bool) {
        if let Some(record) = self.conversation(conversation_id) {
            return (record, true);
        }

        let mut conversations = self.conversations.write();
        // Another caller may have created it between the lookup and the write lock.
        if let Some(record) = conversations.get(&conversation_id) {
            return (Arc::clone(record), true);
        }

        let queue = shared.cloned().unwrap_or_else(RecencyQueue::exclusive);
        let record = Arc::new(ConversationRecord::new(queue));
        conversations.insert(conversation_id, Arc::clone(&record));
        debug!(conversation_id, shared = record.is_shared(), "conversation record created");
        (record, false)
    }

    /// Clone out every record handle, releasing the map lock before returning.
    pub fn records(&self) -> Vec<(i64, Arc<ConversationRecord>)> {
        self.conversations
            .read()
            .iter()
            .map(|(id, record)| (*id, Arc::clone(record)))
            .collect()
    }

    pub(crate) fn conversations_lock(&self) -> &Arc<RwLock<ConversationMap>> {
        &self.conversations
    }
}

// ---------------------------------------------------------------------------
// RootStore
// ---------------------------------------------------------------------------

/// Root of the conversation store, shared by every task through an `Arc`.
#[derive(Debug)]
pub struct RootStore {
    shared_queues: BTreeMap<i64, RecencyQueue>,
    agents: Arc<RwLock<AgentMap>>,
}

impl RootStore {
    /// Create an empty store with one shared queue per public conversation id.
    pub fn new(shared_conversation_ids: impl IntoIterator<Item = i64>) -> Self {
        let shared_queues: BTreeMap<i64, RecencyQueue> = shared_conversation_ids
            .into_iter()
            .map(|id| (id, RecencyQueue::shared()))
            .collect();
        debug!(shared_queues = shared_queues.len(), "root store provisioned");
        Self {
            shared_queues,
            agents: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn shared_queue(&self, conversation_id: i64) -> Option<&RecencyQueue> {
        self.shared_queues.get(&conversation_id)
    }

    pub fn shared_queues(&self) -> impl Iterator<Item = (i64, &RecencyQueue)> {
        self.shared_queues.iter().map(|(id, queue)| (*id, queue))
    }

    pub fn agent(&self, agent_id: &str) -> Option<Arc<AgentDirectory>> {
        self.agents.read().get(agent_id).cloned()
    }

    /// Fetch the directory for `agent_id`, creating it on first use.
    pub fn get_or_create_agent(&self, agent_id: &str) -> Arc<AgentDirectory> {
        if let Some(directory) = self.agent(agent_id) {
            return directory;
        }

        let mut agents = self.agents.write();
        if let Some(directory) = agents.get(agent_id) {
            return Arc::clone(directory);
        }

        let directory = Arc::new(AgentDirectory::new());
        agents.insert(agent_id.to_string(), Arc::clone(&directory));
        debug!(agent_id, "agent directory created");
        directory
    }

    /// Fetch the record for one agent in one conversation, creating both
    /// levels on demand.
    ///
    /// A public conversation with a registered id shares its queue with every
    /// other agent; anything else gets an exclusive queue. The flag reports
    /// whether the record already existed.
    pub fn get_or_create_conversation(
        &self,
        agent_id: &str,
        conversation_id: i64,
        is_public: bool,
    ) -> (Arc<ConversationRecord>, bool) {
        let directory = self.get_or_create_agent(agent_id);
        let shared = if is_public {
            self.shared_queues.get(&conversation_id)
        } else {
            None
        };
        directory.get_or_create(conversation_id, shared)
    }

    /// Clone out every agent handle, releasing the table lock before returning.
    pub fn agents(&self) -> Vec<(String, Arc<AgentDirectory>)> {
        self.agents
            .read()
            .iter()
            .map(|(id, directory)| (id.clone(), Arc::clone(directory)))
            .collect()
    }

    pub(crate) fn agents_lock(&self) -> &Arc<RwLock<AgentMap>> {
        &self.agents
    }

    /// Aggregate counts. Each lock is taken on its own, so the figures are
    /// approximate while writers are active.
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            shared_queues: self.shared_queues.len(),
            lines: self.shared_queues.values().map(RecencyQueue::len).sum(),
            ..StoreStats::default()
        };

        for (_, directory) in self.agents() {
            stats.agents += 1;
            stats.contacts += directory.contacts().len();
            for (_, record) in directory.records() {
                stats.conversations += 1;
                stats.reply_links += record.chains().len();
                if !record.is_shared() {
                    stats.exclusive_queues += 1;
                    stats.lines += record.queue().len();
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hindsight_types::line::ObservedMessage;

    #[test]
    fn public_registered_conversation_shares_queue_across_agents() {
        let store = RootStore::new([-100]);
        let (luna, luna_existed) = store.get_or_create_conversation("luna", -100, true);
        let (sol, _) = store.get_or_create_conversation("sol", -100, true);

        assert!(!luna_existed);
        assert!(luna.is_shared());
        assert!(luna.queue().ptr_eq(sol.queue()));
        assert!(luna.queue().ptr_eq(store.shared_queue(-100).unwrap()));
        assert!(!Arc::ptr_eq(&luna, &sol));
    }

    #[test]
    fn private_or_unregistered_conversation_gets_exclusive_queue() {
        let store = RootStore::new([-100]);
        let (private, _) = store.get_or_create_conversation("luna", -100, false);
        let (unregistered, _) = store.get_or_create_conversation("luna", -200, true);
        assert!(!private.is_shared());
        assert!(!unregistered.is_shared());
    }

    #[test]
    fn second_lookup_returns_same_record() {
        let store = RootStore::new([]);
        let (first, existed) = store.get_or_create_conversation("luna", 7, false);
        assert!(!existed);
        let (second, existed) = store.get_or_create_conversation("luna", 7, false);
        assert!(existed);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn broadcast_message_is_stored_once_in_shared_queue() {
        let store = RootStore::new([-100]);
        let msg = ObservedMessage::new("ann", "Ann: hi all");
        for agent in ["luna", "sol", "terra"] {
            let (record, _) = store.get_or_create_conversation(agent, -100, true);
            record.observe(&msg);
        }
        assert_eq!(store.shared_queue(-100).unwrap().len(), 1);
    }

    #[test]
    fn stats_count_shared_lines_once() {
        let store = RootStore::new([-100]);
        let (luna, _) = store.get_or_create_conversation("luna", -100, true);
        store.get_or_create_conversation("sol", -100, true);
        let (dm, _) = store.get_or_create_conversation("sol", 42, false);
        luna.record(&ObservedMessage::new("ann", "Ann: hi").replying_to("Luna: hey"));
        dm.observe(&ObservedMessage::new("bob", "Bob: psst"));
        store
            .get_or_create_agent("sol")
            .contacts()
            .set("bob", Default::default());

        let stats = store.stats();
        assert_eq!(stats.agents, 2);
        assert_eq!(stats.conversations, 3);
        assert_eq!(stats.shared_queues, 1);
        assert_eq!(stats.exclusive_queues, 1);
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.reply_links, 1);
        assert_eq!(stats.contacts, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_observe_one_record() {
        let store = Arc::new(RootStore::new([]));
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                store.get_or_create_conversation("luna", 9, false)
            }));
        }

        let mut records = Vec::new();
        for handle in handles {
            records.push(handle.await.unwrap());
        }

        let created = records.iter().filter(|(_, existed)| !existed).count();
        assert_eq!(created, 1);
        let first = &records[0].0;
        assert!(records.iter().all(|(record, _)| Arc::ptr_eq(record, first)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_to_exclusive_queue_are_all_kept() {
        let store = Arc::new(RootStore::new([]));
        let (record, _) = store.get_or_create_conversation("luna", 1, false);

        let mut handles = Vec::new();
        for task in 0..8 {
            let record = Arc::clone(&record);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    record.append_line(&format!("line {task}-{i}"));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(record.queue().len(), 400);
    }
}
