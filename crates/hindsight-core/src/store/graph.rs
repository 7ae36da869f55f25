//! Reply graph: which line answered which.
//!
//! Each key is a reply line, each value the line it replied to. Keys are
//! unique, so a later reply with the same text overwrites the earlier link.
//! Nothing prevents cycles or self-links; [`ReplyGraph::chain`] walks a
//! bounded number of steps and never recurses.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use hindsight_types::line::ReplyLink;
use parking_lot::RwLock;
use tracing::debug;

const GRAPH_CAPACITY: usize = 256;

/// Number of lines a chain starts with when the message is a reply.
const CHAIN_SEED_LEN: usize = 2;

#[derive(Debug, Clone)]
pub struct ReplyGraph {
    links: Arc<RwLock<HashMap<String, ReplyLink>>>,
}

impl Default for ReplyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyGraph {
    pub fn new() -> Self {
        Self::with_links(HashMap::with_capacity(GRAPH_CAPACITY))
    }

    pub(crate) fn with_links(links: HashMap<String, ReplyLink>) -> Self {
        Self {
            links: Arc::new(RwLock::new(links)),
        }
    }

    pub(crate) fn lock(&self) -> &Arc<RwLock<HashMap<String, ReplyLink>>> {
        &self.links
    }

    /// Record that `last_line` replied to `prev_line`, stamped now.
    ///
    /// Returns `false` without touching the graph when `prev_line` is empty.
    pub fn link(&self, last_line: &str, prev_line: &str) -> bool {
        self.link_at(last_line, prev_line, Utc::now())
    }

    pub fn link_at(&self, last_line: &str, prev_line: &str, at: DateTime<Utc>) -> bool {
        if prev_line.is_empty() {
            return false;
        }

        self.links
            .write()
            .insert(last_line.to_string(), ReplyLink::at(prev_line, at));
        debug!(last_line, prev_line, "reply link added");
        true
    }

    /// The line `line` replied to, if known.
    pub fn predecessor(&self, line: &str) -> Option<String> {
        self.links.read().get(line).map(|link| link.prev_line.clone())
    }

    /// Reconstruct the reply chain ending in `last_line`, oldest first.
    ///
    /// Without a `prev_line` the chain is just `[last_line]`. Otherwise it
    /// holds at most `limit` lines; a `limit` below 2 still yields the pair.
    pub fn chain(&self, last_line: &str, prev_line: &str, limit: usize) -> Vec<String> {
        if prev_line.is_empty() {
            debug!("message is not a reply, chain not unrolled");
            return vec![last_line.to_string()];
        }

        let links = self.links.read();
        let mut chain = Vec::with_capacity(limit.max(CHAIN_SEED_LEN));
        chain.push(last_line.to_string());
        chain.push(prev_line.to_string());

        let mut tail = prev_line;
        for _ in 0..limit.saturating_sub(CHAIN_SEED_LEN) {
            let Some(link) = links.get(tail) else {
                break;
            };
            chain.push(link.prev_line.clone());
            tail = &link.prev_line;
        }
        drop(links);

        chain.reverse();
        debug!(chain_len = chain.len(), "got reply chain");
        chain
    }

    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }

    /// Delete every link older than `ttl`. Returns the number removed.
    pub fn evict_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> usize {
        let mut links = self.links.write();
        let before = links.len();
        links.retain(|_, link| !link.is_expired(now, ttl));
        before - links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// E replied to D, D to C, C to B, B to A.
    fn linear_graph() -> ReplyGraph {
        let graph = ReplyGraph::new();
        graph.link("E", "D");
        graph.link("D", "C");
        graph.link("C", "B");
        graph.link("B", "A");
        graph
    }

    #[test]
    fn chain_is_chronological_and_bounded() {
        let graph = linear_graph();
        assert_eq!(graph.chain("E", "D", 4), vec!["B", "C", "D", "E"]);
        assert_eq!(graph.chain("E", "D", 2), vec!["D", "E"]);
        assert_eq!(graph.chain("E", "D", 100), vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn chain_without_prev_line_is_single_line() {
        let graph = linear_graph();
        assert_eq!(graph.chain("E", "", 10), vec!["E"]);
    }

    #[test]
    fn chain_with_small_limit_keeps_the_pair() {
        let graph = linear_graph();
        assert_eq!(graph.chain("E", "D", 0), vec!["D", "E"]);
        assert_eq!(graph.chain("E", "D", 1), vec!["D", "E"]);
    }

    #[test]
    fn chain_stops_at_unknown_line() {
        let graph = ReplyGraph::new();
        graph.link("Z", "Y");
        assert_eq!(graph.chain("new", "X", 10), vec!["X", "new"]);
    }

    #[test]
    fn self_link_is_bounded_by_limit() {
        let graph = ReplyGraph::new();
        graph.link("loop", "loop");
        let chain = graph.chain("next", "loop", 5);
        assert_eq!(chain, vec!["loop", "loop", "loop", "loop", "next"]);
    }

    #[test]
    fn cycle_is_bounded_by_limit() {
        let graph = ReplyGraph::new();
        graph.link("a", "b");
        graph.link("b", "a");
        assert_eq!(graph.chain("b", "a", 6).len(), 6);
    }

    #[test]
    fn empty_prev_line_is_not_linked() {
        let graph = ReplyGraph::new();
        assert!(!graph.link("A", ""));
        assert!(graph.is_empty());
    }

    #[test]
    fn later_link_overwrites_earlier() {
        let graph = ReplyGraph::new();
        graph.link("ok", "first");
        graph.link("ok", "second");
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.predecessor("ok").as_deref(), Some("second"));
    }

    #[test]
    fn evict_expired_removes_only_old_links() {
        let t0 = Utc::now() - TimeDelta::hours(2);
        let graph = ReplyGraph::new();
        graph.link_at("old", "older", t0);
        graph.link_at("recent", "old", t0 + TimeDelta::minutes(45));

        let evicted = graph.evict_expired(t0 + TimeDelta::minutes(61), TimeDelta::hours(1));
        assert_eq!(evicted, 1);
        assert_eq!(graph.predecessor("old"), None);
        assert_eq!(graph.predecessor("recent").as_deref(), Some("old"));
    }
}
