//! Per-agent contact book.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hindsight_types::contact::ContactInfo;
use parking_lot::RwLock;

/// Contact metadata one agent keeps about the users it has met, keyed by user id.
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    entries: Arc<RwLock<BTreeMap<String, ContactInfo>>>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_entries(entries: BTreeMap<String, ContactInfo>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub(crate) fn lock(&self) -> &Arc<RwLock<BTreeMap<String, ContactInfo>>> {
        &self.entries
    }

    /// Current info for `user_id`, or a neutral default for an unknown user.
    pub fn get(&self, user_id: &str) -> ContactInfo {
        self.entries.read().get(user_id).cloned().unwrap_or_default()
    }

    /// Replace the info for `user_id`.
    pub fn set(&self, user_id: impl Into<String>, info: ContactInfo) {
        self.entries.write().insert(user_id.into(), info);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Display for ContactBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();

        writeln!(f, "Contacts (users known to you):")?;
        if entries.is_empty() {
            return write!(f, "<no contacts>");
        }
        for (user_id, info) in entries.iter() {
            writeln!(f, "user: {user_id}\n{info}")?;
        }
        Ok(())
    }
}
