use std::collections::HashSet;

/// Tracks the identity keys of records accepted during one pipeline run.
///
/// Only accepted records are marked. Rejected blocks are not tracked here,
/// so an edited message that becomes valid can still be picked up.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with keys accepted by earlier runs.
    pub fn with_known<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            seen: keys.into_iter().collect(),
        }
    }

    pub fn is_new(&self, identity_key: &str) -> bool {
        !self.seen.contains(identity_key)
    }

    pub fn mark_seen(&mut self, identity_key: &str) {
        self.seen.insert(identity_key.to_string());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
