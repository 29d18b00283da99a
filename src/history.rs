/// Chat history registry — archived conversations, newest first.
///
/// Entries come from two sources: local archiving when the user starts a new
/// chat, and the bulk snapshot fetched from the backend at login. The
/// reconciler rules are small but load-bearing:
///   - archiving skips duplicates (same topic AND structurally identical
///     turn sequence); same topic with different turns is legal and coexists;
///   - a server snapshot wholesale-replaces whatever is held locally;
///   - deletion is topic-scoped — every entry under the topic goes, matching
///     the backend's session model — and runs only after the backend
///     confirmed the delete, so local and server state cannot diverge.
use crate::conversation::Turn;

/// An archived conversation, structurally identical to a committed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub topic: String,
    pub turns: Vec<Turn>,
}

#[derive(Default)]
pub struct HistoryRegistry {
    entries: Vec<HistoryEntry>,
}

impl HistoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, idx: usize) -> Option<&HistoryEntry> {
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a candidate at the front unless it is empty or a duplicate.
    /// Returns true if the entry was actually added.
    ///
    /// Duplicate means an existing entry with the same topic and an identical
    /// turn sequence. Comparing full sequences is O(entries × turns), fine at
    /// this scale; a content fingerprint would replace it if it ever isn't.
    pub fn archive(&mut self, candidate: HistoryEntry) -> bool {
        if candidate.turns.is_empty() {
            return false;
        }
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.topic == candidate.topic && e.turns == candidate.turns);
        if duplicate {
            return false;
        }
        self.entries.insert(0, candidate);
        true
    }

    /// Replace the registry with the server snapshot, in server-given order.
    pub fn replace_from_server(&mut self, entries: Vec<HistoryEntry>) {
        self.entries = entries;
    }

    /// Remove every entry under `topic`. Returns how many were removed.
    /// Call only after the backend confirmed the deletion.
    pub fn remove_topic(&mut self, topic: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.topic != topic);
        before - self.entries.len()
    }

    /// Drop everything. Used on logout — history is never persisted locally
    /// and is re-fetched from the backend on next login.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    fn entry(topic: &str, texts: &[&str]) -> HistoryEntry {
        HistoryEntry {
            topic: topic.to_string(),
            turns: texts.iter().map(|t| Turn::user(*t)).collect(),
        }
    }

    #[test]
    fn test_archive_is_idempotent() {
        let mut reg = HistoryRegistry::new();
        assert!(reg.archive(entry("Fees", &["how much?"])));
        assert!(!reg.archive(entry("Fees", &["how much?"])));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_archive_skips_empty() {
        let mut reg = HistoryRegistry::new();
        assert!(!reg.archive(entry("Fees", &[])));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_same_topic_different_turns_coexist() {
        let mut reg = HistoryRegistry::new();
        assert!(reg.archive(entry("Fees", &["spring fees?"])));
        assert!(reg.archive(entry("Fees", &["fall fees?"])));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_archive_inserts_at_front() {
        let mut reg = HistoryRegistry::new();
        reg.archive(entry("Old", &["a"]));
        reg.archive(entry("New", &["b"]));
        assert_eq!(reg.entries()[0].topic, "New");
        assert_eq!(reg.entries()[1].topic, "Old");
    }

    #[test]
    fn test_replace_from_server_supersedes() {
        let mut reg = HistoryRegistry::new();
        reg.archive(entry("A", &["x"]));
        reg.replace_from_server(vec![entry("B", &["y"]), entry("C", &["z"])]);
        let topics: Vec<&str> = reg.entries().iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, ["B", "C"]);
    }

    #[test]
    fn test_remove_topic_is_topic_scoped() {
        let mut reg = HistoryRegistry::new();
        reg.replace_from_server(vec![
            entry("T", &["msgs1"]),
            entry("T", &["msgs2"]),
            entry("U", &["msgs3"]),
        ]);
        assert_eq!(reg.remove_topic("T"), 2);
        let topics: Vec<&str> = reg.entries().iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, ["U"]);
    }

    #[test]
    fn test_remove_missing_topic_is_noop() {
        let mut reg = HistoryRegistry::new();
        reg.archive(entry("U", &["m"]));
        assert_eq!(reg.remove_topic("T"), 0);
        assert_eq!(reg.len(), 1);
    }
}
