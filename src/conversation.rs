/// Conversation buffer — the one active, not-yet-archived conversation.
///
/// Turns are appended optimistically: the user turn lands the moment a send
/// starts, and the assistant turn is inserted next to it when the backend
/// responds. Each outstanding send carries a monotonically increasing
/// sequence number so replies pair with the submission that caused them even
/// when round-trips overlap and responses arrive out of order.
use crate::history::HistoryEntry;

/// Topic a fresh conversation starts under, until the backend classifies it.
pub const DEFAULT_TOPIC: &str = "General";

// ── Turn ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One message unit. Immutable once created; ordering is insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

// ── Buffer ────────────────────────────────────────────────────────────────────

/// A turn plus the sequence number of the send it belongs to.
/// `seq` is Some only while the round-trip for that user turn is outstanding.
#[derive(Debug, Clone)]
struct Slot {
    turn: Turn,
    seq: Option<u64>,
}

pub struct ConversationBuffer {
    topic: String,
    slots: Vec<Slot>,
    next_seq: u64,
    /// Highest seq whose backend topic has been applied — a stale response
    /// must not clobber the topic reported by a newer one.
    topic_seq: u64,
}

impl Default for ConversationBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            slots: Vec::new(),
            next_seq: 0,
            topic_seq: 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.slots.iter().map(|s| &s.turn)
    }

    /// Start a send: append the user turn immediately (optimistic) and hand
    /// back the sequence number the eventual response must quote.
    pub fn begin_turn(&mut self, text: &str) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.slots.push(Slot {
            turn: Turn::user(text),
            seq: Some(seq),
        });
        seq
    }

    /// Apply a backend response. The assistant turn is inserted directly
    /// after the user turn that carries `seq`, so pairing stays strict even
    /// when replies for overlapping sends arrive out of order.
    ///
    /// Returns false (and applies nothing) if the buffer no longer knows the
    /// seq — it was reset or replaced while the call was in flight.
    pub fn complete_turn(&mut self, seq: u64, formatted: &str, topic: &str) -> bool {
        let Some(idx) = self.slots.iter().position(|s| s.seq == Some(seq)) else {
            return false;
        };
        self.slots[idx].seq = None;
        self.slots.insert(
            idx + 1,
            Slot {
                turn: Turn::assistant(formatted),
                seq: None,
            },
        );
        // Backend is the authority on topic; latest submission wins.
        if seq > self.topic_seq {
            self.topic_seq = seq;
            self.topic = topic.to_string();
        }
        true
    }

    /// A send failed: the optimistic user turn stays, but the pairing slot is
    /// released so a later (impossible) reply for this seq is ignored.
    pub fn abandon_turn(&mut self, seq: u64) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.seq == Some(seq)) {
            slot.seq = None;
        }
    }

    /// Clear all turns and fall back to the default topic. Used on "new chat"
    /// (after archiving) and on logout. Outstanding seqs become unknown, so
    /// late responses are dropped by `complete_turn`.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.topic = DEFAULT_TOPIC.to_string();
        self.topic_seq = self.next_seq;
    }

    /// Replace the buffer with an archived conversation. No network involved.
    pub fn load(&mut self, entry: &HistoryEntry) {
        self.slots = entry
            .turns
            .iter()
            .cloned()
            .map(|turn| Slot { turn, seq: None })
            .collect();
        self.topic = entry.topic.clone();
        self.topic_seq = self.next_seq;
    }

    /// Snapshot the buffer as a history entry candidate.
    pub fn snapshot(&self) -> HistoryEntry {
        HistoryEntry {
            topic: self.topic.clone(),
            turns: self.turns().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format;

    #[test]
    fn test_submit_round_trip() {
        // Mock backend returns {response: "### Hi\nok", topic: "Greeting"}
        let mut buf = ConversationBuffer::new();
        let seq = buf.begin_turn("hello");

        let formatted = format::format("### Hi\nok");
        assert!(buf.complete_turn(seq, &formatted, "Greeting"));

        let turns: Vec<&Turn> = buf.turns().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "hello");
        assert_eq!(turns[1].role, Role::Assistant);
        assert!(turns[1].text.contains("<h3>Hi</h3>"));
        assert!(turns[1].text.ends_with("ok"));
        assert_eq!(buf.topic(), "Greeting");
    }

    #[test]
    fn test_out_of_order_replies_pair_with_their_user_turn() {
        let mut buf = ConversationBuffer::new();
        let s1 = buf.begin_turn("first");
        let s2 = buf.begin_turn("second");

        // Second reply lands before the first
        assert!(buf.complete_turn(s2, "answer two", "T2"));
        assert!(buf.complete_turn(s1, "answer one", "T1"));

        let texts: Vec<&str> = buf.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["first", "answer one", "second", "answer two"]);
        // Topic from the older submission must not clobber the newer one
        assert_eq!(buf.topic(), "T2");
    }

    #[test]
    fn test_reply_after_reset_is_dropped() {
        let mut buf = ConversationBuffer::new();
        let seq = buf.begin_turn("hello");
        buf.reset();
        assert!(!buf.complete_turn(seq, "late answer", "Stale"));
        assert!(buf.is_empty());
        assert_eq!(buf.topic(), DEFAULT_TOPIC);
    }

    #[test]
    fn test_reply_after_load_is_dropped() {
        let mut buf = ConversationBuffer::new();
        let seq = buf.begin_turn("hello");
        buf.load(&HistoryEntry {
            topic: "Exams".to_string(),
            turns: vec![Turn::user("when are finals?")],
        });
        assert!(!buf.complete_turn(seq, "late", "Stale"));
        assert_eq!(buf.topic(), "Exams");
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_abandon_keeps_user_turn() {
        let mut buf = ConversationBuffer::new();
        let seq = buf.begin_turn("hello");
        buf.abandon_turn(seq);
        assert_eq!(buf.len(), 1);
        // The seq is released, so a ghost reply is ignored
        assert!(!buf.complete_turn(seq, "ghost", "X"));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_load_then_snapshot_round_trips() {
        let entry = HistoryEntry {
            topic: "Fees".to_string(),
            turns: vec![Turn::user("fee deadline?"), Turn::assistant("March 1.")],
        };
        let mut buf = ConversationBuffer::new();
        buf.load(&entry);
        assert_eq!(buf.snapshot(), entry);
    }

    #[test]
    fn test_empty_submission_is_sent_unchanged() {
        // Observed behavior: no guard on empty/whitespace input
        let mut buf = ConversationBuffer::new();
        buf.begin_turn("   ");
        assert_eq!(buf.turns().next().unwrap().text, "   ");
    }
}
