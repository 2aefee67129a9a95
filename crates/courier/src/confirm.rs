use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::RwLock;

/// A sensitive prompt awaiting an explicit confirm/cancel from its conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub prompt: String,
}

const SHARD_COUNT: usize = 16;

/// Per-conversation pending-confirmation map, partitioned into fixed shards so
/// unrelated conversations never contend on one lock.
///
/// At most one entry per conversation: a new sensitive prompt overwrites any
/// existing entry (last-write-wins, no queueing). Uses `std::sync::RwLock`
/// (never held across `.await`) per codebase convention.
pub struct ConfirmationStore {
    shards: Vec<RwLock<HashMap<i64, PendingConfirmation>>>,
}

impl ConfirmationStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, conversation_id: i64) -> &RwLock<HashMap<i64, PendingConfirmation>> {
        let mut hasher = DefaultHasher::new();
        conversation_id.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    /// Store the prompt awaiting confirmation, replacing any existing entry
    /// for this conversation.
    pub fn set(&self, conversation_id: i64, prompt: impl Into<String>) {
        if let Ok(mut map) = self.shard(conversation_id).write() {
            map.insert(
                conversation_id,
                PendingConfirmation {
                    prompt: prompt.into(),
                },
            );
        }
    }

    /// Remove and return the pending entry for a conversation.
    ///
    /// `/confirm` uses this before calling the backend: the transition back
    /// to idle is unconditional on invocation, not on backend success.
    pub fn take(&self, conversation_id: i64) -> Option<PendingConfirmation> {
        self.shard(conversation_id)
            .write()
            .ok()
            .and_then(|mut map| map.remove(&conversation_id))
    }

    /// Clear any pending entry for a conversation. A no-op when idle.
    pub fn clear(&self, conversation_id: i64) {
        if let Ok(mut map) = self.shard(conversation_id).write() {
            map.remove(&conversation_id);
        }
    }

    /// Get a copy of the pending entry without removing it.
    pub fn get(&self, conversation_id: i64) -> Option<PendingConfirmation> {
        self.shard(conversation_id)
            .read()
            .ok()
            .and_then(|map| map.get(&conversation_id).cloned())
    }

    /// Number of conversations with a pending entry.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().map(|m| m.len()).unwrap_or(0))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConfirmationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let store = ConfirmationStore::new();
        assert!(store.is_empty());
        assert!(store.get(1).is_none());
        assert!(store.take(1).is_none());
    }

    #[test]
    fn set_then_take() {
        let store = ConfirmationStore::new();
        store.set(100, "delete everything");
        assert_eq!(store.len(), 1);

        let pending = store.take(100).unwrap();
        assert_eq!(pending.prompt, "delete everything");
        // take clears the entry
        assert!(store.is_empty());
        assert!(store.take(100).is_none());
    }

    #[test]
    fn new_prompt_overwrites_pending() {
        let store = ConfirmationStore::new();
        store.set(100, "first action");
        store.set(100, "second action");

        // Last-write-wins: zero or one entry per conversation, never more
        assert_eq!(store.len(), 1);
        assert_eq!(store.take(100).unwrap().prompt, "second action");
    }

    #[test]
    fn clear_is_idempotent() {
        let store = ConfirmationStore::new();
        store.set(100, "risky");
        store.clear(100);
        assert!(store.is_empty());

        // Clearing while idle is a no-op
        store.clear(100);
        assert!(store.is_empty());
    }

    #[test]
    fn conversations_are_independent() {
        let store = ConfirmationStore::new();
        store.set(100, "action for 100");
        store.set(200, "action for 200");
        assert_eq!(store.len(), 2);

        store.clear(100);
        assert_eq!(store.get(200).unwrap().prompt, "action for 200");
        assert!(store.get(100).is_none());
    }

    #[test]
    fn get_does_not_remove() {
        let store = ConfirmationStore::new();
        store.set(100, "risky");
        assert!(store.get(100).is_some());
        assert!(store.get(100).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_access_across_conversations() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(ConfirmationStore::new());
        let mut handles = Vec::new();

        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.set(i, format!("prompt {i}"));
                assert_eq!(store.get(i).unwrap().prompt, format!("prompt {i}"));
                if i % 2 == 0 {
                    store.take(i);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 16);
    }

    #[test]
    fn negative_conversation_ids() {
        // Telegram group chat IDs are negative
        let store = ConfirmationStore::new();
        store.set(-1001234, "group action");
        assert_eq!(store.take(-1001234).unwrap().prompt, "group action");
    }
}
