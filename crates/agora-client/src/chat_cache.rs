//! Conversation cache.
//!
//! Ordered messages of the active conversation, fed by three paths: history
//! loads, send confirmations and push events. Append order is arrival order.
//! Every path deduplicates by message id, so a sender's own message that is
//! both confirmed over HTTP and echoed over the channel shows up once.
//!
//! Messages for other conversations are never cached; they bump that
//! conversation's unread counter instead.

use std::collections::{BTreeMap, HashSet};

use agora_proto::{ConversationId, Message, MessageId};

/// Result of appending a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Message was added at the end.
    Appended,
    /// A message with the same id is already cached.
    Duplicate,
    /// Message belongs to a conversation other than the active one.
    Inactive,
}

/// Messages of the active conversation plus unread counters for the others.
#[derive(Debug, Default)]
pub struct ConversationCache {
    active: Option<ConversationId>,
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
    unread: BTreeMap<ConversationId, usize>,
}

impl ConversationCache {
    /// Empty cache with no active conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Active conversation.
    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    /// Cached messages, in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of cached messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if no message is cached.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True if a message with `id` is cached.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Make `conversation_id` the active conversation.
    ///
    /// Switching to a different conversation drops the cached messages.
    /// Re-activating the current one keeps them until the next
    /// [`Self::replace`]. Returns the unread count that was cleared.
    pub fn activate(&mut self, conversation_id: ConversationId) -> usize {
        if self.active.as_ref() != Some(&conversation_id) {
            self.messages.clear();
            self.ids.clear();
        }
        let cleared = self.unread.remove(&conversation_id).unwrap_or(0);
        self.active = Some(conversation_id);
        cleared
    }

    /// Replace the cached messages wholesale with a server history.
    ///
    /// Returns `false` (and changes nothing) if `conversation_id` is not the
    /// active conversation. Repeated ids in `messages` are kept once, at their
    /// first position; messages of other conversations are skipped.
    pub fn replace(&mut self, conversation_id: &ConversationId, messages: Vec<Message>) -> bool {
        if self.active.as_ref() != Some(conversation_id) {
            return false;
        }

        self.messages.clear();
        self.ids.clear();
        for message in messages {
            if &message.conversation_id == conversation_id && self.ids.insert(message.id.clone()) {
                self.messages.push(message);
            }
        }
        true
    }

    /// Append a message, unless it is a duplicate or belongs elsewhere.
    pub fn append(&mut self, message: Message) -> AppendOutcome {
        if self.active.as_ref() != Some(&message.conversation_id) {
            return AppendOutcome::Inactive;
        }
        if !self.ids.insert(message.id.clone()) {
            return AppendOutcome::Duplicate;
        }
        self.messages.push(message);
        AppendOutcome::Appended
    }

    /// Count one more unread message for `conversation_id`. Returns the new
    /// count.
    pub fn mark_unread(&mut self, conversation_id: &ConversationId) -> usize {
        let count = self.unread.entry(conversation_id.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Unread messages for `conversation_id`.
    pub fn unread(&self, conversation_id: &ConversationId) -> usize {
        self.unread.get(conversation_id).copied().unwrap_or(0)
    }

    /// All non-zero unread counters.
    pub fn unread_counts(&self) -> &BTreeMap<ConversationId, usize> {
        &self.unread
    }

    /// Forget everything, including the active conversation.
    pub fn clear(&mut self) {
        self.active = None;
        self.messages.clear();
        self.ids.clear();
        self.unread.clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn msg(id: &str, conversation: &str) -> Message {
        Message {
            id: id.into(),
            conversation_id: conversation.into(),
            sender_id: "u2".into(),
            receiver_id: "u1".into(),
            content: format!("body of {id}"),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    fn ids(cache: &ConversationCache) -> Vec<&str> {
        cache.messages().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn append_keeps_arrival_order_and_dedups() {
        let mut cache = ConversationCache::new();
        cache.activate("c1".into());

        assert_eq!(cache.append(msg("m2", "c1")), AppendOutcome::Appended);
        assert_eq!(cache.append(msg("m1", "c1")), AppendOutcome::Appended);
        assert_eq!(cache.append(msg("m2", "c1")), AppendOutcome::Duplicate);

        assert_eq!(ids(&cache), vec!["m2", "m1"]);
    }

    #[test]
    fn messages_for_other_conversations_are_not_cached() {
        let mut cache = ConversationCache::new();
        assert_eq!(cache.append(msg("m1", "c1")), AppendOutcome::Inactive);

        cache.activate("c1".into());
        assert_eq!(cache.append(msg("m2", "c2")), AppendOutcome::Inactive);
        assert_eq!(cache.mark_unread(&"c2".into()), 1);
        assert_eq!(cache.mark_unread(&"c2".into()), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn switching_conversation_drops_messages_and_clears_unread() {
        let mut cache = ConversationCache::new();
        cache.activate("c1".into());
        cache.append(msg("m1", "c1"));
        cache.mark_unread(&"c2".into());

        assert_eq!(cache.activate("c2".into()), 1);
        assert!(cache.is_empty());
        assert!(!cache.contains(&"m1".into()));
        assert_eq!(cache.unread(&"c2".into()), 0);
    }

    #[test]
    fn reactivating_same_conversation_keeps_messages() {
        let mut cache = ConversationCache::new();
        cache.activate("c1".into());
        cache.append(msg("m1", "c1"));

        assert_eq!(cache.activate("c1".into()), 0);
        assert_eq!(ids(&cache), vec!["m1"]);
    }

    #[test]
    fn replace_only_applies_to_active_conversation() {
        let mut cache = ConversationCache::new();
        cache.activate("c2".into());

        assert!(!cache.replace(&"c1".into(), vec![msg("m1", "c1")]));
        assert!(cache.is_empty());

        assert!(cache.replace(&"c2".into(), vec![msg("m3", "c2"), msg("m4", "c2"), msg("m3", "c2")]));
        assert_eq!(ids(&cache), vec!["m3", "m4"]);
        assert_eq!(cache.append(msg("m4", "c2")), AppendOutcome::Duplicate);
    }

    #[test]
    fn replace_skips_foreign_messages() {
        let mut cache = ConversationCache::new();
        cache.activate("c1".into());

        assert!(cache.replace(&"c1".into(), vec![msg("m1", "c1"), msg("m2", "c9"), msg("m3", "c1")]));
        assert_eq!(ids(&cache), vec!["m1", "m3"]);
        assert!(!cache.contains(&"m2".into()));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache = ConversationCache::new();
        cache.activate("c1".into());
        cache.append(msg("m1", "c1"));
        cache.mark_unread(&"c9".into());

        cache.clear();
        assert_eq!(cache.active(), None);
        assert!(cache.is_empty());
        assert!(cache.unread_counts().is_empty());
    }
}
