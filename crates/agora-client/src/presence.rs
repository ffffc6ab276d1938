//! Contact and presence caches.
//!
//! Both are replaced wholesale: contacts by a fresh fetch, presence by each
//! snapshot pushed over the channel. There is no incremental online/offline
//! tracking, so presence may be stale between snapshots.

use std::collections::BTreeSet;

use agora_proto::{UserId, UserProfile};

/// Users the current user can message.
#[derive(Debug, Default)]
pub struct ContactCache {
    contacts: Vec<UserProfile>,
}

impl ContactCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list.
    pub fn replace(&mut self, contacts: Vec<UserProfile>) {
        self.contacts = contacts;
    }

    /// Cached contacts, in server order.
    pub fn contacts(&self) -> &[UserProfile] {
        &self.contacts
    }

    /// Contact with `id`.
    pub fn get(&self, id: &UserId) -> Option<&UserProfile> {
        self.contacts.iter().find(|c| &c.id == id)
    }

    /// Number of contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// True if there are no contacts.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Drop all contacts.
    pub fn clear(&mut self) {
        self.contacts.clear();
    }
}

/// Ids of the users currently online.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PresenceSet {
    online: BTreeSet<UserId>,
}

impl PresenceSet {
    /// Nobody online.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set with `snapshot`. Returns `true` if it changed.
    pub fn replace(&mut self, snapshot: impl IntoIterator<Item = UserId>) -> bool {
        let next: BTreeSet<UserId> = snapshot.into_iter().collect();
        if next == self.online {
            return false;
        }
        self.online = next;
        true
    }

    /// True if `id` was in the last snapshot.
    pub fn is_online(&self, id: &UserId) -> bool {
        self.online.contains(id)
    }

    /// Online ids, sorted.
    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.online.iter()
    }

    /// Online ids as a sorted list.
    pub fn to_vec(&self) -> Vec<UserId> {
        self.online.iter().cloned().collect()
    }

    /// Number of online users.
    pub fn len(&self) -> usize {
        self.online.len()
    }

    /// True if nobody is online.
    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    /// Forget the last snapshot.
    pub fn clear(&mut self) {
        self.online.clear();
    }
}
