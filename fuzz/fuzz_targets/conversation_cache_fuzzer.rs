//! Fuzz target for the ConversationCache
//!
//! Drives activations, history loads, appends and unread marks in arbitrary
//! order across a handful of conversations.
//!
//! # Invariants
//!
//! - No message id is cached twice
//! - Every cached message belongs to the active conversation
//! - Appends never reorder what is already cached
//! - The active conversation never has an unread count

#![no_main]

use std::collections::HashSet;

use agora_client::{AppendOutcome, ConversationCache};
use agora_proto::{ConversationId, Message};
use arbitrary::Arbitrary;
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum CacheOp {
    Activate { conversation: u8 },
    Replace { conversation: u8, messages: Vec<(u8, u8)> },
    Append { conversation: u8, message: u8 },
    MarkUnread { conversation: u8 },
    Clear,
}

fn conversation_id(n: u8) -> ConversationId {
    ConversationId::new(format!("c{}", n % 4))
}

fn message(conversation: u8, id: u8) -> Message {
    Message {
        id: format!("m{id}").into(),
        conversation_id: conversation_id(conversation),
        sender_id: "u1".into(),
        receiver_id: "u2".into(),
        content: String::new(),
        created_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

fuzz_target!(|ops: Vec<CacheOp>| {
    let mut cache = ConversationCache::new();

    for op in ops {
        match op {
            CacheOp::Activate { conversation } => {
                cache.activate(conversation_id(conversation));
            },
            CacheOp::Replace { conversation, messages } => {
                let messages = messages.into_iter().map(|(c, m)| message(c, m)).collect();
                cache.replace(&conversation_id(conversation), messages);
            },
            CacheOp::Append { conversation, message: id } => {
                let before: Vec<_> = cache.messages().iter().map(|m| m.id.clone()).collect();
                let outcome = cache.append(message(conversation, id));
                let after: Vec<_> = cache.messages().iter().map(|m| m.id.clone()).collect();

                assert_eq!(&after[..before.len()], &before[..]);
                match outcome {
                    AppendOutcome::Appended => assert_eq!(after.len(), before.len() + 1),
                    AppendOutcome::Duplicate | AppendOutcome::Inactive => assert_eq!(after, before),
                }
            },
            CacheOp::MarkUnread { conversation } => {
                let id = conversation_id(conversation);
                if cache.active() != Some(&id) {
                    cache.mark_unread(&id);
                }
            },
            CacheOp::Clear => cache.clear(),
        }

        let mut seen = HashSet::new();
        for cached in cache.messages() {
            assert!(seen.insert(cached.id.clone()), "duplicate id {}", cached.id);
            assert_eq!(Some(&cached.conversation_id), cache.active());
        }
        if let Some(active) = cache.active() {
            assert_eq!(cache.unread(active), 0);
        }
    }
});
