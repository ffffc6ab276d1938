//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use agora_core::ChannelState;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// At most one live channel per session.
///
/// The server never holds more than one channel for a client, and a client
/// that believes it is disconnected holds none.
pub struct SingleChannel;

impl Invariant for SingleChannel {
    fn name(&self) -> &'static str {
        "single_channel"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.live_connections > 1 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{}: {} live channels", client.label, client.live_connections),
                });
            }
            if client.channel == ChannelState::Disconnected && client.live_connections > 0 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{}: disconnected but server holds a channel", client.label),
                });
            }
        }
        Ok(())
    }
}

/// Without a session there is no channel, no cached data, and no user on
/// screen.
pub struct LoggedOutIsEmpty;

impl Invariant for LoggedOutIsEmpty {
    fn name(&self) -> &'static str {
        "logged_out_is_empty"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in state.clients.iter().filter(|c| c.user.is_none()) {
            let leftovers = [
                (client.channel != ChannelState::Disconnected, "channel not disconnected"),
                (client.live_connections > 0, "live channel"),
                (client.app_user.is_some(), "user still shown"),
                (client.active_conversation.is_some(), "active conversation"),
                (!client.cached_messages.is_empty(), "cached messages"),
                (client.contacts > 0, "cached contacts"),
                (client.online > 0, "presence set"),
                (client.unread > 0, "unread badges"),
            ];
            let found: Vec<_> = leftovers.iter().filter(|(bad, _)| *bad).map(|(_, what)| *what).collect();
            if !found.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{}: logged out with {}", client.label, found.join(", ")),
                });
            }
        }
        Ok(())
    }
}

/// Each message id appears at most once, in the cache and on screen.
pub struct NoDuplicateMessages;

impl Invariant for NoDuplicateMessages {
    fn name(&self) -> &'static str {
        "no_duplicate_messages"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let lists = std::iter::once(&client.cached_messages).chain(client.view.as_ref().map(|(_, m)| m));
            for messages in lists {
                let mut seen = HashSet::new();
                if let Some((id, _)) = messages.iter().find(|(id, _)| !seen.insert(id)) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("{}: message {id} shown twice", client.label),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Cached messages belong to the active conversation, and the screen only
/// shows messages of the conversation it displays.
pub struct CacheScopedToActiveConversation;

impl Invariant for CacheScopedToActiveConversation {
    fn name(&self) -> &'static str {
        "cache_scoped_to_active_conversation"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let stray = client
                .cached_messages
                .iter()
                .find(|(_, conversation)| client.active_conversation.as_ref() != Some(conversation));
            if let Some((id, conversation)) = stray {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{}: cached message {id} of {conversation} while active is {:?}",
                        client.label, client.active_conversation
                    ),
                });
            }

            if let Some((shown, messages)) = &client.view
                && let Some((id, conversation)) = messages.iter().find(|(_, c)| c != shown)
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{}: {shown} on screen shows message {id} of {conversation}", client.label),
                });
            }
        }
        Ok(())
    }
}
