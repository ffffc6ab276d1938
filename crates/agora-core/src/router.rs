//! Channel event routing.
//!
//! Maps each [`EventKind`] to at most one handler. Subscribing again for the
//! same kind replaces the previous handler instead of adding a second one, so
//! re-running setup (after a reconnect, or after switching conversations)
//! never delivers an event twice.

use std::{collections::BTreeMap, fmt::Debug, ops::Sub, time::Duration};

use agora_proto::{ChannelEvent, EventKind};

use crate::channel::{ChannelAction, ChannelHandle};

/// Routes decoded channel events to registered handlers.
///
/// The handler type is left to the caller: a closure, a trait object, or a
/// plain enum tag the caller dispatches on.
#[derive(Debug, Clone)]
pub struct EventRouter<H> {
    handlers: BTreeMap<EventKind, H>,
}

impl<H> Default for EventRouter<H> {
    fn default() -> Self {
        Self { handlers: BTreeMap::new() }
    }
}

impl<H> EventRouter<H> {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, returning the handler it replaced.
    pub fn subscribe(&mut self, kind: EventKind, handler: H) -> Option<H> {
        let previous = self.handlers.insert(kind, handler);
        if previous.is_some() {
            tracing::debug!(%kind, "replaced event handler");
        }
        previous
    }

    /// Remove the handler for `kind`. No-op if none is registered.
    pub fn unsubscribe(&mut self, kind: EventKind) -> Option<H> {
        self.handlers.remove(&kind)
    }

    /// Handler registered for `kind`.
    pub fn handler(&self, kind: EventKind) -> Option<&H> {
        self.handlers.get(&kind)
    }

    /// True if a handler is registered for `kind`.
    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Remove every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Handler for an inbound event. Events without a subscriber are dropped.
    pub fn route(&self, event: &ChannelEvent) -> Option<&H> {
        let kind = event.kind();
        let handler = self.handlers.get(&kind);
        if handler.is_none() {
            tracing::trace!(%kind, "no handler, dropping event");
        }
        handler
    }

    /// Emit `event` over `channel` if it is Connected.
    ///
    /// Emitting on a closed channel is not an error for callers: the event is
    /// dropped and logged.
    pub fn emit<I>(&self, channel: &ChannelHandle<I>, event: ChannelEvent) -> Option<ChannelAction>
    where
        I: Copy + Ord + Send + Sync + Debug + Sub<Output = Duration>,
    {
        let kind = event.kind();
        match channel.emit(event) {
            Ok(action) => Some(action),
            Err(err) => {
                tracing::warn!(%kind, error = %err, "dropping outbound event");
                None
            },
        }
    }
}
