//! Persistent channel lifecycle.
//!
//! Tracks the single live connection a session owns. Uses the action pattern:
//! methods take time as input and return actions for the driver to execute.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐  connect   ┌────────────┐   transport ack   ┌───────────┐
//! │ Disconnected │───────────>│ Connecting │──────────────────>│ Connected │
//! └──────────────┘            └────────────┘                   └───────────┘
//!        ^  ^                       │ timeout/failure                │
//!        │  └───────────────────────┘                                │
//!        └───────────────────── disconnect / transport failure ──────┘
//! ```
//!
//! At most one connection exists at a time: `connect` while Connecting or
//! Connected is a no-op. After an unexpected failure the handle may schedule
//! a reconnect according to its [`ReconnectPolicy`]; an explicit
//! `disconnect` cancels it.

use std::{fmt::Debug, ops::Sub, time::Duration};

use agora_proto::{ChannelEvent, UserId};

use crate::error::ConnectionError;

/// Time allowed for the transport to acknowledge a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// First reconnect delay.
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_secs(1);

/// Upper bound on reconnect delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Growth factor between consecutive reconnect delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Jitter applied to each reconnect delay, in percent of the delay.
const JITTER_PERCENT: u64 = 20;

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No connection.
    Disconnected,
    /// Connection requested, waiting for transport acknowledgment.
    Connecting,
    /// Connection acknowledged and usable.
    Connected,
}

/// What to do after the transport fails unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stay Disconnected until the next explicit connect.
    Manual,
    /// Reconnect automatically with exponential backoff.
    Backoff {
        /// Delay before the first attempt.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Growth factor per failed attempt.
        multiplier: u32,
    },
}

impl ReconnectPolicy {
    /// Backoff with the default delays.
    pub fn backoff() -> Self {
        Self::Backoff {
            initial: DEFAULT_BACKOFF_INITIAL,
            max: DEFAULT_BACKOFF_MAX,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Delay before reconnect attempt `attempt` (zero-based). `None` for
    /// [`ReconnectPolicy::Manual`].
    ///
    /// `entropy` spreads the delay uniformly over +/-20% so that clients
    /// dropped by the same outage do not reconnect in lockstep.
    pub fn delay(&self, attempt: u32, entropy: u64) -> Option<Duration> {
        match *self {
            Self::Manual => None,
            Self::Backoff { initial, max, multiplier } => {
                let base = initial.saturating_mul(multiplier.saturating_pow(attempt)).min(max);
                let base_ms = base.as_millis() as u64;
                let spread = base_ms * JITTER_PERCENT / 100;
                let offset = entropy % (2 * spread + 1);
                Some(Duration::from_millis(base_ms - spread + offset))
            },
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Timeout for the transport acknowledgment.
    pub connect_timeout: Duration,
    /// Behavior after unexpected failures.
    pub reconnect: ReconnectPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { connect_timeout: DEFAULT_CONNECT_TIMEOUT, reconnect: ReconnectPolicy::backoff() }
    }
}

/// Actions returned by the channel state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelAction {
    /// Open a transport connection identified by this user.
    Open {
        /// Identity parameter passed at connect time.
        user_id: UserId,
    },
    /// Close the transport connection.
    Close,
    /// Send an event over the open connection.
    Emit(ChannelEvent),
}

#[derive(Debug, Clone, Copy)]
struct ScheduledReconnect<I> {
    since: I,
    delay: Duration,
}

/// The session's persistent connection.
///
/// Pure state machine: no I/O, time passed as parameters. Generic over
/// `Instant` to support virtual time in simulation.
#[derive(Debug, Clone)]
pub struct ChannelHandle<I = std::time::Instant> {
    state: ChannelState,
    config: ChannelConfig,
    /// Identity of the current (or last failed) connection. Cleared by
    /// `disconnect`.
    user_id: Option<UserId>,
    connecting_since: Option<I>,
    reconnect: Option<ScheduledReconnect<I>>,
    /// Consecutive failures since the last successful open.
    failures: u32,
    /// Total number of `Open` actions issued.
    open_requests: u64,
}

impl<I> ChannelHandle<I>
where
    I: Copy + Ord + Send + Sync + Debug + Sub<Output = Duration>,
{
    /// Create a Disconnected handle.
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            state: ChannelState::Disconnected,
            config,
            user_id: None,
            connecting_since: None,
            reconnect: None,
            failures: 0,
            open_requests: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// True only when Connected.
    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    /// User the connection is (or was last) opened for.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// True if a reconnect attempt is scheduled.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Number of `Open` actions issued over the handle's lifetime.
    pub fn open_requests(&self) -> u64 {
        self.open_requests
    }

    /// Channel configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Open the channel for `user_id`.
    ///
    /// No-op when there is no current user, or when a connection is already
    /// Connecting or Connected. Cancels any scheduled reconnect.
    pub fn connect(&mut self, user_id: Option<&UserId>, now: I) -> Vec<ChannelAction> {
        let Some(user_id) = user_id else {
            tracing::debug!("connect skipped: no current user");
            return vec![];
        };

        if self.state != ChannelState::Disconnected {
            tracing::debug!(state = ?self.state, "connect skipped: channel already open");
            return vec![];
        }

        self.reconnect = None;
        self.start_connecting(user_id.clone(), now)
    }

    /// Transport acknowledged the connection.
    ///
    /// An acknowledgment for a connection that was abandoned in the meantime
    /// (disconnect or timeout while Connecting) closes it again.
    pub fn on_open(&mut self) -> Vec<ChannelAction> {
        match self.state {
            ChannelState::Connecting => {
                self.state = ChannelState::Connected;
                self.connecting_since = None;
                self.failures = 0;
                tracing::info!(user_id = ?self.user_id, "channel connected");
                vec![]
            },
            ChannelState::Connected => {
                tracing::debug!("duplicate open acknowledgment ignored");
                vec![]
            },
            ChannelState::Disconnected => {
                tracing::debug!("open acknowledgment for abandoned connection, closing it");
                vec![ChannelAction::Close]
            },
        }
    }

    /// Transport closed or failed without being asked to.
    ///
    /// Leaves the handle Disconnected and, depending on the policy, schedules
    /// a reconnect.
    pub fn on_closed(&mut self, reason: &str, now: I, entropy: u64) -> Vec<ChannelAction> {
        if self.state == ChannelState::Disconnected {
            tracing::debug!(%reason, "close notification while already disconnected");
            return vec![];
        }

        let err = ConnectionError::Transport(reason.to_owned());
        tracing::warn!(error = %err, state = ?self.state, "channel lost");
        self.fail(now, entropy);
        vec![]
    }

    /// Close the channel on request.
    ///
    /// No-op when already Disconnected. Cancels any scheduled reconnect and
    /// forgets the user identity.
    pub fn disconnect(&mut self) -> Vec<ChannelAction> {
        let previous = self.state;

        self.state = ChannelState::Disconnected;
        self.connecting_since = None;
        self.reconnect = None;
        self.failures = 0;
        self.user_id = None;

        if previous == ChannelState::Disconnected {
            vec![]
        } else {
            tracing::info!(?previous, "channel disconnected");
            vec![ChannelAction::Close]
        }
    }

    /// Advance time: enforce the connect timeout and fire due reconnects.
    pub fn tick(&mut self, now: I, entropy: u64) -> Vec<ChannelAction> {
        match self.state {
            ChannelState::Connecting => {
                let Some(since) = self.connecting_since else {
                    return vec![];
                };
                let elapsed = now - since;
                if elapsed < self.config.connect_timeout {
                    return vec![];
                }

                let err = ConnectionError::ConnectTimeout { elapsed };
                tracing::warn!(error = %err, "abandoning channel connect");
                self.fail(now, entropy);
                vec![ChannelAction::Close]
            },
            ChannelState::Disconnected => {
                let due = self.reconnect.as_ref().is_some_and(|r| now - r.since >= r.delay);
                if !due {
                    return vec![];
                }

                self.reconnect = None;
                match self.user_id.clone() {
                    Some(user_id) => {
                        tracing::info!(%user_id, attempt = self.failures, "reconnecting channel");
                        self.start_connecting(user_id, now)
                    },
                    None => vec![],
                }
            },
            ChannelState::Connected => vec![],
        }
    }

    /// Build an emit action for `event`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` unless Connected
    pub fn emit(&self, event: ChannelEvent) -> Result<ChannelAction, ConnectionError> {
        if self.state != ChannelState::Connected {
            return Err(ConnectionError::NotConnected { state: self.state });
        }
        Ok(ChannelAction::Emit(event))
    }

    fn start_connecting(&mut self, user_id: UserId, now: I) -> Vec<ChannelAction> {
        self.state = ChannelState::Connecting;
        self.connecting_since = Some(now);
        self.user_id = Some(user_id.clone());
        self.open_requests += 1;
        vec![ChannelAction::Open { user_id }]
    }

    fn fail(&mut self, now: I, entropy: u64) {
        self.state = ChannelState::Disconnected;
        self.connecting_since = None;

        let delay = match self.user_id {
            Some(_) => self.config.reconnect.delay(self.failures, entropy),
            None => None,
        };
        self.reconnect = delay.map(|delay| ScheduledReconnect { since: now, delay });
        self.failures = self.failures.saturating_add(1);

        if let Some(delay) = delay {
            tracing::info!(?delay, failures = self.failures, "reconnect scheduled");
        }
    }
}
