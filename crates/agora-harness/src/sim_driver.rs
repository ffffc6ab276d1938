//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the CLI's network driver but
//! answers requests from a [`crate::SimServer`] and reads time from a
//! [`SimEnv`]. It implements [`Driver`] so the same [`agora_app::Runtime`]
//! orchestration code runs in both production and simulation.

use std::{
    collections::{BTreeSet, VecDeque},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use agora_app::{App, Command, Driver, DriverInput, Runtime};
use agora_client::{Environment, MemorySessionStore, PersistedSession, RequestId, SessionStore};
use agora_proto::{ApiRequest, UserId};

use crate::{
    SimEnv,
    sim_server::{SharedSimServer, lock},
};

/// Runtime wired to the simulation.
pub type SimRuntime = Runtime<SimDriver, SimEnv>;

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Shared state for input injection.
///
/// This allows injection from outside async contexts and after the driver
/// has been moved into a runtime.
#[derive(Default)]
struct SharedState {
    commands: VecDeque<Command>,
    inputs: VecDeque<DriverInput>,
    held_responses: VecDeque<DriverInput>,
    hold_responses: bool,
    channel_user: Option<UserId>,
    channels_open: usize,
    opened_for: BTreeSet<UserId>,
    renders: usize,
    stopped: bool,
}

/// Simulation driver for deterministic testing.
pub struct SimDriver {
    env: SimEnv,
    server: SharedSimServer,
    store: MemorySessionStore,
    state: Arc<Mutex<SharedState>>,
    quit_when_idle: bool,
}

impl SimDriver {
    /// Driver for one client of `server`.
    pub fn new(env: SimEnv, server: SharedSimServer) -> Self {
        Self {
            env,
            server,
            store: MemorySessionStore::new(),
            state: Arc::new(Mutex::new(SharedState::default())),
            quit_when_idle: false,
        }
    }

    /// Persist sessions into `store`, e.g. one shared with a previous run.
    #[must_use]
    pub fn with_store(mut self, store: MemorySessionStore) -> Self {
        self.store = store;
        self
    }

    /// Answer `poll_input` with `/quit` once nothing is pending, so
    /// [`Runtime::run`] returns.
    #[must_use]
    pub fn with_quit_when_idle(mut self) -> Self {
        self.quit_when_idle = true;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a user command.
    pub fn inject_command(&self, command: Command) {
        self.state().commands.push_back(command);
    }

    /// Parse and queue an input line.
    pub fn inject_line(&self, line: &str) -> Result<(), SimDriverError> {
        let command = Command::parse(line).map_err(|e| SimDriverError(e.to_string()))?;
        self.inject_command(command);
        Ok(())
    }

    /// Keep API responses back until [`SimDriver::release_responses`].
    pub fn hold_responses(&self, hold: bool) {
        self.state().hold_responses = hold;
    }

    /// Deliver held responses in the order their requests were made.
    pub fn release_responses(&self) {
        let mut state = self.state();
        let held = std::mem::take(&mut state.held_responses);
        state.inputs.extend(held);
    }

    /// Number of responses currently held back.
    pub fn held_responses(&self) -> usize {
        self.state().held_responses.len()
    }

    /// Check if there is input to process.
    pub fn has_pending(&self) -> bool {
        let state = self.state();
        if !state.inputs.is_empty() || !state.commands.is_empty() {
            return true;
        }
        state.channel_user.as_ref().is_some_and(|user| {
            let server = lock(&self.server);
            !server.is_connected(user) || server.has_frames(user)
        })
    }

    /// True while the driver holds an open channel.
    pub fn channel_open(&self) -> bool {
        self.state().channel_user.is_some()
    }

    /// Server-side channel count over every user this driver connected as.
    pub fn live_connections(&self) -> usize {
        let state = self.state();
        let server = lock(&self.server);
        state.opened_for.iter().map(|user| server.connections(user)).sum()
    }

    /// Session currently in storage.
    pub fn stored_session(&self) -> Option<PersistedSession> {
        self.store.load().ok().flatten()
    }

    /// Session storage used by this driver.
    pub fn store(&self) -> &MemorySessionStore {
        &self.store
    }

    /// Server this driver talks to.
    pub fn server(&self) -> &SharedSimServer {
        &self.server
    }

    /// Environment shared with the runtime.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Number of renders requested so far.
    pub fn renders(&self) -> usize {
        self.state().renders
    }

    /// True once the runtime stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.state().stopped
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = Duration;

    async fn poll_input(&mut self) -> Result<Option<DriverInput>, Self::Error> {
        let mut state = self.state();
        if let Some(input) = state.inputs.pop_front() {
            return Ok(Some(input));
        }

        if let Some(user) = state.channel_user.clone() {
            let mut server = lock(&self.server);
            if !server.is_connected(&user) {
                state.channel_user = None;
                state.channels_open = 0;
                return Ok(Some(DriverInput::ChannelClosed { reason: "connection lost".into() }));
            }
            if let Some(frame) = server.next_frame(&user) {
                return Ok(Some(DriverInput::Frame(frame)));
            }
        }

        if let Some(command) = state.commands.pop_front() {
            return Ok(Some(DriverInput::Command(command)));
        }

        Ok(self.quit_when_idle.then_some(DriverInput::Command(Command::Quit)))
    }

    async fn execute_request(
        &mut self,
        request_id: RequestId,
        request: ApiRequest,
        token: Option<String>,
    ) -> Result<(), Self::Error> {
        let result = lock(&self.server).handle(&request, token.as_deref());
        let input = DriverInput::ApiResponse { request_id, result };

        let mut state = self.state();
        if state.hold_responses {
            state.held_responses.push_back(input);
        } else {
            state.inputs.push_back(input);
        }
        Ok(())
    }

    async fn open_channel(&mut self, user_id: &UserId) -> Result<(), Self::Error> {
        let mut state = self.state();
        if lock(&self.server).connect(user_id) {
            state.channel_user = Some(user_id.clone());
            state.channels_open += 1;
            state.opened_for.insert(user_id.clone());
            state.inputs.push_back(DriverInput::ChannelOpened);
        } else {
            state.inputs.push_back(DriverInput::ChannelClosed { reason: "connection refused".into() });
        }
        Ok(())
    }

    async fn close_channel(&mut self) {
        let mut state = self.state();
        if let Some(user) = state.channel_user.take() {
            let mut server = lock(&self.server);
            for _ in 0..state.channels_open {
                server.disconnect(&user);
            }
        }
        state.channels_open = 0;
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), Self::Error> {
        match self.state().channel_user.clone() {
            Some(user) => lock(&self.server).receive_frame(&user, &frame),
            None => tracing::debug!("frame sent without channel dropped"),
        }
        Ok(())
    }

    fn persist_session(&mut self, session: Option<&PersistedSession>) -> Result<(), Self::Error> {
        let result = match session {
            Some(session) => self.store.save(session),
            None => self.store.clear(),
        };
        result.map_err(|e| SimDriverError(e.to_string()))
    }

    fn now(&self) -> Self::Instant {
        self.env.now()
    }

    fn render(&mut self, _app: &App) -> Result<(), Self::Error> {
        self.state().renders += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.state().stopped = true;
    }
}

/// Step `runtime` until its driver has no pending input, the app quits, or
/// `max_steps` cycles ran. Returns the number of cycles.
pub async fn run_until_idle(runtime: &mut SimRuntime, max_steps: usize) -> Result<usize, SimDriverError> {
    let mut steps = 0;
    while steps < max_steps && runtime.driver().has_pending() {
        steps += 1;
        if runtime.step().await? {
            break;
        }
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use agora_app::Driver;
    use agora_proto::{ApiResponse, Credentials};

    use super::*;
    use crate::create_shared_server;

    fn driver() -> SimDriver {
        SimDriver::new(SimEnv::new(), create_shared_server())
    }

    #[test]
    fn inject_line_queues_command() {
        let driver = driver();
        assert!(!driver.has_pending());

        driver.inject_line("/contacts").unwrap();
        assert!(driver.has_pending());
        assert!(driver.inject_line("/nonsense").is_err());
    }

    #[tokio::test]
    async fn responses_precede_commands() {
        let mut driver = driver();
        driver.inject_command(Command::Contacts);
        driver
            .execute_request(1, ApiRequest::Login(Credentials::new("nobody@example.com", "pw")), None)
            .await
            .unwrap();

        let first = driver.poll_input().await.unwrap();
        assert!(matches!(first, Some(DriverInput::ApiResponse { request_id: 1, result: Err(_) })));
        assert_eq!(driver.poll_input().await.unwrap(), Some(DriverInput::Command(Command::Contacts)));
        assert_eq!(driver.poll_input().await.unwrap(), None);
    }

    #[tokio::test]
    async fn held_responses_wait_for_release() {
        let mut driver = driver();
        driver.hold_responses(true);
        driver.execute_request(7, ApiRequest::Logout, None).await.unwrap();

        assert_eq!(driver.held_responses(), 1);
        assert!(!driver.has_pending());

        driver.release_responses();
        assert_eq!(
            driver.poll_input().await.unwrap(),
            Some(DriverInput::ApiResponse { request_id: 7, result: Ok(ApiResponse::LoggedOut) })
        );
    }

    #[tokio::test]
    async fn kicked_channel_reports_close_once() {
        let mut driver = driver();
        let user: UserId = "u1".into();
        driver.open_channel(&user).await.unwrap();
        assert_eq!(driver.poll_input().await.unwrap(), Some(DriverInput::ChannelOpened));

        lock(driver.server()).kick(&user);

        assert!(matches!(driver.poll_input().await.unwrap(), Some(DriverInput::ChannelClosed { .. })));
        assert!(!driver.channel_open());
        assert_eq!(driver.poll_input().await.unwrap(), None);
    }

    #[tokio::test]
    async fn refused_channel_reports_close() {
        let mut driver = driver();
        lock(driver.server()).set_refuse_channels(true);
        driver.open_channel(&"u1".into()).await.unwrap();

        assert_eq!(
            driver.poll_input().await.unwrap(),
            Some(DriverInput::ChannelClosed { reason: "connection refused".into() })
        );
        assert_eq!(driver.live_connections(), 0);
    }

    #[tokio::test]
    async fn close_releases_server_connection() {
        let mut driver = driver();
        driver.open_channel(&"u1".into()).await.unwrap();
        assert_eq!(driver.live_connections(), 1);

        driver.close_channel().await;
        assert_eq!(driver.live_connections(), 0);
        assert!(!driver.channel_open());
    }
}
