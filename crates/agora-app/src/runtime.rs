//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: UI state machine
//! - [`Bridge`]: client bridge
//! - [`Driver`]: platform-specific I/O
//!
//! All state changes happen on the runtime's task, one input at a time, so
//! the caches are never touched concurrently.

use agora_client::{ClientConfig, Environment, PersistedSession};

use crate::{App, AppAction, AppEvent, Bridge, Driver, DriverInput, Effect};

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment providing time and randomness to the client
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    app: App,
    bridge: Bridge<E>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a new runtime with the given driver and environment.
    pub fn new(driver: D, env: E, config: ClientConfig) -> Self {
        Self { driver, app: App::new(), bridge: Bridge::new(env, config) }
    }

    /// Resume a stored session before the loop starts.
    ///
    /// Opens the channel for the stored user. A token the server no longer
    /// accepts ends the session on its first rejected request.
    pub async fn restore(&mut self, persisted: PersistedSession) -> Result<(), D::Error> {
        let events = self.bridge.restore(persisted);
        self.process_bridge_events(events).await?;
        Ok(())
    }

    /// Run the main event loop until the user quits.
    ///
    /// Each cycle applies at most one driver input and then one clock tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        self.driver.render(&self.app)?;

        loop {
            if self.step().await? {
                break;
            }
        }

        self.driver.stop();
        Ok(())
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the application should quit.
    pub async fn step(&mut self) -> Result<bool, D::Error> {
        if let Some(input) = self.driver.poll_input().await?
            && self.process_input(input).await?
        {
            return Ok(true);
        }

        let now = self.driver.now();
        let events = self.bridge.handle_tick(now);
        self.process_bridge_events(events).await
    }

    async fn process_input(&mut self, input: DriverInput) -> Result<bool, D::Error> {
        let events = match input {
            DriverInput::Command(command) => {
                let actions = self.app.handle(AppEvent::Command(command));
                return self.process_actions(actions).await;
            },
            DriverInput::ApiResponse { request_id, result } => {
                self.bridge.handle_api_response(request_id, result)
            },
            DriverInput::ChannelOpened => self.bridge.handle_channel_opened(),
            DriverInput::ChannelClosed { reason } => self.bridge.handle_channel_closed(reason),
            DriverInput::Frame(text) => self.bridge.handle_frame(text),
            DriverInput::Redraw => {
                self.driver.render(&self.app)?;
                return Ok(false);
            },
        };
        self.process_bridge_events(events).await
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, initial_actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                match action {
                    AppAction::Render => self.driver.render(&self.app)?,
                    AppAction::Quit => return Ok(true),

                    // Client operations go through the bridge
                    AppAction::Login(_)
                    | AppAction::Register(_)
                    | AppAction::Logout
                    | AppAction::ConnectChannel
                    | AppAction::DisconnectChannel
                    | AppAction::SelectConversation { .. }
                    | AppAction::SendMessage(_)
                    | AppAction::RefreshContacts
                    | AppAction::UpdateProfile(_) => {
                        let events = self.bridge.process_app_action(action);
                        self.flush_effects().await?;
                        for event in events {
                            pending_actions.extend(self.app.handle(event));
                        }
                    },
                }
            }
        }
        Ok(false)
    }

    /// Process events from Bridge back to App.
    async fn process_bridge_events(&mut self, events: Vec<AppEvent>) -> Result<bool, D::Error> {
        self.flush_effects().await?;
        for event in events {
            let actions = self.app.handle(event);
            if self.process_actions(actions).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Hand pending bridge effects to the driver, in order.
    async fn flush_effects(&mut self) -> Result<(), D::Error> {
        for effect in self.bridge.take_effects() {
            match effect {
                Effect::Http { request_id, request, token } => {
                    self.driver.execute_request(request_id, request, token).await?;
                },
                Effect::OpenChannel { user_id } => self.driver.open_channel(&user_id).await?,
                Effect::CloseChannel => self.driver.close_channel().await,
                Effect::SendFrame(frame) => self.driver.send_frame(frame).await?,
                Effect::Persist(session) => {
                    if let Err(error) = self.driver.persist_session(session.as_ref()) {
                        tracing::warn!(%error, "failed to persist session");
                    }
                },
            }
        }
        Ok(())
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Get a reference to the Bridge
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
