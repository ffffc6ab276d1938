//! Terminal driver for the TUI.
//!
//! Implements the [`Driver`] trait for terminal I/O using crossterm for
//! keyboard events and ratatui for rendering. HTTP calls run on spawned tasks
//! and the channel is a WebSocket; both report back through one queue that
//! [`Driver::poll_input`] drains.

use std::{
    io::{self, Stdout, stdout},
    time::{Duration, Instant},
};

use agora_app::{App, Command, Driver, DriverInput};
use agora_client::{
    FileSessionStore, PersistedSession, RequestId, SessionStore, StoreError,
    transport::{self, ChannelSignal, ConnectedChannel, HttpApi, TransportError},
};
use agora_proto::{ApiError, ApiRequest, ApiResponse, UserId};
use crossterm::{
    ExecutableCommand,
    event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{InputOutcome, InputState, KeyInput, ui};

/// How long [`Driver::poll_input`] waits before letting the runtime tick.
const TICK: Duration = Duration::from_millis(100);

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error from terminal operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session file error.
    #[error("session storage error: {0}")]
    Store(#[from] StoreError),
}

/// Where the driver connects.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Base URL of the HTTP API.
    pub api_url: String,
    /// URL of the WebSocket channel.
    pub ws_url: String,
    /// HTTP-level request timeout.
    pub request_timeout: Duration,
}

/// Results of background work, tagged so stale ones can be dropped.
enum Completion {
    Api { request_id: RequestId, result: Result<ApiResponse, ApiError> },
    ChannelOpened { generation: u64, channel: ConnectedChannel },
    ChannelFailed { generation: u64, reason: String },
}

enum Polled {
    Completion(Option<Completion>),
    Signal(Option<ChannelSignal>),
    Terminal(Option<io::Result<Event>>),
    Tick,
}

/// Terminal driver implementing the [`Driver`] trait.
///
/// Owns the input line, the open channel and the session file.
pub struct TerminalDriver {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    event_stream: EventStream,
    input_state: InputState,
    api: HttpApi,
    ws_url: String,
    store: FileSessionStore,
    channel: Option<ConnectedChannel>,
    /// Bumped on every open and close; completions from older generations
    /// belong to a channel the runtime already gave up on.
    generation: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl TerminalDriver {
    /// Create a new terminal driver and switch the terminal to raw mode.
    pub fn new(endpoints: Endpoints, store: FileSessionStore) -> Result<Self, TerminalError> {
        let api = HttpApi::new(&endpoints.api_url, endpoints.request_timeout)?;

        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout());
        let terminal = Terminal::new(backend)?;
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        Ok(Self {
            terminal,
            event_stream: EventStream::new(),
            input_state: InputState::new(),
            api,
            ws_url: endpoints.ws_url,
            store,
            channel: None,
            generation: 0,
            completions_tx,
            completions_rx,
        })
    }

    /// Session stored by a previous run, if any.
    pub fn load_session(&self) -> Result<Option<PersistedSession>, TerminalError> {
        Ok(self.store.load()?)
    }

    /// Convert crossterm `KeyCode` to `KeyInput`.
    fn convert_key(code: KeyCode) -> Option<KeyInput> {
        match code {
            KeyCode::Char(c) => Some(KeyInput::Char(c)),
            KeyCode::Enter => Some(KeyInput::Enter),
            KeyCode::Backspace => Some(KeyInput::Backspace),
            KeyCode::Delete => Some(KeyInput::Delete),
            KeyCode::Esc => Some(KeyInput::Esc),
            KeyCode::Left => Some(KeyInput::Left),
            KeyCode::Right => Some(KeyInput::Right),
            KeyCode::Home => Some(KeyInput::Home),
            KeyCode::End => Some(KeyInput::End),
            _ => None,
        }
    }

    fn handle_terminal_event(&mut self, event: Event) -> Option<DriverInput> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    return Some(DriverInput::Command(Command::Quit));
                }
                match self.input_state.handle_key(Self::convert_key(key.code)?) {
                    InputOutcome::Edited => Some(DriverInput::Redraw),
                    InputOutcome::Submit(command) => Some(DriverInput::Command(command)),
                    InputOutcome::Quit => Some(DriverInput::Command(Command::Quit)),
                }
            },
            Event::Resize(..) => Some(DriverInput::Redraw),
            _ => None,
        }
    }

    fn handle_completion(&mut self, completion: Completion) -> Option<DriverInput> {
        match completion {
            Completion::Api { request_id, result } => Some(DriverInput::ApiResponse { request_id, result }),
            Completion::ChannelOpened { generation, channel } => {
                if generation != self.generation {
                    tracing::debug!(generation, "dropping stale channel");
                    channel.stop();
                    return None;
                }
                self.channel = Some(channel);
                Some(DriverInput::ChannelOpened)
            },
            Completion::ChannelFailed { generation, reason } => {
                (generation == self.generation).then_some(DriverInput::ChannelClosed { reason })
            },
        }
    }

    fn handle_signal(&mut self, signal: Option<ChannelSignal>) -> DriverInput {
        match signal {
            Some(ChannelSignal::Frame(text)) => DriverInput::Frame(text),
            Some(ChannelSignal::Closed(reason)) => {
                self.channel = None;
                DriverInput::ChannelClosed { reason }
            },
            None => {
                self.channel = None;
                DriverInput::ChannelClosed { reason: "channel task ended".into() }
            },
        }
    }

    fn drop_channel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(channel) = self.channel.take() {
            channel.stop();
        }
    }
}

async fn next_signal(channel: Option<&mut ConnectedChannel>) -> Option<ChannelSignal> {
    match channel {
        Some(channel) => channel.from_server.recv().await,
        None => std::future::pending().await,
    }
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Instant = Instant;

    async fn poll_input(&mut self) -> Result<Option<DriverInput>, Self::Error> {
        let tick = tokio::time::sleep(TICK);
        tokio::pin!(tick);

        loop {
            let polled = tokio::select! {
                biased;

                completion = self.completions_rx.recv() => Polled::Completion(completion),
                signal = next_signal(self.channel.as_mut()) => Polled::Signal(signal),
                event = self.event_stream.next() => Polled::Terminal(event),
                () = &mut tick => Polled::Tick,
            };

            let input = match polled {
                Polled::Completion(Some(completion)) => self.handle_completion(completion),
                // The driver holds a sender, so the queue never closes.
                Polled::Completion(None) => None,
                Polled::Signal(signal) => Some(self.handle_signal(signal)),
                Polled::Terminal(Some(Ok(event))) => self.handle_terminal_event(event),
                Polled::Terminal(Some(Err(e))) => return Err(TerminalError::Io(e)),
                Polled::Terminal(None) => Some(DriverInput::Command(Command::Quit)),
                Polled::Tick => return Ok(None),
            };

            if input.is_some() {
                return Ok(input);
            }
        }
    }

    async fn execute_request(
        &mut self,
        request_id: RequestId,
        request: ApiRequest,
        token: Option<String>,
    ) -> Result<(), Self::Error> {
        let api = self.api.clone();
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = api.execute(&request, token.as_deref()).await;
            let _ = completions.send(Completion::Api { request_id, result });
        });
        Ok(())
    }

    async fn open_channel(&mut self, user_id: &UserId) -> Result<(), Self::Error> {
        self.drop_channel();

        let generation = self.generation;
        let ws_url = self.ws_url.clone();
        let user_id = user_id.clone();
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let completion = match transport::connect_channel(&ws_url, &user_id).await {
                Ok(channel) => Completion::ChannelOpened { generation, channel },
                Err(e) => Completion::ChannelFailed { generation, reason: e.to_string() },
            };
            let _ = completions.send(completion);
        });
        Ok(())
    }

    async fn close_channel(&mut self) {
        self.drop_channel();
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), Self::Error> {
        if let Some(channel) = &self.channel
            && channel.to_server.send(frame).await.is_err()
        {
            // The channel task is gone; its close signal follows.
            tracing::debug!("frame dropped, channel task ended");
        }
        Ok(())
    }

    fn persist_session(&mut self, session: Option<&PersistedSession>) -> Result<(), Self::Error> {
        match session {
            Some(session) => self.store.save(session)?,
            None => self.store.clear()?,
        }
        Ok(())
    }

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        self.terminal.draw(|frame| {
            ui::render(frame, app, &self.input_state);
        })?;
        Ok(())
    }

    fn stop(&mut self) {
        self.drop_channel();
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        self.stop();
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }
}
