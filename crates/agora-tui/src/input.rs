//! Input line state and key handling.
//!
//! Owns the text being typed and the cursor. On Enter the line is parsed into
//! a [`Command`]; parse errors stay in the driver as a notice under the input
//! line and never reach the application.

use agora_app::Command;

/// Key input events from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Character input.
    Char(char),
    /// Enter/Return key.
    Enter,
    /// Backspace key.
    Backspace,
    /// Delete key.
    Delete,
    /// Escape key.
    Esc,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Home key.
    Home,
    /// End key.
    End,
}

/// What a key press amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Only the input line changed.
    Edited,
    /// A complete command was entered.
    Submit(Command),
    /// The user asked to leave.
    Quit,
}

/// Input state for the TUI.
///
/// The cursor counts characters, not bytes.
#[derive(Debug, Default)]
pub struct InputState {
    buffer: String,
    cursor: usize,
    notice: Option<String>,
}

impl InputState {
    /// Create a new empty input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text in the input buffer.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Error from the last line that failed to parse.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Handle a key input event.
    pub fn handle_key(&mut self, key: KeyInput) -> InputOutcome {
        match key {
            KeyInput::Char(c) => {
                let at = self.byte_index();
                self.buffer.insert(at, c);
                self.cursor = self.cursor.saturating_add(1);
            },
            KeyInput::Backspace => {
                if self.cursor > 0 {
                    self.cursor = self.cursor.saturating_sub(1);
                    let at = self.byte_index();
                    self.buffer.remove(at);
                }
            },
            KeyInput::Delete => {
                if self.cursor < self.len() {
                    let at = self.byte_index();
                    self.buffer.remove(at);
                }
            },
            KeyInput::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyInput::Right => self.cursor = self.cursor.saturating_add(1).min(self.len()),
            KeyInput::Home => self.cursor = 0,
            KeyInput::End => self.cursor = self.len(),
            KeyInput::Enter => return self.submit(),
            KeyInput::Esc => return InputOutcome::Quit,
        }
        InputOutcome::Edited
    }

    fn submit(&mut self) -> InputOutcome {
        let text = std::mem::take(&mut self.buffer);
        self.cursor = 0;

        match Command::parse(&text) {
            Ok(command) => {
                self.notice = None;
                InputOutcome::Submit(command)
            },
            Err(agora_app::ParseError::Empty) => InputOutcome::Edited,
            Err(error) => {
                self.notice = Some(error.to_string());
                InputOutcome::Edited
            },
        }
    }

    fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_index(&self) -> usize {
        self.buffer.char_indices().nth(self.cursor).map_or(self.buffer.len(), |(i, _)| i)
    }
}
