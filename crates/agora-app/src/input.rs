//! Line-oriented user commands.
//!
//! Frontends hand raw input lines to [`Command::parse`]; the result feeds the
//! [`crate::App`] as [`crate::AppEvent::Command`]. Lines starting with `/` are
//! commands, anything else is a message for the open conversation.

use agora_proto::{ConversationId, ProfileUpdate, UserId};
use thiserror::Error;

/// Usage text shown by `/help`.
pub const HELP: &str = "/login <email> <password> | /register <email> <password> <name> | /logout | \
                        /connect | /disconnect | /contacts | /open <conversation> [peer] | \
                        /name <name> | /bio <text> | /avatar <url> | /quit";

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
    /// Create an account.
    Register {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
        /// Name shown to others.
        display_name: String,
    },
    /// Log out.
    Logout,
    /// Open the channel.
    Connect,
    /// Close the channel.
    Disconnect,
    /// Refresh contacts.
    Contacts,
    /// Open a conversation.
    Open {
        /// Conversation to open.
        conversation_id: ConversationId,
        /// Recipient of messages sent in it.
        peer: UserId,
    },
    /// Send text to the open conversation.
    Send {
        /// Message text.
        content: String,
    },
    /// Change profile fields.
    UpdateProfile(ProfileUpdate),
    /// Show usage.
    Help,
    /// Exit.
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Blank line.
    #[error("empty input")]
    Empty,

    /// Unrecognised `/command`.
    #[error("unknown command: /{0}")]
    UnknownCommand(String),

    /// Required argument not given.
    #[error("/{command} needs <{argument}>")]
    MissingArgument {
        /// Command name.
        command: &'static str,
        /// Missing argument name.
        argument: &'static str,
    },
}

impl Command {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Send { content: line.to_owned() });
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };
        let mut words = args.split_whitespace();

        match name {
            "login" => {
                let email = required(words.next(), "login", "email")?;
                let password = required(words.next(), "login", "password")?;
                Ok(Self::Login { email, password })
            },
            "register" => {
                let email = required(words.next(), "register", "email")?;
                let password = required(words.next(), "register", "password")?;
                let display_name = required(Some(words.collect::<Vec<_>>().join(" ").as_str()), "register", "name")?;
                Ok(Self::Register { email, password, display_name })
            },
            "logout" => Ok(Self::Logout),
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            "contacts" => Ok(Self::Contacts),
            "open" => {
                let conversation = required(words.next(), "open", "conversation")?;
                let peer = words.next().map_or_else(|| conversation.clone(), str::to_owned);
                Ok(Self::Open { conversation_id: conversation.into(), peer: peer.into() })
            },
            "name" => {
                let name = required(Some(args), "name", "name")?;
                Ok(Self::UpdateProfile(ProfileUpdate { display_name: Some(name), ..ProfileUpdate::default() }))
            },
            "bio" => {
                let bio = required(Some(args), "bio", "text")?;
                Ok(Self::UpdateProfile(ProfileUpdate { bio: Some(bio), ..ProfileUpdate::default() }))
            },
            "avatar" => {
                let avatar = required(words.next(), "avatar", "url")?;
                Ok(Self::UpdateProfile(ProfileUpdate { avatar: Some(avatar), ..ProfileUpdate::default() }))
            },
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ParseError::UnknownCommand(other.to_owned())),
        }
    }
}

fn required(value: Option<&str>, command: &'static str, argument: &'static str) -> Result<String, ParseError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(ParseError::MissingArgument { command, argument }),
    }
}
