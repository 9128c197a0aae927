//! Console platform adapter.
//!
//! Stands in for a chat service: the user directory is static and comes
//! from the `console` section of the config, stdin lines are inbound
//! messages and outbound messages are printed to stdout.
//!
//! Every line is a message from the configured speaker in the general
//! channel, except for a few control lines:
//!
//! - `/as <user_id> <text>` speaks as another user,
//! - `/away <user_id>` and `/active <user_id>` change presence,
//! - `/quit` disconnects.

use std::io::BufRead;

use adi_core::platform::{
    ChatPlatform, MemoryPlatform, Message, PlatformError, PlatformEvent, PlatformUser, Presence,
};
use adi_ledger::UserId;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::BotError;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// The `console` section of `adi-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleConfig {
    /// The bot's own user id, used for the mention prefix.
    #[serde(default = "default_bot_id")]
    pub bot_id: String,

    /// Who is typing on stdin.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Channel for plain lines and lottery announcements.
    #[serde(default = "default_general_channel")]
    pub general_channel: String,

    /// The static user directory.
    #[serde(default = "default_users")]
    pub users: Vec<ConsoleUser>,
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleUser {
    /// Stable user id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Integration account.
    #[serde(default)]
    pub is_bot: bool,
    /// Present at startup.
    #[serde(default = "default_active")]
    pub active: bool,
}

impl ConsoleConfig {
    /// Extract the `console` section from the raw config file. A missing
    /// section gives the defaults.
    pub fn from_yaml(contents: &str) -> Result<Self, BotError> {
        let raw: serde_yml::Value =
            serde_yml::from_str(contents).map_err(|e| BotError::Console {
                message: format!("failed to parse config YAML: {e}"),
            })?;
        match raw.get("console") {
            Some(section) => {
                serde_yml::from_value(section.clone()).map_err(|e| BotError::Console {
                    message: format!("invalid console section: {e}"),
                })
            }
            None => Ok(Self::default()),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bot_id: default_bot_id(),
            user_id: default_user_id(),
            general_channel: default_general_channel(),
            users: default_users(),
        }
    }
}

fn default_bot_id() -> String {
    "UADI".to_owned()
}

fn default_user_id() -> String {
    "U1".to_owned()
}

fn default_general_channel() -> String {
    "general".to_owned()
}

fn default_users() -> Vec<ConsoleUser> {
    vec![ConsoleUser {
        id: default_user_id(),
        name: "me".to_owned(),
        is_bot: false,
        active: true,
    }]
}

const fn default_active() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// A [`MemoryPlatform`] directory that prints what the bot says.
#[derive(Debug)]
pub struct ConsolePlatform {
    directory: MemoryPlatform,
}

impl ConsolePlatform {
    /// Build the directory from config.
    pub fn new(config: &ConsoleConfig) -> Self {
        let directory = config.users.iter().fold(
            MemoryPlatform::new(config.bot_id.clone())
                .with_general_channel(config.general_channel.clone()),
            |directory, user| {
                directory.with_user(PlatformUser {
                    id: UserId::new(user.id.clone()),
                    name: user.name.clone(),
                    is_bot: user.is_bot,
                    presence: if user.active {
                        Presence::Active
                    } else {
                        Presence::Away
                    },
                })
            },
        );
        Self { directory }
    }

    /// Apply a presence change.
    pub fn set_presence(&self, user: &UserId, presence: Presence) {
        self.directory.set_presence(user, presence);
    }
}

impl ChatPlatform for ConsolePlatform {
    fn bot_id(&self) -> &str {
        self.directory.bot_id()
    }

    fn users(&self) -> Result<Vec<PlatformUser>, PlatformError> {
        self.directory.users()
    }

    fn user_info(&self, id: &UserId) -> Result<PlatformUser, PlatformError> {
        self.directory.user_info(id)
    }

    fn general_channel(&self) -> Result<Option<String>, PlatformError> {
        self.directory.general_channel()
    }

    fn send_message(&self, text: &str, channel: &str) {
        println!("[{channel}] {text}");
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Turns stdin lines into platform events.
#[derive(Debug, Clone)]
pub struct ConsoleInput {
    speaker: UserId,
    channel: String,
}

impl ConsoleInput {
    /// An input for the configured speaker and channel.
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            speaker: UserId::new(config.user_id.clone()),
            channel: config.general_channel.clone(),
        }
    }

    /// The event for one line, or `None` for a blank or malformed one.
    pub fn parse(&self, line: &str) -> Option<PlatformEvent> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        let Some(control) = line.strip_prefix('/') else {
            return Some(self.message(self.speaker.clone(), line));
        };

        let (verb, rest) = control.split_once(' ').unwrap_or((control, ""));
        match verb {
            "quit" => Some(PlatformEvent::Disconnected),
            "away" | "active" if !rest.trim().is_empty() => Some(PlatformEvent::PresenceChange {
                user: UserId::new(rest.trim()),
                presence: if verb == "away" {
                    Presence::Away
                } else {
                    Presence::Active
                },
            }),
            "as" => {
                let (user, text) = rest.split_once(' ')?;
                Some(self.message(UserId::new(user), text))
            }
            _ => {
                warn!(line, "unknown console control line");
                None
            }
        }
    }

    fn message(&self, user: UserId, text: &str) -> PlatformEvent {
        PlatformEvent::Message(Message {
            text: text.to_owned(),
            user,
            timestamp: Utc::now().timestamp_millis().to_string(),
            channel: self.channel.clone(),
        })
    }

    /// Forward lines from `reader` until EOF, `/quit`, a read error or a
    /// closed channel. EOF is reported as [`PlatformEvent::Disconnected`].
    ///
    /// Blocks on every read, so it runs on its own thread rather than the
    /// runtime: a pending stdin read cannot be cancelled and would hold
    /// the runtime open at shutdown.
    pub fn run<R: BufRead>(self, reader: R, events: &mpsc::Sender<PlatformEvent>) {
        let mut lines = reader.lines();
        loop {
            let event = match lines.next() {
                Some(Ok(line)) => match self.parse(&line) {
                    Some(event) => event,
                    None => continue,
                },
                None => {
                    debug!("console input closed");
                    PlatformEvent::Disconnected
                }
                Some(Err(e)) => PlatformEvent::Error(format!("console read failed: {e}")),
            };
            let last = matches!(
                event,
                PlatformEvent::Disconnected | PlatformEvent::Error(_)
            );
            if events.blocking_send(event).is_err() || last {
                return;
            }
        }
    }
}
