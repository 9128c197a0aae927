//! The messaging-platform collaborator.
//!
//! The bot never talks to a chat service directly. Everything it needs
//! from one (the user directory, the general channel, outbound messages)
//! goes through the [`ChatPlatform`] trait, and everything it receives
//! arrives as a [`PlatformEvent`].
//!
//! [`MemoryPlatform`] is a static in-memory directory. Tests use it to
//! drive the dispatcher and the tick cycle; the console adapter in the
//! binary wraps it.

use std::cell::{Cell, RefCell};

use adi_ledger::UserId;

/// Errors reported by the platform collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The directory or API could not be reached.
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// The platform has no user with this identifier.
    #[error("unknown user: {0}")]
    UnknownUser(UserId),
}

/// Presence state reported by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Online and active.
    Active,
    /// Idle or offline.
    Away,
}

/// A user as the platform directory describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformUser {
    /// Stable identifier.
    pub id: UserId,
    /// Display name used in commands.
    pub name: String,
    /// Whether the account is an integration rather than a person.
    pub is_bot: bool,
    /// Current presence.
    pub presence: Presence,
}

impl PlatformUser {
    /// A human user who is currently active.
    pub fn active(id: &str, name: &str) -> Self {
        Self {
            id: UserId::from(id),
            name: name.to_owned(),
            is_bot: false,
            presence: Presence::Active,
        }
    }
}

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw message text, including any mention prefix.
    pub text: String,
    /// Sender.
    pub user: UserId,
    /// Platform timestamp, opaque to the bot.
    pub timestamp: String,
    /// Channel the message was posted in.
    pub channel: String,
}

/// Events delivered by the platform's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The connection is up; carries the bot's own user id.
    Connected {
        /// The bot's user id, used to build the mention matcher.
        bot_id: String,
    },
    /// A plain text message.
    Message(Message),
    /// A user's presence changed.
    PresenceChange {
        /// The user whose presence changed.
        user: UserId,
        /// The new presence.
        presence: Presence,
    },
    /// A non-fatal transport error.
    Error(String),
    /// The credentials were rejected. Fatal.
    InvalidAuth,
    /// The event stream ended.
    Disconnected,
}

/// Operations the bot needs from the messaging platform.
pub trait ChatPlatform {
    /// The bot's own user id.
    fn bot_id(&self) -> &str;

    /// The full user directory.
    fn users(&self) -> Result<Vec<PlatformUser>, PlatformError>;

    /// Look up one user by id.
    fn user_info(&self, id: &UserId) -> Result<PlatformUser, PlatformError>;

    /// Look up a user by display name.
    ///
    /// `Ok(None)` means the directory answered and has no such user;
    /// `Err` means the directory could not be consulted.
    fn find_user_by_name(&self, name: &str) -> Result<Option<PlatformUser>, PlatformError> {
        Ok(self.users()?.into_iter().find(|u| u.name == name))
    }

    /// The workspace-wide broadcast channel, if the platform has one.
    fn general_channel(&self) -> Result<Option<String>, PlatformError>;

    /// Fire-and-forget send.
    fn send_message(&self, text: &str, channel: &str);
}

/// A message recorded by [`MemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Message body.
    pub text: String,
    /// Target channel.
    pub channel: String,
}

/// A static, in-memory platform directory.
///
/// Sent messages are recorded instead of delivered. Setting the platform
/// to failing makes every directory call return
/// [`PlatformError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    bot_id: String,
    users: RefCell<Vec<PlatformUser>>,
    general_channel: Option<String>,
    failing: Cell<bool>,
    sent: RefCell<Vec<SentMessage>>,
}

impl MemoryPlatform {
    /// Create an empty directory for a bot with the given id.
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            ..Self::default()
        }
    }

    /// Set the general channel.
    #[must_use]
    pub fn with_general_channel(mut self, channel: impl Into<String>) -> Self {
        self.general_channel = Some(channel.into());
        self
    }

    /// Add a user to the directory.
    #[must_use]
    pub fn with_user(self, user: PlatformUser) -> Self {
        self.users.borrow_mut().push(user);
        self
    }

    /// Add or replace a user at runtime.
    pub fn upsert_user(&self, user: PlatformUser) {
        let mut users = self.users.borrow_mut();
        if let Some(existing) = users.iter_mut().find(|u| u.id == user.id) {
            *existing = user;
        } else {
            users.push(user);
        }
    }

    /// Update a user's presence; unknown ids are ignored.
    pub fn set_presence(&self, id: &UserId, presence: Presence) {
        if let Some(user) = self.users.borrow_mut().iter_mut().find(|u| &u.id == id) {
            user.presence = presence;
        }
    }

    /// Make every directory call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.borrow().clone()
    }

    /// Drain the sent messages.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        self.sent.take()
    }

    fn check(&self) -> Result<(), PlatformError> {
        if self.failing.get() {
            return Err(PlatformError::Unavailable("directory offline".to_owned()));
        }
        Ok(())
    }
}

impl ChatPlatform for MemoryPlatform {
    fn bot_id(&self) -> &str {
        &self.bot_id
    }

    fn users(&self) -> Result<Vec<PlatformUser>, PlatformError> {
        self.check()?;
        Ok(self.users.borrow().clone())
    }

    fn user_info(&self, id: &UserId) -> Result<PlatformUser, PlatformError> {
        self.check()?;
        self.users
            .borrow()
            .iter()
            .find(|u| &u.id == id)
            .cloned()
            .ok_or_else(|| PlatformError::UnknownUser(id.clone()))
    }

    fn general_channel(&self) -> Result<Option<String>, PlatformError> {
        self.check()?;
        Ok(self.general_channel.clone())
    }

    fn send_message(&self, text: &str, channel: &str) {
        self.sent.borrow_mut().push(SentMessage {
            text: text.to_owned(),
            channel: channel.to_owned(),
        });
    }
}
