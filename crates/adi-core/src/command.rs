//! Commands, plugin registration, and the live command registry.
//!
//! Handlers are plain function pointers registered by name in a
//! [`PluginRegistry`] before startup. At load time the registry is merged
//! with the persisted command list into a [`CommandRegistry`], which owns
//! the dispatch pattern and the help text. Only proxy commands are added
//! or removed at runtime.

use std::fmt;
use std::time::Duration;

use adi_ledger::{Level, Points, UserId};
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::platform::ChatPlatform;
use crate::state::BotState;

// ---------------------------------------------------------------------------
// Handler surface
// ---------------------------------------------------------------------------

/// The outcome of one handler invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Reply text. Empty suppresses the reply.
    pub text: String,
    /// Whether the invocation should be billed.
    pub charge: bool,
}

impl Response {
    /// A reply that is never billed: usage text, input errors, info.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            charge: false,
        }
    }

    /// A reply for a completed paid action.
    pub fn charged(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            charge: true,
        }
    }

    /// The generic reply for a collaborator failure.
    pub fn internal_error() -> Self {
        Self::info("internal error")
    }
}

/// Everything a handler may touch while it runs.
pub struct CommandContext<'a> {
    /// The application state, owned by the dispatcher.
    pub state: &'a mut BotState,
    /// The invoking user. Always present in `state.users`.
    pub user: UserId,
    /// The messaging platform.
    pub platform: &'a dyn ChatPlatform,
    /// Randomness for games.
    pub rng: &'a mut dyn RngCore,
    /// Wall-clock budget for expression evaluation.
    pub eval_timeout: Duration,
}

/// A command implementation.
pub type Handler = fn(&mut CommandContext<'_>, &str) -> Response;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A named, priced, level-gated command.
///
/// Exactly one of `proxy` and `handler` is meaningful. The handler is never
/// persisted; it is re-bound by name at load time.
#[derive(Clone, Serialize, Deserialize)]
pub struct Command {
    /// Unique name, the first token of an invocation.
    pub name: String,

    /// Minimum level needed to invoke.
    #[serde(default)]
    pub required_level: Level,

    /// Points billed on a charged response.
    #[serde(default)]
    pub price: Points,

    /// Whether the command is listed in the help text.
    #[serde(default = "default_visible")]
    pub visible: bool,

    /// Invocation text this command expands to.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_string"
    )]
    pub proxy: Option<String>,

    /// Bound implementation.
    #[serde(skip)]
    pub handler: Option<Handler>,
}

impl Command {
    /// A handler command with no price, visible to everybody at `level`.
    pub fn with_handler(name: impl Into<String>, handler: Handler, level: Level) -> Self {
        Self {
            name: name.into(),
            required_level: level,
            price: Points::ZERO,
            visible: true,
            proxy: None,
            handler: Some(handler),
        }
    }

    /// A hidden, free proxy command.
    pub fn proxy(name: impl Into<String>, text: impl Into<String>, level: Level) -> Self {
        Self {
            name: name.into(),
            required_level: level,
            price: Points::ZERO,
            visible: false,
            proxy: Some(text.into()),
            handler: None,
        }
    }

    /// Whether this command expands to another invocation.
    pub const fn is_proxy(&self) -> bool {
        self.proxy.is_some()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("required_level", &self.required_level)
            .field("price", &self.price)
            .field("visible", &self.visible)
            .field("proxy", &self.proxy)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

const fn default_visible() -> bool {
    true
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while assembling or changing the command set.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The name is already taken.
    #[error("command already registered: {name}")]
    Duplicate {
        /// The colliding name.
        name: String,
    },

    /// The name is empty or contains whitespace.
    #[error("invalid command name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The dispatch pattern could not be compiled.
    #[error("failed to build command pattern: {0}")]
    Pattern(#[from] regex::Error),
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Plugin registration
// ---------------------------------------------------------------------------

/// Handlers registered by the composition root, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    handlers: Vec<(String, Handler)>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the name is taken and
    /// [`RegistryError::InvalidName`] if it is empty or has whitespace.
    pub fn register(&mut self, name: &str, handler: Handler) -> Result<(), RegistryError> {
        validate_name(name)?;
        if self.get(name).is_some() {
            return Err(RegistryError::Duplicate {
                name: name.to_owned(),
            });
        }
        self.handlers.push((name.to_owned(), handler));
        Ok(())
    }

    /// The handler registered under `name`.
    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| *h)
    }

    /// Registered names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(n, _)| n.as_str())
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Live registry
// ---------------------------------------------------------------------------

/// A parsed invocation: the matched command name and its argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    /// Matched command name.
    pub name: String,
    /// Argument text, trimmed of trailing whitespace. May be empty.
    pub args: String,
}

/// The ordered set of live commands plus the derived dispatch pattern and
/// help text.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
    pattern: Option<Regex>,
    help: String,
}

impl CommandRegistry {
    /// Build a registry from a command list and derive the pattern.
    ///
    /// # Errors
    ///
    /// Fails on duplicate or invalid names.
    pub fn new(commands: Vec<Command>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for command in commands {
            registry.insert(command)?;
        }
        registry.reset()?;
        Ok(registry)
    }

    /// Merge the persisted command list with the registered handlers.
    ///
    /// Persisted entries naming a handler get it bound; persisted proxies
    /// are kept; anything else is dropped. Handlers missing from the
    /// persisted list are appended at `default_level`, free and visible.
    ///
    /// # Errors
    ///
    /// Fails if the resulting pattern cannot be compiled.
    pub fn from_parts(
        persisted: Vec<Command>,
        plugins: &PluginRegistry,
        default_level: Level,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();

        for mut command in persisted {
            if let Some(handler) = plugins.get(&command.name) {
                command.handler = Some(handler);
                command.proxy = None;
            } else if !command.is_proxy() {
                tracing::warn!(command = %command.name, "persisted command has no handler, dropped");
                continue;
            }
            if let Err(e) = registry.insert(command) {
                tracing::warn!(error = %e, "persisted command skipped");
            }
        }

        for name in plugins.names() {
            if registry.get(name).is_some() {
                continue;
            }
            if let Some(handler) = plugins.get(name) {
                tracing::debug!(command = name, "registering new handler command");
                registry.insert(Command::with_handler(name, handler, default_level))?;
            }
        }

        registry.reset()?;
        tracing::info!(
            commands = registry.len(),
            handlers = plugins.len(),
            "command registry assembled"
        );
        Ok(registry)
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Mutable exact-match lookup.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.commands.iter_mut().find(|c| c.name == name)
    }

    /// Append a command. Call [`reset`](Self::reset) afterwards.
    ///
    /// # Errors
    ///
    /// Fails on duplicate or invalid names.
    pub fn insert(&mut self, command: Command) -> Result<(), RegistryError> {
        validate_name(&command.name)?;
        if self.get(&command.name).is_some() {
            return Err(RegistryError::Duplicate { name: command.name });
        }
        self.commands.push(command);
        Ok(())
    }

    /// Remove a command by name. Call [`reset`](Self::reset) afterwards.
    pub fn remove(&mut self, name: &str) -> Option<Command> {
        let idx = self.commands.iter().position(|c| c.name == name)?;
        Some(self.commands.remove(idx))
    }

    /// Rebuild the dispatch pattern and the help text from the live list.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Pattern`] if the alternation cannot be
    /// compiled.
    pub fn reset(&mut self) -> Result<(), RegistryError> {
        self.pattern = if self.commands.is_empty() {
            None
        } else {
            let names: Vec<String> = self
                .commands
                .iter()
                .map(|c| regex::escape(&c.name))
                .collect();
            Some(Regex::new(&format!(
                r"(?s)^({})(?:\s+(.+?))?\s*$",
                names.join("|")
            ))?)
        };

        let mut visible: Vec<&str> = self
            .commands
            .iter()
            .filter(|c| c.visible)
            .map(|c| c.name.as_str())
            .collect();
        visible.sort_unstable();
        self.help = format!("commands: {}", visible.join(", "));
        Ok(())
    }

    /// The help reply: sorted visible names.
    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// Match `text` against the live command names.
    pub fn parse(&self, text: &str) -> Option<Parsed> {
        let caps = self.pattern.as_ref()?.captures(text)?;
        let name = caps.get(1)?.as_str().to_owned();
        let args = caps.get(2).map_or("", |m| m.as_str()).to_owned();
        Some(Parsed { name, args })
    }

    /// Iterate over the live commands in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Number of live commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Snapshot for persistence.
    pub fn to_vec(&self) -> Vec<Command> {
        self.commands.clone()
    }
}
