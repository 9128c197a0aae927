//! The adi command economy: dispatch, users, bank and lottery.
//!
//! A single owner holds a [`BotState`] and feeds it two kinds of input:
//! addressed chat messages, which go through the [`Dispatcher`], and timer
//! ticks, which go through [`run_tick`]. Nothing here locks; the owner
//! serializes every mutation.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration.
//! - [`platform`] -- the messaging-platform collaborator and an in-memory
//!   directory.
//! - [`users`] -- the lazily populated user registry.
//! - [`command`] -- commands, handler registration and the live registry.
//! - [`dispatch`] -- address filter and the authorization pipeline.
//! - [`bank`] -- the house account and the lottery engine.
//! - [`state`] -- [`BotState`] and account resolution.
//! - [`tick`] -- lottery draw, salary and conservation per timer tick.
//! - [`store`] -- JSON snapshot persistence.

pub mod bank;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod platform;
pub mod state;
pub mod store;
pub mod tick;
pub mod users;

pub use bank::{Bank, DrawOutcome, DrawReport, Lottery, RngDraw, TicketDraw, TicketRequest};
pub use command::{
    Command, CommandContext, CommandRegistry, Handler, PluginRegistry, RegistryError, Response,
};
pub use config::{BotConfig, ConfigError};
pub use dispatch::{Dispatcher, Outcome, Reply};
pub use platform::{ChatPlatform, MemoryPlatform, PlatformError, PlatformEvent, PlatformUser};
pub use state::BotState;
pub use store::{Snapshot, StateStore, StoreError};
pub use tick::{TickReport, run_tick};
pub use users::{User, UserRegistry};
