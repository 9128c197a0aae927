//! Entry point for the adi chat bot.
//!
//! Loads configuration and persisted state, binds the built-in command
//! handlers, then runs a single-threaded event loop that owns all state.
//!
//! # Architecture
//!
//! ```text
//! stdin thread --> ConsoleInput --> events --> Dispatcher --> ConsolePlatform (stdout)
//! interval --> run_tick (draw, salary) --> StateStore
//! ```
//!
//! Messages and ticks never interleave: both are handled to completion on
//! the loop before the next input is taken.

mod console;
mod error;

use std::fs::OpenOptions;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use adi_core::bank::RngDraw;
use adi_core::command::{CommandRegistry, PluginRegistry};
use adi_core::config::{BotConfig, LoggingConfig};
use adi_core::dispatch::Dispatcher;
use adi_core::platform::{ChatPlatform, PlatformEvent};
use adi_core::state::BotState;
use adi_core::store::StateStore;
use adi_core::tick::run_tick;
use adi_core::users::UserRegistry;
use chrono::Utc;
use rand::RngCore;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::{ConsoleConfig, ConsoleInput, ConsolePlatform};
use crate::error::BotError;

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "ADI_CONFIG";

/// Config file used when [`CONFIG_ENV`] is unset.
const DEFAULT_CONFIG_PATH: &str = "adi-config.yaml";

/// Inbound events buffered between the reader and the loop.
const EVENT_BUFFER: usize = 64;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if startup fails or the platform rejects the
/// credentials.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, raw) = load_config(&config_path())?;
    init_tracing(&config.logging)?;
    info!(
        default_level = %config.bot.default_level,
        short_commands = config.bot.short_commands,
        tick_interval_secs = config.tick.interval_secs,
        state_dir = %config.state.dir.display(),
        "adi starting"
    );

    let console = ConsoleConfig::from_yaml(&raw)?;
    run(&config, &console).await?;
    info!("adi stopped");
    Ok(())
}

/// The config file named by `ADI_CONFIG`, or `adi-config.yaml`.
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Read and validate the config file, returning the raw text as well for
/// the sections other modules own. A missing or unreadable file is fatal.
fn load_config(path: &Path) -> Result<(BotConfig, String), BotError> {
    let raw = std::fs::read_to_string(path).map_err(|source| BotError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config = BotConfig::parse(&raw)?;
    Ok((config, raw))
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(config: &LoggingConfig) -> Result<(), BotError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match &config.file {
        None if config.json => builder.json().init(),
        None => builder.init(),
        Some(path) => {
            let file = open_log_file(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if config.json {
                builder.json().init();
            } else {
                builder.init();
            }
        }
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File, BotError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| BotError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Restore state, bind handlers and apply config overrides.
fn restore_state(config: &BotConfig, store: &StateStore) -> Result<BotState, BotError> {
    let snapshot = store.load()?;

    let mut plugins = PluginRegistry::new();
    adi_commands::register_all(&mut plugins)?;
    let commands =
        CommandRegistry::from_parts(snapshot.commands, &plugins, config.bot.default_level)?;

    let mut bank = snapshot.bank;
    config.lottery.apply_to(&mut bank.lottery);
    info!(
        ticket_price = %bank.lottery.ticket_price,
        draw_every_secs = bank.lottery.draw_every.as_secs(),
        invest = %bank.lottery.invest,
        next_draw = %bank.lottery.next_draw(),
        "lottery configured"
    );

    Ok(BotState::new(
        UserRegistry::from_users(snapshot.users),
        commands,
        bank,
        config.bot.default_level,
    ))
}

/// Run the event loop until the input ends, ctrl-c, or a fatal event.
/// State is flushed once more on the way out.
async fn run(config: &BotConfig, console: &ConsoleConfig) -> Result<(), BotError> {
    let store = StateStore::new(&config.state);
    let mut state = restore_state(config, &store)?;

    let platform = ConsolePlatform::new(console);
    let mut dispatcher = Dispatcher::new(
        config.bot.short_sign().map(str::to_owned),
        config.calc.timeout(),
    );
    let mut rng = rand::rng();

    let (tx, mut events) = mpsc::channel(EVENT_BUFFER);
    let connected = PlatformEvent::Connected {
        bot_id: platform.bot_id().to_owned(),
    };
    if tx.send(connected).await.is_err() {
        return Err(BotError::EventChannelClosed);
    }
    let input = ConsoleInput::new(console);
    std::thread::Builder::new()
        .name("console-input".to_owned())
        .spawn(move || input.run(std::io::stdin().lock(), &tx))
        .map_err(|source| BotError::InputThread { source })?;

    let period = config.tick.interval();
    let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break Ok(());
                };
                if let ControlFlow::Break(result) =
                    handle_event(&mut dispatcher, &mut state, &platform, &mut rng, event)
                {
                    break result;
                }
            }
            _ = ticker.tick() => {
                tick(&mut state, &platform, &store, &config.bot.system_user_id);
            }
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    error!(error = %e, "ctrl-c handler failed");
                }
                info!("shutdown requested");
                break Ok(());
            }
        }
    };

    if let Err(e) = store.save(&state) {
        error!(error = %e, "final state flush failed");
    }
    result
}

/// Apply one platform event. `Break` ends the loop with the given result.
fn handle_event(
    dispatcher: &mut Dispatcher,
    state: &mut BotState,
    platform: &ConsolePlatform,
    rng: &mut dyn RngCore,
    event: PlatformEvent,
) -> ControlFlow<Result<(), BotError>> {
    match event {
        PlatformEvent::Connected { bot_id } => {
            if let Err(e) = dispatcher.connect(&bot_id) {
                return ControlFlow::Break(Err(e.into()));
            }
            info!(bot_id, "connected");
        }
        PlatformEvent::Message(message) => {
            if let Some(reply) = dispatcher.handle_message(state, platform, rng, &message) {
                platform.send_message(&reply.text, &reply.channel);
            }
        }
        PlatformEvent::PresenceChange { user, presence } => {
            platform.set_presence(&user, presence);
        }
        PlatformEvent::Error(message) => warn!(message, "platform error"),
        PlatformEvent::InvalidAuth => {
            error!("platform rejected the credentials");
            return ControlFlow::Break(Err(BotError::InvalidAuth));
        }
        PlatformEvent::Disconnected => {
            info!("platform disconnected");
            return ControlFlow::Break(Ok(()));
        }
    }
    ControlFlow::Continue(())
}

/// Draw, pay salaries, then flush. A failed flush is retried next tick.
fn tick(
    state: &mut BotState,
    platform: &ConsolePlatform,
    store: &StateStore,
    system_user_id: &str,
) {
    let mut draw = RngDraw(rand::rng());
    let report = run_tick(state, platform, &mut draw, Utc::now(), system_user_id);
    if !report.conservation.is_balanced() {
        warn!(conservation = ?report.conservation, "point supply changed during tick");
    }
    if let Err(e) = store.save(state) {
        error!(error = %e, "state flush failed, retrying next tick");
    }
}
