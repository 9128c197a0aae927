//! Configuration loading and typed config structures for the adi bot.
//!
//! The canonical configuration lives in `adi-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! parser that validates it. Every section and key may be omitted; the
//! file itself must exist.

use std::path::PathBuf;
use std::time::Duration;

use adi_ledger::{Level, Points};
use serde::Deserialize;

use crate::bank::Lottery;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is present but unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BotConfig {
    /// Identity and addressing settings.
    #[serde(default)]
    pub bot: IdentityConfig,

    /// Lottery parameter overrides.
    #[serde(default)]
    pub lottery: LotteryConfig,

    /// Location of the persisted state documents.
    #[serde(default)]
    pub state: StateConfig,

    /// Timer settings.
    #[serde(default)]
    pub tick: TickConfig,

    /// Calculator sandbox settings.
    #[serde(default)]
    pub calc: CalcConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BotConfig {
    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lottery.ticket_price == Some(Points::ZERO) {
            return Err(ConfigError::Invalid {
                reason: "lottery.ticket_price must be at least 1".to_owned(),
            });
        }
        if self.lottery.draw_every_secs == Some(0) {
            return Err(ConfigError::Invalid {
                reason: "lottery.draw_every_secs must be at least 1".to_owned(),
            });
        }
        if self.tick.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "tick.interval_secs must be at least 1".to_owned(),
            });
        }
        if self.bot.short_commands && self.bot.short_command_sign.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "bot.short_command_sign is required when short_commands is on".to_owned(),
            });
        }
        Ok(())
    }
}

/// Identity and addressing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityConfig {
    /// Level assigned to users on first reference.
    #[serde(default)]
    pub default_level: Level,

    /// Whether a sigil may replace the explicit mention.
    #[serde(default)]
    pub short_commands: bool,

    /// The sigil recognised when `short_commands` is on.
    #[serde(default = "default_short_command_sign")]
    pub short_command_sign: String,

    /// The platform's own system account, never paid a salary.
    #[serde(default = "default_system_user_id")]
    pub system_user_id: String,
}

impl IdentityConfig {
    /// The configured sigil, if short commands are enabled.
    pub fn short_sign(&self) -> Option<&str> {
        self.short_commands.then_some(self.short_command_sign.as_str())
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_level: Level::default(),
            short_commands: false,
            short_command_sign: default_short_command_sign(),
            system_user_id: default_system_user_id(),
        }
    }
}

/// Lottery parameters applied over the persisted bank at startup.
///
/// Unset fields keep whatever the bank document holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LotteryConfig {
    /// Price of one ticket.
    #[serde(default)]
    pub ticket_price: Option<Points>,

    /// Seconds between draws.
    #[serde(default)]
    pub draw_every_secs: Option<u64>,

    /// Points the bank moves into the pot every draw period.
    #[serde(default)]
    pub invest: Option<Points>,
}

impl LotteryConfig {
    /// Overwrite the lottery parameters this config sets.
    pub fn apply_to(&self, lottery: &mut Lottery) {
        if let Some(price) = self.ticket_price {
            lottery.ticket_price = price;
        }
        if let Some(secs) = self.draw_every_secs {
            lottery.draw_every = Duration::from_secs(secs);
        }
        if let Some(invest) = self.invest {
            lottery.invest = invest;
        }
    }
}

/// Location of the persisted state documents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateConfig {
    /// Directory holding the three documents.
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,

    /// User list file name.
    #[serde(default = "default_users_file")]
    pub users_file: String,

    /// Command list file name.
    #[serde(default = "default_commands_file")]
    pub commands_file: String,

    /// Bank and lottery file name.
    #[serde(default = "default_bank_file")]
    pub bank_file: String,

    /// Start from empty state when a document is missing instead of
    /// aborting.
    #[serde(default)]
    pub initialize_missing: bool,
}

impl StateConfig {
    /// Full path of the user list.
    pub fn users_path(&self) -> PathBuf {
        self.dir.join(&self.users_file)
    }

    /// Full path of the command list.
    pub fn commands_path(&self) -> PathBuf {
        self.dir.join(&self.commands_file)
    }

    /// Full path of the bank document.
    pub fn bank_path(&self) -> PathBuf {
        self.dir.join(&self.bank_file)
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            users_file: default_users_file(),
            commands_file: default_commands_file(),
            bank_file: default_bank_file(),
            initialize_missing: false,
        }
    }
}

/// Timer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Seconds between lottery/salary/flush ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub interval_secs: u64,
}

impl TickConfig {
    /// The tick period.
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_tick_interval_secs(),
        }
    }
}

/// Calculator sandbox settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CalcConfig {
    /// Wall-clock budget for one evaluation, in milliseconds.
    #[serde(default = "default_calc_timeout_ms")]
    pub timeout_ms: u64,
}

impl CalcConfig {
    /// The evaluation budget.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_calc_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Append logs to this file instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

fn default_short_command_sign() -> String {
    "!".to_owned()
}

fn default_system_user_id() -> String {
    "USLACKBOT".to_owned()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_users_file() -> String {
    "users.json".to_owned()
}

fn default_commands_file() -> String {
    "commands.json".to_owned()
}

fn default_bank_file() -> String {
    "bank.json".to_owned()
}

const fn default_tick_interval_secs() -> u64 {
    60
}

const fn default_calc_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick.interval_secs, 60);
        assert_eq!(config.calc.timeout_ms, 1000);
        assert_eq!(config.bot.system_user_id, "USLACKBOT");
        assert_eq!(config.state.users_path(), PathBuf::from("./users.json"));
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
bot:
  default_level: 2
  short_commands: true
  short_command_sign: "."
lottery:
  ticket_price: 10
  draw_every_secs: 86400
  invest: 50
state:
  dir: "/var/lib/adi"
  initialize_missing: true
tick:
  interval_secs: 30
calc:
  timeout_ms: 500
logging:
  level: debug
  json: true
"#;
        let config = BotConfig::parse(yaml).unwrap();
        assert_eq!(config.bot.default_level, Level::new(2));
        assert_eq!(config.bot.short_sign(), Some("."));
        assert_eq!(config.lottery.ticket_price, Some(Points::new(10)));
        assert_eq!(config.lottery.draw_every_secs, Some(86400));
        assert_eq!(config.lottery.invest, Some(Points::new(50)));
        assert!(config.state.initialize_missing);
        assert_eq!(config.state.bank_path(), PathBuf::from("/var/lib/adi/bank.json"));
        assert_eq!(config.tick.interval(), Duration::from_secs(30));
        assert_eq!(config.calc.timeout(), Duration::from_millis(500));
        assert!(config.logging.json);
    }

    #[test]
    fn omitted_keys_take_defaults() {
        assert_eq!(BotConfig::parse("bot: {}\n").unwrap().bot, IdentityConfig::default());
    }

    #[test]
    fn short_sign_is_none_when_disabled() {
        let config = BotConfig::parse("bot:\n  short_command_sign: \"!\"\n").unwrap();
        assert_eq!(config.bot.short_sign(), None);
    }

    #[test]
    fn zero_ticket_price_is_rejected() {
        let err = BotConfig::parse("lottery:\n  ticket_price: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let err = BotConfig::parse("tick:\n  interval_secs: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = BotConfig::parse("bot: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn lottery_overrides_only_touch_set_fields() {
        let mut lottery = Lottery {
            invest: Points::new(3),
            ..Lottery::default()
        };
        let config = LotteryConfig {
            ticket_price: Some(Points::new(25)),
            draw_every_secs: None,
            invest: None,
        };
        config.apply_to(&mut lottery);
        assert_eq!(lottery.ticket_price, Points::new(25));
        assert_eq!(lottery.invest, Points::new(3));
        assert_eq!(lottery.draw_every, Duration::from_secs(86_400));
    }
}
