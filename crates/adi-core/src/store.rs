//! Flat-file persistence for users, commands and the bank.
//!
//! Three independent JSON documents are loaded once at startup and
//! overwritten wholesale on every tick. Each write goes to a sibling
//! `.tmp` file first and is renamed over the target, so an interrupted
//! flush leaves the previous snapshot in place.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bank::Bank;
use crate::command::Command;
use crate::config::StateConfig;
use crate::state::BotState;
use crate::users::User;

/// Errors raised while reading or writing state documents.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The file could not be read or written.
    #[error("state file {path}: {source}")]
    Io {
        /// The offending file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file content is not a valid document.
    #[error("state file {path} is corrupt: {source}")]
    Json {
        /// The offending file.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// A required document does not exist.
    #[error("state file {path} is missing")]
    Missing {
        /// The expected file.
        path: PathBuf,
    },
}

/// The persisted state, before handlers are bound.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// User list.
    pub users: Vec<User>,
    /// Command list, handlers unbound.
    pub commands: Vec<Command>,
    /// Bank and lottery.
    pub bank: Bank,
}

/// Reads and writes the three state documents.
#[derive(Debug, Clone)]
pub struct StateStore {
    users_path: PathBuf,
    commands_path: PathBuf,
    bank_path: PathBuf,
    initialize_missing: bool,
}

impl StateStore {
    /// A store over the configured paths.
    pub fn new(config: &StateConfig) -> Self {
        Self {
            users_path: config.users_path(),
            commands_path: config.commands_path(),
            bank_path: config.bank_path(),
            initialize_missing: config.initialize_missing,
        }
    }

    /// Load all three documents.
    ///
    /// # Errors
    ///
    /// Any missing document is [`StoreError::Missing`] unless the store
    /// initializes missing state; unreadable or corrupt documents are
    /// always errors.
    pub fn load(&self) -> Result<Snapshot, StoreError> {
        let snapshot = Snapshot {
            users: self.read(&self.users_path)?,
            commands: self.read(&self.commands_path)?,
            bank: self.read(&self.bank_path)?,
        };
        tracing::info!(
            users = snapshot.users.len(),
            commands = snapshot.commands.len(),
            bank = %snapshot.bank.points,
            pot = %snapshot.bank.lottery.pot,
            "state loaded"
        );
        Ok(snapshot)
    }

    /// Overwrite all three documents from `state`.
    ///
    /// Every document is attempted; the first error is returned.
    pub fn save(&self, state: &BotState) -> Result<(), StoreError> {
        let users = write_atomic(&self.users_path, &state.users.to_vec());
        let commands = write_atomic(&self.commands_path, &state.commands.to_vec());
        let bank = write_atomic(&self.bank_path, &state.bank);
        users.and(commands).and(bank)?;
        tracing::debug!(users = state.users.len(), "state flushed");
        Ok(())
    }

    fn read<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T, StoreError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.initialize_missing {
                    tracing::warn!(path = %path.display(), "state file missing, starting empty");
                    return Ok(T::default());
                }
                return Err(StoreError::Missing {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use adi_ledger::{Level, Points, UserId};

    use super::*;
    use crate::command::{CommandRegistry, PluginRegistry};
    use crate::users::UserRegistry;

    fn scratch(name: &str) -> StateConfig {
        let dir = std::env::temp_dir().join(format!("adi-store-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        StateConfig {
            dir,
            ..StateConfig::default()
        }
    }

    #[test]
    fn missing_files_are_fatal_by_default() {
        let config = scratch("missing");
        let err = StateStore::new(&config).load().unwrap_err();
        assert!(matches!(err, StoreError::Missing { .. }));
        std::fs::remove_dir_all(&config.dir).unwrap();
    }

    #[test]
    fn missing_files_can_start_empty() {
        let config = StateConfig {
            initialize_missing: true,
            ..scratch("empty")
        };
        let snapshot = StateStore::new(&config).load().unwrap();
        assert!(snapshot.users.is_empty());
        assert_eq!(snapshot.bank, Bank::default());
        std::fs::remove_dir_all(&config.dir).unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let config = StateConfig {
            initialize_missing: true,
            ..scratch("corrupt")
        };
        std::fs::write(config.users_path(), "{not json").unwrap();
        let err = StateStore::new(&config).load().unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
        std::fs::remove_dir_all(&config.dir).unwrap();
    }

    #[test]
    fn save_then_load_restores_state() {
        let config = scratch("roundtrip");
        let store = StateStore::new(&config);

        let mut users = UserRegistry::new();
        users.get_or_create(&UserId::from("U1"), Level::new(2)).points = Points::new(9);
        let commands = CommandRegistry::from_parts(
            vec![Command::proxy("hi", "say hi", Level::default())],
            &PluginRegistry::new(),
            Level::default(),
        )
        .unwrap();
        let mut bank = Bank::default();
        bank.points = Points::new(77);
        let state = BotState::new(users, commands, bank, Level::default());

        store.save(&state).unwrap();
        assert!(!config.users_path().with_extension("tmp").exists());

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.users.len(), 1);
        assert_eq!(snapshot.users[0].points, Points::new(9));
        assert_eq!(snapshot.commands[0].proxy.as_deref(), Some("say hi"));
        assert_eq!(snapshot.bank.points, Points::new(77));
        std::fs::remove_dir_all(&config.dir).unwrap();
    }
}
