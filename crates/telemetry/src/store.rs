//! User-level preference store.
//!
//! A small TOML file addressed by dotted keys such as `telemetry.disabled`.
//! It lives at `<config dir>/pennant/preferences.toml` unless
//! `PENNANT_CONFIG_DIR` points somewhere else. A missing file is an empty
//! store.

use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::debug;

use crate::env::{EnvSource, CONFIG_DIR_VAR};
use crate::error::{Result, TelemetryError};

const STORE_DIR: &str = "pennant";
const STORE_FILE: &str = "preferences.toml";

/// Dotted-key preference store backed by a TOML file.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    table: Table,
}

impl PreferenceStore {
    /// Location of the user's store, if a config directory can be found.
    pub fn default_path(env: &EnvSource) -> Option<PathBuf> {
        if let Some(dir) = env.non_empty(CONFIG_DIR_VAR) {
            return Some(PathBuf::from(dir).join(STORE_FILE));
        }
        dirs::config_dir().map(|d| d.join(STORE_DIR).join(STORE_FILE))
    }

    /// Open the user's store. With no config directory available the store
    /// is in-memory only.
    pub fn open_default(env: &EnvSource) -> Result<Self> {
        match Self::default_path(env) {
            Some(path) => Self::open(path),
            None => Ok(Self::in_memory()),
        }
    }

    /// Open the store at `path`; a missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = match std::fs::read_to_string(&path) {
            Ok(content) => content.parse::<Table>().map_err(|e| {
                TelemetryError::Store(format!("failed to parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            table,
        })
    }

    /// An empty store that saves to `path`, replacing whatever is there.
    pub fn empty_at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            table: Table::new(),
        }
    }

    /// A store with no backing file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up a dotted key such as `telemetry.disabled`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.table.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Boolean at `key`; other value types read as unset.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// String at `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Set `key`, creating intermediate tables as needed. Fails when a
    /// parent segment already holds a non-table value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let (parents, leaf) = split_key(key)?;
        let mut current = &mut self.table;
        for part in parents {
            if !current.contains_key(part) {
                current.insert(part.to_string(), Value::Table(Table::new()));
            }
            current = current
                .get_mut(part)
                .and_then(Value::as_table_mut)
                .ok_or_else(|| {
                    TelemetryError::Store(format!("`{part}` in `{key}` is not a table"))
                })?;
        }
        current.insert(leaf.to_string(), value.into());
        Ok(())
    }

    /// Remove `key`, returning the old value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let (parents, leaf) = split_key(key).ok()?;
        let mut current = &mut self.table;
        for part in parents {
            current = current.get_mut(part)?.as_table_mut()?;
        }
        current.remove(leaf)
    }

    /// Write the store back to its file, creating parent directories.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| TelemetryError::Store("store has no backing file".into()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.table)
            .map_err(|e| TelemetryError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        debug!(path = %path.display(), "saved preference store");
        Ok(())
    }
}

fn split_key(key: &str) -> Result<(Vec<&str>, &str)> {
    let mut parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(TelemetryError::Store(format!("invalid key `{key}`")));
    }
    let leaf = parts.pop().unwrap_or_default();
    Ok((parts, leaf))
}
