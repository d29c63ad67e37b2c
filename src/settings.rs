// src/settings.rs

//! User settings
//!
//! Settings are stored in the database `settings` table and can be
//! overridden per invocation from the command line. Known keys:
//!
//! | key | value | default |
//! |-----|-------|---------|
//! | `dependencies.enabled` | `true` / `false` | `false` |
//! | `dependencies.source` | path to a catalog JSON file | unset |

use crate::db::models::Setting;
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::debug;

pub const DEPENDENCIES_ENABLED: &str = "dependencies.enabled";
pub const DEPENDENCIES_SOURCE: &str = "dependencies.source";

/// All keys accepted by `config set`
pub const KNOWN_KEYS: [&str; 2] = [DEPENDENCIES_ENABLED, DEPENDENCIES_SOURCE];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Resolve and install package dependencies before the package itself
    pub dependencies_enabled: bool,
    /// Catalog consulted for dependencies when the package did not come from a source
    pub dependency_source: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the database, using defaults for unset keys
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut settings = Settings::default();
        for setting in Setting::list_all(conn)? {
            settings.apply(&setting.key, &setting.value)?;
        }
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Validate and persist one key
    pub fn store(conn: &Connection, key: &str, value: &str) -> Result<()> {
        Settings::default().apply(key, value)?;
        Setting::set(conn, key, value)
    }

    /// Read the raw stored value of a known key
    pub fn lookup(conn: &Connection, key: &str) -> Result<Option<String>> {
        check_key(key)?;
        Setting::get(conn, key)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            DEPENDENCIES_ENABLED => {
                self.dependencies_enabled = parse_bool(value)
                    .ok_or_else(|| Error::Config(format!("{} expects true or false, got '{}'", key, value)))?;
            }
            DEPENDENCIES_SOURCE => {
                self.dependency_source = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn check_key(key: &str) -> Result<()> {
    if KNOWN_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(unknown_key(key))
    }
}

fn unknown_key(key: &str) -> Error {
    Error::Config(format!("Unknown setting '{}' (known: {})", key, KNOWN_KEYS.join(", ")))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
