//! Key-value preference store.
//!
//! The keyboard persists a handful of typed values between sessions. The
//! host owns the real store; the core only needs string/int/bool access and
//! an explicit `flush`. Two implementations are provided: an in-memory one
//! for tests and embedding, and a TOML file for the command-line front end.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Preference keys shared with the settings screen.
pub mod keys {
    pub const VERTICAL: &str = "vertical";
    pub const ICONS_PER_X: &str = "iconsPerX";
    pub const ICON_SIZE: &str = "iconSize";
    pub const SHOW_BACK_BUTTON: &str = "showBackButton";
    pub const ACTIVE_PACK: &str = "activePack";
    pub const RECENT_CACHE: &str = "recentCache";
    pub const COMPAT_CACHE: &str = "compatCache";
    pub const STICKER_DIR_PATH: &str = "stickerDirPath";
    pub const LAST_UPDATE_DATE: &str = "lastUpdateDate";
    pub const NUM_STICKERS_IMPORTED: &str = "numStickersImported";
}

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Typed key-value store.
///
/// Getters return `None` when the key is absent or holds another type.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<&PrefValue>;
    fn put(&mut self, key: &str, value: PrefValue);

    /// Persist pending writes. In-memory stores do nothing.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            PrefValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            PrefValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            PrefValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn put_string(&mut self, key: &str, value: &str) {
        self.put(key, PrefValue::Str(value.to_string()));
    }

    fn put_int(&mut self, key: &str, value: i64) {
        self.put(key, PrefValue::Int(value));
    }

    fn put_bool(&mut self, key: &str, value: bool) {
        self.put(key, PrefValue::Bool(value));
    }
}

/// Non-persistent store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: BTreeMap<String, PrefValue>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<&PrefValue> {
        self.values.get(key)
    }

    fn put(&mut self, key: &str, value: PrefValue) {
        self.values.insert(key.to_string(), value);
    }
}

/// Store backed by a flat TOML document on disk.
#[derive(Debug, Clone)]
pub struct TomlPreferences {
    path: PathBuf,
    values: BTreeMap<String, PrefValue>,
    dirty: bool,
}

impl TomlPreferences {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("read preferences {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parse preferences {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, sorted by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PrefValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl PreferenceStore for TomlPreferences {
    fn get(&self, key: &str) -> Option<&PrefValue> {
        self.values.get(key)
    }

    fn put(&mut self, key: &str, value: PrefValue) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)
            .with_context(|| format!("write preferences {}", self.path.display()))?;
        debug!(path = %self.path.display(), "preferences flushed");
        self.dirty = false;
        Ok(())
    }
}
