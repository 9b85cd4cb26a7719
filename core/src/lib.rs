//! ewesticker-core
//!
//! Sticker delivery pipeline for the EweSticker image keyboard: pack
//! discovery, recency caches, layout memoization and the rich-content commit
//! protocol with PNG fallback.
//!
//! The crate is independent of any host input-method framework. A platform
//! drives a [`KeyboardSession`] with `start`, `on_focus`, `tap`, `on_blur`
//! and `end`, and reads a [`KeyboardContext`] for content to commit and
//! notices to show.
//!
//! Public API:
//! - `RecencyCache` - Bounded most-recently-used key cache with persistence
//! - `StickerPack` - One directory of sticker files
//! - `PackLayoutMemo` - Fingerprint-keyed memo of built sticker grids
//! - `ContentDelivery` - Commit protocol with compat-PNG fallback
//! - `KeyboardSession` - Lifecycle controller tying the above together
//! - `Config` - Layout and cache configuration
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod cache;
pub use cache::RecencyCache;

pub mod error;
pub use error::StickerError;

pub mod mime;

pub mod pack;
pub use pack::{discover_packs, StickerPack, COMPAT_DIR_NAME, RECENT_PACK_NAME};

pub mod layout;
pub use layout::{Fingerprint, LayoutMetrics, Orientation, PackLayout, PackLayoutMemo, StickerCell};

pub mod transcode;
pub use transcode::{PngTranscoder, Transcoder};

pub mod prefs;
pub use prefs::{MemoryPreferences, PrefValue, PreferenceStore, TomlPreferences};

pub mod context;
pub use context::{ContentCommit, InputTarget, KeyboardContext, Preview};

pub mod delivery;
pub use delivery::{compat_id, Acceptance, CompatStore, ContentDelivery, PendingConversion, TapOutcome};

pub mod session;
pub use session::{ActivePack, KeyboardSession, PackTab};

/// Display properties used to size the sticker grid.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayMetrics {
    /// Screen width in pixels
    pub width_px: u32,
    /// Pixels per density-independent pixel
    pub density: f32,
    /// Padding around each sticker button, in pixels
    pub sticker_padding: f32,
    /// Height of body text, subtracted from the preview area
    pub text_size_body_px: u32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self {
            width_px: 1080,
            density: 2.75,
            sticker_padding: 11.0,
            text_size_body_px: 44,
        }
    }
}

/// Keyboard configuration.
///
/// Layout fields mirror the preference keys written by the settings screen
/// (`vertical`, `iconsPerX`, `iconSize`, `showBackButton`); the rest are
/// fixed per installation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Internal sticker root: one subdirectory per pack.
    pub sticker_dir: PathBuf,

    /// Scroll the grid vertically instead of horizontally
    pub vertical: bool,
    /// Stickers per row (vertical) or per column (horizontal)
    pub icons_per_x: usize,
    /// Sticker size in density-independent pixels (horizontal mode only)
    pub icon_size: u32,
    /// Show a button that switches back to the previous keyboard
    pub show_back_button: bool,

    // Cache Management
    /// Number of recently sent stickers remembered
    pub recent_capacity: usize,
    /// Number of converted PNGs kept on disk
    pub compat_capacity: usize,
    /// Quality passed to the PNG encoder (0-100)
    pub png_quality: u8,

    pub display: DisplayMetrics,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sticker_dir: PathBuf::from("stickers"),
            vertical: false,
            icons_per_x: 3,
            icon_size: 80,
            show_back_button: false,
            recent_capacity: 30,
            compat_capacity: 10,
            png_quality: 90,
            display: DisplayMetrics::default(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `sticker_dir`.
    pub fn with_sticker_dir<P: Into<PathBuf>>(sticker_dir: P) -> Self {
        Self {
            sticker_dir: sticker_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Overlay the layout settings stored by the settings screen.
    ///
    /// Keys that are missing or hold the wrong type keep their current value.
    pub fn apply_preferences<S: PreferenceStore + ?Sized>(&mut self, store: &S) {
        if let Some(v) = store.get_bool(prefs::keys::VERTICAL) {
            self.vertical = v;
        }
        if let Some(n) = store.get_int(prefs::keys::ICONS_PER_X) {
            match u32::try_from(n) {
                Ok(n) if n > 0 => self.icons_per_x = n as usize,
                _ => warn!(value = n, "ignoring out-of-range iconsPerX"),
            }
        }
        if let Some(n) = store.get_int(prefs::keys::ICON_SIZE) {
            match u32::try_from(n) {
                Ok(n) if n > 0 => self.icon_size = n,
                _ => warn!(value = n, "ignoring out-of-range iconSize"),
            }
        }
        if let Some(b) = store.get_bool(prefs::keys::SHOW_BACK_BUTTON) {
            self.show_back_button = b;
        }
    }

    /// Set how many stickers fit in one grid line. Zero is ignored.
    pub fn set_icons_per_x(&mut self, n: usize) {
        if n > 0 {
            self.icons_per_x = n;
        }
    }

    /// Toggle vertical scrolling.
    pub fn toggle_vertical(&mut self) {
        self.vertical = !self.vertical;
    }
}
