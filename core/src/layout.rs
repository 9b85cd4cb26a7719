//! Sticker grid layouts and their memoization.
//!
//! Building a grid means decoding every sticker for display, so a layout is
//! built once per distinct pack content and reused every time that pack is
//! selected again in the same session. The memo key is a SHA-256 fingerprint
//! over the ordered sticker paths, which is stable across runs and sensitive
//! to both content and order (the grid is positional).

use crate::Config;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Height of the keyboard in vertical mode, in pixels.
const VERTICAL_KEYBOARD_HEIGHT: u32 = 800;

/// Share of the available space used by the full-size preview.
const PREVIEW_SCALE: f32 = 0.95;

/// Scrolling direction of the sticker grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Scrolls vertically; each row holds `icons_per_x` stickers.
    Vertical,
    /// Scrolls horizontally; each column holds `icons_per_x` stickers.
    Horizontal,
}

/// Pixel sizes derived from the configuration and display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub orientation: Orientation,
    pub icons_per_x: usize,
    /// Edge length of one sticker button.
    pub icon_size: u32,
    /// Height of the sticker area.
    pub keyboard_height: u32,
    /// Edge length of the long-press preview image.
    pub full_icon_size: u32,
}

impl LayoutMetrics {
    pub fn from_config(config: &Config) -> Self {
        let display = &config.display;
        let icons_per_x = config.icons_per_x.max(1);
        let total_icon_padding =
            (display.sticker_padding * 2.0 * (icons_per_x as f32 + 1.0)) as u32;

        let (orientation, icon_size, keyboard_height) = if config.vertical {
            let usable = display.width_px.saturating_sub(total_icon_padding);
            let icon = (usable as f32 / icons_per_x as f32) as u32;
            (Orientation::Vertical, icon, VERTICAL_KEYBOARD_HEIGHT)
        } else {
            let icon = (config.icon_size as f32 * display.density) as u32;
            let per_line = u32::try_from(icons_per_x).unwrap_or(u32::MAX);
            let height = icon
                .saturating_mul(per_line)
                .saturating_add(total_icon_padding);
            (Orientation::Horizontal, icon, height)
        };

        let preview_room = display
            .width_px
            .min(keyboard_height.saturating_sub(display.text_size_body_px));
        let full_icon_size = (preview_room as f32 * PREVIEW_SCALE) as u32;

        Self {
            orientation,
            icons_per_x,
            icon_size,
            keyboard_height,
            full_icon_size,
        }
    }
}

/// One sticker button placed in the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickerCell {
    pub path: PathBuf,
    pub row: usize,
    pub col: usize,
}

/// A renderable sticker grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PackLayout {
    pub orientation: Orientation,
    pub icon_size: u32,
    pub cells: Vec<StickerCell>,
}

impl PackLayout {
    /// Place `stickers` in grid order for the given metrics.
    pub fn build(stickers: &[PathBuf], metrics: &LayoutMetrics) -> Self {
        let per_line = metrics.icons_per_x.max(1);
        let cells = stickers
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let (row, col) = match metrics.orientation {
                    Orientation::Vertical => (i / per_line, i % per_line),
                    Orientation::Horizontal => (i % per_line, i / per_line),
                };
                StickerCell {
                    path: path.clone(),
                    row,
                    col,
                }
            })
            .collect();

        Self {
            orientation: metrics.orientation,
            icon_size: metrics.icon_size,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sticker at a grid position, if any.
    pub fn sticker_at(&self, row: usize, col: usize) -> Option<&Path> {
        self.cells
            .iter()
            .find(|c| c.row == row && c.col == col)
            .map(|c| c.path.as_path())
    }
}

/// Order-sensitive content fingerprint of a sticker list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(stickers: &[PathBuf]) -> Self {
        let mut hasher = Sha256::new();
        for path in stickers {
            hasher.update(path.to_string_lossy().as_bytes());
            // separator so ["ab","c"] and ["a","bc"] differ
            hasher.update([0u8]);
        }
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Session-lifetime map from pack fingerprint to built layout.
#[derive(Debug, Default)]
pub struct PackLayoutMemo {
    layouts: HashMap<Fingerprint, Arc<PackLayout>>,
}

impl PackLayoutMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stickers: &[PathBuf]) -> Option<Arc<PackLayout>> {
        self.layouts.get(&Fingerprint::of(stickers)).cloned()
    }

    /// Store `layout` for `stickers`, returning the shared handle.
    pub fn put(&mut self, stickers: &[PathBuf], layout: PackLayout) -> Arc<PackLayout> {
        let layout = Arc::new(layout);
        self.layouts
            .insert(Fingerprint::of(stickers), Arc::clone(&layout));
        layout
    }

    /// Memoized layout for `stickers`, building it with `build` on a miss.
    pub fn get_or_build<F>(&mut self, stickers: &[PathBuf], build: F) -> Arc<PackLayout>
    where
        F: FnOnce(&[PathBuf]) -> PackLayout,
    {
        let key = Fingerprint::of(stickers);
        if let Some(hit) = self.layouts.get(&key) {
            debug!(fingerprint = %key, "pack layout memo hit");
            return Arc::clone(hit);
        }
        debug!(fingerprint = %key, "building pack layout");
        let layout = Arc::new(build(stickers));
        self.layouts.insert(key, Arc::clone(&layout));
        layout
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn metrics(orientation: Orientation) -> LayoutMetrics {
        LayoutMetrics {
            orientation,
            icons_per_x: 3,
            icon_size: 100,
            keyboard_height: 400,
            full_icon_size: 300,
        }
    }

    #[test]
    fn test_memo_returns_same_arc() {
        let stickers = paths(&["/p/a.png", "/p/b.png"]);
        let mut memo = PackLayoutMemo::new();
        assert!(memo.get(&stickers).is_none());

        let stored = memo.put(
            &stickers,
            PackLayout::build(&stickers, &metrics(Orientation::Vertical)),
        );
        let first = memo.get(&stickers).unwrap();
        let second = memo.get(&stickers.clone()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &stored));
    }

    #[test]
    fn test_memo_is_order_sensitive() {
        let mut memo = PackLayoutMemo::new();
        let forward = paths(&["/p/a.png", "/p/b.png"]);
        let reversed = paths(&["/p/b.png", "/p/a.png"]);
        memo.put(
            &forward,
            PackLayout::build(&forward, &metrics(Orientation::Vertical)),
        );
        assert!(memo.get(&reversed).is_none());
        assert_ne!(Fingerprint::of(&forward), Fingerprint::of(&reversed));
    }

    #[test]
    fn test_fingerprint_separates_entries() {
        assert_ne!(
            Fingerprint::of(&paths(&["ab", "c"])),
            Fingerprint::of(&paths(&["a", "bc"]))
        );
    }

    #[test]
    fn test_get_or_build_builds_once() {
        let stickers = paths(&["/p/a.png"]);
        let mut memo = PackLayoutMemo::new();
        let mut builds = 0;
        let a = memo.get_or_build(&stickers, |s| {
            builds += 1;
            PackLayout::build(s, &metrics(Orientation::Vertical))
        });
        let b = memo.get_or_build(&stickers, |s| {
            builds += 1;
            PackLayout::build(s, &metrics(Orientation::Vertical))
        });
        assert_eq!(builds, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_grid_positions() {
        let stickers = paths(&["0", "1", "2", "3", "4"]);
        let v = PackLayout::build(&stickers, &metrics(Orientation::Vertical));
        assert_eq!(v.sticker_at(1, 0), Some(Path::new("3")));
        assert_eq!(v.sticker_at(0, 2), Some(Path::new("2")));

        let h = PackLayout::build(&stickers, &metrics(Orientation::Horizontal));
        assert_eq!(h.sticker_at(0, 1), Some(Path::new("3")));
        assert_eq!(h.sticker_at(2, 0), Some(Path::new("2")));
    }

    #[test]
    fn test_metrics_horizontal() {
        let mut config = Config::default();
        config.vertical = false;
        config.icons_per_x = 3;
        config.icon_size = 80;
        config.display.density = 2.0;
        config.display.sticker_padding = 4.0;
        config.display.width_px = 1080;
        config.display.text_size_body_px = 40;

        let m = LayoutMetrics::from_config(&config);
        assert_eq!(m.orientation, Orientation::Horizontal);
        assert_eq!(m.icon_size, 160);
        // padding: 4 * 2 * 4 = 32
        assert_eq!(m.keyboard_height, 160 * 3 + 32);
        assert_eq!(m.full_icon_size, ((512 - 40) as f32 * 0.95) as u32);
    }

    #[test]
    fn test_metrics_saturate_on_huge_settings() {
        let mut config = Config::default();
        config.icons_per_x = 100_000;
        config.icon_size = 100_000;

        let m = LayoutMetrics::from_config(&config);
        assert_eq!(m.keyboard_height, u32::MAX);
        assert_eq!(m.icon_size, 275_000);
    }

    #[test]
    fn test_metrics_vertical() {
        let mut config = Config::default();
        config.vertical = true;
        config.icons_per_x = 4;
        config.display.sticker_padding = 5.0;
        config.display.width_px = 1050;

        let m = LayoutMetrics::from_config(&config);
        assert_eq!(m.orientation, Orientation::Vertical);
        // padding: 5 * 2 * 5 = 50
        assert_eq!(m.icon_size, 250);
        assert_eq!(m.keyboard_height, 800);
    }
}
