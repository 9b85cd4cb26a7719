//! Sticker packs backed by directories.
//!
//! A pack is one subdirectory of the sticker root; every supported image file
//! directly inside it is a sticker. Packs are loaded once when a session
//! starts and are never mutated afterwards.

use crate::mime;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reserved directory under the sticker root holding converted PNGs.
pub const COMPAT_DIR_NAME: &str = "__compatSticker__";

/// Pack name used to persist "the recent view was active".
pub const RECENT_PACK_NAME: &str = "__recentSticker__";

/// One directory of sticker files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickerPack {
    name: String,
    stickers: Vec<PathBuf>,
}

impl StickerPack {
    /// Build a pack from an explicit sticker list.
    pub fn new<S: Into<String>>(name: S, stickers: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            stickers,
        }
    }

    /// Load a pack from `dir`, listing its immediate files.
    ///
    /// Subdirectories and unsupported files are skipped. The listing is
    /// sorted by file name so the order is stable across loads. The result
    /// may be empty; callers decide whether to keep it.
    pub fn load(dir: &Path) -> Result<Self> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("pack directory {} has no usable name", dir.display()))?
            .to_string();

        let mut stickers = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if mime::mime_for_path(&path).is_some() {
                stickers.push(path);
            } else {
                debug!(path = %path.display(), "skipping unsupported file");
            }
        }
        stickers.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(Self { name, stickers })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stickers(&self) -> &[PathBuf] {
        &self.stickers
    }

    /// The pack icon: first sticker in listing order.
    pub fn thumb_sticker(&self) -> Option<&Path> {
        self.stickers.first().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.stickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stickers.is_empty()
    }
}

/// Load every non-empty pack under `root`, keyed (and ordered) by name.
///
/// The compat directory is never treated as a pack. A missing root yields no
/// packs rather than an error.
pub fn discover_packs(root: &Path) -> Result<BTreeMap<String, StickerPack>> {
    let mut packs = BTreeMap::new();
    if !root.is_dir() {
        info!(root = %root.display(), "sticker root does not exist");
        return Ok(packs);
    }

    for entry in fs::read_dir(root).with_context(|| format!("list {}", root.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() || entry.file_name() == COMPAT_DIR_NAME {
            continue;
        }
        let pack = StickerPack::load(&entry.path())?;
        if pack.is_empty() {
            debug!(pack = pack.name(), "ignoring empty pack");
            continue;
        }
        packs.insert(pack.name().to_string(), pack);
    }

    info!(count = packs.len(), "loaded sticker packs");
    Ok(packs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_load_lists_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let pack_dir = dir.path().join("cats");
        touch(&pack_dir.join("b.png"));
        touch(&pack_dir.join("a.webp"));
        touch(&pack_dir.join("notes.txt"));
        touch(&pack_dir.join("nested/c.png"));

        let pack = StickerPack::load(&pack_dir).unwrap();
        assert_eq!(pack.name(), "cats");
        let names: Vec<_> = pack
            .stickers()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.webp", "b.png"]);
        assert_eq!(pack.thumb_sticker(), Some(pack_dir.join("a.webp").as_path()));
    }

    #[test]
    fn test_discover_skips_compat_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("zebra/1.gif"));
        touch(&dir.path().join("apple/1.png"));
        touch(&dir.path().join(COMPAT_DIR_NAME).join("abc.png"));
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        touch(&dir.path().join("loose.png"));

        let packs = discover_packs(dir.path()).unwrap();
        let names: Vec<_> = packs.keys().cloned().collect();
        assert_eq!(names, vec!["apple", "zebra"]);
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let packs = discover_packs(&dir.path().join("nope")).unwrap();
        assert!(packs.is_empty());
    }
}
