//! Keyboard session management.
//!
//! A `KeyboardSession` spans one lifetime of the keyboard service: it is
//! started with the configuration and preference store, receives focus and
//! blur events as the user moves between text fields, and is ended when the
//! service goes away. It owns the loaded packs, both recency caches (through
//! `ContentDelivery`), the layout memo and the platform context.

use crate::cache::RecencyCache;
use crate::context::{ContentCommit, InputTarget, KeyboardContext, Preview};
use crate::delivery::{CompatStore, ContentDelivery, PendingConversion, TapOutcome};
use crate::error::StickerError;
use crate::layout::{LayoutMetrics, PackLayout, PackLayoutMemo};
use crate::pack::{self, StickerPack, COMPAT_DIR_NAME, RECENT_PACK_NAME};
use crate::prefs::{keys, PreferenceStore};
use crate::transcode::{PngTranscoder, Transcoder};
use crate::Config;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which view the sticker area shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivePack {
    /// Recently sent stickers, newest first.
    Recent,
    /// A loaded pack by name.
    Pack(String),
}

impl ActivePack {
    /// Name persisted under `activePack`.
    pub fn as_pref(&self) -> &str {
        match self {
            ActivePack::Recent => RECENT_PACK_NAME,
            ActivePack::Pack(name) => name,
        }
    }
}

/// One button in the pack strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackTab {
    /// Switch back to the previous keyboard.
    Back,
    Recent,
    Pack { name: String, thumbnail: PathBuf },
}

/// State for one keyboard service lifetime.
pub struct KeyboardSession<S: PreferenceStore> {
    config: Config,
    metrics: LayoutMetrics,
    prefs: S,
    packs: BTreeMap<String, StickerPack>,
    memo: PackLayoutMemo,
    delivery: ContentDelivery,
    active: Option<ActivePack>,
    saved_active: String,
    target: Option<InputTarget>,
    context: KeyboardContext,
}

impl<S: PreferenceStore> KeyboardSession<S> {
    /// Start a session with the default PNG transcoder.
    pub fn start(config: Config, prefs: S) -> Result<Self> {
        Self::start_with_transcoder(config, prefs, Arc::new(PngTranscoder))
    }

    /// Start a session: load packs, hydrate caches, drop orphaned compat files.
    pub fn start_with_transcoder(
        config: Config,
        prefs: S,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self> {
        let packs = pack::discover_packs(&config.sticker_dir)?;

        let recent = RecencyCache::from_serialized(
            config.recent_capacity,
            prefs.get_string(keys::RECENT_CACHE).unwrap_or_default(),
        );
        // A committed PNG must outlive its own commit, so keep at least one.
        let compat_capacity = if config.compat_capacity == 0 {
            warn!("compat cache capacity 0 raised to 1");
            1
        } else {
            config.compat_capacity
        };
        let compat_cache = RecencyCache::from_serialized(
            compat_capacity,
            prefs.get_string(keys::COMPAT_CACHE).unwrap_or_default(),
        );

        let store = CompatStore::new(config.sticker_dir.join(COMPAT_DIR_NAME));
        if let Err(e) = store.sweep_orphans(&compat_cache) {
            warn!(error = %e, "could not sweep compat stickers");
        }

        let saved_active = prefs
            .get_string(keys::ACTIVE_PACK)
            .unwrap_or_default()
            .to_string();

        info!(
            packs = packs.len(),
            recent = recent.len(),
            compat = compat_cache.len(),
            "keyboard session started"
        );

        let delivery = ContentDelivery::new(
            recent,
            compat_cache,
            store,
            transcoder,
            config.png_quality,
        );

        Ok(Self {
            metrics: LayoutMetrics::from_config(&config),
            config,
            prefs,
            packs,
            memo: PackLayoutMemo::new(),
            delivery,
            active: None,
            saved_active,
            target: None,
            context: KeyboardContext::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    pub fn prefs(&self) -> &S {
        &self.prefs
    }

    pub fn packs(&self) -> &BTreeMap<String, StickerPack> {
        &self.packs
    }

    pub fn pack(&self, name: &str) -> Option<&StickerPack> {
        self.packs.get(name)
    }

    pub fn recent_cache(&self) -> &RecencyCache {
        self.delivery.recent()
    }

    pub fn compat_cache(&self) -> &RecencyCache {
        self.delivery.compat_cache()
    }

    pub fn compat_store(&self) -> &CompatStore {
        self.delivery.store()
    }

    pub fn memo(&self) -> &PackLayoutMemo {
        &self.memo
    }

    pub fn active_pack(&self) -> Option<&ActivePack> {
        self.active.as_ref()
    }

    pub fn target(&self) -> Option<&InputTarget> {
        self.target.as_ref()
    }

    pub fn context(&self) -> &KeyboardContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut KeyboardContext {
        &mut self.context
    }

    /// Buttons for the pack strip: back (if enabled), recent, then packs
    /// alphabetically with their thumbnails.
    pub fn pack_tabs(&self) -> Vec<PackTab> {
        let mut tabs = Vec::with_capacity(self.packs.len() + 2);
        if self.config.show_back_button {
            tabs.push(PackTab::Back);
        }
        tabs.push(PackTab::Recent);
        for pack in self.packs.values() {
            if let Some(thumb) = pack.thumb_sticker() {
                tabs.push(PackTab::Pack {
                    name: pack.name().to_string(),
                    thumbnail: thumb.to_path_buf(),
                });
            }
        }
        tabs
    }

    /// Show the view that was active last time.
    ///
    /// Falls back to the first pack alphabetically when the saved pack is
    /// gone, and to the recent view when there are no packs at all.
    pub fn activate_initial(&mut self) -> Arc<PackLayout> {
        if self.saved_active == RECENT_PACK_NAME {
            return self.select_recent();
        }
        let saved = self.saved_active.clone();
        match self.select_pack(&saved) {
            Ok(layout) => layout,
            Err(err) => {
                if !saved.is_empty() {
                    info!(error = %err, "previous pack unavailable");
                }
                match self.packs.keys().next().cloned() {
                    Some(first) => self.select_pack(&first).unwrap_or_else(|_| self.select_recent()),
                    None => self.select_recent(),
                }
            }
        }
    }

    /// Switch to a pack, reusing its layout if it was built before.
    pub fn select_pack(&mut self, name: &str) -> Result<Arc<PackLayout>, StickerError> {
        let pack = self.packs.get(name).ok_or_else(|| StickerError::MissingPack {
            name: name.to_string(),
        })?;
        let metrics = self.metrics;
        let layout = self
            .memo
            .get_or_build(pack.stickers(), |s| PackLayout::build(s, &metrics));
        self.set_active(ActivePack::Pack(name.to_string()));
        Ok(layout)
    }

    /// Switch to the recent view. Its content changes with every send, so it
    /// is rebuilt each time.
    pub fn select_recent(&mut self) -> Arc<PackLayout> {
        let stickers: Vec<PathBuf> = self
            .delivery
            .recent()
            .to_ordered_list()
            .into_iter()
            .rev()
            .map(PathBuf::from)
            .collect();
        self.set_active(ActivePack::Recent);
        Arc::new(PackLayout::build(&stickers, &self.metrics))
    }

    fn set_active(&mut self, active: ActivePack) {
        debug!(pack = active.as_pref(), "active pack changed");
        self.context.active_pack = active.as_pref().to_string();
        self.active = Some(active);
    }

    /// A text field gained focus.
    pub fn on_focus(&mut self, target: InputTarget) {
        self.delivery.set_target(Some(&target));
        self.target = Some(target);
    }

    /// The focused text field went away: persist caches and active pack.
    pub fn on_blur(&mut self) -> Result<()> {
        self.delivery.set_target(None);
        self.target = None;
        self.persist()
    }

    /// Send a sticker to the focused field.
    pub fn tap(&mut self, sticker: &Path) -> TapOutcome {
        self.delivery.deliver(sticker, &mut self.context)
    }

    /// Complete a fallback conversion started by `tap`.
    pub fn finish_conversion(&mut self, pending: PendingConversion) -> Option<ContentCommit> {
        self.delivery.finish(pending, &mut self.context)
    }

    /// Tap and, if a conversion starts, wait for it.
    pub fn tap_and_wait(&mut self, sticker: &Path) -> Option<ContentCommit> {
        match self.tap(sticker) {
            TapOutcome::Committed(commit) => Some(commit),
            TapOutcome::Converting(pending) => self.finish_conversion(pending),
            _ => None,
        }
    }

    /// Open the full-size preview for a sticker. Nothing is committed.
    pub fn long_press(&mut self, sticker: &Path) -> &Preview {
        self.context.preview.insert(Preview {
            path: sticker.to_path_buf(),
            size: self.metrics.full_icon_size,
        })
    }

    /// Close the preview overlay (tap on the overlay or the image).
    pub fn dismiss_preview(&mut self) {
        self.context.preview = None;
    }

    /// Forget all cached stickers after the sticker directory was replaced,
    /// then reload the packs from it.
    ///
    /// Returns the number of stickers now loaded, which is also stored under
    /// `numStickersImported`.
    pub fn reset_for_new_directory(
        &mut self,
        source_dir: &str,
        update_date: &str,
    ) -> Result<usize> {
        self.delivery.recent_mut().clear();
        self.delivery.compat_cache_mut().clear();
        self.delivery.store().purge()?;
        self.memo = PackLayoutMemo::new();
        self.packs = pack::discover_packs(&self.config.sticker_dir)?;

        let imported: usize = self.packs.values().map(StickerPack::len).sum();
        info!(packs = self.packs.len(), stickers = imported, "sticker directory reloaded");
        self.prefs.put_string(keys::STICKER_DIR_PATH, source_dir);
        self.prefs.put_string(keys::LAST_UPDATE_DATE, update_date);
        self.prefs
            .put_int(keys::NUM_STICKERS_IMPORTED, i64::try_from(imported).unwrap_or(i64::MAX));
        self.persist()?;
        Ok(imported)
    }

    /// Write caches and the active pack to the preference store.
    pub fn persist(&mut self) -> Result<()> {
        let recent = self.delivery.recent().serialize();
        let compat = self.delivery.compat_cache().serialize();
        self.prefs.put_string(keys::RECENT_CACHE, &recent);
        self.prefs.put_string(keys::COMPAT_CACHE, &compat);
        if let Some(active) = &self.active {
            self.prefs.put_string(keys::ACTIVE_PACK, active.as_pref());
        }
        self.prefs.flush()
    }

    /// End the session, persisting state and handing back the store.
    pub fn end(mut self) -> Result<S> {
        if self.delivery.in_flight() > 0 {
            debug!(
                in_flight = self.delivery.in_flight(),
                "ending with conversions still running"
            );
        }
        self.persist()?;
        Ok(self.prefs)
    }
}
