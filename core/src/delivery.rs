//! Rich-content delivery of stickers to the focused text field.
//!
//! A tap either commits the sticker file as-is, or, when the receiver does not
//! accept the sticker's own format, falls back to a PNG copy ("compat
//! sticker"). Compat stickers are produced on a worker thread the first time
//! they are needed and kept on disk while their identifier stays in the
//! compat cache. Evicting an identifier deletes its file, so the number of
//! compat files never exceeds the cache capacity.
//!
//! All failures here are local: an unsupported format becomes a notice,
//! a failed conversion is logged and the tap does nothing.

use crate::cache::RecencyCache;
use crate::context::{ContentCommit, InputTarget, KeyboardContext};
use crate::error::StickerError;
use crate::mime;
use crate::transcode::Transcoder;
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Suffix of a compat sticker while it is being written.
const PARTIAL_SUFFIX: &str = "part";

// Distinguishes the partial files of overlapping conversions of one sticker.
static NEXT_PARTIAL: AtomicU64 = AtomicU64::new(0);

/// Sticker mime types the focused target accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acceptance {
    mimes: Vec<&'static str>,
}

impl Acceptance {
    /// Nothing is accepted (no focused field).
    pub fn none() -> Self {
        Self::default()
    }

    /// Match every supported sticker type against the target's advertised
    /// list. Missing target or package name accepts nothing.
    pub fn for_target(target: Option<&InputTarget>) -> Self {
        let Some(target) = target else {
            return Self::none();
        };
        if target.package_name.as_deref().map_or(true, str::is_empty) {
            return Self::none();
        }
        let mimes = mime::supported_mimes()
            .into_iter()
            .filter(|m| {
                target
                    .content_mime_types
                    .iter()
                    .any(|adv| mime::mime_matches(m, adv))
            })
            .collect();
        Self { mimes }
    }

    pub fn accepts(&self, mime_type: &str) -> bool {
        self.mimes.iter().any(|m| *m == mime_type)
    }

    pub fn mimes(&self) -> &[&'static str] {
        &self.mimes
    }
}

/// Stable identifier of a sticker's compat PNG: hex SHA-256 of its path.
pub fn compat_id(sticker: &Path) -> String {
    let digest = Sha256::digest(sticker.to_string_lossy().as_bytes());
    format!("{:x}", digest)
}

/// Directory holding compat PNGs, one file per identifier.
#[derive(Debug, Clone)]
pub struct CompatStore {
    dir: PathBuf,
}

impl CompatStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.png", id))
    }

    fn partial_path_for(&self, id: &str, seq: u64) -> PathBuf {
        self.dir.join(format!("{}.png.{}.{}", id, seq, PARTIAL_SUFFIX))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.path_for(id).is_file()
    }

    /// Delete the PNG for `id`. A missing file is not an error.
    pub fn remove(&self, id: &str) {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed compat sticker"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove compat sticker"),
        }
    }

    /// Delete every file in the store not referenced by `live`.
    ///
    /// Returns the number of files removed.
    pub fn sweep_orphans(&self, live: &RecencyCache) -> Result<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            let is_live = path.extension().is_some_and(|e| e == "png")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|id| live.contains(id));
            if !is_live {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "swept orphaned compat stickers");
        }
        Ok(removed)
    }

    /// Remove the whole store.
    pub fn purge(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

type InFlight = Arc<Mutex<HashSet<String>>>;

fn lock(set: &InFlight) -> MutexGuard<'_, HashSet<String>> {
    // the set holds plain ids; a panic elsewhere cannot leave it inconsistent
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks an id as converting for as long as its `PendingConversion` lives.
#[derive(Debug)]
struct InFlightClaim {
    id: String,
    set: InFlight,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.id);
    }
}

/// A fallback conversion running on a worker thread.
///
/// Hand it back to [`ContentDelivery::finish`] (or the session's
/// `finish_conversion`) on the interactive thread. Dropping it detaches the
/// worker and releases the sticker: the file it writes is reused on the next
/// tap.
#[derive(Debug)]
pub struct PendingConversion {
    id: String,
    source: PathBuf,
    handle: JoinHandle<Result<(), StickerError>>,
    claim: InFlightClaim,
}

impl PendingConversion {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Whether the worker is done and `finish` will not block.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Result of a tap.
#[derive(Debug)]
pub enum TapOutcome {
    /// Content was queued for commit.
    Committed(ContentCommit),
    /// A PNG copy is being produced; finish it to commit.
    Converting(PendingConversion),
    /// A conversion for the same sticker is already running.
    AlreadyConverting,
    /// Receiver takes neither the sticker's type nor PNG.
    Unsupported(StickerError),
    /// The conversion could not be started.
    Failed(StickerError),
}

/// Commit protocol state for one session.
pub struct ContentDelivery {
    acceptance: Acceptance,
    recent: RecencyCache,
    compat_cache: RecencyCache,
    store: CompatStore,
    transcoder: Arc<dyn Transcoder>,
    png_quality: u8,
    in_flight: InFlight,
}

impl ContentDelivery {
    pub fn new(
        recent: RecencyCache,
        compat_cache: RecencyCache,
        store: CompatStore,
        transcoder: Arc<dyn Transcoder>,
        png_quality: u8,
    ) -> Self {
        Self {
            acceptance: Acceptance::none(),
            recent,
            compat_cache,
            store,
            transcoder,
            png_quality,
            in_flight: InFlight::default(),
        }
    }

    /// Capture what the newly focused field accepts.
    pub fn set_target(&mut self, target: Option<&InputTarget>) {
        self.acceptance = Acceptance::for_target(target);
        debug!(accepted = ?self.acceptance.mimes(), "input target changed");
    }

    pub fn acceptance(&self) -> &Acceptance {
        &self.acceptance
    }

    pub fn recent(&self) -> &RecencyCache {
        &self.recent
    }

    pub fn recent_mut(&mut self) -> &mut RecencyCache {
        &mut self.recent
    }

    pub fn compat_cache(&self) -> &RecencyCache {
        &self.compat_cache
    }

    pub fn compat_cache_mut(&mut self) -> &mut RecencyCache {
        &mut self.compat_cache
    }

    pub fn store(&self) -> &CompatStore {
        &self.store
    }

    /// Handle a tap on `sticker`.
    pub fn deliver(&mut self, sticker: &Path, ctx: &mut KeyboardContext) -> TapOutcome {
        if let Some(mime_type) = mime::mime_for_path(sticker) {
            if self.acceptance.accepts(mime_type) {
                let commit = self.commit(mime_type, sticker, sticker, ctx);
                return TapOutcome::Committed(commit);
            }
        }
        self.deliver_fallback(sticker, ctx)
    }

    fn deliver_fallback(&mut self, sticker: &Path, ctx: &mut KeyboardContext) -> TapOutcome {
        if !self.acceptance.accepts(mime::PNG) {
            let err = StickerError::UnsupportedFormat {
                extension: mime::extension_of(sticker),
            };
            info!(sticker = %sticker.display(), "{}", err);
            ctx.notices.push(err.to_string());
            return TapOutcome::Unsupported(err);
        }

        let id = compat_id(sticker);
        if lock(&self.in_flight).contains(&id) {
            debug!(id = %id, "conversion already running");
            return TapOutcome::AlreadyConverting;
        }

        if self.store.exists(&id) {
            debug!(id = %id, "compat sticker cache hit");
            return TapOutcome::Committed(self.commit_compat(&id, sticker, ctx));
        }

        match self.spawn_conversion(&id, sticker) {
            Ok(pending) => TapOutcome::Converting(pending),
            Err(err) => {
                warn!(error = %err, "could not start conversion");
                TapOutcome::Failed(err)
            }
        }
    }

    fn spawn_conversion(&self, id: &str, sticker: &Path) -> Result<PendingConversion, StickerError> {
        let source = sticker.to_path_buf();
        let partial = self
            .store
            .partial_path_for(id, NEXT_PARTIAL.fetch_add(1, Ordering::Relaxed));
        let dest = self.store.path_for(id);
        let transcoder = Arc::clone(&self.transcoder);
        let quality = self.png_quality;

        let worker_source = source.clone();
        let handle = thread::Builder::new()
            .name("sticker-convert".to_string())
            .spawn(move || convert(transcoder.as_ref(), &worker_source, &partial, &dest, quality))
            .map_err(|e| StickerError::ConversionFailure {
                path: source.clone(),
                reason: e.to_string(),
            })?;

        debug!(id = %id, source = %source.display(), "conversion started");
        lock(&self.in_flight).insert(id.to_string());
        Ok(PendingConversion {
            id: id.to_string(),
            source,
            handle,
            claim: InFlightClaim {
                id: id.to_string(),
                set: Arc::clone(&self.in_flight),
            },
        })
    }

    /// Join a conversion and commit its PNG.
    ///
    /// Returns the commit, or `None` when the conversion failed.
    pub fn finish(
        &mut self,
        pending: PendingConversion,
        ctx: &mut KeyboardContext,
    ) -> Option<ContentCommit> {
        let PendingConversion {
            id,
            source,
            handle,
            claim,
        } = pending;

        let result = handle.join().unwrap_or_else(|_| {
            Err(StickerError::ConversionFailure {
                path: source.clone(),
                reason: "conversion worker panicked".to_string(),
            })
        });
        drop(claim);

        match result {
            Ok(()) => Some(self.commit_compat(&id, &source, ctx)),
            Err(err) => {
                warn!(error = %err, "fallback delivery dropped");
                None
            }
        }
    }

    fn commit_compat(&mut self, id: &str, source: &Path, ctx: &mut KeyboardContext) -> ContentCommit {
        let compat_path = self.store.path_for(id);
        let commit = self.commit(mime::PNG, &compat_path, source, ctx);
        if let Some(evicted) = self.compat_cache.add(id) {
            self.store.remove(&evicted);
        }
        commit
    }

    // `file` is what gets sent; `sticker` is what the user tapped.
    fn commit(
        &mut self,
        mime_type: &str,
        file: &Path,
        sticker: &Path,
        ctx: &mut KeyboardContext,
    ) -> ContentCommit {
        let commit = ContentCommit {
            mime_type: mime_type.to_string(),
            path: file.to_path_buf(),
            description: file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            grant_read: true,
        };
        ctx.commits.push(commit.clone());
        self.recent.add(&sticker.to_string_lossy());
        commit
    }

    /// Number of conversions started but not finished.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

fn convert(
    transcoder: &dyn Transcoder,
    source: &Path,
    partial: &Path,
    dest: &Path,
    quality: u8,
) -> Result<(), StickerError> {
    let failure = |reason: String| StickerError::ConversionFailure {
        path: source.to_path_buf(),
        reason,
    };

    // Another worker may have produced the file meanwhile.
    if dest.is_file() {
        return Ok(());
    }
    if let Err(e) = transcoder.to_png(source, partial, quality) {
        let _ = fs::remove_file(partial);
        return Err(failure(format!("{:#}", e)));
    }
    fs::rename(partial, dest).map_err(|e| {
        let _ = fs::remove_file(partial);
        failure(e.to_string())
    })
}
