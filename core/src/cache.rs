//! Bounded most-recently-used cache of string keys.
//!
//! Two of these live in every keyboard session: one holding the paths of the
//! most recently sent stickers, and one holding the identifiers of stickers
//! that were converted to PNG for receivers that could not take the original
//! format. The cache only tracks keys; callers own whatever resource a key
//! stands for and clean it up when `add` hands back an evicted key.
//!
//! Ordering convention: entries are kept in append order, oldest first and
//! newest last. `to_ordered_list` and `serialize` both use that order.

use crate::error::StickerError;
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::{debug, warn};

/// Separator used by `serialize`. Unit separator never appears in a file
/// path or a hex identifier.
pub const DELIMITER: char = '\u{1f}';

/// Fixed-capacity recency cache.
#[derive(Debug)]
pub struct RecencyCache {
    capacity: usize,
    // `None` when capacity is zero; lru requires a non-zero bound.
    entries: Option<LruCache<String, ()>>,
}

impl RecencyCache {
    /// Create an empty cache holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Create a cache and hydrate it from a persisted string.
    pub fn from_serialized(capacity: usize, data: &str) -> Self {
        let mut cache = Self::new(capacity);
        cache.deserialize(data);
        cache
    }

    /// Insert `key` as the newest entry, or promote it if already present.
    ///
    /// Returns the key that fell out of the cache, if any. Only a new key can
    /// cause an eviction; with capacity zero the new key itself is returned.
    pub fn add(&mut self, key: &str) -> Option<String> {
        let Some(entries) = self.entries.as_mut() else {
            return Some(key.to_string());
        };

        if entries.contains(key) {
            entries.promote(key);
            return None;
        }

        // push() only returns a pair here when the bound was hit, since the
        // key is known to be new.
        let evicted = entries.push(key.to_string(), ()).map(|(old, _)| old);
        if let Some(old) = &evicted {
            debug!(evicted = %old, added = %key, "recency cache eviction");
        }
        evicted
    }

    /// Entries oldest first, newest last.
    pub fn to_ordered_list(&self) -> Vec<String> {
        match &self.entries {
            Some(entries) => entries.iter().rev().map(|(k, _)| k.clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Newest entry, if any.
    pub fn newest(&self) -> Option<&str> {
        self.entries
            .as_ref()
            .and_then(|e| e.peek_mru())
            .map(|(k, _)| k.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.as_ref().is_some_and(|e| e.contains(key))
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    /// Join entries (oldest first) with [`DELIMITER`].
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, key) in self.to_ordered_list().iter().enumerate() {
            if i > 0 {
                out.push(DELIMITER);
            }
            out.push_str(key);
        }
        out
    }

    /// Replace the contents with entries parsed from `data`.
    ///
    /// Never fails: malformed input leaves the cache empty. When the string
    /// holds more entries than fit, the newest ones are kept.
    pub fn deserialize(&mut self, data: &str) {
        self.clear();
        match parse_entries(data) {
            Ok(keys) => {
                for key in keys {
                    self.add(key);
                }
            }
            Err(err) => {
                warn!(error = %err, "discarding persisted cache");
            }
        }
    }
}

fn parse_entries(data: &str) -> Result<Vec<&str>, StickerError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let keys: Vec<&str> = data.split(DELIMITER).collect();
    if let Some(pos) = keys.iter().position(|k| k.is_empty()) {
        return Err(StickerError::CacheCorruption {
            reason: format!("empty entry at position {}", pos),
        });
    }
    if keys.iter().any(|k| k.contains('\0')) {
        return Err(StickerError::CacheCorruption {
            reason: "entry contains a NUL byte".to_string(),
        });
    }
    Ok(keys)
}
