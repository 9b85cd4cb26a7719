//! Sticker mime types.
//!
//! Sticker types are derived from the file extension. The table below is the
//! full set of formats the keyboard will load and try to send; anything else
//! in a pack directory is ignored.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

pub const PNG: &str = "image/png";

static EXTENSION_TO_MIME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("gif", "image/gif");
    m.insert("png", "image/png");
    m.insert("apng", "image/png");
    m.insert("jpg", "image/jpeg");
    m.insert("jpeg", "image/jpeg");
    m.insert("webp", "image/webp");
    m.insert("heif", "image/heif");
    m.insert("heic", "image/heic");
    m.insert("mp4", "video/mp4");
    m.insert("3gp", "video/3gpp");
    m.insert("mkv", "video/x-matroska");
    m.insert("webm", "video/webm");
    m
});

/// All distinct mime types a sticker can have, sorted.
pub fn supported_mimes() -> Vec<&'static str> {
    let mut mimes: Vec<&'static str> = EXTENSION_TO_MIME.values().copied().collect();
    mimes.sort_unstable();
    mimes.dedup();
    mimes
}

/// Mime type for a sticker file, from its (case-insensitive) extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    EXTENSION_TO_MIME.get(ext.as_str()).copied()
}

/// Lowercased extension used in user-facing notices.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Compare a concrete mime type against an advertised one that may use
/// wildcards (`*/*`, `image/*`). Comparison is case-insensitive.
pub fn mime_matches(concrete: &str, advertised: &str) -> bool {
    let Some((c_type, c_sub)) = split(concrete) else {
        return false;
    };
    let Some((a_type, a_sub)) = split(advertised) else {
        return false;
    };
    if a_type == "*" {
        return a_sub == "*";
    }
    if !a_type.eq_ignore_ascii_case(c_type) {
        return false;
    }
    a_sub == "*" || a_sub.eq_ignore_ascii_case(c_sub)
}

fn split(mime: &str) -> Option<(&str, &str)> {
    let (t, s) = mime.trim().split_once('/')?;
    if t.is_empty() || s.is_empty() {
        return None;
    }
    Some((t, s))
}
