//! Keyboard context for platform communication.
//!
//! `KeyboardContext` is a plain data container. After calling into the
//! session, the platform drains `commits` into the host's commit-content API,
//! shows any `notices` as transient messages, and draws the `preview`
//! overlay if one is open. No callbacks, no traits.

use std::path::PathBuf;

/// Capabilities advertised by the focused text field, captured on focus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputTarget {
    /// Package of the receiving application. A target without one cannot
    /// receive content.
    pub package_name: Option<String>,
    /// Mime types the field accepts for rich content; may contain wildcards.
    pub content_mime_types: Vec<String>,
}

impl InputTarget {
    pub fn new<S: Into<String>>(package_name: S, content_mime_types: &[&str]) -> Self {
        Self {
            package_name: Some(package_name.into()),
            content_mime_types: content_mime_types.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// One rich-content delivery for the host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentCommit {
    pub mime_type: String,
    pub path: PathBuf,
    /// Label for the clip description (the file name).
    pub description: String,
    /// Whether the receiver must be granted read access to `path`.
    pub grant_read: bool,
}

/// Full-size sticker preview opened by a long press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub path: PathBuf,
    /// Edge length of the preview image in pixels.
    pub size: u32,
}

/// State the platform reads after each session call.
#[derive(Debug, Clone, Default)]
pub struct KeyboardContext {
    /// Content to commit to the focused field, oldest first.
    pub commits: Vec<ContentCommit>,

    /// Transient user-visible messages.
    pub notices: Vec<String>,

    /// Open preview overlay, if any.
    pub preview: Option<Preview>,

    /// Name of the pack currently shown.
    pub active_pack: String,
}

impl KeyboardContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all pending commits, leaving the queue empty.
    pub fn take_commits(&mut self) -> Vec<ContentCommit> {
        std::mem::take(&mut self.commits)
    }

    /// Take all pending notices.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn has_commit(&self) -> bool {
        !self.commits.is_empty()
    }

    pub fn clear(&mut self) {
        self.commits.clear();
        self.notices.clear();
        self.preview = None;
    }
}
