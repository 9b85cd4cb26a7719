//! Error taxonomy for the sticker delivery pipeline.
//!
//! None of these escape to the platform as a crash. `UnsupportedFormat` is
//! turned into a user notice, `ConversionFailure` and `CacheCorruption` are
//! logged and recovered locally, and `MissingPack` makes the session fall back
//! to another pack.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StickerError {
    /// Neither the sticker's own type nor PNG is accepted by the receiver.
    #[error("{extension} not supported here.")]
    UnsupportedFormat { extension: String },

    /// Decoding or re-encoding a sticker during fallback delivery failed.
    #[error("failed to convert {}: {reason}", path.display())]
    ConversionFailure { path: PathBuf, reason: String },

    /// A persisted cache string could not be parsed.
    #[error("corrupt cache string: {reason}")]
    CacheCorruption { reason: String },

    /// The requested pack is not among the loaded packs.
    #[error("sticker pack '{name}' is not loaded")]
    MissingPack { name: String },
}
