use std::fmt;

use serde::{Deserialize, Serialize};

// ───── Variant kinds ─────────────────────────────────────────────────

/// Derived raster sizes, ordered from lowest to highest fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Thumbnail,
    Medium,
    Full,
}

impl VariantKind {
    pub const ALL: [VariantKind; 3] = [VariantKind::Thumbnail, VariantKind::Medium, VariantKind::Full];

    /// Bounding size of the longest edge, in pixels.
    pub fn bound(self) -> u32 {
        match self {
            VariantKind::Thumbnail => 300,
            VariantKind::Medium => 800,
            VariantKind::Full => 1920,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VariantKind::Thumbnail => "thumbnail",
            VariantKind::Medium => "medium",
            VariantKind::Full => "full",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ───── Codecs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Webp,
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
}

impl Codec {
    pub fn extension(self) -> &'static str {
        match self {
            Codec::Webp => "webp",
            Codec::Jpeg => "jpg",
            Codec::Png => "png",
            Codec::Gif => "gif",
            Codec::Bmp => "bmp",
            Codec::Tiff => "tiff",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Codec::Webp => "image/webp",
            Codec::Jpeg => "image/jpeg",
            Codec::Png => "image/png",
            Codec::Gif => "image/gif",
            Codec::Bmp => "image/bmp",
            Codec::Tiff => "image/tiff",
        }
    }
}

// ───── Outcomes ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantFailure {
    UnsupportedFormat,
    StorageUnavailable,
    EncodingFailed,
}

/// Result of deriving one variant, as stored in the photo metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VariantOutcome {
    Ready {
        width: u32,
        height: u32,
        byte_size: u64,
        codec: Codec,
        path: String,
    },
    Failed {
        error: VariantFailure,
        reason: String,
    },
}

impl VariantOutcome {
    pub fn failed(error: VariantFailure, reason: impl Into<String>) -> Self {
        VariantOutcome::Failed { error, reason: reason.into() }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, VariantOutcome::Ready { .. })
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            VariantOutcome::Ready { .. } => "ready",
            VariantOutcome::Failed { .. } => "failed",
        }
    }
}

// ───── Metadata document ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginalStats {
    /// Size reported by the client before it compressed the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    /// Size of the bytes actually received and stored.
    pub compressed_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantSlots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<VariantOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<VariantOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<VariantOutcome>,
}

impl VariantSlots {
    pub fn get(&self, kind: VariantKind) -> Option<&VariantOutcome> {
        match kind {
            VariantKind::Thumbnail => self.thumbnail.as_ref(),
            VariantKind::Medium => self.medium.as_ref(),
            VariantKind::Full => self.full.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: VariantKind) -> &mut Option<VariantOutcome> {
        match kind {
            VariantKind::Thumbnail => &mut self.thumbnail,
            VariantKind::Medium => &mut self.medium,
            VariantKind::Full => &mut self.full,
        }
    }
}

/// Optimization statistics attached to a photo.
///
/// Each variant owns its own slot, so concurrent completions touch disjoint
/// keys. The Postgres repository mirrors [`PhotoMetadata::merge_variant`] in a
/// single `jsonb_set` statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoMetadata {
    pub original: OriginalStats,
    pub variants: VariantSlots,
}

impl PhotoMetadata {
    pub fn for_upload(compressed_size: u64, original_size: Option<u64>) -> Self {
        PhotoMetadata {
            original: OriginalStats {
                original_size,
                compressed_size,
                width: None,
                height: None,
            },
            variants: VariantSlots::default(),
        }
    }

    pub fn variant(&self, kind: VariantKind) -> Option<&VariantOutcome> {
        self.variants.get(kind)
    }

    /// Merges one variant outcome into its slot.
    ///
    /// A failure never replaces a ready variant. Returns whether the outcome
    /// was accepted.
    pub fn merge_variant(&mut self, kind: VariantKind, outcome: VariantOutcome) -> bool {
        let slot = self.variants.slot_mut(kind);
        if matches!(slot, Some(existing) if existing.is_ready()) && !outcome.is_ready() {
            return false;
        }
        *slot = Some(outcome);
        true
    }

    pub fn merge_original_dimensions(&mut self, width: u32, height: u32) {
        self.original.width = Some(width);
        self.original.height = Some(height);
    }

    /// Compression ratio achieved on the client, when the client reported it.
    pub fn compression_ratio(&self) -> Option<f64> {
        match self.original.original_size {
            Some(original) if original > 0 => {
                Some(1.0 - self.original.compressed_size as f64 / original as f64)
            }
            _ => None,
        }
    }
}
