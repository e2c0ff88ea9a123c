use serde::Serialize;
use uuid::Uuid;

use crate::entities::{
    photo::{Photo, VariantStatus},
    photo_metadata::VariantKind,
};

/// Progressive delivery stage of a photo.
///
/// The stage only ever moves towards higher fidelity: a medium URL supersedes
/// a thumbnail and a full URL supersedes both, whatever order the variants
/// finished in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Thumbnail(String),
    Medium(String),
    Full(String),
}

impl DeliveryState {
    pub fn kind(&self) -> Option<VariantKind> {
        match self {
            DeliveryState::Pending => None,
            DeliveryState::Thumbnail(_) => Some(VariantKind::Thumbnail),
            DeliveryState::Medium(_) => Some(VariantKind::Medium),
            DeliveryState::Full(_) => Some(VariantKind::Full),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            DeliveryState::Pending => None,
            DeliveryState::Thumbnail(url) | DeliveryState::Medium(url) | DeliveryState::Full(url) => {
                Some(url)
            }
        }
    }

    /// Moves to `kind` if it is a higher-fidelity stage than the current one.
    pub fn advance(self, kind: VariantKind, url: &str) -> Self {
        if self.kind().is_some_and(|current| current >= kind) {
            return self;
        }
        match kind {
            VariantKind::Thumbnail => DeliveryState::Thumbnail(url.to_string()),
            VariantKind::Medium => DeliveryState::Medium(url.to_string()),
            VariantKind::Full => DeliveryState::Full(url.to_string()),
        }
    }

    pub fn from_photo(photo: &Photo) -> Self {
        VariantKind::ALL
            .into_iter()
            .fold(DeliveryState::Pending, |state, kind| match photo.url_for(kind) {
                Some(url) => state.advance(kind, url),
                None => state,
            })
    }
}

/// Best URL currently available for a photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestAvailable {
    pub photo_id: Uuid,
    pub variant: VariantKind,
    pub url: String,
    /// Variants still being generated; clients may poll to upgrade.
    pub pending: Vec<VariantKind>,
    pub failed: Vec<VariantKind>,
    /// True once no further upgrade can happen.
    pub is_final: bool,
    /// Savings of the client-side compression; absent when the client did
    /// not report the original size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
}

impl BestAvailable {
    /// `None` while no variant URL is populated.
    pub fn from_photo(photo: &Photo) -> Option<Self> {
        let state = DeliveryState::from_photo(photo);
        let variant = state.kind()?;
        let url = state.url()?.to_string();

        let by_status = |wanted: VariantStatus| -> Vec<VariantKind> {
            VariantKind::ALL
                .into_iter()
                .filter(|kind| *kind > variant && photo.variant_status(*kind) == wanted)
                .collect()
        };
        let pending = by_status(VariantStatus::Pending);
        let failed = by_status(VariantStatus::Failed);

        Some(BestAvailable {
            photo_id: photo.id,
            variant,
            is_final: pending.is_empty(),
            url,
            pending,
            failed,
            compression_ratio: photo.metadata.compression_ratio(),
        })
    }
}
