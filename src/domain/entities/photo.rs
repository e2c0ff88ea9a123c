use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    entities::photo_metadata::{PhotoMetadata, VariantKind, VariantOutcome},
    errors::AppError,
};

// ───── Analysis status ───────────────────────────────────────────────

/// Progress of the downstream analysis job for a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiAnalysisStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl AiAnalysisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AiAnalysisStatus::Pending => "pending",
            AiAnalysisStatus::Processing => "processing",
            AiAnalysisStatus::Complete => "complete",
            AiAnalysisStatus::Failed => "failed",
        }
    }

    /// States from which `self` may be entered. Re-entering the same state is
    /// always allowed so status updates can be replayed.
    pub fn predecessors(self) -> &'static [AiAnalysisStatus] {
        use AiAnalysisStatus::*;
        match self {
            Pending => &[Pending],
            Processing => &[Pending, Processing, Failed],
            Complete => &[Processing, Complete],
            Failed => &[Processing, Failed],
        }
    }

    pub fn can_transition_to(self, next: AiAnalysisStatus) -> bool {
        next.predecessors().contains(&self)
    }
}

impl fmt::Display for AiAnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiAnalysisStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AiAnalysisStatus::Pending),
            "processing" => Ok(AiAnalysisStatus::Processing),
            "complete" => Ok(AiAnalysisStatus::Complete),
            "failed" => Ok(AiAnalysisStatus::Failed),
            other => Err(AppError::InternalError(format!("Unknown analysis status: {}", other))),
        }
    }
}

// ───── Database Models ───────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub struct PhotoRow {
    pub id: Uuid,
    pub harvest_id: Uuid,
    pub storage_path: String,
    pub original_filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub public_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub medium_url: Option<String>,
    pub metadata: Json<PhotoMetadata>,
    pub ai_analysis_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub harvest_id: Uuid,
    pub storage_path: String,
    pub original_filename: String,
    pub mime_type: String,
    pub file_size: i64,
    /// URL of the full-size variant.
    pub public_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub medium_url: Option<String>,
    pub metadata: PhotoMetadata,
    pub ai_analysis_status: AiAnalysisStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload produced by the upload coordinator.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub id: Uuid,
    pub harvest_id: Uuid,
    pub storage_path: String,
    pub original_filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub metadata: PhotoMetadata,
    pub created_at: DateTime<Utc>,
}

impl NewPhoto {
    /// A photo whose variants have not been attempted yet.
    pub fn pending(
        harvest_id: Uuid,
        storage_path: String,
        original_filename: String,
        mime_type: String,
        compressed_size: u64,
        original_size: Option<u64>,
    ) -> Self {
        NewPhoto {
            id: Uuid::new_v4(),
            harvest_id,
            storage_path,
            original_filename,
            mime_type,
            file_size: compressed_size as i64,
            metadata: PhotoMetadata::for_upload(compressed_size, original_size),
            created_at: Utc::now(),
        }
    }

    pub fn into_photo(self) -> Photo {
        Photo {
            id: self.id,
            harvest_id: self.harvest_id,
            storage_path: self.storage_path,
            original_filename: self.original_filename,
            mime_type: self.mime_type,
            file_size: self.file_size,
            public_url: None,
            thumbnail_url: None,
            medium_url: None,
            metadata: self.metadata,
            ai_analysis_status: AiAnalysisStatus::Pending,
            created_at: self.created_at,
        }
    }
}

/// One variant completion to merge into a photo.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantUpdate {
    pub kind: VariantKind,
    pub outcome: VariantOutcome,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    Pending,
    Ready,
    Failed,
}

// ───── Input Requests ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateAnalysisRequest {
    pub status: AiAnalysisStatus,
}

// ───── Behaviour ────────────────────────────────────────────────────

impl Photo {
    pub fn url_for(&self, kind: VariantKind) -> Option<&str> {
        match kind {
            VariantKind::Thumbnail => self.thumbnail_url.as_deref(),
            VariantKind::Medium => self.medium_url.as_deref(),
            VariantKind::Full => self.public_url.as_deref(),
        }
    }

    fn url_slot_mut(&mut self, kind: VariantKind) -> &mut Option<String> {
        match kind {
            VariantKind::Thumbnail => &mut self.thumbnail_url,
            VariantKind::Medium => &mut self.medium_url,
            VariantKind::Full => &mut self.public_url,
        }
    }

    pub fn variant_status(&self, kind: VariantKind) -> VariantStatus {
        match self.metadata.variant(kind) {
            None => VariantStatus::Pending,
            Some(outcome) if outcome.is_ready() => VariantStatus::Ready,
            Some(_) => VariantStatus::Failed,
        }
    }

    /// Applies a variant completion with the same merge rules the record
    /// store enforces: the metadata slot is merged by key and the URL is only
    /// set when a ready outcome carries one.
    pub fn apply_variant(&mut self, update: &VariantUpdate) -> bool {
        let accepted = self.metadata.merge_variant(update.kind, update.outcome.clone());
        if accepted && update.outcome.is_ready() {
            if let Some(url) = &update.url {
                *self.url_slot_mut(update.kind) = Some(url.clone());
            }
        }
        accepted
    }
}

impl TryFrom<PhotoRow> for Photo {
    type Error = AppError;

    fn try_from(row: PhotoRow) -> Result<Self, Self::Error> {
        Ok(Photo {
            id: row.id,
            harvest_id: row.harvest_id,
            storage_path: row.storage_path,
            original_filename: row.original_filename,
            mime_type: row.mime_type,
            file_size: row.file_size,
            public_url: row.public_url,
            thumbnail_url: row.thumbnail_url,
            medium_url: row.medium_url,
            metadata: row.metadata.0,
            ai_analysis_status: row.ai_analysis_status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::photo_metadata::{Codec, VariantFailure};

    fn photo() -> Photo {
        NewPhoto::pending(
            Uuid::new_v4(),
            "userA/h/1_leaf.jpg".into(),
            "leaf.jpg".into(),
            "image/jpeg".into(),
            800,
            Some(2_000),
        )
        .into_photo()
    }

    #[test]
    fn new_photo_starts_pending() {
        let photo = photo();
        for kind in VariantKind::ALL {
            assert_eq!(photo.variant_status(kind), VariantStatus::Pending);
            assert_eq!(photo.url_for(kind), None);
        }
        assert_eq!(photo.ai_analysis_status, AiAnalysisStatus::Pending);
    }

    #[test]
    fn ready_update_sets_matching_url_only() {
        let mut photo = photo();
        photo.apply_variant(&VariantUpdate {
            kind: VariantKind::Medium,
            outcome: VariantOutcome::Ready {
                width: 800,
                height: 600,
                byte_size: 42,
                codec: Codec::Webp,
                path: "p".into(),
            },
            url: Some("https://cdn/p".into()),
        });

        assert_eq!(photo.medium_url.as_deref(), Some("https://cdn/p"));
        assert_eq!(photo.thumbnail_url, None);
        assert_eq!(photo.public_url, None);
        assert_eq!(photo.variant_status(VariantKind::Medium), VariantStatus::Ready);
    }

    #[test]
    fn failed_update_leaves_url_absent() {
        let mut photo = photo();
        photo.apply_variant(&VariantUpdate {
            kind: VariantKind::Full,
            outcome: VariantOutcome::failed(VariantFailure::StorageUnavailable, "down"),
            url: None,
        });

        assert_eq!(photo.public_url, None);
        assert_eq!(photo.variant_status(VariantKind::Full), VariantStatus::Failed);
    }

    #[test]
    fn analysis_transitions() {
        use AiAnalysisStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Complete));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Processing));
        assert!(Complete.can_transition_to(Complete));
        assert!(!Pending.can_transition_to(Complete));
        assert!(!Complete.can_transition_to(Processing));
        assert!(!Complete.can_transition_to(Pending));
    }

    #[test]
    fn analysis_status_round_trips_through_text() {
        for status in [
            AiAnalysisStatus::Pending,
            AiAnalysisStatus::Processing,
            AiAnalysisStatus::Complete,
            AiAnalysisStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<AiAnalysisStatus>().unwrap(), status);
        }
        assert!("done".parse::<AiAnalysisStatus>().is_err());
    }
}
