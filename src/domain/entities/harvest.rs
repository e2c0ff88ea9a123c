use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::utils::text::sanitize_text;

const MAX_VARIETY_LENGTH: u64 = 100;
const MAX_DESCRIPTION_LENGTH: u64 = 2500;
const MAX_LOCATION_LENGTH: u64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Harvest {
    pub id: Uuid,
    pub user_id: String,
    pub plant_variety: String,
    pub quantity: f64,
    pub event_date: DateTime<Utc>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewHarvestRequest {
    #[validate(length(min = 1, max = MAX_VARIETY_LENGTH, message = "Plant variety must be 1-100 characters"))]
    pub plant_variety: String,

    #[validate(range(exclusive_min = 0.0, message = "Quantity must be greater than zero"))]
    pub quantity: f64,

    pub event_date: Option<DateTime<Utc>>,

    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,

    #[validate(length(max = MAX_LOCATION_LENGTH))]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct HarvestInsert {
    pub id: Uuid,
    pub user_id: String,

    #[validate(length(min = 1, max = MAX_VARIETY_LENGTH, message = "Plant variety must be 1-100 characters"))]
    pub plant_variety: String,

    pub quantity: f64,
    pub event_date: DateTime<Utc>,

    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,

    #[validate(length(max = MAX_LOCATION_LENGTH))]
    pub location: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HarvestInsert {
    /// Validates and sanitizes a request on behalf of `user_id`.
    pub fn from_request(user_id: String, request: NewHarvestRequest) -> Result<Self, ValidationErrors> {
        request.validate()?;
        let now = Utc::now();

        let insert = HarvestInsert {
            id: Uuid::new_v4(),
            user_id,
            plant_variety: sanitize_text(&request.plant_variety),
            quantity: request.quantity,
            event_date: request.event_date.unwrap_or(now),
            description: request.description.as_deref().map(sanitize_text).filter(|s| !s.is_empty()),
            location: request.location.as_deref().map(sanitize_text).filter(|s| !s.is_empty()),
            created_at: now,
            updated_at: now,
        };

        // Sanitizing can empty a field that only held whitespace.
        insert.validate()?;
        Ok(insert)
    }

    pub fn into_harvest(self) -> Harvest {
        Harvest {
            id: self.id,
            user_id: self.user_id,
            plant_variety: self.plant_variety,
            quantity: self.quantity,
            event_date: self.event_date,
            description: self.description,
            location: self.location,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
