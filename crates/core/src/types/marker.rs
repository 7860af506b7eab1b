//! Legacy photo marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Email, Entity, MarkerId};

/// A photo pinned to a geocoded place, scoped to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Server-assigned identifier.
    #[serde(rename = "_id", alias = "id")]
    pub id: MarkerId,
    /// Owner email.
    #[serde(rename = "user_email")]
    pub owner_email: Email,
    /// Place name as entered by the owner.
    pub location_name: String,
    /// Geocoded latitude.
    pub latitude: f64,
    /// Geocoded longitude.
    pub longitude: f64,
    /// Uploaded image URL.
    pub image_url: String,
    /// Creation time, absent on older records.
    #[serde(
        default,
        deserialize_with = "super::timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Marker {
    type Id = MarkerId;

    fn id(&self) -> &MarkerId {
        &self.id
    }
}
