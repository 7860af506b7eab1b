//! Establishment review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Email, Entity, Rating, ReviewId};

/// A geotagged review of an establishment.
///
/// Owned by the backend: the server assigns the id, resolves the coordinates
/// from the address, stores uploaded images and fills in the author fields
/// from the caller's credential. The client only caches copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Server-assigned identifier.
    #[serde(rename = "_id", alias = "id")]
    pub id: ReviewId,
    /// Name of the reviewed establishment.
    pub establishment_name: String,
    /// Postal address as entered by the author.
    pub address: String,
    /// Geocoded latitude.
    pub latitude: f64,
    /// Geocoded longitude.
    pub longitude: f64,
    /// Star rating.
    pub rating: Rating,
    /// Uploaded image URLs, in upload order.
    #[serde(default)]
    pub images: Vec<String>,
    /// Author email.
    #[serde(rename = "user_email")]
    pub author_email: Email,
    /// Author display name.
    #[serde(rename = "user_name")]
    pub author_name: String,
    /// Credential the author used when creating the review.
    #[serde(rename = "token_used")]
    pub credential_used: String,
    /// Creation time.
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    /// Expiry of the credential used at creation.
    #[serde(
        rename = "token_expires_at",
        deserialize_with = "super::timestamp::deserialize"
    )]
    pub credential_expires_at: DateTime<Utc>,
}

impl Entity for Review {
    type Id = ReviewId;

    fn id(&self) -> &ReviewId {
        &self.id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const REVIEW_JSON: &str = r#"{
        "_id": "r1",
        "establishment_name": "Casa Lola",
        "address": "Calle Granada 46, Málaga",
        "latitude": 36.7220033,
        "longitude": -4.4189788,
        "rating": 4,
        "images": ["https://img.example.com/1.jpg", "https://img.example.com/2.jpg"],
        "user_email": "ana@example.com",
        "user_name": "Ana",
        "token_used": "ya29.token",
        "created_at": "2024-03-20T10:00:00.5",
        "token_expires_at": "2024-03-20T11:00:00.5"
    }"#;

    #[test]
    fn test_decode_backend_review() {
        let review: Review = serde_json::from_str(REVIEW_JSON).unwrap();
        assert_eq!(review.id(), &ReviewId::new("r1"));
        assert_eq!(review.rating.stars(), 4);
        assert_eq!(review.images.len(), 2);
        assert_eq!(review.author_email.as_str(), "ana@example.com");
        assert_eq!(
            review.credential_expires_at - review.created_at,
            chrono::Duration::hours(1)
        );
    }

    #[test]
    fn test_encoded_review_decodes_again() {
        let review: Review = serde_json::from_str(REVIEW_JSON).unwrap();
        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["_id"], "r1");
        assert_eq!(json["user_name"], "Ana");

        let back: Review = serde_json::from_value(json).unwrap();
        assert_eq!(back, review);
    }

    #[test]
    fn test_images_default_to_empty() {
        let mut value: serde_json::Value = serde_json::from_str(REVIEW_JSON).unwrap();
        value.as_object_mut().unwrap().remove("images");
        let review: Review = serde_json::from_value(value).unwrap();
        assert!(review.images.is_empty());
    }
}
