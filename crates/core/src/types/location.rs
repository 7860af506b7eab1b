//! Geocoding suggestions produced by the address search.

use serde::{Deserialize, Serialize};

/// A ranked location candidate from the autocomplete endpoint.
///
/// Ephemeral: it has no identity and lives only as long as one query
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSuggestion {
    /// Full human-readable place name.
    pub display_name: String,
    /// Latitude in decimal degrees.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(rename = "lon")]
    pub longitude: f64,
    /// Place type (e.g. `city`, `restaurant`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Place class (e.g. `place`, `amenity`).
    #[serde(rename = "class", default)]
    pub category: String,
}

/// Structured address value yielded when a suggestion is chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedLocation {
    /// Text to place in the address field.
    pub display_name: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl From<&LocationSuggestion> for SelectedLocation {
    fn from(suggestion: &LocationSuggestion) -> Self {
        Self {
            display_name: suggestion.display_name.clone(),
            latitude: suggestion.latitude,
            longitude: suggestion.longitude,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_autocomplete_item() {
        let json = r#"{
            "display_name": "Málaga, Andalucía, España",
            "lat": 36.72,
            "lon": -4.42,
            "type": "city",
            "class": "place"
        }"#;
        let suggestion: LocationSuggestion = serde_json::from_str(json).unwrap();
        assert_eq!(suggestion.kind, "city");
        assert_eq!(suggestion.category, "place");

        let selected = SelectedLocation::from(&suggestion);
        assert_eq!(selected.display_name, "Málaga, Andalucía, España");
        assert!((selected.longitude - -4.42).abs() < f64::EPSILON);
    }
}
