//! Visit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Email, Entity, VisitId};

/// A record that one user viewed another user's markers.
///
/// Appended server-side; read-only for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Server-assigned identifier.
    #[serde(rename = "_id", alias = "id")]
    pub id: VisitId,
    /// Who looked.
    pub visitor_email: Email,
    /// Whose markers were viewed.
    pub visited_email: Email,
    /// Credential the visitor was using.
    #[serde(rename = "visitor_token")]
    pub visitor_credential: String,
    /// When the visit happened.
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
}

impl Entity for Visit {
    type Id = VisitId;

    fn id(&self) -> &VisitId {
        &self.id
    }
}
