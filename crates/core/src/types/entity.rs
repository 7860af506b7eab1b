//! The `Entity` trait implemented by every cached backend record.

/// A backend-owned record with a server-assigned identity.
///
/// Collection synchronizers use [`Entity::id`] to replace and remove cached
/// entries in place.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Typed identifier of the record.
    type Id: PartialEq + Clone + std::fmt::Display + Send + Sync;

    /// Returns the server-assigned identifier.
    fn id(&self) -> &Self::Id;
}
