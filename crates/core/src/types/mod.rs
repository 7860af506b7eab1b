//! Core types for Map Reviews.
//!
//! This module provides type-safe wrappers and the entities cached by the
//! client.

pub mod email;
pub mod entity;
pub mod error_kind;
pub mod id;
pub mod identity;
pub mod location;
pub mod marker;
pub mod rating;
pub mod review;
pub mod timestamp;
pub mod visit;

pub use email::{Email, EmailError};
pub use entity::Entity;
pub use error_kind::ErrorKind;
pub use id::*;
pub use identity::Identity;
pub use location::{LocationSuggestion, SelectedLocation};
pub use marker::Marker;
pub use rating::{Rating, RatingError};
pub use review::Review;
pub use visit::Visit;
