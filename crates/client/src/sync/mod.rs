//! Cached collections kept consistent with the backend.
//!
//! # Architecture
//!
//! - [`Reviews`], [`Markers`] and [`Visits`] are thin wrappers over one
//!   generic collection holding `{items, is_loading, last_error, focused}`
//! - State lives in a `tokio::sync::watch` channel; every transition is a
//!   single atomic update, so observers never see a half-applied change
//! - Operations are independent and unserialized: concurrent creates append
//!   in completion order, and by default a slow fetch overwrites whatever a
//!   faster operation did before it ([`FetchOrdering::CompletionOrder`])
//!
//! # Example
//!
//! ```rust,ignore
//! let reviews = Reviews::new(session.api(), config.fetch_ordering);
//! reviews.fetch_all().await;
//! for review in reviews.snapshot().items {
//!     println!("{} ({})", review.establishment_name, review.rating);
//! }
//! ```

mod collection;
mod markers;
mod reviews;
mod visits;

pub use collection::{CollectionState, SyncFailure};
pub use markers::{Markers, NewMarker};
pub use reviews::{NewReview, ReviewPatch, Reviews};
pub use visits::Visits;

use std::str::FromStr;

/// How results of overlapping fetches on one collection are reconciled.
///
/// Mutations (create, update, remove) are never fenced by either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchOrdering {
    /// Every fetch result is applied when it arrives; the last to complete
    /// wins.
    #[default]
    CompletionOrder,
    /// Each fetch is stamped with an increasing sequence number, and a result
    /// older than one already applied is discarded.
    LatestIssued,
}

impl FetchOrdering {
    /// Configuration name of this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CompletionOrder => "completion",
            Self::LatestIssued => "latest",
        }
    }
}

impl std::fmt::Display for FetchOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completion" => Ok(Self::CompletionOrder),
            "latest" => Ok(Self::LatestIssued),
            other => Err(format!(
                "unknown fetch ordering '{other}' (expected 'completion' or 'latest')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_ordering_from_str() {
        assert_eq!("completion".parse(), Ok(FetchOrdering::CompletionOrder));
        assert_eq!(" Latest ".parse(), Ok(FetchOrdering::LatestIssued));
        assert!("newest".parse::<FetchOrdering>().is_err());
    }

    #[test]
    fn test_fetch_ordering_display_roundtrips() {
        for ordering in [FetchOrdering::CompletionOrder, FetchOrdering::LatestIssued] {
            assert_eq!(ordering.to_string().parse(), Ok(ordering));
        }
    }
}
