//! Marker commands.

use std::path::Path;

use mapreviews_client::{Attachment, Markers, NewMarker};
use mapreviews_core::Email;

use super::{CliError, Context};

fn markers(ctx: &Context) -> Markers {
    Markers::new(ctx.session.api(), ctx.config.fetch_ordering)
}

/// List the caller's markers, or another user's.
pub async fn list(ctx: &Context, owner: Option<&str>) -> Result<(), CliError> {
    let markers = markers(ctx);
    match owner {
        Some(owner) => markers.fetch_for_owner(&Email::parse(owner)?).await,
        None => markers.fetch_mine().await,
    }

    let state = markers.snapshot();
    if let Some(failure) = state.last_error {
        return Err(CliError::Sync(failure));
    }

    if state.items.is_empty() {
        println!("No markers");
    }
    for marker in &state.items {
        println!(
            "{}  {}  ({:.5}, {:.5})  {}",
            marker.id, marker.location_name, marker.latitude, marker.longitude, marker.image_url
        );
    }
    Ok(())
}

/// Pin a photo to a place.
pub async fn create(ctx: &Context, location: String, image: &Path) -> Result<(), CliError> {
    let image = Attachment::from_path(image).await?;
    let marker = markers(ctx)
        .create(NewMarker {
            location_name: location,
            image,
        })
        .await?;

    println!(
        "Created marker {} at {} ({:.5}, {:.5})",
        marker.id, marker.location_name, marker.latitude, marker.longitude
    );
    Ok(())
}
