//! Visit commands.

use mapreviews_client::Visits;

use super::{CliError, Context};

/// List visits to the caller's map, most recent first.
pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let visits = Visits::new(ctx.session.api(), ctx.config.fetch_ordering);
    visits.fetch().await;

    let mut state = visits.snapshot();
    if let Some(failure) = state.last_error {
        return Err(CliError::Sync(failure));
    }

    if state.items.is_empty() {
        println!("No visits yet");
    }
    state
        .items
        .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    for visit in &state.items {
        println!(
            "{}  {}",
            visit.timestamp.format("%Y-%m-%d %H:%M"),
            visit.visitor_email
        );
    }
    Ok(())
}
