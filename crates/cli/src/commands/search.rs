//! Address search command.
//!
//! Feeds the query through the same debounced pipeline an address field
//! uses and waits for it to resolve.

use std::time::Duration;

use mapreviews_client::AddressSearch;

use super::{CliError, Context};

/// Upper bound on the wait after the debounce window elapses.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Search for `query`, print the suggestions and optionally select one.
pub async fn run(ctx: &Context, query: &str, pick: Option<usize>) -> Result<(), CliError> {
    if query.chars().count() < ctx.config.search.min_chars {
        println!(
            "Query too short (minimum {} characters)",
            ctx.config.search.min_chars
        );
        return Ok(());
    }

    let search = AddressSearch::new(ctx.session.api(), ctx.config.search);
    let mut states = search.subscribe();
    search.input(query);

    let resolved = tokio::time::timeout(
        ctx.config.search.debounce + RESPONSE_TIMEOUT,
        states.wait_for(|state| state.resolved_query.as_deref() == Some(query)),
    )
    .await
    .is_ok_and(|outcome| outcome.is_ok());
    if !resolved {
        return Err(CliError::Failed("Address search"));
    }

    let suggestions = search.snapshot().suggestions;
    if suggestions.is_empty() {
        println!("No matches");
        return Ok(());
    }
    for (index, suggestion) in suggestions.iter().enumerate() {
        println!(
            "{index}  {}  ({:.5}, {:.5})  [{}/{}]",
            suggestion.display_name,
            suggestion.latitude,
            suggestion.longitude,
            suggestion.category,
            suggestion.kind
        );
    }

    if let Some(index) = pick {
        let Some(selected) = search.select_index(index) else {
            return Err(CliError::Failed("Selecting the suggestion"));
        };
        println!();
        println!("Selected: {}", selected.display_name);
        println!("  {:.6}, {:.6}", selected.latitude, selected.longitude);
    }
    Ok(())
}
