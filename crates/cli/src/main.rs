//! Map Reviews CLI - Command-line front end over the client.
//!
//! # Usage
//!
//! ```bash
//! # Adopt a credential obtained from the identity provider
//! mapreviews login --token "$ID_TOKEN"
//!
//! # Browse and manage reviews
//! mapreviews reviews list --mine
//! mapreviews reviews create -n "Casa Lola" -a "Calle Granada 46, Málaga" -r 5 -i tapas.jpg
//! mapreviews reviews update 665f1c -r 4
//!
//! # Look up an address
//! mapreviews search "calle granada" --pick 0
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `whoami` - Session management
//! - `reviews` - List, show, create, update and delete reviews
//! - `markers` - List and create photo markers
//! - `visits` - List visits to your map
//! - `search` - Address autocomplete
//!
//! Configuration comes from `MAPREVIEWS_*` environment variables (see
//! `mapreviews_client::config`). Logs go to stderr and honour `RUST_LOG`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "mapreviews")]
#[command(author, version, about = "Map Reviews command-line client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify and store a credential from the identity provider
    Login {
        /// Bearer credential (ID token)
        #[arg(short, long, env = "MAPREVIEWS_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Forget the stored credential
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage reviews
    Reviews {
        #[command(subcommand)]
        action: ReviewsAction,
    },
    /// Manage photo markers
    Markers {
        #[command(subcommand)]
        action: MarkersAction,
    },
    /// List visits to your map
    Visits,
    /// Search for an address
    Search {
        /// Free-text address query
        query: String,

        /// Select the suggestion at this position and print it
        #[arg(short, long)]
        pick: Option<usize>,
    },
}

#[derive(Subcommand)]
enum ReviewsAction {
    /// List reviews
    List {
        /// Only your own reviews
        #[arg(short, long)]
        mine: bool,
    },
    /// Show one review in detail
    Show {
        /// Review ID
        id: String,
    },
    /// Create a review
    Create {
        /// Establishment name
        #[arg(short, long)]
        name: String,

        /// Postal address
        #[arg(short, long)]
        address: String,

        /// Rating from 1 to 5
        #[arg(short, long)]
        rating: u8,

        /// Photo to upload (repeatable)
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,
    },
    /// Update fields of a review
    Update {
        /// Review ID
        id: String,

        /// New establishment name
        #[arg(short, long)]
        name: Option<String>,

        /// New postal address
        #[arg(short, long)]
        address: Option<String>,

        /// New rating from 1 to 5
        #[arg(short, long)]
        rating: Option<u8>,
    },
    /// Delete a review
    Delete {
        /// Review ID
        id: String,
    },
}

#[derive(Subcommand)]
enum MarkersAction {
    /// List markers (yours, or another user's)
    List {
        /// Owner email; viewing another user's map records a visit
        #[arg(short, long)]
        owner: Option<String>,
    },
    /// Pin a photo to a place
    Create {
        /// Place name
        #[arg(short, long)]
        location: String,

        /// Photo to upload
        #[arg(short, long)]
        image: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mapreviews_client=info,mapreviews_cli=info".into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = Context::load().await?;

    match cli.command {
        Commands::Login { token } => commands::auth::login(&ctx, token).await?,
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Whoami => commands::auth::whoami(&ctx),
        Commands::Reviews { action } => match action {
            ReviewsAction::List { mine } => commands::reviews::list(&ctx, mine).await?,
            ReviewsAction::Show { id } => commands::reviews::show(&ctx, &id).await?,
            ReviewsAction::Create {
                name,
                address,
                rating,
                images,
            } => commands::reviews::create(&ctx, name, address, rating, &images).await?,
            ReviewsAction::Update {
                id,
                name,
                address,
                rating,
            } => commands::reviews::update(&ctx, &id, name, address, rating).await?,
            ReviewsAction::Delete { id } => commands::reviews::delete(&ctx, &id).await?,
        },
        Commands::Markers { action } => match action {
            MarkersAction::List { owner } => {
                commands::markers::list(&ctx, owner.as_deref()).await?;
            }
            MarkersAction::Create { location, image } => {
                commands::markers::create(&ctx, location, &image).await?;
            }
        },
        Commands::Visits => commands::visits::list(&ctx).await?,
        Commands::Search { query, pick } => commands::search::run(&ctx, &query, pick).await?,
    }
    Ok(())
}
