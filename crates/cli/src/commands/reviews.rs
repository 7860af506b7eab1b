//! Review commands.
//!
//! # Usage
//!
//! ```bash
//! mapreviews reviews list
//! mapreviews reviews list --mine
//! mapreviews reviews show 665f1c
//! mapreviews reviews create -n "Casa Lola" -a "Calle Granada 46, Málaga" -r 5 -i tapas.jpg
//! mapreviews reviews update 665f1c --rating 4
//! mapreviews reviews delete 665f1c
//! ```

use std::path::PathBuf;

use mapreviews_client::{Attachment, NewReview, ReviewPatch, Reviews};
use mapreviews_core::{Rating, Review, ReviewId};

use super::{CliError, Context};

fn reviews(ctx: &Context) -> Reviews {
    Reviews::new(ctx.session.api(), ctx.config.fetch_ordering)
}

fn print_summary(review: &Review) {
    println!(
        "{}  {}  {}/5  {}",
        review.id, review.establishment_name, review.rating, review.address
    );
}

fn print_detail(review: &Review) {
    println!("{}", review.establishment_name);
    println!("  id:       {}", review.id);
    println!("  address:  {}", review.address);
    println!(
        "  location: {:.6}, {:.6}",
        review.latitude, review.longitude
    );
    println!("  rating:   {}/5", review.rating);
    println!("  author:   {} <{}>", review.author_name, review.author_email);
    println!("  created:  {}", review.created_at.to_rfc3339());
    for image in &review.images {
        println!("  image:    {image}");
    }
}

/// List all reviews, or only the caller's.
pub async fn list(ctx: &Context, mine: bool) -> Result<(), CliError> {
    let reviews = reviews(ctx);
    if mine {
        reviews.fetch_mine().await;
    } else {
        reviews.fetch_all().await;
    }

    let state = reviews.snapshot();
    if let Some(failure) = state.last_error {
        return Err(CliError::Sync(failure));
    }

    if state.items.is_empty() {
        println!("No reviews");
    }
    for review in &state.items {
        print_summary(review);
    }
    Ok(())
}

/// Show one review.
pub async fn show(ctx: &Context, id: &str) -> Result<(), CliError> {
    let reviews = reviews(ctx);
    match reviews.fetch_one(&ReviewId::new(id)).await {
        Some(review) => {
            print_detail(&review);
            Ok(())
        }
        None => Err(CliError::from_recorded(
            reviews.snapshot().last_error,
            "Fetching the review",
        )),
    }
}

/// Create a review with optional photos.
pub async fn create(
    ctx: &Context,
    name: String,
    address: String,
    rating: u8,
    images: &[PathBuf],
) -> Result<(), CliError> {
    let rating = Rating::new(rating)?;

    let mut attachments = Vec::with_capacity(images.len());
    for path in images {
        attachments.push(Attachment::from_path(path).await?);
    }

    let review = reviews(ctx)
        .create(NewReview {
            establishment_name: name,
            address,
            rating,
            images: attachments,
        })
        .await?;

    println!("Created review {}", review.id);
    print_detail(&review);
    Ok(())
}

/// Update the given fields of a review.
pub async fn update(
    ctx: &Context,
    id: &str,
    name: Option<String>,
    address: Option<String>,
    rating: Option<u8>,
) -> Result<(), CliError> {
    let patch = ReviewPatch {
        establishment_name: name,
        address,
        rating: rating.map(Rating::new).transpose()?,
    };
    if patch.is_empty() {
        tracing::warn!("No fields given, sending an empty update");
    }

    let review = reviews(ctx).update(&ReviewId::new(id), patch).await?;

    println!("Updated review {}", review.id);
    print_detail(&review);
    Ok(())
}

/// Delete a review.
pub async fn delete(ctx: &Context, id: &str) -> Result<(), CliError> {
    let reviews = reviews(ctx);
    if reviews.remove(&ReviewId::new(id)).await {
        println!("Deleted review {id}");
        Ok(())
    } else {
        Err(CliError::from_recorded(
            reviews.snapshot().last_error,
            "Deleting the review",
        ))
    }
}
