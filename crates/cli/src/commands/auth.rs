//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! mapreviews login --token "$ID_TOKEN"
//! mapreviews whoami
//! mapreviews logout
//! ```

use secrecy::SecretString;

use super::{CliError, Context};

/// Verify `token` with the backend and store it.
pub async fn login(ctx: &Context, token: String) -> Result<(), CliError> {
    let identity = ctx
        .session
        .complete_login(SecretString::from(token))
        .await?;

    println!("Logged in as {}", identity.label());
    Ok(())
}

/// Forget the stored credential.
pub async fn logout(ctx: &Context) {
    ctx.session.logout().await;
    println!("Logged out");
}

/// Print the signed-in user.
pub fn whoami(ctx: &Context) {
    match ctx.session.identity() {
        Some(identity) => {
            println!("{}", identity.label());
            println!("  email:   {}", identity.email);
            if let Some(picture) = &identity.picture_url {
                println!("  picture: {picture}");
            }
        }
        None => println!("Not logged in"),
    }
}
