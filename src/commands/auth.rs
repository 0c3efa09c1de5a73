use anyhow::{Result, bail};
use std::io::Write;

use crate::auth::mask_token;
use crate::config::{Config, TOKEN_ENV};

/// Stores a token for subsequent requests.
#[tracing::instrument(skip(config, token, out))]
pub fn auth_set(config: &Config, token: &str, out: &mut dyn Write) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Token must not be empty");
    }
    config.token_store.set(token)?;
    writeln!(out, "Token saved to {}", config.token_file.display())?;
    Ok(())
}

/// Removes the stored token.
#[tracing::instrument(skip(config, out))]
pub fn auth_clear(config: &Config, out: &mut dyn Write) -> Result<()> {
    config.token_store.clear()?;
    writeln!(out, "Token cleared")?;
    Ok(())
}

/// Reports which token, if any, requests will use.
#[tracing::instrument(skip(config, out))]
pub fn auth_status(config: &Config, out: &mut dyn Write) -> Result<()> {
    let source = if config.token_from_env {
        TOKEN_ENV.to_string()
    } else {
        config.token_file.display().to_string()
    };
    match config.request_tokens.get() {
        Some(token) => writeln!(
            out,
            "Authenticated with token {} from {}",
            mask_token(&token),
            source
        )?,
        None => writeln!(out, "Not authenticated")?,
    }
    Ok(())
}
