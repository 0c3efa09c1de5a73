//! Resolution of client settings from flags, environment and defaults.

use anyhow::{Context, Result, anyhow};
use log::debug;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{FileTokenStore, MemoryTokenStore, TokenStore, mask_token};
use crate::http::{RequestClient, ReqwestTransport, RetryConfig};
use crate::runtime::Runtime;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const API_URL_ENV: &str = "CCM_API_URL";
pub const TOKEN_ENV: &str = "CCM_TOKEN";
pub const TOKEN_FILE_ENV: &str = "CCM_TOKEN_FILE";

/// Settings given on the command line; `None` falls back to environment and defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub api_url: Option<String>,
    pub token_file: Option<PathBuf>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

pub struct Config {
    pub api_url: String,
    pub token_file: PathBuf,
    pub retry: RetryConfig,
    /// The persistent token store managed by `auth` commands.
    pub token_store: Arc<dyn TokenStore>,
    /// The store requests read from; `CCM_TOKEN` takes precedence over the file.
    pub request_tokens: Arc<dyn TokenStore>,
    /// Whether `request_tokens` was seeded from `CCM_TOKEN`.
    pub token_from_env: bool,
}

impl Config {
    pub fn new<R: Runtime + 'static>(runtime: R, options: ConfigOptions) -> Result<Self> {
        let api_url = options
            .api_url
            .or_else(|| runtime.env_var(API_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token_file = match options
            .token_file
            .or_else(|| runtime.env_var(TOKEN_FILE_ENV).ok().map(PathBuf::from))
        {
            Some(path) => path,
            None => runtime
                .config_dir()
                .map(|dir| dir.join("ccm").join("token"))
                .ok_or_else(|| {
                    anyhow!(
                        "Could not determine a config directory; use --token-file or {}",
                        TOKEN_FILE_ENV
                    )
                })?,
        };

        let mut retry = RetryConfig::default();
        if let Some(max_retries) = options.max_retries {
            retry = retry.with_max_retries(max_retries);
        }
        if let Some(delay_ms) = options.retry_delay_ms {
            retry = retry.with_base_delay(Duration::from_millis(delay_ms));
        }

        let env_token = runtime
            .env_var(TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty());

        let token_store: Arc<dyn TokenStore> =
            Arc::new(FileTokenStore::new(runtime, token_file.clone()));
        let token_from_env = env_token.is_some();
        let request_tokens: Arc<dyn TokenStore> = match env_token {
            Some(token) => {
                debug!("Using {} for authentication: {}", TOKEN_ENV, mask_token(&token));
                Arc::new(MemoryTokenStore::with_token(token.trim()))
            }
            None => Arc::clone(&token_store),
        };

        debug!("API URL: {}, token file: {:?}", api_url, token_file);

        Ok(Self {
            api_url,
            token_file,
            retry,
            token_store,
            request_tokens,
            token_from_env,
        })
    }

    /// Builds the request client for the configured API.
    pub fn client(&self) -> Result<RequestClient> {
        let http = Client::builder()
            .user_agent("ccm-cli")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(RequestClient::new(
            Arc::new(ReqwestTransport::new(http)),
            Arc::clone(&self.request_tokens),
            self.retry.clone(),
            self.api_url.clone(),
        ))
    }
}
