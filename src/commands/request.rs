use anyhow::{Context, Result, anyhow};
use log::info;
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use std::io::Write;

use crate::config::Config;
use crate::http::{RequestClient, RequestOptions};
use crate::notify::{Notifier, handle_error};

/// Parses a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid header '{}'. Expected 'Name: value'.", raw))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("Invalid header name in '{}'", raw))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("Invalid header value in '{}'", raw))?;
    Ok((name, value))
}

/// Builds request options from command-line arguments.
pub fn build_options(method: &str, data: Option<String>, headers: &[String]) -> Result<RequestOptions> {
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", method))?;

    let mut options = RequestOptions::new(method);
    for raw in headers {
        let (name, value) = parse_header(raw)?;
        options = options.header(name, value);
    }
    if let Some(data) = data {
        options = options.body(data);
    }
    Ok(options)
}

/// Performs a request and writes the payload to `out`.
///
/// API failures are reported through `notifier` and yield `Ok(false)`; only local
/// problems such as a failed write to `out` are returned as errors.
#[tracing::instrument(skip(config, client, options, out, notifier))]
pub async fn request(
    config: &Config,
    client: &RequestClient,
    endpoint: &str,
    options: RequestOptions,
    out: &mut dyn Write,
    notifier: &dyn Notifier,
) -> Result<bool> {
    info!("{} {}", options.method, client.url_for(endpoint));

    match client.request(endpoint, options).await {
        Ok(payload) => {
            writeln!(out, "{}", payload).context("Failed to write response")?;
            Ok(true)
        }
        Err(error) => {
            handle_error(&error, config.request_tokens.as_ref(), notifier);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOptions;
    use crate::notify::{MockNotifier, Severity};
    use crate::runtime::RealRuntime;

    fn config_for(server_url: &str, token_file: std::path::PathBuf) -> Config {
        Config::new(
            RealRuntime,
            ConfigOptions {
                api_url: Some(server_url.to_string()),
                token_file: Some(token_file),
                max_retries: Some(0),
                retry_delay_ms: Some(1),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_parse_header() {
        let (name, value) = parse_header("X-Request-Id: 42").unwrap();
        assert_eq!(name.as_str(), "x-request-id");
        assert_eq!(value, "42");

        let (_, value) = parse_header("Accept:application/json").unwrap();
        assert_eq!(value, "application/json");

        assert!(parse_header("no-colon").is_err());
        assert!(parse_header("bad name: x").is_err());
    }

    #[test]
    fn test_build_options() {
        let options = build_options(
            "post",
            Some(r#"{"tonnes":1}"#.to_string()),
            &["X-Trace: abc".to_string()],
        )
        .unwrap();
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.body.as_deref(), Some(r#"{"tonnes":1}"#));
        assert_eq!(options.headers.get("x-trace").unwrap(), "abc");

        assert!(build_options("GE T", None, &[]).is_err());
    }

    #[tokio::test]
    async fn test_request_writes_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/projects")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":1}]"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server.url(), dir.path().join("token"));
        let client = config.client().unwrap();
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();

        let mut out = Vec::new();
        let succeeded = request(
            &config,
            &client,
            "/projects",
            RequestOptions::get(),
            &mut out,
            &notifier,
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert!(succeeded);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("\"id\": 1"));
    }

    #[tokio::test]
    async fn test_request_unauthorized_clears_stored_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer stale-token")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"expired"}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("token");
        std::fs::write(&token_file, "stale-token").unwrap();

        let config = config_for(&server.url(), token_file.clone());
        let client = config.client().unwrap();
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|_, severity| *severity == Severity::Error)
            .times(1)
            .return_const(());

        let mut out = Vec::new();
        let succeeded = request(&config, &client, "/me", RequestOptions::get(), &mut out, &notifier)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(!succeeded);
        assert!(out.is_empty());
        assert!(!token_file.exists());
    }
}
