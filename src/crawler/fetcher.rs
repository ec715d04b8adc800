//! HTTP fetcher: client construction, the strict/permissive TLS pair, and
//! response classification into [`FetchErrorKind`] (§4.6).
//!
//! A domain's first attempt always goes through the strict client (full
//! certificate validation). Only a TLS-handshake failure against an https
//! URL earns a single retry through the permissive client
//! (`danger_accept_invalid_certs`); every other outcome is final for this
//! attempt.

use crate::config::UserAgentConfig;
use crate::state::FetchErrorKind;
use reqwest::{redirect::Policy, Client};
use std::error::Error as _;
use std::time::Duration;

/// A successfully fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub final_url: String,
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub headers: String,
}

pub type FetchOutcome = Result<FetchSuccess, FetchErrorKind>;

/// Builds one client: a fixed user agent, connect/read timeouts, gzip/brotli
/// negotiation and a bounded redirect policy. `insecure` selects the
/// permissive (certificate-validation-disabled) variant.
pub fn build_client(
    user_agent: &str,
    connect_timeout: Duration,
    read_timeout: Duration,
    insecure: bool,
) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .connect_timeout(connect_timeout)
        .timeout(read_timeout)
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    if insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build()
}

/// Builds the strict/permissive client pair every fetcher worker shares.
pub fn build_client_pair(
    user_agent: &UserAgentConfig,
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> reqwest::Result<(Client, Client)> {
    let header = user_agent.header_value();
    let connect = Duration::from_secs(connect_timeout_secs);
    let read = Duration::from_secs(read_timeout_secs);

    let strict = build_client(&header, connect, read, false)?;
    let permissive = build_client(&header, connect, read, true)?;
    Ok((strict, permissive))
}

/// Fetches `url`, classifying any non-success outcome into a
/// [`FetchErrorKind`]. `max_bytes` rejects a response as [`FetchErrorKind::TooLarge`]
/// either from a declared `Content-Length` or from the actual downloaded size.
pub async fn fetch(strict: &Client, permissive: &Client, url: &str, max_bytes: usize) -> FetchOutcome {
    match fetch_once(strict, url, max_bytes).await {
        Err(FetchErrorKind::SslError) if url.starts_with("https://") => {
            fetch_once(permissive, url, max_bytes).await
        }
        other => other,
    }
}

async fn fetch_once(client: &Client, url: &str, max_bytes: usize) -> FetchOutcome {
    let response = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => return Err(classify_error(&e)),
    };

    let final_url = response.url().to_string();
    let status = response.status().as_u16();
    if status != 200 {
        return Err(FetchErrorKind::HttpStatus(status));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.contains("text/html") {
        return Err(FetchErrorKind::NotHtml);
    }

    if let Some(len) = response.content_length() {
        if len as usize > max_bytes {
            return Err(FetchErrorKind::TooLarge);
        }
    }

    let headers = serialize_headers(response.headers());

    let body = match response.bytes().await {
        Ok(b) => b,
        Err(e) => return Err(classify_error(&e)),
    };

    if body.len() > max_bytes {
        return Err(FetchErrorKind::TooLarge);
    }

    Ok(FetchSuccess {
        final_url,
        status,
        content_type,
        body: body.to_vec(),
        headers,
    })
}

/// Renders response headers as `Key: Value` lines for storage alongside the
/// raw HTML (§3's html_storage.headers column).
fn serialize_headers(headers: &reqwest::header::HeaderMap) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k.as_str(), v.to_str().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Classifies a transport-level `reqwest::Error`. TLS failures are detected
/// by scanning the error's display/source chain for certificate-related
/// wording, since reqwest does not expose a dedicated `is_tls()` predicate.
fn classify_error(e: &reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        return FetchErrorKind::Timeout;
    }

    let mut text = e.to_string().to_lowercase();
    let mut source = e.source();
    while let Some(s) = source {
        text.push(' ');
        text.push_str(&s.to_string().to_lowercase());
        source = s.source();
    }

    if text.contains("certificate") || text.contains("tls") || text.contains("ssl") || text.contains("handshake") {
        return FetchErrorKind::SslError;
    }

    FetchErrorKind::NetError
}
