//! `http` sources: a URL served over HTTP(S)
//!
//! Fingerprinting prefers cheap validators from a `HEAD` request and only
//! downloads the body when the server offers none.

use std::path::Path;

use async_trait::async_trait;
use datum_core::{HandlerError, HandlerResult, OpContext, SourceHandler, SourceSpec};
use datum_fs::checksum::StreamingChecksum;
use reqwest::header::{CONTENT_LENGTH, ETAG, HeaderMap, HeaderName, LAST_MODIFIED};
use reqwest::{Client, Response};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

pub const TAG: &str = "http";

#[derive(Debug, Deserialize)]
struct HttpSource {
    #[serde(default)]
    url: String,
}

impl HttpSource {
    fn from_spec(source: &SourceSpec) -> HandlerResult<Self> {
        let params: HttpSource = source.decode()?;
        if params.url.trim().is_empty() {
            return Err(HandlerError::invalid(TAG, "missing source.url"));
        }
        Ok(params)
    }
}

/// Handler for `http` and `https` URLs.
#[derive(Debug, Clone)]
pub struct HttpHandler {
    client: Client,
}

impl Default for HttpHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpHandler {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("datum/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// `etag:` or `lm:..|len:..` from a successful HEAD, if the server sends either.
    async fn head_fingerprint(&self, ctx: &OpContext, url: &str) -> Option<String> {
        let response = match self.client.head(url).timeout(ctx.remaining()).send().await {
            Ok(response) if response.status().as_u16() < 400 => response,
            Ok(response) => {
                tracing::debug!(url, status = %response.status(), "HEAD rejected, falling back to GET");
                return None;
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "HEAD failed, falling back to GET");
                return None;
            }
        };
        validator_fingerprint(response.headers())
    }

    async fn get(&self, ctx: &OpContext, url: &str) -> HandlerResult<Response> {
        let response = self
            .client
            .get(url)
            .timeout(ctx.remaining())
            .send()
            .await
            .map_err(|e| http_error(url, e))?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(HandlerError::Http {
                url: url.to_string(),
                message: format!("GET returned {status}"),
            });
        }
        Ok(response)
    }
}

fn header<'h>(headers: &'h HeaderMap, name: &HeaderName) -> &'h str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
}

fn validator_fingerprint(headers: &HeaderMap) -> Option<String> {
    let etag = header(headers, &ETAG);
    if !etag.is_empty() {
        return Some(format!("etag:{etag}"));
    }
    let last_modified = header(headers, &LAST_MODIFIED);
    let length = header(headers, &CONTENT_LENGTH);
    if last_modified.is_empty() && length.is_empty() {
        return None;
    }
    Some(format!("lm:{last_modified}|len:{length}"))
}

fn http_error(url: &str, e: reqwest::Error) -> HandlerError {
    HandlerError::Http {
        url: url.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl SourceHandler for HttpHandler {
    async fn fingerprint(&self, ctx: &OpContext, source: &SourceSpec) -> HandlerResult<String> {
        let HttpSource { url } = HttpSource::from_spec(source)?;

        if let Some(fingerprint) = self.head_fingerprint(ctx, &url).await {
            return Ok(fingerprint);
        }

        let mut response = self.get(ctx, &url).await?;
        let mut checksum = StreamingChecksum::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| http_error(&url, e))? {
            checksum.update(&chunk);
        }
        Ok(checksum.finish())
    }

    async fn fetch(&self, ctx: &OpContext, source: &SourceSpec, dest: &Path) -> HandlerResult<()> {
        let HttpSource { url } = HttpSource::from_spec(source)?;
        let mut response = self.get(ctx, &url).await?;

        let pending = datum_fs::io::PendingFile::for_dest(dest)?;
        let temp_path = pending.path();

        let mut file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| HandlerError::io(temp_path, e))?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| http_error(&url, e))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| HandlerError::io(temp_path, e))?;
            written += chunk.len() as u64;
        }
        file.sync_all()
            .await
            .map_err(|e| HandlerError::io(temp_path, e))?;
        drop(file);

        pending.persist_unless(|| ctx.is_cancelled())?;
        tracing::debug!(url = %url, bytes = written, "Downloaded http source");
        Ok(())
    }
}
