//! Dataset retrieval over HTTP or from the local filesystem.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{debug, info};

/// Fetches `url` and returns the response body. Non-success statuses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid URL '{url}'"))?,
    );

    let resp = client
        .execute(req)
        .await
        .with_context(|| format!("request to '{url}' failed"))?
        .error_for_status()?;
    Ok(resp.bytes().await?)
}

/// Loads a dataset from an `http(s)://` URL or a local file path.
#[tracing::instrument(fields(source = %source))]
pub async fn load_source(source: &str) -> Result<Bytes> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        let client = BasicClient::new();
        fetch_bytes(&client, source).await?
    } else {
        tokio::fs::read(source)
            .await
            .map(Bytes::from)
            .with_context(|| format!("failed to read dataset '{source}'"))?
    };
    info!(bytes = bytes.len(), "Dataset loaded");
    debug!(gzip = bytes.starts_with(&[0x1f, 0x8b]), "Dataset encoding");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::env;

    struct FailingClient;

    #[async_trait]
    impl HttpClient for FailingClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            // Building a request without a scheme fails inside reqwest itself.
            reqwest::Client::new().get(format!("nowhere{}", req.url().path())).send().await
        }
    }

    #[tokio::test]
    async fn test_load_source_reads_file() {
        let path = format!("{}/glosa_analyzer_test_source.json", env::temp_dir().display());
        tokio::fs::write(&path, b"[]").await.unwrap();

        let bytes = load_source(&path).await.unwrap();
        assert_eq!(&bytes[..], b"[]");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_source_missing_file() {
        let err = load_source("/definitely/not/here.json").await.unwrap_err();
        assert!(err.to_string().contains("failed to read dataset"));
    }

    #[tokio::test]
    async fn test_fetch_bytes_rejects_bad_url() {
        assert!(fetch_bytes(&BasicClient::new(), "not a url").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_bytes_propagates_client_errors() {
        let err = fetch_bytes(&FailingClient, "http://localhost/data.json")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("request to 'http://localhost/data.json' failed"));
    }
}
