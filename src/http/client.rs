//! HTTP client with status classification and error handling.
//!
//! Every call is a single attempt. Callers decide what a failure means
//! (an unknown remote version, a failed download); nothing is retried here.

use anyhow::{Context, Result};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::io::Write;

/// A non-success HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("rate limit exceeded (HTTP {0}), try again later or set GITHUB_TOKEN")]
    RateLimited(u16),
    #[error("not found (HTTP 404): {0}")]
    NotFound(String),
    #[error("HTTP {status} from {url}")]
    Other { status: u16, url: String },
}

impl StatusError {
    fn classify(status: StatusCode, url: &str) -> Self {
        match status {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                StatusError::RateLimited(status.as_u16())
            }
            StatusCode::NOT_FOUND => StatusError::NotFound(url.to_string()),
            s => StatusError::Other {
                status: s.as_u16(),
                url: url.to_string(),
            },
        }
    }
}

/// Thin wrapper over `reqwest::Client` shared by the release source and the downloader.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET JSON from {}...", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatusError::classify(status, url).into());
        }

        response
            .json::<T>()
            .await
            .context("Failed to parse JSON response")
    }

    /// Streams the body of `url` into the writer produced by `create_writer`.
    /// The writer is only created once the server answered with a success status.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatusError::classify(status, url).into());
        }

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }
}
