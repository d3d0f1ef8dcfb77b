// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blocking HTTP delivery to the ingestion endpoint.

use crate::upload::{ChunkUploader, LogUploader, UploadError};
use reconnect_core::TelemetryChunk;
use std::time::Duration;

/// Path appended to the configured endpoint.
pub const CHUNK_PATH: &str = "/session/chunk";

/// POSTs each chunk as JSON to `<endpoint>/session/chunk`.
#[derive(Debug, Clone)]
pub struct HttpChunkUploader {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpChunkUploader {
    /// Builds an uploader. `request_timeout` bounds each request end to end.
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, UploadError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(UploadError::Config("endpoint must not be empty".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|error| UploadError::Config(error.to_string()))?;

        Ok(Self {
            url: format!("{}{}", endpoint.trim_end_matches('/'), CHUNK_PATH),
            client,
        })
    }

    /// Full URL chunks are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChunkUploader for HttpChunkUploader {
    fn upload(&self, chunk: &TelemetryChunk) -> Result<(), UploadError> {
        let response = self
            .client
            .post(&self.url)
            .json(chunk)
            .send()
            .map_err(|error| UploadError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(UploadError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Picks the uploader for an optional endpoint.
///
/// Without an endpoint, or when the HTTP client cannot be built, chunks are
/// only logged so the session keeps running.
pub fn uploader_for(endpoint: Option<&str>, request_timeout: Duration) -> Box<dyn ChunkUploader> {
    match endpoint {
        Some(endpoint) => match HttpChunkUploader::new(endpoint, request_timeout) {
            Ok(uploader) => {
                log::info!("Telemetry chunks will be posted to {}.", uploader.url());
                Box::new(uploader)
            }
            Err(e) => {
                log::warn!("Falling back to logging telemetry chunks: {e}");
                Box::new(LogUploader)
            }
        },
        None => Box::new(LogUploader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let uploader = HttpChunkUploader::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(uploader.url(), "http://localhost:8000/session/chunk");
        let uploader = HttpChunkUploader::new(" https://api.example ", Duration::from_secs(1)).unwrap();
        assert_eq!(uploader.url(), "https://api.example/session/chunk");
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(matches!(
            HttpChunkUploader::new("  ", Duration::from_secs(1)),
            Err(UploadError::Config(_))
        ));
    }
}
