//! HTTP clients for the three external collaborators.
//!
//! Each client posts JSON to `<base_url>/<endpoint>` and maps a non-success
//! status to [`RemoteError::Server`] with the response body attached.

use async_trait::async_trait;
use pickup_core::{
    AudioSource, BackendError, CandidateAddress, DecomposedAddress, SearchRequest, SearchStore,
    Splitter, Transcriber, Transcription,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RemoteError> for BackendError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Http(e) if e.is_decode() => BackendError::Decode(e.to_string()),
            RemoteError::Http(e) => BackendError::Transport(e.to_string()),
            RemoteError::Server { status, body } => BackendError::Server { status, body },
            RemoteError::Json(e) => BackendError::Decode(e.to_string()),
        }
    }
}

// ── Wire types ──

#[derive(Serialize)]
struct SplitRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SplitResponse {
    ok: bool,
    #[serde(default)]
    address: Option<DecomposedAddress>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<CandidateAddress>,
}

#[derive(Serialize)]
struct LocationRequest<'a> {
    location: &'a str,
}

// ── Shared transport ──

struct Endpoint {
    client: reqwest::Client,
    base_url: String,
}

impl Endpoint {
    fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RemoteError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let resp = self.client.post(&url).json(body).send().await?;
        Self::decode(resp).await
    }

    async fn post_bytes<Resp: DeserializeOwned>(
        &self,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<Resp, RemoteError> {
        let url = self.url(path);
        debug!(url = %url, len = bytes.len(), "POST audio");
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<Resp: DeserializeOwned>(resp: reqwest::Response) -> Result<Resp, RemoteError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

// ── Splitter ──

/// Remote administrative-unit splitter (`POST /split`).
pub struct HttpSplitter {
    endpoint: Endpoint,
}

impl HttpSplitter {
    /// `base_url` like `http://localhost:8081` (a trailing slash is dropped).
    pub fn new(base_url: String) -> Self {
        Self {
            endpoint: Endpoint::new(base_url),
        }
    }
}

#[async_trait]
impl Splitter for HttpSplitter {
    async fn split(&self, text: &str) -> Result<Option<DecomposedAddress>, BackendError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let resp: SplitResponse = self
            .endpoint
            .post_json("split", &SplitRequest { text })
            .await?;
        Ok(resp.address.filter(|a| resp.ok && !a.is_empty()))
    }
}

// ── Search store ──

/// Remote gazetteer/POI full-text search (`POST /search`).
pub struct HttpSearchStore {
    endpoint: Endpoint,
}

impl HttpSearchStore {
    pub fn new(base_url: String) -> Self {
        Self {
            endpoint: Endpoint::new(base_url),
        }
    }
}

#[async_trait]
impl SearchStore for HttpSearchStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<CandidateAddress>, BackendError> {
        let resp: SearchResponse = self.endpoint.post_json("search", request).await?;
        debug!(count = resp.results.len(), "remote search returned");
        Ok(resp.results)
    }
}

// ── Speech-to-text ──

/// Remote speech-to-text (`POST /transcribe`). Raw audio is sent as an
/// octet stream; a location is sent as JSON for the service to fetch.
pub struct HttpTranscriber {
    endpoint: Endpoint,
}

impl HttpTranscriber {
    pub fn new(base_url: String) -> Self {
        Self {
            endpoint: Endpoint::new(base_url),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &AudioSource) -> Result<Transcription, BackendError> {
        let result: Transcription = match audio {
            AudioSource::Bytes(bytes) => {
                self.endpoint
                    .post_bytes("transcribe", bytes.clone())
                    .await?
            }
            AudioSource::Location(location) => {
                self.endpoint
                    .post_json("transcribe", &LocationRequest { location })
                    .await?
            }
        };
        info!(
            status = result.status,
            count = result.transcripts.len(),
            "transcription received"
        );
        Ok(result)
    }
}
