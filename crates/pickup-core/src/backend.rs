//! Boundaries to the external collaborators: the address splitter, the
//! gazetteer/POI search store, and speech-to-text.
//!
//! Every call across these traits is a suspension point; implementations
//! must be cancel-safe (dropping the future abandons the request).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::{CandidateAddress, DecomposedAddress};
use crate::error::BackendError;

/// Splits raw text into administrative and street units.
///
/// Must tolerate empty input. Callers invoke it on whole utterances and on
/// small fragments (a single road, a single number) alike.
#[async_trait]
pub trait Splitter: Send + Sync {
    /// `Ok(None)` when nothing address-like was recognised.
    async fn split(&self, text: &str) -> Result<Option<DecomposedAddress>, BackendError>;
}

/// One query against the search store.
///
/// An empty `literal` with an `expression` performs fuzzy search only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub limit: usize,
    pub literal: String,
    /// `FORMSOF(THESAURUS, term) and|or …` boolean expression.
    pub expression: Option<String>,
}

impl SearchRequest {
    pub fn literal(limit: usize, literal: impl Into<String>) -> Self {
        Self {
            limit,
            literal: literal.into(),
            expression: None,
        }
    }

    pub fn fuzzy(limit: usize, expression: impl Into<String>) -> Self {
        Self {
            limit,
            literal: String::new(),
            expression: Some(expression.into()),
        }
    }

    pub fn with_expression(mut self, expression: Option<String>) -> Self {
        self.expression = expression;
        self
    }
}

/// Gazetteer/POI full-text search.
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<CandidateAddress>, BackendError>;
}

/// Audio handed to speech-to-text.
#[derive(Debug, Clone)]
pub enum AudioSource {
    Bytes(Vec<u8>),
    /// Path or URL the transcription service can fetch itself.
    Location(String),
}

/// Transcription result: a service status code and zero or more candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub status: i32,
    #[serde(default)]
    pub transcripts: Vec<String>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioSource) -> Result<Transcription, BackendError>;
}
