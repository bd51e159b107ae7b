//! In-memory gazetteer/POI store backed by a JSON file of records.
//!
//! Used offline by the CLI and as the store behind pipeline tests. A literal
//! matches a record whose address or memo contains it; a boolean expression
//! matches when its terms are contained in address + memo. Literal hits come
//! before fuzzy hits, and the combined list is truncated to the limit.

use std::path::Path;

use async_trait::async_trait;
use pickup_core::{BackendError, CandidateAddress, SearchRequest, SearchStore};
use tracing::{debug, info};

use crate::StoreError;
use crate::expr::Expr;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<CandidateAddress>,
}

impl MemoryStore {
    pub fn new(records: Vec<CandidateAddress>) -> Self {
        Self { records }
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Load a JSON array of records from disk.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_json(&json)?;
        info!(path = %path.display(), count = store.len(), "loaded search store");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn query(&self, request: &SearchRequest) -> Result<Vec<CandidateAddress>, StoreError> {
        let expr = request
            .expression
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(Expr::parse)
            .transpose()?;
        let literal = request.literal.trim();

        let mut literal_hits = Vec::new();
        let mut fuzzy_hits = Vec::new();
        for record in &self.records {
            if !literal.is_empty()
                && (record.address.contains(literal) || record.memo.contains(literal))
            {
                literal_hits.push(record.clone());
            } else if let Some(e) = &expr
                && e.eval(&|term| record.address.contains(term) || record.memo.contains(term))
            {
                fuzzy_hits.push(record.clone());
            }
        }

        debug!(
            literal,
            expression = request.expression.as_deref().unwrap_or(""),
            literal_hits = literal_hits.len(),
            fuzzy_hits = fuzzy_hits.len(),
            "memory store query"
        );
        literal_hits.extend(fuzzy_hits);
        literal_hits.truncate(request.limit);
        Ok(literal_hits)
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<CandidateAddress>, BackendError> {
        Ok(self.query(request)?)
    }
}
