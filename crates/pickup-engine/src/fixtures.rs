//! Stub backends and a small record set shared by the engine's tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pickup_core::{
    AudioSource, BackendError, CandidateAddress, Gazetteer, RulesConfig, SearchRequest,
    SearchStore, Transcriber, Transcription,
};
use pickup_nlp::RuleSplitter;
use pickup_store::MemoryStore;

use crate::cascade::Resolver;
use crate::context::{ResolverContext, SharedContext};
use crate::pipeline::Pipeline;

pub fn record(address: &str, memo: &str, lng: f64, lat: f64) -> CandidateAddress {
    CandidateAddress {
        address: address.into(),
        city: address.chars().take(3).collect(),
        memo: memo.into(),
        lng,
        lat,
    }
}

pub fn scenario_records() -> Vec<CandidateAddress> {
    vec![
        record("台中市東區立德街29號", "", 120.6868, 24.1375),
        record("台中市東區立德街31號", "", 120.6869, 24.1376),
        record("台中市東區立德街1號", "", 120.6860, 24.1368),
        record("台北市中正區北平西路3號", "台北火車站", 121.5170, 25.0478),
        record("台中市中區中山路1號", "", 120.6795, 24.1405),
        record("台中市中區中正路2號", "", 120.6800, 24.1410),
        record("台南市中西區中正路10號", "", 120.2000, 22.9900),
        record("新北市板橋區文化路一段100號", "", 121.4650, 25.0140),
    ]
}

/// Bundled context plus the local splitter.
pub struct Fixture {
    pub context: ResolverContext,
    pub splitter: RuleSplitter,
}

impl Fixture {
    pub fn new() -> Self {
        let context = ResolverContext::bundled().unwrap();
        let splitter = RuleSplitter::new(context.gazetteer.clone());
        Self { context, splitter }
    }

    pub fn resolver<'a>(&'a self, store: &'a dyn SearchStore) -> Resolver<'a> {
        Resolver::new(
            store,
            &self.splitter,
            &self.context.decomposer,
            &self.context.rules.search,
        )
    }
}

/// A memory store that records every request it receives.
pub struct RecordingStore {
    inner: MemoryStore,
    seen: Mutex<Vec<SearchRequest>>,
}

impl RecordingStore {
    pub fn new(records: Vec<CandidateAddress>) -> Self {
        Self {
            inner: MemoryStore::new(records),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchStore for RecordingStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<CandidateAddress>, BackendError> {
        self.seen.lock().unwrap().push(request.clone());
        self.inner.search(request).await
    }
}

pub struct FailingStore;

#[async_trait]
impl SearchStore for FailingStore {
    async fn search(&self, _: &SearchRequest) -> Result<Vec<CandidateAddress>, BackendError> {
        Err(BackendError::Transport("connection refused".into()))
    }
}

pub struct SleepingStore(pub Duration);

#[async_trait]
impl SearchStore for SleepingStore {
    async fn search(&self, _: &SearchRequest) -> Result<Vec<CandidateAddress>, BackendError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}

pub struct StubTranscriber(pub Transcription);

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _: &AudioSource) -> Result<Transcription, BackendError> {
        Ok(self.0.clone())
    }
}

pub fn pipeline_with(rules: RulesConfig, store: Arc<dyn SearchStore>) -> Pipeline {
    let gazetteer = Gazetteer::bundled().unwrap();
    let splitter = Arc::new(RuleSplitter::new(Arc::new(gazetteer.clone())));
    let context = Arc::new(SharedContext::new(ResolverContext::new(rules, gazetteer)));
    Pipeline::new(context, store, splitter)
}

pub fn pipeline(records: Vec<CandidateAddress>) -> Pipeline {
    pipeline_with(RulesConfig::bundled().unwrap(), Arc::new(MemoryStore::new(records)))
}
