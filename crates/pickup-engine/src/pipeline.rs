//! The top-level resolution pipeline.
//!
//! One request runs normalisation, landmark aliases, cross-road and junction
//! detection, decomposition and the search cascade in that order, under a
//! single deadline. The first branch that produces a result ends the
//! request; only after every branch is exhausted is a business failure
//! chosen.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pickup_core::{
    AudioSource, BackendError, CandidateAddress, DecomposedAddress, RawUtterance, SearchStore,
    Splitter, Transcriber,
};
use pickup_nlp::{Decomposition, has_address_unit};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cascade::Resolver;
use crate::context::{ResolverContext, SharedContext};
use crate::error::ResolveError;
use crate::format;
use crate::outcome::{AddrType, FailureReason, Outcome};

/// Number tried when only a lane or road mouth was given.
const JUNCTION_PROBE: &str = "1號";

pub struct Pipeline {
    context: Arc<SharedContext>,
    store: Arc<dyn SearchStore>,
    splitter: Arc<dyn Splitter>,
    transcriber: Option<Arc<dyn Transcriber>>,
}

impl Pipeline {
    pub fn new(
        context: Arc<SharedContext>,
        store: Arc<dyn SearchStore>,
        splitter: Arc<dyn Splitter>,
    ) -> Self {
        Self {
            context,
            store,
            splitter,
            transcriber: None,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Resolve one transcript within the configured deadline.
    pub async fn resolve(&self, call: &RawUtterance) -> Outcome {
        let ctx = self.context.snapshot();
        let deadline = Duration::from_millis(ctx.rules.pipeline.deadline_ms);
        let started = Instant::now();

        let outcome = match timeout(deadline, self.run(&ctx, &call.transcript)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, transcript = %call.transcript, "backend failure");
                Outcome::SystemError
            }
            Err(_) => {
                warn!(
                    deadline_ms = ctx.rules.pipeline.deadline_ms,
                    transcript = %call.transcript,
                    "resolution timed out"
                );
                Outcome::TimedOut
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Outcome::Resolved(r) => info!(
                kind = r.kind.as_str(),
                address = %r.display_address,
                elapsed_ms,
                "resolved"
            ),
            Outcome::Failed(f) => warn!(
                reason = f.reason.code(),
                addr_type = f.addr_type.code(),
                transcript = %call.transcript,
                elapsed_ms,
                "unresolved"
            ),
            Outcome::TimedOut | Outcome::SystemError => {}
        }
        outcome
    }

    /// Transcribe audio, then resolve each transcript in order until one
    /// resolves. Returns the first transcript's failure when none does.
    pub async fn resolve_audio(&self, audio: &AudioSource, call: &RawUtterance) -> Outcome {
        let Some(transcriber) = &self.transcriber else {
            error!("no transcriber configured");
            return Outcome::SystemError;
        };
        let rules = self.context.snapshot().rules.pipeline.clone();
        let transcription = match transcriber.transcribe(audio).await {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "transcription failed");
                return Outcome::SystemError;
            }
        };
        if transcription.status == rules.transcription_system_error_status {
            error!(status = transcription.status, "transcriber reported a system error");
            return Outcome::SystemError;
        }
        if transcription.status != rules.transcription_ok_status {
            warn!(status = transcription.status, "transcriber returned no speech");
            return Outcome::failed(FailureReason::Silence, AddrType::Unknown);
        }

        let mut first_failure = None;
        for transcript in transcription.transcripts {
            let attempt = RawUtterance {
                transcript,
                ..call.clone()
            };
            match self.resolve(&attempt).await {
                resolved @ Outcome::Resolved(_) => return resolved,
                other => {
                    first_failure.get_or_insert(other);
                }
            }
        }
        first_failure.unwrap_or_else(|| Outcome::failed(FailureReason::Silence, AddrType::Unknown))
    }

    async fn run(&self, ctx: &ResolverContext, raw: &str) -> Result<Outcome, BackendError> {
        if raw.trim().is_empty() {
            return Ok(Outcome::failed(FailureReason::Silence, AddrType::Unknown));
        }
        let text = ctx.normalizer.normalize(raw);
        debug!(raw, normalized = %text, "normalized");
        if text.is_empty() {
            return Ok(Outcome::failed(FailureReason::PassengerIssue, AddrType::Unknown));
        }

        let splitter = self.splitter.as_ref();
        let resolver = Resolver::new(
            self.store.as_ref(),
            splitter,
            &ctx.decomposer,
            &ctx.rules.search,
        );

        // ── Landmark aliases ──
        let alias = ctx.aliases.resolve(&text);
        let text = alias.text;
        if let Some(query) = &alias.landmark {
            match resolver.resolve_landmark(query).await {
                Ok(found) => {
                    let fields = self.fields_of(ctx, &found).await?;
                    return Ok(Outcome::Resolved(format::landmark(fields, &found, Some(query))));
                }
                Err(ResolveError::NotFound) => {
                    debug!(rule = %query.rule_id, "landmark not in store, falling through");
                }
                Err(ResolveError::Backend(e)) => return Err(e),
            }
        }

        if text.chars().count() < ctx.rules.pipeline.min_chars
            && !has_address_unit(&text)
            && alias.landmark.is_none()
        {
            return Ok(Outcome::failed(FailureReason::PassengerIssue, AddrType::Unknown));
        }

        // ── Cross roads ──
        if let Some(pair) = ctx.crossroads.detect(&ctx.decomposer, splitter, &text).await? {
            return Ok(match resolver.locate_cross_road(&pair).await? {
                Some(at) => Outcome::Resolved(format::cross_road(&at, &ctx.rules.dispatch)),
                None => Outcome::failed(FailureReason::Unresolved, AddrType::CrossRoad),
            });
        }

        if let Some(junction) = ctx.crossroads.detect_junction(&text) {
            let base = ctx.decomposer.fragment(splitter, &junction.base).await?;
            if base.road.is_some() {
                let probe = base.with_number(Some(JUNCTION_PROBE.to_string()));
                return Ok(match found(resolver.resolve(&probe, &probe.street(), None, Some(true)).await)? {
                    Some(hit) => {
                        let fields = self.fields_of(ctx, &hit).await?;
                        Outcome::Resolved(format::junction(fields, &junction, &hit, &ctx.rules.dispatch))
                    }
                    None => Outcome::failed(FailureReason::Unresolved, AddrType::Junction),
                });
            }
        }

        // ── House numbers ──
        let Decomposition { address, hold } = ctx.decomposer.decompose(splitter, &text).await?;
        debug!(fields = %address.field_block(), "decomposed");
        if address.number.is_some() {
            let attempts = std::iter::once(&address).chain(hold.iter().filter(|h| **h != address));
            for attempt in attempts {
                let hint = attempt.street();
                if let Some(hit) = found(resolver.resolve(attempt, &hint, None, Some(true)).await)? {
                    let fields = self.fields_of(ctx, &hit).await?;
                    return Ok(Outcome::Resolved(format::house_number(fields, &hit)));
                }
            }
            let ambiguous = address.city.is_none()
                && address
                    .district
                    .as_deref()
                    .is_some_and(|d| ctx.gazetteer.unique_city_for(d).is_none());
            let reason = if ambiguous {
                FailureReason::Ambiguous
            } else {
                FailureReason::Unresolved
            };
            return Ok(Outcome::failed(reason, AddrType::Address));
        }

        // ── Free landmark lookup ──
        let free = resolver
            .resolve(&DecomposedAddress::default(), &text, Some(&text), Some(false))
            .await;
        if let Some(hit) = found(free)? {
            let fields = self.fields_of(ctx, &hit).await?;
            return Ok(Outcome::Resolved(format::landmark(fields, &hit, None)));
        }

        Ok(if alias.landmark.is_some() {
            Outcome::failed(FailureReason::Unresolved, AddrType::Landmark)
        } else if ctx.crossroads.mentions_intersection(&text) {
            Outcome::failed(FailureReason::FakeCrossRoad, AddrType::CrossRoad)
        } else if address.road.is_none() {
            Outcome::failed(FailureReason::MissingRoad, AddrType::Address)
        } else {
            Outcome::failed(FailureReason::MissingNumber, AddrType::Address)
        })
    }

    async fn fields_of(
        &self,
        ctx: &ResolverContext,
        hit: &CandidateAddress,
    ) -> Result<DecomposedAddress, BackendError> {
        ctx.decomposer.fragment(self.splitter.as_ref(), &hit.address).await
    }
}

/// `NotFound` is a branch miss; backend errors propagate.
fn found(result: Result<CandidateAddress, ResolveError>) -> Result<Option<CandidateAddress>, BackendError> {
    match result {
        Ok(hit) => Ok(Some(hit)),
        Err(ResolveError::NotFound) => Ok(None),
        Err(ResolveError::Backend(e)) => Err(e),
    }
}
