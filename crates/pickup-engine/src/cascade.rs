//! Candidate search and fallback cascade.
//!
//! A query is turned into an ordered plan of search steps, from the most
//! literal to the loosest:
//!
//! 1. literal full address, then without the city
//! 2. boolean AND query, then without district, then without city
//! 3. n-gram windows over the street text (largest window first)
//! 4. neighbouring house numbers (`N-2`, then `N+2`)
//! 5. the base number of a sub-numbered address, with `之N` restored on a hit
//!
//! Steps run strictly in order and the first step that yields a confirmed
//! candidate ends the search. A candidate is confirmed only when its own
//! decomposed house number (and road, where the step constrains it) agrees
//! with what that step searched for.

use pickup_core::config::SearchRules;
use pickup_core::number::numbers_match;
use pickup_core::{
    BackendError, CandidateAddress, DecomposedAddress, HouseNumber, SearchRequest, SearchStore,
    Splitter,
};
use pickup_nlp::{AddressDecomposer, LandmarkQuery};
use pickup_store::BooleanQuery;
use tracing::debug;

use crate::error::ResolveError;
use crate::rank::{self, RankRequest};

/// One search request and what a hit must agree with.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub label: &'static str,
    pub request: SearchRequest,
    pub expect: DecomposedAddress,
    pub check_road: bool,
    /// Full number re-applied to a base-number hit.
    pub restore: Option<String>,
}

impl Step {
    fn literal(label: &'static str, limit: usize, literal: String, expect: &DecomposedAddress) -> Self {
        Self {
            label,
            request: SearchRequest::literal(limit, literal),
            expect: expect.clone(),
            check_road: true,
            restore: None,
        }
    }

    fn boolean(
        label: &'static str,
        limit: usize,
        query: &BooleanQuery,
        expect: &DecomposedAddress,
    ) -> Option<Self> {
        Some(Self {
            label,
            request: SearchRequest::fuzzy(limit, query.render()?),
            expect: expect.clone(),
            check_road: true,
            restore: None,
        })
    }
}

/// Runs search plans against one store. Borrowed per request.
pub struct Resolver<'a> {
    pub(crate) store: &'a dyn SearchStore,
    pub(crate) splitter: &'a dyn Splitter,
    pub(crate) decomposer: &'a AddressDecomposer,
    pub(crate) rules: &'a SearchRules,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a dyn SearchStore,
        splitter: &'a dyn Splitter,
        decomposer: &'a AddressDecomposer,
        rules: &'a SearchRules,
    ) -> Self {
        Self {
            store,
            splitter,
            decomposer,
            rules,
        }
    }

    /// Resolve a decomposed address.
    ///
    /// `literal_hint` is the street-only form preferred by ranking (and the
    /// literal searched when `addr` is empty); `mark_name` asks for a landmark
    /// memo; `numeric_only = Some(false)` accepts landmarks only.
    pub async fn resolve(
        &self,
        addr: &DecomposedAddress,
        literal_hint: &str,
        mark_name: Option<&str>,
        numeric_only: Option<bool>,
    ) -> Result<CandidateAddress, ResolveError> {
        let literal = addr.literal();
        let query_text = if literal.is_empty() { literal_hint } else { &literal };
        let rank = RankRequest {
            query_text,
            has_admin_unit: addr.has_admin_unit(),
            only_address: literal_hint,
            literal: &literal,
            mark_name,
            numeric_only,
        };
        self.run(self.plan(addr, literal_hint), &rank).await
    }

    /// Resolve a landmark: its canonical literal, then its term groups.
    pub async fn resolve_landmark(
        &self,
        query: &LandmarkQuery,
    ) -> Result<CandidateAddress, ResolveError> {
        let none = DecomposedAddress::default();
        let limit = self.rules.limit;
        let mut steps = vec![Step::literal("landmark_literal", limit, query.literal.clone(), &none)];
        steps.extend(Step::boolean(
            "landmark_terms",
            limit,
            &BooleanQuery::from_groups(&query.terms),
            &none,
        ));
        let rank = RankRequest {
            query_text: &query.name,
            has_admin_unit: false,
            only_address: "",
            literal: "",
            mark_name: Some(query.name.as_str()),
            numeric_only: Some(false),
        };
        self.run(steps, &rank).await
    }

    pub(crate) fn plan(&self, addr: &DecomposedAddress, literal_hint: &str) -> Vec<Step> {
        let limit = self.rules.limit;
        let tails = &self.rules.road_tail_lengths;
        let mut steps: Vec<Step> = Vec::new();
        let mut push = |step: Step| {
            if !steps.iter().any(|s| s.request == step.request) {
                steps.push(step);
            }
        };

        let full = if addr.is_empty() {
            literal_hint.to_string()
        } else {
            addr.literal()
        };
        if !full.is_empty() {
            push(Step::literal("literal", limit, full, addr));
        }
        if addr.city.is_some() {
            push(Step::literal(
                "literal_without_city",
                limit,
                addr.without_city().literal(),
                addr,
            ));
        }

        if addr.road.is_some() {
            let relaxed = [
                ("boolean", addr.clone()),
                ("boolean_without_district", addr.without_district()),
                ("boolean_without_city", addr.without_district().without_city()),
            ];
            for (label, variant) in relaxed {
                let query = BooleanQuery::for_address(&variant, tails);
                if let Some(step) = Step::boolean(label, limit, &query, addr) {
                    push(step);
                }
            }

            let street = addr.with_number(None).street();
            let required: Vec<String> = addr.number.iter().cloned().collect();
            for &window in &self.rules.ngram_windows {
                let query = BooleanQuery::for_ngrams(&street, window, &required);
                if let Some(mut step) = Step::boolean("ngram", limit, &query, addr) {
                    step.check_road = false;
                    push(step);
                }
            }
        }

        // Free text (a POI name with trailing words) is matched by its windows.
        if addr.road.is_none() && addr.number.is_none() && !literal_hint.is_empty() {
            for &window in &self.rules.ngram_windows {
                let query = BooleanQuery::for_ngrams(literal_hint, window, &[]);
                if let Some(mut step) = Step::boolean("ngram", limit, &query, addr) {
                    step.check_road = false;
                    push(step);
                }
            }
        }

        if let Some(number) = addr.number.as_deref().and_then(HouseNumber::parse) {
            for &delta in &self.rules.number_probe_offsets {
                let Some(probe) = number.offset(delta) else {
                    continue;
                };
                let probe = addr.with_number(Some(probe.to_string()));
                let query = BooleanQuery::for_address(&probe, tails);
                if let Some(step) = Step::boolean("number_probe", limit, &query, &probe) {
                    push(step);
                }
            }

            if number.sub.is_some() {
                let base = addr.with_number(Some(number.without_sub().to_string()));
                let restore = Some(number.to_string());
                let mut literal = Step::literal("sub_number_base", limit, base.literal(), &base);
                literal.restore.clone_from(&restore);
                push(literal);
                let query = BooleanQuery::for_address(&base, tails);
                if let Some(mut step) = Step::boolean("sub_number_base", limit, &query, &base) {
                    step.restore = restore;
                    push(step);
                }
            }
        }
        steps
    }

    async fn run(
        &self,
        steps: Vec<Step>,
        rank: &RankRequest<'_>,
    ) -> Result<CandidateAddress, ResolveError> {
        for step in &steps {
            if let Some(found) = self.run_step(step, rank).await? {
                debug!(step = step.label, address = %found.address, "cascade resolved");
                return Ok(found);
            }
        }
        debug!(steps = steps.len(), "cascade exhausted");
        Err(ResolveError::NotFound)
    }

    async fn run_step(
        &self,
        step: &Step,
        rank: &RankRequest<'_>,
    ) -> Result<Option<CandidateAddress>, BackendError> {
        let found = self.store.search(&step.request).await?;
        debug!(
            step = step.label,
            literal = %step.request.literal,
            expression = step.request.expression.as_deref().unwrap_or(""),
            returned = found.len(),
            "search step"
        );

        let mut confirmed = Vec::with_capacity(found.len());
        for candidate in found {
            if self.confirms(&candidate, step).await? {
                confirmed.push(candidate);
            }
        }
        Ok(rank::pick(self.rules, confirmed, rank).map(|c| restore_sub_number(c, step)))
    }

    async fn confirms(
        &self,
        candidate: &CandidateAddress,
        step: &Step,
    ) -> Result<bool, BackendError> {
        let expect = &step.expect;
        let road_checked = step.check_road && expect.road.is_some();
        if expect.number.is_none() && !road_checked {
            return Ok(true);
        }

        let got = self.decomposer.fragment(self.splitter, &candidate.address).await?;
        if let Some(number) = &expect.number {
            let same = got.number.as_deref().is_some_and(|n| numbers_match(number, n));
            if !same {
                return Ok(false);
            }
        }
        if road_checked
            && let Some(road) = &expect.road
        {
            if !got.road.as_deref().is_some_and(|r| roads_agree(road, r)) {
                return Ok(false);
            }
            if let (Some(a), Some(b)) = (&expect.section, &got.section)
                && a != b
            {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Equal roads, or one the tail of the other (`家中山北路` / `中山北路`).
pub(crate) fn roads_agree(a: &str, b: &str) -> bool {
    let shorter = a.chars().count().min(b.chars().count());
    a == b || (shorter >= 2 && (a.ends_with(b) || b.ends_with(a)))
}

fn restore_sub_number(mut candidate: CandidateAddress, step: &Step) -> CandidateAddress {
    if let (Some(full), Some(base)) = (&step.restore, &step.expect.number)
        && let Some(pos) = candidate.address.rfind(base.as_str())
    {
        candidate
            .address
            .replace_range(pos..pos + base.len(), full);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fixture, RecordingStore, record};
    use pickup_core::field;

    fn sub_numbered() -> DecomposedAddress {
        DecomposedAddress {
            city: field("台中市"),
            district: field("西屯區"),
            road: field("台灣大道"),
            section: field("三段"),
            number: field("99之1號"),
            ..Default::default()
        }
    }

    #[test]
    fn plan_order() {
        let f = Fixture::new();
        let store = RecordingStore::empty();
        let resolver = f.resolver(&store);
        let labels: Vec<&str> = resolver
            .plan(&sub_numbered(), "台灣大道三段99之1號")
            .iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "literal",
                "literal_without_city",
                "boolean",
                "boolean_without_district",
                "boolean_without_city",
                "ngram",
                "ngram",
                "ngram",
                "ngram",
                "number_probe",
                "number_probe",
                "sub_number_base",
                "sub_number_base",
            ]
        );
    }

    #[test]
    fn plan_probes_neighbours_in_order() {
        let f = Fixture::new();
        let store = RecordingStore::empty();
        let resolver = f.resolver(&store);
        let steps = resolver.plan(&sub_numbered(), "");
        let probes: Vec<&str> = steps
            .iter()
            .filter(|s| s.label == "number_probe")
            .filter_map(|s| s.expect.number.as_deref())
            .collect();
        assert_eq!(probes, vec!["97號", "101號"]);
        let ngram_windows: Vec<usize> = steps
            .iter()
            .filter(|s| s.label == "ngram")
            .map(|s| s.request.expression.as_deref().unwrap_or("").matches("FORMSOF").count())
            .collect();
        // 台灣大道三段 has 1, 2, 3, 4 windows of size 6, 5, 4, 3, plus the number.
        assert_eq!(ngram_windows, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn steps_run_in_plan_order_until_exhausted() {
        let f = Fixture::new();
        let store = RecordingStore::empty();
        let resolver = f.resolver(&store);
        let addr = sub_numbered();
        let err = resolver
            .resolve(&addr, "台灣大道三段99之1號", None, Some(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));

        let planned: Vec<SearchRequest> = resolver
            .plan(&addr, "台灣大道三段99之1號")
            .into_iter()
            .map(|s| s.request)
            .collect();
        assert_eq!(store.requests(), planned);
    }

    #[tokio::test]
    async fn later_steps_skipped_after_a_hit() {
        let f = Fixture::new();
        // No district on file: only the relaxed boolean step can see it.
        let store = RecordingStore::new(vec![record("台中市立德街29號", "", 120.6868, 24.1375)]);
        let resolver = f.resolver(&store);
        let addr = DecomposedAddress {
            city: field("台中市"),
            district: field("東區"),
            road: field("立德街"),
            number: field("29號"),
            ..Default::default()
        };
        let found = resolver.resolve(&addr, "立德街29號", None, Some(true)).await.unwrap();
        assert_eq!(found.address, "台中市立德街29號");
        let kinds: Vec<&str> = store
            .requests()
            .iter()
            .map(|r| if r.expression.is_some() { "boolean" } else { "literal" })
            .collect();
        assert_eq!(kinds, vec!["literal", "literal", "boolean", "boolean"]);
    }

    #[tokio::test]
    async fn wrong_number_is_never_accepted() {
        let f = Fixture::new();
        // Every boolean term matches (`129號` contains `29號`).
        let store = RecordingStore::new(vec![record("台中市東區立德街129號", "", 120.6868, 24.1375)]);
        let resolver = f.resolver(&store);
        let addr = DecomposedAddress {
            city: field("台中市"),
            district: field("東區"),
            road: field("立德街"),
            number: field("29號"),
            ..Default::default()
        };
        let result = resolver.resolve(&addr, "立德街29號", None, Some(true)).await;
        assert!(matches!(result, Err(ResolveError::NotFound)));
    }

    #[tokio::test]
    async fn neighbour_probe_finds_adjacent_door() {
        let f = Fixture::new();
        let store = RecordingStore::new(vec![record("台中市東區立德街31號", "", 120.6869, 24.1376)]);
        let resolver = f.resolver(&store);
        let addr = DecomposedAddress {
            city: field("台中市"),
            district: field("東區"),
            road: field("立德街"),
            number: field("33號"),
            ..Default::default()
        };
        let found = resolver.resolve(&addr, "立德街33號", None, Some(true)).await.unwrap();
        assert_eq!(found.address, "台中市東區立德街31號");
    }

    #[tokio::test]
    async fn sub_number_is_restored_on_base_hit() {
        let f = Fixture::new();
        let store = RecordingStore::new(vec![record("台中市東區立德街29號", "", 120.6868, 24.1375)]);
        let resolver = f.resolver(&store);
        let addr = DecomposedAddress {
            city: field("台中市"),
            district: field("東區"),
            road: field("立德街"),
            number: field("29之3號"),
            ..Default::default()
        };
        let found = resolver.resolve(&addr, "立德街29之3號", None, Some(true)).await.unwrap();
        assert_eq!(found.address, "台中市東區立德街29之3號");
    }

    #[tokio::test]
    async fn landmark_requires_memo() {
        let f = Fixture::new();
        let store = RecordingStore::new(vec![
            record("台北市中正區北平西路3號", "", 121.5170, 25.0478),
            record("台北市中正區北平西路3號", "台北火車站", 121.5170, 25.0478),
        ]);
        let resolver = f.resolver(&store);
        let query = f.context.aliases.resolve("台北車站").landmark.unwrap();
        let found = resolver.resolve_landmark(&query).await.unwrap();
        assert_eq!(found.memo, "台北火車站");
    }

    #[tokio::test]
    async fn free_text_falls_back_to_windows() {
        let f = Fixture::new();
        let store = RecordingStore::new(vec![record("台中市北區三民路三段161號", "中友百貨", 120.6850, 24.1520)]);
        let resolver = f.resolver(&store);
        let none = DecomposedAddress::default();
        let labels: Vec<&str> = resolver
            .plan(&none, "中友百貨公司")
            .iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(labels, vec!["literal", "ngram", "ngram", "ngram", "ngram"]);

        let found = resolver
            .resolve(&none, "中友百貨公司", Some("中友百貨公司"), Some(false))
            .await
            .unwrap();
        assert_eq!(found.memo, "中友百貨");
    }

    #[test]
    fn road_agreement() {
        assert!(roads_agree("立德街", "立德街"));
        assert!(roads_agree("家中山北路", "中山北路"));
        assert!(!roads_agree("中山路", "中正路"));
        assert!(!roads_agree("路", "中山路"));
    }
}
