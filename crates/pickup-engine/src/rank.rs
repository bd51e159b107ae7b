//! Candidate ranking: an ordered filter/selection over one result set.

use pickup_core::CandidateAddress;
use pickup_core::config::SearchRules;

/// What the caller asked for, as far as ranking is concerned.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankRequest<'a> {
    /// Text used to decide whether excluded categories were asked for.
    pub query_text: &'a str,
    pub has_admin_unit: bool,
    /// Street-only form of the query (`立德街29號`).
    pub only_address: &'a str,
    /// Full literal of the query.
    pub literal: &'a str,
    /// POI name when a landmark was requested.
    pub mark_name: Option<&'a str>,
    /// `Some(false)`: no house number was given, so only landmarks qualify.
    pub numeric_only: Option<bool>,
}

/// Pick the best candidate, or `None` when every one is filtered out.
pub fn pick(
    rules: &SearchRules,
    candidates: Vec<CandidateAddress>,
    req: &RankRequest<'_>,
) -> Option<CandidateAddress> {
    let candidates = filter(rules, candidates, req);
    select(candidates, req)
}

fn filter(
    rules: &SearchRules,
    mut candidates: Vec<CandidateAddress>,
    req: &RankRequest<'_>,
) -> Vec<CandidateAddress> {
    let keep_excluded = rules
        .exclusion_overrides
        .iter()
        .any(|w| !w.is_empty() && req.query_text.contains(w.as_str()));
    if !keep_excluded {
        candidates.retain(|c| {
            !rules
                .excluded_categories
                .iter()
                .any(|x| !x.is_empty() && (c.address.contains(x.as_str()) || c.memo.contains(x.as_str())))
        });
    }

    if req.numeric_only == Some(false) {
        candidates.retain(CandidateAddress::is_landmark);
    }

    if !req.has_admin_unit && candidates.len() > 1 {
        for city in &rules.priority_cities {
            let matched: Vec<CandidateAddress> = candidates
                .iter()
                .filter(|c| in_city(c, city))
                .cloned()
                .collect();
            if !matched.is_empty() {
                return matched;
            }
        }
    }
    candidates
}

fn select(candidates: Vec<CandidateAddress>, req: &RankRequest<'_>) -> Option<CandidateAddress> {
    for wanted in [req.only_address, req.literal] {
        if wanted.is_empty() {
            continue;
        }
        if let Some(c) = candidates.iter().find(|c| c.address.contains(wanted)) {
            return Some(c.clone());
        }
    }
    if let Some(mark) = req.mark_name.filter(|m| !m.is_empty()) {
        let by_memo = candidates
            .iter()
            .filter(|c| c.memo == mark || c.memo.contains(mark))
            .min_by_key(|c| (c.memo != mark, c.memo.chars().count()));
        if let Some(c) = by_memo {
            return Some(c.clone());
        }
    }
    candidates.into_iter().next()
}

fn in_city(c: &CandidateAddress, city: &str) -> bool {
    if c.city.is_empty() {
        c.address.starts_with(city)
    } else {
        c.city == city
    }
}
