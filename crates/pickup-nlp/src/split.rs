//! Deterministic local splitter.
//!
//! Strips a known city prefix, then a known district prefix, then reads the
//! street units left to right. Nothing else is recognised: an unknown word in
//! front of a road stays inside the road, and the decomposer repairs it.

use std::sync::Arc;

use async_trait::async_trait;
use pickup_core::address::field;
use pickup_core::{BackendError, DecomposedAddress, Gazetteer, Splitter};
use tracing::trace;

use crate::patterns::STREET;

pub struct RuleSplitter {
    gazetteer: Arc<Gazetteer>,
}

impl RuleSplitter {
    pub fn new(gazetteer: Arc<Gazetteer>) -> Self {
        Self { gazetteer }
    }

    /// Synchronous split used by the async trait impl and by tests.
    pub fn split_text(&self, text: &str) -> Option<DecomposedAddress> {
        let mut rest = text.trim();
        if rest.is_empty() {
            return None;
        }

        let city = self.gazetteer.city_prefix(rest).map(str::to_string);
        if let Some(c) = &city {
            rest = &rest[c.len()..];
        }
        let district = self
            .gazetteer
            .district_prefix(rest, city.as_deref())
            .map(str::to_string);
        if let Some(d) = &district {
            rest = &rest[d.len()..];
        }

        let caps = STREET.captures(rest)?;
        let get = |name: &str| caps.name(name).and_then(|m| field(m.as_str()));
        let addr = DecomposedAddress {
            city,
            district,
            road: get("road"),
            section: get("section"),
            lane: get("lane"),
            alley: get("alley"),
            number: get("number"),
            secondary_road: get("road2"),
            secondary_section: get("section2"),
        };

        if addr.is_empty() {
            trace!(text, "splitter found no units");
            return None;
        }
        Some(addr)
    }
}

#[async_trait]
impl Splitter for RuleSplitter {
    async fn split(&self, text: &str) -> Result<Option<DecomposedAddress>, BackendError> {
        Ok(self.split_text(text))
    }
}
