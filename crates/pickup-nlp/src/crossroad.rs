//! Cross-road and junction detection.
//!
//! A cross road is two roads joined by a connective (`中山路與中正路口`) or
//! named back to back before an intersection keyword (`中山路中正路口`).
//! A junction is a single lane or road mouth (`立德街巷口`) with no house
//! number; it is approximated by the street's first number downstream.

use pickup_core::config::CrossRoadRules;
use pickup_core::{BackendError, DecomposedAddress, Splitter};
use tracing::debug;

use crate::decompose::AddressDecomposer;
use crate::patterns::{NUMBER_TOKEN, char_len, longest_first};

/// Two roads meeting at an intersection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossRoad {
    pub primary: DecomposedAddress,
    pub secondary: DecomposedAddress,
}

impl CrossRoad {
    fn new(primary: &DecomposedAddress, secondary: &DecomposedAddress) -> Self {
        let mut a = road_only(primary);
        let mut b = road_only(secondary);
        if !b.has_admin_unit() {
            b.city.clone_from(&a.city);
            b.district.clone_from(&a.district);
        }
        if !a.has_admin_unit() {
            a.city.clone_from(&b.city);
            a.district.clone_from(&b.district);
        }
        Self {
            primary: a,
            secondary: b,
        }
    }

    /// Different roads, or the same road at different sections.
    pub fn is_valid(&self) -> bool {
        match (&self.primary.road, &self.secondary.road) {
            (Some(a), Some(b)) if a != b => true,
            (Some(_), Some(_)) => self.primary.section != self.secondary.section,
            _ => false,
        }
    }

    /// Same two roads, in either order.
    pub fn same_pair(&self, other: &CrossRoad) -> bool {
        let key = |c: &CrossRoad| {
            let mut k = [c.primary.road_with_section(), c.secondary.road_with_section()];
            k.sort();
            k
        };
        key(self) == key(other)
    }

    /// Progressively looser variants for searching: without district, then
    /// without city, then with a spurious leading character dropped from each
    /// road, then with each road shortened by a swallowed two-character word.
    pub fn degradations(&self) -> Vec<CrossRoad> {
        let mut out = Vec::new();
        let mut current = self.clone();
        if current.primary.district.is_some() || current.secondary.district.is_some() {
            current = current.map(|a| a.without_district());
            out.push(current.clone());
        }
        if current.primary.city.is_some() || current.secondary.city.is_some() {
            current = current.map(|a| a.without_city());
            out.push(current.clone());
        }
        for drop in [1, 2] {
            let shortened = current.map(|a| shorten_road(a, drop));
            if shortened != current && shortened.is_valid() && !out.contains(&shortened) {
                out.push(shortened);
            }
        }
        out
    }

    fn map(&self, f: impl Fn(&DecomposedAddress) -> DecomposedAddress) -> Self {
        Self {
            primary: f(&self.primary),
            secondary: f(&self.secondary),
        }
    }
}

/// A lane, alley, or road mouth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction {
    /// The utterance with the junction word removed.
    pub base: String,
    pub word: String,
}

pub struct CrossRoadDetector {
    connectives: Vec<String>,
    road_prefixes: Vec<String>,
    keywords: Vec<String>,
    tail_words: Vec<String>,
    junction_words: Vec<String>,
}

impl CrossRoadDetector {
    pub fn new(rules: &CrossRoadRules) -> Self {
        Self {
            connectives: non_empty(&rules.connectives),
            road_prefixes: non_empty(&rules.connective_road_prefixes),
            keywords: non_empty(&rules.intersection_keywords),
            tail_words: longest_first(&rules.tail_words),
            junction_words: longest_first(&rules.junction_words),
        }
    }

    pub async fn detect(
        &self,
        decomposer: &AddressDecomposer,
        splitter: &dyn Splitter,
        text: &str,
    ) -> Result<Option<CrossRoad>, BackendError> {
        if !NUMBER_TOKEN.is_match(text) {
            return self.detect_roads(decomposer, splitter, text).await;
        }
        let Some(cleaned) = self.drop_stray_number(text) else {
            return Ok(None);
        };
        let pair = self.detect_roads(decomposer, splitter, &cleaned).await?;
        if pair.is_some() {
            debug!(text, cleaned = %cleaned, "second road recovered past a house number");
        }
        Ok(pair)
    }

    /// `中山路29號中正路口`: a number spoken between two roads ahead of an
    /// intersection word. Returns the text without the number.
    fn drop_stray_number(&self, text: &str) -> Option<String> {
        if !self.mentions_intersection(text) {
            return None;
        }
        let last = NUMBER_TOKEN.find_iter(text).last()?;
        let before = &text[..last.start()];
        let after = self.strip_tail(&text[last.end()..]);
        let names_road = |s: &str| char_len(s) >= 3 && s.ends_with(['路', '街', '道']);
        if !before.contains(['路', '街', '道']) || !names_road(after) {
            return None;
        }
        Some(NUMBER_TOKEN.replace_all(text, "").into_owned())
    }

    /// The connective is really the first character of the road after it.
    fn starts_road_name(&self, connective: &str, right: &str) -> bool {
        self.road_prefixes.iter().any(|p| {
            p.strip_prefix(connective)
                .is_some_and(|rest| !rest.is_empty() && right.starts_with(rest))
        })
    }

    async fn detect_roads(
        &self,
        decomposer: &AddressDecomposer,
        splitter: &dyn Splitter,
        text: &str,
    ) -> Result<Option<CrossRoad>, BackendError> {
        for connective in &self.connectives {
            for (pos, _) in text.match_indices(connective.as_str()) {
                let left = text[..pos].trim();
                let right = self.strip_tail(text[pos + connective.len()..].trim());
                if left.is_empty() || right.is_empty() || self.starts_road_name(connective, right) {
                    continue;
                }
                let l = decomposer.fragment(splitter, left).await?;
                let r = decomposer.fragment(splitter, right).await?;
                let (Some(lr), Some(rr)) = (&l.road, &r.road) else {
                    continue;
                };
                // 和平路: the connective sits inside a road name.
                if char_len(lr) < 2 || char_len(rr) <= 2 {
                    continue;
                }
                let pair = CrossRoad::new(&l, &r);
                if pair.is_valid() {
                    debug!(
                        connective,
                        a = %pair.primary.road_with_section(),
                        b = %pair.secondary.road_with_section(),
                        "cross road by connective"
                    );
                    return Ok(Some(pair));
                }
            }
        }

        if !self.mentions_intersection(text) {
            return Ok(None);
        }
        let body = self.strip_tail(text);
        let d = decomposer.fragment(splitter, body).await?;
        if d.road.is_none() || d.number.is_some() {
            return Ok(None);
        }
        let Some(second) = &d.secondary_road else {
            return Ok(None);
        };
        // 中山路與中山路口 reads as one road followed by `與中山路`.
        let second = self
            .connectives
            .iter()
            .find_map(|c| {
                second
                    .strip_prefix(c.as_str())
                    .filter(|rest| !self.starts_road_name(c, rest))
            })
            .filter(|rest| char_len(rest) > 2)
            .unwrap_or(second);
        let secondary = DecomposedAddress {
            road: Some(second.to_string()),
            section: d.secondary_section.clone(),
            ..Default::default()
        };
        let pair = CrossRoad::new(&d, &secondary);
        if pair.is_valid() {
            debug!(
                a = %pair.primary.road_with_section(),
                b = %pair.secondary.road_with_section(),
                "cross road by keyword"
            );
            return Ok(Some(pair));
        }
        Ok(None)
    }

    /// True when the text names an intersection (`路口`, `交叉口`).
    pub fn mentions_intersection(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// A lane or road mouth without a house number.
    pub fn detect_junction(&self, text: &str) -> Option<Junction> {
        if NUMBER_TOKEN.is_match(text) {
            return None;
        }
        self.junction_words.iter().find_map(|word| {
            let stem = text.strip_suffix(word.as_str())?;
            let unit = word.chars().next()?;
            let base = match unit {
                '路' | '街' => format!("{stem}{unit}"),
                '巷' | '弄' if stem.ends_with(|c: char| c.is_ascii_digit()) => {
                    format!("{stem}{unit}")
                }
                _ => stem.to_string(),
            };
            let has_road = base.contains(['路', '街', '道']);
            (has_road && char_len(&base) >= 2).then(|| Junction {
                base,
                word: word.clone(),
            })
        })
    }

    /// Drop trailing intersection words (`交叉口`, `附近`, `口`).
    pub fn strip_tail<'a>(&self, text: &'a str) -> &'a str {
        let mut s = text.trim_end();
        loop {
            let stripped = self
                .tail_words
                .iter()
                .find_map(|w| s.strip_suffix(w.as_str()))
                .map(str::trim_end);
            match stripped {
                Some(rest) if !rest.is_empty() => s = rest,
                _ => return s,
            }
        }
    }
}

fn non_empty(words: &[String]) -> Vec<String> {
    words.iter().filter(|w| !w.is_empty()).cloned().collect()
}

fn road_only(a: &DecomposedAddress) -> DecomposedAddress {
    DecomposedAddress {
        city: a.city.clone(),
        district: a.district.clone(),
        road: a.road.clone(),
        section: a.section.clone(),
        ..Default::default()
    }
}

fn shorten_road(a: &DecomposedAddress, drop: usize) -> DecomposedAddress {
    let road = a.road.as_deref().and_then(|r| {
        (char_len(r) >= drop + 3)
            .then(|| r.char_indices().nth(drop).map(|(i, _)| r[i..].to_string()))
            .flatten()
    });
    DecomposedAddress {
        road: road.or_else(|| a.road.clone()),
        ..a.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::RuleSplitter;
    use pickup_core::{Gazetteer, RulesConfig};
    use std::sync::Arc;

    struct Fixture {
        detector: CrossRoadDetector,
        decomposer: AddressDecomposer,
        splitter: RuleSplitter,
    }

    impl Fixture {
        fn new() -> Self {
            let gazetteer = Arc::new(Gazetteer::bundled().unwrap());
            let rules = RulesConfig::bundled().unwrap();
            Self {
                detector: CrossRoadDetector::new(&rules.cross_road),
                decomposer: AddressDecomposer::new(&rules.decompose, gazetteer.clone()),
                splitter: RuleSplitter::new(gazetteer),
            }
        }

        async fn detect(&self, text: &str) -> Option<CrossRoad> {
            self.detector
                .detect(&self.decomposer, &self.splitter, text)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn connective_with_tail_word() {
        let f = Fixture::new();
        let c = f.detect("台中市西區五權路與民生路交叉口").await.unwrap();
        assert_eq!(c.primary.city.as_deref(), Some("台中市"));
        assert_eq!(c.primary.district.as_deref(), Some("西區"));
        assert_eq!(c.primary.road.as_deref(), Some("五權路"));
        assert_eq!(c.secondary.road.as_deref(), Some("民生路"));
        assert_eq!(c.secondary.district.as_deref(), Some("西區"));
    }

    #[tokio::test]
    async fn road_mouth_keeps_road_unit() {
        let f = Fixture::new();
        let c = f.detect("中山路和中正路口").await.unwrap();
        assert_eq!(c.secondary.road.as_deref(), Some("中正路"));
    }

    #[tokio::test]
    async fn connective_inside_road_name_is_skipped() {
        let f = Fixture::new();
        assert_eq!(f.detect("和平路口").await, None);
        let c = f.detect("和平東路二段與復興南路口").await.unwrap();
        assert_eq!(c.primary.road.as_deref(), Some("和平東路"));
        assert_eq!(c.primary.section.as_deref(), Some("二段"));
        assert_eq!(c.secondary.road.as_deref(), Some("復興南路"));
    }

    #[tokio::test]
    async fn connective_starting_a_longer_road() {
        let f = Fixture::new();
        let c = f.detect("中山路和平東路口").await.unwrap();
        assert_eq!(c.primary.road.as_deref(), Some("中山路"));
        assert_eq!(c.secondary.road.as_deref(), Some("和平東路"));
        let c = f.detect("復興南路與和平東路口").await.unwrap();
        assert_eq!(c.primary.road.as_deref(), Some("復興南路"));
        assert_eq!(c.secondary.road.as_deref(), Some("和平東路"));
    }

    #[tokio::test]
    async fn number_between_two_roads_before_keyword() {
        let f = Fixture::new();
        let c = f.detect("中山路29號中正路口").await.unwrap();
        assert_eq!(c.primary.road.as_deref(), Some("中山路"));
        assert_eq!(c.secondary.road.as_deref(), Some("中正路"));
        assert_eq!(c.primary.number, None);
        assert_eq!(f.detect("中山路29號路口").await, None);
    }

    #[tokio::test]
    async fn keyword_without_connective() {
        let f = Fixture::new();
        let c = f.detect("中山路中正路口").await.unwrap();
        assert_eq!(c.primary.road.as_deref(), Some("中山路"));
        assert_eq!(c.secondary.road.as_deref(), Some("中正路"));
    }

    #[tokio::test]
    async fn same_road_needs_different_sections() {
        let f = Fixture::new();
        assert_eq!(f.detect("中山路與中山路口").await, None);
        assert!(f.detect("中山路一段與中山路二段交叉口").await.is_some());
    }

    #[tokio::test]
    async fn house_number_is_not_a_cross_road() {
        let f = Fixture::new();
        assert_eq!(f.detect("中山路與中正路29號").await, None);
        assert_eq!(f.detect("台中市東區立德街29號").await, None);
    }

    #[tokio::test]
    async fn detection_is_symmetric() {
        let f = Fixture::new();
        let ab = f.detect("五權路與民生路口").await.unwrap();
        let ba = f.detect("民生路與五權路口").await.unwrap();
        assert!(ab.same_pair(&ba));
    }

    #[test]
    fn lane_mouth_junction() {
        let f = Fixture::new();
        let j = f.detector.detect_junction("台中市東區立德街巷口").unwrap();
        assert_eq!(j.base, "台中市東區立德街");
        assert_eq!(j.word, "巷口");
        let j = f.detector.detect_junction("立德街10巷口").unwrap();
        assert_eq!(j.base, "立德街10巷");
        let j = f.detector.detect_junction("中山路口").unwrap();
        assert_eq!(j.base, "中山路");
        assert_eq!(j.word, "路口");
    }

    #[test]
    fn junction_needs_a_road_and_no_number() {
        let f = Fixture::new();
        assert_eq!(f.detector.detect_junction("巷口"), None);
        assert_eq!(f.detector.detect_junction("立德街29號巷口"), None);
        assert_eq!(f.detector.detect_junction("立德街"), None);
    }

    #[test]
    fn tail_words_strip_longest_first() {
        let f = Fixture::new();
        assert_eq!(f.detector.strip_tail("中正路交叉路口"), "中正路");
        assert_eq!(f.detector.strip_tail("中正路口附近"), "中正路");
        assert_eq!(f.detector.strip_tail("口"), "口");
    }

    #[test]
    fn degradation_order() {
        let pair = CrossRoad {
            primary: DecomposedAddress {
                city: Some("台中市".into()),
                district: Some("東區".into()),
                road: Some("東區立德街".into()),
                ..Default::default()
            },
            secondary: DecomposedAddress {
                city: Some("台中市".into()),
                district: Some("東區".into()),
                road: Some("建成路".into()),
                ..Default::default()
            },
        };
        let steps = pair.degradations();
        assert_eq!(steps[0].primary.district, None);
        assert_eq!(steps[0].primary.city.as_deref(), Some("台中市"));
        assert_eq!(steps[1].primary.city, None);
        assert_eq!(steps[2].primary.road.as_deref(), Some("區立德街"));
        assert_eq!(steps[2].secondary.road.as_deref(), Some("建成路"));
        assert_eq!(steps[3].primary.road.as_deref(), Some("立德街"));
        assert_eq!(steps.len(), 4);
    }

    #[test]
    fn intersection_mentions() {
        let f = Fixture::new();
        assert!(f.detector.mentions_intersection("中山路交叉口"));
        assert!(!f.detector.mentions_intersection("立德街巷口"));
    }
}
