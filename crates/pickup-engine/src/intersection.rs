//! Coordinates for a detected cross road.

use std::iter;

use pickup_core::geo::{haversine_meters, midpoint};
use pickup_core::{BackendError, CandidateAddress, DecomposedAddress, Point, SearchRequest};
use pickup_nlp::CrossRoad;
use pickup_store::BooleanQuery;
use tracing::debug;

use crate::cascade::{Resolver, roads_agree};

/// Where two roads meet.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    /// The pair variant that produced the hit (possibly degraded).
    pub pair: CrossRoad,
    pub point: Point,
    pub city: String,
}

impl Resolver<'_> {
    /// Search each road separately and take the midpoint of the closest
    /// same-city pair of records. Degraded variants of the pair are tried in
    /// order when the original finds nothing.
    pub async fn locate_cross_road(
        &self,
        pair: &CrossRoad,
    ) -> Result<Option<Intersection>, BackendError> {
        let max = self.rules.cross_road_max_meters;
        for variant in iter::once(pair.clone()).chain(pair.degradations()) {
            let a = self.road_records(&variant.primary).await?;
            if a.is_empty() {
                continue;
            }
            let b = self.road_records(&variant.secondary).await?;
            if let Some((p, q, distance)) = closest_pair(&a, &b, max) {
                debug!(
                    a = %variant.primary.road_with_section(),
                    b = %variant.secondary.road_with_section(),
                    distance,
                    "intersection located"
                );
                return Ok(Some(Intersection {
                    point: midpoint(point(p), point(q)),
                    city: if p.city.is_empty() { q.city.clone() } else { p.city.clone() },
                    pair: variant,
                }));
            }
        }
        Ok(None)
    }

    async fn road_records(
        &self,
        road: &DecomposedAddress,
    ) -> Result<Vec<CandidateAddress>, BackendError> {
        let Some(name) = road.road.as_deref() else {
            return Ok(Vec::new());
        };
        let Some(expression) =
            BooleanQuery::for_address(road, &self.rules.road_tail_lengths).render()
        else {
            return Ok(Vec::new());
        };
        let found = self
            .store
            .search(&SearchRequest::fuzzy(self.rules.limit, expression))
            .await?;

        let mut kept = Vec::with_capacity(found.len());
        for candidate in found {
            let got = self.decomposer.fragment(self.splitter, &candidate.address).await?;
            let same_road = got.road.as_deref().is_some_and(|r| roads_agree(name, r));
            let same_section = match (&road.section, &got.section) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            };
            if same_road && same_section {
                kept.push(candidate);
            }
        }
        Ok(kept)
    }
}

fn point(c: &CandidateAddress) -> Point {
    Point::new(c.lng, c.lat)
}

fn same_city(a: &CandidateAddress, b: &CandidateAddress) -> bool {
    a.city.is_empty() || b.city.is_empty() || a.city == b.city
}

fn closest_pair<'c>(
    a: &'c [CandidateAddress],
    b: &'c [CandidateAddress],
    max_meters: f64,
) -> Option<(&'c CandidateAddress, &'c CandidateAddress, f64)> {
    a.iter()
        .flat_map(|p| b.iter().map(move |q| (p, q)))
        .filter(|(p, q)| same_city(p, q))
        .map(|(p, q)| (p, q, haversine_meters(point(p), point(q))))
        .filter(|(_, _, d)| *d <= max_meters)
        .min_by(|x, y| x.2.total_cmp(&y.2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fixture, RecordingStore, record};

    async fn detect(f: &Fixture, text: &str) -> CrossRoad {
        f.context
            .crossroads
            .detect(&f.context.decomposer, &f.splitter, text)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn midpoint_of_closest_same_city_pair() {
        let f = Fixture::new();
        let store = RecordingStore::new(vec![
            record("台中市中區中山路1號", "", 120.6795, 24.1405),
            record("台中市中區中正路2號", "", 120.6800, 24.1410),
            record("台南市中西區中正路10號", "", 120.2000, 22.9900),
        ]);
        let pair = detect(&f, "中山路與中正路口").await;
        let found = f.resolver(&store).locate_cross_road(&pair).await.unwrap().unwrap();
        assert_eq!(found.city, "台中市");
        assert!((found.point.lng - 120.67975).abs() < 1e-9);
        assert!((found.point.lat - 24.14075).abs() < 1e-9);
    }

    #[tokio::test]
    async fn distant_roads_do_not_meet() {
        let f = Fixture::new();
        let store = RecordingStore::new(vec![
            record("台中市中區中山路1號", "", 120.6795, 24.1405),
            record("台南市中西區中正路10號", "", 120.2000, 22.9900),
        ]);
        let pair = detect(&f, "中山路與中正路口").await;
        assert!(f.resolver(&store).locate_cross_road(&pair).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn degraded_pair_is_tried_after_the_original() {
        let f = Fixture::new();
        let store = RecordingStore::new(vec![
            record("台中市中區中山路1號", "", 120.6795, 24.1405),
            record("台中市中區中正路2號", "", 120.6800, 24.1410),
        ]);
        // The caller named the wrong district.
        let pair = detect(&f, "台中市北區中山路與中正路口").await;
        let found = f.resolver(&store).locate_cross_road(&pair).await.unwrap().unwrap();
        assert_eq!(found.pair.primary.district, None);
        assert_eq!(found.city, "台中市");
    }

    #[test]
    fn closest_pair_prefers_nearest() {
        let a = vec![record("台中市中區中山路1號", "", 120.6795, 24.1405)];
        let b = vec![
            record("台中市中區中正路90號", "", 120.6830, 24.1440),
            record("台中市中區中正路2號", "", 120.6800, 24.1410),
        ];
        let (_, q, d) = closest_pair(&a, &b, 1_000.0).unwrap();
        assert_eq!(q.address, "台中市中區中正路2號");
        assert!(d < 100.0);
    }
}
