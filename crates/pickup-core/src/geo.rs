//! Coordinate helpers: distances, midpoints, and dispatch geo-zone codes.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 point, longitude first as the dispatch record orders it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lng: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Great-circle distance in metres.
pub fn haversine_meters(a: Point, b: Point) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Arithmetic midpoint; adequate at intersection scale.
pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.lng + b.lng) / 2.0, (a.lat + b.lat) / 2.0)
}

/// A named dispatch zone, matched by bounding box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoZone {
    pub code: String,
    pub min_lng: f64,
    pub max_lng: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl GeoZone {
    pub fn contains(&self, p: Point) -> bool {
        (self.min_lng..=self.max_lng).contains(&p.lng) && (self.min_lat..=self.max_lat).contains(&p.lat)
    }
}

/// Fallback grid for points outside every configured zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneGrid {
    pub origin_lng: f64,
    pub origin_lat: f64,
    pub cell_deg: f64,
}

impl Default for ZoneGrid {
    fn default() -> Self {
        Self {
            origin_lng: 119.3,
            origin_lat: 21.8,
            cell_deg: 0.05,
        }
    }
}

impl ZoneGrid {
    /// `G<row><col>`, each zero-padded to 3 digits.
    pub fn code(&self, p: Point) -> String {
        let cell = if self.cell_deg > 0.0 { self.cell_deg } else { 0.05 };
        let row = ((p.lat - self.origin_lat) / cell).floor().max(0.0) as u32;
        let col = ((p.lng - self.origin_lng) / cell).floor().max(0.0) as u32;
        format!("G{row:03}{col:03}")
    }
}

/// Zone code for a point: first matching zone, else the grid code.
pub fn zone_code(zones: &[GeoZone], grid: &ZoneGrid, p: Point) -> String {
    zones
        .iter()
        .find(|z| z.contains(p))
        .map(|z| z.code.clone())
        .unwrap_or_else(|| grid.code(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // Taipei Main Station to Taipei 101, roughly 4.8 km.
        let station = Point::new(121.5170, 25.0478);
        let tower = Point::new(121.5645, 25.0340);
        let d = haversine_meters(station, tower);
        assert!((4_500.0..5_200.0).contains(&d), "got {d}");
    }

    #[test]
    fn haversine_zero() {
        let p = Point::new(120.68, 24.14);
        assert!(haversine_meters(p, p) < 1e-6);
    }

    #[test]
    fn midpoint_is_average() {
        let m = midpoint(Point::new(120.0, 24.0), Point::new(121.0, 25.0));
        assert_eq!(m, Point::new(120.5, 24.5));
    }

    #[test]
    fn zone_box_wins_over_grid() {
        let zones = vec![GeoZone {
            code: "TC01".into(),
            min_lng: 120.6,
            max_lng: 120.7,
            min_lat: 24.1,
            max_lat: 24.2,
        }];
        let grid = ZoneGrid::default();
        assert_eq!(zone_code(&zones, &grid, Point::new(120.65, 24.15)), "TC01");
        assert!(zone_code(&zones, &grid, Point::new(121.5, 25.0)).starts_with('G'));
    }

    #[test]
    fn grid_code_is_stable() {
        let grid = ZoneGrid::default();
        // (24.15 - 21.8) / 0.05 = 47, (120.65 - 119.3) / 0.05 = 27
        assert_eq!(grid.code(Point::new(120.651, 24.151)), "G047027");
        assert_eq!(grid.code(Point::new(0.0, 0.0)), "G000000");
    }
}
