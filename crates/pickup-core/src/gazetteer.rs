//! Static list of valid cities, districts, and their pairings.
//!
//! Loaded once at startup (bundled JSON or a file override) and shared
//! read-only across requests. Besides plain membership tests it answers the
//! questions the normalizer and decomposer keep asking:
//!
//! - which city does an unsuffixed short form (`台中`) mean, including the
//!   sibling pairs `新竹市/新竹縣` and `嘉義市/嘉義縣`;
//! - which current municipality replaced a pre-merger county (`台北縣`);
//! - which district a pre-merger township (`板橋市`) became.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

const BUNDLED: &str = include_str!("../data/gazetteer.json");

/// A city or county with its districts/townships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub districts: Vec<String>,
}

/// A pre-merger county folded into a current municipality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyCounty {
    pub old: String,
    pub current: String,
    /// Former townships (`…市/鎮/鄉`) became districts (`…區`).
    #[serde(default)]
    pub township_to_district: bool,
}

#[derive(Deserialize)]
struct GazetteerFile {
    cities: Vec<City>,
    #[serde(default)]
    legacy: Vec<LegacyCounty>,
}

#[derive(Debug, Clone)]
pub struct Gazetteer {
    cities: Vec<City>,
    legacy: Vec<LegacyCounty>,
}

/// Strip the one-character unit suffix (`市`, `縣`, `區`, `鄉`, `鎮`).
///
/// Returns `None` when the remaining stem would be shorter than two
/// characters: single-character stems such as `東` are too ambiguous to
/// match on their own.
pub fn short_form(name: &str) -> Option<&str> {
    let mut chars = name.char_indices();
    let (last, _) = chars.next_back()?;
    let stem = &name[..last];
    if stem.chars().count() >= 2 {
        Some(stem)
    } else {
        None
    }
}

impl Gazetteer {
    /// The gazetteer compiled into the binary.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json(BUNDLED)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: GazetteerFile = serde_json::from_str(json)?;
        let gazetteer = Self {
            cities: file.cities,
            legacy: file.legacy,
        };
        gazetteer.validate()?;
        Ok(gazetteer)
    }

    /// Load a gazetteer override from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let gazetteer = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            cities = gazetteer.cities.len(),
            "loaded gazetteer"
        );
        Ok(gazetteer)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cities.is_empty() {
            return Err(ConfigError::Invalid("gazetteer has no cities".into()));
        }
        for city in &self.cities {
            if !(city.name.ends_with('市') || city.name.ends_with('縣')) {
                return Err(ConfigError::Invalid(format!(
                    "city name must end in 市 or 縣: {}",
                    city.name
                )));
            }
            if let Some(bad) = city.districts.iter().find(|d| d.chars().count() < 2) {
                return Err(ConfigError::Invalid(format!(
                    "district name too short in {}: {bad:?}",
                    city.name
                )));
            }
        }
        for legacy in &self.legacy {
            if !self.is_city(&legacy.current) {
                return Err(ConfigError::Invalid(format!(
                    "legacy county {} maps to unknown city {}",
                    legacy.old, legacy.current
                )));
            }
        }
        Ok(())
    }

    pub fn cities(&self) -> impl Iterator<Item = &City> {
        self.cities.iter()
    }

    pub fn city(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.name == name)
    }

    pub fn is_city(&self, name: &str) -> bool {
        self.city(name).is_some()
    }

    /// Known as a district of any city.
    pub fn is_district(&self, name: &str) -> bool {
        self.cities
            .iter()
            .any(|c| c.districts.iter().any(|d| d == name))
    }

    pub fn contains(&self, city: &str, district: &str) -> bool {
        self.city(city)
            .is_some_and(|c| c.districts.iter().any(|d| d == district))
    }

    pub fn district_count(&self) -> usize {
        self.cities.iter().map(|c| c.districts.len()).sum()
    }

    /// Longest city name (current or legacy) that `text` starts with.
    pub fn city_prefix(&self, text: &str) -> Option<&str> {
        self.cities
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.legacy.iter().map(|l| l.old.as_str()))
            .filter(|name| text.starts_with(name))
            .max_by_key(|name| name.len())
    }

    /// Longest district name that `text` starts with.
    ///
    /// With a known `city` only that city's districts are considered.
    pub fn district_prefix<'a>(&'a self, text: &str, city: Option<&str>) -> Option<&'a str> {
        let scoped = city.and_then(|c| self.city(c));
        let candidates: Box<dyn Iterator<Item = &'a String> + 'a> = match scoped {
            Some(c) => Box::new(c.districts.iter()),
            None => Box::new(self.cities.iter().flat_map(|c| c.districts.iter())),
        };
        candidates
            .map(|d| d.as_str())
            .filter(|d| text.starts_with(d))
            .max_by_key(|d| d.len())
    }

    /// Every city that has a district with this exact name.
    pub fn cities_with_district(&self, district: &str) -> Vec<&str> {
        self.cities
            .iter()
            .filter(|c| c.districts.iter().any(|d| d == district))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// The city implied by a district that exists in exactly one city.
    pub fn unique_city_for(&self, district: &str) -> Option<&str> {
        match self.cities_with_district(district).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Cities whose unsuffixed short form equals `short` (`新竹` → 新竹市, 新竹縣).
    pub fn short_city_candidates(&self, short: &str) -> Vec<&str> {
        self.cities
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| short_form(name) == Some(short))
            .collect()
    }

    /// District of `city` whose short form (`板橋` for `板橋區`) starts `text`.
    pub fn short_district_prefix<'a>(&'a self, text: &str, city: &str) -> Option<&'a str> {
        self.city(city)?
            .districts
            .iter()
            .filter(|d| short_form(d).is_some_and(|s| text.starts_with(s)))
            .max_by_key(|d| d.len())
            .map(|d| d.as_str())
    }

    pub fn legacy_counties(&self) -> &[LegacyCounty] {
        &self.legacy
    }

    /// Current municipality that replaced a pre-merger county name.
    pub fn legacy_current(&self, old: &str) -> Option<&str> {
        self.legacy
            .iter()
            .find(|l| l.old == old)
            .map(|l| l.current.as_str())
    }

    /// The district a former township of `city` became (`板橋市` → `板橋區`).
    pub fn township_to_district(&self, city: &str, township: &str) -> Option<String> {
        if !self
            .legacy
            .iter()
            .any(|l| l.current == city && l.township_to_district)
        {
            return None;
        }
        let stem = township
            .strip_suffix('市')
            .or_else(|| township.strip_suffix('鎮'))
            .or_else(|| township.strip_suffix('鄉'))?;
        let district = format!("{stem}區");
        if self.contains(city, &district) {
            Some(district)
        } else {
            None
        }
    }

    /// A bare pre-merger township name with no current meaning of its own,
    /// mapped to `(city, district)` when exactly one municipality claims it.
    pub fn legacy_township(&self, township: &str) -> Option<(&str, String)> {
        if self.is_city(township) || self.is_district(township) {
            return None;
        }
        let mut found = self
            .legacy
            .iter()
            .filter(|l| l.township_to_district)
            .filter_map(|l| {
                self.township_to_district(&l.current, township)
                    .map(|d| (l.current.as_str(), d))
            });
        let first = found.next()?;
        if found.next().is_some() {
            return None;
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaz() -> Gazetteer {
        Gazetteer::bundled().unwrap()
    }

    #[test]
    fn bundled_counts() {
        let g = gaz();
        assert_eq!(g.cities().count(), 22);
        assert!(g.district_count() > 360);
    }

    #[test]
    fn short_forms() {
        assert_eq!(short_form("台中市"), Some("台中"));
        assert_eq!(short_form("板橋區"), Some("板橋"));
        assert_eq!(short_form("東區"), None);
        assert_eq!(short_form(""), None);
    }

    #[test]
    fn city_prefix_prefers_longest_and_knows_legacy() {
        let g = gaz();
        assert_eq!(g.city_prefix("台中市東區立德街"), Some("台中市"));
        assert_eq!(g.city_prefix("台北縣板橋市"), Some("台北縣"));
        assert_eq!(g.city_prefix("立德街"), None);
    }

    #[test]
    fn district_prefix_scoped_to_city() {
        let g = gaz();
        assert_eq!(g.district_prefix("東區立德街", Some("台中市")), Some("東區"));
        assert_eq!(g.district_prefix("西屯區", Some("台北市")), None);
        assert_eq!(g.district_prefix("西屯區台灣大道", None), Some("西屯區"));
    }

    #[test]
    fn unique_city_lookup() {
        let g = gaz();
        assert_eq!(g.unique_city_for("西屯區"), Some("台中市"));
        assert_eq!(g.unique_city_for("東區"), None);
        assert_eq!(g.cities_with_district("東區").len(), 4);
    }

    #[test]
    fn sibling_cities() {
        let g = gaz();
        let hsinchu = g.short_city_candidates("新竹");
        assert_eq!(hsinchu.len(), 2);
        assert!(hsinchu.contains(&"新竹市") && hsinchu.contains(&"新竹縣"));
        assert_eq!(g.short_city_candidates("台中"), vec!["台中市"]);
        assert!(g.short_city_candidates("火星").is_empty());
    }

    #[test]
    fn legacy_county_and_township() {
        let g = gaz();
        assert_eq!(g.legacy_current("台北縣"), Some("新北市"));
        assert_eq!(
            g.township_to_district("新北市", "板橋市").as_deref(),
            Some("板橋區")
        );
        assert_eq!(
            g.township_to_district("高雄市", "岡山鎮").as_deref(),
            Some("岡山區")
        );
        assert_eq!(g.township_to_district("台北市", "板橋市"), None);
    }

    #[test]
    fn bare_legacy_township() {
        let g = gaz();
        assert_eq!(
            g.legacy_township("板橋市"),
            Some(("新北市", "板橋區".to_string()))
        );
        // Still a real district of 新竹縣.
        assert_eq!(g.legacy_township("竹北市"), None);
        // A current city name is never a township.
        assert_eq!(g.legacy_township("桃園市"), None);
    }

    #[test]
    fn rejects_bad_city_suffix() {
        let json = r#"{"cities":[{"name":"台中","districts":["東區"]}]}"#;
        assert!(matches!(
            Gazetteer::from_json(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Gazetteer::load(Path::new("/nonexistent/gazetteer.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("g.json");
        std::fs::write(
            &path,
            r#"{"cities":[{"name":"台中市","districts":["東區","西屯區"]}]}"#,
        )
        .unwrap();
        let g = Gazetteer::load(&path).unwrap();
        assert_eq!(g.cities().count(), 1);
        assert!(g.contains("台中市", "西屯區"));
    }
}
