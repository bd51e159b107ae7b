//! Address decomposer adapter.
//!
//! Wraps a [`Splitter`] and repairs the ways its output goes wrong:
//!
//! - administrative units left inside the road (`我家東區立德街`), because a
//!   splitter only strips known prefixes;
//! - a road or lane hiding in the number field, or a road hiding in an
//!   overlong section field;
//! - pre-merger county/township names and sibling city/county mix-ups;
//! - two spoken house numbers, where the later one wins and the earlier one
//!   is held back as a fallback.
//!
//! [`AddressDecomposer::repair`] is idempotent: repairing its own output
//! changes nothing.

use std::sync::Arc;

use pickup_core::address::field;
use pickup_core::config::DecomposeRules;
use pickup_core::gazetteer::short_form;
use pickup_core::number::{arabic_to_chinese, chinese_to_arabic, is_chinese_numeral, is_clean_number};
use pickup_core::{BackendError, DecomposedAddress, Gazetteer, Splitter};
use tracing::debug;

use crate::patterns::{NUMBER_TOKEN, SECTION_TOKEN, char_len};

/// Decomposition of one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposition {
    pub address: DecomposedAddress,
    /// The earlier of two spoken house numbers. Searched only when the later
    /// number finds nothing.
    pub hold: Option<DecomposedAddress>,
}

pub struct AddressDecomposer {
    gazetteer: Arc<Gazetteer>,
    move_markers: Vec<String>,
    section_max_chars: usize,
}

impl AddressDecomposer {
    pub fn new(rules: &DecomposeRules, gazetteer: Arc<Gazetteer>) -> Self {
        Self {
            gazetteer,
            move_markers: rules
                .move_markers
                .iter()
                .filter(|m| !m.is_empty())
                .cloned()
                .collect(),
            section_max_chars: rules.section_max_chars.max(2),
        }
    }

    /// Decompose a whole utterance, reconciling two house numbers.
    pub async fn decompose(
        &self,
        splitter: &dyn Splitter,
        text: &str,
    ) -> Result<Decomposition, BackendError> {
        let tokens: Vec<_> = NUMBER_TOKEN.find_iter(text).collect();
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return Ok(Decomposition {
                address: self.fragment(splitter, text).await?,
                hold: None,
            });
        };
        if first.as_str() == last.as_str() {
            return Ok(Decomposition {
                address: self.fragment(splitter, text).await?,
                hold: None,
            });
        }

        let between = &text[first.end()..last.start()];
        let moved = self.move_markers.iter().any(|m| between.contains(m.as_str()));
        let street_between = self
            .move_markers
            .iter()
            .fold(between.to_string(), |s, m| s.replace(m.as_str(), ""));
        let later_text = if street_between.contains(['路', '街', '道', '段', '巷', '弄']) {
            format!("{street_between}{}", last.as_str())
        } else {
            last.as_str().to_string()
        };

        let mut earlier = self.fragment(splitter, &text[..first.end()]).await?;
        let mut later = self.fragment(splitter, &later_text).await?;
        if later.road.is_none() {
            later.fill_from(&earlier);
        } else {
            fill_admin(&mut later, &earlier);
        }
        fill_admin(&mut earlier, &later);

        debug!(
            earlier = earlier.number.as_deref().unwrap_or(""),
            later = later.number.as_deref().unwrap_or(""),
            moved,
            "two house numbers in utterance"
        );
        Ok(Decomposition {
            address: later,
            hold: if moved { None } else { Some(earlier) },
        })
    }

    /// Split one fragment and repair the result. Never fails on unrecognised
    /// text: an empty address comes back instead.
    pub async fn fragment(
        &self,
        splitter: &dyn Splitter,
        text: &str,
    ) -> Result<DecomposedAddress, BackendError> {
        let split = splitter.split(text).await?.unwrap_or_default();
        self.repair(splitter, split).await
    }

    pub async fn repair(
        &self,
        splitter: &dyn Splitter,
        addr: DecomposedAddress,
    ) -> Result<DecomposedAddress, BackendError> {
        let mut addr = canonical_fields(addr);

        if let Some(number) = addr.number.clone()
            && !is_clean_number(&number)
        {
            let recovered = canonical_fields(splitter.split(&number).await?.unwrap_or_default());
            debug!(number, recovered = ?recovered.road, "re-split number field");
            addr.number = recovered.number.clone();
            merge_street(&mut addr, recovered);
        }

        if let Some(section) = addr.section.clone()
            && char_len(&section) > self.section_max_chars
        {
            let leading = SECTION_TOKEN
                .find(&section)
                .filter(|m| m.start() == 0)
                .map(|m| m.as_str().to_string());
            let remainder = &section[leading.as_ref().map_or(0, String::len)..];
            let recovered = canonical_fields(splitter.split(remainder).await?.unwrap_or_default());
            if recovered.road.is_some() {
                debug!(section, recovered = ?recovered.road, "re-split section field");
                addr.section = leading;
                if addr.road.is_none() {
                    addr.road = recovered.road.clone();
                    addr.section = recovered.section.clone().or(addr.section.take());
                    fill_street_tail(&mut addr, &recovered);
                } else {
                    merge_street(&mut addr, recovered);
                }
            }
        }

        self.extract_embedded_units(&mut addr);
        self.modernize(&mut addr);
        self.settle_city(&mut addr);
        Ok(addr)
    }

    /// Pull city/district tokens out of the road field.
    fn extract_embedded_units(&self, addr: &mut DecomposedAddress) {
        let Some(road) = addr.road.clone() else {
            return;
        };
        let g = &*self.gazetteer;
        let mut city: Option<&str> = None;
        let mut district: Option<&str> = None;
        let mut cut = 0;
        for (pos, _) in road.char_indices() {
            if pos < cut {
                continue;
            }
            let tail = &road[pos..];
            if let Some(c) = g.city_prefix(tail) {
                city = Some(c);
                cut = pos + c.len();
            } else if let Some(d) = g.district_prefix(tail, None) {
                district = Some(d);
                cut = pos + d.len();
            }
        }
        if cut == 0 {
            return;
        }
        let street = &road[cut..];
        if char_len(street) < 2 || !street.ends_with(['路', '街', '道']) {
            return;
        }
        debug!(road, street, "extracted units embedded in road");
        if addr.city.is_none() {
            addr.city = city.map(str::to_string);
        }
        if addr.district.is_none() {
            addr.district = district.map(str::to_string);
        }
        addr.road = Some(street.to_string());
    }

    /// Legacy county and township names to their current forms.
    fn modernize(&self, addr: &mut DecomposedAddress) {
        let g = &*self.gazetteer;
        if let Some(current) = addr.city.as_deref().and_then(|c| g.legacy_current(c)) {
            addr.city = Some(current.to_string());
        }
        if let (Some(city), Some(district)) = (addr.city.as_deref(), addr.district.as_deref())
            && !g.contains(city, district)
            && let Some(d) = g.township_to_district(city, district)
        {
            addr.district = Some(d);
        }
        // 板橋市文化路 left whole in the road after a legacy county.
        if addr.district.is_none()
            && let (Some(city), Some(road)) = (addr.city.clone(), addr.road.clone())
        {
            for n in 3..=5 {
                let Some((end, _)) = road.char_indices().nth(n) else {
                    break;
                };
                if let Some(d) = g.township_to_district(&city, &road[..end]) {
                    addr.district = Some(d);
                    addr.road = Some(road[end..].to_string());
                    break;
                }
            }
        }
    }

    /// A district implies its city; a district outside its city moves to
    /// the sibling city/county of the same name.
    fn settle_city(&self, addr: &mut DecomposedAddress) {
        let g = &*self.gazetteer;
        match (addr.city.as_deref(), addr.district.as_deref()) {
            (None, Some(d)) => {
                addr.city = g.unique_city_for(d).map(str::to_string);
            }
            (Some(c), Some(d)) if !g.contains(c, d) => {
                let sibling = short_form(c).and_then(|short| {
                    g.short_city_candidates(short)
                        .into_iter()
                        .find(|s| g.contains(s, d))
                });
                if let Some(s) = sibling {
                    addr.city = Some(s.to_string());
                }
            }
            _ => {}
        }
    }
}

/// Canonical unit forms: `2段` → `二段`, `10` → `10巷`, `二十九號` → `29號`.
fn canonical_fields(addr: DecomposedAddress) -> DecomposedAddress {
    let clean = |v: Option<String>| v.and_then(|s| field(s.replace('臺', "台")));
    DecomposedAddress {
        city: clean(addr.city),
        district: clean(addr.district),
        road: clean(addr.road),
        section: clean(addr.section).map(canonical_section),
        lane: clean(addr.lane).map(|l| with_unit(l, '巷')),
        alley: clean(addr.alley).map(|a| with_unit(a, '弄')),
        number: clean(addr.number).map(canonical_number),
        secondary_road: clean(addr.secondary_road),
        secondary_section: clean(addr.secondary_section).map(canonical_section),
    }
}

fn canonical_section(section: String) -> String {
    let stem = section.strip_suffix('段').unwrap_or(&section);
    if let Ok(n) = stem.parse::<u32>()
        && let Some(chinese) = arabic_to_chinese(n)
    {
        return format!("{chinese}段");
    }
    if !stem.is_empty() && stem.chars().all(is_chinese_numeral) && !section.ends_with('段') {
        return format!("{stem}段");
    }
    section
}

fn with_unit(value: String, unit: char) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        format!("{value}{unit}")
    } else {
        value
    }
}

fn canonical_number(number: String) -> String {
    let stem = number.strip_suffix('號').unwrap_or(&number);
    if !stem.is_empty() && stem.chars().all(is_chinese_numeral)
        && let Some(n) = chinese_to_arabic(stem)
    {
        return format!("{n}號");
    }
    if is_clean_number(stem) && !stem.contains('號') && stem.chars().any(|c| c.is_ascii_digit()) {
        return format!("{stem}號");
    }
    number
}

/// Fill street fields from a re-split fragment. A second, different road
/// becomes the secondary road.
fn merge_street(addr: &mut DecomposedAddress, recovered: DecomposedAddress) {
    match (&addr.road, &recovered.road) {
        (None, Some(_)) => {
            addr.road = recovered.road.clone();
            if addr.section.is_none() {
                addr.section = recovered.section.clone();
            }
        }
        (Some(road), Some(other)) if road != other && addr.secondary_road.is_none() => {
            addr.secondary_road = recovered.road.clone();
            addr.secondary_section = recovered.section.clone();
        }
        _ => {}
    }
    fill_street_tail(addr, &recovered);
}

fn fill_street_tail(addr: &mut DecomposedAddress, recovered: &DecomposedAddress) {
    if addr.lane.is_none() {
        addr.lane.clone_from(&recovered.lane);
    }
    if addr.alley.is_none() {
        addr.alley.clone_from(&recovered.alley);
    }
    if addr.number.is_none() {
        addr.number.clone_from(&recovered.number);
    }
}

fn fill_admin(addr: &mut DecomposedAddress, from: &DecomposedAddress) {
    if addr.city.is_none() {
        addr.city.clone_from(&from.city);
    }
    if addr.district.is_none() {
        addr.district.clone_from(&from.district);
    }
}
