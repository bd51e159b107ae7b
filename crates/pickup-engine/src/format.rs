//! Builds the terminal [`ResolutionResult`] and the pipe-delimited dispatch
//! record derived from it.

use pickup_core::config::DispatchRules;
use pickup_core::geo::zone_code;
use pickup_core::{
    CandidateAddress, DecomposedAddress, Point, RawUtterance, ResolutionKind, ResolutionResult,
};
use pickup_nlp::{Junction, LandmarkQuery};

use crate::intersection::Intersection;

pub fn house_number(fields: DecomposedAddress, found: &CandidateAddress) -> ResolutionResult {
    ResolutionResult {
        kind: ResolutionKind::HouseNumber,
        display_address: found.address.clone(),
        secondary_display_address: None,
        fields,
        secondary_fields: None,
        memo: String::new(),
        remark: String::new(),
        lng: found.lng,
        lat: found.lat,
    }
}

/// A POI hit. The display string carries the POI name in parentheses.
pub fn landmark(
    fields: DecomposedAddress,
    found: &CandidateAddress,
    query: Option<&LandmarkQuery>,
) -> ResolutionResult {
    let memo = if found.memo.is_empty() {
        query.map(|q| q.name.clone()).unwrap_or_default()
    } else {
        found.memo.clone()
    };
    let display_address = if memo.is_empty() {
        found.address.clone()
    } else {
        format!("{}({memo})", found.address)
    };
    ResolutionResult {
        kind: ResolutionKind::Landmark,
        display_address,
        secondary_display_address: None,
        fields,
        secondary_fields: None,
        memo,
        remark: query.and_then(|q| q.remark.clone()).unwrap_or_default(),
        lng: found.lng,
        lat: found.lat,
    }
}

/// Roads keep the order they were spoken in.
pub fn cross_road(at: &Intersection, rules: &DispatchRules) -> ResolutionResult {
    let mut primary = at.pair.primary.clone();
    let mut secondary = at.pair.secondary.clone();
    for side in [&mut primary, &mut secondary] {
        if side.city.is_none() {
            side.city = Some(at.city.clone()).filter(|c| !c.is_empty());
        }
    }
    let prefix = [&primary.city, &primary.district]
        .into_iter()
        .flatten()
        .cloned()
        .collect::<String>();
    let a = primary.road_with_section();
    let b = secondary.road_with_section();
    let display_address = format!(
        "{prefix}{}",
        rules.cross_road_display.replace("{a}", &a).replace("{b}", &b)
    );
    ResolutionResult {
        kind: ResolutionKind::CrossRoad,
        display_address,
        secondary_display_address: Some(b),
        fields: primary,
        secondary_fields: Some(secondary),
        memo: String::new(),
        remark: rules.cross_road_remark.clone(),
        lng: at.point.lng,
        lat: at.point.lat,
    }
}

/// A lane or road mouth approximated by the first door on that street.
pub fn junction(
    fields: DecomposedAddress,
    junction: &Junction,
    found: &CandidateAddress,
    rules: &DispatchRules,
) -> ResolutionResult {
    let base = fields.without_number_literal();
    // `立德街10巷` + `巷口` reads `立德街10巷口`, not `立德街10巷巷口`.
    let word = match junction.word.chars().next() {
        Some(unit) if base.ends_with(unit) => &junction.word[unit.len_utf8()..],
        _ => junction.word.as_str(),
    };
    let display_address = format!("{base}{word}");
    ResolutionResult {
        kind: ResolutionKind::JunctionApprox,
        display_address,
        secondary_display_address: None,
        fields: fields.with_number(None),
        secondary_fields: None,
        memo: String::new(),
        remark: rules.junction_remark.replace("{word}", &junction.word),
        lng: found.lng,
        lat: found.lat,
    }
}

/// `<tag>|<name>@<title>|<slot>|<fields>|<remark>|<system>|<lng>|<lat>|<zone>|<display>|<fleet>|<group>|<rule>|`
pub fn dispatch_line(result: &ResolutionResult, call: &RawUtterance, rules: &DispatchRules) -> String {
    let title = if call.passenger_title.is_empty() {
        rules.default_passenger_title.as_str()
    } else {
        call.passenger_title.as_str()
    };
    let fields = match (&result.kind, &result.secondary_fields) {
        (ResolutionKind::CrossRoad, Some(second)) => {
            format!("{}#{}", result.fields.cross_block(), second.cross_block())
        }
        _ => result.fields.field_block(),
    };
    let remark = match result.kind {
        ResolutionKind::Landmark if result.remark.is_empty() => result.memo.as_str(),
        _ => result.remark.as_str(),
    };
    let zone = zone_code(&rules.zones, &rules.grid, Point::new(result.lng, result.lat));
    let group = if call.union_pilot.is_empty() {
        rules.default_group.as_str()
    } else {
        call.union_pilot.as_str()
    };

    let parts = [
        rules.literal_tag.clone(),
        format!("{}@{title}", call.passenger_name),
        rules.address_slot.to_string(),
        fields,
        clean(remark),
        rules.system_tag.clone(),
        format!("{:.6}", result.lng),
        format!("{:.6}", result.lat),
        zone,
        clean(&result.display_address),
        call.fleet_code.clone(),
        group.to_string(),
        rules.rule_for_trunk(&call.trunk_code).to_string(),
    ];
    let mut line = parts.join("|");
    line.push('|');
    line
}

/// Free text must not break the record's field structure.
fn clean(text: &str) -> String {
    text.replace(['|', '\n', '\r'], " ")
}
