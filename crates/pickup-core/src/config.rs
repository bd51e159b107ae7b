//! Static rule configuration: every table the pipeline consults.
//!
//! A default rule set is compiled in (`rules/default.json`); the binary can
//! replace it with a file. Rules are read-only after loading.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::geo::{GeoZone, ZoneGrid};

const BUNDLED: &str = include_str!("../rules/default.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub normalize: NormalizeRules,
    pub alias_groups: Vec<AliasGroup>,
    pub cross_road: CrossRoadRules,
    pub decompose: DecomposeRules,
    pub search: SearchRules,
    pub dispatch: DispatchRules,
    pub pipeline: PipelineRules,
}

// ── Normalizer ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeRules {
    /// Removed when they appear before the first `號`.
    #[serde(default)]
    pub leading_fillers: Vec<String>,
    /// Removed when they appear after the last `號` (or at the end).
    #[serde(default)]
    pub trailing_fillers: Vec<String>,
    /// Self-corrections: text before the last marker is discarded.
    #[serde(default)]
    pub correction_markers: Vec<String>,
    /// Legitimate doubled names that must not collapse as a stutter.
    #[serde(default)]
    pub stutter_denylist: Vec<String>,
    #[serde(default)]
    pub homophones: Vec<HomophoneRule>,
    /// A district short form is left alone when one of these follows it.
    #[serde(default)]
    pub short_form_blockers: Vec<String>,
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_max_passes() -> usize {
    8
}

/// Rewrite `from` to `to` only when a disambiguating keyword co-occurs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomophoneRule {
    pub from: String,
    pub to: String,
    /// At least one must be present; empty means unconditional.
    #[serde(default)]
    pub context: Vec<String>,
    /// None may be present.
    #[serde(default)]
    pub unless: Vec<String>,
}

// ── Landmark aliases ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasGroup {
    pub name: String,
    #[serde(default)]
    pub mode: GroupMode,
    pub rules: Vec<AliasRule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// First satisfied rule wins, the rest of the group is skipped.
    #[default]
    First,
    /// Every satisfied rule applies in order.
    Cumulative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRule {
    pub id: String,
    /// Every substring must be present.
    #[serde(default)]
    pub all: Vec<String>,
    /// At least one substring must be present (ignored when empty).
    #[serde(default)]
    pub any: Vec<String>,
    /// No substring may be present.
    #[serde(default)]
    pub none: Vec<String>,
    #[serde(default)]
    pub unless_flag: Option<String>,
    #[serde(default)]
    pub set_flag: Option<String>,
    pub action: AliasAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AliasAction {
    /// Rewrite the working text in place.
    Replace { from: String, to: String },
    /// A single canonical POI name.
    Exact {
        name: String,
        #[serde(default)]
        remark: Option<String>,
    },
    /// A POI whose name alone is ambiguous: every term must match.
    CompositeAnd {
        name: String,
        terms: Vec<String>,
        #[serde(default)]
        remark: Option<String>,
    },
    /// Spelling variants of one POI: any `stem + suffix` may match.
    OrVariants {
        stem: String,
        suffixes: Vec<String>,
        #[serde(default)]
        remark: Option<String>,
    },
    /// `<brand><location><branch word>` chain-store branches.
    BrandBranch {
        brand: String,
        #[serde(default)]
        aliases: Vec<String>,
        branch_words: Vec<String>,
    },
}

impl AliasAction {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Replace { .. })
    }
}

// ── Cross roads and junctions ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossRoadRules {
    /// Tokens joining two roads (`與`, `和`, `跟`).
    #[serde(default)]
    pub connectives: Vec<String>,
    /// Intersection words that mark a cross road without a connective.
    #[serde(default)]
    pub intersection_keywords: Vec<String>,
    /// Road names that begin with a connective character (`和平`, `和興`).
    #[serde(default)]
    pub connective_road_prefixes: Vec<String>,
    /// Stripped from the end of the second road (`交叉口`, `口`).
    #[serde(default)]
    pub tail_words: Vec<String>,
    /// Alley/lane-mouth words for junction approximations (`巷口`).
    #[serde(default)]
    pub junction_words: Vec<String>,
}

// ── Decomposer adapter ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeRules {
    /// Discourse markers between two house numbers (`搬到`, `隔壁`).
    #[serde(default)]
    pub move_markers: Vec<String>,
    /// A longer section field is re-split to recover a hidden road.
    #[serde(default = "default_section_max_chars")]
    pub section_max_chars: usize,
}

fn default_section_max_chars() -> usize {
    3
}

impl Default for DecomposeRules {
    fn default() -> Self {
        Self {
            move_markers: Vec::new(),
            section_max_chars: default_section_max_chars(),
        }
    }
}

// ── Search cascade ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRules {
    pub limit: usize,
    /// Candidates whose address or memo contains one of these are dropped.
    #[serde(default)]
    pub excluded_categories: Vec<String>,
    /// A query containing one of these keeps excluded categories.
    #[serde(default)]
    pub exclusion_overrides: Vec<String>,
    /// Highest call-volume cities, in priority order.
    #[serde(default)]
    pub priority_cities: Vec<String>,
    /// Road suffix lengths OR-grouped in boolean queries.
    #[serde(default)]
    pub road_tail_lengths: Vec<usize>,
    #[serde(default)]
    pub ngram_windows: Vec<usize>,
    #[serde(default)]
    pub number_probe_offsets: Vec<i32>,
    pub cross_road_max_meters: f64,
}

// ── Dispatch record ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRules {
    pub literal_tag: String,
    pub system_tag: String,
    pub address_slot: u32,
    #[serde(default)]
    pub default_passenger_title: String,
    #[serde(default)]
    pub default_group: String,
    pub default_rule: String,
    /// Dispatch-rule code per trunk code.
    #[serde(default)]
    pub rules_by_trunk: BTreeMap<String, String>,
    pub cross_road_remark: String,
    /// `{word}` is replaced by the junction word (`巷口`).
    pub junction_remark: String,
    /// `{a}` and `{b}` are replaced by the two roads.
    pub cross_road_display: String,
    #[serde(default)]
    pub zones: Vec<GeoZone>,
    #[serde(default)]
    pub grid: ZoneGrid,
}

impl DispatchRules {
    pub fn rule_for_trunk(&self, trunk: &str) -> &str {
        self.rules_by_trunk
            .get(trunk)
            .map(String::as_str)
            .unwrap_or(&self.default_rule)
    }
}

// ── Pipeline ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRules {
    pub deadline_ms: u64,
    /// Shorter text without any address unit is a passenger issue.
    pub min_chars: usize,
    pub transcription_ok_status: i32,
    pub transcription_system_error_status: i32,
}

/// Counts for `pickup rules`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesSummary {
    pub alias_groups: usize,
    pub alias_rules: usize,
    pub terminal_rules: usize,
    pub homophones: usize,
    pub fillers: usize,
    pub connectives: usize,
    pub zones: usize,
    /// `(group name, rule count)` in declared order.
    pub groups: Vec<(String, usize)>,
}

impl RulesConfig {
    /// The rule set compiled into the binary.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json(BUNDLED)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let rules: Self = serde_json::from_str(json)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load a rule file override.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let rules = Self::from_json(&json)?;
        let summary = rules.summary();
        info!(
            path = %path.display(),
            groups = summary.alias_groups,
            rules = summary.alias_rules,
            "loaded rule set"
        );
        Ok(rules)
    }

    /// Reject rule sets the interpreters cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for group in &self.alias_groups {
            for rule in &group.rules {
                if !ids.insert(rule.id.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate alias rule id: {}",
                        rule.id
                    )));
                }
                if rule.all.is_empty() && rule.any.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "alias rule {} has no trigger",
                        rule.id
                    )));
                }
                validate_action(&rule.id, &rule.action)?;
            }
        }
        if let Some(h) = self.normalize.homophones.iter().find(|h| h.from.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "homophone rule with empty source (to {:?})",
                h.to
            )));
        }
        if self.cross_road.connectives.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid("empty cross-road connective".into()));
        }
        let rc = &self.cross_road;
        if let Some(p) = rc
            .connective_road_prefixes
            .iter()
            .find(|p| !rc.connectives.iter().any(|c| p.starts_with(c.as_str()) && *p != c))
        {
            return Err(ConfigError::Invalid(format!(
                "road prefix {p:?} does not start with a connective"
            )));
        }
        if self.search.limit == 0 {
            return Err(ConfigError::Invalid("search limit must be positive".into()));
        }
        if self.search.ngram_windows.iter().any(|&w| w == 0)
            || self.search.road_tail_lengths.iter().any(|&w| w == 0)
        {
            return Err(ConfigError::Invalid("zero-length search window".into()));
        }
        if self.pipeline.deadline_ms == 0 {
            return Err(ConfigError::Invalid("deadline must be positive".into()));
        }
        Ok(())
    }

    pub fn summary(&self) -> RulesSummary {
        let groups: Vec<(String, usize)> = self
            .alias_groups
            .iter()
            .map(|g| (g.name.clone(), g.rules.len()))
            .collect();
        RulesSummary {
            alias_groups: self.alias_groups.len(),
            alias_rules: groups.iter().map(|(_, n)| n).sum(),
            terminal_rules: self
                .alias_groups
                .iter()
                .flat_map(|g| &g.rules)
                .filter(|r| r.action.is_terminal())
                .count(),
            homophones: self.normalize.homophones.len(),
            fillers: self.normalize.leading_fillers.len() + self.normalize.trailing_fillers.len(),
            connectives: self.cross_road.connectives.len(),
            zones: self.dispatch.zones.len(),
            groups,
        }
    }
}

fn validate_action(id: &str, action: &AliasAction) -> Result<(), ConfigError> {
    let invalid = |what: &str| -> Result<(), ConfigError> {
        Err(ConfigError::Invalid(format!("alias rule {id}: {what}")))
    };
    match action {
        AliasAction::Replace { from, .. } if from.is_empty() => invalid("empty replace source"),
        AliasAction::Exact { name, .. } if name.is_empty() => invalid("empty name"),
        AliasAction::CompositeAnd { terms, .. } if terms.iter().all(String::is_empty) => {
            invalid("composite rule without terms")
        }
        AliasAction::OrVariants { stem, suffixes, .. } if stem.is_empty() || suffixes.is_empty() => {
            invalid("or-variant rule needs a stem and suffixes")
        }
        AliasAction::BrandBranch {
            brand,
            branch_words,
            ..
        } if brand.is_empty() || branch_words.is_empty() => {
            invalid("brand rule needs a brand and branch words")
        }
        _ => Ok(()),
    }
}
