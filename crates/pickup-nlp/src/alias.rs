//! Landmark alias resolver.
//!
//! Interprets the declarative alias groups from the rules file. Groups run in
//! declared order; a `first` group stops at its first rule that fires, a
//! `cumulative` group applies every rule that fires. Replace actions rewrite
//! the working text for every later rule. Terminal actions produce a
//! [`LandmarkQuery`], and a terminal result from a later group overrides an
//! earlier one.

use std::cmp::Reverse;
use std::collections::HashSet;

use pickup_core::{AliasAction, AliasGroup, AliasRule, GroupMode};
use tracing::{debug, trace};

/// A landmark search derived from an alias rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandmarkQuery {
    pub rule_id: String,
    /// Canonical POI name, shown to the operator.
    pub name: String,
    /// Literal tried first against the store.
    pub literal: String,
    /// Fuzzy fallback: AND across groups, OR within a group.
    pub terms: Vec<Vec<String>>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasOutcome {
    /// Working text after every replace action.
    pub text: String,
    pub landmark: Option<LandmarkQuery>,
}

pub struct AliasResolver {
    groups: Vec<AliasGroup>,
}

impl AliasResolver {
    pub fn new(groups: Vec<AliasGroup>) -> Self {
        Self { groups }
    }

    pub fn rule_count(&self) -> usize {
        self.groups.iter().map(|g| g.rules.len()).sum()
    }

    pub fn resolve(&self, text: &str) -> AliasOutcome {
        let mut text = text.to_string();
        let mut flags: HashSet<&str> = HashSet::new();
        let mut landmark: Option<LandmarkQuery> = None;

        for group in &self.groups {
            for rule in &group.rules {
                if !matches(rule, &text, &flags) {
                    continue;
                }
                let fired = match &rule.action {
                    AliasAction::Replace { from, to } => {
                        text = text.replace(from.as_str(), to);
                        true
                    }
                    action => match terminal(&rule.id, action, &text) {
                        Some(query) => {
                            landmark = Some(query);
                            true
                        }
                        None => false,
                    },
                };
                if !fired {
                    continue;
                }
                trace!(group = %group.name, rule = %rule.id, text, "alias rule fired");
                if let Some(flag) = &rule.set_flag {
                    flags.insert(flag.as_str());
                }
                if group.mode == GroupMode::First {
                    break;
                }
            }
        }

        if let Some(q) = &landmark {
            debug!(rule = %q.rule_id, name = %q.name, "landmark alias resolved");
        }
        AliasOutcome { text, landmark }
    }
}

fn matches(rule: &AliasRule, text: &str, flags: &HashSet<&str>) -> bool {
    rule.all.iter().all(|s| text.contains(s.as_str()))
        && (rule.any.is_empty() || rule.any.iter().any(|s| text.contains(s.as_str())))
        && !rule.none.iter().any(|s| text.contains(s.as_str()))
        && !rule
            .unless_flag
            .as_deref()
            .is_some_and(|f| flags.contains(f))
}

fn terminal(rule_id: &str, action: &AliasAction, text: &str) -> Option<LandmarkQuery> {
    let query = |name: String, terms: Vec<Vec<String>>, remark: &Option<String>| LandmarkQuery {
        rule_id: rule_id.to_string(),
        literal: name.clone(),
        name,
        terms,
        remark: remark.clone(),
    };
    match action {
        AliasAction::Replace { .. } => None,
        AliasAction::Exact { name, remark } => {
            Some(query(name.clone(), vec![vec![name.clone()]], remark))
        }
        AliasAction::CompositeAnd {
            name,
            terms,
            remark,
        } => {
            let groups = terms
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| vec![t.clone()])
                .collect();
            Some(query(name.clone(), groups, remark))
        }
        AliasAction::OrVariants {
            stem,
            suffixes,
            remark,
        } => {
            let variants: Vec<String> = suffixes.iter().map(|s| format!("{stem}{s}")).collect();
            let name = variants.first().cloned().unwrap_or_else(|| stem.clone());
            Some(query(name, vec![variants], remark))
        }
        AliasAction::BrandBranch {
            brand,
            aliases,
            branch_words,
        } => {
            let (location, branch) = brand_branch(brand, aliases, branch_words, text)?;
            let name = format!("{brand}-{location}{branch}");
            Some(query(
                name,
                vec![vec![brand.clone()], vec![location]],
                &None,
            ))
        }
    }
}

/// Locate `<brand><location><branch>` (or `<location><branch>的<brand>`).
///
/// Returns the location and the branch word. Without any branch word the
/// text after the brand is the location and the first branch word is used.
fn brand_branch(
    brand: &str,
    aliases: &[String],
    branch_words: &[String],
    text: &str,
) -> Option<(String, String)> {
    let (start, len) = std::iter::once(brand)
        .chain(aliases.iter().map(String::as_str))
        .filter(|t| !t.is_empty())
        .filter_map(|t| text.find(t).map(|p| (p, t.len())))
        .min_by_key(|&(p, len)| (p, Reverse(len)))?;

    let after = &text[start + len..];
    let after_hit = branch_words
        .iter()
        .filter(|w| !w.is_empty())
        .filter_map(|w| after.find(w.as_str()).map(|p| (p, w)))
        .min_by_key(|&(p, w)| (p, Reverse(w.len())));
    if let Some((p, word)) = after_hit {
        let location = clean_location(&after[..p]);
        if !location.is_empty() {
            return Some((location, word.clone()));
        }
    }

    let before = &text[..start];
    let before_hit = branch_words
        .iter()
        .filter(|w| !w.is_empty())
        .filter_map(|w| before.rfind(w.as_str()).map(|p| (p, w)))
        .max_by_key(|&(p, w)| (p, w.len()));
    if let Some((p, word)) = before_hit {
        let location = clean_location(&before[..p]);
        if !location.is_empty() {
            return Some((location, word.clone()));
        }
    }

    if after_hit.is_none() {
        let location = clean_location(after);
        if !location.is_empty() {
            return Some((location, branch_words.first()?.clone()));
        }
    }
    None
}

fn clean_location(s: &str) -> String {
    s.trim().trim_matches('的').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickup_core::RulesConfig;

    fn bundled() -> AliasResolver {
        AliasResolver::new(RulesConfig::bundled().unwrap().alias_groups)
    }

    fn rule(id: &str, any: &[&str], action: AliasAction) -> AliasRule {
        AliasRule {
            id: id.into(),
            all: vec![],
            any: any.iter().map(|s| s.to_string()).collect(),
            none: vec![],
            unless_flag: None,
            set_flag: None,
            action,
        }
    }

    fn exact(name: &str) -> AliasAction {
        AliasAction::Exact {
            name: name.into(),
            remark: None,
        }
    }

    fn replace(from: &str, to: &str) -> AliasAction {
        AliasAction::Replace {
            from: from.into(),
            to: to.into(),
        }
    }

    #[test]
    fn taipei_main_station_has_boarding_remark() {
        let out = bundled().resolve("台北車站");
        let q = out.landmark.unwrap();
        assert_eq!(q.name, "台北火車站");
        assert_eq!(q.literal, "台北火車站");
        assert_eq!(q.terms, vec![vec!["台北火車站".to_string()]]);
        assert!(q.remark.unwrap().contains("東三門"));
    }

    #[test]
    fn spoken_alias_rewrites_before_landmarks() {
        let out = bundled().resolve("北車");
        assert_eq!(out.text, "台北車站");
        assert_eq!(out.landmark.unwrap().name, "台北火車站");
    }

    #[test]
    fn metro_station_is_distinct() {
        let q = bundled().resolve("捷運台北車站").landmark.unwrap();
        assert_eq!(q.name, "捷運台北車站");
    }

    #[test]
    fn plain_address_is_untouched() {
        let out = bundled().resolve("台中市東區立德街29號");
        assert_eq!(out.text, "台中市東區立德街29號");
        assert_eq!(out.landmark, None);
    }

    #[test]
    fn composite_and_splits_terms() {
        let q = bundled().resolve("台北長庚醫院").landmark.unwrap();
        assert_eq!(q.name, "台北長庚紀念醫院");
        assert_eq!(
            q.terms,
            vec![vec!["台北市".to_string()], vec!["長庚紀念醫院".to_string()]]
        );
    }

    #[test]
    fn or_variants_share_one_group() {
        let q = bundled().resolve("大安分局").landmark.unwrap();
        assert_eq!(q.name, "大安分局");
        assert_eq!(
            q.terms,
            vec![vec!["大安分局".to_string(), "大安警察分局".to_string()]]
        );
    }

    #[test]
    fn brand_then_branch() {
        let q = bundled().resolve("7-11立德門市").landmark.unwrap();
        assert_eq!(q.name, "7-ELEVEN-立德門市");
        assert_eq!(
            q.terms,
            vec![vec!["7-ELEVEN".to_string()], vec!["立德".to_string()]]
        );
    }

    #[test]
    fn branch_then_brand() {
        let q = bundled().resolve("立德門市的7-11").landmark.unwrap();
        assert_eq!(q.name, "7-ELEVEN-立德門市");
    }

    #[test]
    fn brand_alias_without_branch_word() {
        let q = bundled().resolve("全家立德").landmark.unwrap();
        assert_eq!(q.name, "全家便利商店-立德門市");
    }

    #[test]
    fn bare_brand_is_not_a_landmark() {
        assert_eq!(bundled().resolve("全家").landmark, None);
        assert_eq!(bundled().resolve("全家門市").landmark, None);
    }

    #[test]
    fn later_group_overrides_earlier() {
        let out = bundled().resolve("台大醫院對面的7-11台大門市");
        assert_eq!(out.landmark.unwrap().name, "7-ELEVEN-台大門市");
    }

    #[test]
    fn first_mode_stops_at_first_rule() {
        let resolver = AliasResolver::new(vec![AliasGroup {
            name: "g".into(),
            mode: GroupMode::First,
            rules: vec![rule("a", &["甲"], replace("甲", "乙")), rule("b", &["乙"], replace("乙", "丙"))],
        }]);
        assert_eq!(resolver.resolve("甲").text, "乙");
    }

    #[test]
    fn cumulative_mode_chains_rewrites() {
        let resolver = AliasResolver::new(vec![AliasGroup {
            name: "g".into(),
            mode: GroupMode::Cumulative,
            rules: vec![rule("a", &["甲"], replace("甲", "乙")), rule("b", &["乙"], replace("乙", "丙"))],
        }]);
        assert_eq!(resolver.resolve("甲").text, "丙");
    }

    #[test]
    fn flags_suppress_later_rules() {
        let mut setter = rule("set", &["甲"], replace("甲", "乙"));
        setter.set_flag = Some("seen".into());
        let mut guarded = rule("guarded", &["乙"], exact("乙站"));
        guarded.unless_flag = Some("seen".into());
        let resolver = AliasResolver::new(vec![
            AliasGroup {
                name: "rewrite".into(),
                mode: GroupMode::Cumulative,
                rules: vec![setter],
            },
            AliasGroup {
                name: "poi".into(),
                mode: GroupMode::First,
                rules: vec![guarded],
            },
        ]);
        assert_eq!(resolver.resolve("甲").landmark, None);
        assert_eq!(resolver.resolve("乙").landmark.unwrap().name, "乙站");
    }

    #[test]
    fn bundled_rule_count() {
        assert!(bundled().rule_count() >= 100);
    }
}
