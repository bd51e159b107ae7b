//! Builder for `FORMSOF(THESAURUS, …)` boolean expressions.
//!
//! A query is an AND of groups; a group with several terms is rendered as a
//! parenthesised OR. Empty terms are dropped on the way in, so a rendered
//! expression never contains an empty `FORMSOF`.

use pickup_core::DecomposedAddress;

use crate::expr::Expr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanQuery {
    groups: Vec<Vec<String>>,
}

impl BooleanQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required term.
    pub fn and(self, term: impl AsRef<str>) -> Self {
        self.any_of([term])
    }

    /// Add a group of alternatives, at least one of which must match.
    pub fn any_of<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut group: Vec<String> = Vec::new();
        for term in terms {
            let term = sanitize(term.as_ref());
            if !term.is_empty() && !group.contains(&term) {
                group.push(term);
            }
        }
        if !group.is_empty() && !self.groups.contains(&group) {
            self.groups.push(group);
        }
        self
    }

    pub fn from_groups(groups: &[Vec<String>]) -> Self {
        groups.iter().fold(Self::new(), |q, g| q.any_of(g))
    }

    /// Structured address query: city, district, the road's trailing
    /// characters (OR-grouped over `road_tails`), section, lane, alley, number.
    pub fn for_address(addr: &DecomposedAddress, road_tails: &[usize]) -> Self {
        let mut q = Self::new();
        for value in [&addr.city, &addr.district].into_iter().flatten() {
            q = q.and(value);
        }
        if let Some(road) = &addr.road {
            q = q.any_of(road_tails.iter().map(|&n| tail_chars(road, n)));
        }
        for value in [&addr.section, &addr.lane, &addr.alley, &addr.number]
            .into_iter()
            .flatten()
        {
            q = q.and(value);
        }
        q
    }

    /// Every `window`-character slice of `text`, OR-grouped, plus each
    /// `required` term. Empty when `text` is shorter than the window.
    pub fn for_ngrams(text: &str, window: usize, required: &[String]) -> Self {
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if window == 0 || chars.len() < window {
            return Self::new();
        }
        let grams = chars.windows(window).map(|w| w.iter().collect::<String>());
        required.iter().fold(Self::new().any_of(grams), |q, t| q.and(t))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// The wire expression, or `None` when no term was added.
    pub fn render(&self) -> Option<String> {
        if self.groups.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .groups
            .iter()
            .map(|group| match group.as_slice() {
                [single] => formsof(single),
                many => format!(
                    "({})",
                    many.iter().map(|t| formsof(t)).collect::<Vec<_>>().join(" or ")
                ),
            })
            .collect();
        Some(parts.join(" and "))
    }

    /// The same query as an evaluable expression tree.
    pub fn to_expr(&self) -> Option<Expr> {
        let and: Vec<Expr> = self
            .groups
            .iter()
            .map(|g| Expr::any(g.iter().map(|t| Expr::Term(t.clone())).collect()))
            .collect();
        if and.is_empty() {
            None
        } else {
            Some(Expr::all(and))
        }
    }
}

fn formsof(term: &str) -> String {
    format!("FORMSOF(THESAURUS, {term})")
}

/// Characters the grammar cannot carry inside a term.
fn sanitize(term: &str) -> String {
    term.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | ',' | '"'))
        .collect()
}

/// The last `n` characters, or the whole string when it is shorter.
fn tail_chars(s: &str, n: usize) -> &str {
    let len = s.chars().count();
    if n == 0 || len <= n {
        return s;
    }
    s.char_indices().nth(len - n).map_or(s, |(i, _)| &s[i..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickup_core::field;

    #[test]
    fn empty_query_renders_nothing() {
        assert_eq!(BooleanQuery::new().render(), None);
        assert_eq!(BooleanQuery::new().and("").and("  ").render(), None);
    }

    #[test]
    fn and_of_terms() {
        let q = BooleanQuery::new().and("台中市").and("立德街");
        assert_eq!(
            q.render().unwrap(),
            "FORMSOF(THESAURUS, 台中市) and FORMSOF(THESAURUS, 立德街)"
        );
    }

    #[test]
    fn or_group_is_parenthesised() {
        let q = BooleanQuery::new().any_of(["大安分局", "大安警察分局"]);
        assert_eq!(
            q.render().unwrap(),
            "(FORMSOF(THESAURUS, 大安分局) or FORMSOF(THESAURUS, 大安警察分局))"
        );
    }

    #[test]
    fn address_query_groups_road_tails() {
        let addr = DecomposedAddress {
            city: field("台北市"),
            district: field("中山區"),
            road: field("我家中山北路"),
            section: field("二段"),
            number: field("29號"),
            ..Default::default()
        };
        let q = BooleanQuery::for_address(&addr, &[3, 4, 5]);
        assert_eq!(
            q.groups(),
            &[
                vec!["台北市".to_string()],
                vec!["中山區".to_string()],
                vec!["山北路".to_string(), "中山北路".to_string(), "家中山北路".to_string()],
                vec!["二段".to_string()],
                vec!["29號".to_string()],
            ]
        );
    }

    #[test]
    fn short_road_collapses_to_one_term() {
        let addr = DecomposedAddress {
            road: field("立德街"),
            ..Default::default()
        };
        let q = BooleanQuery::for_address(&addr, &[3, 4, 5]);
        assert_eq!(q.render().unwrap(), "FORMSOF(THESAURUS, 立德街)");
    }

    #[test]
    fn ngram_windows() {
        let q = BooleanQuery::for_ngrams("立德街二段", 4, &["29號".to_string()]);
        assert_eq!(
            q.groups(),
            &[
                vec!["立德街二".to_string(), "德街二段".to_string()],
                vec!["29號".to_string()],
            ]
        );
        assert!(BooleanQuery::for_ngrams("立德", 3, &[]).is_empty());
    }

    #[test]
    fn rendered_query_parses_back() {
        let q = BooleanQuery::new()
            .and("台中市")
            .any_of(["德街", "立德街"])
            .and("29號");
        let parsed = Expr::parse(&q.render().unwrap()).unwrap();
        assert_eq!(Some(parsed), q.to_expr());
    }

    #[test]
    fn grammar_characters_are_removed() {
        let q = BooleanQuery::new().and("7-11(台大)");
        assert_eq!(q.render().unwrap(), "FORMSOF(THESAURUS, 7-11台大)");
    }
}
