//! Utterance normalizer.
//!
//! Turns a raw transcript into the working text every later stage reads.
//! Characters are canonicalised once, then a fixed sequence of rewrites runs
//! until the text stops changing:
//!
//! 1. whitespace collapse (a pause inside a number keeps the later fragment)
//! 2. unit canonicalisation (numerals, `之`, sections, floors, bare digits)
//! 3. self-corrections (`不對`, `我是說`)
//! 4. leading/trailing filler removal
//! 5. stutter collapse and duplicate number/section collapse
//! 6. context-keyed homophone correction
//! 7. administrative-unit completion (legacy names, short forms)
//!
//! Running to a fixpoint is what makes `normalize` idempotent.

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use pickup_core::config::{HomophoneRule, NormalizeRules};
use pickup_core::gazetteer::short_form;
use pickup_core::number::{arabic_to_chinese, chinese_to_arabic};
use pickup_core::Gazetteer;
use regex::{Captures, Regex};
use tracing::debug;

use crate::patterns::{BARE_NUMBER, NUMBER_TOKEN, char_len, longest_first};

static SPLIT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s+(\d)").expect("split number regex"));

static NUMERAL_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([零〇○一二兩三四五六七八九十百千]+)(號|巷|弄|樓)").expect("numeral unit regex")
});

static NUMERAL_SUB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)之([一二三四五六七八九十]+)").expect("numeral sub regex"));

static SUB_AFTER_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)號之(\d+)").expect("sub after unit regex"));

static HYPHEN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)-(\d+)號").expect("hyphen number regex"));

static HYPHEN_AFTER_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([路街道段巷弄])(\d+)-(\d+)").expect("hyphen unit regex"));

static SECTION_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)段").expect("section digits regex"));

static FLOOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"號(?:(?:地下|B)?\d+(?:樓|F)(?:之\d+)?|B\d+)").expect("floor regex")
});

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([路街道段巷弄])(\d+(?:之\d+)?)$").expect("trailing digits regex"));

static REPEATED_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"號{2,}|段{2,}").expect("repeated unit regex"));

static SECTION_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[一二三四五六七八九十]+段){2,}").expect("section run regex")
});

static LAST_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[一二三四五六七八九十]+段$").expect("last section regex"));

/// Characters that turn a preceding `…市` into an ordinary word (`市場`).
const CITY_WORD_FOLLOWERS: [char; 8] = ['場', '集', '區', '民', '政', '長', '內', '立'];

pub struct Normalizer {
    gazetteer: Arc<Gazetteer>,
    leading: Vec<String>,
    trailing: Vec<String>,
    corrections: Vec<String>,
    denylist: Vec<String>,
    homophones: Vec<HomophoneRule>,
    blockers: Vec<String>,
    max_passes: usize,
}

impl Normalizer {
    pub fn new(rules: &NormalizeRules, gazetteer: Arc<Gazetteer>) -> Self {
        // A rule whose target contains its source would never reach a fixpoint.
        let homophones = rules
            .homophones
            .iter()
            .filter(|h| !h.from.is_empty() && !h.to.contains(&h.from))
            .cloned()
            .collect();
        Self {
            gazetteer,
            leading: longest_first(&rules.leading_fillers),
            trailing: longest_first(&rules.trailing_fillers),
            corrections: rules.correction_markers.clone(),
            denylist: rules.stutter_denylist.clone(),
            homophones,
            blockers: rules.short_form_blockers.clone(),
            max_passes: rules.max_passes.max(1),
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        let mut text = canonicalize_chars(raw);
        for pass in 0..self.max_passes {
            let next = self.pass(&text);
            if next == text {
                debug!(passes = pass, normalized = %text, "normalized utterance");
                return text;
            }
            text = next;
        }
        debug!(passes = self.max_passes, normalized = %text, "normalizer hit pass limit");
        text
    }

    fn pass(&self, text: &str) -> String {
        let text = merge_whitespace(text);
        let text = canonicalize_units(&text);
        let text = self.apply_corrections(&text);
        let text = self.strip_fillers(&text);
        let text = self.collapse_stutter(&text);
        let text = collapse_duplicates(&text);
        let text = self.fix_homophones(&text);
        self.complete_admin(&text)
    }

    // ── Step 3: self-corrections ──

    fn apply_corrections(&self, text: &str) -> String {
        let found = self
            .corrections
            .iter()
            .filter(|m| !m.is_empty())
            .filter_map(|m| text.rfind(m.as_str()).map(|pos| (pos, m.len())))
            .max_by_key(|(pos, _)| *pos);
        let Some((pos, len)) = found else {
            return text.to_string();
        };

        let head = &text[..pos];
        let tail = text[pos + len..].trim_start_matches(['是', '在']);
        if tail.is_empty() {
            return head.to_string();
        }
        // A bare number replaces the last number said before the marker.
        if BARE_NUMBER.is_match(tail)
            && let Some(last) = NUMBER_TOKEN.find_iter(head).last()
        {
            let number = if tail.ends_with('號') {
                tail.to_string()
            } else {
                format!("{tail}號")
            };
            return format!("{}{number}{}", &head[..last.start()], &head[last.end()..]);
        }
        tail.to_string()
    }

    // ── Step 4: fillers ──

    fn strip_fillers(&self, text: &str) -> String {
        // Fillers repeated mid-sentence (`台北市我要到中正路1號`) go too, but only
        // ahead of the house number and only multi-character ones.
        let split = text.find('號').unwrap_or(text.len());
        let (head, number_on) = text.split_at(split);
        let mut head = head.to_string();
        for filler in self.leading.iter().filter(|f| char_len(f) >= 2) {
            if head.contains(filler.as_str()) {
                head = head.replace(filler.as_str(), "");
            }
        }
        let joined = format!("{head}{number_on}");

        let mut s = joined.as_str();
        'leading: loop {
            for filler in &self.leading {
                if let Some(rest) = s.strip_prefix(filler.as_str()) {
                    s = rest;
                    continue 'leading;
                }
            }
            break;
        }

        let first_number_end = s.find('號').map(|p| p + '號'.len_utf8());
        'trailing: loop {
            for filler in &self.trailing {
                if let Some(rest) = s.strip_suffix(filler.as_str())
                    && first_number_end.is_none_or(|end| rest.len() >= end)
                {
                    s = rest;
                    continue 'trailing;
                }
            }
            break;
        }
        s.to_string()
    }

    // ── Step 5: stutters ──

    fn collapse_stutter(&self, text: &str) -> String {
        let mut chars: Vec<char> = text.chars().collect();
        'scan: loop {
            let n = chars.len();
            for len in (2..=n / 2).rev() {
                for i in 0..=n - 2 * len {
                    if chars[i..i + len] != chars[i + len..i + 2 * len] {
                        continue;
                    }
                    let phrase: String = chars[i..i + len].iter().collect();
                    if phrase.chars().all(|c| c.is_ascii_digit()) || self.is_denied(&phrase) {
                        continue;
                    }
                    chars.drain(i + len..i + 2 * len);
                    continue 'scan;
                }
            }
            break;
        }
        chars.into_iter().collect()
    }

    fn is_denied(&self, phrase: &str) -> bool {
        let doubled = phrase.repeat(2);
        self.denylist
            .iter()
            .any(|d| d.contains(&doubled) || doubled.contains(d.as_str()))
    }

    // ── Step 6: homophones ──

    fn fix_homophones(&self, text: &str) -> String {
        let mut text = text.to_string();
        for rule in &self.homophones {
            if !text.contains(&rule.from) {
                continue;
            }
            let in_context =
                rule.context.is_empty() || rule.context.iter().any(|c| text.contains(c.as_str()));
            let vetoed = rule.unless.iter().any(|u| text.contains(u.as_str()));
            if in_context && !vetoed {
                text = text.replace(&rule.from, &rule.to);
            }
        }
        text
    }

    // ── Step 7: administrative units ──

    fn complete_admin(&self, text: &str) -> String {
        let g = &*self.gazetteer;
        let mut text = text.to_string();

        for legacy in g.legacy_counties() {
            if text.contains(&legacy.old) {
                text = text.replace(&legacy.old, &legacy.current);
            }
        }
        for legacy in g.legacy_counties().iter().filter(|l| l.township_to_district) {
            text = convert_townships(g, &text, &legacy.current);
        }

        if g.city_prefix(&text).is_none() {
            if let Some(rewritten) = self.expand_bare_township(&text) {
                text = rewritten;
            } else if let Some(rewritten) = self.expand_short_city(&text) {
                text = rewritten;
            }
        }

        self.expand_short_district(&text).unwrap_or(text)
    }

    /// `板橋市文化路` → `新北市板橋區文化路`
    fn expand_bare_township(&self, text: &str) -> Option<String> {
        (3..=5).find_map(|n| {
            let prefix = prefix_chars(text, n)?;
            let rest = &text[prefix.len()..];
            if prefix.ends_with('市') && rest.starts_with(CITY_WORD_FOLLOWERS) {
                return None;
            }
            let (city, district) = self.gazetteer.legacy_township(prefix)?;
            Some(format!("{city}{district}{rest}"))
        })
    }

    /// `台中東區…` → `台中市東區…`; only when a district of that city follows.
    fn expand_short_city(&self, text: &str) -> Option<String> {
        let g = &*self.gazetteer;
        (2..=3).find_map(|n| {
            let short = prefix_chars(text, n)?;
            let following = &text[short.len()..];
            let city = g.short_city_candidates(short).into_iter().find(|city| {
                g.district_prefix(following, Some(*city)).is_some()
                    || g
                        .short_district_prefix(following, city)
                        .and_then(short_form)
                        .is_some_and(|s| !self.is_blocked(&following[s.len()..]))
            })?;
            Some(format!("{city}{following}"))
        })
    }

    /// `台中市西屯台灣大道` → `台中市西屯區台灣大道`
    fn expand_short_district(&self, text: &str) -> Option<String> {
        let g = &*self.gazetteer;
        let city = g.city_prefix(text).filter(|c| g.is_city(c));
        let pos = city.map_or(0, str::len);
        let rest = &text[pos..];
        if g.district_prefix(rest, city).is_some() {
            return None;
        }

        let district = match city {
            Some(c) => g.short_district_prefix(rest, c)?,
            None => g.cities().find_map(|c| g.short_district_prefix(rest, &c.name))?,
        };
        let short = short_form(district)?;
        let remainder = &rest[short.len()..];
        if self.is_blocked(remainder) {
            return None;
        }
        // Without a city the short form only counts in front of a street.
        if city.is_none() && !remainder.contains(['路', '街', '道', '巷', '號']) {
            return None;
        }
        Some(format!("{}{district}{remainder}", &text[..pos]))
    }

    /// The short form is really the start of a longer word: `中山` in
    /// `中山路` or `中山北路`, `板橋` in `板橋車站`.
    fn is_blocked(&self, remainder: &str) -> bool {
        let after_one = remainder
            .char_indices()
            .nth(1)
            .map_or("", |(i, _)| &remainder[i..]);
        self.blockers.iter().filter(|b| !b.is_empty()).any(|b| {
            remainder.starts_with(b.as_str()) || after_one.starts_with(b.as_str())
        })
    }
}

// ── Character canonicalisation ──

/// Full-width → half-width, traditional unit characters, punctuation →
/// space, ASCII letters uppercased.
pub fn canonicalize_chars(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            _ => c,
        })
        .map(|c| match c {
            '臺' => '台',
            '号' => '號',
            '区' => '區',
            '县' => '縣',
            '乡' => '鄉',
            '镇' => '鎮',
            '‐' | '‑' | '–' | '—' => '-',
            c if c.is_ascii_lowercase() => c.to_ascii_uppercase(),
            c if is_punctuation(c) => ' ',
            c => c,
        })
        .collect()
}

fn is_punctuation(c: char) -> bool {
    (c.is_ascii_punctuation() && c != '-')
        || matches!(
            c,
            '、' | '，' | '。' | '！' | '？' | '：' | '；' | '「' | '」' | '『' | '』' | '（' | '）'
                | '《' | '》' | '…' | '〜' | '～'
        )
}

// ── Step 1: whitespace ──

fn merge_whitespace(text: &str) -> String {
    let merged = SPLIT_NUMBER.replace_all(text, "$1");
    merged.split_whitespace().collect()
}

// ── Step 2: units ──

fn canonicalize_units(text: &str) -> String {
    let text = NUMERAL_UNIT.replace_all(text, |caps: &Captures| {
        match chinese_to_arabic(&caps[1]) {
            Some(n) => format!("{n}{}", &caps[2]),
            None => caps[0].to_string(),
        }
    });
    let text = NUMERAL_SUB.replace_all(&text, |caps: &Captures| {
        match chinese_to_arabic(&caps[2]) {
            Some(n) => format!("{}之{n}", &caps[1]),
            None => caps[0].to_string(),
        }
    });
    let text = SUB_AFTER_UNIT.replace_all(&text, "${1}之${2}號");
    let text = HYPHEN_NUMBER.replace_all(&text, "${1}之${2}號");
    let text = HYPHEN_AFTER_UNIT.replace_all(&text, "${1}${2}之${3}");
    let text = SECTION_DIGITS.replace_all(&text, |caps: &Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(arabic_to_chinese)
            .map_or_else(|| caps[0].to_string(), |n| format!("{n}段"))
    });
    let text = FLOOR.replace_all(&text, "號");
    let text = TRAILING_DIGITS.replace_all(&text, "${1}${2}號");
    text.into_owned()
}

// ── Step 5b: duplicated numbers and sections ──

fn collapse_duplicates(text: &str) -> String {
    let text = REPEATED_UNIT.replace_all(text, |caps: &Captures| {
        caps[0].chars().next().map(String::from).unwrap_or_default()
    });
    let text = SECTION_RUN.replace_all(&text, |caps: &Captures| {
        LAST_SECTION
            .find(&caps[0])
            .map_or_else(|| caps[0].to_string(), |m| m.as_str().to_string())
    });
    drop_repeated_number(&text).into_owned()
}

/// `29號…29號`: the later copy of an identical number token is removed.
fn drop_repeated_number(text: &str) -> Cow<'_, str> {
    let tokens: Vec<_> = NUMBER_TOKEN.find_iter(text).collect();
    for (i, later) in tokens.iter().enumerate() {
        if tokens[..i].iter().any(|earlier| earlier.as_str() == later.as_str()) {
            return Cow::Owned(format!("{}{}", &text[..later.start()], &text[later.end()..]));
        }
    }
    Cow::Borrowed(text)
}

// ── Step 7 helpers ──

/// `新北市板橋市` → `新北市板橋區` for every occurrence of `city`.
fn convert_townships(g: &Gazetteer, text: &str, city: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(city) {
        let end = pos + city.len();
        out.push_str(&rest[..end]);
        rest = &rest[end..];
        let converted = (3..=5).find_map(|n| {
            let township = prefix_chars(rest, n)?;
            let after = &rest[township.len()..];
            if township.ends_with('市') && after.starts_with(CITY_WORD_FOLLOWERS) {
                return None;
            }
            g.township_to_district(city, township)
                .filter(|d| d != township)
                .map(|d| (township.len(), d))
        });
        if let Some((len, district)) = converted {
            out.push_str(&district);
            rest = &rest[len..];
        }
    }
    out.push_str(rest);
    out
}

/// The first `n` characters, or `None` when the text is shorter.
fn prefix_chars(text: &str, n: usize) -> Option<&str> {
    match text.char_indices().nth(n) {
        Some((end, _)) => Some(&text[..end]),
        None if text.chars().count() == n => Some(text),
        None => None,
    }
}
