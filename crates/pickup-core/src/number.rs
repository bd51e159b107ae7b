//! House-number parsing and arithmetic for Taiwanese addresses.
//!
//! A house number is written `[附|臨]<digits>[之<digits>]號`:
//!
//! - Plain: `29號`
//! - Sub-number (subdivided lot): `29之1號`
//! - Annex prefix: `附29號`; provisional prefix: `臨29號`
//!
//! Speech transcripts also produce Chinese numerals (`二十九號`, `二九號`),
//! which [`chinese_to_arabic`] converts.

use std::fmt;

/// Optional prefix character before the digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberPrefix {
    Plain,
    /// `附`
    Annex,
    /// `臨`
    Provisional,
}

/// A parsed house number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HouseNumber {
    pub prefix: NumberPrefix,
    pub base: u32,
    pub sub: Option<u32>,
}

impl HouseNumber {
    pub fn new(base: u32) -> Self {
        Self {
            prefix: NumberPrefix::Plain,
            base,
            sub: None,
        }
    }

    /// Parse `29號`, `29之1號`, `附3號`. The trailing `號` is optional.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_suffix('號').unwrap_or(s);

        let (prefix, rest) = if let Some(r) = s.strip_prefix('附') {
            (NumberPrefix::Annex, r)
        } else if let Some(r) = s.strip_prefix('臨') {
            (NumberPrefix::Provisional, r)
        } else {
            (NumberPrefix::Plain, s)
        };

        let (base_str, sub_str) = match rest.split_once('之') {
            Some((b, s)) => (b, Some(s)),
            None => (rest, None),
        };

        let base = parse_digits(base_str)?;
        let sub = match sub_str {
            Some(s) => Some(parse_digits(s)?),
            None => None,
        };

        Some(Self { prefix, base, sub })
    }

    /// The number `delta` doors away on the same side of the street.
    ///
    /// The sub-number and prefix are dropped. Returns `None` below 1.
    pub fn offset(&self, delta: i32) -> Option<Self> {
        let shifted = i64::from(self.base) + i64::from(delta);
        if shifted < 1 {
            return None;
        }
        Some(Self::new(u32::try_from(shifted).ok()?))
    }

    /// Same number with the `之N` part removed.
    pub fn without_sub(&self) -> Self {
        Self { sub: None, ..*self }
    }

    pub fn with_sub(&self, sub: Option<u32>) -> Self {
        Self { sub, ..*self }
    }
}

impl fmt::Display for HouseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            NumberPrefix::Plain => {}
            NumberPrefix::Annex => f.write_str("附")?,
            NumberPrefix::Provisional => f.write_str("臨")?,
        }
        write!(f, "{}", self.base)?;
        if let Some(sub) = self.sub {
            write!(f, "之{sub}")?;
        }
        f.write_str("號")
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Two number strings denote the same house number.
pub fn numbers_match(a: &str, b: &str) -> bool {
    match (HouseNumber::parse(a), HouseNumber::parse(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.trim() == b.trim(),
    }
}

/// True when `s` contains only characters legal in a number field:
/// ASCII digits, `之`, `附`, `臨`, `號`.
pub fn is_clean_number(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '之' | '附' | '臨' | '號'))
}

fn chinese_digit(c: char) -> Option<u32> {
    Some(match c {
        '零' | '〇' | '○' => 0,
        '一' | '壹' => 1,
        '二' | '兩' | '貳' => 2,
        '三' | '參' => 3,
        '四' | '肆' => 4,
        '五' | '伍' => 5,
        '六' | '陸' => 6,
        '七' | '柒' => 7,
        '八' | '捌' => 8,
        '九' | '玖' => 9,
        _ => return None,
    })
}

fn chinese_multiplier(c: char) -> Option<u32> {
    Some(match c {
        '十' | '拾' => 10,
        '百' | '佰' => 100,
        '千' | '仟' => 1000,
        _ => return None,
    })
}

/// True for characters [`chinese_to_arabic`] understands.
pub fn is_chinese_numeral(c: char) -> bool {
    chinese_digit(c).is_some() || chinese_multiplier(c).is_some()
}

/// Convert a Chinese numeral to an integer.
///
/// Accepts positional forms (`二十九` = 29, `一百零五` = 105, `十二` = 12) and
/// digit-by-digit readings (`二九` = 29, `一零五` = 105).
pub fn chinese_to_arabic(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    if !s.chars().any(|c| chinese_multiplier(c).is_some()) {
        let mut value: u32 = 0;
        for c in s.chars() {
            value = value.checked_mul(10)?.checked_add(chinese_digit(c)?)?;
        }
        return Some(value);
    }

    let mut total: u32 = 0;
    let mut current: Option<u32> = None;
    for c in s.chars() {
        if let Some(d) = chinese_digit(c) {
            current = Some(d);
        } else if let Some(m) = chinese_multiplier(c) {
            total += current.unwrap_or(1) * m;
            current = None;
        } else {
            return None;
        }
    }
    Some(total + current.unwrap_or(0))
}

/// Chinese numeral for section numbers 1..=99 (`2` → `二`, `12` → `十二`).
pub fn arabic_to_chinese(n: u32) -> Option<String> {
    const DIGITS: [&str; 10] = ["零", "一", "二", "三", "四", "五", "六", "七", "八", "九"];
    match n {
        1..=9 => Some(DIGITS[n as usize].to_string()),
        10 => Some("十".to_string()),
        11..=19 => Some(format!("十{}", DIGITS[(n % 10) as usize])),
        20..=99 => {
            let tens = DIGITS[(n / 10) as usize];
            let ones = n % 10;
            if ones == 0 {
                Some(format!("{tens}十"))
            } else {
                Some(format!("{tens}十{}", DIGITS[ones as usize]))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_sub_numbers() {
        assert_eq!(HouseNumber::parse("29號"), Some(HouseNumber::new(29)));
        let sub = HouseNumber::parse("29之1號").unwrap();
        assert_eq!(sub.base, 29);
        assert_eq!(sub.sub, Some(1));
        assert_eq!(HouseNumber::parse("29").unwrap().base, 29);
    }

    #[test]
    fn parses_prefixes() {
        let annex = HouseNumber::parse("附3號").unwrap();
        assert_eq!(annex.prefix, NumberPrefix::Annex);
        assert_eq!(annex.to_string(), "附3號");
        let prov = HouseNumber::parse("臨12之2號").unwrap();
        assert_eq!(prov.prefix, NumberPrefix::Provisional);
        assert_eq!(prov.to_string(), "臨12之2號");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(HouseNumber::parse("立德街29號"), None);
        assert_eq!(HouseNumber::parse("號"), None);
        assert_eq!(HouseNumber::parse("29之號"), None);
        assert_eq!(HouseNumber::parse(""), None);
    }

    #[test]
    fn display_round_trips_canonical_form() {
        for s in ["1號", "29之1號", "附3號", "108號"] {
            assert_eq!(HouseNumber::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn offset_stays_on_same_side() {
        let n = HouseNumber::parse("29之1號").unwrap();
        assert_eq!(n.offset(-2).unwrap().to_string(), "27號");
        assert_eq!(n.offset(2).unwrap().to_string(), "31號");
        assert_eq!(HouseNumber::new(1).offset(-2), None);
    }

    #[test]
    fn sub_number_strip_and_restore() {
        let n = HouseNumber::parse("29之1號").unwrap();
        let base = n.without_sub();
        assert_eq!(base.to_string(), "29號");
        assert_eq!(base.with_sub(n.sub), n);
    }

    #[test]
    fn numbers_match_ignores_missing_suffix() {
        assert!(numbers_match("29號", "29"));
        assert!(!numbers_match("29號", "129號"));
        assert!(!numbers_match("29號", "29之1號"));
    }

    #[test]
    fn clean_number_detection() {
        assert!(is_clean_number("29之1號"));
        assert!(is_clean_number("附3號"));
        assert!(!is_clean_number("立德街29號"));
        assert!(!is_clean_number(""));
    }

    #[test]
    fn chinese_positional() {
        assert_eq!(chinese_to_arabic("二十九"), Some(29));
        assert_eq!(chinese_to_arabic("十二"), Some(12));
        assert_eq!(chinese_to_arabic("一百零五"), Some(105));
        assert_eq!(chinese_to_arabic("三百"), Some(300));
        assert_eq!(chinese_to_arabic("兩千三百四十五"), Some(2345));
    }

    #[test]
    fn chinese_digit_by_digit() {
        assert_eq!(chinese_to_arabic("二九"), Some(29));
        assert_eq!(chinese_to_arabic("一零五"), Some(105));
        assert_eq!(chinese_to_arabic("五"), Some(5));
    }

    #[test]
    fn chinese_rejects_other_text() {
        assert_eq!(chinese_to_arabic("中山"), None);
        assert_eq!(chinese_to_arabic(""), None);
    }

    #[test]
    fn section_numerals() {
        assert_eq!(arabic_to_chinese(2).as_deref(), Some("二"));
        assert_eq!(arabic_to_chinese(10).as_deref(), Some("十"));
        assert_eq!(arabic_to_chinese(12).as_deref(), Some("十二"));
        assert_eq!(arabic_to_chinese(30).as_deref(), Some("三十"));
        assert_eq!(arabic_to_chinese(0), None);
    }
}
