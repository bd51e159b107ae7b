//! Regular expressions shared by the text stages.

use std::sync::LazyLock;

use regex::Regex;

/// A house-number token: `29號`, `29之1號`, `附3號`.
pub(crate) static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[附臨]?\d+(?:之\d+)?號").expect("number token regex"));

/// A number fragment spoken on its own, with or without `號`.
pub(crate) static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[附臨]?\d+(?:之\d+)?號?$").expect("bare number regex"));

/// A section token in either numeral style.
pub(crate) static SECTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:[一二三四五六七八九十]+|\d+)段").expect("section regex"));

/// Street units after administrative prefixes have been removed.
///
/// The primary road is lazy so `中山路中正路` yields two roads; the
/// secondary road may not cross digits or street units.
pub(crate) static STREET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<road>.+?(?:大道|路|街|道))?",
        r"(?P<section>(?:[一二三四五六七八九十]+|\d+)段)?",
        r"(?:(?P<road2>[^\d巷弄號段]+?(?:大道|路|街))",
        r"(?P<section2>(?:[一二三四五六七八九十]+|\d+)段)?)?",
        r"(?P<lane>\d+巷)?",
        r"(?P<alley>\d+弄)?",
        r"(?P<number>[附臨]?\d+(?:之\d+)?號)?",
    ))
    .expect("street regex")
});

/// True when the text names any street or administrative unit.
pub fn has_address_unit(text: &str) -> bool {
    const UNITS: [char; 11] = ['路', '街', '道', '段', '巷', '弄', '號', '區', '市', '縣', '鄉'];
    text.chars().any(|c| UNITS.contains(&c))
}

/// Non-empty words, longest first, so a longer word is tried before any
/// word it contains.
pub(crate) fn longest_first(words: &[String]) -> Vec<String> {
    let mut words: Vec<String> = words.iter().filter(|w| !w.is_empty()).cloned().collect();
    words.sort_by_key(|w| std::cmp::Reverse(char_len(w)));
    words
}

/// Character count of a UTF-8 string.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn street_regex_splits_two_roads() {
        let caps = STREET.captures("中山路中正路").unwrap();
        assert_eq!(&caps["road"], "中山路");
        assert_eq!(&caps["road2"], "中正路");
    }

    #[test]
    fn street_regex_full_address() {
        let caps = STREET.captures("中山北路二段10巷3弄29之1號").unwrap();
        assert_eq!(&caps["road"], "中山北路");
        assert_eq!(&caps["section"], "二段");
        assert!(caps.name("road2").is_none());
        assert_eq!(&caps["lane"], "10巷");
        assert_eq!(&caps["alley"], "3弄");
        assert_eq!(&caps["number"], "29之1號");
    }

    #[test]
    fn street_regex_avenue() {
        let caps = STREET.captures("台灣大道三段99號").unwrap();
        assert_eq!(&caps["road"], "台灣大道");
        assert_eq!(&caps["section"], "三段");
        assert_eq!(&caps["number"], "99號");
    }

    #[test]
    fn number_tokens() {
        let found: Vec<_> = NUMBER_TOKEN
            .find_iter("立德街29號隔壁附3號")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, vec!["29號", "附3號"]);
        assert!(BARE_NUMBER.is_match("31"));
        assert!(!BARE_NUMBER.is_match("立德街31號"));
    }

    #[test]
    fn unit_detection() {
        assert!(has_address_unit("立德街"));
        assert!(!has_address_unit("好啊"));
    }
}
