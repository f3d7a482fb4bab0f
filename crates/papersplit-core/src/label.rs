//! Question labels: `7`, `7(a)`, `7(ii)`, `7(a)(ii)`.
//!
//! Labels are parsed from raw text tokens under a [`SubLevelGrammar`]. A
//! bracketed token that could be either a letter or a roman numeral (`(i)`,
//! `(v)`, `(x)`) is resolved by a fixed priority: it is roman only when a
//! roman level is expected, i.e. an alphabetic level is already open or the
//! grammar is roman-only. Otherwise a single letter is alphabetic.

use std::fmt;
use std::str::FromStr;

/// Which sub-level forms a document family uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SubLevelGrammar {
    /// One alphabetic level: `3(b)`.
    Alphabetic,
    /// One roman level: `3(iv)`.
    Roman,
    /// Alphabetic then roman: `3(b)(iv)`. A lone multi-letter roman level
    /// (`3(ii)`) is also accepted.
    #[default]
    Nested,
}

/// One sub-level of a label.
///
/// The derived ordering compares within a variant by value; across variants
/// alphabetic sorts first, which only matters for mixed-grammar input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubLevel {
    /// Zero-based letter index: `(a)` is `Alpha(0)`.
    Alpha(u8),
    /// Roman numeral value: `(iv)` is `Roman(4)`.
    Roman(u16),
}

impl fmt::Display for SubLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubLevel::Alpha(i) => write!(f, "({})", (b'a' + i) as char),
            SubLevel::Roman(v) => write!(f, "({})", to_roman(*v)),
        }
    }
}

/// A parsed question identifier.
///
/// Ordering is main number first, then sub-levels lexicographically, with a
/// label sorting before its own sub-labels: `2 < 2(a) < 2(a)(i) < 2(b) < 3`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    main: u32,
    subs: Vec<SubLevel>,
}

/// A token that does not match any label grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMismatch {
    pub token: String,
}

impl fmt::Display for ParseMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a question label", self.token)
    }
}

impl std::error::Error for ParseMismatch {}

impl Label {
    /// A main-number label with no sub-levels.
    pub fn new(main: u32) -> Self {
        Self {
            main,
            subs: Vec::new(),
        }
    }

    /// A label with explicit sub-levels.
    pub fn with_subs(main: u32, subs: Vec<SubLevel>) -> Self {
        Self { main, subs }
    }

    /// The main question number.
    pub fn main(&self) -> u32 {
        self.main
    }

    /// Sub-levels, outermost first.
    pub fn subs(&self) -> &[SubLevel] {
        &self.subs
    }

    /// Whether `self` strictly extends `ancestor` (`2(a)(i)` extends `2(a)` and `2`).
    pub fn is_descendant_of(&self, ancestor: &Label) -> bool {
        self.main == ancestor.main
            && self.subs.len() > ancestor.subs.len()
            && self.subs.starts_with(&ancestor.subs)
    }

    /// Parse a token without any context. See [`Label::parse_in_context`].
    pub fn parse(token: &str, grammar: SubLevelGrammar) -> Option<Label> {
        Self::parse_in_context(token, grammar, None)
    }

    /// Parse a token, resolving bare bracket tokens against `open`.
    ///
    /// Digit-led tokens (`2`, `2(a)`, `2(a)(ii)`) parse on their own. Bare
    /// tokens (`(b)`, `(ii)`, `(b)(i)`) only parse when `open` is the label
    /// currently being read; they inherit its main number. Returns `None`
    /// (a parse mismatch) for anything else, including main number 0.
    pub fn parse_in_context(
        token: &str,
        grammar: SubLevelGrammar,
        open: Option<&Label>,
    ) -> Option<Label> {
        let token = token.trim();
        let digits_len = token.bytes().take_while(u8::is_ascii_digit).count();
        let (digits, rest) = token.split_at(digits_len);
        let brackets = split_brackets(rest)?;

        let (main, mut subs, mut remaining) = if digits.is_empty() {
            let open = open?;
            let (first, tail) = brackets.split_first()?;
            let mut subs = open.subs.clone();
            continue_level(&mut subs, first, grammar)?;
            (open.main, subs, tail)
        } else {
            let main: u32 = digits.parse().ok()?;
            (main, Vec::new(), brackets.as_slice())
        };
        if main == 0 {
            return None;
        }

        while let Some((content, tail)) = remaining.split_first() {
            append_level(&mut subs, content, grammar)?;
            remaining = tail;
        }

        Some(Label { main, subs })
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.main)?;
        for sub in &self.subs {
            write!(f, "{sub}")?;
        }
        Ok(())
    }
}

impl FromStr for Label {
    type Err = ParseMismatch;

    /// Parses the canonical display form under the nested grammar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::parse(s, SubLevelGrammar::Nested).ok_or_else(|| ParseMismatch {
            token: s.to_string(),
        })
    }
}

impl Label {
    /// The display form with roman levels in upper case, so roman one
    /// (`3(I)`) and the letter i (`3(i)`) stay distinct. This is the
    /// serialized form.
    pub fn to_tagged_string(&self) -> String {
        let mut out = self.main.to_string();
        for sub in &self.subs {
            match sub {
                SubLevel::Alpha(_) => out.push_str(&sub.to_string()),
                SubLevel::Roman(v) => {
                    out.push('(');
                    out.push_str(&to_roman(*v).to_ascii_uppercase());
                    out.push(')');
                }
            }
        }
        out
    }

    /// Inverse of [`Label::to_tagged_string`].
    ///
    /// Upper-case levels are roman, single lower-case letters alphabetic and
    /// longer lower-case levels roman. Any sequence of levels is accepted.
    pub fn from_tagged_str(s: &str) -> Result<Label, ParseMismatch> {
        let mismatch = || ParseMismatch {
            token: s.to_string(),
        };
        let digits_len = s.bytes().take_while(u8::is_ascii_digit).count();
        let (digits, mut rest) = s.split_at(digits_len);
        let main: u32 = digits.parse().map_err(|_| mismatch())?;
        if main == 0 {
            return Err(mismatch());
        }

        let mut subs = Vec::new();
        while !rest.is_empty() {
            let inner = rest.strip_prefix('(').ok_or_else(mismatch)?;
            let close = inner.find(')').ok_or_else(mismatch)?;
            let content = &inner[..close];
            let level = if !content.is_empty() && content.bytes().all(|b| b.is_ascii_uppercase()) {
                SubLevel::Roman(roman_value(&content.to_ascii_lowercase()).ok_or_else(mismatch)?)
            } else if let Some(letter) = single_letter(content) {
                SubLevel::Alpha(letter)
            } else {
                SubLevel::Roman(roman_value(content).ok_or_else(mismatch)?)
            };
            subs.push(level);
            rest = &inner[close + 1..];
        }
        Ok(Label { main, subs })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_tagged_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Label {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Label::from_tagged_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Build the label candidate for a span's text.
///
/// Takes the first whitespace-delimited token and glues on directly
/// following bracket tokens, so `"1 (a) Describe"` yields `"1(a)"`.
pub fn label_candidate(text: &str) -> Option<String> {
    let mut tokens = text.split_whitespace().peekable();
    let mut candidate = tokens.next()?.to_string();
    while let Some(tok) = tokens.peek() {
        if tok.len() <= 6 && tok.starts_with('(') && tok.ends_with(')') {
            candidate.push_str(tok);
            tokens.next();
        } else {
            break;
        }
    }
    Some(candidate)
}

/// Split `"(a)(ii)"` into `["a", "ii"]`, lowercased. `None` on stray text.
fn split_brackets(rest: &str) -> Option<Vec<String>> {
    let mut out = Vec::new();
    let mut rest = rest;
    while !rest.is_empty() {
        let inner = rest.strip_prefix('(')?;
        let close = inner.find(')')?;
        let content = &inner[..close];
        if content.is_empty() || !content.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        out.push(content.to_ascii_lowercase());
        rest = &inner[close + 1..];
    }
    Some(out)
}

fn single_letter(content: &str) -> Option<u8> {
    match content.as_bytes() {
        [c @ b'a'..=b'z'] => Some(c - b'a'),
        _ => None,
    }
}

/// Append a level inside one token: the first bracket opens level one, a
/// second bracket is only valid as roman under an alphabetic level.
fn append_level(subs: &mut Vec<SubLevel>, content: &str, grammar: SubLevelGrammar) -> Option<()> {
    let level = match (grammar, subs.as_slice()) {
        (SubLevelGrammar::Alphabetic, []) => SubLevel::Alpha(single_letter(content)?),
        (SubLevelGrammar::Roman, []) => SubLevel::Roman(roman_value(content)?),
        (SubLevelGrammar::Nested, [SubLevel::Alpha(_)]) => SubLevel::Roman(roman_value(content)?),
        (SubLevelGrammar::Nested, []) => match single_letter(content) {
            Some(letter) => SubLevel::Alpha(letter),
            None => SubLevel::Roman(roman_value(content)?),
        },
        _ => return None,
    };
    subs.push(level);
    Some(())
}

/// Apply a bare bracket token to the open label's sub-levels.
fn continue_level(subs: &mut Vec<SubLevel>, content: &str, grammar: SubLevelGrammar) -> Option<()> {
    match grammar {
        SubLevelGrammar::Alphabetic => {
            *subs = vec![SubLevel::Alpha(single_letter(content)?)];
        }
        SubLevelGrammar::Roman => {
            *subs = vec![SubLevel::Roman(roman_value(content)?)];
        }
        SubLevelGrammar::Nested => {
            let alpha_open = matches!(subs.first(), Some(SubLevel::Alpha(_)));
            match (alpha_open, roman_value(content), single_letter(content)) {
                (true, Some(value), _) => {
                    subs.truncate(1);
                    subs.push(SubLevel::Roman(value));
                }
                (_, _, Some(letter)) => *subs = vec![SubLevel::Alpha(letter)],
                (false, Some(value), None) => *subs = vec![SubLevel::Roman(value)],
                _ => return None,
            }
        }
    }
    Some(())
}

const ROMAN_DIGITS: [(u16, &str); 5] = [(10, "x"), (9, "ix"), (5, "v"), (4, "iv"), (1, "i")];

/// Lowercase roman numeral for `1..=39`.
pub fn to_roman(mut value: u16) -> String {
    let mut out = String::new();
    for (v, s) in ROMAN_DIGITS {
        while value >= v {
            out.push_str(s);
            value -= v;
        }
    }
    out
}

/// Value of a canonical lowercase roman numeral built from `i`, `v`, `x`.
pub fn roman_value(s: &str) -> Option<u16> {
    if s.is_empty() || s.len() > 8 {
        return None;
    }
    let mut total: u16 = 0;
    let mut prev: u16 = 0;
    for c in s.chars().rev() {
        let v = match c {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            _ => return None,
        };
        if v < prev {
            total = total.checked_sub(v)?;
        } else {
            total += v;
            prev = v;
        }
    }
    (total > 0 && to_roman(total) == s).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(token: &str) -> Option<String> {
        Label::parse(token, SubLevelGrammar::Nested).map(|l| l.to_string())
    }

    #[test]
    fn parses_plain_numbers() {
        assert_eq!(nested("7"), Some("7".to_string()));
        assert_eq!(nested("12"), Some("12".to_string()));
        assert_eq!(Label::parse("12", SubLevelGrammar::Alphabetic), Some(Label::new(12)));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in ["", "0", "3.5", "4.", "2(a", "2()", "(a)", "a1", "2(a)x", "2(1)", "99999999999"] {
            assert_eq!(nested(token), None, "token {token:?}");
        }
    }

    #[test]
    fn single_letter_is_alphabetic_without_context() {
        let label = Label::parse("2(i)", SubLevelGrammar::Nested).unwrap();
        assert_eq!(label.subs(), &[SubLevel::Alpha(8)]);
    }

    #[test]
    fn roman_after_open_alpha_level() {
        let label = Label::parse("2(a)(i)", SubLevelGrammar::Nested).unwrap();
        assert_eq!(label.subs(), &[SubLevel::Alpha(0), SubLevel::Roman(1)]);
        assert_eq!(label.to_string(), "2(a)(i)");
        assert_eq!(nested("7(b)(iv)"), Some("7(b)(iv)".to_string()));
    }

    #[test]
    fn multi_letter_roman_directly_under_main() {
        let label = Label::parse("3(ii)", SubLevelGrammar::Nested).unwrap();
        assert_eq!(label.subs(), &[SubLevel::Roman(2)]);
        assert_eq!(nested("3(ii)(a)"), None);
    }

    #[test]
    fn nested_rejects_two_alphabetic_levels() {
        assert_eq!(nested("2(a)(b)"), None);
    }

    #[test]
    fn roman_only_grammar() {
        let label = Label::parse("4(i)", SubLevelGrammar::Roman).unwrap();
        assert_eq!(label.subs(), &[SubLevel::Roman(1)]);
        assert_eq!(Label::parse("4(b)", SubLevelGrammar::Roman), None);
        assert_eq!(Label::parse("4(i)(ii)", SubLevelGrammar::Roman), None);
    }

    #[test]
    fn alphabetic_only_grammar() {
        let label = Label::parse("4(i)", SubLevelGrammar::Alphabetic).unwrap();
        assert_eq!(label.subs(), &[SubLevel::Alpha(8)]);
        assert_eq!(Label::parse("4(ii)", SubLevelGrammar::Alphabetic), None);
        assert_eq!(Label::parse("4(a)(i)", SubLevelGrammar::Alphabetic), None);
    }

    #[test]
    fn uppercase_brackets_are_normalised() {
        assert_eq!(nested("5(B)(II)"), Some("5(b)(ii)".to_string()));
    }

    #[test]
    fn bare_tokens_need_context() {
        assert_eq!(Label::parse("(b)", SubLevelGrammar::Nested), None);

        let open: Label = "2(a)".parse().unwrap();
        let next = Label::parse_in_context("(b)", SubLevelGrammar::Nested, Some(&open)).unwrap();
        assert_eq!(next.to_string(), "2(b)");

        let roman = Label::parse_in_context("(ii)", SubLevelGrammar::Nested, Some(&open)).unwrap();
        assert_eq!(roman.to_string(), "2(a)(ii)");
    }

    #[test]
    fn bare_roman_resolves_against_open_alpha_by_priority() {
        let open: Label = "2(a)(iv)".parse().unwrap();
        // 'v' is read as roman because an alphabetic level is open.
        let v = Label::parse_in_context("(v)", SubLevelGrammar::Nested, Some(&open)).unwrap();
        assert_eq!(v.to_string(), "2(a)(v)");
        // 'b' cannot be roman, so it closes the alphabetic level.
        let b = Label::parse_in_context("(b)", SubLevelGrammar::Nested, Some(&open)).unwrap();
        assert_eq!(b.to_string(), "2(b)");
        let bi = Label::parse_in_context("(b)(i)", SubLevelGrammar::Nested, Some(&open)).unwrap();
        assert_eq!(bi.to_string(), "2(b)(i)");
    }

    #[test]
    fn bare_token_without_alpha_open_in_nested() {
        let open = Label::new(6);
        let i = Label::parse_in_context("(i)", SubLevelGrammar::Nested, Some(&open)).unwrap();
        assert_eq!(i.subs(), &[SubLevel::Alpha(8)]);
        let ii = Label::parse_in_context("(ii)", SubLevelGrammar::Nested, Some(&open)).unwrap();
        assert_eq!(ii.subs(), &[SubLevel::Roman(2)]);
    }

    #[test]
    fn bare_token_in_roman_grammar() {
        let open: Label = "3(i)".parse().unwrap();
        let next = Label::parse_in_context("(ii)", SubLevelGrammar::Roman, Some(&open)).unwrap();
        assert_eq!(next.to_string(), "3(ii)");
    }

    #[test]
    fn ordering_is_main_then_sub_levels() {
        let mut labels: Vec<Label> = ["3", "2(b)", "2(a)(i)", "2", "2(a)", "10", "2(a)(ii)"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        labels.sort();
        let shown: Vec<String> = labels.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["2", "2(a)", "2(a)(i)", "2(a)(ii)", "2(b)", "3", "10"]);
    }

    #[test]
    fn descendant_relation() {
        let two: Label = "2".parse().unwrap();
        let two_a: Label = "2(a)".parse().unwrap();
        let two_a_i: Label = "2(a)(i)".parse().unwrap();
        assert!(two_a.is_descendant_of(&two));
        assert!(two_a_i.is_descendant_of(&two));
        assert!(two_a_i.is_descendant_of(&two_a));
        assert!(!two.is_descendant_of(&two));
        assert!(!two.is_descendant_of(&two_a));
        assert!(!Label::new(3).is_descendant_of(&two));
    }

    #[test]
    fn from_str_error_names_token() {
        let err = "x(1)".parse::<Label>().unwrap_err();
        assert_eq!(err.to_string(), "'x(1)' is not a question label");
    }

    #[test]
    fn tagged_form_keeps_roman_levels_apart_from_letters() {
        let roman_one = Label::with_subs(3, vec![SubLevel::Roman(1)]);
        let letter_i = Label::with_subs(3, vec![SubLevel::Alpha(8)]);
        assert_eq!(roman_one.to_string(), letter_i.to_string());
        assert_eq!(roman_one.to_tagged_string(), "3(I)");
        assert_eq!(letter_i.to_tagged_string(), "3(i)");
        assert_eq!(Label::from_tagged_str("3(I)"), Ok(roman_one));
        assert_eq!(Label::from_tagged_str("3(i)"), Ok(letter_i));

        for label in ["2(a)(IV)", "7(V)", "12(b)", "5", "3(II)(a)", "4(a)(b)"] {
            assert_eq!(Label::from_tagged_str(label).unwrap().to_tagged_string(), label);
        }
        assert!(Label::from_tagged_str("3(IIII)").is_err());
        assert!(Label::from_tagged_str("0(I)").is_err());
    }

    #[test]
    fn label_candidate_joins_brackets() {
        assert_eq!(label_candidate("1 (a) Describe the"), Some("1(a)".to_string()));
        assert_eq!(label_candidate("  2(b)(ii) State"), Some("2(b)(ii)".to_string()));
        assert_eq!(label_candidate("4 marks awarded"), Some("4".to_string()));
        assert_eq!(label_candidate("   "), None);
    }

    #[test]
    fn roman_numerals() {
        assert_eq!(roman_value("i"), Some(1));
        assert_eq!(roman_value("iv"), Some(4));
        assert_eq!(roman_value("ix"), Some(9));
        assert_eq!(roman_value("xiv"), Some(14));
        assert_eq!(roman_value("iiii"), None);
        assert_eq!(roman_value("vx"), None);
        assert_eq!(roman_value("iix"), None);
        assert_eq!(roman_value("a"), None);
        assert_eq!(to_roman(8), "viii");
        assert_eq!(to_roman(39), "xxxix");
    }
}
