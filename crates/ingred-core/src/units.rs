//! Best-effort quantity normalization
//!
//! Quantities like `３００ｇ`, `4～5枚`, `30g+30g` or `50ccから100cc` do not
//! need translation once their number and unit are separated. This module
//! pulls those apart and maps the unit through a [`UnitDictionary`]. Anything
//! it cannot read (`適量`, `直径20cmの丸い焼き型`) is returned unparsed.

use crate::cleaner::clean;
use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

const NUMBER: &str = r"\d+(?:\.\d+)?(?:/\d+)?";

static RE_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({NUMBER})(\D*)$")).expect("valid single quantity regex")
});

static RE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({NUMBER})(\D*?)(?:~|〜|-|、|,|・|から)({NUMBER})(\D*)$"))
        .expect("valid range quantity regex")
});

/// Amount followed by a parenthetical note, e.g. `5カップ(300cc`
static RE_LEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({NUMBER})([^\d(（]+)[(（]")).expect("valid leading quantity regex")
});

/// Words marking an approximate quantity
const APPROXIMATE_PREFIXES: &[&str] = &["約", "about", "approx."];

/// Separators of quantities that add up
const SUM_SEPARATORS: &[char] = &['+', 'と'];

/// Raw unit token to canonical unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UnitDictionary {
    units: HashMap<String, String>,
}

impl UnitDictionary {
    /// Load a JSON object of `{"raw": "canonical"}` entries
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let raw: HashMap<String, String> = serde_json::from_str(&contents)?;
        Ok(Self::from_pairs(raw))
    }

    /// Keys are cleaned so that full-width spellings match their cleaned input
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let units = pairs
            .into_iter()
            .map(|(k, v)| (clean(k.as_ref()), v.into()))
            .collect();
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Canonical spelling of `unit`, or `unit` itself when unknown
    pub fn canonical(&self, unit: &str) -> String {
        self.units
            .get(unit)
            .cloned()
            .unwrap_or_else(|| unit.to_string())
    }
}

/// Numeric part of a quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Amount {
    Single(f64),
    Range(f64, f64),
}

/// A quantity split into amount and unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantity {
    pub amount: Amount,
    pub unit: String,
    pub approximate: bool,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.approximate {
            f.write_str("~")?;
        }
        match self.amount {
            Amount::Single(v) => write!(f, "{}", format_number(v))?,
            Amount::Range(lo, hi) => write!(f, "{}-{}", format_number(lo), format_number(hi))?,
        }
        f.write_str(&self.unit)
    }
}

/// Outcome of [`normalize_quantity`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QuantityParse {
    Parsed(Quantity),
    /// Kept for manual review, holding the raw input
    Unparsed(String),
}

impl QuantityParse {
    /// Normalized text, or the raw input when unparsed
    pub fn to_text(&self) -> String {
        match self {
            QuantityParse::Parsed(q) => q.to_string(),
            QuantityParse::Unparsed(raw) => raw.clone(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, QuantityParse::Parsed(_))
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn parse_number(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num.parse::<f64>().ok()? / den)
        }
        None => s.parse().ok(),
    }
}

/// Split `raw` into amount and unit
pub fn normalize_quantity(raw: &str, units: &UnitDictionary) -> QuantityParse {
    let mut text = clean(raw);
    let mut approximate = false;
    for prefix in APPROXIMATE_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.to_string();
            approximate = true;
            break;
        }
    }

    let amount_unit = parse_sum(&text)
        .or_else(|| parse_range(&text))
        .or_else(|| parse_single(&text))
        .or_else(|| parse_leading(&text));

    match amount_unit {
        Some((amount, unit)) => QuantityParse::Parsed(Quantity {
            amount,
            unit: units.canonical(&unit),
            approximate,
        }),
        None => QuantityParse::Unparsed(raw.to_string()),
    }
}

fn parse_single(text: &str) -> Option<(Amount, String)> {
    let caps = RE_SINGLE.captures(text)?;
    let value = parse_number(&caps[1])?;
    Some((Amount::Single(value), caps[2].to_string()))
}

fn parse_range(text: &str) -> Option<(Amount, String)> {
    let caps = RE_RANGE.captures(text)?;
    let lo = parse_number(&caps[1])?;
    let hi = parse_number(&caps[3])?;
    let unit = if caps[4].is_empty() { &caps[2] } else { &caps[4] };
    Some((Amount::Range(lo, hi), unit.to_string()))
}

fn parse_leading(text: &str) -> Option<(Amount, String)> {
    let caps = RE_LEADING.captures(text)?;
    let value = parse_number(&caps[1])?;
    Some((Amount::Single(value), caps[2].to_string()))
}

/// `80g+80g` and `30gと30gと15g`, all parts sharing one unit
fn parse_sum(text: &str) -> Option<(Amount, String)> {
    let parts: Vec<&str> = text.split(SUM_SEPARATORS).collect();
    if parts.len() < 2 {
        return None;
    }

    let mut total = 0.0;
    let mut unit: Option<String> = None;
    for part in parts {
        let (amount, part_unit) = parse_single(part)?;
        let Amount::Single(value) = amount else {
            return None;
        };
        if let Some(u) = &unit {
            if *u != part_unit {
                return None;
            }
        } else {
            unit = Some(part_unit);
        }
        total += value;
    }
    Some((Amount::Single(total), unit.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> UnitDictionary {
        UnitDictionary::from_pairs([("ｃｃ", "ml"), ("グラム", "g"), ("カップ", "cup")])
    }

    fn text(raw: &str) -> String {
        normalize_quantity(raw, &units()).to_text()
    }

    #[test]
    fn test_single_quantities() {
        assert_eq!(text("３００ｇ"), "300g");
        assert_eq!(text("200グラム"), "200g");
        assert_eq!(text("1/2個"), "0.5個");
        assert_eq!(text("1.5カップ"), "1.5cup");
        assert_eq!(text("2"), "2");
    }

    #[test]
    fn test_ranges() {
        assert_eq!(text("4～5枚"), "4-5枚");
        assert_eq!(text("５、６個"), "5-6個");
        assert_eq!(text("５０ｃｃから１００ｃｃ"), "50-100ml");
    }

    #[test]
    fn test_sums() {
        assert_eq!(text("８０ｇ＋８０ｇ"), "160g");
        assert_eq!(text("３０gと３０gと１５g"), "75g");
        // Mixed units do not add up
        assert_eq!(text("1個+50g"), "1個+50g");
    }

    #[test]
    fn test_approximate_and_parenthetical() {
        assert_eq!(text("約200g"), "~200g");
        assert_eq!(text("５カップ( 300cc"), "5cup");
    }

    #[test]
    fn test_unparsed_keeps_raw_input() {
        for raw in ["適量", "直径２０cmの丸い焼き型・延べ棒", "", "少々"] {
            let parsed = normalize_quantity(raw, &units());
            assert_eq!(parsed, QuantityParse::Unparsed(raw.to_string()));
            assert!(!parsed.is_parsed());
        }
    }

    #[test]
    fn test_load_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.json");
        std::fs::write(&path, r#"{"ＣＣ": "ml", "本": "pieces"}"#).unwrap();

        let dict = UnitDictionary::load(&path).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.canonical("cc"), "ml");
        assert_eq!(dict.canonical("本"), "pieces");
        assert_eq!(dict.canonical("枚"), "枚");
    }
}
