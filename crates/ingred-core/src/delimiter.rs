//! Abnormal delimiter detection
//!
//! Ingredient lines are typed by hand, and many of them separate entries with
//! commas or spaces instead of the canonical `|`. Rather than guessing a
//! grammar, [`DelimiterAnalyzer`] counts how often each candidate separator
//! terminates an item-like run. A line where a candidate shows up more than
//! `tolerance` times and `|` is absent is reported as abnormal, with the
//! separator rewritten to `|` as a best-effort fix.

use crate::error::{IngredError, Result};
use regex::{NoExpand, Regex};

/// Separator between ingredient entries of one line
pub const CANONICAL_DELIMITER: char = '|';

/// Separator between an ingredient name and its quantity
pub const SECONDARY_DELIMITER: char = '*';

/// Candidate separators, checked in this order
pub const DEFAULT_SEPARATORS: &[&str] = &["\u{3000}", "，", ","];

/// Occurrences a candidate may have before the line is abnormal
pub const DEFAULT_TOLERANCE: usize = 2;

/// Delimiter characters and detection thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterSettings {
    pub canonical: char,
    pub secondary: char,
    pub separators: Vec<String>,
    pub tolerance: usize,
}

impl Default for DelimiterSettings {
    fn default() -> Self {
        Self {
            canonical: CANONICAL_DELIMITER,
            secondary: SECONDARY_DELIMITER,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Outcome of [`DelimiterAnalyzer::analyze`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub is_abnormal: bool,
    /// Normalized text, or the separator-substituted text when abnormal
    pub text: String,
}

#[derive(Debug)]
struct SeparatorRule {
    separator: String,
    /// Runs of the separator
    runs: Regex,
    /// An item-like run terminated by the separator
    items: Regex,
}

/// Detects lines whose entries are separated by something other than the
/// canonical delimiter
#[derive(Debug)]
pub struct DelimiterAnalyzer {
    settings: DelimiterSettings,
    canonical: String,
    canonical_runs: Regex,
    rules: Vec<SeparatorRule>,
}

impl DelimiterAnalyzer {
    /// Compile the separator rules for `settings`
    pub fn new(settings: DelimiterSettings) -> Result<Self> {
        if settings.canonical == settings.secondary {
            return Err(IngredError::InvalidConfig(format!(
                "item delimiter and quantity delimiter are both '{}'",
                settings.canonical
            )));
        }

        let canonical = settings.canonical.to_string();
        let canonical_runs = compile(&format!("(?:{})+", regex::escape(&canonical)), &canonical)?;
        let secondary = regex::escape(&settings.secondary.to_string());

        let mut rules = Vec::with_capacity(settings.separators.len());
        for separator in &settings.separators {
            if separator.is_empty() || separator.contains(settings.canonical) {
                return Err(IngredError::InvalidConfig(format!(
                    "candidate separator {separator:?} is empty or contains the item delimiter"
                )));
            }
            let escaped = regex::escape(separator);
            rules.push(SeparatorRule {
                separator: separator.clone(),
                runs: compile(&format!("(?:{escaped})+"), separator)?,
                items: compile(&format!(r"[\w{secondary}()（）]+{escaped}"), separator)?,
            });
        }

        Ok(Self {
            settings,
            canonical,
            canonical_runs,
            rules,
        })
    }

    pub fn settings(&self) -> &DelimiterSettings {
        &self.settings
    }

    /// Classify `text` and normalize its delimiters
    ///
    /// The first candidate exceeding the tolerance wins; later candidates are
    /// not examined.
    pub fn analyze(&self, text: &str) -> Analysis {
        let has_canonical = text.contains(self.settings.canonical);
        let mut working = text.to_string();

        for rule in &self.rules {
            working = rule
                .runs
                .replace_all(&working, NoExpand(&rule.separator))
                .into_owned();
            let count = rule.items.find_iter(&working).count();
            if count > self.settings.tolerance && !has_canonical {
                tracing::debug!(
                    "Separator {:?} found {} times without '{}'",
                    rule.separator,
                    count,
                    self.settings.canonical
                );
                return Analysis {
                    is_abnormal: true,
                    text: working.replace(&rule.separator, &self.canonical),
                };
            }
        }

        Analysis {
            is_abnormal: false,
            text: self
                .canonical_runs
                .replace_all(&working, NoExpand(&self.canonical))
                .into_owned(),
        }
    }
}

impl Default for DelimiterAnalyzer {
    fn default() -> Self {
        // The built-in separators are plain literals and always compile.
        Self::new(DelimiterSettings::default()).expect("default separators compile")
    }
}

fn compile(pattern: &str, source: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source_err| IngredError::InvalidPattern {
        text: source.to_string(),
        source: source_err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_width_commas_are_abnormal() {
        let analyzer = DelimiterAnalyzer::default();
        let analysis = analyzer.analyze("豚肉200g，玉ねぎ1個，人参1本，塩少々，胡椒少々，油");
        assert!(analysis.is_abnormal);
        assert_eq!(
            analysis.text,
            "豚肉200g|玉ねぎ1個|人参1本|塩少々|胡椒少々|油"
        );
    }

    #[test]
    fn test_canonical_delimiter_is_never_abnormal() {
        let analyzer = DelimiterAnalyzer::default();
        let analysis = analyzer.analyze("a,b,c,d,e,f|g*1");
        assert!(!analysis.is_abnormal);
        assert_eq!(analysis.text, "a,b,c,d,e,f|g*1");
    }

    #[test]
    fn test_within_tolerance() {
        let analyzer = DelimiterAnalyzer::default();
        let analysis = analyzer.analyze("塩,胡椒,砂糖");
        assert!(!analysis.is_abnormal);
        assert_eq!(analysis.text, "塩,胡椒,砂糖");
    }

    #[test]
    fn test_repeated_separators_collapse_before_counting() {
        let analyzer = DelimiterAnalyzer::default();
        // Three terminated runs once ",,," collapses to ","
        let analysis = analyzer.analyze("a,,,b,c,d");
        assert!(analysis.is_abnormal);
        assert_eq!(analysis.text, "a|b|c|d");
    }

    #[test]
    fn test_first_qualifying_separator_wins() {
        let analyzer = DelimiterAnalyzer::default();
        let text = "a\u{3000}b\u{3000}c\u{3000}d,e,f,g";
        let analysis = analyzer.analyze(text);
        assert!(analysis.is_abnormal);
        assert_eq!(analysis.text, "a|b|c|d,e,f,g");
    }

    #[test]
    fn test_collapses_canonical_runs() {
        let analyzer = DelimiterAnalyzer::default();
        let analysis = analyzer.analyze("豚肉*200g|||玉ねぎ*1個||");
        assert!(!analysis.is_abnormal);
        assert_eq!(analysis.text, "豚肉*200g|玉ねぎ*1個|");
    }

    #[test]
    fn test_custom_tolerance() {
        let analyzer = DelimiterAnalyzer::new(DelimiterSettings {
            tolerance: 0,
            ..Default::default()
        })
        .unwrap();
        assert!(analyzer.analyze("塩,胡椒").is_abnormal);
    }

    #[test]
    fn test_invalid_settings() {
        let same = DelimiterSettings {
            secondary: '|',
            ..Default::default()
        };
        assert!(DelimiterAnalyzer::new(same).is_err());

        let empty = DelimiterSettings {
            separators: vec![String::new()],
            ..Default::default()
        };
        assert!(DelimiterAnalyzer::new(empty).is_err());
    }
}
