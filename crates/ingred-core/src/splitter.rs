//! Splitting of one ingredient line into (name, quantity) records
//!
//! A well-formed line looks like `豚肉*200g|玉ねぎ*1個`: entries separated by
//! the canonical delimiter, each entry holding a name and a quantity joined by
//! the secondary delimiter. Lines flagged by the [`DelimiterAnalyzer`] are not
//! parsed at all and come back as a single [`SplitStatus::Abnormal`] record.

use crate::cleaner::TextCleaner;
use crate::delimiter::{DelimiterAnalyzer, DelimiterSettings};
use crate::error::{IngredError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Longest line (in characters) the splitter accepts
pub const DEFAULT_MAX_LINE_CHARS: usize = 10_000;

/// Single characters that are parsing leftovers rather than ingredients
static RE_NOISE_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z*\-\p{P}]$").expect("valid noise item regex"));

/// How a record was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStatus {
    /// Parsed into name and quantity
    Ok,
    /// Delimiters looked inconsistent; `name` holds the whole rewritten line
    Abnormal,
    /// Splitting failed; `name` holds the whole original line
    Warning,
}

/// One ingredient entry of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitRecord {
    pub recipe_id: String,
    pub name: String,
    pub quantity: String,
    /// Parts beyond name and quantity
    pub extra: Vec<String>,
    pub status: SplitStatus,
}

impl SplitRecord {
    fn ok(recipe_id: &str, name: String, quantity: String, extra: Vec<String>) -> Self {
        Self {
            recipe_id: recipe_id.to_string(),
            name,
            quantity,
            extra,
            status: SplitStatus::Ok,
        }
    }

    fn placeholder(recipe_id: &str, text: &str, status: SplitStatus) -> Self {
        Self {
            recipe_id: recipe_id.to_string(),
            name: text.to_string(),
            quantity: String::new(),
            extra: Vec::new(),
            status,
        }
    }

    /// Missing quantity or extra columns
    pub fn is_malformed(&self) -> bool {
        self.quantity.is_empty() || !self.extra.is_empty()
    }
}

/// Settings for [`IngredientSplitter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSettings {
    pub delimiters: DelimiterSettings,
    pub max_line_chars: usize,
    /// Symbols stripped in addition to the built-in set
    pub extra_symbols: Vec<char>,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            delimiters: DelimiterSettings::default(),
            max_line_chars: DEFAULT_MAX_LINE_CHARS,
            extra_symbols: Vec::new(),
        }
    }
}

/// Cleans, analyzes and splits ingredient lines
#[derive(Debug)]
pub struct IngredientSplitter {
    cleaner: TextCleaner,
    analyzer: DelimiterAnalyzer,
    max_line_chars: usize,
}

impl IngredientSplitter {
    pub fn new(settings: SplitSettings) -> Result<Self> {
        Ok(Self {
            cleaner: TextCleaner::with_extra_symbols(settings.extra_symbols),
            analyzer: DelimiterAnalyzer::new(settings.delimiters)?,
            max_line_chars: settings.max_line_chars,
        })
    }

    fn canonical(&self) -> char {
        self.analyzer.settings().canonical
    }

    fn secondary(&self) -> char {
        self.analyzer.settings().secondary
    }

    /// Split one raw line into records
    ///
    /// Returns an empty vector when every entry is empty or noise.
    pub fn split(&self, recipe_id: &str, raw: &str) -> Result<Vec<SplitRecord>> {
        let len = raw.chars().count();
        if len > self.max_line_chars {
            return Err(IngredError::LineTooLong {
                len,
                limit: self.max_line_chars,
            });
        }

        let cleaned = self.cleaner.clean(raw);
        let analysis = self.analyzer.analyze(&cleaned);
        if analysis.is_abnormal {
            return Ok(vec![SplitRecord::placeholder(
                recipe_id,
                &analysis.text,
                SplitStatus::Abnormal,
            )]);
        }

        let records = analysis
            .text
            .split(self.canonical())
            .map(|item| self.tidy_item(item))
            .filter(|item| !item.is_empty() && !RE_NOISE_ITEM.is_match(item))
            .map(|item| self.split_item(recipe_id, &item))
            .collect();
        Ok(records)
    }

    /// Like [`split`](Self::split), but a failure becomes a single warning record
    pub fn split_or_warn(&self, recipe_id: &str, raw: &str) -> Vec<SplitRecord> {
        match self.split(recipe_id, raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    "Recipe {}: split failed, keeping line as warning: {}",
                    recipe_id,
                    e
                );
                vec![SplitRecord::placeholder(recipe_id, raw, SplitStatus::Warning)]
            }
        }
    }

    /// Trim whitespace and quantity delimiters, collapse delimiter runs
    fn tidy_item(&self, item: &str) -> String {
        let secondary = self.secondary();
        let trimmed = item.trim_matches(|c: char| c.is_whitespace() || c == secondary);

        let mut tidy = String::with_capacity(trimmed.len());
        let mut previous = None;
        for c in trimmed.chars() {
            if c == secondary && previous == Some(secondary) {
                continue;
            }
            tidy.push(c);
            previous = Some(c);
        }
        tidy
    }

    fn split_item(&self, recipe_id: &str, item: &str) -> SplitRecord {
        let secondary = self.secondary();
        let parts: Vec<&str> = item.split(secondary).collect();
        match parts.as_slice() {
            [name] => SplitRecord::ok(recipe_id, name.to_string(), String::new(), Vec::new()),
            [name, quantity] => {
                SplitRecord::ok(recipe_id, name.to_string(), quantity.to_string(), Vec::new())
            }
            // The quantity delimiter was part of the name, e.g. `a*b*1個`
            [first, second, quantity] => SplitRecord::ok(
                recipe_id,
                format!("{first}{secondary}{second}"),
                quantity.to_string(),
                Vec::new(),
            ),
            [name, quantity, extra @ ..] => SplitRecord::ok(
                recipe_id,
                name.to_string(),
                quantity.to_string(),
                extra.iter().map(|s| s.to_string()).collect(),
            ),
            [] => SplitRecord::ok(recipe_id, String::new(), String::new(), Vec::new()),
        }
    }
}
