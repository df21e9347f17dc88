//! Batched translation of unique table values
//!
//! Translation services charge per request and cap the request size, so the
//! unique values of a compressed column are packed into newline-joined
//! requests. A response whose line count does not match its request is
//! retried one item at a time, and items that still fail are listed in the
//! resulting [`TranslationTable`] instead of aborting the run.

use crate::error::{IngredError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Characters per request when none is configured
pub const DEFAULT_MAX_REQUEST_CHARS: usize = 4500;

/// A service that translates one request of text
pub trait Translator {
    fn translate(&self, text: &str) -> Result<String>;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn translate(&self, text: &str) -> Result<String> {
        (**self).translate(text)
    }
}

/// Source text to translation, plus the texts no request could translate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationTable {
    pub translated: BTreeMap<String, String>,
    pub failed: Vec<String>,
}

impl TranslationTable {
    pub fn lookup(&self, text: &str) -> Option<&str> {
        self.translated.get(text.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.translated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translated.is_empty()
    }
}

/// Packs texts into requests of bounded size
pub struct BatchTranslator<T> {
    translator: T,
    max_request_chars: usize,
}

impl<T: Translator> BatchTranslator<T> {
    pub fn new(translator: T, max_request_chars: usize) -> Result<Self> {
        if max_request_chars == 0 {
            return Err(IngredError::InvalidConfig(
                "max_request_chars must be positive".to_string(),
            ));
        }
        Ok(Self {
            translator,
            max_request_chars,
        })
    }

    /// Translate every distinct non-empty text once
    pub fn translate_all<'a, I>(&self, texts: I) -> TranslationTable
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = texts
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty() && seen.insert(*t))
            .collect();

        let mut table = TranslationTable::default();
        let batches = self.batches(&unique);
        tracing::info!(
            "Translating {} unique texts in {} requests",
            unique.len(),
            batches.len()
        );
        for batch in batches {
            self.translate_batch(&batch, &mut table);
        }
        if !table.failed.is_empty() {
            tracing::warn!("{} texts could not be translated", table.failed.len());
        }
        table
    }

    fn batches<'a>(&self, texts: &[&'a str]) -> Vec<Vec<&'a str>> {
        let mut batches = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_chars = 0;

        for &text in texts {
            // Multi-line texts would break the line alignment of a shared request
            if text.contains('\n') {
                batches.push(vec![text]);
                continue;
            }
            let chars = text.chars().count();
            let needed = if current.is_empty() { chars } else { chars + 1 };
            if !current.is_empty() && current_chars + needed > self.max_request_chars {
                batches.push(std::mem::take(&mut current));
                current_chars = 0;
                current.push(text);
                current_chars += chars;
            } else {
                current.push(text);
                current_chars += needed;
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    fn translate_batch(&self, batch: &[&str], table: &mut TranslationTable) {
        if let [text] = batch {
            self.translate_one(text, table);
            return;
        }

        let request = batch.join("\n");
        match self.translator.translate(&request) {
            Ok(response) => {
                let lines: Vec<&str> = response.lines().collect();
                if lines.len() == batch.len() {
                    for (source, target) in batch.iter().zip(lines) {
                        table
                            .translated
                            .insert(source.to_string(), target.trim().to_string());
                    }
                    return;
                }
                tracing::warn!(
                    "Response has {} lines for {} texts, retrying one by one",
                    lines.len(),
                    batch.len()
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Batch of {} texts failed ({}), retrying one by one",
                    batch.len(),
                    e
                );
            }
        }
        for text in batch {
            self.translate_one(text, table);
        }
    }

    fn translate_one(&self, text: &str, table: &mut TranslationTable) {
        match self.translator.translate(text) {
            Ok(response) => {
                table
                    .translated
                    .insert(text.to_string(), response.trim().to_string());
            }
            Err(e) => {
                tracing::debug!("Translation of {:?} failed: {}", text, e);
                table.failed.push(text.to_string());
            }
        }
    }
}
