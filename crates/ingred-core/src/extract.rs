//! Chunked extraction of ingredient tables
//!
//! [`BatchExtractor`] pulls raw rows from a [`RowSource`] a chunk at a time,
//! splits every row and routes each recipe either to the ingredient table or,
//! when any of its records is malformed, to the error table as the original
//! row. Only one chunk is held in memory at a time.

use crate::error::{IngredError, Result};
use crate::splitter::{IngredientSplitter, SplitRecord, SplitStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Rows processed per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default name of the recipe identifier column
pub const DEFAULT_RECIPE_ID_COLUMN: &str = "recipe_id";

/// Default name of the ingredient text column
pub const DEFAULT_INGREDIENTS_COLUMN: &str = "ingredients";

/// One recipe row as read from the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIngredientLine {
    pub recipe_id: String,
    #[serde(rename = "ingredients")]
    pub text: String,
}

impl RawIngredientLine {
    pub fn new(recipe_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            text: text.into(),
        }
    }
}

/// One row of the clean ingredient table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientRow {
    pub recipe_id: String,
    pub name: String,
    pub quantity: String,
}

impl From<SplitRecord> for IngredientRow {
    fn from(record: SplitRecord) -> Self {
        Self {
            recipe_id: record.recipe_id,
            name: record.name,
            quantity: record.quantity,
        }
    }
}

/// Anything that yields raw rows in bounded chunks
pub trait RowSource {
    /// Next chunk of at most `max_rows` rows, `None` once exhausted
    fn next_chunk(&mut self, max_rows: usize) -> Result<Option<Vec<RawIngredientLine>>>;
}

impl<I> RowSource for I
where
    I: Iterator<Item = Result<RawIngredientLine>>,
{
    fn next_chunk(&mut self, max_rows: usize) -> Result<Option<Vec<RawIngredientLine>>> {
        let mut chunk = Vec::with_capacity(max_rows.min(DEFAULT_CHUNK_SIZE));
        for row in self.by_ref().take(max_rows) {
            chunk.push(row?);
        }
        Ok((!chunk.is_empty()).then_some(chunk))
    }
}

/// Chunk size and input column names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    pub chunk_size: usize,
    pub recipe_id_column: String,
    pub ingredients_column: String,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            recipe_id_column: DEFAULT_RECIPE_ID_COLUMN.to_string(),
            ingredients_column: DEFAULT_INGREDIENTS_COLUMN.to_string(),
        }
    }
}

/// Counters for an extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub chunks: usize,
    pub rows_read: usize,
    /// Rows dropped because their ingredient text was empty
    pub empty_rows: usize,
    /// Rows routed to the error table
    pub error_rows: usize,
    /// Records written to the ingredient table
    pub ingredient_rows: usize,
    pub abnormal_records: usize,
    pub warning_records: usize,
}

impl ExtractStats {
    fn merge(&mut self, other: &ExtractStats) {
        self.chunks += other.chunks;
        self.rows_read += other.rows_read;
        self.empty_rows += other.empty_rows;
        self.error_rows += other.error_rows;
        self.ingredient_rows += other.ingredient_rows;
        self.abnormal_records += other.abnormal_records;
        self.warning_records += other.warning_records;
    }
}

/// Result of processing one chunk
#[derive(Debug, Clone, Default)]
pub struct ChunkOutput {
    /// Zero-based chunk number
    pub index: usize,
    pub ingredients: Vec<IngredientRow>,
    pub errors: Vec<RawIngredientLine>,
    pub stats: ExtractStats,
}

/// Complete ingredient and error tables
#[derive(Debug, Clone, Default)]
pub struct ExtractOutput {
    pub ingredients: Vec<IngredientRow>,
    pub errors: Vec<RawIngredientLine>,
    pub stats: ExtractStats,
}

/// Streams rows through an [`IngredientSplitter`] chunk by chunk
#[derive(Debug)]
pub struct BatchExtractor {
    splitter: IngredientSplitter,
    chunk_size: usize,
}

impl BatchExtractor {
    pub fn new(splitter: IngredientSplitter, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(IngredError::InvalidConfig(
                "chunk size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            splitter,
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split every row of `rows` and separate clean recipes from malformed ones
    ///
    /// A recipe is malformed if any of its records lacks a quantity, carries
    /// extra columns, or if one of its rows produced no records at all.
    pub fn process_chunk(&self, index: usize, rows: Vec<RawIngredientLine>) -> ChunkOutput {
        let mut stats = ExtractStats {
            chunks: 1,
            rows_read: rows.len(),
            ..Default::default()
        };

        let rows: Vec<RawIngredientLine> = rows
            .into_iter()
            .filter(|row| !row.text.is_empty())
            .collect();
        stats.empty_rows = stats.rows_read - rows.len();

        let trial: Vec<Vec<SplitRecord>> = rows
            .iter()
            .map(|row| self.splitter.split_or_warn(&row.recipe_id, &row.text))
            .collect();

        let mut flagged: HashSet<String> = HashSet::new();
        for (row, records) in rows.iter().zip(&trial) {
            for record in records {
                match record.status {
                    SplitStatus::Abnormal => stats.abnormal_records += 1,
                    SplitStatus::Warning => stats.warning_records += 1,
                    SplitStatus::Ok => {}
                }
            }
            if records.is_empty() || records.iter().any(SplitRecord::is_malformed) {
                flagged.insert(row.recipe_id.clone());
            }
        }

        let mut ingredients = Vec::new();
        let mut errors = Vec::new();
        for (row, records) in rows.into_iter().zip(trial) {
            if flagged.contains(&row.recipe_id) {
                errors.push(row);
            } else {
                ingredients.extend(records.into_iter().map(IngredientRow::from));
            }
        }

        stats.error_rows = errors.len();
        stats.ingredient_rows = ingredients.len();
        tracing::debug!(
            "Chunk {}: {} rows, {} ingredient records, {} error rows",
            index,
            stats.rows_read,
            stats.ingredient_rows,
            stats.error_rows
        );

        ChunkOutput {
            index,
            ingredients,
            errors,
            stats,
        }
    }

    /// Process `source` chunk by chunk, handing each chunk's output to `on_chunk`
    ///
    /// Chunks are delivered in source order. An error from the source or from
    /// `on_chunk` stops the run.
    pub fn extract_with<S, F>(&self, source: &mut S, mut on_chunk: F) -> Result<ExtractStats>
    where
        S: RowSource + ?Sized,
        F: FnMut(ChunkOutput) -> Result<()>,
    {
        let mut stats = ExtractStats::default();
        let mut index = 0;
        while let Some(rows) = source.next_chunk(self.chunk_size)? {
            let output = self.process_chunk(index, rows);
            stats.merge(&output.stats);
            on_chunk(output)?;
            index += 1;
        }

        tracing::info!(
            "Extracted {} rows in {} chunks: {} ingredient records, {} error rows, {} empty rows",
            stats.rows_read,
            stats.chunks,
            stats.ingredient_rows,
            stats.error_rows,
            stats.empty_rows
        );
        Ok(stats)
    }

    /// Process `source` completely and return both tables
    pub fn extract<S>(&self, source: &mut S) -> Result<ExtractOutput>
    where
        S: RowSource + ?Sized,
    {
        let mut ingredients = Vec::new();
        let mut errors = Vec::new();
        let stats = self.extract_with(source, |chunk| {
            ingredients.extend(chunk.ingredients);
            errors.extend(chunk.errors);
            Ok(())
        })?;
        Ok(ExtractOutput {
            ingredients,
            errors,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::SplitSettings;
    use std::collections::HashSet;

    fn extractor(chunk_size: usize) -> BatchExtractor {
        let splitter = IngredientSplitter::new(SplitSettings::default()).unwrap();
        BatchExtractor::new(splitter, chunk_size).unwrap()
    }

    fn source(rows: &[(&str, &str)]) -> impl Iterator<Item = Result<RawIngredientLine>> {
        rows.iter()
            .map(|(id, text)| Ok(RawIngredientLine::new(*id, *text)))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_clean_and_error_rows_are_separated() {
        let rows = [
            ("1", "豚肉*200g|玉ねぎ*1個"),
            ("2", "鶏肉*200g*皮なし*冷凍"),
            ("3", "塩|胡椒*少々"),
            ("4", "卵*2個"),
        ];
        let output = extractor(10).extract(&mut source(&rows)).unwrap();

        let ids: Vec<&str> = output
            .ingredients
            .iter()
            .map(|r| r.recipe_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "1", "4"]);
        assert_eq!(output.ingredients[0].name, "豚肉");
        assert_eq!(output.ingredients[0].quantity, "200g");

        let error_ids: Vec<&str> = output.errors.iter().map(|r| r.recipe_id.as_str()).collect();
        assert_eq!(error_ids, vec!["2", "3"]);
        // Error rows keep the original text
        assert_eq!(output.errors[1].text, "塩|胡椒*少々");
    }

    #[test]
    fn test_empty_rows_are_dropped() {
        let rows = [("1", ""), ("2", "   "), ("3", "卵*1個"), ("4", "\u{3000}")];
        let output = extractor(10).extract(&mut source(&rows)).unwrap();
        assert_eq!(output.stats.empty_rows, 1);
        assert_eq!(output.ingredients.len(), 1);

        // Whitespace-only text yields no records, so the row is an error row
        let error_ids: Vec<&str> = output.errors.iter().map(|r| r.recipe_id.as_str()).collect();
        assert_eq!(error_ids, vec!["2", "4"]);
    }

    #[test]
    fn test_abnormal_and_noise_rows_go_to_errors() {
        let rows = [
            ("1", "豚肉200g，玉ねぎ1個，人参1本，塩少々"),
            ("2", "a|-"),
            ("3", "牛乳*200ml"),
        ];
        let output = extractor(10).extract(&mut source(&rows)).unwrap();
        assert_eq!(output.stats.abnormal_records, 1);
        let error_ids: Vec<&str> = output.errors.iter().map(|r| r.recipe_id.as_str()).collect();
        assert_eq!(error_ids, vec!["1", "2"]);
    }

    #[test]
    fn test_chunk_order_is_preserved() {
        let rows: Vec<(String, String)> = (0..25)
            .map(|i| (format!("{i}"), format!("材料{i}*{i}g")))
            .collect();
        let borrowed: Vec<(&str, &str)> = rows
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();

        let mut chunk_indexes = Vec::new();
        let mut ids = Vec::new();
        let stats = extractor(10)
            .extract_with(&mut source(&borrowed), |chunk| {
                chunk_indexes.push(chunk.index);
                ids.extend(chunk.ingredients.into_iter().map(|r| r.recipe_id));
                Ok(())
            })
            .unwrap();

        assert_eq!(stats.chunks, 3);
        assert_eq!(chunk_indexes, vec![0, 1, 2]);
        let expected: Vec<String> = (0..25).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_partition_property() {
        let rows = [
            ("1", "豚肉*200g|玉ねぎ*1個"),
            ("2", "鶏肉*200g*皮なし*冷凍"),
            ("3", "塩"),
            ("4", ""),
            ("5", "a,b,c,d,e"),
            ("6", "砂糖*大さじ1|醤油*大さじ2|みりん*大さじ1"),
            ("7", "*"),
            ("8", "ｂｅｅｆ＊１００ｇ"),
        ];
        let output = extractor(3).extract(&mut source(&rows)).unwrap();

        let clean: HashSet<&str> = output
            .ingredients
            .iter()
            .map(|r| r.recipe_id.as_str())
            .collect();
        let errors: HashSet<&str> = output.errors.iter().map(|r| r.recipe_id.as_str()).collect();

        for (id, text) in rows {
            if text.is_empty() {
                assert!(!clean.contains(id) && !errors.contains(id));
                continue;
            }
            assert!(
                clean.contains(id) ^ errors.contains(id),
                "recipe {id} must be in exactly one table"
            );
        }
    }

    #[test]
    fn test_source_error_stops_run() {
        let rows = vec![
            Ok(RawIngredientLine::new("1", "卵*1個")),
            Err(IngredError::MissingColumn("ingredients".to_string())),
        ];
        let result = extractor(10).extract(&mut rows.into_iter());
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let splitter = IngredientSplitter::new(SplitSettings::default()).unwrap();
        assert!(BatchExtractor::new(splitter, 0).is_err());
    }
}
