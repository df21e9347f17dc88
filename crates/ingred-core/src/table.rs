//! Delimited table input and output
//!
//! Recipe dumps arrive as CSV files with arbitrary extra columns. Only the
//! identifier and text columns are read, located by header name.

use crate::error::{IngredError, Result};
use crate::extract::RawIngredientLine;
use csv::{ReaderBuilder, StringRecordsIntoIter, Writer, WriterBuilder};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Streams `(recipe_id, text)` rows out of a CSV file
///
/// Implements [`Iterator`], and therefore [`RowSource`](crate::extract::RowSource).
pub struct CsvRowSource<R: Read> {
    records: StringRecordsIntoIter<R>,
    id_index: usize,
    text_index: usize,
}

impl CsvRowSource<File> {
    /// Open `path` and locate the two named columns
    pub fn open(path: &Path, id_column: &str, text_column: &str) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, id_column, text_column)
    }
}

impl<R: Read> CsvRowSource<R> {
    pub fn from_reader(reader: R, id_column: &str, text_column: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or_else(|| IngredError::MissingColumn(name.to_string()))
        };
        let id_index = position(id_column)?;
        let text_index = position(text_column)?;

        Ok(Self {
            records: reader.into_records(),
            id_index,
            text_index,
        })
    }
}

impl<R: Read> Iterator for CsvRowSource<R> {
    type Item = Result<RawIngredientLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.map_err(IngredError::from).map(|record| {
            RawIngredientLine::new(
                record.get(self.id_index).unwrap_or_default(),
                record.get(self.text_index).unwrap_or_default(),
            )
        }))
    }
}

/// Read every `(recipe_id, text)` pair of two columns
///
/// Used to feed one column of the ingredient table to the compressor.
pub fn read_pairs(
    path: &Path,
    id_column: &str,
    text_column: &str,
) -> Result<Vec<(String, String)>> {
    CsvRowSource::open(path, id_column, text_column)?
        .map(|row| row.map(|row| (row.recipe_id, row.text)))
        .collect()
}

/// Create a CSV writer, truncating any existing file
pub fn create_writer(path: &Path) -> Result<Writer<File>> {
    let file = File::create(path)?;
    Ok(WriterBuilder::new().from_writer(file))
}
