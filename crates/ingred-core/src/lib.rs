//! ingred-core: Core library for recipe ingredient preprocessing
//!
//! This crate provides:
//! - Text cleaning and delimiter normalization of free-form ingredient lines
//! - Splitting lines into `(name, quantity)` records
//! - Chunked extraction of clean and error tables from CSV dumps
//! - Greedy fragment compression into JSONL cluster streams, with resume
//! - Quantity normalization and batched translation of unique values

pub mod cleaner;
pub mod compress;
pub mod config;
pub mod delimiter;
pub mod error;
pub mod extract;
pub mod fuzzy;
pub mod splitter;
pub mod table;
pub mod translate;
pub mod units;

// Re-exports
pub use cleaner::{clean, full_to_half, remove_symbols, TextCleaner};
pub use compress::{
    read_clusters, ClusterSink, CompressSettings, CompressStats, FragmentCluster,
    FragmentCompressor, JsonlClusterSink, MatchMode,
};
pub use config::{default_config_path, load_config, Config};
pub use delimiter::{Analysis, DelimiterAnalyzer, DelimiterSettings};
pub use error::{IngredError, Result};
pub use extract::{
    BatchExtractor, ChunkOutput, ExtractOutput, ExtractSettings, ExtractStats, IngredientRow,
    RawIngredientLine, RowSource,
};
pub use fuzzy::{fuzzy_search, FuzzyMatch};
pub use splitter::{IngredientSplitter, SplitRecord, SplitSettings, SplitStatus};
pub use table::{create_writer, read_pairs, CsvRowSource};
pub use translate::{BatchTranslator, TranslationTable, Translator};
pub use units::{normalize_quantity, Amount, Quantity, QuantityParse, UnitDictionary};
