//! Configuration loading for ingred.

use crate::compress::{CompressSettings, MatchMode};
use crate::delimiter::DelimiterSettings;
use crate::error::{IngredError, Result};
use crate::extract::ExtractSettings;
use crate::splitter::SplitSettings;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    pub cleaner: Option<CleanerConfig>,
    pub delimiter: Option<DelimiterConfig>,
    pub splitter: Option<SplitterConfig>,
    pub extract: Option<ExtractConfig>,
    pub compress: Option<CompressConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CleanerConfig {
    /// Symbols stripped in addition to the built-in set, as one string
    pub extra_symbols: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DelimiterConfig {
    pub canonical: Option<char>,
    pub secondary: Option<char>,
    pub separators: Option<Vec<String>>,
    pub tolerance: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SplitterConfig {
    pub max_line_chars: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ExtractConfig {
    pub chunk_size: Option<usize>,
    pub recipe_id_column: Option<String>,
    pub ingredients_column: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CompressConfig {
    pub mode: Option<MatchMode>,
    pub pattern_size_limit: Option<usize>,
    pub fuzzy_span: Option<usize>,
}

impl Config {
    pub fn delimiter_settings(&self) -> DelimiterSettings {
        let mut settings = DelimiterSettings::default();
        if let Some(delimiter) = &self.delimiter {
            if let Some(canonical) = delimiter.canonical {
                settings.canonical = canonical;
            }
            if let Some(secondary) = delimiter.secondary {
                settings.secondary = secondary;
            }
            if let Some(separators) = &delimiter.separators {
                settings.separators = separators.clone();
            }
            if let Some(tolerance) = delimiter.tolerance {
                settings.tolerance = tolerance;
            }
        }
        settings
    }

    pub fn split_settings(&self) -> SplitSettings {
        let defaults = SplitSettings::default();
        SplitSettings {
            delimiters: self.delimiter_settings(),
            max_line_chars: self
                .splitter
                .as_ref()
                .and_then(|s| s.max_line_chars)
                .unwrap_or(defaults.max_line_chars),
            extra_symbols: self
                .cleaner
                .as_ref()
                .and_then(|c| c.extra_symbols.as_deref())
                .map(|symbols| symbols.chars().filter(|c| !c.is_whitespace()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        let mut settings = ExtractSettings::default();
        if let Some(extract) = &self.extract {
            if let Some(chunk_size) = extract.chunk_size {
                settings.chunk_size = chunk_size;
            }
            if let Some(column) = &extract.recipe_id_column {
                settings.recipe_id_column = column.clone();
            }
            if let Some(column) = &extract.ingredients_column {
                settings.ingredients_column = column.clone();
            }
        }
        settings
    }

    pub fn compress_settings(&self) -> CompressSettings {
        let defaults = CompressSettings::default();
        let compress = self.compress.as_ref();
        CompressSettings {
            mode: compress.and_then(|c| c.mode).unwrap_or(defaults.mode),
            pattern_size_limit: compress
                .and_then(|c| c.pattern_size_limit)
                .unwrap_or(defaults.pattern_size_limit),
            fuzzy_span: compress
                .and_then(|c| c.fuzzy_span)
                .unwrap_or(defaults.fuzzy_span),
        }
    }
}

/// `config.toml` in the platform config directory, if one can be determined
pub fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "ingred")?;
    Some(dirs.config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|source| IngredError::Config {
        path: path.to_path_buf(),
        source,
    })
}
