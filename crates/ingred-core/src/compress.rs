//! Fragment compression: clustering near-duplicate texts
//!
//! The ingredient and quantity columns contain millions of entries but far
//! fewer distinct strings, and many distinct strings are variants of each
//! other (`塩`, `塩少々`, `塩(あれば)`). [`FragmentCompressor`] walks the
//! unique texts in first-occurrence order. Each text still in the working set
//! seeds a cluster, absorbs every remaining text its matcher accepts, and
//! those texts leave the working set. Each cluster goes to a [`ClusterSink`]
//! as soon as it is complete, so an interrupted pass keeps its output.
//!
//! The partition is greedy and depends on input order: a text absorbed by an
//! early seed is never offered to later seeds, even when it would match them
//! too. Worst case cost is O(U²) matcher calls for U unique texts.

use crate::error::{IngredError, Result};
use crate::fuzzy::{fuzzy_search, DEFAULT_SPAN};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::str::FromStr;

/// Compiled size limit for a single seed pattern
pub const DEFAULT_PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// A `(recipe_id, text)` pair
pub type Member = (String, String);

/// How a seed decides whether another text belongs to its cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The seed occurs anywhere in the text
    #[default]
    Contains,
    /// The text ends with the seed
    Suffix,
    /// Only identical texts
    Exact,
    /// The seed is found by [`fuzzy_search`]
    Fuzzy,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Contains => "contains",
            MatchMode::Suffix => "suffix",
            MatchMode::Exact => "exact",
            MatchMode::Fuzzy => "fuzzy",
        }
    }
}

impl FromStr for MatchMode {
    type Err = IngredError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "contains" => Ok(MatchMode::Contains),
            "suffix" => Ok(MatchMode::Suffix),
            "exact" => Ok(MatchMode::Exact),
            "fuzzy" => Ok(MatchMode::Fuzzy),
            other => Err(IngredError::InvalidConfig(format!(
                "unknown match mode '{other}' (expected contains, suffix, exact or fuzzy)"
            ))),
        }
    }
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for [`FragmentCompressor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressSettings {
    pub mode: MatchMode,
    pub pattern_size_limit: usize,
    /// Window width for [`MatchMode::Fuzzy`]
    pub fuzzy_span: usize,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            mode: MatchMode::default(),
            pattern_size_limit: DEFAULT_PATTERN_SIZE_LIMIT,
            fuzzy_span: DEFAULT_SPAN,
        }
    }
}

/// A seed text and every record that mapped onto it
///
/// Exactly one of `success` and `error` is non-empty. `error` is used when the
/// seed's matcher could not be built; it then holds only the seed's own records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentCluster {
    pub source: String,
    #[serde(default)]
    pub success: Vec<Member>,
    #[serde(default)]
    pub error: Vec<Member>,
}

impl FragmentCluster {
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// All records of the cluster, success first
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.success.iter().chain(self.error.iter())
    }

    pub fn len(&self) -> usize {
        self.success.len() + self.error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Destination for clusters as they are produced
pub trait ClusterSink {
    fn write_cluster(&mut self, cluster: &FragmentCluster) -> Result<()>;
}

impl ClusterSink for Vec<FragmentCluster> {
    fn write_cluster(&mut self, cluster: &FragmentCluster) -> Result<()> {
        self.push(cluster.clone());
        Ok(())
    }
}

impl<S: ClusterSink + ?Sized> ClusterSink for &mut S {
    fn write_cluster(&mut self, cluster: &FragmentCluster) -> Result<()> {
        (**self).write_cluster(cluster)
    }
}

/// Writes one JSON object per line, flushing after every cluster
pub struct JsonlClusterSink<W: Write> {
    writer: W,
    line: Vec<u8>,
}

impl JsonlClusterSink<File> {
    /// Open `path` for appending, creating it if needed
    ///
    /// A partial record left at the end of the file by an interrupted write is
    /// cut off first, so new records always start on a fresh line.
    pub fn append(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        drop_partial_line(&mut file)?;
        Ok(Self::new(file))
    }
}

/// Truncate `file` after its last newline
fn drop_partial_line(file: &mut File) -> Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut buf = [0u8; 8192];
    let mut end = len;
    let keep = loop {
        let start = end.saturating_sub(buf.len() as u64);
        let n = (end - start) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf[..n])?;
        if let Some(i) = buf[..n].iter().rposition(|&b| b == b'\n') {
            break start + i as u64 + 1;
        }
        if start == 0 {
            break 0;
        }
        end = start;
    };

    tracing::warn!("Dropping {} bytes of a partial cluster record", len - keep);
    file.set_len(keep)?;
    Ok(())
}

impl<W: Write> JsonlClusterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ClusterSink for JsonlClusterSink<W> {
    fn write_cluster(&mut self, cluster: &FragmentCluster) -> Result<()> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, cluster)?;
        self.line.push(b'\n');
        // A single write per cluster keeps every complete line a valid record
        self.writer.write_all(&self.line)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Read a cluster stream written by [`JsonlClusterSink`]
///
/// A final line that does not parse, including one cut inside a multi-byte
/// character, is treated as a write cut short by a crash and skipped.
/// Unparseable lines elsewhere are errors.
pub fn read_clusters(path: &Path) -> Result<Vec<FragmentCluster>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let lines: Vec<Vec<u8>> = reader.split(b'\n').collect::<std::io::Result<_>>()?;
    let is_blank = |line: &[u8]| line.iter().all(u8::is_ascii_whitespace);
    let last = lines.iter().rposition(|l| !is_blank(l.as_slice()));

    let mut clusters = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if is_blank(line.as_slice()) {
            continue;
        }
        // Invalid UTF-8 surfaces as a parse error here
        match serde_json::from_slice(line) {
            Ok(cluster) => clusters.push(cluster),
            Err(e) if Some(i) == last => {
                tracing::warn!(
                    "Ignoring truncated final record in {}: {}",
                    path.display(),
                    e
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(clusters)
}

/// Counters for a compression pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompressStats {
    /// Pairs with non-empty text
    pub pairs: usize,
    pub unique_texts: usize,
    pub clusters: usize,
    pub error_clusters: usize,
    /// Unique texts skipped because an earlier pass already clustered them
    pub resumed_texts: usize,
}

/// Fold bracket variants onto `<` and `>`
fn normalize_brackets(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '(' | '[' | '{' | '【' | '「' | '《' | '（' => '<',
            ')' | ']' | '}' | '】' | '」' | '》' | '）' => '>',
            other => other,
        })
        .collect()
}

/// Compiled membership test for one seed
enum Matcher {
    Exact,
    Pattern(Regex),
    Fuzzy { snippet: String, span: usize },
}

impl Matcher {
    fn build(seed: &str, settings: &CompressSettings) -> Result<Self> {
        let literal = regex::escape(seed);
        let pattern = match settings.mode {
            MatchMode::Exact => return Ok(Matcher::Exact),
            MatchMode::Fuzzy => {
                return Ok(Matcher::Fuzzy {
                    snippet: seed.to_string(),
                    span: settings.fuzzy_span,
                })
            }
            MatchMode::Contains => literal,
            MatchMode::Suffix => format!("{literal}$"),
        };
        RegexBuilder::new(&pattern)
            .size_limit(settings.pattern_size_limit)
            .build()
            .map(Matcher::Pattern)
            .map_err(|source| IngredError::InvalidPattern {
                text: seed.to_string(),
                source,
            })
    }

    fn is_match(&self, candidate: &str) -> bool {
        match self {
            // Unique texts never equal each other
            Matcher::Exact => false,
            Matcher::Pattern(re) => re.is_match(candidate),
            Matcher::Fuzzy { snippet, span } => fuzzy_search(snippet, candidate, *span).is_some(),
        }
    }
}

/// One distinct text of the working set
struct UniqueText<'a> {
    text: &'a str,
    normalized: String,
    /// Indexes into the pair list, in input order
    members: Vec<usize>,
}

impl UniqueText<'_> {
    fn collect(&self, pairs: &[&Member]) -> Vec<Member> {
        self.members.iter().map(|&p| pairs[p].clone()).collect()
    }
}

/// Greedy clustering of `(recipe_id, text)` pairs
#[derive(Debug, Clone, Default)]
pub struct FragmentCompressor {
    settings: CompressSettings,
}

impl FragmentCompressor {
    pub fn new(settings: CompressSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CompressSettings {
        &self.settings
    }

    /// Cluster `pairs`, writing each cluster to `sink` as it is completed
    pub fn compress<S: ClusterSink>(&self, pairs: &[Member], sink: S) -> Result<CompressStats> {
        self.compress_resume(pairs, &[], sink)
    }

    /// Cluster `pairs` and collect the clusters
    pub fn compress_collect(&self, pairs: &[Member]) -> Result<Vec<FragmentCluster>> {
        let mut clusters = Vec::new();
        self.compress(pairs, &mut clusters)?;
        Ok(clusters)
    }

    /// Continue a pass whose earlier output is `done`
    ///
    /// Texts already present in `done` are removed from the working set up
    /// front, so they are neither seeds nor members of new clusters.
    pub fn compress_resume<S: ClusterSink>(
        &self,
        pairs: &[Member],
        done: &[FragmentCluster],
        mut sink: S,
    ) -> Result<CompressStats> {
        let pairs: Vec<&Member> = pairs
            .iter()
            .filter(|(_, text)| !text.is_empty())
            .collect();

        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut uniques: Vec<UniqueText> = Vec::new();
        for (i, (_, text)) in pairs.iter().enumerate() {
            let slot = *positions.entry(text.as_str()).or_insert_with(|| {
                uniques.push(UniqueText {
                    text: text.as_str(),
                    normalized: normalize_brackets(text),
                    members: Vec::new(),
                });
                uniques.len() - 1
            });
            uniques[slot].members.push(i);
        }

        let mut stats = CompressStats {
            pairs: pairs.len(),
            unique_texts: uniques.len(),
            ..Default::default()
        };

        let mut removed = vec![false; uniques.len()];
        if !done.is_empty() {
            let finished: HashSet<&str> = done
                .iter()
                .flat_map(|c| c.members().map(|(_, text)| text.as_str()))
                .collect();
            for (i, unique) in uniques.iter().enumerate() {
                if finished.contains(unique.text) {
                    removed[i] = true;
                    stats.resumed_texts += 1;
                }
            }
        }
        let mut remaining = uniques.len() - stats.resumed_texts;

        for i in 0..uniques.len() {
            if removed[i] {
                continue;
            }
            removed[i] = true;
            remaining -= 1;

            let seed = &uniques[i];
            let cluster = match Matcher::build(&seed.normalized, &self.settings) {
                Ok(matcher) => {
                    let mut success = seed.collect(&pairs);
                    for j in (i + 1)..uniques.len() {
                        if !removed[j] && matcher.is_match(&uniques[j].normalized) {
                            removed[j] = true;
                            remaining -= 1;
                            success.extend(uniques[j].collect(&pairs));
                        }
                    }
                    FragmentCluster {
                        source: seed.text.to_string(),
                        success,
                        error: Vec::new(),
                    }
                }
                Err(e) => {
                    tracing::warn!("Seed kept as error entry: {}", e);
                    stats.error_clusters += 1;
                    FragmentCluster {
                        source: seed.text.to_string(),
                        success: Vec::new(),
                        error: seed.collect(&pairs),
                    }
                }
            };

            sink.write_cluster(&cluster)?;
            stats.clusters += 1;
            tracing::debug!(
                "Cluster '{}' took {} records, {} texts left",
                cluster.source,
                cluster.len(),
                remaining
            );
        }

        tracing::info!(
            "Compressed {} pairs ({} unique texts) into {} clusters",
            stats.pairs,
            stats.unique_texts,
            stats.clusters
        );
        Ok(stats)
    }
}
