//! Integration tests for ingred-core
//!
//! These tests run the file-based pipeline end to end:
//! - Extract ingredient and error tables from a recipe dump
//! - Compress a column of the ingredient table into a JSONL stream
//! - Resume an interrupted compression pass
//! - Normalize the quantity column

use ingred_core::{
    create_writer, load_config, normalize_quantity, read_clusters, read_pairs, BatchExtractor,
    ClusterSink, CsvRowSource, FragmentCluster, FragmentCompressor, IngredientSplitter,
    JsonlClusterSink, RawIngredientLine, SplitSettings, UnitDictionary,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RECIPES: &str = "\
recipe_id,title,ingredients
1,カレー,豚肉*200g|玉ねぎ*1個
2,スープ,豚肉＊１００ｇ｜塩*少々
3,サラダ,塩
4,煮物,豚肉200g，玉ねぎ1個，人参1本，塩少々
5,空,
";

/// Run extraction over `RECIPES`, returning the ingredient and error table paths
fn extract_tables(dir: &Path) -> (PathBuf, PathBuf) {
    let input = dir.join("recipes.csv");
    fs::write(&input, RECIPES).unwrap();

    let ingredients = dir.join("ingredients.csv");
    let errors = dir.join("errors.csv");
    let mut out_writer = create_writer(&ingredients).unwrap();
    let mut err_writer = create_writer(&errors).unwrap();

    let splitter = IngredientSplitter::new(SplitSettings::default()).unwrap();
    let extractor = BatchExtractor::new(splitter, 2).unwrap();
    let mut source = CsvRowSource::open(&input, "recipe_id", "ingredients").unwrap();
    let stats = extractor
        .extract_with(&mut source, |chunk| {
            for row in &chunk.ingredients {
                out_writer.serialize(row)?;
            }
            for row in &chunk.errors {
                err_writer.serialize(row)?;
            }
            Ok(())
        })
        .unwrap();
    out_writer.flush().unwrap();
    err_writer.flush().unwrap();

    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.rows_read, 5);
    assert_eq!(stats.empty_rows, 1);
    assert_eq!(stats.ingredient_rows, 4);
    assert_eq!(stats.error_rows, 2);
    assert_eq!(stats.abnormal_records, 1);

    (ingredients, errors)
}

#[test]
fn test_extract_writes_both_tables() {
    let dir = TempDir::new().unwrap();
    let (ingredients, errors) = extract_tables(dir.path());

    let rows = read_pairs(&ingredients, "recipe_id", "name").unwrap();
    let names: Vec<(&str, &str)> = rows.iter().map(|(id, n)| (id.as_str(), n.as_str())).collect();
    assert_eq!(
        names,
        vec![("1", "豚肉"), ("1", "玉ねぎ"), ("2", "豚肉"), ("2", "塩")]
    );

    // Error rows keep the original text
    let failed: Vec<RawIngredientLine> = CsvRowSource::open(&errors, "recipe_id", "ingredients")
        .unwrap()
        .collect::<ingred_core::Result<_>>()
        .unwrap();
    assert_eq!(
        failed,
        vec![
            RawIngredientLine::new("3", "塩"),
            RawIngredientLine::new("4", "豚肉200g，玉ねぎ1個，人参1本，塩少々"),
        ]
    );
}

#[test]
fn test_compress_name_column_to_jsonl() {
    let dir = TempDir::new().unwrap();
    let (ingredients, _) = extract_tables(dir.path());
    let pairs = read_pairs(&ingredients, "recipe_id", "name").unwrap();

    let out = dir.path().join("clusters.jsonl");
    let sink = JsonlClusterSink::append(&out).unwrap();
    let stats = FragmentCompressor::default().compress(&pairs, sink).unwrap();
    assert_eq!(stats.pairs, 4);
    assert_eq!(stats.unique_texts, 3);
    assert_eq!(stats.clusters, 3);

    let clusters = read_clusters(&out).unwrap();
    let sources: Vec<&str> = clusters.iter().map(|c| c.source.as_str()).collect();
    assert_eq!(sources, vec!["豚肉", "玉ねぎ", "塩"]);
    assert_eq!(clusters[0].len(), 2);

    // Every record lands in exactly one cluster
    let total: usize = clusters.iter().map(FragmentCluster::len).sum();
    assert_eq!(total, pairs.len());
}

/// Fails after accepting a fixed number of clusters
struct Interrupted<S> {
    inner: S,
    remaining: usize,
}

impl<S: ClusterSink> ClusterSink for Interrupted<S> {
    fn write_cluster(&mut self, cluster: &FragmentCluster) -> ingred_core::Result<()> {
        if self.remaining == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "stopped").into());
        }
        self.remaining -= 1;
        self.inner.write_cluster(cluster)
    }
}

#[test]
fn test_interrupted_compression_resumes() {
    let dir = TempDir::new().unwrap();
    let (ingredients, _) = extract_tables(dir.path());
    let pairs = read_pairs(&ingredients, "recipe_id", "name").unwrap();
    let out = dir.path().join("clusters.jsonl");
    let compressor = FragmentCompressor::default();

    let interrupted = Interrupted {
        inner: JsonlClusterSink::append(&out).unwrap(),
        remaining: 1,
    };
    assert!(compressor.compress(&pairs, interrupted).is_err());

    // Simulate a crash in the middle of the next write
    let mut partial = fs::read(&out).unwrap();
    partial.extend_from_slice(r#"{"source":"玉"#.as_bytes());
    fs::write(&out, partial).unwrap();

    let done = read_clusters(&out).unwrap();
    assert_eq!(done.len(), 1);
    let sink = JsonlClusterSink::append(&out).unwrap();
    let stats = compressor.compress_resume(&pairs, &done, sink).unwrap();
    assert_eq!(stats.resumed_texts, 1);
    assert_eq!(stats.clusters, 2);

    let clusters = read_clusters(&out).unwrap();
    let sources: Vec<&str> = clusters.iter().map(|c| c.source.as_str()).collect();
    assert_eq!(sources, vec!["豚肉", "玉ねぎ", "塩"]);
}

#[test]
fn test_normalize_quantity_column() {
    let dir = TempDir::new().unwrap();
    let (ingredients, _) = extract_tables(dir.path());
    let units = UnitDictionary::from_pairs([("個", "pieces")]);

    let normalized: Vec<String> = read_pairs(&ingredients, "recipe_id", "quantity")
        .unwrap()
        .iter()
        .map(|(_, q)| normalize_quantity(q, &units).to_text())
        .collect();
    assert_eq!(normalized, vec!["200g", "1pieces", "100g", "少々"]);
}

#[test]
fn test_config_drives_column_names() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[extract]\nchunk_size = 1\nrecipe_id_column = \"id\"\ningredients_column = \"材料\"\n",
    )
    .unwrap();
    let config = load_config(&config_path).unwrap();
    let settings = config.extract_settings();

    let input = dir.path().join("recipes.csv");
    fs::write(&input, "id,材料\n7,卵*2個\n8,砂糖*10g|塩\n").unwrap();

    let splitter = IngredientSplitter::new(config.split_settings()).unwrap();
    let extractor = BatchExtractor::new(splitter, settings.chunk_size).unwrap();
    let mut source = CsvRowSource::open(
        &input,
        &settings.recipe_id_column,
        &settings.ingredients_column,
    )
    .unwrap();
    let output = extractor.extract(&mut source).unwrap();

    assert_eq!(output.stats.chunks, 2);
    assert_eq!(output.ingredients.len(), 1);
    assert_eq!(output.ingredients[0].name, "卵");
    assert_eq!(output.errors, vec![RawIngredientLine::new("8", "砂糖*10g|塩")]);
}
