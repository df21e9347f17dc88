//! ingred - recipe ingredient normalization CLI
//!
//! Usage:
//!   ingred clean <text>             Show the cleaned form of a line
//!   ingred analyze <text>           Show delimiter analysis of a line
//!   ingred split <text>             Split a line into records
//!   ingred extract <input.csv>      Build ingredient and error tables
//!   ingred compress <table.csv>     Cluster one column into a JSONL stream
//!   ingred quantities <table.csv>   Normalize the quantity column

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use ingred_core::{
    create_writer, default_config_path, load_config, normalize_quantity, read_clusters,
    read_pairs, Analysis, BatchExtractor, ClusterSink, Config, CsvRowSource, DelimiterAnalyzer,
    FragmentCluster, FragmentCompressor, IngredientSplitter, JsonlClusterSink, MatchMode,
    SplitStatus, TextCleaner, UnitDictionary,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

mod logging;

#[derive(Parser)]
#[command(name = "ingred")]
#[command(about = "Recipe ingredient splitting, extraction and compression")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a timestamped file under this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cleaned form of an ingredient line
    Clean {
        text: String,
    },
    /// Show how the delimiter analyzer reads a line
    Analyze {
        text: String,
    },
    /// Split a line into (name, quantity) records
    Split {
        text: String,

        /// Recipe id attached to the records
        #[arg(long, default_value = "-")]
        recipe_id: String,
    },
    /// Build the ingredient and error tables from a recipe dump
    Extract {
        /// Input CSV with recipe id and ingredient columns
        input: PathBuf,

        /// Clean ingredient table
        #[arg(long, default_value = "ingredients.csv")]
        out: PathBuf,

        /// Rows of recipes that could not be split cleanly
        #[arg(long, default_value = "errors.csv")]
        errors: PathBuf,
    },
    /// Cluster the values of one ingredient table column
    Compress {
        /// Ingredient table produced by `extract`
        input: PathBuf,

        /// Column to compress (name or quantity)
        #[arg(long, default_value = "name")]
        column: String,

        /// JSONL cluster stream
        #[arg(long, default_value = "clusters.jsonl")]
        out: PathBuf,

        /// Continue an interrupted pass, skipping texts already in the output
        #[arg(long)]
        resume: bool,

        /// Match mode: contains, suffix, exact or fuzzy
        #[arg(long)]
        mode: Option<MatchMode>,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },
    /// Normalize quantities into amount and unit
    Quantities {
        /// Ingredient table produced by `extract`
        input: PathBuf,

        /// JSON dictionary of raw unit to canonical unit
        #[arg(long)]
        units: Option<PathBuf>,

        #[arg(long, default_value = "quantities.csv")]
        out: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Clean { .. } => "clean",
            Commands::Analyze { .. } => "analyze",
            Commands::Split { .. } => "split",
            Commands::Extract { .. } => "extract",
            Commands::Compress { .. } => "compress",
            Commands::Quantities { .. } => "quantities",
            Commands::Completions { .. } => "completions",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = logging::init(cli.verbose, cli.log_dir.as_deref(), cli.command.name())? {
        tracing::info!("Logging to {}", path.display());
    }

    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Clean { text } => {
            let cleaner = TextCleaner::with_extra_symbols(config.split_settings().extra_symbols);
            println!("{}", cleaner.clean(&text));
            Ok(())
        }
        Commands::Analyze { text } => cmd_analyze(&config, &text),
        Commands::Split { text, recipe_id } => cmd_split(&config, &recipe_id, &text),
        Commands::Extract { input, out, errors } => cmd_extract(&config, &input, &out, &errors),
        Commands::Compress {
            input,
            column,
            out,
            resume,
            mode,
            quiet,
        } => cmd_compress(&config, &input, &column, &out, resume, mode, quiet),
        Commands::Quantities { input, units, out } => {
            cmd_quantities(&config, &input, units.as_deref(), &out)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ingred", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };
    load_config(&path).with_context(|| format!("Failed to load config: {}", path.display()))
}

/// Clean `text` with the configured symbols, then analyze its delimiters
fn analyze_line(config: &Config, text: &str) -> Result<Analysis> {
    let cleaner = TextCleaner::with_extra_symbols(config.split_settings().extra_symbols);
    let analyzer =
        DelimiterAnalyzer::new(config.delimiter_settings()).context("Invalid delimiter settings")?;
    Ok(analyzer.analyze(&cleaner.clean(text)))
}

fn cmd_analyze(config: &Config, text: &str) -> Result<()> {
    let analysis = analyze_line(config, text)?;
    let verdict = if analysis.is_abnormal {
        "abnormal".red().bold()
    } else {
        "normal".green().bold()
    };
    println!("{} {}", verdict, analysis.text);
    Ok(())
}

fn cmd_split(config: &Config, recipe_id: &str, text: &str) -> Result<()> {
    let splitter =
        IngredientSplitter::new(config.split_settings()).context("Invalid splitter settings")?;
    for record in splitter.split_or_warn(recipe_id, text) {
        let status = match record.status {
            SplitStatus::Ok if record.is_malformed() => "malformed".yellow(),
            SplitStatus::Ok => "ok".green(),
            SplitStatus::Abnormal => "abnormal".red(),
            SplitStatus::Warning => "warning".yellow(),
        };
        let mut line = format!("{:<10} {}", status, record.name.bold());
        if !record.quantity.is_empty() {
            line.push_str(&format!("  {}", record.quantity.cyan()));
        }
        if !record.extra.is_empty() {
            line.push_str(&format!("  [{}]", record.extra.join(", ")));
        }
        println!("{line}");
    }
    Ok(())
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let sp = ProgressBar::new_spinner();
    sp.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    sp.set_message(message.to_string());
    sp.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(sp)
}

fn cmd_extract(config: &Config, input: &Path, out: &Path, errors: &Path) -> Result<()> {
    let settings = config.extract_settings();
    let splitter =
        IngredientSplitter::new(config.split_settings()).context("Invalid splitter settings")?;
    let extractor = BatchExtractor::new(splitter, settings.chunk_size)?;

    let mut source = CsvRowSource::open(
        input,
        &settings.recipe_id_column,
        &settings.ingredients_column,
    )
    .with_context(|| format!("Failed to open input table: {}", input.display()))?;
    let mut out_writer = create_writer(out)
        .with_context(|| format!("Failed to create ingredient table: {}", out.display()))?;
    let mut err_writer = create_writer(errors)
        .with_context(|| format!("Failed to create error table: {}", errors.display()))?;

    let sp = spinner("Extracting ingredients...")?;
    let mut rows_read = 0;
    let stats = extractor
        .extract_with(&mut source, |chunk| {
            for row in &chunk.ingredients {
                out_writer.serialize(row)?;
            }
            for row in &chunk.errors {
                err_writer.serialize(row)?;
            }
            rows_read += chunk.stats.rows_read;
            sp.set_message(format!("Extracting ingredients... {rows_read} rows"));
            Ok(())
        })
        .with_context(|| format!("Extraction of {} failed", input.display()))?;
    out_writer.flush().context("Failed to flush ingredient table")?;
    err_writer.flush().context("Failed to flush error table")?;
    sp.finish_and_clear();

    println!("{}", "Extraction complete!".green().bold());
    println!("  Rows read:          {}", stats.rows_read.to_string().cyan());
    println!("  Chunks:             {}", stats.chunks.to_string().cyan());
    println!(
        "  Ingredient records: {} -> {}",
        stats.ingredient_rows.to_string().cyan(),
        out.display()
    );
    println!(
        "  Error rows:         {} -> {}",
        stats.error_rows.to_string().yellow(),
        errors.display()
    );
    println!("  Empty rows:         {}", stats.empty_rows);
    Ok(())
}

/// Advances a progress bar by the records of each cluster
struct ProgressSink<S> {
    inner: S,
    pb: ProgressBar,
}

impl<S: ClusterSink> ClusterSink for ProgressSink<S> {
    fn write_cluster(&mut self, cluster: &FragmentCluster) -> ingred_core::Result<()> {
        self.inner.write_cluster(cluster)?;
        self.pb.inc(cluster.len() as u64);
        Ok(())
    }
}

/// Records of `pairs` whose text already appears in `done`
fn resumed_records(pairs: &[(String, String)], done: &[FragmentCluster]) -> usize {
    let finished: HashSet<&str> = done
        .iter()
        .flat_map(|c| c.members().map(|(_, text)| text.as_str()))
        .collect();
    pairs
        .iter()
        .filter(|(_, text)| !text.is_empty() && finished.contains(text.as_str()))
        .count()
}

fn cmd_compress(
    config: &Config,
    input: &Path,
    column: &str,
    out: &Path,
    resume: bool,
    mode: Option<MatchMode>,
    quiet: bool,
) -> Result<()> {
    let mut settings = config.compress_settings();
    if let Some(mode) = mode {
        settings.mode = mode;
    }
    let id_column = config.extract_settings().recipe_id_column;

    let pairs = read_pairs(input, &id_column, column)
        .with_context(|| format!("Failed to read column '{}' of {}", column, input.display()))?;

    let (done, writer) = if resume {
        let done = read_clusters(out)
            .with_context(|| format!("Failed to read existing clusters: {}", out.display()))?;
        let sink = JsonlClusterSink::append(out)
            .with_context(|| format!("Failed to open cluster stream: {}", out.display()))?;
        (done, sink)
    } else {
        let file = File::create(out)
            .with_context(|| format!("Failed to create cluster stream: {}", out.display()))?;
        (Vec::new(), JsonlClusterSink::new(file))
    };

    let total = pairs.iter().filter(|(_, t)| !t.is_empty()).count();
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
        );
        pb
    };
    pb.set_position(resumed_records(&pairs, &done) as u64);
    pb.set_message(format!("{column} ({})", settings.mode));

    let compressor = FragmentCompressor::new(settings);
    let sink = ProgressSink {
        inner: writer,
        pb: pb.clone(),
    };
    let stats = compressor
        .compress_resume(&pairs, &done, sink)
        .with_context(|| format!("Compression of {} failed", input.display()))?;
    pb.finish_and_clear();

    println!("{}", "Compression complete!".green().bold());
    println!("  Records:       {}", stats.pairs.to_string().cyan());
    println!("  Unique texts:  {}", stats.unique_texts.to_string().cyan());
    if stats.resumed_texts > 0 {
        println!("  Resumed texts: {}", stats.resumed_texts);
    }
    println!(
        "  Clusters:      {} -> {}",
        stats.clusters.to_string().cyan(),
        out.display()
    );
    if stats.error_clusters > 0 {
        println!(
            "  {} {} seeds kept as error entries",
            "Warning:".yellow().bold(),
            stats.error_clusters
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct QuantityRow<'a> {
    recipe_id: &'a str,
    quantity: &'a str,
    normalized: String,
    parsed: bool,
}

fn cmd_quantities(config: &Config, input: &Path, units: Option<&Path>, out: &Path) -> Result<()> {
    let units = match units {
        Some(path) => UnitDictionary::load(path)
            .with_context(|| format!("Failed to load unit dictionary: {}", path.display()))?,
        None => UnitDictionary::default(),
    };
    let id_column = config.extract_settings().recipe_id_column;
    let pairs = read_pairs(input, &id_column, "quantity")
        .with_context(|| format!("Failed to read quantities of {}", input.display()))?;

    let mut writer = create_writer(out)
        .with_context(|| format!("Failed to create quantity table: {}", out.display()))?;
    let mut parsed = 0;
    for (recipe_id, quantity) in &pairs {
        let result = normalize_quantity(quantity, &units);
        if result.is_parsed() {
            parsed += 1;
        }
        writer.serialize(QuantityRow {
            recipe_id,
            quantity,
            normalized: result.to_text(),
            parsed: result.is_parsed(),
        })?;
    }
    writer.flush().context("Failed to flush quantity table")?;

    println!("{}", "Quantities normalized!".green().bold());
    println!("  Parsed:   {}", parsed.to_string().cyan());
    println!(
        "  Unparsed: {} -> {}",
        (pairs.len() - parsed).to_string().yellow(),
        out.display()
    );
    Ok(())
}
