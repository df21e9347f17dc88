//! Tracing subscriber setup for the CLI

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level implied by the number of `-v` flags
pub fn verbosity_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// `<dir>/<command>/<YYYY-mm-dd HH-MM-SS>.log`
pub fn log_file_path(dir: &Path, command: &str, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    dir.join(command)
        .join(format!("{}.log", now.format("%Y-%m-%d %H-%M-%S")))
}

/// Install the global subscriber, returning the log file path if one was opened
pub fn init(verbose: u8, log_dir: Option<&Path>, command: &str) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::from_default_env().add_directive(verbosity_level(verbose).into());

    let (file_layer, path) = match log_dir {
        Some(dir) => {
            let path = log_file_path(dir, command, chrono::Local::now());
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }
            let file = File::create(&path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(path)
}
