use clap::Parser;
use config::{Config, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Suffixes of formats that are already compressed; rewriting them
/// buys nothing, so they are skipped by default.
pub const DEFAULT_IGNORE_SUFFIXES: &[&str] = &[
    // Compressed images
    "jpg", "jpeg", "png", "gif", "webp",
    // Compressed archives
    "zip", "gz", "bz2", "xz", "7z", "rar",
    // Compressed video
    "mp4", "avi", "mkv", "flv", "webm",
    // Compressed audio
    "mp3", "wav", "ogg", "flac",
    // Other
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
    "odg", "odf", "odc", "odm",
];

/// Directory the resume ledger lives in, relative to the working
/// directory.
pub const LEDGER_DIR: &str = ".inplace-recompress-resume";

#[derive(Debug, Parser)]
#[command(name = "inplace-recompress")]
#[command(
    about = "Rewrites every file in a tree onto itself so the filesystem re-evaluates compression",
    long_about = None
)]
pub struct CliArgs {
    /// Root of the directory tree to process
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Ignore files with these extension suffixes (comma separated,
    /// no leading dot); replaces the built-in list
    #[arg(long, value_delimiter = ',')]
    pub ignore: Option<Vec<String>>,

    /// Verbose per-file progress logging
    #[arg(long)]
    pub debug: bool,

    /// Don't create or use the resume database
    #[arg(long)]
    pub noresume: bool,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Optional `Config.toml` values; CLI flags take precedence.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    root_path: Option<String>,
    ignore_suffixes: Option<Vec<String>>,
    workers: Option<usize>,
}

/// Immutable run configuration, built once from defaults, the
/// optional Config.toml, and CLI arguments, then passed explicitly
/// into the processor.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub root: PathBuf,
    /// Normalized: lowercase, leading dot.
    pub ignore_suffixes: Vec<String>,
    pub worker_count: usize,
    pub resume: bool,
    pub ledger_path: PathBuf,
}

impl AppConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let builder = Config::builder()
            .add_source(ConfigFile::with_name("Config").required(false))
            .build()?;
        let settings: FileSettings = builder.try_deserialize()?;

        let root = match (&args.root, settings.root_path) {
            // The positional default is "."; an explicit Config.toml
            // root only applies when the CLI left the default alone.
            (r, Some(file_root)) if r == Path::new(".") => PathBuf::from(file_root),
            (r, _) => r.clone(),
        };

        let raw_suffixes: Vec<String> = args
            .ignore
            .clone()
            .or(settings.ignore_suffixes)
            .unwrap_or_else(|| {
                DEFAULT_IGNORE_SUFFIXES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let worker_count = args
            .workers
            .or(settings.workers)
            .filter(|&n| n > 0)
            .unwrap_or_else(num_cpus::get);

        Ok(AppConfig {
            root,
            ignore_suffixes: normalize_suffixes(&raw_suffixes),
            worker_count,
            resume: !args.noresume,
            ledger_path: PathBuf::from(LEDGER_DIR),
        })
    }

    /// Case-insensitive suffix match over the whole path string.
    /// Suffixes are normalized to carry a leading dot, so "archive.ZIP"
    /// is excluded by "zip" but "archive.zip.bak" is not.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let lowered = path.to_string_lossy().to_lowercase();
        self.ignore_suffixes
            .iter()
            .any(|suffix| lowered.ends_with(suffix.as_str()))
    }

    pub fn queue_capacity(&self) -> usize {
        self.worker_count * 2
    }
}

fn normalize_suffixes(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('.') {
                s
            } else {
                format!(".{}", s)
            }
        })
        .collect()
}
