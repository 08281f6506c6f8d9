use crate::codegen::checkout::{CheckoutStrategy, CommandCheckout};
use anyhow::{Context, Result};
use clap::Parser;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_INCLUDE: &str = "**/*";

/// Validator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteBackConfig {
    pub atomic_writes: bool,
    pub create_parent_dirs: bool,
    pub checkout: CheckoutStrategy,
}

impl Default for WriteBackConfig {
    fn default() -> Self {
        Self {
            atomic_writes: false,
            create_parent_dirs: true,
            checkout: CheckoutStrategy::None,
        }
    }
}

/// Settings for mirroring a staged tree of generated files into place
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub include: Vec<String>,
    pub writeback: WriteBackConfig,
    pub cooperative: bool,
    pub report: Option<PathBuf>,
    pub dry_run: bool,
}

impl MirrorConfig {
    pub fn new(source_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            include: vec![DEFAULT_INCLUDE.to_string()],
            writeback: WriteBackConfig::default(),
            cooperative: false,
            report: None,
            dry_run: false,
        }
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            source: cli_source,
            dest: cli_dest,
            include: cli_include,
            atomic_writes: cli_atomic_writes,
            no_create_dirs: cli_no_create_dirs,
            checkout_command: cli_checkout_command,
            clear_readonly: cli_clear_readonly,
            cooperative: cli_cooperative,
            report: cli_report,
            dry_run: cli_dry_run,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            source_dir: file_source_dir,
            dest_dir: file_dest_dir,
            include: file_include,
            atomic_writes: file_atomic_writes,
            create_parent_dirs: file_create_parent_dirs,
            checkout: file_checkout,
            cooperative: file_cooperative,
            report: file_report,
            dry_run: file_dry_run,
        } = file_config;

        let source_dir = cli_source
            .or(file_source_dir)
            .context("a source directory is required (--source or source_dir)")?;
        let dest_dir = cli_dest
            .or(file_dest_dir)
            .context("a destination directory is required (--dest or dest_dir)")?;

        let mut include: Vec<String> = Vec::new();
        for pattern in cli_include
            .or(file_include)
            .unwrap_or_else(|| vec![DEFAULT_INCLUDE.to_string()])
        {
            let pattern = pattern.trim();
            if !pattern.is_empty() && !include.iter().any(|seen| seen == pattern) {
                include.push(pattern.to_string());
            }
        }

        anyhow::ensure!(
            !include.is_empty(),
            "at least one include pattern must be provided"
        );

        let checkout = if let Some(command_line) = cli_checkout_command {
            let command = CommandCheckout::parse(&command_line)
                .context("checkout command must not be empty")?;
            CheckoutStrategy::Command(command)
        } else if cli_clear_readonly {
            CheckoutStrategy::ClearReadonly
        } else {
            file_checkout.unwrap_or_default()
        };

        let writeback = WriteBackConfig {
            atomic_writes: cli_atomic_writes || file_atomic_writes.unwrap_or(false),
            create_parent_dirs: !cli_no_create_dirs && file_create_parent_dirs.unwrap_or(true),
            checkout,
        };

        Ok(Self {
            source_dir,
            dest_dir,
            include,
            writeback,
            cooperative: cli_cooperative || file_cooperative.unwrap_or(false),
            report: cli_report.or(file_report),
            dry_run: cli_dry_run || file_dry_run.unwrap_or(false),
        })
    }

    /// Fail fast on settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.source_dir.exists(),
            "source directory {:?} does not exist",
            self.source_dir
        );
        anyhow::ensure!(
            self.source_dir.is_dir(),
            "source directory {:?} is not a directory",
            self.source_dir
        );
        anyhow::ensure!(
            !self.dest_dir.as_os_str().is_empty(),
            "destination directory must not be empty"
        );

        // A nested pair would mirror the previous output on every later run.
        let source = resolve_path(&self.source_dir)?;
        let dest = resolve_path(&self.dest_dir)?;
        anyhow::ensure!(
            source != dest,
            "source and destination must differ (both are {:?})",
            self.source_dir
        );
        anyhow::ensure!(
            !dest.starts_with(&source),
            "destination {:?} must not be inside source {:?}",
            self.dest_dir,
            self.source_dir
        );
        anyhow::ensure!(
            !source.starts_with(&dest),
            "source {:?} must not be inside destination {:?}",
            self.source_dir,
            self.dest_dir
        );
        self.include_set()?;
        Ok(())
    }

    pub fn include_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.include {
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid include pattern {pattern:?}"))?;
            builder.add(glob);
        }
        builder.build().context("failed to build include set")
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "codegen-writeback",
    about = "Mirror staged generated files into place, touching only files that really changed",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_SOURCE",
        value_name = "DIR",
        help = "Directory holding freshly generated files"
    )]
    pub source: Option<PathBuf>,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_DEST",
        value_name = "DIR",
        help = "Directory the generated files belong in"
    )]
    pub dest: Option<PathBuf>,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_INCLUDE",
        value_name = "GLOB",
        value_delimiter = ',',
        help = "Comma-separated globs (relative to the source) selecting files to mirror"
    )]
    pub include: Option<Vec<String>>,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_ATOMIC_WRITES",
        help = "Write through a temp file and rename into place"
    )]
    pub atomic_writes: bool,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_NO_CREATE_DIRS",
        help = "Fail instead of creating missing destination directories"
    )]
    pub no_create_dirs: bool,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_CHECKOUT_COMMAND",
        value_name = "CMD",
        help = "Command run with the file path appended before overwriting, e.g. \"p4 edit\""
    )]
    pub checkout_command: Option<String>,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_CLEAR_READONLY",
        help = "Clear the read-only attribute before overwriting"
    )]
    pub clear_readonly: bool,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_COOPERATIVE",
        help = "Use the cooperative (async) validator"
    )]
    pub cooperative: bool,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_REPORT",
        value_name = "FILE",
        help = "Write a JSON report of every file's outcome"
    )]
    pub report: Option<PathBuf>,

    #[arg(
        long,
        env = "CODEGEN_WRITEBACK_DRY_RUN",
        help = "Compare only; never check out or write"
    )]
    pub dry_run: bool,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    source_dir: Option<PathBuf>,
    dest_dir: Option<PathBuf>,
    include: Option<Vec<String>>,
    atomic_writes: Option<bool>,
    create_parent_dirs: Option<bool>,
    checkout: Option<CheckoutStrategy>,
    cooperative: Option<bool>,
    report: Option<PathBuf>,
    dry_run: Option<bool>,
}

/// Canonicalize `path` through its deepest existing ancestor, so a
/// destination that does not exist yet can still be compared with the source.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute =
        std::path::absolute(path).with_context(|| format!("failed to resolve {:?}", path))?;
    let mut missing = Vec::new();
    let mut current = absolute.as_path();

    loop {
        if let Ok(canonical) = current.canonicalize() {
            return Ok(missing
                .iter()
                .rev()
                .fold(canonical, |resolved, part| resolved.join(part)));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                current = parent;
            }
            _ => return Ok(absolute.clone()),
        }
    }
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
