//! conceptlink CLI tool
//!
//! Command-line interface for building and repairing a concept-link index.
//!
//! ## Commands
//!
//! - `build <root>`: Scan a corpus, resolve contradictions and write the snapshot
//! - `fix`: Resolve contradictions in an existing snapshot in place
//! - `cycles <root>`: Report untyped link cycles without writing anything
//!
//! Exit codes: `0` on success, `130` when interrupted with Ctrl-C, `2` for configuration errors,
//! `3` when the index lock cannot be acquired, `4` when the disk is too full to write safely,
//! `5` for an unreadable snapshot and `1` for other failures.

use clap::{Parser, Subcommand};
use conceptlink::{
    config::IndexConfig,
    pipeline::{self, corpus_root_for_index, default_output, RunOptions},
    resolver::Resolution,
    ConceptLinkError,
};
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::atomic::Ordering,
};

#[derive(Parser)]
#[command(name = "conceptlink")]
#[command(author, version, about = "Build and repair a bidirectional concept link index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: <root>/.conceptlink.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Detect and report only; never write the snapshot
    #[arg(long, global = true)]
    dry_run: bool,

    /// Directory for snapshot backups (default: <index dir>/backups)
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,

    /// Overwrite the snapshot without taking a backup first
    #[arg(long, global = true)]
    no_backup: bool,

    /// Keep only the N newest backups
    #[arg(long, global = true, value_name = "N")]
    cleanup_backups: Option<usize>,

    /// Seconds to wait for the index lock
    #[arg(long, global = true, value_name = "SECS")]
    lock_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from a corpus of markdown documents
    Build {
        /// Corpus root directory
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Snapshot path (default: <root>/.index/links.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve contradictions in an existing snapshot
    Fix {
        /// Snapshot path (default: <root>/.index/links.json)
        #[arg(short, long)]
        index: Option<PathBuf>,

        /// Corpus root whose config applies (default: two levels above the index, or .)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Report cycles in the untyped link graph
    Cycles {
        /// Corpus root directory
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Loads the config for `root` and applies command-line overrides.
    fn load_config(&self, root: &Path) -> Result<IndexConfig, ConceptLinkError> {
        let mut config = IndexConfig::discover(root, self.config.as_deref())?;
        if let Some(dir) = &self.backup_dir {
            config.backup_dir = Some(dir.clone());
        }
        if self.no_backup {
            config.backups_enabled = false;
        }
        if let Some(keep) = self.cleanup_backups {
            config.keep_backups = Some(keep);
        }
        if let Some(secs) = self.lock_timeout {
            config.lock_timeout_secs = secs;
        }
        Ok(config)
    }
}

fn print_resolutions(resolutions: &[Resolution]) {
    for resolution in resolutions {
        println!(
            "  {} => {} ({})",
            resolution.contradiction, resolution.action, resolution.rationale
        );
    }
}

fn run(cli: &Cli, opts: &RunOptions) -> Result<(), ConceptLinkError> {
    match &cli.command {
        Commands::Build { root, output } => {
            let config = cli.load_config(root)?;
            let report = pipeline::rebuild(root, output.as_deref(), &config, opts)?;
            let meta = &report.snapshot.metadata;

            println!("\n=== Build Results ===");
            println!("Documents scanned: {}", report.documents_scanned);
            println!("Concepts: {}", meta.total_concepts);
            println!("Links: {}", meta.total_links);
            println!("Broken link targets: {}", meta.broken_links.len());
            for skipped in report.skipped.iter() {
                println!("  skipped {}: {}", skipped.file, skipped.reason);
            }
            println!("Cycles: {}", report.cycles.len());
            for cycle in report.cycles.iter() {
                println!("  {}", cycle.join(" -> "));
            }
            let summary = &report.resolution.summary;
            println!(
                "Contradictions: {} ({} removed, {} need review)",
                summary.detected, report.resolution.edges_removed, summary.ambiguous
            );
            print_resolutions(&report.resolution.resolutions);
            match &report.written {
                Some(outcome) => println!("Wrote {}", outcome.path.display()),
                None => println!("Dry run; {} not written", report.output.display()),
            }
        }

        Commands::Fix { index, root } => {
            let (index, root) = match (index, root) {
                (Some(index), Some(root)) => (index.clone(), root.clone()),
                (Some(index), None) => (index.clone(), corpus_root_for_index(index)),
                (None, Some(root)) => (default_output(root), root.clone()),
                (None, None) => (default_output(Path::new(".")), PathBuf::from(".")),
            };
            let config = cli.load_config(&root)?;
            let report = pipeline::fix(&index, &config, opts)?;
            let summary = &report.resolution.summary;

            println!("\n=== Fix Results ===");
            println!(
                "Contradictions: {} ({} removed, {} need review)",
                summary.detected, report.resolution.edges_removed, summary.ambiguous
            );
            print_resolutions(&report.resolution.resolutions);
            if let Some(outcome) = &report.written {
                println!("Wrote {}", outcome.path.display());
                if let Some(backup) = &outcome.backup {
                    println!("Backup: {}", backup.display());
                }
            }
        }

        Commands::Cycles { root } => {
            let config = cli.load_config(root)?;
            let cycles = pipeline::cycles(root, &config)?;
            if cycles.is_empty() {
                println!("No cycles");
            }
            for cycle in cycles.iter() {
                println!("{}", cycle.join(" -> "));
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = RunOptions {
        dry_run: cli.dry_run,
        ..Default::default()
    };
    let flag = opts.interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping...");
        flag.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not install Ctrl-C handler: {e}");
    }

    match run(&cli, &opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(e.exit_code().clamp(1, 255) as u8)
        }
    }
}
