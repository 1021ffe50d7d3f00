//! `registry`: command-line front end for the evidence registry.
//!
//! # Usage
//!
//! ```
//! registry import batch.json
//! registry link mottillo-2010 'metabolic-syndrome→mortality' +
//! registry export --format markdown --write REGISTRY.md
//! ```
//!
//! Settings come from `registry.toml` (or `--config`) and `EVIDENCE_*`
//! environment variables; `--store` overrides the database path.

mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use evidence_core::{
  claim::ClaimTag,
  link::Stance,
  study::StudyId,
};
use evidence_store_sqlite::SqliteStore;
use settings::RegistryConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "registry", version, about = "Evidence registry for claim tags")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, env = "EVIDENCE_CONFIG", default_value = "registry.toml")]
  config: PathBuf,

  /// SQLite database file; overrides `store_path` from the config.
  #[arg(short, long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Create the database if it does not exist.
  Init,

  /// Validate and write a JSON batch of claims, studies and links.
  Import { file: PathBuf },

  // ── Studies ──
  /// Insert or replace a study.
  AddStudy(commands::StudyArgs),

  /// Show one study and the claims it is linked to.
  ShowStudy { id: StudyId },

  /// List every study.
  Studies,

  /// Mark a study verified; needs both a PMID and a DOI.
  Verify { id: StudyId },

  /// Record that NEW replaces OLD.
  Supersede { old: StudyId, new: StudyId },

  /// Change a study id, carrying its links along.
  RenameStudy { old: StudyId, new: StudyId },

  DeleteStudy {
    id:      StudyId,
    /// Also delete the study's evidence links.
    #[arg(long)]
    cascade: bool,
  },

  /// Studies never verified, or verified too long ago.
  Stale {
    /// Overrides `stale_after_days`.
    #[arg(long)]
    days: Option<u32>,
  },

  // ── Claims ──
  /// Add a claim tag to the vocabulary.
  Define { tag: ClaimTag, meaning: String },

  /// List the vocabulary.
  Claims,

  RemoveClaim {
    tag:     ClaimTag,
    #[arg(long)]
    cascade: bool,
  },

  /// Set an editorial confidence label; omit LABEL to clear it.
  Override { tag: ClaimTag, label: Option<String> },

  // ── Links ──
  /// Attach a study to a claim. STANCE is supporting/contradicting/mixed or
  /// one of `+ − ±`.
  Link(commands::LinkArgs),

  /// Replace the stance of an existing link.
  Relink(commands::LinkArgs),

  Unlink { study_id: StudyId, tag: ClaimTag },

  /// Studies linked to a claim, best first.
  Query {
    tag:    ClaimTag,
    #[arg(long)]
    stance: Option<Stance>,
  },

  // ── Summaries ──
  /// Summary verdict for one claim.
  Summary { tag: ClaimTag },

  /// Summary table for every claim.
  Export {
    #[arg(long, value_enum, default_value_t = Format::Markdown)]
    format: Format,
    /// Write to FILE instead of stdout. An existing markdown file keeps
    /// everything but its summary table.
    #[arg(long, value_name = "FILE")]
    write:  Option<PathBuf>,
  },

  /// Claims lacking evidence on one side.
  Gaps {
    /// Only claims with this exposure, e.g. `sleep`.
    #[arg(long)]
    exposure: Option<String>,
  },

  /// Studies missing descriptive fields, most incomplete first.
  Incomplete,

  Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
  Markdown,
  Json,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let mut cfg = RegistryConfig::load(&cli.config)?;
  if let Some(store) = cli.store {
    cfg.store_path = store;
  }

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?
    .with_thresholds(cfg.thresholds.clone());

  commands::run(&store, &cfg, cli.command).await
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gaps_takes_an_exposure_filter() {
    let cli = Cli::try_parse_from(["registry", "gaps", "--exposure", "sleep"]).unwrap();
    assert!(matches!(cli.command, Command::Gaps { exposure: Some(e) } if e == "sleep"));

    let cli = Cli::try_parse_from(["registry", "gaps"]).unwrap();
    assert!(matches!(cli.command, Command::Gaps { exposure: None }));
  }

  #[test]
  fn incomplete_is_a_subcommand() {
    let cli = Cli::try_parse_from(["registry", "--store", "x.db", "incomplete"]).unwrap();
    assert!(matches!(cli.command, Command::Incomplete));
    assert_eq!(cli.store, Some(PathBuf::from("x.db")));
  }
}
