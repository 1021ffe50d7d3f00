//! Subcommand handlers. Each one is a thin wrapper over an [`EvidenceStore`]
//! call plus printing.

use std::path::Path;

use anyhow::Context as _;
use chrono::{Duration, Utc};
use clap::Args;
use evidence_core::{
  claim::ClaimTag,
  export::{self, ExportRow},
  import::ImportBatch,
  link::{EvidenceLink, Stance},
  store::EvidenceStore,
  study::{Study, StudyId},
  summary::ClaimSummary,
};
use tracing::{info, warn};

use crate::{Command, Format, settings::RegistryConfig};

#[derive(Args, Debug)]
pub struct StudyArgs {
  /// Study id; derived from the first author and year when omitted.
  #[arg(long)]
  id:          Option<StudyId>,
  #[arg(long)]
  authors:     String,
  #[arg(long)]
  year:        u16,
  #[arg(long)]
  score:       u8,
  /// Disambiguates a derived id, e.g. `metabolic` → `wang-2023-metabolic`.
  #[arg(long, conflicts_with = "id")]
  suffix:      Option<String>,
  #[arg(long)]
  journal:     Option<String>,
  #[arg(long)]
  title:       Option<String>,
  #[arg(long)]
  pmid:        Option<String>,
  #[arg(long)]
  doi:         Option<String>,
  #[arg(long)]
  study_type:  Option<String>,
  #[arg(long)]
  sample_size: Option<String>,
  #[arg(long)]
  population:  Option<String>,
  #[arg(long)]
  finding:     Option<String>,
  #[arg(long)]
  landmark:    bool,
}

impl StudyArgs {
  fn into_study(self) -> anyhow::Result<Study> {
    let id = match self.id {
      Some(id) => id,
      None => StudyId::from_citation(&self.authors, self.year, self.suffix.as_deref())?,
    };
    let mut study = Study::new(id, self.authors, self.year, self.score);
    study.journal = self.journal;
    study.title = self.title;
    study.pmid = self.pmid;
    study.doi = self.doi;
    study.study_type = self.study_type;
    study.sample_size = self.sample_size;
    study.population = self.population;
    study.key_finding = self.finding;
    study.landmark = self.landmark;
    Ok(study)
  }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
  study_id: StudyId,
  tag:      ClaimTag,
  stance:   Stance,
  #[arg(long)]
  note:     Option<String>,
}

impl From<LinkArgs> for EvidenceLink {
  fn from(args: LinkArgs) -> Self {
    let link = EvidenceLink::new(args.study_id, args.tag, args.stance);
    match args.note {
      Some(note) => link.with_note(note),
      None => link,
    }
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

pub async fn run<S: EvidenceStore>(
  store: &S,
  cfg: &RegistryConfig,
  command: Command,
) -> anyhow::Result<()> {
  match command {
    Command::Init => {
      println!("registry ready at {}", cfg.store_path.display());
    }

    Command::Import { file } => {
      let json = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
      let batch = ImportBatch::from_json(&json)
        .with_context(|| format!("rejected {}", file.display()))?;
      let report = store.import(batch).await.context("import rolled back")?;
      println!(
        "imported {} claim(s), {} study(ies), {} link(s)",
        report.claims, report.studies, report.links
      );
    }

    Command::AddStudy(args) => {
      let study = store.upsert_study(args.into_study()?).await?;
      println!("{}", study.study_id);
    }

    Command::ShowStudy { id } => {
      let study = store.get_study(id.clone()).await?;
      println!("{}", serde_json::to_string_pretty(&study)?);
      for link in store.links_for_study(id).await? {
        println!("  {} {}", link.stance.symbol(), link.tag);
      }
    }

    Command::Studies => {
      for study in store.list_studies().await? {
        let mark = if study.verified { "✓" } else { " " };
        println!("{mark} {:<28} {}", study.study_id.as_str(), study.citation());
      }
    }

    Command::Verify { id } => {
      let study = store.mark_verified(id).await?;
      if let Some(at) = study.verified_at {
        println!("{} verified at {}", study.study_id, at.to_rfc3339());
      }
    }

    Command::Supersede { old, new } => {
      let study = store.supersede(old, new).await?;
      if let Some(by) = study.superseded_by {
        println!("{} superseded by {by}", study.study_id);
      }
    }

    Command::RenameStudy { old, new } => {
      let study = store.rename_study(old, new).await?;
      println!("{}", study.study_id);
    }

    Command::DeleteStudy { id, cascade } => {
      let removed = store.delete_study(id, cascade).await?;
      println!("removed study and {removed} link(s)");
    }

    Command::Stale { days } => {
      let days = days.unwrap_or(cfg.stale_after_days);
      let cutoff = Utc::now() - Duration::days(i64::from(days));
      for study in store.stale_studies(cutoff).await? {
        let when = study
          .verified_at
          .map(|at| at.date_naive().to_string())
          .unwrap_or_else(|| "never".to_owned());
        println!("{:<28} {when}", study.study_id.as_str());
      }
    }

    Command::Define { tag, meaning } => {
      let claim = store.define_claim(tag, meaning).await?;
      println!("{}: {}", claim.tag, claim.meaning);
    }

    Command::Claims => {
      for claim in store.list_claims().await? {
        println!("{:<40} {}", claim.tag.as_str(), claim.meaning);
      }
    }

    Command::RemoveClaim { tag, cascade } => {
      let removed = store.remove_claim(tag, cascade).await?;
      println!("removed claim and {removed} link(s)");
    }

    Command::Override { tag, label } => {
      let claim = store.set_confidence_override(tag, label).await?;
      match claim.confidence_override {
        Some(label) => println!("{}: {label}", claim.tag),
        None => println!("{}: override cleared", claim.tag),
      }
    }

    Command::Link(args) => {
      store.link(args.into()).await?;
    }

    Command::Relink(args) => {
      store.relink(args.into()).await?;
    }

    Command::Unlink { study_id, tag } => {
      if !store.unlink(study_id, tag).await? {
        info!("no such link");
      }
    }

    Command::Query { tag, stance } => {
      for entry in store.query(tag, stance).await? {
        println!(
          "{} {:<28} {}",
          entry.link.stance.symbol(),
          entry.study.study_id.as_str(),
          entry.study.citation()
        );
      }
    }

    Command::Summary { tag } => {
      print_summary(&store.summarize(tag).await?);
    }

    Command::Export { format, write } => {
      let rows = store.summarize_all().await?;
      warn_empty(&rows);
      let rendered = match format {
        Format::Markdown => export::render_markdown(&rows),
        Format::Json => export::render_json(&rows)?,
      };
      match write {
        Some(path) => write_export(&path, format, &rendered)?,
        None => print!("{rendered}"),
      }
    }

    Command::Gaps { exposure } => {
      for summary in store.gaps(exposure).await? {
        let reason = summary.gap.map(|g| g.to_string()).unwrap_or_default();
        println!("{:<40} {} {reason}", summary.tag.as_str(), summary.net);
      }
    }

    Command::Incomplete => {
      let incomplete = store.incomplete_studies().await?;
      for entry in &incomplete {
        println!("{:<28} missing: {}", entry.study.study_id.as_str(), entry.missing.join(", "));
      }
      info!(count = incomplete.len(), "studies need enrichment");
    }

    Command::Stats => {
      println!("{}", serde_json::to_string_pretty(&store.stats().await?)?);
    }
  }

  Ok(())
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn print_summary(s: &ClaimSummary) {
  let best = |b: &Option<evidence_core::summary::BestStudy>| {
    b.as_ref().map(|b| b.citation.clone()).unwrap_or_else(|| "-".to_owned())
  };
  println!("claim:      {}", s.tag);
  println!(
    "counts:     {} supporting, {} contradicting, {} mixed",
    s.supporting_count, s.contradicting_count, s.mixed_count
  );
  println!("best +:     {}", best(&s.best_supporting));
  println!("best −:     {}", best(&s.best_contradicting));
  println!("net:        {}", s.net);
  println!("confidence: {}", s.confidence_label());
  if let Some(gap) = s.gap {
    println!("gap:        {gap}");
  }
}

fn warn_empty(rows: &[ExportRow]) {
  for row in rows.iter().filter(|r| r.is_empty_claim()) {
    warn!(claim = %row.tag(), "claim has no evidence links");
  }
}

fn write_export(path: &Path, format: Format, rendered: &str) -> anyhow::Result<()> {
  let contents = match (format, std::fs::read_to_string(path)) {
    (Format::Markdown, Ok(existing)) => export::splice_markdown_table(&existing, rendered)
      .with_context(|| format!("updating {}", path.display()))?,
    (_, Ok(_)) => rendered.to_owned(),
    (_, Err(e)) if e.kind() == std::io::ErrorKind::NotFound => rendered.to_owned(),
    (_, Err(e)) => {
      return Err(e).with_context(|| format!("reading {}", path.display()));
    }
  };
  std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
  info!(path = %path.display(), "wrote export");
  Ok(())
}
