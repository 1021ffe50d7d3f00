//! The `EvidenceStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `evidence-store-sqlite`).
//! The CLI depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  claim::{Claim, ClaimTag},
  export::ExportRow,
  import::{ImportBatch, ImportReport},
  link::{ClaimLinks, EvidenceLink, Stance},
  study::{Study, StudyId},
  summary::{self, ClaimSummary, SummaryThresholds},
};

/// A study paired with the descriptive fields it still lacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncompleteStudy {
  pub study:   Study,
  pub missing: Vec<&'static str>,
}

/// Registry-wide counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
  pub studies:             usize,
  pub verified:            usize,
  pub with_doi:            usize,
  pub landmarks:           usize,
  pub superseded:          usize,
  pub claims:              usize,
  pub supporting_links:    usize,
  pub contradicting_links: usize,
  pub mixed_links:         usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an evidence registry backend.
///
/// Referential integrity is enforced at write time: a link can only name an
/// existing study and an existing claim, and neither can be removed while
/// links reference it unless the caller asks for a cascade. Multi-step writes
/// are atomic, and reads come from a consistent snapshot.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait EvidenceStore: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  /// The cut-offs used by [`EvidenceStore::summarize`].
  fn thresholds(&self) -> &SummaryThresholds;

  // ── Study store ───────────────────────────────────────────────────────

  /// Insert or replace a study keyed by its id. Links to it are kept.
  ///
  /// Fails validation when the record is malformed or claims to be verified
  /// without both a PMID and a DOI.
  fn upsert_study(
    &self,
    study: Study,
  ) -> impl Future<Output = Result<Study, Self::Error>> + Send + '_;

  /// Retrieve a study; `NotFound` if absent.
  fn get_study(
    &self,
    id: StudyId,
  ) -> impl Future<Output = Result<Study, Self::Error>> + Send + '_;

  fn list_studies(
    &self,
  ) -> impl Future<Output = Result<Vec<Study>, Self::Error>> + Send + '_;

  /// Delete a study. With `cascade`, its links are deleted first in the same
  /// transaction; without, any link makes this a `Conflict`. Returns the
  /// number of links removed.
  fn delete_study(
    &self,
    id: StudyId,
    cascade: bool,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Flip `verified` to true. `Conflict` if the PMID or DOI is missing.
  /// Already-verified studies are returned unchanged.
  fn mark_verified(
    &self,
    id: StudyId,
  ) -> impl Future<Output = Result<Study, Self::Error>> + Send + '_;

  /// Rename a study, carrying every link (and supersession pointer) along.
  fn rename_study(
    &self,
    old: StudyId,
    new: StudyId,
  ) -> impl Future<Output = Result<Study, Self::Error>> + Send + '_;

  /// Record that `new` replaces `old` editorially. Links are untouched.
  fn supersede(
    &self,
    old: StudyId,
    new: StudyId,
  ) -> impl Future<Output = Result<Study, Self::Error>> + Send + '_;

  /// Studies never verified, or verified before `cutoff`; oldest first.
  fn stale_studies(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Study>, Self::Error>> + Send + '_;

  // ── Claim vocabulary ──────────────────────────────────────────────────

  /// Define a claim tag. Re-defining with the same meaning is a no-op;
  /// a different meaning is a `Conflict`.
  fn define_claim(
    &self,
    tag: ClaimTag,
    meaning: String,
  ) -> impl Future<Output = Result<Claim, Self::Error>> + Send + '_;

  /// The meaning of a tag; `NotFound` if absent.
  fn resolve_claim(
    &self,
    tag: ClaimTag,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  fn list_claims(
    &self,
  ) -> impl Future<Output = Result<Vec<Claim>, Self::Error>> + Send + '_;

  /// Remove a tag from the vocabulary; same cascade contract as
  /// [`EvidenceStore::delete_study`].
  fn remove_claim(
    &self,
    tag: ClaimTag,
    cascade: bool,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Set or clear the editorial confidence label of a claim.
  fn set_confidence_override(
    &self,
    tag: ClaimTag,
    label: Option<String>,
  ) -> impl Future<Output = Result<Claim, Self::Error>> + Send + '_;

  // ── Evidence links ────────────────────────────────────────────────────

  /// Attach a study to a claim. `NotFound` for missing referents,
  /// `Conflict` if the pair is already linked.
  fn link(
    &self,
    link: EvidenceLink,
  ) -> impl Future<Output = Result<EvidenceLink, Self::Error>> + Send + '_;

  /// Replace the stance (and note) of a pair in one transaction. Works
  /// whether or not the pair was linked before.
  fn relink(
    &self,
    link: EvidenceLink,
  ) -> impl Future<Output = Result<EvidenceLink, Self::Error>> + Send + '_;

  /// Remove a link. Returns whether one existed; absence is not an error.
  fn unlink(
    &self,
    study_id: StudyId,
    tag: ClaimTag,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// A consistent snapshot of a claim and its links, each joined with its
  /// study. `NotFound` if the tag is not in the vocabulary.
  fn links_for_claim(
    &self,
    tag: ClaimTag,
  ) -> impl Future<Output = Result<ClaimLinks, Self::Error>> + Send + '_;

  fn links_for_study(
    &self,
    id: StudyId,
  ) -> impl Future<Output = Result<Vec<EvidenceLink>, Self::Error>> + Send + '_;

  // ── Bulk ──────────────────────────────────────────────────────────────

  /// Write a whole batch or nothing. Every problem in the batch is reported
  /// in a single validation error.
  fn import(
    &self,
    batch: ImportBatch,
  ) -> impl Future<Output = Result<ImportReport, Self::Error>> + Send + '_;

  fn stats(
    &self,
  ) -> impl Future<Output = Result<RegistryStats, Self::Error>> + Send + '_;

  // ── Summaries ─────────────────────────────────────────────────────────

  /// Summarise one claim. `EmptyClaim` if it has no links.
  fn summarize(
    &self,
    tag: ClaimTag,
  ) -> impl Future<Output = Result<ClaimSummary, Self::Error>> + Send + '_ {
    async move {
      let links = self.links_for_claim(tag).await?;
      Ok(summary::summarize(&links, self.thresholds())?)
    }
  }

  /// One export row per vocabulary tag, sorted by tag.
  fn summarize_all(
    &self,
  ) -> impl Future<Output = Result<Vec<ExportRow>, Self::Error>> + Send + '_ {
    async move {
      let mut rows = Vec::new();
      for claim in self.list_claims().await? {
        let links = self.links_for_claim(claim.tag).await?;
        match summary::summarize(&links, self.thresholds()) {
          Ok(s) => rows.push(ExportRow::Summary(s)),
          Err(crate::Error::EmptyClaim(_)) => {
            rows.push(ExportRow::Empty(links.claim.tag))
          }
          Err(e) => return Err(e.into()),
        }
      }
      rows.sort_by(|a, b| a.tag().cmp(b.tag()));
      Ok(rows)
    }
  }

  /// Summaries flagged as lacking evidence on one side, optionally only
  /// those whose tag has the given exposure.
  fn gaps(
    &self,
    exposure: Option<String>,
  ) -> impl Future<Output = Result<Vec<ClaimSummary>, Self::Error>> + Send + '_ {
    async move {
      Ok(
        self
          .summarize_all()
          .await?
          .iter()
          .filter_map(ExportRow::summary)
          .filter(|s| s.has_gap())
          .filter(|s| exposure.as_deref().is_none_or(|e| s.tag.exposure() == e))
          .cloned()
          .collect(),
      )
    }
  }

  /// Studies with unset descriptive fields, most incomplete first.
  fn incomplete_studies(
    &self,
  ) -> impl Future<Output = Result<Vec<IncompleteStudy>, Self::Error>> + Send + '_ {
    async move {
      let mut incomplete: Vec<_> = self
        .list_studies()
        .await?
        .into_iter()
        .filter_map(|study| {
          let missing = study.missing_fields();
          (!missing.is_empty()).then_some(IncompleteStudy { study, missing })
        })
        .collect();
      incomplete.sort_by(|a, b| {
        b.missing
          .len()
          .cmp(&a.missing.len())
          .then_with(|| a.study.study_id.cmp(&b.study.study_id))
      });
      Ok(incomplete)
    }
  }

  /// Links of one stance for a claim, sorted best-first.
  fn query(
    &self,
    tag: ClaimTag,
    stance: Option<Stance>,
  ) -> impl Future<Output = Result<Vec<crate::link::LinkedStudy>, Self::Error>>
  + Send
  + '_ {
    async move {
      let links = self.links_for_claim(tag).await?;
      let mut entries: Vec<_> = links
        .into_iter()
        .filter(|e| stance.is_none_or(|s| e.link.stance == s))
        .collect();
      entries.sort_by(|a, b| {
        b.study
          .quality_score
          .cmp(&a.study.quality_score)
          .then(b.study.year.cmp(&a.study.year))
          .then_with(|| a.study.study_id.cmp(&b.study.study_id))
      });
      Ok(entries)
    }
  }
}
