//! [`SqliteStore`]: the SQLite implementation of [`EvidenceStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use tracing::{debug, info};

use evidence_core::{
  claim::{Claim, ClaimTag},
  import::{ImportBatch, ImportReport, KnownRecords},
  link::{ClaimLinks, EvidenceLink, LinkedStudy},
  store::{EvidenceStore, RegistryStats},
  study::{Study, StudyId},
  summary::SummaryThresholds,
};

use crate::{
  Result,
  encode::{
    RawClaim, RawLink, RawLinkedStudy, RawStudy, STUDY_COLUMNS, STUDY_COLUMNS_S,
    decode_dt, encode_dt, encode_stance,
  },
  schema::SCHEMA,
};

/// Domain outcome of a connection closure. The outer `tokio_rusqlite` result
/// carries database failures; this one carries the domain error across the
/// thread hop.
type Outcome<T> = std::result::Result<T, evidence_core::Error>;

type CoreError = evidence_core::Error;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An evidence registry backed by a single SQLite file.
///
/// Clones share one connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  thresholds: SummaryThresholds,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, thresholds: SummaryThresholds::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, thresholds: SummaryThresholds::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the confidence cut-offs used by summaries.
  pub fn with_thresholds(mut self, thresholds: SummaryThresholds) -> Self {
    self.thresholds = thresholds;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_claim(&self, tag: ClaimTag) -> Result<Claim> {
    let tag_str = tag.to_string();

    let raw: Option<RawClaim> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT tag, meaning, confidence_override FROM claims WHERE tag = ?1",
              rusqlite::params![tag_str],
              RawClaim::read,
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_claim(),
      None => Err(CoreError::claim_not_found(tag).into()),
    }
  }
}

// ─── Connection-level helpers ────────────────────────────────────────────────
//
// These run on the connection thread, usually inside an open transaction.

fn study_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM studies WHERE study_id = ?1",
        rusqlite::params![id],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn claim_meaning(conn: &Connection, tag: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT meaning FROM claims WHERE tag = ?1",
      rusqlite::params![tag],
      |r| r.get(0),
    )
    .optional()
}

fn claim_row(
  conn: &Connection,
  tag: &str,
) -> rusqlite::Result<Option<(String, Option<String>)>> {
  conn
    .query_row(
      "SELECT meaning, confidence_override FROM claims WHERE tag = ?1",
      rusqlite::params![tag],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()
}

fn link_exists(conn: &Connection, study_id: &str, tag: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM evidence_links WHERE study_id = ?1 AND tag = ?2",
        rusqlite::params![study_id, tag],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

fn count(conn: &Connection, sql: &str, key: &str) -> rusqlite::Result<usize> {
  let n: i64 = conn.query_row(sql, rusqlite::params![key], |r| r.get(0))?;
  Ok(n as usize)
}

/// Both referents of a link must exist.
fn check_link_referents(conn: &Connection, link: &EvidenceLink) -> rusqlite::Result<Outcome<()>> {
  if !study_exists(conn, link.study_id.as_str())? {
    return Ok(Err(CoreError::study_not_found(&link.study_id)));
  }
  if claim_meaning(conn, link.tag.as_str())?.is_none() {
    return Ok(Err(CoreError::claim_not_found(&link.tag)));
  }
  Ok(Ok(()))
}

fn insert_link(conn: &Connection, link: &EvidenceLink) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO evidence_links (study_id, tag, stance, note) VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      link.study_id.as_str(),
      link.tag.as_str(),
      encode_stance(link.stance),
      link.note.as_deref(),
    ],
  )?;
  Ok(())
}

/// Insert or replace one study row.
///
/// `verified` only ever flips false → true: once a study is verified, a
/// replacement record keeps the flag and its original `verified_at`, and must
/// therefore keep both identifiers. Returns the effective
/// `(verified, verified_at)` pair.
fn upsert_study_row(
  conn: &Connection,
  study: &Study,
  now: &str,
) -> rusqlite::Result<Outcome<(bool, Option<String>)>> {
  let previous: Option<(bool, Option<String>)> = conn
    .query_row(
      "SELECT verified, verified_at FROM studies WHERE study_id = ?1",
      rusqlite::params![study.study_id.as_str()],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;
  let (was_verified, previous_at) = previous.unwrap_or((false, None));

  let verified = study.verified || was_verified;
  let verified_at = if verified {
    previous_at
      .or_else(|| study.verified_at.map(encode_dt))
      .or_else(|| Some(now.to_owned()))
  } else {
    None
  };

  if verified && !study.has_identifiers() {
    return Ok(Err(CoreError::invalid(format!(
      "study {}: a verified study must keep both its pmid and doi",
      study.study_id
    ))));
  }
  if let Some(replacement) = &study.superseded_by
    && !study_exists(conn, replacement.as_str())?
  {
    return Ok(Err(CoreError::study_not_found(replacement)));
  }

  conn.execute(
    "INSERT INTO studies (
       study_id, authors, year, journal, title, pmid, doi, quality_score,
       verified, verified_at, landmark, study_type, sample_size, population,
       key_finding, superseded_by
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
     ON CONFLICT(study_id) DO UPDATE SET
       authors       = excluded.authors,
       year          = excluded.year,
       journal       = excluded.journal,
       title         = excluded.title,
       pmid          = excluded.pmid,
       doi           = excluded.doi,
       quality_score = excluded.quality_score,
       verified      = excluded.verified,
       verified_at   = excluded.verified_at,
       landmark      = excluded.landmark,
       study_type    = excluded.study_type,
       sample_size   = excluded.sample_size,
       population    = excluded.population,
       key_finding   = excluded.key_finding,
       superseded_by = excluded.superseded_by",
    rusqlite::params![
      study.study_id.as_str(),
      study.authors,
      i64::from(study.year),
      study.journal.as_deref(),
      study.title.as_deref(),
      study.pmid.as_deref(),
      study.doi.as_deref(),
      i64::from(study.quality_score),
      verified,
      verified_at.as_deref(),
      study.landmark,
      study.study_type.as_deref(),
      study.sample_size.as_deref(),
      study.population.as_deref(),
      study.key_finding.as_deref(),
      study.superseded_by.as_ref().map(StudyId::as_str),
    ],
  )?;

  Ok(Ok((verified, verified_at)))
}

/// Collect what an import needs to know about records outside the batch.
fn known_records(conn: &Connection, batch: &ImportBatch) -> rusqlite::Result<KnownRecords> {
  let mut known = KnownRecords::default();

  let referenced_studies: BTreeSet<&StudyId> = batch
    .links
    .iter()
    .map(|l| &l.study_id)
    .chain(batch.studies.iter().filter_map(|s| s.superseded_by.as_ref()))
    .collect();
  for id in referenced_studies {
    if study_exists(conn, id.as_str())? {
      known.studies.insert(id.clone());
    }
  }

  let referenced_claims: BTreeSet<&ClaimTag> = batch
    .claims
    .iter()
    .map(|c| &c.tag)
    .chain(batch.links.iter().map(|l| &l.tag))
    .collect();
  for tag in referenced_claims {
    if let Some((meaning, confidence_override)) = claim_row(conn, tag.as_str())? {
      let claim = Claim { tag: tag.clone(), meaning, confidence_override };
      known.claims.insert(tag.clone(), claim);
    }
  }

  for link in &batch.links {
    if link_exists(conn, link.study_id.as_str(), link.tag.as_str())? {
      known.links.insert((link.study_id.clone(), link.tag.clone()));
    }
  }

  Ok(known)
}

fn problem_lines(error: CoreError) -> Vec<String> {
  match error {
    CoreError::Validation(problems) => problems,
    other => vec![other.to_string()],
  }
}

// ─── EvidenceStore impl ──────────────────────────────────────────────────────

impl EvidenceStore for SqliteStore {
  type Error = crate::Error;

  fn thresholds(&self) -> &SummaryThresholds { &self.thresholds }

  // ── Study store ───────────────────────────────────────────────────────────

  async fn upsert_study(&self, study: Study) -> Result<Study> {
    let mut study = study.normalized();
    study.validate()?;

    let row = study.clone();
    let now = encode_dt(Utc::now());

    let outcome: Outcome<(bool, Option<String>)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = upsert_study_row(&tx, &row, &now)?;
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    let (verified, verified_at) = outcome?;
    study.verified = verified;
    study.verified_at = verified_at
      .as_deref()
      .map(decode_dt)
      .transpose()?;

    debug!(study = %study.study_id, "upserted study");
    Ok(study)
  }

  async fn get_study(&self, id: StudyId) -> Result<Study> {
    let id_str = id.to_string();

    let raw: Option<RawStudy> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {STUDY_COLUMNS} FROM studies WHERE study_id = ?1"),
              rusqlite::params![id_str],
              |row| RawStudy::read(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_study(),
      None => Err(CoreError::study_not_found(id).into()),
    }
  }

  async fn list_studies(&self) -> Result<Vec<Study>> {
    let raws: Vec<RawStudy> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {STUDY_COLUMNS} FROM studies ORDER BY study_id"))?;
        let rows = stmt
          .query_map([], |row| RawStudy::read(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudy::into_study).collect()
  }

  async fn delete_study(&self, id: StudyId, cascade: bool) -> Result<usize> {
    let id_str = id.to_string();

    let outcome: Outcome<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !study_exists(&tx, &id_str)? {
          return Ok(Err(CoreError::study_not_found(&id_str)));
        }

        let links = count(
          &tx,
          "SELECT COUNT(*) FROM evidence_links WHERE study_id = ?1",
          &id_str,
        )?;
        if links > 0 && !cascade {
          return Ok(Err(CoreError::Conflict(format!(
            "study {id_str} is referenced by {links} evidence link(s)"
          ))));
        }

        tx.execute(
          "DELETE FROM evidence_links WHERE study_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute("DELETE FROM studies WHERE study_id = ?1", rusqlite::params![id_str])?;
        tx.commit()?;
        Ok(Ok(links))
      })
      .await?;

    let removed = outcome?;
    info!(study = %id, links_removed = removed, cascade, "deleted study");
    Ok(removed)
  }

  async fn mark_verified(&self, id: StudyId) -> Result<Study> {
    let id_str = id.to_string();
    let now = encode_dt(Utc::now());

    let outcome: Outcome<bool> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let row: Option<(bool, Option<String>, Option<String>)> = tx
          .query_row(
            "SELECT verified, pmid, doi FROM studies WHERE study_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        let Some((verified, pmid, doi)) = row else {
          return Ok(Err(CoreError::study_not_found(&id_str)));
        };
        if verified {
          return Ok(Ok(false));
        }
        if pmid.is_none() || doi.is_none() {
          return Ok(Err(CoreError::Conflict(format!(
            "study {id_str} cannot be verified without both a pmid and a doi"
          ))));
        }

        tx.execute(
          "UPDATE studies SET verified = 1, verified_at = ?2 WHERE study_id = ?1",
          rusqlite::params![id_str, now],
        )?;
        tx.commit()?;
        Ok(Ok(true))
      })
      .await?;

    if outcome? {
      info!(study = %id, "marked study verified");
    }
    self.get_study(id).await
  }

  async fn rename_study(&self, old: StudyId, new: StudyId) -> Result<Study> {
    let old_str = old.to_string();
    let new_str = new.to_string();

    let outcome: Outcome<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !study_exists(&tx, &old_str)? {
          return Ok(Err(CoreError::study_not_found(&old_str)));
        }
        if study_exists(&tx, &new_str)? {
          return Ok(Err(CoreError::Conflict(format!(
            "study id {new_str} is already taken"
          ))));
        }

        let links = count(
          &tx,
          "SELECT COUNT(*) FROM evidence_links WHERE study_id = ?1",
          &old_str,
        )?;
        // Links and supersession pointers follow via ON UPDATE CASCADE.
        tx.execute(
          "UPDATE studies SET study_id = ?2 WHERE study_id = ?1",
          rusqlite::params![old_str, new_str],
        )?;
        tx.commit()?;
        Ok(Ok(links))
      })
      .await?;

    let links = outcome?;
    info!(from = %old, to = %new, links, "renamed study");
    self.get_study(new).await
  }

  async fn supersede(&self, old: StudyId, new: StudyId) -> Result<Study> {
    if old == new {
      return Err(CoreError::invalid(format!("study {old} cannot supersede itself")).into());
    }

    let old_str = old.to_string();
    let new_str = new.to_string();

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in [&old_str, &new_str] {
          if !study_exists(&tx, id)? {
            return Ok(Err(CoreError::study_not_found(id)));
          }
        }
        tx.execute(
          "UPDATE studies SET superseded_by = ?2 WHERE study_id = ?1",
          rusqlite::params![old_str, new_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome?;
    info!(study = %old, by = %new, "marked study superseded");
    self.get_study(old).await
  }

  async fn stale_studies(&self, cutoff: DateTime<Utc>) -> Result<Vec<Study>> {
    let mut stale: Vec<Study> = self
      .list_studies()
      .await?
      .into_iter()
      .filter(|s| !s.verified || s.verified_at.is_none_or(|at| at < cutoff))
      .collect();
    // Never-verified first, then oldest verification.
    stale.sort_by(|a, b| {
      a.verified_at
        .cmp(&b.verified_at)
        .then_with(|| a.study_id.cmp(&b.study_id))
    });
    Ok(stale)
  }

  // ── Claim vocabulary ──────────────────────────────────────────────────────

  async fn define_claim(&self, tag: ClaimTag, meaning: String) -> Result<Claim> {
    let meaning = Claim::new(tag.clone(), meaning).normalized().meaning;
    if meaning.is_empty() {
      return Err(CoreError::invalid(format!("claim {tag}: meaning must not be empty")).into());
    }

    let tag_str = tag.to_string();

    let outcome: Outcome<bool> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match claim_meaning(&tx, &tag_str)? {
          Some(existing) if existing == meaning => return Ok(Ok(false)),
          Some(existing) => {
            return Ok(Err(CoreError::Conflict(format!(
              "claim {tag_str} is already defined as {existing:?}"
            ))));
          }
          None => {}
        }
        tx.execute(
          "INSERT INTO claims (tag, meaning) VALUES (?1, ?2)",
          rusqlite::params![tag_str, meaning],
        )?;
        tx.commit()?;
        Ok(Ok(true))
      })
      .await?;

    if outcome? {
      info!(claim = %tag, "defined claim");
    }
    self.get_claim(tag).await
  }

  async fn resolve_claim(&self, tag: ClaimTag) -> Result<String> {
    Ok(self.get_claim(tag).await?.meaning)
  }

  async fn list_claims(&self) -> Result<Vec<Claim>> {
    let raws: Vec<RawClaim> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT tag, meaning, confidence_override FROM claims ORDER BY tag",
        )?;
        let rows = stmt
          .query_map([], RawClaim::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClaim::into_claim).collect()
  }

  async fn remove_claim(&self, tag: ClaimTag, cascade: bool) -> Result<usize> {
    let tag_str = tag.to_string();

    let outcome: Outcome<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if claim_meaning(&tx, &tag_str)?.is_none() {
          return Ok(Err(CoreError::claim_not_found(&tag_str)));
        }

        let links = count(
          &tx,
          "SELECT COUNT(*) FROM evidence_links WHERE tag = ?1",
          &tag_str,
        )?;
        if links > 0 && !cascade {
          return Ok(Err(CoreError::Conflict(format!(
            "claim {tag_str} is referenced by {links} evidence link(s)"
          ))));
        }

        tx.execute("DELETE FROM evidence_links WHERE tag = ?1", rusqlite::params![tag_str])?;
        tx.execute("DELETE FROM claims WHERE tag = ?1", rusqlite::params![tag_str])?;
        tx.commit()?;
        Ok(Ok(links))
      })
      .await?;

    let removed = outcome?;
    info!(claim = %tag, links_removed = removed, cascade, "removed claim");
    Ok(removed)
  }

  async fn set_confidence_override(
    &self,
    tag: ClaimTag,
    label: Option<String>,
  ) -> Result<Claim> {
    let tag_str = tag.to_string();
    let label = label.map(|l| l.trim().to_owned()).filter(|l| !l.is_empty());

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE claims SET confidence_override = ?2 WHERE tag = ?1",
          rusqlite::params![tag_str, label],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::claim_not_found(tag).into());
    }
    self.get_claim(tag).await
  }

  // ── Evidence links ────────────────────────────────────────────────────────

  async fn link(&self, link: EvidenceLink) -> Result<EvidenceLink> {
    let row = link.clone();

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(e) = check_link_referents(&tx, &row)? {
          return Ok(Err(e));
        }
        if link_exists(&tx, row.study_id.as_str(), row.tag.as_str())? {
          return Ok(Err(CoreError::Conflict(format!(
            "{} is already linked to {}; use relink to change its stance",
            row.study_id, row.tag
          ))));
        }
        insert_link(&tx, &row)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome?;
    debug!(study = %link.study_id, claim = %link.tag, stance = %link.stance, "linked");
    Ok(link)
  }

  async fn relink(&self, link: EvidenceLink) -> Result<EvidenceLink> {
    let row = link.clone();

    let outcome: Outcome<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(e) = check_link_referents(&tx, &row)? {
          return Ok(Err(e));
        }
        tx.execute(
          "DELETE FROM evidence_links WHERE study_id = ?1 AND tag = ?2",
          rusqlite::params![row.study_id.as_str(), row.tag.as_str()],
        )?;
        insert_link(&tx, &row)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome?;
    debug!(study = %link.study_id, claim = %link.tag, stance = %link.stance, "relinked");
    Ok(link)
  }

  async fn unlink(&self, study_id: StudyId, tag: ClaimTag) -> Result<bool> {
    let study_str = study_id.to_string();
    let tag_str = tag.to_string();

    let removed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM evidence_links WHERE study_id = ?1 AND tag = ?2",
          rusqlite::params![study_str, tag_str],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  async fn links_for_claim(&self, tag: ClaimTag) -> Result<ClaimLinks> {
    let tag_str = tag.to_string();

    let outcome: Outcome<(RawClaim, Vec<RawLinkedStudy>)> = self
      .conn
      .call(move |conn| {
        // One read transaction, so the claim and its links form a snapshot.
        let tx = conn.transaction()?;
        let claim = tx
          .query_row(
            "SELECT tag, meaning, confidence_override FROM claims WHERE tag = ?1",
            rusqlite::params![tag_str],
            RawClaim::read,
          )
          .optional()?;
        let Some(claim) = claim else {
          return Ok(Err(CoreError::claim_not_found(&tag_str)));
        };

        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT l.study_id, l.tag, l.stance, l.note, {STUDY_COLUMNS_S}
             FROM evidence_links l
             LEFT JOIN studies s ON s.study_id = l.study_id
             WHERE l.tag = ?1
             ORDER BY l.study_id"
          ))?;
          stmt
            .query_map(rusqlite::params![tag_str], RawLinkedStudy::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok(Ok((claim, rows)))
      })
      .await?;

    let (claim, rows) = outcome?;
    let entries = rows
      .into_iter()
      .map(RawLinkedStudy::into_linked)
      .collect::<Result<Vec<LinkedStudy>>>()?;

    Ok(ClaimLinks::new(claim.into_claim()?, entries))
  }

  async fn links_for_study(&self, id: StudyId) -> Result<Vec<EvidenceLink>> {
    let id_str = id.to_string();

    let outcome: Outcome<Vec<RawLink>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !study_exists(&tx, &id_str)? {
          return Ok(Err(CoreError::study_not_found(&id_str)));
        }
        let rows = {
          let mut stmt = tx.prepare(
            "SELECT study_id, tag, stance, note FROM evidence_links
             WHERE study_id = ?1 ORDER BY tag",
          )?;
          stmt
            .query_map(rusqlite::params![id_str], RawLink::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok(Ok(rows))
      })
      .await?;

    outcome?.into_iter().map(RawLink::into_link).collect()
  }

  // ── Bulk ──────────────────────────────────────────────────────────────────

  async fn import(&self, batch: ImportBatch) -> Result<ImportReport> {
    let batch = batch.normalized();
    let problems = batch.shape_problems();
    if !problems.is_empty() {
      return Err(CoreError::Validation(problems).into());
    }

    let now = encode_dt(Utc::now());

    let outcome: Outcome<ImportReport> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let known = known_records(&tx, &batch)?;
        let mut problems = batch.reference_problems(&known);
        if !problems.is_empty() {
          return Ok(Err(CoreError::Validation(problems)));
        }

        let mut report = ImportReport::default();

        for claim in &batch.claims {
          report.claims += tx.execute(
            "INSERT INTO claims (tag, meaning, confidence_override)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(tag) DO NOTHING",
            rusqlite::params![
              claim.tag.as_str(),
              claim.meaning,
              claim.confidence_override.as_deref(),
            ],
          )?;
        }

        // Supersession pointers may name studies later in the batch, so
        // rows go in first and the pointers second.
        for study in &batch.studies {
          let row = Study { superseded_by: None, ..study.clone() };
          if let Err(e) = upsert_study_row(&tx, &row, &now)? {
            problems.extend(problem_lines(e));
          }
        }
        if !problems.is_empty() {
          // Dropping the transaction rolls every write back.
          return Ok(Err(CoreError::Validation(problems)));
        }
        for study in batch.studies.iter().filter(|s| s.superseded_by.is_some()) {
          tx.execute(
            "UPDATE studies SET superseded_by = ?2 WHERE study_id = ?1",
            rusqlite::params![
              study.study_id.as_str(),
              study.superseded_by.as_ref().map(StudyId::as_str),
            ],
          )?;
        }
        report.studies = batch.studies.len();

        for link in &batch.links {
          insert_link(&tx, link)?;
        }
        report.links = batch.links.len();

        tx.commit()?;
        Ok(Ok(report))
      })
      .await?;

    let report = outcome?;
    info!(
      claims = report.claims,
      studies = report.studies,
      links = report.links,
      "imported batch"
    );
    Ok(report)
  }

  async fn stats(&self) -> Result<RegistryStats> {
    let stats = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let scalar = |sql: &str| -> rusqlite::Result<usize> {
          let n: i64 = tx.query_row(sql, [], |r| r.get(0))?;
          Ok(n as usize)
        };
        let stats = RegistryStats {
          studies:             scalar("SELECT COUNT(*) FROM studies")?,
          verified:            scalar("SELECT COUNT(*) FROM studies WHERE verified = 1")?,
          with_doi:            scalar("SELECT COUNT(*) FROM studies WHERE doi IS NOT NULL")?,
          landmarks:           scalar("SELECT COUNT(*) FROM studies WHERE landmark = 1")?,
          superseded:          scalar(
            "SELECT COUNT(*) FROM studies WHERE superseded_by IS NOT NULL",
          )?,
          claims:              scalar("SELECT COUNT(*) FROM claims")?,
          supporting_links:    scalar(
            "SELECT COUNT(*) FROM evidence_links WHERE stance = 'supporting'",
          )?,
          contradicting_links: scalar(
            "SELECT COUNT(*) FROM evidence_links WHERE stance = 'contradicting'",
          )?,
          mixed_links:         scalar(
            "SELECT COUNT(*) FROM evidence_links WHERE stance = 'mixed'",
          )?,
        };
        Ok(stats)
      })
      .await?;

    Ok(stats)
  }
}
