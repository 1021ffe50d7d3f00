//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, stances as their lowercase
//! names, identifiers as the slug or tag text itself.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use evidence_core::{
  claim::{Claim, ClaimTag},
  link::{EvidenceLink, LinkedStudy, Stance},
  study::{Study, StudyId},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Stance ──────────────────────────────────────────────────────────────────

pub fn encode_stance(s: Stance) -> &'static str {
  match s {
    Stance::Supporting => "supporting",
    Stance::Contradicting => "contradicting",
    Stance::Mixed => "mixed",
  }
}

pub fn decode_stance(s: &str) -> Result<Stance> {
  Stance::from_str(s)
    .map_err(|_| Error::Decode { column: "stance", value: s.to_owned() })
}

// ─── Integers ────────────────────────────────────────────────────────────────

fn decode_int<T: TryFrom<i64>>(column: &'static str, value: i64) -> Result<T> {
  T::try_from(value)
    .map_err(|_| Error::Decode { column, value: value.to_string() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawStudy::read`], for `SELECT {STUDY_COLUMNS}`.
pub const STUDY_COLUMNS: &str = "study_id, authors, year, journal, title, \
  pmid, doi, quality_score, verified, verified_at, landmark, study_type, \
  sample_size, population, key_finding, superseded_by";

/// [`STUDY_COLUMNS`] qualified with the `s.` table alias.
pub const STUDY_COLUMNS_S: &str = "s.study_id, s.authors, s.year, s.journal, \
  s.title, s.pmid, s.doi, s.quality_score, s.verified, s.verified_at, \
  s.landmark, s.study_type, s.sample_size, s.population, s.key_finding, \
  s.superseded_by";

/// Raw values read directly from a `studies` row.
pub struct RawStudy {
  pub study_id:      String,
  pub authors:       String,
  pub year:          i64,
  pub journal:       Option<String>,
  pub title:         Option<String>,
  pub pmid:          Option<String>,
  pub doi:           Option<String>,
  pub quality_score: i64,
  pub verified:      bool,
  pub verified_at:   Option<String>,
  pub landmark:      bool,
  pub study_type:    Option<String>,
  pub sample_size:   Option<String>,
  pub population:    Option<String>,
  pub key_finding:   Option<String>,
  pub superseded_by: Option<String>,
}

impl RawStudy {
  /// Read the study columns starting at index `base`.
  pub fn read(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      study_id:      row.get(base)?,
      authors:       row.get(base + 1)?,
      year:          row.get(base + 2)?,
      journal:       row.get(base + 3)?,
      title:         row.get(base + 4)?,
      pmid:          row.get(base + 5)?,
      doi:           row.get(base + 6)?,
      quality_score: row.get(base + 7)?,
      verified:      row.get(base + 8)?,
      verified_at:   row.get(base + 9)?,
      landmark:      row.get(base + 10)?,
      study_type:    row.get(base + 11)?,
      sample_size:   row.get(base + 12)?,
      population:    row.get(base + 13)?,
      key_finding:   row.get(base + 14)?,
      superseded_by: row.get(base + 15)?,
    })
  }

  pub fn into_study(self) -> Result<Study> {
    Ok(Study {
      study_id:      StudyId::new(self.study_id)?,
      authors:       self.authors,
      year:          decode_int("year", self.year)?,
      journal:       self.journal,
      title:         self.title,
      pmid:          self.pmid,
      doi:           self.doi,
      quality_score: decode_int("quality_score", self.quality_score)?,
      verified:      self.verified,
      verified_at:   self.verified_at.as_deref().map(decode_dt).transpose()?,
      landmark:      self.landmark,
      study_type:    self.study_type,
      sample_size:   self.sample_size,
      population:    self.population,
      key_finding:   self.key_finding,
      superseded_by: self.superseded_by.map(StudyId::new).transpose()?,
    })
  }
}

/// Raw values read directly from a `claims` row.
pub struct RawClaim {
  pub tag:                 String,
  pub meaning:             String,
  pub confidence_override: Option<String>,
}

impl RawClaim {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tag:                 row.get(0)?,
      meaning:             row.get(1)?,
      confidence_override: row.get(2)?,
    })
  }

  pub fn into_claim(self) -> Result<Claim> {
    Ok(Claim {
      tag:                 ClaimTag::new(self.tag)?,
      meaning:             self.meaning,
      confidence_override: self.confidence_override,
    })
  }
}

/// Raw values read directly from an `evidence_links` row.
pub struct RawLink {
  pub study_id: String,
  pub tag:      String,
  pub stance:   String,
  pub note:     Option<String>,
}

impl RawLink {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      study_id: row.get(0)?,
      tag:      row.get(1)?,
      stance:   row.get(2)?,
      note:     row.get(3)?,
    })
  }

  pub fn into_link(self) -> Result<EvidenceLink> {
    Ok(EvidenceLink {
      study_id: StudyId::new(self.study_id)?,
      tag:      ClaimTag::new(self.tag)?,
      stance:   decode_stance(&self.stance)?,
      note:     self.note,
    })
  }
}

/// A link row left-joined with its study. `study` is `None` only when the
/// link is orphaned, which foreign keys should make impossible.
pub struct RawLinkedStudy {
  pub link:  RawLink,
  pub study: Option<RawStudy>,
}

impl RawLinkedStudy {
  /// Expects the four link columns followed by [`STUDY_COLUMNS_S`].
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let joined: Option<String> = row.get(4)?;
    Ok(Self {
      link:  RawLink::read(row)?,
      study: joined.map(|_| RawStudy::read(row, 4)).transpose()?,
    })
  }

  pub fn into_linked(self) -> Result<LinkedStudy> {
    let link = self.link.into_link()?;
    let study = self.study.ok_or_else(|| {
      evidence_core::Error::Integrity(format!(
        "link {} → {} references a missing study",
        link.study_id, link.tag
      ))
    })?;
    Ok(LinkedStudy { link, study: study.into_study()? })
  }
}
