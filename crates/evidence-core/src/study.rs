//! Study records and the identifiers that name them.
//!
//! A study is cited by a stable slug (`mottillo-2010`). Citation metadata may
//! be incomplete while a study is being drafted, but a study cannot be marked
//! verified until both its PubMed id and its DOI are present.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Highest quality score accepted by the registry.
pub const MAX_QUALITY_SCORE: u8 = 14;

/// Earliest and latest plausible publication years.
const YEAR_RANGE: std::ops::RangeInclusive<u16> = 1800..=2100;

// ─── StudyId ─────────────────────────────────────────────────────────────────

/// A lowercase-hyphenated slug such as `mottillo-2010` or
/// `wang-2023-metabolic`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct StudyId(String);

impl StudyId {
  pub fn new(id: impl Into<String>) -> Result<Self> {
    let id = id.into();
    let well_formed = !id.is_empty()
      && id.split('-').all(|segment| {
        !segment.is_empty()
          && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
      });

    if well_formed {
      Ok(Self(id))
    } else {
      Err(Error::invalid(format!(
        "malformed study id {id:?}: expected lowercase-hyphenated author-year slug"
      )))
    }
  }

  /// Derive a slug from the first author's surname and the publication year,
  /// with an optional disambiguating suffix for author/year collisions.
  ///
  /// `"Mottillo S et al."`, 2010 → `mottillo-2010`.
  pub fn from_citation(
    authors: &str,
    year: u16,
    suffix: Option<&str>,
  ) -> Result<Self> {
    let first_author = authors
      .trim()
      .trim_matches('*')
      .split(|c: char| c.is_whitespace() || c == '&' || c == ',')
      .find(|s| !s.is_empty())
      .unwrap_or_default();
    let surname: String = first_author
      .chars()
      .filter(char::is_ascii_alphabetic)
      .map(|c| c.to_ascii_lowercase())
      .collect();

    if surname.is_empty() {
      return Err(Error::invalid(format!(
        "cannot derive a study id from authors {authors:?}"
      )));
    }

    let mut slug = format!("{surname}-{year}");
    if let Some(suffix) = suffix.map(slugify).filter(|s| !s.is_empty()) {
      slug.push('-');
      slug.push_str(&suffix);
    }
    Self::new(slug)
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

fn slugify(text: &str) -> String {
  text
    .split(|c: char| !c.is_ascii_alphanumeric())
    .filter(|s| !s.is_empty())
    .map(str::to_ascii_lowercase)
    .collect::<Vec<_>>()
    .join("-")
}

impl TryFrom<String> for StudyId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl From<StudyId> for String {
  fn from(id: StudyId) -> Self { id.0 }
}

impl FromStr for StudyId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl fmt::Display for StudyId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Identifier helpers ──────────────────────────────────────────────────────

/// Strip a resolver prefix (`https://doi.org/`, `doi:`) from a DOI.
pub fn normalize_doi(doi: &str) -> &str {
  let doi = doi.trim();
  ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
    .iter()
    .find_map(|prefix| doi.strip_prefix(prefix))
    .unwrap_or(doi)
}

fn doi_is_well_formed(doi: &str) -> bool {
  match doi.strip_prefix("10.").and_then(|rest| rest.split_once('/')) {
    Some((registrant, suffix)) => {
      !registrant.is_empty()
        && registrant.chars().all(|c| c.is_ascii_digit() || c == '.')
        && !suffix.is_empty()
        && !suffix.chars().any(char::is_whitespace)
    }
    None => false,
  }
}

fn pmid_is_well_formed(pmid: &str) -> bool {
  !pmid.is_empty() && pmid.chars().all(|c| c.is_ascii_digit())
}

// ─── Study ───────────────────────────────────────────────────────────────────

/// Citation metadata plus the editorial quality assessment of one study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
  pub study_id:      StudyId,
  pub authors:       String,
  pub year:          u16,
  /// Full journal name, never abbreviated.
  #[serde(default)]
  pub journal:       Option<String>,
  #[serde(default)]
  pub title:         Option<String>,
  /// PubMed identifier, digits only.
  #[serde(default)]
  pub pmid:          Option<String>,
  #[serde(default)]
  pub doi:           Option<String>,
  /// Conventionally 1–13; meta-analyses and landmark papers score highest.
  pub quality_score: u8,
  /// True only once the identifiers were checked against the source of record.
  #[serde(default)]
  pub verified:      bool,
  #[serde(default)]
  pub verified_at:   Option<DateTime<Utc>>,
  /// Seminal conceptual work, regardless of score.
  #[serde(default)]
  pub landmark:      bool,
  /// Design shorthand, e.g. `MA`, `RCT`, `Cohort`.
  #[serde(default)]
  pub study_type:    Option<String>,
  #[serde(default)]
  pub sample_size:   Option<String>,
  /// Population the finding applies to; `None` means everyone.
  #[serde(default)]
  pub population:    Option<String>,
  #[serde(default)]
  pub key_finding:   Option<String>,
  /// Set when a newer study replaces this one editorially.
  #[serde(default)]
  pub superseded_by: Option<StudyId>,
}

impl Study {
  /// Convenience constructor with all optional fields empty and the study
  /// unverified.
  pub fn new(
    study_id: StudyId,
    authors: impl Into<String>,
    year: u16,
    quality_score: u8,
  ) -> Self {
    Self {
      study_id,
      authors: authors.into(),
      year,
      journal: None,
      title: None,
      pmid: None,
      doi: None,
      quality_score,
      verified: false,
      verified_at: None,
      landmark: false,
      study_type: None,
      sample_size: None,
      population: None,
      key_finding: None,
      superseded_by: None,
    }
  }

  pub fn with_identifiers(
    mut self,
    pmid: impl Into<String>,
    doi: impl Into<String>,
  ) -> Self {
    self.pmid = Some(pmid.into());
    self.doi = Some(doi.into());
    self
  }

  /// Trim identifiers and drop resolver prefixes from the DOI. Blank optional
  /// fields become `None`.
  pub fn normalized(mut self) -> Self {
    fn blank_to_none(field: Option<String>) -> Option<String> {
      field.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
    }

    self.authors = self.authors.trim().to_owned();
    self.pmid = blank_to_none(self.pmid);
    self.doi = blank_to_none(self.doi).map(|d| normalize_doi(&d).to_owned());
    self.journal = blank_to_none(self.journal);
    self.title = blank_to_none(self.title);
    self.study_type = blank_to_none(self.study_type);
    self.sample_size = blank_to_none(self.sample_size);
    self.population = blank_to_none(self.population);
    self.key_finding = blank_to_none(self.key_finding);
    self
  }

  /// Descriptive fields still unset, in a fixed order.
  pub fn missing_fields(&self) -> Vec<&'static str> {
    [
      ("title", self.title.is_none()),
      ("journal", self.journal.is_none()),
      ("doi", self.doi.is_none()),
      ("study_type", self.study_type.is_none()),
      ("key_finding", self.key_finding.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, missing)| missing.then_some(field))
    .collect()
  }

  pub fn has_identifiers(&self) -> bool {
    self.pmid.is_some() && self.doi.is_some()
  }

  /// Every problem with this record, empty when it is valid.
  pub fn problems(&self) -> Vec<String> {
    let mut problems = Vec::new();

    if self.authors.trim().is_empty() {
      problems.push("authors must not be empty".to_owned());
    }
    if !YEAR_RANGE.contains(&self.year) {
      problems.push(format!("implausible publication year {}", self.year));
    }
    if self.quality_score > MAX_QUALITY_SCORE {
      problems.push(format!(
        "quality score {} exceeds {MAX_QUALITY_SCORE}",
        self.quality_score
      ));
    }
    if let Some(pmid) = &self.pmid
      && !pmid_is_well_formed(pmid)
    {
      problems.push(format!("pmid {pmid:?} must be digits only"));
    }
    if let Some(doi) = &self.doi
      && !doi_is_well_formed(doi)
    {
      problems.push(format!("malformed doi {doi:?}"));
    }
    if self.verified && !self.has_identifiers() {
      problems
        .push("cannot be verified without both a pmid and a doi".to_owned());
    }
    if self.superseded_by.as_ref() == Some(&self.study_id) {
      problems.push("cannot be superseded by itself".to_owned());
    }

    problems
  }

  pub fn validate(&self) -> Result<()> {
    let problems = self.problems();
    if problems.is_empty() {
      Ok(())
    } else {
      Err(Error::Validation(
        problems
          .into_iter()
          .map(|p| format!("study {}: {p}", self.study_id))
          .collect(),
      ))
    }
  }

  /// Short citation used in summary exports: `Authors Year (score)`.
  pub fn citation(&self) -> String {
    format!("{} {} ({})", self.authors, self.year, self.quality_score)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn study_id_accepts_slugs() {
    assert!(StudyId::new("mottillo-2010").is_ok());
    assert!(StudyId::new("wang-2023-metabolic").is_ok());
  }

  #[test]
  fn study_id_rejects_malformed() {
    for bad in ["", "Mottillo-2010", "mottillo--2010", "-2010", "wang 2023", "a-"] {
      assert!(StudyId::new(bad).is_err(), "{bad:?} should be rejected");
    }
  }

  #[test]
  fn study_id_from_citation() {
    let id = StudyId::from_citation("**Mottillo S** et al.", 2010, None).unwrap();
    assert_eq!(id.as_str(), "mottillo-2010");

    let id =
      StudyId::from_citation("Wang & Li", 2023, Some("Metabolic Health")).unwrap();
    assert_eq!(id.as_str(), "wang-2023-metabolic-health");

    assert!(StudyId::from_citation("  ", 2023, None).is_err());
  }

  #[test]
  fn normalize_strips_doi_prefix() {
    let study = Study::new(StudyId::new("a-2020").unwrap(), "A", 2020, 9)
      .with_identifiers(" 123 ", "https://doi.org/10.1016/j.jacc.2010.05.034")
      .normalized();
    assert_eq!(study.pmid.as_deref(), Some("123"));
    assert_eq!(study.doi.as_deref(), Some("10.1016/j.jacc.2010.05.034"));
    assert!(study.problems().is_empty());
  }

  #[test]
  fn verified_requires_both_identifiers() {
    let mut study = Study::new(StudyId::new("a-2020").unwrap(), "A", 2020, 9);
    study.verified = true;
    study.pmid = Some("20863990".into());
    let err = study.validate().unwrap_err();
    assert!(err.is_validation());
  }

  #[test]
  fn missing_fields_lists_unset_descriptions() {
    let mut study = Study::new(StudyId::new("a-2020").unwrap(), "A", 2020, 9);
    assert_eq!(
      study.missing_fields(),
      ["title", "journal", "doi", "study_type", "key_finding"]
    );

    study.title = Some("Sleep and mortality".into());
    study.doi = Some("10.1016/j.jacc.2010.05.034".into());
    assert_eq!(study.missing_fields(), ["journal", "study_type", "key_finding"]);
  }

  #[test]
  fn problems_lists_every_issue() {
    let mut study = Study::new(StudyId::new("a-2020").unwrap(), " ", 1200, 20);
    study.pmid = Some("PMC123".into());
    study.doi = Some("not-a-doi".into());
    assert_eq!(study.problems().len(), 5);
  }
}
