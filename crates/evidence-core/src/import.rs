//! Bulk import of claims, studies and links from a JSON document.
//!
//! Imports are all-or-nothing. [`ImportBatch::from_json`] decodes every
//! record on its own so that a malformed record is reported alongside every
//! other offending record instead of aborting the parse. Checks against data
//! already in the store are expressed over [`KnownRecords`], which the store
//! fills inside the same transaction that commits the batch.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
  Error, Result,
  claim::{Claim, ClaimTag},
  link::EvidenceLink,
  study::{Study, StudyId},
};

/// A decoded, shape-valid import document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportBatch {
  pub claims:  Vec<Claim>,
  pub studies: Vec<Study>,
  pub links:   Vec<EvidenceLink>,
}

/// The undecoded sections of an import document.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawBatch {
  claims:  Vec<Value>,
  studies: Vec<Value>,
  links:   Vec<Value>,
}

/// What the store already holds, as far as an import needs to know.
#[derive(Debug, Clone, Default)]
pub struct KnownRecords {
  pub studies: BTreeSet<StudyId>,
  pub claims:  BTreeMap<ClaimTag, Claim>,
  pub links:   BTreeSet<(StudyId, ClaimTag)>,
}

/// Counts of records written by a successful import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
  pub claims:  usize,
  pub studies: usize,
  pub links:   usize,
}

impl ImportBatch {
  /// Decode and shape-check a JSON import document.
  ///
  /// Fails with a single [`Error::Validation`] listing every malformed
  /// record and every duplicate within the batch. A document that is not an
  /// object of record arrays fails with one `document:` line.
  pub fn from_json(json: &str) -> Result<Self> {
    let raw: RawBatch = serde_json::from_str(json)
      .map_err(|e| Error::invalid(format!("document: {e}")))?;
    let mut problems = Vec::new();

    let claims = decode_section("claim", "tag", raw.claims, &mut problems);
    let studies = decode_section("study", "study_id", raw.studies, &mut problems);
    let links = decode_section("link", "tag", raw.links, &mut problems);

    let batch = Self { claims, studies, links }.normalized();
    problems.extend(batch.shape_problems());

    if problems.is_empty() {
      Ok(batch)
    } else {
      Err(Error::Validation(problems))
    }
  }

  /// Normalise every claim and study the way single-record writes do.
  pub fn normalized(self) -> Self {
    Self {
      claims:  self.claims.into_iter().map(Claim::normalized).collect(),
      studies: self.studies.into_iter().map(Study::normalized).collect(),
      links:   self.links,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.claims.is_empty() && self.studies.is_empty() && self.links.is_empty()
  }

  /// Per-record validation plus duplicates within the batch itself.
  pub fn shape_problems(&self) -> Vec<String> {
    let mut problems = Vec::new();

    let mut seen_claims: BTreeMap<&ClaimTag, &Claim> = BTreeMap::new();
    for claim in &self.claims {
      if claim.meaning.trim().is_empty() {
        problems.push(format!("claim {}: meaning must not be empty", claim.tag));
      }
      let Some(previous) = seen_claims.insert(&claim.tag, claim) else {
        continue;
      };
      if previous.meaning != claim.meaning {
        problems.push(format!(
          "claim {}: defined twice with different meanings",
          claim.tag
        ));
      }
      if previous.confidence_override != claim.confidence_override {
        problems.push(format!(
          "claim {}: defined twice with different confidence overrides",
          claim.tag
        ));
      }
    }

    let mut seen_studies = BTreeSet::new();
    for study in &self.studies {
      problems.extend(
        study
          .problems()
          .into_iter()
          .map(|p| format!("study {}: {p}", study.study_id)),
      );
      if !seen_studies.insert(&study.study_id) {
        problems.push(format!("study {}: appears twice in batch", study.study_id));
      }
    }

    let mut seen_links = BTreeSet::new();
    for link in &self.links {
      if !seen_links.insert((&link.study_id, &link.tag)) {
        problems.push(format!(
          "link {} → {}: appears twice in batch",
          link.study_id, link.tag
        ));
      }
    }

    problems
  }

  /// Conflicts and dangling references against what the store already holds.
  pub fn reference_problems(&self, known: &KnownRecords) -> Vec<String> {
    let mut problems = Vec::new();

    for claim in &self.claims {
      let Some(existing) = known.claims.get(&claim.tag) else {
        continue;
      };
      if existing.meaning != claim.meaning {
        problems.push(format!(
          "claim {}: already defined as {:?}",
          claim.tag, existing.meaning
        ));
      }
      // An absent override leaves the stored one alone.
      if let Some(label) = &claim.confidence_override
        && existing.confidence_override.as_ref() != Some(label)
      {
        problems.push(format!(
          "claim {}: confidence override {label:?} conflicts with {:?}",
          claim.tag, existing.confidence_override
        ));
      }
    }

    let batch_studies: BTreeSet<&StudyId> =
      self.studies.iter().map(|s| &s.study_id).collect();
    let batch_claims: BTreeSet<&ClaimTag> =
      self.claims.iter().map(|c| &c.tag).collect();

    for study in &self.studies {
      if let Some(replacement) = &study.superseded_by
        && !batch_studies.contains(replacement)
        && !known.studies.contains(replacement)
      {
        problems.push(format!(
          "study {}: superseded by unknown study {replacement}",
          study.study_id
        ));
      }
    }

    for link in &self.links {
      let label = format!("link {} → {}", link.study_id, link.tag);
      if !batch_studies.contains(&link.study_id) && !known.studies.contains(&link.study_id) {
        problems.push(format!("{label}: unknown study"));
      }
      if !batch_claims.contains(&link.tag) && !known.claims.contains_key(&link.tag) {
        problems.push(format!("{label}: unknown claim"));
      }
      if known.links.contains(&(link.study_id.clone(), link.tag.clone())) {
        problems.push(format!("{label}: already linked"));
      }
    }

    problems
  }
}

/// Decode each record independently, recording failures under a label taken
/// from the record's key field (or its index when that is missing).
fn decode_section<T: DeserializeOwned>(
  section: &str,
  key: &str,
  records: Vec<Value>,
  problems: &mut Vec<String>,
) -> Vec<T> {
  records
    .into_iter()
    .enumerate()
    .filter_map(|(index, record)| {
      let label = match record.get(key).and_then(Value::as_str) {
        Some(k) => format!("{section} {k}"),
        None => format!("{section} #{index}"),
      };
      serde_json::from_value(record)
        .map_err(|e| problems.push(format!("{label}: {e}")))
        .ok()
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  const VALID: &str = r#"{
    "claims": [
      { "tag": "metabolic-syndrome→mortality", "meaning": "MetS raises all-cause mortality" }
    ],
    "studies": [
      {
        "study_id": "mottillo-2010",
        "authors": "Mottillo S et al.",
        "year": 2010,
        "journal": "Journal of the American College of Cardiology",
        "pmid": "20863953",
        "doi": "https://doi.org/10.1016/j.jacc.2010.05.034",
        "quality_score": 12
      }
    ],
    "links": [
      { "study_id": "mottillo-2010", "tag": "metabolic-syndrome→mortality", "stance": "+" }
    ]
  }"#;

  #[test]
  fn decodes_valid_batch() {
    let batch = ImportBatch::from_json(VALID).unwrap();
    assert_eq!(batch.claims.len(), 1);
    assert_eq!(batch.studies[0].doi.as_deref(), Some("10.1016/j.jacc.2010.05.034"));
    assert_eq!(batch.links[0].stance, crate::link::Stance::Supporting);
  }

  #[test]
  fn missing_sections_default_to_empty() {
    let batch = ImportBatch::from_json("{}").unwrap();
    assert!(batch.is_empty());
  }

  #[test]
  fn lists_every_offending_record() {
    let json = r#"{
      "claims": [ { "tag": "not-a-tag", "meaning": "x" } ],
      "studies": [
        { "study_id": "ok-2020", "authors": "Ok", "year": 2020, "quality_score": 9 },
        { "study_id": "bad-2020", "authors": "Bad", "year": 2020, "quality_score": 9,
          "verified": true },
        { "study_id": "ok-2020", "authors": "Ok", "year": 2020, "quality_score": 9 },
        { "authors": "No Id", "year": 2020, "quality_score": 9 }
      ],
      "links": [ { "study_id": "ok-2020", "tag": "a→b", "stance": "neutral" } ]
    }"#;

    let Err(Error::Validation(problems)) = ImportBatch::from_json(json) else {
      panic!("expected a validation error");
    };
    assert_eq!(problems.len(), 5, "{problems:#?}");
    assert!(problems.iter().any(|p| p.starts_with("claim not-a-tag")));
    assert!(problems.iter().any(|p| p.starts_with("study bad-2020")));
    assert!(problems.iter().any(|p| p.contains("appears twice")));
    assert!(problems.iter().any(|p| p.starts_with("study #3")));
    assert!(problems.iter().any(|p| p.starts_with("link a→b")));
  }

  #[test]
  fn reference_problems_against_known_records() {
    let batch = ImportBatch::from_json(VALID).unwrap();

    let mut known = KnownRecords::default();
    assert!(batch.reference_problems(&known).is_empty());

    let tag = ClaimTag::new("metabolic-syndrome→mortality").unwrap();
    known.claims.insert(tag.clone(), Claim::new(tag, "something else"));
    known.links.insert((
      StudyId::new("mottillo-2010").unwrap(),
      ClaimTag::new("metabolic-syndrome→mortality").unwrap(),
    ));
    let problems = batch.reference_problems(&known);
    assert_eq!(problems.len(), 2, "{problems:#?}");
  }

  #[test]
  fn whole_document_errors_are_validation() {
    for bad in ["[1,2]", "not json", r#"{"claims": 3}"#] {
      let Err(Error::Validation(problems)) = ImportBatch::from_json(bad) else {
        panic!("{bad:?} should be a validation error");
      };
      assert_eq!(problems.len(), 1);
      assert!(problems[0].starts_with("document: "), "{problems:?}");
    }
  }

  #[test]
  fn claim_meanings_are_trimmed() {
    let json = r#"{ "claims": [ { "tag": "a→b", "meaning": "  x " } ] }"#;
    let batch = ImportBatch::from_json(json).unwrap();
    assert_eq!(batch.claims[0].meaning, "x");
  }

  #[test]
  fn conflicting_overrides_are_reported() {
    let json = r#"{ "claims": [
      { "tag": "a→b", "meaning": "m", "confidence_override": "Strong (editorial)" },
      { "tag": "a→b", "meaning": "m", "confidence_override": "Weak" }
    ] }"#;
    let Err(Error::Validation(problems)) = ImportBatch::from_json(json) else {
      panic!("expected a validation error");
    };
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert!(problems[0].contains("different confidence overrides"));

    let json = r#"{ "claims": [
      { "tag": "a→b", "meaning": "m", "confidence_override": "Strong (editorial)" }
    ] }"#;
    let batch = ImportBatch::from_json(json).unwrap();
    let tag = ClaimTag::new("a→b").unwrap();
    let mut known = KnownRecords::default();

    known.claims.insert(tag.clone(), Claim::new(tag.clone(), "m"));
    let problems = batch.reference_problems(&known);
    assert_eq!(problems.len(), 1, "{problems:#?}");
    assert!(problems[0].contains("conflicts with None"));

    let mut existing = Claim::new(tag.clone(), "m");
    existing.confidence_override = Some("Strong (editorial)".into());
    known.claims.insert(tag.clone(), existing);
    assert!(batch.reference_problems(&known).is_empty());

    // A batch without an override never conflicts with a stored one.
    let plain = ImportBatch { claims: vec![Claim::new(tag, "m")], ..ImportBatch::default() };
    assert!(plain.reference_problems(&known).is_empty());
  }

  #[test]
  fn dangling_link_is_reported() {
    let batch = ImportBatch {
      links: vec![EvidenceLink::new(
        StudyId::new("ghost-2001").unwrap(),
        ClaimTag::new("a→b").unwrap(),
        crate::link::Stance::Mixed,
      )],
      ..ImportBatch::default()
    };
    let problems = batch.reference_problems(&KnownRecords::default());
    assert_eq!(problems.len(), 2);
  }
}
