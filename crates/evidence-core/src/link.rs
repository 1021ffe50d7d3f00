//! Evidence links: a study's stance towards a claim.

use serde::{Deserialize, Serialize};

use crate::{
  claim::{Claim, ClaimTag},
  study::{Study, StudyId},
};

// ─── Stance ──────────────────────────────────────────────────────────────────

/// Whether a study's finding supports, contradicts, or is mixed/conditional
/// with respect to a claim.
///
/// The symbols used by the editorial tables (`+`, `−`, `±`) are accepted when
/// parsing.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
  #[serde(alias = "+")]
  #[strum(to_string = "supporting", serialize = "+")]
  Supporting,
  #[serde(alias = "−", alias = "-")]
  #[strum(to_string = "contradicting", serialize = "−", serialize = "-")]
  Contradicting,
  #[serde(alias = "±")]
  #[strum(to_string = "mixed", serialize = "±")]
  Mixed,
}

impl Stance {
  pub fn symbol(self) -> char {
    match self {
      Self::Supporting => '+',
      Self::Contradicting => '−',
      Self::Mixed => '±',
    }
  }
}

// ─── EvidenceLink ────────────────────────────────────────────────────────────

/// One study attached to one claim. At most one link exists per
/// `(study_id, tag)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLink {
  pub study_id: StudyId,
  pub tag:      ClaimTag,
  pub stance:   Stance,
  #[serde(default)]
  pub note:     Option<String>,
}

impl EvidenceLink {
  pub fn new(study_id: StudyId, tag: ClaimTag, stance: Stance) -> Self {
    Self { study_id, tag, stance, note: None }
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.note = Some(note.into());
    self
  }
}

/// A link joined with the study it points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedStudy {
  pub link:  EvidenceLink,
  pub study: Study,
}

// ─── ClaimLinks ──────────────────────────────────────────────────────────────

/// A consistent snapshot of every link for one claim, read in a single
/// transaction. Iteration never touches the store, so it can be repeated
/// freely; query the store again for fresh data.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimLinks {
  pub claim: Claim,
  entries:   Vec<LinkedStudy>,
}

impl ClaimLinks {
  pub fn new(claim: Claim, entries: Vec<LinkedStudy>) -> Self {
    Self { claim, entries }
  }

  pub fn tag(&self) -> &ClaimTag { &self.claim.tag }

  pub fn iter(&self) -> std::slice::Iter<'_, LinkedStudy> { self.entries.iter() }

  /// Links with the given stance, lazily.
  pub fn with_stance(
    &self,
    stance: Stance,
  ) -> impl Iterator<Item = &LinkedStudy> + '_ {
    self.entries.iter().filter(move |e| e.link.stance == stance)
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<'a> IntoIterator for &'a ClaimLinks {
  type Item = &'a LinkedStudy;
  type IntoIter = std::slice::Iter<'a, LinkedStudy>;

  fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}

impl IntoIterator for ClaimLinks {
  type Item = LinkedStudy;
  type IntoIter = std::vec::IntoIter<LinkedStudy>;

  fn into_iter(self) -> Self::IntoIter { self.entries.into_iter() }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn stance_parses_words_and_symbols() {
    assert_eq!(Stance::from_str("supporting").unwrap(), Stance::Supporting);
    assert_eq!(Stance::from_str("+").unwrap(), Stance::Supporting);
    assert_eq!(Stance::from_str("−").unwrap(), Stance::Contradicting);
    assert_eq!(Stance::from_str("-").unwrap(), Stance::Contradicting);
    assert_eq!(Stance::from_str("±").unwrap(), Stance::Mixed);
    assert!(Stance::from_str("neutral").is_err());
  }

  #[test]
  fn stance_displays_as_word() {
    assert_eq!(Stance::Contradicting.to_string(), "contradicting");
    assert_eq!(Stance::Mixed.as_ref(), "mixed");
  }

  #[test]
  fn stance_deserializes_symbols() {
    let stance: Stance = serde_json::from_str("\"±\"").unwrap();
    assert_eq!(stance, Stance::Mixed);
    let stance: Stance = serde_json::from_str("\"supporting\"").unwrap();
    assert_eq!(stance, Stance::Supporting);
  }
}
