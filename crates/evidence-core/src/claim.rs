//! The claim vocabulary: directional `exposure→outcome` tags.
//!
//! External pages reference tags by exact string match, so the vocabulary is
//! append-only in normal operation and a tag's shape is validated strictly.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Separator between the exposure and the outcome of a claim tag.
pub const ARROW: char = '→';

// ─── ClaimTag ────────────────────────────────────────────────────────────────

/// A tag of the exact shape `exposure→outcome`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimTag(String);

impl ClaimTag {
  pub fn new(tag: impl Into<String>) -> Result<Self> {
    let tag = tag.into();
    let well_formed = match tag.split_once(ARROW) {
      Some((exposure, outcome)) => {
        is_tag_side(exposure) && is_tag_side(outcome) && !outcome.contains(ARROW)
      }
      None => false,
    };

    if well_formed {
      Ok(Self(tag))
    } else {
      Err(Error::invalid(format!(
        "malformed claim tag {tag:?}: expected exposure{ARROW}outcome"
      )))
    }
  }

  pub fn exposure(&self) -> &str {
    self.0.split_once(ARROW).map(|(e, _)| e).unwrap_or_default()
  }

  pub fn outcome(&self) -> &str {
    self.0.split_once(ARROW).map(|(_, o)| o).unwrap_or_default()
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

fn is_tag_side(side: &str) -> bool {
  !side.is_empty() && side.trim() == side
}

impl TryFrom<String> for ClaimTag {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl From<ClaimTag> for String {
  fn from(tag: ClaimTag) -> Self { tag.0 }
}

impl FromStr for ClaimTag {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl fmt::Display for ClaimTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Claim ───────────────────────────────────────────────────────────────────

/// A vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
  pub tag:                 ClaimTag,
  /// One-line human-readable description.
  pub meaning:             String,
  /// Editorial confidence label; takes precedence over the computed one.
  #[serde(default)]
  pub confidence_override: Option<String>,
}

impl Claim {
  pub fn new(tag: ClaimTag, meaning: impl Into<String>) -> Self {
    Self { tag, meaning: meaning.into(), confidence_override: None }
  }

  /// Trim the meaning and the override label. A blank override becomes
  /// `None`.
  pub fn normalized(mut self) -> Self {
    self.meaning = self.meaning.trim().to_owned();
    self.confidence_override = self
      .confidence_override
      .map(|label| label.trim().to_owned())
      .filter(|label| !label.is_empty());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_exposure_and_outcome() {
    let tag = ClaimTag::new("metabolic-syndrome→mortality").unwrap();
    assert_eq!(tag.exposure(), "metabolic-syndrome");
    assert_eq!(tag.outcome(), "mortality");
  }

  #[test]
  fn rejects_malformed_tags() {
    for bad in [
      "",
      "sleep",
      "→mortality",
      "sleep→",
      "sleep->mortality",
      "a→b→c",
      " sleep→mortality",
      "sleep →mortality",
    ] {
      let err = ClaimTag::new(bad).unwrap_err();
      assert!(err.is_validation(), "{bad:?} should be rejected");
    }
  }

  #[test]
  fn normalized_trims_meaning_and_override() {
    let tag = ClaimTag::new("sleep→mortality").unwrap();
    let mut claim = Claim::new(tag.clone(), "  short sleep raises mortality ");
    claim.confidence_override = Some("   ".into());
    let claim = claim.normalized();
    assert_eq!(claim.meaning, "short sleep raises mortality");
    assert_eq!(claim.confidence_override, None);

    let mut claim = Claim::new(tag, "x");
    claim.confidence_override = Some(" Strong (editorial) ".into());
    assert_eq!(claim.normalized().confidence_override.as_deref(), Some("Strong (editorial)"));
  }

  #[test]
  fn deserialize_validates() {
    let ok: serde_json::Result<ClaimTag> = serde_json::from_str("\"protein→cancer\"");
    assert!(ok.is_ok());
    let bad: serde_json::Result<ClaimTag> = serde_json::from_str("\"protein\"");
    assert!(bad.is_err());
  }
}
