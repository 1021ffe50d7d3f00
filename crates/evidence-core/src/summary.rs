//! The summary aggregator.
//!
//! A claim summary is never stored: it is recomputed from a [`ClaimLinks`]
//! snapshot every time it is needed, so it can never drift from the links.
//! The same rules apply to every tag; there is no per-claim special casing.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  claim::ClaimTag,
  link::{ClaimLinks, LinkedStudy, Stance},
  study::StudyId,
};

// ─── Thresholds ──────────────────────────────────────────────────────────────

/// Quality-score cut-offs used to derive the confidence label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryThresholds {
  /// A contributing study at or above this score makes the claim `Landmark`.
  pub landmark_threshold:            u8,
  /// Minimum best score for `Strong`.
  pub strong_threshold:              u8,
  /// Distinct contributing studies needed for `Strong`...
  pub strong_min_studies:            usize,
  /// ...unless the best study alone reaches this score.
  pub strong_single_study_threshold: u8,
  pub moderate_threshold:            u8,
  /// Both sides of a `±` verdict at or above this score are "contested".
  pub contested_threshold:           u8,
}

impl Default for SummaryThresholds {
  fn default() -> Self {
    Self {
      landmark_threshold:            13,
      strong_threshold:              11,
      strong_min_studies:            2,
      strong_single_study_threshold: 12,
      moderate_threshold:            8,
      contested_threshold:           10,
    }
  }
}

// ─── Verdict types ───────────────────────────────────────────────────────────

/// The aggregate direction of evidence for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Net {
  #[serde(rename = "+")]
  Positive,
  #[serde(rename = "−")]
  Negative,
  #[serde(rename = "±")]
  Mixed,
}

impl Net {
  pub fn symbol(self) -> char {
    match self {
      Self::Positive => '+',
      Self::Negative => '−',
      Self::Mixed => '±',
    }
  }
}

impl fmt::Display for Net {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.symbol())
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
)]
pub enum Confidence {
  Limited,
  Moderate,
  Strong,
  Landmark,
}

/// Extra context attached to the confidence of a `±` verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
  /// Both sides are backed by high-quality studies.
  #[strum(to_string = "(contested)")]
  Contested,
  #[strum(to_string = "(mixed)")]
  Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceLabel {
  pub level:     Confidence,
  pub qualifier: Option<Qualifier>,
}

impl fmt::Display for ConfidenceLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.qualifier {
      Some(q) => write!(f, "{} {q}", self.level),
      None => write!(f, "{}", self.level),
    }
  }
}

/// Why a claim is flagged for a further literature search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum GapReason {
  #[strum(to_string = "Need contradicting study")]
  NeedContradicting,
  #[strum(to_string = "Need supporting study")]
  NeedSupporting,
}

/// The study chosen to represent one side of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestStudy {
  pub study_id:      StudyId,
  pub citation:      String,
  pub quality_score: u8,
  pub year:          u16,
}

impl BestStudy {
  fn from_entry(entry: &LinkedStudy) -> Self {
    Self {
      study_id:      entry.study.study_id.clone(),
      citation:      entry.study.citation(),
      quality_score: entry.study.quality_score,
      year:          entry.study.year,
    }
  }
}

// ─── ClaimSummary ────────────────────────────────────────────────────────────

/// The derived, read-only verdict for one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSummary {
  pub tag:                 ClaimTag,
  pub supporting_count:    usize,
  pub contradicting_count: usize,
  pub mixed_count:         usize,
  pub best_supporting:     Option<BestStudy>,
  pub best_contradicting:  Option<BestStudy>,
  pub net:                 Net,
  /// The computed label.
  pub confidence:          ConfidenceLabel,
  /// Editorial label from the vocabulary; wins over `confidence` when set.
  pub confidence_override: Option<String>,
  pub gap:                 Option<GapReason>,
}

impl ClaimSummary {
  /// The label to publish: the editorial override if present, otherwise the
  /// computed confidence.
  pub fn confidence_label(&self) -> String {
    match &self.confidence_override {
      Some(label) => label.clone(),
      None => self.confidence.to_string(),
    }
  }

  pub fn has_gap(&self) -> bool { self.gap.is_some() }
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Summarise a claim from a snapshot of its links.
///
/// Returns [`Error::EmptyClaim`] when the claim has no links at all, and
/// [`Error::Integrity`] when the snapshot contains a link for another tag or a
/// link whose joined study does not match.
pub fn summarize(
  links: &ClaimLinks,
  thresholds: &SummaryThresholds,
) -> Result<ClaimSummary> {
  let tag = links.tag();

  for entry in links {
    if &entry.link.tag != tag {
      return Err(Error::Integrity(format!(
        "link {} → {} found while summarising {tag}",
        entry.link.study_id, entry.link.tag
      )));
    }
    if entry.link.study_id != entry.study.study_id {
      return Err(Error::Integrity(format!(
        "link for {} joined to study {}",
        entry.link.study_id, entry.study.study_id
      )));
    }
  }

  let supporting: Vec<&LinkedStudy> = links.with_stance(Stance::Supporting).collect();
  let contradicting: Vec<&LinkedStudy> =
    links.with_stance(Stance::Contradicting).collect();
  let mixed_count = links.with_stance(Stance::Mixed).count();

  let net = match (supporting.is_empty(), contradicting.is_empty()) {
    (false, true) => Net::Positive,
    (true, false) => Net::Negative,
    (false, false) => Net::Mixed,
    (true, true) if mixed_count > 0 => Net::Mixed,
    (true, true) => return Err(Error::EmptyClaim(tag.to_string())),
  };

  let best_supporting = best_of(&supporting);
  let best_contradicting = best_of(&contradicting);

  let confidence = match net {
    Net::Positive => ConfidenceLabel {
      level:     grade(&supporting, thresholds),
      qualifier: None,
    },
    Net::Negative => ConfidenceLabel {
      level:     grade(&contradicting, thresholds),
      qualifier: None,
    },
    Net::Mixed => {
      let everything: Vec<&LinkedStudy> = links.iter().collect();
      let contested = [best_supporting, best_contradicting]
        .iter()
        .all(|best| {
          best.is_some_and(|e| e.study.quality_score >= thresholds.contested_threshold)
        });
      ConfidenceLabel {
        level:     grade(&everything, thresholds),
        qualifier: Some(if contested {
          Qualifier::Contested
        } else {
          Qualifier::Mixed
        }),
      }
    }
  };

  let gap = match net {
    Net::Positive => Some(GapReason::NeedContradicting),
    Net::Negative => Some(GapReason::NeedSupporting),
    Net::Mixed => None,
  };

  Ok(ClaimSummary {
    tag: tag.clone(),
    supporting_count: supporting.len(),
    contradicting_count: contradicting.len(),
    mixed_count,
    best_supporting: best_supporting.map(BestStudy::from_entry),
    best_contradicting: best_contradicting.map(BestStudy::from_entry),
    net,
    confidence,
    confidence_override: links.claim.confidence_override.clone(),
    gap,
  })
}

/// Highest quality score, then most recent year, then lexically first id.
fn best_of<'a>(group: &[&'a LinkedStudy]) -> Option<&'a LinkedStudy> {
  group.iter().copied().max_by(|a, b| {
    a.study
      .quality_score
      .cmp(&b.study.quality_score)
      .then(a.study.year.cmp(&b.study.year))
      .then_with(|| b.study.study_id.cmp(&a.study.study_id))
  })
}

fn grade(contributing: &[&LinkedStudy], t: &SummaryThresholds) -> Confidence {
  let is_landmark = contributing
    .iter()
    .any(|e| e.study.landmark || e.study.quality_score >= t.landmark_threshold);
  let best = contributing
    .iter()
    .map(|e| e.study.quality_score)
    .max()
    .unwrap_or(0);
  let distinct: BTreeSet<&StudyId> =
    contributing.iter().map(|e| &e.study.study_id).collect();

  if is_landmark {
    Confidence::Landmark
  } else if best >= t.strong_threshold
    && (distinct.len() >= t.strong_min_studies
      || best >= t.strong_single_study_threshold)
  {
    Confidence::Strong
  } else if best >= t.moderate_threshold {
    Confidence::Moderate
  } else {
    Confidence::Limited
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    claim::Claim,
    link::EvidenceLink,
    study::Study,
  };

  fn tag(s: &str) -> ClaimTag { ClaimTag::new(s).unwrap() }

  fn entry(id: &str, claim: &str, stance: Stance, score: u8, year: u16) -> LinkedStudy {
    let study_id = StudyId::new(id).unwrap();
    LinkedStudy {
      link:  EvidenceLink::new(study_id.clone(), tag(claim), stance),
      study: Study::new(study_id, format!("{id} et al."), year, score),
    }
  }

  fn snapshot(claim: &str, entries: Vec<LinkedStudy>) -> ClaimLinks {
    ClaimLinks::new(Claim::new(tag(claim), "test claim"), entries)
  }

  fn summarize_default(links: &ClaimLinks) -> Result<ClaimSummary> {
    summarize(links, &SummaryThresholds::default())
  }

  const T: &str = "sleep-duration→mortality";

  // ─── Net ──────────────────────────────────────────────────────────────────

  #[test]
  fn net_table() {
    use Stance::*;
    let cases: &[(&[Stance], Option<Net>)] = &[
      (&[Supporting], Some(Net::Positive)),
      (&[Supporting, Mixed], Some(Net::Positive)),
      (&[Contradicting], Some(Net::Negative)),
      (&[Contradicting, Mixed], Some(Net::Negative)),
      (&[Supporting, Contradicting], Some(Net::Mixed)),
      (&[Supporting, Contradicting, Mixed], Some(Net::Mixed)),
      (&[Mixed], Some(Net::Mixed)),
      (&[Mixed, Mixed], Some(Net::Mixed)),
      (&[], None),
    ];

    for (stances, expected) in cases {
      let entries = stances
        .iter()
        .enumerate()
        .map(|(i, s)| entry(&format!("study-{i}"), T, *s, 9, 2020))
        .collect();
      let result = summarize_default(&snapshot(T, entries));
      match expected {
        Some(net) => assert_eq!(result.unwrap().net, *net, "{stances:?}"),
        None => assert!(matches!(result, Err(Error::EmptyClaim(_)))),
      }
    }
  }

  #[test]
  fn counts_by_stance() {
    let links = snapshot(T, vec![
      entry("a-2001", T, Stance::Supporting, 9, 2001),
      entry("b-2002", T, Stance::Supporting, 9, 2002),
      entry("c-2003", T, Stance::Contradicting, 9, 2003),
      entry("d-2004", T, Stance::Mixed, 9, 2004),
    ]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(
      (s.supporting_count, s.contradicting_count, s.mixed_count),
      (2, 1, 1)
    );
  }

  // ─── Best study ───────────────────────────────────────────────────────────

  #[test]
  fn best_prefers_score_then_recency_regardless_of_order() {
    let base = vec![
      entry("low-2020", T, Stance::Supporting, 9, 2020),
      entry("old-2010", T, Stance::Supporting, 12, 2010),
      entry("new-2013", T, Stance::Supporting, 12, 2013),
    ];

    for rotation in 0..base.len() {
      let mut entries = base.clone();
      entries.rotate_left(rotation);
      let s = summarize_default(&snapshot(T, entries.clone())).unwrap();
      assert_eq!(s.best_supporting.unwrap().study_id.as_str(), "new-2013");

      entries.reverse();
      let s = summarize_default(&snapshot(T, entries)).unwrap();
      assert_eq!(s.best_supporting.unwrap().study_id.as_str(), "new-2013");
    }
  }

  #[test]
  fn best_falls_back_to_lexical_id() {
    let links = snapshot(T, vec![
      entry("zed-2015", T, Stance::Contradicting, 10, 2015),
      entry("abe-2015", T, Stance::Contradicting, 10, 2015),
    ]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.best_contradicting.unwrap().study_id.as_str(), "abe-2015");
    assert!(s.best_supporting.is_none());
  }

  #[test]
  fn best_citation_format() {
    let links = snapshot(T, vec![entry("mottillo-2010", T, Stance::Supporting, 12, 2010)]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(
      s.best_supporting.unwrap().citation,
      "mottillo-2010 et al. 2010 (12)"
    );
  }

  // ─── Confidence ───────────────────────────────────────────────────────────

  #[test]
  fn single_high_scoring_study_is_strong() {
    let links = snapshot(T, vec![entry("mottillo-2010", T, Stance::Supporting, 12, 2010)]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.confidence.level, Confidence::Strong);
    assert_eq!(s.confidence.to_string(), "Strong");
  }

  #[test]
  fn single_borderline_study_is_moderate() {
    let links = snapshot(T, vec![entry("a-2010", T, Stance::Supporting, 11, 2010)]);
    assert_eq!(
      summarize_default(&links).unwrap().confidence.level,
      Confidence::Moderate
    );

    let links = snapshot(T, vec![
      entry("a-2010", T, Stance::Supporting, 11, 2010),
      entry("b-2012", T, Stance::Supporting, 7, 2012),
    ]);
    assert_eq!(
      summarize_default(&links).unwrap().confidence.level,
      Confidence::Strong
    );
  }

  #[test]
  fn moderate_and_limited_bands() {
    let links = snapshot(T, vec![entry("a-2010", T, Stance::Contradicting, 8, 2010)]);
    assert_eq!(
      summarize_default(&links).unwrap().confidence.level,
      Confidence::Moderate
    );
    let links = snapshot(T, vec![entry("a-2010", T, Stance::Contradicting, 7, 2010)]);
    assert_eq!(
      summarize_default(&links).unwrap().confidence.level,
      Confidence::Limited
    );
  }

  #[test]
  fn landmark_by_score_or_flag() {
    let links = snapshot(T, vec![entry("a-2010", T, Stance::Supporting, 13, 2010)]);
    assert_eq!(
      summarize_default(&links).unwrap().confidence.level,
      Confidence::Landmark
    );

    let mut flagged = entry("b-1999", T, Stance::Supporting, 6, 1999);
    flagged.study.landmark = true;
    let links = snapshot(T, vec![flagged]);
    assert_eq!(
      summarize_default(&links).unwrap().confidence.level,
      Confidence::Landmark
    );
  }

  #[test]
  fn confidence_uses_dominant_side_only() {
    // A landmark on the mixed side does not lift a `+` verdict.
    let mut mixed = entry("seminal-1990", T, Stance::Mixed, 13, 1990);
    mixed.study.landmark = true;
    let links = snapshot(T, vec![entry("a-2010", T, Stance::Supporting, 8, 2010), mixed]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.net, Net::Positive);
    assert_eq!(s.confidence.level, Confidence::Moderate);
  }

  #[test]
  fn contested_and_mixed_qualifiers() {
    let links = snapshot(T, vec![
      entry("a-2010", T, Stance::Supporting, 10, 2010),
      entry("b-2012", T, Stance::Contradicting, 11, 2012),
    ]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.confidence.qualifier, Some(Qualifier::Contested));
    assert!(s.confidence.to_string().contains("(contested)"));

    let links = snapshot(T, vec![
      entry("a-2010", T, Stance::Supporting, 12, 2010),
      entry("b-2012", T, Stance::Contradicting, 9, 2012),
    ]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.confidence.qualifier, Some(Qualifier::Mixed));

    let links = snapshot(T, vec![entry("a-2010", T, Stance::Mixed, 9, 2010)]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.confidence.to_string(), "Moderate (mixed)");
  }

  #[test]
  fn override_takes_precedence() {
    let mut links = snapshot(T, vec![entry("a-2010", T, Stance::Supporting, 7, 2010)]);
    links.claim.confidence_override = Some("Moderate (editorial)".into());
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.confidence.level, Confidence::Limited);
    assert_eq!(s.confidence_label(), "Moderate (editorial)");
  }

  #[test]
  fn custom_thresholds() {
    let links = snapshot(T, vec![entry("a-2010", T, Stance::Supporting, 12, 2010)]);
    let strict = SummaryThresholds {
      strong_single_study_threshold: 14,
      ..SummaryThresholds::default()
    };
    let s = summarize(&links, &strict).unwrap();
    assert_eq!(s.confidence.level, Confidence::Moderate);
  }

  // ─── Gap ──────────────────────────────────────────────────────────────────

  #[test]
  fn gap_flags() {
    let links = snapshot(T, vec![entry("a-2010", T, Stance::Supporting, 9, 2010)]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.gap, Some(GapReason::NeedContradicting));
    assert_eq!(s.gap.unwrap().to_string(), "Need contradicting study");

    let links = snapshot(T, vec![entry("a-2010", T, Stance::Contradicting, 9, 2010)]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.gap.unwrap().to_string(), "Need supporting study");

    let links = snapshot(T, vec![
      entry("a-2010", T, Stance::Supporting, 9, 2010),
      entry("b-2011", T, Stance::Contradicting, 9, 2011),
    ]);
    assert!(!summarize_default(&links).unwrap().has_gap());
  }

  #[test]
  fn only_mixed_evidence_is_not_a_gap() {
    let links = snapshot(T, vec![entry("a-2010", T, Stance::Mixed, 9, 2010)]);
    let s = summarize_default(&links).unwrap();
    assert_eq!(s.net, Net::Mixed);
    assert!(s.gap.is_none());
  }

  // ─── Integrity ────────────────────────────────────────────────────────────

  #[test]
  fn foreign_tag_is_an_integrity_error() {
    let links = snapshot(T, vec![entry("a-2010", "protein→cancer", Stance::Supporting, 9, 2010)]);
    assert!(matches!(summarize_default(&links), Err(Error::Integrity(_))));
  }

  #[test]
  fn mismatched_study_is_an_integrity_error() {
    let mut e = entry("a-2010", T, Stance::Supporting, 9, 2010);
    e.study.study_id = StudyId::new("b-2010").unwrap();
    let links = snapshot(T, vec![e]);
    assert!(matches!(summarize_default(&links), Err(Error::Integrity(_))));
  }
}
