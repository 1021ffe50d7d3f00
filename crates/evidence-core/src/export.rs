//! The exported claim summary table.
//!
//! Page-rendering and editorial tooling read this export only, never the link
//! table. Every claim in the vocabulary produces exactly one row; a claim with
//! no links at all is exported as [`ExportRow::Empty`] so that it is never
//! confused with a computed `±`.

use serde::Serialize;

use crate::{Error, Result, claim::ClaimTag, summary::ClaimSummary};

/// Column headings of the markdown rendering.
pub const MARKDOWN_HEADER: &str =
  "| Claim | #+ | #− | #± | Best+ | Best− | Net | Confidence | Gap? |";
const MARKDOWN_RULE: &str =
  "|-------|----|----|-----|-------|-------|-----|------------|------|";

/// Gap column text for a claim with no evidence.
pub const NO_EVIDENCE: &str = "No evidence";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRow {
  Summary(ClaimSummary),
  /// A vocabulary tag with zero evidence links.
  Empty(ClaimTag),
}

/// One flat export row, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
  pub claim:              String,
  pub supporting:         usize,
  pub contradicting:      usize,
  pub mixed:              usize,
  pub best_supporting:    String,
  pub best_contradicting: String,
  pub net:                String,
  pub confidence:         String,
  pub gap:                bool,
  pub gap_reason:         String,
}

impl ExportRow {
  pub fn tag(&self) -> &ClaimTag {
    match self {
      Self::Summary(s) => &s.tag,
      Self::Empty(tag) => tag,
    }
  }

  pub fn summary(&self) -> Option<&ClaimSummary> {
    match self {
      Self::Summary(s) => Some(s),
      Self::Empty(_) => None,
    }
  }

  pub fn is_empty_claim(&self) -> bool { matches!(self, Self::Empty(_)) }

  pub fn to_record(&self) -> ExportRecord {
    match self {
      Self::Summary(s) => ExportRecord {
        claim:              s.tag.to_string(),
        supporting:         s.supporting_count,
        contradicting:      s.contradicting_count,
        mixed:              s.mixed_count,
        best_supporting:    s
          .best_supporting
          .as_ref()
          .map(|b| b.citation.clone())
          .unwrap_or_default(),
        best_contradicting: s
          .best_contradicting
          .as_ref()
          .map(|b| b.citation.clone())
          .unwrap_or_default(),
        net:                s.net.to_string(),
        confidence:         s.confidence_label(),
        gap:                s.has_gap(),
        gap_reason:         s.gap.map(|g| g.to_string()).unwrap_or_default(),
      },
      Self::Empty(tag) => ExportRecord {
        claim:              tag.to_string(),
        supporting:         0,
        contradicting:      0,
        mixed:              0,
        best_supporting:    String::new(),
        best_contradicting: String::new(),
        net:                String::new(),
        confidence:         String::new(),
        gap:                true,
        gap_reason:         NO_EVIDENCE.to_owned(),
      },
    }
  }
}

/// Render rows as a markdown table, header included.
pub fn render_markdown(rows: &[ExportRow]) -> String {
  let mut out = format!("{MARKDOWN_HEADER}\n{MARKDOWN_RULE}\n");
  for row in rows {
    let r = row.to_record();
    out.push_str(&format!(
      "| `{}` | {} | {} | {} | {} | {} | {} | {} | {} |\n",
      r.claim,
      r.supporting,
      r.contradicting,
      r.mixed,
      r.best_supporting,
      r.best_contradicting,
      r.net,
      r.confidence,
      r.gap_reason,
    ));
  }
  out
}

/// Render rows as a JSON array of [`ExportRecord`]s.
pub fn render_json(rows: &[ExportRow]) -> Result<String> {
  let records: Vec<ExportRecord> = rows.iter().map(ExportRow::to_record).collect();
  Ok(serde_json::to_string_pretty(&records)?)
}

/// Replace the claim summary table inside an existing markdown document.
///
/// The table is located by its header line; it extends over the following
/// contiguous `|`-prefixed lines. Everything else in the document is kept
/// verbatim.
pub fn splice_markdown_table(document: &str, table: &str) -> Result<String> {
  let lines: Vec<&str> = document.lines().collect();
  let start = lines
    .iter()
    .position(|l| l.trim_start().starts_with("| Claim | #+ |"))
    .ok_or_else(|| Error::invalid("document has no claim summary table"))?;
  let end = lines[start..]
    .iter()
    .position(|l| !l.trim_start().starts_with('|'))
    .map_or(lines.len(), |offset| start + offset);

  let mut out = String::with_capacity(document.len() + table.len());
  for line in &lines[..start] {
    out.push_str(line);
    out.push('\n');
  }
  out.push_str(table.trim_end_matches('\n'));
  out.push('\n');
  for line in &lines[end..] {
    out.push_str(line);
    out.push('\n');
  }
  if !document.ends_with('\n') {
    out.pop();
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    claim::Claim,
    link::{ClaimLinks, EvidenceLink, LinkedStudy, Stance},
    study::{Study, StudyId},
    summary::{SummaryThresholds, summarize},
  };

  fn mottillo_row() -> ExportRow {
    let tag = ClaimTag::new("metabolic-syndrome→mortality").unwrap();
    let id = StudyId::new("mottillo-2010").unwrap();
    let links = ClaimLinks::new(Claim::new(tag.clone(), "MetS → death"), vec![
      LinkedStudy {
        link:  EvidenceLink::new(id.clone(), tag, Stance::Supporting),
        study: Study::new(id, "Mottillo et al.", 2010, 12),
      },
    ]);
    ExportRow::Summary(summarize(&links, &SummaryThresholds::default()).unwrap())
  }

  #[test]
  fn record_columns() {
    let r = mottillo_row().to_record();
    assert_eq!(r.claim, "metabolic-syndrome→mortality");
    assert_eq!((r.supporting, r.contradicting, r.mixed), (1, 0, 0));
    assert_eq!(r.best_supporting, "Mottillo et al. 2010 (12)");
    assert_eq!(r.best_contradicting, "");
    assert_eq!(r.net, "+");
    assert_eq!(r.confidence, "Strong");
    assert!(r.gap);
    assert_eq!(r.gap_reason, "Need contradicting study");
  }

  #[test]
  fn empty_claim_record_is_distinct() {
    let r = ExportRow::Empty(ClaimTag::new("a→b").unwrap()).to_record();
    assert_eq!(r.net, "");
    assert_eq!(r.gap_reason, NO_EVIDENCE);
  }

  #[test]
  fn markdown_rendering() {
    let md = render_markdown(&[mottillo_row()]);
    let lines: Vec<&str> = md.lines().collect();
    assert_eq!(lines[0], MARKDOWN_HEADER);
    assert_eq!(
      lines[2],
      "| `metabolic-syndrome→mortality` | 1 | 0 | 0 | Mottillo et al. 2010 (12) |  | + | Strong | Need contradicting study |"
    );
  }

  #[test]
  fn json_rendering() {
    let json = render_json(&[mottillo_row()]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["net"], "+");
    assert_eq!(value[0]["gap"], true);
  }

  #[test]
  fn splice_replaces_only_the_table() {
    let doc = "# Registry\n\nIntro.\n\n| Claim | #+ | #− |\n|---|---|---|\n| `old` | 1 | 0 |\n\n## Next\n";
    let out = splice_markdown_table(doc, "| Claim | #+ | new |\n").unwrap();
    assert_eq!(out, "# Registry\n\nIntro.\n\n| Claim | #+ | new |\n\n## Next\n");
  }

  #[test]
  fn splice_table_at_end_of_document() {
    let doc = "Intro\n| Claim | #+ |\n| `x` |";
    let out = splice_markdown_table(doc, "| Claim | #+ | y |").unwrap();
    assert_eq!(out, "Intro\n| Claim | #+ | y |");
  }

  #[test]
  fn splice_without_table_fails() {
    assert!(splice_markdown_table("# nothing here\n", "| x |").is_err());
  }
}
