//! SQL schema for the evidence registry.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS studies (
    study_id      TEXT PRIMARY KEY,
    authors       TEXT NOT NULL,
    year          INTEGER NOT NULL,
    journal       TEXT,
    title         TEXT,
    pmid          TEXT,
    doi           TEXT,
    quality_score INTEGER NOT NULL,
    verified      INTEGER NOT NULL DEFAULT 0,
    verified_at   TEXT,                -- RFC 3339 UTC
    landmark      INTEGER NOT NULL DEFAULT 0,
    study_type    TEXT,
    sample_size   TEXT,
    population    TEXT,
    key_finding   TEXT,
    superseded_by TEXT REFERENCES studies(study_id)
                       ON UPDATE CASCADE ON DELETE SET NULL,
    CHECK (verified = 0 OR (pmid IS NOT NULL AND doi IS NOT NULL))
);

-- Append-only in normal operation: external pages match tags verbatim.
CREATE TABLE IF NOT EXISTS claims (
    tag                 TEXT PRIMARY KEY,
    meaning             TEXT NOT NULL,
    confidence_override TEXT
);

-- No ON DELETE action: deleting a referenced study or claim fails unless
-- its links were removed first.
CREATE TABLE IF NOT EXISTS evidence_links (
    study_id TEXT NOT NULL REFERENCES studies(study_id) ON UPDATE CASCADE,
    tag      TEXT NOT NULL REFERENCES claims(tag),
    stance   TEXT NOT NULL
             CHECK (stance IN ('supporting', 'contradicting', 'mixed')),
    note     TEXT,
    PRIMARY KEY (study_id, tag)
);

CREATE INDEX IF NOT EXISTS evidence_links_tag_idx ON evidence_links(tag);

PRAGMA user_version = 1;
";
