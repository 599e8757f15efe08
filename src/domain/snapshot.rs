//! Aggregation snapshot and its assembly.
//!
//! A snapshot is built in one pass from whatever sources succeeded and
//! is immutable afterwards. Replacing it is the cache's job.

use serde::Serialize;

use super::metrics::{aggregate, MarketMetricsSnapshot};
use super::normalizer::{dedupe_by_id, normalize};
use super::record::{
    NormalizedCategory, NormalizedCompany, NormalizedProcedure, NormalizedRecord, RawRow,
    SourceSpec,
};
use super::territory::{attribute_companies, extract_with_report, TerritoryAggregate};
use crate::error::{MalformedRegionalData, NormalizeError, SourceFetchError};

/// What happened to one source during a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SourceOutcome {
    /// `records` is what the snapshot holds from this source after
    /// repeats of one id were collapsed.
    Loaded {
        records: usize,
        duplicates: usize,
        dropped: usize,
    },
    Empty,
    Failed { reason: String },
}

/// Per-source line in a snapshot's diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub table: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

/// One complete, immutable, point-in-time result of a rebuild.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSnapshot {
    pub procedures: Vec<NormalizedProcedure>,
    pub companies: Vec<NormalizedCompany>,
    pub categories: Vec<NormalizedCategory>,
    pub territories: Vec<TerritoryAggregate>,
    pub metrics: MarketMetricsSnapshot,
    pub fetched_at_epoch_millis: u64,
    pub sources: Vec<SourceReport>,
}

impl AggregationSnapshot {
    /// Number of sources that answered, with or without rows.
    pub fn succeeded_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| !matches!(s.outcome, SourceOutcome::Failed { .. }))
            .count()
    }

    /// Age relative to `now_millis`, saturating at zero.
    pub const fn age_millis(&self, now_millis: u64) -> u64 {
        now_millis.saturating_sub(self.fetched_at_epoch_millis)
    }
}

/// Side information produced while assembling, for logging.
#[derive(Debug, Default)]
pub struct AssemblyNotes {
    pub dropped_rows: Vec<NormalizeError>,
    pub malformed_regional: Vec<MalformedRegionalData>,
}

/// Accumulates per-source results into one snapshot.
#[derive(Debug, Default)]
pub struct SnapshotAssembler {
    procedures: Vec<NormalizedProcedure>,
    companies: Vec<NormalizedCompany>,
    categories: Vec<NormalizedCategory>,
    sources: Vec<SourceReport>,
    notes: AssemblyNotes,
}

impl SnapshotAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and absorb the rows of a source that answered.
    pub fn add_rows(&mut self, source: &SourceSpec, rows: &[RawRow]) {
        if rows.is_empty() {
            self.sources.push(SourceReport {
                table: source.table.clone(),
                outcome: SourceOutcome::Empty,
            });
            return;
        }

        let mut normalized = Vec::with_capacity(rows.len());
        let mut dropped = 0;
        for row in rows {
            match normalize(row, &source.table, source.industry, source.kind) {
                Ok(record) => normalized.push(record),
                Err(err) => {
                    dropped += 1;
                    self.notes.dropped_rows.push(err);
                }
            }
        }

        // Ids are only meaningful within one table.
        let seen = normalized.len();
        let unique = dedupe_by_id(normalized, NormalizedRecord::id);
        let records = unique.len();
        for record in unique {
            self.push(record);
        }

        self.sources.push(SourceReport {
            table: source.table.clone(),
            outcome: SourceOutcome::Loaded {
                records,
                duplicates: seen - records,
                dropped,
            },
        });
    }

    /// Record a source that failed to answer.
    pub fn add_failure(&mut self, source: &SourceSpec, error: &SourceFetchError) {
        self.sources.push(SourceReport {
            table: source.table.clone(),
            outcome: SourceOutcome::Failed {
                reason: error.to_string(),
            },
        });
    }

    /// Sources recorded so far that answered.
    pub fn succeeded_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| !matches!(s.outcome, SourceOutcome::Failed { .. }))
            .count()
    }

    fn push(&mut self, record: NormalizedRecord) {
        match record {
            NormalizedRecord::Procedure(p) => self.procedures.push(p),
            NormalizedRecord::Company(c) => self.companies.push(c),
            NormalizedRecord::Category(c) => self.categories.push(c),
        }
    }

    /// Derive territories and metrics, and seal the snapshot.
    pub fn finish(self, fetched_at_epoch_millis: u64) -> (AggregationSnapshot, AssemblyNotes) {
        let mut notes = self.notes;

        let procedures = self.procedures;
        let companies = self.companies;
        let categories = self.categories;

        let extraction = extract_with_report(&procedures);
        let mut territories = extraction.territories;
        attribute_companies(&mut territories, &companies);
        notes.malformed_regional = extraction.malformed;

        let metrics = aggregate(&procedures, &companies, &categories, &territories);

        let snapshot = AggregationSnapshot {
            procedures,
            companies,
            categories,
            territories,
            metrics,
            fetched_at_epoch_millis,
            sources: self.sources,
        };
        (snapshot, notes)
    }
}
