//! Core market-data domain types.
//!
//! Raw rows arrive as open-ended key/value maps and exist only between a
//! fetch and the normalizer. Everything downstream of the normalizer works
//! on the canonical typed records defined here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ────────────────────────────────────────────
// Fetch boundary
// ────────────────────────────────────────────

/// One row exactly as a remote table returned it. Usually an object.
pub type RawRow = Value;

/// One key/value row. Key order is the source's own.
pub type RawRecord = Map<String, Value>;

/// Identifier of a normalized record, unique within one source table.
pub type RecordId = String;

// ────────────────────────────────────────────
// Enums shared across domain, ports and config
// ────────────────────────────────────────────

/// Market vertical a source belongs to. Fixed per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Dental,
    Aesthetic,
}

impl Industry {
    /// Lowercase tag used when synthesizing record ids.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dental => "dental",
            Self::Aesthetic => "aesthetic",
        }
    }
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical record shape a rebuild source is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Procedures,
    Companies,
    Categories,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Procedures => write!(f, "procedures"),
            Self::Companies => write!(f, "companies"),
            Self::Categories => write!(f, "categories"),
        }
    }
}

/// A configured rebuild source: one remote table with a fixed industry
/// and the canonical shape its rows normalize into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub table: String,
    pub industry: Industry,
    pub kind: RecordKind,
    /// Column equality filters sent with every fetch of this table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl SourceSpec {
    pub fn new(table: impl Into<String>, industry: Industry, kind: RecordKind) -> Self {
        Self {
            table: table.into(),
            industry,
            kind,
            filters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }
}

/// Discovered category of a remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Procedures,
    Companies,
    Categories,
    Analytics,
    Geography,
    Other,
}

// ────────────────────────────────────────────
// Canonical records
// ────────────────────────────────────────────

/// Embedded per-territory popularity data as carried on a procedure.
///
/// Some sources store it as a JSON object, others as a JSON-encoded
/// string. Parsing is deferred to the territory extractor so a bad
/// payload only costs that record its territory contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionalPayload {
    Structured(Map<String, Value>),
    Encoded(String),
}

impl RegionalPayload {
    /// True when the payload carries no territory keys at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured(map) => map.is_empty(),
            Self::Encoded(text) => text.trim().is_empty(),
        }
    }
}

/// Canonical procedure record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedProcedure {
    pub id: RecordId,
    /// Never empty.
    pub name: String,
    pub category: String,
    pub industry: Industry,
    pub description: String,
    /// Non-negative.
    pub market_size_usd_millions: f64,
    pub yearly_growth_percent: f64,
    /// Non-negative.
    pub average_cost_usd: f64,
    /// 0–100.
    pub trending_score: f64,
    /// 0–100.
    pub popularity_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regional_popularity: Option<RegionalPayload>,
}

/// Canonical company record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCompany {
    pub id: RecordId,
    pub name: String,
    /// Specialty / segment.
    pub category: String,
    pub industry: Industry,
    pub market_size_usd_millions: f64,
    pub yearly_growth_percent: f64,
    pub market_share_percent: f64,
    /// Territory the company is headquartered in, when the source says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarters: Option<String>,
}

/// Canonical category record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCategory {
    pub id: RecordId,
    pub name: String,
    pub industry: Industry,
    pub market_size_usd_millions: f64,
    pub yearly_growth_percent: f64,
    pub procedure_count: u64,
}

/// Output of normalizing one raw row.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecord {
    Procedure(NormalizedProcedure),
    Company(NormalizedCompany),
    Category(NormalizedCategory),
}

impl NormalizedRecord {
    pub fn id(&self) -> &str {
        match self {
            Self::Procedure(p) => &p.id,
            Self::Company(c) => &c.id,
            Self::Category(c) => &c.id,
        }
    }
}
