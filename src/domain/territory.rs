//! Territory Extractor - Per-Territory Aggregates from Regional Data
//!
//! Walks the normalized procedures once, in order, and folds each
//! procedure's embedded regional-popularity map into one aggregate row
//! per territory. Rows come out in order of first appearance; callers
//! that need a ranking sort explicitly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::normalizer::coerce_number;
use super::record::{NormalizedCompany, NormalizedProcedure, RegionalPayload};
use crate::error::MalformedRegionalData;

/// Aggregate market figures for one territory within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryAggregate {
    /// Unique per snapshot.
    pub name: String,
    pub total_market_size_usd_millions: f64,
    pub procedures_count: u64,
    pub companies_count: u64,
    /// Highest popularity seen across contributing procedures (0–100).
    pub saturation: f64,
}

impl TerritoryAggregate {
    fn new(name: String) -> Self {
        Self {
            name,
            total_market_size_usd_millions: 0.0,
            procedures_count: 0,
            companies_count: 0,
            saturation: 0.0,
        }
    }
}

/// One territory entry parsed out of a regional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TerritoryEntry {
    pub territory: String,
    pub popularity: Option<f64>,
}

/// Result of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub territories: Vec<TerritoryAggregate>,
    /// Records whose regional data was skipped.
    pub malformed: Vec<MalformedRegionalData>,
}

/// Parse a regional payload into ordered territory entries.
///
/// Entries may be `{ "popularity": n, ... }` objects or bare numbers;
/// anything else still names the territory but carries no popularity.
///
/// # Errors
/// Returns `MalformedRegionalData` if an encoded payload is not a JSON object.
pub fn parse_regional(
    payload: &RegionalPayload,
    record_id: &str,
) -> Result<Vec<TerritoryEntry>, MalformedRegionalData> {
    let malformed = |reason: String| MalformedRegionalData {
        record_id: record_id.to_string(),
        reason,
    };

    let decoded;
    let map: &Map<String, Value> = match payload {
        RegionalPayload::Structured(map) => map,
        RegionalPayload::Encoded(text) => {
            decoded = serde_json::from_str::<Value>(text).map_err(|e| malformed(e.to_string()))?;
            decoded
                .as_object()
                .ok_or_else(|| malformed("encoded payload is not an object".to_string()))?
        }
    };

    Ok(map
        .iter()
        .map(|(territory, entry)| TerritoryEntry {
            territory: territory.clone(),
            popularity: match entry {
                Value::Object(fields) => fields.get("popularity").and_then(coerce_number),
                other => coerce_number(other),
            },
        })
        .collect())
}

/// Build territory aggregates from procedures, reporting skipped records.
pub fn extract_with_report(procedures: &[NormalizedProcedure]) -> Extraction {
    let mut extraction = Extraction::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for procedure in procedures {
        let Some(payload) = procedure
            .regional_popularity
            .as_ref()
            .filter(|p| !p.is_empty())
        else {
            continue;
        };

        let entries = match parse_regional(payload, &procedure.id) {
            Ok(entries) => entries,
            Err(err) => {
                extraction.malformed.push(err);
                continue;
            }
        };

        for entry in entries {
            let slot = *index.entry(entry.territory.clone()).or_insert_with(|| {
                extraction
                    .territories
                    .push(TerritoryAggregate::new(entry.territory.clone()));
                extraction.territories.len() - 1
            });
            let row = &mut extraction.territories[slot];

            row.total_market_size_usd_millions += procedure.market_size_usd_millions;
            row.procedures_count += 1;
            if let Some(popularity) = entry.popularity {
                row.saturation = row.saturation.max(popularity.clamp(0.0, 100.0));
            }
        }
    }

    extraction
}

/// Build territory aggregates from procedures.
pub fn extract(procedures: &[NormalizedProcedure]) -> Vec<TerritoryAggregate> {
    extract_with_report(procedures).territories
}

/// Count companies against the territory they are headquartered in.
///
/// Only existing rows are touched; a company never creates a territory.
pub fn attribute_companies(territories: &mut [TerritoryAggregate], companies: &[NormalizedCompany]) {
    for company in companies {
        let Some(hq) = company.headquarters.as_deref() else {
            continue;
        };
        if let Some(row) = territories
            .iter_mut()
            .find(|row| row.name.eq_ignore_ascii_case(hq))
        {
            row.companies_count += 1;
        }
    }
}
