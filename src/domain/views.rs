//! Read-side views over a snapshot.
//!
//! Pure functions; the service layer obtains the snapshot and calls these.

use std::cmp::Ordering;

use serde::Deserialize;

use super::record::{Industry, NormalizedProcedure};
use super::snapshot::AggregationSnapshot;
use super::territory::TerritoryAggregate;

/// Optional narrowing for procedure search.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub industry: Option<Industry>,
    pub min_market_size: Option<f64>,
}

/// Procedures whose name, category or description contains `query`
/// (case-insensitive), narrowed by `filters`. Snapshot order is kept.
/// An empty query matches everything.
pub fn search_procedures(
    snapshot: &AggregationSnapshot,
    query: &str,
    filters: &SearchFilters,
) -> Vec<NormalizedProcedure> {
    let needle = query.trim().to_lowercase();

    snapshot
        .procedures
        .iter()
        .filter(|p| filters.industry.is_none_or(|industry| p.industry == industry))
        .filter(|p| {
            filters
                .min_market_size
                .is_none_or(|min| p.market_size_usd_millions >= min)
        })
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.category.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Procedures by growth, highest first. Ties keep snapshot order.
pub fn top_growth_procedures(snapshot: &AggregationSnapshot, limit: usize) -> Vec<NormalizedProcedure> {
    let mut ranked: Vec<&NormalizedProcedure> = snapshot.procedures.iter().collect();
    // sort_by is stable.
    ranked.sort_by(|a, b| descending(a.yearly_growth_percent, b.yearly_growth_percent));
    ranked.into_iter().take(limit).cloned().collect()
}

/// Territories by total market size, largest first. Ties keep first-seen order.
pub fn top_territories(snapshot: &AggregationSnapshot, limit: usize) -> Vec<TerritoryAggregate> {
    let mut ranked: Vec<&TerritoryAggregate> = snapshot.territories.iter().collect();
    ranked.sort_by(|a, b| {
        descending(a.total_market_size_usd_millions, b.total_market_size_usd_millions)
    });
    ranked.into_iter().take(limit).cloned().collect()
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{RecordKind, SourceSpec};
    use crate::domain::snapshot::SnapshotAssembler;
    use serde_json::json;

    fn snapshot() -> AggregationSnapshot {
        let mut asm = SnapshotAssembler::new();
        asm.add_rows(
            &SourceSpec::new("dental_procedures", Industry::Dental, RecordKind::Procedures),
            &[
                json!({ "name": "Implant", "market_size": 300, "growth_rate": 5,
                        "regional_popularity": { "NY": 10 } }),
                json!({ "name": "Whitening", "category": "Cosmetic", "market_size": 20,
                        "growth_rate": 9, "regional_popularity": { "FL": 10, "TX": 5 } }),
                json!({ "name": "Crown", "market_size": 80, "growth_rate": 5 }),
            ],
        );
        asm.add_rows(
            &SourceSpec::new("aesthetic_procedures", Industry::Aesthetic, RecordKind::Procedures),
            &[json!({ "name": "Botox", "description": "cosmetic injectable",
                      "market_size": 500, "growth_rate": 9,
                      "regional_popularity": { "TX": 90 } })],
        );
        asm.finish(0).0
    }

    #[test]
    fn test_search_matches_name_category_description() {
        let s = snapshot();
        let hits = search_procedures(&s, "COSMETIC", &SearchFilters::default());
        let names: Vec<_> = hits.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Whitening", "Botox"]);
    }

    #[test]
    fn test_search_filters() {
        let s = snapshot();
        let filters = SearchFilters {
            industry: Some(Industry::Dental),
            min_market_size: Some(50.0),
        };
        let names: Vec<_> = search_procedures(&s, "", &filters)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Implant", "Crown"]);
    }

    #[test]
    fn test_top_growth_is_stable() {
        let s = snapshot();
        let names: Vec<_> = top_growth_procedures(&s, 10)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Whitening", "Botox", "Implant", "Crown"]);
        assert_eq!(top_growth_procedures(&s, 1).len(), 1);
    }

    #[test]
    fn test_top_territories_by_size() {
        let s = snapshot();
        let names: Vec<_> = top_territories(&s, 2).into_iter().map(|t| t.name).collect();
        // TX = 20 + 500, NY = 300, FL = 20
        assert_eq!(names, ["TX", "NY"]);
    }
}
