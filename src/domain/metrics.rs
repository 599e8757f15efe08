//! Market metrics aggregation.
//!
//! Pure summary statistics over a normalized record set. Always
//! derivable, including from the empty set.

use serde::{Deserialize, Serialize};

use super::record::{NormalizedCategory, NormalizedCompany, NormalizedProcedure};
use super::territory::TerritoryAggregate;

/// Headline figures for one snapshot. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMetricsSnapshot {
    pub total_market_size_usd_millions: f64,
    pub total_procedures: usize,
    pub total_companies: usize,
    pub total_categories: usize,
    /// Mean procedure growth; 0 for an empty set.
    pub average_growth_percent: f64,
    pub territory_count: usize,
}

/// Compute summary metrics for one pass.
///
/// `territories` must be the extractor output for the same procedures.
pub fn aggregate(
    procedures: &[NormalizedProcedure],
    companies: &[NormalizedCompany],
    categories: &[NormalizedCategory],
    territories: &[TerritoryAggregate],
) -> MarketMetricsSnapshot {
    let total_market_size_usd_millions = procedures
        .iter()
        .map(|p| p.market_size_usd_millions)
        .sum();

    MarketMetricsSnapshot {
        total_market_size_usd_millions,
        total_procedures: procedures.len(),
        total_companies: companies.len(),
        total_categories: categories.len(),
        average_growth_percent: mean(procedures.iter().map(|p| p.yearly_growth_percent)),
        territory_count: territories.len(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::normalizer::normalize_procedure;
    use crate::domain::record::Industry;
    use crate::domain::territory::extract;
    use serde_json::json;

    #[test]
    fn test_empty_set_has_zero_average() {
        let m = aggregate(&[], &[], &[], &[]);
        assert!(m.average_growth_percent.abs() < f64::EPSILON);
        assert!(!m.average_growth_percent.is_nan());
        assert_eq!(m.total_procedures, 0);
        assert_eq!(m.territory_count, 0);
    }

    #[test]
    fn test_totals_and_mean() {
        let procedures: Vec<_> = [
            json!({ "name": "A", "market_size": 100, "growth_rate": 10,
                    "regional_popularity": { "NY": 1 } }),
            json!({ "name": "B", "market_size": 50, "growth_rate": 4,
                    "regional_popularity": { "NY": 2, "FL": 3 } }),
            json!({ "name": "C", "growth_rate": -2 }),
        ]
        .iter()
        .map(|v| normalize_procedure(v.as_object().unwrap(), Industry::Aesthetic))
        .collect();
        let territories = extract(&procedures);

        let m = aggregate(&procedures, &[], &[], &territories);
        assert!((m.total_market_size_usd_millions - 150.0).abs() < f64::EPSILON);
        assert!((m.average_growth_percent - 4.0).abs() < 1e-9);
        assert_eq!(m.total_procedures, 3);
        assert_eq!(m.territory_count, 2);
    }
}
