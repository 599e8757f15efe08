//! Table classification for discovery.
//!
//! Keyword rules are matched in a fixed priority order, first against the
//! table name and then against its column names. Matching is
//! case-insensitive substring matching.

use serde::Serialize;

use super::record::{RawRow, SourceKind};

/// Maximum sample rows kept on a descriptor.
pub const SAMPLE_ROWS: usize = 5;

/// Kind rules in priority order.
pub const KIND_RULES: &[(SourceKind, &[&str])] = &[
    (SourceKind::Procedures, &["procedure"]),
    (SourceKind::Companies, &["company", "provider"]),
    (SourceKind::Categories, &["categor"]),
    (SourceKind::Analytics, &["analytic", "search", "trend"]),
    (SourceKind::Geography, &["region", "territory", "location", "geo"]),
];

pub const MARKET_COLUMN_KEYWORDS: &[&str] = &["market_size", "revenue", "cost", "price"];
pub const GEO_COLUMN_KEYWORDS: &[&str] = &["region", "territory", "location", "geo"];

/// Diagnostic description of one remote table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    pub row_count: u64,
    /// Source's native order of first appearance.
    pub column_names: Vec<String>,
    /// At most `SAMPLE_ROWS`.
    pub sample_rows: Vec<RawRow>,
    pub has_market_columns: bool,
    pub has_geo_columns: bool,
    pub kind: SourceKind,
}

impl TableDescriptor {
    /// Describe a table from a sample of its rows.
    ///
    /// `row_count` falls back to the sample size when the store cannot
    /// report an exact count.
    pub fn from_sample(name: &str, row_count: Option<u64>, mut sample: Vec<RawRow>) -> Self {
        sample.truncate(SAMPLE_ROWS);
        let column_names = column_names(&sample);

        Self {
            name: name.to_string(),
            row_count: row_count.unwrap_or(sample.len() as u64),
            has_market_columns: any_contains(&column_names, MARKET_COLUMN_KEYWORDS),
            has_geo_columns: any_contains(&column_names, GEO_COLUMN_KEYWORDS),
            kind: classify(name, &column_names),
            column_names,
            sample_rows: sample,
        }
    }
}

/// Union of object keys across rows, in order of first appearance.
pub fn column_names(rows: &[RawRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        let Some(object) = row.as_object() else {
            continue;
        };
        for key in object.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Derive a table's kind from its name, then its columns.
pub fn classify(name: &str, columns: &[String]) -> SourceKind {
    let name = name.to_lowercase();
    if let Some(kind) = match_rules(|keyword| name.contains(keyword)) {
        return kind;
    }

    let columns: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
    match_rules(|keyword| columns.iter().any(|c| c.contains(keyword))).unwrap_or(SourceKind::Other)
}

fn match_rules(matches: impl Fn(&str) -> bool) -> Option<SourceKind> {
    KIND_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|&k| matches(k)))
        .map(|(kind, _)| *kind)
}

fn any_contains(columns: &[String], keywords: &[&str]) -> bool {
    columns.iter().any(|c| {
        let c = c.to_lowercase();
        keywords.iter().any(|k| c.contains(k))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_rules_in_priority_order() {
        assert_eq!(classify("dental_procedures", &[]), SourceKind::Procedures);
        assert_eq!(classify("company_profiles", &[]), SourceKind::Companies);
        assert_eq!(classify("provider_registry", &[]), SourceKind::Companies);
        assert_eq!(classify("aesthetic_categories", &[]), SourceKind::Categories);
        assert_eq!(classify("search_trends", &[]), SourceKind::Analytics);
        assert_eq!(classify("territory_map", &[]), SourceKind::Geography);
        assert_eq!(classify("misc", &[]), SourceKind::Other);
        // "procedure" outranks "categor".
        assert_eq!(
            classify("standardized_procedure_categories", &[]),
            SourceKind::Procedures
        );
    }

    #[test]
    fn test_columns_used_when_name_is_silent() {
        let columns = vec!["id".to_string(), "Region_Code".to_string()];
        assert_eq!(classify("lookup", &columns), SourceKind::Geography);
    }

    #[test]
    fn test_plural_company_tables_rely_on_columns() {
        // "companies" does not contain "company".
        assert_eq!(classify("aesthetic_companies", &[]), SourceKind::Other);

        let columns = vec!["id".to_string(), "company_name".to_string()];
        assert_eq!(classify("aesthetic_companies", &columns), SourceKind::Companies);
    }

    #[test]
    fn test_descriptor_from_sample() {
        let rows: Vec<RawRow> = (0..8)
            .map(|i| json!({ "id": i, "name": "x", "market_size_usd_millions": 1 }))
            .chain(std::iter::once(json!({ "state_geo": "NY" })))
            .collect();
        let d = TableDescriptor::from_sample("dental_procedures", None, rows);

        assert_eq!(d.sample_rows.len(), SAMPLE_ROWS);
        assert_eq!(d.row_count, 5);
        assert_eq!(d.column_names, ["id", "name", "market_size_usd_millions"]);
        assert!(d.has_market_columns);
        assert!(!d.has_geo_columns);
        assert_eq!(d.kind, SourceKind::Procedures);
    }

    #[test]
    fn test_descriptor_with_exact_count_and_geo() {
        let d = TableDescriptor::from_sample(
            "regions",
            Some(52),
            vec![json!({ "territory": "NY", "avg_price": 10 })],
        );
        assert_eq!(d.row_count, 52);
        assert!(d.has_geo_columns);
        assert!(d.has_market_columns);
        assert_eq!(d.kind, SourceKind::Geography);
    }
}
