//! Record Normalizer - Raw Rows to Canonical Records
//!
//! The only place in the crate that reasons about dynamic row shapes.
//! Every canonical field is resolved from an ordered, declarative list of
//! synonym keys: the first key that is present with a non-null value
//! wins, and later synonyms are never consulted once an earlier one is
//! present, even when its value is falsy (`0`, `""`) or cannot be coerced.
//! A present-but-unusable value yields the field's default.
//!
//! Normalization is total over key/value rows: missing data always has a
//! default. Only a row that is not a key/value object is rejected.

use std::collections::HashSet;

use serde_json::Value;

use super::record::{
    Industry, NormalizedCategory, NormalizedCompany, NormalizedProcedure, NormalizedRecord,
    RawRecord, RecordKind, RegionalPayload,
};
use crate::error::NormalizeError;

/// Ordered synonym list for one canonical field.
pub type Synonyms = &'static [&'static str];

// ────────────────────────────────────────────
// Synonym tables
// ────────────────────────────────────────────

/// Synonym chains for procedure fields.
#[derive(Debug, Clone, Copy)]
pub struct ProcedureKeys {
    pub id: Synonyms,
    pub name: Synonyms,
    /// Source-specific chain, tried before the industry default literal.
    pub category: Synonyms,
    pub description: Synonyms,
    pub market_size: Synonyms,
    pub growth: Synonyms,
    pub average_cost: Synonyms,
    pub trending: Synonyms,
    pub popularity: Synonyms,
    pub regional: Synonyms,
}

/// Synonym chains for company fields.
#[derive(Debug, Clone, Copy)]
pub struct CompanyKeys {
    pub id: Synonyms,
    pub name: Synonyms,
    pub category: Synonyms,
    pub market_size: Synonyms,
    pub growth: Synonyms,
    pub market_share: Synonyms,
    pub headquarters: Synonyms,
}

/// Synonym chains for category fields.
#[derive(Debug, Clone, Copy)]
pub struct CategoryKeys {
    pub id: Synonyms,
    pub name: Synonyms,
    pub market_size: Synonyms,
    pub growth: Synonyms,
    pub procedure_count: Synonyms,
}

const ID_KEYS: Synonyms = &["id"];
const MARKET_SIZE_KEYS: Synonyms = &[
    "market_size_2025_usd_millions",
    "market_size_usd_millions",
    "market_size",
];
const GROWTH_KEYS: Synonyms = &[
    "yearly_growth_percentage",
    "yearly_growth_percent",
    "growth_rate",
];
const AVERAGE_COST_KEYS: Synonyms = &["average_cost_usd", "avg_cost_usd", "average_cost"];
const DESCRIPTION_KEYS: Synonyms = &["description", "procedure_description", "summary"];
const TRENDING_KEYS: Synonyms = &["trending_score", "trend_score"];
const POPULARITY_KEYS: Synonyms = &["popularity_score", "popularity"];
const REGIONAL_KEYS: Synonyms = &[
    "regional_popularity",
    "regional_data",
    "territory_popularity",
];
const PROCEDURE_NAME_KEYS: Synonyms = &["procedure_name", "name", "title"];

pub const DENTAL_PROCEDURE_KEYS: ProcedureKeys = ProcedureKeys {
    id: ID_KEYS,
    name: PROCEDURE_NAME_KEYS,
    category: &[
        "category",
        "procedure_category",
        "dental_category",
        "clinical_category",
    ],
    description: DESCRIPTION_KEYS,
    market_size: MARKET_SIZE_KEYS,
    growth: GROWTH_KEYS,
    average_cost: AVERAGE_COST_KEYS,
    trending: TRENDING_KEYS,
    popularity: POPULARITY_KEYS,
    regional: REGIONAL_KEYS,
};

pub const AESTHETIC_PROCEDURE_KEYS: ProcedureKeys = ProcedureKeys {
    id: ID_KEYS,
    name: PROCEDURE_NAME_KEYS,
    category: &[
        "category",
        "treatment_category",
        "aesthetic_category",
        "body_area",
    ],
    description: DESCRIPTION_KEYS,
    market_size: MARKET_SIZE_KEYS,
    growth: GROWTH_KEYS,
    average_cost: AVERAGE_COST_KEYS,
    trending: TRENDING_KEYS,
    popularity: POPULARITY_KEYS,
    regional: REGIONAL_KEYS,
};

pub const COMPANY_KEYS: CompanyKeys = CompanyKeys {
    id: ID_KEYS,
    name: &["name", "company_name"],
    category: &["specialty", "category", "segment"],
    market_size: &[
        "market_size_usd_millions",
        "revenue_usd_millions",
        "annual_revenue_usd_millions",
        "market_size",
    ],
    growth: GROWTH_KEYS,
    market_share: &["market_share_percent", "market_share"],
    headquarters: &["headquarters_state", "headquarters", "hq_location"],
};

pub const CATEGORY_KEYS: CategoryKeys = CategoryKeys {
    id: ID_KEYS,
    name: &["name", "category_name", "category"],
    market_size: MARKET_SIZE_KEYS,
    growth: GROWTH_KEYS,
    procedure_count: &["procedure_count", "procedures_count", "total_procedures"],
};

pub const UNNAMED_PROCEDURE: &str = "Unnamed Procedure";
pub const UNNAMED_COMPANY: &str = "Unnamed Company";
pub const UNNAMED_CATEGORY: &str = "Unnamed Category";
pub const GENERAL_CATEGORY: &str = "General";

/// Procedure synonym table for an industry.
pub const fn procedure_keys(industry: Industry) -> &'static ProcedureKeys {
    match industry {
        Industry::Dental => &DENTAL_PROCEDURE_KEYS,
        Industry::Aesthetic => &AESTHETIC_PROCEDURE_KEYS,
    }
}

/// Literal a procedure category falls back to after its synonym chain.
pub const fn default_procedure_category(industry: Industry) -> &'static str {
    match industry {
        Industry::Dental => "Dental Procedure",
        Industry::Aesthetic => "Aesthetic Procedure",
    }
}

// ────────────────────────────────────────────
// Field resolution
// ────────────────────────────────────────────

/// First synonym that is present with a non-null value.
pub fn resolve<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !value.is_null())
}

/// Resolve across several chains as if they were one, in order.
fn resolve_chained<'a>(raw: &'a RawRecord, chains: &[Synonyms]) -> Option<&'a Value> {
    chains.iter().find_map(|keys| resolve(raw, keys))
}

/// Coerce a JSON number or numeric string to a finite f64.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Coerce a JSON string or number to non-empty trimmed text.
pub fn coerce_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn number_or(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(coerce_number).unwrap_or(default)
}

fn text_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(coerce_text)
        .unwrap_or_else(|| default.to_string())
}

fn record_id(raw: &RawRecord, keys: Synonyms, industry: Industry, name: &str) -> String {
    resolve(raw, keys)
        .and_then(coerce_text)
        .unwrap_or_else(|| format!("{industry}_{name}"))
}

fn non_negative(n: f64) -> f64 {
    n.max(0.0)
}

fn score(n: f64) -> f64 {
    n.clamp(0.0, 100.0)
}

fn regional_payload(value: Option<&Value>) -> Option<RegionalPayload> {
    let payload = match value? {
        Value::Object(map) => RegionalPayload::Structured(map.clone()),
        Value::String(text) => RegionalPayload::Encoded(text.clone()),
        _ => return None,
    };
    (!payload.is_empty()).then_some(payload)
}

// ────────────────────────────────────────────
// Normalization
// ────────────────────────────────────────────

/// Normalize one raw row from a source of the given industry and kind.
///
/// # Errors
/// Returns `NormalizeError::NotAnObject` if the row is not a key/value map.
pub fn normalize(
    row: &Value,
    table: &str,
    industry: Industry,
    kind: RecordKind,
) -> Result<NormalizedRecord, NormalizeError> {
    let raw = row.as_object().ok_or_else(|| NormalizeError::NotAnObject {
        table: table.to_string(),
        found: json_type(row),
    })?;

    Ok(match kind {
        RecordKind::Procedures => NormalizedRecord::Procedure(normalize_procedure(raw, industry)),
        RecordKind::Companies => NormalizedRecord::Company(normalize_company(raw, industry)),
        RecordKind::Categories => NormalizedRecord::Category(normalize_category(raw, industry)),
    })
}

/// Map a raw row onto the canonical procedure shape.
pub fn normalize_procedure(raw: &RawRecord, industry: Industry) -> NormalizedProcedure {
    let keys = procedure_keys(industry);

    let name = text_or(resolve(raw, keys.name), UNNAMED_PROCEDURE);
    let id = record_id(raw, keys.id, industry, &name);

    // Trending and popularity each fall back to the other's chain.
    let trending = number_or(resolve_chained(raw, &[keys.trending, keys.popularity]), 0.0);
    let popularity = number_or(resolve_chained(raw, &[keys.popularity, keys.trending]), 0.0);

    NormalizedProcedure {
        id,
        category: text_or(
            resolve(raw, keys.category),
            default_procedure_category(industry),
        ),
        industry,
        description: text_or(resolve(raw, keys.description), ""),
        market_size_usd_millions: non_negative(number_or(resolve(raw, keys.market_size), 0.0)),
        yearly_growth_percent: number_or(resolve(raw, keys.growth), 0.0),
        average_cost_usd: non_negative(number_or(resolve(raw, keys.average_cost), 0.0)),
        trending_score: score(trending),
        popularity_score: score(popularity),
        regional_popularity: regional_payload(resolve(raw, keys.regional)),
        name,
    }
}

/// Map a raw row onto the canonical company shape.
pub fn normalize_company(raw: &RawRecord, industry: Industry) -> NormalizedCompany {
    let keys = &COMPANY_KEYS;
    let name = text_or(resolve(raw, keys.name), UNNAMED_COMPANY);

    NormalizedCompany {
        id: record_id(raw, keys.id, industry, &name),
        category: text_or(resolve(raw, keys.category), GENERAL_CATEGORY),
        industry,
        market_size_usd_millions: non_negative(number_or(resolve(raw, keys.market_size), 0.0)),
        yearly_growth_percent: number_or(resolve(raw, keys.growth), 0.0),
        market_share_percent: score(number_or(resolve(raw, keys.market_share), 0.0)),
        headquarters: resolve(raw, keys.headquarters).and_then(coerce_text),
        name,
    }
}

/// Map a raw row onto the canonical category shape.
pub fn normalize_category(raw: &RawRecord, industry: Industry) -> NormalizedCategory {
    let keys = &CATEGORY_KEYS;
    let name = text_or(resolve(raw, keys.name), UNNAMED_CATEGORY);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let procedure_count = non_negative(number_or(resolve(raw, keys.procedure_count), 0.0)) as u64;

    NormalizedCategory {
        id: record_id(raw, keys.id, industry, &name),
        industry,
        market_size_usd_millions: non_negative(number_or(resolve(raw, keys.market_size), 0.0)),
        yearly_growth_percent: number_or(resolve(raw, keys.growth), 0.0),
        procedure_count,
        name,
    }
}

/// Keep the first record for each id, preserving order.
pub fn dedupe_by_id<T>(records: Vec<T>, id: impl Fn(&T) -> &str) -> Vec<T> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(id(record).to_string()))
        .collect()
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
