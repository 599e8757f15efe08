//! Table Store Response Helpers
//!
//! Parsing for the bits of the store's HTTP responses that are not
//! plain row sets: `Content-Range` totals, table-list payloads and
//! error bodies.

use serde_json::Value;

use crate::ports::table_client::QueryOptions;

/// Longest error body kept on a `SourceFetchError`.
pub const MAX_ERROR_BODY: usize = 256;

/// Query-string pairs for a row fetch.
///
/// Filters become `column=eq.value`.
pub fn query_params(options: &QueryOptions) -> Vec<(String, String)> {
  let mut params = vec![("select".to_string(), "*".to_string())];
  if let Some(limit) = options.limit {
    params.push(("limit".to_string(), limit.to_string()));
  }
  for (column, value) in &options.filters {
    params.push((column.clone(), format!("eq.{value}")));
  }
  params
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub fn parse_content_range(header: &str) -> Option<u64> {
  let (_, total) = header.rsplit_once('/')?;
  total.trim().parse().ok()
}

/// Table names from an enumeration payload.
///
/// Accepts bare strings or objects carrying `table_name` / `name`;
/// anything else is ignored.
pub fn table_names(rows: &[Value]) -> Vec<String> {
  rows
    .iter()
    .filter_map(|row| match row {
      Value::String(name) => Some(name.clone()),
      Value::Object(fields) => fields
        .get("table_name")
        .or_else(|| fields.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string),
      _ => None,
    })
    .filter(|name| !name.is_empty())
    .collect()
}

/// Truncate an error body on a char boundary.
pub fn truncate_body(body: &str) -> String {
  match body.char_indices().nth(MAX_ERROR_BODY) {
    Some((cut, _)) => format!("{}…", &body[..cut]),
    None => body.to_string(),
  }
}
