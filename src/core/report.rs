use crate::domain::model::{DependantMap, RankedEntry};
use crate::utils::error::Result;
use std::fmt::Write;

/// JSON array of `{"name": ..., "count": ...}` objects in ranked order.
pub fn ranked_to_json(entries: &[RankedEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

/// `| # | name | count |` table, one row per ranked entry.
pub fn ranked_to_markdown(entries: &[RankedEntry]) -> String {
    let mut out = String::from("| # | name | count |\n|---|------|-------|\n");
    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "| {} | {} | {} |", i + 1, entry.name, entry.count);
    }
    out
}

/// JSON object keyed by dependency name; dependant lists come out sorted
/// because the map is BTree-backed.
pub fn dependants_to_json(map: &DependantMap) -> Result<String> {
    Ok(serde_json::to_string_pretty(map)?)
}
