use crate::db::executor::Row;

/// Query words that suggest the result set is already aggregated and
/// therefore chart-sized as a whole.
const AGGREGATION_HINTS: [&str; 4] = ["count", "sum", "avg", "statistics"];

/// Maximum rows handed to the presentation layer for non-aggregated results.
const CHART_ROW_CAP: usize = 10;

/// Heuristic, advisory mapping from tabular rows to chart-ready rows. Never a
/// substitute for the full result set and carries no correctness guarantee.
pub fn derive_chart_data(rows: &[Row], user_query: &str) -> Vec<Row> {
    if rows.is_empty() {
        return Vec::new();
    }

    let lowered = user_query.to_lowercase();
    if AGGREGATION_HINTS.iter().any(|hint| lowered.contains(hint)) {
        return rows.to_vec();
    }

    rows.iter().take(CHART_ROW_CAP).cloned().collect()
}
