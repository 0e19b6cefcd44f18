use regex::Regex;

/// Isolates a single candidate SQL statement from raw model output.
///
/// Best-effort and deliberately permissive: markdown fences and
/// conversational lead-ins are stripped, and when a SELECT is present the
/// capture runs from its first occurrence to the first `;` or end of text.
/// Text with no SELECT passes through after cleanup so the validator, not
/// this function, is the enforcement point. Returns `None` only when nothing
/// non-empty remains.
pub fn extract_sql(raw: &str) -> Option<String> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    // Markdown code block markers, with or without the language tag
    let mut sql = cleaned.replace("```sql", "").replace("```", "");

    // Common conversational lead-ins at the start of the response
    let lead_in = Regex::new(
        r"(?i)^(here is|the following is|sql query statement as follows|query statement is|generated sql is)[:：]?\s*",
    )
    .unwrap();
    sql = lead_in.replace(sql.trim(), "").to_string();

    // First SELECT through the statement terminator; trailing prose and any
    // further statements are discarded
    let select = Regex::new(r"(?is)\bselect\b.*?(?:;|$)").unwrap();
    if let Some(m) = select.find(&sql) {
        sql = m.as_str().to_string();
    }

    let sql = sql.trim().trim_end_matches(';').trim();
    if sql.is_empty() {
        None
    } else {
        Some(sql.to_string())
    }
}
