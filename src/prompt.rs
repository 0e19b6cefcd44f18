/// Static natural-language/SQL usage patterns included in every prompt to
/// steer the model toward the shapes of query this service supports.
pub fn query_examples() -> &'static str {
    r#"Common Query Examples:

1. User Management:
   Input: "Show all active users"
   Description: Query users with active status

2. Data Statistics:
   Input: "Count records by status"
   Description: Count records grouped by status

3. Time-based Queries:
   Input: "Show records created in the last month"
   Description: Query records with date filtering

4. Aggregation Queries:
   Input: "Calculate average values by category"
   Description: Aggregate data by category

Notes:
- Query results are capped at 1000 rows
- Only read-only SELECT statements are executed
"#
}

/// Composes the completion request text from the schema description, the
/// example corpus and the user's question.
///
/// The embedded rules are guidance for the model, not a security boundary:
/// every constraint they describe is independently enforced by the validator
/// and the limit enforcer downstream.
pub fn build_prompt(schema: &str, examples: &str, user_query: &str) -> String {
    format!(
        r#"You are a professional SQL generation expert. Generate a correct PostgreSQL query statement for the user's natural language requirement.

{schema}

{examples}

Important Rules:
1. Only return the SQL statement, no other text or explanation
2. Use PostgreSQL syntax
3. Use double quotes for table and column names (e.g., "table_name"."column_name")
4. Use the CURRENT_DATE function for date queries
5. Limit query results to a maximum of 1000 records (use LIMIT 1000)
6. Do not use DROP, DELETE, UPDATE, INSERT or other modification statements
7. All tables are in the main schema, use table names directly without schema prefix

User requirement: {user_query}

Generate the corresponding SQL query statement:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_schema_examples_and_question() {
        let prompt = build_prompt(
            "Table: users\nColumns:\n  - id (BIGINT)",
            query_examples(),
            "Show me all users",
        );

        assert!(prompt.contains("Table: users"));
        assert!(prompt.contains("Common Query Examples:"));
        assert!(prompt.contains("User requirement: Show me all users"));
    }

    #[test]
    fn prompt_states_the_safety_rules() {
        let prompt = build_prompt("", "", "anything");
        assert!(prompt.contains("LIMIT 1000"));
        assert!(prompt.contains("Do not use DROP, DELETE, UPDATE, INSERT"));
        assert!(prompt.contains("Only return the SQL statement"));
        assert!(prompt.contains("double quotes"));
    }
}
