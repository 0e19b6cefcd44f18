use sqlparser::ast::{Expr, Statement, Value};

/// Hard cap on rows returned by any executed query.
pub const MAX_ROWS: u64 = 1000;

/// Ensures the query carries a row bound, operating on the parsed AST rather
/// than the SQL text, so a `LIMIT` inside a string literal or comment cannot
/// fool the check. An existing LIMIT or FETCH clause is left untouched.
pub fn enforce_limit(statement: &mut Statement, max_rows: u64) {
    if let Statement::Query(query) = statement {
        if query.limit.is_none() && query.fetch.is_none() {
            query.limit = Some(Expr::Value(Value::Number(max_rows.to_string(), false)));
        }
    }
}
