use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::error::Error;
use std::fmt;

/// Statements containing any of these (as a case-insensitive substring of the
/// full text) are rejected outright. The scan runs in addition to the
/// statement-type check because keywords can appear inside otherwise
/// SELECT-shaped text. A column literally named e.g. `update_count` trips it
/// too; that over-restriction is deliberate and fails closed.
const FORBIDDEN_KEYWORDS: [&str; 11] = [
    "DROP", "DELETE", "UPDATE", "INSERT", "CREATE", "ALTER", "TRUNCATE", "EXEC", "EXECUTE",
    "GRANT", "REVOKE",
];

#[derive(Debug)]
pub enum ValidationError {
    EmptyStatement,
    Syntax(String),
    NotASelect,
    ForbiddenKeyword(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyStatement => write!(f, "Generated SQL cannot be empty"),
            ValidationError::Syntax(msg) => write!(f, "SQL syntax error: {msg}"),
            ValidationError::NotASelect => write!(f, "Only SELECT queries are allowed"),
            ValidationError::ForbiddenKeyword(kw) => write!(f, "Forbidden SQL keyword: {kw}"),
        }
    }
}

impl Error for ValidationError {}

/// Parses the candidate with a real SQL grammar and enforces the safety
/// contract: exactly one statement, SELECT-shaped, no denylisted keyword
/// anywhere in the text. Returns the parsed AST for the limit enforcer.
pub fn validate_sql(candidate: &str) -> Result<Statement, ValidationError> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyStatement);
    }

    let dialect = PostgreSqlDialect {};
    let mut statements = Parser::parse_sql(&dialect, trimmed)
        .map_err(|e| ValidationError::Syntax(e.to_string()))?;

    let upper = trimmed.to_uppercase();
    for keyword in FORBIDDEN_KEYWORDS {
        if upper.contains(keyword) {
            return Err(ValidationError::ForbiddenKeyword(keyword));
        }
    }

    if statements.len() != 1 {
        return Err(ValidationError::NotASelect);
    }
    match statements.remove(0) {
        statement @ Statement::Query(_) => Ok(statement),
        _ => Err(ValidationError::NotASelect),
    }
}
