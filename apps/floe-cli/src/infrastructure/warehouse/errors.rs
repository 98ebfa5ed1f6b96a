use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WarehouseError {
    #[error("Warehouse - Invalid {identifier_type}: '{name}' - {reason}")]
    InvalidIdentifier {
        identifier_type: String,
        name: String,
        reason: String,
    },

    #[error("Warehouse - Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Warehouse - Query render error: {0}")]
    QueryRender(#[from] handlebars::RenderError),

    #[error("Warehouse - HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Warehouse - Control plane returned {status} for statement: {message}")]
    StatementFailed { status: u16, message: String },

    #[error("Warehouse - Unexpected response shape: {0}")]
    ResponseDecode(#[from] serde_json::Error),

    #[error("Warehouse - Missing column '{column}' in {statement} output")]
    MissingColumn {
        column: &'static str,
        statement: &'static str,
    },
}

/// Checks that a keyword-valued parameter (privilege, size, property name)
/// is safe to interpolate into a statement: letters, digits, underscores and
/// single spaces only.
pub fn is_valid_keyword(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
        && !value.starts_with(' ')
        && !value.ends_with(' ')
}

/// Validates a keyword parameter, returning a typed error on failure.
pub fn validate_keyword(value: &str, what: &str) -> Result<(), WarehouseError> {
    if is_valid_keyword(value) {
        return Ok(());
    }
    Err(WarehouseError::InvalidParameters {
        message: format!("{what} '{value}' contains characters outside [A-Za-z0-9_ ]"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_validation() {
        assert!(is_valid_keyword("USAGE"));
        assert!(is_valid_keyword("CREATE TABLE"));
        assert!(is_valid_keyword("XSMALL"));
        assert!(!is_valid_keyword(""));
        assert!(!is_valid_keyword(" USAGE"));
        assert!(!is_valid_keyword("USAGE; DROP TABLE T"));
    }
}
