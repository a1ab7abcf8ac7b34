//! Validation of identifiers and foreign-key targets
//!
//! Identifier rules are the common subset of MySQL, PostgreSQL and SQLite. They apply to
//! names typed in the editor; imported names are taken as-is since the source text may
//! quote them.
//!
//! Dangling references are *reported*, never rejected: a reference to a table that does
//! not exist yet is a normal editing state.

use crate::core::schema::{ColumnId, SchemaModel, TableId};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Maximum length for identifiers (MySQL limit, the strictest of the three)
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

static RESERVED_KEYWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK",
        "COLUMN", "CONSTRAINT", "CREATE", "CROSS", "CURRENT_DATE", "CURRENT_TIME",
        "CURRENT_TIMESTAMP", "CURRENT_USER", "DATABASE", "DEFAULT", "DELETE", "DESC",
        "DISTINCT", "DROP", "ELSE", "END", "EXISTS", "FALSE", "FETCH", "FOR", "FOREIGN",
        "FROM", "FULL", "GRANT", "GROUP", "HAVING", "IF", "IN", "INDEX", "INNER", "INSERT",
        "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON",
        "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET", "TABLE",
        "THEN", "TO", "TRUE", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN",
        "WHERE", "WITH",
        // MySQL
        "AUTO_INCREMENT", "CHANGE", "DATABASES", "DIV", "ENCLOSED", "EXPLAIN", "FULLTEXT",
        "KEYS", "KILL", "LOCK", "MOD", "RENAME", "REPLACE", "REGEXP", "SCHEMA", "SHOW",
        "SPATIAL", "UNSIGNED", "ZEROFILL",
        // PostgreSQL
        "ANALYSE", "ANALYZE", "ARRAY", "ASYMMETRIC", "BOTH", "CAST", "COLLATE", "DEFERRABLE",
        "DO", "EXCEPT", "ILIKE", "INITIALLY", "INTERSECT", "LATERAL", "LEADING", "LOCALTIME",
        "LOCALTIMESTAMP", "ONLY", "PLACING", "RETURNING", "SIMILAR", "SOME", "SYMMETRIC",
        "TRAILING", "USER", "VARIADIC", "WINDOW",
    ]
    .into_iter()
    .collect()
});

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Empty,
    TooLong { max: usize, actual: usize },
    InvalidCharacters { invalid: Vec<char> },
    StartsWithDigit,
    StartsWithUnderscore,
    ReservedKeyword { keyword: String },
    NoLetters,
    ConsecutiveUnderscores,
    EndsWithUnderscore,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Empty => write!(f, "Name cannot be empty"),
            ValidationError::TooLong { max, actual } => {
                write!(f, "Name is too long ({} chars, max {})", actual, max)
            }
            ValidationError::InvalidCharacters { invalid } => {
                let chars: String = invalid.iter().collect();
                write!(
                    f,
                    "Name contains invalid characters: '{}'. Only letters, numbers, and underscores are allowed",
                    chars
                )
            }
            ValidationError::StartsWithDigit => write!(f, "Name cannot start with a digit"),
            ValidationError::StartsWithUnderscore => {
                write!(f, "Name should not start with an underscore")
            }
            ValidationError::ReservedKeyword { keyword } => {
                write!(f, "'{}' is a reserved SQL keyword", keyword)
            }
            ValidationError::NoLetters => write!(f, "Name must contain at least one letter"),
            ValidationError::ConsecutiveUnderscores => {
                write!(f, "Name cannot contain consecutive underscores")
            }
            ValidationError::EndsWithUnderscore => {
                write!(f, "Name should not end with an underscore")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validation strictness level
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ValidationLevel {
    /// Empty, too long, invalid chars, leading digit
    Minimal,
    /// Minimal + reserved keywords
    #[default]
    Standard,
    /// Standard + style warnings promoted to errors
    Strict,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn to_result(&self) -> Result<(), ValidationError> {
        match self.errors.first() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Validates a table or column name
pub fn validate_identifier(name: &str, level: ValidationLevel) -> ValidationResult {
    let mut result = ValidationResult::default();

    let trimmed = name.trim();
    if trimmed.is_empty() {
        result.errors.push(ValidationError::Empty);
        return result;
    }

    if trimmed.len() > MAX_IDENTIFIER_LENGTH {
        result.errors.push(ValidationError::TooLong {
            max: MAX_IDENTIFIER_LENGTH,
            actual: trimmed.len(),
        });
    }

    let invalid: Vec<char> = trimmed
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && *c != '_')
        .collect();
    if !invalid.is_empty() {
        result
            .errors
            .push(ValidationError::InvalidCharacters { invalid });
    }

    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        result.errors.push(ValidationError::StartsWithDigit);
    }

    if !trimmed.chars().any(|c| c.is_ascii_alphabetic()) {
        result.errors.push(ValidationError::NoLetters);
    }

    if level != ValidationLevel::Minimal && is_reserved_keyword(trimmed) {
        result.errors.push(ValidationError::ReservedKeyword {
            keyword: trimmed.to_string(),
        });
    }

    let style = [
        (trimmed.starts_with('_'), ValidationError::StartsWithUnderscore),
        (trimmed.ends_with('_'), ValidationError::EndsWithUnderscore),
        (trimmed.contains("__"), ValidationError::ConsecutiveUnderscores),
    ];
    for (violated, error) in style {
        if !violated {
            continue;
        }
        if level == ValidationLevel::Strict {
            result.errors.push(error);
        } else {
            result.warnings.push(error);
        }
    }

    result
}

/// Standard-level validation returning the first error as text
pub fn validate_name(name: &str) -> Result<(), String> {
    validate_identifier(name, ValidationLevel::Standard)
        .to_result()
        .map_err(|e| e.to_string())
}

pub fn validate_table_name(name: &str) -> Result<(), String> {
    validate_name(name)
}

pub fn validate_column_name(name: &str) -> Result<(), String> {
    validate_name(name)
}

pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS.contains(name.to_uppercase().as_str())
}

/// Whether `name` can be emitted without quoting
pub fn is_plain_identifier(name: &str) -> bool {
    name == name.trim() && validate_identifier(name, ValidationLevel::Standard).is_valid()
}

/// A column reference whose target does not resolve against the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DanglingReference {
    pub table_id: TableId,
    pub column_id: ColumnId,
    pub table: String,
    pub column: String,
    pub target_table: String,
    pub target_column: String,
    /// `true` when the table exists but the column does not
    pub table_resolved: bool,
}

impl std::fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} references {}.{}, which does not exist",
            self.table, self.column, self.target_table, self.target_column
        )
    }
}

/// List every reference that does not currently resolve
pub fn find_dangling_references(model: &SchemaModel) -> Vec<DanglingReference> {
    let mut dangling = Vec::new();
    for table in &model.tables {
        for column in &table.columns {
            let Some(reference) = &column.reference else {
                continue;
            };
            let target = model.table_by_name(&reference.target_table);
            let resolved = target
                .and_then(|t| t.find_column(&reference.target_column))
                .is_some();
            if !resolved {
                dangling.push(DanglingReference {
                    table_id: table.id,
                    column_id: column.id,
                    table: table.name.clone(),
                    column: column.name.clone(),
                    target_table: reference.target_table.clone(),
                    target_column: reference.target_column.clone(),
                    table_resolved: target.is_some(),
                });
            }
        }
    }
    dangling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, ForeignKeyReference, Table};

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_name("users").is_ok());
        assert!(validate_name("user_id").is_ok());
        assert!(validate_name("User123").is_ok());
        assert!(validate_name("a").is_ok());
    }

    #[test]
    fn test_empty_name() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_too_long_name() {
        assert!(validate_name(&"a".repeat(65)).is_err());
        assert!(validate_name(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate_name("user-name").is_err());
        assert!(validate_name("user name").is_err());
        assert!(validate_name("user.name").is_err());
        assert!(validate_name("tëst").is_err());
    }

    #[test]
    fn test_starts_with_digit_and_no_letters() {
        assert!(validate_name("1user").is_err());
        assert!(validate_name("___").is_err());
    }

    #[test]
    fn test_reserved_keywords() {
        assert!(validate_name("SELECT").is_err());
        assert!(validate_name("table").is_err());
        assert!(validate_name("orders").is_ok());
        assert!(is_reserved_keyword("Where"));
        assert!(!is_plain_identifier("order"));
        assert!(is_plain_identifier("orders"));
    }

    #[test]
    fn test_validation_levels() {
        assert!(validate_identifier("select", ValidationLevel::Minimal).is_valid());
        assert!(!validate_identifier("select", ValidationLevel::Standard).is_valid());

        let strict = validate_identifier("_name", ValidationLevel::Strict);
        assert!(!strict.is_valid());

        let standard = validate_identifier("_name", ValidationLevel::Standard);
        assert!(standard.is_valid());
        assert!(standard.has_warnings());
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(ValidationError::Empty.to_string(), "Name cannot be empty");
        assert_eq!(
            ValidationError::TooLong {
                max: 64,
                actual: 100
            }
            .to_string(),
            "Name is too long (100 chars, max 64)"
        );
    }

    #[test]
    fn test_find_dangling_references() {
        let mut model = SchemaModel::new("shop");
        model
            .add_table(Table::new("users").add_column(Column::new("id", DataType::Integer)))
            .unwrap();
        model
            .add_table(
                Table::new("orders")
                    .add_column(
                        Column::new("user_id", DataType::Integer)
                            .references(ForeignKeyReference::new("users", "id")),
                    )
                    .add_column(
                        Column::new("coupon_id", DataType::Integer)
                            .references(ForeignKeyReference::new("coupons", "id")),
                    )
                    .add_column(
                        Column::new("buyer_email", DataType::Text)
                            .references(ForeignKeyReference::new("users", "email")),
                    ),
            )
            .unwrap();

        let dangling = find_dangling_references(&model);
        assert_eq!(dangling.len(), 2);
        assert_eq!(dangling[0].column, "coupon_id");
        assert!(!dangling[0].table_resolved);
        assert_eq!(dangling[1].column, "buyer_email");
        assert!(dangling[1].table_resolved);
        assert_eq!(
            dangling[0].to_string(),
            "orders.coupon_id references coupons.id, which does not exist"
        );
    }
}
