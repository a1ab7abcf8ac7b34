//! Input format detection and the single import entry point

use crate::core::error::{ParseError, ParseWarning};
use crate::core::prisma_parser::{PrismaParser, strip_line_comment};
use crate::core::schema::SchemaModel;
use crate::core::sql_parser::{SqlDialect, SqlParser};
use serde::{Deserialize, Serialize};

/// Default cap on input size, in characters
pub const DEFAULT_MAX_INPUT_LEN: usize = 100_000;

/// Name given to models built by the importers
pub const DEFAULT_IMPORTED_SCHEMA_NAME: &str = "Imported schema";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaFormat {
    Sql,
    Prisma,
}

impl std::fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaFormat::Sql => write!(f, "sql"),
            SchemaFormat::Prisma => write!(f, "prisma"),
        }
    }
}

impl std::str::FromStr for SchemaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sql" | "ddl" => Ok(SchemaFormat::Sql),
            "prisma" => Ok(SchemaFormat::Prisma),
            _ => Err(format!("Unknown schema format: {}", s)),
        }
    }
}

/// Options shared by both importers
#[derive(Clone, Debug, PartialEq)]
pub struct ParseOptions {
    pub dialect: SqlDialect,
    pub max_input_len: usize,
    pub schema_name: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            max_input_len: DEFAULT_MAX_INPUT_LEN,
            schema_name: DEFAULT_IMPORTED_SCHEMA_NAME.to_string(),
        }
    }
}

/// A successfully imported model and the non-fatal issues found on the way
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub model: SchemaModel,
    pub warnings: Vec<ParseWarning>,
}

/// Guess the format of `text`. Never fails: anything without a Prisma model header
/// and an `@` sigil is treated as SQL.
pub fn detect_format(text: &str) -> SchemaFormat {
    if text.contains('@') && text.lines().any(is_model_header) {
        SchemaFormat::Prisma
    } else {
        SchemaFormat::Sql
    }
}

/// `model Name {`, possibly followed by a `//` comment
fn is_model_header(line: &str) -> bool {
    let Some(rest) = strip_line_comment(line).trim().strip_prefix("model") else {
        return false;
    };
    let Some(name) = rest.strip_suffix('{') else {
        return false;
    };
    let name = name.trim();
    rest.starts_with(char::is_whitespace)
        && !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Import `text` as a schema model, detecting the format unless one is given
pub fn import_schema(
    text: &str,
    format: Option<SchemaFormat>,
    options: &ParseOptions,
) -> Result<ParseOutcome, ParseError> {
    let format = format.unwrap_or_else(|| detect_format(text));
    tracing::debug!(%format, "Importing schema");
    match format {
        SchemaFormat::Sql => SqlParser::with_options(options).parse(text),
        SchemaFormat::Prisma => PrismaParser::with_options(options).parse(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_prisma() {
        let text = "model User {\n  id Int @id\n}\n";
        assert_eq!(detect_format(text), SchemaFormat::Prisma);
        assert_eq!(detect_format("model User{\n id Int @id\n}"), SchemaFormat::Prisma);
    }

    #[test]
    fn test_model_header_with_trailing_comment() {
        let text = "model User { // accounts\n  id Int @id\n}\n";
        assert_eq!(detect_format(text), SchemaFormat::Prisma);
        assert!(!is_model_header("model User // {"));
    }

    #[test]
    fn test_model_header_without_sigil_is_sql() {
        assert_eq!(detect_format("model User {\n}\n"), SchemaFormat::Sql);
    }

    #[test]
    fn test_detects_sql_and_defaults() {
        assert_eq!(detect_format("Create Table t (id int);"), SchemaFormat::Sql);
        assert_eq!(detect_format("hello world"), SchemaFormat::Sql);
        assert_eq!(detect_format(""), SchemaFormat::Sql);
    }

    #[test]
    fn test_explicit_format_bypasses_detection() {
        let text = "model User {\n  id Int @id\n}\n";
        let err = import_schema(text, Some(SchemaFormat::Sql), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::EmptySchema { .. }));

        let outcome = import_schema(text, None, &ParseOptions::default()).unwrap();
        assert_eq!(outcome.model.tables[0].name, "User");
        assert_eq!(outcome.model.name, DEFAULT_IMPORTED_SCHEMA_NAME);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("Prisma".parse::<SchemaFormat>().unwrap(), SchemaFormat::Prisma);
        assert!("yaml".parse::<SchemaFormat>().is_err());
    }
}
