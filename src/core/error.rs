//! Error and warning types shared by the importers and the model mutators

use crate::core::data_type::DataType;
use serde::Serialize;

/// Fatal import failure. A parser returning this never produced a model.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum ParseError {
    #[error("Empty schema: no {expected} found")]
    EmptySchema { expected: &'static str },

    #[error("Syntax error: {message} (near `{fragment}`)")]
    Syntax { message: String, fragment: String },

    #[error("Input is too large ({actual} characters, max {max})")]
    InputTooLarge { max: usize, actual: usize },

    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        ParseError::Syntax {
            message: message.into(),
            fragment: fragment.into(),
        }
    }
}

/// Non-fatal import issue reported next to a still-valid model
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum ParseWarning {
    #[error("Unsupported type '{found}' for {table}.{column}, using {coerced_to}")]
    UnsupportedType {
        table: String,
        column: String,
        found: String,
        coerced_to: DataType,
    },

    #[error("Table '{name}' already defined, skipping duplicate")]
    DuplicateTable { name: String },

    #[error("{context} refers to unknown table '{table}', skipping")]
    UnknownTable { context: String, table: String },

    #[error("Unsupported index method '{method}' on '{index}', using BTREE")]
    UnsupportedIndexMethod { index: String, method: String },

    #[error("Ignoring statement `{fragment}`")]
    IgnoredStatement { fragment: String },
}

/// Failure of a model mutator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Table '{0}' already exists")]
    DuplicateTable(String),

    #[error("Column '{column}' already exists in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Index '{0}' already exists")]
    DuplicateIndex(String),

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Table not found")]
    TableNotFound,

    #[error("Column not found")]
    ColumnNotFound,

    #[error("Column index {index} out of bounds (table has {len} columns)")]
    ColumnIndexOutOfBounds { index: usize, len: usize },
}
