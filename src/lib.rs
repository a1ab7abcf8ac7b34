//! Archischema core - database schema model and interchange
//!
//! Imports SQL DDL and Prisma schemas into one canonical model, derives the
//! foreign-key graph from column references, lays tables out on a canvas and
//! exports the model back to SQL, Prisma or JSON.

pub mod core;

pub use crate::core::{
    ParseError, ParseOptions, ParseOutcome, ParseWarning, SchemaFormat, SchemaModel, import_schema,
};
