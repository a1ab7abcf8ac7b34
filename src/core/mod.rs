//! Core domain models and business logic for database schema management

pub mod auto_layout;
pub mod config;
mod data_type;
mod error;
pub mod export;
pub mod fk_graph;
pub mod format;
pub mod presets;
pub mod prisma_parser;
mod schema;
pub mod sql_parser;
pub mod validation;

pub use auto_layout::{LayoutConfig, LayoutMode, LayoutResult, auto_layout, layout_missing};
pub use data_type::*;
pub use error::*;
pub use export::{ExportOptions, SchemaExporter};
pub use fk_graph::{EdgeId, ForeignKeyEdge, derive_edges, on_edge_removed};
pub use format::{ParseOptions, ParseOutcome, SchemaFormat, detect_format, import_schema};
pub use presets::demo_schema;
pub use prisma_parser::{PrismaParser, parse_prisma};
pub use schema::*;
pub use sql_parser::{SqlDialect, SqlParser, parse_sql};
