//! Schema export
//!
//! Renders a [`SchemaModel`] back into SQL DDL (per dialect), a Prisma schema, or JSON.
//! Exported text re-imports to the same tables, columns, foreign keys and indexes.

use crate::core::data_type::DataType;
use crate::core::schema::{Column, IndexType, ReferentialAction, SchemaModel, Table};
use crate::core::sql_parser::SqlDialect;
use crate::core::validation::is_plain_identifier;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

/// Export options
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOptions {
    pub sql_dialect: SqlDialect,
    /// Write `-- Position: (x, y)` hints above each `CREATE TABLE`
    pub include_positions: bool,
    /// Start with `DROP TABLE IF EXISTS` for every table
    pub include_drop_statements: bool,
    pub pretty_print: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            sql_dialect: SqlDialect::Generic,
            include_positions: true,
            include_drop_statements: false,
            pretty_print: true,
        }
    }
}

pub struct SchemaExporter;

impl SchemaExporter {
    // ========================================================================
    // SQL
    // ========================================================================

    pub fn export_sql(model: &SchemaModel, options: &ExportOptions) -> String {
        let dialect = options.sql_dialect;
        let mut out = String::new();
        let _ = writeln!(out, "-- Schema: {}", model.name);
        for line in model.description.lines() {
            let _ = writeln!(out, "-- {}", line);
        }
        out.push('\n');

        if options.include_drop_statements {
            for table in model.tables.iter().rev() {
                let _ = writeln!(out, "DROP TABLE IF EXISTS {};", quote(&table.name, dialect));
            }
            out.push('\n');
        }

        for table in &model.tables {
            if options.include_positions
                && let Some((x, y)) = table.position
            {
                let _ = writeln!(out, "-- Position: ({}, {})", x, y);
            }
            out.push_str(&Self::create_table(table, options));
            out.push_str("\n\n");

            for index in &table.indexes {
                let unique = if index.unique { "UNIQUE " } else { "" };
                let columns = index
                    .columns
                    .iter()
                    .map(|c| index_column(c, dialect))
                    .collect::<Vec<_>>()
                    .join(", ");
                let method = (index.index_type != IndexType::Btree).then_some(index.index_type);
                let _ = write!(
                    out,
                    "CREATE {}INDEX {} ON {}",
                    unique,
                    quote(&index.name, dialect),
                    quote(&table.name, dialect)
                );
                match (dialect, method) {
                    (SqlDialect::MySQL, Some(m)) => {
                        let _ = write!(out, " ({}) USING {}", columns, m);
                    }
                    (SqlDialect::SQLite, _) | (_, None) => {
                        let _ = write!(out, " ({})", columns);
                    }
                    (_, Some(m)) => {
                        let _ = write!(out, " USING {} ({})", m, columns);
                    }
                }
                if dialect == SqlDialect::MySQL
                    && let Some(comment) = &index.comment
                {
                    let _ = write!(out, " COMMENT {}", sql_string(comment));
                }
                out.push_str(";\n");
            }
            if !table.indexes.is_empty() {
                out.push('\n');
            }
        }

        if matches!(dialect, SqlDialect::Generic | SqlDialect::PostgreSQL) {
            let comments = Self::comment_statements(model, dialect);
            if !comments.is_empty() {
                out.push_str(&comments.join("\n"));
                out.push('\n');
            }
        }

        tracing::debug!(%dialect, tables = model.tables.len(), "Exported SQL");
        out.trim_end().to_string() + "\n"
    }

    fn create_table(table: &Table, options: &ExportOptions) -> String {
        let dialect = options.sql_dialect;
        let primary_keys: Vec<&Column> = table.primary_key_columns();
        let inline_pk = primary_keys.len() == 1;

        let mut elements: Vec<String> = table
            .columns
            .iter()
            .map(|column| column_definition(column, inline_pk, dialect))
            .collect();
        if primary_keys.len() > 1 {
            let names: Vec<String> = primary_keys.iter().map(|c| quote(&c.name, dialect)).collect();
            elements.push(format!("PRIMARY KEY ({})", names.join(", ")));
        }

        let mut sql = format!("CREATE TABLE {} (", quote(&table.name, dialect));
        if options.pretty_print {
            sql.push_str("\n  ");
            sql.push_str(&elements.join(",\n  "));
            sql.push_str("\n)");
        } else {
            sql.push_str(&elements.join(", "));
            sql.push(')');
        }
        if dialect == SqlDialect::MySQL
            && let Some(comment) = &table.comment
        {
            let _ = write!(sql, " COMMENT={}", sql_string(comment));
        }
        sql.push(';');
        sql
    }

    fn comment_statements(model: &SchemaModel, dialect: SqlDialect) -> Vec<String> {
        let mut statements = Vec::new();
        for table in &model.tables {
            let table_name = quote(&table.name, dialect);
            if let Some(comment) = &table.comment {
                statements.push(format!("COMMENT ON TABLE {} IS {};", table_name, sql_string(comment)));
            }
            for column in &table.columns {
                if let Some(comment) = &column.comment {
                    statements.push(format!(
                        "COMMENT ON COLUMN {}.{} IS {};",
                        table_name,
                        quote(&column.name, dialect),
                        sql_string(comment)
                    ));
                }
            }
            for index in &table.indexes {
                if let Some(comment) = &index.comment {
                    statements.push(format!(
                        "COMMENT ON INDEX {} IS {};",
                        quote(&index.name, dialect),
                        sql_string(comment)
                    ));
                }
            }
        }
        statements
    }

    // ========================================================================
    // Prisma
    // ========================================================================

    pub fn export_prisma(model: &SchemaModel) -> String {
        let names = PrismaNames::new(model);
        // (field, type, attributes) per model index
        let mut relation_fields: HashMap<usize, Vec<(String, String, String)>> = HashMap::new();
        let mut taken: Vec<HashSet<String>> = model
            .tables
            .iter()
            .enumerate()
            .map(|(idx, table)| table.columns.iter().map(|c| names.field(idx, &c.name)).collect())
            .collect();

        for (source_idx, table) in model.tables.iter().enumerate() {
            for column in &table.columns {
                let Some(reference) = &column.reference else {
                    continue;
                };
                let Some(target_idx) = model
                    .tables
                    .iter()
                    .position(|t| t.name.eq_ignore_ascii_case(&reference.target_table))
                else {
                    continue;
                };
                let target = &model.tables[target_idx];
                let Some((_, target_column)) = target.find_column(&reference.target_column) else {
                    continue;
                };

                let relation = format!("{}_{}", table.name, column.name);
                let field = names.field(source_idx, &column.name);

                let stripped = field
                    .strip_suffix("_id")
                    .or_else(|| field.strip_suffix("Id"))
                    .filter(|s| !s.is_empty())
                    .unwrap_or(&field);
                let forward = if stripped == field {
                    unique_name(&mut taken[source_idx], format!("{}_ref", field))
                } else {
                    unique_name(&mut taken[source_idx], stripped.to_string())
                };

                let mut attrs = format!(
                    "@relation(\"{}\", fields: [{}], references: [{}]",
                    relation,
                    field,
                    names.field(target_idx, &target_column.name)
                );
                if let Some(action) = reference.on_delete {
                    let _ = write!(attrs, ", onDelete: {}", prisma_action(action));
                }
                if let Some(action) = reference.on_update {
                    let _ = write!(attrs, ", onUpdate: {}", prisma_action(action));
                }
                attrs.push(')');
                let optional = if column.nullable { "?" } else { "" };
                relation_fields.entry(source_idx).or_default().push((
                    forward,
                    format!("{}{}", names.model(target_idx), optional),
                    attrs,
                ));

                let one_to_one = column.unique
                    || (column.primary_key && table.primary_key_columns().len() == 1);
                let back = unique_name(
                    &mut taken[target_idx],
                    format!("{}_{}", names.field_base(source_idx), field),
                );
                relation_fields.entry(target_idx).or_default().push((
                    back,
                    format!("{}{}", names.model(source_idx), if one_to_one { "?" } else { "[]" }),
                    format!("@relation(\"{}\")", relation),
                ));
            }
        }

        let mut out = String::from(
            "datasource db {\n  provider = \"postgresql\"\n  url      = env(\"DATABASE_URL\")\n}\n",
        );
        for (idx, table) in model.tables.iter().enumerate() {
            out.push('\n');
            if let Some(comment) = &table.comment {
                for line in comment.lines() {
                    let _ = writeln!(out, "/// {}", line);
                }
            }
            let _ = writeln!(out, "model {} {{", names.model(idx));

            let mut rows: Vec<(Option<&str>, String, String, String)> = table
                .columns
                .iter()
                .map(|column| {
                    let (field_type, attrs) = prisma_field(column, table, &names.field(idx, &column.name));
                    (column.comment.as_deref(), names.field(idx, &column.name), field_type, attrs)
                })
                .collect();
            for (name, field_type, attrs) in relation_fields.remove(&idx).unwrap_or_default() {
                rows.push((None, name, field_type, attrs));
            }

            let name_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0);
            let type_width = rows.iter().map(|r| r.2.len()).max().unwrap_or(0);
            for (comment, name, field_type, attrs) in &rows {
                if let Some(comment) = comment {
                    for line in comment.lines() {
                        let _ = writeln!(out, "  /// {}", line);
                    }
                }
                let row = format!(
                    "  {:name_width$} {:type_width$} {}",
                    name,
                    field_type,
                    attrs,
                    name_width = name_width,
                    type_width = type_width
                );
                let _ = writeln!(out, "{}", row.trim_end());
            }

            let block = prisma_block_attributes(table, |column| names.field(idx, column));
            if !block.is_empty() {
                out.push('\n');
                for line in block {
                    let _ = writeln!(out, "  {}", line);
                }
            }
            if names.model(idx) != table.name {
                let _ = writeln!(out, "  @@map(\"{}\")", table.name);
            }
            out.push_str("}\n");
        }

        tracing::debug!(tables = model.tables.len(), "Exported Prisma schema");
        out
    }

    // ========================================================================
    // JSON
    // ========================================================================

    pub fn export_json(model: &SchemaModel, options: &ExportOptions) -> Result<String, serde_json::Error> {
        if options.pretty_print {
            serde_json::to_string_pretty(model)
        } else {
            serde_json::to_string(model)
        }
    }
}

fn quote(name: &str, dialect: SqlDialect) -> String {
    if is_plain_identifier(name) {
        return name.to_string();
    }
    match dialect {
        SqlDialect::MySQL => format!("`{}`", name.replace('`', "``")),
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

/// Expression index entries are written verbatim
fn index_column(column: &str, dialect: SqlDialect) -> String {
    if column.contains('(') {
        column.to_string()
    } else {
        quote(column, dialect)
    }
}

fn sql_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Defaults imported from Prisma use double-quoted string literals
fn sql_default(raw: &str) -> String {
    match raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if raw.len() >= 2 => sql_string(inner),
        _ => raw.to_string(),
    }
}

/// Native spelling of a canonical type. MySQL has no UUID type, so UUID is written as
/// `CHAR(36)` and reads back as `CHAR(36)`; that step is lossy.
fn sql_type(data_type: &DataType, dialect: SqlDialect) -> String {
    match (dialect, data_type) {
        (SqlDialect::PostgreSQL, DataType::Binary) => "BYTEA".to_string(),
        (SqlDialect::MySQL, DataType::Jsonb) => "JSON".to_string(),
        (SqlDialect::MySQL, DataType::Uuid) => "CHAR(36)".to_string(),
        _ => data_type.to_string(),
    }
}

fn column_definition(column: &Column, inline_pk: bool, dialect: SqlDialect) -> String {
    let name = quote(&column.name, dialect);
    let pk = inline_pk && column.primary_key;

    let mut def = if column.auto_increment && dialect == SqlDialect::SQLite && pk && column.data_type.is_integer() {
        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name)
    } else {
        let serial = match (&column.data_type, column.auto_increment, dialect) {
            (DataType::Integer, true, SqlDialect::Generic | SqlDialect::PostgreSQL) => Some("SERIAL"),
            (DataType::BigInt, true, SqlDialect::Generic | SqlDialect::PostgreSQL) => Some("BIGSERIAL"),
            (DataType::SmallInt, true, SqlDialect::Generic | SqlDialect::PostgreSQL) => Some("SMALLSERIAL"),
            _ => None,
        };
        let mut def = format!(
            "{} {}",
            name,
            serial.map_or_else(|| sql_type(&column.data_type, dialect), str::to_string)
        );
        if pk {
            def.push_str(" PRIMARY KEY");
        } else if !column.nullable {
            def.push_str(" NOT NULL");
        }
        if column.auto_increment && dialect == SqlDialect::MySQL {
            def.push_str(" AUTO_INCREMENT");
        }
        def
    };

    if column.unique && !pk {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default_value {
        let _ = write!(def, " DEFAULT {}", sql_default(default));
    }
    if let Some(reference) = &column.reference {
        let _ = write!(
            def,
            " REFERENCES {}({})",
            quote(&reference.target_table, dialect),
            quote(&reference.target_column, dialect)
        );
        if let Some(action) = reference.on_delete {
            let _ = write!(def, " ON DELETE {}", action);
        }
        if let Some(action) = reference.on_update {
            let _ = write!(def, " ON UPDATE {}", action);
        }
    }
    if dialect == SqlDialect::MySQL
        && let Some(comment) = &column.comment
    {
        let _ = write!(def, " COMMENT {}", sql_string(comment));
    }
    def
}

/// Valid Prisma identifiers for every table and column
struct PrismaNames {
    models: Vec<String>,
    fields: Vec<HashMap<String, String>>,
}

fn prisma_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !ident.starts_with(|c: char| c.is_ascii_alphabetic()) {
        ident.insert(0, 'x');
    }
    ident
}

impl PrismaNames {
    fn new(model: &SchemaModel) -> Self {
        Self {
            models: model.tables.iter().map(|t| prisma_identifier(&t.name)).collect(),
            fields: model
                .tables
                .iter()
                .map(|t| {
                    t.columns
                        .iter()
                        .map(|c| (c.name.to_lowercase(), prisma_identifier(&c.name)))
                        .collect()
                })
                .collect(),
        }
    }

    fn model(&self, idx: usize) -> &str {
        &self.models[idx]
    }

    /// Lowercase-first model name, used as the prefix of back-relation fields
    fn field_base(&self, idx: usize) -> String {
        let model = self.model(idx);
        let mut chars = model.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn field(&self, idx: usize, column: &str) -> String {
        self.fields[idx]
            .get(&column.to_lowercase())
            .cloned()
            .unwrap_or_else(|| prisma_identifier(column))
    }
}

/// `base`, or `base` with a numeric suffix if the model already has that field
fn unique_name(taken: &mut HashSet<String>, base: String) -> String {
    let mut name = base.clone();
    let mut n = 2;
    while taken.contains(&name) {
        name = format!("{}{}", base, n);
        n += 1;
    }
    taken.insert(name.clone());
    name
}

fn prisma_action(action: ReferentialAction) -> &'static str {
    match action {
        ReferentialAction::Cascade => "Cascade",
        ReferentialAction::SetNull => "SetNull",
        ReferentialAction::SetDefault => "SetDefault",
        ReferentialAction::Restrict => "Restrict",
        ReferentialAction::NoAction => "NoAction",
    }
}

/// Field type (with `?`) and attribute list for a scalar column
fn prisma_field(column: &Column, table: &Table, field: &str) -> (String, String) {
    let (scalar, native) = match &column.data_type {
        DataType::Integer => ("Int", None),
        DataType::BigInt => ("BigInt", None),
        DataType::SmallInt => ("Int", Some("@db.SmallInt".to_string())),
        DataType::Varchar { length: 255 } => ("String", None),
        DataType::Varchar { length } => ("String", Some(format!("@db.VarChar({})", length))),
        DataType::Char { length } => ("String", Some(format!("@db.Char({})", length))),
        DataType::Text => ("String", Some("@db.Text".to_string())),
        DataType::Boolean => ("Boolean", None),
        DataType::Date => ("DateTime", Some("@db.Date".to_string())),
        DataType::Time => ("DateTime", Some("@db.Time".to_string())),
        DataType::Timestamp => ("DateTime", None),
        DataType::Decimal {
            precision: 65,
            scale: 30,
        } => ("Decimal", None),
        DataType::Decimal { precision, scale } => {
            ("Decimal", Some(format!("@db.Decimal({}, {})", precision, scale)))
        }
        DataType::Float => ("Float", None),
        DataType::Double => ("Float", Some("@db.DoublePrecision".to_string())),
        DataType::Json => ("Json", Some("@db.Json".to_string())),
        DataType::Jsonb => ("Json", None),
        DataType::Uuid => ("String", Some("@db.Uuid".to_string())),
        DataType::Binary => ("Bytes", None),
    };

    let field_type = format!("{}{}", scalar, if column.nullable { "?" } else { "" });
    let mut attrs = Vec::new();
    if column.primary_key && table.primary_key_columns().len() == 1 {
        attrs.push("@id".to_string());
    }
    if column.auto_increment {
        attrs.push("@default(autoincrement())".to_string());
    } else if let Some(default) = &column.default_value {
        attrs.push(format!("@default({})", prisma_default(default)));
    }
    if column.unique {
        attrs.push("@unique".to_string());
    }
    if field != column.name {
        attrs.push(format!("@map(\"{}\")", column.name));
    }
    attrs.extend(native);
    (field_type, attrs.join(" "))
}

/// SQL `'text'` literals become Prisma `"text"`
fn prisma_default(raw: &str) -> String {
    if raw.eq_ignore_ascii_case("CURRENT_TIMESTAMP") || raw.eq_ignore_ascii_case("now()") {
        return "now()".to_string();
    }
    match raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(inner) if raw.len() >= 2 => format!("\"{}\"", inner.replace("''", "'").replace('"', "\\\"")),
        _ => raw.to_string(),
    }
}

fn prisma_block_attributes(table: &Table, field: impl Fn(&str) -> String) -> Vec<String> {
    let list = |columns: &[String]| columns.iter().map(|c| field(c)).collect::<Vec<_>>().join(", ");
    let mut lines = Vec::new();

    let primary_keys: Vec<String> = table.primary_key_columns().iter().map(|c| c.name.clone()).collect();
    if primary_keys.len() > 1 {
        lines.push(format!("@@id([{}])", list(&primary_keys)));
    }
    for index in &table.indexes {
        if index.columns.iter().any(|c| c.contains('(')) {
            continue;
        }
        if index.unique {
            lines.push(format!("@@unique([{}], map: \"{}\")", list(&index.columns), index.name));
        } else if index.index_type == IndexType::Btree {
            lines.push(format!("@@index([{}], map: \"{}\")", list(&index.columns), index.name));
        } else {
            let index_type = match index.index_type {
                IndexType::Hash => "Hash",
                IndexType::Gin => "Gin",
                IndexType::Gist => "Gist",
                IndexType::Brin => "Brin",
                IndexType::Btree => "BTree",
            };
            lines.push(format!(
                "@@index([{}], map: \"{}\", type: {})",
                list(&index.columns),
                index.name,
                index_type
            ));
        }
    }
    lines
}
