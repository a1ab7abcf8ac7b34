//! Prisma schema importer
//!
//! Reads `model` blocks from a Prisma schema and builds the same [`SchemaModel`] the SQL
//! importer produces. `datasource`, `generator` and `type` blocks are skipped, `enum`
//! blocks only contribute type names.
//!
//! The Prisma grammar is line-oriented: every field and block attribute sits on its own
//! line, so the parser works line by line and scans attributes with a small cursor.

use crate::core::data_type::DataType;
use crate::core::error::{ParseError, ParseWarning};
use crate::core::format::{ParseOptions, ParseOutcome};
use crate::core::schema::{
    Column, ForeignKeyReference, Index, IndexType, ReferentialAction, SchemaModel, Table,
};
use std::collections::{HashMap, HashSet};

/// Length of a `String` without a native type
const PRISMA_STRING_LENGTH: u32 = 255;
/// Precision and scale Prisma uses for `Decimal` without a native type
const PRISMA_DECIMAL_PRECISION: u32 = 65;
const PRISMA_DECIMAL_SCALE: u32 = 30;

pub struct PrismaParser {
    max_input_len: usize,
    schema_name: String,
}

impl Default for PrismaParser {
    fn default() -> Self {
        Self::with_options(&ParseOptions::default())
    }
}

impl PrismaParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: &ParseOptions) -> Self {
        Self {
            max_input_len: options.max_input_len,
            schema_name: options.schema_name.clone(),
        }
    }

    pub fn parse(&self, source: &str) -> Result<ParseOutcome, ParseError> {
        let actual = source.chars().count();
        if actual > self.max_input_len {
            return Err(ParseError::InputTooLarge {
                max: self.max_input_len,
                actual,
            });
        }

        let span = tracing::debug_span!("parse_prisma", input_len = actual);
        let _enter = span.enter();

        let blocks = split_blocks(source)?;
        let models: Vec<&Block<'_>> = blocks.iter().filter(|b| b.kind == "model").collect();
        if models.is_empty() {
            return Err(ParseError::EmptySchema {
                expected: "model blocks",
            });
        }

        let model_names: HashSet<&str> = models.iter().map(|b| b.name).collect();
        let enum_names: HashSet<&str> = blocks
            .iter()
            .filter(|b| b.kind == "enum")
            .map(|b| b.name)
            .collect();
        for block in blocks.iter().filter(|b| !matches!(b.kind, "model" | "enum")) {
            tracing::debug!(kind = block.kind, name = block.name, "Skipping block");
        }

        let mut warnings = Vec::new();
        let mut drafts = Vec::with_capacity(models.len());
        for block in models {
            drafts.push(ModelDraft::build(block, &model_names, &enum_names, &mut warnings)?);
        }

        resolve_relations(&mut drafts)?;

        let mut model = SchemaModel::new(self.schema_name.clone());
        for draft in drafts {
            let name = draft.table.name.clone();
            if model.add_table(draft.table).is_err() {
                tracing::warn!(table = %name, "Duplicate model skipped");
                warnings.push(ParseWarning::DuplicateTable { name });
            }
        }

        tracing::info!(
            tables = model.tables.len(),
            warnings = warnings.len(),
            "Parsed Prisma schema"
        );
        Ok(ParseOutcome { model, warnings })
    }
}

/// Parse with default options
pub fn parse_prisma(source: &str) -> Result<ParseOutcome, ParseError> {
    PrismaParser::default().parse(source)
}

// ============================================================================
// Blocks and lines
// ============================================================================

#[derive(Debug)]
enum Line<'a> {
    Doc(&'a str),
    /// Comment-free code plus the original trimmed line for error fragments
    Code { code: &'a str, source: &'a str },
}

#[derive(Debug)]
struct Block<'a> {
    kind: &'a str,
    name: &'a str,
    doc: Vec<&'a str>,
    lines: Vec<Line<'a>>,
}

fn split_blocks(source: &str) -> Result<Vec<Block<'_>>, ParseError> {
    let mut blocks = Vec::new();
    let mut pending_doc = Vec::new();
    let mut current: Option<(Block<'_>, &str)> = None;

    for raw in source.lines() {
        let trimmed = raw.trim();
        if let Some(doc) = trimmed.strip_prefix("///") {
            match current.as_mut() {
                Some((block, _)) => block.lines.push(Line::Doc(doc.trim())),
                None => pending_doc.push(doc.trim()),
            }
            continue;
        }

        let code = strip_line_comment(trimmed).trim();
        if code.is_empty() {
            continue;
        }

        if code == "}" {
            match current.take() {
                Some((block, _)) => blocks.push(block),
                None => return Err(ParseError::syntax("unmatched `}`", trimmed)),
            }
            continue;
        }

        match current.as_mut() {
            Some((block, _)) => block.lines.push(Line::Code {
                code,
                source: trimmed,
            }),
            None => {
                let header = code.strip_suffix('{').ok_or_else(|| {
                    ParseError::syntax("expected a block such as `model Name {`", trimmed)
                })?;
                let mut parts = header.split_whitespace();
                let (Some(kind), Some(name), None) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(ParseError::syntax("malformed block header", trimmed));
                };
                let block = Block {
                    kind,
                    name,
                    doc: std::mem::take(&mut pending_doc),
                    lines: Vec::new(),
                };
                current = Some((block, trimmed));
            }
        }
    }

    if let Some((block, header)) = current {
        return Err(ParseError::syntax(
            format!("unterminated {} block '{}'", block.kind, block.name),
            header,
        ));
    }
    Ok(blocks)
}

/// Cut a `//` comment, ignoring `//` inside string literals
pub(crate) fn strip_line_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let mut prev = '\0';
    for (i, ch) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else if ch == '/' && prev == '/' {
            return &line[..i - 1];
        }
        prev = ch;
    }
    line
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Byte index of the `)` closing the `(` at the start of `text`
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split attribute arguments on top-level commas
fn split_args(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;
    for (i, ch) in raw.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '(' | '[' if !in_string => depth += 1,
            ')' | ']' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                parts.push(raw[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = raw[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// `key: value` → `Some(("key", "value"))`
fn named_arg(part: &str) -> Option<(&str, &str)> {
    let (key, value) = part.split_once(':')?;
    let key = key.trim();
    is_identifier(key).then(|| (key, value.trim()))
}

fn unquote(raw: &str) -> String {
    raw.trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw.trim())
        .to_string()
}

/// `[a, b(sort: Desc)]` → `["a", "b"]`
fn field_list(raw: &str) -> Vec<String> {
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(raw);
    split_args(inner)
        .into_iter()
        .map(|item| item.split('(').next().unwrap_or(item).trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
struct Attribute<'a> {
    name: &'a str,
    args: Vec<&'a str>,
}

impl<'a> Attribute<'a> {
    fn named(&self, key: &str) -> Option<&'a str> {
        self.args
            .iter()
            .copied()
            .filter_map(named_arg)
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// First positional argument, or the named one when written as `key: value`
    fn first_or(&self, key: &str) -> Option<&'a str> {
        self.args
            .iter()
            .copied()
            .find(|part| named_arg(part).is_none())
            .or_else(|| self.named(key))
    }

    fn raw_args(&self) -> String {
        self.args.join(", ")
    }

    fn numeric_args(&self) -> Vec<u32> {
        self.args.iter().filter_map(|a| a.parse().ok()).collect()
    }
}

/// Scan `@name(args) @other` (or `@@name(...)` with `prefix = "@@"`)
fn scan_attributes<'a>(text: &'a str, prefix: &str) -> Result<Vec<Attribute<'a>>, String> {
    let mut attributes = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let Some(after) = rest.strip_prefix(prefix).filter(|a| !a.starts_with('@')) else {
            let found = rest.split_whitespace().next().unwrap_or(rest);
            return Err(format!("unexpected `{}`, expected an attribute", found));
        };
        let name_len = after
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(after.len());
        if name_len == 0 {
            return Err("attribute name missing after `@`".to_string());
        }
        let name = &after[..name_len];
        let mut tail = &after[name_len..];
        let mut args = Vec::new();
        if tail.starts_with('(') {
            let close = matching_paren(tail)
                .ok_or_else(|| format!("unbalanced parentheses in @{}", name))?;
            args = split_args(&tail[1..close]);
            tail = &tail[close + 1..];
        }
        attributes.push(Attribute { name, args });
        rest = tail.trim_start();
    }
    Ok(attributes)
}

/// Split `name Type attrs` into its three parts
fn split_field(code: &str) -> Result<(&str, &str, &str), String> {
    let (name, rest) = code
        .split_once(char::is_whitespace)
        .ok_or_else(|| "expected `name Type` field declaration".to_string())?;
    if !is_identifier(name) {
        return Err(format!("invalid field name '{}'", name));
    }
    let rest = rest.trim_start();
    let mut end = rest.len();
    for (i, ch) in rest.char_indices() {
        if ch.is_whitespace() || ch == '@' {
            end = i;
            break;
        }
        if ch == '(' {
            let close = matching_paren(&rest[i..])
                .ok_or_else(|| "unbalanced parentheses in field type".to_string())?;
            end = i + close + 1;
            break;
        }
    }
    if end == 0 {
        return Err(format!("field '{}' has no type", name));
    }
    Ok((name, &rest[..end], &rest[end..]))
}

fn parse_action(raw: &str) -> Result<ReferentialAction, String> {
    match raw.trim() {
        "Cascade" => Ok(ReferentialAction::Cascade),
        "SetNull" => Ok(ReferentialAction::SetNull),
        "SetDefault" => Ok(ReferentialAction::SetDefault),
        "Restrict" => Ok(ReferentialAction::Restrict),
        "NoAction" => Ok(ReferentialAction::NoAction),
        other => Err(format!("unknown referential action '{}'", other)),
    }
}

/// Map a Prisma scalar (plus optional `@db.*` native type) to a canonical type
fn map_scalar(scalar: &str, native: Option<&Attribute<'_>>) -> Option<DataType> {
    let native_name = native.map(|a| a.name.trim_start_matches("db."));
    let native_args = native.map(|a| a.numeric_args()).unwrap_or_default();

    let data_type = match scalar {
        // Any length-affecting native type widens to TEXT
        "String" => match native_name {
            None => DataType::varchar(PRISMA_STRING_LENGTH),
            Some("Uuid") => DataType::Uuid,
            Some(_) => DataType::Text,
        },
        "Int" => match native_name {
            Some("SmallInt") => DataType::SmallInt,
            _ => DataType::Integer,
        },
        "BigInt" => DataType::BigInt,
        "Boolean" => DataType::Boolean,
        "DateTime" => match native_name {
            Some("Date") => DataType::Date,
            Some("Time") => DataType::Time,
            _ => DataType::Timestamp,
        },
        "Float" => match native_name {
            Some("DoublePrecision") => DataType::Double,
            _ => DataType::Float,
        },
        "Decimal" => match native_args.as_slice() {
            [precision, scale, ..] => DataType::decimal(*precision, *scale),
            [precision] => DataType::decimal(*precision, 0),
            [] => DataType::decimal(PRISMA_DECIMAL_PRECISION, PRISMA_DECIMAL_SCALE),
        },
        "Json" => match native_name {
            Some("Json") => DataType::Json,
            _ => DataType::Jsonb,
        },
        "Bytes" => DataType::Binary,
        _ => return None,
    };
    Some(data_type)
}

// ============================================================================
// Models
// ============================================================================

#[derive(Debug)]
struct PendingRelation {
    fields: Vec<String>,
    target_model: String,
    references: Vec<String>,
    on_delete: Option<ReferentialAction>,
    on_update: Option<ReferentialAction>,
    fragment: String,
}

#[derive(Debug)]
struct ModelDraft<'a> {
    prisma_name: &'a str,
    table: Table,
    /// Prisma field name → database column name
    field_columns: HashMap<String, String>,
    relations: Vec<PendingRelation>,
}

impl<'a> ModelDraft<'a> {
    fn build(
        block: &Block<'a>,
        models: &HashSet<&str>,
        enums: &HashSet<&str>,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<Self, ParseError> {
        let mut block_attributes = Vec::new();
        let mut table_name = block.name.to_string();
        for line in &block.lines {
            if let Line::Code { code, source } = line
                && code.starts_with("@@")
            {
                let attributes =
                    scan_attributes(code, "@@").map_err(|m| ParseError::syntax(m, *source))?;
                for attribute in attributes {
                    if attribute.name == "map"
                        && let Some(name) = attribute.first_or("name")
                    {
                        table_name = unquote(name);
                    }
                    block_attributes.push((attribute, *source));
                }
            }
        }

        let mut draft = ModelDraft {
            prisma_name: block.name,
            table: Table::new(table_name),
            field_columns: HashMap::new(),
            relations: Vec::new(),
        };
        if !block.doc.is_empty() {
            draft.table.comment = Some(block.doc.join("\n"));
        }

        let mut doc = Vec::new();
        for line in &block.lines {
            match line {
                Line::Doc(text) => doc.push(*text),
                Line::Code { code, .. } if code.starts_with("@@") => doc.clear(),
                Line::Code { code, source } => {
                    let comment = (!doc.is_empty()).then(|| doc.join("\n"));
                    doc.clear();
                    draft
                        .field(code, comment, models, enums, warnings)
                        .map_err(|e| match e {
                            FieldError::Syntax(message) => ParseError::syntax(message, *source),
                            FieldError::Parse(err) => err,
                        })?;
                }
            }
        }

        for (attribute, source) in block_attributes {
            draft
                .block_attribute(&attribute)
                .map_err(|m| ParseError::syntax(m, source))?;
        }

        tracing::debug!(
            model = draft.prisma_name,
            table = %draft.table.name,
            columns = draft.table.columns.len(),
            "Parsed model"
        );
        Ok(draft)
    }

    fn field(
        &mut self,
        code: &str,
        comment: Option<String>,
        models: &HashSet<&str>,
        enums: &HashSet<&str>,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<(), FieldError> {
        let (field_name, type_token, rest) = split_field(code).map_err(FieldError::Syntax)?;
        let attributes = scan_attributes(rest, "@").map_err(FieldError::Syntax)?;

        let (base, optional, list) = if let Some(base) = type_token.strip_suffix('?') {
            (base, true, false)
        } else if let Some(base) = type_token.strip_suffix("[]") {
            (base, false, true)
        } else {
            (type_token, false, false)
        };

        if models.contains(base) {
            if let Some(relation) = attributes.iter().find(|a| a.name == "relation") {
                self.relation(base, relation, code)?;
            }
            return Ok(());
        }

        let column_name = attributes
            .iter()
            .find(|a| a.name == "map")
            .and_then(|a| a.first_or("name"))
            .map(unquote)
            .unwrap_or_else(|| field_name.to_string());

        let native = attributes.iter().find(|a| a.name.starts_with("db."));
        let (data_type, coerced) = match map_scalar(base, native) {
            Some(_) if list => (DataType::Jsonb, true),
            Some(data_type) => (data_type, false),
            None if list => (DataType::Jsonb, true),
            None => (DataType::Text, true),
        };
        if coerced {
            let reason = if enums.contains(base) { "enum" } else { "type" };
            tracing::debug!(field = field_name, kind = reason, found = type_token, "Coercing field type");
            warnings.push(ParseWarning::UnsupportedType {
                table: self.table.name.clone(),
                column: column_name.clone(),
                found: type_token.to_string(),
                coerced_to: data_type.clone(),
            });
        }

        let mut column = Column::new(column_name.clone(), data_type);
        column.nullable = optional;
        column.comment = comment;

        for attribute in &attributes {
            match attribute.name {
                "id" => {
                    column.primary_key = true;
                    column.nullable = false;
                }
                "unique" => column.unique = true,
                "default" => {
                    let raw = attribute.raw_args();
                    if raw.trim() == "autoincrement()" {
                        column.auto_increment = true;
                    } else {
                        column.default_value = Some(raw);
                    }
                }
                "relation" => self.relation(base, attribute, code)?,
                _ => {}
            }
        }

        if self.table.find_column(&column_name).is_some() {
            return Err(FieldError::Parse(ParseError::DuplicateColumn {
                table: self.table.name.clone(),
                column: column_name,
            }));
        }
        self.field_columns.insert(field_name.to_string(), column_name);
        self.table.columns.push(column);
        Ok(())
    }

    fn relation(&mut self, target: &str, attribute: &Attribute<'_>, code: &str) -> Result<(), FieldError> {
        let Some(fields) = attribute.named("fields") else {
            // Back-relation side, the other model owns the foreign key
            return Ok(());
        };
        let fields = field_list(fields);
        let references = attribute.named("references").map(field_list).unwrap_or_default();
        if fields.len() != references.len() {
            return Err(FieldError::Syntax(format!(
                "@relation lists {} fields but {} references",
                fields.len(),
                references.len()
            )));
        }
        let on_delete = attribute
            .named("onDelete")
            .map(parse_action)
            .transpose()
            .map_err(FieldError::Syntax)?;
        let on_update = attribute
            .named("onUpdate")
            .map(parse_action)
            .transpose()
            .map_err(FieldError::Syntax)?;

        self.relations.push(PendingRelation {
            fields,
            target_model: target.to_string(),
            references,
            on_delete,
            on_update,
            fragment: code.to_string(),
        });
        Ok(())
    }

    fn columns_for(&self, fields: &[String]) -> Result<Vec<String>, String> {
        fields
            .iter()
            .map(|field| {
                self.field_columns
                    .get(field)
                    .cloned()
                    .ok_or_else(|| format!("unknown field '{}' in model {}", field, self.prisma_name))
            })
            .collect()
    }

    fn block_attribute(&mut self, attribute: &Attribute<'_>) -> Result<(), String> {
        let fields = || {
            attribute
                .first_or("fields")
                .map(field_list)
                .ok_or_else(|| format!("@@{} requires a field list", attribute.name))
        };
        let index_name = || {
            attribute
                .named("map")
                .or_else(|| attribute.named("name"))
                .map(unquote)
        };

        match attribute.name {
            "id" => {
                for column in self.columns_for(&fields()?)? {
                    if let Some(c) = self.table.find_column_mut(&column) {
                        c.primary_key = true;
                        c.nullable = false;
                    }
                }
            }
            "unique" => {
                let columns = self.columns_for(&fields()?)?;
                if let [single] = columns.as_slice() {
                    if let Some(c) = self.table.find_column_mut(single) {
                        c.unique = true;
                    }
                } else {
                    let name = index_name()
                        .unwrap_or_else(|| format!("uq_{}_{}", self.table.name, columns.join("_")));
                    self.table
                        .add_index(Index::new(name, columns).unique())
                        .map_err(|e| e.to_string())?;
                }
            }
            "index" => {
                let columns = self.columns_for(&fields()?)?;
                let name = index_name()
                    .unwrap_or_else(|| format!("idx_{}_{}", self.table.name, columns.join("_")));
                let index_type = attribute
                    .named("type")
                    .and_then(IndexType::from_method)
                    .unwrap_or_default();
                self.table
                    .add_index(Index::new(name, columns).with_type(index_type))
                    .map_err(|e| e.to_string())?;
            }
            _ => {}
        }
        Ok(())
    }
}

enum FieldError {
    Syntax(String),
    Parse(ParseError),
}

/// Turn `@relation(fields, references)` into column references once every model is known
fn resolve_relations(drafts: &mut [ModelDraft<'_>]) -> Result<(), ParseError> {
    let targets: HashMap<&str, (String, HashMap<String, String>)> = drafts
        .iter()
        .map(|d| (d.prisma_name, (d.table.name.clone(), d.field_columns.clone())))
        .collect();

    for draft in drafts.iter_mut() {
        for relation in std::mem::take(&mut draft.relations) {
            let columns = draft
                .columns_for(&relation.fields)
                .map_err(|m| ParseError::syntax(m, relation.fragment.clone()))?;
            let Some((target_table, target_columns)) = targets.get(relation.target_model.as_str())
            else {
                continue;
            };
            for (column, referenced) in columns.iter().zip(&relation.references) {
                let target_column = target_columns
                    .get(referenced)
                    .cloned()
                    .unwrap_or_else(|| referenced.clone());
                if let Some(c) = draft.table.find_column_mut(column) {
                    c.reference = Some(ForeignKeyReference {
                        target_table: target_table.clone(),
                        target_column,
                        on_delete: relation.on_delete,
                        on_update: relation.on_update,
                    });
                }
            }
        }
    }
    Ok(())
}
