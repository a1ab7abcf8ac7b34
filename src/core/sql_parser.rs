//! SQL DDL importer
//!
//! Turns `CREATE TABLE` / `CREATE INDEX` scripts (PostgreSQL, MySQL and SQLite flavours)
//! into a [`SchemaModel`]. Parsing is all-or-nothing: a script either yields a complete
//! model plus non-fatal warnings, or a [`ParseError`].
//!
//! Pipeline:
//! 1. Comments are stripped (`--`, `/* */`, and `#` for MySQL)
//! 2. The script is tokenized once with the `sqlparser` tokenizer and split on `;`
//! 3. Each statement is parsed into a `sqlparser` AST and mapped onto the model
//! 4. Statements that touch other tables (`CREATE INDEX`, `ALTER TABLE`, `COMMENT ON`)
//!    are applied after every table exists, so statement order never matters
//!
//! The AST normalises spelling, so default expressions and MySQL table/index options
//! are read back from the statement's own tokens.

use crate::core::data_type::{DataType, TypeMatch};
use crate::core::error::{ParseError, ParseWarning};
use crate::core::format::{ParseOptions, ParseOutcome};
use crate::core::schema::{
    Column, ColumnId, ForeignKeyReference, Index, IndexType, ReferentialAction, SchemaModel,
    Table, TableId,
};
use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, CreateIndex, CreateTable,
    DataType as SqlType, Ident, ObjectName, ReferentialAction as SqlAction, Statement,
    TableConstraint,
};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};
use std::collections::HashMap;
use std::ops::Range;

/// Longest fragment quoted back in an error message
const MAX_FRAGMENT_LEN: usize = 120;

/// SQL flavour used for tokenizing and for export
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlDialect {
    #[default]
    Generic,
    MySQL,
    PostgreSQL,
    SQLite,
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::Generic => write!(f, "generic"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generic" | "ansi" => Ok(SqlDialect::Generic),
            "mysql" | "mariadb" => Ok(SqlDialect::MySQL),
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::PostgreSQL),
            "sqlite" => Ok(SqlDialect::SQLite),
            _ => Err(format!("Unknown SQL dialect: {}", s)),
        }
    }
}

// ============================================================================
// Parser entry points
// ============================================================================

/// DDL parser for one dialect
pub struct SqlParser {
    dialect: SqlDialect,
    max_input_len: usize,
    schema_name: String,
}

impl SqlParser {
    pub fn new(dialect: SqlDialect) -> Self {
        Self::with_options(&ParseOptions {
            dialect,
            ..ParseOptions::default()
        })
    }

    pub fn with_options(options: &ParseOptions) -> Self {
        Self {
            dialect: options.dialect,
            max_input_len: options.max_input_len,
            schema_name: options.schema_name.clone(),
        }
    }

    pub fn mysql() -> Self {
        Self::new(SqlDialect::MySQL)
    }

    pub fn postgresql() -> Self {
        Self::new(SqlDialect::PostgreSQL)
    }

    pub fn sqlite() -> Self {
        Self::new(SqlDialect::SQLite)
    }

    fn get_dialect(&self) -> Box<dyn Dialect> {
        match self.dialect {
            SqlDialect::Generic => Box::new(GenericDialect {}),
            SqlDialect::MySQL => Box::new(MySqlDialect {}),
            SqlDialect::PostgreSQL => Box::new(PostgreSqlDialect {}),
            SqlDialect::SQLite => Box::new(SQLiteDialect {}),
        }
    }

    /// Parse a complete DDL script
    pub fn parse(&self, sql: &str) -> Result<ParseOutcome, ParseError> {
        let actual = sql.chars().count();
        if actual > self.max_input_len {
            return Err(ParseError::InputTooLarge {
                max: self.max_input_len,
                actual,
            });
        }

        let span = tracing::debug_span!("parse_sql", dialect = %self.dialect, input_len = actual);
        let _enter = span.enter();

        let stripped = strip_comments(sql, self.dialect);
        let dialect = self.get_dialect();
        let mut builder = DdlBuilder::new(&self.schema_name, parse_position_hints(sql));
        for statement in split_statements(&stripped, dialect.as_ref())? {
            builder.statement(&statement, dialect.as_ref())?;
        }
        let outcome = builder.finish()?;

        tracing::info!(
            tables = outcome.model.tables.len(),
            warnings = outcome.warnings.len(),
            "Parsed SQL schema"
        );
        Ok(outcome)
    }
}

/// Parse with default options (generic dialect, default size limit)
pub fn parse_sql(sql: &str) -> Result<ParseOutcome, ParseError> {
    SqlParser::with_options(&ParseOptions::default()).parse(sql)
}

// ============================================================================
// Preprocessing
// ============================================================================

/// Remove line and block comments, keeping string literals and quoted identifiers intact.
/// Newlines are preserved so tokenizer positions still match source lines.
pub fn strip_comments(sql: &str, dialect: SqlDialect) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            out.push(ch);
            // MySQL strings escape with a backslash: 'it\'s'
            if ch == '\\' && q != '`' && dialect == SqlDialect::MySQL {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                out.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => skip_line(&mut chars, &mut out),
            '#' if dialect == SqlDialect::MySQL => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }
    out
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    for c in chars.by_ref() {
        if c == '\n' {
            out.push('\n');
            break;
        }
    }
}

/// `-- Position: (x, y)` hints written directly above a `CREATE TABLE` line
pub fn parse_position_hints(sql: &str) -> HashMap<String, (f64, f64)> {
    let mut hints = HashMap::new();
    let mut previous: Option<&str> = None;

    for line in sql.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        if let Some(rest) = lower.strip_prefix("create table")
            && let Some(hint) = previous.and_then(parse_position_comment)
        {
            let rest = rest.trim_start();
            let rest = rest.strip_prefix("if not exists").unwrap_or(rest).trim_start();
            let name = rest
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()
                .unwrap_or_default();
            let name = name.rsplit('.').next().unwrap_or(name);
            let name = strip_quotes(name);
            if !name.is_empty() {
                hints.insert(name, hint);
            }
        }
        if !trimmed.is_empty() {
            previous = Some(trimmed);
        }
    }
    hints
}

fn parse_position_comment(line: &str) -> Option<(f64, f64)> {
    let rest = line.strip_prefix("-- Position:")?;
    let start = rest.find('(')?;
    let end = rest.find(')')?;
    let (x, y) = rest.get(start + 1..end)?.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

// ============================================================================
// Source statements
// ============================================================================

/// A token and its byte range in the surrounding text
type SpannedToken = (Token, Range<usize>);

/// Maps tokenizer locations (1-based line and character column) to byte offsets.
/// Lookups must not move backwards.
struct OffsetCursor<'a> {
    text: &'a str,
    offset: usize,
    line: u64,
    column: u64,
}

impl<'a> OffsetCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn seek(&mut self, location: Location) -> usize {
        while (self.line, self.column) < (location.line, location.column) {
            let Some(ch) = self.text[self.offset..].chars().next() else {
                break;
            };
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset
    }
}

/// Tokenize the whole script once and cut it into statements at `;`
fn split_statements<'a>(
    script: &'a str,
    dialect: &dyn Dialect,
) -> Result<Vec<SourceStatement<'a>>, ParseError> {
    let tokens = Tokenizer::new(dialect, script)
        .tokenize_with_location()
        .map_err(|e| {
            let message = e.to_string();
            let fragment = line_of_error(script, &message).unwrap_or_default();
            ParseError::syntax(message, fragment)
        })?;

    let mut cursor = OffsetCursor::new(script);
    let mut statements = Vec::new();
    let mut current = Vec::new();
    for TokenWithSpan { token, span } in tokens {
        match token {
            Token::Whitespace(_) | Token::EOF => {}
            Token::SemiColon => {
                statements.extend(SourceStatement::new(script, std::mem::take(&mut current)));
            }
            token => {
                let start = cursor.seek(span.start);
                let end = cursor.seek(span.end);
                current.push((token, start..end));
            }
        }
    }
    statements.extend(SourceStatement::new(script, current));
    Ok(statements)
}

/// Top-level elements of a statement's first parenthesised group
struct Body {
    /// Token index ranges, separators excluded
    elements: Vec<Range<usize>>,
    /// Index of the first token after the closing parenthesis
    end: usize,
}

/// One statement's text plus its non-whitespace tokens, ranges relative to `text`
struct SourceStatement<'a> {
    text: &'a str,
    tokens: Vec<SpannedToken>,
}

impl<'a> SourceStatement<'a> {
    fn new(script: &'a str, tokens: Vec<SpannedToken>) -> Option<Self> {
        let start = tokens.first()?.1.start;
        let end = tokens.last()?.1.end;
        let tokens = tokens
            .into_iter()
            .map(|(token, range)| (token, range.start - start..range.end - start))
            .collect();
        Some(Self {
            text: &script[start..end],
            tokens,
        })
    }

    fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index).map(|(token, _)| token)
    }

    fn starts_with(&self, keywords: &[&str]) -> bool {
        keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.token(i).is_some_and(|t| is_keyword(t, kw)))
    }

    /// Statements whose failure to parse fails the whole import
    fn is_schema_ddl(&self) -> bool {
        if self.starts_with(&["ALTER", "TABLE"]) {
            return true;
        }
        if !self.starts_with(&["CREATE"]) {
            return false;
        }
        self.tokens
            .iter()
            .skip(1)
            .map(|(token, _)| token)
            .find(|t| !["OR", "REPLACE", "TEMPORARY", "TEMP", "UNIQUE"].iter().any(|kw| is_keyword(t, kw)))
            .is_some_and(|t| is_keyword(t, "TABLE") || is_keyword(t, "INDEX"))
    }

    /// Whitespace-collapsed, truncated statement text
    fn fragment(&self) -> String {
        truncate(&self.text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    fn body(&self) -> Option<Body> {
        let open = self.tokens.iter().position(|(t, _)| *t == Token::LParen)?;
        let mut depth = 0usize;
        let mut start = open + 1;
        let mut elements = Vec::new();
        for (i, (token, _)) in self.tokens.iter().enumerate().skip(open) {
            match token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        elements.push(start..i);
                        return Some(Body { elements, end: i + 1 });
                    }
                }
                Token::Comma if depth == 1 => {
                    elements.push(start..i);
                    start = i + 1;
                }
                _ => {}
            }
        }
        None
    }

    /// Byte range between the separators around an element
    fn element_span(&self, element: &Range<usize>) -> Range<usize> {
        self.tokens[element.start - 1].1.end..self.tokens[element.end].1.start
    }

    /// Body element containing a byte offset
    fn element_at(&self, offset: usize) -> Option<&'a str> {
        let body = self.body()?;
        body.elements
            .iter()
            .map(|element| self.element_span(element))
            .find(|span| span.start <= offset && offset <= span.end)
            .map(|span| self.text[span].trim())
            .filter(|text| !text.is_empty())
    }

    /// Body element declaring `column`
    fn element_named(&self, body: &Body, column: &str) -> Option<&'a str> {
        body.elements
            .iter()
            .find(|element| {
                matches!(self.token(element.start), Some(Token::Word(w)) if w.value.eq_ignore_ascii_case(column))
            })
            .map(|element| self.text[self.element_span(element)].trim())
    }

    /// Source text of each column's `DEFAULT` expression, keyed by lowercased column name
    fn raw_defaults(&self, body: &Body) -> HashMap<String, String> {
        let mut defaults = HashMap::new();
        for element in &body.elements {
            let tokens = &self.tokens[element.clone()];
            let Some((Token::Word(name), _)) = tokens.first() else {
                continue;
            };
            if let Some(range) = default_expr_range(tokens) {
                defaults.insert(name.value.to_lowercase(), self.text[range].to_string());
            }
        }
        defaults
    }

    /// `KEYWORD [=] 'text'` among the options after the body
    fn tail_string(&self, body: &Body, keyword: &str) -> Option<String> {
        let tail = self.tokens.get(body.end..)?;
        let at = tail.iter().position(|(t, _)| is_keyword(t, keyword))?;
        let mut rest = tail[at + 1..].iter().map(|(t, _)| t);
        let mut value = rest.next()?;
        if *value == Token::Eq {
            value = rest.next()?;
        }
        match value {
            Token::SingleQuotedString(s) | Token::DoubleQuotedString(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// `KEYWORD word` among the options after the body
    fn tail_word(&self, body: &Body, keyword: &str) -> Option<String> {
        let tail = self.tokens.get(body.end..)?;
        let at = tail.iter().position(|(t, _)| is_keyword(t, keyword))?;
        match tail.get(at + 1) {
            Some((Token::Word(w), _)) => Some(w.value.clone()),
            _ => None,
        }
    }

    /// Syntax error quoting the body element (or the whole statement) the parser stopped in
    fn syntax_error(&self, error: &ParserError) -> ParseError {
        let message = error.to_string();
        let fragment = error_location(&message)
            .map(|location| OffsetCursor::new(self.text).seek(location))
            .and_then(|offset| self.element_at(offset))
            .map(truncate)
            .unwrap_or_else(|| self.fragment());
        ParseError::syntax(message, fragment)
    }
}

/// `"... at Line: X, Column: Y"` as written by the sqlparser tokenizer and parser
fn error_location(message: &str) -> Option<Location> {
    let number_after = |label: &str| -> Option<u64> {
        let start = message.find(label)? + label.len();
        let digits: String = message[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    };
    Some(Location {
        line: number_after("Line: ")?,
        column: number_after("Column: ")?,
    })
}

/// Source line named by a tokenizer error
fn line_of_error(source: &str, message: &str) -> Option<String> {
    let line = usize::try_from(error_location(message)?.line).ok()?;
    source
        .lines()
        .nth(line.checked_sub(1)?)
        .map(|l| truncate(l.trim()))
}

/// Words that end a `DEFAULT` expression
const COLUMN_CONSTRAINT_STARTS: &[&str] = &[
    "NOT",
    "NULL",
    "PRIMARY",
    "UNIQUE",
    "REFERENCES",
    "CHECK",
    "CONSTRAINT",
    "COLLATE",
    "AUTO_INCREMENT",
    "AUTOINCREMENT",
    "GENERATED",
    "COMMENT",
    "ON",
    "DEFAULT",
    "IDENTITY",
];

/// Parenthesis depth in front of each token
fn nesting_depths(tokens: &[SpannedToken]) -> Vec<usize> {
    let mut depth = 0usize;
    tokens
        .iter()
        .map(|(token, _)| match token {
            Token::LParen | Token::LBracket => {
                depth += 1;
                depth - 1
            }
            Token::RParen | Token::RBracket => {
                depth = depth.saturating_sub(1);
                depth
            }
            _ => depth,
        })
        .collect()
}

/// Byte range of the expression after a column's `DEFAULT` keyword
fn default_expr_range(tokens: &[SpannedToken]) -> Option<Range<usize>> {
    let depths = nesting_depths(tokens);
    let keyword = (1..tokens.len()).find(|&i| {
        let previous = &tokens[i - 1].0;
        depths[i] == 0
            && is_keyword(&tokens[i].0, "DEFAULT")
            // GENERATED BY DEFAULT, ON DELETE SET DEFAULT
            && !is_keyword(previous, "BY")
            && !is_keyword(previous, "SET")
    })?;
    let start = keyword + 1;
    let end = (start + 1..tokens.len())
        .find(|&i| {
            depths[i] == 0
                && COLUMN_CONSTRAINT_STARTS
                    .iter()
                    .any(|kw| is_keyword(&tokens[i].0, kw))
        })
        .unwrap_or(tokens.len());
    (start < end).then(|| tokens[start].1.start..tokens[end - 1].1.end)
}

// ============================================================================
// Token and AST helpers
// ============================================================================

fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
}

fn describe(token: Option<&Token>) -> String {
    match token {
        Some(t) => format!("`{}`", t),
        None => "end of statement".to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_FRAGMENT_LEN {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(MAX_FRAGMENT_LEN).collect();
        cut.push_str("...");
        cut
    }
}

fn strip_quotes(name: &str) -> String {
    name.trim_matches(|c| c == '`' || c == '"' || c == '[' || c == ']')
        .to_string()
}

/// `schema.table` → `table`
fn object_tail(name: &ObjectName) -> String {
    let text = name.to_string();
    strip_quotes(text.rsplit('.').next().unwrap_or(&text))
}

/// Column of a key or index: plain identifiers lose their quotes, expressions stay verbatim
fn key_part(part: &impl std::fmt::Display) -> String {
    let mut text = part.to_string();
    for suffix in [" NULLS FIRST", " NULLS LAST", " ASC", " DESC"] {
        if let Some(stripped) = text.strip_suffix(suffix) {
            text = stripped.to_string();
        }
    }
    if text.contains('(') { text } else { strip_quotes(&text) }
}

fn referential_action(action: &SqlAction) -> ReferentialAction {
    match action {
        SqlAction::Cascade => ReferentialAction::Cascade,
        SqlAction::Restrict => ReferentialAction::Restrict,
        SqlAction::SetNull => ReferentialAction::SetNull,
        SqlAction::SetDefault => ReferentialAction::SetDefault,
        SqlAction::NoAction => ReferentialAction::NoAction,
    }
}

/// Target of a `REFERENCES` clause; empty `columns` means "the target's primary key"
#[derive(Debug, Clone)]
struct RefTarget {
    table: String,
    columns: Vec<String>,
    on_delete: Option<ReferentialAction>,
    on_update: Option<ReferentialAction>,
}

impl RefTarget {
    fn new(
        table: &ObjectName,
        columns: &[Ident],
        on_delete: Option<&SqlAction>,
        on_update: Option<&SqlAction>,
    ) -> Self {
        Self {
            table: object_tail(table),
            columns: columns.iter().map(|c| c.value.clone()).collect(),
            on_delete: on_delete.map(referential_action),
            on_update: on_update.map(referential_action),
        }
    }

    fn reference_to(&self, column: &str) -> ForeignKeyReference {
        ForeignKeyReference {
            target_table: self.table.clone(),
            target_column: column.to_string(),
            on_delete: self.on_delete,
            on_update: self.on_update,
        }
    }
}

// ============================================================================
// Columns and types
// ============================================================================

struct ParsedType {
    written: String,
    resolved: TypeMatch,
    serial: bool,
}

/// Map a sqlparser type onto the canonical set; anything unknown goes through the
/// nearest-type coercion in [`DataType::resolve_sql`]
fn convert_type(data_type: &SqlType) -> ParsedType {
    let written = data_type.to_string();
    match data_type {
        SqlType::Array(_) => ParsedType {
            written,
            resolved: TypeMatch::Coerced(DataType::Jsonb),
            serial: false,
        },
        SqlType::Custom(name, modifiers) => {
            let base = object_tail(name);
            if let Some(serial) = DataType::serial_base(&base) {
                return ParsedType {
                    written,
                    resolved: TypeMatch::Exact(serial),
                    serial: true,
                };
            }
            let args: Vec<u32> = modifiers.iter().filter_map(|m| m.trim().parse().ok()).collect();
            ParsedType {
                resolved: DataType::resolve_sql(&base, &args),
                written,
                serial: false,
            }
        }
        _ => {
            let (name, args) = split_type_name(&written);
            ParsedType {
                resolved: DataType::resolve_sql(&name, &args),
                written,
                serial: false,
            }
        }
    }
}

/// `TIMESTAMP(3) WITHOUT TIME ZONE` → (`TIMESTAMP WITHOUT TIME ZONE`, `[3]`)
fn split_type_name(written: &str) -> (String, Vec<u32>) {
    let mut words = String::new();
    let mut group = String::new();
    let mut args = Vec::new();
    let mut depth = 0usize;
    for ch in written.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    args.extend(group.split(',').filter_map(|a| a.trim().parse::<u32>().ok()));
                    group.clear();
                }
            }
            _ if depth > 0 => group.push(ch),
            _ => words.push(ch),
        }
    }

    let name = words
        .split_whitespace()
        .map(str::to_uppercase)
        .filter(|w| !matches!(w.as_str(), "UNSIGNED" | "SIGNED" | "ZEROFILL"))
        .collect::<Vec<_>>()
        .join(" ");
    (name, args)
}

struct ParsedColumn {
    column: Column,
    written_type: String,
    coerced: bool,
    /// `REFERENCES t` without a column list
    implicit_target: bool,
}

fn convert_column(
    def: &ColumnDef,
    raw_defaults: &HashMap<String, String>,
) -> Result<ParsedColumn, String> {
    let parsed_type = convert_type(&def.data_type);
    let mut column = Column::new(def.name.value.clone(), parsed_type.resolved.data_type().clone());
    if parsed_type.serial {
        column.auto_increment = true;
        column.nullable = false;
    }
    let mut implicit_target = false;

    for option in &def.options {
        match &option.option {
            ColumnOption::Null => column.nullable = true,
            ColumnOption::NotNull => column.nullable = false,
            ColumnOption::Default(expr) => {
                column.default_value = Some(
                    raw_defaults
                        .get(&def.name.value.to_lowercase())
                        .cloned()
                        .unwrap_or_else(|| expr.to_string()),
                );
            }
            ColumnOption::PrimaryKey(_) => {
                column.primary_key = true;
                column.nullable = false;
            }
            ColumnOption::Unique(_) => column.unique = true,
            ColumnOption::ForeignKey(fk) => {
                let target = RefTarget::new(
                    &fk.foreign_table,
                    &fk.referred_columns,
                    fk.on_delete.as_ref(),
                    fk.on_update.as_ref(),
                );
                match target.columns.as_slice() {
                    [] => {
                        implicit_target = true;
                        column.reference = Some(target.reference_to(""));
                    }
                    [single] => column.reference = Some(target.reference_to(single)),
                    _ => return Err("column-level REFERENCES must name a single column".to_string()),
                }
            }
            ColumnOption::Comment(text) => column.comment = Some(text.clone()),
            ColumnOption::DialectSpecific(tokens)
                if tokens
                    .iter()
                    .any(|t| is_keyword(t, "AUTO_INCREMENT") || is_keyword(t, "AUTOINCREMENT")) =>
            {
                column.auto_increment = true;
            }
            // GENERATED ... AS IDENTITY; computed columns carry an expression
            ColumnOption::Generated {
                generation_expr: None,
                ..
            } => column.auto_increment = true,
            _ => {}
        }
    }

    Ok(ParsedColumn {
        column,
        written_type: parsed_type.written,
        coerced: parsed_type.resolved.is_coerced(),
        implicit_target,
    })
}

#[derive(Debug, Clone)]
enum KeyConstraint {
    PrimaryKey(Vec<String>),
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        target: RefTarget,
    },
    Index {
        name: Option<String>,
        columns: Vec<String>,
    },
}

/// Table constraints the model can hold; CHECK and search indexes have no counterpart
fn key_constraint(constraint: &TableConstraint) -> Option<KeyConstraint> {
    match constraint {
        TableConstraint::PrimaryKey(pk) => {
            Some(KeyConstraint::PrimaryKey(pk.columns.iter().map(key_part).collect()))
        }
        TableConstraint::Unique(unique) => Some(KeyConstraint::Unique {
            name: unique
                .name
                .as_ref()
                .or(unique.index_name.as_ref())
                .map(|n| n.value.clone()),
            columns: unique.columns.iter().map(key_part).collect(),
        }),
        TableConstraint::ForeignKey(fk) => Some(KeyConstraint::ForeignKey {
            columns: fk.columns.iter().map(|c| c.value.clone()).collect(),
            target: RefTarget::new(
                &fk.foreign_table,
                &fk.referred_columns,
                fk.on_delete.as_ref(),
                fk.on_update.as_ref(),
            ),
        }),
        TableConstraint::Index(index) => Some(KeyConstraint::Index {
            name: index.name.as_ref().map(|n| n.value.clone()),
            columns: index.columns.iter().map(key_part).collect(),
        }),
        _ => None,
    }
}

// ============================================================================
// Statement handling
// ============================================================================

struct PendingIndex {
    name: Option<String>,
    table: String,
    columns: Vec<String>,
    method: Option<String>,
    unique: bool,
    comment: Option<String>,
    fragment: String,
}

enum CommentTarget {
    Table(Vec<String>),
    Column(Vec<String>),
    Index(Vec<String>),
}

enum Deferred {
    Index(PendingIndex),
    Constraint {
        table: String,
        constraint: KeyConstraint,
        fragment: String,
    },
    Comment {
        target: CommentTarget,
        text: Option<String>,
        fragment: String,
    },
}

/// `COMMENT ON {TABLE|COLUMN|INDEX} name IS 'text' | NULL`; other objects yield `None`.
/// Read from tokens since sqlparser has no comment target for indexes.
fn parse_comment_on(tokens: &[&Token]) -> Result<Option<(CommentTarget, Option<String>)>, String> {
    let Some(kind) = tokens.get(2) else {
        return Ok(None);
    };
    let target: fn(Vec<String>) -> CommentTarget = if is_keyword(kind, "TABLE") {
        CommentTarget::Table
    } else if is_keyword(kind, "COLUMN") {
        CommentTarget::Column
    } else if is_keyword(kind, "INDEX") {
        CommentTarget::Index
    } else {
        return Ok(None);
    };

    let mut parts = Vec::new();
    let mut i = 3;
    loop {
        match tokens.get(i) {
            Some(Token::Word(w)) => parts.push(w.value.clone()),
            Some(Token::DoubleQuotedString(s)) => parts.push(s.clone()),
            other => {
                return Err(format!(
                    "expected identifier, found {}",
                    describe(other.copied())
                ));
            }
        }
        i += 1;
        if matches!(tokens.get(i), Some(Token::Period)) {
            i += 1;
        } else {
            break;
        }
    }

    if !tokens.get(i).is_some_and(|t| is_keyword(t, "IS")) {
        return Err(format!("expected IS, found {}", describe(tokens.get(i).copied())));
    }
    let text = match tokens.get(i + 1) {
        Some(t) if is_keyword(t, "NULL") => None,
        Some(Token::SingleQuotedString(s)) => Some(s.clone()),
        other => {
            return Err(format!(
                "expected string literal, found {}",
                describe(other.copied())
            ));
        }
    };
    if let Some(extra) = tokens.get(i + 2) {
        return Err(format!("unexpected `{}` after comment text", extra));
    }
    Ok(Some((target(parts), text)))
}

struct DdlBuilder {
    model: SchemaModel,
    warnings: Vec<ParseWarning>,
    deferred: Vec<Deferred>,
    implicit_targets: Vec<(TableId, ColumnId)>,
    position_hints: HashMap<String, (f64, f64)>,
}

impl DdlBuilder {
    fn new(schema_name: &str, position_hints: HashMap<String, (f64, f64)>) -> Self {
        Self {
            model: SchemaModel::new(schema_name),
            warnings: Vec::new(),
            deferred: Vec::new(),
            implicit_targets: Vec::new(),
            position_hints,
        }
    }

    fn ignore(&mut self, source: &SourceStatement<'_>) {
        let fragment = source.fragment();
        tracing::debug!(%fragment, "Ignoring statement");
        self.warnings.push(ParseWarning::IgnoredStatement { fragment });
    }

    fn statement(&mut self, source: &SourceStatement<'_>, dialect: &dyn Dialect) -> Result<(), ParseError> {
        if source.starts_with(&["COMMENT", "ON"]) {
            return self.comment_on(source);
        }

        let statements = match Parser::parse_sql(dialect, source.text) {
            Ok(statements) => statements,
            Err(e) if source.is_schema_ddl() => return Err(source.syntax_error(&e)),
            Err(e) => {
                tracing::debug!(error = %e, "Statement not understood");
                self.ignore(source);
                return Ok(());
            }
        };

        for statement in &statements {
            match statement {
                Statement::CreateTable(create_table) => self.create_table(create_table, source)?,
                Statement::CreateIndex(create_index) => self.create_index(create_index, source),
                Statement::AlterTable(alter_table) => {
                    self.alter_table(&alter_table.name, &alter_table.operations, source)
                }
                _ => self.ignore(source),
            }
        }
        Ok(())
    }

    fn comment_on(&mut self, source: &SourceStatement<'_>) -> Result<(), ParseError> {
        let tokens: Vec<&Token> = source.tokens.iter().map(|(t, _)| t).collect();
        match parse_comment_on(&tokens) {
            Ok(Some((target, text))) => {
                self.deferred.push(Deferred::Comment {
                    target,
                    text,
                    fragment: source.fragment(),
                });
                Ok(())
            }
            Ok(None) => {
                self.ignore(source);
                Ok(())
            }
            Err(message) => Err(ParseError::syntax(message, source.fragment())),
        }
    }

    fn create_table(&mut self, create_table: &CreateTable, source: &SourceStatement<'_>) -> Result<(), ParseError> {
        let name = object_tail(&create_table.name);
        // CREATE TABLE ... AS SELECT / LIKE copies a shape the script never spells out
        let body = match source.body() {
            Some(body) if create_table.query.is_none() => body,
            _ => {
                self.ignore(source);
                return Ok(());
            }
        };
        let raw_defaults = source.raw_defaults(&body);

        let mut table = Table::new(name.clone());
        let mut implicit = Vec::new();
        let mut type_warnings = Vec::new();

        for def in &create_table.columns {
            let parsed = convert_column(def, &raw_defaults).map_err(|message| {
                let fragment = source.element_named(&body, &def.name.value).map(truncate);
                ParseError::syntax(message, fragment.unwrap_or_else(|| source.fragment()))
            })?;
            if table.find_column(&parsed.column.name).is_some() {
                return Err(ParseError::DuplicateColumn {
                    table: name.clone(),
                    column: parsed.column.name,
                });
            }
            if parsed.coerced {
                type_warnings.push(ParseWarning::UnsupportedType {
                    table: name.clone(),
                    column: parsed.column.name.clone(),
                    found: parsed.written_type,
                    coerced_to: parsed.column.data_type.clone(),
                });
            }
            if parsed.implicit_target {
                implicit.push(parsed.column.id);
            }
            table.columns.push(parsed.column);
        }

        for constraint in &create_table.constraints {
            let Some(key) = key_constraint(constraint) else {
                continue;
            };
            apply_constraint(&mut table, key, &mut implicit)
                .map_err(|message| ParseError::syntax(message, truncate(&constraint.to_string())))?;
        }

        table.comment = source.tail_string(&body, "COMMENT");
        if let Some(&position) = self.position_hints.get(&name.to_lowercase()) {
            table.position = Some(position);
        }

        let table_id = table.id;
        let column_count = table.columns.len();
        match self.model.add_table(table) {
            Ok(_) => {
                tracing::debug!(table = %name, columns = column_count, "Parsed table");
                self.warnings.extend(type_warnings);
                self.implicit_targets
                    .extend(implicit.into_iter().map(|column| (table_id, column)));
            }
            Err(_) => {
                tracing::warn!(table = %name, "Duplicate table definition skipped");
                self.warnings.push(ParseWarning::DuplicateTable { name });
            }
        }
        Ok(())
    }

    fn create_index(&mut self, create_index: &CreateIndex, source: &SourceStatement<'_>) {
        let body = source.body();
        // MySQL writes `USING` and `COMMENT` after the column list
        let method = create_index
            .using
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| body.as_ref().and_then(|b| source.tail_word(b, "USING")));
        let comment = body.as_ref().and_then(|b| source.tail_string(b, "COMMENT"));

        self.deferred.push(Deferred::Index(PendingIndex {
            name: create_index.name.as_ref().map(object_tail),
            table: object_tail(&create_index.table_name),
            columns: create_index.columns.iter().map(key_part).collect(),
            method,
            unique: create_index.unique,
            comment,
            fragment: source.fragment(),
        }));
    }

    fn alter_table(
        &mut self,
        table: &ObjectName,
        operations: &[AlterTableOperation],
        source: &SourceStatement<'_>,
    ) {
        let mut constraints = Vec::new();
        for operation in operations {
            match operation {
                AlterTableOperation::AddConstraint { constraint, .. } => {
                    constraints.extend(key_constraint(constraint));
                }
                _ => {
                    self.ignore(source);
                    return;
                }
            }
        }

        let table = object_tail(table);
        for constraint in constraints {
            self.deferred.push(Deferred::Constraint {
                table: table.clone(),
                constraint,
                fragment: source.fragment(),
            });
        }
    }

    fn finish(mut self) -> Result<ParseOutcome, ParseError> {
        if self.model.tables.is_empty() {
            return Err(ParseError::EmptySchema {
                expected: "CREATE TABLE statements",
            });
        }

        for deferred in std::mem::take(&mut self.deferred) {
            match deferred {
                Deferred::Index(index) => self.apply_index(index),
                Deferred::Constraint {
                    table,
                    constraint,
                    fragment,
                } => {
                    let Some(target) = self.model.table_by_name_mut(&table) else {
                        self.warnings.push(ParseWarning::UnknownTable {
                            context: "ALTER TABLE".to_string(),
                            table,
                        });
                        continue;
                    };
                    let target_id = target.id;
                    let mut implicit = Vec::new();
                    apply_constraint(target, constraint, &mut implicit)
                        .map_err(|m| ParseError::syntax(m, fragment))?;
                    self.implicit_targets
                        .extend(implicit.into_iter().map(|column| (target_id, column)));
                }
                Deferred::Comment {
                    target,
                    text,
                    fragment,
                } => self.apply_comment(target, text, fragment),
            }
        }

        self.resolve_implicit_targets();

        Ok(ParseOutcome {
            model: self.model,
            warnings: self.warnings,
        })
    }

    fn apply_index(&mut self, pending: PendingIndex) {
        let Some(table) = self.model.table_by_name_mut(&pending.table) else {
            self.warnings.push(ParseWarning::UnknownTable {
                context: "CREATE INDEX".to_string(),
                table: pending.table,
            });
            return;
        };

        let name = pending
            .name
            .unwrap_or_else(|| generated_index_name("idx", &table.name, &pending.columns));
        let mut index = Index::new(name.clone(), pending.columns);
        index.unique = pending.unique;
        index.comment = pending.comment;
        if let Some(method) = pending.method {
            match IndexType::from_method(&method) {
                Some(index_type) => index.index_type = index_type,
                None => self.warnings.push(ParseWarning::UnsupportedIndexMethod {
                    index: name.clone(),
                    method,
                }),
            }
        }
        if table.add_index(index).is_err() {
            self.warnings.push(ParseWarning::IgnoredStatement {
                fragment: pending.fragment,
            });
        }
    }

    fn apply_comment(&mut self, target: CommentTarget, text: Option<String>, fragment: String) {
        let applied = match &target {
            CommentTarget::Table(parts) => parts
                .last()
                .and_then(|name| self.model.table_by_name_mut(name))
                .map(|table| table.comment = text),
            CommentTarget::Column(parts) => match parts.as_slice() {
                [.., table, column] => self
                    .model
                    .table_by_name_mut(table)
                    .and_then(|t| t.find_column_mut(column))
                    .map(|c| c.comment = text),
                _ => None,
            },
            CommentTarget::Index(parts) => parts.last().and_then(|name| {
                self.model
                    .tables
                    .iter_mut()
                    .flat_map(|t| t.indexes.iter_mut())
                    .find(|i| i.name.eq_ignore_ascii_case(name))
                    .map(|i| i.comment = text)
            }),
        };
        if applied.is_none() {
            let table = match &target {
                CommentTarget::Column(parts) if parts.len() >= 2 => parts[parts.len() - 2].clone(),
                CommentTarget::Table(parts) | CommentTarget::Index(parts) | CommentTarget::Column(parts) => {
                    parts.last().cloned().unwrap_or_default()
                }
            };
            tracing::debug!(%fragment, "COMMENT ON target not found");
            self.warnings.push(ParseWarning::UnknownTable {
                context: "COMMENT ON".to_string(),
                table,
            });
        }
    }

    /// `REFERENCES t` without columns targets the single primary key of `t`, else `id`
    fn resolve_implicit_targets(&mut self) {
        for (table_id, column_id) in std::mem::take(&mut self.implicit_targets) {
            let target_name = self
                .model
                .table(table_id)
                .and_then(|t| t.column(column_id))
                .and_then(|c| c.reference.as_ref())
                .map(|r| r.target_table.clone());
            let Some(target_name) = target_name else {
                continue;
            };
            let target_column = self
                .model
                .table_by_name(&target_name)
                .map(|t| t.primary_key_columns())
                .and_then(|pks| match pks.as_slice() {
                    [single] => Some(single.name.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| "id".to_string());

            if let Some(reference) = self
                .model
                .table_mut(table_id)
                .and_then(|t| t.column_mut(column_id))
                .and_then(|c| c.reference.as_mut())
            {
                reference.target_column = target_column;
            }
        }
    }
}

fn generated_index_name(prefix: &str, table: &str, columns: &[String]) -> String {
    format!("{}_{}_{}", prefix, table, columns.join("_"))
}

fn apply_constraint(
    table: &mut Table,
    constraint: KeyConstraint,
    implicit: &mut Vec<ColumnId>,
) -> Result<(), String> {
    let table_name = table.name.clone();
    let unknown = |kind: &str, column: &str| {
        format!(
            "{} refers to unknown column '{}' in table '{}'",
            kind, column, table_name
        )
    };

    match constraint {
        KeyConstraint::PrimaryKey(columns) => {
            for name in &columns {
                let column = table
                    .find_column_mut(name)
                    .ok_or_else(|| unknown("PRIMARY KEY", name))?;
                column.primary_key = true;
                column.nullable = false;
            }
        }
        KeyConstraint::Unique { name, columns } => {
            for column in &columns {
                if table.find_column(column).is_none() {
                    return Err(unknown("UNIQUE", column));
                }
            }
            if let [single] = columns.as_slice() {
                if let Some(column) = table.find_column_mut(single) {
                    column.unique = true;
                }
            } else {
                let name = name.unwrap_or_else(|| generated_index_name("uq", &table_name, &columns));
                table
                    .add_index(Index::new(name, columns).unique())
                    .map_err(|e| e.to_string())?;
            }
        }
        KeyConstraint::ForeignKey { columns, target } => {
            if !target.columns.is_empty() && target.columns.len() != columns.len() {
                return Err(format!(
                    "FOREIGN KEY column count mismatch: {} columns reference {} columns",
                    columns.len(),
                    target.columns.len()
                ));
            }
            for (i, name) in columns.iter().enumerate() {
                let column = table
                    .find_column_mut(name)
                    .ok_or_else(|| unknown("FOREIGN KEY", name))?;
                match target.columns.get(i) {
                    Some(target_column) => column.reference = Some(target.reference_to(target_column)),
                    None => {
                        column.reference = Some(target.reference_to(""));
                        implicit.push(column.id);
                    }
                }
            }
        }
        KeyConstraint::Index { name, columns } => {
            for column in &columns {
                if table.find_column(column).is_none() {
                    return Err(unknown("INDEX", column));
                }
            }
            let name = name.unwrap_or_else(|| generated_index_name("idx", &table_name, &columns));
            table
                .add_index(Index::new(name, columns))
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FK_AUTO_INDEX_COMMENT;

    fn parse(sql: &str) -> ParseOutcome {
        parse_sql(sql).unwrap()
    }

    fn column<'a>(model: &'a SchemaModel, table: &str, column: &str) -> &'a Column {
        model
            .table_by_name(table)
            .and_then(|t| t.find_column(column))
            .map(|(_, c)| c)
            .unwrap()
    }

    #[test]
    fn test_two_table_reference() {
        let outcome = parse(
            "CREATE TABLE a(id INTEGER PRIMARY KEY); \
             CREATE TABLE b(id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a(id));",
        );
        let model = outcome.model;
        assert_eq!(model.tables.len(), 2);
        assert_eq!(model.tables[0].name, "a");
        assert_eq!(model.tables[1].name, "b");
        let a_id = column(&model, "b", "a_id");
        let reference = a_id.reference.as_ref().unwrap();
        assert_eq!(reference.target_table, "a");
        assert_eq!(reference.target_column, "id");
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_column_clauses() {
        let model = parse(
            "CREATE TABLE users (
                id SERIAL PRIMARY KEY,
                email VARCHAR(320) NOT NULL UNIQUE,
                status VARCHAR(20) DEFAULT 'active',
                balance DECIMAL(12, 2) DEFAULT 0 NOT NULL,
                created_at TIMESTAMP DEFAULT now(),
                bio TEXT NULL
            );",
        )
        .model;

        let id = column(&model, "users", "id");
        assert!(id.primary_key && id.auto_increment && !id.nullable);
        assert_eq!(id.data_type, DataType::Integer);

        let email = column(&model, "users", "email");
        assert_eq!(email.data_type, DataType::varchar(320));
        assert!(!email.nullable && email.unique);

        let status = column(&model, "users", "status");
        assert_eq!(status.default_value.as_deref(), Some("'active'"));
        assert!(status.nullable);

        let balance = column(&model, "users", "balance");
        assert_eq!(balance.data_type, DataType::decimal(12, 2));
        assert_eq!(balance.default_value.as_deref(), Some("0"));
        assert!(!balance.nullable);

        let created = column(&model, "users", "created_at");
        assert_eq!(created.default_value.as_deref(), Some("now()"));
        assert!(column(&model, "users", "bio").nullable);
    }

    #[test]
    fn test_comments_are_stripped() {
        let model = parse(
            "-- users table\n\
             /* block\n comment */\n\
             CREATE TABLE users ( -- trailing\n id INT, /* inline */ name TEXT );",
        )
        .model;
        assert_eq!(model.tables[0].columns.len(), 2);
    }

    #[test]
    fn test_strip_comments_keeps_strings() {
        let stripped = strip_comments("SELECT '--not' /* x */ -- y\n", SqlDialect::Generic);
        assert!(stripped.contains("'--not'"));
        assert!(!stripped.contains('x'));
        assert!(!stripped.contains('y'));
        let mysql = strip_comments("a # hash\nb", SqlDialect::MySQL);
        assert_eq!(mysql, "a \nb");
    }

    #[test]
    fn test_forward_reference_is_accepted() {
        let model = parse(
            "CREATE TABLE orders (id INT PRIMARY KEY, customer_id INT REFERENCES customers(id));
             CREATE TABLE customers (id INT PRIMARY KEY);",
        )
        .model;
        assert_eq!(model.tables[0].name, "orders");
        assert_eq!(
            column(&model, "orders", "customer_id")
                .reference
                .as_ref()
                .unwrap()
                .target_table,
            "customers"
        );
    }

    #[test]
    fn test_table_level_constraints() {
        let model = parse(
            "CREATE TABLE order_items (
                order_id INT NOT NULL,
                product_id INT NOT NULL,
                sku VARCHAR(40),
                CONSTRAINT pk_items PRIMARY KEY (order_id, product_id),
                CONSTRAINT fk_order FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE ON UPDATE NO ACTION,
                UNIQUE (sku),
                UNIQUE (order_id, sku),
                CHECK (order_id > 0)
            );",
        )
        .model;

        let table = model.table_by_name("order_items").unwrap();
        assert_eq!(table.primary_key_columns().len(), 2);
        let reference = column(&model, "order_items", "order_id")
            .reference
            .clone()
            .unwrap();
        assert_eq!(reference.on_delete, Some(ReferentialAction::Cascade));
        assert_eq!(reference.on_update, Some(ReferentialAction::NoAction));
        assert!(column(&model, "order_items", "sku").unique);
        assert_eq!(table.indexes.len(), 1);
        assert!(table.indexes[0].unique);
        assert_eq!(table.indexes[0].columns, vec!["order_id", "sku"]);
    }

    #[test]
    fn test_create_index_before_table() {
        let model = parse(
            "CREATE UNIQUE INDEX idx_users_email ON users (email);
             CREATE INDEX idx_users_name ON users USING hash (name);
             CREATE INDEX ON users (lower(name));
             CREATE TABLE users (id INT, email TEXT, name TEXT);",
        )
        .model;
        let users = model.table_by_name("users").unwrap();
        assert_eq!(users.indexes.len(), 3);
        assert!(users.indexes[0].unique);
        assert_eq!(users.indexes[1].index_type, IndexType::Hash);
        assert_eq!(users.indexes[2].columns, vec!["lower(name)"]);
    }

    #[test]
    fn test_mysql_flavour() {
        let outcome = SqlParser::mysql()
            .parse(
                "CREATE TABLE `posts` (
                    `id` INT UNSIGNED NOT NULL AUTO_INCREMENT,
                    `title` VARCHAR(200) NOT NULL COMMENT 'Headline',
                    `published` TINYINT(1) DEFAULT 0,
                    `updated_at` DATETIME DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                    PRIMARY KEY (`id`),
                    KEY `idx_title` (`title`)
                ) ENGINE=InnoDB COMMENT='Blog posts'; # trailing",
            )
            .unwrap();
        let model = outcome.model;
        let posts = model.table_by_name("posts").unwrap();
        assert_eq!(posts.comment.as_deref(), Some("Blog posts"));
        let id = column(&model, "posts", "id");
        assert!(id.auto_increment && id.primary_key);
        assert_eq!(
            column(&model, "posts", "title").comment.as_deref(),
            Some("Headline")
        );
        assert_eq!(column(&model, "posts", "published").data_type, DataType::Boolean);
        assert_eq!(
            column(&model, "posts", "updated_at").default_value.as_deref(),
            Some("CURRENT_TIMESTAMP")
        );
        assert_eq!(posts.indexes[0].name, "idx_title");
        // TINYINT(1) and DATETIME are both coerced
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[test]
    fn test_unknown_type_is_coerced_with_warning() {
        let outcome = parse("CREATE TABLE places (id INT, area GEOMETRY, tags TEXT[]);");
        assert_eq!(column(&outcome.model, "places", "area").data_type, DataType::Text);
        assert_eq!(column(&outcome.model, "places", "tags").data_type, DataType::Jsonb);
        assert!(outcome.warnings.iter().any(|w| matches!(
            w,
            ParseWarning::UnsupportedType { found, .. } if found == "GEOMETRY"
        )));
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[test]
    fn test_empty_schema() {
        let err = parse_sql("-- nothing here\nSELECT 1;").unwrap_err();
        assert!(matches!(err, ParseError::EmptySchema { .. }));
        assert!(matches!(
            parse_sql("").unwrap_err(),
            ParseError::EmptySchema { .. }
        ));
    }

    #[test]
    fn test_malformed_column_names_fragment() {
        let err = parse_sql("CREATE TABLE t (id INT, name VARCHAR(20) BANANAS);").unwrap_err();
        match err {
            ParseError::Syntax { fragment, message } => {
                assert_eq!(fragment, "name VARCHAR(20) BANANAS");
                assert!(message.contains("BANANAS"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = parse_sql("CREATE TABLE t (id INT NOT);").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { ref fragment, .. } if fragment == "id INT NOT"));
    }

    #[test]
    fn test_error_fragment_keeps_source_spelling() {
        let err = parse_sql(
            "CREATE TABLE ok (id INT);\n\
             CREATE TABLE products (\n\
                 id INT,\n\
                 price DECIMAL(10, 2) WRONG,\n\
                 name TEXT\n\
             );",
        )
        .unwrap_err();
        match err {
            ParseError::Syntax { fragment, .. } => assert_eq!(fragment, "price DECIMAL(10, 2) WRONG"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparsed_statements_are_ignored() {
        let outcome = parse("FROBNICATE the   database;\nCREATE TABLE t (id INT);");
        assert_eq!(outcome.model.tables.len(), 1);
        assert_eq!(
            outcome.warnings,
            vec![ParseWarning::IgnoredStatement {
                fragment: "FROBNICATE the database".into()
            }]
        );
    }

    #[test]
    fn test_defaults_keep_source_text() {
        let model = parse(
            "CREATE TABLE counters (
                id INT,
                delta INT DEFAULT -1,
                total INT DEFAULT (1+2) NOT NULL,
                seq BIGINT DEFAULT nextval('s'::regclass)
            );",
        )
        .model;
        assert_eq!(column(&model, "counters", "delta").default_value.as_deref(), Some("-1"));
        let total = column(&model, "counters", "total");
        assert_eq!(total.default_value.as_deref(), Some("(1+2)"));
        assert!(!total.nullable);
        assert_eq!(
            column(&model, "counters", "seq").default_value.as_deref(),
            Some("nextval('s'::regclass)")
        );
    }

    #[test]
    fn test_mysql_backslash_escapes() {
        let stripped = strip_comments("SELECT 'a\\'--b' -- gone\n", SqlDialect::MySQL);
        assert!(stripped.contains("'a\\'--b'"));
        assert!(!stripped.contains("gone"));

        let model = SqlParser::mysql()
            .parse("CREATE TABLE notes (id INT, tag VARCHAR(10) DEFAULT 'a\\'--b', body TEXT);")
            .unwrap()
            .model;
        assert_eq!(model.tables[0].columns.len(), 3);
        assert_eq!(
            column(&model, "notes", "tag").default_value.as_deref(),
            Some("'a\\'--b'")
        );
    }

    #[test]
    fn test_no_partial_model_on_late_error() {
        let result = parse_sql(
            "CREATE TABLE ok (id INT);
             CREATE TABLE broken (id INT,, name TEXT);",
        );
        assert!(matches!(result, Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn test_duplicate_column_is_error() {
        let err = parse_sql("CREATE TABLE t (id INT, ID TEXT);").unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateColumn {
                table: "t".into(),
                column: "ID".into()
            }
        );
    }

    #[test]
    fn test_duplicate_table_is_skipped() {
        let outcome = parse("CREATE TABLE t (id INT); CREATE TABLE T (other INT);");
        assert_eq!(outcome.model.tables.len(), 1);
        assert_eq!(outcome.model.tables[0].columns[0].name, "id");
        assert_eq!(
            outcome.warnings,
            vec![ParseWarning::DuplicateTable { name: "T".into() }]
        );
    }

    #[test]
    fn test_input_too_large() {
        let sql = "x".repeat(11);
        let parser = SqlParser::with_options(&ParseOptions {
            max_input_len: 10,
            ..ParseOptions::default()
        });
        assert_eq!(
            parser.parse(&sql).unwrap_err(),
            ParseError::InputTooLarge { max: 10, actual: 11 }
        );
    }

    #[test]
    fn test_alter_table_foreign_key() {
        let model = parse(
            "CREATE TABLE users (id INT PRIMARY KEY);
             CREATE TABLE posts (id INT PRIMARY KEY, user_id INT);
             ALTER TABLE posts ADD CONSTRAINT fk_posts_user FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE SET NULL;",
        )
        .model;
        let reference = column(&model, "posts", "user_id").reference.clone().unwrap();
        assert_eq!(reference.target_table, "users");
        assert_eq!(reference.on_delete, Some(ReferentialAction::SetNull));
    }

    #[test]
    fn test_unknown_targets_become_warnings() {
        let outcome = parse(
            "CREATE TABLE t (id INT);
             CREATE INDEX idx_x ON missing (id);
             ALTER TABLE missing ADD FOREIGN KEY (id) REFERENCES t (id);
             DROP TABLE legacy;",
        );
        assert_eq!(outcome.model.tables.len(), 1);
        assert_eq!(outcome.warnings.len(), 3);
        assert!(matches!(outcome.warnings[0], ParseWarning::IgnoredStatement { .. }));
    }

    #[test]
    fn test_implicit_reference_target() {
        let model = parse(
            "CREATE TABLE comments (id INT, author INT REFERENCES people, post INT REFERENCES posts);
             CREATE TABLE people (person_no INT PRIMARY KEY);",
        )
        .model;
        assert_eq!(
            column(&model, "comments", "author").reference.as_ref().unwrap().target_column,
            "person_no"
        );
        assert_eq!(
            column(&model, "comments", "post").reference.as_ref().unwrap().target_column,
            "id"
        );
    }

    #[test]
    fn test_comment_on_statements() {
        let model = parse(&format!(
            "CREATE TABLE posts (id INT, author_id INT);
             CREATE INDEX idx_posts_author_id ON posts (author_id);
             COMMENT ON TABLE posts IS 'All posts';
             COMMENT ON COLUMN public.posts.author_id IS 'Writer';
             COMMENT ON INDEX idx_posts_author_id IS '{}';",
            FK_AUTO_INDEX_COMMENT
        ))
        .model;
        let posts = model.table_by_name("posts").unwrap();
        assert_eq!(posts.comment.as_deref(), Some("All posts"));
        assert_eq!(
            column(&model, "posts", "author_id").comment.as_deref(),
            Some("Writer")
        );
        assert!(posts.indexes[0].is_fk_auto_index());
    }

    #[test]
    fn test_identity_and_multiword_types() {
        let outcome = SqlParser::postgresql()
            .parse(
                "CREATE TABLE IF NOT EXISTS public.metrics (
                    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
                    score DOUBLE PRECISION,
                    label CHARACTER VARYING(64),
                    seen_at TIMESTAMP(3) WITHOUT TIME ZONE,
                    payload JSONB DEFAULT '{}'::jsonb
                );",
            )
            .unwrap();
        let model = outcome.model;
        assert_eq!(model.tables[0].name, "metrics");
        let id = column(&model, "metrics", "id");
        assert!(id.auto_increment && id.primary_key);
        assert_eq!(id.data_type, DataType::BigInt);
        assert_eq!(column(&model, "metrics", "score").data_type, DataType::Double);
        assert_eq!(column(&model, "metrics", "label").data_type, DataType::varchar(64));
        assert_eq!(column(&model, "metrics", "seen_at").data_type, DataType::Timestamp);
        assert_eq!(
            column(&model, "metrics", "payload").default_value.as_deref(),
            Some("'{}'::jsonb")
        );
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_position_hints() {
        let model = parse(
            "-- Position: (120.5, 40)\nCREATE TABLE users (id INT);\nCREATE TABLE posts (id INT);",
        )
        .model;
        assert_eq!(model.tables[0].position, Some((120.5, 40.0)));
        assert_eq!(model.tables[1].position, None);
    }

    #[test]
    fn test_sqlite_autoincrement() {
        let model = SqlParser::sqlite()
            .parse("CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL);")
            .unwrap()
            .model;
        let id = column(&model, "notes", "id");
        assert!(id.primary_key && id.auto_increment);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("Postgres".parse::<SqlDialect>().unwrap(), SqlDialect::PostgreSQL);
        assert_eq!("mysql".parse::<SqlDialect>().unwrap(), SqlDialect::MySQL);
        assert!("oracle".parse::<SqlDialect>().is_err());
    }
}
