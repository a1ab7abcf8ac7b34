use crate::core::data_type::DataType;
use crate::core::error::SchemaError;
use crate::core::validation::{validate_column_name, validate_table_name};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comment marking an index as auto-generated for foreign-key lookups.
/// Only indexes carrying exactly this comment are ever removed automatically.
pub const FK_AUTO_INDEX_COMMENT: &str = "@archischema:fk-auto-index";

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            derive_more::Display,
            derive_more::From,
            derive_more::FromStr,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

id_type!(
    /// Stable table identity, independent of the table name
    TableId
);
id_type!(
    /// Stable column identity, scoped to its table
    ColumnId
);
id_type!(
    /// Stable index identity
    IndexId
);

/// Whole schema: the single in-memory representation every format converts to/from
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SchemaModel {
    pub name: String,
    pub description: String,
    /// Insertion order is kept for deterministic re-export
    pub tables: Vec<Table>,
}

impl Default for SchemaModel {
    fn default() -> Self {
        Self::new("Untitled schema")
    }
}

impl SchemaModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tables: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    /// Case-insensitive lookup by name
    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_by_name_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Append an existing table (importers, presets). Only name uniqueness is checked.
    pub fn add_table(&mut self, table: Table) -> Result<TableId, SchemaError> {
        if self.table_by_name(&table.name).is_some() {
            return Err(SchemaError::DuplicateTable(table.name));
        }
        let id = table.id;
        self.tables.push(table);
        Ok(id)
    }

    /// Create an empty table with an editor-supplied name
    pub fn create_table(&mut self, name: &str) -> Result<TableId, SchemaError> {
        validate_table_name(name).map_err(|reason| SchemaError::InvalidName {
            name: name.to_string(),
            reason,
        })?;
        self.add_table(Table::new(name.trim()))
    }

    /// Remove a table. References pointing at it are left dangling on purpose.
    pub fn remove_table(&mut self, id: TableId) -> Option<Table> {
        let pos = self.tables.iter().position(|t| t.id == id)?;
        Some(self.tables.remove(pos))
    }

    /// Rename a table and retarget every reference that pointed at the old name
    pub fn rename_table(&mut self, id: TableId, new_name: &str) -> Result<(), SchemaError> {
        validate_table_name(new_name).map_err(|reason| SchemaError::InvalidName {
            name: new_name.to_string(),
            reason,
        })?;
        let new_name = new_name.trim();
        if self
            .tables
            .iter()
            .any(|t| t.id != id && t.name.eq_ignore_ascii_case(new_name))
        {
            return Err(SchemaError::DuplicateTable(new_name.to_string()));
        }

        let table = self.table_mut(id).ok_or(SchemaError::TableNotFound)?;
        let old_name = std::mem::replace(&mut table.name, new_name.to_string());

        for column in self.tables.iter_mut().flat_map(|t| t.columns.iter_mut()) {
            if let Some(reference) = column.reference.as_mut()
                && reference.target_table.eq_ignore_ascii_case(&old_name)
            {
                reference.target_table = new_name.to_string();
            }
        }
        Ok(())
    }

    /// Rename a column and rewrite every index and inbound reference that named it
    pub fn rename_column(
        &mut self,
        table_id: TableId,
        column_id: ColumnId,
        new_name: &str,
    ) -> Result<(), SchemaError> {
        validate_column_name(new_name).map_err(|reason| SchemaError::InvalidName {
            name: new_name.to_string(),
            reason,
        })?;
        let new_name = new_name.trim();

        let table = self.table_mut(table_id).ok_or(SchemaError::TableNotFound)?;
        let mut column = table
            .column(column_id)
            .cloned()
            .ok_or(SchemaError::ColumnNotFound)?;
        let old_name = std::mem::replace(&mut column.name, new_name.to_string());
        table.update_column(column_id, column)?;
        let table_name = table.name.clone();

        for column in self.tables.iter_mut().flat_map(|t| t.columns.iter_mut()) {
            if let Some(reference) = column.reference.as_mut()
                && reference.target_table.eq_ignore_ascii_case(&table_name)
                && reference.target_column.eq_ignore_ascii_case(&old_name)
            {
                reference.target_column = new_name.to_string();
            }
        }
        tracing::debug!(table = %table_name, from = %old_name, to = %new_name, "Renamed column");
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }
}

/// A database table
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Table {
    pub id: TableId,
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    /// Canvas position (x, y); `None` until placed
    pub position: Option<(f64, f64)>,
    pub comment: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TableId::new(),
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            position: None,
            comment: None,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some((x, y));
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Builder form of [`Table::create_column`]; duplicate names are not checked
    pub fn add_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Append a column, rejecting invalid or duplicate names
    pub fn create_column(&mut self, column: Column) -> Result<ColumnId, SchemaError> {
        validate_column_name(&column.name).map_err(|reason| SchemaError::InvalidName {
            name: column.name.clone(),
            reason,
        })?;
        if self.find_column(&column.name).is_some() {
            return Err(SchemaError::DuplicateColumn {
                table: self.name.clone(),
                column: column.name,
            });
        }
        let id = column.id;
        self.columns.push(column);
        Ok(id)
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == id)
    }

    pub fn get_column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Case-insensitive lookup by name, with the column position
    pub fn find_column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
    }

    pub fn find_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Replace the column with `id`, keeping its identity
    pub fn update_column(&mut self, id: ColumnId, mut column: Column) -> Result<(), SchemaError> {
        if self
            .columns
            .iter()
            .any(|c| c.id != id && c.name.eq_ignore_ascii_case(&column.name))
        {
            return Err(SchemaError::DuplicateColumn {
                table: self.name.clone(),
                column: column.name,
            });
        }
        let slot = self.column_mut(id).ok_or(SchemaError::ColumnNotFound)?;
        column.id = id;
        let old_name = std::mem::replace(slot, column).name;
        let new_name = slot.name.clone();
        if old_name != new_name {
            for index in &mut self.indexes {
                for name in index.columns.iter_mut() {
                    if name.eq_ignore_ascii_case(&old_name) {
                        *name = new_name.clone();
                    }
                }
            }
        }
        Ok(())
    }

    /// Remove a column and drop it from every index; indexes left without columns
    /// go too. Use `fk_graph::delete_column` when the column may carry a reference.
    pub fn delete_column(&mut self, id: ColumnId) -> Result<Column, SchemaError> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.id == id)
            .ok_or(SchemaError::ColumnNotFound)?;
        let column = self.columns.remove(pos);
        for index in &mut self.indexes {
            index.columns.retain(|c| !c.eq_ignore_ascii_case(&column.name));
        }
        self.indexes.retain(|i| !i.columns.is_empty());
        Ok(column)
    }

    pub fn move_column(&mut self, from: usize, to: usize) -> Result<(), SchemaError> {
        let len = self.columns.len();
        for index in [from, to] {
            if index >= len {
                return Err(SchemaError::ColumnIndexOutOfBounds { index, len });
            }
        }
        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        Ok(())
    }

    pub fn add_index(&mut self, index: Index) -> Result<IndexId, SchemaError> {
        if self
            .indexes
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&index.name))
        {
            return Err(SchemaError::DuplicateIndex(index.name));
        }
        let id = index.id;
        self.indexes.push(index);
        Ok(id)
    }

    pub fn remove_index(&mut self, id: IndexId) -> Option<Index> {
        let pos = self.indexes.iter().position(|i| i.id == id)?;
        Some(self.indexes.remove(pos))
    }

    /// Indexes that cover `column` (single-column or composite)
    pub fn indexes_on_column<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Index> {
        self.indexes.iter().filter(move |i| {
            i.columns
                .iter()
                .any(|c| c.eq_ignore_ascii_case(column))
        })
    }

    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }
}

/// Table column
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Raw expression, never evaluated
    pub default_value: Option<String>,
    pub comment: Option<String>,
    pub reference: Option<ForeignKeyReference>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: ColumnId::new(),
            name: name.into(),
            data_type,
            nullable: true,
            unique: false,
            primary_key: false,
            auto_increment: false,
            default_value: None,
            comment: None,
            reference: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn references(mut self, reference: ForeignKeyReference) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Column-level foreign key; the only place a relationship is stored
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ForeignKeyReference {
    pub target_table: String,
    pub target_column: String,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeyReference {
    pub fn new(target_table: impl Into<String>, target_column: impl Into<String>) -> Self {
        Self {
            target_table: target_table.into(),
            target_column: target_column.into(),
            on_delete: None,
            on_update: None,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// Descriptive cascade semantics
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl std::fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferentialAction::Cascade => write!(f, "CASCADE"),
            ReferentialAction::SetNull => write!(f, "SET NULL"),
            ReferentialAction::SetDefault => write!(f, "SET DEFAULT"),
            ReferentialAction::Restrict => write!(f, "RESTRICT"),
            ReferentialAction::NoAction => write!(f, "NO ACTION"),
        }
    }
}

/// Index access method
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexType {
    #[default]
    Btree,
    Hash,
    Gin,
    Gist,
    Brin,
}

impl IndexType {
    pub fn from_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "BTREE" => Some(IndexType::Btree),
            "HASH" => Some(IndexType::Hash),
            "GIN" => Some(IndexType::Gin),
            "GIST" => Some(IndexType::Gist),
            "BRIN" => Some(IndexType::Brin),
            _ => None,
        }
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexType::Btree => write!(f, "BTREE"),
            IndexType::Hash => write!(f, "HASH"),
            IndexType::Gin => write!(f, "GIN"),
            IndexType::Gist => write!(f, "GIST"),
            IndexType::Brin => write!(f, "BRIN"),
        }
    }
}

/// Table index
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Index {
    pub id: IndexId,
    pub name: String,
    pub columns: Vec<String>,
    pub index_type: IndexType,
    pub unique: bool,
    pub comment: Option<String>,
}

impl Index {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: IndexId::new(),
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            index_type: IndexType::Btree,
            unique: false,
            comment: None,
        }
    }

    /// Auto-generated single-column index backing a foreign key
    pub fn fk_auto(table: &str, column: &str) -> Self {
        Self::new(format!("idx_{}_{}", table, column), [column])
            .with_comment(FK_AUTO_INDEX_COMMENT)
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn is_fk_auto_index(&self) -> bool {
        self.comment.as_deref() == Some(FK_AUTO_INDEX_COMMENT)
    }

    pub fn is_single_column(&self) -> bool {
        self.columns.len() == 1
    }
}
