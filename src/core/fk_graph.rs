//! Foreign-key graph derivation and synchronization
//!
//! Column-level [`ForeignKeyReference`]s are the only stored form of a relationship.
//! Edges are recomputed on demand by [`derive_edges`] and are never cached in the model.
//!
//! [`on_edge_removed`] is the single mutation path for dropping a relationship. It clears
//! the reference and removes the single-column index that was generated for it, leaving
//! composite and user-authored indexes alone. It never fails: an edge id that is
//! malformed, stale, or points at a dangling reference is a no-op.

use crate::core::schema::{
    Column, ColumnId, ForeignKeyReference, Index, IndexId, SchemaModel, Table, TableId,
};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

const EDGE_ID_PREFIX: &str = "fk";

/// Identity of a derived edge: the owning table and column, nothing else
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId {
    pub table_id: TableId,
    pub column_id: ColumnId,
}

impl EdgeId {
    pub fn new(table_id: TableId, column_id: ColumnId) -> Self {
        Self {
            table_id,
            column_id,
        }
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", EDGE_ID_PREFIX, self.table_id, self.column_id)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EdgeIdError {
    #[error("Edge id '{0}' is not of the form fk:<table>:<column>")]
    Malformed(String),

    #[error("Edge id '{0}' contains an invalid uuid")]
    InvalidUuid(String),
}

impl FromStr for EdgeId {
    type Err = EdgeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(EDGE_ID_PREFIX)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| EdgeIdError::Malformed(s.to_string()))?;
        let (table, column) = rest
            .split_once(':')
            .ok_or_else(|| EdgeIdError::Malformed(s.to_string()))?;
        let table_id =
            TableId::from_str(table).map_err(|_| EdgeIdError::InvalidUuid(s.to_string()))?;
        let column_id =
            ColumnId::from_str(column).map_err(|_| EdgeIdError::InvalidUuid(s.to_string()))?;
        Ok(Self::new(table_id, column_id))
    }
}

/// Directed edge from a referencing column to the referenced column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub id: EdgeId,
    pub from_table: TableId,
    pub from_column: ColumnId,
    pub to_table: TableId,
    pub to_column: ColumnId,
    pub from_table_name: String,
    pub from_column_name: String,
    pub to_table_name: String,
    pub to_column_name: String,
}

impl ForeignKeyEdge {
    pub fn is_self_reference(&self) -> bool {
        self.from_table == self.to_table
    }
}

/// Case-insensitive name → table lookup, built once per derivation
fn table_lookup(tables: &[Table]) -> HashMap<String, &Table> {
    let mut lookup = HashMap::with_capacity(tables.len());
    for table in tables {
        // First definition wins, matching `SchemaModel::table_by_name`
        lookup.entry(table.name.to_lowercase()).or_insert(table);
    }
    lookup
}

fn resolve<'a>(
    lookup: &HashMap<String, &'a Table>,
    reference: &ForeignKeyReference,
) -> Option<(&'a Table, &'a Column)> {
    let target: &'a Table = lookup.get(&reference.target_table.to_lowercase()).copied()?;
    let (_, column) = target.find_column(&reference.target_column)?;
    Some((target, column))
}

/// Derive every resolvable foreign-key edge. Unresolvable references are skipped.
pub fn derive_edges(tables: &[Table]) -> Vec<ForeignKeyEdge> {
    let lookup = table_lookup(tables);
    let mut edges = Vec::new();

    for table in tables {
        for column in &table.columns {
            let Some(reference) = &column.reference else {
                continue;
            };
            let Some((target, target_column)) = resolve(&lookup, reference) else {
                tracing::trace!(
                    table = %table.name,
                    column = %column.name,
                    target = %reference.target_table,
                    "Skipping unresolved reference"
                );
                continue;
            };
            edges.push(ForeignKeyEdge {
                id: EdgeId::new(table.id, column.id),
                from_table: table.id,
                from_column: column.id,
                to_table: target.id,
                to_column: target_column.id,
                from_table_name: table.name.clone(),
                from_column_name: column.name.clone(),
                to_table_name: target.name.clone(),
                to_column_name: target_column.name.clone(),
            });
        }
    }

    edges
}

/// Directed table graph: node weights are table ids, edge weights are edge ids
pub type ForeignKeyGraph = DiGraph<TableId, EdgeId>;

/// Build a graph view of the derived edges. Nodes follow table order.
pub fn build_graph(tables: &[Table]) -> (ForeignKeyGraph, HashMap<TableId, NodeIndex>) {
    let mut graph = ForeignKeyGraph::with_capacity(tables.len(), tables.len());
    let mut nodes = HashMap::with_capacity(tables.len());
    for table in tables {
        nodes.insert(table.id, graph.add_node(table.id));
    }
    for edge in derive_edges(tables) {
        if let (Some(&from), Some(&to)) = (nodes.get(&edge.from_table), nodes.get(&edge.to_table)) {
            graph.add_edge(from, to, edge.id);
        }
    }
    (graph, nodes)
}

/// What [`on_edge_removed`] changed; all-default means nothing happened
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeRemoval {
    pub cleared: Option<ForeignKeyReference>,
    pub removed_indexes: Vec<Index>,
}

impl EdgeRemoval {
    pub fn is_noop(&self) -> bool {
        self.cleared.is_none() && self.removed_indexes.is_empty()
    }
}

/// Remove the edge identified by its textual id. Malformed ids are a no-op.
pub fn on_edge_removed(model: &mut SchemaModel, edge_id: &str) -> EdgeRemoval {
    match EdgeId::from_str(edge_id) {
        Ok(id) => remove_edge(model, id),
        Err(e) => {
            tracing::debug!(edge_id, error = %e, "Ignoring edge removal");
            EdgeRemoval::default()
        }
    }
}

/// Typed form of [`on_edge_removed`]
pub fn remove_edge(model: &mut SchemaModel, edge_id: EdgeId) -> EdgeRemoval {
    if !is_live_edge(model, edge_id) {
        tracing::debug!(%edge_id, "Edge no longer resolves, nothing to remove");
        return EdgeRemoval::default();
    }

    let Some(table) = model.table_mut(edge_id.table_id) else {
        return EdgeRemoval::default();
    };
    let Some(column) = table.column_mut(edge_id.column_id) else {
        return EdgeRemoval::default();
    };
    let cleared = column.reference.take();
    let column_name = column.name.clone();

    let (removed, kept): (Vec<Index>, Vec<Index>) =
        std::mem::take(&mut table.indexes)
            .into_iter()
            .partition(|index| {
                index.is_fk_auto_index()
                    && index.is_single_column()
                    && index.columns[0].eq_ignore_ascii_case(&column_name)
            });
    table.indexes = kept;

    tracing::debug!(
        %edge_id,
        table = %table.name,
        column = %column_name,
        removed_indexes = removed.len(),
        "Removed foreign key"
    );

    EdgeRemoval {
        cleared,
        removed_indexes: removed,
    }
}

fn is_live_edge(model: &SchemaModel, edge_id: EdgeId) -> bool {
    let lookup = table_lookup(&model.tables);
    model
        .table(edge_id.table_id)
        .and_then(|t| t.column(edge_id.column_id))
        .and_then(|c| c.reference.as_ref())
        .is_some_and(|r| resolve(&lookup, r).is_some())
}

/// Set a column reference and back it with an auto-generated index unless the column
/// already leads a single-column index. Returns the created index id, if any.
pub fn set_reference(
    model: &mut SchemaModel,
    table_id: TableId,
    column_id: ColumnId,
    reference: ForeignKeyReference,
) -> Option<IndexId> {
    let table = model.table_mut(table_id)?;
    let column = table.column_mut(column_id)?;
    column.reference = Some(reference);
    let column_name = column.name.clone();

    let covered = table
        .indexes_on_column(&column_name)
        .any(|i| i.is_single_column());
    if covered {
        return None;
    }

    let index = Index::fk_auto(&table.name, &column_name);
    let id = index.id;
    // A clashing user index name means the user already manages this; leave it.
    table.add_index(index).ok()?;
    tracing::debug!(table = %table.name, column = %column_name, "Created FK auto-index");
    Some(id)
}

/// Delete a column, running the edge-removal path first so its auto-index goes with it
pub fn delete_column(
    model: &mut SchemaModel,
    table_id: TableId,
    column_id: ColumnId,
) -> Option<Column> {
    remove_edge(model, EdgeId::new(table_id, column_id));
    model.table_mut(table_id)?.delete_column(column_id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, IndexType};

    fn blog() -> SchemaModel {
        let mut model = SchemaModel::new("blog");
        model
            .add_table(Table::new("users").add_column(Column::new("id", DataType::Integer).primary_key()))
            .unwrap();
        model
            .add_table(
                Table::new("posts")
                    .add_column(Column::new("id", DataType::Integer).primary_key())
                    .add_column(
                        Column::new("author_id", DataType::Integer)
                            .references(ForeignKeyReference::new("users", "id")),
                    )
                    .with_index(Index::fk_auto("posts", "author_id")),
            )
            .unwrap();
        model
    }

    fn edge_of(model: &SchemaModel, table: &str, column: &str) -> EdgeId {
        let t = model.table_by_name(table).unwrap();
        let (_, c) = t.find_column(column).unwrap();
        EdgeId::new(t.id, c.id)
    }

    #[test]
    fn test_edge_id_round_trip() {
        let id = EdgeId::new(TableId::new(), ColumnId::new());
        let text = id.to_string();
        assert!(text.starts_with("fk:"));
        assert_eq!(text.parse::<EdgeId>().unwrap(), id);
    }

    #[test]
    fn test_edge_id_rejects_garbage() {
        assert!(matches!(
            "posts->users".parse::<EdgeId>(),
            Err(EdgeIdError::Malformed(_))
        ));
        assert!(matches!(
            "fk:not-a-uuid:also-not".parse::<EdgeId>(),
            Err(EdgeIdError::InvalidUuid(_))
        ));
    }

    #[test]
    fn test_derive_edges_resolves_case_insensitively() {
        let mut model = blog();
        model.tables[1].columns[1].reference = Some(ForeignKeyReference::new("USERS", "ID"));
        let edges = derive_edges(&model.tables);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from_table_name, "posts");
        assert_eq!(edges[0].to_table_name, "users");
        assert_eq!(edges[0].to_column_name, "id");
    }

    #[test]
    fn test_derive_edges_skips_dangling() {
        let mut model = blog();
        model.tables[1].columns[1].reference = Some(ForeignKeyReference::new("accounts", "id"));
        assert!(derive_edges(&model.tables).is_empty());
    }

    #[test]
    fn test_self_reference_edge() {
        let table = Table::new("employees")
            .add_column(Column::new("id", DataType::Integer).primary_key())
            .add_column(
                Column::new("manager_id", DataType::Integer)
                    .references(ForeignKeyReference::new("employees", "id")),
            );
        let edges = derive_edges(std::slice::from_ref(&table));
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_self_reference());
    }

    #[test]
    fn test_remove_edge_drops_auto_index() {
        let mut model = blog();
        let id = edge_of(&model, "posts", "author_id");

        let removal = on_edge_removed(&mut model, &id.to_string());
        assert!(removal.cleared.is_some());
        assert_eq!(removal.removed_indexes.len(), 1);

        let posts = model.table_by_name("posts").unwrap();
        assert!(posts.indexes.is_empty());
        assert!(posts.find_column("author_id").unwrap().1.reference.is_none());
        assert!(derive_edges(&model.tables).is_empty());
    }

    #[test]
    fn test_remove_edge_keeps_user_and_composite_indexes() {
        let mut model = blog();
        {
            let posts = model.table_by_name_mut("posts").unwrap();
            posts.indexes.clear();
            posts
                .add_index(Index::new("idx_posts_author_lookup", ["author_id"]))
                .unwrap();
            posts
                .add_index(
                    Index::new("idx_posts_author_id_id", ["author_id", "id"])
                        .with_comment(crate::core::FK_AUTO_INDEX_COMMENT),
                )
                .unwrap();
        }
        let id = edge_of(&model, "posts", "author_id");

        let removal = remove_edge(&mut model, id);
        assert!(removal.cleared.is_some());
        assert!(removal.removed_indexes.is_empty());
        assert_eq!(model.table_by_name("posts").unwrap().indexes.len(), 2);
    }

    #[test]
    fn test_remove_edge_is_idempotent() {
        let mut model = blog();
        let id = edge_of(&model, "posts", "author_id");

        remove_edge(&mut model, id);
        let after_once = model.clone();
        let second = remove_edge(&mut model, id);
        assert!(second.is_noop());
        assert_eq!(model, after_once);
    }

    #[test]
    fn test_remove_edge_ignores_stale_and_dangling() {
        let mut model = blog();
        let before = model.clone();

        assert!(on_edge_removed(&mut model, "garbage").is_noop());
        assert!(remove_edge(&mut model, EdgeId::new(TableId::new(), ColumnId::new())).is_noop());

        // Dangling reference: no edge, so no cleanup either
        model.tables[1].columns[1].reference = Some(ForeignKeyReference::new("ghosts", "id"));
        let dangling = model.clone();
        let id = edge_of(&model, "posts", "author_id");
        assert!(remove_edge(&mut model, id).is_noop());
        assert_eq!(model, dangling);
        assert_ne!(model, before);
    }

    #[test]
    fn test_set_reference_creates_auto_index_once() {
        let mut model = blog();
        let posts_id = model.table_by_name("posts").unwrap().id;
        let editor_id = {
            let posts = model.table_mut(posts_id).unwrap();
            posts
                .create_column(Column::new("editor_id", DataType::Integer))
                .unwrap()
        };

        let created = set_reference(
            &mut model,
            posts_id,
            editor_id,
            ForeignKeyReference::new("users", "id"),
        );
        assert!(created.is_some());
        let posts = model.table(posts_id).unwrap();
        let auto: Vec<_> = posts.indexes_on_column("editor_id").collect();
        assert_eq!(auto.len(), 1);
        assert!(auto[0].is_fk_auto_index());
        assert_eq!(auto[0].index_type, IndexType::Btree);

        let again = set_reference(
            &mut model,
            posts_id,
            editor_id,
            ForeignKeyReference::new("users", "id"),
        );
        assert!(again.is_none());
        assert_eq!(derive_edges(&model.tables).len(), 2);
    }

    #[test]
    fn test_delete_column_cleans_up() {
        let mut model = blog();
        let id = edge_of(&model, "posts", "author_id");
        let removed = delete_column(&mut model, id.table_id, id.column_id).unwrap();
        assert_eq!(removed.name, "author_id");
        let posts = model.table_by_name("posts").unwrap();
        assert_eq!(posts.columns.len(), 1);
        assert!(posts.indexes.is_empty());
    }

    #[test]
    fn test_build_graph() {
        let model = blog();
        let (graph, nodes) = build_graph(&model.tables);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let posts = nodes[&model.tables[1].id];
        let users = nodes[&model.tables[0].id];
        assert!(graph.contains_edge(posts, users));
    }
}
