//! Auto-layout module for automatic table arrangement
//!
//! Tables are arranged with a layered (Sugiyama-style) layout driven by the
//! foreign-key graph:
//! - **Layering**: a table that references nothing sits in layer 0, every other
//!   table one layer past the deepest table it references
//! - **Ordering**: barycenter sweeps reorder each layer to reduce edge crossings
//! - **Coordinates**: layers become columns left to right, tables stack top to bottom
//!
//! The result depends only on table order and foreign keys, so identical models
//! always get identical layouts.

use crate::core::fk_graph::{ForeignKeyGraph, build_graph};
use crate::core::schema::{SchemaModel, Table, TableId};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unicode_width::UnicodeWidthStr;

/// Canvas placement or the wider spacing used for static exports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Canvas,
    Export,
}

impl std::fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutMode::Canvas => write!(f, "canvas"),
            LayoutMode::Export => write!(f, "export"),
        }
    }
}

impl std::str::FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "canvas" => Ok(LayoutMode::Canvas),
            "export" => Ok(LayoutMode::Export),
            _ => Err(format!("Unknown layout mode: {}", s)),
        }
    }
}

/// Layout configuration
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Starting X position
    pub start_x: f64,
    /// Starting Y position
    pub start_y: f64,
    /// Gap between layer columns
    pub horizontal_spacing: f64,
    /// Gap between tables in one column
    pub vertical_spacing: f64,
    /// Width of one terminal cell of label text
    pub char_width: f64,
    pub header_height: f64,
    pub row_height: f64,
    /// Horizontal padding on each side of a table
    pub padding: f64,
    pub min_table_width: f64,
    /// Size used when a table cannot be measured
    pub default_table_width: f64,
    pub default_table_height: f64,
    /// Number of barycenter sweeps
    pub ordering_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            start_x: 100.0,
            start_y: 100.0,
            horizontal_spacing: 80.0,
            vertical_spacing: 60.0,
            char_width: 8.0,
            header_height: 40.0,
            row_height: 28.0,
            padding: 16.0,
            min_table_width: 180.0,
            default_table_width: 280.0,
            default_table_height: 250.0,
            ordering_passes: 4,
        }
    }
}

impl LayoutConfig {
    pub fn for_mode(mode: LayoutMode) -> Self {
        match mode {
            LayoutMode::Canvas => Self::default(),
            LayoutMode::Export => Self::export(),
        }
    }

    /// Wider spacing for static renders, where nothing can be dragged apart afterwards
    pub fn export() -> Self {
        let canvas = Self::default();
        Self {
            start_x: 40.0,
            start_y: 40.0,
            horizontal_spacing: canvas.horizontal_spacing * 2.0,
            vertical_spacing: canvas.vertical_spacing * 1.5,
            ..canvas
        }
    }
}

/// Result of auto-layout calculation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutResult {
    /// New positions, in model table order
    pub positions: Vec<(TableId, (f64, f64))>,
    /// Final layer assignment, each layer in top-to-bottom order
    pub layers: Vec<Vec<TableId>>,
    /// Edge crossings between adjacent layers in the chosen ordering
    pub crossings: usize,
}

impl LayoutResult {
    pub fn position_of(&self, id: TableId) -> Option<(f64, f64)> {
        self.positions
            .iter()
            .find(|(table, _)| *table == id)
            .map(|(_, position)| *position)
    }

    pub fn layer_of(&self, id: TableId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.contains(&id))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableSize {
    pub width: f64,
    pub height: f64,
}

/// Estimate the rendered size of a table from its label text
pub fn measure_table(table: &Table, config: &LayoutConfig) -> TableSize {
    let widest_row = table
        .columns
        .iter()
        .map(|c| c.name.width() + 2 + c.data_type.to_string().width())
        .max()
        .unwrap_or(0);
    let cells = widest_row.max(table.name.width());

    let width = (cells as f64 * config.char_width + config.padding * 2.0).max(config.min_table_width);
    let height = config.header_height + table.columns.len() as f64 * config.row_height;

    TableSize {
        width: usable(width, config.default_table_width),
        height: usable(height, config.default_table_height),
    }
}

fn usable(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// Outgoing adjacency (deduplicated, self-loops dropped) by table position.
/// Graph nodes are added in table order, so a node index is a table position.
fn outgoing_edges(graph: &ForeignKeyGraph) -> Vec<Vec<usize>> {
    graph
        .node_indices()
        .map(|node| {
            // petgraph walks the newest edge first
            let mut targets: Vec<usize> = graph
                .neighbors_directed(node, Direction::Outgoing)
                .filter(|&target| target != node)
                .map(|target| target.index())
                .collect();
            targets.reverse();
            let mut seen = Vec::with_capacity(targets.len());
            targets.retain(|t| {
                let first = !seen.contains(t);
                seen.push(*t);
                first
            });
            targets
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

/// Layer of every table: 0 without outgoing edges, else 1 + deepest referenced layer.
/// Edges back into the current DFS path close a cycle and are ignored.
fn assign_layers(outgoing: &[Vec<usize>]) -> Vec<usize> {
    let mut state = vec![VisitState::Unvisited; outgoing.len()];
    let mut layer = vec![0usize; outgoing.len()];

    for root in 0..outgoing.len() {
        if state[root] != VisitState::Unvisited {
            continue;
        }
        state[root] = VisitState::InProgress;
        let mut stack = vec![(root, 0usize)];

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            if let Some(&child) = outgoing[node].get(next) {
                frame.1 += 1;
                if state[child] == VisitState::Unvisited {
                    state[child] = VisitState::InProgress;
                    stack.push((child, 0));
                }
                continue;
            }

            let depth = outgoing[node]
                .iter()
                .filter(|&&child| state[child] == VisitState::Done)
                .map(|&child| layer[child] + 1)
                .max()
                .unwrap_or(0);
            layer[node] = depth;
            state[node] = VisitState::Done;
            stack.pop();
        }
    }
    layer
}

/// Count crossings between adjacent layers
fn cross_count(layers: &[Vec<usize>], neighbours: &[Vec<usize>]) -> usize {
    let mut total = 0;
    for pair in layers.windows(2) {
        let west: HashMap<usize, usize> = pair[0].iter().enumerate().map(|(i, &n)| (n, i)).collect();
        let east: HashMap<usize, usize> = pair[1].iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut edges = Vec::new();
        for (&node, &wp) in &west {
            for other in &neighbours[node] {
                if let Some(&ep) = east.get(other) {
                    edges.push((wp, ep));
                }
            }
        }
        for i in 0..edges.len() {
            for j in (i + 1)..edges.len() {
                let (w1, e1) = edges[i];
                let (w2, e2) = edges[j];
                if (w1 < w2 && e1 > e2) || (w1 > w2 && e1 < e2) {
                    total += 1;
                }
            }
        }
    }
    total
}

/// Reorder `layer` by the mean position of its neighbours in `reference`.
/// Unconnected tables keep their current position as their rank. Returns true on change.
fn order_by_barycenter(layer: &mut Vec<usize>, reference: &[usize], neighbours: &[Vec<usize>]) -> bool {
    let ref_pos: HashMap<usize, usize> = reference.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let mut ranked: Vec<(f64, usize, usize)> = layer
        .iter()
        .enumerate()
        .map(|(i, &node)| {
            let positions: Vec<f64> = neighbours[node]
                .iter()
                .filter_map(|n| ref_pos.get(n).map(|&p| p as f64))
                .collect();
            let rank = if positions.is_empty() {
                i as f64
            } else {
                positions.iter().sum::<f64>() / positions.len() as f64
            };
            (rank, i, node)
        })
        .collect();

    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    let reordered: Vec<usize> = ranked.into_iter().map(|(_, _, node)| node).collect();
    let changed = reordered != *layer;
    *layer = reordered;
    changed
}

/// Alternating barycenter sweeps, keeping the ordering with the fewest crossings
fn order_layers(layers: &mut Vec<Vec<usize>>, neighbours: &[Vec<usize>], passes: usize) -> usize {
    let mut best = layers.clone();
    let mut best_crossings = cross_count(layers, neighbours);
    if layers.len() < 2 {
        return best_crossings;
    }

    for pass in 0..passes {
        let forward = pass % 2 == 0;
        let indices: Vec<usize> = if forward {
            (1..layers.len()).collect()
        } else {
            (0..layers.len() - 1).rev().collect()
        };

        let mut changed = false;
        for idx in indices {
            let reference = if forward { idx - 1 } else { idx + 1 };
            let reference_layer = layers[reference].clone();
            changed |= order_by_barycenter(&mut layers[idx], &reference_layer, neighbours);
        }

        let crossings = cross_count(layers, neighbours);
        if crossings < best_crossings {
            best = layers.clone();
            best_crossings = crossings;
        }
        if !changed {
            break;
        }
    }

    *layers = best;
    best_crossings
}

/// Compute a layered layout for `tables` without touching them
pub fn calculate_layered_layout(tables: &[Table], config: &LayoutConfig) -> LayoutResult {
    if tables.is_empty() {
        return LayoutResult::default();
    }

    let (graph, _) = build_graph(tables);
    let outgoing = outgoing_edges(&graph);
    let layer_of = assign_layers(&outgoing);

    let mut neighbours = vec![Vec::new(); tables.len()];
    for (from, targets) in outgoing.iter().enumerate() {
        for &to in targets {
            if !neighbours[from].contains(&to) {
                neighbours[from].push(to);
            }
            if !neighbours[to].contains(&from) {
                neighbours[to].push(from);
            }
        }
    }

    let layer_count = layer_of.iter().max().map_or(0, |m| m + 1);
    let mut layers = vec![Vec::new(); layer_count];
    for (node, &layer) in layer_of.iter().enumerate() {
        layers[layer].push(node);
    }
    let crossings = order_layers(&mut layers, &neighbours, config.ordering_passes);

    let sizes: Vec<TableSize> = tables.iter().map(|t| measure_table(t, config)).collect();
    let mut coordinates = vec![(config.start_x, config.start_y); tables.len()];
    let mut x = config.start_x;
    for layer in &layers {
        let mut y = config.start_y;
        for &node in layer {
            coordinates[node] = (x, y);
            y += sizes[node].height + config.vertical_spacing;
        }
        let pitch = layer
            .iter()
            .map(|&node| sizes[node].width)
            .fold(0.0, f64::max);
        x += pitch + config.horizontal_spacing;
    }

    tracing::debug!(
        tables = tables.len(),
        layers = layers.len(),
        crossings,
        "Calculated layered layout"
    );

    LayoutResult {
        positions: tables
            .iter()
            .zip(coordinates)
            .map(|(table, position)| (table.id, position))
            .collect(),
        layers: layers
            .iter()
            .map(|layer| layer.iter().map(|&node| tables[node].id).collect())
            .collect(),
        crossings,
    }
}

/// Write the computed positions into the model
pub fn apply_layout(model: &mut SchemaModel, layout: &LayoutResult) {
    for (id, position) in &layout.positions {
        if let Some(table) = model.table_mut(*id) {
            table.position = Some(*position);
        }
    }
}

/// Re-layout every table using default canvas settings
pub fn auto_layout(model: &mut SchemaModel) {
    auto_layout_with_config(model, &LayoutConfig::default());
}

pub fn auto_layout_with_config(model: &mut SchemaModel, config: &LayoutConfig) {
    let layout = calculate_layered_layout(&model.tables, config);
    apply_layout(model, &layout);
    tracing::info!(tables = layout.positions.len(), "Auto-layout applied");
}

/// Position only tables without a position, below the already placed ones.
/// Returns the number of tables placed.
pub fn layout_missing(model: &mut SchemaModel, config: &LayoutConfig) -> usize {
    let pending: Vec<Table> = model
        .tables
        .iter()
        .filter(|t| t.position.is_none())
        .cloned()
        .collect();
    if pending.is_empty() {
        return 0;
    }

    let bottom = model
        .tables
        .iter()
        .filter_map(|t| t.position.map(|(_, y)| y + measure_table(t, config).height))
        .fold(None, |acc: Option<f64>, y| Some(acc.map_or(y, |a| a.max(y))));

    let mut offset = config.clone();
    if let Some(bottom) = bottom {
        offset.start_y = bottom + config.vertical_spacing;
    }

    let layout = calculate_layered_layout(&pending, &offset);
    apply_layout(model, &layout);
    tracing::info!(placed = pending.len(), "Laid out unpositioned tables");
    pending.len()
}
