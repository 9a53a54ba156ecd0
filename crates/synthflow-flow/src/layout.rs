//! Hierarchical (layered) layout.
//!
//! Four phases, all deterministic for a fixed node list, edge list and
//! options:
//!
//! 1. Acyclic: a depth-first search in node-list order finds back edges;
//!    they are reversed for layering only.
//! 2. Ranking: longest-path layering, every edge points to a higher rank.
//! 3. Ordering: iterated barycenter sweeps reduce crossings between adjacent
//!    ranks, each rank seeded in id order; ties break by node id.
//! 4. Coordinates: ranks are spaced by `rank_sep`, nodes within a rank by
//!    `node_sep`, every rank centered against the widest one.
//!
//! The engine works in node centers; stored positions are top-left corners.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, DfsEvent};
use serde::Serialize;
use tracing::{debug, warn};

use synthflow_core::config::{LayoutConfig, LayoutDirection};
use synthflow_core::types::Position;

use crate::graph::{FlowEdge, FlowNode};

/// Parameters of one layout pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub direction: LayoutDirection,
    pub node_width: f64,
    pub node_height: f64,
    pub node_sep: f64,
    pub rank_sep: f64,
    pub max_sweeps: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for LayoutOptions {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            direction: config.direction,
            node_width: config.node_width,
            node_height: config.node_height,
            node_sep: config.node_sep,
            rank_sep: config.rank_sep,
            max_sweeps: config.max_sweeps,
        }
    }
}

impl LayoutOptions {
    pub fn with_direction(mut self, direction: LayoutDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Node extent along the rank axis.
    fn rank_extent(&self) -> f64 {
        match self.direction {
            LayoutDirection::TopToBottom => self.node_height,
            LayoutDirection::LeftToRight => self.node_width,
        }
    }

    /// Node extent along the within-rank axis.
    fn order_extent(&self) -> f64 {
        match self.direction {
            LayoutDirection::TopToBottom => self.node_width,
            LayoutDirection::LeftToRight => self.node_height,
        }
    }
}

/// Summary of a layout pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutStats {
    pub ranks: usize,
    pub crossings: usize,
    pub reversed_edges: usize,
    pub skipped_edges: usize,
}

/// Axis-aligned box around every node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Bounds of all node boxes; zero-sized for an empty slice.
    pub fn of(nodes: &[FlowNode], node_width: f64, node_height: f64) -> Self {
        let mut iter = nodes.iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        let mut b = Bounds {
            min_x: first.position.x,
            min_y: first.position.y,
            max_x: first.position.x + node_width,
            max_y: first.position.y + node_height,
        };
        for n in iter {
            b.min_x = b.min_x.min(n.position.x);
            b.min_y = b.min_y.min(n.position.y);
            b.max_x = b.max_x.max(n.position.x + node_width);
            b.max_y = b.max_y.max(n.position.y + node_height);
        }
        b
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Grow the box by `margin` on every side.
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }
}

/// Node id with its laid-out top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePlacement {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Collect placements in node-list order.
pub fn placements(nodes: &[FlowNode]) -> Vec<NodePlacement> {
    nodes
        .iter()
        .map(|n| NodePlacement {
            id: n.id.clone(),
            x: n.position.x,
            y: n.position.y,
        })
        .collect()
}

/// Position every node. Only `position` is written; edges are read-only.
///
/// Edges whose endpoints are not in `nodes` are skipped with a warning.
pub fn layout_flow(nodes: &mut [FlowNode], edges: &[FlowEdge], options: &LayoutOptions) -> LayoutStats {
    let n = nodes.len();
    let mut stats = LayoutStats::default();
    if n == 0 {
        return stats;
    }

    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(n, edges.len());
    let handles: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();
    let mut links: Vec<(usize, usize)> = Vec::with_capacity(edges.len());

    for edge in edges {
        match (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
            (Some(&s), Some(&t)) => {
                if s != t {
                    graph.add_edge(handles[s], handles[t], ());
                    links.push((s, t));
                }
            }
            _ => {
                warn!(
                    edge = %edge.id,
                    source = %edge.source,
                    target = %edge.target,
                    "Edge references unknown node, skipped by layout"
                );
                stats.skipped_edges += 1;
            }
        }
    }

    let oriented = break_cycles(&graph, &handles, &links, &mut stats);

    let mut succ = vec![Vec::new(); n];
    let mut pred = vec![Vec::new(); n];
    for &(s, t) in &oriented {
        succ[s].push(t);
        pred[t].push(s);
    }

    let ids: Vec<String> = nodes.iter().map(|node| node.id.clone()).collect();
    let ranks = assign_ranks(&succ, &pred);
    let mut rank_order = build_rank_buckets(&ranks, &ids);
    stats.ranks = rank_order.len();
    stats.crossings = minimize_crossings(
        &mut rank_order,
        &ranks,
        &succ,
        &pred,
        &ids,
        options.max_sweeps,
    );

    assign_coordinates(nodes, &rank_order, options);

    debug!(
        nodes = n,
        ranks = stats.ranks,
        crossings = stats.crossings,
        reversed = stats.reversed_edges,
        direction = %options.direction,
        "Layout complete"
    );
    stats
}

// ── Phase 1: cycle breaking ──────────────────────────────────────────

/// Reverse DFS back edges so the edge set becomes acyclic.
fn break_cycles(
    graph: &DiGraph<usize, ()>,
    handles: &[NodeIndex],
    links: &[(usize, usize)],
    stats: &mut LayoutStats,
) -> Vec<(usize, usize)> {
    let mut back: HashSet<(usize, usize)> = HashSet::new();
    depth_first_search(graph, handles.iter().copied(), |event| {
        if let DfsEvent::BackEdge(u, v) = event {
            back.insert((graph[u], graph[v]));
        }
    });

    let mut oriented: Vec<(usize, usize)> = links
        .iter()
        .map(|&(s, t)| {
            if back.contains(&(s, t)) {
                stats.reversed_edges += 1;
                (t, s)
            } else {
                (s, t)
            }
        })
        .collect();
    oriented.sort_unstable();
    oriented.dedup();
    oriented
}

// ── Phase 2: rank assignment ─────────────────────────────────────────

/// Longest-path layering via Kahn's algorithm, sources seeded in list order.
fn assign_ranks(succ: &[Vec<usize>], pred: &[Vec<usize>]) -> Vec<usize> {
    let n = succ.len();
    let mut in_degree: Vec<usize> = pred.iter().map(Vec::len).collect();
    let mut queue: Vec<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
    let mut ranks = vec![0usize; n];
    let mut visited = vec![false; n];

    let mut head = 0;
    while head < queue.len() {
        let u = queue[head];
        head += 1;
        visited[u] = true;
        for &v in &succ[u] {
            ranks[v] = ranks[v].max(ranks[u] + 1);
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push(v);
            }
        }
    }

    // Unreachable after cycle breaking; kept so a bad edge set still lays out.
    if visited.iter().any(|seen| !seen) {
        let max_rank = ranks.iter().copied().max().unwrap_or(0);
        for (v, rank) in ranks.iter_mut().enumerate() {
            if !visited[v] {
                *rank = max_rank + 1;
            }
        }
    }
    ranks
}

/// `buckets[r]` holds the nodes of rank `r`, sorted by node id.
fn build_rank_buckets(ranks: &[usize], ids: &[String]) -> Vec<Vec<usize>> {
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut buckets = vec![Vec::new(); max_rank + 1];
    for (v, &r) in ranks.iter().enumerate() {
        buckets[r].push(v);
    }
    for bucket in &mut buckets {
        bucket.sort_by(|&a, &b| ids[a].cmp(&ids[b]));
    }
    buckets
}

// ── Phase 3: ordering within ranks ───────────────────────────────────

fn positions_of(rank: &[usize], n: usize) -> Vec<Option<usize>> {
    let mut pos = vec![None; n];
    for (i, &v) in rank.iter().enumerate() {
        pos[v] = Some(i);
    }
    pos
}

/// Mean position of `neighbors` in the adjacent rank, if any lie there.
fn barycenter(neighbors: &[usize], adjacent_pos: &[Option<usize>]) -> Option<f64> {
    let placed: Vec<usize> = neighbors.iter().filter_map(|&nb| adjacent_pos[nb]).collect();
    if placed.is_empty() {
        None
    } else {
        Some(placed.iter().sum::<usize>() as f64 / placed.len() as f64)
    }
}

/// Reorder `rank_order[r]` by barycenter against `rank_order[adjacent]`.
fn sweep_rank(
    rank_order: &mut [Vec<usize>],
    r: usize,
    adjacent: usize,
    neighbors: &[Vec<usize>],
    ids: &[String],
) {
    let n = neighbors.len();
    let adjacent_pos = positions_of(&rank_order[adjacent], n);
    let mut scored: Vec<(usize, f64)> = rank_order[r]
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, barycenter(&neighbors[v], &adjacent_pos).unwrap_or(i as f64)))
        .collect();
    // Equal scores break by node id.
    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ids[a.0].cmp(&ids[b.0]))
    });
    rank_order[r] = scored.into_iter().map(|(v, _)| v).collect();
}

/// Crossings between ranks `r` and `r + 1`.
fn count_crossings(rank_order: &[Vec<usize>], r: usize, ranks: &[usize], succ: &[Vec<usize>]) -> usize {
    let n = succ.len();
    let upper = positions_of(&rank_order[r], n);
    let lower = positions_of(&rank_order[r + 1], n);
    let segments: Vec<(usize, usize)> = rank_order[r]
        .iter()
        .flat_map(|&u| {
            succ[u]
                .iter()
                .filter(move |&&v| ranks[v] == ranks[u] + 1)
                .map(move |&v| (u, v))
        })
        .filter_map(|(u, v)| Some((upper[u]?, lower[v]?)))
        .collect();

    let mut crossings = 0;
    for (i, &(a1, b1)) in segments.iter().enumerate() {
        for &(a2, b2) in &segments[i + 1..] {
            if (a1 < a2 && b1 > b2) || (a1 > a2 && b1 < b2) {
                crossings += 1;
            }
        }
    }
    crossings
}

fn total_crossings(rank_order: &[Vec<usize>], ranks: &[usize], succ: &[Vec<usize>]) -> usize {
    (0..rank_order.len().saturating_sub(1))
        .map(|r| count_crossings(rank_order, r, ranks, succ))
        .sum()
}

/// Alternate forward and backward sweeps, keeping the best ordering seen.
/// Stops at the first sweep that does not improve.
fn minimize_crossings(
    rank_order: &mut Vec<Vec<usize>>,
    ranks: &[usize],
    succ: &[Vec<usize>],
    pred: &[Vec<usize>],
    ids: &[String],
    max_sweeps: usize,
) -> usize {
    let mut best = total_crossings(rank_order, ranks, succ);
    if rank_order.len() <= 1 || best == 0 {
        return best;
    }
    let mut best_order = rank_order.clone();

    for _ in 0..max_sweeps {
        for r in 1..rank_order.len() {
            sweep_rank(rank_order, r, r - 1, pred, ids);
        }
        for r in (0..rank_order.len() - 1).rev() {
            sweep_rank(rank_order, r, r + 1, succ, ids);
        }

        let crossings = total_crossings(rank_order, ranks, succ);
        if crossings < best {
            best = crossings;
            best_order = rank_order.clone();
            if best == 0 {
                break;
            }
        } else {
            break;
        }
    }

    *rank_order = best_order;
    best
}

// ── Phase 4: coordinates ─────────────────────────────────────────────

fn assign_coordinates(nodes: &mut [FlowNode], rank_order: &[Vec<usize>], options: &LayoutOptions) {
    let rank_extent = options.rank_extent();
    let order_extent = options.order_extent();
    let rank_step = rank_extent + options.rank_sep;
    let order_step = order_extent + options.node_sep;

    let span = |count: usize| {
        count as f64 * order_extent + count.saturating_sub(1) as f64 * options.node_sep
    };
    let widest = rank_order.iter().map(|r| span(r.len())).fold(0.0_f64, f64::max);

    for (r, rank_nodes) in rank_order.iter().enumerate() {
        let rank_center = r as f64 * rank_step + rank_extent / 2.0;
        let shift = (widest - span(rank_nodes.len())) / 2.0;

        for (k, &v) in rank_nodes.iter().enumerate() {
            let order_center = shift + k as f64 * order_step + order_extent / 2.0;
            let (cx, cy) = match options.direction {
                LayoutDirection::TopToBottom => (order_center, rank_center),
                LayoutDirection::LeftToRight => (rank_center, order_center),
            };
            nodes[v].position = Position::new(
                cx - options.node_width / 2.0,
                cy - options.node_height / 2.0,
            );
        }
    }
}
