//! Dependency-graph validation over the subtasks of a registry.
//!
//! The `dependencies` field of every subtask induces a directed graph over
//! subtask IDs. Before a registry is executed, that graph must be a DAG:
//! self-dependencies and cycles are rejected here, at ingestion time, with
//! the offending path reconstructed for diagnostics. Deep prerequisite
//! chains are reported but never fail — they are a planning smell, not an
//! error. Dependencies that reference IDs outside the registry are treated
//! as leaves; referential integrity is the schema validator's concern.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::warn;

use crate::tasks::{Backlog, ItemId};

/// Chains longer than this many edges are reported as informational.
pub const DEFAULT_CHAIN_THRESHOLD: usize = 5;

fn render_cycle(path: &[ItemId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A cycle (or self-dependency) in the subtask dependency graph.
///
/// `cycle_path` starts and ends at the same ID; `cycle_length` is the number
/// of edges on the cycle. A self-dependency has length 1.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("circular dependency ({cycle_length} edge(s)): {}", render_cycle(.cycle_path))]
#[diagnostic(
    code(taskloom::deps::circular),
    help("Break the cycle by removing one of the listed dependency edges.")
)]
pub struct CircularDependency {
    pub cycle_path: Vec<ItemId>,
    pub cycle_length: usize,
    /// The subtask at which detection fired, when known.
    pub task_id: Option<ItemId>,
}

/// Informational findings from an acyclic graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyReport {
    /// Prerequisite chains exceeding the threshold, deepest first. Each
    /// chain runs from a dependent down to its deepest prerequisite.
    pub long_chains: Vec<Vec<ItemId>>,
    /// Length in edges of the longest prerequisite chain.
    pub max_depth: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Validate the dependency graph with the default chain threshold.
pub fn validate_dependencies(backlog: &Backlog) -> Result<DependencyReport, CircularDependency> {
    validate_dependencies_with_threshold(backlog, DEFAULT_CHAIN_THRESHOLD)
}

/// Validate the dependency graph, reporting chains longer than `threshold`
/// edges.
///
/// Detection order: self-dependencies first, then cycles of length ≥ 2 via
/// an iterative tri-color DFS, then the informational chain-depth pass.
pub fn validate_dependencies_with_threshold(
    backlog: &Backlog,
    threshold: usize,
) -> Result<DependencyReport, CircularDependency> {
    let order: Vec<&ItemId> = backlog.subtasks().map(|s| &s.id).collect();
    let graph: FxHashMap<&ItemId, &[ItemId]> = backlog
        .subtasks()
        .map(|s| (&s.id, s.dependencies.as_slice()))
        .collect();

    // 1. Self-dependencies.
    for subtask in backlog.subtasks() {
        if subtask.dependencies.contains(&subtask.id) {
            return Err(CircularDependency {
                cycle_path: vec![subtask.id.clone(), subtask.id.clone()],
                cycle_length: 1,
                task_id: Some(subtask.id.clone()),
            });
        }
    }

    // 2. Cycles of length >= 2, iterative tri-color DFS in registry order.
    let mut colors: FxHashMap<&ItemId, Color> =
        order.iter().map(|id| (*id, Color::White)).collect();
    for &root in &order {
        if colors[root] != Color::White {
            continue;
        }
        // Stack frames are (node, next-dependency index); `path` mirrors the
        // gray nodes on the stack for cycle reconstruction.
        let mut stack: Vec<(&ItemId, usize)> = vec![(root, 0)];
        let mut path: Vec<&ItemId> = vec![root];
        colors.insert(root, Color::Gray);
        while !stack.is_empty() {
            let (node, next) = {
                let Some(frame) = stack.last_mut() else { break };
                let out = (frame.0, frame.1);
                frame.1 += 1;
                out
            };
            let deps = graph.get(node).copied().unwrap_or(&[]);
            if next >= deps.len() {
                colors.insert(node, Color::Black);
                stack.pop();
                path.pop();
                continue;
            }
            let dep = &deps[next];
            // Unknown IDs are leaves: nothing to follow.
            let Some(color) = colors.get(dep).copied() else {
                continue;
            };
            match color {
                Color::Gray => {
                    let start = path.iter().position(|id| *id == dep).unwrap_or_default();
                    let mut cycle: Vec<ItemId> =
                        path[start..].iter().map(|id| (*id).clone()).collect();
                    cycle.push(dep.clone());
                    let cycle_length = cycle.len() - 1;
                    return Err(CircularDependency {
                        task_id: Some(node.clone()),
                        cycle_path: cycle,
                        cycle_length,
                    });
                }
                Color::White => {
                    colors.insert(dep, Color::Gray);
                    // Borrow through the graph key so lifetimes line up.
                    if let Some((&key, _)) = graph.get_key_value(dep) {
                        stack.push((key, 0));
                        path.push(key);
                    }
                }
                Color::Black => {}
            }
        }
    }

    // 3. Informational: prerequisite chain depth (acyclic by now, so the
    // memoized recurrence terminates).
    let mut depth: FxHashMap<&ItemId, usize> = FxHashMap::default();
    let mut deepest: FxHashMap<&ItemId, &ItemId> = FxHashMap::default();
    fn chain_depth<'a>(
        node: &'a ItemId,
        graph: &FxHashMap<&'a ItemId, &'a [ItemId]>,
        depth: &mut FxHashMap<&'a ItemId, usize>,
        deepest: &mut FxHashMap<&'a ItemId, &'a ItemId>,
    ) -> usize {
        if let Some(d) = depth.get(node) {
            return *d;
        }
        let mut best = 0;
        if let Some(deps) = graph.get(node) {
            for dep in deps.iter() {
                let Some((&key, _)) = graph.get_key_value(dep) else {
                    continue;
                };
                let d = chain_depth(key, graph, depth, deepest) + 1;
                if d > best {
                    best = d;
                    deepest.insert(node, key);
                }
            }
        }
        depth.insert(node, best);
        best
    }

    let mut report = DependencyReport::default();
    for &id in &order {
        let d = chain_depth(id, &graph, &mut depth, &mut deepest);
        report.max_depth = report.max_depth.max(d);
        if d > threshold {
            let mut chain = vec![id.clone()];
            let mut cursor = id;
            while let Some(&next) = deepest.get(cursor) {
                chain.push(next.clone());
                cursor = next;
            }
            warn!(
                subtask = %id,
                depth = d,
                threshold,
                "dependency chain exceeds threshold"
            );
            report.long_chains.push(chain);
        }
    }
    report
        .long_chains
        .sort_by_key(|chain| std::cmp::Reverse(chain.len()));
    Ok(report)
}
