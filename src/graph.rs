//! Execution-order construction and cycle detection for workflow graphs.
//!
//! Two independent views of the same property live here:
//!
//! - [`execution_order`] runs Kahn's algorithm over the step/connection set
//!   and produces the sequential dispatch order the engine follows. A
//!   shortfall in extracted steps means the graph has a cycle.
//! - [`detect_cycle`] is a depth-first recursion-stack check used by the
//!   non-executing validation path. Both detectors must agree on every input.
//!
//! Connections whose endpoints are not in the step set carry no ordering
//! information and are ignored rather than rejected.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use thiserror::Error;

use crate::entities::{Connection, WorkflowStep};

/// Errors raised while building an execution graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// The connection set admits no topological order.
    ///
    /// Only the fact of the cycle is reported, not a specific path.
    #[error("circular dependency detected in workflow")]
    #[diagnostic(
        code(taskloom::graph::circular_dependency),
        help("Remove the connection that closes the loop; workflows must be acyclic.")
    )]
    CircularDependency,
}

/// Produce a total order over the given steps consistent with every
/// connection (source before target), or fail with
/// [`GraphError::CircularDependency`].
///
/// Steps with equal standing are tie-broken deterministically: the initial
/// frontier is sorted by step id, and later insertions follow connection
/// declaration order. Callers can rely on the same input producing the same
/// order.
pub fn execution_order<'a>(
    steps: &'a [WorkflowStep],
    connections: &[Connection],
) -> Result<Vec<&'a WorkflowStep>, GraphError> {
    let index: FxHashMap<&str, &WorkflowStep> =
        steps.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut dependents: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    let mut in_degree: FxHashMap<&str, usize> =
        steps.iter().map(|s| (s.id.as_str(), 0)).collect();

    for conn in connections {
        let source = conn.source_step_id.as_str();
        let target = conn.target_step_id.as_str();
        // Dangling endpoints carry no ordering information.
        if !index.contains_key(source) || !index.contains_key(target) {
            continue;
        }
        dependents.entry(source).or_default().push(target);
        if let Some(degree) = in_degree.get_mut(target) {
            *degree += 1;
        }
    }

    let mut frontier: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    frontier.sort_unstable();

    let mut queue: VecDeque<&str> = frontier.into_iter().collect();
    let mut order: Vec<&WorkflowStep> = Vec::with_capacity(steps.len());

    while let Some(current) = queue.pop_front() {
        if let Some(step) = index.get(current) {
            order.push(step);
        }
        if let Some(targets) = dependents.get(current) {
            for target in targets {
                if let Some(degree) = in_degree.get_mut(target) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(target);
                    }
                }
            }
        }
    }

    if order.len() != steps.len() {
        return Err(GraphError::CircularDependency);
    }
    Ok(order)
}

/// Check the connection set for cycles without producing an order.
///
/// Independent implementation of the property [`execution_order`] enforces,
/// used by the validation path so a broken workflow is reported without
/// running anything.
pub fn detect_cycle(steps: &[WorkflowStep], connections: &[Connection]) -> Result<(), GraphError> {
    let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for step in steps {
        adjacency.entry(step.id.as_str()).or_default();
    }
    for conn in connections {
        if let Some(targets) = adjacency.get_mut(conn.source_step_id.as_str()) {
            targets.push(conn.target_step_id.as_str());
        }
    }

    fn visit<'a>(
        node: &'a str,
        adjacency: &FxHashMap<&'a str, Vec<&'a str>>,
        visited: &mut FxHashSet<&'a str>,
        stack: &mut FxHashSet<&'a str>,
    ) -> bool {
        if stack.contains(node) {
            return true;
        }
        if visited.contains(node) {
            return false;
        }
        visited.insert(node);
        stack.insert(node);
        if let Some(neighbors) = adjacency.get(node) {
            for neighbor in neighbors {
                if visit(neighbor, adjacency, visited, stack) {
                    return true;
                }
            }
        }
        stack.remove(node);
        false
    }

    let mut visited: FxHashSet<&str> = FxHashSet::default();
    let mut stack: FxHashSet<&str> = FxHashSet::default();

    for step in steps {
        if visit(step.id.as_str(), &adjacency, &mut visited, &mut stack) {
            return Err(GraphError::CircularDependency);
        }
    }
    Ok(())
}
