//! Task dependency graph.
//!
//! `dependsOn` lists are resolved once, at load time, into a single run order.
//! Independent tasks keep their declaration order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::TaskConfig;
use crate::error::{ConfigError, Result};

/// Resolve the order tasks run in during startup.
///
/// Returns indices into `tasks`. Every task appears after all of its
/// dependencies; ties are broken by declaration order.
///
/// # Errors
///
/// - [`ConfigError::UnknownTask`] if a dependency names no task
/// - [`ConfigError::DependencyCycle`] if the dependencies form a cycle
pub fn resolve_run_order(tasks: &[TaskConfig]) -> Result<Vec<usize>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(tasks.len(), tasks.len());
    let nodes: Vec<NodeIndex> = (0..tasks.len()).map(|i| graph.add_node(i)).collect();

    let by_name: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| (task.name.as_str(), i))
        .collect();

    for (i, task) in tasks.iter().enumerate() {
        for dependency in &task.depends_on {
            let &dep = by_name
                .get(dependency.as_str())
                .ok_or_else(|| ConfigError::UnknownTask {
                    task: task.name.clone(),
                    dependency: dependency.clone(),
                })?;
            graph.update_edge(nodes[dep], nodes[i], ());
        }
    }

    if let Some(cycle) = find_cycle(&graph, tasks) {
        return Err(ConfigError::DependencyCycle { cycle });
    }

    // Kahn's algorithm with a min-heap keyed by declaration index
    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(tasks.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for next in graph.neighbors_directed(nodes[i], Direction::Outgoing) {
            let j = graph[next];
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.push(Reverse(j));
            }
        }
    }

    Ok(order)
}

fn find_cycle(graph: &DiGraph<usize, ()>, tasks: &[TaskConfig]) -> Option<String> {
    for component in tarjan_scc(graph) {
        let self_loop = component.len() == 1 && graph.contains_edge(component[0], component[0]);
        if component.len() > 1 || self_loop {
            let mut names: Vec<&str> = component
                .iter()
                .map(|&n| tasks[graph[n]].name.as_str())
                .collect();
            names.sort_unstable();
            let first = names[0];
            names.push(first);
            return Some(names.join(" -> "));
        }
    }
    None
}
