//! Dependency resolution: deterministic start/stop ordering.
//!
//! A cyclic dependency map is a fatal configuration error, surfaced before
//! any service starts; no partial order is ever returned.

use std::collections::HashMap;

use crate::errors::{OrchestratorError, Result};

/// DFS visit state. Unvisited names are simply absent from the mark map.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// Currently on the DFS stack; revisiting means a cycle.
    InProgress,
    Done,
}

/// Get the order in which services should be started (dependencies first).
///
/// Deterministic for a fixed input: roots and dependency edges are visited
/// in sorted name order. Every service appears strictly after all of its
/// transitive dependencies.
pub fn get_start_order(dependencies: &HashMap<String, Vec<String>>) -> Result<Vec<String>> {
    // Validate edges up front so a missing name is reported as such rather
    // than surfacing as a half-finished traversal.
    for (name, deps) in dependencies {
        for dep in deps {
            if !dependencies.contains_key(dep) {
                return Err(OrchestratorError::MissingDependency {
                    service: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut roots: Vec<&String> = dependencies.keys().collect();
    roots.sort();

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(dependencies.len());

    for root in roots {
        visit(root, dependencies, &mut marks, &mut order)?;
    }

    Ok(order)
}

/// Get the order in which services should be stopped: the exact reverse of
/// the start order, so dependents stop before their dependencies.
pub fn get_stop_order(dependencies: &HashMap<String, Vec<String>>) -> Result<Vec<String>> {
    let mut order = get_start_order(dependencies)?;
    order.reverse();
    Ok(order)
}

fn visit<'a>(
    name: &'a str,
    dependencies: &'a HashMap<String, Vec<String>>,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
) -> Result<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            return Err(OrchestratorError::DependencyCycle(name.to_string()));
        }
        None => {}
    }

    marks.insert(name, Mark::InProgress);

    if let Some(deps) = dependencies.get(name) {
        let mut deps: Vec<&String> = deps.iter().collect();
        deps.sort();
        for dep in deps {
            visit(dep, dependencies, marks, order)?;
        }
    }

    marks.insert(name, Mark::Done);
    order.push(name.to_string());
    Ok(())
}
