use crate::{ElefantTruncateError, Result, TableName, TableSchema};
use itertools::Itertools;
use std::collections::HashMap;
use tracing::debug;

/// A table in the dependency forest. Tables reference each other by index.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub schema: TableSchema,
    /// Target tables this table references.
    pub parents: Vec<usize>,
    /// Target tables referencing this table.
    pub children: Vec<usize>,
    /// Parents whose delete removes all rows of this table. Empty unless the table is
    /// cascade covered.
    pub cascade_cover: Vec<usize>,
    /// Tables that have to be completed before this table can issue its own delete.
    pub wait_set: Vec<usize>,
}

impl DependencyNode {
    pub fn is_cascade_covered(&self) -> bool {
        !self.cascade_cover.is_empty()
    }
}

/// The foreign key relations between the target tables, resolved once before anything is deleted.
#[derive(Debug, Clone)]
pub struct DependencyForest {
    nodes: Vec<DependencyNode>,
}

struct Edge {
    parent: usize,
    cascade: bool,
}

impl DependencyForest {
    /// Links the tables to each other.
    ///
    /// References to tables outside of the set and references of a table to itself are ignored.
    /// When `cascade_enabled` is false no table is considered cascade covered, which is needed
    /// when only some rows are deleted, as the cascade of a parent then doesn't remove the same
    /// rows as the filter on the child would.
    pub fn build(schemas: Vec<TableSchema>, cascade_enabled: bool) -> Result<Self> {
        let schemas = schemas
            .into_iter()
            .unique_by(|s| s.name.clone())
            .collect_vec();

        let index: HashMap<&TableName, usize> = schemas
            .iter()
            .enumerate()
            .map(|(i, s)| (&s.name, i))
            .collect();

        let edges = schemas
            .iter()
            .map(|schema| {
                schema
                    .parents
                    .iter()
                    .filter_map(|parent| {
                        if parent.table == schema.name {
                            debug!(table = %schema.name, "Ignoring self reference");
                            return None;
                        }

                        match index.get(&parent.table) {
                            Some(&parent_index) => Some(Edge {
                                parent: parent_index,
                                cascade: parent.on_delete_cascade,
                            }),
                            None => {
                                debug!(table = %schema.name, parent = %parent.table, "Ignoring reference to table outside of the deleted set");
                                None
                            }
                        }
                    })
                    .collect_vec()
            })
            .collect_vec();

        let mut children = vec![Vec::new(); schemas.len()];
        for (child, child_edges) in edges.iter().enumerate() {
            for edge in child_edges {
                children[edge.parent].push(child);
            }
        }

        let parents = edges
            .iter()
            .map(|e| e.iter().map(|e| e.parent).collect_vec())
            .collect_vec();

        if let Some(cycle) = find_cycle(&parents) {
            return Err(ElefantTruncateError::DependencyCycle(
                cycle.iter().map(|&i| schemas[i].name.to_string()).collect(),
            ));
        }

        let cascade_cover = edges
            .iter()
            .map(|e| {
                if cascade_enabled && !e.is_empty() && e.iter().all(|e| e.cascade) {
                    e.iter().map(|e| e.parent).collect_vec()
                } else {
                    vec![]
                }
            })
            .collect_vec();

        let mut wait_sets: Vec<Option<Vec<usize>>> = vec![None; schemas.len()];
        for i in 0..schemas.len() {
            resolve_wait_set(i, &children, &cascade_cover, &mut wait_sets);
        }

        let nodes = schemas
            .into_iter()
            .zip(parents)
            .zip(children)
            .zip(cascade_cover)
            .zip(wait_sets)
            .map(
                |((((schema, parents), children), cascade_cover), wait_set)| DependencyNode {
                    schema,
                    parents,
                    children,
                    cascade_cover,
                    wait_set: wait_set.unwrap_or_default(),
                },
            )
            .collect();

        Ok(DependencyForest { nodes })
    }

    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &DependencyNode {
        &self.nodes[index]
    }
}

/// Collects the tables that have to be completed before `index` can delete. A cascade covered
/// child is removed by our own delete, so it is not waited for, but its own children still are.
fn resolve_wait_set(
    index: usize,
    children: &[Vec<usize>],
    cascade_cover: &[Vec<usize>],
    wait_sets: &mut [Option<Vec<usize>>],
) -> Vec<usize> {
    if let Some(resolved) = &wait_sets[index] {
        return resolved.clone();
    }

    let mut wait_set = Vec::new();
    for &child in &children[index] {
        if cascade_cover[child].is_empty() {
            wait_set.push(child);
        } else {
            wait_set.extend(resolve_wait_set(child, children, cascade_cover, wait_sets));
        }
    }

    let wait_set = wait_set.into_iter().sorted().dedup().collect_vec();
    wait_sets[index] = Some(wait_set.clone());
    wait_set
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Visit {
    New,
    InProgress,
    Done,
}

/// Depth first search along the parent references. Returns the tables on the first cycle found.
fn find_cycle(parents: &[Vec<usize>]) -> Option<Vec<usize>> {
    fn visit(
        index: usize,
        parents: &[Vec<usize>],
        visits: &mut [Visit],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        visits[index] = Visit::InProgress;
        path.push(index);

        for &parent in &parents[index] {
            match visits[parent] {
                Visit::InProgress => {
                    let start = path.iter().position(|&p| p == parent).unwrap_or(0);
                    return Some(path[start..].to_vec());
                }
                Visit::New => {
                    if let Some(cycle) = visit(parent, parents, visits, path) {
                        return Some(cycle);
                    }
                }
                Visit::Done => {}
            }
        }

        path.pop();
        visits[index] = Visit::Done;
        None
    }

    let mut visits = vec![Visit::New; parents.len()];
    let mut path = Vec::new();

    for index in 0..parents.len() {
        if visits[index] == Visit::New {
            if let Some(cycle) = visit(index, parents, &mut visits, &mut path) {
                return Some(cycle);
            }
        }
    }

    None
}
