//! The artifact dependency graph and its ready-set iterator.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::PlanningError;

/// Directed acyclic graph of artifact dependencies.
///
/// Nodes are artifact ids; edges run from dependency to dependent. Both
/// adjacency directions are materialised at construction so dependency and
/// dependent lookups are constant-time map reads.
#[derive(Debug, Clone)]
pub struct ExecutionDAG {
    dependencies: BTreeMap<String, BTreeSet<String>>,
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl ExecutionDAG {
    /// Build from a `node -> dependencies` map.
    ///
    /// Every referenced dependency must itself be a node.
    pub fn new(dependencies: BTreeMap<String, BTreeSet<String>>) -> Result<Self, PlanningError> {
        let mut dependents: BTreeMap<String, BTreeSet<String>> = dependencies
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();

        for (node, deps) in &dependencies {
            for dep in deps {
                if !dependencies.contains_key(dep) {
                    return Err(PlanningError::UnknownInput {
                        artifact_id: node.clone(),
                        input_id: dep.clone(),
                    });
                }
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(node.clone());
            }
        }

        Ok(Self {
            dependencies,
            dependents,
        })
    }

    /// All artifact ids in the graph.
    #[must_use]
    pub fn node_ids(&self) -> BTreeSet<String> {
        self.dependencies.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Direct dependencies of an artifact.
    #[must_use]
    pub fn get_dependencies(&self, id: &str) -> BTreeSet<String> {
        self.dependencies.get(id).cloned().unwrap_or_default()
    }

    /// Direct dependents of an artifact.
    #[must_use]
    pub fn get_dependents(&self, id: &str) -> BTreeSet<String> {
        self.dependents.get(id).cloned().unwrap_or_default()
    }

    /// Every transitive dependent of an artifact (the artifact excluded).
    #[must_use]
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<String> = self.get_dependents(id).into_iter().collect();

        while let Some(node) = queue.pop_front() {
            if seen.insert(node.clone()) {
                queue.extend(self.get_dependents(&node));
            }
        }
        seen
    }

    /// Detect cycles with Kahn's algorithm, fail-fast.
    ///
    /// On failure, the unresolvable nodes (the cycle participants and
    /// anything downstream of them) are named in the error.
    pub fn validate(&self) -> Result<(), PlanningError> {
        let mut in_degree: HashMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.len()))
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut resolved = 0usize;
        while let Some(node) = queue.pop_front() {
            resolved += 1;
            if let Some(dependents) = self.dependents.get(node) {
                for dependent in dependents {
                    let degree = in_degree
                        .get_mut(dependent.as_str())
                        .expect("dependent is a node");
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if resolved == self.dependencies.len() {
            Ok(())
        } else {
            let nodes: Vec<String> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(id, _)| (*id).to_string())
                .collect();
            let mut nodes = nodes;
            nodes.sort();
            Err(PlanningError::CycleDetected { nodes })
        }
    }

    /// A prepared topological iterator over the graph.
    #[must_use]
    pub fn sorter(&self) -> ReadySorter {
        let remaining_deps: HashMap<String, usize> = self
            .dependencies
            .iter()
            .map(|(id, deps)| (id.clone(), deps.len()))
            .collect();

        let ready: BTreeSet<String> = remaining_deps
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| id.clone())
            .collect();

        ReadySorter {
            dependents: self.dependents.clone(),
            remaining_deps,
            ready,
            finished: HashSet::new(),
            total: self.dependencies.len(),
        }
    }
}

/// Incremental ready-set iterator over an [`ExecutionDAG`].
///
/// `take_ready` yields artifacts whose dependencies have all completed;
/// `done` unlocks dependents; `abandon` retires an artifact without
/// unlocking anything (used when a failure skips a subtree).
#[derive(Debug)]
pub struct ReadySorter {
    dependents: BTreeMap<String, BTreeSet<String>>,
    remaining_deps: HashMap<String, usize>,
    ready: BTreeSet<String>,
    finished: HashSet<String>,
    total: usize,
}

impl ReadySorter {
    /// Artifacts ready to run right now. Each id is yielded once.
    pub fn take_ready(&mut self) -> Vec<String> {
        let ready: Vec<String> = std::mem::take(&mut self.ready).into_iter().collect();
        ready
    }

    /// Mark an artifact complete, making dependents with no other open
    /// dependencies ready.
    pub fn done(&mut self, id: &str) {
        if !self.finished.insert(id.to_string()) {
            return;
        }
        if let Some(dependents) = self.dependents.get(id) {
            for dependent in dependents.clone() {
                if let Some(degree) = self.remaining_deps.get_mut(&dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 && !self.finished.contains(&dependent) {
                        self.ready.insert(dependent);
                    }
                }
            }
        }
    }

    /// Retire an artifact without unlocking its dependents.
    pub fn abandon(&mut self, id: &str) {
        self.finished.insert(id.to_string());
        self.ready.remove(id);
    }

    /// Whether unfinished artifacts remain.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.finished.len() < self.total
    }
}
