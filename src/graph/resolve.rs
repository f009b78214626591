//! Turns the flat set of nodes a script's `touch-node` calls produced into a
//! resolved dependency graph: wiring dependency/dependent edges, activating
//! the transitive closure the requested goals need, and detecting cycles
//! before any worker thread is spawned.
//!
//! `original_source/jjmake/jjmakecontext.hpp` names the `DependencyMode`
//! enum (`NoDependencies`, `AllDependencies`, `AllDependants`) this module
//! implements, but the fragment of the original source kept in the retrieval
//! pack stops at `eval()` and does not include `taskdag.cpp`'s activation
//! logic. The interpretation below is this crate's own decision, recorded in
//! DESIGN.md: `None` activates exactly the goal nodes; `AllDependencies`
//! activates goals plus their transitive dependency closure (the ordinary
//! "build what's needed" behavior); `AllDependants` additionally activates
//! every node that transitively depends on a goal, so that changing a goal's
//! inputs also rebuilds everything downstream of it.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::error::GraphError;
use crate::graph::node::{Node, NodeId};
use crate::stat::{self, FileKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyMode {
    None,
    AllDependencies,
    AllDependants,
}

pub struct Graph {
    pub nodes: Vec<Node>,
}

impl Graph {
    /// Resolve dependency/dependent edges from each node's declared
    /// input/output paths, reject duplicate producers, activate the closure
    /// `goals` and `mode` call for, and check for cycles among the
    /// activated set. On success every activated node's
    /// `outstanding_prereqs` is initialized to its in-graph dependency
    /// count.
    pub fn resolve(
        mut nodes: Vec<Node>,
        goals: &[PathBuf],
        mode: DependencyMode,
    ) -> Result<Graph, GraphError> {
        let output_index = build_output_index(&nodes)?;
        wire_edges(&mut nodes, &output_index)?;

        let goal_ids = resolve_goals(&nodes, &output_index, goals)?;
        let activated = activate(&nodes, &goal_ids, mode);
        for id in &activated {
            nodes[id.0].activated = true;
        }
        check_cycle(&nodes, &activated)?;

        let activated_set: HashSet<NodeId> = activated.iter().copied().collect();
        for id in &activated {
            let deps = nodes[id.0].dependencies.clone();
            let count = deps.iter().filter(|d| activated_set.contains(d)).count() as i64;
            nodes[id.0].outstanding_prereqs = count;
        }

        Ok(Graph { nodes })
    }

    pub fn activated_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.activated)
            .map(|(i, _)| NodeId(i))
            .collect()
    }
}

fn build_output_index(nodes: &[Node]) -> Result<HashMap<PathBuf, NodeId>, GraphError> {
    let mut index = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        for output in &node.outputs {
            if let Some(existing) = index.insert(output.clone(), NodeId(i)) {
                let existing_goal = nodes[existing.0].goal_name.clone();
                return Err(GraphError::DuplicateProducer {
                    path: output.display().to_string(),
                    first_goal: existing_goal,
                    second_goal: node.goal_name.clone(),
                });
            }
        }
    }
    Ok(index)
}

/// Wire dependency/dependent edges for every input that names another
/// node's output. An input that names neither a producer nor an existing
/// path on disk can never be satisfied, so it is reported here rather than
/// silently treated as an external source.
fn wire_edges(nodes: &mut [Node], output_index: &HashMap<PathBuf, NodeId>) -> Result<(), GraphError> {
    let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        for input in &node.inputs {
            match output_index.get(input) {
                Some(&producer) => {
                    if producer.0 != i {
                        edges.push((NodeId(i), producer));
                    }
                }
                None => {
                    let exists = matches!(stat::stat(input), Ok(s) if s.kind != FileKind::NoExist);
                    if !exists {
                        return Err(GraphError::MissingInput {
                            path: input.display().to_string(),
                            goal_name: node.goal_name.clone(),
                        });
                    }
                }
            }
        }
    }
    for (dependent, dependency) in edges {
        if !nodes[dependent.0].dependencies.contains(&dependency) {
            nodes[dependent.0].dependencies.push(dependency);
        }
        if !nodes[dependency.0].dependents.contains(&dependent) {
            nodes[dependency.0].dependents.push(dependent);
        }
    }
    Ok(())
}

fn resolve_goals(
    nodes: &[Node],
    output_index: &HashMap<PathBuf, NodeId>,
    goals: &[PathBuf],
) -> Result<Vec<NodeId>, GraphError> {
    let mut ids = Vec::with_capacity(goals.len());
    for goal in goals {
        match output_index.get(goal) {
            Some(&id) => ids.push(id),
            None => return Err(GraphError::UnknownGoal(goal.display().to_string())),
        }
    }
    let _ = nodes;
    Ok(ids)
}

fn activate(nodes: &[Node], goal_ids: &[NodeId], mode: DependencyMode) -> Vec<NodeId> {
    let mut activated: HashSet<NodeId> = goal_ids.iter().copied().collect();
    match mode {
        DependencyMode::None => {}
        DependencyMode::AllDependencies => {
            let mut stack: Vec<NodeId> = goal_ids.to_vec();
            while let Some(id) = stack.pop() {
                for dep in &nodes[id.0].dependencies {
                    if activated.insert(*dep) {
                        stack.push(*dep);
                    }
                }
            }
        }
        DependencyMode::AllDependants => {
            let mut stack: Vec<NodeId> = goal_ids.to_vec();
            while let Some(id) = stack.pop() {
                for dep in &nodes[id.0].dependencies {
                    if activated.insert(*dep) {
                        stack.push(*dep);
                    }
                }
            }
            let mut stack: Vec<NodeId> = goal_ids.to_vec();
            while let Some(id) = stack.pop() {
                for dependent in &nodes[id.0].dependents {
                    if activated.insert(*dependent) {
                        stack.push(*dependent);
                    }
                }
            }
        }
    }
    activated.into_iter().collect()
}

fn check_cycle(nodes: &[Node], activated: &[NodeId]) -> Result<(), GraphError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }
    let mut marks = vec![Mark::Unvisited; nodes.len()];

    fn visit(
        id: NodeId,
        nodes: &[Node],
        marks: &mut [Mark],
    ) -> Result<(), GraphError> {
        match marks[id.0] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let path = nodes[id.0]
                    .outputs
                    .first()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| nodes[id.0].goal_name.clone());
                return Err(GraphError::Cycle(path));
            }
            Mark::Unvisited => {}
        }
        marks[id.0] = Mark::InProgress;
        for dep in &nodes[id.0].dependencies {
            visit(*dep, nodes, marks)?;
        }
        marks[id.0] = Mark::Done;
        Ok(())
    }

    for id in activated {
        visit(*id, nodes, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NoopAction;

    fn node(goal: &str, inputs: &[&str], outputs: &[&str]) -> Node {
        Node::new(
            goal,
            inputs.iter().map(PathBuf::from).collect(),
            outputs.iter().map(PathBuf::from).collect(),
            Box::new(NoopAction),
        )
    }

    #[test]
    fn duplicate_producer_is_rejected() {
        let nodes = vec![
            node("a", &[], &["/out/x"]),
            node("b", &[], &["/out/x"]),
        ];
        let err = Graph::resolve(nodes, &[PathBuf::from("/out/x")], DependencyMode::None)
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateProducer { .. }));
    }

    #[test]
    fn all_dependencies_activates_transitive_closure() {
        let nodes = vec![
            node("leaf", &[], &["/out/leaf"]),
            node("mid", &["/out/leaf"], &["/out/mid"]),
            node("top", &["/out/mid"], &["/out/top"]),
        ];
        let graph = Graph::resolve(
            nodes,
            &[PathBuf::from("/out/top")],
            DependencyMode::AllDependencies,
        )
        .unwrap();
        assert_eq!(graph.activated_ids().len(), 3);
    }

    #[test]
    fn none_mode_activates_only_goals() {
        let nodes = vec![
            node("leaf", &[], &["/out/leaf"]),
            node("top", &["/out/leaf"], &["/out/top"]),
        ];
        let graph =
            Graph::resolve(nodes, &[PathBuf::from("/out/top")], DependencyMode::None).unwrap();
        assert_eq!(graph.activated_ids().len(), 1);
    }

    #[test]
    fn cycle_is_detected() {
        let mut nodes = vec![node("a", &[], &["/out/a"]), node("b", &[], &["/out/b"])];
        nodes[0].inputs.push(PathBuf::from("/out/b"));
        nodes[1].inputs.push(PathBuf::from("/out/a"));
        let err = Graph::resolve(
            nodes,
            &[PathBuf::from("/out/a")],
            DependencyMode::AllDependencies,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
    }

    #[test]
    fn unknown_goal_is_an_error() {
        let nodes = vec![node("a", &[], &["/out/a"])];
        let err = Graph::resolve(nodes, &[PathBuf::from("/out/missing")], DependencyMode::None)
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownGoal(_)));
    }

    #[test]
    fn dangling_input_with_no_producer_and_no_disk_file_is_an_error() {
        let nodes = vec![node(
            "a",
            &["/definitely/does/not/exist/on/this/machine"],
            &["/out/a"],
        )];
        let err = Graph::resolve(nodes, &[PathBuf::from("/out/a")], DependencyMode::None)
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingInput { .. }));
    }

    #[test]
    fn input_with_no_producer_but_present_on_disk_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("source.txt");
        std::fs::write(&existing, b"hello").unwrap();
        let existing_str = existing.to_str().unwrap();
        let nodes = vec![node("a", &[existing_str], &["/out/a"])];
        let graph =
            Graph::resolve(nodes, &[PathBuf::from("/out/a")], DependencyMode::None).unwrap();
        assert_eq!(graph.activated_ids().len(), 1);
    }
}
