//! Build graph nodes.
//!
//! Grounded in `original_source/jjmake/node.hpp`/`node.cpp`: a `Node` owns a
//! goal name, absolute input/output paths, an opaque action, and the
//! dependency bookkeeping the scheduler mutates. `node.cpp`'s constructor
//! asserts every path is absolute via `JFATAL`; here that is an
//! [`crate::error::internal_error`] call, since by construction every path
//! reaching a `Node` has already been resolved against `.PWD` by the
//! `touch-node` builtin.

use std::path::PathBuf;

use crate::error::{internal_error, ActionError};

/// One buildable thing: an action that, when run, is expected to bring
/// `outputs` up to date with respect to `inputs`. `always_make` mirrors the
/// `-A`/`--always-make` CLI flag: when true, the action must treat the
/// output as stale regardless of what mtime comparison would otherwise say.
pub trait Action: Send + Sync {
    fn execute(
        &self,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        always_make: bool,
    ) -> Result<(), ActionError>;
}

/// A no-op action for nodes that exist purely to express grouping (not part
/// of the public builtin surface, but kept as the natural identity action
/// for internal bookkeeping/tests).
pub struct NoopAction;

impl Action for NoopAction {
    fn execute(
        &self,
        _inputs: &[PathBuf],
        _outputs: &[PathBuf],
        _always_make: bool,
    ) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Opaque index into a [`crate::graph::Graph`]'s node vector. Cheap, `Copy`,
/// and stable for the lifetime of one graph resolution pass — the Rust
/// analogue of the original's raw `Node*` identity without unsafe aliasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

pub struct Node {
    pub goal_name: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub action: Box<dyn Action>,
    pub dependencies: Vec<NodeId>,
    pub dependents: Vec<NodeId>,
    pub outstanding_prereqs: i64,
    pub activated: bool,
}

impl Node {
    pub fn new(
        goal_name: impl Into<String>,
        inputs: Vec<PathBuf>,
        outputs: Vec<PathBuf>,
        action: Box<dyn Action>,
    ) -> Self {
        for p in inputs.iter().chain(outputs.iter()) {
            if !p.is_absolute() {
                internal_error(format!(
                    "node path \"{}\" is not absolute",
                    p.display()
                ));
            }
        }
        Node {
            goal_name: goal_name.into(),
            inputs,
            outputs,
            action,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            outstanding_prereqs: 0,
            activated: false,
        }
    }
}
