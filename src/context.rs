//! `JjmakeContext`: the top-level object a `main` wires a parsed
//! [`crate::driver::Arguments`] into. Owns the registry, the root scope, the
//! in-memory `print` buffer, and the node list the script's `touch-node`
//! calls populate; drives evaluation, graph resolution, and scheduling in
//! that order and reports a process exit code.
//!
//! Grounded in `original_source/jjmake/jjmakecontext.hpp`/`.cpp`, whose
//! `JjmakeContext` owns exactly this set of things (a `ParserContext`, the
//! node list, the `DependencyMode`) and exposes the same eval-then-build
//! pipeline, and in the teacher's `Bash`/`BashOptions` pairing of "parsed
//! options struct" with "thing that runs them".

use std::cell::RefCell;
use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use crate::builtins::Registry;
use crate::driver::Arguments;
use crate::error::JjmakeError;
use crate::eval::Evaluator;
use crate::graph::node::Node;
use crate::graph::resolve::Graph;
use crate::graph::scheduler;
use crate::parser_context::ParserContext;
use crate::path_util::join_under_pwd;
use crate::scope::Scope;
use crate::value::Value;

pub struct JjmakeContext {
    registry: Registry,
    scope: Scope,
    stdout: RefCell<String>,
    nodes: RefCell<Vec<Node>>,
}

impl JjmakeContext {
    pub fn new(pwd: PathBuf) -> Self {
        let scope = Scope::root();
        scope.set(".PWD", Value::single(pwd.display().to_string()));
        JjmakeContext {
            registry: Registry::with_standard_builtins(),
            scope,
            stdout: RefCell::new(String::new()),
            nodes: RefCell::new(Vec::new()),
        }
    }

    /// Evaluate the prelude script `arguments` assembles, resolve the
    /// requested goals into a graph, and either print or execute it.
    /// Returns the process exit code: `0` on full success, `1` if any node
    /// failed (or `-P` was not given and nothing was requested), matching
    /// `main.cpp`'s exit-status contract.
    #[instrument(skip_all)]
    pub fn run(&self, arguments: &Arguments) -> Result<i32, JjmakeError> {
        let prelude = arguments
            .build_prelude()
            .map_err(JjmakeError::Cli)?;

        let evaluator = Evaluator::new(&self.registry, &self.stdout, &self.nodes);
        let parser_context = ParserContext::new(self.scope.clone(), &evaluator);
        debug!(bytes = prelude.len(), "evaluating synthesized prelude");
        parser_context.eval("<command-line>", &prelude)?;

        print!("{}", self.stdout.borrow());

        let pwd = self.scope.get(".PWD").map(|v| v.first_or_empty().to_string()).unwrap_or_default();
        let goal_paths: Vec<PathBuf> = arguments
            .all_goals()
            .iter()
            .map(|g| join_under_pwd(&pwd, g))
            .collect();

        let nodes = self.nodes.take();
        info!(node_count = nodes.len(), goal_count = goal_paths.len(), "resolving build graph");
        let graph = Graph::resolve(nodes, &goal_paths, arguments.dependency_mode.into())?;

        if arguments.just_print {
            for id in graph.activated_ids() {
                println!("{}", graph.nodes[id.0].goal_name);
            }
            return Ok(0);
        }

        let threads = arguments.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let report = scheduler::run(&graph, threads, arguments.always_make, arguments.keep_going);
        for failure in &report.failures {
            warn!(goal = %failure.goal_name, error = %failure.error, "node failed");
            eprintln!("jjmake: failed to build \"{}\": {}", failure.goal_name, failure.error);
        }
        for goal in &report.skipped_goals {
            warn!(goal = %goal, "skipped: a dependency failed");
            eprintln!("jjmake: skipping \"{goal}\": a dependency failed to build");
        }
        Ok(if report.failures.is_empty() { 0 } else { 1 })
    }
}
