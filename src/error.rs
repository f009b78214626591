//! Error types for script evaluation, graph resolution, and node actions.
//!
//! Modeled on the teacher's `interpreter::errors` module (a unified enum with
//! per-kind variants and `From` impls), but authored with `thiserror` rather
//! than hand-written `Display` bodies, since none of these errors carry the
//! control-flow-with-attached-output shape bash's `break`/`continue`/`return`
//! need.

use std::fmt;

use crate::source::SourcePosition;

/// A script syntax or semantic error, located at the position evaluation was
/// at when the failure occurred.
///
/// `Display` renders the `"Evaluation failure at file \"<f>\", line <l>,
/// column <c>. Cause:\n<cause>"` format from the evaluator contract: this is
/// assembled once, at the point `ParserContext::eval` gives up, not re-wrapped
/// at every frame on the way out.
#[derive(Debug, Clone, thiserror::Error)]
pub struct EvalError {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub cause: String,
}

impl EvalError {
    pub fn new(pos: &SourcePosition, file: impl Into<String>, cause: impl Into<String>) -> Self {
        EvalError {
            file: file.into(),
            line: pos.line,
            column: pos.column,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Evaluation failure at file \"{}\", line {}, column {}. Cause:\n{}",
            self.file, self.line, self.column, self.cause
        )
    }
}

/// Graph resolution failures: duplicate producers, dangling inputs, cycles.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    #[error("output \"{path}\" is produced by more than one node (first by goal \"{first_goal}\", again by goal \"{second_goal}\")")]
    DuplicateProducer {
        path: String,
        first_goal: String,
        second_goal: String,
    },
    #[error("goal \"{0}\" does not name any known node output")]
    UnknownGoal(String),
    #[error("dependency cycle detected, involving output \"{0}\"")]
    Cycle(String),
    #[error("input \"{path}\" needed by goal \"{goal_name}\" has no producing node and does not exist on disk")]
    MissingInput { path: String, goal_name: String },
}

/// Failures raised while a node's action executes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ActionError {
    #[error("output \"{0}\" exists and is a directory, not a regular file")]
    OutputIsDirectory(String),
    #[error("output \"{0}\" exists and is neither a regular file nor a directory")]
    OutputIsOther(String),
    #[error("failed to update output \"{path}\": {cause}")]
    Io { path: String, cause: String },
}

/// An invariant the implementation believes cannot be violated was violated
/// anyway. Per the contract for this error kind, these are not propagated as
/// `Result`s; call [`internal_error`] to abort the process with a located
/// message, mirroring the original tool's `JFATAL` macro.
#[derive(Debug, Clone, thiserror::Error)]
#[error("internal invariant violated: {0}")]
pub struct InternalError(pub String);

/// Abort the process on an internal invariant violation.
///
/// This intentionally panics rather than returning a `Result`: spec kind
/// "internal invariant" is defined as "the implementation believes this
/// cannot occur", and the contract for that kind is process abort with a
/// diagnostic, not graceful propagation.
pub fn internal_error(message: impl Into<String>) -> ! {
    panic!("{}", InternalError(message.into()));
}

/// Unifies the propagating error kinds for the driver's top-level `Result`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JjmakeError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("{0}")]
    Cli(String),
}
