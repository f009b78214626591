//! The builtin (native) function registry: the fixed set of calls a script
//! can make inside `(...)`.
//!
//! Grounded in the teacher's `commands::registry::CommandRegistry` /
//! `commands::types::Command` pair (`name()` plus an `execute`-style method,
//! looked up by name out of a `HashMap`), generalized here for the
//! synchronous, single-threaded evaluator this crate has instead of the
//! teacher's async command dispatch — script evaluation never needs to
//! await anything, so the registry holds plain `dyn NativeFunction` objects
//! rather than the teacher's `async_trait` commands.

mod functions;
mod touch_node;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use crate::graph::node::Node;
use crate::scope::Scope;

/// The registered surface a builtin call can invoke. Mirrors
/// `original_source/jjmake/parsercontext.hpp`'s `NativeFunction` interface:
/// a name, an `alwaysEvalArguments` flag, an `evalNextArgument` predicate
/// consulted only when that flag is false, and the call itself.
pub trait NativeFunction: Send + Sync {
    fn name(&self) -> &'static str;

    /// When true (the default), every argument is evaluated before `call`
    /// runs. `if` overrides this to implement short-circuiting.
    fn always_eval_arguments(&self) -> bool {
        true
    }

    /// Consulted only when `always_eval_arguments()` is false, once per
    /// argument position, before that argument's text is scanned.
    /// `args_so_far` holds the additional arguments (excluding the function
    /// name) evaluated so far; its length is the 0-based index of the
    /// argument about to be considered. Returning `false` still requires the
    /// argument's source text to be scanned for syntax, just without
    /// executing any nested builtin calls within it.
    fn eval_next_argument(&self, _args_so_far: &[String]) -> bool {
        true
    }

    /// Run the call. `args` holds the additional arguments (the function
    /// name is not included). Returns the ordered result strings that get
    /// spliced into the enclosing argument stream, or an error message
    /// (without location — the evaluator attaches file/line/column).
    ///
    /// Takes `&self`/`&BuiltinContext` rather than mutable references: every
    /// field a builtin can mutate (the scope, the node list, the print
    /// buffer) is itself interior-mutable, which is what lets `include`
    /// call back into the evaluator that is, dynamically, already on the
    /// call stack invoking this very function, without the aliasing
    /// conflicts a `&mut` thread-through would hit.
    fn call(&self, args: &[String], ctx: &BuiltinContext) -> Result<Vec<String>, String>;
}

/// Recursively evaluate an included file's contents in the current scope.
/// Implemented by the evaluator; injected here so `builtins` does not need
/// to depend on `eval` (which depends on `builtins` for dispatch).
pub trait Includer {
    fn include(&self, scope: &Scope, contents: &str, file_label: &str) -> Result<(), String>;
}

/// Everything a builtin needs to do its work: the current scope (for
/// `.PWD`/`.FILE` and `get`/`set`), somewhere to write `print` output, the
/// shared node collection `touch-node` appends to, and the recursive
/// evaluation hook `include` uses.
pub struct BuiltinContext<'a> {
    pub scope: Scope,
    pub stdout: &'a RefCell<String>,
    pub nodes: &'a RefCell<Vec<Node>>,
    pub includer: &'a dyn Includer,
}

impl<'a> BuiltinContext<'a> {
    pub fn pwd(&self) -> String {
        self.scope
            .get(".PWD")
            .map(|v| v.first_or_empty().to_string())
            .unwrap_or_default()
    }

    pub fn read_file(&self, path: &Path) -> Result<String, String> {
        std::fs::read_to_string(path)
            .map_err(|e| format!("unable to open file \"{}\". Cause:\n{}", path.display(), e))
    }
}

#[derive(Default)]
pub struct Registry {
    functions: HashMap<&'static str, Box<dyn NativeFunction>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// The registry every driver constructs: all 13 builtins from the
    /// contract, matching
    /// `original_source/jjmake/corefunctions.cpp::registerBuiltInFunctions`'s
    /// list exactly.
    pub fn with_standard_builtins() -> Self {
        let mut r = Registry::new();
        r.register(Box::new(functions::Add));
        r.register(Box::new(functions::Eq { negate: false }));
        r.register(Box::new(functions::EquAlias));
        r.register(Box::new(functions::Eq { negate: true }));
        r.register(Box::new(functions::Get));
        r.register(Box::new(functions::GetAt));
        r.register(Box::new(functions::GetStar));
        r.register(Box::new(functions::If));
        r.register(Box::new(functions::Include));
        r.register(Box::new(functions::Print));
        r.register(Box::new(functions::Set));
        r.register(Box::new(functions::Seta));
        r.register(Box::new(touch_node::TouchNodeFn));
        r
    }

    pub fn register(&mut self, f: Box<dyn NativeFunction>) {
        let name = f.name();
        if self.functions.insert(name, f).is_some() {
            panic!("native function \"{name}\" registered twice");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn NativeFunction> {
        self.functions.get(name).map(|b| b.as_ref())
    }
}
