//! `ParserContext`: the scope-plus-evaluator pair a driver hands one script
//! to evaluate.
//!
//! Grounded in `original_source/jjmake/parsercontext.hpp`, whose
//! `ParserContext` bundles exactly this pair (a `variables` scope and the
//! machinery to evaluate script text against it) and exposes `split()` for
//! the scheduler to use when handing a sub-frame scope to work that must
//! not see the caller's later local variables. Here the "machinery" is
//! [`crate::eval::Evaluator`], held by reference since it is shared,
//! interior-mutable state (see `builtins`'s module doc for why).

use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::scope::Scope;

pub struct ParserContext<'a> {
    pub scope: Scope,
    evaluator: &'a Evaluator<'a>,
}

impl<'a> ParserContext<'a> {
    pub fn new(scope: Scope, evaluator: &'a Evaluator<'a>) -> Self {
        ParserContext { scope, evaluator }
    }

    /// Evaluate `contents` (labeled `file` for diagnostics) against this
    /// context's scope.
    pub fn eval(&self, file: &str, contents: &str) -> Result<(), EvalError> {
        self.evaluator.eval(&self.scope, file, contents)
    }

    /// `ParserContext::split()`: produce a `(parent, child)` scope pair from
    /// this context's current scope, for callers that need to isolate a new
    /// sub-evaluation's local variables from whatever runs after it.
    pub fn split(&self) -> (Scope, Scope) {
        self.scope.split()
    }
}
