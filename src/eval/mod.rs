//! The recursive-descent evaluator: turns script text into builtin calls,
//! scope mutations, and graph nodes.
//!
//! Grounded in `original_source/jjmake/parsercontext.cpp`'s `Evaluator`: a
//! single character-at-a-time scan that accumulates argument text, splices
//! in the result of any nested `(...)` call or `[if]`/`[while]` construct as
//! it goes, and invokes a builtin as soon as its closing `)` is reached.
//! That implementation keeps an explicit heap-allocated stack of `Frame`
//! objects (one per open `(`/`[if]`/`[while]`) so it can run without
//! recursing the host call stack. This crate has no reason to avoid Rust's
//! own call stack, so each of those frame kinds is instead one native
//! recursive call — `scan_call` for a `(...)` frame, `scan_if`/`scan_while`
//! for the bracket constructs. The frame *names* below mirror the original's
//! `FrameState` enum purely as documentation of which function plays which
//! role; there is no separate frame-stack data structure to keep in sync
//! with the real one (the Rust call stack).
//!
//! Two behaviors that only make sense once you've read the original's
//! `evalNextArgument` and dead-branch handling:
//!
//! - Splicing: a nested call's or construct's result is a `Vec<String>`.
//!   Zero strings contribute nothing to the enclosing argument list. One
//!   string extends whatever argument is currently being accumulated. Two
//!   or more strings end the current argument, start a new one from the
//!   second string, and so on — `splice` below is the single place that
//!   rule lives.
//! - Skip propagation: the untaken side of an `[if]`/`[else]` branch, the
//!   body of a `[while]` whose condition is false, and an argument an
//!   `if`-like lazy builtin declines via `eval_next_argument` are all still
//!   scanned character-by-character (unbalanced quotes/parens/brackets and
//!   unknown function names still fail), just with `skip = true` threaded
//!   down so no builtin in that region actually runs.

use std::cell::RefCell;

use crate::builtins::{BuiltinContext, Includer, NativeFunction, Registry};
use crate::error::EvalError;
use crate::graph::node::Node;
use crate::scope::Scope;
use crate::source::{Cursor, SourcePosition};
use crate::value::Value;

/// Owns nothing but shared/interior-mutable state, so it can hand `&self`
/// out as an [`Includer`] from inside a builtin call that is itself
/// somewhere on the call stack that owns this `Evaluator` — see
/// `builtins::mod`'s doc comment for why that rules out `&mut self` here.
pub struct Evaluator<'a> {
    registry: &'a Registry,
    stdout: &'a RefCell<String>,
    nodes: &'a RefCell<Vec<Node>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a Registry, stdout: &'a RefCell<String>, nodes: &'a RefCell<Vec<Node>>) -> Self {
        Evaluator {
            registry,
            stdout,
            nodes,
        }
    }

    /// Evaluate a whole script's top-level statements (a sequence of
    /// `(...)`/`[if]`/`[while]` forms), seeding `.FILE`/`.LINE`/`.COL` in
    /// `scope` first. Any failure is located at wherever `.LINE`/`.COL`
    /// stood when the failure was detected, matching the "Evaluation
    /// failure at file ..., line ..., column ... Cause: ..." contract.
    pub fn eval(&self, scope: &Scope, file: &str, contents: &str) -> Result<(), EvalError> {
        scope.set(".FILE", Value::single(file.to_string()));
        scope.set(".LINE", Value::single("1"));
        scope.set(".COL", Value::single("1"));
        let mut cursor = Cursor::new(contents);
        self.scan_top_level(&mut cursor, scope, false)
            .map_err(|cause| {
                let line = line_of(scope, ".LINE");
                let column = line_of(scope, ".COL");
                let file = scope
                    .get(".FILE")
                    .map(|v| v.first_or_empty().to_string())
                    .unwrap_or_default();
                EvalError::new(
                    &SourcePosition {
                        offset: 0,
                        line,
                        column,
                    },
                    file,
                    cause,
                )
            })
    }

    fn scan_top_level(&self, cur: &mut Cursor, scope: &Scope, skip: bool) -> Result<(), String> {
        loop {
            match cur.next() {
                None => return Ok(()),
                Some(c) if c.is_whitespace() => {}
                Some('#') => self.skip_comment(cur),
                Some('(') => {
                    self.scan_call(cur, scope, skip)?;
                }
                Some('[') => {
                    let kw = self.scan_bracket_keyword(cur)?;
                    self.scan_control_construct(&kw, cur, scope, skip)?;
                }
                Some(c) => {
                    set_error_pos(scope, cur.position());
                    return Err(format!(
                        "Unexpected character >>{c}<< at top level; expected '(' or '['."
                    ));
                }
            }
        }
    }

    /// The "function call" frame: `(` has already been consumed by the
    /// caller. Accumulates `name` plus additional arguments, consulting the
    /// resolved builtin's `eval_next_argument` as soon as the name is known
    /// so laziness (the `if` builtin's short-circuit) can take effect
    /// argument-by-argument rather than only all-or-nothing.
    fn scan_call(&self, cur: &mut Cursor, scope: &Scope, skip: bool) -> Result<Vec<String>, String> {
        let call_start = cur.position();
        let mut arguments: Vec<String> = Vec::new();
        let mut partial = String::new();
        let mut has_partial = false;
        let mut resolved: Option<&dyn NativeFunction> = None;
        let mut current_arg_skip = skip;

        loop {
            match cur.next() {
                None => {
                    set_error_pos(scope, cur.position());
                    return Err("Missing closing ')' before end of input.".to_string());
                }
                Some(')') => {
                    flush_partial(&mut arguments, &mut partial, &mut has_partial);
                    break;
                }
                Some(c) if c.is_whitespace() => {
                    if has_partial {
                        flush_partial(&mut arguments, &mut partial, &mut has_partial);
                        if resolved.is_none() && !arguments.is_empty() {
                            resolved = Some(self.lookup(&arguments[0], scope, call_start)?);
                        }
                        current_arg_skip = match resolved {
                            Some(f) if !f.always_eval_arguments() => {
                                skip || !f.eval_next_argument(&arguments[1..])
                            }
                            _ => skip,
                        };
                    }
                }
                Some('#') => self.skip_comment(cur),
                Some('\'') => {
                    let s = self.scan_single_quote(cur, scope)?;
                    splice(&mut arguments, &mut partial, &mut has_partial, &[s]);
                }
                Some('"') => {
                    let s = self.scan_double_quote(cur, scope)?;
                    splice(&mut arguments, &mut partial, &mut has_partial, &[s]);
                }
                Some('(') => {
                    let result = self.scan_call(cur, scope, current_arg_skip)?;
                    splice(&mut arguments, &mut partial, &mut has_partial, &result);
                }
                Some('[') => {
                    let kw = self.scan_bracket_keyword(cur)?;
                    let result = self.scan_control_construct(&kw, cur, scope, current_arg_skip)?;
                    splice(&mut arguments, &mut partial, &mut has_partial, &result);
                }
                Some(c) => {
                    partial.push(c);
                    has_partial = true;
                }
            }
        }

        if arguments.is_empty() {
            set_error_pos(scope, call_start);
            return Err("Empty function call '()'.".to_string());
        }
        if resolved.is_none() {
            resolved = Some(self.lookup(&arguments[0], scope, call_start)?);
        }
        let f = resolved.expect("just resolved or returned above");
        set_error_pos(scope, call_start);
        if skip {
            return Ok(vec![]);
        }
        let ctx = BuiltinContext {
            scope: scope.clone(),
            stdout: self.stdout,
            nodes: self.nodes,
            includer: self,
        };
        f.call(&arguments[1..], &ctx)
    }

    fn lookup(&self, name: &str, scope: &Scope, pos: SourcePosition) -> Result<&dyn NativeFunction, String> {
        match self.registry.get(name) {
            Some(f) => Ok(f),
            None => {
                set_error_pos(scope, pos);
                Err(format!("Unknown function >>({name} ...)<<."))
            }
        }
    }

    fn scan_control_construct(
        &self,
        kw: &str,
        cur: &mut Cursor,
        scope: &Scope,
        skip: bool,
    ) -> Result<Vec<String>, String> {
        match kw {
            "if" => self.scan_if(cur, scope, skip),
            "while" => self.scan_while(cur, scope, skip),
            other => {
                set_error_pos(scope, cur.position());
                Err(format!("Unexpected control keyword >>{other}<<."))
            }
        }
    }

    /// The `[if]`/`[elif]`/`[then]`/`[else]`/`[fi]` frame. Once a branch is
    /// taken, every later `elif`'s condition is scanned under `skip = true`
    /// regardless of what it would otherwise evaluate to — only the first
    /// true branch's body ever runs.
    fn scan_if(&self, cur: &mut Cursor, scope: &Scope, skip: bool) -> Result<Vec<String>, String> {
        let (_, cond_args) = self.scan_until_keyword(cur, scope, skip, &["then"])?;
        let mut branch_true = !skip && value_truth(&cond_args);
        let mut taken = false;
        let mut result = Vec::new();

        loop {
            let body_skip = skip || taken || !branch_true;
            let (kw, body_args) = self.scan_until_keyword(cur, scope, body_skip, &["elif", "else", "fi"])?;
            if branch_true && !taken {
                result = body_args;
                taken = true;
            }
            match kw.as_str() {
                "fi" => break,
                "else" => {
                    let else_skip = skip || taken;
                    let (_, else_args) = self.scan_until_keyword(cur, scope, else_skip, &["fi"])?;
                    if !taken {
                        result = else_args;
                    }
                    break;
                }
                "elif" => {
                    let cond_skip = skip || taken;
                    let (_, next_cond) = self.scan_until_keyword(cur, scope, cond_skip, &["then"])?;
                    branch_true = !cond_skip && value_truth(&next_cond);
                    continue;
                }
                _ => unreachable!("scan_until_keyword only returns a keyword from its own allow-list"),
            }
        }
        Ok(result)
    }

    /// The `[while]`/`[do]`/`[done]` frame. Rewinds to the position right
    /// after `[while]` before every re-check of the condition, the same
    /// `Cursor::move_to` primitive the original's `[done]` handling uses —
    /// re-scanning the condition (rather than caching its first result) is
    /// what lets the loop see variables the body just changed.
    fn scan_while(&self, cur: &mut Cursor, scope: &Scope, skip: bool) -> Result<Vec<String>, String> {
        let loop_start = cur.position();
        loop {
            cur.move_to(loop_start);
            let (_, cond_args) = self.scan_until_keyword(cur, scope, skip, &["do"])?;
            let cond_true = !skip && value_truth(&cond_args);
            let body_skip = skip || !cond_true;
            let (_, _body_args) = self.scan_until_keyword(cur, scope, body_skip, &["done"])?;
            if !cond_true {
                break;
            }
        }
        Ok(vec![])
    }

    /// Shared by condition and body segments of both control constructs:
    /// accumulate arguments exactly like `scan_call` does, but stop at
    /// whichever of `allowed`'s keywords is hit (instead of `)`), and return
    /// which one matched so the caller can decide what comes next.
    fn scan_until_keyword(
        &self,
        cur: &mut Cursor,
        scope: &Scope,
        skip: bool,
        allowed: &[&'static str],
    ) -> Result<(String, Vec<String>), String> {
        let mut arguments = Vec::new();
        let mut partial = String::new();
        let mut has_partial = false;

        loop {
            match cur.next() {
                None => {
                    set_error_pos(scope, cur.position());
                    return Err(format!(
                        "Missing expected {} before end of input.",
                        describe_allowed(allowed)
                    ));
                }
                Some(')') => {
                    set_error_pos(scope, cur.position());
                    return Err("Unexpected ')'.".to_string());
                }
                Some(c) if c.is_whitespace() => {
                    flush_partial(&mut arguments, &mut partial, &mut has_partial);
                }
                Some('#') => self.skip_comment(cur),
                Some('\'') => {
                    let s = self.scan_single_quote(cur, scope)?;
                    splice(&mut arguments, &mut partial, &mut has_partial, &[s]);
                }
                Some('"') => {
                    let s = self.scan_double_quote(cur, scope)?;
                    splice(&mut arguments, &mut partial, &mut has_partial, &[s]);
                }
                Some('(') => {
                    let result = self.scan_call(cur, scope, skip)?;
                    splice(&mut arguments, &mut partial, &mut has_partial, &result);
                }
                Some('[') => {
                    let kw = self.scan_bracket_keyword(cur)?;
                    if allowed.contains(&kw.as_str()) {
                        flush_partial(&mut arguments, &mut partial, &mut has_partial);
                        return Ok((kw, arguments));
                    }
                    let result = self.scan_control_construct(&kw, cur, scope, skip)?;
                    splice(&mut arguments, &mut partial, &mut has_partial, &result);
                }
                Some(c) => {
                    partial.push(c);
                    has_partial = true;
                }
            }
        }
    }

    fn scan_bracket_keyword(&self, cur: &mut Cursor) -> Result<String, String> {
        let mut kw = String::new();
        loop {
            match cur.next() {
                None => return Err("Missing ']' to close a control keyword.".to_string()),
                Some(']') => {
                    return if kw.is_empty() {
                        Err("Empty control keyword '[]'.".to_string())
                    } else {
                        Ok(kw)
                    };
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    kw.push(c);
                    if kw.len() > 5 {
                        return Err(format!(
                            "Control keyword >>{kw}<< exceeds the 5-character limit."
                        ));
                    }
                }
                Some(c) => return Err(format!("Unexpected character >>{c}<< in control keyword.")),
            }
        }
    }

    fn scan_single_quote(&self, cur: &mut Cursor, scope: &Scope) -> Result<String, String> {
        let mut s = String::new();
        loop {
            match cur.next() {
                None => {
                    set_error_pos(scope, cur.position());
                    return Err("Missing closing >>'<< before end of input.".to_string());
                }
                Some('\'') => return Ok(s),
                Some('\n') => {
                    set_error_pos(scope, cur.position());
                    return Err("Unterminated >>'<<: a quoted string cannot contain a newline.".to_string());
                }
                Some(c) => s.push(c),
            }
        }
    }

    fn scan_double_quote(&self, cur: &mut Cursor, scope: &Scope) -> Result<String, String> {
        let mut s = String::new();
        loop {
            match cur.next() {
                None => {
                    set_error_pos(scope, cur.position());
                    return Err("Missing closing >>\"<< before end of input.".to_string());
                }
                Some('"') => return Ok(s),
                Some('\n') => {
                    set_error_pos(scope, cur.position());
                    return Err("Unterminated >>\"<<: a quoted string cannot contain a newline.".to_string());
                }
                Some(c) => s.push(c),
            }
        }
    }

    fn skip_comment(&self, cur: &mut Cursor) {
        loop {
            match cur.next() {
                None | Some('\n') => return,
                Some(_) => {}
            }
        }
    }
}

/// `include` recurses back into the evaluator through this trait, in the
/// exact scope the builtin already repointed `.PWD`/`.FILE`/`.LINE`/`.COL`
/// at — included content is evaluated in the caller's scope, not a fresh
/// child, matching the original's direct-substitution behavior.
impl<'a> Includer for Evaluator<'a> {
    fn include(&self, scope: &Scope, contents: &str, _file_label: &str) -> Result<(), String> {
        let mut cursor = Cursor::new(contents);
        self.scan_top_level(&mut cursor, scope, false)
    }
}

fn value_truth(args: &[String]) -> bool {
    args.len() == 1 && !args[0].is_empty()
}

fn describe_allowed(allowed: &[&str]) -> String {
    allowed
        .iter()
        .map(|k| format!("'[{k}]'"))
        .collect::<Vec<_>>()
        .join(" or ")
}

fn set_error_pos(scope: &Scope, pos: SourcePosition) {
    scope.set(".LINE", Value::single(pos.line.to_string()));
    scope.set(".COL", Value::single(pos.column.to_string()));
}

fn line_of(scope: &Scope, name: &str) -> u32 {
    scope
        .get(name)
        .and_then(|v| v.first_or_empty().parse().ok())
        .unwrap_or(1)
}

fn flush_partial(arguments: &mut Vec<String>, partial: &mut String, has_partial: &mut bool) {
    if *has_partial {
        arguments.push(std::mem::take(partial));
        *has_partial = false;
    }
}

/// The splicing rule: zero results vanish, one result extends the argument
/// currently being built, two or more end it and start fresh ones for every
/// result after the first.
fn splice(arguments: &mut Vec<String>, partial: &mut String, has_partial: &mut bool, pieces: &[String]) {
    for (i, piece) in pieces.iter().enumerate() {
        if i == 0 {
            partial.push_str(piece);
            *has_partial = true;
        } else {
            arguments.push(std::mem::take(partial));
            *partial = piece.clone();
            *has_partial = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_eval<'a>(
        registry: &'a Registry,
        stdout: &'a RefCell<String>,
        nodes: &'a RefCell<Vec<Node>>,
    ) -> Evaluator<'a> {
        Evaluator::new(registry, stdout, nodes)
    }

    #[test]
    fn evaluates_arithmetic_and_prints() {
        let registry = Registry::with_standard_builtins();
        let stdout = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let ev = new_eval(&registry, &stdout, &nodes);
        let scope = Scope::root();
        ev.eval(&scope, "t.txt", "(print (add 1 2 3))").unwrap();
        assert_eq!(stdout.borrow().as_str(), "6\n");
    }

    #[test]
    fn set_and_get_roundtrip() {
        let registry = Registry::with_standard_builtins();
        let stdout = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let ev = new_eval(&registry, &stdout, &nodes);
        let scope = Scope::root();
        ev.eval(&scope, "t.txt", "(set 'x' '5') (print (get 'x'))").unwrap();
        assert_eq!(stdout.borrow().as_str(), "5\n");
    }

    #[test]
    fn if_builtin_skips_untaken_branch_side_effects() {
        let registry = Registry::with_standard_builtins();
        let stdout = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let ev = new_eval(&registry, &stdout, &nodes);
        let scope = Scope::root();
        scope.set(".PWD", Value::single("/tmp"));
        ev.eval(&scope, "t.txt", "(if '' (touch-node 'a.txt'))").unwrap();
        assert!(nodes.borrow().is_empty());
    }

    #[test]
    fn if_builtin_runs_taken_branch() {
        let registry = Registry::with_standard_builtins();
        let stdout = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let ev = new_eval(&registry, &stdout, &nodes);
        let scope = Scope::root();
        scope.set(".PWD", Value::single("/tmp"));
        ev.eval(&scope, "t.txt", "(if '1' (touch-node 'a.txt'))").unwrap();
        assert_eq!(nodes.borrow().len(), 1);
    }

    #[test]
    fn if_construct_runs_only_the_taken_branch() {
        let registry = Registry::with_standard_builtins();
        let stdout = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let ev = new_eval(&registry, &stdout, &nodes);
        let scope = Scope::root();
        scope.set(".PWD", Value::single("/tmp"));
        let script = "[if] (eq '1' '1') [then] (touch-node 'yes.txt') [else] (touch-node 'no.txt') [fi]";
        ev.eval(&scope, "t.txt", script).unwrap();
        let built = nodes.borrow();
        assert_eq!(built.len(), 1);
        assert!(built[0].goal_name.ends_with("yes.txt"));
    }

    #[test]
    fn while_loop_rescans_condition_each_iteration() {
        let registry = Registry::with_standard_builtins();
        let stdout = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let ev = new_eval(&registry, &stdout, &nodes);
        let scope = Scope::root();
        let script = "(set 'i' '0') [while] (neq (get 'i') '3') [do] (set 'i' (add (get 'i') '1')) [done] (print (get 'i'))";
        ev.eval(&scope, "t.txt", script).unwrap();
        assert_eq!(stdout.borrow().as_str(), "3\n");
    }

    #[test]
    fn dead_branch_is_still_checked_for_unknown_functions() {
        let registry = Registry::with_standard_builtins();
        let stdout = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let ev = new_eval(&registry, &stdout, &nodes);
        let scope = Scope::root();
        let err = ev.eval(&scope, "t.txt", "(if '' (bogus-function))").unwrap_err();
        assert!(err.cause.contains("Unknown function"));
    }

    #[test]
    fn unterminated_call_reports_missing_paren() {
        let registry = Registry::with_standard_builtins();
        let stdout = RefCell::new(String::new());
        let nodes = RefCell::new(Vec::new());
        let ev = new_eval(&registry, &stdout, &nodes);
        let scope = Scope::root();
        let err = ev.eval(&scope, "t.txt", "(print 'hi'").unwrap_err();
        assert!(err.cause.contains("Missing closing ')'"));
    }
}
