//! Lexical scopes: a name-to-[`Value`] map with a parent chain.
//!
//! Grounded in `original_source/jjmake/parsercontext.hpp`'s private
//! `variables` map and `parent` pointer, and `parsercontext.cpp::getValue`'s
//! parent-chain walk.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Names reserved for evaluator/driver bookkeeping: current directory,
/// current file, current line, current column. Writable only by the
/// evaluator itself or by `include`/root setup, never by `set`/`seta`.
pub const RESERVED_NAMES: [&str; 4] = [".PWD", ".FILE", ".LINE", ".COL"];

pub fn is_reserved(name: &str) -> bool {
    name.starts_with('.')
}

#[derive(Debug, Default)]
struct ScopeInner {
    parent: Option<Scope>,
    variables: HashMap<String, Value>,
}

/// A lexical scope. Cheaply cloneable (an `Rc` handle), matching the
/// original's pointer-chasing `ParserContext` without needing unsafe
/// self-referential structures.
#[derive(Debug, Clone)]
pub struct Scope(Rc<RefCell<ScopeInner>>);

impl Scope {
    pub fn root() -> Self {
        Scope(Rc::new(RefCell::new(ScopeInner::default())))
    }

    pub fn child_of(parent: &Scope) -> Self {
        Scope(Rc::new(RefCell::new(ScopeInner {
            parent: Some(parent.clone()),
            variables: HashMap::new(),
        })))
    }

    /// Walk the parent chain looking up `name`. Returns a clone since the
    /// scope the value lives in may not be `self`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let inner = self.0.borrow();
        if let Some(v) = inner.variables.get(name) {
            return Some(v.clone());
        }
        inner.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Set a variable in this scope directly (shadowing any parent
    /// definition). Callers are responsible for rejecting reserved/empty
    /// names per the `set`/`seta` contracts; this is the mechanical part.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().variables.insert(name.into(), value);
    }

    pub fn has_local_variables(&self) -> bool {
        !self.0.borrow().variables.is_empty()
    }

    pub fn parent(&self) -> Option<Scope> {
        self.0.borrow().parent.clone()
    }

    fn set_parent(&self, parent: Option<Scope>) {
        self.0.borrow_mut().parent = parent;
    }

    fn take_variables(&self) -> HashMap<String, Value> {
        std::mem::take(&mut self.0.borrow_mut().variables)
    }

    /// The `ParserContext::split()` operation: produce a `(parent, child)`
    /// pair such that mutations to one side's variables never affect the
    /// other, while reads still see everything currently visible through
    /// `self`.
    ///
    /// Mirrors `parsercontext.cpp::split()`'s optimization: if `self` has no
    /// local variables of its own, the new child can simply reuse `self`'s
    /// existing parent directly — no new scope object is needed on that
    /// side, since nothing will ever be written into `self` again once it is
    /// split (the frame that owned `self` either also owns the new child, or
    /// is dropped). If `self` does have local variables, those variables are
    /// moved into a fresh interior scope so that `self` keeps referencing
    /// them, and both `self`'s new parent and the new child point at that
    /// fresh scope.
    pub fn split(&self) -> (Scope, Scope) {
        if !self.has_local_variables() {
            let parent = self.parent().unwrap_or_else(Scope::root);
            let child = Scope::child_of(&parent);
            return (parent, child);
        }
        let moved = self.take_variables();
        let new_parent = Scope(Rc::new(RefCell::new(ScopeInner {
            parent: self.parent(),
            variables: moved,
        })));
        self.set_parent(Some(new_parent.clone()));
        let child = Scope::child_of(&new_parent);
        (new_parent, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_sees_parent_values() {
        let root = Scope::root();
        root.set("X", Value::single("1"));
        let child = Scope::child_of(&root);
        assert_eq!(child.get("X").unwrap().first_or_empty(), "1");
    }

    #[test]
    fn child_writes_do_not_leak_to_parent() {
        let root = Scope::root();
        let child = Scope::child_of(&root);
        child.set("X", Value::single("1"));
        assert!(root.get("X").is_none());
    }

    #[test]
    fn split_without_local_vars_reuses_parent() {
        let root = Scope::root();
        root.set("X", Value::single("1"));
        let frame_scope = Scope::child_of(&root);
        let (new_parent, child) = frame_scope.split();
        assert_eq!(new_parent.get("X").unwrap().first_or_empty(), "1");
        assert_eq!(child.get("X").unwrap().first_or_empty(), "1");
        child.set("Y", Value::single("2"));
        assert!(new_parent.get("Y").is_none());
    }

    #[test]
    fn split_with_local_vars_preserves_them_in_new_parent() {
        let root = Scope::root();
        let frame_scope = Scope::child_of(&root);
        frame_scope.set("X", Value::single("1"));
        let (new_parent, child) = frame_scope.split();
        assert_eq!(frame_scope.get("X").unwrap().first_or_empty(), "1");
        assert_eq!(new_parent.get("X").unwrap().first_or_empty(), "1");
        assert_eq!(child.get("X").unwrap().first_or_empty(), "1");
    }
}
