//! # Lexical Scopes
//!
//! A scope is a frame in a parent-linked chain. Each frame maps names to
//! bindings with a mutability flag. `get` walks parent links outward;
//! `define` installs in the current frame (shadowing is allowed); `assign`
//! walks outward and fails on immutable or undefined targets.
//!
//! Scopes are reference-counted. Function values hold a strong reference to
//! their defining scope; since frames only link upward and a function never
//! captures a frame below its own definition, no reference cycles form.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
    /// False for intrinsics seeded into root frames.
    pub user_defined: bool,
}

pub struct Scope {
    parent: Option<Rc<Scope>>,
    vars: RefCell<HashMap<String, Binding>>,
}

/// Why an assignment failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Undefined,
    Immutable,
}

impl Scope {
    pub fn root() -> Rc<Scope> {
        Rc::new(Scope {
            parent: None,
            vars: RefCell::new(HashMap::new()),
        })
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            parent: Some(Rc::clone(parent)),
            vars: RefCell::new(HashMap::new()),
        })
    }

    /// Look a name up through the frame chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// True when the name resolves somewhere in the chain.
    pub fn has(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
            || self.parent.as_ref().map_or(false, |p| p.has(name))
    }

    /// Install a binding in this frame, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value, mutable: bool, user_defined: bool) {
        self.vars.borrow_mut().insert(
            name.into(),
            Binding {
                value,
                mutable,
                user_defined,
            },
        );
    }

    /// Rebind an existing name, walking outward to find it.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            if !binding.mutable {
                return Err(AssignError::Immutable);
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(AssignError::Undefined),
        }
    }

    /// Every name visible from this scope, for "did you mean" suggestions.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut scope: Option<&Scope> = Some(self);
        while let Some(s) = scope {
            for name in s.vars.borrow().keys() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
            scope = s.parent.as_deref();
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let root = Scope::root();
        root.define("x", Value::Num(1.0), false, true);
        assert!(matches!(root.get("x"), Some(Value::Num(n)) if n == 1.0));
        assert!(root.get("y").is_none());
    }

    #[test]
    fn test_shadowing() {
        let root = Scope::root();
        root.define("x", Value::Num(1.0), false, true);
        let inner = Scope::child(&root);
        inner.define("x", Value::Num(2.0), false, true);
        assert!(matches!(inner.get("x"), Some(Value::Num(n)) if n == 2.0));
        assert!(matches!(root.get("x"), Some(Value::Num(n)) if n == 1.0));
    }

    #[test]
    fn test_assign_walks_parents() {
        let root = Scope::root();
        root.define("x", Value::Num(1.0), true, true);
        let inner = Scope::child(&root);
        inner.assign("x", Value::Num(5.0)).unwrap();
        assert!(matches!(root.get("x"), Some(Value::Num(n)) if n == 5.0));
    }

    #[test]
    fn test_assign_immutable_fails() {
        let root = Scope::root();
        root.define("x", Value::Num(1.0), false, true);
        assert_eq!(
            root.assign("x", Value::Num(2.0)),
            Err(AssignError::Immutable)
        );
        assert_eq!(
            root.assign("nope", Value::Num(2.0)),
            Err(AssignError::Undefined)
        );
    }

    #[test]
    fn test_visible_names() {
        let root = Scope::root();
        root.define("outer", Value::Null, false, false);
        let inner = Scope::child(&root);
        inner.define("inner", Value::Null, false, true);
        let names = inner.visible_names();
        assert!(names.contains(&"outer".to_string()));
        assert!(names.contains(&"inner".to_string()));
    }
}
