//! Lexical scopes

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::value::Value;
use crate::error::{Error, Result};

#[derive(Debug)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// Function scopes own `this` and receive `var` declarations.
#[derive(Debug)]
pub enum ScopeKind {
    Function { this: Value },
    Block,
}

/// One level of the scope chain.
#[derive(Debug)]
pub struct Scope {
    bindings: RefCell<FxHashMap<Rc<str>, Binding>>,
    parent: Option<Rc<Scope>>,
    kind: ScopeKind,
}

impl Scope {
    /// Outermost scope; lookups that fall off it go to the global object.
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: None,
            kind: ScopeKind::Function {
                this: Value::Undefined,
            },
        })
    }

    pub fn function(parent: &Rc<Scope>, this: Value) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: Some(Rc::clone(parent)),
            kind: ScopeKind::Function { this },
        })
    }

    pub fn block(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: Some(Rc::clone(parent)),
            kind: ScopeKind::Block,
        })
    }

    /// Declare `name` in this scope, shadowing outer bindings.
    pub fn declare(&self, name: Rc<str>, value: Value, mutable: bool) {
        self.bindings
            .borrow_mut()
            .insert(name, Binding { value, mutable });
    }

    /// Declare a `var` in the nearest function scope.
    ///
    /// Redeclaring keeps the current value unless a new one is supplied.
    pub fn declare_var(&self, name: Rc<str>, value: Option<Value>) {
        let target = self.function_scope();
        let mut bindings = target.bindings.borrow_mut();
        if let Some(binding) = bindings.get_mut(&name) {
            if let Some(value) = value {
                binding.value = value;
            }
            return;
        }
        bindings.insert(
            name,
            Binding {
                value: value.unwrap_or_default(),
                mutable: true,
            },
        );
    }

    fn function_scope(&self) -> &Scope {
        let mut scope = self;
        while let (ScopeKind::Block, Some(parent)) = (&scope.kind, &scope.parent) {
            scope = &**parent;
        }
        scope
    }

    /// Find the value bound to `name` along the chain.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.bindings.borrow().get(name) {
                return Some(binding.value.clone());
            }
            scope = current.parent.as_deref();
        }
        None
    }

    /// Overwrite an existing binding.
    ///
    /// Returns `Ok(false)` when no scope declares `name`.
    pub fn assign(&self, name: &str, value: Value) -> Result<bool> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.bindings.borrow_mut().get_mut(name) {
                if !binding.mutable {
                    return Err(Error::type_error("Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(true);
            }
            scope = current.parent.as_deref();
        }
        Ok(false)
    }

    /// `this` of the nearest function scope.
    pub fn this(&self) -> Value {
        match &self.function_scope().kind {
            ScopeKind::Function { this } => this.clone(),
            ScopeKind::Block => Value::Undefined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_lookup() {
        let root = Scope::root();
        root.declare("x".into(), Value::Number(1.0), true);
        let inner = Scope::block(&root);
        inner.declare("x".into(), Value::Number(2.0), true);

        assert_eq!(inner.lookup("x").and_then(|v| v.as_number()), Some(2.0));
        assert_eq!(root.lookup("x").and_then(|v| v.as_number()), Some(1.0));
        assert!(inner.lookup("y").is_none());
    }

    #[test]
    fn test_assign_walks_the_chain() {
        let root = Scope::root();
        root.declare("count".into(), Value::Number(0.0), true);
        let inner = Scope::block(&Scope::function(&root, Value::Undefined));

        assert!(inner.assign("count", Value::Number(5.0)).unwrap());
        assert_eq!(root.lookup("count").and_then(|v| v.as_number()), Some(5.0));
        assert!(!inner.assign("missing", Value::Null).unwrap());
    }

    #[test]
    fn test_const_is_immutable() {
        let root = Scope::root();
        root.declare("k".into(), Value::Number(1.0), false);
        let err = root.assign("k", Value::Number(2.0)).unwrap_err();
        assert!(err.to_string().contains("constant"));
    }

    #[test]
    fn test_var_goes_to_function_scope() {
        let function = Scope::function(&Scope::root(), Value::Undefined);
        let block = Scope::block(&Scope::block(&function));
        block.declare_var("v".into(), Some(Value::Bool(true)));
        block.declare_var("v".into(), None);

        assert!(function.lookup("v").is_some_and(|v| v.is_truthy()));
    }

    #[test]
    fn test_this_comes_from_function_scope() {
        let function = Scope::function(&Scope::root(), Value::string("me"));
        let block = Scope::block(&function);
        assert_eq!(block.this().as_str(), Some("me"));
    }
}
