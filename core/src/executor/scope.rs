//! Lexical scopes
//!
//! Scopes live in an arena owned by one invocation. Each frame records the
//! index of its parent, so lookups walk the chain without reference
//! counting. Child frames are always created on top of the arena and
//! released when the block that opened them ends, which keeps bindings from
//! leaking outward.

use super::errors::RuntimeError;
use super::types::Val;
use std::collections::HashMap;

/// Handle to one frame of a [`Scope`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Frame {
    vars: HashMap<String, Val>,
    parent: Option<ScopeId>,
}

#[derive(Debug)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Create an arena holding a single empty root frame
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    /// Create an arena whose root frame holds `bindings`
    pub fn with_bindings(bindings: HashMap<String, Val>) -> Self {
        Self {
            frames: vec![Frame {
                vars: bindings,
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Open a frame whose parent is `parent`
    pub fn child(&mut self, parent: ScopeId) -> ScopeId {
        self.frames.push(Frame {
            vars: HashMap::new(),
            parent: Some(parent),
        });
        ScopeId(self.frames.len() - 1)
    }

    /// Discard `scope` and every frame opened after it
    pub fn release(&mut self, scope: ScopeId) {
        if scope.0 > 0 {
            self.frames.truncate(scope.0);
        }
    }

    /// Resolve `name` through the parent chain
    pub fn get(&self, scope: ScopeId, name: &str) -> Result<Val, RuntimeError> {
        self.owner(scope, name)
            .and_then(|owner| self.frames[owner.0].vars.get(name).cloned())
            .ok_or_else(|| RuntimeError::UnboundName(name.to_string()))
    }

    pub fn contains(&self, scope: ScopeId, name: &str) -> bool {
        self.owner(scope, name).is_some()
    }

    /// Define or overwrite `name` in `scope` itself
    pub fn set(&mut self, scope: ScopeId, name: impl Into<String>, value: Val) {
        self.frames[scope.0].vars.insert(name.into(), value);
    }

    /// Overwrite `name` in the nearest frame that already binds it
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Val) -> Result<(), RuntimeError> {
        let owner = self
            .owner(scope, name)
            .ok_or_else(|| RuntimeError::UnboundName(name.to_string()))?;
        self.frames[owner.0].vars.insert(name.to_string(), value);
        Ok(())
    }

    /// Number of live frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn owner(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = self.frames.get(id.0)?;
            if frame.vars.contains_key(name) {
                return Some(id);
            }
            current = frame.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_sees_parent_binding() {
        let mut scope = Scope::new();
        let root = scope.root();
        scope.set(root, "x", Val::Num(1.0));

        let child = scope.child(root);
        assert_eq!(scope.get(child, "x"), Ok(Val::Num(1.0)));
    }

    #[test]
    fn test_parent_does_not_see_child_binding() {
        let mut scope = Scope::new();
        let root = scope.root();
        let child = scope.child(root);
        scope.set(child, "y", Val::Bool(true));

        assert_eq!(scope.get(child, "y"), Ok(Val::Bool(true)));
        assert_eq!(
            scope.get(root, "y"),
            Err(RuntimeError::UnboundName("y".to_string()))
        );
    }

    #[test]
    fn test_contains_looks_through_ancestors() {
        let mut scope = Scope::new();
        let root = scope.root();
        scope.set(root, "x", Val::Null);
        let child = scope.child(root);
        scope.set(child, "y", Val::Num(1.0));

        assert!(scope.contains(child, "x"));
        assert!(scope.contains(child, "y"));
        assert!(!scope.contains(root, "y"));
        assert!(!scope.contains(child, "z"));
    }

    #[test]
    fn test_set_shadows_in_current_frame_only() {
        let mut scope = Scope::new();
        let root = scope.root();
        scope.set(root, "x", Val::Num(1.0));

        let child = scope.child(root);
        scope.set(child, "x", Val::Num(2.0));

        assert_eq!(scope.get(child, "x"), Ok(Val::Num(2.0)));
        assert_eq!(scope.get(root, "x"), Ok(Val::Num(1.0)));
    }

    #[test]
    fn test_assign_targets_owning_ancestor() {
        let mut scope = Scope::new();
        let root = scope.root();
        scope.set(root, "total", Val::Num(0.0));

        let child = scope.child(root);
        let grandchild = scope.child(child);
        scope.assign(grandchild, "total", Val::Num(5.0)).unwrap();

        assert_eq!(scope.get(root, "total"), Ok(Val::Num(5.0)));
        assert!(scope.assign(root, "missing", Val::Null).is_err());
    }

    #[test]
    fn test_release_drops_frames() {
        let mut scope = Scope::new();
        let root = scope.root();
        let child = scope.child(root);
        scope.set(child, "tmp", Val::Null);
        scope.child(child);
        assert_eq!(scope.depth(), 3);

        scope.release(child);
        assert_eq!(scope.depth(), 1);

        // The root frame is never released
        scope.release(root);
        assert_eq!(scope.depth(), 1);
    }
}
