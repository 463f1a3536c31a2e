//! Virtual Machine state
//!
//! The VM holds all state for one invocation:
//! - scope: the arena of lexical frames, rooted at the invocation's bindings
//! - ctx: the shared runtime context (database, log sink, clock)
//!
//! A VM is created per endpoint call or job tick and dropped afterwards.

use std::collections::HashMap;

use super::errors::ExecError;
use super::scope::{Scope, ScopeId};
use super::statements::{execute_stmt, run_block};
use super::stdlib::inject_stdlib;
use super::types::{Control, Stmt, Val};
use crate::context::RuntimeContext;

pub struct VM<'a> {
    pub scope: Scope,
    pub(crate) ctx: &'a RuntimeContext,
}

impl<'a> VM<'a> {
    /// Create a VM whose root scope holds only the built-ins
    pub fn new(ctx: &'a RuntimeContext) -> Self {
        Self::with_bindings(ctx, HashMap::new())
    }

    /// Create a VM whose root scope holds `bindings` plus the built-ins
    ///
    /// Bindings win over built-ins of the same name.
    pub fn with_bindings(ctx: &'a RuntimeContext, mut bindings: HashMap<String, Val>) -> Self {
        inject_stdlib(&mut bindings);
        Self {
            scope: Scope::with_bindings(bindings),
            ctx,
        }
    }

    pub fn root(&self) -> ScopeId {
        self.scope.root()
    }

    /// Run `body` in the root scope
    ///
    /// Returns the value of the first `return` reached, however deeply it is
    /// nested, or null when the block runs to the end.
    pub fn execute_block(&mut self, body: &[Stmt]) -> Result<Val, ExecError> {
        let root = self.root();
        match run_block(self, root, body)? {
            Control::Return(value) => Ok(value),
            Control::None => Ok(Val::Null),
        }
    }

    /// Run a single statement in the root scope
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Control, ExecError> {
        let root = self.root();
        execute_stmt(self, root, stmt).map_err(|failure| failure.located(0, stmt))
    }

    /// Look up a name in the root scope
    pub fn get(&self, name: &str) -> Option<Val> {
        self.scope.get(self.root(), name).ok()
    }
}
