//! # Executor - Tree-Walking Interpreter
//!
//! Runs the statement/expression trees produced by the front end.
//!
//! ## Core Principles
//!
//! 1. **Synchronous**: one invocation runs to completion, no suspension
//! 2. **Arena scopes**: frames with parent indices, released when their block ends
//! 3. **Control is not failure**: `return` travels as `Control::Return`,
//!    errors as `ExecError` tagged with the failing statement's position
//! 4. **Injected context**: database, log sink and clock come from `RuntimeContext`

pub mod errors;
pub mod expressions;
pub mod scope;
pub mod statements;
pub mod stdlib;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use errors::{ExecError, RuntimeError};
pub use expressions::eval_expr;
pub use scope::{Scope, ScopeId};
pub use stdlib::{DbOp, StdlibFunc};
pub use types::{json_to_val, json_to_val_map, val_map_to_json, val_to_json, Control, Expr, Stmt, Val};
pub use vm::VM;
