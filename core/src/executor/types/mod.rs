//! Type definitions for the executor
//!
//! This module contains all the core types used by the executor:
//! - AST nodes (Stmt, Expr)
//! - Runtime values (Val)
//! - Control flow (Control)

pub mod ast;
pub mod control;
pub mod values;

// Re-export all types for convenient access
pub use ast::{BinaryOp, Expr, Property, Stmt, UnaryOp};
pub use control::Control;
pub use values::{json_to_val, json_to_val_map, val_map_to_json, val_to_json, Val};
