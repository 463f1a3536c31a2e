//! Standard library function implementations
//!
//! This module contains all stdlib function implementations organized by category.

pub mod db;
pub mod runtime;

use super::errors::RuntimeError;
use super::types::Val;
use crate::context::RuntimeContext;
use std::collections::HashMap;

/* ===================== Standard Library Function Types ===================== */

/// Standard library function identifiers
///
/// Each variant represents a callable the evaluator knows how to run.
/// Database methods carry the entity they were bound to by member access
/// (`db.Reminder.create`), or `None` when the entity is the first argument
/// (`db.create("Reminder", ...)`).
#[derive(Debug, Clone, PartialEq)]
pub enum StdlibFunc {
    Log,
    Now,
    Db { entity: Option<String>, op: DbOp },
}

impl StdlibFunc {
    pub fn name(&self) -> String {
        match self {
            StdlibFunc::Log => "log".to_string(),
            StdlibFunc::Now => "now".to_string(),
            StdlibFunc::Db {
                entity: Some(entity),
                op,
            } => format!("db.{}.{}", entity, op.name()),
            StdlibFunc::Db { entity: None, op } => format!("db.{}", op.name()),
        }
    }
}

/// Database operations reachable from `db.<Entity>.<op>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOp {
    Create,
    FindAll,
    Find,
    Update,
    Delete,
    Count,
}

impl DbOp {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "create" => Some(DbOp::Create),
            "findAll" => Some(DbOp::FindAll),
            "find" => Some(DbOp::Find),
            "update" => Some(DbOp::Update),
            "delete" => Some(DbOp::Delete),
            "count" => Some(DbOp::Count),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DbOp::Create => "create",
            DbOp::FindAll => "findAll",
            DbOp::Find => "find",
            DbOp::Update => "update",
            DbOp::Delete => "delete",
            DbOp::Count => "count",
        }
    }
}

/* ===================== Stdlib Dispatcher ===================== */

/// Call a standard library function with arguments
///
/// This dispatcher routes to the appropriate function implementation
/// based on the StdlibFunc variant.
pub fn call_stdlib_func(
    func: &StdlibFunc,
    args: Vec<Val>,
    ctx: &RuntimeContext,
) -> Result<Val, RuntimeError> {
    match func {
        StdlibFunc::Log => runtime::log(&args, ctx),
        StdlibFunc::Now => runtime::now(&args, ctx),
        StdlibFunc::Db { entity, op } => db::call(entity.as_deref(), *op, args, ctx),
    }
}

/* ===================== Environment Injection ===================== */

/// Inject the built-in bindings into a root scope's variables
///
/// Adds `db`, `log` and `now`. Invocation parameters bound by the router
/// or scheduler may shadow them.
pub fn inject_stdlib(env: &mut HashMap<String, Val>) {
    env.entry("db".to_string()).or_insert(Val::Db);
    env.entry("log".to_string())
        .or_insert(Val::NativeFunc(StdlibFunc::Log));
    env.entry("now".to_string())
        .or_insert(Val::NativeFunc(StdlibFunc::Now));
}
