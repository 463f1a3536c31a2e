//! Test helpers for executor tests
//!
//! Common utilities for building statement bodies and contexts

use crate::context::{MemorySink, RuntimeContext};
use crate::executor::{ExecError, Stmt, Val, VM};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Deserialize a statement body the way the front end hands it over
pub fn body(json: JsonValue) -> Vec<Stmt> {
    serde_json::from_value(json).expect("Body deserialization failed")
}

/// Context with a fresh database and a log sink the test can read back
pub fn test_context() -> (RuntimeContext, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let ctx = RuntimeContext::new().with_log_sink(sink.clone());
    (ctx, sink)
}

/// Run `json` as a body in a fresh VM with no bindings
pub fn run(ctx: &RuntimeContext, json: JsonValue) -> Result<Val, ExecError> {
    run_with(ctx, json, HashMap::new())
}

/// Run `json` as a body in a fresh VM whose root scope holds `bindings`
pub fn run_with(
    ctx: &RuntimeContext,
    json: JsonValue,
    bindings: HashMap<String, Val>,
) -> Result<Val, ExecError> {
    let body = body(json);
    let mut vm = VM::with_bindings(ctx, bindings);
    vm.execute_block(&body)
}

/* ===================== AST Shorthands ===================== */

pub fn lit(value: JsonValue) -> JsonValue {
    serde_json::json!({"type": "literal", "value": value})
}

pub fn ident(name: &str) -> JsonValue {
    serde_json::json!({"type": "identifier", "name": name})
}

pub fn member(object: JsonValue, property: &str) -> JsonValue {
    serde_json::json!({"type": "member", "object": object, "property": property})
}

pub fn call(callee: JsonValue, arguments: Vec<JsonValue>) -> JsonValue {
    serde_json::json!({"type": "call", "callee": callee, "arguments": arguments})
}

pub fn binary(operator: &str, left: JsonValue, right: JsonValue) -> JsonValue {
    serde_json::json!({"type": "binary", "operator": operator, "left": left, "right": right})
}

/// `db.<entity>.<op>(args...)`
pub fn db_call(entity: &str, op: &str, arguments: Vec<JsonValue>) -> JsonValue {
    call(member(member(ident("db"), entity), op), arguments)
}

/// `log(args...)` as a statement
pub fn log_stmt(arguments: Vec<JsonValue>) -> JsonValue {
    serde_json::json!({"type": "expression", "expression": call(ident("log"), arguments)})
}
