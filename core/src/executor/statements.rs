//! Statement execution handlers
//!
//! Each statement type has its own handler function. Handlers return
//! `Control::Return` to unwind enclosing blocks; failures are tagged with
//! the statement's position on the way out of every block they cross.

use super::errors::{ExecError, RuntimeError};
use super::expressions::eval_expr;
use super::scope::ScopeId;
use super::types::{Control, Expr, Stmt, Val};
use super::vm::VM;

/// Failure inside one statement, before it is located in its block
pub(crate) enum Failure {
    /// Raised while evaluating this statement's own expressions
    Here(RuntimeError),
    /// Raised by a statement in a nested body, already located there
    Nested(ExecError),
}

impl Failure {
    pub(crate) fn located(self, index: usize, stmt: &Stmt) -> ExecError {
        match self {
            Failure::Here(err) => ExecError::new(index, stmt.label(), err),
            Failure::Nested(err) => err.nested_in(index),
        }
    }
}

impl From<RuntimeError> for Failure {
    fn from(err: RuntimeError) -> Self {
        Failure::Here(err)
    }
}

type StmtResult = Result<Control, Failure>;

/* ===================== Blocks ===================== */

/// Run statements in order until one returns or fails
pub fn run_block(vm: &mut VM<'_>, at: ScopeId, body: &[Stmt]) -> Result<Control, ExecError> {
    for (index, stmt) in body.iter().enumerate() {
        match execute_stmt(vm, at, stmt) {
            Ok(Control::None) => {}
            Ok(control) => return Ok(control),
            Err(failure) => return Err(failure.located(index, stmt)),
        }
    }
    Ok(Control::None)
}

/// Run `body` in a fresh child of `parent`, releasing it afterwards
fn run_child_block(vm: &mut VM<'_>, parent: ScopeId, body: &[Stmt]) -> StmtResult {
    let child = vm.scope.child(parent);
    let result = run_block(vm, child, body);
    vm.scope.release(child);
    result.map_err(Failure::Nested)
}

/* ===================== Statement Handlers ===================== */

pub(crate) fn execute_stmt(vm: &mut VM<'_>, at: ScopeId, stmt: &Stmt) -> StmtResult {
    match stmt {
        Stmt::Let { name, value } => execute_let(vm, at, name, value),
        Stmt::Assign { name, value } => execute_assign(vm, at, name, value),
        Stmt::Return { value } => execute_return(vm, at, value.as_ref()),
        Stmt::If {
            condition,
            then_body,
            else_body,
        } => execute_if(vm, at, condition, then_body, else_body.as_deref()),
        Stmt::For {
            item,
            collection,
            body,
        } => execute_for(vm, at, item, collection, body),
        Stmt::Expression { expression } => {
            eval_expr(expression, &vm.scope, at, vm.ctx)?;
            Ok(Control::None)
        }
    }
}

/// Execute Let statement
fn execute_let(vm: &mut VM<'_>, at: ScopeId, name: &str, value: &Expr) -> StmtResult {
    let value = eval_expr(value, &vm.scope, at, vm.ctx)?;
    vm.scope.set(at, name, value);
    Ok(Control::None)
}

/// Execute Assign statement
fn execute_assign(vm: &mut VM<'_>, at: ScopeId, name: &str, value: &Expr) -> StmtResult {
    let value = eval_expr(value, &vm.scope, at, vm.ctx)?;
    vm.scope.assign(at, name, value)?;
    Ok(Control::None)
}

/// Execute Return statement
fn execute_return(vm: &mut VM<'_>, at: ScopeId, value: Option<&Expr>) -> StmtResult {
    let value = match value {
        Some(expr) => eval_expr(expr, &vm.scope, at, vm.ctx)?,
        None => Val::Null,
    };
    Ok(Control::Return(value))
}

/// Execute If statement
fn execute_if(
    vm: &mut VM<'_>,
    at: ScopeId,
    condition: &Expr,
    then_body: &[Stmt],
    else_body: Option<&[Stmt]>,
) -> StmtResult {
    let test = eval_expr(condition, &vm.scope, at, vm.ctx)?;
    if test.is_truthy() {
        run_child_block(vm, at, then_body)
    } else if let Some(else_body) = else_body {
        run_child_block(vm, at, else_body)
    } else {
        Ok(Control::None)
    }
}

/// Execute For statement
///
/// Every iteration gets its own child scope, so nothing bound in the body
/// survives into the next iteration or past the loop.
fn execute_for(
    vm: &mut VM<'_>,
    at: ScopeId,
    item: &str,
    collection: &Expr,
    body: &[Stmt],
) -> StmtResult {
    let items = match eval_expr(collection, &vm.scope, at, vm.ctx)? {
        Val::List(items) => items,
        other => return Err(RuntimeError::NotIterable(other.type_name().to_string()).into()),
    };

    for element in items {
        let iteration = vm.scope.child(at);
        vm.scope.set(iteration, item, element);
        let result = run_block(vm, iteration, body);
        vm.scope.release(iteration);

        match result.map_err(Failure::Nested)? {
            Control::None => {}
            control => return Ok(control),
        }
    }
    Ok(Control::None)
}
