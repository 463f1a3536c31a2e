//! Expression evaluation
//!
//! Evaluation reads the AST and the scope and never mutates either. Side
//! effects happen only through calls: database methods and `log`.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::errors::RuntimeError;
use super::scope::{Scope, ScopeId};
use super::stdlib::{call_stdlib_func, DbOp, StdlibFunc};
use super::types::{json_to_val, BinaryOp, Expr, UnaryOp, Val};
use crate::context::RuntimeContext;

/// Evaluate an expression to a value
pub fn eval_expr(
    expr: &Expr,
    scope: &Scope,
    at: ScopeId,
    ctx: &RuntimeContext,
) -> Result<Val, RuntimeError> {
    match expr {
        Expr::Literal { value } => Ok(json_to_val(value)),

        Expr::Identifier { name } => scope.get(at, name),

        Expr::Member { object, property } => {
            let target = eval_expr(object, scope, at, ctx)?;
            eval_member(target, property)
        }

        Expr::Binary {
            operator,
            left,
            right,
        } => eval_binary(*operator, left, right, scope, at, ctx),

        Expr::Unary { operator, operand } => {
            let value = eval_expr(operand, scope, at, ctx)?;
            match (operator, value) {
                (UnaryOp::Not, value) => Ok(Val::Bool(!value.is_truthy())),
                (UnaryOp::Neg, Val::Num(n)) => Ok(Val::Num(-n)),
                (UnaryOp::Neg, other) => Err(RuntimeError::type_mismatch(format!(
                    "cannot negate a value of type {}",
                    other.type_name()
                ))),
            }
        }

        Expr::Call { callee, arguments } => {
            let func = match eval_expr(callee, scope, at, ctx)? {
                Val::NativeFunc(func) => func,
                _ => return Err(RuntimeError::NotCallable(describe_callee(callee))),
            };
            let args = arguments
                .iter()
                .map(|arg| eval_expr(arg, scope, at, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call_stdlib_func(&func, args, ctx)
        }

        Expr::Object { properties } => {
            let mut map = HashMap::with_capacity(properties.len());
            for property in properties {
                let value = eval_expr(&property.value, scope, at, ctx)?;
                map.insert(property.key.clone(), value);
            }
            Ok(Val::Obj(map))
        }

        Expr::Array { elements } => elements
            .iter()
            .map(|element| eval_expr(element, scope, at, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Val::List),
    }
}

/* ===================== Member Access ===================== */

/// Project `property` out of `target`
///
/// `db.<Entity>` binds an entity accessor and `db.<Entity>.<op>` a database
/// method; `db.<op>` is a method whose entity comes from the first argument.
fn eval_member(target: Val, property: &str) -> Result<Val, RuntimeError> {
    match target {
        Val::Db => Ok(match DbOp::from_name(property) {
            Some(op) => Val::NativeFunc(StdlibFunc::Db { entity: None, op }),
            None => Val::Entity(property.to_string()),
        }),

        Val::Entity(entity) => match DbOp::from_name(property) {
            Some(op) => Ok(Val::NativeFunc(StdlibFunc::Db {
                entity: Some(entity),
                op,
            })),
            None => Err(RuntimeError::type_mismatch(format!(
                "db.{} has no operation '{}'",
                entity, property
            ))),
        },

        Val::List(items) if property == "length" => Ok(Val::Num(items.len() as f64)),
        Val::Str(s) if property == "length" => Ok(Val::Num(s.chars().count() as f64)),

        other => other.field(property).ok_or_else(|| {
            RuntimeError::type_mismatch(format!(
                "cannot read property '{}' of {}",
                property,
                other.type_name()
            ))
        }),
    }
}

fn describe_callee(callee: &Expr) -> String {
    match callee {
        Expr::Identifier { name } => name.clone(),
        Expr::Member { object, property } => format!("{}.{}", describe_callee(object), property),
        _ => "expression".to_string(),
    }
}

/* ===================== Operators ===================== */

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    scope: &Scope,
    at: ScopeId,
    ctx: &RuntimeContext,
) -> Result<Val, RuntimeError> {
    let l = eval_expr(left, scope, at, ctx)?;

    // Short-circuit: the right operand is only evaluated when it decides the result
    match op {
        BinaryOp::And if !l.is_truthy() => return Ok(Val::Bool(false)),
        BinaryOp::Or if l.is_truthy() => return Ok(Val::Bool(true)),
        BinaryOp::And | BinaryOp::Or => {
            let r = eval_expr(right, scope, at, ctx)?;
            return Ok(Val::Bool(r.is_truthy()));
        }
        _ => {}
    }

    let r = eval_expr(right, scope, at, ctx)?;
    apply_binary(op, l, r)
}

/// Apply a non-logical binary operator to two evaluated operands
pub fn apply_binary(op: BinaryOp, l: Val, r: Val) -> Result<Val, RuntimeError> {
    match op {
        BinaryOp::Eq => Ok(Val::Bool(l == r)),
        BinaryOp::Ne => Ok(Val::Bool(l != r)),

        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&l, &r) {
                (Val::Num(a), Val::Num(b)) => a.partial_cmp(b),
                (Val::Str(a), Val::Str(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch(op, &l, &r)),
            };
            // NaN compares false against everything
            let Some(ordering) = ordering else {
                return Ok(Val::Bool(false));
            };
            Ok(Val::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }

        BinaryOp::Add => match (l, r) {
            (Val::Num(a), Val::Num(b)) => Ok(Val::Num(a + b)),
            (Val::Str(a), Val::Str(b)) => Ok(Val::Str(a + &b)),
            (l, r) => Err(mismatch(op, &l, &r)),
        },

        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let (Val::Num(a), Val::Num(b)) = (&l, &r) else {
                return Err(mismatch(op, &l, &r));
            };
            match op {
                BinaryOp::Sub => Ok(Val::Num(a - b)),
                BinaryOp::Mul => Ok(Val::Num(a * b)),
                _ if *b == 0.0 => Err(RuntimeError::DivisionByZero),
                _ => Ok(Val::Num(a / b)),
            }
        }

        BinaryOp::And | BinaryOp::Or => Ok(Val::Bool(match op {
            BinaryOp::And => l.is_truthy() && r.is_truthy(),
            _ => l.is_truthy() || r.is_truthy(),
        })),
    }
}

fn mismatch(op: BinaryOp, l: &Val, r: &Val) -> RuntimeError {
    RuntimeError::type_mismatch(format!(
        "cannot apply '{}' to {} and {}",
        op.symbol(),
        l.type_name(),
        r.type_name()
    ))
}
