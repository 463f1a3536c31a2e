//! Database stdlib functions
//!
//! Argument conventions:
//! - `create(fields)`
//! - `findAll(filter?)`
//! - `find(filter | id)`
//! - `update(id | record, patch)`
//! - `delete(id | record | filter)`
//! - `count()`
//!
//! When the method was reached as `db.<op>` instead of `db.<Entity>.<op>`,
//! the entity name is taken from the first argument.

use std::collections::HashMap;

use super::DbOp;
use crate::context::RuntimeContext;
use crate::db::{DeleteTarget, Predicate};
use crate::executor::errors::RuntimeError;
use crate::executor::types::Val;

pub fn call(
    entity: Option<&str>,
    op: DbOp,
    args: Vec<Val>,
    ctx: &RuntimeContext,
) -> Result<Val, RuntimeError> {
    let mut args = args.into_iter();
    let entity = match entity {
        Some(entity) => entity.to_string(),
        None => match args.next() {
            Some(Val::Str(name)) => name,
            Some(other) => {
                return Err(RuntimeError::invalid_argument(
                    format!("db.{}", op.name()),
                    format!("entity name must be a string, got {}", other.type_name()),
                ))
            }
            None => {
                return Err(RuntimeError::invalid_argument(
                    format!("db.{}", op.name()),
                    "missing entity name",
                ))
            }
        },
    };
    let func = format!("db.{}.{}", entity, op.name());
    let args: Vec<Val> = args.collect();
    let db = ctx.db();

    match op {
        DbOp::Create => {
            expect_at_most(&func, &args, 1)?;
            let fields = match args.first() {
                None => HashMap::new(),
                Some(value) => to_fields(&func, value)?,
            };
            Ok(Val::Record(db.create(&entity, fields)))
        }

        DbOp::FindAll => {
            expect_at_most(&func, &args, 1)?;
            let predicate = match args.first() {
                None | Some(Val::Null) => None,
                Some(value) => Some(Predicate::fields(to_fields(&func, value)?)),
            };
            let records = db.find_all(&entity, predicate.as_ref());
            Ok(Val::List(records.into_iter().map(Val::Record).collect()))
        }

        DbOp::Find => {
            expect_exactly(&func, &args, 1)?;
            let predicate = match &args[0] {
                Val::Num(_) | Val::Str(_) | Val::Record(_) => {
                    id_predicate(to_id(&func, &args[0])?)
                }
                value => Predicate::fields(to_fields(&func, value)?),
            };
            Ok(Val::Record(db.find(&entity, &predicate)?))
        }

        DbOp::Update => {
            expect_exactly(&func, &args, 2)?;
            let id = to_id(&func, &args[0])?;
            let patch = to_fields(&func, &args[1])?;
            Ok(Val::Record(db.update(&entity, id, patch)?))
        }

        DbOp::Delete => {
            expect_exactly(&func, &args, 1)?;
            let target = match &args[0] {
                Val::Num(_) | Val::Str(_) | Val::Record(_) => {
                    DeleteTarget::Id(to_id(&func, &args[0])?)
                }
                value => DeleteTarget::Matching(Predicate::fields(to_fields(&func, value)?)),
            };
            Ok(Val::Num(db.delete(&entity, &target) as f64))
        }

        DbOp::Count => {
            expect_exactly(&func, &args, 0)?;
            Ok(Val::Num(db.count(&entity) as f64))
        }
    }
}

/* ===================== Argument Helpers ===================== */

fn id_predicate(id: u64) -> Predicate {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), Val::Num(id as f64));
    Predicate::fields(fields)
}

/// Accept a numeric id, a numeric string (path parameters) or a record
fn to_id(func: &str, value: &Val) -> Result<u64, RuntimeError> {
    let n = match value {
        Val::Num(n) => *n,
        Val::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            RuntimeError::invalid_argument(func, format!("'{}' is not a record id", s))
        })?,
        Val::Record(record) => return Ok(record.id()),
        other => {
            return Err(RuntimeError::invalid_argument(
                func,
                format!("expected a record id, got {}", other.type_name()),
            ))
        }
    };
    if n < 0.0 || n.fract() != 0.0 || !n.is_finite() {
        return Err(RuntimeError::invalid_argument(
            func,
            format!("{} is not a record id", n),
        ));
    }
    Ok(n as u64)
}

fn to_fields(func: &str, value: &Val) -> Result<HashMap<String, Val>, RuntimeError> {
    match value {
        Val::Obj(map) => Ok(map.clone()),
        Val::Record(record) => Ok(record.snapshot().fields),
        other => Err(RuntimeError::invalid_argument(
            func,
            format!("expected an object, got {}", other.type_name()),
        )),
    }
}

fn expect_exactly(func: &str, args: &[Val], n: usize) -> Result<(), RuntimeError> {
    if args.len() != n {
        return Err(RuntimeError::invalid_argument(
            func,
            format!("expected {} arguments, got {}", n, args.len()),
        ));
    }
    Ok(())
}

fn expect_at_most(func: &str, args: &[Val], n: usize) -> Result<(), RuntimeError> {
    if args.len() > n {
        return Err(RuntimeError::invalid_argument(
            func,
            format!("expected at most {} arguments, got {}", n, args.len()),
        ));
    }
    Ok(())
}
