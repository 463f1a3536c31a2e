//! Stored records and query predicates

use crate::executor::types::{val_map_to_json, Val};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One stored item: a generated id plus flat field values
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: u64,
    pub fields: HashMap<String, Val>,
}

impl Record {
    /// Field value, with `id` exposed as a number
    pub fn get(&self, name: &str) -> Option<Val> {
        if name == "id" {
            return Some(Val::Num(self.id as f64));
        }
        self.fields.get(name).cloned()
    }

    pub fn to_json(&self) -> JsonValue {
        let mut obj = val_map_to_json(&self.fields);
        obj.insert("id".to_string(), json!(self.id));
        JsonValue::Object(obj)
    }
}

/// Shared handle to a record held by a table
///
/// Updates go through the handle, so every value that captured it (a `let`
/// binding, a list returned by `findAll`) observes the new field values.
#[derive(Clone)]
pub struct RecordRef(Arc<RwLock<Record>>);

impl RecordRef {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    pub fn id(&self) -> u64 {
        self.read().id
    }

    pub fn get(&self, name: &str) -> Option<Val> {
        self.read().get(name)
    }

    /// Copy of the current field values
    pub fn snapshot(&self) -> Record {
        self.read().clone()
    }

    pub fn to_json(&self) -> JsonValue {
        self.read().to_json()
    }

    pub fn matches(&self, predicate: &Predicate) -> bool {
        predicate.matches(&self.read())
    }

    /// Merge `patch` into the record; `id` is never overwritten
    pub(crate) fn merge(&self, patch: HashMap<String, Val>) {
        // Detach before locking: the patch may hold this very record
        let patch = detach_fields(patch);
        let mut record = self.write();
        for (key, value) in patch {
            if key != "id" {
                record.fields.insert(key, value);
            }
        }
    }

    pub fn ptr_eq(&self, other: &RecordRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for RecordRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.snapshot() == other.snapshot()
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.read(), f)
    }
}

/// Replace record handles inside `fields` with plain objects
///
/// Stored fields hold values, never live handles, so a record that is
/// written into itself cannot form a cycle.
pub(crate) fn detach_fields(fields: HashMap<String, Val>) -> HashMap<String, Val> {
    fields
        .into_iter()
        .map(|(key, value)| (key, detach(value)))
        .collect()
}

fn detach(value: Val) -> Val {
    match value {
        Val::Record(record) => {
            let Record { id, mut fields } = record.snapshot();
            fields.insert("id".to_string(), Val::Num(id as f64));
            Val::Obj(fields)
        }
        Val::List(items) => Val::List(items.into_iter().map(detach).collect()),
        Val::Obj(fields) => Val::Obj(detach_fields(fields)),
        other => other,
    }
}

/* ===================== Predicates ===================== */

/// Record filter used by `find_all`, `find` and `delete`
#[derive(Clone)]
pub enum Predicate {
    /// Every listed field equals the given value (missing fields read as null)
    Fields(HashMap<String, Val>),
    /// Arbitrary host-supplied filter
    Custom(Arc<dyn Fn(&Record) -> bool + Send + Sync>),
}

impl Predicate {
    pub fn fields(fields: HashMap<String, Val>) -> Self {
        Predicate::Fields(fields)
    }

    pub fn custom(f: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        Predicate::Custom(Arc::new(f))
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Fields(fields) => fields
                .iter()
                .all(|(name, expected)| record.get(name).unwrap_or(Val::Null) == *expected),
            Predicate::Custom(f) => f(record),
        }
    }

    /// Human readable form for error messages
    pub fn describe(&self) -> String {
        match self {
            Predicate::Fields(fields) => JsonValue::Object(val_map_to_json(fields)).to_string(),
            Predicate::Custom(_) => "<custom predicate>".to_string(),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.describe())
    }
}
