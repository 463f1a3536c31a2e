//! In-memory record store
//!
//! One ordered table per entity, created lazily on first write and kept for
//! the lifetime of the process. Ids are allocated per entity starting at 1
//! and are never reused, even after deletes.
//!
//! Writes are broadcast as [`EntityEvent`]s so the scheduler can run
//! entity-lifecycle jobs without the database knowing about jobs.

mod record;

pub use record::{Predicate, Record, RecordRef};

use record::detach_fields;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::executor::types::{json_to_val, Val};
use crate::types::ModelDef;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbError {
    #[error("no {entity} record matches {criteria}")]
    NotFound { entity: String, criteria: String },
}

/// Which records `delete` removes
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    Id(u64),
    Matching(Predicate),
}

/* ===================== Lifecycle Events ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityEventKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct EntityEvent {
    pub entity: String,
    pub kind: EntityEventKind,
    pub record: RecordRef,
}

/* ===================== Database ===================== */

#[derive(Default)]
struct Table {
    last_id: u64,
    rows: Vec<RecordRef>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Table>,
    defaults: HashMap<String, HashMap<String, Val>>,
}

/// Process-wide record store
///
/// The mutex only makes the handle shareable with scheduler tasks; callers
/// are serialized by the runtime context's invocation gate.
pub struct Database {
    state: Mutex<State>,
    events: broadcast::Sender<EntityEvent>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
        }
    }

    /// Register a model's field defaults, applied by later `create` calls
    pub fn define(&self, model: &ModelDef) {
        let defaults: HashMap<String, Val> = model
            .fields
            .iter()
            .filter_map(|field| {
                field
                    .default
                    .as_ref()
                    .map(|value| (field.name.clone(), json_to_val(value)))
            })
            .collect();
        self.state().defaults.insert(model.name.clone(), defaults);
    }

    /// Store a new record and return it
    pub fn create(&self, entity: &str, fields: HashMap<String, Val>) -> RecordRef {
        let fields = detach_fields(fields);
        let record = {
            let mut state = self.state();
            let mut values = state.defaults.get(entity).cloned().unwrap_or_default();
            values.extend(fields.into_iter().filter(|(key, _)| key != "id"));

            let table = state.tables.entry(entity.to_string()).or_default();
            table.last_id += 1;
            let record = RecordRef::new(Record {
                id: table.last_id,
                fields: values,
            });
            table.rows.push(record.clone());
            record
        };

        tracing::debug!(entity, id = record.id(), "record created");
        self.emit(entity, EntityEventKind::Created, &record);
        record
    }

    /// All records in insertion order, optionally filtered
    pub fn find_all(&self, entity: &str, predicate: Option<&Predicate>) -> Vec<RecordRef> {
        let state = self.state();
        let Some(table) = state.tables.get(entity) else {
            return Vec::new();
        };
        table
            .rows
            .iter()
            .filter(|row| predicate.map_or(true, |p| row.matches(p)))
            .cloned()
            .collect()
    }

    /// First record matching `predicate`
    pub fn find(&self, entity: &str, predicate: &Predicate) -> Result<RecordRef, DbError> {
        let state = self.state();
        state
            .tables
            .get(entity)
            .and_then(|table| table.rows.iter().find(|row| row.matches(predicate)))
            .cloned()
            .ok_or_else(|| DbError::NotFound {
                entity: entity.to_string(),
                criteria: predicate.describe(),
            })
    }

    /// Merge `patch` into the record with `id`, in place
    pub fn update(
        &self,
        entity: &str,
        id: u64,
        patch: HashMap<String, Val>,
    ) -> Result<RecordRef, DbError> {
        let record = self.find_by_id(entity, id)?;
        record.merge(patch);

        tracing::debug!(entity, id, "record updated");
        self.emit(entity, EntityEventKind::Updated, &record);
        Ok(record)
    }

    /// Remove matching records; returns how many were removed
    pub fn delete(&self, entity: &str, target: &DeleteTarget) -> usize {
        let removed: Vec<RecordRef> = {
            let mut state = self.state();
            let Some(table) = state.tables.get_mut(entity) else {
                return 0;
            };
            match target {
                DeleteTarget::Id(id) => match table.rows.iter().position(|row| row.id() == *id) {
                    Some(index) => vec![table.rows.remove(index)],
                    None => Vec::new(),
                },
                DeleteTarget::Matching(predicate) => {
                    let (gone, kept) = std::mem::take(&mut table.rows)
                        .into_iter()
                        .partition(|row| row.matches(predicate));
                    table.rows = kept;
                    gone
                }
            }
        };

        for record in &removed {
            tracing::debug!(entity, id = record.id(), "record deleted");
            self.emit(entity, EntityEventKind::Deleted, record);
        }
        removed.len()
    }

    pub fn count(&self, entity: &str) -> usize {
        self.state()
            .tables
            .get(entity)
            .map_or(0, |table| table.rows.len())
    }

    /// Names of entities that have a table
    pub fn entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every table as JSON, for host inspection
    pub fn dump(&self) -> JsonValue {
        let state = self.state();
        let tables: Map<String, JsonValue> = state
            .tables
            .iter()
            .map(|(name, table)| {
                let rows = table.rows.iter().map(RecordRef::to_json).collect();
                (name.clone(), JsonValue::Array(rows))
            })
            .collect();
        JsonValue::Object(tables)
    }

    /// Receive lifecycle events for writes made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EntityEvent> {
        self.events.subscribe()
    }

    fn find_by_id(&self, entity: &str, id: u64) -> Result<RecordRef, DbError> {
        let state = self.state();
        state
            .tables
            .get(entity)
            .and_then(|table| table.rows.iter().find(|row| row.id() == id))
            .cloned()
            .ok_or_else(|| DbError::NotFound {
                entity: entity.to_string(),
                criteria: format!("id {}", id),
            })
    }

    fn emit(&self, entity: &str, kind: EntityEventKind, record: &RecordRef) {
        // No subscribers is the normal case outside a running scheduler
        let _ = self.events.send(EntityEvent {
            entity: entity.to_string(),
            kind,
            record: record.clone(),
        });
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDef;
    use maplit::hashmap;
    use serde_json::json;

    fn fields(text: &str) -> HashMap<String, Val> {
        hashmap! { "text".to_string() => Val::str(text) }
    }

    #[test]
    fn test_create_assigns_increasing_ids_in_order() {
        let db = Database::new();
        let first = db.create("Reminder", fields("Walk dog"));
        let second = db.create("Reminder", fields("Feed cat"));

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);

        let all = db.find_all("Reminder", None);
        let ids: Vec<u64> = all.iter().map(RecordRef::id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(all[0].get("text"), Some(Val::str("Walk dog")));
    }

    #[test]
    fn test_ids_are_per_entity() {
        let db = Database::new();
        db.create("Reminder", fields("a"));
        let note = db.create("Note", fields("b"));
        assert_eq!(note.id(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let db = Database::new();
        db.create("Reminder", fields("a"));
        let second = db.create("Reminder", fields("b"));
        assert_eq!(db.delete("Reminder", &DeleteTarget::Id(second.id())), 1);

        let third = db.create("Reminder", fields("c"));
        assert_eq!(third.id(), 3);
    }

    #[test]
    fn test_find_all_on_unknown_entity_is_empty() {
        let db = Database::new();
        assert!(db.find_all("Ghost", None).is_empty());
        assert_eq!(db.count("Ghost"), 0);
    }

    #[test]
    fn test_find_returns_first_match_or_not_found() {
        let db = Database::new();
        db.create("Reminder", fields("same"));
        db.create("Reminder", fields("same"));

        let pred = Predicate::fields(fields("same"));
        assert_eq!(db.find("Reminder", &pred).unwrap().id(), 1);

        let missing = Predicate::fields(fields("other"));
        assert!(matches!(
            db.find("Reminder", &missing),
            Err(DbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_missing_id_is_not_found() {
        let db = Database::new();
        db.create("Reminder", fields("a"));

        let result = db.update(
            "Reminder",
            42,
            hashmap! { "done".to_string() => Val::Bool(true) },
        );
        assert_eq!(
            result.unwrap_err(),
            DbError::NotFound {
                entity: "Reminder".to_string(),
                criteria: "id 42".to_string()
            }
        );
    }

    #[test]
    fn test_update_patches_only_given_fields_in_place() {
        let db = Database::new();
        let held = db.create(
            "Reminder",
            hashmap! {
                "text".to_string() => Val::str("Walk dog"),
                "done".to_string() => Val::Bool(false),
            },
        );

        db.update(
            "Reminder",
            held.id(),
            hashmap! { "done".to_string() => Val::Bool(true) },
        )
        .unwrap();

        assert_eq!(held.get("done"), Some(Val::Bool(true)));
        assert_eq!(held.get("text"), Some(Val::str("Walk dog")));
    }

    #[test]
    fn test_delete_by_predicate_removes_all_matches() {
        let db = Database::new();
        db.create("Reminder", fields("x"));
        db.create("Reminder", fields("y"));
        db.create("Reminder", fields("x"));

        let removed = db.delete(
            "Reminder",
            &DeleteTarget::Matching(Predicate::fields(fields("x"))),
        );
        assert_eq!(removed, 2);
        assert_eq!(db.count("Reminder"), 1);
    }

    #[test]
    fn test_delete_nothing_is_noop() {
        let db = Database::new();
        assert_eq!(db.delete("Reminder", &DeleteTarget::Id(1)), 0);
        db.create("Reminder", fields("x"));
        assert_eq!(db.delete("Reminder", &DeleteTarget::Id(9)), 0);
        assert_eq!(db.count("Reminder"), 1);
    }

    #[test]
    fn test_custom_predicate() {
        let db = Database::new();
        db.create("Task", hashmap! { "priority".to_string() => Val::Num(1.0) });
        db.create("Task", hashmap! { "priority".to_string() => Val::Num(5.0) });

        let urgent = Predicate::custom(|r| matches!(r.get("priority"), Some(Val::Num(p)) if p > 3.0));
        let found = db.find_all("Task", Some(&urgent));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), 2);
    }

    #[test]
    fn test_model_defaults_applied_on_create() {
        let db = Database::new();
        db.define(&ModelDef {
            name: "Reminder".to_string(),
            fields: vec![
                FieldDef {
                    name: "text".to_string(),
                    field_type: Some("string".to_string()),
                    default: None,
                },
                FieldDef {
                    name: "done".to_string(),
                    field_type: Some("boolean".to_string()),
                    default: Some(json!(false)),
                },
            ],
        });

        let r = db.create("Reminder", fields("Walk dog"));
        assert_eq!(r.get("done"), Some(Val::Bool(false)));

        let overridden = db.create(
            "Reminder",
            hashmap! { "done".to_string() => Val::Bool(true) },
        );
        assert_eq!(overridden.get("done"), Some(Val::Bool(true)));
    }

    #[test]
    fn test_dump_lists_tables() {
        let db = Database::new();
        db.create("Reminder", fields("Walk dog"));
        assert_eq!(
            db.dump(),
            json!({"Reminder": [{"id": 1, "text": "Walk dog"}]})
        );
        assert_eq!(db.entities(), vec!["Reminder".to_string()]);
    }

    #[test]
    fn test_record_written_into_itself_dumps() {
        let db = Database::new();
        let r = db.create("Reminder", fields("Walk dog"));
        db.update(
            "Reminder",
            r.id(),
            hashmap! { "me".to_string() => Val::Record(r.clone()) },
        )
        .unwrap();
        let copy = db.create("Reminder", hashmap! { "of".to_string() => Val::Record(r.clone()) });

        assert_eq!(
            db.dump(),
            json!({"Reminder": [
                {"id": 1, "text": "Walk dog", "me": {"id": 1, "text": "Walk dog"}},
                {"id": 2, "of": {"id": 1, "text": "Walk dog", "me": {"id": 1, "text": "Walk dog"}}}
            ]})
        );
        assert_ne!(r, copy);
    }

    #[tokio::test]
    async fn test_writes_are_broadcast() {
        let db = Database::new();
        let mut events = db.subscribe();

        let r = db.create("Reminder", fields("a"));
        db.update("Reminder", r.id(), fields("b")).unwrap();
        db.delete("Reminder", &DeleteTarget::Id(r.id()));

        let kinds: Vec<EntityEventKind> = vec![
            events.recv().await.unwrap().kind,
            events.recv().await.unwrap().kind,
            events.recv().await.unwrap().kind,
        ];
        assert_eq!(
            kinds,
            vec![
                EntityEventKind::Created,
                EntityEventKind::Updated,
                EntityEventKind::Deleted
            ]
        );
    }
}
