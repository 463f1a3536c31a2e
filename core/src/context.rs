//! Runtime context shared by every invocation
//!
//! The hosting application owns the context and injects it into each
//! dispatch and job tick. The engine only reads from it: it writes through
//! the database handle and the log sink but never swaps them.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::db::Database;

/* ===================== Log Sink ===================== */

/// Destination for the language's `log(...)` built-in
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Emits user log lines as `tracing` events on target `keel::log`
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "keel::log", "{}", message);
    }
}

/// Keeps log lines in memory for the host to read back
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/* ===================== Clock ===================== */

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/* ===================== Runtime Context ===================== */

#[derive(Clone)]
pub struct RuntimeContext {
    db: Arc<Database>,
    log: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    gate: Arc<Mutex<()>>,
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeContext {
    /// Fresh database, `tracing` log sink and the system clock
    pub fn new() -> Self {
        Self {
            db: Arc::new(Database::new()),
            log: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = db;
        self
    }

    pub fn with_log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    pub fn log(&self, message: &str) {
        self.log.log(message);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Hold the invocation gate for the duration of one dispatch or tick
    ///
    /// Scheduler tasks and host calls share the database; the gate keeps one
    /// invocation's statements from interleaving with another's.
    pub fn lock_invocation(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
