pub mod application;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod errors;
pub mod executor;
pub mod router;
pub mod scheduler;
pub mod types;

// Re-export main types
pub use types::*;

// Re-export init API for convenience
pub use application::{initialize, Application, InitBuilder, InitOptions};
pub use context::{Clock, FixedClock, LogSink, MemorySink, RuntimeContext, SystemClock, TracingSink};
pub use db::{Database, EntityEvent, EntityEventKind, Predicate, Record, RecordRef};
pub use errors::EngineError;
pub use executor::{ExecError, RuntimeError, Val};
pub use scheduler::{JobState, ScheduleError, Scheduler};
pub use router::Router;
