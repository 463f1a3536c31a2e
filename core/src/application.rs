//! Application wiring
//!
//! Builds a ready-to-dispatch engine from configuration and a program:
//! registers models with the database, compiles routes and validates job
//! schedules. Nothing is armed until `start()`.

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::context::{Clock, LogSink, RuntimeContext};
use crate::errors::EngineError;
use crate::executor::{json_to_val_map, val_to_json};
use crate::router::Router;
use crate::scheduler::{JobState, Scheduler};
use crate::types::{Method, Program};

/// A loaded program bound to its runtime context
pub struct Application {
    pub config: Config,
    context: RuntimeContext,
    router: Router,
    scheduler: Scheduler,
}

impl Application {
    /// Wire a program to a context (no I/O)
    pub fn new(config: Config, program: Program, context: RuntimeContext) -> Result<Self> {
        for model in &program.models {
            context.db().define(model);
        }
        let router = Router::new(program.endpoints);
        let scheduler = Scheduler::new(context.clone(), program.jobs)
            .context("Invalid job schedule")?;

        Ok(Self {
            config,
            context,
            router,
            scheduler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    /// Run the endpoint matching `method` and `path`; the result is plain JSON
    pub fn dispatch(
        &self,
        method: &str,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<JsonValue, EngineError> {
        self.router
            .dispatch(&self.context, method, path, body)
            .map(|value| val_to_json(&value))
    }

    /// Arm job timers and listeners, unless disabled in configuration
    ///
    /// Returns whether the scheduler was armed by this call.
    pub fn start(&self) -> bool {
        if !self.config.scheduler.enabled {
            tracing::info!("scheduler disabled by configuration");
            return false;
        }
        self.scheduler.start()
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Stop the scheduler and wait for its tasks to exit
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    pub fn run_job(&self, name: &str) -> Result<JsonValue, EngineError> {
        self.scheduler.run_job(name).map(|value| val_to_json(&value))
    }

    pub fn job_state(&self, name: &str) -> Option<JobState> {
        self.scheduler.state(name)
    }

    pub fn routes(&self) -> Vec<(Method, String)> {
        self.router.routes()
    }

    pub fn jobs(&self) -> Vec<(String, String, JobState)> {
        self.scheduler.jobs()
    }

    /// Insert fixture records: `{"Entity": [{...}, ...], ...}`
    ///
    /// Returns how many records were created.
    pub fn seed(&self, data: &JsonValue) -> Result<usize> {
        let JsonValue::Object(tables) = data else {
            bail!("Seed data must be an object of entity name to record list");
        };

        let mut created = 0;
        for (entity, rows) in tables {
            let JsonValue::Array(rows) = rows else {
                bail!("Seed data for '{}' must be a list of records", entity);
            };
            for row in rows {
                let JsonValue::Object(fields) = row else {
                    bail!("Seed record for '{}' must be an object", entity);
                };
                self.context.db().create(entity, json_to_val_map(fields));
                created += 1;
            }
        }
        Ok(created)
    }

    /// Every table as JSON
    pub fn dump(&self) -> JsonValue {
        self.context.db().dump()
    }
}

/// Options for initializing an application
#[derive(Clone, Default)]
pub struct InitOptions {
    /// Config file path (overrides default search)
    pub config_path: Option<PathBuf>,

    /// Program file (overrides config and env)
    pub program_path: Option<PathBuf>,

    /// Already-parsed program; takes precedence over any path
    pub program: Option<Program>,

    /// Override `scheduler.enabled`
    pub scheduler_enabled: Option<bool>,

    pub log_sink: Option<Arc<dyn LogSink>>,
    pub clock: Option<Arc<dyn Clock>>,
}

/// Builder for constructing InitOptions
#[derive(Default)]
pub struct InitBuilder {
    options: InitOptions,
}

impl InitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn program_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.program_path = Some(path.into());
        self
    }

    pub fn program(mut self, program: Program) -> Self {
        self.options.program = Some(program);
        self
    }

    pub fn scheduler_enabled(mut self, enabled: bool) -> Self {
        self.options.scheduler_enabled = Some(enabled);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.options.log_sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.options.clock = Some(clock);
        self
    }

    pub fn init(self) -> Result<Application> {
        initialize(self.options)
    }
}

/// Load configuration and the program, then wire the application
pub fn initialize(options: InitOptions) -> Result<Application> {
    let config = Config::builder()
        .config_path(options.config_path)
        .program(options.program_path)
        .scheduler_enabled(options.scheduler_enabled)
        .build()?;

    let program = match (options.program, &config.program) {
        (Some(program), _) => program,
        (None, Some(path)) => Program::load(path)?,
        (None, None) => bail!("No program configured: pass --program or set KEEL_PROGRAM"),
    };

    let mut context = RuntimeContext::new();
    if let Some(sink) = options.log_sink {
        context = context.with_log_sink(sink);
    }
    if let Some(clock) = options.clock {
        context = context.with_clock(clock);
    }

    tracing::debug!(
        models = program.models.len(),
        endpoints = program.endpoints.len(),
        jobs = program.jobs.len(),
        "program loaded"
    );
    Application::new(config, program, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemorySink;
    use serde_json::json;

    fn reminders_program() -> Program {
        serde_json::from_value(json!({
            "models": [{"name": "Reminder", "fields": [
                {"name": "text", "type": "string"},
                {"name": "done", "type": "boolean", "default": false}
            ]}],
            "endpoints": [
                {"method": "POST", "path": "/reminders", "body": [
                    {"type": "expression", "expression": {"type": "call",
                        "callee": {"type": "identifier", "name": "log"},
                        "arguments": [{"type": "literal", "value": "creating"}, {"type": "identifier", "name": "text"}]}},
                    {"type": "return", "value": {"type": "call",
                        "callee": {"type": "member", "object": {"type": "member",
                            "object": {"type": "identifier", "name": "db"}, "property": "Reminder"},
                            "property": "create"},
                        "arguments": [{"type": "identifier", "name": "body"}]}}
                ]},
                {"method": "GET", "path": "/reminders/:id", "body": [
                    {"type": "return", "value": {"type": "call",
                        "callee": {"type": "member", "object": {"type": "member",
                            "object": {"type": "identifier", "name": "db"}, "property": "Reminder"},
                            "property": "find"},
                        "arguments": [{"type": "identifier", "name": "id"}]}}
                ]}
            ],
            "jobs": [{
                "name": "count",
                "trigger": {"kind": "every", "cadence": "hourly"},
                "body": [{"type": "return", "value": {"type": "call",
                    "callee": {"type": "member", "object": {"type": "member",
                        "object": {"type": "identifier", "name": "db"}, "property": "Reminder"},
                        "property": "count"},
                    "arguments": []}}]
            }]
        }))
        .expect("Program deserialization failed")
    }

    fn app(sink: Arc<MemorySink>) -> Application {
        Application::new(
            Config::default(),
            reminders_program(),
            RuntimeContext::new().with_log_sink(sink),
        )
        .unwrap()
    }

    #[test]
    fn test_dispatch_applies_model_defaults() {
        let sink = Arc::new(MemorySink::new());
        let app = app(sink.clone());

        let created = app
            .dispatch("POST", "/reminders", Some(json!({"text": "Walk dog"})))
            .unwrap();
        assert_eq!(created, json!({"id": 1, "text": "Walk dog", "done": false}));
        assert_eq!(sink.lines(), vec!["creating Walk dog"]);

        let fetched = app.dispatch("GET", "/reminders/1", None).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_seed_and_run_job() {
        let app = app(Arc::new(MemorySink::new()));
        let created = app
            .seed(&json!({"Reminder": [{"text": "a"}, {"text": "b"}]}))
            .unwrap();
        assert_eq!(created, 2);
        assert_eq!(app.run_job("count").unwrap(), json!(2));
        assert!(app.seed(&json!({"Reminder": "nope"})).is_err());
    }

    #[test]
    fn test_dispatch_unknown_route() {
        let app = app(Arc::new(MemorySink::new()));
        assert!(matches!(
            app.dispatch("GET", "/missing", None),
            Err(EngineError::EndpointNotFound { .. })
        ));
    }

    #[test]
    fn test_init_builder_with_program() {
        let app = InitBuilder::new()
            .program(reminders_program())
            .scheduler_enabled(false)
            .init()
            .unwrap();
        assert_eq!(app.routes().len(), 2);
        assert_eq!(app.jobs()[0].0, "count");
        assert!(!app.config().scheduler.enabled);
    }

    #[test]
    fn test_demo_program() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../demos/reminders.json");
        let sink = Arc::new(MemorySink::new());
        let app = Application::new(
            Config::default(),
            Program::load(path).unwrap(),
            RuntimeContext::new().with_log_sink(sink.clone()),
        )
        .unwrap();

        assert_eq!(
            app.dispatch("POST", "/reminders", Some(json!({}))).unwrap(),
            json!({"error": "text is required"})
        );
        app.dispatch("POST", "/reminders", Some(json!({"text": "Walk dog"})))
            .unwrap();
        app.dispatch("POST", "/reminders", Some(json!({"text": "Feed cat", "due": 9e15})))
            .unwrap();

        assert_eq!(app.run_job("mark-due").unwrap(), json!(1));
        assert_eq!(
            app.dispatch("GET", "/reminders/1", None).unwrap()["done"],
            json!(true)
        );
        assert_eq!(
            app.dispatch("PATCH", "/reminders/2/done", None).unwrap()["done"],
            json!(true)
        );
        assert_eq!(
            app.dispatch("DELETE", "/reminders/2", None).unwrap(),
            json!({"deleted": 1})
        );
        assert_eq!(
            sink.lines(),
            vec![
                "created reminder 1",
                "created reminder 2",
                "marked 1 reminder(s) done"
            ]
        );
    }

    #[tokio::test]
    async fn test_start_respects_disabled_scheduler() {
        let mut config = Config::default();
        config.scheduler.enabled = false;
        let app = Application::new(config, reminders_program(), RuntimeContext::new()).unwrap();

        assert!(!app.start());
        assert_eq!(app.job_state("count"), Some(JobState::Idle));
        app.shutdown().await;
        assert_eq!(app.job_state("count"), Some(JobState::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_reports_armed_scheduler() {
        let app = app(Arc::new(MemorySink::new()));

        assert!(app.start());
        assert_eq!(app.job_state("count"), Some(JobState::Scheduled));
        assert!(!app.start());

        app.shutdown().await;
        assert!(!app.start());
    }
}
