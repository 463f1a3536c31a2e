//! Job scheduler
//!
//! Drives job bodies from timers (cron patterns and cadences) and from
//! entity lifecycle events. Every fire builds a fresh root scope and runs the
//! body under the invocation gate. Failures are logged and contained: one
//! failing tick never stops later ticks or other jobs.
//!
//! Job state machine:
//!
//! ```text
//! Idle -> Scheduled -> Running -> Scheduled -> ...
//!   \__________\___________\_____> Stopped   (stop())
//! ```

mod schedule;

pub use schedule::{parse_delay, CronSchedule, ScheduleError, Timing};

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::context::RuntimeContext;
use crate::db::{EntityEvent, EntityEventKind};
use crate::errors::EngineError;
use crate::executor::{ExecError, Val, VM};
use crate::types::{JobDef, Trigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Scheduled,
    Running,
    Stopped,
}

/// What arms a job
enum Plan {
    Timer(Timing),
    Lifecycle {
        entity: String,
        event: EntityEventKind,
    },
}

struct Job {
    def: JobDef,
    plan: Plan,
    delay: Option<Duration>,
    state: Mutex<JobState>,
}

impl Job {
    fn compile(def: JobDef) -> Result<Self, ScheduleError> {
        let plan = match &def.trigger {
            Trigger::Cron { pattern } => Plan::Timer(Timing::cron(pattern)?),
            Trigger::Every { cadence } => Plan::Timer(Timing::cadence(cadence)?),
            Trigger::Entity { entity, event } => Plan::Lifecycle {
                entity: entity.clone(),
                event: *event,
            },
        };
        let delay = def.delay.as_deref().map(parse_delay).transpose()?;
        Ok(Self {
            def,
            plan,
            delay,
            state: Mutex::new(JobState::Idle),
        })
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the body once with `bindings` in a fresh root scope
    ///
    /// The job goes back to its previous state afterwards unless it was
    /// stopped meanwhile.
    fn run(&self, ctx: &RuntimeContext, bindings: HashMap<String, Val>) -> Result<Val, ExecError> {
        let previous = std::mem::replace(&mut *self.state(), JobState::Running);

        let invocation = Uuid::new_v4();
        let result = {
            let _gate = ctx.lock_invocation();
            tracing::debug!(job = %self.def.name, %invocation, "job tick");
            VM::with_bindings(ctx, bindings).execute_block(&self.def.body)
        };

        let mut state = self.state();
        if *state == JobState::Running {
            *state = previous;
        }
        result
    }

    /// Scheduled fire: errors are logged, never propagated
    fn fire(&self, ctx: &RuntimeContext, bindings: HashMap<String, Val>) {
        if let Err(err) = self.run(ctx, bindings) {
            tracing::error!(job = %self.def.name, error = %err, "job tick failed");
        }
    }
}

enum Phase {
    Idle,
    Started(Vec<JoinHandle<()>>),
    Stopped,
}

pub struct Scheduler {
    ctx: RuntimeContext,
    jobs: Vec<Arc<Job>>,
    token: CancellationToken,
    phase: Mutex<Phase>,
}

impl Scheduler {
    /// Validate every trigger and delay; no timers are armed until `start()`
    pub fn new(ctx: RuntimeContext, jobs: Vec<JobDef>) -> Result<Self, ScheduleError> {
        let jobs = jobs
            .into_iter()
            .map(|def| Job::compile(def).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            ctx,
            jobs,
            token: CancellationToken::new(),
            phase: Mutex::new(Phase::Idle),
        })
    }

    /// Arm timers and lifecycle listeners
    ///
    /// Must be called from within a tokio runtime. Starting twice is a no-op;
    /// a stopped scheduler stays stopped.
    pub fn start(&self) -> bool {
        let mut phase = self.phase();
        if !matches!(*phase, Phase::Idle) {
            tracing::warn!("scheduler already started or stopped");
            return false;
        }

        let mut tasks = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            *job.state() = JobState::Scheduled;
            let ctx = self.ctx.clone();
            let token = self.token.child_token();
            let job = Arc::clone(job);

            let task = if matches!(job.plan, Plan::Timer(_)) {
                tokio::spawn(run_timer(ctx, job, token))
            } else {
                // Subscribe before spawning so no event after start() is missed
                let events = ctx.db().subscribe();
                tokio::spawn(run_listener(ctx, job, events, token))
            };
            tasks.push(task);
        }

        tracing::info!(jobs = self.jobs.len(), "scheduler started");
        *phase = Phase::Started(tasks);
        true
    }

    /// Cancel every timer and listener and mark all jobs stopped
    ///
    /// A tick already running finishes; nothing fires afterwards.
    pub fn stop(&self) {
        self.token.cancel();
        for job in &self.jobs {
            *job.state() = JobState::Stopped;
        }
        let previous = std::mem::replace(&mut *self.phase(), Phase::Stopped);
        if let Phase::Started(tasks) = previous {
            drop(tasks);
            tracing::info!("scheduler stopped");
        }
    }

    /// Stop and wait for every task to exit
    pub async fn shutdown(&self) {
        self.token.cancel();
        for job in &self.jobs {
            *job.state() = JobState::Stopped;
        }
        let previous = std::mem::replace(&mut *self.phase(), Phase::Stopped);
        if let Phase::Started(tasks) = previous {
            for task in tasks {
                if let Err(err) = task.await {
                    tracing::error!(error = %err, "scheduler task panicked");
                }
            }
            tracing::info!("scheduler stopped");
        }
    }

    /// Fire one tick of `name` now, on the caller's thread
    ///
    /// Unlike scheduled ticks, failures are returned to the caller. A
    /// lifecycle job sees `record` bound to null.
    pub fn run_job(&self, name: &str) -> Result<Val, EngineError> {
        let job = self
            .find(name)
            .ok_or_else(|| EngineError::UnknownJob(name.to_string()))?;
        let mut bindings = HashMap::new();
        if matches!(job.plan, Plan::Lifecycle { .. }) {
            bindings.insert("record".to_string(), Val::Null);
        }
        Ok(job.run(&self.ctx, bindings)?)
    }

    pub fn state(&self, name: &str) -> Option<JobState> {
        self.find(name).map(|job| *job.state())
    }

    /// `(name, trigger, state)` for every job, in definition order
    pub fn jobs(&self) -> Vec<(String, String, JobState)> {
        self.jobs
            .iter()
            .map(|job| {
                (
                    job.def.name.clone(),
                    job.def.trigger.to_string(),
                    *job.state(),
                )
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<Job>> {
        self.jobs.iter().find(|job| job.def.name == name)
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/* ===================== Tasks ===================== */

/// Sleep for `wait`; false when cancelled first
async fn sleep_or_cancel(token: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}

async fn run_timer(ctx: RuntimeContext, job: Arc<Job>, token: CancellationToken) {
    let Plan::Timer(timing) = &job.plan else {
        return;
    };

    if let Some(delay) = job.delay {
        if !sleep_or_cancel(&token, delay).await {
            return;
        }
    }

    loop {
        let now = ctx.now();
        let Some(next) = timing.next_after(now) else {
            tracing::warn!(job = %job.def.name, "schedule has no future fire time");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(job = %job.def.name, next = %next, "job armed");

        if !sleep_or_cancel(&token, wait).await {
            return;
        }
        job.fire(&ctx, HashMap::new());
    }
}

async fn run_listener(
    ctx: RuntimeContext,
    job: Arc<Job>,
    mut events: tokio::sync::broadcast::Receiver<EntityEvent>,
    token: CancellationToken,
) {
    let Plan::Lifecycle { entity, event } = &job.plan else {
        return;
    };

    loop {
        let received = tokio::select! {
            _ = token.cancelled() => return,
            received = events.recv() => received,
        };

        match received {
            Ok(ev) if ev.entity == *entity && ev.kind == *event => {
                if let Some(delay) = job.delay {
                    if !sleep_or_cancel(&token, delay).await {
                        return;
                    }
                }
                let mut bindings = HashMap::new();
                bindings.insert("record".to_string(), Val::Record(ev.record));
                job.fire(&ctx, bindings);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(job = %job.def.name, skipped, "lifecycle events dropped");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
