//! Test fixtures for the incident triage workspace
//!
//! Log scenarios, a scripted [`Reasoner`] that records what it was asked,
//! and stages that misbehave on purpose.

#![allow(missing_docs)]

use incident_core::error::{ReasonerError, StageError};
use incident_core::reasoner::{Reasoner, ReasonerRequest, ReasoningTask, RuleReasoner};
use incident_core::stages::Stage;
use incident_core::state::{StageInput, StageOutput, StageUpdate};
use incident_core::{Issue, LogEntry, LogLevel, PipelineInput, Severity, StageId};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// Day every fixture entry is logged on
pub const FIXTURE_DATE: &str = "2024-01-15";

/// Entry at `time` (`HH:MM:SS`) on [`FIXTURE_DATE`]
pub fn entry(line: u32, time: &str, level: LogLevel, service: &str, message: &str) -> LogEntry {
    LogEntry::new(line, format!("{FIXTURE_DATE} {time}"), level, service, message)
}

/// Three auth failures followed by a payment outage naming the auth service
pub fn auth_cascade() -> PipelineInput {
    PipelineInput::new(
        vec![
            entry(1, "10:00:00", LogLevel::Warn, "auth-service", "authentication failed for user X"),
            entry(2, "10:00:05", LogLevel::Warn, "auth-service", "authentication failed for user X"),
            entry(3, "10:00:08", LogLevel::Warn, "auth-service", "authentication failed for user X"),
            entry(4, "10:00:12", LogLevel::Critical, "payment-service", "auth-service unreachable, payments failing"),
        ],
        vec![
            Issue::new("Repeated authentication failures on auth-service", Severity::High).at_line(1),
            Issue::new("payment-service cannot reach auth-service", Severity::Critical).at_line(4),
        ],
    )
}

/// One INFO entry and nothing else
pub fn isolated_info() -> PipelineInput {
    PipelineInput::new(
        vec![entry(1, "09:00:00", LogLevel::Info, "api", "service started on port 8080")],
        Vec::new(),
    )
}

/// Two unrelated cascades an hour apart
///
/// The first starts in `db`, the second in `cache`.
pub fn two_incidents() -> PipelineInput {
    PipelineInput::new(
        vec![
            entry(1, "10:00:00", LogLevel::Error, "db", "write failed: disk full"),
            entry(2, "10:00:04", LogLevel::Error, "orders", "db write failed, order not saved"),
            entry(3, "11:00:00", LogLevel::Error, "cache", "eviction storm, hit rate collapsed"),
            entry(4, "11:00:06", LogLevel::Critical, "web", "cache timeouts, pages failing"),
        ],
        vec![
            Issue::new("Orders lost while db disk is full", Severity::Critical).at_line(2),
            Issue::new("Web pages failing on cache timeouts", Severity::Medium).at_line(4),
        ],
    )
}

/// Steadily worsening disk on `db` and a nearly exhausted pool on `api`
pub fn resource_pressure() -> PipelineInput {
    PipelineInput::new(
        vec![
            entry(1, "10:00:00", LogLevel::Warn, "db", "disk usage 84%"),
            entry(2, "10:05:00", LogLevel::Warn, "db", "disk usage 89%"),
            entry(3, "10:10:00", LogLevel::Error, "db", "disk usage 95%"),
            entry(4, "10:30:00", LogLevel::Warn, "api", "connection pool at 16/20 connections"),
            entry(5, "11:30:00", LogLevel::Error, "api", "connection pool at 19/20 connections"),
        ],
        vec![Issue::new("db disk filling up", Severity::High).at_line(3)],
    )
}

type Script = dyn Fn(&ReasonerRequest) -> Option<Result<Value, ReasonerError>> + Send + Sync;

/// Reasoner driven by a closure
///
/// Requests the closure declines (returns `None`) go to [`RuleReasoner`].
/// Every request is recorded.
pub struct ScriptedReasoner {
    script: Box<Script>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ReasonerRequest>>,
}

impl std::fmt::Debug for ScriptedReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedReasoner")
            .field("delay", &self.delay)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl ScriptedReasoner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&ReasonerRequest) -> Option<Result<Value, ReasonerError>> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Rule answers for everything, with recording
    pub fn rules() -> Self {
        Self::new(|_| None)
    }

    /// Fail requests matching `predicate` as unavailable
    pub fn failing_when<P>(predicate: P) -> Self
    where
        P: Fn(&ReasonerRequest) -> bool + Send + Sync + 'static,
    {
        Self::new(move |request| {
            predicate(request).then(|| Err(ReasonerError::Unavailable("scripted outage".to_string())))
        })
    }

    /// Sleep before every answer
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ReasonerRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn calls_for(&self, task: ReasoningTask) -> usize {
        self.requests
            .lock()
            .map(|r| r.iter().filter(|req| req.task == task).count())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Reasoner for ScriptedReasoner {
    async fn reason(&self, request: ReasonerRequest) -> Result<Value, ReasonerError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match (self.script)(&request) {
            Some(reply) => reply,
            None => RuleReasoner.reason(request).await,
        }
    }
}

/// How a [`MisbehavingStage`] goes wrong
#[derive(Debug, Clone)]
pub enum Misbehavior {
    /// Return a stage error
    Fail(String),
    Panic(String),
    /// Sleep, then return the empty output for the stage
    Stall(Duration),
    /// Write to a field another stage owns
    TrespassField,
}

/// Stand-in for a built-in stage
#[derive(Debug, Clone)]
pub struct MisbehavingStage {
    id: StageId,
    misbehavior: Misbehavior,
}

impl MisbehavingStage {
    pub fn new(id: StageId, misbehavior: Misbehavior) -> Self {
        Self { id, misbehavior }
    }

    pub fn failing(id: StageId) -> Self {
        Self::new(id, Misbehavior::Fail(format!("{id} exploded")))
    }

    pub fn panicking(id: StageId) -> Self {
        Self::new(id, Misbehavior::Panic(format!("{id} panicked")))
    }

    pub fn stalling(id: StageId, duration: Duration) -> Self {
        Self::new(id, Misbehavior::Stall(duration))
    }

    pub fn trespassing(id: StageId) -> Self {
        Self::new(id, Misbehavior::TrespassField)
    }
}

#[async_trait::async_trait]
impl Stage for MisbehavingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _input: StageInput, _reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError> {
        match &self.misbehavior {
            Misbehavior::Fail(message) => Err(StageError::Failed(message.clone())),
            Misbehavior::Panic(message) => panic!("{message}"),
            Misbehavior::Stall(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(StageUpdate::new(StageOutput::Nothing))
            }
            Misbehavior::TrespassField => {
                let output = if self.id == StageId::Cookbook {
                    StageOutput::Tickets(Vec::new())
                } else {
                    StageOutput::Cookbook("# written by the wrong stage".to_string())
                };
                Ok(StageUpdate::new(output))
            }
        }
    }
}
