// ── Operation reports ──
//
// Every control operation returns one of these instead of an error.
// Steps are appended as they complete, so a report that failed midway
// still carries the output of everything that ran before the failure.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CoreError, ErrorKind};

/// Which control operation produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[strum(to_string = "Index restart")]
    Restart,
    #[strum(to_string = "ngacs stop")]
    Stop,
    #[strum(to_string = "ngacs start")]
    Start,
    #[strum(to_string = "Reboot")]
    Reboot,
    #[strum(to_string = "Ping")]
    Ping,
    #[strum(to_string = "Exec")]
    Exec,
}

/// One timed remote command (or API call).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub duration_ms: u64,
    pub output: String,
}

/// Why a report is marked failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFailure {
    /// Stage the operation was in, for staged operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

/// Human-readable and serializable outcome of a control operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub operation: Operation,
    pub target: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub notes: Vec<String>,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ReportFailure>,
    #[serde(skip)]
    clock: Instant,
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl OperationReport {
    /// Start a report; the clock runs until `succeed` or `fail`.
    pub fn begin(operation: Operation, target: impl Into<String>) -> Self {
        Self {
            operation,
            target: target.into(),
            success: false,
            started_at: Utc::now(),
            elapsed_ms: 0,
            notes: Vec::new(),
            steps: Vec::new(),
            failure: None,
            clock: Instant::now(),
        }
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.notes.push(line.into());
    }

    pub fn push_step(
        &mut self,
        name: impl Into<String>,
        command: Option<&str>,
        duration: Duration,
        output: impl Into<String>,
    ) {
        self.steps.push(StepRecord {
            name: name.into(),
            command: command.map(str::to_owned),
            duration_ms: millis(duration),
            output: output.into(),
        });
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn succeed(mut self) -> Self {
        self.success = true;
        self.failure = None;
        self.elapsed_ms = millis(self.clock.elapsed());
        self
    }

    pub fn fail(self, stage: Option<&str>, err: &CoreError) -> Self {
        self.fail_with(stage, err.kind(), err.to_string())
    }

    /// Mark failed without an underlying error value.
    pub fn fail_with(mut self, stage: Option<&str>, kind: ErrorKind, message: String) -> Self {
        self.success = false;
        self.failure = Some(ReportFailure {
            stage: stage.map(str::to_owned),
            kind,
            message,
        });
        self.elapsed_ms = millis(self.clock.elapsed());
        self
    }

    /// Wall-clock time of the whole operation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            writeln!(f, "✅ {} completed for {}.", self.operation, self.target)?;
        } else {
            writeln!(f, "❌ {} failed for {}.", self.operation, self.target)?;
        }

        for line in &self.notes {
            writeln!(f, "{line}")?;
        }

        for step in &self.steps {
            writeln!(f)?;
            writeln!(f, "⏱️ {} completed in {} ms", step.name, step.duration_ms)?;
            if !step.output.trim().is_empty() {
                writeln!(f, "Output:")?;
                writeln!(f, "{}", step.output.trim_end())?;
            }
        }

        if let Some(failure) = &self.failure {
            writeln!(f)?;
            match &failure.stage {
                Some(stage) => writeln!(f, "Error ({stage}): {}", failure.message)?,
                None => writeln!(f, "Error: {}", failure.message)?,
            }
        }

        write!(f, "⏱️ Total: {} ms", self.elapsed_ms)
    }
}
