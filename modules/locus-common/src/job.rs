use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LocusError, Result};
use crate::types::Report;

// --- Identity ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = LocusError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| LocusError::Validation(format!("invalid job id '{s}': {e}")))
    }
}

// --- Status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward-only lifecycle: pending → running → {completed | failed}.
    /// A job may also fail before it starts running.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

// --- Job ---

/// One discovery request's tracked unit of work.
///
/// Fields are only mutated through the methods below, which keep
/// `result`/`error`/`completed_at` consistent with `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub company: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(company: impl Into<String>) -> Self {
        let company = company.into();
        Self {
            id: JobId::new(),
            message: format!("Job queued for processing: {company}"),
            company,
            status: JobStatus::Pending,
            progress: 0,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(LocusError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self, progress: u8, message: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Running)?;
        self.advance(progress, message)
    }

    /// Move to the next stage checkpoint. Progress never goes backwards.
    pub fn advance(&mut self, progress: u8, message: impl Into<String>) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(LocusError::Validation(format!(
                "cannot advance a {} job",
                self.status
            )));
        }
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
        Ok(())
    }

    pub fn complete(&mut self, report: Report) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.message = format!(
            "Discovery completed - found {} locations",
            report.locations.len()
        );
        self.progress = 100;
        self.result = Some(report);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Progress is left where it stopped for diagnostics.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        let error = error.into();
        self.message = format!("Error during processing: {error}");
        self.error = Some(error);
        self.result = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
