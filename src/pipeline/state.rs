use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use crate::errors::AutopatchError;
use crate::models::{OutcomeStatus, RemediationOutcome};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Resolve,
    Integrity,
    Execution,
    VersionControl,
}

impl From<OutcomeStatus> for FailureKind {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::FailedResolve => FailureKind::Resolve,
            OutcomeStatus::FailedIntegrity => FailureKind::Integrity,
            OutcomeStatus::FailedVersionControl => FailureKind::VersionControl,
            _ => FailureKind::Execution,
        }
    }
}

/// Lifecycle of one finding through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingState {
    Parsed,
    Skipped,
    Resolving,
    Resolved,
    Verifying,
    Verified,
    Executing,
    Applied,
    Failed(FailureKind),
}

impl FindingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Applied | Self::Failed(_))
    }

    pub fn can_transition_to(&self, next: FindingState) -> bool {
        use FindingState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed(_)) => true,
            (Parsed, Skipped) | (Parsed, Resolving) => true,
            (Resolving, Resolved) => true,
            (Resolved, Verifying) => true,
            (Verifying, Verified) => true,
            (Verified, Executing) => true,
            (Executing, Applied) => true,
            _ => false,
        }
    }
}

/// Tracks one finding's state and refuses out-of-order transitions.
#[derive(Debug)]
pub struct FindingTracker {
    identifier: String,
    state: FindingState,
}

impl FindingTracker {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            state: FindingState::Parsed,
        }
    }

    pub fn state(&self) -> FindingState {
        self.state
    }

    pub fn advance(&mut self, next: FindingState) -> Result<(), AutopatchError> {
        if !self.state.can_transition_to(next) {
            return Err(AutopatchError::Internal(format!(
                "illegal transition for {}: {:?} -> {:?}",
                self.identifier, self.state, next
            )));
        }
        debug!(identifier = %self.identifier, from = ?self.state, to = ?next, "Finding state");
        self.state = next;
        Ok(())
    }

    /// Move to `Failed`. A finding that already ended keeps its state.
    pub fn fail(&mut self, kind: FailureKind) {
        if !self.state.is_terminal() {
            self.state = FindingState::Failed(kind);
        }
    }
}

/// Aggregate view of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_findings: usize,
    pub status_counts: HashMap<String, usize>,
}

impl RunSummary {
    pub fn from_outcomes(run_id: &str, started_at: DateTime<Utc>, outcomes: &[RemediationOutcome]) -> Self {
        let mut status_counts: HashMap<String, usize> = HashMap::new();
        for o in outcomes {
            *status_counts.entry(o.status.to_string()).or_insert(0) += 1;
        }
        let duration_ms = Utc::now()
            .signed_duration_since(started_at)
            .num_milliseconds()
            .max(0) as u64;
        Self {
            run_id: run_id.to_string(),
            started_at,
            duration_ms,
            total_findings: outcomes.len(),
            status_counts,
        }
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn failures(&self) -> usize {
        self.total_findings - self.count(OutcomeStatus::Applied) - self.count(OutcomeStatus::SkippedNotUsed)
    }
}
