use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::MatterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStepStatus {
    NotStarted,
    InProgress,
    Done,
}

impl JourneyStepStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

const MAX_STEP_ID_LEN: usize = 64;

/// Checklist step identifier: lowercase ascii, digits, and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(String);

impl StepId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_STEP_ID_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        valid.then(|| Self(trimmed.to_string()))
    }

    /// For compile-time step keys that already satisfy the format.
    pub(crate) fn from_static(key: &'static str) -> Self {
        Self(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Advisory per-step checklist layered over the portal status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JourneyState(BTreeMap<String, JourneyStepStatus>);

impl JourneyState {
    pub fn get(&self, step: &str) -> Option<JourneyStepStatus> {
        self.0.get(step).copied()
    }

    /// Returns the merged state; steps not named are left untouched.
    pub fn with_step(&self, step: &StepId, status: JourneyStepStatus) -> Self {
        let mut merged = self.0.clone();
        merged.insert(step.as_str().to_string(), status);
        Self(merged)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, JourneyStepStatus)> {
        self.0.iter().map(|(step, status)| (step.as_str(), *status))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Historical row written alongside every journey update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyLedgerEntry {
    pub matter_id: MatterId,
    pub step_id: StepId,
    pub status: JourneyStepStatus,
    pub recorded_at: DateTime<Utc>,
}
