//! Portal status state machine.
//!
//! The lifecycle is linear: every status has exactly one position in
//! [`PORTAL_STATUSES`], and normal transitions may only move forward along it.
//! A matter that has not finished intake has no status (`None`), which sits
//! before the first entry.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalStatus {
    IntakeComplete,
    WillSearchPrepping,
    WillSearchReady,
    WillSearchSent,
    NoticesInProgress,
    #[serde(rename = "notices_waiting_21_days")]
    NoticesWaiting21Days,
    ProbatePackagePrepping,
    ProbatePackageReady,
    ProbateFilingReady,
    ProbateFilingInProgress,
    ProbateFiled,
    WaitingForGrant,
    GrantComplete,
    PostGrantActive,
    EstateCloseout,
    Done,
}

/// Canonical forward order of the case lifecycle.
pub const PORTAL_STATUSES: [PortalStatus; 16] = [
    PortalStatus::IntakeComplete,
    PortalStatus::WillSearchPrepping,
    PortalStatus::WillSearchReady,
    PortalStatus::WillSearchSent,
    PortalStatus::NoticesInProgress,
    PortalStatus::NoticesWaiting21Days,
    PortalStatus::ProbatePackagePrepping,
    PortalStatus::ProbatePackageReady,
    PortalStatus::ProbateFilingReady,
    PortalStatus::ProbateFilingInProgress,
    PortalStatus::ProbateFiled,
    PortalStatus::WaitingForGrant,
    PortalStatus::GrantComplete,
    PortalStatus::PostGrantActive,
    PortalStatus::EstateCloseout,
    PortalStatus::Done,
];

impl PortalStatus {
    pub fn position(self) -> usize {
        // Every variant is listed in PORTAL_STATUSES.
        PORTAL_STATUSES
            .iter()
            .position(|status| *status == self)
            .unwrap_or(PORTAL_STATUSES.len())
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IntakeComplete => "intake_complete",
            Self::WillSearchPrepping => "will_search_prepping",
            Self::WillSearchReady => "will_search_ready",
            Self::WillSearchSent => "will_search_sent",
            Self::NoticesInProgress => "notices_in_progress",
            Self::NoticesWaiting21Days => "notices_waiting_21_days",
            Self::ProbatePackagePrepping => "probate_package_prepping",
            Self::ProbatePackageReady => "probate_package_ready",
            Self::ProbateFilingReady => "probate_filing_ready",
            Self::ProbateFilingInProgress => "probate_filing_in_progress",
            Self::ProbateFiled => "probate_filed",
            Self::WaitingForGrant => "waiting_for_grant",
            Self::GrantComplete => "grant_complete",
            Self::PostGrantActive => "post_grant_active",
            Self::EstateCloseout => "estate_closeout",
            Self::Done => "done",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        PORTAL_STATUSES
            .iter()
            .copied()
            .find(|status| status.as_str() == normalized)
    }
}

impl fmt::Display for PortalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `current` is at or past `target`. A matter without a status has
/// reached nothing.
pub fn has_reached_status(current: Option<PortalStatus>, target: PortalStatus) -> bool {
    match current {
        Some(current) => current.position() >= target.position(),
        None => false,
    }
}

/// Coerces a stored or client-supplied value into a known status.
pub fn normalize_status(raw: Option<&str>, fallback: Option<PortalStatus>) -> Option<PortalStatus> {
    raw.and_then(PortalStatus::parse).or(fallback)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackwardTransition {
    pub from: PortalStatus,
    pub to: PortalStatus,
}

impl fmt::Display for BackwardTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot move case status back from {} to {}",
            self.from, self.to
        )
    }
}

/// Normal transitions go forward or stay put. Moving backward is reserved for
/// the operator override.
pub fn validate_transition(
    current: Option<PortalStatus>,
    target: PortalStatus,
) -> Result<(), BackwardTransition> {
    match current {
        Some(from) if from.position() > target.position() => {
            Err(BackwardTransition { from, to: target })
        }
        _ => Ok(()),
    }
}

/// Advance-if-behind; never regresses a status that is already further along.
pub fn advance(current: Option<PortalStatus>, target: PortalStatus) -> PortalStatus {
    match current {
        Some(current) if current.position() >= target.position() => current,
        _ => target,
    }
}
