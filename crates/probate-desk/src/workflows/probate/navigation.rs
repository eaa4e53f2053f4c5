use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::Matter;
use super::journey::{JourneyStepStatus, StepId};
use super::status::{has_reached_status, PortalStatus};

/// Days that must pass after notices are delivered before filing.
pub const NOTICE_WAIT_DAYS: i64 = 21;

/// Client-facing steps of the portal, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalStep {
    Intake,
    WillSearch,
    Notices,
    ProbatePackage,
    ProbateFiling,
    Grant,
    PostGrant,
    Closeout,
}

impl PortalStep {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Intake,
            Self::WillSearch,
            Self::Notices,
            Self::ProbatePackage,
            Self::ProbateFiling,
            Self::Grant,
            Self::PostGrant,
            Self::Closeout,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::WillSearch => "will_search",
            Self::Notices => "notices",
            Self::ProbatePackage => "probate_package",
            Self::ProbateFiling => "probate_filing",
            Self::Grant => "grant",
            Self::PostGrant => "post_grant",
            Self::Closeout => "closeout",
        }
    }

    pub fn step_id(self) -> StepId {
        StepId::from_static(self.key())
    }

    /// Status at which the step becomes available. Intake is always open.
    pub const fn unlocked_at(self) -> Option<PortalStatus> {
        match self {
            Self::Intake => None,
            Self::WillSearch => Some(PortalStatus::IntakeComplete),
            Self::Notices => Some(PortalStatus::WillSearchSent),
            Self::ProbatePackage => Some(PortalStatus::NoticesWaiting21Days),
            Self::ProbateFiling => Some(PortalStatus::ProbatePackageReady),
            Self::Grant => Some(PortalStatus::ProbateFiled),
            Self::PostGrant => Some(PortalStatus::GrantComplete),
            Self::Closeout => Some(PortalStatus::EstateCloseout),
        }
    }

    pub const fn completed_at(self) -> PortalStatus {
        match self {
            Self::Intake => PortalStatus::IntakeComplete,
            Self::WillSearch => PortalStatus::WillSearchSent,
            Self::Notices => PortalStatus::NoticesWaiting21Days,
            Self::ProbatePackage => PortalStatus::ProbatePackageReady,
            Self::ProbateFiling => PortalStatus::ProbateFiled,
            Self::Grant => PortalStatus::GrantComplete,
            Self::PostGrant => PortalStatus::EstateCloseout,
            Self::Closeout => PortalStatus::Done,
        }
    }

    pub fn is_unlocked(self, status: Option<PortalStatus>) -> bool {
        match self.unlocked_at() {
            Some(threshold) => has_reached_status(status, threshold),
            None => true,
        }
    }

    pub fn is_complete(self, status: Option<PortalStatus>) -> bool {
        has_reached_status(status, self.completed_at())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepAccess {
    pub step: PortalStep,
    pub unlocked: bool,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist: Option<JourneyStepStatus>,
}

/// What the client may open right now, derived from the portal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseNavigation {
    pub status: Option<PortalStatus>,
    pub current_step: PortalStep,
    pub steps: Vec<StepAccess>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filing_opens_on: Option<NaiveDate>,
}

impl CaseNavigation {
    pub fn derive(matter: &Matter) -> Self {
        let status = if matter.is_not_fit() {
            None
        } else {
            matter.portal_status
        };

        let steps: Vec<StepAccess> = PortalStep::ordered()
            .into_iter()
            .map(|step| StepAccess {
                step,
                unlocked: !matter.is_not_fit() && step.is_unlocked(status),
                complete: step.is_complete(status),
                checklist: matter.journey.get(step.key()),
            })
            .collect();

        let current_step = steps
            .iter()
            .find(|access| access.unlocked && !access.complete)
            .map(|access| access.step)
            .unwrap_or(if has_reached_status(status, PortalStatus::Done) {
                PortalStep::Closeout
            } else {
                PortalStep::Intake
            });

        Self {
            status,
            current_step,
            steps,
            filing_opens_on: filing_opens_on(matter.milestones.notices_served_on),
        }
    }

    pub fn is_unlocked(&self, step: PortalStep) -> bool {
        self.steps
            .iter()
            .any(|access| access.step == step && access.unlocked)
    }
}

pub fn filing_opens_on(notices_served_on: Option<NaiveDate>) -> Option<NaiveDate> {
    notices_served_on.map(|served| served + Duration::days(NOTICE_WAIT_DAYS))
}
