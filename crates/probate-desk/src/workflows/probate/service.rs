use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::PortalConfig;

use super::authz::{authorize, authorize_owner, CaseAccess};
use super::collaborators::{append_audit, AuditAction, Collaborators, Reminder, ReminderKind};
use super::domain::{
    ArtifactStatus, CallbackSchedule, CaseCode, ClientKey, DocumentKind, IntakeDraft, Matter,
    MatterId, PathType, PhaseArtifact, Requisition, RightFitRecord, RightFitStatus, UserId,
};
use super::eligibility::{evaluate, EligibilityAnswers, EligibilityOutcome};
use super::error::{CaseError, ValidationErrors};
use super::journey::{JourneyState, JourneyStepStatus, StepId};
use super::navigation::{filing_opens_on, CaseNavigation, PortalStep};
use super::status::{has_reached_status, validate_transition, PortalStatus};
use super::store::{ArtifactWrite, CaseStore, Milestone, NewMatter, PhaseCommit};

/// Days after the will search packet is mailed before the client is nudged.
pub const WILL_SEARCH_FOLLOW_UP_DAYS: i64 = 28;

/// Result of an eligibility screening pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreeningResult {
    #[serde(flatten)]
    pub outcome: EligibilityOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matter_id: Option<MatterId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_code: Option<CaseCode>,
}

/// Everything the portal needs to render a case dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseView {
    pub matter: Matter,
    pub navigation: CaseNavigation,
    pub intake_submitted: bool,
    pub documents: Vec<PhaseArtifact>,
    pub callbacks: Vec<CallbackSchedule>,
    pub requisitions: Vec<Requisition>,
}

/// Case workflow service composing the store, the status machine, and the
/// outbound collaborators.
pub struct CaseWorkflowService<S> {
    pub(crate) store: Arc<S>,
    pub(crate) collaborators: Collaborators,
    pub(crate) portal: PortalConfig,
}

impl<S> CaseWorkflowService<S>
where
    S: CaseStore + 'static,
{
    pub fn new(store: Arc<S>, collaborators: Collaborators, portal: PortalConfig) -> Self {
        Self {
            store,
            collaborators,
            portal,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.collaborators.clock.now()
    }

    pub(crate) fn audit(
        &self,
        matter_id: Option<&MatterId>,
        actor: &str,
        action: AuditAction,
        meta: serde_json::Value,
    ) {
        append_audit(
            self.collaborators.audit.as_ref(),
            matter_id,
            actor,
            action,
            meta,
            self.now(),
        );
    }

    /// Runs the eligibility rules and, when the browser supplied its client
    /// key, records the verdict on the case.
    ///
    /// An eligible pass creates the case if none exists yet. A not-fit verdict
    /// is only recorded against a case that already exists.
    pub fn screen(
        &self,
        caller: Option<&UserId>,
        client_key: Option<ClientKey>,
        answers: &EligibilityAnswers,
    ) -> Result<ScreeningResult, CaseError> {
        let outcome = evaluate(answers);
        let Some(client_key) = client_key else {
            return Ok(ScreeningResult {
                outcome,
                matter_id: None,
                case_code: None,
            });
        };

        let now = self.now();
        let existing = match self.store.find_by_client_key(&client_key)? {
            Some(matter) => {
                let key_access = CaseAccess::ClientKey(client_key.clone());
                let owner_access = caller.map(|user| CaseAccess::Owner(user.clone()));
                let permitted = key_access.permits(&matter)
                    || owner_access.is_some_and(|access| access.permits(&matter));
                if !permitted {
                    return Err(CaseError::NotFound("matter"));
                }
                Some(matter)
            }
            None => None,
        };

        let matter = match (existing, outcome.is_eligible()) {
            (Some(matter), _) => Some(matter),
            (None, true) => {
                let matter = self.store.create_matter(NewMatter {
                    client_key,
                    user_id: caller.cloned(),
                    at: now,
                })?;
                info!(matter_id = %matter.id, case_code = %matter.case_code, "case opened from screening");
                self.audit(
                    Some(&matter.id),
                    &actor_for(caller),
                    AuditAction::MatterCreated,
                    json!({ "source": "eligibility" }),
                );
                Some(matter)
            }
            (None, false) => None,
        };

        let Some(matter) = matter else {
            return Ok(ScreeningResult {
                outcome,
                matter_id: None,
                case_code: None,
            });
        };

        let record = RightFitRecord {
            status: if outcome.is_eligible() {
                RightFitStatus::Eligible
            } else {
                RightFitStatus::NotFit
            },
            reasons: outcome.reasons.clone(),
            recorded_at: now,
        };
        let matter = self.store.record_right_fit(&matter.id, record)?;
        info!(
            matter_id = %matter.id,
            eligible = outcome.is_eligible(),
            reasons = outcome.reasons.len(),
            "eligibility recorded"
        );
        self.audit(
            Some(&matter.id),
            &actor_for(caller),
            AuditAction::EligibilityRecorded,
            json!({ "status": outcome.status, "reasons": outcome.reasons }),
        );

        Ok(ScreeningResult {
            outcome,
            matter_id: Some(matter.id),
            case_code: Some(matter.case_code),
        })
    }

    /// Attaches the signed-in user to the case started under `client_key`,
    /// creating a fresh case when the key is new.
    pub fn open_intake(&self, owner: &UserId, client_key: ClientKey) -> Result<Matter, CaseError> {
        let now = self.now();
        let actor = actor_for(Some(owner));
        match self.store.find_by_client_key(&client_key)? {
            Some(matter) if matter.is_owned_by(owner) => Ok(matter),
            Some(matter) if matter.user_id.is_none() => {
                let matter = self.store.claim_matter(&matter.id, owner, now)?;
                info!(matter_id = %matter.id, user_id = %owner, "anonymous case claimed");
                self.audit(
                    Some(&matter.id),
                    &actor,
                    AuditAction::IntakeClaimed,
                    json!({}),
                );
                Ok(matter)
            }
            Some(_) => Err(CaseError::NotFound("matter")),
            None => {
                let matter = self.store.create_matter(NewMatter {
                    client_key,
                    user_id: Some(owner.clone()),
                    at: now,
                })?;
                info!(matter_id = %matter.id, case_code = %matter.case_code, "case opened from intake");
                self.audit(
                    Some(&matter.id),
                    &actor,
                    AuditAction::MatterCreated,
                    json!({ "source": "intake" }),
                );
                Ok(matter)
            }
        }
    }

    pub fn save_draft(
        &self,
        access: &CaseAccess,
        matter_id: &MatterId,
        payload: serde_json::Value,
    ) -> Result<IntakeDraft, CaseError> {
        if !payload.is_object() {
            return Err(CaseError::Validation(ValidationErrors::single(
                "payload",
                "draft must be a JSON object",
            )));
        }
        let matter = authorize(self.store.as_ref(), access, matter_id)?;
        require_fit(&matter)?;

        let draft = self.store.save_draft(&matter.id, payload, self.now())?;
        self.audit(
            Some(&matter.id),
            &access.actor(),
            AuditAction::DraftSaved,
            json!({}),
        );
        Ok(draft)
    }

    /// Finalizes the intake draft and opens the case lifecycle.
    pub fn submit_intake(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        has_will: bool,
    ) -> Result<CaseView, CaseError> {
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        require_fit(&matter)?;
        let path_type = PathType::from_will_exists(has_will);

        let commit = PhaseCommit::new(matter.id.clone(), self.now())
            .completing_intake(path_type)
            .advancing_to(PortalStatus::IntakeComplete)
            .with_journey(PortalStep::Intake.step_id(), JourneyStepStatus::Done);
        let committed = self.store.commit_phase(commit)?;

        info!(matter_id = %matter.id, path_type = ?path_type, "intake submitted");
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::IntakeSubmitted,
            json!({ "path_type": path_type }),
        );
        self.view(committed.matter)
    }

    pub fn status(&self, access: &CaseAccess, matter_id: &MatterId) -> Result<CaseView, CaseError> {
        let matter = authorize(self.store.as_ref(), access, matter_id)?;
        self.view(matter)
    }

    pub(crate) fn view(&self, matter: Matter) -> Result<CaseView, CaseError> {
        let intake_submitted = self
            .store
            .fetch_draft(&matter.id)?
            .is_some_and(|draft| draft.submitted_at.is_some());
        let documents = self.store.list_artifacts(&matter.id)?;
        let callbacks = self.store.list_callbacks(&matter.id)?;
        let requisitions = self.store.list_requisitions(&matter.id)?;
        Ok(CaseView {
            navigation: CaseNavigation::derive(&matter),
            matter,
            intake_submitted,
            documents,
            callbacks,
            requisitions,
        })
    }

    /// Records that the generated will search packet went out in the mail and
    /// schedules the follow-up reminder.
    pub fn mark_will_search_mailed(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        mailed_on: Option<&str>,
    ) -> Result<CaseView, CaseError> {
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        require_fit(&matter)?;
        if self
            .store
            .fetch_artifact(&matter.id, DocumentKind::WillSearchPacket)?
            .is_none()
        {
            return Err(CaseError::conflict(
                "generate the will search packet before marking it mailed",
            ));
        }
        ensure_forward(&matter, PortalStatus::WillSearchSent)?;

        let now = self.now();
        let mailed_on = resolve_past_date(mailed_on, now, "mailed_on")?;
        let commit = PhaseCommit::new(matter.id.clone(), now)
            .with_artifact(ArtifactWrite::Mark {
                kind: DocumentKind::WillSearchPacket,
                status: ArtifactStatus::Mailed,
            })
            .advancing_to(PortalStatus::WillSearchSent)
            .with_milestone(Milestone::WillSearchMailed(mailed_on))
            .with_journey(PortalStep::WillSearch.step_id(), JourneyStepStatus::Done);
        let committed = self.store.commit_phase(commit)?;

        let reminder = Reminder {
            matter_id: matter.id.clone(),
            kind: ReminderKind::WillSearchFollowUp,
            due_on: mailed_on + Duration::days(WILL_SEARCH_FOLLOW_UP_DAYS),
        };
        if let Err(error) = self.collaborators.reminders.schedule(reminder) {
            warn!(matter_id = %matter.id, error = %error, "will search reminder not scheduled");
        }

        info!(matter_id = %matter.id, mailed_on = %mailed_on, "will search packet mailed");
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::WillSearchMailed,
            json!({ "mailed_on": mailed_on }),
        );
        self.view(committed.matter)
    }

    /// Starts the notice waiting period.
    pub fn mark_notices_served(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        served_on: Option<&str>,
    ) -> Result<CaseView, CaseError> {
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        require_fit(&matter)?;
        require_reached(&matter, PortalStatus::WillSearchSent, "notices")?;
        ensure_forward(&matter, PortalStatus::NoticesWaiting21Days)?;

        let now = self.now();
        let served_on = resolve_past_date(served_on, now, "served_on")?;
        let commit = PhaseCommit::new(matter.id.clone(), now)
            .advancing_to(PortalStatus::NoticesWaiting21Days)
            .with_milestone(Milestone::NoticesServed(served_on))
            .with_journey(PortalStep::Notices.step_id(), JourneyStepStatus::Done);
        let committed = self.store.commit_phase(commit)?;

        info!(
            matter_id = %matter.id,
            served_on = %served_on,
            filing_opens_on = ?filing_opens_on(Some(served_on)),
            "notices served"
        );
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::NoticesServed,
            json!({ "served_on": served_on }),
        );
        self.view(committed.matter)
    }

    /// Moves the case to waiting for the grant. An unparseable or missing
    /// `filed_at` is recorded as now.
    pub fn mark_probate_filed(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        filed_at: Option<&str>,
    ) -> Result<CaseView, CaseError> {
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        require_fit(&matter)?;
        require_reached(&matter, PortalStatus::ProbatePackageReady, "probate filing")?;
        ensure_forward(&matter, PortalStatus::WaitingForGrant)?;

        let now = self.now();
        if let Some(opens_on) = filing_opens_on(matter.milestones.notices_served_on) {
            if now.date_naive() < opens_on {
                return Err(CaseError::conflict(format!(
                    "the notice period runs until {opens_on}; filing opens then"
                )));
            }
        }

        let filed_at = resolve_timestamp(filed_at, now);
        refuse_future(filed_at.date_naive(), now, "filed_at")?;
        let mut commit = PhaseCommit::new(matter.id.clone(), now)
            .advancing_to(PortalStatus::WaitingForGrant)
            .with_milestone(Milestone::ProbateFiled(filed_at))
            .with_journey(PortalStep::ProbateFiling.step_id(), JourneyStepStatus::Done);
        if self
            .store
            .fetch_artifact(&matter.id, DocumentKind::ProbatePack)?
            .is_some()
        {
            commit = commit.with_artifact(ArtifactWrite::Mark {
                kind: DocumentKind::ProbatePack,
                status: ArtifactStatus::Filed,
            });
        }
        let committed = self.store.commit_phase(commit)?;

        info!(matter_id = %matter.id, filed_at = %filed_at, "probate filed");
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::ProbateFiled,
            json!({ "filed_at": filed_at }),
        );
        self.view(committed.matter)
    }

    pub fn mark_grant_received(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        received_on: Option<&str>,
    ) -> Result<CaseView, CaseError> {
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        require_fit(&matter)?;
        require_reached(&matter, PortalStatus::WaitingForGrant, "grant")?;
        ensure_forward(&matter, PortalStatus::GrantComplete)?;

        let now = self.now();
        let received_on = resolve_past_date(received_on, now, "received_on")?;
        let commit = PhaseCommit::new(matter.id.clone(), now)
            .advancing_to(PortalStatus::GrantComplete)
            .with_milestone(Milestone::GrantReceived(received_on))
            .with_journey(PortalStep::Grant.step_id(), JourneyStepStatus::Done);
        let committed = self.store.commit_phase(commit)?;

        info!(matter_id = %matter.id, received_on = %received_on, "grant received");
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::GrantReceived,
            json!({ "received_on": received_on }),
        );
        self.view(committed.matter)
    }

    /// Merges one checklist entry. Never touches the portal status.
    pub fn set_journey_step(
        &self,
        access: &CaseAccess,
        matter_id: &MatterId,
        step: &str,
        status: JourneyStepStatus,
    ) -> Result<JourneyState, CaseError> {
        let step = StepId::parse(step).ok_or_else(|| {
            CaseError::Validation(ValidationErrors::single(
                "step_id",
                "use 1 to 64 lowercase letters, digits, or underscores",
            ))
        })?;
        let matter = authorize(self.store.as_ref(), access, matter_id)?;

        let journey =
            self.store
                .record_journey_step(&matter.id, step.clone(), status, self.now())?;
        self.audit(
            Some(&matter.id),
            &access.actor(),
            AuditAction::JourneyUpdated,
            json!({ "step_id": step.as_str(), "status": status.label() }),
        );
        Ok(journey)
    }
}

pub(crate) fn actor_for(user: Option<&UserId>) -> String {
    match user {
        Some(user) => format!("user:{user}"),
        None => "anonymous".to_string(),
    }
}

pub(crate) fn require_fit(matter: &Matter) -> Result<(), CaseError> {
    if matter.is_not_fit() {
        return Err(CaseError::conflict(
            "this case was screened as not a fit for self-serve probate",
        ));
    }
    Ok(())
}

pub(crate) fn require_reached(
    matter: &Matter,
    threshold: PortalStatus,
    phase: &str,
) -> Result<(), CaseError> {
    if has_reached_status(matter.portal_status, threshold) {
        Ok(())
    } else {
        Err(CaseError::conflict(format!(
            "the {phase} phase opens once the case reaches {threshold}"
        )))
    }
}

fn ensure_forward(matter: &Matter, target: PortalStatus) -> Result<(), CaseError> {
    validate_transition(matter.portal_status, target)
        .map_err(|backward| CaseError::conflict(backward.to_string()))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
/// Anything else falls back to `now`.
pub fn resolve_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return now;
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.and_time(NaiveTime::MIN).and_utc(),
        Err(_) => now,
    }
}

pub fn resolve_date(raw: Option<&str>, now: DateTime<Utc>) -> NaiveDate {
    let Some(trimmed) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return now.date_naive();
    };
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => resolve_timestamp(Some(trimmed), now).date_naive(),
    }
}

/// Like [`resolve_date`], but a date after today is a field error. Milestone
/// dates record something that already happened.
pub(crate) fn resolve_past_date(
    raw: Option<&str>,
    now: DateTime<Utc>,
    field: &str,
) -> Result<NaiveDate, CaseError> {
    let date = resolve_date(raw, now);
    refuse_future(date, now, field)?;
    Ok(date)
}

fn refuse_future(date: NaiveDate, now: DateTime<Utc>, field: &str) -> Result<(), CaseError> {
    if date > now.date_naive() {
        return Err(CaseError::Validation(ValidationErrors::single(
            field,
            format!("{date} is in the future"),
        )));
    }
    Ok(())
}
