use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::authz::authorize_owner;
use super::collaborators::AuditAction;
use super::domain::{MatterId, Requisition, RequisitionStatus, UserId};
use super::error::{CaseError, ValidationErrors};
use super::service::{actor_for, require_reached, resolve_past_date, CaseWorkflowService};
use super::status::PortalStatus;
use super::store::CaseStore;

impl<S> CaseWorkflowService<S>
where
    S: CaseStore + 'static,
{
    /// Records a registry requisition against a filed application.
    pub fn log_requisition(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        summary: &str,
        received_on: Option<&str>,
    ) -> Result<Requisition, CaseError> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(CaseError::Validation(ValidationErrors::single(
                "summary",
                "describe what the registry asked for",
            )));
        }
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        require_reached(&matter, PortalStatus::ProbateFiled, "requisition")?;

        let now = self.now();
        let received_on = resolve_past_date(received_on, now, "received_on")?;
        let requisition = self.store.insert_requisition(Requisition {
            id: Uuid::new_v4().to_string(),
            matter_id: matter.id.clone(),
            summary: summary.to_string(),
            received_on,
            status: RequisitionStatus::Open,
            response_note: None,
            updated_at: now,
        })?;

        info!(matter_id = %matter.id, requisition_id = %requisition.id, "requisition logged");
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::RequisitionLogged,
            json!({ "requisition_id": requisition.id, "received_on": requisition.received_on }),
        );
        Ok(requisition)
    }

    pub fn respond_to_requisition(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        requisition_id: &str,
        note: &str,
    ) -> Result<Requisition, CaseError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(CaseError::Validation(ValidationErrors::single(
                "note",
                "is required",
            )));
        }
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;

        let requisition = self.store.respond_to_requisition(
            &matter.id,
            requisition_id,
            note.to_string(),
            self.now(),
        )?;

        info!(matter_id = %matter.id, requisition_id, "requisition answered");
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::RequisitionResponded,
            json!({ "requisition_id": requisition.id }),
        );
        Ok(requisition)
    }
}
