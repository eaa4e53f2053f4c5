use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::authz::authorize_owner;
use super::collaborators::{AuditAction, SmsMessage};
use super::domain::{AvailabilitySlot, CallbackSchedule, CallbackStatus, MatterId, UserId};
use super::error::{CaseError, ValidationErrors};
use super::service::{actor_for, require_fit, CaseWorkflowService};
use super::store::CaseStore;

/// Keeps the digits of a phone number. Ten digits, optionally behind a
/// leading country code 1.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let allowed = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    match digits.len() {
        10 if allowed => Some(format!("+1{digits}")),
        11 if allowed && digits.starts_with('1') => Some(format!("+{digits}")),
        _ => None,
    }
}

impl<S> CaseWorkflowService<S>
where
    S: CaseStore + 'static,
{
    /// Future slots nobody has booked yet.
    pub fn open_slots(&self) -> Result<Vec<AvailabilitySlot>, CaseError> {
        Ok(self.store.list_open_slots(self.now())?)
    }

    pub fn book_callback(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        slot_id: &str,
        phone: &str,
    ) -> Result<CallbackSchedule, CaseError> {
        let phone = normalize_phone(phone).ok_or_else(|| {
            CaseError::Validation(ValidationErrors::single(
                "phone",
                "must be a 10 digit North American phone number",
            ))
        })?;
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        require_fit(&matter)?;

        let now = self.now();
        let slot = self
            .store
            .fetch_slot(slot_id)?
            .ok_or(CaseError::NotFound("slot"))?;
        if slot.starts_at <= now {
            return Err(CaseError::conflict("that callback time has already passed"));
        }

        let callback = self.store.book_callback(CallbackSchedule {
            id: Uuid::new_v4().to_string(),
            matter_id: matter.id.clone(),
            slot_id: slot.id.clone(),
            phone: phone.clone(),
            status: CallbackStatus::Booked,
            booked_at: now,
        })?;

        let body = format!(
            "Your probate callback for case {} is booked for {} UTC.",
            matter.case_code,
            slot.starts_at.format("%Y-%m-%d %H:%M")
        );
        if let Err(error) = self.collaborators.sms.send_sms(SmsMessage { to: phone, body }) {
            warn!(matter_id = %matter.id, error = %error, "callback confirmation text not sent");
        }

        info!(matter_id = %matter.id, slot_id = %slot.id, "callback booked");
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::CallbackBooked,
            json!({ "callback_id": callback.id, "slot_id": slot.id }),
        );
        Ok(callback)
    }

    pub fn cancel_callback(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        callback_id: &str,
    ) -> Result<CallbackSchedule, CaseError> {
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        let callback = self.store.cancel_callback(&matter.id, callback_id)?;

        info!(matter_id = %matter.id, callback_id, "callback cancelled");
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::CallbackCancelled,
            json!({ "callback_id": callback.id }),
        );
        Ok(callback)
    }
}
