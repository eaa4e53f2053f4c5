//! Privileged support tooling.
//!
//! Nothing in here is reachable from the client API. Every console method
//! takes an [`OperatorCapability`], and the only way to obtain one is to
//! present the configured operator key to [`OperatorGate::authorize`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PortalConfig;

use super::collaborators::{append_audit, AuditAction, Collaborators};
use super::domain::{AvailabilitySlot, Matter, MatterId};
use super::error::{CaseError, ValidationErrors};
use super::status::{normalize_status, PortalStatus};
use super::store::CaseStore;

const OPERATOR_ACTOR: &str = "operator";

/// Proof that the caller presented the operator key. Cannot be built outside
/// this module.
#[derive(Debug, Clone)]
pub struct OperatorCapability {
    _sealed: (),
}

#[derive(Debug, Clone)]
pub struct OperatorGate {
    key: Option<String>,
}

impl OperatorGate {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn from_config(portal: &PortalConfig) -> Self {
        Self::new(portal.operator_key.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Missing key is `Unauthorized`. A wrong key, or a console with no key
    /// configured, is `Forbidden`.
    pub fn authorize(&self, presented: Option<&str>) -> Result<OperatorCapability, CaseError> {
        let presented = presented
            .map(str::trim)
            .filter(|presented| !presented.is_empty())
            .ok_or(CaseError::Unauthorized)?;
        match &self.key {
            Some(expected) if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) => {
                Ok(OperatorCapability { _sealed: () })
            }
            Some(_) => {
                warn!("operator key mismatch");
                Err(CaseError::Forbidden)
            }
            None => Err(CaseError::Forbidden),
        }
    }
}

pub struct OperatorConsole<S> {
    store: Arc<S>,
    collaborators: Collaborators,
}

impl<S> OperatorConsole<S>
where
    S: CaseStore + 'static,
{
    pub fn new(store: Arc<S>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
        }
    }

    fn audit(&self, matter_id: Option<&MatterId>, action: AuditAction, meta: serde_json::Value) {
        append_audit(
            self.collaborators.audit.as_ref(),
            matter_id,
            OPERATOR_ACTOR,
            action,
            meta,
            self.collaborators.clock.now(),
        );
    }

    /// Sets the portal status directly, in either direction. `None` or an
    /// empty string resets the case to pre-intake. Not-fit cases can only be
    /// reset.
    pub fn override_status(
        &self,
        _capability: &OperatorCapability,
        matter_id: &MatterId,
        raw_status: Option<&str>,
    ) -> Result<Matter, CaseError> {
        let raw_status = raw_status.map(str::trim).filter(|raw| !raw.is_empty());
        let target: Option<PortalStatus> = match raw_status {
            None => None,
            Some(raw) => Some(normalize_status(Some(raw), None).ok_or_else(|| {
                CaseError::Validation(ValidationErrors::single("status", "unknown case status"))
            })?),
        };

        let before = self
            .store
            .fetch_matter(matter_id)?
            .ok_or(CaseError::NotFound("matter"))?;
        let matter = self
            .store
            .override_status(matter_id, target, self.collaborators.clock.now())?;

        warn!(
            matter_id = %matter_id,
            from = ?before.portal_status,
            to = ?target,
            "case status overridden by operator"
        );
        self.audit(
            Some(matter_id),
            AuditAction::StatusOverride,
            json!({ "from": before.portal_status, "to": target }),
        );
        Ok(matter)
    }

    pub fn publish_slot(
        &self,
        _capability: &OperatorCapability,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Result<AvailabilitySlot, CaseError> {
        if ends_at <= starts_at {
            return Err(CaseError::Validation(ValidationErrors::single(
                "ends_at",
                "must be after starts_at",
            )));
        }
        let slot = self.store.insert_slot(AvailabilitySlot {
            id: Uuid::new_v4().to_string(),
            starts_at,
            ends_at,
            created_by: OPERATOR_ACTOR.to_string(),
        })?;

        info!(slot_id = %slot.id, starts_at = %slot.starts_at, "callback slot published");
        self.audit(
            None,
            AuditAction::SlotPublished,
            json!({ "slot_id": slot.id, "starts_at": slot.starts_at, "ends_at": slot.ends_at }),
        );
        Ok(slot)
    }

    pub fn delete_slot(
        &self,
        _capability: &OperatorCapability,
        slot_id: &str,
    ) -> Result<(), CaseError> {
        self.store.delete_slot(slot_id)?;
        info!(slot_id, "callback slot deleted");
        self.audit(None, AuditAction::SlotDeleted, json!({ "slot_id": slot_id }));
        Ok(())
    }

    pub fn list_slots(
        &self,
        _capability: &OperatorCapability,
    ) -> Result<Vec<AvailabilitySlot>, CaseError> {
        Ok(self.store.list_slots()?)
    }
}
