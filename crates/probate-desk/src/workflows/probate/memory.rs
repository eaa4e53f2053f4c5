use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{
    ArtifactStatus, AvailabilitySlot, CallbackSchedule, CallbackStatus, CaseCode, ClientKey,
    DocumentKind, IntakeDraft, Matter, MatterId, PhaseArtifact, Requisition, RequisitionStatus,
    ResumeToken, RightFitRecord, RightFitStatus, UserId,
};
use super::journey::{JourneyLedgerEntry, JourneyState, JourneyStepStatus, StepId};
use super::status::{self, PortalStatus};
use super::store::{
    ArtifactWrite, CaseStore, Milestone, NewMatter, PhaseCommit, PhaseCommitted, StoreError,
};

#[derive(Default)]
struct MemoryState {
    case_sequence: u64,
    matters: HashMap<MatterId, Matter>,
    client_keys: HashMap<ClientKey, MatterId>,
    drafts: HashMap<MatterId, IntakeDraft>,
    artifacts: HashMap<(MatterId, DocumentKind), PhaseArtifact>,
    journey_ledger: Vec<JourneyLedgerEntry>,
    resume_tokens: HashMap<String, ResumeToken>,
    slots: BTreeMap<String, AvailabilitySlot>,
    callbacks: BTreeMap<String, CallbackSchedule>,
    requisitions: BTreeMap<String, Requisition>,
}

impl MemoryState {
    fn matter_mut(&mut self, id: &MatterId) -> Result<&mut Matter, StoreError> {
        self.matters.get_mut(id).ok_or(StoreError::NotFound("matter"))
    }

    fn slot_is_booked(&self, slot_id: &str) -> bool {
        self.callbacks
            .values()
            .any(|callback| callback.slot_id == slot_id && callback.status == CallbackStatus::Booked)
    }
}

/// Process-local [`CaseStore`] guarded by a single mutex, so every trait call
/// is serialized the way a single-row transaction would be.
#[derive(Default)]
pub struct MemoryCaseStore {
    state: Mutex<MemoryState>,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("case store lock poisoned".to_string()))
    }

    pub fn matter_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.matters.len())
    }
}

fn refuse_not_fit(matter: &Matter) -> Result<(), StoreError> {
    if matter.is_not_fit() {
        return Err(StoreError::Conflict(
            "case was screened as not a fit and cannot progress".to_string(),
        ));
    }
    Ok(())
}

impl CaseStore for MemoryCaseStore {
    fn create_matter(&self, new: NewMatter) -> Result<Matter, StoreError> {
        let mut state = self.lock()?;
        if state.client_keys.contains_key(&new.client_key) {
            return Err(StoreError::Conflict(
                "a case already exists for this client key".to_string(),
            ));
        }

        state.case_sequence += 1;
        let matter = Matter {
            id: MatterId::generate(),
            case_code: CaseCode::from_sequence(state.case_sequence),
            client_key: new.client_key.clone(),
            user_id: new.user_id,
            path_type: None,
            right_fit: None,
            portal_status: None,
            journey: JourneyState::default(),
            milestones: Default::default(),
            created_at: new.at,
            updated_at: new.at,
        };

        state.client_keys.insert(new.client_key, matter.id.clone());
        state.matters.insert(matter.id.clone(), matter.clone());
        Ok(matter)
    }

    fn fetch_matter(&self, id: &MatterId) -> Result<Option<Matter>, StoreError> {
        Ok(self.lock()?.matters.get(id).cloned())
    }

    fn find_by_client_key(&self, key: &ClientKey) -> Result<Option<Matter>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .client_keys
            .get(key)
            .and_then(|id| state.matters.get(id))
            .cloned())
    }

    fn claim_matter(
        &self,
        id: &MatterId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Matter, StoreError> {
        let mut state = self.lock()?;
        let matter = state.matter_mut(id)?;
        match &matter.user_id {
            Some(owner) if owner == user => {}
            Some(_) => return Err(StoreError::NotFound("matter")),
            None => {
                matter.user_id = Some(user.clone());
                matter.updated_at = at;
            }
        }
        Ok(matter.clone())
    }

    fn record_right_fit(
        &self,
        id: &MatterId,
        record: RightFitRecord,
    ) -> Result<Matter, StoreError> {
        let mut state = self.lock()?;
        let matter = state.matter_mut(id)?;
        match &matter.right_fit {
            Some(existing) if existing.status == record.status => {}
            Some(_) => {
                return Err(StoreError::Conflict(
                    "screening result already recorded for this case".to_string(),
                ))
            }
            None => {
                if record.status == RightFitStatus::NotFit
                    && matter.portal_status.is_some()
                {
                    return Err(StoreError::Conflict(
                        "case has already progressed past intake".to_string(),
                    ));
                }
                matter.updated_at = record.recorded_at;
                matter.right_fit = Some(record);
            }
        }
        Ok(matter.clone())
    }

    fn save_draft(
        &self,
        id: &MatterId,
        payload: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Result<IntakeDraft, StoreError> {
        let mut state = self.lock()?;
        if state
            .drafts
            .get(id)
            .is_some_and(|existing| existing.submitted_at.is_some())
        {
            return Err(StoreError::Conflict(
                "intake was already submitted and can no longer be edited".to_string(),
            ));
        }
        let matter = state.matter_mut(id)?;
        refuse_not_fit(matter)?;
        matter.updated_at = at;

        let draft = IntakeDraft {
            matter_id: id.clone(),
            payload,
            updated_at: at,
            submitted_at: None,
        };
        state.drafts.insert(id.clone(), draft.clone());
        Ok(draft)
    }

    fn fetch_draft(&self, id: &MatterId) -> Result<Option<IntakeDraft>, StoreError> {
        Ok(self.lock()?.drafts.get(id).cloned())
    }

    fn commit_phase(&self, commit: PhaseCommit) -> Result<PhaseCommitted, StoreError> {
        let mut state = self.lock()?;
        let moves_case = commit.moves_case();
        let PhaseCommit {
            matter_id,
            at,
            artifact,
            advance_to,
            milestone,
            journey,
            complete_intake,
        } = commit;

        // Check everything first so a rejected commit leaves no trace.
        let matter = state
            .matters
            .get(&matter_id)
            .ok_or(StoreError::NotFound("matter"))?;
        if moves_case {
            refuse_not_fit(matter)?;
        }
        if complete_intake.is_some() {
            match state.drafts.get(&matter_id) {
                None => return Err(StoreError::NotFound("intake draft")),
                Some(draft) if draft.submitted_at.is_some() => {
                    return Err(StoreError::Conflict(
                        "intake was already submitted".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }
        if let Some(ArtifactWrite::Mark { kind, status }) = &artifact {
            if !status.applies_to(*kind) {
                return Err(StoreError::Conflict(format!(
                    "{kind} cannot be marked {status:?}"
                )));
            }
            if !state.artifacts.contains_key(&(matter_id.clone(), *kind)) {
                return Err(StoreError::NotFound("document"));
            }
        }

        if let Some(ArtifactWrite::Upsert { kind, .. }) = &artifact {
            let filed = state
                .artifacts
                .get(&(matter_id.clone(), *kind))
                .is_some_and(|existing| existing.status == ArtifactStatus::Filed);
            if filed {
                return Err(StoreError::Conflict(format!(
                    "the {kind} has been filed and can no longer be regenerated"
                )));
            }
        }

        let written = match artifact {
            Some(ArtifactWrite::Upsert {
                kind,
                stored,
                payload,
            }) => {
                let key = (matter_id.clone(), kind);
                let artifact = match state.artifacts.get(&key) {
                    Some(existing) => PhaseArtifact {
                        status: ArtifactStatus::Generated,
                        artifact_url: stored.url,
                        storage_key: stored.key,
                        payload,
                        generation: existing.generation + 1,
                        generated_at: at,
                        updated_at: at,
                        ..existing.clone()
                    },
                    None => PhaseArtifact {
                        id: Uuid::new_v4().to_string(),
                        matter_id: matter_id.clone(),
                        kind,
                        status: ArtifactStatus::Generated,
                        artifact_url: stored.url,
                        storage_key: stored.key,
                        payload,
                        generation: 1,
                        generated_at: at,
                        updated_at: at,
                    },
                };
                state.artifacts.insert(key, artifact.clone());
                Some(artifact)
            }
            Some(ArtifactWrite::Mark { kind, status }) => {
                let key = (matter_id.clone(), kind);
                state.artifacts.get_mut(&key).map(|existing| {
                    existing.status = status;
                    existing.updated_at = at;
                    existing.clone()
                })
            }
            None => None,
        };

        if complete_intake.is_some() {
            if let Some(draft) = state.drafts.get_mut(&matter_id) {
                draft.submitted_at = Some(at);
            }
        }

        for (step, step_status) in &journey {
            state.journey_ledger.push(JourneyLedgerEntry {
                matter_id: matter_id.clone(),
                step_id: step.clone(),
                status: *step_status,
                recorded_at: at,
            });
        }

        let matter = state.matter_mut(&matter_id)?;
        if let Some(path_type) = complete_intake {
            matter.path_type = Some(path_type);
        }
        if let Some(target) = advance_to {
            matter.portal_status = Some(status::advance(matter.portal_status, target));
        }
        match milestone {
            Some(Milestone::WillSearchMailed(date)) => {
                matter.milestones.will_search_mailed_on = Some(date)
            }
            Some(Milestone::NoticesServed(date)) => matter.milestones.notices_served_on = Some(date),
            Some(Milestone::ProbateFiled(filed_at)) => {
                matter.milestones.probate_filed_at = Some(filed_at)
            }
            Some(Milestone::GrantReceived(date)) => matter.milestones.grant_received_on = Some(date),
            None => {}
        }
        for (step, step_status) in &journey {
            matter.journey = matter.journey.with_step(step, *step_status);
        }
        matter.updated_at = at;

        Ok(PhaseCommitted {
            matter: matter.clone(),
            artifact: written,
        })
    }

    fn fetch_artifact(
        &self,
        id: &MatterId,
        kind: DocumentKind,
    ) -> Result<Option<PhaseArtifact>, StoreError> {
        Ok(self.lock()?.artifacts.get(&(id.clone(), kind)).cloned())
    }

    fn list_artifacts(&self, id: &MatterId) -> Result<Vec<PhaseArtifact>, StoreError> {
        let state = self.lock()?;
        let mut artifacts: Vec<PhaseArtifact> = state
            .artifacts
            .values()
            .filter(|artifact| &artifact.matter_id == id)
            .cloned()
            .collect();
        artifacts.sort_by_key(|artifact| artifact.kind);
        Ok(artifacts)
    }

    fn record_journey_step(
        &self,
        id: &MatterId,
        step: StepId,
        step_status: JourneyStepStatus,
        at: DateTime<Utc>,
    ) -> Result<JourneyState, StoreError> {
        let mut state = self.lock()?;
        let matter = state.matter_mut(id)?;
        matter.journey = matter.journey.with_step(&step, step_status);
        matter.updated_at = at;
        let journey = matter.journey.clone();

        state.journey_ledger.push(JourneyLedgerEntry {
            matter_id: id.clone(),
            step_id: step,
            status: step_status,
            recorded_at: at,
        });
        Ok(journey)
    }

    fn journey_ledger(&self, id: &MatterId) -> Result<Vec<JourneyLedgerEntry>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .journey_ledger
            .iter()
            .filter(|entry| &entry.matter_id == id)
            .cloned()
            .collect())
    }

    fn override_status(
        &self,
        id: &MatterId,
        portal_status: Option<PortalStatus>,
        at: DateTime<Utc>,
    ) -> Result<Matter, StoreError> {
        let mut state = self.lock()?;
        let matter = state.matter_mut(id)?;
        if portal_status.is_some() {
            refuse_not_fit(matter)?;
        }
        matter.portal_status = portal_status;
        matter.updated_at = at;
        Ok(matter.clone())
    }

    fn insert_resume_token(&self, token: ResumeToken) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.resume_tokens.contains_key(&token.token) {
            return Err(StoreError::Conflict("resume token collision".to_string()));
        }
        state.resume_tokens.insert(token.token.clone(), token);
        Ok(())
    }

    fn fetch_resume_token(&self, token: &str) -> Result<Option<ResumeToken>, StoreError> {
        Ok(self.lock()?.resume_tokens.get(token).cloned())
    }

    fn insert_slot(&self, slot: AvailabilitySlot) -> Result<AvailabilitySlot, StoreError> {
        let mut state = self.lock()?;
        if state.slots.contains_key(&slot.id) {
            return Err(StoreError::Conflict("slot already exists".to_string()));
        }
        state.slots.insert(slot.id.clone(), slot.clone());
        Ok(slot)
    }

    fn fetch_slot(&self, slot_id: &str) -> Result<Option<AvailabilitySlot>, StoreError> {
        Ok(self.lock()?.slots.get(slot_id).cloned())
    }

    fn list_slots(&self) -> Result<Vec<AvailabilitySlot>, StoreError> {
        let state = self.lock()?;
        let mut slots: Vec<AvailabilitySlot> = state.slots.values().cloned().collect();
        slots.sort_by_key(|slot| slot.starts_at);
        Ok(slots)
    }

    fn list_open_slots(&self, after: DateTime<Utc>) -> Result<Vec<AvailabilitySlot>, StoreError> {
        let state = self.lock()?;
        let mut slots: Vec<AvailabilitySlot> = state
            .slots
            .values()
            .filter(|slot| slot.starts_at > after && !state.slot_is_booked(&slot.id))
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.starts_at);
        Ok(slots)
    }

    fn delete_slot(&self, slot_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.slots.contains_key(slot_id) {
            return Err(StoreError::NotFound("slot"));
        }
        if state.slot_is_booked(slot_id) {
            return Err(StoreError::Conflict(
                "slot has an active callback booking".to_string(),
            ));
        }
        state.slots.remove(slot_id);
        Ok(())
    }

    fn book_callback(&self, callback: CallbackSchedule) -> Result<CallbackSchedule, StoreError> {
        let mut state = self.lock()?;
        if !state.slots.contains_key(&callback.slot_id) {
            return Err(StoreError::NotFound("slot"));
        }
        if state.slot_is_booked(&callback.slot_id) {
            return Err(StoreError::Conflict("slot is already booked".to_string()));
        }
        state.callbacks.insert(callback.id.clone(), callback.clone());
        Ok(callback)
    }

    fn cancel_callback(
        &self,
        matter_id: &MatterId,
        callback_id: &str,
    ) -> Result<CallbackSchedule, StoreError> {
        let mut state = self.lock()?;
        let callback = state
            .callbacks
            .get_mut(callback_id)
            .filter(|callback| &callback.matter_id == matter_id)
            .ok_or(StoreError::NotFound("callback"))?;
        callback.status = CallbackStatus::Cancelled;
        Ok(callback.clone())
    }

    fn list_callbacks(&self, matter_id: &MatterId) -> Result<Vec<CallbackSchedule>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .callbacks
            .values()
            .filter(|callback| &callback.matter_id == matter_id)
            .cloned()
            .collect())
    }

    fn insert_requisition(&self, requisition: Requisition) -> Result<Requisition, StoreError> {
        let mut state = self.lock()?;
        state.matter_mut(&requisition.matter_id)?;
        state
            .requisitions
            .insert(requisition.id.clone(), requisition.clone());
        Ok(requisition)
    }

    fn respond_to_requisition(
        &self,
        matter_id: &MatterId,
        requisition_id: &str,
        note: String,
        at: DateTime<Utc>,
    ) -> Result<Requisition, StoreError> {
        let mut state = self.lock()?;
        let requisition = state
            .requisitions
            .get_mut(requisition_id)
            .filter(|requisition| &requisition.matter_id == matter_id)
            .ok_or(StoreError::NotFound("requisition"))?;
        if requisition.status == RequisitionStatus::Responded {
            return Err(StoreError::Conflict(
                "requisition already has a response".to_string(),
            ));
        }
        requisition.status = RequisitionStatus::Responded;
        requisition.response_note = Some(note);
        requisition.updated_at = at;
        Ok(requisition.clone())
    }

    fn list_requisitions(&self, matter_id: &MatterId) -> Result<Vec<Requisition>, StoreError> {
        let state = self.lock()?;
        let mut requisitions: Vec<Requisition> = state
            .requisitions
            .values()
            .filter(|requisition| &requisition.matter_id == matter_id)
            .cloned()
            .collect();
        requisitions.sort_by_key(|requisition| requisition.received_on);
        Ok(requisitions)
    }
}
