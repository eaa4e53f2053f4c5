use chrono::{DateTime, NaiveDate, Utc};

use super::collaborators::StoredArtifact;
use super::domain::{
    ArtifactStatus, AvailabilitySlot, CallbackSchedule, ClientKey, DocumentKind, IntakeDraft,
    Matter, MatterId, PathType, PhaseArtifact, Requisition, ResumeToken, RightFitRecord, UserId,
};
use super::journey::{JourneyLedgerEntry, JourneyState, JourneyStepStatus, StepId};
use super::status::PortalStatus;

/// Storage abstraction for matters and their phase records.
///
/// Every method is a single atomic unit: implementations backed by a database
/// run each call in one transaction, and the in-memory store holds one lock
/// for the duration of the call. Invariants that depend on the current row
/// (client-key uniqueness, one artifact per kind, forward-only status, the
/// NOT_FIT freeze) are checked inside that unit.
pub trait CaseStore: Send + Sync {
    /// Creates a matter and allocates the next case code.
    fn create_matter(&self, new: NewMatter) -> Result<Matter, StoreError>;
    fn fetch_matter(&self, id: &MatterId) -> Result<Option<Matter>, StoreError>;
    fn find_by_client_key(&self, key: &ClientKey) -> Result<Option<Matter>, StoreError>;
    /// Sets the owner once. Claiming again as the same user is a no-op.
    fn claim_matter(
        &self,
        id: &MatterId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Matter, StoreError>;
    /// Records the screening verdict. A differing verdict is a conflict.
    fn record_right_fit(&self, id: &MatterId, record: RightFitRecord)
        -> Result<Matter, StoreError>;

    fn save_draft(
        &self,
        id: &MatterId,
        payload: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Result<IntakeDraft, StoreError>;
    fn fetch_draft(&self, id: &MatterId) -> Result<Option<IntakeDraft>, StoreError>;

    /// Applies a phase transition: artifact write, status advance, milestone,
    /// journey entries, and intake completion, all or nothing.
    fn commit_phase(&self, commit: PhaseCommit) -> Result<PhaseCommitted, StoreError>;
    fn fetch_artifact(
        &self,
        id: &MatterId,
        kind: DocumentKind,
    ) -> Result<Option<PhaseArtifact>, StoreError>;
    fn list_artifacts(&self, id: &MatterId) -> Result<Vec<PhaseArtifact>, StoreError>;

    /// Merges one checklist step and appends the ledger row.
    fn record_journey_step(
        &self,
        id: &MatterId,
        step: StepId,
        status: JourneyStepStatus,
        at: DateTime<Utc>,
    ) -> Result<JourneyState, StoreError>;
    fn journey_ledger(&self, id: &MatterId) -> Result<Vec<JourneyLedgerEntry>, StoreError>;

    /// Unvalidated status write for the operator console.
    fn override_status(
        &self,
        id: &MatterId,
        status: Option<PortalStatus>,
        at: DateTime<Utc>,
    ) -> Result<Matter, StoreError>;

    fn insert_resume_token(&self, token: ResumeToken) -> Result<(), StoreError>;
    fn fetch_resume_token(&self, token: &str) -> Result<Option<ResumeToken>, StoreError>;

    fn insert_slot(&self, slot: AvailabilitySlot) -> Result<AvailabilitySlot, StoreError>;
    fn fetch_slot(&self, slot_id: &str) -> Result<Option<AvailabilitySlot>, StoreError>;
    fn list_slots(&self) -> Result<Vec<AvailabilitySlot>, StoreError>;
    /// Slots starting after `after` with no booked callback.
    fn list_open_slots(&self, after: DateTime<Utc>) -> Result<Vec<AvailabilitySlot>, StoreError>;
    /// Refuses while a booked callback references the slot.
    fn delete_slot(&self, slot_id: &str) -> Result<(), StoreError>;
    /// Refuses when the slot already carries a booked callback.
    fn book_callback(&self, callback: CallbackSchedule) -> Result<CallbackSchedule, StoreError>;
    fn cancel_callback(
        &self,
        matter_id: &MatterId,
        callback_id: &str,
    ) -> Result<CallbackSchedule, StoreError>;
    fn list_callbacks(&self, matter_id: &MatterId) -> Result<Vec<CallbackSchedule>, StoreError>;

    fn insert_requisition(&self, requisition: Requisition) -> Result<Requisition, StoreError>;
    fn respond_to_requisition(
        &self,
        matter_id: &MatterId,
        requisition_id: &str,
        note: String,
        at: DateTime<Utc>,
    ) -> Result<Requisition, StoreError>;
    fn list_requisitions(&self, matter_id: &MatterId) -> Result<Vec<Requisition>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("case store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct NewMatter {
    pub client_key: ClientKey,
    pub user_id: Option<UserId>,
    pub at: DateTime<Utc>,
}

/// Artifact change carried by a phase commit.
#[derive(Debug, Clone)]
pub enum ArtifactWrite {
    /// Insert or replace the current artifact for the kind, status `GENERATED`.
    Upsert {
        kind: DocumentKind,
        stored: StoredArtifact,
        payload: serde_json::Value,
    },
    /// Move an existing artifact to a later status.
    Mark {
        kind: DocumentKind,
        status: ArtifactStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    WillSearchMailed(NaiveDate),
    NoticesServed(NaiveDate),
    ProbateFiled(DateTime<Utc>),
    GrantReceived(NaiveDate),
}

#[derive(Debug, Clone)]
pub struct PhaseCommit {
    pub matter_id: MatterId,
    pub at: DateTime<Utc>,
    pub artifact: Option<ArtifactWrite>,
    pub advance_to: Option<PortalStatus>,
    pub milestone: Option<Milestone>,
    pub journey: Vec<(StepId, JourneyStepStatus)>,
    /// Stamps the draft as submitted and sets the path type.
    pub complete_intake: Option<PathType>,
}

impl PhaseCommit {
    pub fn new(matter_id: MatterId, at: DateTime<Utc>) -> Self {
        Self {
            matter_id,
            at,
            artifact: None,
            advance_to: None,
            milestone: None,
            journey: Vec::new(),
            complete_intake: None,
        }
    }

    pub fn with_artifact(mut self, write: ArtifactWrite) -> Self {
        self.artifact = Some(write);
        self
    }

    pub fn advancing_to(mut self, status: PortalStatus) -> Self {
        self.advance_to = Some(status);
        self
    }

    pub fn with_milestone(mut self, milestone: Milestone) -> Self {
        self.milestone = Some(milestone);
        self
    }

    pub fn with_journey(mut self, step: StepId, status: JourneyStepStatus) -> Self {
        self.journey.push((step, status));
        self
    }

    pub fn completing_intake(mut self, path_type: PathType) -> Self {
        self.complete_intake = Some(path_type);
        self
    }

    /// Whether the commit would change the matter's case position.
    pub fn moves_case(&self) -> bool {
        self.artifact.is_some() || self.advance_to.is_some() || self.complete_intake.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PhaseCommitted {
    pub matter: Matter,
    pub artifact: Option<PhaseArtifact>,
}
