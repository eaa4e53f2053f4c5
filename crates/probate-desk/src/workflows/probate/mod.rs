//! BC probate case workflow: eligibility screening, the portal status
//! machine, court document generation, resume links, and the journey
//! checklist, plus callback scheduling and registry requisitions.
//!
//! Storage and every outbound service sit behind traits. The in-memory
//! [`MemoryCaseStore`] backs the development server and the tests.

pub mod authz;
pub mod collaborators;
pub mod documents;
pub mod domain;
pub mod eligibility;
pub mod error;
pub mod journey;
pub mod memory;
pub mod navigation;
pub mod operator;
pub mod requisitions;
pub mod resume;
pub mod router;
pub mod scheduling;
pub mod service;
pub mod status;
pub mod store;

#[cfg(test)]
mod tests;

pub use authz::{authorize, CaseAccess};
pub use collaborators::{
    ArtifactStorage, AuditAction, AuditEntry, AuditError, AuditLog, Authenticator, Clock,
    Collaborators, DeliveryError, DocumentRenderer, EmailMessage, EmailSender, RateLimiter,
    Reminder, ReminderError, ReminderKind, ReminderScheduler, SmsMessage, SmsSender,
    StoredArtifact, SystemClock,
};
pub use documents::{DocumentRequest, GeneratedDocument};
pub use domain::{
    ArtifactStatus, AvailabilitySlot, CallbackSchedule, CallbackStatus, CaseCode, ClientKey,
    DocumentKind, IntakeDraft, Matter, MatterId, PathType, PhaseArtifact, Requisition,
    RequisitionStatus, ResumeToken, RightFitStatus, UserId,
};
pub use eligibility::{evaluate, Answer, EligibilityAnswers, EligibilityOutcome, EligibilityStatus};
pub use error::{CaseError, FieldError, UpstreamError, ValidationErrors};
pub use journey::{JourneyState, JourneyStepStatus, StepId};
pub use memory::MemoryCaseStore;
pub use navigation::{CaseNavigation, PortalStep};
pub use operator::{OperatorCapability, OperatorConsole, OperatorGate};
pub use resume::{IssuedResumeToken, ResumedCase};
pub use router::{case_router, CaseApi};
pub use service::{CaseView, CaseWorkflowService, ScreeningResult};
pub use status::{has_reached_status, normalize_status, PortalStatus, PORTAL_STATUSES};
pub use store::{CaseStore, StoreError};
