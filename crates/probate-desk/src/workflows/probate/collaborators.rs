//! Outbound ports. Everything here is I/O owned by another system: the
//! engine only sees these traits, and the service binary decides which
//! adapters back them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{DocumentKind, MatterId, UserId};
use super::error::UpstreamError;

/// Produces document bytes for a form family. Failures are fatal to the
/// surrounding operation.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, kind: DocumentKind, data: &serde_json::Value)
        -> Result<Vec<u8>, UpstreamError>;
}

/// Durable reference for rendered bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub url: String,
    pub key: String,
}

/// Allocates a fresh durable reference on every call.
pub trait ArtifactStorage: Send + Sync {
    fn store(&self, kind: DocumentKind, bytes: &[u8]) -> Result<StoredArtifact, UpstreamError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub template: String,
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no delivery provider configured")]
    NotConfigured,
    #[error("delivery transport unavailable: {0}")]
    Transport(String),
}

pub trait EmailSender: Send + Sync {
    fn send_template_email(&self, message: EmailMessage) -> Result<(), DeliveryError>;
}

pub trait SmsSender: Send + Sync {
    fn send_sms(&self, message: SmsMessage) -> Result<(), DeliveryError>;
}

/// Resolves a presented session credential to a caller identity.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, bearer: Option<&str>) -> Option<UserId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    MatterCreated,
    EligibilityRecorded,
    IntakeClaimed,
    DraftSaved,
    IntakeSubmitted,
    DocumentGenerated,
    WillSearchMailed,
    NoticesServed,
    ProbateFiled,
    GrantReceived,
    JourneyUpdated,
    ResumeTokenIssued,
    ResumeTokenRedeemed,
    StatusOverride,
    SlotPublished,
    SlotDeleted,
    CallbackBooked,
    CallbackCancelled,
    RequisitionLogged,
    RequisitionResponded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub matter_id: Option<MatterId>,
    pub actor: String,
    pub action: AuditAction,
    pub meta: serde_json::Value,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only trail. Failures never roll back the primary write.
pub trait AuditLog: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Appends to the trail, logging and swallowing sink failures.
pub(crate) fn append_audit(
    audit: &dyn AuditLog,
    matter_id: Option<&MatterId>,
    actor: &str,
    action: AuditAction,
    meta: serde_json::Value,
    at: DateTime<Utc>,
) {
    let entry = AuditEntry {
        matter_id: matter_id.cloned(),
        actor: actor.to_string(),
        action,
        meta,
        at,
    };
    if let Err(error) = audit.append(entry) {
        warn!(action = ?action, error = %error, "audit append failed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    WillSearchFollowUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub matter_id: MatterId,
    pub kind: ReminderKind,
    pub due_on: NaiveDate,
}

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("reminder scheduler unavailable: {0}")]
    Unavailable(String),
}

pub trait ReminderScheduler: Send + Sync {
    fn schedule(&self, reminder: Reminder) -> Result<(), ReminderError>;
}

/// Throttle shared across instances. Returns `false` once the key is over
/// its budget.
pub trait RateLimiter: Send + Sync {
    fn check_and_record(&self, key: &str) -> bool;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Bundle of outbound adapters handed to the workflow service.
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn DocumentRenderer>,
    pub storage: Arc<dyn ArtifactStorage>,
    pub email: Arc<dyn EmailSender>,
    pub sms: Arc<dyn SmsSender>,
    pub audit: Arc<dyn AuditLog>,
    pub reminders: Arc<dyn ReminderScheduler>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub clock: Arc<dyn Clock>,
}
