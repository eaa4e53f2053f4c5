use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::eligibility::IneligibilityReason;
use super::journey::JourneyState;
use super::status::PortalStatus;

/// Opaque identifier for a matter (one estate being administered).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatterId(pub String);

impl MatterId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MatterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-facing case number, e.g. `BC-000042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseCode(pub String);

impl CaseCode {
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("BC-{sequence:06}"))
    }
}

impl fmt::Display for CaseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anonymous key minted by the browser before the client signs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientKey(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Probate when a will exists, administration otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    Probate,
    Administration,
}

impl PathType {
    pub fn from_will_exists(has_will: bool) -> Self {
        if has_will {
            Self::Probate
        } else {
            Self::Administration
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RightFitStatus {
    Eligible,
    NotFit,
}

/// Screening verdict persisted on the matter. Written once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightFitRecord {
    pub status: RightFitStatus,
    pub reasons: Vec<IneligibilityReason>,
    pub recorded_at: DateTime<Utc>,
}

/// Dates captured by phase transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMilestones {
    pub will_search_mailed_on: Option<NaiveDate>,
    pub notices_served_on: Option<NaiveDate>,
    pub probate_filed_at: Option<DateTime<Utc>>,
    pub grant_received_on: Option<NaiveDate>,
}

/// Aggregate root for a probate case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matter {
    pub id: MatterId,
    pub case_code: CaseCode,
    pub client_key: ClientKey,
    pub user_id: Option<UserId>,
    pub path_type: Option<PathType>,
    pub right_fit: Option<RightFitRecord>,
    /// `None` until intake is submitted.
    pub portal_status: Option<PortalStatus>,
    pub journey: JourneyState,
    pub milestones: CaseMilestones,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Matter {
    pub fn is_not_fit(&self) -> bool {
        matches!(
            self.right_fit.as_ref().map(|record| record.status),
            Some(RightFitStatus::NotFit)
        )
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.user_id.as_ref() == Some(user)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeDraft {
    pub matter_id: MatterId,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Court document families produced for a matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    WillSearchPacket,
    ProbatePack,
    SupplementalSchedule,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::WillSearchPacket => "will_search_packet",
            Self::ProbatePack => "probate_pack",
            Self::SupplementalSchedule => "supplemental_schedule",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "will_search_packet" | "will_search" => Some(Self::WillSearchPacket),
            "probate_pack" | "pack" => Some(Self::ProbatePack),
            "supplemental_schedule" | "schedule" => Some(Self::SupplementalSchedule),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Generated,
    Mailed,
    Filed,
}

impl ArtifactStatus {
    /// Mailed only applies to will search packets, filed only to probate packs.
    pub fn applies_to(self, kind: DocumentKind) -> bool {
        match self {
            Self::Generated => true,
            Self::Mailed => kind == DocumentKind::WillSearchPacket,
            Self::Filed => kind == DocumentKind::ProbatePack,
        }
    }
}

/// The single current generated document for a (matter, kind) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseArtifact {
    pub id: String,
    pub matter_id: MatterId,
    pub kind: DocumentKind,
    pub status: ArtifactStatus,
    pub artifact_url: String,
    pub storage_key: String,
    pub payload: serde_json::Value,
    pub generation: u32,
    pub generated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackStatus {
    Booked,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSchedule {
    pub id: String,
    pub matter_id: MatterId,
    pub slot_id: String,
    pub phone: String,
    pub status: CallbackStatus,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequisitionStatus {
    Open,
    Responded,
}

/// Registry requisition raised against a filed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requisition {
    pub id: String,
    pub matter_id: MatterId,
    pub summary: String,
    pub received_on: NaiveDate,
    pub status: RequisitionStatus,
    pub response_note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    pub token: String,
    pub matter_id: MatterId,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ResumeToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
