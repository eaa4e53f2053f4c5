//! Court document generation.
//!
//! Each document kind keeps exactly one current artifact per case. A request
//! is validated, rendered, and stored before anything is written, so a
//! renderer or storage failure never leaves a record pointing at nothing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::authz::authorize_owner;
use super::collaborators::AuditAction;
use super::domain::{ArtifactStatus, DocumentKind, MatterId, PathType, PhaseArtifact, UserId};
use super::error::{CaseError, ValidationErrors};
use super::journey::JourneyStepStatus;
use super::navigation::{CaseNavigation, PortalStep};
use super::service::{actor_for, require_fit, CaseWorkflowService};
use super::status::PortalStatus;
use super::store::{ArtifactWrite, CaseStore, PhaseCommit};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct WillSearchInput {
    deceased_name: Option<String>,
    date_of_death: Option<String>,
    last_address: Option<String>,
    applicant_name: Option<String>,
    applicant_email: Option<String>,
}

/// Validated will search notice request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WillSearchRequest {
    pub deceased_name: String,
    pub date_of_death: NaiveDate,
    pub last_address: String,
    pub applicant_name: String,
    pub applicant_email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ProbatePackInput {
    deceased_name: Option<String>,
    date_of_death: Option<String>,
    executor_names: Vec<String>,
    will_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbatePackRequest {
    pub deceased_name: String,
    pub date_of_death: NaiveDate,
    pub executor_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub will_date: Option<NaiveDate>,
    pub path_type: PathType,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ScheduleEntryInput {
    description: Option<String>,
    value_cents: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ScheduleInput {
    title: Option<String>,
    entries: Vec<ScheduleEntryInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub description: String,
    pub value_cents: i64,
}

/// Assets and liabilities listed beyond what the main form holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplementalScheduleRequest {
    pub title: String,
    pub entries: Vec<ScheduleEntry>,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DocumentRequest {
    WillSearch(WillSearchRequest),
    ProbatePack(ProbatePackRequest),
    SupplementalSchedule(SupplementalScheduleRequest),
}

impl DocumentRequest {
    /// Parses and validates a raw payload for `kind`, collecting every field
    /// problem rather than stopping at the first.
    pub fn validate(
        kind: DocumentKind,
        payload: &serde_json::Value,
        path_type: Option<PathType>,
        today: NaiveDate,
    ) -> Result<Self, ValidationErrors> {
        if !payload.is_object() {
            return Err(ValidationErrors::single(
                "payload",
                "document details must be a JSON object",
            ));
        }
        match kind {
            DocumentKind::WillSearchPacket => {
                let input: WillSearchInput = parse_input(payload)?;
                validate_will_search(input, today).map(Self::WillSearch)
            }
            DocumentKind::ProbatePack => {
                let input: ProbatePackInput = parse_input(payload)?;
                let path_type = path_type.unwrap_or(PathType::Probate);
                validate_probate_pack(input, path_type, today).map(Self::ProbatePack)
            }
            DocumentKind::SupplementalSchedule => {
                let input: ScheduleInput = parse_input(payload)?;
                validate_schedule(input).map(Self::SupplementalSchedule)
            }
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn parse_input<T>(payload: &serde_json::Value) -> Result<T, ValidationErrors>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(payload.clone())
        .map_err(|error| ValidationErrors::single("payload", error.to_string()))
}

fn required_text(errors: &mut ValidationErrors, field: &str, value: Option<String>) -> String {
    let value = value.map(|value| value.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.push(field, "is required");
    }
    value
}

fn required_past_date(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let raw = value.map(|value| value.trim().to_string()).unwrap_or_default();
    if raw.is_empty() {
        errors.push(field, "is required");
        return None;
    }
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) if date > today => {
            errors.push(field, "cannot be in the future");
            None
        }
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(field, "must be a date in YYYY-MM-DD form");
            None
        }
    }
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn validate_will_search(
    input: WillSearchInput,
    today: NaiveDate,
) -> Result<WillSearchRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let deceased_name = required_text(&mut errors, "deceased_name", input.deceased_name);
    let date_of_death = required_past_date(&mut errors, "date_of_death", input.date_of_death, today);
    let last_address = required_text(&mut errors, "last_address", input.last_address);
    let applicant_name = required_text(&mut errors, "applicant_name", input.applicant_name);
    let applicant_email = required_text(&mut errors, "applicant_email", input.applicant_email);
    if !applicant_email.is_empty() && !looks_like_email(&applicant_email) {
        errors.push("applicant_email", "must be an email address");
    }

    match date_of_death {
        Some(date_of_death) if errors.is_empty() => Ok(WillSearchRequest {
            deceased_name,
            date_of_death,
            last_address,
            applicant_name,
            applicant_email,
        }),
        _ => Err(errors),
    }
}

fn validate_probate_pack(
    input: ProbatePackInput,
    path_type: PathType,
    today: NaiveDate,
) -> Result<ProbatePackRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let deceased_name = required_text(&mut errors, "deceased_name", input.deceased_name);
    let date_of_death = required_past_date(&mut errors, "date_of_death", input.date_of_death, today);

    let executor_names: Vec<String> = input
        .executor_names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if executor_names.is_empty() {
        errors.push("executor_names", "list at least one executor");
    }

    let will_date = match path_type {
        PathType::Probate => required_past_date(&mut errors, "will_date", input.will_date, today),
        PathType::Administration => None,
    };

    match date_of_death {
        Some(date_of_death) if errors.is_empty() => Ok(ProbatePackRequest {
            deceased_name,
            date_of_death,
            executor_names,
            will_date,
            path_type,
        }),
        _ => Err(errors),
    }
}

fn validate_schedule(input: ScheduleInput) -> Result<SupplementalScheduleRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let title = required_text(&mut errors, "title", input.title);
    if input.entries.is_empty() {
        errors.push("entries", "add at least one entry");
    }

    let mut entries = Vec::with_capacity(input.entries.len());
    for (index, entry) in input.entries.into_iter().enumerate() {
        let description = entry
            .description
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        if description.is_empty() {
            errors.push(&format!("entries[{index}].description"), "is required");
        }
        match entry.value_cents {
            Some(value) if value >= 0 => entries.push(ScheduleEntry {
                description,
                value_cents: value,
            }),
            Some(_) => errors.push(&format!("entries[{index}].value_cents"), "cannot be negative"),
            None => errors.push(&format!("entries[{index}].value_cents"), "is required"),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    let total_cents = entries.iter().map(|entry| entry.value_cents).sum();
    Ok(SupplementalScheduleRequest {
        title,
        entries,
        total_cents,
    })
}

/// Portal step whose unlock gates generation of `kind`.
pub fn gating_step(kind: DocumentKind) -> PortalStep {
    match kind {
        DocumentKind::WillSearchPacket => PortalStep::WillSearch,
        DocumentKind::ProbatePack | DocumentKind::SupplementalSchedule => {
            PortalStep::ProbatePackage
        }
    }
}

/// Status a successful generation moves the case to, if any.
pub fn ready_status(kind: DocumentKind) -> Option<PortalStatus> {
    match kind {
        DocumentKind::WillSearchPacket => Some(PortalStatus::WillSearchReady),
        DocumentKind::ProbatePack => Some(PortalStatus::ProbatePackageReady),
        DocumentKind::SupplementalSchedule => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedDocument {
    pub artifact: PhaseArtifact,
    pub portal_status: Option<PortalStatus>,
}

impl<S> CaseWorkflowService<S>
where
    S: CaseStore + 'static,
{
    /// Renders and stores a document, then upserts the single current
    /// artifact for the case and kind together with any status change.
    pub fn generate_document(
        &self,
        owner: &UserId,
        matter_id: &MatterId,
        kind: DocumentKind,
        payload: &serde_json::Value,
    ) -> Result<GeneratedDocument, CaseError> {
        let matter = authorize_owner(self.store.as_ref(), owner, matter_id)?;
        require_fit(&matter)?;
        let step = gating_step(kind);
        if !CaseNavigation::derive(&matter).is_unlocked(step) {
            return Err(CaseError::conflict(format!(
                "the {} step is not open for this case yet",
                step.key()
            )));
        }

        let filed = self
            .store
            .fetch_artifact(&matter.id, kind)?
            .is_some_and(|existing| existing.status == ArtifactStatus::Filed);
        if filed {
            return Err(CaseError::conflict(format!(
                "the {kind} has been filed and can no longer be regenerated"
            )));
        }

        let now = self.now();
        let request = DocumentRequest::validate(kind, payload, matter.path_type, now.date_naive())
            .map_err(CaseError::Validation)?;
        let data = request.to_value();

        let bytes = self.collaborators.renderer.render(kind, &data)?;
        let stored = self.collaborators.storage.store(kind, &bytes)?;

        let mut commit = PhaseCommit::new(matter.id.clone(), now).with_artifact(
            ArtifactWrite::Upsert {
                kind,
                stored,
                payload: data,
            },
        );
        if let Some(target) = ready_status(kind) {
            commit = commit.advancing_to(target);
        }
        if matter.journey.get(step.key()) != Some(JourneyStepStatus::Done) {
            commit = commit.with_journey(step.step_id(), JourneyStepStatus::InProgress);
        }
        let committed = self.store.commit_phase(commit)?;
        let artifact = committed
            .artifact
            .ok_or(CaseError::NotFound("document"))?;

        info!(
            matter_id = %matter.id,
            kind = %kind,
            generation = artifact.generation,
            bytes = bytes.len(),
            "document generated"
        );
        self.audit(
            Some(&matter.id),
            &actor_for(Some(owner)),
            AuditAction::DocumentGenerated,
            json!({
                "kind": kind.label(),
                "generation": artifact.generation,
                "artifact_url": artifact.artifact_url,
            }),
        );

        Ok(GeneratedDocument {
            artifact,
            portal_status: committed.matter.portal_status,
        })
    }
}
