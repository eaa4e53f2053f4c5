use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::authz::CaseAccess;
use super::collaborators::Authenticator;
use super::domain::{ClientKey, DocumentKind, MatterId, UserId};
use super::eligibility::EligibilityAnswers;
use super::error::{CaseError, ValidationErrors};
use super::journey::JourneyStepStatus;
use super::operator::{OperatorCapability, OperatorConsole, OperatorGate};
use super::service::CaseWorkflowService;
use super::store::CaseStore;

pub const CLIENT_KEY_HEADER: &str = "x-client-key";
pub const OPERATOR_KEY_HEADER: &str = "x-operator-key";

/// Everything the HTTP layer needs: the client-facing service, the operator
/// console behind its gate, and the session authenticator.
pub struct CaseApi<S> {
    pub service: Arc<CaseWorkflowService<S>>,
    pub console: Arc<OperatorConsole<S>>,
    pub gate: OperatorGate,
    pub authenticator: Arc<dyn Authenticator>,
}

impl<S> CaseApi<S>
where
    S: CaseStore + 'static,
{
    fn caller(&self, headers: &HeaderMap) -> Result<Option<UserId>, CaseError> {
        match bearer_token(headers) {
            Some(token) => self
                .authenticator
                .authenticate(Some(token))
                .map(Some)
                .ok_or(CaseError::Unauthorized),
            None => Ok(None),
        }
    }

    fn owner(&self, headers: &HeaderMap) -> Result<UserId, CaseError> {
        self.caller(headers)?.ok_or(CaseError::Unauthorized)
    }

    /// Signed-in callers act as owners. Anonymous callers fall back to the
    /// browser's client key.
    fn access(&self, headers: &HeaderMap) -> Result<CaseAccess, CaseError> {
        if let Some(user) = self.caller(headers)? {
            return Ok(CaseAccess::Owner(user));
        }
        client_key(headers)
            .map(CaseAccess::ClientKey)
            .ok_or(CaseError::Unauthorized)
    }

    fn operator(&self, headers: &HeaderMap) -> Result<OperatorCapability, CaseError> {
        let presented = headers
            .get(OPERATOR_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        self.gate.authorize(presented)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn client_key(headers: &HeaderMap) -> Option<ClientKey> {
    headers
        .get(CLIENT_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| ClientKey(key.to_string()))
}

impl IntoResponse for CaseError {
    fn into_response(self) -> Response {
        let status = match &self {
            CaseError::Unauthorized => StatusCode::UNAUTHORIZED,
            CaseError::Forbidden => StatusCode::FORBIDDEN,
            CaseError::NotFound(_) => StatusCode::NOT_FOUND,
            CaseError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CaseError::Conflict(_) => StatusCode::CONFLICT,
            CaseError::Expired => StatusCode::GONE,
            CaseError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            CaseError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CaseError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = match &self {
            CaseError::Validation(errors) => json!({
                "error": "some fields need attention",
                "fields": errors.fields,
            }),
            CaseError::Upstream(upstream) => {
                error!(collaborator = upstream.collaborator, error = %upstream, "upstream failure");
                json!({ "error": "a document service is unavailable, please try again" })
            }
            CaseError::Store(store) => {
                error!(error = %store, "case store failure");
                json!({ "error": "internal error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, axum::Json(payload)).into_response()
    }
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, CaseError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Router builder exposing the client portal and operator endpoints.
pub fn case_router<S>(api: Arc<CaseApi<S>>) -> Router
where
    S: CaseStore + 'static,
{
    Router::new()
        .route("/api/v1/eligibility", post(screen_handler::<S>))
        .route("/api/v1/intake", post(open_intake_handler::<S>))
        .route("/api/v1/matters/:matter_id", get(status_handler::<S>))
        .route("/api/v1/matters/:matter_id/draft", put(save_draft_handler::<S>))
        .route(
            "/api/v1/matters/:matter_id/submit",
            post(submit_intake_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/documents/:kind",
            post(generate_document_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/will-search/mailed",
            post(will_search_mailed_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/notices/served",
            post(notices_served_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/probate/filed",
            post(probate_filed_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/grant/received",
            post(grant_received_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/journey/:step",
            put(journey_step_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/resume-tokens",
            post(issue_resume_token_handler::<S>),
        )
        .route("/api/v1/resume/:token", post(redeem_resume_token_handler::<S>))
        .route("/api/v1/callbacks/slots", get(open_slots_handler::<S>))
        .route(
            "/api/v1/matters/:matter_id/callbacks",
            post(book_callback_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/callbacks/:callback_id",
            delete(cancel_callback_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/requisitions",
            post(log_requisition_handler::<S>),
        )
        .route(
            "/api/v1/matters/:matter_id/requisitions/:requisition_id/respond",
            post(respond_requisition_handler::<S>),
        )
        .route(
            "/api/v1/operator/matters/:matter_id/status",
            put(override_status_handler::<S>),
        )
        .route(
            "/api/v1/operator/slots",
            get(list_slots_handler::<S>).post(publish_slot_handler::<S>),
        )
        .route(
            "/api/v1/operator/slots/:slot_id",
            delete(delete_slot_handler::<S>),
        )
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScreeningRequest {
    #[serde(default, alias = "clientKey")]
    client_key: Option<String>,
    #[serde(default)]
    answers: EligibilityAnswers,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenIntakeRequest {
    #[serde(alias = "clientKey")]
    client_key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitIntakeRequest {
    #[serde(alias = "hasWill")]
    has_will: bool,
}

/// Optional client-supplied dates for the phase triggers.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PhaseEventRequest {
    #[serde(alias = "mailedOn")]
    mailed_on: Option<String>,
    #[serde(alias = "servedOn")]
    served_on: Option<String>,
    #[serde(alias = "filedAt")]
    filed_at: Option<String>,
    #[serde(alias = "receivedOn")]
    received_on: Option<String>,
}

impl PhaseEventRequest {
    /// Every date is optional, so an empty body is an empty request.
    fn from_body(body: &[u8]) -> Result<Self, CaseError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|err| {
            CaseError::Validation(ValidationErrors::single(
                "body",
                format!("expected a JSON object of dates: {err}"),
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JourneyStepRequest {
    status: JourneyStepStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResumeTokenRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookCallbackRequest {
    #[serde(alias = "slotId")]
    slot_id: String,
    phone: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogRequisitionRequest {
    summary: String,
    #[serde(default, alias = "receivedOn")]
    received_on: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondRequisitionRequest {
    note: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverrideStatusRequest {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublishSlotRequest {
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

pub(crate) async fn screen_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ScreeningRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.caller(&headers).and_then(|caller| {
        let key = request
            .client_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(ClientKey)
            .or_else(|| client_key(&headers));
        api.service.screen(caller.as_ref(), key, &request.answers)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn open_intake_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<OpenIntakeRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        let key = request.client_key.trim();
        if key.is_empty() {
            return Err(CaseError::Validation(ValidationErrors::single(
                "client_key",
                "is required",
            )));
        }
        let matter = api.service.open_intake(&owner, ClientKey(key.to_string()))?;
        api.service.view(matter)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn status_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api
        .access(&headers)
        .and_then(|access| api.service.status(&access, &MatterId(matter_id)));
    respond(StatusCode::OK, result)
}

pub(crate) async fn save_draft_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    axum::Json(payload): axum::Json<serde_json::Value>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api
        .access(&headers)
        .and_then(|access| api.service.save_draft(&access, &MatterId(matter_id), payload));
    respond(StatusCode::OK, result)
}

pub(crate) async fn submit_intake_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    axum::Json(request): axum::Json<SubmitIntakeRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        api.service
            .submit_intake(&owner, &MatterId(matter_id), request.has_will)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn generate_document_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path((matter_id, kind)): Path<(String, String)>,
    axum::Json(payload): axum::Json<serde_json::Value>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        let kind = DocumentKind::parse(&kind).ok_or(CaseError::NotFound("document kind"))?;
        api.service
            .generate_document(&owner, &MatterId(matter_id), kind, &payload)
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn will_search_mailed_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    body: Bytes,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        let request = PhaseEventRequest::from_body(&body)?;
        api.service.mark_will_search_mailed(
            &owner,
            &MatterId(matter_id),
            request.mailed_on.as_deref(),
        )
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn notices_served_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    body: Bytes,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        let request = PhaseEventRequest::from_body(&body)?;
        api.service.mark_notices_served(
            &owner,
            &MatterId(matter_id),
            request.served_on.as_deref(),
        )
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn probate_filed_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    body: Bytes,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        let request = PhaseEventRequest::from_body(&body)?;
        api.service
            .mark_probate_filed(&owner, &MatterId(matter_id), request.filed_at.as_deref())
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn grant_received_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    body: Bytes,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        let request = PhaseEventRequest::from_body(&body)?;
        api.service.mark_grant_received(
            &owner,
            &MatterId(matter_id),
            request.received_on.as_deref(),
        )
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn journey_step_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path((matter_id, step)): Path<(String, String)>,
    axum::Json(request): axum::Json<JourneyStepRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.access(&headers).and_then(|access| {
        api.service
            .set_journey_step(&access, &MatterId(matter_id), &step, request.status)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn issue_resume_token_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    axum::Json(request): axum::Json<ResumeTokenRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.access(&headers).and_then(|access| {
        api.service
            .issue_resume_token(&access, &MatterId(matter_id), &request.email)
    });
    respond(StatusCode::ACCEPTED, result)
}

pub(crate) async fn redeem_resume_token_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    Path(token): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
{
    respond(StatusCode::OK, api.service.redeem_resume_token(&token))
}

pub(crate) async fn open_slots_handler<S>(State(api): State<Arc<CaseApi<S>>>) -> Response
where
    S: CaseStore + 'static,
{
    respond(StatusCode::OK, api.service.open_slots())
}

pub(crate) async fn book_callback_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    axum::Json(request): axum::Json<BookCallbackRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        api.service.book_callback(
            &owner,
            &MatterId(matter_id),
            &request.slot_id,
            &request.phone,
        )
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn cancel_callback_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path((matter_id, callback_id)): Path<(String, String)>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        api.service
            .cancel_callback(&owner, &MatterId(matter_id), &callback_id)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn log_requisition_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    axum::Json(request): axum::Json<LogRequisitionRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        api.service.log_requisition(
            &owner,
            &MatterId(matter_id),
            &request.summary,
            request.received_on.as_deref(),
        )
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn respond_requisition_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path((matter_id, requisition_id)): Path<(String, String)>,
    axum::Json(request): axum::Json<RespondRequisitionRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.owner(&headers).and_then(|owner| {
        api.service.respond_to_requisition(
            &owner,
            &MatterId(matter_id),
            &requisition_id,
            &request.note,
        )
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn override_status_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(matter_id): Path<String>,
    axum::Json(request): axum::Json<OverrideStatusRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.operator(&headers).and_then(|capability| {
        api.console.override_status(
            &capability,
            &MatterId(matter_id),
            request.status.as_deref(),
        )
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn list_slots_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api
        .operator(&headers)
        .and_then(|capability| api.console.list_slots(&capability));
    respond(StatusCode::OK, result)
}

pub(crate) async fn publish_slot_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<PublishSlotRequest>,
) -> Response
where
    S: CaseStore + 'static,
{
    let result = api.operator(&headers).and_then(|capability| {
        api.console
            .publish_slot(&capability, request.starts_at, request.ends_at)
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn delete_slot_handler<S>(
    State(api): State<Arc<CaseApi<S>>>,
    headers: HeaderMap,
    Path(slot_id): Path<String>,
) -> Response
where
    S: CaseStore + 'static,
{
    match api
        .operator(&headers)
        .and_then(|capability| api.console.delete_slot(&capability, &slot_id))
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    }
}
