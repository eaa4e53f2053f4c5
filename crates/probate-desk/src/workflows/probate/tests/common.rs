use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use crate::config::PortalConfig;
use crate::workflows::probate::authz::CaseAccess;
use crate::workflows::probate::collaborators::{
    ArtifactStorage, AuditEntry, AuditError, AuditLog, Authenticator, Clock, Collaborators,
    DeliveryError, DocumentRenderer, EmailMessage, EmailSender, RateLimiter, Reminder,
    ReminderError, ReminderScheduler, SmsMessage, SmsSender, StoredArtifact,
};
use crate::workflows::probate::domain::{ClientKey, DocumentKind, Matter, MatterId, UserId};
use crate::workflows::probate::error::UpstreamError;
use crate::workflows::probate::memory::MemoryCaseStore;
use crate::workflows::probate::operator::{OperatorConsole, OperatorGate};
use crate::workflows::probate::router::{case_router, CaseApi};
use crate::workflows::probate::service::CaseWorkflowService;

pub(super) const OPERATOR_KEY: &str = "desk-operator-key";

pub(super) fn start_of_test() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 17, 0, 0).unwrap()
}

pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl AuditLog for RecordingAudit {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

pub(super) struct FailingAudit;

impl AuditLog for FailingAudit {
    fn append(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("audit table locked".to_string()))
    }
}

#[derive(Default)]
pub(super) struct RecordingEmail {
    messages: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmail {
    pub(super) fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl EmailSender for RecordingEmail {
    fn send_template_email(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

pub(super) struct FailingEmail;

impl EmailSender for FailingEmail {
    fn send_template_email(&self, _message: EmailMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::Transport("smtp relay refused".to_string()))
    }
}

#[derive(Default)]
pub(super) struct RecordingSms {
    messages: Mutex<Vec<SmsMessage>>,
}

impl RecordingSms {
    pub(super) fn messages(&self) -> Vec<SmsMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl SmsSender for RecordingSms {
    fn send_sms(&self, message: SmsMessage) -> Result<(), DeliveryError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingReminders {
    reminders: Mutex<Vec<Reminder>>,
}

impl RecordingReminders {
    pub(super) fn reminders(&self) -> Vec<Reminder> {
        self.reminders.lock().unwrap().clone()
    }
}

impl ReminderScheduler for RecordingReminders {
    fn schedule(&self, reminder: Reminder) -> Result<(), ReminderError> {
        self.reminders.lock().unwrap().push(reminder);
        Ok(())
    }
}

pub(super) struct FailingReminders;

impl ReminderScheduler for FailingReminders {
    fn schedule(&self, _reminder: Reminder) -> Result<(), ReminderError> {
        Err(ReminderError::Unavailable("queue offline".to_string()))
    }
}

pub(super) struct TextRenderer;

impl DocumentRenderer for TextRenderer {
    fn render(&self, kind: DocumentKind, data: &Value) -> Result<Vec<u8>, UpstreamError> {
        Ok(format!("{kind}: {data}").into_bytes())
    }
}

pub(super) struct FailingRenderer;

impl DocumentRenderer for FailingRenderer {
    fn render(&self, _kind: DocumentKind, _data: &Value) -> Result<Vec<u8>, UpstreamError> {
        Err(UpstreamError::new("renderer", "template missing"))
    }
}

/// Hands out a new reference on every call, like a real bucket allocator.
#[derive(Default)]
pub(super) struct CountingStorage {
    next: AtomicU64,
}

impl ArtifactStorage for CountingStorage {
    fn store(&self, kind: DocumentKind, _bytes: &[u8]) -> Result<StoredArtifact, UpstreamError> {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StoredArtifact {
            url: format!("memory://{kind}/{n}.pdf"),
            key: format!("{kind}/{n}"),
        })
    }
}

pub(super) struct FailingStorage;

impl ArtifactStorage for FailingStorage {
    fn store(&self, _kind: DocumentKind, _bytes: &[u8]) -> Result<StoredArtifact, UpstreamError> {
        Err(UpstreamError::new("storage", "bucket unreachable"))
    }
}

/// Allows `budget` calls per key.
pub(super) struct BudgetLimiter {
    budget: usize,
    calls: Mutex<HashMap<String, usize>>,
}

impl BudgetLimiter {
    pub(super) fn new(budget: usize) -> Self {
        Self {
            budget,
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for BudgetLimiter {
    fn check_and_record(&self, key: &str) -> bool {
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(key.to_string()).or_insert(0);
        if *count >= self.budget {
            return false;
        }
        *count += 1;
        true
    }
}

/// Treats `Bearer <user-id>` as a valid session, except the literal
/// `expired`.
pub(super) struct BearerIsUser;

impl Authenticator for BearerIsUser {
    fn authenticate(&self, bearer: Option<&str>) -> Option<UserId> {
        bearer
            .filter(|token| *token != "expired")
            .map(|token| UserId(token.to_string()))
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<MemoryCaseStore>,
    pub(super) service: Arc<CaseWorkflowService<MemoryCaseStore>>,
    pub(super) console: Arc<OperatorConsole<MemoryCaseStore>>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) audit: Arc<RecordingAudit>,
    pub(super) email: Arc<RecordingEmail>,
    pub(super) sms: Arc<RecordingSms>,
    pub(super) reminders: Arc<RecordingReminders>,
}

pub(super) fn portal_config() -> PortalConfig {
    PortalConfig {
        public_base_url: "https://desk.example.ca/".to_string(),
        resume_token_ttl_hours: 24,
        resume_emails_per_hour: 5,
        operator_key: Some(OPERATOR_KEY.to_string()),
    }
}

pub(super) fn harness() -> Harness {
    harness_with(|_| {})
}

/// Builds a harness, letting the caller swap collaborators before the
/// service is assembled.
pub(super) fn harness_with(customize: impl FnOnce(&mut Collaborators)) -> Harness {
    let store = Arc::new(MemoryCaseStore::new());
    let clock = Arc::new(ManualClock::new(start_of_test()));
    let audit = Arc::new(RecordingAudit::default());
    let email = Arc::new(RecordingEmail::default());
    let sms = Arc::new(RecordingSms::default());
    let reminders = Arc::new(RecordingReminders::default());

    let mut collaborators = Collaborators {
        renderer: Arc::new(TextRenderer),
        storage: Arc::new(CountingStorage::default()),
        email: email.clone(),
        sms: sms.clone(),
        audit: audit.clone(),
        reminders: reminders.clone(),
        rate_limiter: Arc::new(BudgetLimiter::new(5)),
        clock: clock.clone(),
    };
    customize(&mut collaborators);

    let service = Arc::new(CaseWorkflowService::new(
        store.clone(),
        collaborators.clone(),
        portal_config(),
    ));
    let console = Arc::new(OperatorConsole::new(store.clone(), collaborators));

    Harness {
        store,
        service,
        console,
        clock,
        audit,
        email,
        sms,
        reminders,
    }
}

pub(super) fn case_router_for(harness: &Harness) -> axum::Router {
    case_router(Arc::new(CaseApi {
        service: harness.service.clone(),
        console: harness.console.clone(),
        gate: OperatorGate::new(Some(OPERATOR_KEY.to_string())),
        authenticator: Arc::new(BearerIsUser),
    }))
}

pub(super) fn owner() -> UserId {
    UserId("user-ada".to_string())
}

pub(super) fn stranger() -> UserId {
    UserId("user-mallory".to_string())
}

pub(super) fn draft() -> Value {
    json!({
        "deceased": { "name": "Edith Crawley", "date_of_death": "2026-01-15" },
        "applicant": { "name": "Mary Crawley", "email": "mary@example.com" },
    })
}

pub(super) fn will_search_payload() -> Value {
    json!({
        "deceased_name": "Edith Crawley",
        "date_of_death": "2026-01-15",
        "last_address": "12 Oak St, Victoria BC V8V 1A1",
        "applicant_name": "Mary Crawley",
        "applicant_email": "mary@example.com",
    })
}

pub(super) fn probate_pack_payload() -> Value {
    json!({
        "deceased_name": "Edith Crawley",
        "date_of_death": "2026-01-15",
        "executor_names": ["Mary Crawley"],
        "will_date": "2019-06-01",
    })
}

pub(super) fn schedule_payload() -> Value {
    json!({
        "title": "Schedule of assets",
        "entries": [
            { "description": "RBC chequing", "value_cents": 1_250_000 },
            { "description": "2014 Subaru Outback", "value_cents": 900_000 },
        ],
    })
}

/// Opens a case for [`owner`], saves a draft, and submits intake.
pub(super) fn submitted_case(harness: &Harness, key: &str) -> Matter {
    let matter = harness
        .service
        .open_intake(&owner(), ClientKey(key.to_string()))
        .expect("intake opens");
    harness
        .service
        .save_draft(&owner_access(), &matter.id, draft())
        .expect("draft saves");
    harness
        .service
        .submit_intake(&owner(), &matter.id, true)
        .expect("intake submits")
        .matter
}

pub(super) fn owner_access() -> CaseAccess {
    CaseAccess::Owner(owner())
}

/// Walks a submitted case through will search and notices, with notices
/// served long enough ago that filing is open, and generates the pack.
pub(super) fn package_ready_case(harness: &Harness, key: &str) -> MatterId {
    let matter = submitted_case(harness, key);
    harness
        .service
        .generate_document(
            &owner(),
            &matter.id,
            DocumentKind::WillSearchPacket,
            &will_search_payload(),
        )
        .expect("will search generates");
    harness
        .service
        .mark_will_search_mailed(&owner(), &matter.id, Some("2026-02-01"))
        .expect("mailed");
    harness
        .service
        .mark_notices_served(&owner(), &matter.id, Some("2026-02-03"))
        .expect("served");
    harness
        .service
        .generate_document(
            &owner(),
            &matter.id,
            DocumentKind::ProbatePack,
            &probate_pack_payload(),
        )
        .expect("pack generates");
    matter.id
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("json body")
}
