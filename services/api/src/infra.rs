use chrono::{DateTime, Duration, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use probate_desk::config::{AppConfig, AppEnvironment};
use probate_desk::workflows::probate::{
    ArtifactStorage, AuditEntry, AuditError, AuditLog, Authenticator, CaseApi, CaseWorkflowService,
    Clock, Collaborators, DeliveryError, DocumentKind, DocumentRenderer, EmailMessage,
    EmailSender, MemoryCaseStore, OperatorConsole, OperatorGate, RateLimiter, Reminder,
    ReminderError, ReminderScheduler, SmsMessage, SmsSender, StoredArtifact, SystemClock,
    UpstreamError, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Renders a plain-text summary of the document data. Stands in for the
/// PDF renderer outside production deployments.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PlainTextRenderer;

impl DocumentRenderer for PlainTextRenderer {
    fn render(&self, kind: DocumentKind, data: &serde_json::Value) -> Result<Vec<u8>, UpstreamError> {
        let body = serde_json::to_string_pretty(data)
            .map_err(|err| UpstreamError::new("renderer", err.to_string()))?;
        Ok(format!("{kind}\n\n{body}\n").into_bytes())
    }
}

/// Hands out a fresh placeholder reference per call and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PlaceholderStorage;

impl ArtifactStorage for PlaceholderStorage {
    fn store(&self, kind: DocumentKind, bytes: &[u8]) -> Result<StoredArtifact, UpstreamError> {
        let key = format!("{kind}/{}.pdf", Uuid::new_v4());
        info!(%key, size = bytes.len(), "artifact stored (placeholder)");
        Ok(StoredArtifact {
            url: format!("placeholder://{key}"),
            key,
        })
    }
}

/// Logs outbound email. Production refuses delivery until a provider is
/// configured so a missing integration is visible.
#[derive(Debug, Clone)]
pub(crate) struct LoggingEmailSender {
    provider: Option<String>,
    environment: AppEnvironment,
}

impl LoggingEmailSender {
    pub(crate) fn new(provider: Option<String>, environment: AppEnvironment) -> Self {
        Self {
            provider,
            environment,
        }
    }
}

impl EmailSender for LoggingEmailSender {
    fn send_template_email(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        if self.provider.is_none() && self.environment.is_production() {
            return Err(DeliveryError::NotConfigured);
        }
        info!(
            provider = self.provider.as_deref().unwrap_or("log"),
            template = %message.template,
            subject = %message.subject,
            "email dispatched"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoggingSmsSender {
    provider: Option<String>,
    environment: AppEnvironment,
}

impl LoggingSmsSender {
    pub(crate) fn new(provider: Option<String>, environment: AppEnvironment) -> Self {
        Self {
            provider,
            environment,
        }
    }
}

impl SmsSender for LoggingSmsSender {
    fn send_sms(&self, message: SmsMessage) -> Result<(), DeliveryError> {
        if self.provider.is_none() && self.environment.is_production() {
            return Err(DeliveryError::NotConfigured);
        }
        // Phone numbers stay out of the logs.
        info!(
            provider = self.provider.as_deref().unwrap_or("log"),
            length = message.body.len(),
            "sms dispatched"
        );
        Ok(())
    }
}

/// Writes the audit trail to the structured log under its own target.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let meta = serde_json::to_string(&entry.meta)
            .map_err(|err| AuditError::Unavailable(err.to_string()))?;
        info!(
            target: "audit",
            matter_id = entry.matter_id.as_ref().map(|id| id.0.as_str()).unwrap_or("-"),
            actor = %entry.actor,
            action = ?entry.action,
            at = %entry.at,
            %meta,
            "audit"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingReminderScheduler;

impl ReminderScheduler for TracingReminderScheduler {
    fn schedule(&self, reminder: Reminder) -> Result<(), ReminderError> {
        info!(
            matter_id = %reminder.matter_id,
            kind = ?reminder.kind,
            due_on = %reminder.due_on,
            "reminder scheduled"
        );
        Ok(())
    }
}

/// Clock pinned to one instant, for walkthroughs run "as of" a date.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

const MAX_TRACKED_KEYS: usize = 1024;

/// Sliding-window throttle keyed by caller-supplied strings. Only covers a
/// single process; a shared store replaces it when the service scales out.
pub(crate) struct SlidingWindowLimiter {
    requests: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
    window: Duration,
    max_requests: usize,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub(crate) fn new(window: Duration, max_requests: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            window,
            max_requests: max_requests as usize,
            clock,
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.requests.lock().map(|requests| requests.len()).unwrap_or(0)
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check_and_record(&self, key: &str) -> bool {
        let now = self.clock.now();
        let cutoff = now - self.window;
        let Ok(mut requests) = self.requests.lock() else {
            warn!("rate limiter lock poisoned, refusing request");
            return false;
        };
        if requests.len() > MAX_TRACKED_KEYS {
            requests.retain(|_, timestamps| {
                timestamps.retain(|at| *at > cutoff);
                !timestamps.is_empty()
            });
        }
        let timestamps = requests.entry(key.to_string()).or_default();
        timestamps.retain(|at| *at > cutoff);
        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push(now);
        true
    }
}

/// Development session check: the bearer token is the user id. Disabled in
/// production, where sessions come from the identity provider.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DevBearerAuthenticator {
    enabled: bool,
}

impl DevBearerAuthenticator {
    pub(crate) fn for_environment(environment: AppEnvironment) -> Self {
        Self {
            enabled: !environment.is_production(),
        }
    }
}

impl Authenticator for DevBearerAuthenticator {
    fn authenticate(&self, bearer: Option<&str>) -> Option<UserId> {
        if !self.enabled {
            return None;
        }
        bearer
            .map(str::trim)
            .filter(|token| {
                !token.is_empty()
                    && token.len() <= 64
                    && token
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            })
            .map(|token| UserId(token.to_string()))
    }
}

/// Builds the development collaborators around the given clock.
pub(crate) fn dev_collaborators(config: &AppConfig, clock: Arc<dyn Clock>) -> Collaborators {
    Collaborators {
        renderer: Arc::new(PlainTextRenderer),
        storage: Arc::new(PlaceholderStorage),
        email: Arc::new(LoggingEmailSender::new(
            config.delivery.email_provider.clone(),
            config.environment,
        )),
        sms: Arc::new(LoggingSmsSender::new(
            config.delivery.sms_provider.clone(),
            config.environment,
        )),
        audit: Arc::new(TracingAuditLog),
        reminders: Arc::new(TracingReminderScheduler),
        rate_limiter: Arc::new(SlidingWindowLimiter::new(
            Duration::hours(1),
            config.portal.resume_emails_per_hour,
            clock.clone(),
        )),
        clock,
    }
}

pub(crate) fn build_case_api(config: &AppConfig) -> Arc<CaseApi<MemoryCaseStore>> {
    let store = Arc::new(MemoryCaseStore::new());
    let collaborators = dev_collaborators(config, Arc::new(SystemClock));
    let gate = OperatorGate::from_config(&config.portal);
    if !gate.is_enabled() {
        warn!("OPERATOR_KEY not set, operator endpoints are disabled");
    }
    if config.environment.is_production() {
        warn!("no identity provider configured, signed-in endpoints will reject every session");
    }

    Arc::new(CaseApi {
        service: Arc::new(CaseWorkflowService::new(
            store.clone(),
            collaborators.clone(),
            config.portal.clone(),
        )),
        console: Arc::new(OperatorConsole::new(store, collaborators)),
        gate,
        authenticator: Arc::new(DevBearerAuthenticator::for_environment(config.environment)),
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
