use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::authz::{authorize, CaseAccess};
use super::collaborators::{AuditAction, EmailMessage};
use super::documents::looks_like_email;
use super::domain::{CaseCode, MatterId, ResumeToken};
use super::error::{CaseError, ValidationErrors};
use super::service::CaseWorkflowService;
use super::store::CaseStore;

pub const RESUME_EMAIL_TEMPLATE: &str = "resume_intake";

/// 32 random bytes, hex encoded.
fn generate_resume_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedResumeToken {
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(skip_serializing)]
    pub resume_url: String,
    pub sent_to: String,
    pub expires_at: DateTime<Utc>,
}

/// Case context handed back when a client follows a resume link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumedCase {
    pub matter_id: MatterId,
    pub case_code: CaseCode,
    /// The draft as it is now, not as it was when the link was sent.
    pub draft: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

impl<S> CaseWorkflowService<S>
where
    S: CaseStore + 'static,
{
    /// Mints a resume link for the case and emails it. A failed email is
    /// logged; the token stays valid.
    pub fn issue_resume_token(
        &self,
        access: &CaseAccess,
        matter_id: &MatterId,
        email: &str,
    ) -> Result<IssuedResumeToken, CaseError> {
        let email = email.trim().to_ascii_lowercase();
        if !looks_like_email(&email) {
            return Err(CaseError::Validation(ValidationErrors::single(
                "email",
                "must be an email address",
            )));
        }
        let matter = authorize(self.store.as_ref(), access, matter_id)?;

        if !self
            .collaborators
            .rate_limiter
            .check_and_record(&format!("resume:{email}"))
        {
            warn!(matter_id = %matter.id, "resume link requests throttled");
            return Err(CaseError::RateLimited);
        }

        let issued_at = self.now();
        let token = ResumeToken {
            token: generate_resume_token(),
            matter_id: matter.id.clone(),
            email: email.clone(),
            issued_at,
            expires_at: issued_at + Duration::hours(self.portal.resume_token_ttl_hours),
        };
        self.store.insert_resume_token(token.clone())?;

        let resume_url = format!(
            "{}/resume?token={}",
            self.portal.public_base_url.trim_end_matches('/'),
            token.token
        );
        let mut variables = BTreeMap::new();
        variables.insert("case_code".to_string(), matter.case_code.to_string());
        variables.insert("resume_url".to_string(), resume_url.clone());
        variables.insert("expires_at".to_string(), token.expires_at.to_rfc3339());
        let message = EmailMessage {
            to: email.clone(),
            subject: format!("Continue your probate application ({})", matter.case_code),
            template: RESUME_EMAIL_TEMPLATE.to_string(),
            variables,
        };
        if let Err(error) = self.collaborators.email.send_template_email(message) {
            warn!(matter_id = %matter.id, error = %error, "resume email not delivered");
        }

        info!(matter_id = %matter.id, expires_at = %token.expires_at, "resume link issued");
        self.audit(
            Some(&matter.id),
            &access.actor(),
            AuditAction::ResumeTokenIssued,
            json!({ "email": email, "expires_at": token.expires_at }),
        );

        Ok(IssuedResumeToken {
            token: token.token,
            resume_url,
            sent_to: email,
            expires_at: token.expires_at,
        })
    }

    /// Looks up a resume link. Tokens stay redeemable until they expire.
    pub fn redeem_resume_token(&self, token: &str) -> Result<ResumedCase, CaseError> {
        let record = self
            .store
            .fetch_resume_token(token.trim())?
            .ok_or(CaseError::NotFound("resume token"))?;
        if record.is_expired_at(self.now()) {
            info!(matter_id = %record.matter_id, "expired resume link presented");
            return Err(CaseError::Expired);
        }

        let matter = self
            .store
            .fetch_matter(&record.matter_id)?
            .ok_or(CaseError::NotFound("matter"))?;
        let draft = self
            .store
            .fetch_draft(&matter.id)?
            .ok_or(CaseError::NotFound("intake draft"))?;

        self.audit(
            Some(&matter.id),
            &format!("resume:{}", record.email),
            AuditAction::ResumeTokenRedeemed,
            json!({}),
        );

        Ok(ResumedCase {
            matter_id: matter.id,
            case_code: matter.case_code,
            draft: draft.payload,
            expires_at: record.expires_at,
        })
    }
}
