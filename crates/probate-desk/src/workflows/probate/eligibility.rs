//! Right-fit screening for the self-serve probate path.
//!
//! Every rule is evaluated on its own so the client sees every reason the
//! case falls outside what the service can prepare, not just the first one.

use serde::{Deserialize, Serialize};

/// Screening answer as captured by the intake form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Answer {
    Yes,
    No,
    #[default]
    Unsure,
    NeedHelp,
}

impl From<String> for Answer {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl Answer {
    /// Unknown values read as `Unsure`; they never disqualify on their own.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" => Self::Yes,
            "no" | "n" | "false" => Self::No,
            "need_help" | "needhelp" | "helper" | "help" => Self::NeedHelp,
            _ => Self::Unsure,
        }
    }

    pub fn is_no(self) -> bool {
        matches!(self, Self::No)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityAnswers {
    #[serde(default, alias = "estateInBC", alias = "estateInBc")]
    pub estate_in_bc: Answer,
    #[serde(default, alias = "isExecutor")]
    pub is_executor: Answer,
    #[serde(default, alias = "willStraightforward")]
    pub will_straightforward: Answer,
    #[serde(default, alias = "assetsCommon")]
    pub assets_common: Answer,
    /// Free-text elaboration supplied when the assets are not the usual kinds.
    #[serde(default, alias = "assetsDetails")]
    pub assets_details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityReason {
    EstateOutsideBc,
    NotExecutor,
    WillNotStraightforward,
    ComplexAssets,
}

impl IneligibilityReason {
    pub const fn message(self) -> &'static str {
        match self {
            Self::EstateOutsideBc => {
                "The estate is not located in British Columbia, so a BC grant cannot be prepared here."
            }
            Self::NotExecutor => {
                "Only the named executor or a proposed administrator can apply for the grant."
            }
            Self::WillNotStraightforward => {
                "A contested or unusual will needs a lawyer's review before applying."
            }
            Self::ComplexAssets => {
                "The estate includes assets that need professional valuation or advice."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    Eligible,
    NotFit,
}

pub const REFERRAL_MESSAGE: &str =
    "This estate needs more help than our guided service provides. We recommend speaking with a BC wills and estates lawyer or notary.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityOutcome {
    pub status: EligibilityStatus,
    pub reasons: Vec<IneligibilityReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<String>,
}

impl EligibilityOutcome {
    pub fn is_eligible(&self) -> bool {
        self.status == EligibilityStatus::Eligible
    }
}

/// Pure, total screening decision.
pub fn evaluate(answers: &EligibilityAnswers) -> EligibilityOutcome {
    let mut reasons = Vec::new();

    if answers.estate_in_bc.is_no() {
        reasons.push(IneligibilityReason::EstateOutsideBc);
    }
    if answers.is_executor.is_no() {
        reasons.push(IneligibilityReason::NotExecutor);
    }
    if answers.will_straightforward.is_no() {
        reasons.push(IneligibilityReason::WillNotStraightforward);
    }

    // A bare "no" without an explanation is not enough to turn the client away.
    let has_asset_details = answers
        .assets_details
        .as_deref()
        .map(|details| !details.trim().is_empty())
        .unwrap_or(false);
    if answers.assets_common.is_no() && has_asset_details {
        reasons.push(IneligibilityReason::ComplexAssets);
    }

    if reasons.is_empty() {
        EligibilityOutcome {
            status: EligibilityStatus::Eligible,
            reasons,
            referral: None,
        }
    } else {
        EligibilityOutcome {
            status: EligibilityStatus::NotFit,
            reasons,
            referral: Some(REFERRAL_MESSAGE.to_string()),
        }
    }
}
