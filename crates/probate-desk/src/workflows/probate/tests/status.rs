use chrono::NaiveDate;

use super::common::*;
use crate::workflows::probate::domain::{CaseMilestones, RightFitRecord, RightFitStatus};
use crate::workflows::probate::navigation::{CaseNavigation, PortalStep};
use crate::workflows::probate::status::{
    advance, has_reached_status, normalize_status, validate_transition, PortalStatus,
    PORTAL_STATUSES,
};

#[test]
fn has_reached_is_a_strict_total_order() {
    for x in PORTAL_STATUSES {
        assert!(has_reached_status(Some(x), x), "{x} reaches itself");
        for y in PORTAL_STATUSES {
            if x != y {
                assert_ne!(
                    has_reached_status(Some(x), y),
                    has_reached_status(Some(y), x),
                    "{x} vs {y}"
                );
            }
        }
    }
}

#[test]
fn no_status_reaches_nothing() {
    for status in PORTAL_STATUSES {
        assert!(!has_reached_status(None, status));
    }
}

#[test]
fn normalize_status_never_leaks_unknown_values() {
    assert_eq!(
        normalize_status(Some("  Probate_Filed "), None),
        Some(PortalStatus::ProbateFiled)
    );
    assert_eq!(
        normalize_status(Some("notices_waiting_21_days"), None),
        Some(PortalStatus::NoticesWaiting21Days)
    );
    assert_eq!(
        normalize_status(Some("archived"), Some(PortalStatus::IntakeComplete)),
        Some(PortalStatus::IntakeComplete)
    );
    assert_eq!(normalize_status(None, None), None);
}

#[test]
fn transitions_only_move_forward() {
    assert!(validate_transition(None, PortalStatus::IntakeComplete).is_ok());
    assert!(validate_transition(Some(PortalStatus::WillSearchReady), PortalStatus::WillSearchReady).is_ok());
    assert!(validate_transition(Some(PortalStatus::WillSearchReady), PortalStatus::Done).is_ok());

    let backward = validate_transition(Some(PortalStatus::ProbateFiled), PortalStatus::WillSearchSent)
        .unwrap_err();
    assert_eq!(backward.from, PortalStatus::ProbateFiled);
    assert_eq!(backward.to, PortalStatus::WillSearchSent);
}

#[test]
fn advance_never_regresses() {
    assert_eq!(
        advance(Some(PortalStatus::WaitingForGrant), PortalStatus::ProbatePackageReady),
        PortalStatus::WaitingForGrant
    );
    assert_eq!(
        advance(Some(PortalStatus::IntakeComplete), PortalStatus::WillSearchReady),
        PortalStatus::WillSearchReady
    );
    assert_eq!(advance(None, PortalStatus::IntakeComplete), PortalStatus::IntakeComplete);
}

#[test]
fn navigation_unlocks_steps_by_threshold() {
    let harness = harness();
    let mut matter = submitted_case(&harness, "nav-1");
    matter.portal_status = Some(PortalStatus::NoticesWaiting21Days);

    let navigation = CaseNavigation::derive(&matter);

    assert!(navigation.is_unlocked(PortalStep::Intake));
    assert!(navigation.is_unlocked(PortalStep::WillSearch));
    assert!(navigation.is_unlocked(PortalStep::Notices));
    assert!(navigation.is_unlocked(PortalStep::ProbatePackage));
    assert!(!navigation.is_unlocked(PortalStep::ProbateFiling));
    assert_eq!(navigation.current_step, PortalStep::ProbatePackage);
}

#[test]
fn navigation_reports_the_filing_window() {
    let harness = harness();
    let mut matter = submitted_case(&harness, "nav-2");
    matter.milestones = CaseMilestones {
        notices_served_on: NaiveDate::from_ymd_opt(2026, 2, 10),
        ..CaseMilestones::default()
    };

    let navigation = CaseNavigation::derive(&matter);

    assert_eq!(navigation.filing_opens_on, NaiveDate::from_ymd_opt(2026, 3, 3));
}

#[test]
fn not_fit_cases_have_every_step_locked() {
    let harness = harness();
    let mut matter = submitted_case(&harness, "nav-3");
    matter.right_fit = Some(RightFitRecord {
        status: RightFitStatus::NotFit,
        reasons: Vec::new(),
        recorded_at: start_of_test(),
    });

    let navigation = CaseNavigation::derive(&matter);

    assert!(navigation.status.is_none());
    assert!(navigation.steps.iter().all(|access| !access.unlocked));
    assert_eq!(navigation.current_step, PortalStep::Intake);
}

#[test]
fn finished_cases_land_on_closeout() {
    let harness = harness();
    let mut matter = submitted_case(&harness, "nav-4");
    matter.portal_status = Some(PortalStatus::Done);

    let navigation = CaseNavigation::derive(&matter);

    assert!(navigation.steps.iter().all(|access| access.complete));
    assert_eq!(navigation.current_step, PortalStep::Closeout);
}
