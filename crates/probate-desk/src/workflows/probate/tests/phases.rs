use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use super::common::*;
use crate::workflows::probate::collaborators::{AuditAction, ReminderKind};
use crate::workflows::probate::domain::{ArtifactStatus, DocumentKind};
use crate::workflows::probate::error::CaseError;
use crate::workflows::probate::journey::JourneyStepStatus;
use crate::workflows::probate::navigation::PortalStep;
use crate::workflows::probate::service::WILL_SEARCH_FOLLOW_UP_DAYS;
use crate::workflows::probate::status::PortalStatus;
use crate::workflows::probate::store::CaseStore;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

#[test]
fn filing_without_a_date_records_now_and_files_the_pack() {
    let harness = harness();
    let matter_id = package_ready_case(&harness, "phase-file");

    let view = harness
        .service
        .mark_probate_filed(&owner(), &matter_id, None)
        .expect("filing opens after the notice period");

    assert_eq!(view.matter.portal_status, Some(PortalStatus::WaitingForGrant));
    assert_eq!(view.matter.milestones.probate_filed_at, Some(start_of_test()));
    assert_eq!(
        view.matter.journey.get("probate_filing"),
        Some(JourneyStepStatus::Done)
    );
    let pack = harness
        .store
        .fetch_artifact(&matter_id, DocumentKind::ProbatePack)
        .unwrap()
        .expect("pack exists");
    assert_eq!(pack.status, ArtifactStatus::Filed);
    assert!(view.navigation.is_unlocked(PortalStep::Grant));
}

#[test]
fn garbled_filing_dates_fall_back_to_now() {
    let harness = harness();
    let matter_id = package_ready_case(&harness, "phase-file-garbled");

    let view = harness
        .service
        .mark_probate_filed(&owner(), &matter_id, Some("last thursday"))
        .unwrap();

    assert_eq!(view.matter.milestones.probate_filed_at, Some(start_of_test()));
}

#[test]
fn mailing_requires_a_generated_packet() {
    let harness = harness();
    let matter = submitted_case(&harness, "phase-no-packet");

    let result = harness
        .service
        .mark_will_search_mailed(&owner(), &matter.id, Some("2026-02-01"));

    assert!(matches!(result, Err(CaseError::Conflict(_))));
    let stored = harness.store.fetch_matter(&matter.id).unwrap().unwrap();
    assert_eq!(stored.portal_status, Some(PortalStatus::IntakeComplete));
    assert!(harness.reminders.reminders().is_empty());
}

#[test]
fn mailing_marks_the_packet_and_schedules_a_reminder() {
    let harness = harness();
    let matter = submitted_case(&harness, "phase-mailed");
    harness
        .service
        .generate_document(
            &owner(),
            &matter.id,
            DocumentKind::WillSearchPacket,
            &will_search_payload(),
        )
        .unwrap();

    let view = harness
        .service
        .mark_will_search_mailed(&owner(), &matter.id, Some("2026-02-01"))
        .expect("mailed");

    assert_eq!(view.matter.portal_status, Some(PortalStatus::WillSearchSent));
    assert_eq!(
        view.matter.milestones.will_search_mailed_on,
        Some(date("2026-02-01"))
    );
    assert_eq!(view.documents[0].status, ArtifactStatus::Mailed);

    let reminders = harness.reminders.reminders();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].kind, ReminderKind::WillSearchFollowUp);
    assert_eq!(
        reminders[0].due_on,
        date("2026-02-01") + Duration::days(WILL_SEARCH_FOLLOW_UP_DAYS)
    );
    assert_eq!(reminders[0].due_on, date("2026-03-01"));
}

#[test]
fn reminder_failures_do_not_block_mailing() {
    let harness = harness_with(|collaborators| {
        collaborators.reminders = Arc::new(FailingReminders);
    });
    let matter = submitted_case(&harness, "phase-reminder-fail");
    harness
        .service
        .generate_document(
            &owner(),
            &matter.id,
            DocumentKind::WillSearchPacket,
            &will_search_payload(),
        )
        .unwrap();

    let view = harness
        .service
        .mark_will_search_mailed(&owner(), &matter.id, None)
        .expect("reminder is best effort");

    assert_eq!(view.matter.portal_status, Some(PortalStatus::WillSearchSent));
    assert_eq!(
        view.matter.milestones.will_search_mailed_on,
        Some(start_of_test().date_naive())
    );
}

#[test]
fn notices_wait_for_the_will_search_to_go_out() {
    let harness = harness();
    let matter = submitted_case(&harness, "phase-early-notices");

    let result = harness
        .service
        .mark_notices_served(&owner(), &matter.id, Some("2026-02-03"));

    assert!(matches!(result, Err(CaseError::Conflict(_))));
    let stored = harness.store.fetch_matter(&matter.id).unwrap().unwrap();
    assert!(stored.milestones.notices_served_on.is_none());
}

#[test]
fn future_service_dates_are_rejected_and_can_be_corrected() {
    let harness = harness();
    let matter = submitted_case(&harness, "phase-future-served");
    harness
        .service
        .generate_document(
            &owner(),
            &matter.id,
            DocumentKind::WillSearchPacket,
            &will_search_payload(),
        )
        .unwrap();
    harness
        .service
        .mark_will_search_mailed(&owner(), &matter.id, Some("2026-02-01"))
        .unwrap();

    match harness
        .service
        .mark_notices_served(&owner(), &matter.id, Some("2099-01-01"))
    {
        Err(CaseError::Validation(errors)) => assert!(errors.has_field("served_on")),
        other => panic!("expected validation error, got {other:?}"),
    }
    let stored = harness.store.fetch_matter(&matter.id).unwrap().unwrap();
    assert_eq!(stored.portal_status, Some(PortalStatus::WillSearchSent));
    assert!(stored.milestones.notices_served_on.is_none());

    let view = harness
        .service
        .mark_notices_served(&owner(), &matter.id, Some("2026-02-03"))
        .expect("corrected date accepted");
    assert_eq!(view.navigation.filing_opens_on, Some(date("2026-02-24")));
}

#[test]
fn future_mailing_filing_and_grant_dates_are_rejected() {
    let harness = harness();
    let matter = submitted_case(&harness, "phase-future-mailed");
    harness
        .service
        .generate_document(
            &owner(),
            &matter.id,
            DocumentKind::WillSearchPacket,
            &will_search_payload(),
        )
        .unwrap();
    let mailed = harness
        .service
        .mark_will_search_mailed(&owner(), &matter.id, Some("2026-03-03"));
    assert!(matches!(mailed, Err(CaseError::Validation(_))));
    assert!(harness.reminders.reminders().is_empty());

    let matter_id = package_ready_case(&harness, "phase-future-filed");
    let filed = harness
        .service
        .mark_probate_filed(&owner(), &matter_id, Some("2026-03-03T08:00:00Z"));
    match filed {
        Err(CaseError::Validation(errors)) => assert!(errors.has_field("filed_at")),
        other => panic!("expected validation error, got {other:?}"),
    }
    harness
        .service
        .mark_probate_filed(&owner(), &matter_id, None)
        .unwrap();
    let grant = harness
        .service
        .mark_grant_received(&owner(), &matter_id, Some("2026-12-01"));
    match grant {
        Err(CaseError::Validation(errors)) => assert!(errors.has_field("received_on")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn filing_is_refused_inside_the_notice_period() {
    let harness = harness();
    let matter = submitted_case(&harness, "phase-too-soon");
    harness
        .service
        .generate_document(
            &owner(),
            &matter.id,
            DocumentKind::WillSearchPacket,
            &will_search_payload(),
        )
        .unwrap();
    harness
        .service
        .mark_will_search_mailed(&owner(), &matter.id, Some("2026-02-01"))
        .unwrap();
    let served = harness
        .service
        .mark_notices_served(&owner(), &matter.id, Some("2026-02-25"))
        .unwrap();
    assert_eq!(served.navigation.filing_opens_on, Some(date("2026-03-18")));
    harness
        .service
        .generate_document(
            &owner(),
            &matter.id,
            DocumentKind::ProbatePack,
            &probate_pack_payload(),
        )
        .unwrap();

    let refused = harness.service.mark_probate_filed(&owner(), &matter.id, None);
    assert!(matches!(refused, Err(CaseError::Conflict(_))));

    harness.clock.advance(Duration::days(16));
    let view = harness
        .service
        .mark_probate_filed(&owner(), &matter.id, None)
        .expect("window open on the 21st day");
    assert_eq!(view.matter.portal_status, Some(PortalStatus::WaitingForGrant));
}

#[test]
fn grant_follows_filing() {
    let harness = harness();
    let matter_id = package_ready_case(&harness, "phase-grant");

    let early = harness
        .service
        .mark_grant_received(&owner(), &matter_id, Some("2026-03-02"));
    assert!(matches!(early, Err(CaseError::Conflict(_))));

    harness
        .service
        .mark_probate_filed(&owner(), &matter_id, Some("2026-03-02T09:30:00-08:00"))
        .unwrap();
    let view = harness
        .service
        .mark_grant_received(&owner(), &matter_id, Some("2026-03-02"))
        .expect("grant recorded");

    assert_eq!(view.matter.portal_status, Some(PortalStatus::GrantComplete));
    assert_eq!(view.matter.milestones.grant_received_on, Some(date("2026-03-02")));
    assert_eq!(view.matter.journey.get("grant"), Some(JourneyStepStatus::Done));
}

#[test]
fn phase_triggers_never_move_a_case_backwards() {
    let harness = harness();
    let matter_id = package_ready_case(&harness, "phase-backwards");
    harness
        .service
        .mark_probate_filed(&owner(), &matter_id, None)
        .unwrap();

    let notices = harness
        .service
        .mark_notices_served(&owner(), &matter_id, Some("2026-03-01"));
    assert!(matches!(notices, Err(CaseError::Conflict(_))));

    let mailed = harness
        .service
        .mark_will_search_mailed(&owner(), &matter_id, None);
    assert!(matches!(mailed, Err(CaseError::Conflict(_))));

    let stored = harness.store.fetch_matter(&matter_id).unwrap().unwrap();
    assert_eq!(stored.portal_status, Some(PortalStatus::WaitingForGrant));
    assert_eq!(stored.milestones.notices_served_on, Some(date("2026-02-03")));
}

#[test]
fn audit_failures_do_not_undo_transitions() {
    let harness = harness_with(|collaborators| {
        collaborators.audit = Arc::new(FailingAudit);
    });
    let matter_id = package_ready_case(&harness, "phase-audit-fail");

    let view = harness
        .service
        .mark_probate_filed(&owner(), &matter_id, None)
        .expect("audit is best effort");

    assert_eq!(view.matter.portal_status, Some(PortalStatus::WaitingForGrant));
}

#[test]
fn every_transition_is_audited() {
    let harness = harness();
    let matter_id = package_ready_case(&harness, "phase-audit");
    harness
        .service
        .mark_probate_filed(&owner(), &matter_id, None)
        .unwrap();

    let actions: Vec<AuditAction> = harness
        .audit
        .entries()
        .into_iter()
        .filter(|entry| entry.matter_id.as_ref() == Some(&matter_id))
        .map(|entry| entry.action)
        .collect();
    for expected in [
        AuditAction::IntakeSubmitted,
        AuditAction::WillSearchMailed,
        AuditAction::NoticesServed,
        AuditAction::ProbateFiled,
    ] {
        assert!(actions.contains(&expected), "missing {expected:?}");
    }
}

#[test]
fn strangers_cannot_trigger_phases() {
    let harness = harness();
    let matter_id = package_ready_case(&harness, "phase-stranger");

    let result = harness
        .service
        .mark_probate_filed(&stranger(), &matter_id, None);

    assert!(matches!(result, Err(CaseError::NotFound("matter"))));
}
