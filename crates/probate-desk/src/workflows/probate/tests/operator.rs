use chrono::Duration;

use super::common::*;
use crate::workflows::probate::collaborators::AuditAction;
use crate::workflows::probate::domain::{ClientKey, MatterId};
use crate::workflows::probate::eligibility::{Answer, EligibilityAnswers};
use crate::workflows::probate::error::CaseError;
use crate::workflows::probate::operator::{OperatorCapability, OperatorGate};
use crate::workflows::probate::status::PortalStatus;
use crate::workflows::probate::store::{CaseStore, NewMatter};

fn capability() -> OperatorCapability {
    OperatorGate::new(Some(OPERATOR_KEY.to_string()))
        .authorize(Some(OPERATOR_KEY))
        .expect("configured key")
}

#[test]
fn overrides_can_move_a_case_backwards_and_are_audited() {
    let harness = harness();
    let matter_id = package_ready_case(&harness, "operator-back");

    let matter = harness
        .console
        .override_status(&capability(), &matter_id, Some(" WILL_SEARCH_SENT "))
        .expect("operator may rewind");

    assert_eq!(matter.portal_status, Some(PortalStatus::WillSearchSent));
    let entry = harness
        .audit
        .entries()
        .into_iter()
        .find(|entry| entry.action == AuditAction::StatusOverride)
        .expect("override audited");
    assert_eq!(entry.actor, "operator");
    assert_eq!(entry.meta["from"], "probate_package_ready");
    assert_eq!(entry.meta["to"], "will_search_sent");
}

#[test]
fn clearing_the_status_resets_to_pre_intake() {
    let harness = harness();
    let matter = submitted_case(&harness, "operator-clear");

    let cleared = harness
        .console
        .override_status(&capability(), &matter.id, Some("  "))
        .unwrap();

    assert!(cleared.portal_status.is_none());
}

#[test]
fn unknown_statuses_are_rejected() {
    let harness = harness();
    let matter = submitted_case(&harness, "operator-unknown");

    match harness
        .console
        .override_status(&capability(), &matter.id, Some("archived"))
    {
        Err(CaseError::Validation(errors)) => assert!(errors.has_field("status")),
        other => panic!("expected validation error, got {other:?}"),
    }
    let stored = harness.store.fetch_matter(&matter.id).unwrap().unwrap();
    assert_eq!(stored.portal_status, Some(PortalStatus::IntakeComplete));
}

#[test]
fn not_fit_cases_can_only_be_cleared() {
    let harness = harness();
    let key = ClientKey("operator-not-fit".to_string());
    harness
        .store
        .create_matter(NewMatter {
            client_key: key.clone(),
            user_id: None,
            at: start_of_test(),
        })
        .unwrap();
    let answers = EligibilityAnswers {
        is_executor: Answer::No,
        ..EligibilityAnswers::default()
    };
    let matter_id = harness
        .service
        .screen(None, Some(key), &answers)
        .unwrap()
        .matter_id
        .unwrap();

    let refused = harness
        .console
        .override_status(&capability(), &matter_id, Some("intake_complete"));
    assert!(matches!(refused, Err(CaseError::Conflict(_))));

    let cleared = harness
        .console
        .override_status(&capability(), &matter_id, None)
        .expect("clearing is always allowed");
    assert!(cleared.portal_status.is_none());
}

#[test]
fn overriding_an_unknown_case_is_not_found() {
    let harness = harness();
    let result = harness.console.override_status(
        &capability(),
        &MatterId("missing".to_string()),
        Some("done"),
    );
    assert!(matches!(result, Err(CaseError::NotFound("matter"))));
}

#[test]
fn slots_need_a_positive_length() {
    let harness = harness();
    let starts = start_of_test() + Duration::days(1);

    let result = harness.console.publish_slot(&capability(), starts, starts);
    match result {
        Err(CaseError::Validation(errors)) => assert!(errors.has_field("ends_at")),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(harness.console.list_slots(&capability()).unwrap().is_empty());
}

#[test]
fn booked_slots_cannot_be_deleted() {
    let harness = harness();
    let matter = submitted_case(&harness, "operator-slot");
    let starts = start_of_test() + Duration::days(2);
    let slot = harness
        .console
        .publish_slot(&capability(), starts, starts + Duration::minutes(30))
        .unwrap();
    harness
        .service
        .book_callback(&owner(), &matter.id, &slot.id, "604-555-0199")
        .unwrap();

    let result = harness.console.delete_slot(&capability(), &slot.id);
    assert!(matches!(result, Err(CaseError::Conflict(_))));

    let unbooked = harness
        .console
        .publish_slot(
            &capability(),
            starts + Duration::hours(1),
            starts + Duration::minutes(90),
        )
        .unwrap();
    harness
        .console
        .delete_slot(&capability(), &unbooked.id)
        .expect("free slots delete");
    assert_eq!(harness.console.list_slots(&capability()).unwrap().len(), 1);
    assert!(harness
        .audit
        .entries()
        .iter()
        .any(|entry| entry.action == AuditAction::SlotDeleted));
}
