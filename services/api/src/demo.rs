use crate::infra::{dev_collaborators, parse_date, FixedClock};
use chrono::{Duration, Local, NaiveDate, NaiveTime};
use clap::Args;
use probate_desk::config::AppConfig;
use probate_desk::error::AppError;
use probate_desk::workflows::probate::{
    evaluate, Answer, CaseAccess, CaseView, CaseWorkflowService, ClientKey, DocumentKind,
    EligibilityAnswers, MemoryCaseStore, UserId,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScreenArgs {
    /// Is the estate located in British Columbia? (yes/no/unsure)
    #[arg(long, default_value = "unsure")]
    pub(crate) estate_in_bc: String,
    /// Is the applicant the named executor? (yes/no/unsure)
    #[arg(long, default_value = "unsure")]
    pub(crate) is_executor: String,
    /// Is the will straightforward? (yes/no/unsure)
    #[arg(long, default_value = "unsure")]
    pub(crate) will_straightforward: String,
    /// Are the assets the usual kinds (bank accounts, vehicles, a home)?
    #[arg(long, default_value = "unsure")]
    pub(crate) assets_common: String,
    /// Describe any unusual assets
    #[arg(long)]
    pub(crate) assets_details: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Run the walkthrough as of this date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Stop after the will search packet is mailed.
    #[arg(long)]
    pub(crate) stop_after_will_search: bool,
}

pub(crate) fn run_screen(args: ScreenArgs) -> Result<(), AppError> {
    let answers = EligibilityAnswers {
        estate_in_bc: Answer::parse(&args.estate_in_bc),
        is_executor: Answer::parse(&args.is_executor),
        will_straightforward: Answer::parse(&args.will_straightforward),
        assets_common: Answer::parse(&args.assets_common),
        assets_details: args.assets_details,
    };
    let outcome = evaluate(&answers);

    if outcome.is_eligible() {
        println!("Eligible for the guided BC probate service");
    } else {
        println!("Not a fit for the guided service:");
        for reason in &outcome.reasons {
            println!("  - {}", reason.message());
        }
        if let Some(referral) = &outcome.referral {
            println!("{referral}");
        }
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let clock = Arc::new(FixedClock::new(
        today.and_time(NaiveTime::MIN).and_utc() + Duration::hours(17),
    ));
    let service = CaseWorkflowService::new(
        Arc::new(MemoryCaseStore::new()),
        dev_collaborators(&config, clock),
        config.portal.clone(),
    );

    let executor = UserId("demo-executor".to_string());
    let client_key = ClientKey("demo-browser".to_string());

    println!("BC probate walkthrough as of {today}");
    let screening = service.screen(
        None,
        Some(client_key.clone()),
        &EligibilityAnswers {
            estate_in_bc: Answer::Yes,
            is_executor: Answer::Yes,
            will_straightforward: Answer::Yes,
            assets_common: Answer::Yes,
            assets_details: None,
        },
    )?;
    println!(
        "- Screening: {:?} -> case {}",
        screening.outcome.status,
        screening
            .case_code
            .as_ref()
            .map(|code| code.0.as_str())
            .unwrap_or("-")
    );

    let matter = service.open_intake(&executor, client_key)?;
    service.save_draft(
        &CaseAccess::Owner(executor.clone()),
        &matter.id,
        json!({
            "deceased": { "name": "Harold Bishop", "date_of_death": "2024-11-02" },
            "executor": { "name": "Madge Bishop", "email": "madge@example.ca" },
        }),
    )?;
    let view = service.submit_intake(&executor, &matter.id, true)?;
    print_view("Intake submitted", &view);

    let packet = service.generate_document(
        &executor,
        &matter.id,
        DocumentKind::WillSearchPacket,
        &json!({
            "deceased_name": "Harold Bishop",
            "date_of_death": "2024-11-02",
            "last_address": "400 Fort St, Victoria BC V8W 1H3",
            "applicant_name": "Madge Bishop",
            "applicant_email": "madge@example.ca",
        }),
    )?;
    println!(
        "- Will search packet generated: {} (generation {})",
        packet.artifact.artifact_url, packet.artifact.generation
    );

    let mailed_on = (today - Duration::days(45)).to_string();
    let view = service.mark_will_search_mailed(&executor, &matter.id, Some(&mailed_on))?;
    print_view("Will search mailed", &view);
    if args.stop_after_will_search {
        return Ok(());
    }

    let served_on = (today - Duration::days(30)).to_string();
    let view = service.mark_notices_served(&executor, &matter.id, Some(&served_on))?;
    print_view("Notices served", &view);
    if let Some(opens) = view.navigation.filing_opens_on {
        println!("  Filing window opens {opens}");
    }

    service.generate_document(
        &executor,
        &matter.id,
        DocumentKind::ProbatePack,
        &json!({
            "deceased_name": "Harold Bishop",
            "date_of_death": "2024-11-02",
            "executor_names": ["Madge Bishop"],
            "will_date": "2015-04-18",
        }),
    )?;
    let schedule = service.generate_document(
        &executor,
        &matter.id,
        DocumentKind::SupplementalSchedule,
        &json!({
            "title": "Schedule of assets",
            "entries": [
                { "description": "Chequing account", "value_cents": 1_840_000 },
                { "description": "2016 Honda Civic", "value_cents": 650_000 },
            ],
        }),
    )?;
    println!(
        "- Probate pack and schedule generated (estate total {} cents)",
        schedule.artifact.payload["total_cents"]
    );

    let view = service.mark_probate_filed(&executor, &matter.id, None)?;
    print_view("Probate filed", &view);

    println!("Documents on file:");
    for artifact in &view.documents {
        println!(
            "  - {}: {:?} ({})",
            artifact.kind, artifact.status, artifact.artifact_url
        );
    }

    Ok(())
}

fn print_view(label: &str, view: &CaseView) {
    let status = view
        .matter
        .portal_status
        .map(|status| status.to_string())
        .unwrap_or_else(|| "not started".to_string());
    println!(
        "- {label}: status {status} | current step {:?}",
        view.navigation.current_step
    );
}
