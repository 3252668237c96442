use std::sync::Arc;

use chrono::NaiveDate;

use super::common::*;
use crate::domain::{
    HomeJurisdictionSelection, Jurisdiction, LicenseStatus, PrivilegeStatus, Provider, UpdateType,
};
use crate::error::DomainError;
use crate::fixtures;
use crate::pipeline::{IngestOutcome, IngestService};
use crate::store::keys::RecordKey;
use crate::store::{ProviderStore, RecordBody, StoredRecord};

fn stored_provider(pipeline: &Pipeline) -> (Provider, u64) {
    let key = RecordKey::provider(&fixtures::compact(), fixtures::provider_id());
    let record = pipeline
        .store
        .get(&key)
        .expect("query")
        .expect("provider present");
    match record.body {
        RecordBody::Provider(provider) => (provider, record.version),
        other => panic!("expected provider, got {other:?}"),
    }
}

fn records(pipeline: &Pipeline) -> Vec<StoredRecord> {
    pipeline
        .store
        .provider_records(&fixtures::compact(), fixtures::provider_id())
        .expect("query")
}

fn stored_privilege(pipeline: &Pipeline) -> crate::domain::Privilege {
    records(pipeline)
        .into_iter()
        .find_map(|record| match record.body {
            RecordBody::Privilege(privilege) => Some(privilege),
            _ => None,
        })
        .expect("privilege present")
}

#[test]
fn first_ingest_creates_the_license_and_selects_it_as_home() {
    let pipeline = build_pipeline();
    pipeline
        .store
        .put_new(RecordBody::Provider(fixtures::provider()))
        .expect("seed provider");

    let outcome = pipeline
        .ingest
        .ingest(normalized("oh", "slp"), today())
        .expect("ingest");

    assert_eq!(outcome, IngestOutcome::Created);
    let (provider, _) = stored_provider(&pipeline);
    assert_eq!(
        provider.license_jurisdiction,
        Some(Jurisdiction("oh".to_string()))
    );
    assert_eq!(provider.license_status, LicenseStatus::Active);
    assert!(pipeline.publisher.events().is_empty());
}

#[test]
fn reingesting_an_unchanged_message_is_a_true_noop() {
    let pipeline = build_pipeline();
    seed_provider_with_privilege(&pipeline);
    let before = records(&pipeline);
    let events_before = pipeline.publisher.events().len();

    let outcome = pipeline
        .ingest
        .ingest(normalized("oh", "slp"), today())
        .expect("re-ingest");

    assert_eq!(outcome, IngestOutcome::Unchanged);
    assert_eq!(records(&pipeline), before);
    assert_eq!(pipeline.publisher.events().len(), events_before);
}

#[test]
fn renewal_updates_history_and_syncs_privilege_dates() {
    let pipeline = build_pipeline();
    seed_provider_with_privilege(&pipeline);

    let mut message = normalized("oh", "slp");
    message.date_of_renewal = NaiveDate::from_ymd_opt(2025, 5, 20);
    message.date_of_expiration = NaiveDate::from_ymd_opt(2027, 6, 1).expect("valid date");

    let outcome = pipeline
        .ingest
        .ingest(message, today())
        .expect("ingest renewal");
    assert_eq!(outcome, IngestOutcome::Updated(UpdateType::Renewal));

    let history: Vec<_> = records(&pipeline)
        .into_iter()
        .filter_map(|record| match record.body {
            RecordBody::LicenseUpdate(update) => Some(update),
            _ => None,
        })
        .collect();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].update_type, UpdateType::Renewal);

    let privilege = stored_privilege(&pipeline);
    assert_eq!(
        privilege.date_of_expiration,
        NaiveDate::from_ymd_opt(2027, 6, 1).expect("valid date")
    );
    assert_eq!(privilege.status, PrivilegeStatus::Active);
    assert!(pipeline.publisher.events().is_empty());
}

#[test]
fn deactivation_cascades_to_privileges_with_one_event_per_transition() {
    let pipeline = build_pipeline();
    seed_provider_with_privilege(&pipeline);

    let mut message = normalized("oh", "slp");
    message.jurisdiction_uploaded_license_status = LicenseStatus::Inactive;

    let outcome = pipeline
        .ingest
        .ingest(message, today())
        .expect("ingest deactivation");
    assert_eq!(outcome, IngestOutcome::Updated(UpdateType::Deactivation));

    let privilege = stored_privilege(&pipeline);
    assert_eq!(privilege.status, PrivilegeStatus::Inactive);

    let events = pipeline.publisher.events();
    let detail_types: Vec<_> = events.iter().map(|event| event.detail_type()).collect();
    assert_eq!(
        detail_types,
        vec!["license.deactivation", "privilege.deactivation"]
    );

    let history_types: Vec<_> = records(&pipeline)
        .into_iter()
        .filter_map(|record| match record.body {
            RecordBody::LicenseUpdate(update) => Some(update.update_type),
            _ => None,
        })
        .collect();
    assert_eq!(history_types, vec![UpdateType::Deactivation]);
}

#[test]
fn registered_selection_is_never_overridden_by_other_jurisdictions() {
    let pipeline = build_pipeline();
    seed_provider_with_privilege(&pipeline);

    let (mut provider, version) = stored_provider(&pipeline);
    provider.current_home_jurisdiction = Some(HomeJurisdictionSelection::Member(Jurisdiction(
        "oh".to_string(),
    )));
    pipeline
        .store
        .put(RecordBody::Provider(provider), Some(version))
        .expect("register selection");

    let mut message = normalized("ky", "slp");
    message.date_of_issuance = NaiveDate::from_ymd_opt(2024, 8, 1).expect("valid date");
    pipeline
        .ingest
        .ingest(message, today())
        .expect("ingest ky license");

    let (provider, _) = stored_provider(&pipeline);
    assert_eq!(
        provider.license_jurisdiction,
        Some(Jurisdiction("oh".to_string())),
        "registered selection stays put"
    );
}

#[test]
fn later_issued_active_license_becomes_home_without_a_registered_selection() {
    let pipeline = build_pipeline();
    pipeline
        .store
        .put_new(RecordBody::Provider(fixtures::provider()))
        .expect("seed provider");
    pipeline
        .ingest
        .ingest(normalized("oh", "slp"), today())
        .expect("seed oh license");

    let mut message = normalized("ky", "slp");
    message.date_of_issuance = NaiveDate::from_ymd_opt(2024, 8, 1).expect("valid date");
    pipeline
        .ingest
        .ingest(message, today())
        .expect("ingest ky license");

    let (provider, _) = stored_provider(&pipeline);
    assert_eq!(
        provider.license_jurisdiction,
        Some(Jurisdiction("ky".to_string()))
    );
}

#[test]
fn publish_failure_fails_the_deactivation_flow() {
    let pipeline = build_pipeline();
    seed_provider_with_privilege(&pipeline);
    let failing = IngestService::new(pipeline.store.clone(), Arc::new(FailingPublisher));

    let mut message = normalized("oh", "slp");
    message.jurisdiction_uploaded_license_status = LicenseStatus::Inactive;

    match failing.ingest(message, today()) {
        Err(DomainError::Event(_)) => {}
        other => panic!("expected event error, got {other:?}"),
    }
}

#[test]
fn malformed_queue_message_reports_its_item_id() {
    let pipeline = build_pipeline();
    let failures = pipeline.ingest.ingest_batch(
        vec![(
            "msg-9".to_string(),
            serde_json::json!({ "compact": "aslp", "unexpected": true }),
        )],
        today(),
    );

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item_id, "msg-9");
}
