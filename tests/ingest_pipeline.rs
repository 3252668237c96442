mod common;

use chrono::NaiveDate;
use common::*;

use compact_connect::domain::{
    EncumberedStatus, LicenseStatus, PrivilegeStatus, UpdateType,
};
use compact_connect::store::RecordBody;

#[test]
fn new_provider_arrives_through_both_stages() {
    let harness = harness();

    let failures = harness.run_pipeline(vec![upload("oh", "slp", "123-12-1234")], today());
    assert!(failures.is_empty());

    let provider_id = harness
        .provider_id_for_ssn("123-12-1234")
        .expect("ssn mapping exists");

    let records = harness.records(provider_id);
    let providers = records
        .iter()
        .filter(|body| matches!(body, RecordBody::Provider(_)))
        .count();
    let licenses = records
        .iter()
        .filter(|body| matches!(body, RecordBody::License(_)))
        .count();
    assert_eq!(providers, 1, "exactly one provider record");
    assert_eq!(licenses, 1, "exactly one license record");

    let provider = harness.provider(provider_id);
    assert_eq!(provider.family_name, "Vasquez");
    assert_eq!(provider.license_status, LicenseStatus::Active);
    assert_eq!(provider.license_jurisdiction.as_ref().map(|j| j.0.as_str()), Some("oh"));
}

#[test]
fn reingesting_the_same_upload_is_idempotent() {
    let harness = harness();
    harness.run_pipeline(vec![upload("oh", "slp", "123-12-1234")], today());
    let provider_id = harness.provider_id_for_ssn("123-12-1234").expect("mapping");

    let records_before = harness.records(provider_id);
    let events_before = harness.event_types().len();

    let failures = harness.run_pipeline(vec![upload("oh", "slp", "123-12-1234")], today());
    assert!(failures.is_empty());

    assert_eq!(harness.records(provider_id), records_before);
    assert_eq!(harness.event_types().len(), events_before);

    let history = harness
        .records(provider_id)
        .into_iter()
        .filter(|body| matches!(body, RecordBody::LicenseUpdate(_)))
        .count();
    assert_eq!(history, 0, "no history for a no-op re-ingest");
}

#[test]
fn renewal_produces_exactly_one_renewal_history_record() {
    let harness = harness();
    harness.run_pipeline(vec![upload("oh", "slp", "123-12-1234")], today());
    let provider_id = harness.provider_id_for_ssn("123-12-1234").expect("mapping");

    let mut renewal = upload("oh", "slp", "123-12-1234");
    renewal.date_of_renewal = NaiveDate::from_ymd_opt(2025, 5, 20);
    renewal.date_of_expiration = NaiveDate::from_ymd_opt(2027, 6, 1).expect("valid date");
    let failures = harness.run_pipeline(vec![renewal], today());
    assert!(failures.is_empty());

    let history: Vec<UpdateType> = harness
        .records(provider_id)
        .into_iter()
        .filter_map(|body| match body {
            RecordBody::LicenseUpdate(update) => Some(update.update_type),
            _ => None,
        })
        .collect();
    assert_eq!(history, vec![UpdateType::Renewal]);

    let license = &harness.licenses(provider_id)[0];
    assert_eq!(
        license.date_of_expiration,
        NaiveDate::from_ymd_opt(2027, 6, 1).expect("valid date")
    );
}

#[test]
fn expired_licenses_are_inactive_no_matter_what_the_board_uploaded() {
    let harness = harness();
    let mut expired = upload("oh", "slp", "123-12-1234");
    expired.jurisdiction_uploaded_license_status = LicenseStatus::Active;
    expired.date_of_expiration = NaiveDate::from_ymd_opt(2025, 5, 31).expect("valid date");

    harness.run_pipeline(vec![expired], today());
    let provider_id = harness.provider_id_for_ssn("123-12-1234").expect("mapping");

    let license = &harness.licenses(provider_id)[0];
    assert_eq!(license.status, LicenseStatus::Inactive);

    let provider = harness.provider(provider_id);
    // An inactive license is never adopted as the home license.
    assert!(provider.license_jurisdiction.is_none());
}

#[test]
fn deactivation_cascades_to_the_privilege_with_one_event_each() {
    let harness = harness();
    harness.run_pipeline(vec![upload("oh", "slp", "123-12-1234")], today());
    let provider_id = harness.provider_id_for_ssn("123-12-1234").expect("mapping");
    harness.grant_privilege(provider_id, "ne", "oh");

    let mut deactivation = upload("oh", "slp", "123-12-1234");
    deactivation.jurisdiction_uploaded_license_status = LicenseStatus::Inactive;
    let failures = harness.run_pipeline(vec![deactivation], today());
    assert!(failures.is_empty());

    let license = &harness.licenses(provider_id)[0];
    assert_eq!(license.status, LicenseStatus::Inactive);

    let privilege = &harness.privileges(provider_id)[0];
    assert_eq!(privilege.status, PrivilegeStatus::Inactive);
    assert_eq!(privilege.encumbered_status, EncumberedStatus::Unencumbered);

    assert_eq!(
        harness.event_types(),
        vec!["license.deactivation", "privilege.deactivation"]
    );

    let history: Vec<UpdateType> = harness
        .records(provider_id)
        .into_iter()
        .filter_map(|body| match body {
            RecordBody::LicenseUpdate(update) => Some(update.update_type),
            _ => None,
        })
        .collect();
    assert_eq!(history, vec![UpdateType::Deactivation]);
}

#[test]
fn one_bad_record_does_not_block_the_rest_of_the_batch() {
    let harness = harness();
    let mut bad = upload("oh", "slp", "123-12-1234");
    bad.ssn = "123456789".to_string();

    let failures = harness.run_pipeline(
        vec![bad, upload("ne", "slp", "987-65-4321")],
        today(),
    );

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item_id, "upload-0");
    assert!(harness.provider_id_for_ssn("987-65-4321").is_some());
}
