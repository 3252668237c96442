use super::common::*;
use crate::fixtures;
use crate::pipeline::UploadBatchItem;
use crate::store::keys::ssn_digest;
use crate::store::{ProviderStore, RecordBody, SsnIndex};

#[test]
fn new_ssn_creates_mapping_and_bare_provider() {
    let pipeline = build_pipeline();
    let upload = fixtures::upload("oh", "slp");
    let digest = ssn_digest(&upload.compact, &upload.ssn);

    let normalized = pipeline.preprocess.preprocess(upload).expect("preprocess");

    let mapped = pipeline
        .ssn_index
        .provider_for_digest(&digest)
        .expect("lookup");
    assert_eq!(mapped, Some(normalized.provider_id));

    let records = pipeline
        .store
        .provider_records(&fixtures::compact(), normalized.provider_id)
        .expect("query");
    assert_eq!(records.len(), 1);
    assert!(matches!(records[0].body, RecordBody::Provider(_)));

    assert_eq!(pipeline.queue.len(), 1);
}

#[test]
fn queued_message_carries_last_four_and_no_raw_ssn() {
    let pipeline = build_pipeline();
    pipeline
        .preprocess
        .preprocess(fixtures::upload("oh", "slp"))
        .expect("preprocess");

    let messages = pipeline.queue.drain();
    let body = serde_json::to_string(&messages[0]).expect("serialize");
    assert!(!body.contains("123-12-1234"));
    assert_eq!(messages[0]["ssnLastFour"], "1234");
    assert!(messages[0].get("ssn").is_none());
}

#[test]
fn existing_mapping_reuses_the_provider_id() {
    let pipeline = build_pipeline();
    let first = pipeline
        .preprocess
        .preprocess(fixtures::upload("oh", "slp"))
        .expect("first preprocess");
    let second = pipeline
        .preprocess
        .preprocess(fixtures::upload("ne", "slp"))
        .expect("second preprocess");

    assert_eq!(first.provider_id, second.provider_id);

    let records = pipeline
        .store
        .provider_records(&fixtures::compact(), first.provider_id)
        .expect("query");
    assert_eq!(records.len(), 1, "no duplicate provider record");
}

#[test]
fn malformed_ssn_fails_only_its_own_batch_item() {
    let pipeline = build_pipeline();
    let mut bad = fixtures::upload("oh", "slp");
    bad.ssn = "not-an-ssn".to_string();
    let mut good = fixtures::upload("oh", "slp");
    good.ssn = "987-65-4321".to_string();

    let failures = pipeline.preprocess.preprocess_batch(vec![
        UploadBatchItem {
            item_id: "msg-1".to_string(),
            upload: bad,
        },
        UploadBatchItem {
            item_id: "msg-2".to_string(),
            upload: good,
        },
    ]);

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item_id, "msg-1");
    assert_eq!(pipeline.queue.len(), 1);
}

#[test]
fn duplicate_ssn_within_a_batch_rejects_the_later_record() {
    let pipeline = build_pipeline();
    let failures = pipeline.preprocess.preprocess_batch(vec![
        UploadBatchItem {
            item_id: "msg-1".to_string(),
            upload: fixtures::upload("oh", "slp"),
        },
        UploadBatchItem {
            item_id: "msg-2".to_string(),
            upload: fixtures::upload("oh", "aud"),
        },
    ]);

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item_id, "msg-2");
    assert!(failures[0].reason.contains("duplicate ssn"));
}
