use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{Jurisdiction, LicenseType};
use crate::events::{DomainEvent, EventError, EventPublisher, MemoryQueue, RecordingPublisher};
use crate::fixtures;
use crate::pipeline::{IngestService, NormalizedLicense, PreprocessService};
use crate::store::memory::{MemoryStore, MemorySsnIndex};
use crate::store::{ProviderStore, RecordBody};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
}

pub(super) struct Pipeline {
    pub(super) preprocess: PreprocessService<MemoryStore, MemorySsnIndex, MemoryQueue>,
    pub(super) ingest: IngestService<MemoryStore, RecordingPublisher>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) ssn_index: Arc<MemorySsnIndex>,
    pub(super) queue: Arc<MemoryQueue>,
    pub(super) publisher: Arc<RecordingPublisher>,
}

pub(super) fn build_pipeline() -> Pipeline {
    let store = Arc::new(MemoryStore::new());
    let ssn_index = Arc::new(MemorySsnIndex::new());
    let queue = Arc::new(MemoryQueue::new());
    let publisher = Arc::new(RecordingPublisher::new());

    Pipeline {
        preprocess: PreprocessService::new(store.clone(), ssn_index.clone(), queue.clone()),
        ingest: IngestService::new(store.clone(), publisher.clone()),
        store,
        ssn_index,
        queue,
        publisher,
    }
}

/// Normalized Stage B message for the fixture provider, bypassing Stage A.
pub(super) fn normalized(jurisdiction: &str, license_type: &str) -> NormalizedLicense {
    let upload = fixtures::upload(jurisdiction, license_type);
    NormalizedLicense {
        compact: upload.compact,
        provider_id: fixtures::provider_id(),
        jurisdiction: Jurisdiction(jurisdiction.to_string()),
        license_type: LicenseType(license_type.to_string()),
        ssn_last_four: "1234".to_string(),
        given_name: upload.given_name,
        middle_name: upload.middle_name,
        family_name: upload.family_name,
        suffix: upload.suffix,
        date_of_birth: upload.date_of_birth,
        npi: upload.npi,
        email_address: upload.email_address,
        phone_number: upload.phone_number,
        address: upload.address,
        date_of_issuance: upload.date_of_issuance,
        date_of_renewal: upload.date_of_renewal,
        date_of_expiration: upload.date_of_expiration,
        jurisdiction_uploaded_license_status: upload.jurisdiction_uploaded_license_status,
        jurisdiction_uploaded_compact_eligibility: upload.jurisdiction_uploaded_compact_eligibility,
    }
}

/// Seed the fixture provider with an ingested home license in `oh` and an
/// active privilege purchased in `ne`.
pub(super) fn seed_provider_with_privilege(pipeline: &Pipeline) {
    pipeline
        .store
        .put_new(RecordBody::Provider(fixtures::provider()))
        .expect("seed provider");
    pipeline
        .ingest
        .ingest(normalized("oh", "slp"), today())
        .expect("seed license");
    pipeline
        .store
        .put_new(RecordBody::Privilege(fixtures::privilege("ne", "oh", "slp")))
        .expect("seed privilege");
}

pub(super) struct FailingPublisher;

impl EventPublisher for FailingPublisher {
    fn publish(&self, _event: &DomainEvent) -> Result<(), EventError> {
        Err(EventError::Publish("bus offline".to_string()))
    }
}
