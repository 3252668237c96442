//! Shared harness for the integration suites: in-memory wiring of the full
//! pipeline plus record builders.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;

use compact_connect::accounts::AccountService;
use compact_connect::clients::{MemoryIdentityProvider, MemoryNotifier};
use compact_connect::domain::{
    Address, AdministratorSetStatus, Compact, CompactEligibility, EncumberedStatus, Jurisdiction,
    License, LicenseStatus, LicenseType, Privilege, PrivilegeStatus, Provider, ProviderId,
};
use compact_connect::encumbrance::EncumbranceService;
use compact_connect::events::{BatchItemFailure, IngestQueue, MemoryQueue, RecordingPublisher};
use compact_connect::home::HomeJurisdictionService;
use compact_connect::pipeline::{
    IngestService, PreprocessService, RawLicenseUpload, UploadBatchItem,
};
use compact_connect::ratelimit::SsnAccessMonitor;
use compact_connect::store::keys::ssn_digest;
use compact_connect::store::memory::{MemoryStore, MemorySsnIndex};
use compact_connect::store::{ProviderStore, RecordBody, SsnIndex};

pub struct Harness {
    pub preprocess: PreprocessService<MemoryStore, MemorySsnIndex, MemoryQueue>,
    pub ingest: IngestService<MemoryStore, RecordingPublisher>,
    pub home: HomeJurisdictionService<MemoryStore, RecordingPublisher>,
    pub encumbrance: EncumbranceService<MemoryStore, RecordingPublisher>,
    pub accounts: AccountService<MemoryStore, MemorySsnIndex, MemoryNotifier, MemoryIdentityProvider>,
    pub store: Arc<MemoryStore>,
    pub ssn_index: Arc<MemorySsnIndex>,
    pub queue: Arc<MemoryQueue>,
    pub publisher: Arc<RecordingPublisher>,
    pub notifier: Arc<MemoryNotifier>,
    pub identity: Arc<MemoryIdentityProvider>,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let ssn_index = Arc::new(MemorySsnIndex::new());
    let queue = Arc::new(MemoryQueue::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let identity = Arc::new(MemoryIdentityProvider::new());
    let monitor = Arc::new(SsnAccessMonitor::new(chrono::Duration::hours(24), 5, 3));

    Harness {
        preprocess: PreprocessService::new(store.clone(), ssn_index.clone(), queue.clone()),
        ingest: IngestService::new(store.clone(), publisher.clone()),
        home: HomeJurisdictionService::new(store.clone(), publisher.clone()),
        encumbrance: EncumbranceService::new(store.clone(), publisher.clone()),
        accounts: AccountService::new(
            store.clone(),
            ssn_index.clone(),
            notifier.clone(),
            identity.clone(),
            monitor,
        ),
        store,
        ssn_index,
        queue,
        publisher,
        notifier,
        identity,
    }
}

impl Harness {
    /// Run both pipeline stages over the uploads, returning any per-item
    /// failures.
    pub fn run_pipeline(
        &self,
        uploads: Vec<RawLicenseUpload>,
        today: NaiveDate,
    ) -> Vec<BatchItemFailure> {
        let total = uploads.len();
        let items = uploads
            .into_iter()
            .enumerate()
            .map(|(index, upload)| UploadBatchItem {
                item_id: format!("upload-{index}"),
                upload,
            })
            .collect();
        let mut failures = self.preprocess.preprocess_batch(items);

        let queued = self.queue.receive(total).expect("queue receive");
        let messages = queued
            .into_iter()
            .enumerate()
            .map(|(index, body)| (format!("ingest-{index}"), body))
            .collect();
        failures.extend(self.ingest.ingest_batch(messages, today));
        failures
    }

    pub fn provider_id_for_ssn(&self, ssn: &str) -> Option<ProviderId> {
        self.ssn_index
            .provider_for_digest(&ssn_digest(&compact(), ssn))
            .expect("ssn lookup")
    }

    pub fn records(&self, provider_id: ProviderId) -> Vec<RecordBody> {
        self.store
            .provider_records(&compact(), provider_id)
            .expect("query")
            .into_iter()
            .map(|record| record.body)
            .collect()
    }

    pub fn provider(&self, provider_id: ProviderId) -> Provider {
        self.records(provider_id)
            .into_iter()
            .find_map(|body| match body {
                RecordBody::Provider(provider) => Some(provider),
                _ => None,
            })
            .expect("provider record")
    }

    pub fn licenses(&self, provider_id: ProviderId) -> Vec<License> {
        self.records(provider_id)
            .into_iter()
            .filter_map(|body| match body {
                RecordBody::License(license) => Some(license),
                _ => None,
            })
            .collect()
    }

    pub fn privileges(&self, provider_id: ProviderId) -> Vec<Privilege> {
        self.records(provider_id)
            .into_iter()
            .filter_map(|body| match body {
                RecordBody::Privilege(privilege) => Some(privilege),
                _ => None,
            })
            .collect()
    }

    /// Insert a purchased privilege directly; the purchase flow itself is
    /// outside the reconciliation core.
    pub fn grant_privilege(&self, provider_id: ProviderId, jurisdiction: &str, home: &str) {
        let mut privilege = privilege(jurisdiction, home, "slp");
        privilege.provider_id = provider_id;
        self.store
            .put_new(RecordBody::Privilege(privilege))
            .expect("grant privilege");
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.publisher
            .events()
            .iter()
            .map(|event| event.detail_type())
            .collect()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
}

pub fn compact() -> Compact {
    Compact("aslp".to_string())
}

pub fn address() -> Address {
    Address {
        street1: "79 N Franklin Turnpike".to_string(),
        street2: None,
        city: "Columbus".to_string(),
        state: "oh".to_string(),
        postal_code: "43004".to_string(),
    }
}

pub fn upload(jurisdiction: &str, license_type: &str, ssn: &str) -> RawLicenseUpload {
    RawLicenseUpload {
        compact: compact(),
        jurisdiction: Jurisdiction(jurisdiction.to_string()),
        license_type: LicenseType(license_type.to_string()),
        ssn: ssn.to_string(),
        given_name: "Tatiana".to_string(),
        middle_name: None,
        family_name: "Vasquez".to_string(),
        suffix: None,
        date_of_birth: NaiveDate::from_ymd_opt(1985, 11, 20).expect("valid date"),
        npi: Some("1234567890".to_string()),
        email_address: None,
        phone_number: None,
        address: address(),
        date_of_issuance: NaiveDate::from_ymd_opt(2020, 3, 15).expect("valid date"),
        date_of_renewal: None,
        date_of_expiration: NaiveDate::from_ymd_opt(2026, 6, 1).expect("valid date"),
        jurisdiction_uploaded_license_status: LicenseStatus::Active,
        jurisdiction_uploaded_compact_eligibility: CompactEligibility::Eligible,
    }
}

pub fn privilege(jurisdiction: &str, license_jurisdiction: &str, license_type: &str) -> Privilege {
    Privilege {
        compact: compact(),
        provider_id: ProviderId::generate(),
        jurisdiction: Jurisdiction(jurisdiction.to_string()),
        license_jurisdiction: Jurisdiction(license_jurisdiction.to_string()),
        license_type: LicenseType(license_type.to_string()),
        date_of_issuance: NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date"),
        date_of_renewal: None,
        date_of_expiration: NaiveDate::from_ymd_opt(2026, 6, 1).expect("valid date"),
        status: PrivilegeStatus::Active,
        administrator_set_status: AdministratorSetStatus::Active,
        encumbered_status: EncumberedStatus::Unencumbered,
        home_jurisdiction_change_status: None,
        investigation_status: None,
        compact_transaction_id: "T-000181".to_string(),
    }
}
