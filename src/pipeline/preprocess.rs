//! Stage A: resolve or create the provider identity behind an uploaded
//! license record, then hand a normalized message (raw SSN stripped) to the
//! ingestion stage.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{
    Address, Compact, CompactEligibility, EncumberedStatus, InvestigationStatus, Jurisdiction,
    License, LicenseStatus, LicenseType, Provider, ProviderId,
};
use crate::error::DomainError;
use crate::events::{BatchItemFailure, IngestQueue};
use crate::store::keys::ssn_digest;
use crate::store::{ClaimOutcome, ProviderStore, RecordBody, SsnIndex, SsnRecord, StoreError};

/// One raw uploaded license record, as received from the API or a bulk
/// upload. The only stage that ever sees the full SSN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLicenseUpload {
    pub compact: Compact,
    pub jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
    pub ssn: String,
    pub given_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub family_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    pub date_of_birth: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub address: Address,
    pub date_of_issuance: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_renewal: Option<NaiveDate>,
    pub date_of_expiration: NaiveDate,
    pub jurisdiction_uploaded_license_status: LicenseStatus,
    pub jurisdiction_uploaded_compact_eligibility: CompactEligibility,
}

/// The normalized `license.ingest` message published for Stage B: the raw
/// SSN replaced with its last four digits, the resolved provider attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLicense {
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
    pub ssn_last_four: String,
    pub given_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub family_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    pub date_of_birth: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub address: Address,
    pub date_of_issuance: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_renewal: Option<NaiveDate>,
    pub date_of_expiration: NaiveDate,
    pub jurisdiction_uploaded_license_status: LicenseStatus,
    pub jurisdiction_uploaded_compact_eligibility: CompactEligibility,
}

impl NormalizedLicense {
    fn from_upload(upload: RawLicenseUpload, provider_id: ProviderId) -> Self {
        let ssn_last_four = upload.ssn[upload.ssn.len() - 4..].to_string();
        Self {
            compact: upload.compact,
            provider_id,
            jurisdiction: upload.jurisdiction,
            license_type: upload.license_type,
            ssn_last_four,
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
            jurisdiction_uploaded_compact_eligibility: upload
                .jurisdiction_uploaded_compact_eligibility,
        }
    }

    /// Build the license record this message describes, carrying over the
    /// fields the state machine owns, and recompute the derived fields.
    pub fn into_license(
        self,
        encumbered_status: EncumberedStatus,
        investigation_status: Option<InvestigationStatus>,
        today: NaiveDate,
    ) -> License {
        let mut license = License {
            compact: self.compact,
            provider_id: self.provider_id,
            jurisdiction: self.jurisdiction,
            license_type: self.license_type,
            given_name: self.given_name,
            middle_name: self.middle_name,
            family_name: self.family_name,
            suffix: self.suffix,
            date_of_birth: self.date_of_birth,
            ssn_last_four: self.ssn_last_four,
            npi: self.npi,
            email_address: self.email_address,
            phone_number: self.phone_number,
            address: self.address,
            date_of_issuance: self.date_of_issuance,
            date_of_renewal: self.date_of_renewal,
            date_of_expiration: self.date_of_expiration,
            jurisdiction_uploaded_license_status: self.jurisdiction_uploaded_license_status,
            jurisdiction_uploaded_compact_eligibility: self
                .jurisdiction_uploaded_compact_eligibility,
            status: LicenseStatus::Inactive,
            compact_eligibility: CompactEligibility::Ineligible,
            encumbered_status,
            investigation_status,
        };
        license.refresh_derived(today);
        license
    }
}

/// One item of an upload batch, tagged with the queue message identifier the
/// consumer reports on failure.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadBatchItem {
    pub item_id: String,
    pub upload: RawLicenseUpload,
}

/// Stage A service. Queries the access-restricted SSN index and writes the
/// identity mapping with a conditional insert so racing uploads for the same
/// SSN converge on one provider id.
pub struct PreprocessService<S, X, Q> {
    store: Arc<S>,
    ssn_index: Arc<X>,
    queue: Arc<Q>,
}

impl<S, X, Q> PreprocessService<S, X, Q>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    Q: IngestQueue + 'static,
{
    pub fn new(store: Arc<S>, ssn_index: Arc<X>, queue: Arc<Q>) -> Self {
        Self {
            store,
            ssn_index,
            queue,
        }
    }

    /// Resolve the provider identity for one upload and enqueue the
    /// normalized ingest message.
    pub fn preprocess(&self, upload: RawLicenseUpload) -> Result<NormalizedLicense, DomainError> {
        validate_ssn(&upload.ssn)?;

        let digest = ssn_digest(&upload.compact, &upload.ssn);
        let provider_id = match self.ssn_index.provider_for_digest(&digest)? {
            Some(existing) => existing,
            None => self.register_provider(&upload, digest)?,
        };

        let normalized = NormalizedLicense::from_upload(upload, provider_id);
        let body = serde_json::to_value(&normalized)
            .map_err(|err| DomainError::validation(None, err.to_string()))?;
        self.queue.send(body)?;
        Ok(normalized)
    }

    /// Batch entry point with partial-batch-failure semantics: a malformed
    /// record fails its own message without blocking the rest, and a SSN
    /// appearing twice in one batch rejects the later record.
    pub fn preprocess_batch(&self, items: Vec<UploadBatchItem>) -> Vec<BatchItemFailure> {
        let mut failures = Vec::new();
        let mut seen_ssns = HashSet::new();

        for item in items {
            if !seen_ssns.insert(ssn_digest(&item.upload.compact, &item.upload.ssn)) {
                failures.push(BatchItemFailure {
                    item_id: item.item_id,
                    reason: "duplicate ssn in upload batch".to_string(),
                });
                continue;
            }

            if let Err(err) = self.preprocess(item.upload) {
                warn!(item_id = %item.item_id, %err, "license preprocessing failed");
                failures.push(BatchItemFailure {
                    item_id: item.item_id,
                    reason: err.to_string(),
                });
            }
        }

        failures
    }

    fn register_provider(
        &self,
        upload: &RawLicenseUpload,
        digest: String,
    ) -> Result<ProviderId, DomainError> {
        let candidate = ProviderId::generate();
        let outcome = self.ssn_index.claim(SsnRecord {
            digest,
            compact: upload.compact.clone(),
            provider_id: candidate,
            ssn: upload.ssn.clone(),
        })?;

        match outcome {
            ClaimOutcome::Existing(winner) => Ok(winner),
            ClaimOutcome::Claimed => {
                let ssn_last_four = upload.ssn[upload.ssn.len() - 4..].to_string();
                let provider = Provider::bare(
                    upload.compact.clone(),
                    candidate,
                    upload.given_name.clone(),
                    upload.family_name.clone(),
                    ssn_last_four,
                );
                match self.store.put_new(RecordBody::Provider(provider)) {
                    Ok(_) => {}
                    // A racing message already created the record.
                    Err(StoreError::Conflict) => {}
                    Err(err) => return Err(err.into()),
                }
                info!(compact = %upload.compact, provider_id = %candidate, "registered new provider");
                Ok(candidate)
            }
        }
    }
}

/// SSN must match `###-##-####`.
fn validate_ssn(ssn: &str) -> Result<(), DomainError> {
    let bytes = ssn.as_bytes();
    let well_formed = bytes.len() == 11
        && bytes[3] == b'-'
        && bytes[6] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| matches!(index, 3 | 6) || byte.is_ascii_digit());

    if well_formed {
        Ok(())
    } else {
        Err(DomainError::validation(
            Some("ssn".to_string()),
            "ssn must match ###-##-####",
        ))
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn ssn_format_is_enforced() {
        assert!(validate_ssn("123-12-1234").is_ok());
        for bad in ["123121234", "123-12-12345", "abc-de-fghi", "123-12_1234", ""] {
            assert!(validate_ssn(bad).is_err(), "expected {bad:?} to fail");
        }
    }
}
