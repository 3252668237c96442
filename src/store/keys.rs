//! Centrally-defined composite-key construction for the single wide table.
//!
//! A provider's full record set is co-located under one partition key and
//! retrievable with a single range query; the sort key encodes the record
//! type and its identifying relation. No call site builds keys ad hoc.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::domain::{
    AdverseActionId, Compact, InvestigationId, Jurisdiction, LicenseType, ProviderId, RecordKind,
};

/// Composite primary key of one stored record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub pk: String,
    pub sk: String,
}

impl RecordKey {
    pub fn provider(compact: &Compact, provider_id: ProviderId) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!("{compact}#PROVIDER"),
        }
    }

    pub fn license(
        compact: &Compact,
        provider_id: ProviderId,
        jurisdiction: &Jurisdiction,
        license_type: &LicenseType,
    ) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!("{compact}#PROVIDER#license/{jurisdiction}/{license_type}#"),
        }
    }

    pub fn license_update(
        compact: &Compact,
        provider_id: ProviderId,
        jurisdiction: &Jurisdiction,
        license_type: &LicenseType,
        date_of_update: NaiveDate,
        change_hash: &str,
    ) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!(
                "{compact}#PROVIDER#license/{jurisdiction}/{license_type}#UPDATE#{date_of_update}/{change_hash}"
            ),
        }
    }

    pub fn privilege(
        compact: &Compact,
        provider_id: ProviderId,
        jurisdiction: &Jurisdiction,
        license_type: &LicenseType,
    ) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!("{compact}#PROVIDER#privilege/{jurisdiction}/{license_type}#"),
        }
    }

    pub fn privilege_update(
        compact: &Compact,
        provider_id: ProviderId,
        jurisdiction: &Jurisdiction,
        license_type: &LicenseType,
        date_of_update: NaiveDate,
        change_hash: &str,
    ) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!(
                "{compact}#PROVIDER#privilege/{jurisdiction}/{license_type}#UPDATE#{date_of_update}/{change_hash}"
            ),
        }
    }

    pub fn provider_update(
        compact: &Compact,
        provider_id: ProviderId,
        date_of_update: NaiveDate,
        change_hash: &str,
    ) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!("{compact}#PROVIDER#UPDATE#{date_of_update}/{change_hash}"),
        }
    }

    pub fn adverse_action(
        compact: &Compact,
        provider_id: ProviderId,
        action_against: RecordKind,
        jurisdiction: &Jurisdiction,
        license_type: &LicenseType,
        id: AdverseActionId,
    ) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!(
                "{compact}#PROVIDER#{}/{jurisdiction}/{license_type}#ADVERSE_ACTION#{id}",
                action_against.label()
            ),
        }
    }

    pub fn investigation(
        compact: &Compact,
        provider_id: ProviderId,
        investigation_against: RecordKind,
        jurisdiction: &Jurisdiction,
        license_type: &LicenseType,
        id: InvestigationId,
    ) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!(
                "{compact}#PROVIDER#{}/{jurisdiction}/{license_type}#INVESTIGATION#{id}",
                investigation_against.label()
            ),
        }
    }

    pub fn military_affiliation(
        compact: &Compact,
        provider_id: ProviderId,
        date_of_upload: NaiveDate,
    ) -> Self {
        Self {
            pk: provider_pk(compact, provider_id),
            sk: format!("{compact}#PROVIDER#military-affiliation#{date_of_upload}"),
        }
    }
}

fn provider_pk(compact: &Compact, provider_id: ProviderId) -> String {
    format!("{compact}#PROVIDER#{provider_id}")
}

/// Compact-scoped digest of a raw SSN, used as the partition key of the
/// access-restricted SSN index. The raw SSN never appears in a key.
pub fn ssn_digest(compact: &Compact, ssn: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(compact.0.as_bytes());
    hasher.update(b"#SSN#");
    hasher.update(ssn.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Short content hash discriminating history records written on the same
/// calendar day for the same key.
pub fn change_hash(previous: &serde_json::Value, changes: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous.to_string().as_bytes());
    hasher.update(changes.to_string().as_bytes());
    let digest = hex_encode(&hasher.finalize());
    digest[..12].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
