//! Data access layer: the only component permitted to read-modify-write
//! table records. Updates that depend on a prior read use versioned
//! conditional writes so concurrent invocations cannot lose updates.

pub mod keys;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::domain::{
    AdverseAction, Compact, Investigation, License, LicenseType, LicenseUpdate,
    MilitaryAffiliation, Privilege, PrivilegeUpdate, Provider, ProviderId, ProviderUpdate,
};
use keys::RecordKey;

/// Storage format version checked on every decode.
pub const SCHEMA_VERSION: u32 = 1;

/// Tagged body of one stored record. The tag doubles as the record-type
/// discriminator in the storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecordBody {
    Provider(Provider),
    License(License),
    LicenseUpdate(LicenseUpdate),
    Privilege(Privilege),
    PrivilegeUpdate(PrivilegeUpdate),
    ProviderUpdate(ProviderUpdate),
    AdverseAction(AdverseAction),
    Investigation(Investigation),
    MilitaryAffiliation(MilitaryAffiliation),
}

impl RecordBody {
    /// The composite key this record lives under, built from the central
    /// constructors in [`keys`].
    pub fn key(&self) -> RecordKey {
        match self {
            Self::Provider(provider) => RecordKey::provider(&provider.compact, provider.provider_id),
            Self::License(license) => RecordKey::license(
                &license.compact,
                license.provider_id,
                &license.jurisdiction,
                &license.license_type,
            ),
            Self::LicenseUpdate(update) => {
                let changes = serde_json::to_value(&update.changes).unwrap_or_default();
                RecordKey::license_update(
                    &update.compact,
                    update.provider_id,
                    &update.jurisdiction,
                    &update.license_type,
                    update.date_of_update,
                    &keys::change_hash(&update.previous, &changes),
                )
            }
            Self::Privilege(privilege) => RecordKey::privilege(
                &privilege.compact,
                privilege.provider_id,
                &privilege.jurisdiction,
                &privilege.license_type,
            ),
            Self::PrivilegeUpdate(update) => {
                let changes = serde_json::to_value(&update.changes).unwrap_or_default();
                RecordKey::privilege_update(
                    &update.compact,
                    update.provider_id,
                    &update.jurisdiction,
                    &update.license_type,
                    update.date_of_update,
                    &keys::change_hash(&update.previous, &changes),
                )
            }
            Self::ProviderUpdate(update) => {
                let changes = serde_json::to_value(&update.changes).unwrap_or_default();
                RecordKey::provider_update(
                    &update.compact,
                    update.provider_id,
                    update.date_of_update,
                    &keys::change_hash(&update.previous, &changes),
                )
            }
            Self::AdverseAction(action) => RecordKey::adverse_action(
                &action.compact,
                action.provider_id,
                action.action_against,
                &action.jurisdiction,
                &action.license_type,
                action.id,
            ),
            Self::Investigation(investigation) => RecordKey::investigation(
                &investigation.compact,
                investigation.provider_id,
                investigation.investigation_against,
                &investigation.jurisdiction,
                &investigation.license_type,
                investigation.id,
            ),
            Self::MilitaryAffiliation(affiliation) => RecordKey::military_affiliation(
                &affiliation.compact,
                affiliation.provider_id,
                affiliation.date_of_upload,
            ),
        }
    }
}

/// One record as read from the table, with the version the conditional-write
/// protocol checks against.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: RecordKey,
    pub version: u64,
    pub body: RecordBody,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    schema_version: u32,
    record: RecordBody,
}

/// Serialize a record body into the versioned storage format.
pub fn encode(body: &RecordBody) -> Result<String, StoreError> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        record: body.clone(),
    };
    serde_json::to_string(&envelope).map_err(|err| StoreError::Corrupt(err.to_string()))
}

/// Decode the versioned storage format, rejecting unknown schema versions.
pub fn decode(raw: &str) -> Result<RecordBody, StoreError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|err| StoreError::Corrupt(err.to_string()))?;
    if envelope.schema_version != SCHEMA_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported schema version {}",
            envelope.schema_version
        )));
    }
    Ok(envelope.record)
}

/// Error enumeration for table access failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("stored version does not match expectation")]
    VersionMismatch,
    #[error("record not found")]
    NotFound,
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Narrow capability contract over the single wide table.
pub trait ProviderStore: Send + Sync {
    fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StoreError>;

    /// Write a record only if its key does not exist yet.
    fn put_new(&self, body: RecordBody) -> Result<StoredRecord, StoreError>;

    /// Write a record. `expected_version` of `Some(v)` makes the write
    /// conditional on the stored version still being `v`; `None` writes
    /// unconditionally (create-or-replace).
    fn put(
        &self,
        body: RecordBody,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord, StoreError>;

    /// Range query returning a provider's co-located record set.
    fn provider_records(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Family-name-sorted provider listing for one compact.
    fn providers_by_family_name(&self, compact: &Compact) -> Result<Vec<Provider>, StoreError>;

    /// Providers ordered by most recent write within one compact.
    fn providers_by_last_updated(&self, compact: &Compact) -> Result<Vec<Provider>, StoreError>;

    /// Providers holding at least one license of the given type.
    fn providers_by_license_type(
        &self,
        compact: &Compact,
        license_type: &LicenseType,
    ) -> Result<Vec<Provider>, StoreError>;
}

/// Outcome of a conditional SSN-mapping insert: the first writer wins and
/// later writers learn the winning provider id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    Existing(ProviderId),
}

/// One row of the access-restricted SSN index. The partition key is the
/// compact-scoped digest; the raw SSN is stored only in this table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsnRecord {
    pub digest: String,
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub ssn: String,
}

/// The SSN index is a separate, access-restricted table queried by a role
/// with narrower permissions than the general provider table.
pub trait SsnIndex: Send + Sync {
    fn provider_for_digest(&self, digest: &str) -> Result<Option<ProviderId>, StoreError>;

    /// Conditional insert: returns `Existing` with the winning provider id
    /// when the digest is already mapped.
    fn claim(&self, record: SsnRecord) -> Result<ClaimOutcome, StoreError>;

    fn ssn_for_provider(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
    ) -> Result<Option<String>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn envelope_round_trips_a_license() {
        let license = fixtures::license("oh", "slp");
        let raw = encode(&RecordBody::License(license.clone())).expect("encode");
        let decoded = decode(&raw).expect("decode");
        assert_eq!(decoded, RecordBody::License(license));
    }

    #[test]
    fn decode_rejects_future_schema_versions() {
        let license = fixtures::license("oh", "slp");
        let raw = encode(&RecordBody::License(license)).expect("encode");
        let bumped = raw.replace("\"schemaVersion\":1", "\"schemaVersion\":2");

        match decode(&bumped) {
            Err(StoreError::Corrupt(message)) => {
                assert!(message.contains("unsupported schema version"))
            }
            other => panic!("expected corrupt error, got {other:?}"),
        }
    }

    #[test]
    fn record_bodies_build_their_own_keys() {
        let license = fixtures::license("oh", "slp");
        let key = RecordBody::License(license.clone()).key();
        assert_eq!(
            key,
            RecordKey::license(
                &license.compact,
                license.provider_id,
                &license.jurisdiction,
                &license.license_type,
            )
        );
    }
}
