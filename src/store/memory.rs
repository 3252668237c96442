//! In-memory table with real conditional-write semantics, backing tests and
//! the offline CLI demo. Rows hold the serialized storage format so every
//! read exercises the versioned decode path.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::domain::{Compact, LicenseType, Provider, ProviderId};

use super::keys::RecordKey;
use super::{
    decode, encode, ClaimOutcome, ProviderStore, RecordBody, SsnIndex, SsnRecord, StoreError,
    StoredRecord,
};

struct Row {
    version: u64,
    raw: String,
    written_seq: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<(String, String), Row>>,
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn providers(&self, compact: &Compact) -> Result<Vec<(u64, Provider)>, StoreError> {
        let rows = self.rows.lock().expect("store mutex poisoned");
        let mut providers = Vec::new();
        for ((_, sk), row) in rows.iter() {
            if sk != &format!("{compact}#PROVIDER") {
                continue;
            }
            if let RecordBody::Provider(provider) = decode(&row.raw)? {
                providers.push((row.written_seq, provider));
            }
        }
        Ok(providers)
    }
}

impl ProviderStore for MemoryStore {
    fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StoreError> {
        let rows = self.rows.lock().expect("store mutex poisoned");
        match rows.get(&(key.pk.clone(), key.sk.clone())) {
            Some(row) => Ok(Some(StoredRecord {
                key: key.clone(),
                version: row.version,
                body: decode(&row.raw)?,
            })),
            None => Ok(None),
        }
    }

    fn put_new(&self, body: RecordBody) -> Result<StoredRecord, StoreError> {
        let key = body.key();
        let raw = encode(&body)?;
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        let entry = (key.pk.clone(), key.sk.clone());
        if rows.contains_key(&entry) {
            return Err(StoreError::Conflict);
        }
        let written_seq = self.next_seq();
        rows.insert(
            entry,
            Row {
                version: 1,
                raw,
                written_seq,
            },
        );
        Ok(StoredRecord {
            key,
            version: 1,
            body,
        })
    }

    fn put(
        &self,
        body: RecordBody,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord, StoreError> {
        let key = body.key();
        let raw = encode(&body)?;
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        let entry = (key.pk.clone(), key.sk.clone());
        let written_seq = self.next_seq();

        let version = match (rows.get(&entry), expected_version) {
            (Some(row), Some(expected)) if row.version != expected => {
                return Err(StoreError::VersionMismatch)
            }
            (None, Some(_)) => return Err(StoreError::VersionMismatch),
            (Some(row), _) => row.version + 1,
            (None, None) => 1,
        };

        rows.insert(
            entry,
            Row {
                version,
                raw,
                written_seq,
            },
        );
        Ok(StoredRecord { key, version, body })
    }

    fn provider_records(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let pk = RecordKey::provider(compact, provider_id).pk;
        let rows = self.rows.lock().expect("store mutex poisoned");
        let mut records = Vec::new();
        for ((row_pk, sk), row) in rows.iter() {
            if row_pk != &pk {
                continue;
            }
            records.push(StoredRecord {
                key: RecordKey {
                    pk: row_pk.clone(),
                    sk: sk.clone(),
                },
                version: row.version,
                body: decode(&row.raw)?,
            });
        }
        Ok(records)
    }

    fn providers_by_family_name(&self, compact: &Compact) -> Result<Vec<Provider>, StoreError> {
        let mut providers = self.providers(compact)?;
        providers.sort_by(|(_, a), (_, b)| {
            (a.family_name.as_str(), a.given_name.as_str())
                .cmp(&(b.family_name.as_str(), b.given_name.as_str()))
        });
        Ok(providers.into_iter().map(|(_, provider)| provider).collect())
    }

    fn providers_by_last_updated(&self, compact: &Compact) -> Result<Vec<Provider>, StoreError> {
        let mut providers = self.providers(compact)?;
        providers.sort_by(|(a_seq, _), (b_seq, _)| b_seq.cmp(a_seq));
        Ok(providers.into_iter().map(|(_, provider)| provider).collect())
    }

    fn providers_by_license_type(
        &self,
        compact: &Compact,
        license_type: &LicenseType,
    ) -> Result<Vec<Provider>, StoreError> {
        let holder_ids: Vec<ProviderId> = {
            let rows = self.rows.lock().expect("store mutex poisoned");
            let mut ids = Vec::new();
            for ((_, sk), row) in rows.iter() {
                if !sk.starts_with(&format!("{compact}#PROVIDER#license/")) {
                    continue;
                }
                if let RecordBody::License(license) = decode(&row.raw)? {
                    if &license.license_type == license_type && !ids.contains(&license.provider_id)
                    {
                        ids.push(license.provider_id);
                    }
                }
            }
            ids
        };

        let mut providers = Vec::new();
        for provider_id in holder_ids {
            let key = RecordKey::provider(compact, provider_id);
            if let Some(record) = self.get(&key)? {
                if let RecordBody::Provider(provider) = record.body {
                    providers.push(provider);
                }
            }
        }
        Ok(providers)
    }
}

#[derive(Default)]
pub struct MemorySsnIndex {
    by_digest: Mutex<HashMap<String, SsnRecord>>,
}

impl MemorySsnIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SsnIndex for MemorySsnIndex {
    fn provider_for_digest(&self, digest: &str) -> Result<Option<ProviderId>, StoreError> {
        let guard = self.by_digest.lock().expect("ssn index mutex poisoned");
        Ok(guard.get(digest).map(|record| record.provider_id))
    }

    fn claim(&self, record: SsnRecord) -> Result<ClaimOutcome, StoreError> {
        let mut guard = self.by_digest.lock().expect("ssn index mutex poisoned");
        if let Some(existing) = guard.get(&record.digest) {
            return Ok(ClaimOutcome::Existing(existing.provider_id));
        }
        guard.insert(record.digest.clone(), record);
        Ok(ClaimOutcome::Claimed)
    }

    fn ssn_for_provider(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
    ) -> Result<Option<String>, StoreError> {
        let guard = self.by_digest.lock().expect("ssn index mutex poisoned");
        Ok(guard
            .values()
            .find(|record| &record.compact == compact && record.provider_id == provider_id)
            .map(|record| record.ssn.clone()))
    }
}
