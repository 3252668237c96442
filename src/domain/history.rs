use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::UpdateType;
use super::{Compact, Jurisdiction, LicenseType, ProviderId};

/// Field-level delta carried by every history record: new values for fields
/// that changed, and the names of fields present before and absent now.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChanges {
    pub updated_values: BTreeMap<String, Value>,
    pub removed_values: Vec<String>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        self.updated_values.is_empty() && self.removed_values.is_empty()
    }
}

/// Immutable history entry appended whenever a stored license mutates.
/// `previous` is the full prior snapshot, so any past state can be
/// reconstructed without replaying the whole chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseUpdate {
    pub update_type: UpdateType,
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
    pub previous: Value,
    #[serde(flatten)]
    pub changes: FieldChanges,
    pub date_of_update: NaiveDate,
}

/// History entry for privilege mutations, mirroring the license design.
/// `jurisdiction` is the purchased jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivilegeUpdate {
    pub update_type: UpdateType,
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
    pub previous: Value,
    #[serde(flatten)]
    pub changes: FieldChanges,
    pub date_of_update: NaiveDate,
}

/// History entry for provider-level mutations such as a home-jurisdiction
/// change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUpdate {
    pub update_type: UpdateType,
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub previous: Value,
    #[serde(flatten)]
    pub changes: FieldChanges,
    pub date_of_update: NaiveDate,
}
