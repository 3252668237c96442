use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Compact, ProviderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MilitaryAffiliationType {
    MilitaryMember,
    MilitaryMemberSpouse,
}

/// At most one record per provider may be active; uploading a new document
/// set transitions the previous active record to inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MilitaryAffiliationStatus {
    Active,
    Inactive,
}

/// One uploaded military-status document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilitaryAffiliation {
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub affiliation_type: MilitaryAffiliationType,
    pub document_keys: Vec<String>,
    pub date_of_upload: NaiveDate,
    pub status: MilitaryAffiliationStatus,
}
