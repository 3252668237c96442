use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::status::RecordKind;
use super::{Compact, Jurisdiction, LicenseType, ProviderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdverseActionId(pub Uuid);

impl AdverseActionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AdverseActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvestigationId(pub Uuid);

impl InvestigationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InvestigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of formal restriction a board placed on a license or privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EncumbranceType {
    Suspension,
    Revocation,
    Probation,
}

/// A formal restriction recorded against a license or privilege. Lifted by
/// setting `effective_lift_date`, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdverseAction {
    pub id: AdverseActionId,
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub action_against: RecordKind,
    pub jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
    pub clinical_privilege_action_category: String,
    pub encumbrance_type: EncumbranceType,
    pub effective_start_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_lift_date: Option<NaiveDate>,
    pub submitting_user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifting_user: Option<String>,
}

impl AdverseAction {
    /// An action encumbers its owner until a lift date is recorded.
    pub fn is_active(&self) -> bool {
        self.effective_lift_date.is_none()
    }
}

/// A review opened against a license or privilege, which may resolve into an
/// adverse action when closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investigation {
    pub id: InvestigationId,
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub investigation_against: RecordKind,
    pub jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
    pub submitting_user: String,
    pub creation_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resulting_encumbrance_id: Option<AdverseActionId>,
}

impl Investigation {
    pub fn is_open(&self) -> bool {
        self.close_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lift_date_deactivates_an_adverse_action() {
        let mut action = AdverseAction {
            id: AdverseActionId::generate(),
            compact: Compact("aslp".to_string()),
            provider_id: ProviderId::generate(),
            action_against: RecordKind::License,
            jurisdiction: Jurisdiction("oh".to_string()),
            license_type: LicenseType("slp".to_string()),
            clinical_privilege_action_category: "Unsafe Practice or Substandard Care".to_string(),
            encumbrance_type: EncumbranceType::Suspension,
            effective_start_date: NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"),
            effective_lift_date: None,
            submitting_user: "board-admin".to_string(),
            lifting_user: None,
        };

        assert!(action.is_active());
        action.effective_lift_date = NaiveDate::from_ymd_opt(2025, 9, 1);
        assert!(!action.is_active());
    }
}
