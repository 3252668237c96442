use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::status::{
    CompactEligibility, EncumberedStatus, InvestigationStatus, LicenseStatus,
};
use super::{Compact, Jurisdiction, LicenseType, ProviderId};

/// Mailing address uploaded by the licensing board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// One license per (compact, provider, jurisdiction, license type). Created on
/// first upload for the key and mutated by every subsequent upload; the
/// `status` and `compact_eligibility` fields are recomputed at write time from
/// the jurisdiction-uploaded raw fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
    pub given_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub family_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    pub date_of_birth: NaiveDate,
    pub ssn_last_four: String,
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
    pub status: LicenseStatus,
    pub compact_eligibility: CompactEligibility,
    pub encumbered_status: EncumberedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investigation_status: Option<InvestigationStatus>,
}

impl License {
    /// Active iff the board uploaded an active status and the license has not
    /// expired. Expiration alone overrides an uploaded "active" flag.
    pub fn computed_status(&self, today: NaiveDate) -> LicenseStatus {
        if self.jurisdiction_uploaded_license_status.is_active()
            && self.date_of_expiration >= today
        {
            LicenseStatus::Active
        } else {
            LicenseStatus::Inactive
        }
    }

    /// Eligible only when the board says so, the computed status is active,
    /// and no encumbrance is in effect.
    pub fn computed_compact_eligibility(&self, today: NaiveDate) -> CompactEligibility {
        if self.jurisdiction_uploaded_compact_eligibility.is_eligible()
            && self.computed_status(today).is_active()
            && !self.encumbered_status.is_encumbered()
        {
            CompactEligibility::Eligible
        } else {
            CompactEligibility::Ineligible
        }
    }

    /// Refresh the stored derived fields against the injected date.
    pub fn refresh_derived(&mut self, today: NaiveDate) {
        self.status = self.computed_status(today);
        self.compact_eligibility = self.computed_compact_eligibility(today);
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.date_of_expiration < today
    }

    /// A license that can back active privileges: unexpired, unencumbered,
    /// and uploaded as compact-eligible.
    pub fn backs_active_privileges(&self, today: NaiveDate) -> bool {
        !self.is_expired(today)
            && !self.encumbered_status.is_encumbered()
            && self.jurisdiction_uploaded_compact_eligibility.is_eligible()
            && self.computed_status(today).is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
    }

    #[test]
    fn expiration_overrides_uploaded_active_status() {
        let mut license = fixtures::license("oh", "slp");
        license.jurisdiction_uploaded_license_status = LicenseStatus::Active;
        license.date_of_expiration = NaiveDate::from_ymd_opt(2025, 5, 31).expect("valid date");

        assert_eq!(license.computed_status(today()), LicenseStatus::Inactive);
    }

    #[test]
    fn uploaded_inactive_status_wins_even_when_unexpired() {
        let mut license = fixtures::license("oh", "slp");
        license.jurisdiction_uploaded_license_status = LicenseStatus::Inactive;

        assert_eq!(license.computed_status(today()), LicenseStatus::Inactive);
    }

    #[test]
    fn eligibility_requires_active_status_and_no_encumbrance() {
        let mut license = fixtures::license("oh", "slp");
        assert_eq!(
            license.computed_compact_eligibility(today()),
            CompactEligibility::Eligible
        );

        license.encumbered_status = EncumberedStatus::Encumbered;
        assert_eq!(
            license.computed_compact_eligibility(today()),
            CompactEligibility::Ineligible
        );

        license.encumbered_status = EncumberedStatus::Unencumbered;
        license.jurisdiction_uploaded_compact_eligibility = CompactEligibility::Ineligible;
        assert_eq!(
            license.computed_compact_eligibility(today()),
            CompactEligibility::Ineligible
        );
    }
}
