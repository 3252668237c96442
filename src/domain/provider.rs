use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::license::License;
use super::military::MilitaryAffiliationStatus;
use super::status::{CompactEligibility, HomeJurisdictionSelection, LicenseStatus};
use super::{Compact, Jurisdiction, ProviderId};

/// The aggregate root: exactly one record per (compact, provider identity).
///
/// `license_jurisdiction` tracks the jurisdiction of the currently selected
/// home license, while `current_home_jurisdiction` is the provider-selected
/// domicile. The two differ when a provider moves to a jurisdiction whose
/// board has not uploaded a matching license yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub given_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub family_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    pub ssn_last_four: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_jurisdiction: Option<Jurisdiction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_home_jurisdiction: Option<HomeJurisdictionSelection>,
    pub license_status: LicenseStatus,
    pub compact_eligibility: CompactEligibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_expiration: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    pub is_registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_email_verification_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub military_affiliation_status: Option<MilitaryAffiliationStatus>,
}

impl Provider {
    /// A bare record created by ingest preprocessing before any license for
    /// the identity has been stored.
    pub fn bare(
        compact: Compact,
        provider_id: ProviderId,
        given_name: String,
        family_name: String,
        ssn_last_four: String,
    ) -> Self {
        Self {
            compact,
            provider_id,
            given_name,
            middle_name: None,
            family_name,
            suffix: None,
            ssn_last_four,
            npi: None,
            license_jurisdiction: None,
            current_home_jurisdiction: None,
            license_status: LicenseStatus::Inactive,
            compact_eligibility: CompactEligibility::Ineligible,
            date_of_expiration: None,
            date_of_birth: None,
            is_registered: false,
            identity_sub: None,
            registered_email: None,
            pending_email: None,
            pending_email_verification_code: None,
            military_affiliation_status: None,
        }
    }

    /// Whether the provider has registered a home-jurisdiction selection.
    /// Incoming licenses from other jurisdictions never override a
    /// registered selection.
    pub fn has_registered_selection(&self) -> bool {
        self.current_home_jurisdiction.is_some()
    }

    /// Copy name, jurisdiction, dates, and eligibility from the license
    /// selected as the provider's home license.
    pub fn adopt_home_license(&mut self, license: &License, today: NaiveDate) {
        self.given_name = license.given_name.clone();
        self.middle_name = license.middle_name.clone();
        self.family_name = license.family_name.clone();
        self.suffix = license.suffix.clone();
        self.npi = license.npi.clone();
        self.license_jurisdiction = Some(license.jurisdiction.clone());
        self.date_of_expiration = Some(license.date_of_expiration);
        self.date_of_birth = Some(license.date_of_birth);
        self.license_status = license.computed_status(today);
        self.compact_eligibility = license.computed_compact_eligibility(today);
    }

    /// Mark the provider ineligible while retaining the previous license
    /// metadata for display.
    pub fn mark_ineligible(&mut self) {
        self.license_status = LicenseStatus::Inactive;
        self.compact_eligibility = CompactEligibility::Ineligible;
    }
}
