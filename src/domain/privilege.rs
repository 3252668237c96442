use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::license::License;
use super::status::{
    AdministratorSetStatus, EncumberedStatus, HomeJurisdictionChangeStatus, InvestigationStatus,
    PrivilegeStatus,
};
use super::{Compact, Jurisdiction, LicenseType, ProviderId};

/// The right to practice in a purchased jurisdiction, always tied to exactly
/// one backing license via `license_jurisdiction` + `license_type`. Dates are
/// mirrored from the backing license at the time of the last sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Privilege {
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub jurisdiction: Jurisdiction,
    pub license_jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
    pub date_of_issuance: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_renewal: Option<NaiveDate>,
    pub date_of_expiration: NaiveDate,
    pub status: PrivilegeStatus,
    pub administrator_set_status: AdministratorSetStatus,
    pub encumbered_status: EncumberedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_jurisdiction_change_status: Option<HomeJurisdictionChangeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investigation_status: Option<InvestigationStatus>,
    pub compact_transaction_id: String,
}

impl Privilege {
    /// Inactive when administrator-deactivated, expired, encumbered either
    /// directly or through the backing license, or flagged by a
    /// home-jurisdiction change.
    pub fn derived_status(&self, today: NaiveDate) -> PrivilegeStatus {
        let deactivated = matches!(self.administrator_set_status, AdministratorSetStatus::Inactive)
            || self.date_of_expiration < today
            || self.encumbered_status.is_encumbered()
            || self.home_jurisdiction_change_status.is_some();

        if deactivated {
            PrivilegeStatus::Inactive
        } else {
            PrivilegeStatus::Active
        }
    }

    /// Re-align this privilege with its backing license: mirror dates, take
    /// license-level encumbrance precedence, and recompute the stored status.
    ///
    /// An encumbered license freezes its mirrored fields so that a later
    /// lift resumes from the board-uploaded truth rather than stale copies.
    pub fn sync_with_license(&mut self, license: &License, today: NaiveDate) {
        if license.encumbered_status.is_encumbered() {
            self.encumbered_status = EncumberedStatus::LicenseEncumbered;
        } else {
            self.date_of_expiration = license.date_of_expiration;
            self.date_of_renewal = license.date_of_renewal;
            if matches!(self.encumbered_status, EncumberedStatus::LicenseEncumbered) {
                self.encumbered_status = EncumberedStatus::Unencumbered;
            }
        }

        self.refresh_status(Some(license), today);
    }

    /// Recompute the stored status. The backing license is consulted when
    /// available: a deactivated license pulls its privileges down with it.
    pub fn refresh_status(&mut self, license: Option<&License>, today: NaiveDate) {
        let license_inactive = license
            .map(|license| !license.computed_status(today).is_active())
            .unwrap_or(false);

        self.status = if license_inactive {
            PrivilegeStatus::Inactive
        } else {
            self.derived_status(today)
        };
    }

    /// Inactive for a reason a home-jurisdiction move must not overwrite.
    pub fn inactive_for_other_cause(&self) -> bool {
        self.encumbered_status.is_encumbered()
            || matches!(self.administrator_set_status, AdministratorSetStatus::Inactive)
    }
}
