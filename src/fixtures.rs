//! Shared record builders for unit tests.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    Address, AdministratorSetStatus, Compact, CompactEligibility, EncumberedStatus, Jurisdiction,
    License, LicenseStatus, LicenseType, Privilege, PrivilegeStatus, Provider, ProviderId,
};
use crate::pipeline::RawLicenseUpload;

pub(crate) fn compact() -> Compact {
    Compact("aslp".to_string())
}

pub(crate) fn provider_id() -> ProviderId {
    ProviderId(Uuid::from_u128(0x4f9f_1c2e_7a55_4b1d_9c1a_0d2e_3f4a_5b6c))
}

pub(crate) fn provider() -> Provider {
    Provider::bare(
        compact(),
        provider_id(),
        "Tatiana".to_string(),
        "Vasquez".to_string(),
        "1234".to_string(),
    )
}

pub(crate) fn address() -> Address {
    Address {
        street1: "79 N Franklin Turnpike".to_string(),
        street2: None,
        city: "Columbus".to_string(),
        state: "oh".to_string(),
        postal_code: "43004".to_string(),
    }
}

pub(crate) fn license(jurisdiction: &str, license_type: &str) -> License {
    License {
        compact: compact(),
        provider_id: provider_id(),
        jurisdiction: Jurisdiction(jurisdiction.to_string()),
        license_type: LicenseType(license_type.to_string()),
        given_name: "Tatiana".to_string(),
        middle_name: None,
        family_name: "Vasquez".to_string(),
        suffix: None,
        date_of_birth: NaiveDate::from_ymd_opt(1985, 11, 20).expect("valid date"),
        ssn_last_four: "1234".to_string(),
        npi: Some("1234567890".to_string()),
        email_address: None,
        phone_number: None,
        address: address(),
        date_of_issuance: NaiveDate::from_ymd_opt(2020, 3, 15).expect("valid date"),
        date_of_renewal: None,
        date_of_expiration: NaiveDate::from_ymd_opt(2026, 6, 1).expect("valid date"),
        jurisdiction_uploaded_license_status: LicenseStatus::Active,
        jurisdiction_uploaded_compact_eligibility: CompactEligibility::Eligible,
        status: LicenseStatus::Active,
        compact_eligibility: CompactEligibility::Eligible,
        encumbered_status: EncumberedStatus::Unencumbered,
        investigation_status: None,
    }
}

pub(crate) fn privilege(
    jurisdiction: &str,
    license_jurisdiction: &str,
    license_type: &str,
) -> Privilege {
    Privilege {
        compact: compact(),
        provider_id: provider_id(),
        jurisdiction: Jurisdiction(jurisdiction.to_string()),
        license_jurisdiction: Jurisdiction(license_jurisdiction.to_string()),
        license_type: LicenseType(license_type.to_string()),
        date_of_issuance: NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date"),
        date_of_renewal: None,
        date_of_expiration: NaiveDate::from_ymd_opt(2026, 6, 1).expect("valid date"),
        status: PrivilegeStatus::Active,
        administrator_set_status: AdministratorSetStatus::Active,
        encumbered_status: EncumberedStatus::Unencumbered,
        home_jurisdiction_change_status: None,
        investigation_status: None,
        compact_transaction_id: "T-000181".to_string(),
    }
}

pub(crate) fn upload(jurisdiction: &str, license_type: &str) -> RawLicenseUpload {
    RawLicenseUpload {
        compact: compact(),
        jurisdiction: Jurisdiction(jurisdiction.to_string()),
        license_type: LicenseType(license_type.to_string()),
        ssn: "123-12-1234".to_string(),
        given_name: "Tatiana".to_string(),
        middle_name: None,
        family_name: "Vasquez".to_string(),
        suffix: None,
        date_of_birth: NaiveDate::from_ymd_opt(1985, 11, 20).expect("valid date"),
        npi: Some("1234567890".to_string()),
        email_address: None,
        phone_number: None,
        address: address(),
        date_of_issuance: NaiveDate::from_ymd_opt(2020, 3, 15).expect("valid date"),
        date_of_renewal: None,
        date_of_expiration: NaiveDate::from_ymd_opt(2026, 6, 1).expect("valid date"),
        jurisdiction_uploaded_license_status: LicenseStatus::Active,
        jurisdiction_uploaded_compact_eligibility: CompactEligibility::Eligible,
    }
}
