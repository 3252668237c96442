//! Tagged status variants shared across the provider aggregate.
//!
//! Every derived status is a pure function of stored attributes plus an
//! injected "current date" so reconciliation stays reproducible under test.

use serde::{Deserialize, Serialize};

use super::Jurisdiction;

/// Computed license standing: an expired license is inactive no matter what
/// the licensing board uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LicenseStatus {
    Active,
    Inactive,
}

impl LicenseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Computed privilege standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivilegeStatus {
    Active,
    Inactive,
}

impl PrivilegeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Whether a license qualifies its holder for compact privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompactEligibility {
    Eligible,
    Ineligible,
}

impl CompactEligibility {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::Ineligible => "ineligible",
        }
    }

    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Encumbrance standing of a license or privilege. License-level encumbrance
/// takes precedence over the privilege's own standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EncumberedStatus {
    Unencumbered,
    Encumbered,
    LicenseEncumbered,
}

impl EncumberedStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unencumbered => "unencumbered",
            Self::Encumbered => "encumbered",
            Self::LicenseEncumbered => "licenseEncumbered",
        }
    }

    pub const fn is_encumbered(self) -> bool {
        !matches!(self, Self::Unencumbered)
    }
}

/// Deactivation lever reserved for compact administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdministratorSetStatus {
    Active,
    Inactive,
}

/// Present on a record only while an investigation is open against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestigationStatus {
    UnderInvestigation,
}

/// Classification of a stored-record mutation, attached to history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateType {
    Renewal,
    Deactivation,
    HomeJurisdictionChange,
    Other,
}

impl UpdateType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Renewal => "renewal",
            Self::Deactivation => "deactivation",
            Self::HomeJurisdictionChange => "homeJurisdictionChange",
            Self::Other => "other",
        }
    }
}

/// Which record an adverse action or investigation is filed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    License,
    Privilege,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::License => "license",
            Self::Privilege => "privilege",
        }
    }
}

/// Why a privilege was deactivated by a home-jurisdiction move, as opposed to
/// administrator action or encumbrance. Never set when the privilege was
/// already inactive for one of those other reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HomeJurisdictionChangeStatus {
    /// The privilege's purchased jurisdiction became the provider's home.
    Inactive,
    NonMemberJurisdiction,
    NoLicenseInJurisdiction,
    LicenseCompactIneligible,
}

impl HomeJurisdictionChangeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::NonMemberJurisdiction => "nonMemberJurisdiction",
            Self::NoLicenseInJurisdiction => "noLicenseInJurisdiction",
            Self::LicenseCompactIneligible => "licenseCompactIneligible",
        }
    }
}

/// A provider-selected domicile: either a compact member jurisdiction or the
/// `other` sentinel for non-member and international addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeJurisdictionSelection {
    Member(Jurisdiction),
    Other,
}

impl HomeJurisdictionSelection {
    pub const OTHER: &'static str = "other";

    pub fn as_str(&self) -> &str {
        match self {
            Self::Member(jurisdiction) => &jurisdiction.0,
            Self::Other => Self::OTHER,
        }
    }

    pub fn member(&self) -> Option<&Jurisdiction> {
        match self {
            Self::Member(jurisdiction) => Some(jurisdiction),
            Self::Other => None,
        }
    }
}

impl From<String> for HomeJurisdictionSelection {
    fn from(value: String) -> Self {
        if value == Self::OTHER {
            Self::Other
        } else {
            Self::Member(Jurisdiction(value))
        }
    }
}

impl From<HomeJurisdictionSelection> for String {
    fn from(value: HomeJurisdictionSelection) -> Self {
        value.as_str().to_string()
    }
}

impl serde::Serialize for HomeJurisdictionSelection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for HomeJurisdictionSelection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw))
    }
}
