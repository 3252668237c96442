//! Provider aggregate records and the pure status-derivation rules they obey.

mod adverse;
mod history;
mod license;
mod military;
mod privilege;
mod provider;
pub mod status;

pub use adverse::{AdverseAction, AdverseActionId, EncumbranceType, Investigation, InvestigationId};
pub use history::{FieldChanges, LicenseUpdate, PrivilegeUpdate, ProviderUpdate};
pub use license::{Address, License};
pub use military::{MilitaryAffiliation, MilitaryAffiliationStatus, MilitaryAffiliationType};
pub use privilege::Privilege;
pub use provider::Provider;
pub use status::{
    AdministratorSetStatus, CompactEligibility, EncumberedStatus, HomeJurisdictionChangeStatus,
    HomeJurisdictionSelection, InvestigationStatus, LicenseStatus, PrivilegeStatus, RecordKind,
    UpdateType,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Top-level tenant partition: a multi-state licensure agreement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compact(pub String);

impl fmt::Display for Compact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SSN-derived provider identity, unique within a compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub Uuid);

impl ProviderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Postal abbreviation of a licensing board's jurisdiction, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jurisdiction(pub String);

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Abbreviated license type within a compact (e.g. `slp`, `aud`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LicenseType(pub String);

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
