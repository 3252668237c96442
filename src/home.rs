//! Home-jurisdiction reassignment: when a provider selects a new domicile,
//! every license type held in the current home jurisdiction is re-evaluated
//! against the target jurisdiction's uploaded license data, and every
//! dependent privilege is moved or deactivated accordingly.
//!
//! The whole reassignment is computed as a pure plan from a snapshot of the
//! provider's record set, then applied with conditional writes. Re-running
//! with the same target converges: an already-applied reassignment produces
//! an empty plan, no history, and no event.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use crate::domain::{
    Compact, HomeJurisdictionChangeStatus, HomeJurisdictionSelection, License, Privilege,
    PrivilegeUpdate, Provider, ProviderId, ProviderUpdate, UpdateType,
};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventOutbox, EventPublisher};
use crate::pipeline::changelog::record_changes;
use crate::store::{ProviderStore, RecordBody};

/// Snapshot of one provider's record set, versioned for conditional writes.
#[derive(Debug, Clone)]
pub struct ProviderSnapshot {
    pub provider: Provider,
    pub provider_version: u64,
    pub licenses: Vec<(License, u64)>,
    pub privileges: Vec<(Privilege, u64)>,
}

impl ProviderSnapshot {
    fn license_in(&self, jurisdiction: &str, license_type: &str) -> Option<&License> {
        self.licenses
            .iter()
            .map(|(license, _)| license)
            .find(|license| {
                license.jurisdiction.0 == jurisdiction && license.license_type.0 == license_type
            })
    }
}

/// Everything one reassignment will change.
#[derive(Debug, Clone, Default)]
pub struct ReassignmentPlan {
    pub provider: Option<(Provider, u64)>,
    pub provider_history: Option<ProviderUpdate>,
    pub privileges: Vec<(Privilege, u64)>,
    pub privilege_history: Vec<PrivilegeUpdate>,
    pub events: Vec<DomainEvent>,
    /// Privileges referencing a license the record set no longer holds; a
    /// consistency bug that is logged but does not abort the update.
    pub orphaned_privileges: Vec<Privilege>,
}

impl ReassignmentPlan {
    pub fn is_noop(&self) -> bool {
        self.provider.is_none() && self.privileges.is_empty()
    }
}

/// Result summary returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReassignmentOutcome {
    pub changed: bool,
    pub affected_privileges: usize,
}

/// Compute the full effect of moving the provider to `target`.
pub fn plan_reassignment(
    snapshot: &ProviderSnapshot,
    target: &HomeJurisdictionSelection,
    today: NaiveDate,
) -> ReassignmentPlan {
    let provider = &snapshot.provider;
    let mut plan = ReassignmentPlan::default();

    if let Some(home) = &provider.license_jurisdiction {
        for (privilege, version) in &snapshot.privileges {
            if privilege.license_jurisdiction != *home {
                continue;
            }
            if snapshot
                .license_in(&home.0, &privilege.license_type.0)
                .is_none()
            {
                plan.orphaned_privileges.push(privilege.clone());
                continue;
            }

            let next = reassign_privilege(snapshot, privilege, target, today);
            if next != *privilege {
                plan.privilege_history.push(PrivilegeUpdate {
                    update_type: UpdateType::HomeJurisdictionChange,
                    compact: next.compact.clone(),
                    provider_id: next.provider_id,
                    jurisdiction: next.jurisdiction.clone(),
                    license_type: next.license_type.clone(),
                    previous: serde_json::to_value(privilege).unwrap_or(Value::Null),
                    changes: record_changes(privilege, &next),
                    date_of_update: today,
                });
                plan.privileges.push((next, *version));
            }
        }
    }

    let mut next_provider = provider.clone();
    next_provider.current_home_jurisdiction = Some(target.clone());

    let adopted = target.member().and_then(|jurisdiction| {
        snapshot
            .licenses
            .iter()
            .map(|(license, _)| license)
            .filter(|license| {
                license.jurisdiction == *jurisdiction
                    && license.computed_status(today).is_active()
            })
            .max_by_key(|license| license.date_of_issuance)
    });
    match adopted {
        Some(license) => next_provider.adopt_home_license(license, today),
        None => next_provider.mark_ineligible(),
    }

    if next_provider != *provider {
        plan.provider_history = Some(ProviderUpdate {
            update_type: UpdateType::HomeJurisdictionChange,
            compact: provider.compact.clone(),
            provider_id: provider.provider_id,
            previous: serde_json::to_value(provider).unwrap_or(Value::Null),
            changes: record_changes(provider, &next_provider),
            date_of_update: today,
        });
        plan.events.push(DomainEvent::HomeJurisdictionChange {
            compact: provider.compact.clone(),
            provider_id: provider.provider_id,
            previous: provider
                .current_home_jurisdiction
                .as_ref()
                .map(|selection| selection.as_str().to_string()),
            next: target.as_str().to_string(),
        });
        plan.provider = Some((next_provider, snapshot.provider_version));
    }

    plan
}

/// Evaluate one privilege against the target jurisdiction's license data.
///
/// Administrator- and encumbrance-caused inactivity is never overwritten by
/// a home-jurisdiction-driven deactivation: such privileges keep their
/// encumbrance status and license linkage untouched.
fn reassign_privilege(
    snapshot: &ProviderSnapshot,
    privilege: &Privilege,
    target: &HomeJurisdictionSelection,
    today: NaiveDate,
) -> Privilege {
    let mut next = privilege.clone();

    if privilege.inactive_for_other_cause() {
        return next;
    }

    // A provider cannot hold an active privilege in their own home state,
    // no matter how the target jurisdiction's license looks.
    if let Some(jurisdiction) = target.member() {
        if privilege.jurisdiction == *jurisdiction {
            next.home_jurisdiction_change_status = Some(HomeJurisdictionChangeStatus::Inactive);
            next.refresh_status(None, today);
            return next;
        }
    }

    let target_license = target
        .member()
        .and_then(|jurisdiction| snapshot.license_in(&jurisdiction.0, &privilege.license_type.0));

    match target_license {
        None => {
            next.home_jurisdiction_change_status = Some(match target {
                HomeJurisdictionSelection::Other => {
                    HomeJurisdictionChangeStatus::NonMemberJurisdiction
                }
                HomeJurisdictionSelection::Member(_) => {
                    HomeJurisdictionChangeStatus::NoLicenseInJurisdiction
                }
            });
            next.refresh_status(None, today);
        }
        Some(license) => {
            let ineligible = !license
                .jurisdiction_uploaded_compact_eligibility
                .is_eligible();
            next.home_jurisdiction_change_status = if ineligible && !license.encumbered_status.is_encumbered()
            {
                Some(HomeJurisdictionChangeStatus::LicenseCompactIneligible)
            } else {
                // Expiration and encumbrance govern through the derived
                // status; no explicit reason tag is set.
                None
            };
            // The move itself always copies linkage and dates, even onto an
            // encumbered license whose ordinary sync would freeze them.
            next.license_jurisdiction = license.jurisdiction.clone();
            next.date_of_expiration = license.date_of_expiration;
            next.date_of_renewal = license.date_of_renewal;
            next.sync_with_license(license, today);
        }
    }

    next
}

/// Reassignment engine service.
pub struct HomeJurisdictionService<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
}

impl<S, P> HomeJurisdictionService<S, P>
where
    S: ProviderStore + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        Self { store, publisher }
    }

    pub fn change_home_jurisdiction(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        target: HomeJurisdictionSelection,
        today: NaiveDate,
    ) -> Result<ReassignmentOutcome, DomainError> {
        let snapshot = self.load_snapshot(compact, provider_id)?;
        let plan = plan_reassignment(&snapshot, &target, today);
        self.apply(plan)
    }

    fn load_snapshot(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
    ) -> Result<ProviderSnapshot, DomainError> {
        let records = self.store.provider_records(compact, provider_id)?;

        let mut provider = None;
        let mut licenses = Vec::new();
        let mut privileges = Vec::new();
        for record in records {
            match record.body {
                RecordBody::Provider(body) => provider = Some((body, record.version)),
                RecordBody::License(body) => licenses.push((body, record.version)),
                RecordBody::Privilege(body) => privileges.push((body, record.version)),
                _ => {}
            }
        }

        let (provider, provider_version) =
            provider.ok_or_else(|| DomainError::not_found(format!("provider {provider_id}")))?;

        Ok(ProviderSnapshot {
            provider,
            provider_version,
            licenses,
            privileges,
        })
    }

    fn apply(&self, plan: ReassignmentPlan) -> Result<ReassignmentOutcome, DomainError> {
        for privilege in &plan.orphaned_privileges {
            warn!(
                jurisdiction = %privilege.jurisdiction,
                license_type = %privilege.license_type,
                "privilege references a license the provider no longer holds"
            );
        }

        let changed = !plan.is_noop();
        let affected_privileges = plan.privileges.len();

        for (privilege, version) in plan.privileges {
            self.store
                .put(RecordBody::Privilege(privilege), Some(version))?;
        }
        for entry in plan.privilege_history {
            self.store.put(RecordBody::PrivilegeUpdate(entry), None)?;
        }
        if let Some((provider, version)) = plan.provider {
            self.store
                .put(RecordBody::Provider(provider), Some(version))?;
        }
        if let Some(entry) = plan.provider_history {
            self.store.put(RecordBody::ProviderUpdate(entry), None)?;
        }

        // Downstream notification of a domicile change is best-effort; the
        // stored state is already consistent.
        if !plan.events.is_empty() {
            let mut outbox = EventOutbox::new();
            outbox.extend(plan.events);
            outbox.flush_best_effort(&*self.publisher);
        }

        Ok(ReassignmentOutcome {
            changed,
            affected_privileges,
        })
    }
}
