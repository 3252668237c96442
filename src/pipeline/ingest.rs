//! Stage B: fold a normalized license message into stored provider state.
//!
//! The mutation is computed as a pure plan (new record states, history
//! records, domain events) from a snapshot of the provider's record set,
//! then applied with conditional writes and flushed through the event
//! outbox. Re-delivery of an unchanged message produces an empty plan:
//! zero writes, zero events.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{
    EncumberedStatus, License, LicenseUpdate, Privilege, PrivilegeUpdate, Provider, RecordKind,
    UpdateType,
};
use crate::error::DomainError;
use crate::events::{BatchItemFailure, DomainEvent, EventOutbox, EventPublisher};
use crate::store::{ProviderStore, RecordBody};

use super::changelog::{diff_license, record_changes};
use super::preprocess::NormalizedLicense;

/// What one ingest did to stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Created,
    Updated(UpdateType),
    Unchanged,
}

/// A license write with the version the conditional put checks; `None`
/// creates the record.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseWrite {
    pub license: License,
    pub expected_version: Option<u64>,
}

/// Everything one ingest will change, computed without I/O so the cascade
/// logic is testable independently of the triggering mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestPlan {
    pub outcome: IngestOutcome,
    pub license: Option<LicenseWrite>,
    pub history: Option<LicenseUpdate>,
    pub provider: Option<(Provider, u64)>,
    pub privileges: Vec<(Privilege, u64)>,
    pub privilege_history: Vec<PrivilegeUpdate>,
    pub events: Vec<DomainEvent>,
}

impl IngestPlan {
    fn unchanged() -> Self {
        Self {
            outcome: IngestOutcome::Unchanged,
            license: None,
            history: None,
            provider: None,
            privileges: Vec::new(),
            privilege_history: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.license.is_none()
            && self.history.is_none()
            && self.provider.is_none()
            && self.privileges.is_empty()
            && self.privilege_history.is_empty()
            && self.events.is_empty()
    }
}

/// Snapshot of the stored state one ingest works against.
#[derive(Debug, Clone)]
pub struct IngestContext {
    pub provider: Provider,
    pub provider_version: u64,
    pub stored_license: Option<(License, u64)>,
    /// Privileges backed by the incoming license's (jurisdiction, type).
    pub dependent_privileges: Vec<(Privilege, u64)>,
    /// The license currently mirrored onto the provider record, if any.
    pub selected_home_license: Option<License>,
}

/// Compute the full effect of one normalized license message.
pub fn plan_ingest(ctx: &IngestContext, message: NormalizedLicense, today: NaiveDate) -> IngestPlan {
    let (encumbered_status, investigation_status) = match &ctx.stored_license {
        Some((stored, _)) => (stored.encumbered_status, stored.investigation_status),
        None => (EncumberedStatus::Unencumbered, None),
    };
    let candidate = message.into_license(encumbered_status, investigation_status, today);

    let mut plan = IngestPlan::unchanged();

    match &ctx.stored_license {
        None => {
            plan.outcome = IngestOutcome::Created;
            plan.license = Some(LicenseWrite {
                license: candidate.clone(),
                expected_version: None,
            });
        }
        Some((stored, version)) => {
            let Some(diff) = diff_license(stored, &candidate) else {
                return plan;
            };

            plan.outcome = IngestOutcome::Updated(diff.update_type);
            plan.license = Some(LicenseWrite {
                license: candidate.clone(),
                expected_version: Some(*version),
            });
            plan.history = Some(LicenseUpdate {
                update_type: diff.update_type,
                compact: candidate.compact.clone(),
                provider_id: candidate.provider_id,
                jurisdiction: candidate.jurisdiction.clone(),
                license_type: candidate.license_type.clone(),
                previous: diff.previous,
                changes: diff.changes,
                date_of_update: today,
            });

            let was_active = stored.computed_status(today).is_active();
            if was_active && !candidate.status.is_active() {
                plan.events.push(DomainEvent::Deactivation {
                    kind: RecordKind::License,
                    compact: candidate.compact.clone(),
                    provider_id: candidate.provider_id,
                    jurisdiction: candidate.jurisdiction.clone(),
                    license_type: candidate.license_type.clone(),
                });
            }

            cascade_privileges(ctx, &candidate, diff.update_type, today, &mut plan);
        }
    }

    maybe_select_home_license(ctx, &candidate, today, &mut plan);
    plan
}

/// Re-align every privilege backed by the mutated license and record one
/// history entry and at most one deactivation event per transition.
fn cascade_privileges(
    ctx: &IngestContext,
    license: &License,
    update_type: UpdateType,
    today: NaiveDate,
    plan: &mut IngestPlan,
) {
    for (privilege, version) in &ctx.dependent_privileges {
        let mut next = privilege.clone();
        next.sync_with_license(license, today);
        if next == *privilege {
            continue;
        }

        plan.privilege_history.push(PrivilegeUpdate {
            update_type,
            compact: next.compact.clone(),
            provider_id: next.provider_id,
            jurisdiction: next.jurisdiction.clone(),
            license_type: next.license_type.clone(),
            previous: serde_json::to_value(privilege).unwrap_or(Value::Null),
            changes: record_changes(privilege, &next),
            date_of_update: today,
        });

        if privilege.status.is_active() && !next.status.is_active() {
            plan.events.push(DomainEvent::Deactivation {
                kind: RecordKind::Privilege,
                compact: next.compact.clone(),
                provider_id: next.provider_id,
                jurisdiction: next.jurisdiction.clone(),
                license_type: next.license_type.clone(),
            });
        }

        plan.privileges.push((next, *version));
    }
}

/// Home-license selection. A provider with no registered home-jurisdiction
/// selection adopts the latest-issued active license; a registered selection
/// is never overridden by uploads from other jurisdictions. Uploads for the
/// currently selected jurisdiction always refresh the mirrored fields.
fn maybe_select_home_license(
    ctx: &IngestContext,
    candidate: &License,
    today: NaiveDate,
    plan: &mut IngestPlan,
) {
    let provider = &ctx.provider;
    let mut next = provider.clone();

    let same_selection = provider.license_jurisdiction.as_ref() == Some(&candidate.jurisdiction);
    if same_selection {
        next.adopt_home_license(candidate, today);
    } else if !provider.has_registered_selection() {
        let later_issuance = match (&provider.license_jurisdiction, &ctx.selected_home_license) {
            (None, _) => true,
            (Some(_), Some(selected)) => candidate.date_of_issuance > selected.date_of_issuance,
            // The selection points at a license this record set no longer
            // holds; treat the incoming license as the better candidate.
            (Some(_), None) => true,
        };
        if candidate.computed_status(today).is_active() && later_issuance {
            next.adopt_home_license(candidate, today);
        }
    }

    if next != *provider {
        plan.provider = Some((next, ctx.provider_version));
    }
}

/// Stage B service: loads the provider's record set, plans, applies, and
/// publishes.
pub struct IngestService<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
}

impl<S, P> IngestService<S, P>
where
    S: ProviderStore + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        Self { store, publisher }
    }

    /// Consume one queue message body.
    pub fn ingest_message(&self, body: Value, today: NaiveDate) -> Result<IngestOutcome, DomainError> {
        let message: NormalizedLicense = serde_json::from_value(body)
            .map_err(|err| DomainError::validation(None, format!("malformed ingest message: {err}")))?;
        self.ingest(message, today)
    }

    /// Queue consumer entry point reporting per-message failures.
    pub fn ingest_batch(
        &self,
        messages: Vec<(String, Value)>,
        today: NaiveDate,
    ) -> Vec<BatchItemFailure> {
        let mut failures = Vec::new();
        for (item_id, body) in messages {
            if let Err(err) = self.ingest_message(body, today) {
                warn!(%item_id, %err, "license ingestion failed");
                failures.push(BatchItemFailure {
                    item_id,
                    reason: err.to_string(),
                });
            }
        }
        failures
    }

    pub fn ingest(
        &self,
        message: NormalizedLicense,
        today: NaiveDate,
    ) -> Result<IngestOutcome, DomainError> {
        let ctx = self.load_context(&message)?;
        let plan = plan_ingest(&ctx, message, today);
        self.apply(plan)
    }

    fn load_context(&self, message: &NormalizedLicense) -> Result<IngestContext, DomainError> {
        let records = self
            .store
            .provider_records(&message.compact, message.provider_id)?;

        let mut provider = None;
        let mut stored_license = None;
        let mut dependent_privileges = Vec::new();
        let mut licenses = Vec::new();

        for record in records {
            match record.body {
                RecordBody::Provider(body) => provider = Some((body, record.version)),
                RecordBody::License(body) => {
                    if body.jurisdiction == message.jurisdiction
                        && body.license_type == message.license_type
                    {
                        stored_license = Some((body.clone(), record.version));
                    }
                    licenses.push(body);
                }
                RecordBody::Privilege(body) => {
                    if body.license_jurisdiction == message.jurisdiction
                        && body.license_type == message.license_type
                    {
                        dependent_privileges.push((body, record.version));
                    }
                }
                _ => {}
            }
        }

        let (provider, provider_version) = provider.ok_or_else(|| {
            DomainError::not_found(format!("provider {}", message.provider_id))
        })?;

        let selected_home_license = provider.license_jurisdiction.as_ref().and_then(|home| {
            licenses
                .iter()
                .filter(|license| &license.jurisdiction == home)
                .max_by_key(|license| license.date_of_issuance)
                .cloned()
        });

        Ok(IngestContext {
            provider,
            provider_version,
            stored_license,
            dependent_privileges,
            selected_home_license,
        })
    }

    fn apply(&self, plan: IngestPlan) -> Result<IngestOutcome, DomainError> {
        let IngestPlan {
            outcome,
            license,
            history,
            provider,
            privileges,
            privilege_history,
            events,
        } = plan;

        if let Some(write) = license {
            match write.expected_version {
                None => {
                    self.store.put_new(RecordBody::License(write.license))?;
                }
                Some(version) => {
                    self.store
                        .put(RecordBody::License(write.license), Some(version))?;
                }
            }
        }
        // History keys embed the change hash, so retried deliveries rewrite
        // the same record instead of duplicating it.
        if let Some(entry) = history {
            self.store.put(RecordBody::LicenseUpdate(entry), None)?;
        }
        for (privilege, version) in privileges {
            self.store
                .put(RecordBody::Privilege(privilege), Some(version))?;
        }
        for entry in privilege_history {
            self.store.put(RecordBody::PrivilegeUpdate(entry), None)?;
        }
        if let Some((provider, version)) = provider {
            self.store
                .put(RecordBody::Provider(provider), Some(version))?;
        }

        if !events.is_empty() {
            let mut outbox = EventOutbox::new();
            outbox.extend(events);
            outbox.flush(&*self.publisher)?;
        }

        if let IngestOutcome::Updated(update_type) = outcome {
            info!(update_type = update_type.label(), "license ingested");
        }
        Ok(outcome)
    }
}
