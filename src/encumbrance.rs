//! Encumbrance and investigation lifecycle against a license or privilege:
//! `clear -> underInvestigation -> clear | encumbered`, or a direct
//! `clear -> encumbered -> clear` when a board records an adverse action
//! without an investigation. Adverse actions are lifted, never deleted.
//!
//! Exactly one event fires per state transition: opening and closing an
//! investigation is two events total, however the closure resolves.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::domain::{
    AdverseAction, AdverseActionId, Compact, EncumberedStatus, EncumbranceType, Investigation,
    InvestigationId, InvestigationStatus, Jurisdiction, License, LicenseType, Privilege,
    ProviderId, RecordKind,
};
use crate::error::DomainError;
use crate::events::{DomainEvent, EventOutbox, EventPublisher};
use crate::store::{ProviderStore, RecordBody};

/// Identifies the license or privilege an action is filed against.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRef {
    pub compact: Compact,
    pub provider_id: ProviderId,
    pub kind: RecordKind,
    pub jurisdiction: Jurisdiction,
    pub license_type: LicenseType,
}

/// Encumbrance details supplied with a direct action or an investigation
/// closure.
#[derive(Debug, Clone, PartialEq)]
pub struct EncumbrancePayload {
    pub clinical_privilege_action_category: String,
    pub encumbrance_type: EncumbranceType,
    pub effective_start_date: NaiveDate,
}

pub struct EncumbranceService<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
}

enum Owner {
    License(License, u64),
    Privilege(Privilege, u64),
}

struct AggregateState {
    licenses: Vec<(License, u64)>,
    privileges: Vec<(Privilege, u64)>,
    adverse_actions: Vec<(AdverseAction, u64)>,
    investigations: Vec<(Investigation, u64)>,
}

impl AggregateState {
    fn owner(&self, target: &RecordRef) -> Option<Owner> {
        match target.kind {
            RecordKind::License => self
                .licenses
                .iter()
                .find(|(license, _)| {
                    license.jurisdiction == target.jurisdiction
                        && license.license_type == target.license_type
                })
                .map(|(license, version)| Owner::License(license.clone(), *version)),
            RecordKind::Privilege => self
                .privileges
                .iter()
                .find(|(privilege, _)| {
                    privilege.jurisdiction == target.jurisdiction
                        && privilege.license_type == target.license_type
                })
                .map(|(privilege, version)| Owner::Privilege(privilege.clone(), *version)),
        }
    }

    /// Active adverse actions against one record.
    fn active_actions(&self, target: &RecordRef) -> usize {
        self.adverse_actions
            .iter()
            .filter(|(action, _)| {
                action.action_against == target.kind
                    && action.jurisdiction == target.jurisdiction
                    && action.license_type == target.license_type
                    && action.is_active()
            })
            .count()
    }

    fn backing_license_encumbered(&self, privilege: &Privilege) -> bool {
        self.licenses
            .iter()
            .any(|(license, _)| {
                license.jurisdiction == privilege.license_jurisdiction
                    && license.license_type == privilege.license_type
                    && license.encumbered_status.is_encumbered()
            })
    }
}

impl<S, P> EncumbranceService<S, P>
where
    S: ProviderStore + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        Self { store, publisher }
    }

    /// Open an investigation. At most one may be open per record.
    pub fn open_investigation(
        &self,
        target: RecordRef,
        submitting_user: &str,
        today: NaiveDate,
    ) -> Result<Investigation, DomainError> {
        let state = self.load(&target.compact, target.provider_id)?;
        let owner = state.owner(&target).ok_or_else(|| {
            DomainError::not_found(format!(
                "{} {}/{}",
                target.kind.label(),
                target.jurisdiction,
                target.license_type
            ))
        })?;

        let already_open = state.investigations.iter().any(|(investigation, _)| {
            investigation.investigation_against == target.kind
                && investigation.jurisdiction == target.jurisdiction
                && investigation.license_type == target.license_type
                && investigation.is_open()
        });
        if already_open {
            return Err(DomainError::conflict(
                "an investigation is already open against this record",
            ));
        }

        let investigation = Investigation {
            id: InvestigationId::generate(),
            compact: target.compact.clone(),
            provider_id: target.provider_id,
            investigation_against: target.kind,
            jurisdiction: target.jurisdiction.clone(),
            license_type: target.license_type.clone(),
            submitting_user: submitting_user.to_string(),
            creation_date: today,
            close_date: None,
            closing_user: None,
            resulting_encumbrance_id: None,
        };
        self.store
            .put_new(RecordBody::Investigation(investigation.clone()))?;

        match owner {
            Owner::License(mut license, version) => {
                license.investigation_status = Some(InvestigationStatus::UnderInvestigation);
                self.store.put(RecordBody::License(license), Some(version))?;
            }
            Owner::Privilege(mut privilege, version) => {
                privilege.investigation_status = Some(InvestigationStatus::UnderInvestigation);
                self.store
                    .put(RecordBody::Privilege(privilege), Some(version))?;
            }
        }

        let mut outbox = EventOutbox::new();
        outbox.record(DomainEvent::InvestigationOpened {
            kind: target.kind,
            compact: target.compact,
            provider_id: target.provider_id,
            jurisdiction: target.jurisdiction,
            license_type: target.license_type,
        });
        outbox.flush(&*self.publisher)?;

        Ok(investigation)
    }

    /// Close an investigation, optionally recording the encumbrance it
    /// resolved into.
    pub fn close_investigation(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        investigation_id: InvestigationId,
        closing_user: &str,
        payload: Option<EncumbrancePayload>,
        today: NaiveDate,
    ) -> Result<Investigation, DomainError> {
        let state = self.load(compact, provider_id)?;
        let (mut investigation, version) = state
            .investigations
            .iter()
            .find(|(investigation, _)| investigation.id == investigation_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("investigation {investigation_id}")))?;

        if !investigation.is_open() {
            return Err(DomainError::conflict("investigation is already closed"));
        }

        investigation.close_date = Some(today);
        investigation.closing_user = Some(closing_user.to_string());

        let target = RecordRef {
            compact: compact.clone(),
            provider_id,
            kind: investigation.investigation_against,
            jurisdiction: investigation.jurisdiction.clone(),
            license_type: investigation.license_type.clone(),
        };

        if let Some(payload) = payload {
            let action =
                self.record_adverse_action(&target, &payload, closing_user, today, true)?;
            investigation.resulting_encumbrance_id = Some(action.id);
        } else {
            self.clear_investigation_status(&state, &target)?;
        }

        self.store
            .put(RecordBody::Investigation(investigation.clone()), Some(version))?;

        let mut outbox = EventOutbox::new();
        outbox.record(DomainEvent::InvestigationClosed {
            kind: target.kind,
            compact: target.compact,
            provider_id,
            jurisdiction: target.jurisdiction,
            license_type: target.license_type,
            effective_date: today,
        });
        outbox.flush(&*self.publisher)?;

        Ok(investigation)
    }

    /// Record an adverse action directly, without an investigation.
    pub fn encumber(
        &self,
        target: RecordRef,
        payload: EncumbrancePayload,
        submitting_user: &str,
        today: NaiveDate,
    ) -> Result<AdverseAction, DomainError> {
        let action = self.record_adverse_action(&target, &payload, submitting_user, today, false)?;

        let mut outbox = EventOutbox::new();
        outbox.record(DomainEvent::Encumbrance {
            kind: target.kind,
            compact: target.compact,
            provider_id: target.provider_id,
            jurisdiction: target.jurisdiction,
            license_type: target.license_type,
            effective_date: payload.effective_start_date,
        });
        outbox.flush(&*self.publisher)?;

        Ok(action)
    }

    /// Lift an adverse action and recompute the owner's standing from the
    /// actions that remain.
    pub fn lift(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        adverse_action_id: AdverseActionId,
        lifting_user: &str,
        effective_lift_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<AdverseAction, DomainError> {
        let state = self.load(compact, provider_id)?;
        let (mut action, version) = state
            .adverse_actions
            .iter()
            .find(|(action, _)| action.id == adverse_action_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("adverse action {adverse_action_id}")))?;

        if !action.is_active() {
            return Err(DomainError::conflict("adverse action is already lifted"));
        }

        action.effective_lift_date = Some(effective_lift_date);
        action.lifting_user = Some(lifting_user.to_string());
        self.store
            .put(RecordBody::AdverseAction(action.clone()), Some(version))?;

        let target = RecordRef {
            compact: compact.clone(),
            provider_id,
            kind: action.action_against,
            jurisdiction: action.jurisdiction.clone(),
            license_type: action.license_type.clone(),
        };
        // Re-read so the recompute sees the lift.
        let state = self.load(compact, provider_id)?;
        self.recompute_owner(&state, &target, today, false)?;

        let mut outbox = EventOutbox::new();
        outbox.record(DomainEvent::EncumbranceLifted {
            kind: target.kind,
            compact: target.compact,
            provider_id,
            jurisdiction: target.jurisdiction,
            license_type: target.license_type,
            effective_date: effective_lift_date,
        });
        outbox.flush(&*self.publisher)?;

        info!(adverse_action = %adverse_action_id, "encumbrance lifted");
        Ok(action)
    }

    fn record_adverse_action(
        &self,
        target: &RecordRef,
        payload: &EncumbrancePayload,
        submitting_user: &str,
        today: NaiveDate,
        clear_investigation: bool,
    ) -> Result<AdverseAction, DomainError> {
        let action = AdverseAction {
            id: AdverseActionId::generate(),
            compact: target.compact.clone(),
            provider_id: target.provider_id,
            action_against: target.kind,
            jurisdiction: target.jurisdiction.clone(),
            license_type: target.license_type.clone(),
            clinical_privilege_action_category: payload.clinical_privilege_action_category.clone(),
            encumbrance_type: payload.encumbrance_type,
            effective_start_date: payload.effective_start_date,
            effective_lift_date: None,
            submitting_user: submitting_user.to_string(),
            lifting_user: None,
        };
        self.store
            .put_new(RecordBody::AdverseAction(action.clone()))?;

        // Re-read so the recompute sees the new action.
        let state = self.load(&target.compact, target.provider_id)?;
        self.recompute_owner(&state, target, today, clear_investigation)?;

        Ok(action)
    }

    /// Recompute the owner's encumbered status from its active adverse
    /// actions and pull dependent privileges along when the owner is a
    /// license. The investigation flag is cleared only when the recompute is
    /// part of an investigation closure.
    fn recompute_owner(
        &self,
        state: &AggregateState,
        target: &RecordRef,
        today: NaiveDate,
        clear_investigation: bool,
    ) -> Result<(), DomainError> {
        let owner = state.owner(target).ok_or_else(|| {
            DomainError::not_found(format!(
                "{} {}/{}",
                target.kind.label(),
                target.jurisdiction,
                target.license_type
            ))
        })?;
        let encumbered = state.active_actions(target) > 0;

        match owner {
            Owner::License(mut license, version) => {
                license.encumbered_status = if encumbered {
                    EncumberedStatus::Encumbered
                } else {
                    EncumberedStatus::Unencumbered
                };
                if clear_investigation {
                    license.investigation_status = None;
                }
                license.refresh_derived(today);
                self.store
                    .put(RecordBody::License(license.clone()), Some(version))?;

                for (privilege, privilege_version) in &state.privileges {
                    if privilege.license_jurisdiction != license.jurisdiction
                        || privilege.license_type != license.license_type
                    {
                        continue;
                    }
                    let mut next = privilege.clone();
                    next.sync_with_license(&license, today);
                    if next != *privilege {
                        self.store
                            .put(RecordBody::Privilege(next), Some(*privilege_version))?;
                    }
                }
            }
            Owner::Privilege(mut privilege, version) => {
                privilege.encumbered_status = if encumbered {
                    EncumberedStatus::Encumbered
                } else if state.backing_license_encumbered(&privilege) {
                    EncumberedStatus::LicenseEncumbered
                } else {
                    EncumberedStatus::Unencumbered
                };
                if clear_investigation {
                    privilege.investigation_status = None;
                }
                privilege.refresh_status(None, today);
                self.store
                    .put(RecordBody::Privilege(privilege), Some(version))?;
            }
        }

        Ok(())
    }

    fn clear_investigation_status(
        &self,
        state: &AggregateState,
        target: &RecordRef,
    ) -> Result<(), DomainError> {
        match state.owner(target) {
            Some(Owner::License(mut license, version)) => {
                license.investigation_status = None;
                self.store.put(RecordBody::License(license), Some(version))?;
            }
            Some(Owner::Privilege(mut privilege, version)) => {
                privilege.investigation_status = None;
                self.store
                    .put(RecordBody::Privilege(privilege), Some(version))?;
            }
            None => {}
        }
        Ok(())
    }

    fn load(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
    ) -> Result<AggregateState, DomainError> {
        let records = self.store.provider_records(compact, provider_id)?;
        let mut state = AggregateState {
            licenses: Vec::new(),
            privileges: Vec::new(),
            adverse_actions: Vec::new(),
            investigations: Vec::new(),
        };
        for record in records {
            match record.body {
                RecordBody::License(body) => state.licenses.push((body, record.version)),
                RecordBody::Privilege(body) => state.privileges.push((body, record.version)),
                RecordBody::AdverseAction(body) => {
                    state.adverse_actions.push((body, record.version))
                }
                RecordBody::Investigation(body) => {
                    state.investigations.push((body, record.version))
                }
                _ => {}
            }
        }
        Ok(state)
    }
}
