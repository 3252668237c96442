//! Domain events and the queue/bus seams between pipeline stages and
//! downstream consumers. Mutations compute their event list purely; the
//! outbox publishes once per transition after the state writes land.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::info;

use crate::domain::{Compact, Jurisdiction, LicenseType, ProviderId, RecordKind};

/// Everything downstream consumers (search indexer, notification service)
/// are told about. One event per state transition, never one per field
/// change.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Deactivation {
        kind: RecordKind,
        compact: Compact,
        provider_id: ProviderId,
        jurisdiction: Jurisdiction,
        license_type: LicenseType,
    },
    Encumbrance {
        kind: RecordKind,
        compact: Compact,
        provider_id: ProviderId,
        jurisdiction: Jurisdiction,
        license_type: LicenseType,
        effective_date: NaiveDate,
    },
    EncumbranceLifted {
        kind: RecordKind,
        compact: Compact,
        provider_id: ProviderId,
        jurisdiction: Jurisdiction,
        license_type: LicenseType,
        effective_date: NaiveDate,
    },
    InvestigationOpened {
        kind: RecordKind,
        compact: Compact,
        provider_id: ProviderId,
        jurisdiction: Jurisdiction,
        license_type: LicenseType,
    },
    InvestigationClosed {
        kind: RecordKind,
        compact: Compact,
        provider_id: ProviderId,
        jurisdiction: Jurisdiction,
        license_type: LicenseType,
        effective_date: NaiveDate,
    },
    HomeJurisdictionChange {
        compact: Compact,
        provider_id: ProviderId,
        previous: Option<String>,
        next: String,
    },
}

impl DomainEvent {
    pub fn detail_type(&self) -> &'static str {
        match self {
            Self::Deactivation { kind, .. } => match kind {
                RecordKind::License => "license.deactivation",
                RecordKind::Privilege => "privilege.deactivation",
            },
            Self::Encumbrance { kind, .. } => match kind {
                RecordKind::License => "license.encumbrance",
                RecordKind::Privilege => "privilege.encumbrance",
            },
            Self::EncumbranceLifted { kind, .. } => match kind {
                RecordKind::License => "license.encumbranceLifted",
                RecordKind::Privilege => "privilege.encumbranceLifted",
            },
            Self::InvestigationOpened { kind, .. } => match kind {
                RecordKind::License => "license.investigation",
                RecordKind::Privilege => "privilege.investigation",
            },
            Self::InvestigationClosed { kind, .. } => match kind {
                RecordKind::License => "license.investigationClosed",
                RecordKind::Privilege => "privilege.investigationClosed",
            },
            Self::HomeJurisdictionChange { .. } => "home_jurisdiction_change",
        }
    }

    pub fn detail(&self) -> Value {
        match self {
            Self::Deactivation {
                compact,
                provider_id,
                jurisdiction,
                license_type,
                ..
            }
            | Self::InvestigationOpened {
                compact,
                provider_id,
                jurisdiction,
                license_type,
                ..
            } => json!({
                "compact": compact.0,
                "providerId": provider_id.to_string(),
                "jurisdiction": jurisdiction.0,
                "licenseType": license_type.0,
            }),
            Self::Encumbrance {
                compact,
                provider_id,
                jurisdiction,
                license_type,
                effective_date,
                ..
            }
            | Self::EncumbranceLifted {
                compact,
                provider_id,
                jurisdiction,
                license_type,
                effective_date,
                ..
            }
            | Self::InvestigationClosed {
                compact,
                provider_id,
                jurisdiction,
                license_type,
                effective_date,
                ..
            } => json!({
                "compact": compact.0,
                "providerId": provider_id.to_string(),
                "jurisdiction": jurisdiction.0,
                "licenseType": license_type.0,
                "effectiveDate": effective_date.to_string(),
            }),
            Self::HomeJurisdictionChange {
                compact,
                provider_id,
                previous,
                next,
            } => json!({
                "compact": compact.0,
                "providerId": provider_id.to_string(),
                "previousHomeJurisdiction": previous,
                "currentHomeJurisdiction": next,
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event bus unavailable: {0}")]
    Publish(String),
}

/// Publish-only, fire-and-forget event bus seam.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &DomainEvent) -> Result<(), EventError>;
}

/// Batches the events produced by one mutation and flushes them after the
/// state writes land, so downstream consumers see exactly one event per
/// transition.
#[derive(Debug, Default)]
pub struct EventOutbox {
    pending: Vec<DomainEvent>,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: DomainEvent) {
        self.pending.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = DomainEvent>) {
        self.pending.extend(events);
    }

    /// Publish every batched event, failing the triggering operation on the
    /// first publish error.
    pub fn flush(self, publisher: &dyn EventPublisher) -> Result<(), EventError> {
        for event in &self.pending {
            publisher.publish(event)?;
        }
        Ok(())
    }

    /// Publish on a best-effort basis: failures are logged and swallowed.
    pub fn flush_best_effort(self, publisher: &dyn EventPublisher) {
        for event in &self.pending {
            if let Err(err) = publisher.publish(event) {
                info!(detail_type = event.detail_type(), %err, "event publish failed");
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Send(String),
}

/// Per-message failure identifier reported by partial-batch consumers so one
/// bad record never blocks the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemFailure {
    pub item_id: String,
    pub reason: String,
}

/// At-least-once hand-off between preprocessing and ingestion. One JSON
/// message body per license record.
pub trait IngestQueue: Send + Sync {
    fn send(&self, body: Value) -> Result<(), QueueError>;

    /// Pull up to `max` messages for a consumer poll. Delivery is
    /// at-least-once; consumers must tolerate redelivery.
    fn receive(&self, max: usize) -> Result<Vec<Value>, QueueError>;
}

/// In-memory queue backing tests and the in-process synchronous upload path.
#[derive(Default)]
pub struct MemoryQueue {
    messages: Mutex<VecDeque<Value>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Value> {
        let mut guard = self.messages.lock().expect("queue mutex poisoned");
        guard.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().expect("queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IngestQueue for MemoryQueue {
    fn send(&self, body: Value) -> Result<(), QueueError> {
        let mut guard = self.messages.lock().expect("queue mutex poisoned");
        guard.push_back(body);
        Ok(())
    }

    fn receive(&self, max: usize) -> Result<Vec<Value>, QueueError> {
        let mut guard = self.messages.lock().expect("queue mutex poisoned");
        let take = max.min(guard.len());
        Ok(guard.drain(..take).collect())
    }
}

/// Recording publisher for tests and the offline demo.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .expect("event mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}
