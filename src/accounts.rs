//! Provider account operations: registration, military-affiliation uploads,
//! the two-step email change, and the guarded SSN read path.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{IdentityProvider, NotificationTemplate, Notifier};
use crate::domain::{
    Compact, MilitaryAffiliation, MilitaryAffiliationStatus, MilitaryAffiliationType, Provider,
    ProviderId,
};
use crate::error::DomainError;
use crate::ratelimit::{SsnAccessCheck, SsnAccessMonitor};
use crate::store::keys::RecordKey;
use crate::store::{ProviderStore, RecordBody, SsnIndex};

pub struct AccountService<S, X, N, I> {
    store: Arc<S>,
    ssn_index: Arc<X>,
    notifier: Arc<N>,
    identity: Arc<I>,
    monitor: Arc<SsnAccessMonitor>,
}

impl<S, X, N, I> AccountService<S, X, N, I>
where
    S: ProviderStore + 'static,
    X: SsnIndex + 'static,
    N: Notifier + 'static,
    I: IdentityProvider + 'static,
{
    pub fn new(
        store: Arc<S>,
        ssn_index: Arc<X>,
        notifier: Arc<N>,
        identity: Arc<I>,
        monitor: Arc<SsnAccessMonitor>,
    ) -> Self {
        Self {
            store,
            ssn_index,
            notifier,
            identity,
            monitor,
        }
    }

    /// Bind an identity to the provider and record the registration.
    pub fn register(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        email: &str,
    ) -> Result<(), DomainError> {
        validate_email(email)?;
        let (mut provider, version) = self.load_provider(compact, provider_id)?;
        if provider.is_registered {
            return Err(DomainError::conflict("provider is already registered"));
        }

        let sub = self.identity.create_identity(compact, provider_id, email)?;
        provider.is_registered = true;
        provider.identity_sub = Some(sub);
        provider.registered_email = Some(email.to_string());
        self.store
            .put(RecordBody::Provider(provider), Some(version))?;

        info!(%compact, %provider_id, "provider registered");
        Ok(())
    }

    /// Store a new military-status document set. Exactly one record per
    /// provider may be active; the previous active record goes inactive.
    pub fn upload_military_affiliation(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        affiliation_type: MilitaryAffiliationType,
        document_keys: Vec<String>,
        today: NaiveDate,
    ) -> Result<MilitaryAffiliation, DomainError> {
        if document_keys.is_empty() {
            return Err(DomainError::validation(
                Some("documentKeys".to_string()),
                "at least one document is required",
            ));
        }
        let (mut provider, version) = self.load_provider(compact, provider_id)?;

        for record in self.store.provider_records(compact, provider_id)? {
            if let RecordBody::MilitaryAffiliation(mut affiliation) = record.body {
                if affiliation.status == MilitaryAffiliationStatus::Active {
                    affiliation.status = MilitaryAffiliationStatus::Inactive;
                    self.store.put(
                        RecordBody::MilitaryAffiliation(affiliation),
                        Some(record.version),
                    )?;
                }
            }
        }

        let affiliation = MilitaryAffiliation {
            compact: compact.clone(),
            provider_id,
            affiliation_type,
            document_keys,
            date_of_upload: today,
            status: MilitaryAffiliationStatus::Active,
        };
        // Same-day re-upload replaces the record rather than duplicating it.
        self.store
            .put(RecordBody::MilitaryAffiliation(affiliation.clone()), None)?;

        provider.military_affiliation_status = Some(MilitaryAffiliationStatus::Active);
        self.store
            .put(RecordBody::Provider(provider), Some(version))?;

        Ok(affiliation)
    }

    /// Start the email change: store the pending address and send the
    /// verification code to it.
    pub fn request_email_change(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        new_email: &str,
    ) -> Result<(), DomainError> {
        validate_email(new_email)?;
        let (mut provider, version) = self.load_provider(compact, provider_id)?;
        if provider.registered_email.is_none() {
            return Err(DomainError::validation(
                None,
                "provider has no registered account",
            ));
        }

        let code = verification_code();
        provider.pending_email = Some(new_email.to_string());
        provider.pending_email_verification_code = Some(code.clone());
        self.store
            .put(RecordBody::Provider(provider), Some(version))?;

        let mut params = BTreeMap::new();
        params.insert("verificationCode".to_string(), code);
        self.notifier.send_templated(
            NotificationTemplate::EmailChangeVerification,
            new_email,
            params,
        )?;
        Ok(())
    }

    /// Complete the email change with the code delivered to the new address.
    pub fn confirm_email_change(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        code: &str,
    ) -> Result<(), DomainError> {
        let (mut provider, version) = self.load_provider(compact, provider_id)?;

        let expected = provider.pending_email_verification_code.as_deref();
        if expected.is_none() || expected != Some(code) {
            return Err(DomainError::validation(
                Some("verificationCode".to_string()),
                "verification code does not match",
            ));
        }

        let previous = provider.registered_email.take();
        provider.registered_email = provider.pending_email.take();
        provider.pending_email_verification_code = None;
        self.store
            .put(RecordBody::Provider(provider), Some(version))?;

        // Security notice to the old address is best-effort.
        if let Some(previous) = previous {
            if let Err(err) = self.notifier.send_templated(
                NotificationTemplate::AccountRecoveryConfirmation,
                &previous,
                BTreeMap::new(),
            ) {
                warn!(%err, "email change notice to previous address failed");
            }
        }
        Ok(())
    }

    /// Read the full SSN for staff with the right scope, under the
    /// escalating access monitor.
    pub fn read_ssn(
        &self,
        actor: &str,
        compact: &Compact,
        provider_id: ProviderId,
        now: DateTime<Utc>,
    ) -> Result<String, DomainError> {
        match self.monitor.check(actor, now) {
            SsnAccessCheck::Permit => self
                .ssn_index
                .ssn_for_provider(compact, provider_id)?
                .ok_or_else(|| DomainError::not_found(format!("ssn for provider {provider_id}"))),
            SsnAccessCheck::Throttle => Err(DomainError::RateLimited {
                actor: actor.to_string(),
            }),
            SsnAccessCheck::DisableActor => {
                warn!(%actor, "disabling actor after repeated ssn reads");
                self.identity.disable_identity(actor)?;
                Err(DomainError::IdentityDisabled {
                    actor: actor.to_string(),
                })
            }
            SsnAccessCheck::EndpointDisabled => Err(DomainError::EndpointDisabled),
        }
    }

    fn load_provider(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
    ) -> Result<(Provider, u64), DomainError> {
        let key = RecordKey::provider(compact, provider_id);
        match self.store.get(&key)? {
            Some(record) => match record.body {
                RecordBody::Provider(provider) => Ok((provider, record.version)),
                _ => Err(DomainError::not_found(format!("provider {provider_id}"))),
            },
            None => Err(DomainError::not_found(format!("provider {provider_id}"))),
        }
    }
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let well_formed = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    });
    if well_formed {
        Ok(())
    } else {
        Err(DomainError::validation(
            Some("email".to_string()),
            "email address is malformed",
        ))
    }
}

fn verification_code() -> String {
    let digest = Uuid::new_v4().simple().to_string();
    digest[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MemoryIdentityProvider, MemoryNotifier};
    use crate::fixtures;
    use crate::store::keys::ssn_digest;
    use crate::store::memory::{MemoryStore, MemorySsnIndex};
    use crate::store::SsnRecord;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    struct Harness {
        service: AccountService<MemoryStore, MemorySsnIndex, MemoryNotifier, MemoryIdentityProvider>,
        store: Arc<MemoryStore>,
        notifier: Arc<MemoryNotifier>,
        identity: Arc<MemoryIdentityProvider>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let ssn_index = Arc::new(MemorySsnIndex::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let identity = Arc::new(MemoryIdentityProvider::new());
        let monitor = Arc::new(SsnAccessMonitor::new(Duration::hours(24), 5, 3));

        store
            .put_new(RecordBody::Provider(fixtures::provider()))
            .expect("seed provider");
        ssn_index
            .claim(SsnRecord {
                digest: ssn_digest(&fixtures::compact(), "123-12-1234"),
                compact: fixtures::compact(),
                provider_id: fixtures::provider_id(),
                ssn: "123-12-1234".to_string(),
            })
            .expect("seed ssn");

        Harness {
            service: AccountService::new(
                store.clone(),
                ssn_index,
                notifier.clone(),
                identity.clone(),
                monitor,
            ),
            store,
            notifier,
            identity,
        }
    }

    fn stored_provider(store: &MemoryStore) -> Provider {
        let key = RecordKey::provider(&fixtures::compact(), fixtures::provider_id());
        match store.get(&key).expect("query").expect("present").body {
            RecordBody::Provider(provider) => provider,
            other => panic!("expected provider, got {other:?}"),
        }
    }

    #[test]
    fn registration_binds_an_identity() {
        let harness = harness();
        harness
            .service
            .register(&fixtures::compact(), fixtures::provider_id(), "pat@example.org")
            .expect("register");

        let provider = stored_provider(&harness.store);
        assert!(provider.is_registered);
        let sub = provider.identity_sub.expect("sub recorded");
        assert_eq!(harness.identity.is_enabled(&sub), Some(true));

        match harness.service.register(
            &fixtures::compact(),
            fixtures::provider_id(),
            "pat@example.org",
        ) {
            Err(DomainError::Conflict(_)) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn a_new_military_upload_retires_the_previous_active_record() {
        let harness = harness();
        harness
            .service
            .upload_military_affiliation(
                &fixtures::compact(),
                fixtures::provider_id(),
                MilitaryAffiliationType::MilitaryMember,
                vec!["docs/dd214.pdf".to_string()],
                today(),
            )
            .expect("first upload");
        harness
            .service
            .upload_military_affiliation(
                &fixtures::compact(),
                fixtures::provider_id(),
                MilitaryAffiliationType::MilitaryMemberSpouse,
                vec!["docs/spouse-orders.pdf".to_string()],
                NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date"),
            )
            .expect("second upload");

        let mut statuses = Vec::new();
        for record in harness
            .store
            .provider_records(&fixtures::compact(), fixtures::provider_id())
            .expect("query")
        {
            if let RecordBody::MilitaryAffiliation(affiliation) = record.body {
                statuses.push(affiliation.status);
            }
        }
        let active = statuses
            .iter()
            .filter(|status| **status == MilitaryAffiliationStatus::Active)
            .count();
        assert_eq!(statuses.len(), 2);
        assert_eq!(active, 1);
    }

    #[test]
    fn email_change_requires_the_matching_code() {
        let harness = harness();
        harness
            .service
            .register(&fixtures::compact(), fixtures::provider_id(), "pat@example.org")
            .expect("register");
        harness
            .service
            .request_email_change(
                &fixtures::compact(),
                fixtures::provider_id(),
                "new@example.org",
            )
            .expect("request");

        let sent = harness.notifier.sent();
        assert_eq!(sent[0].template, NotificationTemplate::EmailChangeVerification);
        assert_eq!(sent[0].to, "new@example.org");
        let code = sent[0].params["verificationCode"].clone();

        match harness.service.confirm_email_change(
            &fixtures::compact(),
            fixtures::provider_id(),
            "wrong-code",
        ) {
            Err(DomainError::Validation { .. }) => {}
            other => panic!("expected validation error, got {other:?}"),
        }

        harness
            .service
            .confirm_email_change(&fixtures::compact(), fixtures::provider_id(), &code)
            .expect("confirm");

        let provider = stored_provider(&harness.store);
        assert_eq!(provider.registered_email.as_deref(), Some("new@example.org"));
        assert!(provider.pending_email.is_none());
        assert!(provider.pending_email_verification_code.is_none());
    }

    #[test]
    fn ssn_reads_escalate_from_throttle_to_identity_disable() {
        let harness = harness();
        for _ in 0..5 {
            let ssn = harness
                .service
                .read_ssn("staff-1", &fixtures::compact(), fixtures::provider_id(), now())
                .expect("permitted read");
            assert_eq!(ssn, "123-12-1234");
        }

        match harness.service.read_ssn(
            "staff-1",
            &fixtures::compact(),
            fixtures::provider_id(),
            now(),
        ) {
            Err(DomainError::RateLimited { .. }) => {}
            other => panic!("expected throttle, got {other:?}"),
        }

        match harness.service.read_ssn(
            "staff-1",
            &fixtures::compact(),
            fixtures::provider_id(),
            now(),
        ) {
            Err(DomainError::IdentityDisabled { .. }) => {}
            other => panic!("expected identity disable, got {other:?}"),
        }
        assert_eq!(harness.identity.is_enabled("staff-1"), Some(false));
    }
}
