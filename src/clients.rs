//! Narrow interfaces over external collaborators: the templated notification
//! service and the identity provider. The core never sees more capability
//! than it needs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::domain::{Compact, ProviderId};

/// Fixed set of templated notifications the core can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    EmailChangeVerification,
    AccountRecoveryConfirmation,
}

impl NotificationTemplate {
    pub const fn name(self) -> &'static str {
        match self {
            Self::EmailChangeVerification => "email_change_verification",
            Self::AccountRecoveryConfirmation => "account_recovery_confirmation",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// "Send templated notification to address X with parameters Y."
pub trait Notifier: Send + Sync {
    fn send_templated(
        &self,
        template: NotificationTemplate,
        to: &str,
        params: BTreeMap<String, String>,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("identity not found")]
    NotFound,
}

/// Create an identity bound to (compact, provider) and disable it again.
pub trait IdentityProvider: Send + Sync {
    fn create_identity(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        email: &str,
    ) -> Result<String, IdentityError>;

    fn disable_identity(&self, sub: &str) -> Result<(), IdentityError>;

    fn find_by_email(&self, email: &str) -> Result<Option<String>, IdentityError>;
}

/// Recorded notification request, exposed by the in-memory notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub template: NotificationTemplate,
    pub to: String,
    pub params: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn send_templated(
        &self,
        template: NotificationTemplate,
        to: &str,
        params: BTreeMap<String, String>,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(SentNotification {
                template,
                to: to.to_string(),
                params,
            });
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct IdentityRecord {
    email: String,
    enabled: bool,
}

/// In-memory identity provider tracking create/disable calls.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    identities: Mutex<HashMap<String, IdentityRecord>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, sub: &str) -> Option<bool> {
        let guard = self.identities.lock().expect("identity mutex poisoned");
        guard.get(sub).map(|record| record.enabled)
    }

    pub fn disabled_subs(&self) -> Vec<String> {
        let guard = self.identities.lock().expect("identity mutex poisoned");
        guard
            .iter()
            .filter(|(_, record)| !record.enabled)
            .map(|(sub, _)| sub.clone())
            .collect()
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn create_identity(
        &self,
        compact: &Compact,
        provider_id: ProviderId,
        email: &str,
    ) -> Result<String, IdentityError> {
        let sub = format!("{compact}#{provider_id}");
        let mut guard = self.identities.lock().expect("identity mutex poisoned");
        guard.insert(
            sub.clone(),
            IdentityRecord {
                email: email.to_string(),
                enabled: true,
            },
        );
        Ok(sub)
    }

    fn disable_identity(&self, sub: &str) -> Result<(), IdentityError> {
        let mut guard = self.identities.lock().expect("identity mutex poisoned");
        match guard.get_mut(sub) {
            Some(record) => {
                record.enabled = false;
                Ok(())
            }
            None => {
                // Unknown actors are still tracked so a staff account from a
                // different pool can be barred from further reads.
                guard.insert(
                    sub.to_string(),
                    IdentityRecord {
                        email: String::new(),
                        enabled: false,
                    },
                );
                Ok(())
            }
        }
    }

    fn find_by_email(&self, email: &str) -> Result<Option<String>, IdentityError> {
        let guard = self.identities.lock().expect("identity mutex poisoned");
        Ok(guard
            .iter()
            .find(|(_, record)| record.email == email)
            .map(|(sub, _)| sub.clone()))
    }
}
