//! Pure tracked-field diffing between a stored license and an incoming
//! upload, and the classification of the resulting change. No I/O; the
//! ingest service turns the result into history records and events.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::{FieldChanges, License, LicenseStatus, UpdateType};

/// Keys the diff ignores: record identity and the fields derived or owned by
/// the encumbrance state machine rather than uploaded by the board.
const UNTRACKED_FIELDS: [&str; 8] = [
    "compact",
    "providerId",
    "jurisdiction",
    "licenseType",
    "status",
    "compactEligibility",
    "encumberedStatus",
    "investigationStatus",
];

const RENEWAL_FIELDS: [&str; 2] = ["dateOfRenewal", "dateOfExpiration"];

/// Outcome of comparing every tracked field between the stored license and
/// an incoming one with the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseDiff {
    pub update_type: UpdateType,
    pub changes: FieldChanges,
    /// Full prior snapshot for the history record.
    pub previous: Value,
}

/// Compare the incoming license against the stored one. `None` means nothing
/// tracked changed and the ingest is a no-op: no write, no history, no event.
pub fn diff_license(stored: &License, incoming: &License) -> Option<LicenseDiff> {
    let stored_fields = tracked_fields(stored);
    let incoming_fields = tracked_fields(incoming);

    let mut updated_values = BTreeMap::new();
    for (field, value) in &incoming_fields {
        if stored_fields.get(field) != Some(value) {
            updated_values.insert(field.clone(), value.clone());
        }
    }

    let removed_values: Vec<String> = stored_fields
        .keys()
        .filter(|field| !incoming_fields.contains_key(*field))
        .cloned()
        .collect();

    if updated_values.is_empty() && removed_values.is_empty() {
        return None;
    }

    let changes = FieldChanges {
        updated_values,
        removed_values,
    };
    let update_type = classify(stored, incoming, &changes);
    let previous = serde_json::to_value(stored).unwrap_or(Value::Null);

    Some(LicenseDiff {
        update_type,
        changes,
        previous,
    })
}

fn classify(stored: &License, incoming: &License, changes: &FieldChanges) -> UpdateType {
    let changed_fields: Vec<&str> = changes
        .updated_values
        .keys()
        .map(String::as_str)
        .chain(changes.removed_values.iter().map(String::as_str))
        .collect();

    let renewal_shaped = changed_fields
        .iter()
        .all(|field| RENEWAL_FIELDS.contains(field))
        && incoming.date_of_expiration >= stored.date_of_expiration;
    if renewal_shaped {
        return UpdateType::Renewal;
    }

    let deactivation_shaped = changed_fields == ["jurisdictionUploadedLicenseStatus"]
        && stored.jurisdiction_uploaded_license_status == LicenseStatus::Active
        && incoming.jurisdiction_uploaded_license_status == LicenseStatus::Inactive;
    if deactivation_shaped {
        return UpdateType::Deactivation;
    }

    UpdateType::Other
}

/// Field-level delta between two serializable record states, used for the
/// history entries of cascaded privilege and provider mutations.
pub fn record_changes<T: serde::Serialize>(previous: &T, next: &T) -> FieldChanges {
    let previous = serde_json::to_value(previous).unwrap_or(Value::Null);
    let next = serde_json::to_value(next).unwrap_or(Value::Null);

    let (Value::Object(previous), Value::Object(next)) = (previous, next) else {
        return FieldChanges::default();
    };

    let mut updated_values = BTreeMap::new();
    for (field, value) in &next {
        if previous.get(field) != Some(value) {
            updated_values.insert(field.clone(), value.clone());
        }
    }
    let removed_values = previous
        .keys()
        .filter(|field| !next.contains_key(*field))
        .cloned()
        .collect();

    FieldChanges {
        updated_values,
        removed_values,
    }
}

fn tracked_fields(license: &License) -> BTreeMap<String, Value> {
    let serialized = serde_json::to_value(license).unwrap_or(Value::Null);
    match serialized {
        Value::Object(map) => map
            .into_iter()
            .filter(|(field, _)| !UNTRACKED_FIELDS.contains(&field.as_str()))
            .collect(),
        _ => BTreeMap::new(),
    }
}
