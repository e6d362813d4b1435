//! Field mapping from normalized records to CRM payloads.
//!
//! Pure transformations: no I/O, deterministic apart from the
//! `last_sync_at` stamp taken at mapping time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crmlink_connector::error::{ConnectorError, ConnectorResult};
use crmlink_connector::record::{CrmEntityPayload, NormalizedRecord};
use crmlink_connector::types::{EntityKind, SyncSource};

/// Target CRM fields a custom mapping may write to.
pub const CRM_CONTACT_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "phone",
    "title",
    "company_id",
    "address",
    "city",
    "country",
    "gender",
];

/// A source-field → target-field mapping pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    pub source_field: String,
    pub target_field: String,
}

impl MappingRule {
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
        }
    }
}

/// Result of validating a set of mapping rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Lightweight projection of a record for sync previews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRecord {
    pub external_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Split a display name at the first whitespace boundary.
///
/// First token becomes the first name, the remainder the last name; a
/// name without whitespace yields an empty last name.
pub fn split_display_name(display_name: &str) -> (String, String) {
    match display_name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim_start().to_string()),
        None => (display_name.to_string(), String::new()),
    }
}

fn copy_field(
    record: &NormalizedRecord,
    fields: &mut BTreeMap<String, Value>,
    source: &str,
    target: &str,
) {
    if let Some(value) = record.fields.get(source) {
        fields.insert(target.to_string(), value.clone());
    }
}

/// Map a normalized record into a CRM contact payload.
///
/// Fails with a mapping error when the record has no display name.
pub fn map_contact(
    source: SyncSource,
    record: &NormalizedRecord,
) -> ConnectorResult<CrmEntityPayload> {
    let display_name = record
        .get_str("display_name")
        .ok_or_else(|| ConnectorError::mapping("display_name", "missing required field"))?;

    let (first_name, last_name) = split_display_name(display_name);

    let mut fields = BTreeMap::new();
    fields.insert("first_name".to_string(), Value::from(first_name));
    fields.insert("last_name".to_string(), Value::from(last_name));
    copy_field(record, &mut fields, "email", "email");
    copy_field(record, &mut fields, "phone", "phone");
    copy_field(record, &mut fields, "address", "address");
    copy_field(record, &mut fields, "city", "city");
    copy_field(record, &mut fields, "country", "country");

    Ok(CrmEntityPayload {
        kind: EntityKind::Contact,
        source,
        external_id: record.source_id.clone(),
        last_sync_at: Utc::now(),
        fields,
        raw: record.clone(),
    })
}

/// Map a normalized record into a CRM company payload.
pub fn map_company(
    source: SyncSource,
    record: &NormalizedRecord,
) -> ConnectorResult<CrmEntityPayload> {
    let name = record
        .get_str("display_name")
        .ok_or_else(|| ConnectorError::mapping("display_name", "missing required field"))?;

    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), Value::from(name));
    copy_field(record, &mut fields, "email", "email");
    copy_field(record, &mut fields, "phone", "phone");
    copy_field(record, &mut fields, "address", "address");
    copy_field(record, &mut fields, "city", "city");
    copy_field(record, &mut fields, "country", "country");
    copy_field(record, &mut fields, "vat_number", "vat_number");

    Ok(CrmEntityPayload {
        kind: EntityKind::Company,
        source,
        external_id: record.source_id.clone(),
        last_sync_at: Utc::now(),
        fields,
        raw: record.clone(),
    })
}

/// Map a record for the entity kind, dispatching to the shape-specific
/// mapper.
pub fn map_record(
    source: SyncSource,
    kind: EntityKind,
    record: &NormalizedRecord,
) -> ConnectorResult<CrmEntityPayload> {
    match kind {
        EntityKind::Company => map_company(source, record),
        // Contacts are the default shape for the remaining kinds; their
        // raw fields stay available on the payload.
        _ => map_contact(source, record),
    }
}

/// Project a record into the preview shape. No storage interaction.
pub fn preview_row(record: &NormalizedRecord) -> PreviewRecord {
    PreviewRecord {
        external_id: record.source_id.clone(),
        name: record.get_str("display_name").map(str::to_string),
        email: record.get_str("email").map(str::to_string),
        phone: record.get_str("phone").map(str::to_string),
        last_modified: record.last_modified,
    }
}

/// Validate custom mapping rules against the CRM field allow-list.
///
/// A structurally malformed rule (empty source or target) invalidates the
/// mapping; an unknown target field only produces a warning.
pub fn validate_mapping(rules: &[MappingRule]) -> MappingValidation {
    let mut validation = MappingValidation {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    for rule in rules {
        if rule.source_field.trim().is_empty() || rule.target_field.trim().is_empty() {
            validation.valid = false;
            validation.errors.push(format!(
                "malformed rule: source '{}' and target '{}' must both be set",
                rule.source_field, rule.target_field
            ));
            continue;
        }
        if !CRM_CONTACT_FIELDS.contains(&rule.target_field.as_str()) {
            validation.warnings.push(format!(
                "target field '{}' not in standard CRM fields",
                rule.target_field
            ));
        }
    }

    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(display_name: &str) -> NormalizedRecord {
        NormalizedRecord::new("ext-1")
            .with_field("display_name", json!(display_name))
            .with_field("email", json!("jane@example.test"))
            .with_field("phone", json!("+1 555 0100"))
            .with_field("city", json!("Milan"))
    }

    #[test]
    fn splits_name_at_first_whitespace() {
        assert_eq!(
            split_display_name("Jane Doe"),
            ("Jane".to_string(), "Doe".to_string())
        );
        assert_eq!(
            split_display_name("Anna Maria Rossi"),
            ("Anna".to_string(), "Maria Rossi".to_string())
        );
    }

    #[test]
    fn single_token_name_has_empty_last_name() {
        assert_eq!(
            split_display_name("Prince"),
            ("Prince".to_string(), String::new())
        );
    }

    #[test]
    fn contact_mapping_copies_fields_verbatim() {
        let payload = map_contact(SyncSource::DynamicsBc, &record("Jane Doe")).unwrap();
        assert_eq!(payload.kind, EntityKind::Contact);
        assert_eq!(payload.external_id, "ext-1");
        assert_eq!(payload.get_str("first_name"), Some("Jane"));
        assert_eq!(payload.get_str("last_name"), Some("Doe"));
        assert_eq!(payload.get_str("email"), Some("jane@example.test"));
        assert_eq!(payload.get_str("city"), Some("Milan"));
    }

    #[test]
    fn last_sync_at_is_mapping_time_not_remote_time() {
        let remote_time = "2020-01-01T00:00:00Z".parse().unwrap();
        let record = record("Jane Doe").with_last_modified(remote_time);
        let payload = map_contact(SyncSource::DynamicsBc, &record).unwrap();
        assert!(payload.last_sync_at > remote_time);
        assert_eq!(payload.raw.last_modified, Some(remote_time));
    }

    #[test]
    fn missing_display_name_is_mapping_error() {
        let record = NormalizedRecord::new("ext-2").with_field("email", json!("a@b.test"));
        let err = map_contact(SyncSource::DynamicsBc, &record).unwrap_err();
        assert!(matches!(err, ConnectorError::Mapping { .. }));
    }

    #[test]
    fn company_mapping_uses_name_field() {
        let record = NormalizedRecord::new("v-1")
            .with_field("display_name", json!("Acme Corp"))
            .with_field("vat_number", json!("IT0042"));
        let payload = map_company(SyncSource::DynamicsBc, &record).unwrap();
        assert_eq!(payload.kind, EntityKind::Company);
        assert_eq!(payload.get_str("name"), Some("Acme Corp"));
        assert_eq!(payload.get_str("vat_number"), Some("IT0042"));
    }

    #[test]
    fn malformed_rule_invalidates_mapping() {
        let validation = validate_mapping(&[MappingRule::new("", "email")]);
        assert!(!validation.valid);
        assert_eq!(validation.errors.len(), 1);
    }

    #[test]
    fn unknown_target_is_warning_only() {
        let validation = validate_mapping(&[
            MappingRule::new("customField1", "shoe_size"),
            MappingRule::new("email", "email"),
        ]);
        assert!(validation.valid);
        assert!(validation.errors.is_empty());
        assert_eq!(validation.warnings.len(), 1);
        assert!(validation.warnings[0].contains("shoe_size"));
    }

    #[test]
    fn preview_row_projects_record() {
        let remote_time = "2024-03-01T10:00:00Z".parse().unwrap();
        let record = record("Jane Doe").with_last_modified(remote_time);
        let row = preview_row(&record);
        assert_eq!(row.external_id, "ext-1");
        assert_eq!(row.name.as_deref(), Some("Jane Doe"));
        assert_eq!(row.last_modified, Some(remote_time));
    }
}
