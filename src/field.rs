use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named content slot in a template, as served by the template-field
/// registry. Read-only to both the annotator and the merger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub field_id: String,
    #[serde(default)]
    pub default_field_value: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-shopper field values, keyed by `field_id`.
///
/// An ordered map keeps `merge_text` a deterministic function of its
/// inputs: the same mapping always applies fields in the same order.
pub type ContentMapping = BTreeMap<String, String>;

/// O(1) lookup table over field definitions.
pub(crate) fn field_lookup(fields: &[FieldDefinition]) -> HashMap<&str, &FieldDefinition> {
    fields.iter().map(|f| (f.field_id.as_str(), f)).collect()
}
