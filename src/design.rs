use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MergeError, MergeResult};

/// A popup template design document as exported by the visual editor.
///
/// The editor owns this format and adds properties freely between releases,
/// so every struct carries a flattened `extra` bag: anything we do not model
/// survives a deserialize/serialize round trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<Map<String, Value>>,
    pub body: DesignBody,
    #[serde(rename = "schemaVersion", skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Document body: rows plus optional header and footer sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub rows: Vec<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Section>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footers: Option<Vec<Section>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A row, header, or footer: a horizontal band of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub contents: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single content block (heading, button, image, custom component…).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,
    #[serde(default)]
    pub values: BlockValues,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The payload of a content block.
///
/// `text` and `html` are the primary payloads the annotator rewrites.
/// `text_json` is the rich-text editor's own state representation; it is
/// only ever read (never modified) so the editor keeps showing the original
/// merge-tag placeholder when the template is reopened.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(rename = "textJson", skip_serializing_if = "Option::is_none")]
    pub text_json: Option<Value>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<BlockMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Block metadata bag. `html_id` is a space-separated, deduplicated token
/// set of every field id injected into this block by annotation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockMeta {
    #[serde(rename = "htmlID", skip_serializing_if = "Option::is_none")]
    pub html_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DesignDocument {
    pub fn from_json(json: &str) -> MergeResult<Self> {
        serde_json::from_str(json).map_err(|e| MergeError::DesignParse(e.to_string()))
    }

    pub fn to_json(&self) -> MergeResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MergeError::DesignParse(e.to_string()))
    }

    /// All sections in traversal order: rows, then headers, then footers.
    pub(crate) fn sections(&self) -> impl Iterator<Item = &Section> {
        self.body
            .rows
            .iter()
            .chain(self.body.headers.iter().flatten())
            .chain(self.body.footers.iter().flatten())
    }

    pub(crate) fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.body
            .rows
            .iter_mut()
            .chain(self.body.headers.iter_mut().flatten())
            .chain(self.body.footers.iter_mut().flatten())
    }
}
