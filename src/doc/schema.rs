//! Serialized block data schemas and the document payload format.
//!
//! Text fields hold inline markup. Every schema is `#[serde(default)]` so a
//! partial object deserializes with defaults filled in; [`lenient`] goes one
//! step further and resets individual wrong-typed fields instead of failing
//! the whole object.

use super::{Alignment, BlockError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(String),
    #[error("payload must be an object with a `blocks` array or a bare array of blocks")]
    NotADocument,
    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u32),
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Json(err.to_string())
    }
}

/// Persisted block: `{id, type, data, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedBlock {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BlockError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub version: u32,
    pub blocks: Vec<SerializedBlock>,
}

impl Default for DocumentPayload {
    fn default() -> Self {
        Self {
            version: PAYLOAD_VERSION,
            blocks: Vec::new(),
        }
    }
}

impl DocumentPayload {
    /// Parses a payload. Accepts the `{version, blocks}` envelope or a bare
    /// block array; entries that are not objects are skipped.
    pub fn from_json(input: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(input)?;
        let (version, entries) = match value {
            Value::Array(entries) => (PAYLOAD_VERSION, entries),
            Value::Object(mut object) => {
                let version = object
                    .get("version")
                    .and_then(Value::as_u64)
                    .map_or(PAYLOAD_VERSION, |version| version as u32);
                if version > PAYLOAD_VERSION {
                    return Err(PayloadError::UnsupportedVersion(version));
                }
                match object.remove("blocks") {
                    Some(Value::Array(entries)) => (version, entries),
                    None => (version, Vec::new()),
                    Some(_) => return Err(PayloadError::NotADocument),
                }
            }
            _ => return Err(PayloadError::NotADocument),
        };
        let mut blocks = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.is_object() {
                warn!("skipping payload entry that is not an object");
                continue;
            }
            match serde_json::from_value::<SerializedBlock>(entry.clone()) {
                Ok(block) => blocks.push(block),
                Err(err) => {
                    warn!(%err, "repairing malformed block entry");
                    blocks.push(SerializedBlock {
                        id: entry.get("id").and_then(Value::as_str).map(str::to_string),
                        block_type: entry
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        data: entry.get("data").cloned().unwrap_or(Value::Null),
                        error: None,
                    });
                }
            }
        }
        Ok(Self { version, blocks })
    }

    pub fn to_json(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Deserializes `value` into `T`, keeping every field that is individually
/// valid and resetting the rest to `T::default()`. Non-objects give the
/// default.
pub fn lenient<T>(value: Option<&Value>) -> T
where
    T: DeserializeOwned + Serialize + Default,
{
    let Some(Value::Object(input)) = value else {
        return T::default();
    };
    if let Ok(parsed) = serde_json::from_value(Value::Object(input.clone())) {
        return parsed;
    }
    let mut accepted = match serde_json::to_value(T::default()) {
        Ok(Value::Object(defaults)) => defaults,
        _ => return T::default(),
    };
    for (key, field) in input {
        let mut candidate = accepted.clone();
        candidate.insert(key.clone(), field.clone());
        if serde_json::from_value::<T>(Value::Object(candidate.clone())).is_ok() {
            accepted = candidate;
        } else {
            warn!(field = %key, "resetting malformed block field to its default");
        }
    }
    serde_json::from_value(Value::Object(accepted)).unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParagraphData {
    pub content: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeadingData {
    pub content: String,
    pub level: u8,
    pub alignment: Alignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl Default for HeadingData {
    fn default() -> Self {
        Self {
            content: String::new(),
            level: 2,
            alignment: Alignment::Left,
            anchor: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListItemData {
    pub id: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    pub children: Vec<ListItemData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListData {
    pub items: Vec<ListItemData>,
    /// First number of a numbered list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteData {
    pub content: String,
    pub caption: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeData {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageData {
    pub url: String,
    pub caption: String,
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub with_border: bool,
    pub stretched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoData {
    pub url: String,
    pub caption: String,
    pub autoplay: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DividerData {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalloutData {
    pub content: String,
    pub icon: String,
    pub variant: String,
}

impl Default for CalloutData {
    fn default() -> Self {
        Self {
            content: String::new(),
            icon: "💡".to_string(),
            variant: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccordionData {
    pub title: String,
    pub body: String,
    pub open: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableCellData {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Alignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col_span: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_span: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableRowData {
    pub id: Option<String>,
    pub cells: Vec<TableCellData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableData {
    pub with_headings: bool,
    pub rows: Vec<TableRowData>,
}

impl Default for TableData {
    fn default() -> Self {
        let row = || TableRowData {
            id: None,
            cells: vec![TableCellData::default(); 3],
        };
        Self {
            with_headings: false,
            rows: vec![row(), row(), row()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkPreviewData {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateData {
    /// ISO-8601 date or date-time; formatting is left to the renderer.
    pub value: String,
    pub format: String,
}

impl Default for DateData {
    fn default() -> Self {
        Self {
            value: String::new(),
            format: "long".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_data_gets_defaults() {
        let heading: HeadingData = lenient(Some(&json!({"content": "Hi"})));
        assert_eq!(heading.content, "Hi");
        assert_eq!(heading.level, 2);
        assert_eq!(heading.alignment, Alignment::Left);
    }

    #[test]
    fn test_wrong_typed_field_reset() {
        let heading: HeadingData =
            lenient(Some(&json!({"content": "Hi", "level": "big", "alignment": "center"})));
        assert_eq!(heading.content, "Hi");
        assert_eq!(heading.level, 2);
        assert_eq!(heading.alignment, Alignment::Center);
    }

    #[test]
    fn test_non_object_gives_default() {
        let table: TableData = lenient(Some(&json!("nope")));
        assert_eq!(table.rows.len(), 3);
        let callout: CalloutData = lenient(None);
        assert_eq!(callout.variant, "info");
    }

    #[test]
    fn test_payload_envelope_and_bare_array() {
        let envelope = DocumentPayload::from_json(
            r#"{"version":1,"blocks":[{"id":"x","type":"paragraph","data":{}}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.blocks.len(), 1);
        assert_eq!(envelope.blocks[0].block_type, "paragraph");

        let bare = DocumentPayload::from_json(r#"[{"type":"divider"}, 3]"#).unwrap();
        assert_eq!(bare.blocks.len(), 1);
        assert_eq!(bare.blocks[0].id, None);
    }

    #[test]
    fn test_payload_rejects_non_documents() {
        assert!(matches!(
            DocumentPayload::from_json("not json"),
            Err(PayloadError::Json(_))
        ));
        assert_eq!(
            DocumentPayload::from_json("42"),
            Err(PayloadError::NotADocument)
        );
        assert_eq!(
            DocumentPayload::from_json(r#"{"version":9,"blocks":[]}"#),
            Err(PayloadError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_malformed_entry_repaired() {
        let payload =
            DocumentPayload::from_json(r#"[{"id": 7, "type": "heading", "error": "bad"}]"#)
                .unwrap();
        assert_eq!(payload.blocks[0].id, None);
        assert_eq!(payload.blocks[0].block_type, "heading");
        assert_eq!(payload.blocks[0].error, None);
    }
}
