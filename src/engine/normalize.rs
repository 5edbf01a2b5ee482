//! Item reference normalization.
//!
//! Stored reference lists carry either bare ids or `{id, isLowRate}` objects.
//! Both read into the canonical [`ItemRef`] at deserialization time, so every
//! ingestion path (local blob, remote document, seed) yields the same shape.
//! Nothing is written back until the record itself is saved.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawItemRef", rename_all = "camelCase")]
pub struct ItemRef {
    pub id: String,
    pub is_low_rate: bool,
}

/// Either stored shape of an item reference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawItemRef {
    Bare(String),
    Full {
        id: String,
        #[serde(default, rename = "isLowRate")]
        is_low_rate: bool,
    },
}

impl From<RawItemRef> for ItemRef {
    fn from(raw: RawItemRef) -> Self {
        match raw {
            RawItemRef::Bare(id) => ItemRef { id, is_low_rate: false },
            RawItemRef::Full { id, is_low_rate } => ItemRef { id, is_low_rate },
        }
    }
}

impl ItemRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), is_low_rate: false }
    }

    pub fn low_rate(id: impl Into<String>) -> Self {
        Self { id: id.into(), is_low_rate: true }
    }
}

/// Normalizes one untyped reference. Anything that is neither a string nor
/// an object with a string `id` yields `None`.
pub fn normalize_value(value: &Value) -> Option<ItemRef> {
    match value {
        Value::String(id) => Some(ItemRef::new(id.clone())),
        Value::Object(map) => {
            let id = map.get("id")?.as_str()?.to_string();
            let is_low_rate = map.get("isLowRate").and_then(Value::as_bool).unwrap_or(false);
            Some(ItemRef { id, is_low_rate })
        }
        _ => None,
    }
}

/// Normalizes an untyped reference list, dropping entries with no id.
pub fn normalize_list(value: &Value) -> Vec<ItemRef> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(normalize_value).collect())
        .unwrap_or_default()
}

/// Renders a reference the way list and detail views show it.
pub fn display_ref(item_ref: &ItemRef, name: Option<&str>) -> String {
    let label = name.filter(|n| !n.is_empty()).unwrap_or(&item_ref.id);
    if item_ref.is_low_rate {
        format!("{} (low)", label)
    } else {
        label.to_string()
    }
}
