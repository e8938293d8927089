//! UI element and tree data model.
//!
//! The tree is flat: elements live in a `key → element` map and a parent
//! holds only the ordered list of its children's keys. Appending a child is
//! therefore a single small patch, not a rewrite of a nested structure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A node in the flat UI tree.
///
/// `key` is the element's identity for reconciliation; it is never reused
/// for a different logical node within one session. `type` is a catalog
/// component name, opaque at the protocol level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiElement {
    pub key: String,
    pub r#type: String,
    #[serde(default)]
    pub props: serde_json::Map<String, serde_json::Value>,
    /// Ordered child keys. Authoritative for parent → child traversal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
    /// Informational back-reference; children lists stay authoritative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<ElementLayout>,
    /// Visibility condition, evaluated by an external collaborator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<ElementMeta>,
}

impl UiElement {
    pub fn new(key: impl Into<String>, r#type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            r#type: r#type.into(),
            props: serde_json::Map::new(),
            children: None,
            parent_key: None,
            layout: None,
            visible: None,
            locked: None,
            meta: None,
        }
    }
}

/// Sizing and grid-placement hints. Not touched by reconciliation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementLayout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridPlacement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeConstraints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resizable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPlacement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_span: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_span: Option<u32>,
}

/// A CSS-ish dimension: numeric pixels or a string like `"50%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Pixels(f64),
    Css(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_width: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_height: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<Dimension>,
}

/// Provenance metadata stamped by the sender. Opaque to reconciliation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_turn_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_turn_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

/// The flat tree: a root key plus the key → element map.
///
/// Owned by the external renderer; this crate only describes its shape so
/// patches can be validated against it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiTree {
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub elements: HashMap<String, UiElement>,
}
