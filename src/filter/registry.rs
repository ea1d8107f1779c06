//! Type Registry - Filterable fields per data-source kind
//!
//! Kind definitions are loaded from JSON files embedded at compile time and
//! cached in a process-wide registry. Nothing mutates the registry after it
//! is built, so it is read without locking.

use super::error::FilterError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Embedded kind JSON files (compiled into the binary)
const KIND_FILES: &[&str] = &[
    include_str!("../resources/compute.json"),
    include_str!("../resources/networking.json"),
    include_str!("../resources/databases.json"),
];

fn default_order_key() -> String {
    "id".to_string()
}

/// Scalar type of a filterable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    String,
    Bool,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::String => "string",
            FieldType::Bool => "bool",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field descriptor from JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Field can be evaluated by the upstream filter dialect
    #[serde(default)]
    pub api_filterable: bool,
    /// Field may be used as `order_by` even though it is not API filterable
    #[serde(default)]
    pub allow_order_override: bool,
}

impl FieldDescriptor {
    pub fn new(field_type: FieldType, api_filterable: bool) -> Self {
        Self {
            field_type,
            api_filterable,
            allow_order_override: false,
        }
    }

    pub fn with_order_override(mut self) -> Self {
        self.allow_order_override = true;
        self
    }

    /// A field is a valid sort key iff it is pushdown-eligible or whitelisted
    pub fn is_orderable(&self) -> bool {
        self.api_filterable || self.allow_order_override
    }
}

/// Attribute emitted by the flatten step
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub json_path: String,
}

/// Data-source kind definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct KindDef {
    pub display_name: String,
    /// List endpoint, relative to the API base URL
    pub endpoint: String,
    #[serde(default = "default_order_key")]
    pub default_order_key: String,
    /// The list endpoint answers 404 instead of an empty page
    #[serde(default)]
    pub empty_on_not_found: bool,
    /// Supports reducing the result to the most recently created record
    #[serde(default)]
    pub supports_latest: bool,
    pub fields: BTreeMap<String, FieldDescriptor>,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

impl KindDef {
    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Check that `order_by` names a usable sort key for this kind
    pub fn validate_order(&self, order_by: &str) -> Result<&FieldDescriptor, FilterError> {
        let Some(field) = self.get_field(order_by) else {
            return Err(FilterError::UnknownField {
                field: order_by.to_string(),
                attribute: "order_by".to_string(),
                valid: self.filterable_names(),
            });
        };

        if !field.is_orderable() {
            return Err(FilterError::OrderNotSupported {
                field: order_by.to_string(),
                valid: self.orderable_names(),
            });
        }

        Ok(field)
    }

    pub fn canonical_default_order_key(&self) -> &str {
        &self.default_order_key
    }

    /// Comma-separated list of every filterable field
    pub fn filterable_names(&self) -> String {
        self.fields.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
    }

    /// Comma-separated list of fields accepted by `order_by`
    pub fn orderable_names(&self) -> String {
        self.fields
            .iter()
            .filter(|(_, field)| field.is_orderable())
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KindRegistry {
    #[serde(default)]
    pub kinds: BTreeMap<String, KindDef>,
}

impl KindRegistry {
    /// Parse a registry from one kind JSON document
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    pub fn extend(&mut self, other: KindRegistry) {
        self.kinds.extend(other.kinds);
    }

    pub fn get_kind(&self, kind: &str) -> Option<&KindDef> {
        self.kinds.get(kind)
    }

    pub fn get_field(&self, kind: &str, name: &str) -> Option<&FieldDescriptor> {
        self.get_kind(kind)?.get_field(name)
    }

    pub fn validate_order(&self, kind: &str, order_by: &str) -> Result<(), FilterError> {
        self.get_kind(kind)
            .ok_or_else(|| FilterError::UnknownKind {
                kind: kind.to_string(),
            })?
            .validate_order(order_by)
            .map(|_| ())
    }

    pub fn canonical_default_order_key(&self, kind: &str) -> Option<&str> {
        self.get_kind(kind).map(KindDef::canonical_default_order_key)
    }

    pub fn kinds(&self) -> impl Iterator<Item = (&str, &KindDef)> {
        self.kinds.iter().map(|(key, def)| (key.as_str(), def))
    }
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<KindRegistry> = OnceLock::new();

/// Get the kind registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static KindRegistry {
    REGISTRY.get_or_init(|| {
        let mut registry = KindRegistry::default();

        for content in KIND_FILES {
            let partial = KindRegistry::from_json(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded kind JSON: {}", e));
            registry.extend(partial);
        }

        registry
    })
}

/// Get a kind definition by key
pub fn get_kind(key: &str) -> Option<&'static KindDef> {
    get_registry().get_kind(key)
}

/// Get all kind keys, sorted
pub fn get_all_kind_keys() -> Vec<&'static str> {
    get_registry().kinds().map(|(key, _)| key).collect()
}
