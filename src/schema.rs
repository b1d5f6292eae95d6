// src/schema.rs
//
// =============================================================================
// ROBOGRAPH: NODE SCHEMAS & REGISTRY (v 0.1 )
// =============================================================================
//
// The knowledge base that drives compilation, validation, and code
// generation. A schema describes a node type's ports, typed parameters,
// constraints, code template, and robot compatibility.
//
// Schemas live in bundled YAML files (one per node kind, compiled in with
// `include_str!`) and are loaded exactly once, in lexicographic filename
// order, on first registry access. After load the registry is immutable;
// `register`/`reset` exist for test isolation only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::ir::{ParamValue, PortDirection, ValueType};

// ============================================================================
// 1. SCHEMA TYPES
// ============================================================================

/// Constraints for a parameter value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamConstraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// Schema for a single port on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSchema {
    pub name: String,
    pub direction: PortDirection,
    #[serde(default = "default_any")]
    pub data_type: ValueType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

fn default_any() -> ValueType {
    ValueType::Any
}

/// Schema for a configurable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    pub name: String,
    #[serde(default = "default_string_type")]
    pub param_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<ParamConstraint>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
}

fn default_string_type() -> ValueType {
    ValueType::String
}

/// Complete schema for a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub schema_id: String,
    pub display_name: String,
    pub node_type: String,
    pub kind: String,
    #[serde(default)]
    pub ports: Vec<PortSchema>,
    #[serde(default)]
    pub parameters: Vec<ParamSchema>,
    #[serde(default)]
    pub code_template: String,
    #[serde(default)]
    pub robot_compat: Vec<String>,
    #[serde(default)]
    pub safety: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_schema_version")]
    pub version: String,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl NodeSchema {
    pub fn input_ports(&self) -> Vec<&PortSchema> {
        self.ports
            .iter()
            .filter(|p| p.direction == PortDirection::Input)
            .collect()
    }

    pub fn output_ports(&self) -> Vec<&PortSchema> {
        self.ports
            .iter()
            .filter(|p| p.direction == PortDirection::Output)
            .collect()
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSchema> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn port(&self, name: &str) -> Option<&PortSchema> {
        self.ports.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// 2. BUNDLED SCHEMA FILES
// ============================================================================
//
// Lexicographic filename order; keep this list sorted.

const BUILTIN_FILES: &[(&str, &str)] = &[
    ("action_execution.yaml", include_str!("../schemas/action_execution.yaml")),
    ("comparison.yaml", include_str!("../schemas/comparison.yaml")),
    ("if.yaml", include_str!("../schemas/if.yaml")),
    ("math.yaml", include_str!("../schemas/math.yaml")),
    ("opaque_code.yaml", include_str!("../schemas/opaque_code.yaml")),
    ("sensor_input.yaml", include_str!("../schemas/sensor_input.yaml")),
    ("stop.yaml", include_str!("../schemas/stop.yaml")),
    ("timer.yaml", include_str!("../schemas/timer.yaml")),
    ("variable.yaml", include_str!("../schemas/variable.yaml")),
    ("while_loop.yaml", include_str!("../schemas/while_loop.yaml")),
];

// ============================================================================
// 3. THE REGISTRY
// ============================================================================

struct RegistryState {
    schemas: Vec<Arc<NodeSchema>>,
    loaded: bool,
}

fn state() -> &'static RwLock<RegistryState> {
    static STATE: OnceLock<RwLock<RegistryState>> = OnceLock::new();
    STATE.get_or_init(|| {
        RwLock::new(RegistryState {
            schemas: Vec::new(),
            loaded: false,
        })
    })
}

/// Process-wide schema registry.
///
/// First access loads the bundled schemas; the write lock serializes that
/// first touch, readers share afterwards. A file that fails to parse logs a
/// warning and is skipped so the registry stays functional with whatever
/// did load.
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Get a schema by its schema_id.
    pub fn get(schema_id: &str) -> Option<Arc<NodeSchema>> {
        Self::ensure_loaded();
        let st = state().read().expect("schema registry poisoned");
        st.schemas.iter().find(|s| s.schema_id == schema_id).cloned()
    }

    /// Get the first schema matching a node_type.
    pub fn get_by_node_type(node_type: &str) -> Option<Arc<NodeSchema>> {
        Self::ensure_loaded();
        let st = state().read().expect("schema registry poisoned");
        st.schemas.iter().find(|s| s.node_type == node_type).cloned()
    }

    /// Get the first schema matching a display name.
    pub fn get_by_display_name(display_name: &str) -> Option<Arc<NodeSchema>> {
        Self::ensure_loaded();
        let st = state().read().expect("schema registry poisoned");
        st.schemas
            .iter()
            .find(|s| s.display_name == display_name)
            .cloned()
    }

    /// All registered schemas, in load order.
    pub fn all() -> Vec<Arc<NodeSchema>> {
        Self::ensure_loaded();
        let st = state().read().expect("schema registry poisoned");
        st.schemas.clone()
    }

    /// All registered schema IDs, in load order.
    pub fn list_schema_ids() -> Vec<String> {
        Self::ensure_loaded();
        let st = state().read().expect("schema registry poisoned");
        st.schemas.iter().map(|s| s.schema_id.clone()).collect()
    }

    /// Register an extra schema (tests / extensions). Replaces an existing
    /// entry with the same schema_id.
    pub fn register(schema: NodeSchema) {
        Self::ensure_loaded();
        let mut st = state().write().expect("schema registry poisoned");
        st.schemas.retain(|s| s.schema_id != schema.schema_id);
        st.schemas.push(Arc::new(schema));
    }

    /// Clear the registry so the next access reloads the builtins.
    /// Test isolation only.
    pub fn reset() {
        let mut st = state().write().expect("schema registry poisoned");
        st.schemas.clear();
        st.loaded = false;
    }

    fn ensure_loaded() {
        {
            let st = state().read().expect("schema registry poisoned");
            if st.loaded {
                return;
            }
        }
        let mut st = state().write().expect("schema registry poisoned");
        if st.loaded {
            return; // Lost the race; another thread loaded first.
        }
        for (filename, raw) in BUILTIN_FILES {
            match serde_yaml::from_str::<NodeSchema>(raw) {
                Ok(schema) => st.schemas.push(Arc::new(schema)),
                Err(e) => log::warn!("Failed to load builtin schema {filename}: {e}"),
            }
        }
        st.loaded = true;
        log::debug!("Schema registry loaded: {} schemas", st.schemas.len());
    }
}
