//! Capability Registry
//!
//! In-memory store of callable tools with observer notification.
//! Registration replaces by name; every mutation notifies observers
//! synchronously inside the registry's lock, so observers see changes
//! in mutation order. A misbehaving observer is logged and skipped,
//! never allowed to break discovery for other callers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// JSON Schema for tool parameters. Always `"type": "object"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolSchema {
    /// Schema accepting any object (no declared parameters).
    pub fn empty() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
        }
    }

    /// Build a schema from a JSON value, tolerating partial shapes.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::empty();
        };
        Self {
            schema_type: map
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("object")
                .to_string(),
            properties: map.get("properties").and_then(|v| match v {
                Value::Object(props) => Some(props.clone()),
                _ => None,
            }),
            required: map.get("required").and_then(|v| match v {
                Value::Array(items) => Some(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                ),
                _ => None,
            }),
        }
    }
}

impl Default for ToolSchema {
    fn default() -> Self {
        Self::empty()
    }
}

/// Executable behavior behind a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, params: Value) -> Result<Value, GatewayError>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, GatewayError>> + Send,
{
    async fn call(&self, params: Value) -> Result<Value, GatewayError> {
        (self)(params).await
    }
}

/// A named, schema-described unit of invokable logic.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: ToolSchema,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Create a tool with an empty input schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: ToolSchema::empty(),
            handler,
        }
    }

    /// Set the input schema.
    pub fn with_input_schema(mut self, schema: ToolSchema) -> Self {
        self.input_schema = schema;
        self
    }

    /// Set the input schema from a JSON value.
    pub fn with_input_schema_value(mut self, schema: Value) -> Self {
        self.input_schema = ToolSchema::from_value(schema);
        self
    }

    /// Invoke the tool's handler.
    pub async fn execute(&self, params: Value) -> Result<Value, GatewayError> {
        self.handler.call(params).await
    }

    /// Serializable descriptor, the wire form used by discovery.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            schema: self.input_schema.clone(),
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Wire form of a tool for discovery responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
}

/// Observer of registry mutations.
///
/// Called synchronously inside the registry's lock with the full
/// post-mutation tool collection. Must not call back into the registry.
pub trait RegistryObserver: Send + Sync {
    fn on_tools_changed(&self, tools: &[ToolDescriptor]) -> Result<(), GatewayError>;
}

#[derive(Default)]
struct RegistryInner {
    tools: BTreeMap<String, Arc<Tool>>,
    observers: Vec<Arc<dyn RegistryObserver>>,
}

/// Registry of callable tools, keyed by unique name.
#[derive(Default)]
pub struct CapabilityRegistry {
    inner: Mutex<RegistryInner>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any existing tool of the same name.
    pub fn register_tool(&self, tool: Tool) {
        let mut inner = self.lock();
        let name = tool.name.clone();
        let replaced = inner.tools.insert(name.clone(), Arc::new(tool)).is_some();
        tracing::info!(tool = %name, replaced, "Registered tool");
        Self::notify(&inner);
    }

    /// Remove a tool by name. Returns whether anything was removed.
    pub fn unregister_tool(&self, name: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.tools.remove(name).is_some();
        if removed {
            tracing::info!(tool = %name, "Unregistered tool");
            Self::notify(&inner);
        }
        removed
    }

    /// Snapshot of all registered tools, ordered by name.
    pub fn list_tools(&self) -> Vec<Arc<Tool>> {
        self.lock().tools.values().cloned().collect()
    }

    /// Snapshot of wire descriptors, ordered by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.lock().tools.values().map(|t| t.descriptor()).collect()
    }

    /// Look up a tool by name.
    pub fn get_tool(&self, name: &str) -> Option<Arc<Tool>> {
        self.lock().tools.get(name).cloned()
    }

    /// Append an observer to the notification list.
    pub fn register_observer(&self, observer: Arc<dyn RegistryObserver>) {
        self.lock().observers.push(observer);
    }

    fn notify(inner: &RegistryInner) {
        if inner.observers.is_empty() {
            return;
        }
        let tools: Vec<ToolDescriptor> = inner.tools.values().map(|t| t.descriptor()).collect();
        for observer in &inner.observers {
            if let Err(e) = observer.on_tools_changed(&tools) {
                tracing::warn!(error = %e, "Registry observer failed, skipping");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // A poisoned lock means an observer or caller panicked while
        // holding it; the map itself is still structurally sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
