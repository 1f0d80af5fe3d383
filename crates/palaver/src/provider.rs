//! Capability Provider Interface
//!
//! The seam between the gateway and the business logic behind it. The
//! gateway consumes exactly two things from a collaborator: the list
//! of capabilities it offers, and an execute call. Payload contents
//! are opaque to the gateway.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::registry::{CapabilityRegistry, Tool, ToolHandler, ToolSchema};

/// One capability advertised by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,

    /// Capability category, e.g. "synthesis" or "retrieval".
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub description: String,

    /// Input schema for the capability, used verbatim in discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

/// Result of executing a capability. The gateway forwards `payload`
/// without interpreting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub result_id: String,
    pub format: String,
    pub payload: Value,
}

/// A unit of business logic the gateway can expose.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Capabilities this provider offers.
    fn capabilities(&self) -> Vec<CapabilitySpec>;

    /// Execute a capability with the given parameters.
    async fn execute(&self, capability: &str, params: Value)
        -> Result<ExecutionOutput, GatewayError>;
}

struct ProviderHandler {
    provider: Arc<dyn CapabilityProvider>,
    capability: String,
}

#[async_trait]
impl ToolHandler for ProviderHandler {
    async fn call(&self, params: Value) -> Result<Value, GatewayError> {
        let output = self.provider.execute(&self.capability, params).await?;
        serde_json::to_value(&output)
            .map_err(|e| GatewayError::Execution(format!("unserializable output: {}", e)))
    }
}

/// Register every capability of a provider as a tool.
pub fn register_provider(registry: &CapabilityRegistry, provider: Arc<dyn CapabilityProvider>) {
    for spec in provider.capabilities() {
        let schema = spec
            .input_schema
            .map(ToolSchema::from_value)
            .unwrap_or_default();
        let handler = ProviderHandler {
            provider: provider.clone(),
            capability: spec.name.clone(),
        };
        let tool = Tool::new(spec.name, spec.description, Arc::new(handler))
            .with_input_schema(schema);
        registry.register_tool(tool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FakeProvider;

    #[async_trait]
    impl CapabilityProvider for FakeProvider {
        fn capabilities(&self) -> Vec<CapabilitySpec> {
            vec![
                CapabilitySpec {
                    name: "text_to_speech".into(),
                    kind: "synthesis".into(),
                    description: "Converts text to speech".into(),
                    input_schema: Some(json!({
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"]
                    })),
                    metadata: Value::Null,
                },
                CapabilitySpec {
                    name: "list_voices".into(),
                    kind: "catalog".into(),
                    description: "Lists voices".into(),
                    input_schema: None,
                    metadata: json!({ "cached": true }),
                },
            ]
        }

        async fn execute(
            &self,
            capability: &str,
            _params: Value,
        ) -> Result<ExecutionOutput, GatewayError> {
            Ok(ExecutionOutput {
                result_id: format!("{}-1", capability),
                format: "json".into(),
                payload: json!({ "ok": true }),
            })
        }
    }

    #[tokio::test]
    async fn test_provider_capabilities_become_tools() {
        let registry = CapabilityRegistry::new();
        register_provider(&registry, Arc::new(FakeProvider));

        let names: Vec<String> = registry
            .list_tools()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["list_voices", "text_to_speech"]);

        let tool = registry.get_tool("text_to_speech").unwrap();
        assert_eq!(tool.input_schema.required, Some(vec!["text".to_string()]));

        let result = tool.execute(json!({ "text": "hi" })).await.unwrap();
        assert_eq!(result["result_id"], "text_to_speech-1");
        assert_eq!(result["format"], "json");
        assert_eq!(result["payload"]["ok"], true);
    }
}
