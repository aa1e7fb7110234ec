use crate::api::ToolDefinition;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

type ToolFn =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync>;

/// Registry of callable tools, keyed by name.
///
/// Handlers return the serialized result payload that goes back to the
/// model as a tool result.
pub struct ToolRegistry {
    tools: HashMap<String, (ToolDefinition, ToolFn)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
        }
    }

    pub fn register<F, Fut>(&mut self, definition: ToolDefinition, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let name = definition.name.clone();
        let wrapped: ToolFn = Box::new(move |args| Box::pin(handler(args)));
        self.tools.insert(name, (definition, wrapped));
    }

    pub fn get_definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|(def, _)| def)
    }

    pub fn get_all_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|(def, _)| def.clone()).collect()
    }

    pub async fn call(&self, name: &str, args: Value) -> Result<String> {
        match self.tools.get(name) {
            Some((_, handler)) => handler(args).await,
            None => Err(anyhow::anyhow!("Tool '{}' not found", name)),
        }
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Serialize, JsonSchema)]
    struct EchoInput {
        message: String,
    }

    async fn echo_tool(args: Value) -> Result<String> {
        let input: EchoInput = serde_json::from_value(args)?;
        Ok(format!("echo: {}", input.message))
    }

    fn echo_definition() -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: Some("Echoes its input".to_string()),
            input_schema: schemars::schema_for!(EchoInput),
        }
    }

    #[tokio::test]
    async fn test_register_and_call() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_definition(), echo_tool);

        assert!(registry.has_tool("echo"));

        let result = registry
            .call("echo", serde_json::json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result, "echo: hi");
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.call("missing", serde_json::json!({})).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_get_all_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_definition(), echo_tool);

        let definitions = registry.get_all_definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "echo");
    }
}
