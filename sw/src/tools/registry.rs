//! ToolRegistry - aggregated, attributed tool catalogue

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::mcp::McpProvider;
use super::{RESERVED_TOOL_NAMES, ToolDescriptor, ToolProvider, ToolResult, schema};
use crate::config::ToolsConfig;
use crate::llm::ToolDefinition;

/// Owns the tool providers and the catalogue discovered from them
#[derive(Default)]
pub struct ToolRegistry {
    providers: Vec<Box<dyn ToolProvider>>,
    catalogue: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Create a registry with no providers
    pub fn new() -> Self {
        Self::default()
    }

    /// Build MCP providers for every configured server
    ///
    /// Providers are ordered by id so duplicate-name resolution is stable.
    pub fn from_config(config: &ToolsConfig, workdir: &Path) -> Self {
        let mut ids: Vec<&String> = config.servers.keys().collect();
        ids.sort();

        let mut registry = Self::new();
        for id in ids {
            let provider = McpProvider::new(id.clone(), config.servers[id].clone()).with_default_cwd(workdir);
            registry.add_provider(Box::new(provider));
        }
        registry
    }

    /// Register a provider; its tools appear after the next discovery
    pub fn add_provider(&mut self, provider: Box<dyn ToolProvider>) {
        debug!(provider = %provider.id(), "add_provider: called");
        self.providers.push(provider);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Connect to every provider and rebuild the catalogue
    ///
    /// A provider that fails to connect or list is logged and omitted.
    /// When two providers offer the same tool name, the first one wins.
    pub async fn discover(&mut self) -> &[ToolDescriptor] {
        debug!(providers = self.providers.len(), "discover: called");
        let mut catalogue: Vec<ToolDescriptor> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for provider in &mut self.providers {
            let provider_id = provider.id().to_string();

            if let Err(e) = provider.connect().await {
                warn!(provider = %provider_id, error = %e, "discover: provider failed to connect, omitting");
                continue;
            }

            let tools = match provider.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(provider = %provider_id, error = %e, "discover: provider failed to list tools, omitting");
                    continue;
                }
            };

            for def in tools {
                if RESERVED_TOOL_NAMES.contains(&def.name.as_str()) {
                    warn!(provider = %provider_id, tool = %def.name, "discover: tool name is reserved, skipping");
                    continue;
                }
                if !seen.insert(def.name.clone()) {
                    warn!(provider = %provider_id, tool = %def.name, "discover: duplicate tool name, keeping first");
                    continue;
                }
                catalogue.push(ToolDescriptor::from_definition(&provider_id, def));
            }
        }

        info!(tools = catalogue.len(), "discover: catalogue ready");
        self.catalogue = catalogue;
        &self.catalogue
    }

    /// Re-run discovery on explicit request
    pub async fn refresh(&mut self) -> &[ToolDescriptor] {
        debug!("refresh: called");
        self.discover().await
    }

    /// The catalogue from the last discovery
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.catalogue
    }

    /// Definitions handed to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.catalogue.iter().map(ToolDescriptor::to_definition).collect()
    }

    /// Validate arguments and dispatch to the owning provider
    ///
    /// Never fails: unknown tools, schema violations and provider errors all
    /// come back as error results for the model to read.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolResult {
        debug!(%name, "invoke: called");
        let Some(descriptor) = self.catalogue.iter().find(|d| d.name == name) else {
            debug!(%name, "invoke: unknown tool");
            return ToolResult::error(format!("Tool not found: {name}"));
        };

        if let Err(violations) = schema::validate(&descriptor.input_schema, &args) {
            debug!(%name, ?violations, "invoke: schema violation");
            return ToolResult::error(format!("Invalid arguments for '{name}': {}", violations.join("; ")));
        }

        let Some(provider) = self.providers.iter().find(|p| p.id() == descriptor.provider_id) else {
            return ToolResult::error(format!("Provider '{}' is no longer registered", descriptor.provider_id));
        };

        match provider.call_tool(name, args).await {
            Ok(result) => result,
            Err(e) => {
                warn!(%name, provider = %descriptor.provider_id, error = %e, "invoke: provider call failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    /// Disconnect every provider
    pub async fn shutdown(&mut self) {
        debug!("shutdown: called");
        for provider in &mut self.providers {
            if let Err(e) = provider.disconnect().await {
                warn!(provider = %provider.id(), error = %e, "shutdown: disconnect failed");
            }
        }
    }
}

#[cfg(test)]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::tools::ToolError;

    /// In-memory provider with canned outputs
    pub struct MockToolProvider {
        id: String,
        tools: Vec<ToolDefinition>,
        outputs: HashMap<String, Result<ToolResult, String>>,
        fail_connect: bool,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl MockToolProvider {
        pub fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                tools: Vec::new(),
                outputs: HashMap::new(),
                fail_connect: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn tool(mut self, name: &str, schema: Value, output: &str) -> Self {
            self.tools
                .push(ToolDefinition::new(name, format!("{name} tool"), schema));
            self.outputs.insert(name.to_string(), Ok(ToolResult::success(output)));
            self
        }

        pub fn failing_tool(mut self, name: &str, message: &str) -> Self {
            self.tools
                .push(ToolDefinition::new(name, format!("{name} tool"), serde_json::json!({})));
            self.outputs.insert(name.to_string(), Err(message.to_string()));
            self
        }

        pub fn unreachable(mut self) -> Self {
            self.fail_connect = true;
            self
        }
    }

    #[async_trait]
    impl ToolProvider for MockToolProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn connect(&mut self) -> Result<(), ToolError> {
            if self.fail_connect {
                return Err(ToolError::SpawnFailed {
                    provider: self.id.clone(),
                    reason: "unreachable".to_string(),
                });
            }
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, ToolError> {
            self.calls.lock().unwrap().push((name.to_string(), args));
            match self.outputs.get(name) {
                Some(Ok(result)) => Ok(result.clone()),
                Some(Err(message)) => Err(ToolError::Transport {
                    provider: self.id.clone(),
                    reason: message.clone(),
                }),
                None => Err(ToolError::UnknownTool { name: name.to_string() }),
            }
        }

        async fn disconnect(&mut self) -> Result<(), ToolError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockToolProvider;
    use super::*;
    use serde_json::json;

    fn query_schema() -> Value {
        json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": ["q"]})
    }

    #[tokio::test]
    async fn test_discover_tags_tools_with_provider() {
        let mut registry = ToolRegistry::new();
        registry.add_provider(Box::new(MockToolProvider::new("docs").tool("search", query_schema(), "hits")));
        registry.add_provider(Box::new(MockToolProvider::new("git").tool("blame", json!({}), "lines")));

        let catalogue = registry.discover().await;
        assert_eq!(catalogue.len(), 2);
        assert_eq!(catalogue[0].provider_id, "docs");
        assert_eq!(catalogue[1].provider_id, "git");
        assert_eq!(registry.definitions()[1].name, "blame");
    }

    #[tokio::test]
    async fn test_failing_provider_is_omitted() {
        let mut registry = ToolRegistry::new();
        registry.add_provider(Box::new(MockToolProvider::new("down").tool("x", json!({}), "").unreachable()));
        registry.add_provider(Box::new(MockToolProvider::new("up").tool("search", query_schema(), "hits")));

        let catalogue = registry.discover().await;
        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue[0].name, "search");
    }

    #[tokio::test]
    async fn test_duplicate_and_reserved_names() {
        let mut registry = ToolRegistry::new();
        registry.add_provider(Box::new(
            MockToolProvider::new("a")
                .tool("search", json!({}), "from a")
                .tool("ask-human", json!({}), "hijack"),
        ));
        registry.add_provider(Box::new(MockToolProvider::new("b").tool("search", json!({}), "from b")));
        registry.discover().await;

        assert_eq!(registry.descriptors().len(), 1);
        assert_eq!(registry.invoke("search", json!({})).await, ToolResult::success("from a"));
    }

    #[tokio::test]
    async fn test_invoke_validates_before_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.add_provider(Box::new(MockToolProvider::new("docs").tool("search", query_schema(), "hits")));
        registry.discover().await;

        let result = registry.invoke("search", json!({"q": 7})).await;
        assert!(result.is_error);
        assert!(result.content.contains("$.q"));

        let ok = registry.invoke("search", json!({"q": "auth"})).await;
        assert_eq!(ok, ToolResult::success("hits"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_and_provider_failure() {
        let mut registry = ToolRegistry::new();
        registry.add_provider(Box::new(MockToolProvider::new("docs").failing_tool("fetch", "connection reset")));
        registry.discover().await;

        let unknown = registry.invoke("nope", json!({})).await;
        assert!(unknown.is_error);
        assert!(unknown.content.contains("nope"));

        let failed = registry.invoke("fetch", json!({})).await;
        assert!(failed.is_error);
        assert!(failed.content.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_nothing_new_when_unchanged() {
        let mut registry = ToolRegistry::new();
        registry.add_provider(Box::new(MockToolProvider::new("docs").tool("search", query_schema(), "hits")));
        let first = registry.discover().await.to_vec();
        let second = registry.refresh().await.to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_config_orders_by_id() {
        let yaml = "servers:\n  zeta:\n    command: z\n  alpha:\n    command: a\n";
        let config: ToolsConfig = serde_yaml::from_str(yaml).unwrap();
        let registry = ToolRegistry::from_config(&config, Path::new("."));
        assert_eq!(registry.provider_count(), 2);
        assert_eq!(registry.providers[0].id(), "alpha");
    }
}
