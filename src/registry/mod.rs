//! Tool registry and discovery catalog.
//!
//! Registration happens once, single-threaded, before the registry is shared
//! behind an `Arc`. After that the registry and its catalog are read-only, so
//! search and dispatch read them without locking.

pub mod catalog;
pub mod definition;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{GatewayError, Result};

pub use catalog::{schema_keywords, CatalogEntry, ToolInfo};
pub use definition::{
    Operation, ParamsSchema, ToolDefinition, ToolHandle, ToolOutput, TypedTool, ValidatedParams,
};

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    /// Position of each tool's entry in `catalog`.
    positions: HashMap<String, usize>,
    catalog: Vec<CatalogEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool and append its catalog entry.
    ///
    /// Re-registering a name overwrites the previous definition in place (its
    /// catalog position is kept) and logs a warning. Fails only when the params
    /// schema cannot be compiled.
    pub fn register(
        &mut self,
        name: &str,
        title: &str,
        description: &str,
        handle: Arc<dyn ToolHandle>,
        params_schema: Option<Value>,
        result_schema: Option<Value>,
    ) -> Result<()> {
        if description.trim().is_empty() {
            tracing::warn!(tool = name, "Registering tool with an empty description");
        }

        let supports_paging = handle.supports_paging();
        let params_schema = params_schema
            .map(ParamsSchema::compile)
            .transpose()
            .map_err(|e| {
                tracing::error!(tool = name, error = %e, "Rejected tool registration");
                e
            })?
            .map(Arc::new);

        let entry = CatalogEntry::new(
            name,
            title,
            description,
            params_schema.as_ref().map(|s| s.schema()),
            supports_paging,
        );

        let definition = ToolDefinition {
            name: name.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            handle,
            params_schema,
            result_schema,
            supports_paging,
        };

        match self.positions.get(name) {
            Some(&position) => {
                tracing::warn!(tool = name, "Tool already registered. Overwriting.");
                self.catalog[position] = entry;
            }
            None => {
                self.positions.insert(name.to_string(), self.catalog.len());
                self.catalog.push(entry);
            }
        }
        self.tools.insert(name.to_string(), definition);

        tracing::debug!(tool = name, supports_paging, "Registered tool");
        Ok(())
    }

    /// Register a typed [`Operation`], deriving its schemas from its Rust types.
    pub fn register_operation<O: Operation>(
        &mut self,
        name: &str,
        title: &str,
        description: &str,
        operation: O,
    ) -> Result<()> {
        self.register(
            name,
            title,
            description,
            Arc::new(TypedTool::new(operation)),
            TypedTool::<O>::params_schema(),
            TypedTool::<O>::result_schema(),
        )
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDefinition> {
        self.tools.get(name).ok_or_else(|| GatewayError::NotFound {
            tool: name.to_string(),
        })
    }

    /// Catalog entries in registration order.
    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldViolation;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo {
        paged: bool,
    }

    #[async_trait]
    impl ToolHandle for Echo {
        fn supports_paging(&self) -> bool {
            self.paged
        }

        fn validate(&self, raw: Value) -> std::result::Result<ValidatedParams, Vec<FieldViolation>> {
            Ok(ValidatedParams::new(raw))
        }

        async fn invoke(
            &self,
            _target: u16,
            _params: Option<ValidatedParams>,
            _page_token: Option<String>,
        ) -> anyhow::Result<ToolOutput> {
            Ok(ToolOutput::Empty)
        }
    }

    fn echo(paged: bool) -> Arc<dyn ToolHandle> {
        Arc::new(Echo { paged })
    }

    #[test]
    fn test_lookup_after_register() {
        let mut registry = ToolRegistry::new();
        registry
            .register("create_wall", "Create Wall", "Creates a wall element", echo(false), None, None)
            .unwrap();

        let definition = registry.lookup("create_wall").unwrap();
        assert_eq!(definition.name, "create_wall");
        assert_eq!(definition.title, "Create Wall");
        assert_eq!(definition.description, "Creates a wall element");
        assert!(definition.params_schema.is_none());
    }

    #[test]
    fn test_lookup_unknown_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.lookup("missing").unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { tool } if tool == "missing"));
    }

    #[test]
    fn test_overwrite_keeps_catalog_aligned() {
        let mut registry = ToolRegistry::new();
        registry.register("a", "A", "first", echo(false), None, None).unwrap();
        registry.register("b", "B", "second", echo(false), None, None).unwrap();
        registry.register("a", "A2", "replaced", echo(true), None, None).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.catalog().len(), registry.len());
        assert_eq!(registry.catalog()[0].name, "a");
        assert_eq!(registry.catalog()[0].description, "replaced");
        assert_eq!(registry.catalog()[1].name, "b");
        assert!(registry.lookup("a").unwrap().supports_paging);
    }

    #[test]
    fn test_paging_adds_page_token() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "list_elements",
                "List Elements",
                "Lists elements",
                echo(true),
                Some(json!({ "type": "object", "properties": { "kind": { "type": "string" } } })),
                None,
            )
            .unwrap();

        let schema = &registry.catalog()[0].input_schema;
        assert!(schema["properties"]["pageToken"].is_object());
        assert_eq!(schema["required"], json!(["target", "params"]));
        assert_eq!(registry.catalog()[0].keywords, "kind");
    }

    #[test]
    fn test_invalid_schema_fails_registration() {
        let mut registry = ToolRegistry::new();
        let result = registry.register(
            "broken",
            "Broken",
            "Has a bad schema",
            echo(false),
            Some(json!({ "type": 12 })),
            None,
        );

        assert!(matches!(result, Err(GatewayError::Registration(_))));
        assert!(registry.is_empty());
    }
}
