//! Tools implemented by the gateway itself.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::Result;
use crate::registry::{Operation, ToolRegistry};
use crate::transport::{TargetInfo, Transport};

pub const DESCRIBE_TARGET: &str = "gateway_describe_target";

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoParams {}

/// Reports the identity of the target it is called against.
pub struct DescribeTarget {
    transport: Arc<dyn Transport>,
}

impl DescribeTarget {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Operation for DescribeTarget {
    type Params = NoParams;
    type Output = TargetInfo;

    const TAKES_PARAMS: bool = false;

    async fn run(
        &self,
        target: u16,
        _params: NoParams,
        _page_token: Option<String>,
    ) -> anyhow::Result<Option<TargetInfo>> {
        Ok(Some(self.transport.describe(target).await?))
    }
}

pub fn register_builtins(registry: &mut ToolRegistry, transport: Arc<dyn Transport>) -> Result<()> {
    registry.register_operation(
        DESCRIBE_TARGET,
        "Describe Target",
        "Returns the identity of a single backend target, such as product name and version.",
        DescribeTarget::new(transport),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use serde_json::{json, Value};

    struct Fixed;

    #[async_trait]
    impl Transport for Fixed {
        async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
            Ok(vec![])
        }

        async fn describe(&self, target: u16) -> anyhow::Result<TargetInfo> {
            Ok(TargetInfo {
                target,
                identity: json!({ "product": "Modeler", "version": 27 }),
            })
        }

        async fn execute(&self, _: u16, _: &str, _: Option<Value>) -> anyhow::Result<Value> {
            anyhow::bail!("not used")
        }
    }

    #[tokio::test]
    async fn test_describe_target_through_dispatch() {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry, Arc::new(Fixed)).unwrap();

        let definition = registry.lookup(DESCRIBE_TARGET).unwrap();
        assert!(definition.params_schema.is_none());
        assert!(definition.result_schema.is_some());

        let result = Dispatcher::new(Arc::new(registry))
            .dispatch(DESCRIBE_TARGET, json!({ "target": 19725 }))
            .await
            .unwrap();

        assert_eq!(result["target"], json!(19725));
        assert_eq!(result["identity"]["product"], json!("Modeler"));
    }
}
