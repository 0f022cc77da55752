//! Per-agent tool registry.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::OrchestrationError;
use crate::models::Parameters;
use crate::tools::{Tool, ToolHandle, ToolResult};

/// Name → tool mapping owned by a single agent.
#[derive(Debug, Default)]
pub struct ToolBox {
    tools: RwLock<BTreeMap<String, Arc<ToolHandle>>>,
}

impl ToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its declared name, replacing any previous one.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Option<Arc<ToolHandle>> {
        self.register_handle(ToolHandle::new(tool))
    }

    pub fn register_handle(&self, handle: ToolHandle) -> Option<Arc<ToolHandle>> {
        let name = handle.name().to_string();
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        let previous = tools.insert(name.clone(), Arc::new(handle));
        if previous.is_some() {
            tracing::debug!(tool = %name, "[ToolBox] Replaced existing tool");
        }
        previous
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ToolHandle>> {
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolHandle>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Invoke a registered tool.
    ///
    /// Absence is an error; everything that goes wrong once the tool is
    /// found is reported through a failed [`ToolResult`].
    pub async fn use_tool(
        &self,
        name: &str,
        input: &Parameters,
    ) -> Result<ToolResult, OrchestrationError> {
        let handle = self
            .get(name)
            .ok_or_else(|| OrchestrationError::ToolNotFound(name.to_string()))?;
        Ok(handle.safe_execute(input).await)
    }

    /// Initialise every registered tool, stopping at the first failure.
    pub async fn initialize_all(&self) -> Result<(), OrchestrationError> {
        let handles: Vec<Arc<ToolHandle>> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for handle in handles {
            handle.ensure_initialized().await?;
        }
        Ok(())
    }
}
