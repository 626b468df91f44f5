use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::ledger::Repositories;
use crate::messaging::RoutingKey;

use super::file::FileMessageHandler;
use super::task::TaskMessageHandler;
use super::traits::MessageHandler;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler not found: {0}")]
    NotFound(RoutingKey),
}

/// Registry mapping routing keys to handler instances
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<RoutingKey, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, routing_key: RoutingKey, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(routing_key, handler);
    }

    pub fn get(&self, routing_key: RoutingKey) -> Result<Arc<dyn MessageHandler>, RegistryError> {
        self.handlers
            .get(&routing_key)
            .cloned()
            .ok_or(RegistryError::NotFound(routing_key))
    }

    pub fn has_handler(&self, routing_key: RoutingKey) -> bool {
        self.handlers.contains_key(&routing_key)
    }

    /// Keys the consumer should subscribe to
    pub fn routing_keys(&self) -> Vec<RoutingKey> {
        self.handlers.keys().copied().collect()
    }

    /// Registry with the task and file handlers for every inbound key
    pub fn with_defaults(repos: Repositories) -> Self {
        let mut registry = Self::new();

        let task_handler: Arc<dyn MessageHandler> = Arc::new(TaskMessageHandler::new(repos.clone()));
        for key in TaskMessageHandler::ROUTING_KEYS {
            registry.register(key, task_handler.clone());
        }

        registry.register(
            RoutingKey::FileResultVisibilityState,
            Arc::new(FileMessageHandler::new(repos.files)),
        );

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FjallStore;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_cover_inbound_keys_only() {
        let temp = TempDir::new().unwrap();
        let repos = Repositories::from_store(FjallStore::open(temp.path().join("ledger")).unwrap());
        let registry = HandlerRegistry::with_defaults(repos);

        assert!(registry.has_handler(RoutingKey::TaskStatus));
        assert!(registry.has_handler(RoutingKey::TaskStatusFailed));
        assert!(registry.has_handler(RoutingKey::TaskModeChanged));
        assert!(registry.has_handler(RoutingKey::FileResultVisibilityState));

        // outbound keys are not consumed here
        assert!(!registry.has_handler(RoutingKey::TaskScheduledDataFetch));
        assert!(!registry.has_handler(RoutingKey::TaskMode));
        assert!(matches!(
            registry.get(RoutingKey::UserUser),
            Err(RegistryError::NotFound(RoutingKey::UserUser))
        ));
    }
}
