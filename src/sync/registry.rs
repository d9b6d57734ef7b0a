use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::config::QueueConfig;
use crate::consolidation::PayloadConsolidator;
use crate::consumer::{CommandExecutor, CommandQueueConsumer};
use crate::error::CommandSyncResult;
use crate::store::CommandStore;

use super::CommandSyncOrchestrator;

/// One orchestrator per identity, sharing a store, an executor and a consolidator
///
/// Each orchestrator gets its own consumer built from the shared
/// [`QueueConfig`], so identities never block each other's queues.
pub struct CommandSyncRegistry {
    store: Arc<dyn CommandStore>,
    executor: Arc<dyn CommandExecutor>,
    consolidator: Option<Arc<dyn PayloadConsolidator>>,
    queue_config: QueueConfig,
    orchestrators: DashMap<String, CommandSyncOrchestrator>,
}

impl CommandSyncRegistry {
    pub fn new(
        store: Arc<dyn CommandStore>,
        executor: Arc<dyn CommandExecutor>,
        consolidator: Option<Arc<dyn PayloadConsolidator>>,
        queue_config: QueueConfig,
    ) -> Self {
        Self {
            store,
            executor,
            consolidator,
            queue_config,
            orchestrators: DashMap::new(),
        }
    }

    /// Orchestrator for `id`, created and initialized on first use
    pub async fn get_or_create(&self, id: &str) -> CommandSyncResult<CommandSyncOrchestrator> {
        let orchestrator = self
            .orchestrators
            .entry(id.to_string())
            .or_insert_with(|| {
                let consumer = CommandQueueConsumer::from_config(
                    format!("{id}-queue"),
                    Arc::clone(&self.executor),
                    &self.queue_config,
                );
                CommandSyncOrchestrator::new(
                    id,
                    consumer,
                    Arc::clone(&self.store),
                    self.consolidator.clone(),
                )
            })
            .clone();

        orchestrator.initialize().await?;
        Ok(orchestrator)
    }

    pub fn get(&self, id: &str) -> Option<CommandSyncOrchestrator> {
        self.orchestrators.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.orchestrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orchestrators.is_empty()
    }

    /// Dispose and forget the orchestrator for `id`
    pub async fn remove(&self, id: &str) -> bool {
        match self.orchestrators.remove(id) {
            Some((_, orchestrator)) => {
                orchestrator.dispose().await;
                true
            }
            None => false,
        }
    }

    pub async fn dispose_all(&self) {
        let ids: Vec<String> = self
            .orchestrators
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in &ids {
            self.remove(id).await;
        }
        info!(disposed = ids.len(), "All command sync orchestrators disposed");
    }
}
