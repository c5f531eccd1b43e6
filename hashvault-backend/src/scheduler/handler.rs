use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::TaskKind;

/// Work performed on every tick of a task kind
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Returns a short summary for the log, or an error message
    async fn run(&self) -> Result<String, String>;
}

/// Task kind to handler table, built once at startup
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) {
        if self.handlers.insert(kind, handler).is_some() {
            log::warn!("[Scheduler] Replacing handler for {}", kind);
        }
    }

    pub fn with(mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&kind).cloned()
    }
}
