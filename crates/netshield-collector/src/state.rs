//! Shared application state.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::store::MetricStore;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn MetricStore>,
    /// Connected agents, keyed by device_id from their hello.
    agents: DashMap<String, AgentHandle>,
}

/// Handle to a connected agent.
pub struct AgentHandle {
    /// Channel to send frames to this agent's WebSocket task.
    pub tx: mpsc::Sender<String>,
    /// Distinguishes a reconnect from the connection it replaced.
    pub connection_id: u64,
}

impl AppState {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                agents: DashMap::new(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn MetricStore> {
        &self.inner.store
    }

    pub fn agents(&self) -> &DashMap<String, AgentHandle> {
        &self.inner.agents
    }
}
