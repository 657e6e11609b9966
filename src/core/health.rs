use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ScoutError, SearchPhase};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub lookups: u64,
    pub last_error: Option<String>,
    pub components: ComponentHealth,
}

/// Outcome of the most recent call against each marketplace surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub marketplace_auth: bool,
    pub active_search: bool,
    pub sold_search: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, bool>,
}

impl ComponentHealth {
    pub fn get(&self, key: &str) -> Option<bool> {
        match key {
            "marketplace_auth" => Some(self.marketplace_auth),
            "active_search" => Some(self.active_search),
            "sold_search" => Some(self.sold_search),
            _ => self.extra.get(key).copied(),
        }
    }

    fn all_healthy(&self) -> bool {
        self.marketplace_auth
            && self.active_search
            && self.sold_search
            && self.extra.values().all(|ok| *ok)
    }
}

#[derive(Clone)]
pub struct HealthChecker {
    start_time: std::time::Instant,
    lookups: Arc<AtomicU64>,
    last_error: Arc<RwLock<Option<String>>>,
    status: Arc<RwLock<ComponentHealth>>,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            lookups: Arc::new(AtomicU64::new(0)),
            last_error: Arc::new(RwLock::new(None)),
            status: Arc::new(RwLock::new(ComponentHealth {
                marketplace_auth: false,
                active_search: false,
                sold_search: false,
                extra: HashMap::new(),
            })),
        }
    }

    pub async fn get_status(&self) -> HealthStatus {
        let components = self.status.read().await.clone();

        HealthStatus {
            status: if components.all_healthy() {
                "healthy".to_string()
            } else {
                "degraded".to_string()
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            lookups: self.lookups.load(Ordering::Relaxed),
            last_error: self.last_error.read().await.clone(),
            components,
        }
    }

    pub async fn update_component(&self, component: &str, healthy: bool) {
        let mut status = self.status.write().await;
        match component {
            "marketplace_auth" => status.marketplace_auth = healthy,
            "active_search" => status.active_search = healthy,
            "sold_search" => status.sold_search = healthy,
            _ => {
                status.extra.insert(component.to_string(), healthy);
            }
        }
    }

    /// Marks the surface blamed by a lookup outcome.
    pub async fn record_outcome<T>(&self, outcome: &Result<T, ScoutError>) {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let err = match outcome {
            Ok(_) => {
                let mut status = self.status.write().await;
                status.marketplace_auth = true;
                status.active_search = true;
                status.sold_search = true;
                status.extra.values_mut().for_each(|ok| *ok = true);
                *self.last_error.write().await = None;
                return;
            }
            Err(err) => err,
        };

        let component = match err {
            ScoutError::Credential(_) | ScoutError::UpstreamAuth { .. } => "marketplace_auth",
            ScoutError::UpstreamSearch { phase, .. }
            | ScoutError::MalformedResponse { phase, .. } => match phase {
                SearchPhase::Sold => "sold_search",
                _ => "active_search",
            },
            ScoutError::Transport(_) => "transport",
        };

        self.update_component(component, false).await;
        *self.last_error.write().await = Some(err.kind().to_string());
    }

    /// A lookup that never finished counts against the transport.
    pub async fn record_timeout(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.update_component("transport", false).await;
        *self.last_error.write().await = Some("timeout".to_string());
    }
}
