//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor. Every field is cheap to clone and safe for
//! concurrent use; handlers never lock anything themselves.

use std::sync::Arc;

use roster_schema::SchemaValidator;

use crate::config::HttpSettings;
use crate::middleware::metrics::ApiMetrics;
use crate::store::ProfileStore;

/// Dependencies injected into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The profile collection.
    pub store: Arc<dyn ProfileStore>,
    /// Create/update payload validator.
    pub validator: SchemaValidator,
    /// Prometheus registry rendered at `/metrics`.
    pub metrics: ApiMetrics,
    /// CORS and timeout settings applied by [`app`](crate::app).
    pub http: HttpSettings,
}

impl AppState {
    /// Build state with default transport settings and a fresh metrics registry.
    pub fn new(store: Arc<dyn ProfileStore>, validator: SchemaValidator) -> Self {
        Self {
            store,
            validator,
            metrics: ApiMetrics::new(),
            http: HttpSettings::default(),
        }
    }

    pub fn with_http(mut self, http: HttpSettings) -> Self {
        self.http = http;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProfileStore;

    #[test]
    fn new_uses_default_http_settings() {
        let state = AppState::new(
            Arc::new(InMemoryProfileStore::new()),
            SchemaValidator::from_dir("schemas"),
        );
        assert_eq!(state.http, HttpSettings::default());
        assert_eq!(state.store.backend(), "memory");
        assert_eq!(state.metrics.requests(), 0);
    }

    #[test]
    fn with_http_replaces_settings() {
        let http = HttpSettings {
            cors_origins: vec![],
            request_timeout: std::time::Duration::from_secs(1),
        };
        let state = AppState::new(
            Arc::new(InMemoryProfileStore::new()),
            SchemaValidator::from_dir("schemas"),
        )
        .with_http(http.clone());
        assert_eq!(state.http, http);
    }
}
