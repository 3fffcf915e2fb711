//! Shared application state: data source, limits and server settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use datagate_errors::Environment;

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::source::{DataSource, FileSource, StaticSource};

const DEFAULT_BODY_LIMIT: usize = 10 * 1024;

/// Shared application state, cloneable across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

#[derive(Clone)]
struct Inner {
    environment: Environment,
    source: Arc<dyn DataSource>,
    rate_limiter: RateLimiter,
    cors_origins: Vec<String>,
    body_limit: usize,
    public_dir: Option<PathBuf>,
}

impl AppState {
    /// Creates a new application state from config.
    pub fn new(config: &Config) -> Self {
        let source: Arc<dyn DataSource> = match &config.data_file {
            Some(path) => Arc::new(FileSource::new(path.clone())),
            None => Arc::new(StaticSource::default()),
        };

        Self {
            inner: Arc::new(Inner {
                environment: config.environment,
                source,
                rate_limiter: RateLimiter::new(
                    config.rate_limit,
                    Duration::from_secs(config.rate_limit_window),
                ),
                cors_origins: config.cors_origins.clone(),
                body_limit: config.body_limit,
                public_dir: Some(config.public_dir.clone()),
            }),
        }
    }

    /// Creates an in-memory application state (for tests and ephemeral use).
    pub fn new_in_memory(environment: Environment) -> Self {
        Self::new_in_memory_with_source(environment, Arc::new(StaticSource::default()))
    }

    /// Creates an in-memory state serving from the given data source.
    pub fn new_in_memory_with_source(
        environment: Environment,
        source: Arc<dyn DataSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                environment,
                source,
                rate_limiter: RateLimiter::new(0, Duration::from_secs(60)),
                cors_origins: vec![],
                body_limit: DEFAULT_BODY_LIMIT,
                public_dir: None,
            }),
        }
    }

    /// Creates an in-memory state with rate limiting enabled.
    pub fn new_in_memory_with_rate_limit(
        environment: Environment,
        max_requests: u64,
        window: Duration,
    ) -> Self {
        let mut state = Self::new_in_memory(environment);
        state.inner_mut().rate_limiter = RateLimiter::new(max_requests, window);
        state
    }

    /// Creates an in-memory state that serves static files from `dir`.
    pub fn new_in_memory_with_public_dir(environment: Environment, dir: &Path) -> Self {
        let mut state = Self::new_in_memory(environment);
        state.inner_mut().public_dir = Some(dir.to_path_buf());
        state
    }

    /// Replaces the allowed CORS origins.
    #[must_use]
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.inner_mut().cors_origins = origins;
        self
    }

    /// Replaces the JSON body limit.
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.inner_mut().body_limit = limit;
        self
    }

    // Copy-on-write: clones of a state already handed out keep their settings.
    fn inner_mut(&mut self) -> &mut Inner {
        Arc::make_mut(&mut self.inner)
    }

    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.inner.source
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner.cors_origins
    }

    pub fn body_limit(&self) -> usize {
        self.inner.body_limit
    }

    /// Directory served for non-API paths, if any.
    pub fn public_dir(&self) -> Option<&Path> {
        self.inner.public_dir.as_deref()
    }
}
