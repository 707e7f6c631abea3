//! Application state management
//!
//! Contains shared state accessible across all handlers.
//! All storage is backed by PostgreSQL, no in-memory fallbacks.

use crate::config::AuthConfig;
use deadpool_postgres::Pool;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Database connection pool (required)
    pub db_pool: Pool,

    /// Auth settings: shared dashboard token, JWT secret, cookie parameters
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(pool: Pool, auth: AuthConfig) -> Self {
        Self {
            db_pool: pool,
            auth,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
