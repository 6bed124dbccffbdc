//! Persistence layer.
//!
//! Every backend implements [`Store`]; handlers only ever see
//! `Arc<dyn Store>`. Firestore is the production backend, [`MemoryDb`] keeps
//! everything in-process for local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::error::AppError;
use crate::models::{Route, Session, Territory, User};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email uniqueness claims (keyed by hashed normalized email)
    pub const USER_EMAILS: &str = "user_emails";
    pub const SESSIONS: &str = "sessions";
    pub const ROUTES: &str = "routes";
    pub const TERRITORIES: &str = "territories";
}

/// One page of a user's routes plus the total count.
#[derive(Debug, Clone, Default)]
pub struct RoutePage {
    pub routes: Vec<Route>,
    pub total: u64,
}

/// Typed operations shared by all backends.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip proving the backend is reachable.
    async fn ping(&self) -> Result<(), AppError>;

    // ─── Users ───────────────────────────────────────────────────

    /// Insert a new user. Fails with `Conflict` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), AppError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Look up by normalized email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    // ─── Sessions ────────────────────────────────────────────────

    /// Create or replace a session record (keyed by `token_hash`).
    async fn put_session(&self, session: &Session) -> Result<(), AppError>;

    async fn get_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, AppError>;

    /// Look up by public session ID.
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError>;

    /// All sessions of a user, expired or not.
    async fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, AppError>;

    async fn delete_session(&self, token_hash: &str) -> Result<(), AppError>;

    /// Delete sessions with `expires_at <= now`. Returns how many went away.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, AppError>;

    // ─── Routes & Territories ────────────────────────────────────

    /// Store a route and, atomically with it, its territory claim.
    async fn create_route(&self, route: &Route, territory: Option<&Territory>)
        -> Result<(), AppError>;

    /// Fetch a route owned by `user_id`; other users' routes are invisible.
    async fn get_route(&self, user_id: &str, route_id: &str) -> Result<Option<Route>, AppError>;

    /// Routes of a user, newest `created_at` first.
    async fn list_routes(&self, user_id: &str, offset: u32, limit: u32)
        -> Result<RoutePage, AppError>;

    /// Every route of a user (for aggregates), newest first.
    async fn routes_for_user(&self, user_id: &str) -> Result<Vec<Route>, AppError>;

    /// Delete an owned route and its territory. Returns `false` if nothing matched.
    async fn delete_route(&self, user_id: &str, route_id: &str) -> Result<bool, AppError>;

    /// Every territory of a user, newest `timestamp` first.
    async fn territories_for_user(&self, user_id: &str) -> Result<Vec<Territory>, AppError>;

    /// Most recent territories across all users.
    async fn recent_territories(&self, limit: u32) -> Result<Vec<Territory>, AppError>;

    // ─── Maintenance ─────────────────────────────────────────────

    /// Remove every user, session, route and territory. Returns records deleted.
    async fn clear_all(&self) -> Result<usize, AppError>;
}

/// Shared handle used throughout the application.
pub type SharedStore = Arc<dyn Store>;

/// Open the backend selected by configuration.
pub async fn connect(config: &Config) -> Result<SharedStore, AppError> {
    match config.storage_backend {
        StorageBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            Ok(Arc::new(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryDb::new()))
        }
    }
}
