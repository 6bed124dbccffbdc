// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! In-process store backed by hash maps behind a single lock.
//!
//! Holding one lock for all tables makes multi-record writes (route plus
//! territory, route deletion) atomic, mirroring the Firestore transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{RoutePage, Store};
use crate::error::AppError;
use crate::models::user::normalize_email;
use crate::models::{Route, Session, Territory, User};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    /// normalized email -> user ID
    emails: HashMap<String, String>,
    /// token hash -> session
    sessions: HashMap<String, Session>,
    routes: HashMap<String, Route>,
    territories: HashMap<String, Territory>,
}

/// Memory-backed [`Store`]. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let email = normalize_email(&user.email);
        if tables.emails.contains_key(&email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        tables.emails.insert(email, user.id.clone());
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .get(&normalize_email(email))
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn put_session(&self, session: &Session) -> Result<(), AppError> {
        self.tables
            .write()
            .await
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn get_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, AppError> {
        Ok(self.tables.read().await.sessions.get(token_hash).cloned())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .values()
            .find(|s| s.id == session_id)
            .cloned())
    }

    async fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), AppError> {
        self.tables.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - tables.sessions.len())
    }

    async fn create_route(
        &self,
        route: &Route,
        territory: Option<&Territory>,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.routes.insert(route.id.clone(), route.clone());
        if let Some(territory) = territory {
            tables
                .territories
                .insert(territory.id.clone(), territory.clone());
        }
        Ok(())
    }

    async fn get_route(&self, user_id: &str, route_id: &str) -> Result<Option<Route>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .routes
            .get(route_id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn list_routes(
        &self,
        user_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<RoutePage, AppError> {
        let routes = self.routes_for_user(user_id).await?;
        let total = routes.len() as u64;
        let routes = routes
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(RoutePage { routes, total })
    }

    async fn routes_for_user(&self, user_id: &str) -> Result<Vec<Route>, AppError> {
        let mut routes: Vec<Route> = self
            .tables
            .read()
            .await
            .routes
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        routes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(routes)
    }

    async fn delete_route(&self, user_id: &str, route_id: &str) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .routes
            .get(route_id)
            .is_some_and(|r| r.user_id == user_id);
        if !owned {
            return Ok(false);
        }
        tables.routes.remove(route_id);
        tables.territories.retain(|_, t| t.route_id != route_id);
        Ok(true)
    }

    async fn territories_for_user(&self, user_id: &str) -> Result<Vec<Territory>, AppError> {
        let mut territories: Vec<Territory> = self
            .tables
            .read()
            .await
            .territories
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        territories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(territories)
    }

    async fn recent_territories(&self, limit: u32) -> Result<Vec<Territory>, AppError> {
        let mut territories: Vec<Territory> = self
            .tables
            .read()
            .await
            .territories
            .values()
            .cloned()
            .collect();
        territories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        territories.truncate(limit as usize);
        Ok(territories)
    }

    async fn clear_all(&self) -> Result<usize, AppError> {
        let mut tables = self.tables.write().await;
        let count = tables.users.len()
            + tables.sessions.len()
            + tables.routes.len()
            + tables.territories.len();
        *tables = Tables::default();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, RouteStats};
    use chrono::Duration;

    fn route(id: &str, user_id: &str, created_at: DateTime<Utc>) -> Route {
        Route {
            id: id.to_string(),
            user_id: user_id.to_string(),
            coordinates: vec![
                Coordinate {
                    latitude: 1.0,
                    longitude: 1.0,
                },
                Coordinate {
                    latitude: 1.1,
                    longitude: 1.1,
                },
            ],
            stats: RouteStats {
                distance: 1.0,
                duration: 60.0,
                avg_speed: 60.0,
                max_speed: None,
                calories: None,
            },
            start_time: created_at - Duration::minutes(1),
            end_time: created_at,
            conquered_territory: None,
            territory_coords: None,
            name: None,
            description: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn territory(id: &str, route_id: &str, user_id: &str, at: DateTime<Utc>) -> Territory {
        Territory {
            id: id.to_string(),
            user_id: user_id.to_string(),
            route_id: route_id.to_string(),
            coordinates: vec![],
            area: 1.0,
            timestamp: at,
            name: None,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let db = MemoryDb::new();
        db.create_user(&User::new("ana@example.com", "h".to_string(), "Ana"))
            .await
            .unwrap();

        let err = db
            .create_user(&User::new("ANA@example.com ", "h".to_string(), "Ana 2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let found = db.get_user_by_email(" Ana@Example.com").await.unwrap();
        assert_eq!(found.unwrap().name, "Ana");
    }

    #[tokio::test]
    async fn test_route_listing_is_owned_and_newest_first() {
        let db = MemoryDb::new();
        let now = Utc::now();
        db.create_route(&route("r1", "u1", now - Duration::hours(2)), None)
            .await
            .unwrap();
        db.create_route(&route("r2", "u1", now), None).await.unwrap();
        db.create_route(&route("r3", "u2", now), None).await.unwrap();

        let page = db.list_routes("u1", 0, 1).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.routes[0].id, "r2");

        let page = db.list_routes("u1", 1, 10).await.unwrap();
        assert_eq!(page.routes.len(), 1);
        assert_eq!(page.routes[0].id, "r1");

        assert!(db.get_route("u2", "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_route_cascades_to_territory() {
        let db = MemoryDb::new();
        let now = Utc::now();
        db.create_route(&route("r1", "u1", now), Some(&territory("t1", "r1", "u1", now)))
            .await
            .unwrap();

        assert!(!db.delete_route("u2", "r1").await.unwrap());
        assert_eq!(db.territories_for_user("u1").await.unwrap().len(), 1);

        assert!(db.delete_route("u1", "r1").await.unwrap());
        assert!(db.territories_for_user("u1").await.unwrap().is_empty());
        assert!(db.get_route("u1", "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_territories_limit() {
        let db = MemoryDb::new();
        let now = Utc::now();
        for i in 0..5 {
            let id = format!("r{i}");
            db.create_route(
                &route(&id, "u1", now),
                Some(&territory(&format!("t{i}"), &id, "u1", now - Duration::minutes(i))),
            )
            .await
            .unwrap();
        }

        let recent = db.recent_territories(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, "t0");
        assert_eq!(recent[2].id, "t2");
    }

    #[tokio::test]
    async fn test_clear_all() {
        let db = MemoryDb::new();
        db.create_user(&User::new("a@b.co", "h".to_string(), "Al"))
            .await
            .unwrap();
        db.create_route(&route("r1", "u1", Utc::now()), None)
            .await
            .unwrap();

        assert_eq!(db.clear_all().await.unwrap(), 2);
        assert!(db.get_user_by_email("a@b.co").await.unwrap().is_none());
    }
}
