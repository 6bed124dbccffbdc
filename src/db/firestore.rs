// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Firestore client wrapper with typed operations.
//!
//! Collections:
//! - `users` (profiles, keyed by user ID)
//! - `user_emails` (uniqueness claims, keyed by hashed normalized email)
//! - `sessions` (keyed by token hash)
//! - `routes` and `territories` (keyed by their IDs)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::FirestoreQueryDirection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{collections, RoutePage, Store};
use crate::error::AppError;
use crate::models::user::normalize_email;
use crate::models::{Route, Session, Territory, User};
use crate::time_utils::format_utc_rfc3339;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Claim document reserving an email for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailClaim {
    email: String,
    user_id: String,
}

fn email_claim_id(email: &str) -> String {
    hex::encode(Sha256::digest(normalize_email(email).as_bytes()))
}

fn db_error(e: FirestoreError) -> AppError {
    AppError::Database(e.to_string())
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip credential discovery entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    fn client(&self) -> &firestore::FirestoreDb {
        &self.client
    }

    /// Read every document of a collection.
    async fn all_in<T>(&self, collection: &str) -> Result<Vec<T>, AppError>
    where
        T: for<'de> Deserialize<'de> + Send,
    {
        self.client()
            .fluent()
            .select()
            .from(collection)
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.client();

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    async fn ping(&self) -> Result<(), AppError> {
        let _: Vec<User> = self
            .client()
            .fluent()
            .select()
            .from(collections::USERS)
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let claim = EmailClaim {
            email: normalize_email(&user.email),
            user_id: user.id.clone(),
        };
        let claim_id = email_claim_id(&claim.email);

        // Insert fails if the document exists, which makes the claim the
        // uniqueness check.
        let inserted: Result<EmailClaim, FirestoreError> = self
            .client()
            .fluent()
            .insert()
            .into(collections::USER_EMAILS)
            .document_id(&claim_id)
            .object(&claim)
            .execute()
            .await;
        match inserted {
            Ok(_) => {}
            Err(FirestoreError::DataConflictError(_)) => {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
            Err(e) => return Err(db_error(e)),
        }

        let written: Result<(), FirestoreError> = self
            .client()
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await;

        if let Err(e) = written {
            // Release the claim so the email can be retried.
            if let Err(cleanup) = self
                .client()
                .fluent()
                .delete()
                .from(collections::USER_EMAILS)
                .document_id(&claim_id)
                .execute()
                .await
            {
                tracing::warn!(error = %cleanup, "Failed to release email claim");
            }
            return Err(db_error(e));
        }

        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.client()
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(db_error)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let claim: Option<EmailClaim> = self
            .client()
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&email_claim_id(email))
            .await
            .map_err(db_error)?;

        match claim {
            Some(claim) => self.get_user(&claim.user_id).await,
            None => Ok(None),
        }
    }

    // ─── Session Operations ──────────────────────────────────────

    async fn put_session(&self, session: &Session) -> Result<(), AppError> {
        let _: () = self
            .client()
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(&session.token_hash)
            .object(session)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn get_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, AppError> {
        self.client()
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(token_hash)
            .await
            .map_err(db_error)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        let sessions: Vec<Session> = self
            .client()
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .filter(|q| q.for_all([q.field("id").eq(session_id)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(db_error)?;
        Ok(sessions.into_iter().next())
    }

    async fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        self.client()
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), AppError> {
        self.client()
            .fluent()
            .delete()
            .from(collections::SESSIONS)
            .document_id(token_hash)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let cutoff = format_utc_rfc3339(now);
        let expired: Vec<Session> = self
            .client()
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .filter(move |q| q.for_all([q.field("expires_at").less_than_or_equal(cutoff.clone())]))
            .obj()
            .query()
            .await
            .map_err(db_error)?;

        self.batch_delete(&expired, collections::SESSIONS, |s: &Session| {
            s.token_hash.clone()
        })
        .await?;

        Ok(expired.len())
    }

    // ─── Route & Territory Operations ────────────────────────────

    async fn create_route(
        &self,
        route: &Route,
        territory: Option<&Territory>,
    ) -> Result<(), AppError> {
        let mut transaction = self
            .client()
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.client()
            .fluent()
            .update()
            .in_col(collections::ROUTES)
            .document_id(&route.id)
            .object(route)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add route to transaction: {}", e))
            })?;

        if let Some(territory) = territory {
            self.client()
                .fluent()
                .update()
                .in_col(collections::TERRITORIES)
                .document_id(&territory.id)
                .object(territory)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add territory to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            route_id = %route.id,
            user_id = %route.user_id,
            territory = territory.is_some(),
            "Route stored"
        );
        Ok(())
    }

    async fn get_route(&self, user_id: &str, route_id: &str) -> Result<Option<Route>, AppError> {
        let route: Option<Route> = self
            .client()
            .fluent()
            .select()
            .by_id_in(collections::ROUTES)
            .obj()
            .one(route_id)
            .await
            .map_err(db_error)?;
        Ok(route.filter(|r| r.user_id == user_id))
    }

    async fn list_routes(
        &self,
        user_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<RoutePage, AppError> {
        let routes: Vec<Route> = self
            .client()
            .fluent()
            .select()
            .from(collections::ROUTES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(db_error)?;

        // Project only the ID to count without shipping whole tracks.
        let total = self
            .client()
            .fluent()
            .select()
            .fields(["id"])
            .from(collections::ROUTES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .query()
            .await
            .map_err(db_error)?
            .len() as u64;

        Ok(RoutePage { routes, total })
    }

    async fn routes_for_user(&self, user_id: &str) -> Result<Vec<Route>, AppError> {
        self.client()
            .fluent()
            .select()
            .from(collections::ROUTES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn delete_route(&self, user_id: &str, route_id: &str) -> Result<bool, AppError> {
        if self.get_route(user_id, route_id).await?.is_none() {
            return Ok(false);
        }

        let territories: Vec<Territory> = self
            .client()
            .fluent()
            .select()
            .from(collections::TERRITORIES)
            .filter(|q| q.for_all([q.field("route_id").eq(route_id)]))
            .obj()
            .query()
            .await
            .map_err(db_error)?;

        let mut transaction = self
            .client()
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.client()
            .fluent()
            .delete()
            .from(collections::ROUTES)
            .document_id(route_id)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add route deletion to transaction: {}", e))
            })?;

        for territory in &territories {
            self.client()
                .fluent()
                .delete()
                .from(collections::TERRITORIES)
                .document_id(&territory.id)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add territory deletion to transaction: {}",
                        e
                    ))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            user_id,
            route_id,
            territories = territories.len(),
            "Route deleted"
        );
        Ok(true)
    }

    async fn territories_for_user(&self, user_id: &str) -> Result<Vec<Territory>, AppError> {
        self.client()
            .fluent()
            .select()
            .from(collections::TERRITORIES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("timestamp", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn recent_territories(&self, limit: u32) -> Result<Vec<Territory>, AppError> {
        self.client()
            .fluent()
            .select()
            .from(collections::TERRITORIES)
            .order_by([("timestamp", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    // ─── Maintenance ─────────────────────────────────────────────

    async fn clear_all(&self) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        let territories: Vec<Territory> = self.all_in(collections::TERRITORIES).await?;
        self.batch_delete(&territories, collections::TERRITORIES, |t: &Territory| {
            t.id.clone()
        })
        .await?;
        deleted_count += territories.len();

        let routes: Vec<Route> = self.all_in(collections::ROUTES).await?;
        self.batch_delete(&routes, collections::ROUTES, |r: &Route| r.id.clone())
            .await?;
        deleted_count += routes.len();

        let sessions: Vec<Session> = self.all_in(collections::SESSIONS).await?;
        self.batch_delete(&sessions, collections::SESSIONS, |s: &Session| {
            s.token_hash.clone()
        })
        .await?;
        deleted_count += sessions.len();

        let claims: Vec<EmailClaim> = self.all_in(collections::USER_EMAILS).await?;
        self.batch_delete(&claims, collections::USER_EMAILS, |c: &EmailClaim| {
            email_claim_id(&c.email)
        })
        .await?;

        let users: Vec<User> = self.all_in(collections::USERS).await?;
        self.batch_delete(&users, collections::USERS, |u: &User| u.id.clone())
            .await?;
        deleted_count += users.len();

        tracing::info!(deleted_count, "Cleared all collections");
        Ok(deleted_count)
    }
}
