// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Server-side session lifecycle and cookie signing.
//!
//! A session is identified by a random 256-bit token that only the client
//! holds. The store keeps the token's SHA-256, so a leaked table cannot be
//! replayed. The cookie carries `<token>.<mac>`, where the MAC is an
//! HMAC-SHA256 under a key derived from `SESSION_SECRET`; a bad MAC is
//! rejected before the store is consulted.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::db::SharedStore;
use crate::error::AppError;
use crate::models::{new_id, DeviceInfo, Session};
use crate::time_utils::utc_now_seconds;

type HmacSha256 = Hmac<Sha256>;

/// Cookie holding the signed session token.
pub const SESSION_COOKIE: &str = "session";

/// Absolute lifetime of a session after issue or renewal.
pub const SESSION_DURATION_DAYS: i64 = 7;

const TOKEN_BYTES: usize = 32;
const HKDF_INFO: &[u8] = b"pedalea-conquista/session-cookie/v1";

pub fn session_duration() -> Duration {
    Duration::days(SESSION_DURATION_DAYS)
}

/// Hex SHA-256 of a raw token, used as the store key.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Raw token (64 hex chars)
    pub token: String,
    /// Value for the cookie / bearer header: `<token>.<mac>`
    pub signed: String,
    pub session: Session,
}

/// Issues, validates and revokes sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: SharedStore,
    mac_key: [u8; 32],
    secure_cookies: bool,
    rng: SystemRandom,
}

impl SessionManager {
    pub fn new(store: SharedStore, config: &Config) -> Result<Self, AppError> {
        let hk = Hkdf::<Sha256>::new(None, &config.session_secret);
        let mut mac_key = [0u8; 32];
        hk.expand(HKDF_INFO, &mut mac_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HKDF expand failed: {}", e)))?;

        Ok(Self {
            store,
            mac_key,
            secure_cookies: config.is_production(),
            rng: SystemRandom::new(),
        })
    }

    fn generate_token(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
        Ok(hex::encode(bytes))
    }

    fn mac(&self, token: &str) -> Result<Vec<u8>, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.mac_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
        mac.update(token.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Append the MAC to a raw token.
    pub fn sign(&self, token: &str) -> Result<String, AppError> {
        Ok(format!("{}.{}", token, hex::encode(self.mac(token)?)))
    }

    /// Recover the raw token from a signed value, or `None` if the MAC is wrong.
    pub fn verify(&self, signed: &str) -> Option<String> {
        let (token, mac_hex) = signed.rsplit_once('.')?;
        if token.len() != TOKEN_BYTES * 2 {
            return None;
        }
        let given = hex::decode(mac_hex).ok()?;
        let expected = self.mac(token).ok()?;
        if given.ct_eq(&expected).into() {
            Some(token.to_string())
        } else {
            None
        }
    }

    /// Issue a session for `user_id` and persist it.
    pub async fn create(
        &self,
        user_id: &str,
        device: &DeviceInfo,
    ) -> Result<IssuedSession, AppError> {
        let token = self.generate_token()?;
        let now = utc_now_seconds();
        let session = Session {
            id: new_id(),
            token_hash: hash_token(&token),
            user_id: user_id.to_string(),
            expires_at: now + session_duration(),
            created_at: now,
            last_used: now,
            device_name: device.device_name.clone(),
            device_type: device.device_type.clone(),
            device_model: device.device_model.clone(),
        };
        self.store.put_session(&session).await?;

        tracing::info!(user_id, session_id = %session.id, "Session created");

        let signed = self.sign(&token)?;
        Ok(IssuedSession {
            token,
            signed,
            session,
        })
    }

    /// Resolve a signed cookie value to a live session.
    ///
    /// Expired records are deleted on sight.
    pub async fn validate(&self, signed: &str) -> Result<Option<Session>, AppError> {
        self.validate_at(signed, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        signed: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AppError> {
        let Some(token) = self.verify(signed) else {
            tracing::debug!("Session cookie signature mismatch");
            return Ok(None);
        };

        let token_hash = hash_token(&token);
        let Some(session) = self.store.get_session_by_token_hash(&token_hash).await? else {
            return Ok(None);
        };

        if session.is_expired(now) {
            self.store.delete_session(&token_hash).await?;
            tracing::debug!(session_id = %session.id, "Expired session removed");
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Push the expiry out by a full session lifetime.
    pub async fn renew(&self, session: &Session) -> Result<Session, AppError> {
        let now = utc_now_seconds();
        let mut renewed = session.clone();
        renewed.expires_at = now + session_duration();
        renewed.last_used = now;
        self.store.put_session(&renewed).await?;
        tracing::debug!(session_id = %renewed.id, "Session renewed");
        Ok(renewed)
    }

    pub async fn revoke(&self, session: &Session) -> Result<(), AppError> {
        self.store.delete_session(&session.token_hash).await?;
        tracing::info!(user_id = %session.user_id, session_id = %session.id, "Session revoked");
        Ok(())
    }

    /// Revoke another of the caller's sessions by its public ID.
    pub async fn revoke_other(&self, current: &Session, session_id: &str) -> Result<(), AppError> {
        if current.id == session_id {
            return Err(AppError::BadRequest(
                "Use logout to end the current session".to_string(),
            ));
        }

        let target = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if target.user_id != current.user_id {
            return Err(AppError::Forbidden(
                "Session belongs to another user".to_string(),
            ));
        }

        self.revoke(&target).await
    }

    /// Unexpired sessions of a user, most recently used first.
    pub async fn list_active(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, AppError> {
        let mut sessions: Vec<Session> = self
            .store
            .list_sessions_for_user(user_id)
            .await?
            .into_iter()
            .filter(|s| !s.is_expired(now))
            .collect();
        sessions.sort_by(|a, b| b.last_used.cmp(&a.last_used).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        self.store.delete_expired_sessions(now).await
    }

    /// Run `purge_expired` every `period` on the Tokio runtime.
    pub fn spawn_purger(self: Arc<Self>, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.purge_expired(Utc::now()).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Purged expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "Session purge failed"),
                }
            }
        })
    }

    /// Cookie carrying a signed session value.
    pub fn session_cookie(&self, signed: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, signed))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .max_age(time::Duration::days(SESSION_DURATION_DAYS))
            .build()
    }

    /// Cookie that clears the session, with the same attributes it was set with.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .max_age(time::Duration::ZERO)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryDb, Store};

    fn manager() -> (SessionManager, Arc<MemoryDb>) {
        let db = Arc::new(MemoryDb::new());
        let manager = SessionManager::new(db.clone(), &Config::test_default()).unwrap();
        (manager, db)
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let (manager, db) = manager();
        let issued = manager.create("user-1", &DeviceInfo::default()).await.unwrap();

        assert_eq!(issued.token.len(), 64);
        assert!(issued.signed.starts_with(&issued.token));

        // Only the hash is persisted.
        let stored = db
            .get_session_by_token_hash(&hash_token(&issued.token))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.token_hash, issued.token);

        let session = manager.validate(&issued.signed).await.unwrap().unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.expires_at - session.created_at, session_duration());
    }

    #[tokio::test]
    async fn test_tampered_signature_rejected() {
        let (manager, _) = manager();
        let issued = manager.create("user-1", &DeviceInfo::default()).await.unwrap();

        let mut tampered = issued.signed.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });

        assert!(manager.validate(&tampered).await.unwrap().is_none());
        assert!(manager.validate(&issued.token).await.unwrap().is_none());
        assert!(manager.validate("garbage").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_secret_cannot_forge() {
        let (manager, db) = manager();
        let issued = manager.create("user-1", &DeviceInfo::default()).await.unwrap();

        let mut other_config = Config::test_default();
        other_config.session_secret = b"another_secret_that_is_32_bytes_long".to_vec();
        let other = SessionManager::new(db, &other_config).unwrap();

        assert!(other.validate(&issued.signed).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_deleted_on_lookup() {
        let (manager, db) = manager();
        let issued = manager.create("user-1", &DeviceInfo::default()).await.unwrap();

        let later = issued.session.expires_at;
        assert!(manager
            .validate_at(&issued.signed, later)
            .await
            .unwrap()
            .is_none());
        assert!(db
            .get_session_by_token_hash(&issued.session.token_hash)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_renew_extends_expiry() {
        let (manager, _) = manager();
        let issued = manager.create("user-1", &DeviceInfo::default()).await.unwrap();

        let mut aged = issued.session.clone();
        aged.expires_at = aged.expires_at - Duration::days(3);
        let renewed = manager.renew(&aged).await.unwrap();

        assert!(renewed.expires_at > aged.expires_at);
        assert_eq!(renewed.id, issued.session.id);
        assert!(manager.validate(&issued.signed).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_other_rules() {
        let (manager, _) = manager();
        let mine = manager.create("user-1", &DeviceInfo::default()).await.unwrap();
        let my_phone = manager.create("user-1", &DeviceInfo::default()).await.unwrap();
        let theirs = manager.create("user-2", &DeviceInfo::default()).await.unwrap();

        let err = manager
            .revoke_other(&mine.session, &mine.session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = manager
            .revoke_other(&mine.session, &theirs.session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = manager
            .revoke_other(&mine.session, &new_id())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        manager
            .revoke_other(&mine.session, &my_phone.session.id)
            .await
            .unwrap();
        assert!(manager.validate(&my_phone.signed).await.unwrap().is_none());
        assert!(manager.validate(&mine.signed).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (manager, _) = manager();
        let issued = manager.create("user-1", &DeviceInfo::default()).await.unwrap();
        manager.create("user-2", &DeviceInfo::default()).await.unwrap();

        assert_eq!(manager.purge_expired(Utc::now()).await.unwrap(), 0);
        assert_eq!(
            manager
                .purge_expired(issued.session.expires_at + Duration::seconds(1))
                .await
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_cookie_attributes() {
        let db = Arc::new(MemoryDb::new());
        let mut config = Config::test_default();
        config.app_env = "production".to_string();
        let manager = SessionManager::new(db, &config).unwrap();

        let cookie = manager.session_cookie("value".to_string()).to_string();
        assert!(cookie.starts_with("session=value"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=604800"));

        let removal = manager.removal_cookie().to_string();
        assert!(removal.contains("Max-Age=0"));
        assert!(removal.contains("Path=/"));
    }
}
