// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! Pedalea y Conquista: ride your city, claim its streets.
//!
//! This crate provides the backend API where riders record GPS routes,
//! claim the territory they enclose and follow their statistics.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::SharedStore;
use services::{RateLimiter, SessionManager};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SharedStore,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    /// Wire the services around an opened store.
    pub fn new(config: Config, db: SharedStore) -> Result<Self, error::AppError> {
        let sessions = Arc::new(SessionManager::new(db.clone(), &config)?);
        Ok(Self {
            config,
            db,
            rate_limiter: Arc::new(RateLimiter::new()),
            sessions,
        })
    }
}
