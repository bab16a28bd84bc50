use crate::{config::Config, db::Database, storage::ImageStorage};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// A pending email verification, keyed by phone number
#[derive(Debug, Clone)]
pub struct CodeState {
    pub code: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub storage: ImageStorage,
    pub verification_codes: Arc<DashMap<String, CodeState>>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let storage = ImageStorage::new(&config.uploads.dir);
        Self {
            db,
            config,
            storage,
            verification_codes: Arc::new(DashMap::new()),
        }
    }
}
