use std::{convert::Infallible, sync::Arc};

use sqlx::{Pool, Postgres};
use warp::Filter;

use crate::{
    actions::load_forbidden_words, cache::cache::Cache, config::Config, error::Error,
    media::MediaStorage, moderation::obscenity::ForbiddenWords,
};

/// Shared by every request handler
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub cache: Cache,
    pub config: Config,
    pub media: MediaStorage,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, cache: Cache, config: Config) -> Self {
        let media = MediaStorage::new(config.media_root.clone(), config.media_url.clone());

        Self {
            pool,
            cache,
            config,
            media,
        }
    }

    pub async fn forbidden_words(&self) -> Result<ForbiddenWords, Error> {
        load_forbidden_words(&self.pool, &self.cache, self.config.obscenity_threshold).await
    }

    /// Absolute URL of an API path, used for pagination links
    pub fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.config.public_url, path)
    }
}

pub fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
