use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::{cache::cache::Cache, jwt::SessionKeys, media::MediaStore};

/// Everything a request handler needs, shared between warp filters.
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub cache: Cache,
    pub keys: SessionKeys,
    pub media: MediaStore,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        pool: Pool<Postgres>,
        cache: Cache,
        keys: SessionKeys,
        media: MediaStore,
    ) -> SharedState {
        Arc::new(Self {
            pool,
            cache,
            keys,
            media,
        })
    }
}
