use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::feed::{FeedService, SqliteFeedRepository};
use crate::media::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub media: MediaStore,
    pub feed: FeedService<SqliteFeedRepository>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let media = MediaStore::new(config.media_path());
        let feed = FeedService::new(SqliteFeedRepository::new(db.clone()), config.feed.clone());
        Self {
            db,
            config,
            media,
            feed,
        }
    }
}
