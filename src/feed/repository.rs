// Repository pattern - isolates all feed database side effects
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use std::collections::HashSet;
use thiserror::Error;

use crate::db::models::{post_view_from_row, POST_VIEW_COLUMNS, POST_VIEW_FROM};
use crate::db::format_timestamp;
use crate::domain::PostView;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

/// Result of recording that a post was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkSeen {
    Recorded,
    /// Already recorded today; the quota is not charged twice.
    AlreadySeen,
    QuotaExhausted,
}

#[async_trait]
pub trait FeedRepository: Send + Sync {
    /// Seen rows for the viewer with `viewed_at >= since`.
    async fn count_seen_since(
        &self,
        viewer_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError>;

    /// Post ids the viewer has seen, optionally only since a point in time.
    async fn seen_post_ids(
        &self,
        viewer_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>, RepositoryError>;

    /// Most recent posts from everyone, newest first.
    async fn recent_posts(
        &self,
        viewer_id: &str,
        limit: u32,
    ) -> Result<Vec<PostView>, RepositoryError>;

    async fn post_author(&self, post_id: &str) -> Result<Option<String>, RepositoryError>;

    /// Atomically checks today's quota and records the view.
    async fn mark_seen(
        &self,
        viewer_id: &str,
        post_id: &str,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<MarkSeen, RepositoryError>;

    /// Files a report and hides the post from the reporter in one transaction.
    async fn report_and_hide(
        &self,
        reporter_id: &str,
        post_id: &str,
        reason: &str,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

pub struct SqliteFeedRepository {
    pool: DbPool,
}

impl SqliteFeedRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn seen_today(
    conn: &rusqlite::Connection,
    viewer_id: &str,
    post_id: &str,
    day_start: &str,
) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM seen_posts
         WHERE user_id = ?1 AND post_id = ?2 AND viewed_at >= ?3",
        params![viewer_id, post_id, day_start],
        |row| row.get(0),
    )
}

fn insert_seen(
    conn: &rusqlite::Connection,
    viewer_id: &str,
    post_id: &str,
    now: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO seen_posts (id, user_id, post_id, viewed_at) VALUES (?1, ?2, ?3, ?4)",
        params![uuid::Uuid::now_v7().to_string(), viewer_id, post_id, now],
    )?;
    Ok(())
}

#[async_trait]
impl FeedRepository for SqliteFeedRepository {
    async fn count_seen_since(
        &self,
        viewer_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        let conn = self.pool.get()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM seen_posts WHERE user_id = ?1 AND viewed_at >= ?2",
            params![viewer_id, format_timestamp(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn seen_post_ids(
        &self,
        viewer_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>, RepositoryError> {
        let conn = self.pool.get()?;
        // An empty lower bound sorts before every stored timestamp.
        let since = since.map(format_timestamp).unwrap_or_default();

        let mut stmt = conn.prepare(
            "SELECT DISTINCT post_id FROM seen_posts
             WHERE user_id = ?1 AND viewed_at >= ?2 AND post_id IS NOT NULL",
        )?;
        let ids = stmt
            .query_map(params![viewer_id, since], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }

    async fn recent_posts(
        &self,
        viewer_id: &str,
        limit: u32,
    ) -> Result<Vec<PostView>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} {} ORDER BY p.created_at DESC LIMIT ?2",
            POST_VIEW_COLUMNS, POST_VIEW_FROM
        );
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params![viewer_id, limit], post_view_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn post_author(&self, post_id: &str) -> Result<Option<String>, RepositoryError> {
        let conn = self.pool.get()?;
        let author = conn
            .query_row(
                "SELECT user_id FROM posts WHERE id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(author)
    }

    async fn mark_seen(
        &self,
        viewer_id: &str,
        post_id: &str,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<MarkSeen, RepositoryError> {
        let mut conn = self.pool.get()?;
        let day_start = format_timestamp(day_start);
        let now = format_timestamp(now);

        // IMMEDIATE takes the write lock up front so two requests cannot both
        // pass the quota check.
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        if seen_today(&tx, viewer_id, post_id, &day_start)? {
            return Ok(MarkSeen::AlreadySeen);
        }

        let viewed: u32 = tx.query_row(
            "SELECT COUNT(*) FROM seen_posts WHERE user_id = ?1 AND viewed_at >= ?2",
            params![viewer_id, day_start],
            |row| row.get(0),
        )?;
        if viewed >= limit {
            return Ok(MarkSeen::QuotaExhausted);
        }

        insert_seen(&tx, viewer_id, post_id, &now)?;
        tx.commit()?;
        Ok(MarkSeen::Recorded)
    }

    async fn report_and_hide(
        &self,
        reporter_id: &str,
        post_id: &str,
        reason: &str,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        let day_start = format_timestamp(day_start);
        let now = format_timestamp(now);

        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO reports (id, reporter_id, post_id, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid::Uuid::now_v7().to_string(),
                reporter_id,
                post_id,
                reason,
                now
            ],
        )?;

        if !seen_today(&tx, reporter_id, post_id, &day_start)? {
            insert_seen(&tx, reporter_id, post_id, &now)?;
        }

        tx.commit()?;
        Ok(())
    }
}
