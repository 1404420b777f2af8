use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::Serialize;

use super::parse_timestamp;
use crate::domain::{Mood, PostView, ReactionCounts, ReactionKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub username_last_changed: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
#[error("Unreadable timestamp: {0}")]
pub struct BadTimestamp(pub String);

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| conversion_error(idx, BadTimestamp(raw)))
}

pub fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_timestamp(&raw).ok_or_else(|| conversion_error(idx, BadTimestamp(raw))))
        .transpose()
}

pub fn mood_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Mood> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub fn reaction_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<ReactionKind>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| raw.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Comma-joined reaction values, as produced by `group_concat`. NULL means none.
pub fn reaction_counts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ReactionCounts> {
    let raw: Option<String> = row.get(idx)?;
    let kinds = raw
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<ReactionKind>().map_err(|e| conversion_error(idx, e)))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ReactionCounts::tally(kinds))
}

/// Column list for `PostView` queries. `?1` is the viewer's user id.
pub const POST_VIEW_COLUMNS: &str = "p.id, p.user_id, pr.username, pr.avatar_url, p.image_url, p.caption, p.mood, p.created_at,
    (SELECT group_concat(r.reaction_value) FROM reactions r WHERE r.post_id = p.id),
    (SELECT r.reaction_value FROM reactions r WHERE r.post_id = p.id AND r.user_id = ?1)";

pub const POST_VIEW_FROM: &str = "FROM posts p LEFT JOIN profiles pr ON pr.id = p.user_id";

pub fn post_view_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    Ok(PostView {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_username: row.get(2)?,
        author_avatar_url: row.get(3)?,
        image_url: row.get(4)?,
        caption: row.get(5)?,
        mood: mood_at(row, 6)?,
        created_at: timestamp_at(row, 7)?,
        reactions: reaction_counts_at(row, 8)?,
        viewer_reaction: reaction_at(row, 9)?,
    })
}

pub fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        bio: row.get(2)?,
        avatar_url: row.get(3)?,
        username_last_changed: optional_timestamp_at(row, 4)?,
    })
}

pub const PROFILE_COLUMNS: &str = "id, username, bio, avatar_url, username_last_changed";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn pool() -> (tempfile::TempDir, crate::state::DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("models.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (tmp, pool)
    }

    #[test]
    fn post_view_maps_counts_and_viewer_reaction() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, email, password_hash) VALUES ('a', 'a@x.io', 'h'), ('b', 'b@x.io', 'h');
             INSERT INTO profiles (id, username) VALUES ('a', 'alice');
             INSERT INTO posts (id, user_id, image_key, image_url, caption, mood, created_at)
             VALUES ('p1', 'a', 'a/1.jpg', '/media/a/1.jpg', 'hi', 'Gloomy', '2025-03-12 09:00:00');
             INSERT INTO reactions (post_id, user_id, reaction_value) VALUES ('p1', 'a', 'Hug'), ('p1', 'b', 'Love');",
        )
        .unwrap();

        let sql = format!("SELECT {} {} WHERE p.id = 'p1'", POST_VIEW_COLUMNS, POST_VIEW_FROM);
        let view = conn
            .query_row(&sql, rusqlite::params!["b"], post_view_from_row)
            .unwrap();

        assert_eq!(view.author_username.as_deref(), Some("alice"));
        assert_eq!(view.mood, Mood::Gloomy);
        assert_eq!(view.reactions.total(), 2);
        assert_eq!(view.reactions.hug, 1);
        assert_eq!(view.viewer_reaction, Some(ReactionKind::Love));
    }

    #[test]
    fn unknown_mood_in_storage_is_a_conversion_error() {
        let (_tmp, pool) = pool();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, email, password_hash) VALUES ('a', 'a@x.io', 'h');
             INSERT INTO posts (id, user_id, image_key, image_url, mood, created_at)
             VALUES ('p1', 'a', 'k', '/media/k', 'Sleepy', '2025-03-12 09:00:00');",
        )
        .unwrap();

        let sql = format!("SELECT {} {}", POST_VIEW_COLUMNS, POST_VIEW_FROM);
        let result = conn.query_row(&sql, rusqlite::params!["a"], post_view_from_row);
        assert!(matches!(
            result,
            Err(rusqlite::Error::FromSqlConversionFailure(6, _, _))
        ));
    }
}
