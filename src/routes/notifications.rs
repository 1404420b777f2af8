use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::models::{reaction_at, timestamp_at};
use crate::domain::{GroupedNotifications, NotificationItem};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

const NOTIFICATION_PAGE: u32 = 50;

#[derive(Serialize)]
pub struct UnreadCount {
    pub unread: u32,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread", get(unread_count))
}

/// Returns the grouped inbox, then marks everything read.
async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<GroupedNotifications>> {
    let conn = state.db.get()?;
    let items = recent_notifications(&conn, &user.id, NOTIFICATION_PAGE)?;
    let grouped = GroupedNotifications::group(items, Utc::now(), state.config.feed.offset());

    if !grouped.new.is_empty() {
        let marked = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
            params![user.id],
        )?;
        tracing::debug!(user = %user.id, marked, "Notifications marked read");
    }

    Ok(Json(grouped))
}

async fn unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<UnreadCount>> {
    let conn = state.db.get()?;
    let unread: u32 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        params![user.id],
        |r| r.get(0),
    )?;
    Ok(Json(UnreadCount { unread }))
}

fn recent_notifications(
    conn: &Connection,
    user_id: &str,
    limit: u32,
) -> AppResult<Vec<NotificationItem>> {
    let mut stmt = conn.prepare(
        "SELECT n.id, n.type, n.actor_id, pr.username, pr.avatar_url, n.post_id,
                n.reaction_value, n.is_read, n.created_at
         FROM notifications n
         LEFT JOIN profiles pr ON pr.id = n.actor_id
         WHERE n.user_id = ?1
         ORDER BY n.created_at DESC, n.id DESC
         LIMIT ?2",
    )?;
    let items = stmt
        .query_map(params![user_id, limit], notification_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationItem> {
    Ok(NotificationItem {
        id: row.get(0)?,
        kind: row.get(1)?,
        actor_id: row.get(2)?,
        actor_username: row.get(3)?,
        actor_avatar_url: row.get(4)?,
        post_id: row.get(5)?,
        reaction_value: reaction_at(row, 6)?,
        is_read: row.get(7)?,
        created_at: timestamp_at(row, 8)?,
    })
}
