use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::db::models::{post_view_from_row, POST_VIEW_COLUMNS, POST_VIEW_FROM};
use crate::db::format_timestamp;
use crate::domain::calendar::day_start_utc;
use crate::domain::reaction::toggle;
use crate::domain::{Mood, PostView, ReactionChange, ReactionCounts, ReactionKind};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::media::{MediaStore, UploadForm};
use crate::state::AppState;

// --- Requests / responses ---

#[derive(Deserialize)]
pub struct ReactionRequest {
    pub reaction: String,
}

#[derive(Serialize)]
pub struct ReactionResponse {
    pub reactions: ReactionCounts,
    pub viewer_reaction: Option<ReactionKind>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/today", get(todays_post))
        .route("/posts/{id}", delete(delete_post))
        .route("/posts/{id}/reactions", post(toggle_reaction))
        .route("/users/{id}/posts", get(user_posts))
}

// --- Handlers ---

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let form = UploadForm::read(&mut multipart, "image").await?;
    let limits = &state.config.posts;

    let image = form
        .file
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("An image is required".into()))?;
    image.ensure_image(limits.image_max_bytes)?;

    let caption = form.text("caption").unwrap_or_default().trim().to_string();
    if caption.chars().count() > limits.caption_max_chars {
        return Err(AppError::BadRequest(format!(
            "Caption must be {} characters or less",
            limits.caption_max_chars
        )));
    }

    let mood: Mood = form
        .text("mood")
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::BadRequest("Pick a mood".into()))?
        .parse()
        .map_err(|e: crate::domain::mood::UnknownMood| AppError::BadRequest(e.to_string()))?;

    let now = Utc::now();
    let day_start = day_start_utc(now, state.config.feed.offset());
    {
        let conn = state.db.get()?;
        if already_posted_since(&conn, &user.id, day_start)? {
            return Err(AppError::Conflict("You already shared your truth today".into()));
        }
    }

    let key = format!("{}/{}.{}", user.id, now.timestamp_millis(), image.extension());
    state.media.save(&key, &image.data).await?;

    let post_id = uuid::Uuid::now_v7().to_string();
    let inserted = insert_post(&state, &user.id, &post_id, &key, &caption, mood, now, day_start);
    if let Err(e) = inserted {
        if let Err(cleanup) = state.media.delete(&key).await {
            tracing::warn!(key = %key, "Could not remove orphaned upload: {}", cleanup);
        }
        return Err(e);
    }

    let view = {
        let conn = state.db.get()?;
        post_view(&conn, &user.id, &post_id)?.ok_or(AppError::NotFound)?
    };
    tracing::info!(user = %user.username, post = %post_id, mood = %mood, "Daily post created");

    Ok((StatusCode::CREATED, Json(view)).into_response())
}

/// The daily check is repeated under a write lock so two uploads cannot both land.
#[allow(clippy::too_many_arguments)]
fn insert_post(
    state: &AppState,
    user_id: &str,
    post_id: &str,
    key: &str,
    caption: &str,
    mood: Mood,
    now: DateTime<Utc>,
    day_start: DateTime<Utc>,
) -> AppResult<()> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if already_posted_since(&tx, user_id, day_start)? {
        return Err(AppError::Conflict("You already shared your truth today".into()));
    }
    tx.execute(
        "INSERT INTO posts (id, user_id, image_key, image_url, caption, mood, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            post_id,
            user_id,
            key,
            MediaStore::url_for(key),
            caption,
            mood.as_str(),
            format_timestamp(now)
        ],
    )?;
    tx.commit()?;
    Ok(())
}

async fn todays_post(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Option<PostView>>> {
    let day_start = day_start_utc(Utc::now(), state.config.feed.offset());
    let conn = state.db.get()?;
    Ok(Json(daily_post(&conn, &user.id, day_start)?))
}

async fn user_posts(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(author_id): Path<String>,
) -> AppResult<Json<Vec<PostView>>> {
    let conn = state.db.get()?;
    Ok(Json(posts_by_user(&conn, &user.id, &author_id)?))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let image_key = {
        let conn = state.db.get()?;

        let (owner_id, image_key): (String, String) = conn
            .query_row(
                "SELECT user_id, image_key FROM posts WHERE id = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
            .ok_or(AppError::NotFound)?;

        if owner_id != user.id {
            return Err(AppError::Forbidden);
        }

        conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        image_key
    };

    state.media.delete(&image_key).await?;
    tracing::info!(user = %user.id, post = %id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_reaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<ReactionRequest>,
) -> AppResult<Json<ReactionResponse>> {
    let requested: ReactionKind = req
        .reaction
        .trim()
        .parse()
        .map_err(|e: crate::domain::reaction::UnknownReaction| AppError::BadRequest(e.to_string()))?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;

    let author_id: String = tx
        .query_row(
            "SELECT user_id FROM posts WHERE id = ?1",
            params![post_id],
            |r| r.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    let existing: Option<ReactionKind> = tx
        .query_row(
            "SELECT reaction_value FROM reactions WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user.id],
            |r| crate::db::models::reaction_at(r, 0),
        )
        .optional()?
        .flatten();

    let now = format_timestamp(Utc::now());
    match toggle(existing, requested) {
        ReactionChange::Removed => {
            tx.execute(
                "DELETE FROM reactions WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user.id],
            )?;
        }
        ReactionChange::Set(kind) => {
            tx.execute(
                "INSERT INTO reactions (post_id, user_id, reaction_value, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (post_id, user_id)
                 DO UPDATE SET reaction_value = excluded.reaction_value, created_at = excluded.created_at",
                params![post_id, user.id, kind.as_str(), now],
            )?;
            if author_id != user.id {
                tx.execute(
                    "INSERT INTO notifications (id, user_id, actor_id, post_id, type, reaction_value, created_at)
                     VALUES (?1, ?2, ?3, ?4, 'reaction', ?5, ?6)",
                    params![
                        uuid::Uuid::now_v7().to_string(),
                        author_id,
                        user.id,
                        post_id,
                        kind.as_str(),
                        now
                    ],
                )?;
            }
        }
    }

    let view = post_view(&tx, &user.id, &post_id)?.ok_or(AppError::NotFound)?;
    tx.commit()?;

    Ok(Json(ReactionResponse {
        reactions: view.reactions,
        viewer_reaction: view.viewer_reaction,
    }))
}

// --- Query helpers ---

fn already_posted_since(
    conn: &Connection,
    user_id: &str,
    day_start: DateTime<Utc>,
) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE user_id = ?1 AND created_at >= ?2",
        params![user_id, format_timestamp(day_start)],
        |r| r.get(0),
    )?)
}

pub fn post_view(conn: &Connection, viewer_id: &str, post_id: &str) -> AppResult<Option<PostView>> {
    let sql = format!(
        "SELECT {} {} WHERE p.id = ?2",
        POST_VIEW_COLUMNS, POST_VIEW_FROM
    );
    Ok(conn
        .query_row(&sql, params![viewer_id, post_id], post_view_from_row)
        .optional()?)
}

/// Newest first.
pub fn posts_by_user(conn: &Connection, viewer_id: &str, author_id: &str) -> AppResult<Vec<PostView>> {
    let sql = format!(
        "SELECT {} {} WHERE p.user_id = ?2 ORDER BY p.created_at DESC, p.id DESC",
        POST_VIEW_COLUMNS, POST_VIEW_FROM
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params![viewer_id, author_id], post_view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// The user's newest post, provided it was made on or after `day_start`.
pub fn daily_post(
    conn: &Connection,
    user_id: &str,
    day_start: DateTime<Utc>,
) -> AppResult<Option<PostView>> {
    let sql = format!(
        "SELECT {} {} WHERE p.user_id = ?1 AND p.created_at >= ?2
         ORDER BY p.created_at DESC, p.id DESC LIMIT 1",
        POST_VIEW_COLUMNS, POST_VIEW_FROM
    );
    Ok(conn
        .query_row(
            &sql,
            params![user_id, format_timestamp(day_start)],
            post_view_from_row,
        )
        .optional()?)
}

/// Mood of the user's most recent post.
pub fn latest_mood(conn: &Connection, user_id: &str) -> AppResult<Option<Mood>> {
    Ok(conn
        .query_row(
            "SELECT mood FROM posts WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            params![user_id],
            |r| crate::db::models::mood_at(r, 0),
        )
        .optional()?)
}
