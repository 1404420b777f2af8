use axum::extract::{Multipart, Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

use crate::auth::password::{normalize_username, validate_username};
use crate::db::format_timestamp;
use crate::db::models::{profile_from_row, Profile, PROFILE_COLUMNS};
use crate::domain::post::vibe_match;
use crate::domain::{DatedMood, PostView, ProfileStats};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::media::{MediaStore, UploadForm};
use crate::routes::posts::{latest_mood, posts_by_user};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
    pub is_own: bool,
    pub stats: ProfileStats,
    pub posts: Vec<PostView>,
    /// Only present when looking at someone else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibe_match: Option<bool>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(own_profile).post(update_profile))
        .route("/profiles/{id}", get(profile_by_id))
}

async fn own_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ProfileResponse>> {
    let conn = state.db.get()?;
    Ok(Json(load_own(&conn, &state, &user.id)?))
}

async fn profile_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ProfileResponse>> {
    let conn = state.db.get()?;
    if id == user.id {
        return Ok(Json(load_own(&conn, &state, &user.id)?));
    }

    let profile = find_profile(&conn, &id)?.ok_or(AppError::NotFound)?;
    let posts = posts_by_user(&conn, &user.id, &id)?;
    let stats = compute_stats(&state, &posts);
    let vibe = vibe_match(latest_mood(&conn, &user.id)?, latest_mood(&conn, &id)?);

    Ok(Json(ProfileResponse {
        profile,
        is_own: false,
        stats,
        posts,
        vibe_match: Some(vibe),
    }))
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<Profile>> {
    let form = UploadForm::read(&mut multipart, "avatar").await?;
    let limits = &state.config.profile;
    let now = Utc::now();

    let current = {
        let conn = state.db.get()?;
        find_profile(&conn, &user.id)?.ok_or(AppError::NotFound)?
    };

    let new_username = match form.text("username").map(normalize_username) {
        Some(name) if name != current.username => {
            validate_username(&name)?;
            if let Some(days) = cooldown_days_left(
                current.username_last_changed,
                now,
                limits.username_cooldown_days,
            ) {
                return Err(AppError::BadRequest(format!(
                    "Username can only be changed once every {} days. Try again in {} days.",
                    limits.username_cooldown_days, days
                )));
            }
            Some(name)
        }
        _ => None,
    };

    let bio = match form.text("bio") {
        Some(bio) => {
            let bio = bio.trim().to_string();
            if bio.chars().count() > limits.bio_max_chars {
                return Err(AppError::BadRequest(format!(
                    "Bio must be {} characters or less",
                    limits.bio_max_chars
                )));
            }
            bio
        }
        None => current.bio.clone(),
    };

    let avatar_key = match &form.file {
        Some(avatar) => {
            avatar.ensure_image(limits.avatar_max_bytes)?;
            let key = format!(
                "avatars/{}/{}.{}",
                user.id,
                uuid::Uuid::now_v7(),
                avatar.extension()
            );
            state.media.save(&key, &avatar.data).await?;
            Some(key)
        }
        None => None,
    };

    let saved = save_profile(
        &state,
        &user.id,
        new_username.as_deref(),
        &bio,
        avatar_key.as_deref(),
        now,
    );
    let updated = match saved {
        Ok(profile) => profile,
        Err(e) => {
            if let Some(key) = &avatar_key {
                if let Err(cleanup) = state.media.delete(key).await {
                    tracing::warn!(key = %key, "Could not remove orphaned avatar: {}", cleanup);
                }
            }
            return Err(e);
        }
    };

    if avatar_key.is_some() {
        if let Some(old_key) = current
            .avatar_url
            .as_deref()
            .and_then(|url| url.strip_prefix("/media/"))
        {
            if let Err(e) = state.media.delete(old_key).await {
                tracing::warn!(key = %old_key, "Could not remove replaced avatar: {}", e);
            }
        }
    }

    if let Some(name) = &new_username {
        tracing::info!(user = %user.id, from = %current.username, to = %name, "Username changed");
    }
    Ok(Json(updated))
}

fn save_profile(
    state: &AppState,
    user_id: &str,
    new_username: Option<&str>,
    bio: &str,
    avatar_key: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<Profile> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let stamp = format_timestamp(now);

    if let Some(name) = new_username {
        let taken: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE username = ?1 AND id != ?2",
            params![name, user_id],
            |r| r.get(0),
        )?;
        if taken {
            return Err(AppError::Conflict("Username is already taken".into()));
        }
        tx.execute(
            "UPDATE profiles SET username = ?1, username_last_changed = ?2 WHERE id = ?3",
            params![name, stamp, user_id],
        )?;
    }

    if let Some(key) = avatar_key {
        tx.execute(
            "UPDATE profiles SET avatar_url = ?1 WHERE id = ?2",
            params![MediaStore::url_for(key), user_id],
        )?;
    }

    tx.execute(
        "UPDATE profiles SET bio = ?1, updated_at = ?2 WHERE id = ?3",
        params![bio, stamp, user_id],
    )?;

    let profile = find_profile(&tx, user_id)?.ok_or(AppError::NotFound)?;
    tx.commit()?;
    Ok(profile)
}

fn load_own(conn: &Connection, state: &AppState, user_id: &str) -> AppResult<ProfileResponse> {
    let profile = find_profile(conn, user_id)?.ok_or(AppError::NotFound)?;
    let posts = posts_by_user(conn, user_id, user_id)?;
    let mut rng = StdRng::from_entropy();
    let stats = compute_stats(state, &posts).with_advice(&mut rng);

    Ok(ProfileResponse {
        profile,
        is_own: true,
        stats,
        posts,
        vibe_match: None,
    })
}

fn compute_stats(state: &AppState, posts: &[PostView]) -> ProfileStats {
    let moods: Vec<DatedMood> = posts.iter().map(PostView::dated_mood).collect();
    ProfileStats::compute(&moods, Utc::now(), state.config.feed.offset())
}

fn find_profile(conn: &Connection, user_id: &str) -> AppResult<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
    Ok(conn
        .query_row(&sql, params![user_id], profile_from_row)
        .optional()?)
}

/// Days until another username change is allowed, or `None` if it is allowed now.
/// Elapsed time is rounded up to whole days.
fn cooldown_days_left(
    last_changed: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_days: i64,
) -> Option<i64> {
    let last = last_changed?;
    let elapsed_secs = (now - last).num_seconds().max(0);
    let elapsed_days = (elapsed_secs + 86_399) / 86_400;
    if elapsed_days < cooldown_days {
        Some(cooldown_days - elapsed_days)
    } else {
        None
    }
}
