use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::domain::calendar::day_start_utc;
use crate::domain::PostView;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::feed::DailyQuota;
use crate::routes::posts::daily_post;
use crate::state::AppState;

const DEFAULT_REPORT_REASON: &str = "Inappropriate Content";
const REPORT_REASON_MAX_CHARS: usize = 500;

#[derive(Serialize)]
pub struct FeedResponse {
    pub quota: DailyQuota,
    pub posts: Vec<PostView>,
    pub my_daily_post: Option<PostView>,
}

#[derive(Deserialize)]
pub struct SeenRequest {
    pub post_id: String,
}

#[derive(Deserialize)]
pub struct ReportRequest {
    pub post_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct QuotaResponse {
    pub quota: DailyQuota,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed", get(load_feed))
        .route("/feed/seen", post(mark_seen))
        .route("/feed/report", post(report_post))
}

async fn load_feed(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<FeedResponse>> {
    let now = Utc::now();
    let mut rng = StdRng::from_entropy();
    let page = state.feed.load(&user.id, now, &mut rng).await?;

    let my_daily_post = {
        let conn = state.db.get()?;
        daily_post(&conn, &user.id, day_start_utc(now, state.config.feed.offset()))?
    };

    Ok(Json(FeedResponse {
        quota: page.quota,
        posts: page.posts,
        my_daily_post,
    }))
}

async fn mark_seen(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SeenRequest>,
) -> AppResult<Json<QuotaResponse>> {
    let quota = state.feed.mark_seen(&user.id, &req.post_id, Utc::now()).await?;
    Ok(Json(QuotaResponse { quota }))
}

async fn report_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ReportRequest>,
) -> AppResult<Json<QuotaResponse>> {
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REPORT_REASON);
    if reason.chars().count() > REPORT_REASON_MAX_CHARS {
        return Err(AppError::BadRequest("Report reason is too long".into()));
    }

    let quota = state
        .feed
        .report(&user.id, &req.post_id, reason, Utc::now())
        .await?;
    Ok(Json(QuotaResponse { quota }))
}
