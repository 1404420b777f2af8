use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::auth::password::{
    check_password_strength, hash_password, normalize_email, username_from_email,
    verify_password, with_suffix,
};
use crate::auth::session;
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::extractors::{session_token, CurrentUser};
use crate::state::AppState;

const USERNAME_ATTEMPTS: usize = 5;

// -- Request types --

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub username: String,
    pub token: String,
}

// -- Cookie helpers --

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let max_age_secs = auth.session_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        auth.cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

fn session_response(auth: &AuthConfig, status: StatusCode, body: SessionResponse) -> Response {
    let cookie = session_cookie(auth, &body.token);
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

// -- Handlers --

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> AppResult<Response> {
    let auth = &state.config.auth;
    let email = normalize_email(&req.email)?;
    check_password_strength(&req.password, auth.min_password_len)?;
    let password_hash = hash_password(req.password, auth.bcrypt_cost).await?;

    let user_id = uuid::Uuid::now_v7().to_string();
    let mut rng = StdRng::from_entropy();

    let mut conn = state.db.get()?;
    // Write lock up front: concurrent signups see each other's rows.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let email_taken: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    if email_taken {
        return Err(AppError::Conflict("An account with this email already exists".into()));
    }

    let base = username_from_email(&email);
    let mut username = base.clone();
    let mut found = false;
    for _ in 0..USERNAME_ATTEMPTS {
        let taken: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        if !taken {
            found = true;
            break;
        }
        username = with_suffix(&base, &mut rng);
    }
    if !found {
        return Err(AppError::Conflict("Could not pick a free username".into()));
    }

    tx.execute(
        "INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)",
        params![user_id, email, password_hash],
    )?;
    tx.execute(
        "INSERT INTO profiles (id, username) VALUES (?1, ?2)",
        params![user_id, username],
    )?;
    let token = session::create_session(&tx, &user_id, auth.session_hours)?;
    tx.commit()?;

    tracing::info!(user = %user_id, username = %username, "Account created");

    Ok(session_response(
        auth,
        StatusCode::CREATED,
        SessionResponse {
            user_id,
            username,
            token,
        },
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> AppResult<Response> {
    let auth = &state.config.auth;
    let email = req.email.trim().to_lowercase();

    let account = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT u.id, u.password_hash, COALESCE(p.username, '') FROM users u \
             LEFT JOIN profiles p ON p.id = u.id WHERE u.email = ?1",
            params![email],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
        )
        .optional()?
    };

    let Some((user_id, password_hash, username)) = account else {
        return Err(AppError::Unauthorized);
    };
    if !verify_password(req.password, password_hash).await? {
        tracing::debug!(user = %user_id, "Login rejected");
        return Err(AppError::Unauthorized);
    }

    let token = {
        let conn = state.db.get()?;
        session::create_session(&conn, &user_id, auth.session_hours)?
    };
    tracing::info!(user = %user_id, "Signed in");

    Ok(session_response(
        auth,
        StatusCode::OK,
        SessionResponse {
            user_id,
            username,
            token,
        },
    ))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let auth = &state.config.auth;
    if let Some(token) = session_token(&headers, &auth.cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(auth))],
    )
        .into_response())
}

/// POST /auth/password
pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let auth = &state.config.auth;
    check_password_strength(&req.new_password, auth.min_password_len)?;

    let current_hash: String = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT password_hash FROM users WHERE id = ?1",
            params![user.id],
            |row| row.get(0),
        )?
    };
    if !verify_password(req.current_password, current_hash).await? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }

    let new_hash = hash_password(req.new_password, auth.bcrypt_cost).await?;

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![new_hash, user.id],
    )?;
    let revoked = session::revoke_other_sessions(&tx, &user.id, &user.token)?;
    tx.commit()?;

    tracing::info!(user = %user.id, revoked, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
