use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar};
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{error::AppError, models::user::User, state::AppState};

pub const SESSION_COOKIE: &str = "wayfarer_session";

const SESSION_TTL_DAYS: i64 = 30;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Request-scoped context: who is asking. `None` means an anonymous visitor,
/// which is still a valid state for public pages.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|never| -> AppError { match never {} })?;
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        let user = load_session_user(state, cookie.value()).await?;
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }

    pub fn is_logged_in(&self) -> bool {
        self.0.is_some()
    }
}

pub async fn register_user(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required.".into()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("Enter a valid email address.".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters long.".into(),
        ));
    }

    let taken: Option<i64> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = ?1 OR email = ?2")
            .bind(username)
            .bind(email)
            .fetch_optional(&state.db)
            .await?;
    if taken.is_some() {
        return Err(AppError::BadRequest(
            "That username or email is already in use.".into(),
        ));
    }

    let password_hash = hash_password(password)?;
    let id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(username)
    .bind(email)
    .bind(&password_hash)
    .bind(Utc::now())
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    Ok(AuthenticatedUser {
        id,
        username: username.to_string(),
        email: email.to_string(),
    })
}

/// Accepts either the username or the email as identifier. Failures are a
/// uniform `Unauthorized` so the form cannot be used to probe accounts.
pub async fn authenticate_user(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let row = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, created_at, last_login_at \
         FROM users WHERE username = ?1 OR email = ?1",
    )
    .bind(identifier.trim())
    .fetch_optional(&state.db)
    .await?;

    let Some(row) = row else {
        return Err(AppError::Unauthorized);
    };
    if !verify_password(&row.password_hash, password)? {
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(row.id)
        .execute(&state.db)
        .await?;

    Ok(AuthenticatedUser {
        id: row.id,
        username: row.username,
        email: row.email,
    })
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query("INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)")
        .bind(&id)
        .bind(user_id)
        .bind(now)
        .bind(now + Duration::days(SESSION_TTL_DAYS))
        .execute(&state.db)
        .await?;
    Ok(id)
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

#[derive(FromRow)]
struct SessionUserRow {
    id: i64,
    username: String,
    email: String,
    expires_at: DateTime<Utc>,
}

async fn load_session_user(
    state: &AppState,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let row = sqlx::query_as::<_, SessionUserRow>(
        "SELECT u.id, u.username, u.email, s.expires_at \
         FROM sessions s JOIN users u ON u.id = s.user_id \
         WHERE s.id = ?1",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    if row.expires_at <= Utc::now() {
        destroy_session(state, session_id).await?;
        return Ok(None);
    }
    Ok(Some(AuthenticatedUser {
        id: row.id,
        username: row.username,
        email: row.email,
    }))
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, session_id.to_string()))
            .path("/")
            .http_only(true),
    )
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))
}

fn verify_password(stored: &str, candidate: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| AppError::Other(anyhow::anyhow!("stored password hash is invalid: {err}")))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}
