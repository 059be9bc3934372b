//! Bearer-token sessions.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::storage::repository;
use crate::storage::Database;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| Error::Unauthorized("malformed Authorization header".into()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(Error::Unauthorized("expected a bearer token".into()));
    }
    Ok(token)
}

/// Resolve the request's user from its session token.
pub async fn authenticate(db: &Database, headers: &HeaderMap, now: DateTime<Utc>) -> Result<String> {
    let token = bearer_token(headers)?.to_string();
    db.reader()
        .call(move |conn| repository::session_user(conn, &token, now))
        .await?
        .ok_or_else(|| Error::Unauthorized("invalid or expired session".into()))
}

/// Create a session for `user_id` and return its token.
pub async fn create_session(db: &Database, user_id: &str, ttl: Duration) -> Result<String> {
    let token = hex::encode(rand::random::<[u8; 32]>());
    let expires_at = Utc::now() + ttl;
    let (t, user) = (token.clone(), user_id.to_string());
    db.writer()
        .call(move |conn| repository::insert_session(conn, &t, &user, expires_at))
        .await?;
    log::info!("Created session for user {user_id}, expires {expires_at}");
    Ok(token)
}
