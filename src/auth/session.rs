//! Session cookie and the `sessions` rows backing it.
//!
//! Members and admins share one cookie and one session scope; the guard
//! decides what a session may reach from the user's role.

use actix_web::cookie::{Cookie, SameSite, time::Duration};
use anyhow::anyhow;
use sqlx::MySqlPool;

use crate::auth::jwt::generate_session_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::user::User;

pub const SESSION_COOKIE: &str = "kintai_session";

pub fn session_cookie(token: String, ttl: usize, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .max_age(Duration::seconds(ttl as i64))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .finish()
}

/// Expires the session cookie on the client.
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Stores a fresh session for `user` and returns the cookie that carries it.
pub async fn issue_session(
    pool: &MySqlPool,
    config: &Config,
    user: &User,
) -> Result<Cookie<'static>, AppError> {
    let role = user
        .role()
        .ok_or_else(|| anyhow!("user {} has unknown role {:?}", user.id, user.role))?;

    let (token, claims) = generate_session_token(
        user.id,
        &user.email,
        role,
        &config.jwt_secret,
        config.session_ttl,
    )
    .map_err(|e| anyhow!("failed to sign session token: {e}"))?;

    sqlx::query(
        r#"
        INSERT INTO sessions (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user.id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(session_cookie(token, config.session_ttl, config.cookie_secure))
}

/// Idempotent; revoking an unknown session is not an error.
pub async fn revoke_session(pool: &MySqlPool, jti: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET revoked = 1 WHERE jti = ?")
        .bind(jti)
        .execute(pool)
        .await?;
    Ok(())
}

/// The user behind a live (unrevoked, unexpired) session.
pub async fn find_session_user(pool: &MySqlPool, jti: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.last_name, u.first_name, u.email, u.password, u.role, u.email_verified_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.jti = ?
          AND s.revoked = 0
          AND s.expires_at > NOW()
        "#,
    )
    .bind(jti)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_and_scoped_to_root() {
        let cookie = session_cookie("token".into(), 120, true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(120)));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = removal_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
