use actix_web::error::ErrorInternalServerError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use sqlx::MySqlPool;

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::auth::session::{SESSION_COOKIE, find_session_user, removal_cookie};
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::TokenType;
use crate::utils::http::see_other;

/// Which identity a route group accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Any signed-in user, verified or not.
    Session,
    /// Signed-in user with a verified email.
    Member,
    /// Verified user with the admin role.
    Admin,
}

impl Guard {
    pub fn login_path(self) -> &'static str {
        match self {
            Guard::Admin => "/admin/login",
            Guard::Session | Guard::Member => "/login",
        }
    }
}

pub async fn session_guard(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    guard(Guard::Session, req, next).await
}

pub async fn member_guard(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    guard(Guard::Member, req, next).await
}

pub async fn admin_guard(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    guard(Guard::Admin, req, next).await
}

async fn guard(
    guard: Guard,
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let had_cookie = req.cookie(SESSION_COOKIE).is_some();

    let user = match authenticate(&req).await? {
        Some(user) => user,
        None => {
            let mut resp = see_other(guard.login_path());
            if had_cookie {
                resp.cookie(removal_cookie());
            }
            return Ok(req.into_response(resp.finish()));
        }
    };

    if guard != Guard::Session && !user.verified {
        return Ok(req.into_response(see_other("/email/verify").finish()));
    }

    if guard == Guard::Admin && user.role != Role::Admin {
        tracing::info!(user_id = user.user_id, path = %req.path(), "Member denied admin route");
        return Err(AppError::Forbidden("admin only").into());
    }

    req.extensions_mut().insert(user);

    next.call(req).await
}

async fn authenticate(req: &ServiceRequest) -> Result<Option<AuthUser>, Error> {
    let Some(cookie) = req.cookie(SESSION_COOKIE) else {
        return Ok(None);
    };

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| ErrorInternalServerError("App config missing"))?;

    let claims = match verify_token(cookie.value(), &config.jwt_secret) {
        Ok(claims) if claims.token_type == TokenType::Session => claims,
        Ok(_) => return Ok(None),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected session cookie");
            return Ok(None);
        }
    };

    let pool = req
        .app_data::<Data<MySqlPool>>()
        .ok_or_else(|| ErrorInternalServerError("Database pool missing"))?;

    let user = find_session_user(pool.get_ref(), &claims.jti)
        .await
        .map_err(AppError::from)?;

    Ok(user.and_then(|u| AuthUser::from_session(&u, claims.jti)))
}
