use actix_web::{HttpResponse, web};
use anyhow::anyhow;
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use validator::Validate;

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_verification_token, verify_token},
        password::{hash_password, verify_password},
        session::{issue_session, removal_cookie, revoke_session},
    },
    config::Config,
    error::{AppError, FieldErrors},
    mail::Mailer,
    model::role::Role,
    model::user::User,
    models::{LoginForm, RegisterForm, TokenType},
    service::users,
    utils::{http::see_other, name::split_full_name},
};

pub const VERIFY_LINK_INVALID: &str = "The verification link is invalid or has expired";

/// Where each login form sends its user on success.
#[derive(Debug, Clone, Copy)]
enum Portal {
    Member,
    Admin,
}

impl Portal {
    fn home(self) -> &'static str {
        match self {
            Portal::Member => "/attendance",
            Portal::Admin => "/admin/attendance/list",
        }
    }

    fn login_path(self) -> &'static str {
        match self {
            Portal::Member => "/login",
            Portal::Admin => "/admin/login",
        }
    }
}

#[derive(Serialize)]
struct LoginFormView {
    action: &'static str,
    fields: [&'static str; 2],
}

pub async fn login_form() -> HttpResponse {
    HttpResponse::Ok().json(LoginFormView {
        action: Portal::Member.login_path(),
        fields: ["email", "password"],
    })
}

pub async fn admin_login_form() -> HttpResponse {
    HttpResponse::Ok().json(LoginFormView {
        action: Portal::Admin.login_path(),
        fields: ["email", "password"],
    })
}

#[instrument(
    name = "auth_register",
    skip(form, pool, config, mailer),
    fields(email = %form.email)
)]
pub async fn register(
    form: web::Json<RegisterForm>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
) -> Result<HttpResponse, AppError> {
    info!("Registration request received");
    let old = json!({ "name": form.name, "email": form.email });

    let mut errors = match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };
    if form.name.trim().is_empty() && !errors.contains("name") {
        errors.add("name", "Please enter your name");
    }
    if !errors.contains("email") && !users::is_email_available(pool.get_ref(), &form.email).await {
        errors.add("email", users::EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        info!("Validation failed");
        return Err(AppError::invalid(errors).with_old(old));
    }

    let (last_name, first_name) = split_full_name(&form.name);
    let hashed = hash_password(&form.password)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;

    let user_id = users::create_member(pool.get_ref(), &last_name, &first_name, &form.email, &hashed)
        .await
        .map_err(|e| e.with_old(old))?;
    debug!(user_id, "User created");

    let user = users::find_by_id(pool.get_ref(), user_id)
        .await?
        .ok_or_else(|| anyhow!("user {user_id} vanished after insert"))?;

    let cookie = issue_session(pool.get_ref(), &config, &user).await?;
    send_verification(&user, &config, &mailer).await;

    info!(user_id, "Registration successful");
    Ok(see_other("/email/verify").cookie(cookie).finish())
}

#[instrument(name = "auth_login", skip(form, pool, config), fields(email = %form.email))]
pub async fn login(
    form: web::Json<LoginForm>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    start_session(Portal::Member, &form, &pool, &config).await
}

#[instrument(name = "auth_admin_login", skip(form, pool, config), fields(email = %form.email))]
pub async fn admin_login(
    form: web::Json<LoginForm>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    start_session(Portal::Admin, &form, &pool, &config).await
}

async fn start_session(
    portal: Portal,
    form: &LoginForm,
    pool: &MySqlPool,
    config: &Config,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let user = attempt(portal, form, pool).await?;
    let cookie = issue_session(pool, config, &user).await?;

    if let Err(e) = users::touch_last_login(pool, user.id).await {
        // intentionally not failing login
        error!(error = %e, user_id = user.id, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Login successful");
    Ok(see_other(portal.home()).cookie(cookie).finish())
}

/// Checks the credentials. Every failure looks the same to the caller.
async fn attempt(portal: Portal, form: &LoginForm, pool: &MySqlPool) -> Result<User, AppError> {
    let old = json!({ "email": form.email });

    if let Err(e) = form.validate() {
        info!("Validation failed");
        return Err(AppError::invalid(e).with_old(old));
    }

    let Some(user) = users::find_by_email(pool, &form.email).await? else {
        info!("Invalid credentials: user not found");
        return Err(AppError::Authentication { old });
    };

    if let Err(e) = verify_password(&form.password, &user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Authentication { old });
    }

    if matches!(portal, Portal::Admin) && user.role() != Some(Role::Admin) {
        info!(user_id = user.id, "Invalid credentials: not an admin");
        return Err(AppError::Authentication { old });
    }

    Ok(user)
}

pub async fn logout(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    end_session(Portal::Member, &auth, &pool).await
}

pub async fn admin_logout(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    end_session(Portal::Admin, &auth, &pool).await
}

/// Members and admins share one session, so either logout ends it.
async fn end_session(portal: Portal, auth: &AuthUser, pool: &MySqlPool) -> Result<HttpResponse, AppError> {
    revoke_session(pool, &auth.jti).await?;
    info!(user_id = auth.user_id, "Logged out");
    Ok(see_other(portal.login_path()).cookie(removal_cookie()).finish())
}

#[derive(Serialize)]
struct VerificationStatus<'a> {
    email: &'a str,
    verified: bool,
    message: &'static str,
}

pub async fn verify_notice(auth: AuthUser) -> HttpResponse {
    let message = if auth.verified {
        "Your email address is verified"
    } else {
        "A verification link has been sent to your email address"
    };
    HttpResponse::Ok().json(VerificationStatus {
        email: &auth.email,
        verified: auth.verified,
        message,
    })
}

#[instrument(name = "auth_verify_email", skip_all)]
pub async fn verify_email(
    token: web::Path<String>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(claims) if claims.token_type == TokenType::EmailVerification => claims,
        Ok(_) => return Err(AppError::invalid_field("token", VERIFY_LINK_INVALID)),
        Err(e) => {
            info!(error = %e, "Rejected verification token");
            return Err(AppError::invalid_field("token", VERIFY_LINK_INVALID));
        }
    };

    let user = users::find_by_id(pool.get_ref(), claims.user_id)
        .await?
        .filter(|u| u.email == claims.sub)
        .ok_or_else(|| AppError::invalid_field("token", VERIFY_LINK_INVALID))?;

    users::mark_verified(pool.get_ref(), user.id).await?;
    info!(user_id = user.id, "Email verified");

    Ok(see_other("/attendance").finish())
}

pub async fn resend_verification(
    auth: AuthUser,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
) -> Result<HttpResponse, AppError> {
    if auth.verified {
        return Ok(HttpResponse::Ok().json(json!({
            "message": "Your email address is already verified"
        })));
    }

    let token = generate_verification_token(
        auth.user_id,
        &auth.email,
        &config.jwt_secret,
        config.verify_token_ttl,
    )
    .map_err(|e| anyhow!("failed to sign verification token: {e}"))?;

    mailer
        .send_verification(&auth.email, &auth.name, &token)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "A new verification link has been sent"
    })))
}

/// Registration succeeds even if the mail does not go out; the user can
/// ask for another link.
async fn send_verification(user: &User, config: &Config, mailer: &Mailer) {
    let token = match generate_verification_token(
        user.id,
        &user.email,
        &config.jwt_secret,
        config.verify_token_ttl,
    ) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, user_id = user.id, "Failed to sign verification token");
            return;
        }
    };

    if let Err(e) = mailer
        .send_verification(&user.email, &user.full_name(), &token)
        .await
    {
        error!(error = %e, user_id = user.id, "Failed to send verification email");
    }
}
