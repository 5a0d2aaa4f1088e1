use anyhow::Context;
use sqlx::MySqlPool;

use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::model::user::{StaffMember, User};
use crate::utils::db_utils::is_duplicate_key;
use crate::utils::{email_cache, email_filter};

pub const EMAIL_TAKEN: &str = "This email address is already registered";

const USER_COLUMNS: &str = "id, last_name, first_name, email, password, role, email_verified_at";

pub async fn find_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email_filter::normalize(email))
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &MySqlPool, id: u64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// true  => email AVAILABLE
/// false => email TAKEN (or the lookup failed)
pub async fn is_email_available(pool: &MySqlPool, email: &str) -> bool {
    let email = email_filter::normalize(email);

    // Cuckoo filter: a miss is definitive
    if !email_filter::might_exist(&email) {
        return true;
    }

    // Moka cache: a hit is definitive
    if email_cache::is_taken(&email).await {
        return false;
    }

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(&email)
    .fetch_one(pool)
    .await
    .map(|found| found != 0)
    .unwrap_or(true); // fail-safe

    if exists {
        email_cache::mark_taken(&email).await;
    }
    !exists
}

/// Inserts a member account and records the email as taken. A lost race on
/// the unique key comes back as a validation error on `email`.
pub async fn create_member(
    pool: &MySqlPool,
    last_name: &str,
    first_name: &str,
    email: &str,
    password_hash: &str,
) -> Result<u64, AppError> {
    let email = email_filter::normalize(email);

    let result = sqlx::query(
        r#"
        INSERT INTO users (last_name, first_name, email, password, role)
        VALUES (?, ?, ?, ?, 'member')
        "#,
    )
    .bind(last_name)
    .bind(first_name)
    .bind(&email)
    .bind(password_hash)
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            email_filter::insert(&email);
            email_cache::mark_taken(&email).await;
            Ok(done.last_insert_id())
        }
        Err(e) if is_duplicate_key(&e) => Err(AppError::invalid_field("email", EMAIL_TAKEN)),
        Err(e) => Err(e.into()),
    }
}

/// Creates the admin account, or promotes and verifies an existing one.
/// An existing password is left alone.
pub async fn ensure_admin(pool: &MySqlPool, email: &str, password: &str) -> anyhow::Result<u64> {
    let email = email_filter::normalize(email);
    let hashed = hash_password(password).map_err(|e| anyhow::anyhow!("hash failed: {e}"))?;

    sqlx::query(
        r#"
        INSERT INTO users (last_name, first_name, email, password, role, email_verified_at)
        VALUES ('Admin', '', ?, ?, 'admin', NOW())
        ON DUPLICATE KEY UPDATE
            role = 'admin',
            email_verified_at = COALESCE(email_verified_at, NOW())
        "#,
    )
    .bind(&email)
    .bind(&hashed)
    .execute(pool)
    .await
    .context("failed to provision admin account")?;

    email_filter::insert(&email);
    email_cache::mark_taken(&email).await;

    let id = sqlx::query_scalar::<_, u64>("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(pool)
        .await
        .context("provisioned admin account not found")?;
    Ok(id)
}

pub async fn list_staff(pool: &MySqlPool) -> Result<Vec<StaffMember>, sqlx::Error> {
    sqlx::query_as::<_, StaffMember>(
        r#"
        SELECT id, last_name, first_name, email
        FROM users
        WHERE role = 'member'
        ORDER BY last_name, first_name, id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Sets `email_verified_at` once; later calls keep the first timestamp.
pub async fn mark_verified(pool: &MySqlPool, user_id: u64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET email_verified_at = NOW() WHERE id = ? AND email_verified_at IS NULL")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch_last_login(pool: &MySqlPool, user_id: u64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
