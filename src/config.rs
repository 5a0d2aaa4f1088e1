use std::env;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{FixedOffset, NaiveDateTime, Utc};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub session_ttl: usize,
    pub verify_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,

    /// Base URL used to build links in outgoing mail.
    pub app_url: String,
    /// Offset of the business timezone; decides which work date "today" is.
    pub timezone: FixedOffset,
    pub cookie_secure: bool,

    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,

    /// Provisioned at startup when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let offset_minutes: i32 = parse_or("APP_UTC_OFFSET_MINUTES", 540)?;
        let timezone = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| anyhow!("APP_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            session_ttl: parse_or("SESSION_TTL", 7200)?, // 2 hours
            verify_token_ttl: parse_or("VERIFY_TOKEN_TTL", 3600)?,

            rate_login_per_min: parse_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_or("RATE_REGISTER_PER_MIN", 30)?,

            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            timezone,
            cookie_secure: parse_or("COOKIE_SECURE", false)?,

            smtp,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Kintai <no-reply@kintai.local>".to_string()),

            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        })
    }

    /// Current wall-clock time in the business timezone.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_to_default_when_unset() {
        let value: u32 = parse_or("KINTAI_TEST_SURELY_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn now_is_shifted_by_the_configured_offset() {
        let config = Config {
            database_url: String::new(),
            jwt_secret: String::new(),
            server_addr: String::new(),
            session_ttl: 60,
            verify_token_ttl: 60,
            rate_login_per_min: 1,
            rate_register_per_min: 1,
            app_url: String::new(),
            timezone: FixedOffset::east_opt(9 * 3600).unwrap(),
            cookie_secure: false,
            smtp: None,
            mail_from: String::new(),
            admin_email: None,
            admin_password: None,
        };

        let utc = Utc::now().naive_utc();
        let local = config.now();
        let diff = (local - utc).num_minutes();
        assert!((539..=541).contains(&diff), "unexpected offset {diff}");
    }
}
