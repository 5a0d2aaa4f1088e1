//! Outgoing mail. Only the email-verification message exists today.
//!
//! With no `SMTP_HOST` configured the link is written to the log instead,
//! which is what local development uses.
use anyhow::{Context, Result};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;

#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    app_url: String,
    link_ttl_minutes: usize,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let from: Mailbox = config
            .mail_from
            .parse()
            .with_context(|| format!("MAIL_FROM is not a valid mailbox: {}", config.mail_from))?;

        let transport = match &config.smtp {
            Some(smtp) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                    .with_context(|| format!("invalid SMTP relay {}", smtp.host))?
                    .port(smtp.port);
                if !smtp.username.is_empty() {
                    builder = builder.credentials(Credentials::new(
                        smtp.username.clone(),
                        smtp.password.clone(),
                    ));
                }
                Some(builder.build())
            }
            None => None,
        };

        Ok(Self {
            transport,
            from,
            app_url: config.app_url.trim_end_matches('/').to_string(),
            link_ttl_minutes: config.verify_token_ttl / 60,
        })
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/email/verify/{}", self.app_url, token)
    }

    #[tracing::instrument(name = "mail_verification", skip(self, name, token))]
    pub async fn send_verification(&self, to_email: &str, name: &str, token: &str) -> Result<()> {
        let link = self.verification_link(token);

        let Some(transport) = &self.transport else {
            tracing::info!(%link, "SMTP not configured; verification link logged instead");
            return Ok(());
        };

        let to: Mailbox = to_email
            .parse()
            .with_context(|| format!("invalid recipient {to_email}"))?;
        let body = format!(
            "{name},\n\n\
             Please confirm your email address by opening the link below.\n\n\
             {link}\n\n\
             The link expires in {} minutes. If you did not register, ignore this message.\n",
            self.link_ttl_minutes
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Verify your email address")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("failed to build verification email")?;

        transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        tracing::info!("Verification email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "secret".into(),
            server_addr: "127.0.0.1:0".into(),
            session_ttl: 7200,
            verify_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_register_per_min: 30,
            app_url: "http://localhost:8080/".into(),
            timezone: FixedOffset::east_opt(9 * 3600).unwrap(),
            cookie_secure: false,
            smtp: None,
            mail_from: "Kintai <no-reply@kintai.local>".into(),
            admin_email: None,
            admin_password: None,
        }
    }

    #[test]
    fn link_points_at_the_verify_route() {
        let mailer = Mailer::from_config(&config()).unwrap();
        assert_eq!(
            mailer.verification_link("abc"),
            "http://localhost:8080/email/verify/abc"
        );
    }

    #[actix_web::test]
    async fn without_smtp_the_link_is_only_logged() {
        let mailer = Mailer::from_config(&config()).unwrap();
        mailer
            .send_verification("taro@example.com", "Yamada Taro", "abc")
            .await
            .unwrap();
    }

    #[test]
    fn bad_sender_is_a_config_error() {
        let mut config = config();
        config.mail_from = "not a mailbox".into();
        assert!(Mailer::from_config(&config).is_err());
    }
}
