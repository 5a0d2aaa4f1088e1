use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

use crate::utils::email_filter::normalize;

/// Emails known to belong to an account. Presence is the answer; a miss
/// says nothing and the caller falls through to the database.
static TAKEN: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(12 * 60 * 60))
        .build()
});

pub async fn mark_taken(email: &str) {
    TAKEN.insert(normalize(email), ()).await;
}

pub async fn is_taken(email: &str) -> bool {
    TAKEN.contains_key(&normalize(email))
}

/// Preloads accounts active in the last `days` days, `batch_size` rows at a time.
pub async fn warmup_email_cache(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut chunks = sqlx::query_scalar::<_, String>(
        r#"
        SELECT email
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        "#,
    )
    .bind(days)
    .fetch(pool)
    .chunks(batch_size.max(1));

    let mut loaded = 0usize;
    while let Some(chunk) = chunks.next().await {
        let emails = chunk.into_iter().collect::<Result<Vec<_>, _>>()?;
        loaded += emails.len();
        futures::future::join_all(emails.iter().map(|email| mark_taken(email))).await;
    }

    tracing::info!(loaded, days, "email cache warmed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn marked_email_reads_back_as_taken() {
        assert!(!is_taken("cache-probe@example.com").await);
        mark_taken("Cache-Probe@Example.com").await;
        assert!(is_taken("cache-probe@example.com").await);
    }
}
