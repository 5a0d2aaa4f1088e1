use std::sync::{PoisonError, RwLock};

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static EMAIL_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

#[inline]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// False positives possible, never false negatives.
pub fn might_exist(email: &str) -> bool {
    let email = normalize(email);
    EMAIL_FILTER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&email)
}

pub fn insert(email: &str) {
    let email = normalize(email);
    EMAIL_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .add(&email);
}

/// Loads every registered email, holding the write lock one chunk at a time.
pub async fn warmup_email_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut chunks = sqlx::query_scalar::<_, String>("SELECT email FROM users")
        .fetch(pool)
        .chunks(batch_size.max(1));

    let mut total = 0usize;
    while let Some(chunk) = chunks.next().await {
        let emails = chunk
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("email warmup query failed: {e}"))?;
        total += emails.len();

        let mut filter = EMAIL_FILTER.write().unwrap_or_else(PoisonError::into_inner);
        for email in &emails {
            filter.add(&normalize(email));
        }
    }

    tracing::info!(total, "email filter warmed");
    Ok(())
}
