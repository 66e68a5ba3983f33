//! Two-tier in-memory index of taken usernames, consulted before the
//! database on registration:
//!
//! 1. a cuckoo filter holding every username: a miss means "available";
//! 2. a moka cache of recently active usernames: a hit means "taken".
//!
//! Anything else falls through to a database lookup.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

static TAKEN: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

#[inline]
fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

/// False positives possible, false negatives not.
pub fn might_exist(username: &str) -> bool {
    match FILTER.read() {
        Ok(filter) => filter.contains(&normalize(username)),
        // a poisoned filter cannot rule anything out
        Err(_) => true,
    }
}

fn add_to_filter(names: &[String]) {
    if let Ok(mut filter) = FILTER.write() {
        for name in names {
            filter.add(name);
        }
    }
}

/// Records a freshly registered username in both tiers.
pub async fn remember(username: &str) {
    let name = normalize(username);
    add_to_filter(std::slice::from_ref(&name));
    TAKEN.insert(name, ()).await;
}

pub async fn is_cached_taken(username: &str) -> bool {
    TAKEN.contains_key(&normalize(username))
}

/// true => available, false => taken. Database errors count as taken.
pub async fn is_available(username: &str, pool: &MySqlPool) -> bool {
    if !might_exist(username) {
        return true;
    }

    if is_cached_taken(username).await {
        return false;
    }

    let name = normalize(username);
    // MySQL returns EXISTS as an integer
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = ? LIMIT 1)",
    )
    .bind(&name)
    .fetch_one(pool)
    .await
    .map(|n| n != 0)
    .unwrap_or(true);

    if exists {
        TAKEN.insert(name, ()).await;
    }

    !exists
}

/// Streams every username into the filter and the recently active ones
/// (logged in within `recent_days`) into the cache, `batch_size` at a time.
pub async fn warmup(pool: &MySqlPool, recent_days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT username,
               CAST(COALESCE(last_login_at >= NOW() - INTERVAL ? DAY, 0) AS SIGNED) AS recent
        FROM users
        "#,
    )
    .bind(recent_days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut recent = Vec::new();
    let (mut total, mut total_recent) = (0usize, 0usize);

    while let Some(row) = stream.next().await {
        let (username, recent_flag) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
        let is_recent = recent_flag != 0;
        let name = normalize(&username);
        total += 1;

        if is_recent {
            recent.push(name.clone());
            total_recent += 1;
        }
        batch.push(name);

        if batch.len() >= batch_size {
            add_to_filter(&batch);
            batch.clear();
            cache_batch(&mut recent).await;
        }
    }

    add_to_filter(&batch);
    cache_batch(&mut recent).await;

    log::info!(
        "Username index warmup complete: {} users, {} recent (last {} days)",
        total,
        total_recent,
        recent_days
    );

    Ok(())
}

async fn cache_batch(names: &mut Vec<String>) {
    let inserts: Vec<_> = names.drain(..).map(|n| TAKEN.insert(n, ())).collect();
    futures::future::join_all(inserts).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn remembered_names_are_found_case_insensitively() {
        assert!(!might_exist("Index-Test-Alice"));

        remember("Index-Test-Alice").await;

        assert!(might_exist("index-test-alice"));
        assert!(is_cached_taken("  INDEX-TEST-ALICE ").await);
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize("  JDoe "), "jdoe");
    }
}
