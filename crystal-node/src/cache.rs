//short lived cache of read responses, keyed by the request identity (method, path and query)

use axum::http::StatusCode;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: DashMap<String, (Instant, CachedResponse)>,
}

impl ResponseCache {
    //a zero ttl disables caching
    pub fn new(ttl: Duration) -> Self {
        ResponseCache {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn key(method: &str, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{method} {path}?{q}"),
            _ => format!("{method} {path}"),
        }
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        if !self.is_enabled() {
            return None;
        }
        let hit = self.entries.get(key).map(|entry| entry.value().clone())?;
        if hit.0.elapsed() < self.ttl {
            Some(hit.1)
        } else {
            self.entries.remove(key);
            None
        }
    }

    //only successful reads are kept
    pub fn put(&self, key: String, response: CachedResponse) {
        if self.is_enabled() && response.status == StatusCode::OK {
            self.entries.insert(key, (Instant::now(), response));
        }
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (at, _)| at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> CachedResponse {
        CachedResponse {
            status: StatusCode::OK,
            content_type: "text/plain",
            body: body.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_until_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        let key = ResponseCache::key("GET", "/hits/likes", None);
        cache.put(key.clone(), ok("3"));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get(&key), Some(ok("3")));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        cache.put("a".into(), ok("1"));
        tokio::time::advance(Duration::from_secs(3)).await;
        cache.put("b".into(), ok("2"));
        tokio::time::advance(Duration::from_secs(3)).await;

        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_errors_and_disabled_cache_not_stored() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        cache.put(
            "k".into(),
            CachedResponse {
                status: StatusCode::NOT_FOUND,
                content_type: "text/plain",
                body: "not found".into(),
            },
        );
        assert!(cache.is_empty());

        let off = ResponseCache::new(Duration::ZERO);
        off.put("k".into(), ok("1"));
        assert!(off.get("k").is_none());
    }

    #[test]
    fn test_key_includes_query() {
        assert_eq!(ResponseCache::key("GET", "/hits", Some("dump=true")), "GET /hits?dump=true");
        assert_eq!(ResponseCache::key("GET", "/hits", Some("")), "GET /hits");
    }
}
