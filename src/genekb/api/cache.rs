use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use redis::AsyncCommands;
use sha2::{Digest, Sha256};

use crate::api::facets::FacetSet;
use crate::api::search_utils::Pagination;
use crate::db::FreshnessMarker;
use crate::types::CacheKey;
use crate::web::config::{CacheBackendConfig, CacheConfig};

/// Key of a cached search response.  Any change of the freshness marker, the
/// normalized query, a facet or the page window gives a different key.
pub fn cache_key(marker: &FreshnessMarker, normalized_query: &str, facets: &FacetSet,
                 pagination: Pagination)
                 -> CacheKey
{
    let mut hasher = Sha256::new();
    hasher.update(marker.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(normalized_query.as_bytes());
    hasher.update(b"\n");
    hasher.update(facets.cache_key_part().as_bytes());
    hasher.update(b"\n");
    hasher.update(format!("page={}|per_page={}", pagination.page, pagination.per_page).as_bytes());
    format!("search:{:x}", hasher.finalize())
}

/// Storage for serialized responses.  Entries expire after the backend's
/// TTL.  Callers treat every error as a miss.
#[allow(async_fn_in_trait)]
pub trait SearchCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, payload: &str) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn clear(&self) -> anyhow::Result<()>;
}

pub struct LocalCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (String, Instant)>>,
}

impl LocalCache {
    pub fn new(ttl: Duration) -> LocalCache {
        LocalCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<CacheKey, (String, Instant)>>> {
        self.entries.lock()
            .map_err(|_| anyhow::anyhow!("local cache lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SearchCache for LocalCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.lock()?;

        let expired = match entries.get(key) {
            Some((payload, stored_at)) => {
                if stored_at.elapsed() < self.ttl {
                    return Ok(Some(payload.clone()));
                }
                true
            },
            None => false,
        };

        if expired {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, payload: &str) -> anyhow::Result<()> {
        let mut entries = self.lock()?;

        // drop expired entries so the map doesn't grow without bound
        let ttl = self.ttl;
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);

        entries.insert(key.to_owned(), (payload.to_owned(), Instant::now()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

pub struct RedisCache {
    client: redis::Client,
    prefix: String,
    ttl: Duration,
}

impl RedisCache {
    pub fn new(url: &str, prefix: &str, ttl: Duration) -> anyhow::Result<RedisCache> {
        let client = redis::Client::open(url)?;
        Ok(RedisCache {
            client,
            prefix: prefix.to_owned(),
            ttl,
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn connection(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

impl SearchCache for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.prefixed(key)).await?;
        Ok(payload)
    }

    async fn set(&self, key: &str, payload: &str) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let ttl_secs = self.ttl.as_secs().max(1);
        let _: () = conn.set_ex(self.prefixed(key), payload, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(self.prefixed(key)).await?;
        Ok(())
    }

    // only keys under this cache's prefix are removed
    async fn clear(&self) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(format!("{}*", self.prefix)).await?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }
        Ok(())
    }
}

/// The cache chosen at start up.
pub enum CacheBackend {
    Local(LocalCache),
    Redis(RedisCache),
}

impl CacheBackend {
    pub fn from_config(config: &CacheConfig) -> anyhow::Result<CacheBackend> {
        let ttl = Duration::from_secs(config.ttl_secs);

        let backend =
            match config.backend {
                CacheBackendConfig::Local => CacheBackend::Local(LocalCache::new(ttl)),
                CacheBackendConfig::Redis { ref url, ref prefix } => {
                    tracing::info!(url = %url, prefix = %prefix, "using redis search cache");
                    CacheBackend::Redis(RedisCache::new(url, prefix, ttl)?)
                },
            };

        Ok(backend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis(_) => "redis",
        }
    }
}

impl SearchCache for CacheBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        match self {
            CacheBackend::Local(cache) => cache.get(key).await,
            CacheBackend::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, payload: &str) -> anyhow::Result<()> {
        match self {
            CacheBackend::Local(cache) => cache.set(key, payload).await,
            CacheBackend::Redis(cache) => cache.set(key, payload).await,
        }
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        match self {
            CacheBackend::Local(cache) => cache.delete(key).await,
            CacheBackend::Redis(cache) => cache.delete(key).await,
        }
    }

    async fn clear(&self) -> anyhow::Result<()> {
        match self {
            CacheBackend::Local(cache) => cache.clear().await,
            CacheBackend::Redis(cache) => cache.clear().await,
        }
    }
}
