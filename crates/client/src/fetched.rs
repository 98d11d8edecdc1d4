//! Cache-aware read path shared by every feed client.

use std::future::Future;

use costmap_core::{Error, Source, Store};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A payload plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fetched<T> {
    pub data: T,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<i64>,
}

impl<T> Fetched<T> {
    pub fn fresh(data: T) -> Self {
        Self { data, cached: false, cache_age: None }
    }

    pub fn hit(data: T, age_seconds: i64) -> Self {
        Self { data, cached: true, cache_age: Some(age_seconds) }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched { data: f(self.data), cached: self.cached, cache_age: self.cache_age }
    }

    /// Fallible [`Fetched::map`] that keeps the cache metadata.
    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U, Error>) -> Result<Fetched<U>, Error> {
        Ok(Fetched { data: f(self.data)?, cached: self.cached, cache_age: self.cache_age })
    }
}

/// Return the cached payload for `(source, key)` or run `fetch` and write it through.
///
/// A failed cache write is logged by the store and never fails the read.
pub async fn read_through<T, F, Fut>(store: &Store, source: Source, key: &str, fetch: F) -> Result<Fetched<T>, Error>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    if let Some(hit) = store.get::<T>(source, key).await {
        tracing::debug!(source = %source, key, age_seconds = hit.age_seconds, "cache hit");
        return Ok(Fetched::hit(hit.payload, hit.age_seconds));
    }

    tracing::debug!(source = %source, key, "cache miss");
    let data = fetch().await?;
    if !store.set(source, key, &data, source.ttl()).await {
        tracing::debug!(source = %source, key, "fresh payload not cached");
    }
    Ok(Fetched::fresh(data))
}
