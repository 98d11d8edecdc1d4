//! Request pipeline shared by every tool: rate limit, validate, fetch, wrap.
//!
//! Each call is charged against the caller's rate-limit bucket before
//! anything else happens. Parsed queries run on a spawned task so a panic in
//! a fetcher is reported as an internal error instead of taking the
//! connection down. Every outcome, including failures, comes back as an
//! [`Envelope`].

use std::future::Future;
use std::sync::Arc;

use costmap_client::transport::http::HttpConfig;
use costmap_client::{Feeds, HttpTransport, Transport};
use costmap_core::{AppConfig, Error, RateLimiter, Source, Store};
use serde_json::json;

use crate::envelope::{Envelope, Reply};
use crate::query::{CacheAdminQuery, EnergyQuery, PriceIndexQuery, PriceParityQuery, RentQuery};

/// Identifier used when a caller does not name itself.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug)]
struct Inner {
    feeds: Feeds,
    store: Store,
    limiter: Arc<RateLimiter>,
    config: Arc<AppConfig>,
}

/// Entry point for all queries. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

impl Aggregator {
    pub fn with_transport(
        transport: Arc<dyn Transport>, store: Store, limiter: Arc<RateLimiter>, config: Arc<AppConfig>,
    ) -> Self {
        let feeds = Feeds::new(transport, store.clone(), config.clone());
        Self { inner: Arc::new(Inner { feeds, store, limiter, config }) }
    }

    /// Open the configured store and build an HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated, or the
    /// HTTP client cannot be built.
    pub async fn from_config(config: AppConfig) -> Result<Self, Error> {
        let store = Store::open(&config.db_path).await?;
        let transport = HttpTransport::new(HttpConfig::from(&config))?;
        Ok(Self::with_transport(Arc::new(transport), store, Arc::new(RateLimiter::new()), Arc::new(config)))
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.limiter
    }

    pub async fn price_parity(&self, client_id: &str, query: Result<PriceParityQuery, Error>) -> Envelope {
        self.handle(client_id, Some(Source::PriceParity), query, |inner, query| async move {
            let feed = &inner.feeds.price_parity;
            match query {
                PriceParityQuery::States { year } => {
                    let fetched = feed.states(year).await?;
                    let data_year = fetched.data.data_year;
                    Ok(Reply::from_fetched(fetched)?.with_data_year(data_year))
                }
                PriceParityQuery::Metros { year } => {
                    let fetched = feed.metros(year).await?;
                    let data_year = fetched.data.data_year;
                    Ok(Reply::from_fetched(fetched)?.with_data_year(data_year))
                }
                PriceParityQuery::State { state, year } => {
                    let fetched = feed.state(&state, year).await?;
                    let data_year = fetched.data.data_year;
                    Ok(Reply::from_fetched(fetched)?.with_data_year(data_year))
                }
                PriceParityQuery::Metro { cbsa, year } => {
                    let fetched = feed.metro(&cbsa, year).await?;
                    let data_year = fetched.data.data_year;
                    Ok(Reply::from_fetched(fetched)?.with_data_year(data_year))
                }
            }
        })
        .await
    }

    pub async fn price_index(&self, client_id: &str, query: Result<PriceIndexQuery, Error>) -> Envelope {
        self.handle(client_id, Some(Source::PriceIndex), query, |inner, query| async move {
            let feed = &inner.feeds.price_index;
            match query {
                PriceIndexQuery::National => Reply::from_fetched(feed.national().await?),
                PriceIndexQuery::State(state) => Reply::from_fetched(feed.state(&state).await?),
                PriceIndexQuery::Region(region) => Reply::from_fetched(feed.region(region).await?),
                PriceIndexQuery::Timeseries(target) => Reply::from_fetched(feed.timeseries(target).await?),
                PriceIndexQuery::Regions => Reply::from_fetched(feed.regions().await?),
            }
        })
        .await
    }

    pub async fn energy(&self, client_id: &str, query: Result<EnergyQuery, Error>) -> Envelope {
        self.handle(client_id, Some(Source::Energy), query, |inner, query| async move {
            let feed = &inner.feeds.energy;
            match query {
                EnergyQuery::All => Reply::from_fetched(feed.all().await?),
                EnergyQuery::State(state) => Reply::from_fetched(feed.state(&state).await?),
                EnergyQuery::Utility => Reply::from_fetched(feed.utility().await?),
                EnergyQuery::UtilityState(state) => Reply::from_fetched(feed.utility_state(&state).await?),
            }
        })
        .await
    }

    pub async fn fair_market_rent(&self, client_id: &str, query: Result<RentQuery, Error>) -> Envelope {
        self.handle(client_id, Some(Source::FairMarketRent), query, |inner, query| async move {
            let feed = &inner.feeds.rents;
            match query {
                RentQuery::Zip(zip) => Reply::from_fetched(feed.zip(&zip).await?),
                RentQuery::State(state) => Reply::from_fetched(feed.state(&state).await?),
                RentQuery::Batch(zips) => Reply::fresh(&feed.batch(&zips).await?),
            }
        })
        .await
    }

    pub async fn cache_admin(&self, client_id: &str, query: Result<CacheAdminQuery, Error>) -> Envelope {
        self.handle(client_id, None, query, |inner, query| async move {
            let store = &inner.store;
            match query {
                CacheAdminQuery::Invalidate { source, key } => {
                    let removed = store.invalidate(source, key.as_deref()).await?;
                    tracing::info!(?source, ?key, removed, "cache invalidated");
                    Reply::fresh(&json!({ "removed": removed }))
                }
                CacheAdminQuery::Sweep => {
                    let removed = store.sweep().await?;
                    Reply::fresh(&json!({ "removed": removed }))
                }
                CacheAdminQuery::Count { source } => {
                    let count = store.count(source).await?;
                    Reply::fresh(&json!({ "source": source, "count": count }))
                }
            }
        })
        .await
    }

    async fn handle<Q, F, Fut>(
        &self, client_id: &str, source: Option<Source>, query: Result<Q, Error>, run: F,
    ) -> Envelope
    where
        F: FnOnce(Arc<Inner>, Q) -> Fut,
        Fut: Future<Output = Result<Reply, Error>> + Send + 'static,
    {
        let client_id = match client_id.trim() {
            "" => ANONYMOUS,
            id => id,
        };
        let config = &self.inner.config;
        let decision =
            self.inner
                .limiter
                .check_and_consume(client_id, config.rate_limit_window_ms, config.rate_limit_max_requests);
        let generated_at = self.inner.store.now();

        if !decision.allowed {
            let err = Error::RateLimited { retry_after: decision.retry_after.unwrap_or(1) };
            tracing::warn!(client_id, source = ?source, retry_after = decision.retry_after, "request rate limited");
            return Envelope::failure(source, &err, generated_at).with_rate_limit(&decision);
        }

        let result = match query {
            Ok(query) => match tokio::spawn(run(self.inner.clone(), query)).await {
                Ok(result) => result,
                Err(e) => Err(Error::Internal(format!("handler task failed: {e}"))),
            },
            Err(e) => Err(e),
        };

        let envelope = match result {
            Ok(reply) => Envelope::success(source, reply, generated_at),
            Err(e) => {
                log_failure(client_id, source, &e);
                Envelope::failure(source, &e, generated_at)
            }
        };
        envelope.with_rate_limit(&decision)
    }
}

fn log_failure(client_id: &str, source: Option<Source>, error: &Error) {
    match error {
        Error::Internal(_) | Error::MissingCredential { .. } | Error::Database(_) | Error::MigrationFailed(_) => {
            tracing::error!(client_id, source = ?source, error = %error, "request failed");
        }
        Error::Upstream { .. } => tracing::warn!(client_id, source = ?source, error = %error, "upstream failure"),
        _ => tracing::debug!(client_id, source = ?source, error = %error, "request rejected"),
    }
}
