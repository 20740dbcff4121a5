//! USD quotes with a last-known-good cache and a periodic refresh task.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::domain::{PriceQuote, PriceSource};
use crate::error::WalletError;
use crate::ports::{PortError, PricePort};
use crate::registry::ChainRegistry;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

type QuoteFuture =
    Shared<BoxFuture<'static, Result<(HashMap<String, PriceQuote>, Instant), PortError>>>;

#[derive(Debug, Clone)]
pub struct PriceFeedOptions {
    /// How long a cached quote counts as fresh, and the period of `spawn_refresh`.
    pub refresh_interval: Duration,
    /// Placeholder quotes keyed by price-feed id, used when the API fails and
    /// nothing is cached. Results built from it are always flagged stale.
    pub fallback: Option<HashMap<String, PriceQuote>>,
}

impl Default for PriceFeedOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            fallback: Some(default_fallback_quotes()),
        }
    }
}

pub fn default_fallback_quotes() -> HashMap<String, PriceQuote> {
    HashMap::from([
        (
            "ethereum".to_owned(),
            PriceQuote {
                usd: 3500.0,
                change_24h: 1.5,
            },
        ),
        (
            "usd-coin".to_owned(),
            PriceQuote {
                usd: 1.0,
                change_24h: 0.01,
            },
        ),
    ])
}

/// Quotes keyed by (uppercase) token symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub quotes: HashMap<String, PriceQuote>,
    pub source: PriceSource,
    pub stale: bool,
    pub degraded: Option<WalletError>,
    pub fetched_at: Option<Instant>,
}

impl PriceSnapshot {
    fn live(quotes: HashMap<String, PriceQuote>, fetched_at: Option<Instant>) -> Self {
        Self {
            quotes,
            source: PriceSource::Live,
            stale: false,
            degraded: None,
            fetched_at,
        }
    }

    pub fn quote(&self, symbol: &str) -> Option<&PriceQuote> {
        self.quotes.get(&symbol.to_ascii_uppercase())
    }

    /// `(usd, change_24h)`, zero when the symbol has no quote.
    pub fn price_for(&self, symbol: &str) -> (f64, f64) {
        self.quote(symbol)
            .map(|q| (q.usd, q.change_24h))
            .unwrap_or((0.0, 0.0))
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedQuote {
    quote: PriceQuote,
    fetched_at: Instant,
}

/// Batched price client over a [`PricePort`].
///
/// One request per refresh covers every requested symbol; concurrent refreshes
/// for the same id set join the request already in flight.
pub struct PriceFeed<P: PricePort + 'static> {
    registry: Arc<ChainRegistry>,
    port: Arc<P>,
    options: Arc<PriceFeedOptions>,
    cache: Arc<Mutex<HashMap<String, CachedQuote>>>,
    in_flight: Arc<Mutex<HashMap<Vec<String>, QuoteFuture>>>,
}

impl<P: PricePort + 'static> Clone for PriceFeed<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            port: Arc::clone(&self.port),
            options: Arc::clone(&self.options),
            cache: Arc::clone(&self.cache),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<P: PricePort + 'static> PriceFeed<P> {
    pub fn new(registry: Arc<ChainRegistry>, port: Arc<P>, options: PriceFeedOptions) -> Self {
        Self {
            registry,
            port,
            options: Arc::new(options),
            cache: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn options(&self) -> &PriceFeedOptions {
        &self.options
    }

    /// Serve from cache when every requested quote is younger than the refresh
    /// interval, otherwise refetch.
    pub async fn fetch_prices(&self, symbols: &[String]) -> PriceSnapshot {
        let wanted = self.resolve(symbols);
        if wanted.is_empty() {
            return PriceSnapshot::live(HashMap::new(), None);
        }
        if let Some(snapshot) = self.fresh_from_cache(&wanted) {
            debug!(count = wanted.len(), "price cache hit");
            return snapshot;
        }
        self.fetch_resolved(wanted).await
    }

    /// Always goes to the network; joins an identical request in flight.
    pub async fn refetch(&self, symbols: &[String]) -> PriceSnapshot {
        let wanted = self.resolve(symbols);
        if wanted.is_empty() {
            return PriceSnapshot::live(HashMap::new(), None);
        }
        self.fetch_resolved(wanted).await
    }

    /// Refetch `symbols` immediately and then every refresh interval until the
    /// handle is dropped or cancelled. Must be called inside a tokio runtime.
    pub fn spawn_refresh(&self, symbols: Vec<String>) -> RefreshHandle {
        let feed = self.clone();
        let period = self.options.refresh_interval.max(MIN_REFRESH_INTERVAL);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let snapshot = feed.refetch(&symbols).await;
                debug!(
                    source = ?snapshot.source,
                    stale = snapshot.stale,
                    "scheduled price refresh"
                );
            }
        });
        RefreshHandle { task }
    }

    /// (symbol, price id) pairs; symbols without an id are dropped.
    fn resolve(&self, symbols: &[String]) -> Vec<(String, String)> {
        let mut seen = BTreeSet::new();
        symbols
            .iter()
            .filter_map(|symbol| {
                let symbol = symbol.to_ascii_uppercase();
                let id = self.registry.price_id(&symbol)?.to_owned();
                seen.insert(symbol.clone()).then_some((symbol, id))
            })
            .collect()
    }

    fn fresh_from_cache(&self, wanted: &[(String, String)]) -> Option<PriceSnapshot> {
        let cache = lock_or_recover!(self.cache);
        let mut quotes = HashMap::with_capacity(wanted.len());
        let mut oldest: Option<Instant> = None;
        for (symbol, id) in wanted {
            let cached = cache.get(id)?;
            if cached.fetched_at.elapsed() >= self.options.refresh_interval {
                return None;
            }
            oldest = Some(oldest.map_or(cached.fetched_at, |o| o.min(cached.fetched_at)));
            quotes.insert(symbol.clone(), cached.quote);
        }
        Some(PriceSnapshot::live(quotes, oldest))
    }

    async fn fetch_resolved(&self, wanted: Vec<(String, String)>) -> PriceSnapshot {
        let ids: Vec<String> = wanted
            .iter()
            .map(|(_, id)| id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let pending = {
            let mut in_flight = lock_or_recover!(self.in_flight);
            match in_flight.get(&ids) {
                Some(existing) => {
                    debug!(?ids, "joining in-flight price request");
                    existing.clone()
                }
                None => {
                    let fut = self.request(ids.clone());
                    in_flight.insert(ids, fut.clone());
                    fut
                }
            }
        };

        match pending.await {
            Ok((quotes, fetched_at)) => {
                let by_symbol = wanted
                    .iter()
                    .filter_map(|(symbol, id)| quotes.get(id).map(|q| (symbol.clone(), *q)))
                    .collect();
                PriceSnapshot::live(by_symbol, Some(fetched_at))
            }
            Err(err) => self.degraded_snapshot(&wanted, err),
        }
    }

    fn request(&self, ids: Vec<String>) -> QuoteFuture {
        let port = Arc::clone(&self.port);
        let cache = Arc::clone(&self.cache);
        let slots = Arc::clone(&self.in_flight);
        async move {
            let result = port.fetch_quotes(&ids).await;
            let now = Instant::now();
            if let Ok(quotes) = &result {
                let mut cache = lock_or_recover!(cache);
                for (id, quote) in quotes {
                    cache.insert(
                        id.clone(),
                        CachedQuote {
                            quote: *quote,
                            fetched_at: now,
                        },
                    );
                }
            }
            lock_or_recover!(slots).remove(&ids);
            result.map(|quotes| (quotes, now))
        }
        .boxed()
        .shared()
    }

    fn degraded_snapshot(&self, wanted: &[(String, String)], err: PortError) -> PriceSnapshot {
        warn!(error = %err, "price refresh failed, serving degraded quotes");
        let degraded = Some(WalletError::PriceFeedDegraded(err.to_string()));

        let fallback = self.options.fallback.as_ref();
        let mut quotes = HashMap::with_capacity(wanted.len());
        let mut fetched_at: Option<Instant> = None;
        let mut any_cached = false;
        {
            let cache = lock_or_recover!(self.cache);
            for (symbol, id) in wanted {
                if let Some(cached) = cache.get(id) {
                    any_cached = true;
                    fetched_at =
                        Some(fetched_at.map_or(cached.fetched_at, |o| o.min(cached.fetched_at)));
                    quotes.insert(symbol.clone(), cached.quote);
                } else if let Some(quote) = fallback.and_then(|table| table.get(id)) {
                    quotes.insert(symbol.clone(), *quote);
                }
            }
        }

        // Cached wins the label whenever any quote is last-known-good.
        let source = if any_cached {
            PriceSource::Cached
        } else if quotes.is_empty() {
            PriceSource::Unavailable
        } else {
            PriceSource::Fallback
        };
        PriceSnapshot {
            quotes,
            source,
            stale: true,
            degraded,
            fetched_at,
        }
    }
}

/// Owns the periodic refresh task; dropping it stops the timer.
#[derive(Debug)]
pub struct RefreshHandle {
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
