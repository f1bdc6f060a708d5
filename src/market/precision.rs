use std::collections::HashMap;

use tracing::{info, warn};

use crate::domain::MarketPrecision;
use crate::error::{MultitradeError, Result};
use crate::exchange::ExchangeClient;

/// Refreshable mapping from trading symbol to exchange decimal precision.
///
/// Owned by the executor and passed down explicitly; there is no global
/// cache. On a miss the resolver refreshes the catalog at most once per
/// cycle before answering `None`, so a burst of signals referencing the same
/// unknown symbol costs one catalog fetch, not one per signal. `None` is
/// non-fatal: the caller skips the record and retries next cycle, since the
/// market may appear after a later catalog sync.
pub struct PrecisionResolver {
    cache: HashMap<String, MarketPrecision>,
    refreshed_this_cycle: bool,
}

impl PrecisionResolver {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            refreshed_this_cycle: false,
        }
    }

    /// Number of symbols currently cached
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Re-arm the single allowed on-miss refresh. Called once at the top of
    /// every polling cycle.
    pub fn begin_cycle(&mut self) {
        self.refreshed_this_cycle = false;
    }

    /// Startup warm-up. A process that can never load a catalog cannot
    /// quantize anything, so an empty result is fatal.
    pub async fn ensure_loaded(&mut self, exchange: &dyn ExchangeClient) -> Result<()> {
        if self.cache.is_empty() {
            self.refresh(exchange).await?;
        }
        if self.cache.is_empty() {
            return Err(MultitradeError::CatalogUnavailable(
                "exchange returned an empty market catalog".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up the precision for a symbol, refreshing the catalog at most
    /// once per cycle on a miss.
    pub async fn resolve(
        &mut self,
        exchange: &dyn ExchangeClient,
        symbol: &str,
    ) -> Result<Option<MarketPrecision>> {
        if let Some(precision) = self.cache.get(symbol) {
            return Ok(Some(*precision));
        }

        if !self.refreshed_this_cycle {
            // Arm before the fetch: a failed refresh still consumes this
            // cycle's attempt
            self.refreshed_this_cycle = true;
            self.refresh(exchange).await?;
        }

        let found = self.cache.get(symbol).copied();
        if found.is_none() {
            warn!("Precision not found for {} in market catalog", symbol);
        }
        Ok(found)
    }

    async fn refresh(&mut self, exchange: &dyn ExchangeClient) -> Result<()> {
        let catalog = exchange.fetch_market_catalog().await?;
        self.cache.clear();
        for entry in catalog {
            self.cache.insert(entry.symbol, entry.precision);
        }
        info!("Market catalog loaded: {} symbols cached", self.cache.len());
        Ok(())
    }
}

impl Default for PrecisionResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketEntry;
    use crate::exchange::MockExchangeClient;

    fn catalog() -> Vec<MarketEntry> {
        vec![MarketEntry {
            symbol: "BTCTMN".to_string(),
            precision: MarketPrecision {
                qty_decimals: 4,
                price_decimals: 0,
            },
        }]
    }

    #[tokio::test]
    async fn test_hit_does_not_fetch() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_fetch_market_catalog()
            .times(1)
            .returning(|| Ok(catalog()));

        let mut resolver = PrecisionResolver::new();
        resolver.ensure_loaded(&exchange).await.unwrap();

        // Resolving a cached symbol must not trigger another fetch
        let precision = resolver.resolve(&exchange, "BTCTMN").await.unwrap();
        assert_eq!(
            precision,
            Some(MarketPrecision {
                qty_decimals: 4,
                price_decimals: 0
            })
        );
    }

    #[tokio::test]
    async fn test_miss_refreshes_once_per_cycle() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_fetch_market_catalog()
            .times(1)
            .returning(|| Ok(catalog()));

        let mut resolver = PrecisionResolver::new();
        resolver.begin_cycle();

        // Two misses for unknown symbols in the same cycle: one fetch total
        assert_eq!(resolver.resolve(&exchange, "DOGETMN").await.unwrap(), None);
        assert_eq!(resolver.resolve(&exchange, "PEPETMN").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_begin_cycle_rearms_refresh() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_fetch_market_catalog()
            .times(2)
            .returning(|| Ok(catalog()));

        let mut resolver = PrecisionResolver::new();

        resolver.begin_cycle();
        assert_eq!(resolver.resolve(&exchange, "DOGETMN").await.unwrap(), None);

        resolver.begin_cycle();
        assert_eq!(resolver.resolve(&exchange, "DOGETMN").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_miss_after_refresh_finds_new_symbol() {
        let mut exchange = MockExchangeClient::new();
        exchange.expect_fetch_market_catalog().times(1).returning(|| {
            let mut entries = catalog();
            entries.push(MarketEntry {
                symbol: "ETHUSDT".to_string(),
                precision: MarketPrecision {
                    qty_decimals: 6,
                    price_decimals: 2,
                },
            });
            Ok(entries)
        });

        let mut resolver = PrecisionResolver::new();
        resolver.begin_cycle();

        let precision = resolver.resolve(&exchange, "ETHUSDT").await.unwrap();
        assert_eq!(
            precision,
            Some(MarketPrecision {
                qty_decimals: 6,
                price_decimals: 2
            })
        );
    }

    #[tokio::test]
    async fn test_empty_catalog_is_fatal_at_startup() {
        let mut exchange = MockExchangeClient::new();
        exchange
            .expect_fetch_market_catalog()
            .returning(|| Ok(vec![]));

        let mut resolver = PrecisionResolver::new();
        assert!(resolver.ensure_loaded(&exchange).await.is_err());
    }
}
