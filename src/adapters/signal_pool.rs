use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::domain::{QuotePair, Signal};
use crate::error::Result;

/// Read-only connection to the upstream signal pool database.
///
/// The pool lives in its own database with its own credentials; nothing is
/// ever written back. The lookback window is evaluated on the database
/// clock so the process timezone never skews signal selection.
#[derive(Clone)]
pub struct SignalPool {
    pool: PgPool,
}

impl SignalPool {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to signal pool");
        Ok(Self { pool })
    }

    /// Signals emitted within the last `lookback_minutes`, oldest first
    pub async fn fetch_recent(&self, lookback_minutes: u64) -> Result<Vec<Signal>> {
        let rows = sqlx::query(
            r#"
            SELECT coin, pair, entry_price, target_price, strategy_name,
                   signal_grade, signal_time
            FROM signal_pool
            WHERE signal_time >= (NOW() - make_interval(mins => $1))
            ORDER BY signal_time ASC
            "#,
        )
        .bind(lookback_minutes as i32)
        .fetch_all(&self.pool)
        .await?;

        let mut signals = Vec::with_capacity(rows.len());
        for row in &rows {
            let pair_raw: String = row.get("pair");
            let Ok(pair) = QuotePair::try_from(pair_raw.as_str()) else {
                // Pools can carry pairs we do not trade; skip them quietly
                debug!("Skipping signal with unsupported pair {}", pair_raw);
                continue;
            };

            let strategy: Option<String> = row.get("strategy_name");
            signals.push(Signal {
                asset: row.get("coin"),
                pair,
                entry_price: row.get("entry_price"),
                target_price: row.get("target_price"),
                strategy: strategy.unwrap_or_else(|| "Unknown".to_string()),
                grade: row.get("signal_grade"),
                signal_time: row.get("signal_time"),
            });
        }

        if !signals.is_empty() {
            debug!("Fetched {} signals from pool", signals.len());
        }
        Ok(signals)
    }
}
