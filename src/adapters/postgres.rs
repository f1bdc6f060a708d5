use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{info, instrument, warn};

use crate::domain::{
    Account, QuotePair, Signal, SubscriptionFilter, TradeOp, TradeStatus, TradeUpdate,
};
use crate::error::{MultitradeError, Result};

/// PostgreSQL storage adapter for accounts and trade ops
#[derive(Clone)]
pub struct TradeStore {
    pool: PgPool,
}

/// Input for account creation
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub account_name: String,
    pub owner_chat_id: Option<i64>,
    pub api_key: String,
    pub budget_tmn: Decimal,
    pub budget_usdt: Decimal,
    pub ceiling_tmn: Decimal,
    pub ceiling_usdt: Decimal,
    pub allowed_strategies: SubscriptionFilter,
    pub allowed_grades: SubscriptionFilter,
}

/// One executable trade op joined with the owning account's credentials
/// and limits, as each executor stage needs them
#[derive(Debug, Clone)]
pub struct TradeTask {
    pub op: TradeOp,
    pub api_key: String,
    pub owner_chat_id: Option<i64>,
    pub budget_tmn: Decimal,
    pub budget_usdt: Decimal,
    pub ceiling_tmn: Decimal,
    pub ceiling_usdt: Decimal,
}

impl TradeTask {
    pub fn budget(&self) -> Decimal {
        match self.op.pair {
            QuotePair::Tmn => self.budget_tmn,
            QuotePair::Usdt => self.budget_usdt,
        }
    }

    pub fn ceiling(&self) -> Decimal {
        match self.op.pair {
            QuotePair::Tmn => self.ceiling_tmn,
            QuotePair::Usdt => self.ceiling_usdt,
        }
    }
}

fn non_terminal_statuses() -> Vec<String> {
    TradeStatus::non_terminal()
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Result<Account> {
    let strategies: String = row.get("allowed_strategies");
    let grades: String = row.get("allowed_grades");

    Ok(Account {
        account_id: row.get("account_id"),
        account_name: row.get("account_name"),
        owner_chat_id: row.get("owner_chat_id"),
        api_key: row.get("api_key"),
        is_active: row.get("is_active"),
        budget_tmn: row.get("budget_tmn"),
        budget_usdt: row.get("budget_usdt"),
        ceiling_tmn: row.get("ceiling_tmn"),
        ceiling_usdt: row.get("ceiling_usdt"),
        allowed_strategies: SubscriptionFilter::parse(&strategies),
        allowed_grades: SubscriptionFilter::parse(&grades),
        created_at: row.get("created_at"),
    })
}

fn trade_op_from_row(row: &sqlx::postgres::PgRow) -> Result<TradeOp> {
    let status_raw: String = row.get("status");
    let status = TradeStatus::try_from(status_raw.as_str())
        .map_err(MultitradeError::Internal)?;
    let pair_raw: String = row.get("pair");
    let pair = QuotePair::try_from(pair_raw.as_str()).map_err(MultitradeError::Internal)?;

    Ok(TradeOp {
        id: row.get("id"),
        account_id: row.get("account_id"),
        asset: row.get("asset"),
        pair,
        entry_price: row.get("entry_price"),
        exit_price: row.get("exit_price"),
        strategy: row.get("strategy"),
        status,
        invested_amount: row.get("invested_amount"),
        buy_order_id: row.get("buy_order_id"),
        buy_quantity_executed: row.get("buy_quantity_executed"),
        sell_order_id: row.get("sell_order_id"),
        sell_revenue: row.get("sell_revenue"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn task_from_row(row: &sqlx::postgres::PgRow) -> Result<TradeTask> {
    Ok(TradeTask {
        op: trade_op_from_row(row)?,
        api_key: row.get("api_key"),
        owner_chat_id: row.get("owner_chat_id"),
        budget_tmn: row.get("budget_tmn"),
        budget_usdt: row.get("budget_usdt"),
        ceiling_tmn: row.get("ceiling_tmn"),
        ceiling_usdt: row.get("ceiling_usdt"),
    })
}

const TASK_COLUMNS: &str = r#"
    t.id, t.account_id, t.asset, t.pair, t.entry_price, t.exit_price,
    t.strategy, t.status, t.invested_amount, t.buy_order_id,
    t.buy_quantity_executed, t.sell_order_id, t.sell_revenue, t.notes,
    t.created_at, t.updated_at,
    a.api_key, a.owner_chat_id, a.budget_tmn, a.budget_usdt,
    a.ceiling_tmn, a.ceiling_usdt
"#;

impl TradeStore {
    /// Create a new store, connecting a fresh pool
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ==================== Accounts ====================

    pub async fn insert_account(&self, account: &NewAccount) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO trading_accounts
                (account_name, owner_chat_id, api_key, budget_tmn, budget_usdt,
                 ceiling_tmn, ceiling_usdt, allowed_strategies, allowed_grades)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING account_id
            "#,
        )
        .bind(&account.account_name)
        .bind(account.owner_chat_id)
        .bind(&account.api_key)
        .bind(account.budget_tmn)
        .bind(account.budget_usdt)
        .bind(account.ceiling_tmn)
        .bind(account.ceiling_usdt)
        .bind(account.allowed_strategies.to_column())
        .bind(account.allowed_grades.to_column())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("account_id"))
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT account_id, account_name, owner_chat_id, api_key, is_active,
                   budget_tmn, budget_usdt, ceiling_tmn, ceiling_usdt,
                   allowed_strategies, allowed_grades, created_at
            FROM trading_accounts
            ORDER BY account_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(account_from_row).collect()
    }

    pub async fn fetch_active_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT account_id, account_name, owner_chat_id, api_key, is_active,
                   budget_tmn, budget_usdt, ceiling_tmn, ceiling_usdt,
                   allowed_strategies, allowed_grades, created_at
            FROM trading_accounts
            WHERE is_active = TRUE
            ORDER BY account_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(account_from_row).collect()
    }

    pub async fn set_account_active(&self, account_id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE trading_accounts SET is_active = $1 WHERE account_id = $2",
        )
        .bind(active)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an account; trade ops cascade
    pub async fn delete_account(&self, account_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM trading_accounts WHERE account_id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Trade ops ====================

    /// Queue a signal for an account in NEW_SIGNAL
    #[instrument(skip(self, signal), fields(asset = %signal.asset, pair = %signal.pair))]
    pub async fn insert_trade_op(&self, account_id: i64, signal: &Signal) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO trade_ops
                (account_id, asset, pair, entry_price, exit_price, strategy, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(&signal.asset)
        .bind(signal.pair.as_str())
        .bind(signal.entry_price)
        .bind(signal.target_price)
        .bind(&signal.strategy)
        .bind(TradeStatus::NewSignal.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    /// Dedup lookup: does an open trade already exist for this tuple?
    pub async fn has_open_trade(
        &self,
        account_id: i64,
        asset: &str,
        pair: QuotePair,
        strategy: &str,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT id FROM trade_ops
            WHERE account_id = $1 AND asset = $2 AND pair = $3 AND strategy = $4
              AND status = ANY($5)
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .bind(asset)
        .bind(pair.as_str())
        .bind(strategy)
        .bind(non_terminal_statuses())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Capital currently locked in non-terminal trades for an account+pair
    pub async fn locked_amount(&self, account_id: i64, pair: QuotePair) -> Result<Decimal> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(invested_amount), 0) AS total_locked
            FROM trade_ops
            WHERE account_id = $1 AND pair = $2 AND status = ANY($3)
            "#,
        )
        .bind(account_id)
        .bind(pair.as_str())
        .bind(non_terminal_statuses())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total_locked"))
    }

    /// Batch read for one executor stage, joined with account columns.
    /// `active_accounts_only` restricts to active accounts (buy placement
    /// honors the activation toggle; in-flight trades are driven regardless).
    pub async fn fetch_tasks(
        &self,
        status: TradeStatus,
        active_accounts_only: bool,
    ) -> Result<Vec<TradeTask>> {
        let query = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM trade_ops t
            JOIN trading_accounts a ON t.account_id = a.account_id
            WHERE t.status = $1 {}
            ORDER BY t.id ASC
            "#,
            if active_accounts_only {
                "AND a.is_active = TRUE"
            } else {
                ""
            }
        );

        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(task_from_row).collect()
    }

    /// Records in `status` whose updated_at is older than `minutes`,
    /// evaluated on the database clock
    pub async fn fetch_stale_tasks(
        &self,
        status: TradeStatus,
        minutes: u64,
    ) -> Result<Vec<TradeTask>> {
        let query = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM trade_ops t
            JOIN trading_accounts a ON t.account_id = a.account_id
            WHERE t.status = $1
              AND t.updated_at < (NOW() - make_interval(mins => $2))
            ORDER BY t.id ASC
            "#
        );

        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .bind(minutes as i32)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(task_from_row).collect()
    }

    /// Move one record along a validated edge of the transition table,
    /// applying the stage's field updates.
    ///
    /// The update is conditional on the current status, so a record that
    /// moved underneath us is left alone; the `false` return lets the caller
    /// log and skip instead of clobbering.
    #[instrument(skip(self, update))]
    pub async fn transition(
        &self,
        op_id: i64,
        from: TradeStatus,
        to: TradeStatus,
        update: &TradeUpdate,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(MultitradeError::InvalidStateTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        let result = sqlx::query(
            r#"
            UPDATE trade_ops SET
                status = $1,
                invested_amount = COALESCE($2, invested_amount),
                buy_order_id = COALESCE($3, buy_order_id),
                buy_quantity_executed = COALESCE($4, buy_quantity_executed),
                sell_order_id = COALESCE($5, sell_order_id),
                sell_revenue = COALESCE($6, sell_revenue),
                notes = COALESCE($7, notes),
                updated_at = NOW()
            WHERE id = $8 AND status = $9
            "#,
        )
        .bind(to.as_str())
        .bind(update.invested_amount)
        .bind(update.buy_order_id.as_deref())
        .bind(update.buy_quantity_executed)
        .bind(update.sell_order_id.as_deref())
        .bind(update.sell_revenue)
        .bind(update.note.as_deref())
        .bind(op_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        let moved = result.rows_affected() > 0;
        if !moved {
            warn!(
                "Trade op {} no longer in {}; transition to {} skipped",
                op_id, from, to
            );
        }
        Ok(moved)
    }

    /// Record a note on a trade op without changing its status or resetting
    /// its staleness clock
    pub async fn set_note(&self, op_id: i64, note: &str) -> Result<()> {
        sqlx::query("UPDATE trade_ops SET notes = $1 WHERE id = $2")
            .bind(note)
            .bind(op_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
