use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tabled::{Table, Tabled};
use tracing::info;

use crate::adapters::{NewAccount, TradeStore};
use crate::domain::SubscriptionFilter;
use crate::error::{MultitradeError, Result};
use crate::exchange::ExchangeClient;

#[derive(Parser)]
#[command(name = "multitrade", version, about = "Multi-account signal fan-out and order lifecycle bot")]
pub struct Cli {
    /// Configuration directory
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the distributor and executor loops (default)
    Run,
    /// Run only the signal distribution loop
    Distribute,
    /// Run only the order lifecycle loop
    Execute,
    /// Print the exchange market catalog with precisions
    Markets,
    /// Manage subscriber accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Register an account; prompts for the API key and validates it
    Add {
        /// Display name
        name: String,
        /// Telegram chat id for lifecycle notifications
        #[arg(long)]
        chat_id: Option<i64>,
        /// Per-trade budget in TMN
        #[arg(long, default_value = "0")]
        budget_tmn: Decimal,
        /// Per-trade budget in USDT
        #[arg(long, default_value = "0")]
        budget_usdt: Decimal,
        /// Locked-capital ceiling in TMN (0 disables the circuit breaker)
        #[arg(long, default_value = "0")]
        ceiling_tmn: Decimal,
        /// Locked-capital ceiling in USDT (0 disables the circuit breaker)
        #[arg(long, default_value = "0")]
        ceiling_usdt: Decimal,
        /// "ALL" or a comma list of strategy tags
        #[arg(long, default_value = "ALL")]
        strategies: String,
        /// "ALL" or a comma list of grade tags
        #[arg(long, default_value = "ALL")]
        grades: String,
    },
    /// List all accounts
    List,
    /// Resume signal fan-out for an account
    Enable { account_id: i64 },
    /// Pause signal fan-out for an account
    Disable { account_id: i64 },
    /// Delete an account and its trade history
    Remove { account_id: i64 },
}

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Budget TMN")]
    budget_tmn: Decimal,
    #[tabled(rename = "Budget USDT")]
    budget_usdt: Decimal,
    #[tabled(rename = "Ceiling TMN")]
    ceiling_tmn: Decimal,
    #[tabled(rename = "Ceiling USDT")]
    ceiling_usdt: Decimal,
    #[tabled(rename = "Strategies")]
    strategies: String,
    #[tabled(rename = "Grades")]
    grades: String,
}

#[derive(Tabled)]
struct MarketRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Qty decimals")]
    qty_decimals: u32,
    #[tabled(rename = "Price decimals")]
    price_decimals: u32,
}

/// Print the market catalog
pub async fn show_markets(exchange: &dyn ExchangeClient) -> Result<()> {
    let catalog = exchange.fetch_market_catalog().await?;
    let rows: Vec<MarketRow> = catalog
        .into_iter()
        .map(|entry| MarketRow {
            symbol: entry.symbol,
            qty_decimals: entry.precision.qty_decimals,
            price_decimals: entry.precision.price_decimals,
        })
        .collect();

    println!("{} markets", rows.len());
    println!("{}", Table::new(rows));
    Ok(())
}

/// Dispatch one account management command
pub async fn handle_account_command(
    store: &TradeStore,
    exchange: &dyn ExchangeClient,
    command: AccountCommands,
) -> Result<()> {
    match command {
        AccountCommands::Add {
            name,
            chat_id,
            budget_tmn,
            budget_usdt,
            ceiling_tmn,
            ceiling_usdt,
            strategies,
            grades,
        } => {
            let api_key = rpassword::prompt_password("Wallex API key: ")?;
            if api_key.trim().is_empty() {
                return Err(MultitradeError::Validation("API key is empty".to_string()));
            }
            if !exchange.validate_api_key(api_key.trim()).await? {
                return Err(MultitradeError::Validation(
                    "API key rejected by the exchange".to_string(),
                ));
            }

            let account_id = store
                .insert_account(&NewAccount {
                    account_name: name.clone(),
                    owner_chat_id: chat_id,
                    api_key: api_key.trim().to_string(),
                    budget_tmn,
                    budget_usdt,
                    ceiling_tmn,
                    ceiling_usdt,
                    allowed_strategies: SubscriptionFilter::parse(&strategies),
                    allowed_grades: SubscriptionFilter::parse(&grades),
                })
                .await?;

            info!("Account '{}' created with id {}", name, account_id);
            println!("Account {} created (id {})", name, account_id);
        }
        AccountCommands::List => {
            let accounts = store.list_accounts().await?;
            let rows: Vec<AccountRow> = accounts
                .into_iter()
                .map(|acc| AccountRow {
                    id: acc.account_id,
                    name: acc.account_name,
                    active: acc.is_active,
                    budget_tmn: acc.budget_tmn,
                    budget_usdt: acc.budget_usdt,
                    ceiling_tmn: acc.ceiling_tmn,
                    ceiling_usdt: acc.ceiling_usdt,
                    strategies: acc.allowed_strategies.to_column(),
                    grades: acc.allowed_grades.to_column(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        AccountCommands::Enable { account_id } => {
            if store.set_account_active(account_id, true).await? {
                println!("Account {} enabled", account_id);
            } else {
                println!("Account {} not found", account_id);
            }
        }
        AccountCommands::Disable { account_id } => {
            if store.set_account_active(account_id, false).await? {
                println!("Account {} disabled", account_id);
            } else {
                println!("Account {} not found", account_id);
            }
        }
        AccountCommands::Remove { account_id } => {
            if store.delete_account(account_id).await? {
                println!("Account {} removed", account_id);
            } else {
                println!("Account {} not found", account_id);
            }
        }
    }
    Ok(())
}
