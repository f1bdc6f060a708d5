use clap::Parser;
use multitrade::adapters::{SignalPool, TelegramNotifier, TradeStore, WallexClient};
use multitrade::cli::{self, Cli, Commands};
use multitrade::config::{AppConfig, LoggingConfig};
use multitrade::error::{MultitradeError, Result};
use multitrade::exchange::ExchangeClient;
use multitrade::services::{OrderLifecycleExecutor, SignalDistributor};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)?;
    if let Err(errors) = config.validate() {
        for err in &errors {
            eprintln!("config error: {}", err);
        }
        return Err(MultitradeError::Validation(
            "invalid configuration".to_string(),
        ));
    }

    match cli.command {
        None | Some(Commands::Run) => {
            let _guard = init_logging(&config.logging);
            run_all(&config).await
        }
        Some(Commands::Distribute) => {
            let _guard = init_logging(&config.logging);
            run_distributor(&config).await
        }
        Some(Commands::Execute) => {
            let _guard = init_logging(&config.logging);
            run_executor(&config).await
        }
        Some(Commands::Markets) => {
            init_logging_simple();
            let exchange = build_exchange(&config)?;
            cli::show_markets(exchange.as_ref()).await
        }
        Some(Commands::Account { command }) => {
            init_logging_simple();
            let store = build_store(&config).await?;
            let exchange = build_exchange(&config)?;
            cli::handle_account_command(&store, exchange.as_ref(), command).await
        }
    }
}

async fn build_store(config: &AppConfig) -> Result<TradeStore> {
    let store = TradeStore::new(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;
    Ok(store)
}

fn build_exchange(config: &AppConfig) -> Result<Arc<dyn ExchangeClient>> {
    let client = WallexClient::new(
        Some(&config.exchange.base_url),
        config.exchange.timeout_secs,
    )?;
    Ok(Arc::new(client))
}

fn build_notifier(config: &AppConfig) -> Option<Arc<TelegramNotifier>> {
    config
        .telegram
        .bot_token
        .clone()
        .map(TelegramNotifier::new)
        .or_else(TelegramNotifier::from_env)
}

/// Both loops in one process: the normal deployment shape
async fn run_all(config: &AppConfig) -> Result<()> {
    info!("--- multitrade starting up ---");

    let store = build_store(config).await?;
    let signal_pool = SignalPool::new(
        &config.signal_pool.url,
        config.signal_pool.max_connections,
    )
    .await?;
    let exchange = build_exchange(config)?;
    let notifier = build_notifier(config);

    let distributor =
        SignalDistributor::new(store.clone(), signal_pool, config.distributor.clone());
    let executor = OrderLifecycleExecutor::new(
        store,
        exchange,
        notifier,
        config.executor.clone(),
    );

    let mut distributor_task = tokio::spawn(distributor.run());
    let mut executor_task = tokio::spawn(executor.run());

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping");
            Ok(())
        }
        result = &mut distributor_task => finished("distributor", result),
        result = &mut executor_task => finished("executor", result),
    }
}

async fn run_distributor(config: &AppConfig) -> Result<()> {
    let store = build_store(config).await?;
    let signal_pool = SignalPool::new(
        &config.signal_pool.url,
        config.signal_pool.max_connections,
    )
    .await?;

    let distributor = SignalDistributor::new(store, signal_pool, config.distributor.clone());
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping");
            Ok(())
        }
        result = distributor.run() => result,
    }
}

async fn run_executor(config: &AppConfig) -> Result<()> {
    let store = build_store(config).await?;
    let exchange = build_exchange(config)?;
    let notifier = build_notifier(config);

    let executor =
        OrderLifecycleExecutor::new(store, exchange, notifier, config.executor.clone());
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping");
            Ok(())
        }
        result = executor.run() => result,
    }
}

/// A loop task only returns on an unrecoverable startup condition
fn finished(
    name: &str,
    result: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match result {
        Ok(Ok(())) => {
            error!("{} loop exited unexpectedly", name);
            Err(MultitradeError::Internal(format!("{} loop exited", name)))
        }
        Ok(Err(e)) => {
            error!("{} loop failed: {}", name, e);
            Err(e)
        }
        Err(e) => {
            error!("{} task panicked: {}", name, e);
            Err(MultitradeError::Internal(format!("{} task panicked", name)))
        }
    }
}

fn init_logging(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},multitrade=debug,sqlx=warn", config.level))
    });

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "multitrade.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            if config.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .with_writer(writer)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(writer)
                    .init();
            }
            Some(guard)
        }
        None => {
            if config.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .init();
            }
            None
        }
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
