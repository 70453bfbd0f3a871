//! KuCoin trading assistant
//!
//! Signs and submits spot orders to KuCoin, sizing each position so a stop-out
//! never loses more than a fixed fraction of account capital.

use std::io::Read;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use kucoin_autotrader::api::{
    Credentials, ExchangeResult, KucoinClient, MarketClient, OrderPayload, OrderRequest,
    RawOrderData, DEFAULT_SYMBOLS, KUCOIN_URL,
};
use kucoin_autotrader::dispatch::Dispatcher;
use kucoin_autotrader::trading::{
    self, ExecutionOutcome, PlannedTrade, RiskConfig, Sizing, TradeExecutor,
};

/// KuCoin trading assistant CLI.
#[derive(Parser)]
#[command(name = "kctrader")]
#[command(about = "Risk-capped KuCoin order execution", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Account capital the risk fraction applies to (USDT)
    #[arg(long, global = true, env = "TRADER_ACCOUNT_CAPITAL")]
    capital: Option<Decimal>,

    /// Maximum fraction of capital risked per trade
    #[arg(long, global = true, env = "TRADER_MAX_RISK_FRACTION")]
    max_risk: Option<Decimal>,

    /// Exchange minimum order value (USDT)
    #[arg(long, global = true, env = "TRADER_MIN_NOTIONAL")]
    min_notional: Option<Decimal>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show last prices for symbols
    Prices {
        /// Symbols in BASE-QUOTE form (defaults to the watch list)
        symbols: Vec<String>,
    },

    /// Show account balances
    Account,

    /// Place a single order
    Order {
        /// Trading pair, e.g. BTC-USDT
        #[arg(long)]
        symbol: String,

        /// buy or sell
        #[arg(long)]
        side: String,

        /// market or limit
        #[arg(long = "type", default_value = "market")]
        order_type: String,

        /// Quote funds for market buys, base size otherwise
        #[arg(long)]
        size: String,

        /// Limit price
        #[arg(long)]
        price: Option<String>,

        /// Stop trigger price
        #[arg(long)]
        stop_price: Option<String>,

        /// GTC, GTT, IOC or FOK (limit orders)
        #[arg(long)]
        time_in_force: Option<String>,
    },

    /// Show order status
    Status {
        /// Exchange order id
        order_id: Option<String>,

        /// Look up by clientOid instead
        #[arg(long, conflicts_with = "order_id")]
        client_oid: Option<String>,
    },

    /// Size a position without placing it
    Size {
        /// Entry price
        #[arg(long)]
        entry: Decimal,

        /// Stop-loss price
        #[arg(long)]
        stop: Decimal,
    },

    /// Size and submit a batch of planned trades
    Execute {
        /// JSON file with [{symbol, side, entryPrice, stopPrice?}, ...]
        #[arg(short, long)]
        plan: String,

        /// Build orders without sending them
        #[arg(long)]
        dry_run: bool,

        /// Pause between submissions in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Planned trades considered; the rest are skipped
        #[arg(long, env = "TRADER_MAX_TRADES")]
        max_trades: Option<usize>,
    },

    /// Handle one action request (JSON) and print the response
    Dispatch {
        /// Request file; reads stdin when omitted
        #[arg(short, long)]
        request: Option<String>,
    },

    /// Show current configuration
    Config,
}

impl Cli {
    fn risk_config(&self) -> RiskConfig {
        let mut config = RiskConfig::default();
        if let Some(capital) = self.capital {
            config.account_capital = capital;
        }
        if let Some(max_risk) = self.max_risk {
            config.max_risk_fraction = max_risk;
        }
        if let Some(min_notional) = self.min_notional {
            config.min_notional = min_notional;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let risk_config = cli.risk_config();

    match cli.command {
        Commands::Prices { symbols } => {
            let symbols = if symbols.is_empty() {
                DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
            } else {
                symbols
            };

            let market = MarketClient::with_base_url(base_url())?;
            let snapshot = market.get_market_data(&symbols).await.into_result()?;

            println!("\n{:<14} {:>18}", "SYMBOL", "LAST");
            println!("{}", "-".repeat(33));
            for symbol in &snapshot.symbols {
                match snapshot.prices.get(symbol) {
                    Some(price) => println!("{:<14} {:>18}", symbol, price),
                    None => println!("{:<14} {:>18}", symbol, "-"),
                }
            }
            for missing in symbols.iter().filter(|s| !snapshot.symbols.contains(s)) {
                warn!(symbol = %missing, "Symbol not listed on KuCoin");
            }
        }

        Commands::Account => {
            let client = KucoinClient::from_env()?;
            let accounts = client.get_accounts().await.into_result()?;

            println!("\n{:<10} {:<8} {:>20} {:>20}", "CURRENCY", "TYPE", "AVAILABLE", "HOLDS");
            println!("{}", "-".repeat(61));
            for account in accounts.iter().filter(|a| !a.balance.is_zero()) {
                println!(
                    "{:<10} {:<8} {:>20} {:>20}",
                    account.currency, account.account_type, account.available, account.holds
                );
            }
        }

        Commands::Order {
            symbol,
            side,
            order_type,
            size,
            price,
            stop_price,
            time_in_force,
        } => {
            let raw = RawOrderData {
                symbol,
                side,
                order_type,
                size,
                price,
                stop_price,
                time_in_force,
            };
            // Validate before touching credentials or the network.
            let request = OrderRequest::from_raw(&raw)?;
            let payload = OrderPayload::build(&request)?;
            let client = KucoinClient::from_env()?;

            match client.place_order(&payload).await {
                ExchangeResult::Success(placed) => {
                    println!("Order placed: {} (clientOid {})", placed.order_id, payload.client_oid);
                }
                ExchangeResult::Rejected { code, message } => {
                    anyhow::bail!(
                        "Order rejected: {} (code {})",
                        message,
                        code.as_deref().unwrap_or("none")
                    );
                }
                ExchangeResult::TransportError { message } => {
                    anyhow::bail!(
                        "Order outcome unknown: {}. Check with `kctrader status --client-oid {}` before resubmitting",
                        message,
                        payload.client_oid
                    );
                }
            }
        }

        Commands::Status {
            order_id,
            client_oid,
        } => {
            let client = KucoinClient::from_env()?;
            let result = match (order_id, client_oid) {
                (Some(id), _) => client.get_order(&id).await,
                (None, Some(oid)) => client.get_order_by_client_oid(&oid).await,
                (None, None) => anyhow::bail!("Provide an order id or --client-oid"),
            };
            let details = result?.into_result()?;

            println!("\n=== Order {} ===", details.id);
            println!("Symbol:      {}", details.symbol);
            println!("Side/Type:   {} {}", details.side, details.order_type);
            println!("Status:      {}", details.status_label());
            if let Some(price) = &details.price {
                println!("Price:       {}", price);
            }
            println!("Size:        {}", details.size.as_deref().unwrap_or("-"));
            println!("Funds:       {}", details.funds.as_deref().unwrap_or("-"));
            println!("Dealt size:  {}", details.deal_size.as_deref().unwrap_or("-"));
            println!("Dealt funds: {}", details.deal_funds.as_deref().unwrap_or("-"));
            if let Some(oid) = &details.client_oid {
                println!("clientOid:   {}", oid);
            }
        }

        Commands::Size { entry, stop } => {
            let sizing = trading::size(
                entry,
                stop,
                risk_config.account_capital,
                risk_config.max_risk_fraction,
                risk_config.min_notional,
            );

            println!("\n=== Position Size ===");
            println!("Capital:        ${}", risk_config.account_capital);
            println!(
                "Risk per trade: ${} ({}%)",
                risk_config
                    .account_capital
                    .saturating_mul(risk_config.max_risk_fraction),
                risk_config.max_risk_fraction.saturating_mul(Decimal::ONE_HUNDRED)
            );
            match sizing {
                Sizing::Quantity(quantity) => {
                    println!("Quantity:       {}", quantity.round_dp(risk_config.amount_decimals));
                    println!("Notional:       ${}", quantity.saturating_mul(entry).round_dp(2));
                }
                Sizing::NoValidSize(reason) => {
                    println!("No valid size:  {:?}", reason);
                }
            }
        }

        Commands::Execute {
            plan,
            dry_run,
            delay_ms,
            max_trades,
        } => {
            let plans = PlannedTrade::load_plan(&plan)?;
            let mut config = risk_config;
            if let Some(delay) = delay_ms {
                config.order_delay_ms = delay;
            }
            if let Some(max) = max_trades {
                config.max_trades = max;
            }

            let executor = if dry_run {
                TradeExecutor::dry_run(config)
            } else {
                TradeExecutor::live(KucoinClient::from_env()?, config)
            };

            let reports = executor.execute_batch(&plans).await;

            println!("\n{:<12} {:<5} {:>16} {:<40}", "SYMBOL", "SIDE", "QUANTITY", "OUTCOME");
            println!("{}", "-".repeat(76));
            for report in &reports {
                let outcome = match &report.outcome {
                    ExecutionOutcome::Placed { order_id } => format!("placed {}", order_id),
                    ExecutionOutcome::Skipped { reason } => format!("skipped: {}", reason),
                    ExecutionOutcome::DryRun { .. } => "dry run".to_string(),
                    ExecutionOutcome::Invalid { message } => format!("invalid: {}", message),
                    ExecutionOutcome::Rejected { message, .. } => format!("rejected: {}", message),
                    ExecutionOutcome::Unknown { .. } => format!(
                        "UNKNOWN (clientOid {})",
                        report.client_oid.as_deref().unwrap_or("-")
                    ),
                };
                println!(
                    "{:<12} {:<5} {:>16} {:<40}",
                    report.symbol,
                    report.side.as_str(),
                    report
                        .quantity
                        .map(|q| q.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    outcome
                );
            }

            let placed = reports
                .iter()
                .filter(|r| matches!(r.outcome, ExecutionOutcome::Placed { .. }))
                .count();
            info!(total = reports.len(), placed, "Batch complete");
        }

        Commands::Dispatch { request } => {
            let raw = match request {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read request file {}", path))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read request from stdin")?;
                    buf
                }
            };

            let market = MarketClient::with_base_url(base_url())?;
            let account = match Credentials::from_env() {
                Ok(credentials) => Ok(KucoinClient::with_base_url(credentials, base_url())?),
                Err(e) => {
                    warn!(error = %e, "Credentials not configured; only market data is available");
                    Err(e)
                }
            };

            let response = Dispatcher::new(market, account).handle_json(&raw).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Config => {
            println!("\n=== Risk Configuration ===");
            println!("Account capital:     ${}", risk_config.account_capital);
            println!(
                "Max risk per trade:  {}%",
                risk_config.max_risk_fraction * Decimal::ONE_HUNDRED
            );
            println!("Min notional:        ${}", risk_config.min_notional);
            println!("Default stop:        {}%", risk_config.default_stop_fraction * Decimal::ONE_HUNDRED);
            println!("Amount decimals:     {}", risk_config.amount_decimals);
            println!("Order delay:         {}ms", risk_config.order_delay_ms);
            println!("Max trades/batch:    {}", risk_config.max_trades);

            println!("\n=== Exchange ===");
            println!("Base URL:            {}", base_url());
            match Credentials::from_env() {
                Ok(credentials) => {
                    println!("API key:             {}", credentials.api_key());
                    println!("Key version:         {}", credentials.key_version().as_str());
                }
                Err(e) => println!("Credentials:         not configured ({})", e),
            }
        }
    }

    Ok(())
}

fn base_url() -> String {
    std::env::var("KUCOIN_BASE_URL").unwrap_or_else(|_| KUCOIN_URL.to_string())
}
