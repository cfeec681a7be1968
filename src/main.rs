//! Futures Trade Preview - Main Entry Point
//!
//! Replays scripted order-form sessions against an in-memory oracle, or
//! previews a single trade against the oracle gateway.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use futures_trade_preview::common::channels::create_preview_channel;
use futures_trade_preview::config::load_config;
use futures_trade_preview::preview::PreviewEvent;
use futures_trade_preview::{
    AccountType, CurrencyType, OrderType, PositionSide, PreviewEngine, RestOracle, Scenario,
    SessionState, TradeAmountOptions,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON scenario against the in-memory oracle
    Simulate {
        #[arg(short, long)]
        scenario: PathBuf,
    },
    /// Preview one trade against the oracle gateway
    Preview {
        #[arg(long)]
        market: String,
        #[arg(long, env = "PREVIEW_WALLET")]
        wallet: Option<String>,
        #[arg(long, default_value = "cross_margin")]
        account_type: AccountType,
        #[arg(long, default_value = "market")]
        order_type: OrderType,
        #[arg(long, default_value = "long")]
        side: PositionSide,
        /// Order size, in `currency` units
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "usd")]
        currency: CurrencyType,
        /// Trigger price for limit/stop orders
        #[arg(long)]
        order_price: Option<Decimal>,
        /// Leverage to trade at
        #[arg(long)]
        leverage: Option<Decimal>,
    },
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

fn print_state(state: &SessionState) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = load_config(Some(&args.config)).context("loading configuration")?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_logging(&level, args.json_logs || config.settings.json_logs)?;

    info!("Starting futures trade preview");
    info!("Configuration file: {}", args.config);

    match args.command {
        Command::Simulate { scenario } => {
            let scenario = Scenario::load(&scenario)
                .with_context(|| format!("loading scenario {}", scenario.display()))?;

            let (sender, mut receiver) = create_preview_channel();
            let printer = tokio::spawn(async move {
                while let Some(event) = receiver.recv().await {
                    match event {
                        PreviewEvent::Optimistic(preview) => info!(
                            seq = preview.seq,
                            "Optimistic: margin {} fee {}",
                            preview.margin,
                            preview.total_fee
                        ),
                        PreviewEvent::Previewing { seq } => info!(seq, "Asking oracle"),
                        PreviewEvent::Resolved(preview) => info!(
                            seq = preview.seq,
                            "Resolved: margin {} leverage {}",
                            preview.margin,
                            preview.leverage
                        ),
                        PreviewEvent::Failed { seq, failure } => {
                            warn!(seq, "Failed: {}", failure.message)
                        }
                        PreviewEvent::Reset => info!("Inputs cleared"),
                    }
                }
            });

            let oracle = scenario.oracle().await;
            let mut engine = PreviewEngine::with_events(oracle, config.engine.clone(), sender);
            let state = scenario.run(&mut engine).await?;
            drop(engine);
            printer.await?;

            print_state(&state)?;
        }
        Command::Preview {
            market,
            wallet,
            account_type,
            order_type,
            side,
            amount,
            currency,
            order_price,
            leverage,
        } => {
            let oracle = RestOracle::from_config(&config.oracle)?;
            let mut engine = PreviewEngine::new(oracle, config.engine.clone());

            engine.switch_account_type(account_type).await;
            engine.switch_market(&market).await;
            engine.switch_wallet(wallet).await;
            engine.sync().await?;

            engine.set_order_price(order_price).await;
            if let Some(leverage) = leverage {
                engine.set_preferred_leverage(leverage).await?;
            }
            engine.set_order_type(order_type).await;
            engine.set_leverage_side(side).await;

            info!(
                "Max sUSD input {} (max fee {})",
                engine.max_usd_input_amount().await,
                engine.max_fee().await
            );
            engine
                .on_trade_amount_change(&amount, currency, TradeAmountOptions::default())
                .await;

            let state = engine.settle().await;
            print_state(&state)?;
        }
    }

    Ok(())
}
