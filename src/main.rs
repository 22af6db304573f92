use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rentspot_sniper::adapters::pump_portal::trade_api::PumpPortalTradeApi;
use rentspot_sniper::application::BotSession;
use rentspot_sniper::config::{load_config, Config};
use rentspot_sniper::ports::mocks::PaperTradePort;
use rentspot_sniper::ports::notify::LogNotifier;
use rentspot_sniper::ports::oracle::StaticOracle;

#[derive(Parser)]
#[command(name = "rentspot-sniper")]
#[command(about = "Pump.fun launch sniper with trailing-stop exits")]
struct CliApp {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sniper against the live feed
    Run {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Paper trading: fill orders locally, submit nothing
        #[arg(long)]
        paper: bool,
    },
    /// Validate the configuration and print the effective parameters
    Check {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

fn init_logging(cli: &CliApp, config: &Config) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        &config.logging.level
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rentspot_sniper={}", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_parameters(config: &Config) {
    println!("Trading parameters:");
    println!("  trade amount:        {} SOL", config.trading.trade_amount_sol);
    println!("  slippage:            {}%", config.trading.slippage_pct);
    println!("  max active tokens:   {}", config.trading.max_active_tokens);
    println!("  auto buyback:        {}", config.trading.auto_buyback);
    println!("Monitoring:");
    println!("  min mcap:            ${}", config.monitoring.min_mcap_usd);
    println!("  sell mcap:           ${}", config.monitoring.sell_mcap_usd);
    println!("  stop loss:           {} SOL", config.monitoring.stop_loss_sol);
    println!(
        "  trailing stop:       {}-{}%",
        config.monitoring.min_trailing_stop_pct, config.monitoring.max_trailing_stop_pct
    );
    println!("Settlement:");
    println!("  min spots:           {}", config.settlement.min_spots);
    println!("  max batch:           {}", config.settlement.max_batch_size);
    println!("  interval:            {}s", config.settlement.interval_secs);
    println!("Oracle:");
    println!("  SOL/USD:             ${}", config.oracle.sol_usd);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = CliApp::parse();

    match &cli.command {
        Command::Check { config } => {
            let config = load_config(config).context("failed to load configuration")?;
            println!("Configuration OK");
            print_parameters(&config);
            Ok(())
        }
        Command::Run { config, paper } => {
            let config = load_config(config).context("failed to load configuration")?;
            init_logging(&cli, &config);

            let trade_port: Arc<dyn rentspot_sniper::ports::execution::TradePort> = if *paper {
                tracing::info!("paper trading: orders fill locally");
                Arc::new(PaperTradePort::new())
            } else {
                Arc::new(PumpPortalTradeApi::new(
                    config.portal.trade_url.clone(),
                    config.portal.get_api_key(),
                    std::time::Duration::from_secs(config.portal.request_timeout_secs),
                ))
            };
            let oracle = Arc::new(StaticOracle::new(config.oracle.sol_usd));
            let notifier = Arc::new(LogNotifier);

            let session = BotSession::new(config, trade_port, oracle, notifier);
            let stop = session.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl+C received, stopping");
                    stop.notify_one();
                }
            });

            let summary = session.run().await.context("session ended with an error")?;
            println!("Session summary:");
            println!("  trades:              {}", summary.total_trades);
            println!("  success rate:        {:.1}%", summary.success_rate_pct);
            println!("  cumulative profit:   {} SOL", summary.cumulative_profit);
            println!("  max drawdown:        {:.1}%", summary.max_drawdown_pct);
            Ok(())
        }
    }
}
