//! Attack client
//!
//! Fires concurrent random-direction transfers at a running gateway and
//! prints how many committed, how many were deadlock victims and what the
//! balances look like afterwards.
//!
//! ```text
//! cargo run --bin attack -- --requests 50 --mode unsafe
//! cargo run --bin attack -- --requests 50 --mode safe
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use deadlock_bank::harness::{self, AttackConfig};
use deadlock_bank::transfer::LockStrategy;

#[derive(Parser, Debug)]
#[command(name = "attack", version, about = "Concurrent transfer load generator")]
struct Cli {
    /// Gateway base URL
    #[arg(long, default_value = "http://localhost:8000")]
    url: String,

    /// Total transfer requests to send
    #[arg(short = 'n', long, default_value_t = 50)]
    requests: usize,

    /// Requests in flight at the same time
    #[arg(short, long, default_value_t = 8)]
    concurrency: usize,

    /// Amount moved per transfer
    #[arg(short, long, default_value_t = 10)]
    amount: i64,

    /// Lock strategy endpoint (unsafe | safe)
    #[arg(short, long, default_value = "unsafe")]
    mode: LockStrategy,

    /// Skip POST /reset before the run
    #[arg(long)]
    no_reset: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AttackConfig {
        api_url: cli.url,
        total_requests: cli.requests,
        concurrency: cli.concurrency,
        amount: cli.amount,
        strategy: cli.mode,
        reset_first: !cli.no_reset,
    };

    println!(
        "--- Starting {} attack: {} requests, {} concurrent ---",
        config.strategy, config.total_requests, config.concurrency
    );

    let client = reqwest::Client::new();
    let tally = harness::run_attack(&client, &config).await?;

    println!("\n--- Results ---");
    println!("Successful Transfers: {}", tally.success);
    println!("Deadlocks Detected:   {}", tally.deadlock);
    println!("Other Rejections:     {}", tally.rejected);
    println!("Transport Errors:     {}", tally.transport_error);

    match harness::fetch_accounts(&client, &config.api_url).await {
        Ok(accounts) => {
            println!("\n--- Final Balances ---");
            for account in &accounts {
                println!("{:>3} {:<8} {}", account.id, account.name, account.balance);
            }
            let total: i64 = accounts.iter().map(|a| a.balance).sum();
            println!("Total: {}", total);
        }
        Err(e) => eprintln!("Could not fetch final balances: {:#}", e),
    }

    Ok(())
}
