//! pl-squad-fetch: one resilient call against API-Football, printed as JSON.
//!
//! Usage:
//!   pl-squad-fetch <endpoint> [key=value ...] [--stats]
//!
//! Example:
//!   pl-squad-fetch players/squads team=42
//!   RUST_LOG=pl_squad=debug pl-squad-fetch teams league=39 season=2024 --stats

use anyhow::{bail, Context};
use pl_squad::{CancellationToken, Params, ResilientFetcher};

fn print_usage() {
    println!(
        r#"pl-squad-fetch: fetch one API-Football endpoint

USAGE:
    pl-squad-fetch <endpoint> [key=value ...] [--stats]

OPTIONS:
    --stats         Print call statistics to stderr
    -h, --help      Show this help message

ENVIRONMENT:
    RAPIDAPI_KEY        API credential (required; .env is honoured)
    API_RATE_MAX        Calls per window (default 20)
    API_RATE_WINDOW     Window in seconds (default 60)
    API_TIMEOUT_SECS    Per-attempt timeout (default 15)
    API_MAX_ATTEMPTS    Transport attempts per call (default 3)
    API_BASE_URL        Override https://api-football-v1.p.rapidapi.com/v3
    RUST_LOG            Log filter (default: info)"#
    );
}

/// `team=42` → ("team", 42). Integer-looking values are sent as integers.
fn parse_param(raw: &str) -> anyhow::Result<(String, pl_squad::ParamValue)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected key=value, got {raw:?}"))?;
    if key.is_empty() {
        bail!("empty parameter name in {raw:?}");
    }
    let value = match value.parse::<i64>() {
        Ok(n) => pl_squad::ParamValue::Int(n),
        Err(_) => pl_squad::ParamValue::Str(value.to_string()),
    };
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        if args.is_empty() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let show_stats = args.iter().any(|a| a == "--stats");
    let mut positional = args.iter().filter(|a| a.as_str() != "--stats");
    let endpoint = positional.next().context("missing endpoint")?;
    let mut params = Params::new();
    for raw in positional {
        let (key, value) = parse_param(raw)?;
        params.insert(key, value);
    }

    let fetcher = ResilientFetcher::from_env().context("failed to configure fetcher")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let (payload, stats) = fetcher
        .fetch_with_stats(endpoint, &params, &cancel)
        .await
        .with_context(|| format!("fetching {endpoint}"))?;

    println!("{}", serde_json::to_string_pretty(&payload)?);
    if show_stats {
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}
