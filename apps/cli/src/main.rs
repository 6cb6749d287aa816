mod main_lib;

use std::sync::Arc;

use clap::Parser;
use navquote_engine::{Engine, EngineConfig, HttpFetcher};

use main_lib::{build_requests, init_tracing, render_json, render_table};

#[derive(Parser)]
#[command(name = "navquote")]
#[command(about = "Look up fund net values and stock prices")]
struct Cli {
    /// Fund codes (000311) or exchange-prefixed tickers (sh600000, usAAPL)
    #[arg(required = true, value_name = "IDENTIFIER")]
    identifiers: Vec<String>,

    /// As-of date, YYYY-MM-DD or YYYYMMDD
    #[arg(long)]
    date: Option<String>,

    /// Print records as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let config = EngineConfig::from_env();
    let fetcher = Arc::new(HttpFetcher::new()?);
    let engine = Engine::new(config, fetcher);
    engine.init();

    let requests = build_requests(&cli.identifiers, cli.date.as_deref());
    let records = engine.query_many(&requests).await;
    tracing::debug!("Engine stats: {:?}", engine.stats());
    engine.shutdown();

    if cli.json {
        println!("{}", render_json(&records)?);
    } else {
        print!("{}", render_table(&records));
    }
    Ok(())
}
