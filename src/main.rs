use std::{path::PathBuf, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use waterfront_metrics::{
    client::ApiClient,
    config::Config,
    encode::write_points,
    poller::{ChartKind, Poller},
    query::{ChartQuery, DatasetData},
};

/// Runs dashboard chart queries and prints the normalized datasets.
#[derive(Parser)]
#[command(name = "waterfront-metrics", version)]
struct Args {
    /// Metrics queries, one dataset group each
    #[arg(required = true)]
    queries: Vec<String>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dashboard API base URL, overrides the config file
    #[arg(long)]
    base_url: Option<String>,

    /// Seconds between points
    #[arg(long)]
    step: Option<i64>,

    /// Query current values instead of time series
    #[arg(long)]
    instant: bool,

    /// Keep polling and print every update
    #[arg(long)]
    watch: bool,

    /// Print series as CSV instead of JSON
    #[arg(long)]
    csv: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(base_url) = &args.base_url {
        config.client.base_url = base_url.clone();
    }
    config.poll.set_watch(args.watch);
    config.validate()?;

    let queries: Vec<ChartQuery> = args
        .queries
        .iter()
        .map(|q| ChartQuery {
            step: args.step,
            ..ChartQuery::new(q)
        })
        .collect();
    let kind = if args.instant {
        ChartKind::Instant
    } else {
        ChartKind::Range
    };

    let source = Arc::new(ApiClient::new(&config.client)?);
    info!("querying {}", config.client.base_url);
    let mut poller = Poller::start(source, queries, kind, config.poll.clone())?;

    if !args.watch {
        poller.join();
        return print_state(&poller, args.csv);
    }

    let mut last_cycle = 0;
    loop {
        let cycle = poller.state().cycle;
        if cycle != last_cycle {
            last_cycle = cycle;
            if let Err(e) = print_state(&poller, args.csv) {
                error!("{:#}", e);
            }
        }
        thread::sleep(Duration::from_millis(200));
    }
}

fn print_state(poller: &Poller, csv: bool) -> Result<()> {
    let state = poller.state();
    if let Some(error) = state.error {
        anyhow::bail!("failed to load chart data: {}", error);
    }
    let datasets = state.data.unwrap_or_default();
    if !csv {
        println!("{}", serde_json::to_string_pretty(&datasets)?);
        return Ok(());
    }

    let stdout = std::io::stdout();
    for dataset in &datasets {
        println!("# {}", dataset.label.as_deref().unwrap_or("-"));
        match &dataset.data {
            DatasetData::Series(points) => write_points(stdout.lock(), points)?,
            DatasetData::Scalar(value) => println!("{}", value),
        }
    }
    Ok(())
}
