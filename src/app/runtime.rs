use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use super::config::{Cli, RunConfig, log_filter};
use super::crawl::Crawler;
use super::error::RunError;
use super::export::{OutputSink, export_grid};
use super::fetch::{HttpSource, PageSource};
use super::grid::assemble;
use super::schema::aggregate_keys;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub products: usize,
    pub without_characteristics: usize,
    pub keys: usize,
    pub output: PathBuf,
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match RunConfig::from_cli(cli) {
        Ok(config) => start(config).await,
        Err(err) => Err(err.into()),
    };

    match outcome {
        Ok(summary) => {
            info!(
                products = summary.products,
                without_characteristics = summary.without_characteristics,
                keys = summary.keys,
                "data written to {}",
                summary.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn start(config: RunConfig) -> Result<RunSummary, RunError> {
    let source = HttpSource::new(&config.user_agent, config.timeout_ms)?;
    execute(&config, Arc::new(source)).await
}

/// Crawl, aggregate, assemble and export. Nothing is written unless the
/// root listing was reachable.
pub async fn execute(
    config: &RunConfig,
    source: Arc<dyn PageSource>,
) -> Result<RunSummary, RunError> {
    let selectors = config.selectors.compile()?;
    let crawler = Crawler::new(source, selectors, config.fetch_concurrency);

    info!(url = %config.root, concurrency = config.fetch_concurrency, "crawl started");
    let products = crawler.crawl(&config.root).await?;

    let schema = aggregate_keys(&products);
    if schema.is_empty() {
        warn!("no characteristics were extracted, table will only list product names");
    }
    let grid = assemble(&products, &schema);
    info!(
        products = products.len(),
        keys = schema.len(),
        rows = grid.rows(),
        cols = grid.cols(),
        "table assembled"
    );

    let mut sink = OutputSink::new(&config.output_path, config.output_format);
    let output = export_grid(&grid, &config.sheet, &mut sink)?;

    Ok(RunSummary {
        products: products.len(),
        without_characteristics: products
            .iter()
            .filter(|p| p.characteristics.is_empty())
            .count(),
        keys: schema.len(),
        output,
    })
}
