use std::path::PathBuf;

use chrono::Utc;
use clap::{ArgAction, Parser, ValueEnum};
use url::Url;

use super::crawl::sanitize_fetch_concurrency;
use super::error::ConfigError;
use super::export::{DataFormat, detect_data_format};
use super::fetch::{DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT};
use super::selectors::CatalogSelectors;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "specgrid",
    version,
    about = "Walks a product catalog and exports every product's characteristics as one table"
)]
pub struct Cli {
    /// Root listing page of the catalog.
    #[arg(value_name = "URL")]
    pub url: String,

    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    #[arg(long, value_enum, default_value_t = FileFormatArg::Csv)]
    pub format: FileFormatArg,

    #[arg(long, value_name = "NAME", default_value = "Products")]
    pub sheet: String,

    /// Per-request bound; a slower page counts as unreachable.
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    #[arg(long, value_name = "UA", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[arg(long, value_name = "N", default_value_t = 4)]
    pub fetch_concurrency: usize,

    /// JSON file overriding any of the catalog CSS selectors.
    #[arg(long, value_name = "FILE")]
    pub selectors: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum FileFormatArg {
    Csv,
    Json,
}

impl From<FileFormatArg> for DataFormat {
    fn from(value: FileFormatArg) -> Self {
        match value {
            FileFormatArg::Csv => DataFormat::Csv,
            FileFormatArg::Json => DataFormat::Json,
        }
    }
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: Url,
    pub output_path: PathBuf,
    pub output_format: DataFormat,
    pub sheet: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub fetch_concurrency: usize,
    pub selectors: CatalogSelectors,
}

impl RunConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let root = Url::parse(cli.url.trim()).map_err(|source| ConfigError::Url {
            input: cli.url.clone(),
            source,
        })?;

        let configured_format: DataFormat = cli.format.into();
        let output_format = cli
            .output
            .as_deref()
            .map(|path| detect_data_format(path, configured_format))
            .unwrap_or(configured_format);
        let output_path = cli
            .output
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(default_output_path(&root, output_format)));

        let selectors = match cli.selectors {
            Some(path) => CatalogSelectors::from_file(&path)?,
            None => CatalogSelectors::default(),
        };

        Ok(Self {
            root,
            output_path,
            output_format,
            sheet: cli.sheet,
            timeout_ms: cli.timeout_ms.max(1),
            user_agent: cli.user_agent,
            fetch_concurrency: sanitize_fetch_concurrency(cli.fetch_concurrency),
            selectors,
        })
    }
}

pub fn default_output_path(url: &Url, format: DataFormat) -> String {
    let host = url
        .host_str()
        .map(|h| h.to_string())
        .unwrap_or_else(|| "catalog".to_string());
    let host = host
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let ts = Utc::now().format("%Y%m%d_%H%M%S");
    format!("{host}_{ts}.{}", format.extension())
}

pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "specgrid=info",
        1 => "specgrid=debug",
        _ => "specgrid=trace,reqwest=debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("specgrid").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_follow_the_reference_run() {
        let config = RunConfig::from_cli(cli(&["https://shop.test/c/1?page=0"])).unwrap();
        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.sheet, "Products");
        assert_eq!(config.output_format, DataFormat::Csv);
        assert_eq!(config.selectors, CatalogSelectors::default());
        let name = config.output_path.to_string_lossy().into_owned();
        assert!(name.starts_with("shop_test_"), "{name}");
        assert!(name.ends_with(".csv"), "{name}");
    }

    #[test]
    fn output_extension_overrides_format_flag() {
        let config =
            RunConfig::from_cli(cli(&["https://shop.test/", "-o", "hinges.json"])).unwrap();
        assert_eq!(config.output_format, DataFormat::Json);
        assert_eq!(config.output_path, PathBuf::from("hinges.json"));

        let config = RunConfig::from_cli(cli(&[
            "https://shop.test/",
            "--format",
            "json",
            "-o",
            "hinges.out",
        ]))
        .unwrap();
        assert_eq!(config.output_format, DataFormat::Json);
    }

    #[test]
    fn bad_url_is_a_config_error() {
        let err = RunConfig::from_cli(cli(&["not a url"])).unwrap_err();
        assert!(matches!(err, ConfigError::Url { .. }));
    }

    #[test]
    fn concurrency_and_timeout_are_sanitized() {
        let config = RunConfig::from_cli(cli(&[
            "https://shop.test/",
            "--fetch-concurrency",
            "0",
            "--timeout-ms",
            "0",
        ]))
        .unwrap();
        assert_eq!(config.fetch_concurrency, 1);
        assert_eq!(config.timeout_ms, 1);
    }

    #[test]
    fn verbosity_raises_log_level() {
        assert_eq!(cli(&["https://shop.test/", "-vv"]).verbose, 2);
        assert_eq!(log_filter(0), "specgrid=info");
        assert_eq!(log_filter(1), "specgrid=debug");
    }
}
