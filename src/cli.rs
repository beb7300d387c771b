//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::cached_port::CachedPort;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::availability::AvailabilityReport;
use crate::domain::backtest::{RunConfig, StrategyResult};
use crate::domain::config_validation::{
    data_source, require_int, require_string, validate_availability_config,
    validate_backtest_config, validate_data_config,
};
use crate::domain::error::WeightbenchError;
use crate::domain::runner::StrategyRunner;
use crate::domain::strategy::{StrategySpec, parse_strategies};
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "weightbench", about = "Equal vs market-cap weighting backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one or more weighting strategies over the configured years
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma separated strategy identifiers, overriding [backtest] strategies
        #[arg(short, long)]
        strategies: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Report which tickers have valid data in each year
    Availability {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma separated tickers, overriding [availability] tickers
        #[arg(long)]
        tickers: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Import a CSV data directory into a SQLite store
    Import {
        #[arg(long)]
        csv_dir: PathBuf,
        #[arg(long)]
        db: PathBuf,
    },
}

/// Data source opened from `[data]`, with every observation lookup memoized.
pub type DataSource = CachedPort<Box<dyn MarketDataPort>>;

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategies,
            dry_run,
        } => run_backtest(&config, strategies.as_deref(), dry_run),
        Command::Availability { config, tickers } => run_availability(&config, tickers.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Import { csv_dir, db } => run_import(&csv_dir, &db),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = WeightbenchError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: WeightbenchError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn run_backtest(config_path: &PathBuf, strategies: Option<&str>, dry_run: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter).and_then(|_| validate_data_config(&adapter)) {
        return fail(e);
    }

    let run_config = match build_run_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let specs = match resolve_strategies(strategies, &adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    if dry_run {
        print_plan(&adapter, &run_config, &specs);
        eprintln!("\nDry run complete: configuration is valid");
        return ExitCode::SUCCESS;
    }

    let source = match open_data_source(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    run_backtest_pipeline(&source, run_config, &specs)
}

/// Run every strategy against `port` and print a summary per strategy.
///
/// Exits with the code of the first failed strategy, after all of them have
/// been reported.
pub fn run_backtest_pipeline<P: MarketDataPort>(
    port: &P,
    run_config: RunConfig,
    specs: &[StrategySpec],
) -> ExitCode {
    let runner = match StrategyRunner::new(port, port, run_config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Running {} strategies: {} to {}",
        specs.len(),
        runner.config().start_year,
        runner.config().end_year
    );

    let mut exit = ExitCode::SUCCESS;
    let mut failed = false;
    for (spec, result) in runner.run_all(specs) {
        match result {
            Ok(result) => print_result(&result),
            Err(e) => {
                eprintln!("\n=== {} ===", spec.name);
                eprintln!("error: {e}");
                if !failed {
                    exit = (&e).into();
                    failed = true;
                }
            }
        }
    }
    exit
}

pub fn build_run_config(config: &dyn ConfigPort) -> Result<RunConfig, WeightbenchError> {
    let defaults = RunConfig::default();
    let run_config = RunConfig {
        start_year: narrow(require_int(config, "backtest", "start_year")?, "backtest", "start_year")?,
        end_year: narrow(require_int(config, "backtest", "end_year")?, "backtest", "end_year")?,
        initial_investment: config.get_double(
            "backtest",
            "initial_investment",
            defaults.initial_investment,
        ),
        valuation_month: narrow(
            config.get_int("backtest", "valuation_month", defaults.valuation_month as i64),
            "backtest",
            "valuation_month",
        )?,
        valuation_day: narrow(
            config.get_int("backtest", "valuation_day", defaults.valuation_day as i64),
            "backtest",
            "valuation_day",
        )?,
        max_concurrency: narrow(
            config.get_int("backtest", "max_concurrency", defaults.max_concurrency as i64),
            "backtest",
            "max_concurrency",
        )?,
        fetch_retries: narrow(
            config.get_int("backtest", "fetch_retries", defaults.fetch_retries as i64),
            "backtest",
            "fetch_retries",
        )?,
        retry_delay: Duration::from_millis(narrow(
            config.get_int("backtest", "retry_delay_ms", defaults.retry_delay.as_millis() as i64),
            "backtest",
            "retry_delay_ms",
        )?),
    };
    run_config.validate()?;
    Ok(run_config)
}

fn narrow<T: TryFrom<i64>>(value: i64, section: &str, key: &str) -> Result<T, WeightbenchError> {
    T::try_from(value)
        .map_err(|_| WeightbenchError::config_invalid(section, key, format!("{value} is out of range")))
}

/// CLI override first, then `[backtest] strategies`, then all four variants.
pub fn resolve_strategies(
    strategy_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<StrategySpec>, WeightbenchError> {
    match strategy_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "strategies"))
    {
        Some(list) => parse_strategies(&list)
            .map_err(|e| WeightbenchError::config_invalid("backtest", "strategies", e.to_string())),
        None => Ok(StrategySpec::all()),
    }
}

/// CLI override first, then `[availability] tickers`. `None` means every stock.
pub fn resolve_tickers(
    ticker_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Option<Vec<String>>, WeightbenchError> {
    ticker_override
        .map(str::to_string)
        .or_else(|| config.get_string("availability", "tickers"))
        .map(|list| {
            parse_tickers(&list)
                .map_err(|e| WeightbenchError::config_invalid("availability", "tickers", e.to_string()))
        })
        .transpose()
}

pub fn open_data_source(config: &dyn ConfigPort) -> Result<DataSource, WeightbenchError> {
    let port: Box<dyn MarketDataPort> = match data_source(config)?.as_str() {
        "sqlite" => open_sqlite(config)?,
        _ => {
            let dir = require_string(config, "data", "csv_dir")?;
            info!("reading CSV data from {dir}");
            Box::new(CsvAdapter::open(&dir)?)
        }
    };
    Ok(CachedPort::new(port))
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, WeightbenchError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, WeightbenchError> {
    Err(WeightbenchError::config_invalid(
        "data",
        "source",
        "sqlite feature is required for source = sqlite",
    ))
}

fn print_plan(config: &dyn ConfigPort, run_config: &RunConfig, specs: &[StrategySpec]) {
    eprintln!("Config validated successfully");
    eprintln!("\nRun:");
    eprintln!(
        "  years:       {}-{}",
        run_config.start_year, run_config.end_year
    );
    eprintln!(
        "  valuation:   month {} day {}",
        run_config.valuation_month, run_config.valuation_day
    );
    eprintln!("  investment:  {:.2}", run_config.initial_investment);
    eprintln!("  concurrency: {}", run_config.max_concurrency);
    eprintln!(
        "  retries:     {} (base delay {:?})",
        run_config.fetch_retries, run_config.retry_delay
    );
    eprintln!(
        "  data source: {}",
        data_source(config).unwrap_or_else(|_| "csv".to_string())
    );

    eprintln!("\nStrategies:");
    for spec in specs {
        eprintln!("  {}", spec.name);
    }
}

pub fn print_result(result: &StrategyResult) {
    eprintln!("\n=== {} ===", result.name);
    if result.cancelled {
        eprintln!("(cancelled: partial history)");
    }
    eprintln!("Start Value:      {:.2}", result.start_value);
    eprintln!("End Value:        {:.2}", result.end_value);
    eprintln!("Total Return:     {:.2}%", result.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", result.annualized_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", result.max_drawdown * 100.0);
    eprintln!(
        "Years:            {} recorded, {} skipped",
        result.snapshots.len(),
        result.skipped.len()
    );

    for snapshot in &result.snapshots {
        let change = result
            .yearly
            .iter()
            .find(|y| y.year == snapshot.year)
            .map(|y| format!("{:+.2}%", y.change * 100.0))
            .unwrap_or_default();
        eprintln!(
            "  {}  {:>16.2}  {:>3} holdings  {}",
            snapshot.year,
            snapshot.total_value,
            snapshot.holdings.len(),
            change
        );
    }
    for skipped in &result.skipped {
        eprintln!("  {}  skipped: {}", skipped.year, skipped.reason);
    }
}

fn run_availability(config_path: &PathBuf, tickers: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter)
        .and_then(|_| validate_data_config(&adapter))
        .and_then(|_| validate_availability_config(&adapter))
    {
        return fail(e);
    }

    let result = build_run_config(&adapter).and_then(|run_config| {
        let tickers = resolve_tickers(tickers, &adapter)?;
        let source = open_data_source(&adapter)?;
        let runner = StrategyRunner::new(&source, &source, run_config)?;
        runner.analyze_availability(tickers.as_deref())
    });

    match result {
        Ok(report) => {
            print_availability(&report);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn print_availability(report: &AvailabilityReport) {
    eprintln!("=== Availability ({} tickers) ===", report.tickers.len());
    if report.cancelled {
        eprintln!("(cancelled: partial report)");
    }
    for year in &report.years {
        eprintln!(
            "{}: {} available, {} entering, {} exiting, {} continuing",
            year.year,
            year.available.len(),
            year.entering.len(),
            year.exiting.len(),
            year.continuing.len()
        );
        if !year.entering.is_empty() {
            eprintln!("  + {}", join(&year.entering));
        }
        if !year.exiting.is_empty() {
            eprintln!("  - {}", join(&year.exiting));
        }
    }

    let never = report.never_available();
    if !never.is_empty() {
        eprintln!("\nNever available: {}", never.join(", "));
    }
}

fn join<'a>(tickers: impl IntoIterator<Item = &'a String>) -> String {
    tickers
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let checks = validate_backtest_config(&adapter)
        .and_then(|_| validate_data_config(&adapter))
        .and_then(|_| validate_availability_config(&adapter))
        .and_then(|_| build_run_config(&adapter).map(|_| ()));

    match checks {
        Ok(()) => {
            eprintln!("Config validated successfully");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

#[cfg(feature = "sqlite")]
fn run_import(csv_dir: &PathBuf, db: &PathBuf) -> ExitCode {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let result = (|| -> Result<(usize, usize), WeightbenchError> {
        let source = CsvAdapter::open(csv_dir)?;
        let store = SqliteAdapter::open(&db.to_string_lossy(), 1, Duration::from_secs(5))?;
        store.initialize_schema()?;
        store.insert_stocks(source.stocks())?;
        store.insert_observations(source.observations())?;
        store.counts()
    })();

    match result {
        Ok((stocks, observations)) => {
            eprintln!(
                "Imported {} into {}: {} stocks, {} observations",
                csv_dir.display(),
                db.display(),
                stocks,
                observations
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

#[cfg(not(feature = "sqlite"))]
fn run_import(_csv_dir: &PathBuf, _db: &PathBuf) -> ExitCode {
    eprintln!("error: sqlite feature is required for import");
    ExitCode::from(1)
}
