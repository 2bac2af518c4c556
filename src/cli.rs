//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::csv_adapter::CsvCandleAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::open_history;
use crate::adapters::paper_exchange::PaperExchange;
use crate::adapters::throttled_exchange::ThrottledExchange;
use crate::domain::analysis::{self, BacktestRecord};
use crate::domain::backtest::BacktestSimulator;
use crate::domain::config::{HistoryBackend, HistorySettings, TraderConfig};
use crate::domain::config_validation::validate_config;
use crate::domain::cycle::{CycleRunner, TradingCycle};
use crate::domain::error::SigtraderError;
use crate::domain::metrics::BacktestResult;
use crate::domain::selector::StrategySelector;
use crate::domain::signal::SignalDecision;
use crate::domain::strategy::{Strategy, default_strategies, strategy_by_name};
use crate::domain::universe::resolve_universe;
use crate::ports::exchange_port::ExchangePort;
use crate::ports::history_port::HistoryPort;

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Futures signal engine with backtest-validated strategy selection")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate every strategy on a symbol's candles and show the selection
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: PathBuf,
        #[arg(short, long)]
        symbol: String,
    },
    /// Backtest strategies on a symbol's candles
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: PathBuf,
        #[arg(short, long)]
        symbol: String,
        /// Only this strategy (rsi_bb_vwap, macd_ema_vol, stoch_fib_trend)
        #[arg(long)]
        strategy: Option<String>,
        /// Append results to this history store (.db/.sqlite or .csv)
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Run decision cycles against the paper exchange
    Cycle {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: PathBuf,
        /// Starting paper balance in the quote asset
        #[arg(long, default_value_t = 1000.0)]
        balance: f64,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the performance report and recommendations from a history store
    Report {
        #[arg(long)]
        history: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Signal {
            config,
            data_dir,
            symbol,
        } => run_signal(&config, data_dir, &symbol),
        Command::Backtest {
            config,
            data_dir,
            symbol,
            strategy,
            history,
        } => run_backtest(&config, data_dir, &symbol, strategy.as_deref(), history.as_deref()),
        Command::Cycle {
            config,
            data_dir,
            balance,
            cycles,
        } => run_cycle(&config, data_dir, balance, cycles),
        Command::Validate { config } => run_validate(&config),
        Command::Report { history } => run_report(&history),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Loads, applies environment overrides and validates.
pub fn load_config(path: &Path) -> Result<TraderConfig, SigtraderError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?.with_env_overrides();
    let config = TraderConfig::from_port(&adapter)?;
    validate_config(&config)?;
    Ok(config)
}

/// History settings for an explicit path: `.db`/`.sqlite` is SQLite, `.csv`
/// is CSV, anything else keeps the configured backend.
pub fn history_for_path(path: &Path, configured: HistoryBackend) -> Result<HistorySettings, SigtraderError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    let backend = match extension.as_deref() {
        Some("db") | Some("sqlite") | Some("sqlite3") => "sqlite".parse()?,
        Some("csv") => HistoryBackend::Csv,
        _ => configured,
    };
    Ok(HistorySettings {
        backend,
        path: path.to_path_buf(),
        ..HistorySettings::default()
    })
}

fn open_history_at(path: &Path) -> Result<Box<dyn HistoryPort>, SigtraderError> {
    let settings = history_for_path(path, HistoryBackend::default())?;
    open_history(&settings)?.ok_or_else(|| SigtraderError::History {
        reason: format!("no history backend for {}", path.display()),
    })
}

fn print_decision(decision: &SignalDecision) {
    print!(
        "{:<16} {:<5} strength {}",
        decision.strategy_name, decision.action, decision.strength
    );
    if let Some(score) = decision.backtest_score {
        print!("  score {:.1}", score);
    }
    println!();
    for reason in &decision.reasons {
        println!("    - {}", reason);
    }
}

fn print_result(result: &BacktestResult) {
    println!(
        "{:<16} trades {:>3}  win rate {:>6.2}%  pnl {:>7.2}%  max dd {:>6.2}%  sharpe {:>6.2}  score {:>5.1}",
        result.strategy_name,
        result.total_trades,
        result.win_rate * 100.0,
        result.total_pnl_pct * 100.0,
        result.max_drawdown_pct * 100.0,
        result.sharpe_ratio,
        result.composite_score
    );
}

fn run_signal(config_path: &Path, data_dir: PathBuf, symbol: &str) -> Result<(), SigtraderError> {
    let config = load_config(config_path)?;
    let series = CsvCandleAdapter::new(data_dir).load(symbol, &config.exchange.interval)?;
    info!(symbol, bars = series.len(), "candles loaded");

    let selector = StrategySelector::from_config(&config);
    println!("{} ({} bars, last close {:?})", symbol, series.len(), series.last_close());
    println!("Strategy decisions:");
    for decision in selector.evaluate_all(&series) {
        print_decision(&decision);
    }

    let selection = selector.select_with(symbol, &series, || Ok(series.clone()));
    println!("Selected:");
    print_decision(&selection.decision);
    for result in &selection.backtests {
        print_result(result);
    }
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    data_dir: PathBuf,
    symbol: &str,
    strategy: Option<&str>,
    history: Option<&Path>,
) -> Result<(), SigtraderError> {
    let config = load_config(config_path)?;
    let series = CsvCandleAdapter::new(data_dir).load(symbol, &config.exchange.interval)?;

    let strategies: Vec<Box<dyn Strategy>> = match strategy {
        Some(name) => vec![
            strategy_by_name(name, &config.indicators, config.signal_filters()).ok_or_else(|| {
                SigtraderError::config_invalid("strategy", "name", format!("unknown strategy '{}'", name))
            })?,
        ],
        None => default_strategies(&config.indicators, config.signal_filters()),
    };

    let simulator = BacktestSimulator::new(&config.risk);
    println!("{} ({} bars)", symbol, series.len());
    let results: Vec<BacktestResult> = strategies
        .iter()
        .map(|s| simulator.run(symbol, s.as_ref(), &series))
        .collect();
    for result in &results {
        print_result(result);
    }

    if let Some(path) = history {
        let store = open_history_at(path)?;
        let now = Utc::now();
        let records: Vec<BacktestRecord> = results.iter().map(|r| BacktestRecord::new(r, now)).collect();
        store.append(&records)?;
        info!(path = %path.display(), count = records.len(), "results recorded");
    }
    Ok(())
}

fn run_cycle(
    config_path: &Path,
    data_dir: PathBuf,
    balance: f64,
    cycles: Option<usize>,
) -> Result<(), SigtraderError> {
    let config = load_config(config_path)?;
    let exchange = ThrottledExchange::new(
        PaperExchange::new(data_dir, &config.exchange.interval, balance),
        config.runtime.min_api_interval,
    );
    let notifier = LogNotifier::new(config.notifications);
    let history = open_history(&config.history)?;

    let universe = resolve_universe(&exchange, &config.exchange)?;
    if universe.count() == 0 {
        return Err(SigtraderError::data("no tradable symbols in the data directory"));
    }

    let mut cycle = TradingCycle::new(&exchange, &notifier, &config, universe);
    if let Some(store) = history.as_deref() {
        cycle = cycle.with_history(store);
    }
    let mut runner = CycleRunner::new(cycle);
    if let Some(n) = cycles {
        runner = runner.with_max_cycles(n);
    }

    let summary = runner.run();
    println!(
        "Cycles: {}  orders placed: {}  stopped: {:?}",
        summary.cycles, summary.orders_placed, summary.stop_reason
    );
    let mut open: Vec<String> = exchange.get_open_positions()?.into_iter().collect();
    open.sort();
    for symbol in open {
        if let Some(p) = exchange.inner().position(&symbol) {
            println!("  {} {} {} @ {}", symbol, p.side, p.quantity, p.entry_price);
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), SigtraderError> {
    let config = load_config(config_path)?;
    println!("Configuration is valid");
    println!("  interval: {}", config.exchange.interval);
    println!(
        "  risk: tp {:.2}% sl {:.2}% leverage {}x {}",
        config.risk.take_profit_pct * 100.0,
        config.risk.stop_loss_pct * 100.0,
        config.risk.leverage,
        config.risk.margin_type
    );
    println!(
        "  backtesting: {} (min score {:.1})",
        if config.backtest.enabled { "enabled" } else { "disabled" },
        config.risk.min_backtest_score
    );
    Ok(())
}

fn run_report(history: &Path) -> Result<(), SigtraderError> {
    let store = open_history_at(history)?;
    let records = store.load()?;
    let now = Utc::now();

    println!("{}", analysis::performance_report(&records, now));
    println!("RECOMMENDATIONS:");
    for line in analysis::recommendations(&records, now) {
        println!("- {}", line);
    }
    Ok(())
}
