//! Typed trading configuration built from a [`ConfigPort`].
//!
//! Values are read with defaults; range checks live in
//! [`config_validation`](super::config_validation).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::error::SigtraderError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginType {
    Isolated,
    Crossed,
}

impl FromStr for MarginType {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ISOLATED" => Ok(MarginType::Isolated),
            "CROSS" | "CROSSED" => Ok(MarginType::Crossed),
            other => Err(SigtraderError::config_invalid(
                "risk",
                "margin_type",
                format!("unknown margin type '{}', expected ISOLATED or CROSSED", other),
            )),
        }
    }
}

impl fmt::Display for MarginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginType::Isolated => write!(f, "ISOLATED"),
            MarginType::Crossed => write!(f, "CROSSED"),
        }
    }
}

/// Process-wide risk settings, read-only to the core.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskParameters {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub fee_rate: f64,
    pub notional_volume: f64,
    pub leverage: u32,
    pub margin_type: MarginType,
    pub max_concurrent_positions: usize,
    pub min_signal_strength: u32,
    pub min_backtest_score: f64,
    pub volume_threshold: f64,
    pub min_notional: f64,
    pub max_balance_fraction: f64,
    pub min_balance: f64,
    pub min_take_profit_edge: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        RiskParameters {
            take_profit_pct: 0.02,
            stop_loss_pct: 0.015,
            fee_rate: 0.0005,
            notional_volume: 15.0,
            leverage: 10,
            margin_type: MarginType::Isolated,
            max_concurrent_positions: 5,
            min_signal_strength: 2,
            min_backtest_score: 45.0,
            volume_threshold: 1.5,
            min_notional: 5.0,
            max_balance_fraction: 0.8,
            min_balance: 10.0,
            min_take_profit_edge: 0.001,
        }
    }
}

/// Gates applied on top of the raw sub-signal counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalFilters {
    pub min_signal_strength: u32,
    pub volume_threshold: f64,
}

impl Default for SignalFilters {
    fn default() -> Self {
        SignalFilters {
            min_signal_strength: 2,
            volume_threshold: 1.5,
        }
    }
}

impl From<&RiskParameters> for SignalFilters {
    fn from(risk: &RiskParameters) -> Self {
        SignalFilters {
            min_signal_strength: risk.min_signal_strength,
            volume_threshold: risk.volume_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub bb_period: usize,
    pub bb_std: f64,
    pub vwap_window: usize,
    pub volume_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ema_short: usize,
    pub ema_long: usize,
    pub trend_period: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
    pub fib_lookback: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            bb_period: 20,
            bb_std: 2.0,
            vwap_window: 14,
            volume_window: 20,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ema_short: 50,
            ema_long: 200,
            trend_period: 100,
            stoch_k: 14,
            stoch_d: 3,
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
            fib_lookback: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub enabled: bool,
    pub lookback_days: i64,
    pub limit: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        BacktestSettings {
            enabled: false,
            lookback_days: 7,
            limit: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSettings {
    pub interval: String,
    pub candle_limit: usize,
    pub quote_asset: String,
    pub min_symbol_len: usize,
    pub symbols: Vec<String>,
    pub excluded_symbols: Vec<String>,
    pub max_symbols_per_cycle: usize,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        ExchangeSettings {
            interval: "15m".to_string(),
            candle_limit: 300,
            quote_asset: "USDT".to_string(),
            min_symbol_len: 6,
            symbols: Vec::new(),
            excluded_symbols: vec!["USDCUSDT".to_string(), "BUSDUSDT".to_string()],
            max_symbols_per_cycle: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub min_api_interval: Duration,
    pub leg_delay: Duration,
    pub cycle_interval: Duration,
    pub low_balance_pause: Duration,
    pub error_pause: Duration,
    pub max_consecutive_errors: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            min_api_interval: Duration::from_millis(100),
            leg_delay: Duration::from_secs(2),
            cycle_interval: Duration::from_secs(180),
            low_balance_pause: Duration::from_secs(300),
            error_pause: Duration::from_secs(60),
            max_consecutive_errors: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSettings {
    pub on_trades: bool,
    pub on_errors: bool,
    pub on_startup: bool,
    pub on_balance_low: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            on_trades: true,
            on_errors: true,
            on_startup: true,
            on_balance_low: true,
        }
    }
}

/// Where backtest results are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackend {
    #[cfg(feature = "sqlite")]
    Sqlite,
    Csv,
    Disabled,
}

impl HistoryBackend {
    fn default_path(self) -> PathBuf {
        match self {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite => PathBuf::from("backtest_history.db"),
            HistoryBackend::Csv | HistoryBackend::Disabled => {
                PathBuf::from("backtest_history.csv")
            }
        }
    }
}

impl Default for HistoryBackend {
    fn default() -> Self {
        #[cfg(feature = "sqlite")]
        {
            HistoryBackend::Sqlite
        }
        #[cfg(not(feature = "sqlite"))]
        {
            HistoryBackend::Csv
        }
    }
}

impl FromStr for HistoryBackend {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(HistoryBackend::Sqlite),
            "csv" => Ok(HistoryBackend::Csv),
            "none" | "off" => Ok(HistoryBackend::Disabled),
            other => Err(SigtraderError::config_invalid(
                "history",
                "backend",
                format!("unsupported history backend '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySettings {
    pub backend: HistoryBackend,
    pub path: PathBuf,
    pub pool_size: u32,
}

impl Default for HistorySettings {
    fn default() -> Self {
        let backend = HistoryBackend::default();
        HistorySettings {
            backend,
            path: backend.default_path(),
            pool_size: 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraderConfig {
    pub risk: RiskParameters,
    pub indicators: IndicatorParams,
    pub backtest: BacktestSettings,
    pub exchange: ExchangeSettings,
    pub runtime: RuntimeSettings,
    pub notifications: NotificationSettings,
    pub history: HistorySettings,
}

impl TraderConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let d = TraderConfig::default();

        let margin_type = match config.get_string("risk", "margin_type") {
            Some(s) => s.parse()?,
            None => d.risk.margin_type,
        };

        let risk = RiskParameters {
            take_profit_pct: config.get_double("risk", "take_profit_pct", d.risk.take_profit_pct),
            stop_loss_pct: config.get_double("risk", "stop_loss_pct", d.risk.stop_loss_pct),
            fee_rate: config.get_double("risk", "fee_rate", d.risk.fee_rate),
            notional_volume: config.get_double("risk", "notional_volume", d.risk.notional_volume),
            leverage: get_u32(config, "risk", "leverage", d.risk.leverage)?,
            margin_type,
            max_concurrent_positions: get_usize(
                config,
                "risk",
                "max_concurrent_positions",
                d.risk.max_concurrent_positions,
            )?,
            min_signal_strength: get_u32(
                config,
                "strategy",
                "min_signal_strength",
                d.risk.min_signal_strength,
            )?,
            min_backtest_score: config.get_double(
                "strategy",
                "min_backtest_score",
                d.risk.min_backtest_score,
            ),
            volume_threshold: config.get_double(
                "strategy",
                "volume_threshold",
                d.risk.volume_threshold,
            ),
            min_notional: config.get_double("risk", "min_notional", d.risk.min_notional),
            max_balance_fraction: config.get_double(
                "risk",
                "max_balance_fraction",
                d.risk.max_balance_fraction,
            ),
            min_balance: config.get_double("risk", "min_balance", d.risk.min_balance),
            min_take_profit_edge: config.get_double(
                "risk",
                "min_take_profit_edge",
                d.risk.min_take_profit_edge,
            ),
        };

        let di = &d.indicators;
        let indicators = IndicatorParams {
            rsi_period: get_usize(config, "indicators", "rsi_period", di.rsi_period)?,
            rsi_oversold: config.get_double("indicators", "rsi_oversold", di.rsi_oversold),
            rsi_overbought: config.get_double("indicators", "rsi_overbought", di.rsi_overbought),
            bb_period: get_usize(config, "indicators", "bb_period", di.bb_period)?,
            bb_std: config.get_double("indicators", "bb_std", di.bb_std),
            vwap_window: get_usize(config, "indicators", "vwap_window", di.vwap_window)?,
            volume_window: get_usize(config, "indicators", "volume_window", di.volume_window)?,
            macd_fast: get_usize(config, "indicators", "macd_fast", di.macd_fast)?,
            macd_slow: get_usize(config, "indicators", "macd_slow", di.macd_slow)?,
            macd_signal: get_usize(config, "indicators", "macd_signal", di.macd_signal)?,
            ema_short: get_usize(config, "indicators", "ema_short", di.ema_short)?,
            ema_long: get_usize(config, "indicators", "ema_long", di.ema_long)?,
            trend_period: get_usize(config, "indicators", "trend_period", di.trend_period)?,
            stoch_k: get_usize(config, "indicators", "stoch_k", di.stoch_k)?,
            stoch_d: get_usize(config, "indicators", "stoch_d", di.stoch_d)?,
            stoch_oversold: config.get_double("indicators", "stoch_oversold", di.stoch_oversold),
            stoch_overbought: config.get_double(
                "indicators",
                "stoch_overbought",
                di.stoch_overbought,
            ),
            fib_lookback: get_usize(config, "indicators", "fib_lookback", di.fib_lookback)?,
        };

        let backtest = BacktestSettings {
            enabled: config.get_bool("strategy", "backtesting_enabled", d.backtest.enabled),
            lookback_days: config.get_int(
                "strategy",
                "backtest_lookback_days",
                d.backtest.lookback_days,
            ),
            limit: get_usize(config, "strategy", "backtest_limit", d.backtest.limit)?,
        };

        let de = &d.exchange;
        let exchange = ExchangeSettings {
            interval: config
                .get_string("exchange", "interval")
                .unwrap_or_else(|| de.interval.clone()),
            candle_limit: get_usize(config, "exchange", "candle_limit", de.candle_limit)?,
            quote_asset: config
                .get_string("exchange", "quote_asset")
                .map(|s| s.trim().to_uppercase())
                .unwrap_or_else(|| de.quote_asset.clone()),
            min_symbol_len: get_usize(config, "exchange", "min_symbol_len", de.min_symbol_len)?,
            symbols: split_list(config.get_string("exchange", "symbols")).unwrap_or_default(),
            excluded_symbols: split_list(config.get_string("exchange", "excluded_symbols"))
                .unwrap_or_else(|| de.excluded_symbols.clone()),
            max_symbols_per_cycle: get_usize(
                config,
                "exchange",
                "max_symbols_per_cycle",
                de.max_symbols_per_cycle,
            )?,
        };

        let dr = &d.runtime;
        let runtime = RuntimeSettings {
            min_api_interval: get_millis(config, "runtime", "min_api_interval_ms", dr.min_api_interval)?,
            leg_delay: get_millis(config, "runtime", "leg_delay_ms", dr.leg_delay)?,
            cycle_interval: get_secs(config, "runtime", "cycle_interval_secs", dr.cycle_interval)?,
            low_balance_pause: get_secs(
                config,
                "runtime",
                "low_balance_pause_secs",
                dr.low_balance_pause,
            )?,
            error_pause: get_secs(config, "runtime", "error_pause_secs", dr.error_pause)?,
            max_consecutive_errors: get_u32(
                config,
                "runtime",
                "max_consecutive_errors",
                dr.max_consecutive_errors,
            )?,
        };

        let dn = d.notifications;
        let notifications = NotificationSettings {
            on_trades: config.get_bool("notifications", "notify_on_trades", dn.on_trades),
            on_errors: config.get_bool("notifications", "notify_on_errors", dn.on_errors),
            on_startup: config.get_bool("notifications", "notify_on_startup", dn.on_startup),
            on_balance_low: config.get_bool(
                "notifications",
                "notify_on_balance_low",
                dn.on_balance_low,
            ),
        };

        let backend = match config.get_string("history", "backend") {
            Some(s) => s.parse()?,
            None => d.history.backend,
        };
        let history = HistorySettings {
            backend,
            path: config
                .get_string("history", "path")
                .map(PathBuf::from)
                .unwrap_or_else(|| backend.default_path()),
            pool_size: get_u32(config, "history", "pool_size", d.history.pool_size)?.max(1),
        };

        Ok(TraderConfig {
            risk,
            indicators,
            backtest,
            exchange,
            runtime,
            notifications,
            history,
        })
    }

    pub fn signal_filters(&self) -> SignalFilters {
        SignalFilters::from(&self.risk)
    }
}

fn split_list(value: Option<String>) -> Option<Vec<String>> {
    let value = value?;
    Some(
        value
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn get_non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, SigtraderError> {
    let value = config.get_int(section, key, default);
    if value < 0 {
        return Err(SigtraderError::config_invalid(
            section,
            key,
            format!("{} must be non-negative", key),
        ));
    }
    Ok(value)
}

fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, SigtraderError> {
    Ok(get_non_negative(config, section, key, default as i64)? as usize)
}

fn get_u32(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u32,
) -> Result<u32, SigtraderError> {
    let value = get_non_negative(config, section, key, default as i64)?;
    u32::try_from(value)
        .map_err(|_| SigtraderError::config_invalid(section, key, format!("{} is too large", key)))
}

fn get_millis(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Duration,
) -> Result<Duration, SigtraderError> {
    let ms = get_non_negative(config, section, key, default.as_millis() as i64)?;
    Ok(Duration::from_millis(ms as u64))
}

fn get_secs(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Duration,
) -> Result<Duration, SigtraderError> {
    let secs = get_non_negative(config, section, key, default.as_secs() as i64)?;
    Ok(Duration::from_secs(secs as u64))
}
