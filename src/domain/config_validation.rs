//! Configuration range checks.
//!
//! Runs on the typed [`TraderConfig`] before any cycle or backtest starts.

use crate::domain::config::{ExchangeSettings, IndicatorParams, RiskParameters, TraderConfig};
use crate::domain::error::SigtraderError;

/// Kline intervals the exchange accepts.
pub const VALID_INTERVALS: [&str; 15] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

pub fn validate_config(config: &TraderConfig) -> Result<(), SigtraderError> {
    validate_strategy(&config.risk)?;
    validate_risk(&config.risk)?;
    validate_exchange(&config.exchange)?;
    validate_indicators(&config.indicators)?;
    Ok(())
}

fn validate_strategy(risk: &RiskParameters) -> Result<(), SigtraderError> {
    if !(1..=5).contains(&risk.min_signal_strength) {
        return Err(SigtraderError::config_invalid(
            "strategy",
            "min_signal_strength",
            "min_signal_strength must be between 1 and 5",
        ));
    }
    if risk.min_backtest_score <= 0.0 || risk.min_backtest_score > 100.0 {
        return Err(SigtraderError::config_invalid(
            "strategy",
            "min_backtest_score",
            "min_backtest_score must be in (0, 100]",
        ));
    }
    if risk.volume_threshold <= 0.0 || risk.volume_threshold > 10.0 {
        return Err(SigtraderError::config_invalid(
            "strategy",
            "volume_threshold",
            "volume_threshold must be in (0, 10]",
        ));
    }
    Ok(())
}

fn validate_risk(risk: &RiskParameters) -> Result<(), SigtraderError> {
    if risk.stop_loss_pct <= 0.0 || risk.stop_loss_pct >= 0.1 {
        return Err(SigtraderError::config_invalid(
            "risk",
            "stop_loss_pct",
            "stop_loss_pct must be in (0, 0.1)",
        ));
    }
    if risk.take_profit_pct <= 0.0 || risk.take_profit_pct >= 0.2 {
        return Err(SigtraderError::config_invalid(
            "risk",
            "take_profit_pct",
            "take_profit_pct must be in (0, 0.2)",
        ));
    }
    if !(1..=125).contains(&risk.leverage) {
        return Err(SigtraderError::config_invalid(
            "risk",
            "leverage",
            "leverage must be between 1 and 125",
        ));
    }
    if !(1..=50).contains(&risk.max_concurrent_positions) {
        return Err(SigtraderError::config_invalid(
            "risk",
            "max_concurrent_positions",
            "max_concurrent_positions must be between 1 and 50",
        ));
    }
    if risk.notional_volume <= 0.0 {
        return Err(SigtraderError::config_invalid(
            "risk",
            "notional_volume",
            "notional_volume must be positive",
        ));
    }
    if risk.min_notional < 0.0 {
        return Err(SigtraderError::config_invalid(
            "risk",
            "min_notional",
            "min_notional must be non-negative",
        ));
    }
    if risk.fee_rate < 0.0 || risk.fee_rate >= 0.01 {
        return Err(SigtraderError::config_invalid(
            "risk",
            "fee_rate",
            "fee_rate must be in [0, 0.01)",
        ));
    }
    if risk.max_balance_fraction <= 0.0 || risk.max_balance_fraction > 1.0 {
        return Err(SigtraderError::config_invalid(
            "risk",
            "max_balance_fraction",
            "max_balance_fraction must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_exchange(exchange: &ExchangeSettings) -> Result<(), SigtraderError> {
    if !VALID_INTERVALS.contains(&exchange.interval.as_str()) {
        return Err(SigtraderError::config_invalid(
            "exchange",
            "interval",
            format!(
                "unsupported interval '{}', expected one of {}",
                exchange.interval,
                VALID_INTERVALS.join(", ")
            ),
        ));
    }
    if exchange.candle_limit == 0 {
        return Err(SigtraderError::config_invalid(
            "exchange",
            "candle_limit",
            "candle_limit must be at least 1",
        ));
    }
    if exchange.quote_asset.is_empty() {
        return Err(SigtraderError::ConfigMissing {
            section: "exchange".to_string(),
            key: "quote_asset".to_string(),
        });
    }
    Ok(())
}

fn validate_indicators(params: &IndicatorParams) -> Result<(), SigtraderError> {
    let periods = [
        ("rsi_period", params.rsi_period),
        ("bb_period", params.bb_period),
        ("vwap_window", params.vwap_window),
        ("volume_window", params.volume_window),
        ("macd_fast", params.macd_fast),
        ("macd_slow", params.macd_slow),
        ("macd_signal", params.macd_signal),
        ("ema_short", params.ema_short),
        ("ema_long", params.ema_long),
        ("trend_period", params.trend_period),
        ("stoch_k", params.stoch_k),
        ("stoch_d", params.stoch_d),
        ("fib_lookback", params.fib_lookback),
    ];
    for (key, period) in periods {
        if period == 0 {
            return Err(SigtraderError::config_invalid(
                "indicators",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }

    if params.macd_fast >= params.macd_slow {
        return Err(SigtraderError::config_invalid(
            "indicators",
            "macd_fast",
            "macd_fast must be shorter than macd_slow",
        ));
    }
    if params.ema_short >= params.ema_long {
        return Err(SigtraderError::config_invalid(
            "indicators",
            "ema_short",
            "ema_short must be shorter than ema_long",
        ));
    }
    if params.rsi_oversold >= params.rsi_overbought {
        return Err(SigtraderError::config_invalid(
            "indicators",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }
    if params.stoch_oversold >= params.stoch_overbought {
        return Err(SigtraderError::config_invalid(
            "indicators",
            "stoch_oversold",
            "stoch_oversold must be below stoch_overbought",
        ));
    }
    if params.bb_std <= 0.0 {
        return Err(SigtraderError::config_invalid(
            "indicators",
            "bb_std",
            "bb_std must be positive",
        ));
    }
    Ok(())
}
