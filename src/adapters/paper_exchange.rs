//! In-memory simulated exchange fed from CSV candle files.
//!
//! The last bar of a symbol's file is treated as the present: prices come
//! from its close and historical windows ending after it are shifted back
//! to end on it. Market orders fill immediately at that close; conditional
//! orders rest as open orders and never trigger.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::csv_adapter::CsvCandleAdapter;
use crate::domain::candle::CandleSeries;
use crate::domain::config::MarginType;
use crate::domain::error::SigtraderError;
use crate::ports::exchange_port::{
    ConditionalKind, ExchangePort, OpenOrder, OrderConfirmation, OrderSide,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PaperPosition {
    pub side: OrderSide,
    pub quantity: f64,
    pub entry_price: f64,
}

#[derive(Debug, Default)]
struct PaperState {
    balance: f64,
    positions: HashMap<String, PaperPosition>,
    open_orders: Vec<OpenOrder>,
    leverage: HashMap<String, u32>,
    margin_types: HashMap<String, MarginType>,
    next_order_id: u64,
}

impl PaperState {
    fn next_id(&mut self) -> String {
        self.next_order_id += 1;
        format!("paper-{}", self.next_order_id)
    }
}

pub struct PaperExchange {
    candles: CsvCandleAdapter,
    interval: String,
    price_precision: u32,
    quantity_precision: u32,
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn new(data_dir: PathBuf, interval: &str, balance: f64) -> Self {
        Self {
            candles: CsvCandleAdapter::new(data_dir),
            interval: interval.to_string(),
            price_precision: 2,
            quantity_precision: 3,
            state: Mutex::new(PaperState {
                balance,
                ..PaperState::default()
            }),
        }
    }

    pub fn with_precision(mut self, price_precision: u32, quantity_precision: u32) -> Self {
        self.price_precision = price_precision;
        self.quantity_precision = quantity_precision;
        self
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self, symbol: &str, interval: &str) -> Result<CandleSeries, SigtraderError> {
        self.candles.load(symbol, interval)
    }

    fn last_price(&self, symbol: &str) -> Result<f64, SigtraderError> {
        self.load(symbol, &self.interval)?
            .last_close()
            .ok_or_else(|| SigtraderError::TransientExchange {
                reason: format!("no price data for {}", symbol),
            })
    }

    pub fn position(&self, symbol: &str) -> Option<PaperPosition> {
        self.state().positions.get(symbol).cloned()
    }

    pub fn leverage(&self, symbol: &str) -> Option<u32> {
        self.state().leverage.get(symbol).copied()
    }

    pub fn margin_type(&self, symbol: &str) -> Option<MarginType> {
        self.state().margin_types.get(symbol).copied()
    }
}

fn tail(series: CandleSeries, limit: usize) -> Result<CandleSeries, SigtraderError> {
    let candles = series.into_inner();
    let skip = candles.len().saturating_sub(limit);
    CandleSeries::new(candles.into_iter().skip(skip).collect())
}

impl ExchangePort for PaperExchange {
    fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<CandleSeries, SigtraderError> {
        tail(self.load(symbol, interval)?, limit)
    }

    fn get_historical_candles(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<CandleSeries, SigtraderError> {
        let series = self.load(symbol, interval)?;
        let Some(last) = series.last().map(|c| c.open_time) else {
            return Ok(series);
        };
        let shift = if end > last { end - last } else { chrono::Duration::zero() };
        let (start, end) = (start - shift, end - shift);

        let window: Vec<_> = series
            .into_inner()
            .into_iter()
            .filter(|c| c.open_time >= start && c.open_time <= end)
            .take(limit)
            .collect();
        debug!(symbol, bars = window.len(), "paper history window");
        CandleSeries::new(window)
    }

    fn get_current_price(&self, symbol: &str) -> Result<f64, SigtraderError> {
        self.last_price(symbol)
    }

    fn get_price_precision(&self, _symbol: &str) -> Result<u32, SigtraderError> {
        Ok(self.price_precision)
    }

    fn get_quantity_precision(&self, _symbol: &str) -> Result<u32, SigtraderError> {
        Ok(self.quantity_precision)
    }

    fn get_account_balance(&self) -> Result<f64, SigtraderError> {
        Ok(self.state().balance)
    }

    fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderConfirmation, SigtraderError> {
        if quantity <= 0.0 {
            return Err(SigtraderError::OrderRejected {
                symbol: symbol.to_string(),
                reason: format!("quantity must be positive, got {}", quantity),
            });
        }
        let price = self.last_price(symbol)?;

        let mut state = self.state();
        if state.positions.contains_key(symbol) {
            return Err(SigtraderError::OrderRejected {
                symbol: symbol.to_string(),
                reason: "position already open".to_string(),
            });
        }
        let order_id = state.next_id();
        state.positions.insert(
            symbol.to_string(),
            PaperPosition {
                side,
                quantity,
                entry_price: price,
            },
        );
        info!(symbol, %side, quantity, price, order_id = %order_id, "paper market fill");
        Ok(OrderConfirmation {
            order_id,
            avg_price: Some(price),
        })
    }

    fn place_conditional_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        kind: ConditionalKind,
        trigger_price: f64,
    ) -> Result<OrderConfirmation, SigtraderError> {
        if trigger_price <= 0.0 {
            return Err(SigtraderError::OrderRejected {
                symbol: symbol.to_string(),
                reason: format!("{} trigger must be positive", kind),
            });
        }
        let mut state = self.state();
        let order_id = state.next_id();
        state.open_orders.push(OpenOrder {
            symbol: symbol.to_string(),
            order_id: order_id.clone(),
            side,
            quantity,
            kind: Some(kind),
            trigger_price: Some(trigger_price),
        });
        debug!(symbol, %kind, trigger_price, "paper conditional order resting");
        Ok(OrderConfirmation {
            order_id,
            avg_price: None,
        })
    }

    fn get_open_positions(&self) -> Result<HashSet<String>, SigtraderError> {
        Ok(self.state().positions.keys().cloned().collect())
    }

    fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, SigtraderError> {
        Ok(self
            .state()
            .open_orders
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect())
    }

    fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), SigtraderError> {
        if leverage == 0 {
            return Err(SigtraderError::InvalidOrder {
                reason: "leverage must be at least 1".to_string(),
            });
        }
        self.state().leverage.insert(symbol.to_string(), leverage);
        Ok(())
    }

    fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<(), SigtraderError> {
        self.state()
            .margin_types
            .insert(symbol.to_string(), margin_type);
        Ok(())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        self.candles.list_symbols(&self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// 20 quarter-hour bars from 2024-01-01, closes 100..119.
    fn setup() -> (TempDir, PaperExchange) {
        let dir = TempDir::new().unwrap();
        let mut content = String::from("timestamp,open,high,low,close,volume\n");
        for i in 0..20 {
            let close = 100.0 + i as f64;
            content.push_str(&format!(
                "{},{},{},{},{},1000\n",
                1704067200000_i64 + i * 900_000,
                close,
                close + 1.0,
                close - 1.0,
                close
            ));
        }
        fs::write(dir.path().join("BTCUSDT_15m.csv"), content).unwrap();
        let exchange = PaperExchange::new(dir.path().to_path_buf(), "15m", 100.0);
        (dir, exchange)
    }

    #[test]
    fn candles_are_tail_of_file() {
        let (_dir, exchange) = setup();
        let series = exchange.get_candles("BTCUSDT", "15m", 5).unwrap();
        assert_eq!(series.closes(), vec![115.0, 116.0, 117.0, 118.0, 119.0]);
        assert_eq!(exchange.get_current_price("BTCUSDT").unwrap(), 119.0);
    }

    #[test]
    fn history_window_ends_on_last_bar() {
        let (_dir, exchange) = setup();
        let end = Utc::now();
        let start = end - chrono::Duration::hours(1);
        let series = exchange
            .get_historical_candles("BTCUSDT", "15m", start, end, 100)
            .unwrap();
        // one hour back from the last bar covers five quarter-hour opens
        assert_eq!(series.closes(), vec![115.0, 116.0, 117.0, 118.0, 119.0]);
    }

    #[test]
    fn market_order_opens_position() {
        let (_dir, exchange) = setup();
        let fill = exchange
            .place_market_order("BTCUSDT", OrderSide::Sell, 0.1)
            .unwrap();
        assert_eq!(fill.avg_price, Some(119.0));
        assert!(exchange.get_open_positions().unwrap().contains("BTCUSDT"));
        assert_eq!(exchange.position("BTCUSDT").unwrap().side, OrderSide::Sell);

        let again = exchange.place_market_order("BTCUSDT", OrderSide::Sell, 0.1);
        assert!(matches!(again, Err(SigtraderError::OrderRejected { .. })));
    }

    #[test]
    fn conditional_orders_rest() {
        let (_dir, exchange) = setup();
        exchange
            .place_conditional_order("BTCUSDT", OrderSide::Sell, 0.1, ConditionalKind::StopMarket, 117.2)
            .unwrap();
        let orders = exchange.get_open_orders("BTCUSDT").unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].kind, Some(ConditionalKind::StopMarket));
        assert!(exchange.get_open_orders("ETHUSDT").unwrap().is_empty());
    }

    #[test]
    fn leverage_and_margin_are_recorded() {
        let (_dir, exchange) = setup();
        exchange.set_leverage("BTCUSDT", 10).unwrap();
        exchange.set_margin_type("BTCUSDT", MarginType::Isolated).unwrap();
        assert_eq!(exchange.leverage("BTCUSDT"), Some(10));
        assert_eq!(exchange.margin_type("BTCUSDT"), Some(MarginType::Isolated));
        assert!(exchange.set_leverage("BTCUSDT", 0).is_err());
    }

    #[test]
    fn symbols_come_from_files() {
        let (_dir, exchange) = setup();
        assert_eq!(exchange.list_symbols().unwrap(), vec!["BTCUSDT"]);
        assert!(exchange.get_current_price("ETHUSDT").is_err());
    }
}
