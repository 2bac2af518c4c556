#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use sigtrader::domain::candle::{Candle, CandleSeries};
use sigtrader::domain::config::{MarginType, TraderConfig};
use sigtrader::domain::error::SigtraderError;
use sigtrader::domain::signal::{Action, SignalDecision};
use sigtrader::domain::strategy::Strategy;
use sigtrader::ports::exchange_port::{
    ConditionalKind, ExchangePort, OpenOrder, OrderConfirmation, OrderSide,
};
use sigtrader::ports::notifier_port::{NotifierPort, TradeEvent};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Quarter-hour bars with ±0.5% wicks and constant volume.
pub fn make_bars(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            open_time: start_time() + Duration::minutes(15 * i as i64),
            open: close,
            high: close * 1.005,
            low: close * 0.995,
            close,
            volume: 1000.0,
        })
        .collect()
}

pub fn make_series(closes: &[f64]) -> CandleSeries {
    CandleSeries::new(make_bars(closes)).unwrap()
}

/// Compounding 0.5% rise per bar.
pub fn rising_closes(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 * 1.005_f64.powi(i as i32)).collect()
}

pub fn candles_csv(closes: &[f64]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for c in make_bars(closes) {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.open_time.timestamp_millis(),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    out
}

/// Config with no pauses so lifecycle and cycle tests run instantly.
pub fn fast_config() -> TraderConfig {
    let mut config = TraderConfig::default();
    config.runtime.leg_delay = std::time::Duration::ZERO;
    config.runtime.min_api_interval = std::time::Duration::ZERO;
    config.runtime.cycle_interval = std::time::Duration::ZERO;
    config.runtime.low_balance_pause = std::time::Duration::ZERO;
    config.runtime.error_pause = std::time::Duration::ZERO;
    config
}

/// Strategy with a fixed live decision and a constant replay signal.
pub struct FixedStrategy {
    pub name: &'static str,
    pub action: Action,
    pub strength: u32,
    pub replay: Action,
}

impl Strategy for FixedStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn evaluate(&self, _candles: &[Candle]) -> Result<SignalDecision, SigtraderError> {
        Ok(SignalDecision {
            action: self.action,
            strength: self.strength,
            reasons: vec![format!("{} fired", self.name)],
            strategy_name: self.name.to_string(),
            backtest_score: None,
        })
    }

    fn replay_signals(&self, candles: &[Candle]) -> Vec<Action> {
        vec![self.replay; candles.len()]
    }
}

pub fn fixed(name: &'static str, action: Action) -> Box<dyn Strategy> {
    Box::new(FixedStrategy {
        name,
        action,
        strength: 2,
        replay: action,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedConditional {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub kind: ConditionalKind,
    pub trigger_price: f64,
}

/// Scriptable exchange double. Every call is logged by method name.
pub struct MockExchange {
    pub candles: HashMap<String, CandleSeries>,
    pub history: Option<CandleSeries>,
    pub price: f64,
    pub price_precision: u32,
    pub quantity_precision: u32,
    pub balance: f64,
    pub avg_price: Option<f64>,
    pub positions: RefCell<HashSet<String>>,
    pub open_orders: HashMap<String, Vec<OpenOrder>>,
    pub symbols: Vec<String>,

    pub fail_balance: Cell<bool>,
    pub fail_positions: bool,
    pub fail_price: bool,
    pub fail_precision: bool,
    pub fail_market: bool,
    pub fail_stop_loss: bool,
    pub fail_take_profit: bool,
    pub fail_leverage: bool,
    pub fail_candles_for: HashSet<String>,

    pub calls: RefCell<Vec<String>>,
    pub market_orders: RefCell<Vec<(String, OrderSide, f64)>>,
    pub conditional_orders: RefCell<Vec<PlacedConditional>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            candles: HashMap::new(),
            history: None,
            price: 100.0,
            price_precision: 2,
            quantity_precision: 3,
            balance: 1000.0,
            avg_price: None,
            positions: RefCell::new(HashSet::new()),
            open_orders: HashMap::new(),
            symbols: Vec::new(),
            fail_balance: Cell::new(false),
            fail_positions: false,
            fail_price: false,
            fail_precision: false,
            fail_market: false,
            fail_stop_loss: false,
            fail_take_profit: false,
            fail_leverage: false,
            fail_candles_for: HashSet::new(),
            calls: RefCell::new(Vec::new()),
            market_orders: RefCell::new(Vec::new()),
            conditional_orders: RefCell::new(Vec::new()),
        }
    }

    pub fn with_candles(mut self, symbol: &str, series: CandleSeries) -> Self {
        self.candles.insert(symbol.to_string(), series);
        self.symbols.push(symbol.to_string());
        self
    }

    pub fn with_position(self, symbol: &str) -> Self {
        self.positions.borrow_mut().insert(symbol.to_string());
        self
    }

    pub fn with_open_order(mut self, symbol: &str) -> Self {
        self.open_orders.entry(symbol.to_string()).or_default().push(OpenOrder {
            symbol: symbol.to_string(),
            order_id: "existing".to_string(),
            side: OrderSide::Sell,
            quantity: 1.0,
            kind: Some(ConditionalKind::StopMarket),
            trigger_price: Some(90.0),
        });
        self
    }

    pub fn called(&self, method: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == method).count()
    }

    fn record(&self, method: &str) {
        self.calls.borrow_mut().push(method.to_string());
    }

    fn transient(reason: &str) -> SigtraderError {
        SigtraderError::TransientExchange {
            reason: reason.to_string(),
        }
    }
}

impl ExchangePort for MockExchange {
    fn get_candles(
        &self,
        symbol: &str,
        _interval: &str,
        _limit: usize,
    ) -> Result<CandleSeries, SigtraderError> {
        self.record("get_candles");
        if self.fail_candles_for.contains(symbol) {
            return Err(Self::transient("klines timeout"));
        }
        self.candles
            .get(symbol)
            .cloned()
            .ok_or_else(|| Self::transient("unknown symbol"))
    }

    fn get_historical_candles(
        &self,
        symbol: &str,
        interval: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        limit: usize,
    ) -> Result<CandleSeries, SigtraderError> {
        self.record("get_historical_candles");
        match &self.history {
            Some(series) => Ok(series.clone()),
            None => self.get_candles(symbol, interval, limit),
        }
    }

    fn get_current_price(&self, _symbol: &str) -> Result<f64, SigtraderError> {
        self.record("get_current_price");
        if self.fail_price {
            return Err(Self::transient("ticker timeout"));
        }
        Ok(self.price)
    }

    fn get_price_precision(&self, _symbol: &str) -> Result<u32, SigtraderError> {
        self.record("get_price_precision");
        if self.fail_precision {
            return Err(Self::transient("exchange info unavailable"));
        }
        Ok(self.price_precision)
    }

    fn get_quantity_precision(&self, _symbol: &str) -> Result<u32, SigtraderError> {
        self.record("get_quantity_precision");
        if self.fail_precision {
            return Err(Self::transient("exchange info unavailable"));
        }
        Ok(self.quantity_precision)
    }

    fn get_account_balance(&self) -> Result<f64, SigtraderError> {
        self.record("get_account_balance");
        if self.fail_balance.get() {
            return Err(Self::transient("balance timeout"));
        }
        Ok(self.balance)
    }

    fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderConfirmation, SigtraderError> {
        self.record("place_market_order");
        if self.fail_market {
            return Err(SigtraderError::OrderRejected {
                symbol: symbol.to_string(),
                reason: "margin is insufficient".to_string(),
            });
        }
        self.market_orders
            .borrow_mut()
            .push((symbol.to_string(), side, quantity));
        self.positions.borrow_mut().insert(symbol.to_string());
        Ok(OrderConfirmation {
            order_id: format!("m-{}", self.market_orders.borrow().len()),
            avg_price: self.avg_price,
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
        self.record("place_conditional_order");
        let fail = match kind {
            ConditionalKind::StopMarket => self.fail_stop_loss,
            ConditionalKind::TakeProfitMarket => self.fail_take_profit,
        };
        if fail {
            return Err(SigtraderError::OrderRejected {
                symbol: symbol.to_string(),
                reason: "order would immediately trigger".to_string(),
            });
        }
        self.conditional_orders.borrow_mut().push(PlacedConditional {
            symbol: symbol.to_string(),
            side,
            quantity,
            kind,
            trigger_price,
        });
        Ok(OrderConfirmation {
            order_id: format!("c-{}", self.conditional_orders.borrow().len()),
            avg_price: None,
        })
    }

    fn get_open_positions(&self) -> Result<HashSet<String>, SigtraderError> {
        self.record("get_open_positions");
        if self.fail_positions {
            return Err(Self::transient("position risk timeout"));
        }
        Ok(self.positions.borrow().clone())
    }

    fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, SigtraderError> {
        self.record("get_open_orders");
        Ok(self.open_orders.get(symbol).cloned().unwrap_or_default())
    }

    fn set_leverage(&self, _symbol: &str, _leverage: u32) -> Result<(), SigtraderError> {
        self.record("set_leverage");
        if self.fail_leverage {
            return Err(Self::transient("leverage rejected"));
        }
        Ok(())
    }

    fn set_margin_type(&self, _symbol: &str, _margin_type: MarginType) -> Result<(), SigtraderError> {
        self.record("set_margin_type");
        Ok(())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        self.record("list_symbols");
        Ok(self.symbols.clone())
    }
}

/// Keeps every delivered event; optionally fails delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: RefCell<Vec<TradeEvent>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            fail: true,
        }
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(|e| e.kind()).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }
}

impl NotifierPort for RecordingNotifier {
    fn notify(&self, event: &TradeEvent) -> Result<(), SigtraderError> {
        self.events.borrow_mut().push(event.clone());
        if self.fail {
            return Err(SigtraderError::Notification {
                reason: "webhook unreachable".to_string(),
            });
        }
        Ok(())
    }
}
