//! Exchange client port.
//!
//! Every method is a single exchange round trip. Implementations report
//! network trouble as `TransientExchange` and never retry internally.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

use crate::domain::candle::CandleSeries;
use crate::domain::config::MarginType;
use crate::domain::error::SigtraderError;
use crate::domain::signal::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn from_action(action: Action) -> Option<OrderSide> {
        match action {
            Action::Buy => Some(OrderSide::Buy),
            Action::Sell => Some(OrderSide::Sell),
            Action::None => None,
        }
    }

    pub fn opposite(self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Trigger type of a resting conditional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionalKind {
    StopMarket,
    TakeProfitMarket,
}

impl fmt::Display for ConditionalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionalKind::StopMarket => write!(f, "STOP_MARKET"),
            ConditionalKind::TakeProfitMarket => write!(f, "TAKE_PROFIT_MARKET"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmation {
    pub order_id: String,
    /// Average fill price, when the exchange reports one.
    pub avg_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub symbol: String,
    pub order_id: String,
    pub side: OrderSide,
    pub quantity: f64,
    /// `None` for plain market/limit orders.
    pub kind: Option<ConditionalKind>,
    pub trigger_price: Option<f64>,
}

pub trait ExchangePort {
    /// Most recent `limit` closed bars.
    fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<CandleSeries, SigtraderError>;

    /// Bars opened within `[start, end]`, at most `limit`.
    fn get_historical_candles(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<CandleSeries, SigtraderError>;

    fn get_current_price(&self, symbol: &str) -> Result<f64, SigtraderError>;

    fn get_price_precision(&self, symbol: &str) -> Result<u32, SigtraderError>;

    fn get_quantity_precision(&self, symbol: &str) -> Result<u32, SigtraderError>;

    /// Free balance in the quote asset.
    fn get_account_balance(&self) -> Result<f64, SigtraderError>;

    fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderConfirmation, SigtraderError>;

    fn place_conditional_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        kind: ConditionalKind,
        trigger_price: f64,
    ) -> Result<OrderConfirmation, SigtraderError>;

    /// Symbols with a non-zero position.
    fn get_open_positions(&self) -> Result<HashSet<String>, SigtraderError>;

    fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, SigtraderError>;

    fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), SigtraderError>;

    fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<(), SigtraderError>;

    /// Tradable symbols as listed by the exchange.
    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError>;
}
