//! Rate-limited exchange decorator.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::candle::CandleSeries;
use crate::domain::config::MarginType;
use crate::domain::error::SigtraderError;
use crate::domain::rate_limit::RateLimiter;
use crate::ports::exchange_port::{
    ConditionalKind, ExchangePort, OpenOrder, OrderConfirmation, OrderSide,
};

/// Wraps any [`ExchangePort`], spacing calls per operation through a
/// shared [`RateLimiter`].
pub struct ThrottledExchange<E> {
    inner: E,
    limiter: RateLimiter,
}

impl<E: ExchangePort> ThrottledExchange<E> {
    pub fn new(inner: E, min_interval: Duration) -> Self {
        Self {
            inner,
            limiter: RateLimiter::new(min_interval),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: ExchangePort> ExchangePort for ThrottledExchange<E> {
    fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<CandleSeries, SigtraderError> {
        self.limiter.acquire("klines");
        self.inner.get_candles(symbol, interval, limit)
    }

    fn get_historical_candles(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<CandleSeries, SigtraderError> {
        self.limiter.acquire("klines");
        self.inner
            .get_historical_candles(symbol, interval, start, end, limit)
    }

    fn get_current_price(&self, symbol: &str) -> Result<f64, SigtraderError> {
        self.limiter.acquire("ticker_price");
        self.inner.get_current_price(symbol)
    }

    fn get_price_precision(&self, symbol: &str) -> Result<u32, SigtraderError> {
        self.limiter.acquire("exchange_info");
        self.inner.get_price_precision(symbol)
    }

    fn get_quantity_precision(&self, symbol: &str) -> Result<u32, SigtraderError> {
        self.limiter.acquire("exchange_info");
        self.inner.get_quantity_precision(symbol)
    }

    fn get_account_balance(&self) -> Result<f64, SigtraderError> {
        self.limiter.acquire("balance");
        self.inner.get_account_balance()
    }

    fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderConfirmation, SigtraderError> {
        self.limiter.acquire("new_order");
        self.inner.place_market_order(symbol, side, quantity)
    }

    fn place_conditional_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        kind: ConditionalKind,
        trigger_price: f64,
    ) -> Result<OrderConfirmation, SigtraderError> {
        self.limiter.acquire("new_order");
        self.inner
            .place_conditional_order(symbol, side, quantity, kind, trigger_price)
    }

    fn get_open_positions(&self) -> Result<HashSet<String>, SigtraderError> {
        self.limiter.acquire("position_risk");
        self.inner.get_open_positions()
    }

    fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, SigtraderError> {
        self.limiter.acquire("open_orders");
        self.inner.get_open_orders(symbol)
    }

    fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), SigtraderError> {
        self.limiter.acquire("leverage");
        self.inner.set_leverage(symbol, leverage)
    }

    fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> Result<(), SigtraderError> {
        self.limiter.acquire("margin_type");
        self.inner.set_margin_type(symbol, margin_type)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SigtraderError> {
        self.limiter.acquire("exchange_info");
        self.inner.list_symbols()
    }
}
