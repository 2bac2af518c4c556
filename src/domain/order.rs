//! Order lifecycle: sizing, balance guard, market entry and bracket legs.
//!
//! The manager does not deduplicate. Callers check open positions and open
//! orders first so a symbol gets at most one bracket per decision cycle.

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use super::config::{RiskParameters, TraderConfig};
use super::error::{BracketLeg, SigtraderError};
use super::signal::Action;
use super::universe::SymbolRules;
use crate::ports::exchange_port::{ConditionalKind, ExchangePort, OrderConfirmation, OrderSide};
use crate::ports::notifier_port::{NotifierPort, TradeEvent, notify_quietly};

/// Rounds half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10_f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSizing {
    pub quantity: f64,
    pub notional: f64,
    /// Quantity was raised to meet the minimum notional.
    pub floor_applied: bool,
}

/// `notional_volume / price` rounded to the quantity precision, raised to
/// `min_notional / price` when the rounded order is below the floor.
pub fn size_order(
    symbol: &str,
    price: f64,
    qty_precision: u32,
    risk: &RiskParameters,
) -> Result<OrderSizing, SigtraderError> {
    if !(price.is_finite() && price > 0.0) {
        return Err(SigtraderError::InvalidOrder {
            reason: format!("price for {} must be positive, got {}", symbol, price),
        });
    }

    let mut quantity = round_to(risk.notional_volume / price, qty_precision);
    let mut floor_applied = false;
    if quantity * price < risk.min_notional {
        quantity = round_to(risk.min_notional / price, qty_precision);
        floor_applied = true;
    }

    if quantity <= 0.0 {
        return Err(SigtraderError::SizingRejected {
            symbol: symbol.to_string(),
            reason: format!(
                "quantity rounds to zero at price {} with precision {}",
                price, qty_precision
            ),
        });
    }

    Ok(OrderSizing {
        quantity,
        notional: quantity * price,
        floor_applied,
    })
}

/// Take-profit fraction, at least `stop_loss + fee + min_edge` so the exit
/// is never fee-negative.
pub fn effective_take_profit_pct(risk: &RiskParameters) -> f64 {
    risk.take_profit_pct
        .max(risk.stop_loss_pct + risk.fee_rate + risk.min_take_profit_edge)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketPrices {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Protective trigger prices around `fill`, rounded to `price_precision`.
pub fn bracket_prices(
    side: OrderSide,
    fill: f64,
    risk: &RiskParameters,
    price_precision: u32,
) -> BracketPrices {
    let tp = effective_take_profit_pct(risk);
    let sl = risk.stop_loss_pct;
    let (stop_loss, take_profit) = match side {
        OrderSide::Buy => (fill * (1.0 - sl), fill * (1.0 + tp)),
        OrderSide::Sell => (fill * (1.0 + sl), fill * (1.0 - tp)),
    };
    BracketPrices {
        stop_loss: round_to(stop_loss, price_precision),
        take_profit: round_to(take_profit, price_precision),
    }
}

/// Result of a bracket placement whose entry succeeded.
#[derive(Debug)]
pub struct OrderOutcome {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub entry: OrderConfirmation,
    /// Price the bracket was offset from.
    pub entry_price: f64,
    pub prices: BracketPrices,
    pub stop_loss_order: Option<OrderConfirmation>,
    pub take_profit_order: Option<OrderConfirmation>,
    /// `BracketLegFailed` for every leg that could not be placed.
    pub leg_failures: Vec<SigtraderError>,
}

impl OrderOutcome {
    pub fn is_protected(&self) -> bool {
        self.stop_loss_order.is_some() && self.take_profit_order.is_some()
    }
}

pub struct OrderManager<'a> {
    exchange: &'a dyn ExchangePort,
    notifier: &'a dyn NotifierPort,
    risk: RiskParameters,
    symbol_rules: SymbolRules,
    leg_delay: Duration,
}

impl<'a> OrderManager<'a> {
    pub fn new(
        exchange: &'a dyn ExchangePort,
        notifier: &'a dyn NotifierPort,
        config: &TraderConfig,
    ) -> Self {
        Self {
            exchange,
            notifier,
            risk: config.risk.clone(),
            symbol_rules: SymbolRules::from(&config.exchange),
            leg_delay: config.runtime.leg_delay,
        }
    }

    /// Places a market entry for `action` on `symbol` and, once it is
    /// confirmed, its stop-loss and take-profit legs.
    ///
    /// Precondition, sizing and entry failures abort with no orders placed.
    /// Every abort is notified here, once. Leg failures are logged, notified
    /// and recorded in the outcome; the call still succeeds because the
    /// entry executed.
    pub fn place_bracket(&self, symbol: &str, action: Action) -> Result<OrderOutcome, SigtraderError> {
        let side = self
            .check_preconditions(symbol, action)
            .inspect_err(|e| self.notify_abort(e))?;

        let price = self.exchange.get_current_price(symbol).inspect_err(|e| {
            error!(symbol, error = %e, "price lookup failed");
            notify_quietly(
                self.notifier,
                &TradeEvent::error(format!("Could not get price for {}: {}", symbol, e), "Order placement"),
            );
        })?;

        let qty_precision = self
            .precision(symbol, "quantity", |s| self.exchange.get_quantity_precision(s))
            .inspect_err(|e| self.notify_abort(e))?;
        let price_precision = self
            .precision(symbol, "price", |s| self.exchange.get_price_precision(s))
            .inspect_err(|e| self.notify_abort(e))?;

        let sizing = size_order(symbol, price, qty_precision, &self.risk).inspect_err(|e| {
            error!(symbol, error = %e, "order sizing rejected");
            self.notify_abort(e);
        })?;
        if sizing.floor_applied {
            info!(symbol, quantity = sizing.quantity, "quantity raised to minimum notional");
        }

        self.check_balance(symbol, sizing.notional)?;

        let entry = self
            .exchange
            .place_market_order(symbol, side, sizing.quantity)
            .map_err(|e| match e {
                SigtraderError::TransientExchange { .. } | SigtraderError::OrderRejected { .. } => e,
                other => SigtraderError::OrderRejected {
                    symbol: symbol.to_string(),
                    reason: other.to_string(),
                },
            })
            .inspect_err(|e| {
                error!(symbol, %side, error = %e, "entry order failed");
                self.notify_abort(e);
            })?;

        let entry_price = entry.avg_price.filter(|p| p.is_finite() && *p > 0.0).unwrap_or(price);
        let prices = bracket_prices(side, entry_price, &self.risk, price_precision);
        info!(
            symbol,
            %side,
            quantity = sizing.quantity,
            entry_price,
            order_id = %entry.order_id,
            "entry order filled"
        );
        notify_quietly(
            self.notifier,
            &TradeEvent::OrderPlaced {
                symbol: symbol.to_string(),
                side,
                quantity: sizing.quantity,
                price: entry_price,
                stop_loss: prices.stop_loss,
                take_profit: prices.take_profit,
            },
        );

        let mut leg_failures = Vec::new();
        let stop_loss_order = self.place_leg(
            symbol,
            side.opposite(),
            sizing.quantity,
            BracketLeg::StopLoss,
            prices.stop_loss,
            &mut leg_failures,
        );
        let take_profit_order = self.place_leg(
            symbol,
            side.opposite(),
            sizing.quantity,
            BracketLeg::TakeProfit,
            prices.take_profit,
            &mut leg_failures,
        );

        Ok(OrderOutcome {
            symbol: symbol.to_string(),
            side,
            quantity: sizing.quantity,
            entry,
            entry_price,
            prices,
            stop_loss_order,
            take_profit_order,
            leg_failures,
        })
    }

    fn check_preconditions(&self, symbol: &str, action: Action) -> Result<OrderSide, SigtraderError> {
        if !self.symbol_rules.is_valid(symbol) {
            error!(symbol, "invalid symbol for order");
            return Err(SigtraderError::InvalidOrder {
                reason: format!(
                    "symbol {} must end with {} and have at least {} characters",
                    symbol, self.symbol_rules.quote_asset, self.symbol_rules.min_len
                ),
            });
        }
        OrderSide::from_action(action).ok_or_else(|| {
            error!(symbol, "no side for a none action");
            SigtraderError::InvalidOrder {
                reason: format!("action for {} must be buy or sell", symbol),
            }
        })
    }

    fn notify_abort(&self, e: &SigtraderError) {
        notify_quietly(self.notifier, &TradeEvent::error(e.to_string(), "Order placement"));
    }

    fn precision<F>(&self, symbol: &str, what: &str, lookup: F) -> Result<u32, SigtraderError>
    where
        F: FnOnce(&str) -> Result<u32, SigtraderError>,
    {
        lookup(symbol).map_err(|e| {
            error!(symbol, error = %e, "{} precision unavailable", what);
            SigtraderError::PrecisionUnavailable {
                symbol: symbol.to_string(),
            }
        })
    }

    /// Advisory guard against committing too much of the free balance.
    /// A failed balance lookup lets the order through.
    fn check_balance(&self, symbol: &str, notional: f64) -> Result<(), SigtraderError> {
        match self.exchange.get_account_balance() {
            Ok(balance) => {
                let limit = balance * self.risk.max_balance_fraction;
                if notional > limit {
                    let reason = format!(
                        "notional {:.2} exceeds {:.0}% of free balance {:.2}",
                        notional,
                        self.risk.max_balance_fraction * 100.0,
                        balance
                    );
                    error!(symbol, %reason, "order size too large");
                    notify_quietly(
                        self.notifier,
                        &TradeEvent::error(format!("Order size too large for {}", symbol), "Risk management"),
                    );
                    return Err(SigtraderError::SizingRejected {
                        symbol: symbol.to_string(),
                        reason,
                    });
                }
                Ok(())
            }
            Err(e) => {
                warn!(symbol, error = %e, "balance unavailable, skipping balance guard");
                Ok(())
            }
        }
    }

    fn place_leg(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        leg: BracketLeg,
        trigger_price: f64,
        failures: &mut Vec<SigtraderError>,
    ) -> Option<OrderConfirmation> {
        if !self.leg_delay.is_zero() {
            thread::sleep(self.leg_delay);
        }

        let kind = match leg {
            BracketLeg::StopLoss => ConditionalKind::StopMarket,
            BracketLeg::TakeProfit => ConditionalKind::TakeProfitMarket,
        };

        match self
            .exchange
            .place_conditional_order(symbol, side, quantity, kind, trigger_price)
        {
            Ok(confirmation) => {
                info!(symbol, %leg, trigger_price, order_id = %confirmation.order_id, "bracket leg placed");
                Some(confirmation)
            }
            Err(e) => {
                let failure = SigtraderError::BracketLegFailed {
                    symbol: symbol.to_string(),
                    leg,
                    reason: e.to_string(),
                };
                warn!(symbol, %leg, error = %e, "bracket leg failed, position unprotected");
                notify_quietly(self.notifier, &TradeEvent::error(failure.to_string(), "Bracket order"));
                failures.push(failure);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn risk() -> RiskParameters {
        RiskParameters::default()
    }

    #[test]
    fn sizing_uses_notional_volume() {
        let sizing = size_order("BTCUSDT", 100.0, 3, &risk()).unwrap();
        assert_relative_eq!(sizing.quantity, 0.15);
        assert!(!sizing.floor_applied);
    }

    #[test]
    fn sizing_raises_small_orders_to_floor() {
        let risk = RiskParameters {
            notional_volume: 3.0,
            ..risk()
        };
        let sizing = size_order("BTCUSDT", 100.0, 3, &risk).unwrap();
        assert_relative_eq!(sizing.quantity, 0.05);
        assert!(sizing.floor_applied);
    }

    #[test]
    fn sizing_rejects_zero_quantity() {
        // both 15 and 5 over 100000 round to zero at two decimals
        let err = size_order("BTCUSDT", 100_000.0, 2, &risk()).unwrap_err();
        assert!(matches!(err, SigtraderError::SizingRejected { .. }));
    }

    #[test]
    fn sizing_rejects_non_positive_price() {
        assert!(matches!(
            size_order("BTCUSDT", 0.0, 3, &risk()),
            Err(SigtraderError::InvalidOrder { .. })
        ));
    }

    #[test]
    fn take_profit_never_below_fee_floor() {
        let risk = RiskParameters {
            take_profit_pct: 0.005,
            stop_loss_pct: 0.009,
            fee_rate: 0.0005,
            ..risk()
        };
        assert_relative_eq!(effective_take_profit_pct(&risk), 0.0105, epsilon = 1e-12);
    }

    #[test]
    fn configured_take_profit_kept_when_larger() {
        assert_relative_eq!(effective_take_profit_pct(&risk()), 0.02);
    }

    #[test]
    fn long_bracket_prices() {
        let p = bracket_prices(OrderSide::Buy, 100.0, &risk(), 2);
        assert_relative_eq!(p.stop_loss, 98.5);
        assert_relative_eq!(p.take_profit, 102.0);
    }

    #[test]
    fn short_bracket_prices_are_mirrored() {
        let p = bracket_prices(OrderSide::Sell, 100.0, &risk(), 2);
        assert_relative_eq!(p.stop_loss, 101.5);
        assert_relative_eq!(p.take_profit, 98.0);
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_relative_eq!(round_to(0.1236, 3), 0.124);
        assert_relative_eq!(round_to(2.5, 0), 3.0);
        assert_relative_eq!(round_to(123.456, 1), 123.5);
    }

    proptest! {
        #[test]
        fn sized_orders_meet_floor_or_are_rejected(
            price in 0.001f64..100_000.0,
            notional in 0.5f64..200.0,
            precision in 0u32..6,
        ) {
            let risk = RiskParameters { notional_volume: notional, ..RiskParameters::default() };
            if let Ok(sizing) = size_order("ETHUSDT", price, precision, &risk) {
                prop_assert!(sizing.quantity > 0.0);
                if sizing.floor_applied {
                    let expected = round_to(risk.min_notional / price, precision);
                    prop_assert_eq!(sizing.quantity, expected);
                } else {
                    prop_assert!(sizing.notional >= risk.min_notional);
                }
            }
        }

        #[test]
        fn take_profit_covers_stop_and_fees(
            tp in 0.0f64..0.2,
            sl in 0.001f64..0.1,
            fee in 0.0f64..0.01,
        ) {
            let risk = RiskParameters {
                take_profit_pct: tp,
                stop_loss_pct: sl,
                fee_rate: fee,
                ..RiskParameters::default()
            };
            prop_assert!(effective_take_profit_pct(&risk) >= sl + fee + 0.001);
        }
    }
}
