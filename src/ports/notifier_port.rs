//! Notification port.

use std::fmt;

use tracing::warn;

use crate::domain::error::SigtraderError;
use crate::domain::signal::SignalDecision;
use crate::ports::exchange_port::OrderSide;

#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    SignalFound {
        symbol: String,
        decision: SignalDecision,
        price: f64,
    },
    OrderPlaced {
        symbol: String,
        side: OrderSide,
        quantity: f64,
        price: f64,
        stop_loss: f64,
        take_profit: f64,
    },
    PositionClosed {
        symbol: String,
        side: OrderSide,
        pnl: f64,
        pnl_pct: f64,
    },
    Error {
        message: String,
        context: String,
    },
    LowBalance {
        balance: f64,
        required: f64,
    },
    Status {
        message: String,
    },
}

impl TradeEvent {
    /// Short event name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TradeEvent::SignalFound { .. } => "signal_found",
            TradeEvent::OrderPlaced { .. } => "order_placed",
            TradeEvent::PositionClosed { .. } => "position_closed",
            TradeEvent::Error { .. } => "error",
            TradeEvent::LowBalance { .. } => "low_balance",
            TradeEvent::Status { .. } => "status",
        }
    }

    pub fn error(message: impl Into<String>, context: impl Into<String>) -> Self {
        TradeEvent::Error {
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        TradeEvent::Status {
            message: message.into(),
        }
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeEvent::SignalFound {
                symbol,
                decision,
                price,
            } => {
                write!(
                    f,
                    "{} signal on {} at {:.6} (strength {}, {})",
                    decision.action, symbol, price, decision.strength, decision.strategy_name
                )?;
                if let Some(score) = decision.backtest_score {
                    write!(f, " score {:.1}", score)?;
                }
                if !decision.reasons.is_empty() {
                    write!(f, ": {}", decision.reasons.join("; "))?;
                }
                Ok(())
            }
            TradeEvent::OrderPlaced {
                symbol,
                side,
                quantity,
                price,
                stop_loss,
                take_profit,
            } => write!(
                f,
                "{} {} {} at {:.6}, SL {:.6}, TP {:.6}",
                side, quantity, symbol, price, stop_loss, take_profit
            ),
            TradeEvent::PositionClosed {
                symbol,
                side,
                pnl,
                pnl_pct,
            } => write!(
                f,
                "{} {} closed: {:.4} ({:.2}%)",
                side,
                symbol,
                pnl,
                pnl_pct * 100.0
            ),
            TradeEvent::Error { message, context } if context.is_empty() => {
                write!(f, "error: {}", message)
            }
            TradeEvent::Error { message, context } => write!(f, "error in {}: {}", context, message),
            TradeEvent::LowBalance { balance, required } => write!(
                f,
                "low balance: {:.2} available, {:.2} required",
                balance, required
            ),
            TradeEvent::Status { message } => write!(f, "{}", message),
        }
    }
}

/// Fire-and-forget delivery of trading events.
pub trait NotifierPort {
    fn notify(&self, event: &TradeEvent) -> Result<(), SigtraderError>;
}

/// Delivers `event`, logging instead of propagating a delivery failure.
pub fn notify_quietly(notifier: &dyn NotifierPort, event: &TradeEvent) {
    if let Err(e) = notifier.notify(event) {
        warn!(event = event.kind(), error = %e, "notification dropped");
    }
}
