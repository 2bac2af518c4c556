//! Notifier that writes trade events to the log.

use tracing::{error, info, warn};

use crate::domain::config::NotificationSettings;
use crate::domain::error::SigtraderError;
use crate::ports::notifier_port::{NotifierPort, TradeEvent};

/// Logs each event through `tracing`, honouring the per-category switches.
/// Delivery never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier {
    settings: NotificationSettings,
}

impl LogNotifier {
    pub fn new(settings: NotificationSettings) -> Self {
        Self { settings }
    }

    pub fn is_enabled(&self, event: &TradeEvent) -> bool {
        match event {
            TradeEvent::SignalFound { .. }
            | TradeEvent::OrderPlaced { .. }
            | TradeEvent::PositionClosed { .. } => self.settings.on_trades,
            TradeEvent::Error { .. } => self.settings.on_errors,
            TradeEvent::LowBalance { .. } => self.settings.on_balance_low,
            TradeEvent::Status { .. } => self.settings.on_startup,
        }
    }
}

impl NotifierPort for LogNotifier {
    fn notify(&self, event: &TradeEvent) -> Result<(), SigtraderError> {
        if !self.is_enabled(event) {
            return Ok(());
        }
        match event {
            TradeEvent::Error { .. } => error!(event = event.kind(), "{}", event),
            TradeEvent::LowBalance { .. } => warn!(event = event.kind(), "{}", event),
            _ => info!(event = event.kind(), "{}", event),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switches_gate_categories() {
        let notifier = LogNotifier::new(NotificationSettings {
            on_trades: false,
            on_errors: true,
            on_startup: false,
            on_balance_low: true,
        });
        assert!(notifier.is_enabled(&TradeEvent::error("boom", "cycle")));
        assert!(!notifier.is_enabled(&TradeEvent::status("Started")));
        assert!(notifier.is_enabled(&TradeEvent::LowBalance {
            balance: 3.0,
            required: 10.0
        }));
        assert!(!notifier.is_enabled(&TradeEvent::PositionClosed {
            symbol: "BTCUSDT".into(),
            side: crate::ports::exchange_port::OrderSide::Buy,
            pnl: 1.0,
            pnl_pct: 0.01,
        }));
    }

    #[test]
    fn delivery_always_succeeds() {
        let notifier = LogNotifier::default();
        assert!(notifier.notify(&TradeEvent::status("Started")).is_ok());
        assert!(notifier.notify(&TradeEvent::error("boom", "")).is_ok());
    }
}
