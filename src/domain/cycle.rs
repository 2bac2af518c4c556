//! Decision cycles over the symbol universe.
//!
//! A cycle checks balance and open exposure, walks the universe asking the
//! selector for a decision per symbol and places at most one bracket order.
//! [`CycleRunner`] repeats cycles with fixed pauses.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::analysis::BacktestRecord;
use super::config::TraderConfig;
use super::error::SigtraderError;
use super::metrics::BacktestResult;
use super::order::{OrderManager, OrderOutcome};
use super::selector::StrategySelector;
use super::signal::SignalDecision;
use super::universe::Universe;
use crate::ports::exchange_port::{ExchangePort, OrderSide};
use crate::ports::history_port::HistoryPort;
use crate::ports::notifier_port::{NotifierPort, TradeEvent, notify_quietly};

#[derive(Debug)]
pub enum CycleOutcome {
    /// Free balance under the configured minimum; nothing was scanned.
    LowBalance { balance: f64 },
    Completed(CycleReport),
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub balance: f64,
    pub open_positions: usize,
    pub scanned: usize,
    /// Symbols passed over because of an existing position or open orders.
    pub skipped: Vec<String>,
    /// Positions opened by an earlier cycle that are no longer open.
    pub closed: Vec<String>,
    pub signals: Vec<(String, SignalDecision)>,
    pub placed: Option<OrderOutcome>,
    /// Per-symbol failures as `(symbol, message)`.
    pub errors: Vec<(String, String)>,
    pub backtests: Vec<BacktestResult>,
}

enum SymbolStep {
    Skipped,
    NoSignal,
    Placed(OrderOutcome),
    /// Placement failed and the order manager already notified it.
    Rejected(SigtraderError),
}

/// Entry of a position this cycle opened, kept until it disappears.
#[derive(Debug, Clone, Copy)]
struct OpenTrade {
    side: OrderSide,
    quantity: f64,
    entry_price: f64,
}

pub struct TradingCycle<'a> {
    exchange: &'a dyn ExchangePort,
    notifier: &'a dyn NotifierPort,
    history: Option<&'a dyn HistoryPort>,
    selector: StrategySelector,
    config: &'a TraderConfig,
    universe: Universe,
    open_trades: RefCell<HashMap<String, OpenTrade>>,
}

impl<'a> TradingCycle<'a> {
    pub fn new(
        exchange: &'a dyn ExchangePort,
        notifier: &'a dyn NotifierPort,
        config: &'a TraderConfig,
        universe: Universe,
    ) -> Self {
        Self {
            exchange,
            notifier,
            history: None,
            selector: StrategySelector::from_config(config),
            config,
            universe,
            open_trades: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_history(mut self, history: &'a dyn HistoryPort) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_selector(mut self, selector: StrategySelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn notifier(&self) -> &dyn NotifierPort {
        self.notifier
    }

    /// Runs one cycle. Only balance and position queries fail the cycle;
    /// per-symbol failures are reported and the walk continues.
    pub fn run_once(&self) -> Result<CycleOutcome, SigtraderError> {
        let risk = &self.config.risk;

        let balance = self.exchange.get_account_balance()?;
        if balance < risk.min_balance {
            warn!(balance, min_balance = risk.min_balance, "balance below minimum, not trading");
            notify_quietly(
                self.notifier,
                &TradeEvent::LowBalance {
                    balance,
                    required: risk.min_balance,
                },
            );
            return Ok(CycleOutcome::LowBalance { balance });
        }

        let positions = self.exchange.get_open_positions()?;
        info!(balance, open_positions = positions.len(), "cycle started");

        let mut report = CycleReport {
            balance,
            open_positions: positions.len(),
            closed: self.report_closed(&positions),
            ..CycleReport::default()
        };

        if positions.len() < risk.max_concurrent_positions {
            self.walk_universe(&positions, &mut report);
        } else {
            debug!(max = risk.max_concurrent_positions, "position limit reached");
        }

        self.record_backtests(&report.backtests);
        info!(
            scanned = report.scanned,
            signals = report.signals.len(),
            errors = report.errors.len(),
            placed = report.placed.is_some(),
            "cycle completed"
        );
        Ok(CycleOutcome::Completed(report))
    }

    fn walk_universe(&self, positions: &HashSet<String>, report: &mut CycleReport) {
        let limit = self.config.exchange.max_symbols_per_cycle;
        for symbol in self.universe.symbols.iter().take(limit) {
            if positions.contains(symbol) {
                report.skipped.push(symbol.clone());
                continue;
            }
            report.scanned += 1;

            match self.process_symbol(symbol, report) {
                Ok(SymbolStep::Placed(outcome)) => {
                    info!(symbol = %symbol, "order placed, ending scan");
                    self.open_trades.borrow_mut().insert(
                        symbol.clone(),
                        OpenTrade {
                            side: outcome.side,
                            quantity: outcome.quantity,
                            entry_price: outcome.entry_price,
                        },
                    );
                    report.placed = Some(outcome);
                    break;
                }
                Ok(SymbolStep::Skipped) => report.skipped.push(symbol.clone()),
                Ok(SymbolStep::NoSignal) => {}
                Ok(SymbolStep::Rejected(e)) => {
                    error!(symbol = %symbol, error = %e, "order placement failed");
                    report.errors.push((symbol.clone(), e.to_string()));
                }
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "symbol processing failed");
                    notify_quietly(
                        self.notifier,
                        &TradeEvent::error(e.to_string(), format!("Processing {}", symbol)),
                    );
                    report.errors.push((symbol.clone(), e.to_string()));
                }
            }
        }
    }

    fn process_symbol(&self, symbol: &str, report: &mut CycleReport) -> Result<SymbolStep, SigtraderError> {
        let open_orders = self.exchange.get_open_orders(symbol)?;
        if !open_orders.is_empty() {
            debug!(symbol, count = open_orders.len(), "open orders present, skipping");
            return Ok(SymbolStep::Skipped);
        }

        let exchange = &self.config.exchange;
        let candles = self
            .exchange
            .get_candles(symbol, &exchange.interval, exchange.candle_limit)?;
        let selection = self.selector.select(symbol, &candles, self.exchange);
        report.backtests.extend(selection.backtests);

        let decision = selection.decision;
        if !decision.is_actionable() {
            return Ok(SymbolStep::NoSignal);
        }

        info!(
            symbol,
            action = %decision.action,
            strategy = %decision.strategy_name,
            strength = decision.strength,
            "signal found"
        );
        report.signals.push((symbol.to_string(), decision.clone()));
        notify_quietly(
            self.notifier,
            &TradeEvent::SignalFound {
                symbol: symbol.to_string(),
                decision: decision.clone(),
                price: candles.last_close().unwrap_or_default(),
            },
        );

        let risk = &self.config.risk;
        if let Err(e) = self
            .exchange
            .set_margin_type(symbol, risk.margin_type)
            .and_then(|_| self.exchange.set_leverage(symbol, risk.leverage))
        {
            warn!(symbol, error = %e, "could not configure margin or leverage, skipping");
            return Ok(SymbolStep::Skipped);
        }

        let manager = OrderManager::new(self.exchange, self.notifier, self.config);
        match manager.place_bracket(symbol, decision.action) {
            Ok(outcome) => Ok(SymbolStep::Placed(outcome)),
            Err(e) => Ok(SymbolStep::Rejected(e)),
        }
    }

    /// Notifies `PositionClosed` for tracked trades missing from `positions`.
    /// P&L is measured against the current price; zero when it is unavailable.
    fn report_closed(&self, positions: &HashSet<String>) -> Vec<String> {
        let mut trades = self.open_trades.borrow_mut();
        let mut closed: Vec<String> = trades
            .keys()
            .filter(|symbol| !positions.contains(*symbol))
            .cloned()
            .collect();
        closed.sort();

        for symbol in &closed {
            let Some(trade) = trades.remove(symbol) else {
                continue;
            };
            let (pnl, pnl_pct) = match self.exchange.get_current_price(symbol) {
                Ok(exit) => {
                    let direction = match trade.side {
                        OrderSide::Buy => 1.0,
                        OrderSide::Sell => -1.0,
                    };
                    let diff = (exit - trade.entry_price) * direction;
                    (diff * trade.quantity, diff / trade.entry_price)
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "no exit price for closed position");
                    (0.0, 0.0)
                }
            };
            info!(symbol = %symbol, side = %trade.side, pnl, "position closed");
            notify_quietly(
                self.notifier,
                &TradeEvent::PositionClosed {
                    symbol: symbol.clone(),
                    side: trade.side,
                    pnl,
                    pnl_pct,
                },
            );
        }
        closed
    }

    fn record_backtests(&self, backtests: &[BacktestResult]) {
        let Some(history) = self.history else {
            return;
        };
        if backtests.is_empty() {
            return;
        }
        let now = Utc::now();
        let records: Vec<BacktestRecord> = backtests.iter().map(|r| BacktestRecord::new(r, now)).collect();
        match history.append(&records) {
            Ok(()) => debug!(count = records.len(), "backtests recorded"),
            Err(e) => warn!(error = %e, "could not record backtests"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    CycleLimit,
    TooManyErrors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub orders_placed: usize,
    pub stop_reason: StopReason,
}

/// Repeats [`TradingCycle::run_once`] with the configured pauses.
pub struct CycleRunner<'a> {
    cycle: TradingCycle<'a>,
    max_cycles: Option<usize>,
}

impl<'a> CycleRunner<'a> {
    pub fn new(cycle: TradingCycle<'a>) -> Self {
        Self {
            cycle,
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Runs until the cycle cap or the consecutive error limit is reached.
    /// Without a cap only the error limit ends the loop.
    pub fn run(&self) -> RunSummary {
        let runtime = &self.cycle.config.runtime;
        let max_errors = runtime.max_consecutive_errors.max(1);
        let notifier = self.cycle.notifier();

        notify_quietly(
            notifier,
            &TradeEvent::status(format!(
                "Started: {} symbols, leverage {}x, max positions {}",
                self.cycle.universe().count(),
                self.cycle.config.risk.leverage,
                self.cycle.config.risk.max_concurrent_positions
            )),
        );

        let mut cycles = 0;
        let mut orders_placed = 0;
        let mut consecutive_errors = 0;

        let stop_reason = loop {
            cycles += 1;
            let pause = match self.cycle.run_once() {
                Ok(CycleOutcome::Completed(report)) => {
                    consecutive_errors = 0;
                    if report.placed.is_some() {
                        orders_placed += 1;
                    }
                    runtime.cycle_interval
                }
                Ok(CycleOutcome::LowBalance { .. }) => {
                    consecutive_errors = 0;
                    runtime.low_balance_pause
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error!(error = %e, consecutive_errors, "cycle failed");
                    notify_quietly(notifier, &TradeEvent::error(e.to_string(), "Main loop"));
                    if consecutive_errors >= max_errors {
                        break StopReason::TooManyErrors;
                    }
                    runtime.error_pause
                }
            };

            if self.max_cycles.is_some_and(|max| cycles >= max) {
                break StopReason::CycleLimit;
            }
            pause_for(pause);
        };

        let summary = RunSummary {
            cycles,
            orders_placed,
            stop_reason,
        };
        let message = match stop_reason {
            StopReason::CycleLimit => format!("Stopped after {} cycles", cycles),
            StopReason::TooManyErrors => format!("Stopped after {} consecutive errors", consecutive_errors),
        };
        info!(cycles, orders_placed, ?stop_reason, "runner stopped");
        notify_quietly(notifier, &TradeEvent::status(message));
        summary
    }
}

fn pause_for(duration: Duration) {
    if !duration.is_zero() {
        debug!(secs = duration.as_secs(), "pausing");
        thread::sleep(duration);
    }
}
