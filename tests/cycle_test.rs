mod common;

use approx::assert_relative_eq;
use common::*;
use sigtrader::adapters::csv_history_adapter::CsvHistoryAdapter;
use sigtrader::domain::backtest::BacktestSimulator;
use sigtrader::domain::config::TraderConfig;
use sigtrader::domain::cycle::{CycleOutcome, CycleReport, CycleRunner, StopReason, TradingCycle};
use sigtrader::domain::selector::StrategySelector;
use sigtrader::domain::signal::Action;
use sigtrader::domain::universe::Universe;
use sigtrader::ports::exchange_port::OrderSide;
use sigtrader::ports::history_port::HistoryPort;
use sigtrader::ports::notifier_port::TradeEvent;
use tempfile::TempDir;

fn universe(symbols: &[&str]) -> Universe {
    Universe {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
    }
}

fn exchange_with(symbols: &[&str]) -> MockExchange {
    symbols.iter().fold(MockExchange::new(), |ex, s| {
        ex.with_candles(s, make_series(&rising_closes(60)))
    })
}

fn always_long(config: &TraderConfig) -> StrategySelector {
    StrategySelector::new(vec![fixed("fixed_long", Action::Buy)], config)
}

fn completed(outcome: CycleOutcome) -> CycleReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        other => panic!("expected a completed cycle, got {:?}", other),
    }
}

mod single_cycle {
    use super::*;

    #[test]
    fn low_balance_stops_before_scanning() {
        let config = fast_config();
        let mut exchange = exchange_with(&["BTCUSDT"]);
        exchange.balance = 5.0;
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]))
            .with_selector(always_long(&config));

        let outcome = cycle.run_once().unwrap();

        assert!(matches!(outcome, CycleOutcome::LowBalance { balance } if balance == 5.0));
        assert_eq!(exchange.called("get_open_positions"), 0);
        assert_eq!(exchange.called("get_candles"), 0);
        assert_eq!(notifier.kinds(), vec!["low_balance"]);
    }

    #[test]
    fn balance_failure_fails_the_cycle() {
        let config = fast_config();
        let exchange = exchange_with(&["BTCUSDT"]);
        exchange.fail_balance.set(true);
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]));

        let err = cycle.run_once().unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn places_one_order_then_stops_scanning() {
        let config = fast_config();
        let exchange = exchange_with(&["BTCUSDT", "ETHUSDT"]);
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT", "ETHUSDT"]))
            .with_selector(always_long(&config));

        let report = completed(cycle.run_once().unwrap());

        assert_eq!(report.scanned, 1);
        assert_eq!(report.signals.len(), 1);
        let placed = report.placed.unwrap();
        assert_eq!(placed.symbol, "BTCUSDT");
        assert!(placed.is_protected());
        assert_eq!(exchange.market_orders.borrow().len(), 1);
        assert_eq!(exchange.called("set_margin_type"), 1);
        assert_eq!(exchange.called("set_leverage"), 1);
        assert_eq!(notifier.kinds(), vec!["signal_found", "order_placed"]);
    }

    #[test]
    fn symbols_with_positions_or_orders_are_skipped() {
        let config = fast_config();
        let exchange = exchange_with(&["BTCUSDT", "ETHUSDT", "SOLUSDT"])
            .with_position("BTCUSDT")
            .with_open_order("ETHUSDT");
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(
            &exchange,
            &notifier,
            &config,
            universe(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]),
        )
        .with_selector(always_long(&config));

        let report = completed(cycle.run_once().unwrap());

        assert_eq!(report.open_positions, 1);
        assert_eq!(report.skipped, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
        assert_eq!(report.placed.unwrap().symbol, "SOLUSDT");
    }

    #[test]
    fn symbol_errors_do_not_stop_the_walk() {
        let config = fast_config();
        let mut exchange = exchange_with(&["BTCUSDT", "ETHUSDT"]);
        exchange.fail_candles_for.insert("BTCUSDT".to_string());
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT", "ETHUSDT"]))
            .with_selector(always_long(&config));

        let report = completed(cycle.run_once().unwrap());

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, "BTCUSDT");
        assert_eq!(report.placed.unwrap().symbol, "ETHUSDT");
        let events = notifier.events.borrow();
        assert!(events.iter().any(
            |e| matches!(e, TradeEvent::Error { context, .. } if context == "Processing BTCUSDT")
        ));
    }

    #[test]
    fn rejected_entry_is_notified_once() {
        let config = fast_config();
        let mut exchange = exchange_with(&["BTCUSDT"]);
        exchange.fail_market = true;
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]))
            .with_selector(always_long(&config));

        let report = completed(cycle.run_once().unwrap());

        assert!(report.placed.is_none());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, "BTCUSDT");
        assert_eq!(notifier.kinds(), vec!["signal_found", "error"]);
        let events = notifier.events.borrow();
        assert!(matches!(
            &events[1],
            TradeEvent::Error { context, .. } if context == "Order placement"
        ));
    }

    #[test]
    fn disappeared_position_is_reported_closed() {
        let config = fast_config();
        let mut exchange = exchange_with(&["BTCUSDT"]);
        exchange.avg_price = Some(95.0);
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]))
            .with_selector(always_long(&config));

        let first = completed(cycle.run_once().unwrap());
        assert!(first.closed.is_empty());
        assert_eq!(notifier.count("position_closed"), 0);

        // still open: nothing to report
        let second = completed(cycle.run_once().unwrap());
        assert!(second.closed.is_empty());

        exchange.positions.borrow_mut().remove("BTCUSDT");
        let third = completed(cycle.run_once().unwrap());

        assert_eq!(third.closed, vec!["BTCUSDT".to_string()]);
        assert_eq!(notifier.count("position_closed"), 1);
        let events = notifier.events.borrow();
        let closed = events
            .iter()
            .find(|e| matches!(e, TradeEvent::PositionClosed { .. }))
            .unwrap();
        let TradeEvent::PositionClosed {
            symbol,
            side,
            pnl,
            pnl_pct,
        } = closed
        else {
            unreachable!()
        };
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(*side, OrderSide::Buy);
        // filled at 95, current price 100, quantity 0.15
        assert_relative_eq!(*pnl, 0.75, epsilon = 1e-9);
        assert_relative_eq!(*pnl_pct, 5.0 / 95.0, epsilon = 1e-9);
    }

    #[test]
    fn positions_held_before_start_are_not_reported() {
        let config = fast_config();
        let exchange = exchange_with(&["BTCUSDT"]).with_position("XRPUSDT");
        let notifier = RecordingNotifier::new();
        let selector = StrategySelector::new(vec![fixed("idle", Action::None)], &config);
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]))
            .with_selector(selector);

        cycle.run_once().unwrap();
        exchange.positions.borrow_mut().clear();
        let report = completed(cycle.run_once().unwrap());

        assert!(report.closed.is_empty());
        assert_eq!(notifier.count("position_closed"), 0);
    }

    #[test]
    fn position_limit_skips_the_walk() {
        let mut config = fast_config();
        config.risk.max_concurrent_positions = 1;
        let exchange = exchange_with(&["BTCUSDT"]).with_position("XRPUSDT");
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]))
            .with_selector(always_long(&config));

        let report = completed(cycle.run_once().unwrap());

        assert_eq!(report.scanned, 0);
        assert!(report.placed.is_none());
        assert_eq!(exchange.called("get_candles"), 0);
    }

    #[test]
    fn no_signal_places_nothing() {
        let config = fast_config();
        let exchange = exchange_with(&["BTCUSDT"]);
        let notifier = RecordingNotifier::new();
        let selector = StrategySelector::new(vec![fixed("idle", Action::None)], &config);
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]))
            .with_selector(selector);

        let report = completed(cycle.run_once().unwrap());

        assert_eq!(report.scanned, 1);
        assert!(report.signals.is_empty());
        assert!(report.placed.is_none());
        assert!(notifier.events.borrow().is_empty());
    }

    #[test]
    fn leverage_failure_skips_the_symbol() {
        let config = fast_config();
        let mut exchange = exchange_with(&["BTCUSDT"]);
        exchange.fail_leverage = true;
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]))
            .with_selector(always_long(&config));

        let report = completed(cycle.run_once().unwrap());

        assert_eq!(report.skipped, vec!["BTCUSDT".to_string()]);
        assert!(report.placed.is_none());
        assert!(exchange.market_orders.borrow().is_empty());
    }

    #[test]
    fn backtests_are_recorded_to_history() {
        let dir = TempDir::new().unwrap();
        let history = CsvHistoryAdapter::new(dir.path().join("history.csv"));

        let mut config = fast_config();
        config.backtest.enabled = true;
        let exchange = exchange_with(&["BTCUSDT"]);
        let notifier = RecordingNotifier::new();
        let selector = always_long(&config)
            .with_simulator(BacktestSimulator::new(&config.risk).with_start_bar(0));
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]))
            .with_selector(selector)
            .with_history(&history);

        let report = completed(cycle.run_once().unwrap());

        assert_eq!(report.backtests.len(), 1);
        let records = history.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "BTCUSDT");
        assert_eq!(records[0].strategy_name, "fixed_long");
        assert_eq!(records[0].result(), report.backtests[0]);
    }
}

mod runner {
    use super::*;

    #[test]
    fn stops_at_cycle_cap() {
        let config = fast_config();
        let exchange = exchange_with(&["BTCUSDT", "ETHUSDT"]);
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT", "ETHUSDT"]))
            .with_selector(always_long(&config));

        let summary = CycleRunner::new(cycle).with_max_cycles(2).run();

        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.stop_reason, StopReason::CycleLimit);
        // the first cycle opens BTCUSDT, the second moves on to ETHUSDT
        assert_eq!(summary.orders_placed, 2);
        let symbols: Vec<String> = exchange
            .market_orders
            .borrow()
            .iter()
            .map(|(s, _, _)| s.clone())
            .collect();
        assert_eq!(symbols, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);

        let kinds = notifier.kinds();
        assert_eq!(kinds.first(), Some(&"status"));
        assert_eq!(kinds.last(), Some(&"status"));
    }

    #[test]
    fn stops_after_consecutive_errors() {
        let mut config = fast_config();
        config.runtime.max_consecutive_errors = 3;
        let exchange = exchange_with(&["BTCUSDT"]);
        exchange.fail_balance.set(true);
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]));

        let summary = CycleRunner::new(cycle).run();

        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.orders_placed, 0);
        assert_eq!(summary.stop_reason, StopReason::TooManyErrors);
        assert_eq!(notifier.count("error"), 3);
    }

    #[test]
    fn low_balance_cycles_do_not_count_as_errors() {
        let mut config = fast_config();
        config.runtime.max_consecutive_errors = 1;
        let mut exchange = exchange_with(&["BTCUSDT"]);
        exchange.balance = 1.0;
        let notifier = RecordingNotifier::new();
        let cycle = TradingCycle::new(&exchange, &notifier, &config, universe(&["BTCUSDT"]));

        let summary = CycleRunner::new(cycle).with_max_cycles(3).run();

        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.stop_reason, StopReason::CycleLimit);
        assert_eq!(notifier.count("low_balance"), 3);
    }
}
