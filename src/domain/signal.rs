//! Signal decisions emitted by strategies.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Action {
    Buy,
    Sell,
    None,
}

impl Action {
    pub fn is_entry(self) -> bool {
        !matches!(self, Action::None)
    }

    /// Buy ↔ Sell; None stays None.
    pub fn opposite(self) -> Action {
        match self {
            Action::Buy => Action::Sell,
            Action::Sell => Action::Buy,
            Action::None => Action::None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
            Action::None => write!(f, "none"),
        }
    }
}

/// One strategy's verdict on a candle series.
///
/// A Buy/Sell decision always carries `strength >= 1` and at least one reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDecision {
    pub action: Action,
    pub strength: u32,
    pub reasons: Vec<String>,
    pub strategy_name: String,
    pub backtest_score: Option<f64>,
}

impl SignalDecision {
    pub fn none(strategy_name: &str) -> Self {
        Self {
            action: Action::None,
            strength: 0,
            reasons: Vec::new(),
            strategy_name: strategy_name.to_string(),
            backtest_score: None,
        }
    }

    /// A None decision explaining why nothing could be evaluated.
    pub fn none_with_reason(strategy_name: &str, reason: impl Into<String>) -> Self {
        Self {
            reasons: vec![reason.into()],
            ..Self::none(strategy_name)
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.action.is_entry()
    }
}

/// Tally of corroborating sub-signals gathered while evaluating one bar.
#[derive(Debug, Default)]
pub(crate) struct SignalTally {
    pub buys: u32,
    pub sells: u32,
    pub reasons: Vec<String>,
}

impl SignalTally {
    pub fn buy(&mut self, reason: impl Into<String>) {
        self.buys += 1;
        self.reasons.push(reason.into());
    }

    pub fn sell(&mut self, reason: impl Into<String>) {
        self.sells += 1;
        self.reasons.push(reason.into());
    }

    pub fn note(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    pub fn has_buy(&self) -> bool {
        self.buys > 0
    }

    pub fn has_sell(&self) -> bool {
        self.sells > 0
    }

    /// Final decision; Buy takes precedence when both sides qualify.
    pub fn decide(self, strategy_name: &str, buy_ok: bool, sell_ok: bool) -> SignalDecision {
        let (action, strength) = if buy_ok && self.buys > 0 {
            (Action::Buy, self.buys)
        } else if sell_ok && self.sells > 0 {
            (Action::Sell, self.sells)
        } else {
            (Action::None, self.buys.max(self.sells))
        };
        SignalDecision {
            action,
            strength,
            reasons: self.reasons,
            strategy_name: strategy_name.to_string(),
            backtest_score: None,
        }
    }
}
