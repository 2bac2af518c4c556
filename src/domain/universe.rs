//! Tradable symbol universe.
//!
//! Symbols come from configuration or the exchange listing and are filtered
//! by the symbol format rule and the exclusion list before a cycle walks them.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::domain::config::ExchangeSettings;
use crate::domain::error::SigtraderError;
use crate::ports::exchange_port::ExchangePort;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub symbols: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.symbols.len()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Parses a comma-separated symbol list strictly (no empty or repeated
/// entries), uppercasing each symbol.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// The symbol format rule: alphanumeric, quote-asset suffix, minimum length.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRules {
    pub quote_asset: String,
    pub min_len: usize,
}

impl SymbolRules {
    pub fn new(quote_asset: &str, min_len: usize) -> Self {
        Self {
            quote_asset: quote_asset.to_uppercase(),
            min_len,
        }
    }

    pub fn is_valid(&self, symbol: &str) -> bool {
        symbol.len() >= self.min_len
            && symbol.len() > self.quote_asset.len()
            && symbol.ends_with(&self.quote_asset)
            && symbol.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }
}

impl From<&ExchangeSettings> for SymbolRules {
    fn from(settings: &ExchangeSettings) -> Self {
        SymbolRules::new(&settings.quote_asset, settings.min_symbol_len)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InvalidFormat,
    Excluded,
    Duplicate,
}

pub struct UniverseFilterResult {
    pub universe: Universe,
    pub skipped: Vec<SkippedSymbol>,
}

/// Applies the format rule, the exclusion list and deduplication, keeping
/// the input order. Candidates are uppercased first.
pub fn filter_symbols(candidates: Vec<String>, settings: &ExchangeSettings) -> UniverseFilterResult {
    let rules = SymbolRules::from(settings);
    let excluded: HashSet<String> = settings
        .excluded_symbols
        .iter()
        .map(|s| s.to_uppercase())
        .collect();

    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    let mut skipped = Vec::new();

    for candidate in candidates {
        let symbol = candidate.trim().to_uppercase();
        let reason = if !rules.is_valid(&symbol) {
            Some(SkipReason::InvalidFormat)
        } else if excluded.contains(&symbol) {
            Some(SkipReason::Excluded)
        } else if !seen.insert(symbol.clone()) {
            Some(SkipReason::Duplicate)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!(symbol = %symbol, ?reason, "symbol skipped");
                skipped.push(SkippedSymbol { symbol, reason });
            }
            None => symbols.push(symbol),
        }
    }

    UniverseFilterResult {
        universe: Universe { symbols },
        skipped,
    }
}

/// Configured symbols when present, otherwise the exchange listing; filtered.
pub fn resolve_universe(
    exchange: &dyn ExchangePort,
    settings: &ExchangeSettings,
) -> Result<Universe, SigtraderError> {
    let candidates = if settings.symbols.is_empty() {
        exchange.list_symbols()?
    } else {
        settings.symbols.clone()
    };
    let total = candidates.len();
    let result = filter_symbols(candidates, settings);

    info!(
        tradable = result.universe.count(),
        skipped = result.skipped.len(),
        total,
        "symbol universe resolved"
    );
    Ok(result.universe)
}
