//! Symbol routing across provider markets.
//!
//! Translates the abstract tracked-symbol list into concrete per-market
//! stream identifiers, walking a market preference chain per symbol and
//! reporting an explicit unsupported state when no market carries it. An
//! unsupported symbol never blocks the others.

use crate::tick::{Market, Provider, SourceKind, Symbol};
use fnv::FnvHashMap;
use smol_str::{SmolStr, format_smolstr};
use std::collections::{BTreeSet, HashSet};

/// Why a symbol could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedReason {
    /// No market in the preference chain lists the symbol.
    NotListed,
    /// The preference chain itself was empty.
    EmptyPreference,
}

impl UnsupportedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnsupportedReason::NotListed => "not listed on any preferred market",
            UnsupportedReason::EmptyPreference => "no market preference configured",
        }
    }
}

/// Outcome of resolving one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        provider: Provider,
        market: Market,
        stream_id: SmolStr,
    },
    Unsupported(UnsupportedReason),
}

/// Listing catalog for one provider market.
#[derive(Debug, Clone)]
pub struct MarketCatalog {
    pub provider: Provider,
    pub market: Market,
    symbols: HashSet<Symbol>,
}

impl MarketCatalog {
    pub fn new(provider: Provider, market: Market, symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            provider,
            market,
            symbols: symbols.into_iter().collect(),
        }
    }

    pub fn supports(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }
}

/// Concrete stream identifier for a symbol on a market, in the provider's
/// combined-stream notation.
pub fn stream_id(symbol: &Symbol, source: SourceKind) -> SmolStr {
    let lower = symbol.to_lowercase();
    match source {
        SourceKind::Trade => format_smolstr!("{lower}@trade"),
        SourceKind::Ticker => format_smolstr!("{lower}@miniTicker"),
    }
}

/// Maps tracked symbols onto provider markets.
#[derive(Debug, Clone)]
pub struct SymbolRouter {
    catalogs: Vec<MarketCatalog>,
}

impl SymbolRouter {
    pub fn new(catalogs: Vec<MarketCatalog>) -> Self {
        Self { catalogs }
    }

    fn catalog(&self, provider: Provider, market: Market) -> Option<&MarketCatalog> {
        self.catalogs
            .iter()
            .find(|c| c.provider == provider && c.market == market)
    }

    /// Resolve every symbol against `preference` (first market wins).
    ///
    /// The output always has one entry per distinct input symbol.
    pub fn resolve(
        &self,
        symbols: &[Symbol],
        provider: Provider,
        preference: &[Market],
        source: SourceKind,
    ) -> FnvHashMap<Symbol, Resolution> {
        let mut resolved = FnvHashMap::default();

        for symbol in symbols {
            if resolved.contains_key(symbol) {
                continue;
            }

            if preference.is_empty() {
                resolved.insert(
                    symbol.clone(),
                    Resolution::Unsupported(UnsupportedReason::EmptyPreference),
                );
                continue;
            }

            let hit = preference.iter().find_map(|market| {
                self.catalog(provider, *market)
                    .filter(|catalog| catalog.supports(symbol))
                    .map(|catalog| catalog.market)
            });

            let resolution = match hit {
                Some(market) => Resolution::Resolved {
                    provider,
                    market,
                    stream_id: stream_id(symbol, source),
                },
                None => Resolution::Unsupported(UnsupportedReason::NotListed),
            };
            resolved.insert(symbol.clone(), resolution);
        }

        resolved
    }
}

/// Deduplicated, ordered stream identifiers out of a resolution map.
pub fn subscription_set(resolutions: &FnvHashMap<Symbol, Resolution>) -> BTreeSet<SmolStr> {
    resolutions
        .values()
        .filter_map(|resolution| match resolution {
            Resolution::Resolved { stream_id, .. } => Some(stream_id.clone()),
            Resolution::Unsupported(_) => None,
        })
        .collect()
}

/// Whether moving from `current` to `next` needs the connection restarted.
/// The minimal contract reconnects whenever the stream set differs.
pub fn requires_restart(current: &BTreeSet<SmolStr>, next: &BTreeSet<SmolStr>) -> bool {
    current != next
}
