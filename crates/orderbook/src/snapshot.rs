//! Immutable view of a book for readers.

use model::Metadata;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::book::BookState;
use crate::level::{cumulative_volume, PriceLevel};

/// A copy of the book state after one fully applied message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub state: BookState,
    /// Book sequence when this view was taken; grows with every change.
    pub sequence: u64,
    /// Bid levels, highest price first.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, lowest price first.
    pub asks: Vec<PriceLevel>,
    pub metadata: Metadata,
}

impl BookSnapshot {
    /// View of a book that has seen nothing yet.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: BookState::Uninitialized,
            sequence: 0,
            bids: Vec::new(),
            asks: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state == BookState::Ready
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Returns the mid price (average of best bid and best ask).
    ///
    /// `None` when a side is empty or the result does not fit a `Decimal`.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let half_spread = self.spread()?.checked_div(Decimal::TWO)?;
        bid.checked_add(half_spread)
    }

    /// Returns the spread (best ask - best bid).
    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        ask.price.checked_sub(bid.price)
    }

    /// Returns the spread in basis points of the mid price.
    pub fn spread_bps(&self) -> Option<Decimal> {
        let spread = self.spread()?;
        let mid = self.mid_price()?;
        if mid.is_zero() {
            return None;
        }
        spread.checked_div(mid)?.checked_mul(Decimal::from(10000))
    }

    /// True when the best bid is at or above the best ask.
    pub fn is_crossed(&self) -> bool {
        self.spread().is_some_and(|spread| spread <= Decimal::ZERO)
    }

    /// Returns the top N bid levels (highest to lowest).
    pub fn top_bids(&self, n: usize) -> &[PriceLevel] {
        &self.bids[..n.min(self.bids.len())]
    }

    /// Returns the top N ask levels (lowest to highest).
    pub fn top_asks(&self, n: usize) -> &[PriceLevel] {
        &self.asks[..n.min(self.asks.len())]
    }

    /// Total bid volume at or above the given price, saturating at
    /// `Decimal::MAX`.
    pub fn bid_depth_at(&self, price: Decimal) -> Decimal {
        cumulative_volume(self.bids.iter().take_while(|level| level.price >= price))
    }

    /// Total ask volume at or below the given price, saturating at
    /// `Decimal::MAX`.
    pub fn ask_depth_at(&self, price: Decimal) -> Decimal {
        cumulative_volume(self.asks.iter().take_while(|level| level.price <= price))
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }
}
