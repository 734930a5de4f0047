//! One depth-bounded, price-sorted side of the book.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::level::{cumulative_volume, find_insertion_index, PriceLevel};

/// Which side of the book a sequence holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Descending by price, best (highest) first.
    Bid,
    /// Ascending by price, best (lowest) first.
    Ask,
}

impl Side {
    pub fn is_descending(self) -> bool {
        matches!(self, Side::Bid)
    }

    /// Returns true if `a` ranks strictly ahead of `b` on this side.
    pub fn ranks_before(self, a: Decimal, b: Decimal) -> bool {
        match self {
            Side::Bid => a > b,
            Side::Ask => a < b,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// What a single level did to a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    Inserted { index: usize },
    Replaced { index: usize },
    Removed { index: usize },
    /// Zero volume for a price that is not on the book.
    Ignored,
    /// New price ranks below every level of a full side.
    Discarded,
}

/// Tally of one batch applied to one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideChanges {
    pub inserted: usize,
    pub replaced: usize,
    pub removed: usize,
    pub ignored: usize,
    /// Malformed records skipped.
    pub skipped: usize,
    /// Levels pushed past the depth bound, or new ones that never fit.
    pub truncated: usize,
}

impl SideChanges {
    fn record(&mut self, change: LevelChange) {
        match change {
            LevelChange::Inserted { .. } => self.inserted += 1,
            LevelChange::Replaced { .. } => self.replaced += 1,
            LevelChange::Removed { .. } => self.removed += 1,
            LevelChange::Ignored => self.ignored += 1,
            LevelChange::Discarded => self.truncated += 1,
        }
    }

    /// Number of records that changed the side.
    pub fn applied(&self) -> usize {
        self.inserted + self.replaced + self.removed
    }
}

impl std::ops::AddAssign for SideChanges {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.removed += other.removed;
        self.ignored += other.ignored;
        self.skipped += other.skipped;
        self.truncated += other.truncated;
    }
}

/// Sorted, price-unique, depth-bounded sequence of levels.
///
/// Levels are kept in a `Vec` in best-first order so readers get a cheap
/// contiguous copy; positions are located by binary search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSide {
    side: Side,
    levels: Vec<PriceLevel>,
    max_depth: usize,
}

impl BookSide {
    pub fn new(side: Side, max_depth: usize) -> Self {
        Self {
            side,
            levels: Vec::new(),
            max_depth,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Levels in best-first order.
    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Top-of-book for this side.
    pub fn best(&self) -> Option<&PriceLevel> {
        self.levels.first()
    }

    /// Level resting at exactly `price`, if any.
    pub fn find_by_price(&self, price: Decimal) -> Option<&PriceLevel> {
        self.levels
            .get(self.insertion_index(price))
            .filter(|level| level.price == price)
    }

    /// Index where `price` is, or would be inserted.
    pub fn insertion_index(&self, price: Decimal) -> usize {
        find_insertion_index(&self.levels, price, self.side.is_descending())
    }

    /// Apply one decoded level: remove on zero volume, replace in place when
    /// the price exists, insert otherwise.
    ///
    /// The depth bound holds when this returns; an insert that overflows it
    /// drops the worst-ranked level, and a new price that would itself be the
    /// worst of a full side is discarded.
    pub fn apply_level(&mut self, level: PriceLevel) -> LevelChange {
        let index = self.insertion_index(level.price);
        let exists = self
            .levels
            .get(index)
            .is_some_and(|existing| existing.price == level.price);

        match (exists, level.is_removal()) {
            (true, true) => {
                self.levels.remove(index);
                LevelChange::Removed { index }
            }
            (false, true) => LevelChange::Ignored,
            (true, false) => {
                let existing = &mut self.levels[index];
                existing.volume = level.volume;
                existing.timestamp = level.timestamp;
                existing.kind = level.kind;
                LevelChange::Replaced { index }
            }
            (false, false) if index >= self.max_depth => LevelChange::Discarded,
            (false, false) => {
                self.levels.insert(index, level);
                self.levels.truncate(self.max_depth);
                LevelChange::Inserted { index }
            }
        }
    }

    /// Apply a batch of raw update records in order.
    ///
    /// A malformed record is logged and skipped; the rest of the batch still
    /// applies.
    pub fn apply_updates(&mut self, records: &[Value]) -> SideChanges {
        let mut changes = SideChanges::default();

        for record in records {
            let level = match PriceLevel::from_record(record) {
                Ok(level) => level,
                Err(e) => {
                    warn!(
                        side = %self.side,
                        record = %record,
                        error = %e,
                        "skipping malformed update record"
                    );
                    changes.skipped += 1;
                    continue;
                }
            };

            let before = self.levels.len();
            let change = self.apply_level(level);
            if let LevelChange::Inserted { .. } = change {
                if self.levels.len() == before {
                    changes.truncated += 1;
                }
            }
            changes.record(change);
        }

        changes
    }

    /// Replace the whole side from snapshot records.
    ///
    /// Records are sorted into this side's order regardless of how they
    /// arrived; zero-volume records are dropped, a repeated price keeps its
    /// last occurrence, and the result is cut to the depth bound. Returns the
    /// number of malformed records skipped.
    pub fn load(&mut self, records: &[Value]) -> usize {
        let mut skipped = 0;
        let mut levels = Vec::with_capacity(records.len());

        for record in records {
            match PriceLevel::from_record(record) {
                Ok(level) if level.is_removal() => {}
                Ok(level) => levels.push(level),
                Err(e) => {
                    warn!(
                        side = %self.side,
                        record = %record,
                        error = %e,
                        "skipping malformed snapshot record"
                    );
                    skipped += 1;
                }
            }
        }

        self.replace(levels);
        skipped
    }

    /// Replace the whole side with already-decoded levels.
    pub fn replace(&mut self, mut levels: Vec<PriceLevel>) {
        let side = self.side;
        // Stable sort keeps arrival order among equal prices; reversing first
        // makes `dedup_by` retain the last arrival.
        levels.reverse();
        levels.sort_by(|a, b| match side {
            Side::Bid => b.price.cmp(&a.price),
            Side::Ask => a.price.cmp(&b.price),
        });
        levels.dedup_by(|later, earlier| later.price == earlier.price);
        levels.truncate(self.max_depth);
        self.levels = levels;
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Cumulative volume of every level priced at or better than `price`,
    /// saturating at `Decimal::MAX`.
    pub fn depth_at(&self, price: Decimal) -> Decimal {
        let side = self.side;
        cumulative_volume(
            self.levels
                .iter()
                .take_while(|level| !side.ranks_before(price, level.price)),
        )
    }
}
