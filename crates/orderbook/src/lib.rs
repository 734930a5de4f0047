//! Depth-bounded order book that merges exchange snapshots and deltas.
//!
//! A book starts uninitialized, is fully replaced by each snapshot, and is
//! then mutated by incremental updates. Bids stay strictly descending and
//! asks strictly ascending by exact `Decimal` price, with at most
//! `max_depth` levels per side after every single record.
//!
//! # Example
//!
//! ```rust
//! use orderbook::{BookMerger, BookState};
//! use serde_json::json;
//!
//! let merger = BookMerger::new("XBT/USD", 100);
//!
//! // Updates before the first snapshot are dropped
//! merger.merge_value(json!({"b": [["10", "1", "1"]]})).unwrap();
//! assert_eq!(merger.state(), BookState::Uninitialized);
//!
//! merger
//!     .merge_value(json!({"bids": [["10", "1"]], "asks": [["11", "1"]]}))
//!     .unwrap();
//! merger
//!     .merge_value(json!({"b": [["10", "0", "2"]], "a": [["11.5", "3", "2"]]}))
//!     .unwrap();
//!
//! let book = merger.snapshot();
//! assert!(book.bids.is_empty());
//! assert_eq!(book.asks.len(), 2);
//! println!("Best ask: {:?}", book.best_ask());
//! ```

mod book;
mod error;
mod level;
mod merger;
mod side;
mod snapshot;

pub use book::{BookState, MergeOutcome, OrderBook};
pub use error::RecordError;
pub use level::{
    find_by_price, find_insertion_index, is_republish, price_of, volume_of, LevelKind, PriceLevel,
};
pub use merger::{BookMerger, SharedBookMerger};
pub use side::{BookSide, LevelChange, Side, SideChanges};
pub use snapshot::BookSnapshot;
