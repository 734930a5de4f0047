//! Serialized merging of feed messages into a shared book.

use std::sync::Arc;

use model::{BookMessage, MessageError};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info};

use crate::book::{BookState, MergeOutcome, OrderBook};
use crate::snapshot::BookSnapshot;

/// Single entry point for mutating one book from a feed.
///
/// Each message is classified and applied while holding the book's own
/// mutex, so one message is processed at a time and independent books never
/// contend. After a message changes the book, a fresh [`BookSnapshot`] is
/// published; readers clone the `Arc` and never see one side from message N
/// next to the other side from message N-1.
#[derive(Debug)]
pub struct BookMerger {
    book: Mutex<OrderBook>,
    published: RwLock<Arc<BookSnapshot>>,
}

/// Shared handle to a merger.
pub type SharedBookMerger = Arc<BookMerger>;

impl BookMerger {
    pub fn new(symbol: impl Into<String>, max_depth: usize) -> Self {
        Self::from_book(OrderBook::new(symbol, max_depth))
    }

    pub fn from_book(book: OrderBook) -> Self {
        let published = RwLock::new(Arc::new(book.snapshot()));
        Self {
            book: Mutex::new(book),
            published,
        }
    }

    pub fn shared(symbol: impl Into<String>, max_depth: usize) -> SharedBookMerger {
        Arc::new(Self::new(symbol, max_depth))
    }

    /// Apply one already-classified message.
    pub fn merge(&self, message: BookMessage) -> MergeOutcome {
        let mut book = self.book.lock();
        let outcome = book.apply(message);
        if outcome != MergeOutcome::Dropped {
            self.publish(&book);
        }
        outcome
    }

    /// Classify a raw payload and apply it, all under the book lock.
    ///
    /// A payload that is neither a snapshot nor an update leaves the book
    /// untouched.
    pub fn merge_value(&self, payload: Value) -> Result<MergeOutcome, MessageError> {
        let mut book = self.book.lock();
        let message = BookMessage::from_value(payload).map_err(|e| {
            debug!(symbol = %book.symbol(), error = %e, "payload rejected");
            e
        })?;
        let outcome = book.apply(message);
        if outcome != MergeOutcome::Dropped {
            self.publish(&book);
        }
        Ok(outcome)
    }

    /// The most recently published view. Never blocks on a merge in progress.
    pub fn snapshot(&self) -> Arc<BookSnapshot> {
        Arc::clone(&self.published.read())
    }

    pub fn state(&self) -> BookState {
        self.snapshot().state
    }

    /// Drop all levels and wait for the next snapshot again.
    pub fn reset(&self) {
        let mut book = self.book.lock();
        book.clear();
        self.publish(&book);
        info!(symbol = %book.symbol(), "book reset, awaiting snapshot");
    }

    fn publish(&self, book: &OrderBook) {
        let snapshot = Arc::new(book.snapshot());
        *self.published.write() = snapshot;
    }
}
