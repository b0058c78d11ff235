//! Ordering policies for pending retransmissions.
//!
//! Before packing a beam, its pending items are sorted by a
//! [`RetxOrdering`] policy. Packing large blocks first tends to leave
//! fewer unusable fragments, but this is a heuristic: any policy yields a
//! valid allocation.
//!
//! # Score Convention
//! **Lower score = served first.** Sorting is stable, so items with equal
//! scores keep their feedback order.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::harq::HarqProcessTable;
use crate::models::{FeedbackRecord, HarqProcess};

/// Score returned by an ordering policy.
pub type OrderScore = f64;

/// A policy ranking pending retransmissions.
pub trait RetxOrdering: Send + Sync + Debug {
    /// Policy name (e.g. "LARGEST_FIRST").
    fn name(&self) -> &'static str;

    /// Scores the pending item; lower = served first.
    fn score(&self, item: &FeedbackRecord, process: &HarqProcess) -> OrderScore;
}

/// Serves the item whose previous transmission used the most symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestFirst;

impl RetxOrdering for LargestFirst {
    fn name(&self) -> &'static str {
        "LARGEST_FIRST"
    }

    fn score(&self, _item: &FeedbackRecord, process: &HarqProcess) -> OrderScore {
        -f64::from(process.last_symbol_count())
    }
}

/// Serves the item whose previous transmission used the fewest symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmallestFirst;

impl RetxOrdering for SmallestFirst {
    fn name(&self) -> &'static str {
        "SMALLEST_FIRST"
    }

    fn score(&self, _item: &FeedbackRecord, process: &HarqProcess) -> OrderScore {
        f64::from(process.last_symbol_count())
    }
}

/// Keeps the feedback order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl RetxOrdering for Fifo {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn score(&self, _item: &FeedbackRecord, _process: &HarqProcess) -> OrderScore {
        0.0
    }
}

/// Configurable choice of a built-in policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetxOrderingKind {
    #[default]
    LargestFirst,
    SmallestFirst,
    Fifo,
}

impl RetxOrderingKind {
    /// Instantiates the policy.
    pub fn policy(self) -> Arc<dyn RetxOrdering> {
        match self {
            RetxOrderingKind::LargestFirst => Arc::new(LargestFirst),
            RetxOrderingKind::SmallestFirst => Arc::new(SmallestFirst),
            RetxOrderingKind::Fifo => Arc::new(Fifo),
        }
    }
}

/// Sorts pending items in place.
///
/// Items without a process record in `table` sort last; the scheduler
/// reports them as invariant violations when it reaches them.
pub fn order_pending(
    items: &mut [FeedbackRecord],
    table: &HarqProcessTable,
    policy: &dyn RetxOrdering,
) {
    items.sort_by(|a, b| {
        let sa = score_of(a, table, policy);
        let sb = score_of(b, table, policy);
        sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn score_of(item: &FeedbackRecord, table: &HarqProcessTable, policy: &dyn RetxOrdering) -> OrderScore {
    table
        .process(item.connection, item.process)
        .map(|p| policy.score(item, p))
        .unwrap_or(f64::MAX)
}
