//! HARQ bookkeeping.
//!
//! - [`HarqHistoryStore`]: error-model output of every failed attempt, per
//!   (direction, connection, process), plus the decoded set used to ignore
//!   duplicate copies of an already decoded block.
//! - [`HarqProcessTable`]: per-direction arena of process records with
//!   index handles, the feedback state machine and the waiting timers.
//!
//! Both are owned by the single per-slot control flow and are never shared
//! across threads.

mod history;
mod process_table;

pub use history::HarqHistoryStore;
pub use process_table::{FeedbackOutcome, HarqHandle, HarqProcessTable};
