//! Link-level domain models.
//!
//! Data types shared by the error model, link adaptation, HARQ
//! bookkeeping and the retransmission scheduler.
//!
//! # Lifetimes
//!
//! | Type | Lives for |
//! |------|-----------|
//! | TransportBlockDescriptor | one transmission |
//! | HarqProcess | the connection (reset, never removed) |
//! | FeedbackRecord | until scheduled or resubmitted |
//! | SlotAllocation | one slot |

mod allocation;
mod feedback;
mod harq_process;
mod link;
mod quality;
mod transport_block;

pub use allocation::SlotAllocation;
pub use feedback::FeedbackRecord;
pub use harq_process::{HarqProcess, HarqStatus};
pub use link::{BeamId, ConnectionId, Direction, FtPoint, ProcessId, Scheme};
pub use quality::{db_to_linear, linear_to_db, ChannelQuality, NO_SIGNAL};
pub use transport_block::{StreamTx, TransportBlockDescriptor};
