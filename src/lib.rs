//! Link adaptation and HARQ retransmission engine for slotted radio-access
//! schedulers.
//!
//! For every slot the engine turns channel quality into a modulation and
//! coding scheme and a transport block size, models the probability that
//! a block fails to decode (combining soft information across attempts),
//! and places pending retransmissions on the slot grid ahead of new data.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `TransportBlockDescriptor`, `HarqProcess`,
//!   `FeedbackRecord`, `SlotAllocation`, `ChannelQuality`
//! - **`error_model`**: BLER curve tables, lookup, inversion and HARQ combining
//! - **`amc`**: Scheme selection (Shannon or error-model driven), CQI and
//!   transport block sizing
//! - **`harq`**: Decode history store and per-direction process tables
//! - **`scheduler`**: Downlink (beam-partitioned) and uplink retransmission
//!   schedulers, ordering policies, slot KPIs
//! - **`engine`**: `LinkEngine`, the per-slot orchestrator
//! - **`config`** / **`validation`**: Engine parameters and their checks
//!
//! # Architecture
//!
//! Single-threaded and tick-driven: an external driver calls the engine
//! once per slot. Curve tables are loaded once and shared through `Arc`;
//! all other state is owned by the engine and mutated only from that call.
//!
//! # References
//!
//! - 3GPP TS 38.214, "Physical layer procedures for data"
//! - Mezzavilla et al. (2012), "A Lightweight and Accurate Link Abstraction
//!   Model for the Simulation of LTE Networks in ns-3"

pub mod amc;
pub mod config;
pub mod engine;
pub mod error;
pub mod error_model;
pub mod harq;
pub mod models;
pub mod scheduler;
pub mod validation;

pub use config::EngineConfig;
pub use engine::{DecodeOutcome, LinkEngine};
pub use error::{HarqError, HarqResult};
