//! Grouping of pending downlink retransmissions by beam.

use std::collections::{BTreeMap, HashMap};

use crate::error::{HarqError, HarqResult};
use crate::models::{BeamId, ConnectionId, FeedbackRecord};

/// Supplies the beam group of a downlink connection.
pub trait BeamGroupProvider {
    /// Beam of `connection`, if known.
    fn beam_of(&self, connection: ConnectionId) -> Option<BeamId>;
}

impl BeamGroupProvider for HashMap<ConnectionId, BeamId> {
    fn beam_of(&self, connection: ConnectionId) -> Option<BeamId> {
        self.get(&connection).copied()
    }
}

impl BeamGroupProvider for BTreeMap<ConnectionId, BeamId> {
    fn beam_of(&self, connection: ConnectionId) -> Option<BeamId> {
        self.get(&connection).copied()
    }
}

/// Pending items keyed by beam, in ascending beam order.
pub type PendingByBeam = BTreeMap<BeamId, Vec<FeedbackRecord>>;

/// Splits flat feedback into per-beam lists, keeping input order inside
/// each beam.
///
/// A connection without a beam group is a configuration error.
pub fn group_by_beam(
    feedback: Vec<FeedbackRecord>,
    beams: &dyn BeamGroupProvider,
) -> HarqResult<PendingByBeam> {
    let mut grouped = PendingByBeam::new();
    for record in feedback {
        let beam = beams.beam_of(record.connection).ok_or_else(|| {
            HarqError::configuration(format!("conn {} has no beam group", record.connection))
        })?;
        grouped.entry(beam).or_default().push(record);
    }
    Ok(grouped)
}

/// Total number of pending items.
pub fn pending_count(pending: &PendingByBeam) -> usize {
    pending.values().map(Vec::len).sum()
}
