//! Lanes and their per-tick occupancy rosters.

use crate::error::{InvariantKind, SimResult};
use crate::{IntersectionId, LaneId, VehicleId};

/// A lane represents a single directed stretch of road between two
/// intersections.
///
/// The lane itself is immutable after construction except for its
/// occupancy roster, which the orchestrator rebuilds wholesale between
/// ticks from the vehicles' positions. It is never patched incrementally.
pub struct Lane {
    /// The lane's ID.
    id: LaneId,
    /// User-facing identity number, used in configuration and logs.
    number: u32,
    /// Length of the lane in m.
    length: f64,
    /// The intersection at the start of the lane.
    from: IntersectionId,
    /// The intersection at the end of the lane.
    to: IntersectionId,
    /// The vehicles on the lane, front-most first (descending position).
    vehicles: Vec<VehicleId>,
}

/// The attributes of a lane.
pub struct LaneAttributes {
    /// User-facing identity number.
    pub number: u32,
    /// Length of the lane in m.
    pub length: f64,
    /// The intersection at the start of the lane.
    pub from: IntersectionId,
    /// The intersection at the end of the lane.
    pub to: IntersectionId,
}

impl Lane {
    /// Creates a new lane.
    pub(crate) fn new(id: LaneId, attribs: &LaneAttributes) -> Self {
        Self {
            id,
            number: attribs.number,
            length: attribs.length,
            from: attribs.from,
            to: attribs.to,
            vehicles: vec![],
        }
    }

    /// Gets the lane's ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// Gets the lane's identity number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Gets the length of the lane in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The intersection at the start of the lane.
    pub fn from_intersection(&self) -> IntersectionId {
        self.from
    }

    /// The intersection at the end of the lane.
    pub fn to_intersection(&self) -> IntersectionId {
        self.to
    }

    /// The vehicles on the lane, front-most first.
    pub fn vehicles(&self) -> &[VehicleId] {
        &self.vehicles
    }

    /// Replaces the occupancy roster. The ids must already be ordered by
    /// descending lane position.
    pub(crate) fn set_occupancy(&mut self, vehicles: Vec<VehicleId>) {
        self.vehicles = vehicles;
    }

    /// Finds the vehicle immediately ahead of `vehicle` on this lane.
    ///
    /// Returns `None` when the vehicle leads the lane. A query for a
    /// vehicle that is not on the roster indicates stale bookkeeping and
    /// is an invariant violation.
    pub(crate) fn vehicle_ahead(
        &self,
        vehicle: VehicleId,
        vehicle_number: u32,
    ) -> SimResult<Option<VehicleId>> {
        let idx = self
            .vehicles
            .iter()
            .position(|id| *id == vehicle)
            .ok_or(InvariantKind::VehicleNotOnLane {
                vehicle: vehicle_number,
                lane: self.number,
            })?;
        Ok((idx > 0).then(|| self.vehicles[idx - 1]))
    }

    /// The rear-most vehicle on the lane, if any.
    pub(crate) fn rearmost(&self) -> Option<VehicleId> {
        self.vehicles.last().copied()
    }
}
