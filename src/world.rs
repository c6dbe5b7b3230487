//! Read-only queries over the simulation state.
//!
//! A [`WorldView`] is handed to entities that need to look across the
//! world (lane lengths, the vehicle ahead, the signal at the next
//! intersection) without giving them access to the orchestrator's
//! mutable internals.

use crate::error::SimResult;
use crate::perception::{LeadInfo, SignalView};
use crate::vehicle::Vehicle;
use crate::{IntersectionId, IntersectionSet, LaneId, LaneSet, SignalSet, VehicleSet};

/// A read-only view of the simulation world.
pub struct WorldView<'a> {
    lanes: &'a LaneSet,
    intersections: &'a IntersectionSet,
    signals: &'a SignalSet,
    vehicles: &'a VehicleSet,
}

impl<'a> WorldView<'a> {
    pub(crate) fn new(
        lanes: &'a LaneSet,
        intersections: &'a IntersectionSet,
        signals: &'a SignalSet,
        vehicles: &'a VehicleSet,
    ) -> Self {
        Self {
            lanes,
            intersections,
            signals,
            vehicles,
        }
    }

    /// Gets the length of a lane in m.
    pub fn lane_length(&self, lane: LaneId) -> f64 {
        self.lanes[lane].length()
    }

    /// Distance from the given vehicle to its next intersection in m.
    pub fn distance_next_intersection(&self, vehicle: &Vehicle) -> f64 {
        vehicle.distance_next_intersection(self.lanes)
    }

    /// The grid distance between two intersections in m.
    pub fn grid_distance(&self, a: IntersectionId, b: IntersectionId) -> SimResult<f64> {
        self.intersections[a].grid_distance(&self.intersections[b])
    }

    /// The state of the signal at the vehicle's next intersection, if the
    /// intersection is signalled.
    pub fn signal_ahead(&self, vehicle: &Vehicle) -> Option<SignalView> {
        let lane = &self.lanes[vehicle.lane_id()?];
        let signal = self.intersections[lane.to_intersection()].signal()?;
        let signal = &self.signals[signal];
        Some(SignalView {
            phase: signal.phase(),
            remaining: signal.remaining(),
        })
    }

    /// Locates the vehicle ahead of `vehicle`, looking past the end of its
    /// current lane along the remainder of its route.
    ///
    /// Returns `None` iff no vehicle exists anywhere on the remaining
    /// route. The reported gap has both vehicles' half-lengths subtracted
    /// from the centre-to-centre distance, so it is negative when the
    /// vehicles overlap; callers rely on that sign for collision
    /// detection, so it is never clamped.
    pub fn find_lead(&self, vehicle: &Vehicle) -> SimResult<Option<LeadInfo>> {
        // A vehicle can reach its goal mid-tick; nothing is ahead of it then.
        if vehicle.reached_goal() {
            return Ok(None);
        }
        let Some(lane_id) = vehicle.lane_id() else {
            return Ok(None);
        };

        let on_lane = self.lanes[lane_id].vehicle_ahead(vehicle.id(), vehicle.number())?;
        let (lead_id, centre_dist) = match on_lane {
            // Same lane: both distances are measured to the shared intersection.
            Some(id) => (
                id,
                vehicle.distance_next_intersection(self.lanes)
                    - self.vehicles[id].distance_next_intersection(self.lanes),
            ),
            // Walk the remaining route until a lane holds a vehicle; its
            // rear-most occupant is the lead.
            None => {
                let mut dist = vehicle.distance_next_intersection(self.lanes);
                let mut found = None;
                for lane_id in vehicle.future_route() {
                    let lane = &self.lanes[*lane_id];
                    if let Some(id) = lane.rearmost() {
                        dist += self.vehicles[id].distance_prev_intersection()?;
                        found = Some(id);
                        break;
                    }
                    dist += lane.length();
                }
                match found {
                    Some(id) => (id, dist),
                    None => return Ok(None),
                }
            }
        };

        let lead = &self.vehicles[lead_id];
        Ok(Some(LeadInfo {
            gap: centre_dist - vehicle.half_length() - lead.half_length(),
            velocity: lead.velocity(),
            accel: lead.accel(),
        }))
    }
}
