//! Perception snapshots.
//!
//! A snapshot is everything a vehicle can observe at one instant. Each
//! tick produces two: one before the kinematic integration and one after,
//! and the reward is computed from the pair.

use crate::signal::SignalPhase;
use smallvec::SmallVec;

/// The gap reported when no lead vehicle exists on the remaining route.
pub const NO_LEAD_GAP: f64 = 1000.0;

/// The feature vector fed to the learning controller.
pub type Features = SmallVec<[f64; 12]>;

/// What a vehicle knows about the vehicle ahead of it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeadInfo {
    /// Net gap in m, both vehicles' half-lengths subtracted.
    /// Negative when the vehicles overlap.
    pub gap: f64,
    /// The lead vehicle's velocity in m/s.
    pub velocity: f64,
    /// The lead vehicle's acceleration in m/s^2.
    pub accel: f64,
}

/// What a vehicle knows about the signal at its next intersection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalView {
    /// The active phase.
    pub phase: SignalPhase,
    /// Seconds remaining in the active phase.
    pub remaining: f64,
}

/// An immutable observation of a vehicle's situation at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Perception {
    /// Own velocity in m/s.
    pub velocity: f64,
    /// Own acceleration in m/s^2.
    pub accel: f64,
    /// Whether the velocity exceeds the configured limit.
    pub over_velocity: bool,
    /// Whether the acceleration exceeds the configured limit.
    pub over_accel: bool,
    /// Whether the deceleration exceeds the configured brake limit.
    pub over_brake: bool,
    /// Whether the vehicle is effectively stationary.
    pub is_stopped: bool,
    /// Whether the vehicle has reached its goal.
    pub reached_goal: bool,
    /// Distance to the next intersection in m; zero once the goal is reached.
    pub distance_next_intersection: f64,
    /// The lead vehicle, or `None` if no vehicle exists anywhere on the
    /// remaining route.
    pub lead: Option<LeadInfo>,
    /// Whether the lead gap is negative.
    pub is_collision: bool,
    /// The signal at the next intersection, or `None` when unsignalled.
    pub signal: Option<SignalView>,
}

impl Perception {
    /// Encodes the snapshot as a fixed-order feature vector.
    ///
    /// Missing lead vehicles are encoded with sentinels: a large gap, the
    /// desired velocity and zero acceleration. An absent signal encodes as
    /// an all-zero one-hot with zero remaining time.
    pub fn features(&self, desired_velocity: f64) -> Features {
        let mut features = Features::new();
        features.push(self.accel);
        features.push(self.velocity);
        features.push(self.distance_next_intersection);
        match self.lead {
            Some(lead) => {
                features.push(1.0);
                features.push(lead.gap);
                features.push(lead.velocity);
                features.push(lead.accel);
            }
            None => {
                features.push(0.0);
                features.push(NO_LEAD_GAP);
                features.push(desired_velocity);
                features.push(0.0);
            }
        }
        let (one_hot, remaining) = match self.signal {
            Some(view) => (view.phase.one_hot(), view.remaining),
            None => ([0.0; 4], 0.0),
        };
        features.extend_from_slice(&one_hot);
        features.push(remaining);
        features
    }

    /// The lead gap, with the no-lead sentinel substituted.
    pub fn gap(&self) -> f64 {
        self.lead.map(|lead| lead.gap).unwrap_or(NO_LEAD_GAP)
    }
}
