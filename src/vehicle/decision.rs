//! Jerk decision strategies.

use crate::perception::{Perception, NO_LEAD_GAP};

/// How a vehicle chooses its jerk each tick.
#[derive(Clone, Debug)]
pub enum DecisionStrategy {
    /// Delegate to the learning controller's action selection.
    Learned,
    /// Follow the vehicle ahead with a fixed car-following law.
    Heuristic(CarFollowing),
}

/// The intelligent-driver car-following law, expressed as a jerk command.
///
/// The law produces a desired acceleration; dividing the difference from
/// the current acceleration by the tick duration converts it into the
/// jerk that reaches it within one tick.
#[derive(Clone, Copy, Debug)]
pub struct CarFollowing {
    /// Safe time headway in s.
    pub headway_time: f64,
    /// Minimum gap to the vehicle ahead in m.
    pub jam_distance: f64,
    /// Maximum acceleration in m/s^2.
    pub max_accel: f64,
    /// Comfortable deceleration, a positive number in m/s^2.
    pub comf_decel: f64,
    /// Velocity exponent of the free-road term.
    pub accel_exponent: i32,
}

impl Default for CarFollowing {
    fn default() -> Self {
        Self {
            headway_time: 1.5,
            jam_distance: 2.0,
            max_accel: 0.73,
            comf_decel: 1.67,
            accel_exponent: 4,
        }
    }
}

impl CarFollowing {
    /// Computes the jerk command from the current perception snapshot.
    pub fn jerk(&self, snapshot: &Perception, desired_velocity: f64, dt: f64) -> f64 {
        let v = snapshot.velocity;
        let (gap, lead_vel) = match snapshot.lead {
            Some(lead) => (lead.gap, lead.velocity),
            None => (NO_LEAD_GAP, desired_velocity),
        };
        let approach = v - lead_vel;
        // An overlapping lead reads as a vanishing gap, which saturates
        // the interaction term into a hard brake.
        let gap = gap.max(0.01);
        let dynamic_gap = self.jam_distance
            + v * self.headway_time
            + v * approach / (2.0 * (self.max_accel * self.comf_decel).sqrt());
        let desired_accel = self.max_accel
            * (1.0 - (v / desired_velocity).powi(self.accel_exponent) - (dynamic_gap / gap).powi(2));
        (desired_accel - snapshot.accel) / dt
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::perception::LeadInfo;

    fn snapshot(velocity: f64, accel: f64, lead: Option<LeadInfo>) -> Perception {
        Perception {
            velocity,
            accel,
            over_velocity: false,
            over_accel: false,
            over_brake: false,
            is_stopped: false,
            reached_goal: false,
            distance_next_intersection: 1000.0,
            lead,
            is_collision: lead.map_or(false, |l| l.gap < 0.0),
            signal: None,
        }
    }

    /// The gap at which the law holds a constant velocity `v` behind a
    /// lead travelling at the same velocity.
    fn equilibrium_gap(model: &CarFollowing, v: f64, v0: f64) -> f64 {
        let dynamic_gap = model.jam_distance + v * model.headway_time;
        dynamic_gap / (1.0 - (v / v0).powi(model.accel_exponent)).sqrt()
    }

    #[test]
    fn zero_jerk_at_the_equilibrium_gap() {
        let model = CarFollowing::default();
        let gap = equilibrium_gap(&model, 10.0, 20.0);
        let lead = LeadInfo {
            gap,
            velocity: 10.0,
            accel: 0.0,
        };
        let jerk = model.jerk(&snapshot(10.0, 0.0, Some(lead)), 20.0, 0.2);
        assert!(jerk.abs() < 1e-6, "jerk at equilibrium was {jerk}");
    }

    #[test]
    fn converges_to_the_equilibrium_gap_behind_a_steady_lead() {
        let model = CarFollowing::default();
        let (dt, lead_vel, v0) = (0.2, 10.0, 20.0);
        let (mut v, mut a, mut gap) = (10.0f64, 0.0f64, 40.0f64);
        for _ in 0..5000 {
            let lead = LeadInfo {
                gap,
                velocity: lead_vel,
                accel: 0.0,
            };
            let jerk = model.jerk(&snapshot(v, a, Some(lead)), v0, dt);
            a += jerk * dt;
            let prev_v = v;
            v = f64::max(v + a * dt, 0.0);
            gap += lead_vel * dt - f64::max(prev_v * dt + 0.5 * a * dt * dt, 0.0);
        }
        assert!(a.abs() < 0.05, "acceleration did not settle: {a}");
        let expected = equilibrium_gap(&model, lead_vel, v0);
        assert!(
            (gap - expected).abs() < 0.1 * expected,
            "gap {gap} settled away from equilibrium {expected}"
        );
    }

    #[test]
    fn brakes_hard_when_overlapping_the_lead() {
        let model = CarFollowing::default();
        let lead = LeadInfo {
            gap: -0.5,
            velocity: 5.0,
            accel: 0.0,
        };
        let jerk = model.jerk(&snapshot(5.0, 0.0, Some(lead)), 20.0, 0.2);
        assert!(jerk < -100.0);
    }
}
