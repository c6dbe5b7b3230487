//! Pluggable reward shaping.
//!
//! The shaping terms are a tuning surface, not a fixed contract, so the
//! orchestrator works against a trait and the scenario configuration
//! chooses the implementation.

use crate::perception::Perception;

/// Computes the scalar reward for one tick from the perception pair
/// taken before and after the kinematic integration.
pub trait RewardPolicy {
    fn reward(&self, pre: &Perception, post: &Perception) -> f64;
}

/// Rewards keeping a safe time-to-collision and an efficient headway.
///
/// Both terms only apply while a lead vehicle exists; an empty road is
/// neither dangerous nor inefficient.
pub struct TtcHeadwayReward {
    /// TTCs above this horizon, in s, carry no penalty.
    pub ttc_horizon: f64,
    /// The headway, in s, with zero efficiency penalty.
    pub target_headway: f64,
    /// Guards the divisions near zero relative velocity and standstill.
    pub epsilon: f64,
    /// Lower bound on the total reward.
    pub floor: f64,
}

impl Default for TtcHeadwayReward {
    fn default() -> Self {
        Self {
            ttc_horizon: 4.0,
            target_headway: 1.26,
            epsilon: 1e-3,
            floor: -1000.0,
        }
    }
}

impl RewardPolicy for TtcHeadwayReward {
    fn reward(&self, _pre: &Perception, post: &Perception) -> f64 {
        let Some(lead) = post.lead else {
            return 0.0;
        };
        let mut reward = 0.0;

        // The closer the collision, the harsher the penalty; always <= 0
        // inside the horizon.
        let closing = post.velocity - lead.velocity;
        let ttc = if closing.abs() > self.epsilon {
            lead.gap / closing
        } else {
            lead.gap / self.epsilon
        };
        if (0.0..=self.ttc_horizon).contains(&ttc) {
            reward += 10.0 * (ttc / self.ttc_horizon).ln();
        }

        let headway = lead.gap / f64::max(post.velocity, self.epsilon);
        reward -= (headway - self.target_headway).powi(2) / 10.0;

        f64::max(reward, self.floor)
    }
}

/// Penalizes deviation from a target velocity, exceeding the kinematic
/// limits, standing still, colliding, and wasted time.
pub struct SpeedControlReward {
    /// The velocity to track in m/s.
    pub target_velocity: f64,
    /// Acceleration above this limit is penalized, in m/s^2.
    pub limit_accel: f64,
    /// Deceleration below this limit is penalized, a negative number in m/s^2.
    pub limit_brake: f64,
    /// Flat penalty charged every tick.
    pub step_penalty: f64,
    /// Lower bound on the total reward.
    pub floor: f64,
}

impl RewardPolicy for SpeedControlReward {
    fn reward(&self, _pre: &Perception, post: &Perception) -> f64 {
        let mut reward = 0.0;
        reward -= (post.velocity - self.target_velocity).powi(2) / 20.0;
        reward -= f64::max(0.0, post.accel - self.limit_accel).powi(2) * 100.0;
        reward -= f64::max(0.0, self.limit_brake - post.accel).powi(2) * 100.0;
        if post.is_stopped {
            reward -= 100.0;
        }
        if post.is_collision {
            reward -= 100.0;
        }
        reward -= self.step_penalty;
        f64::max(reward, self.floor)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::perception::LeadInfo;
    use assert_approx_eq::assert_approx_eq;

    fn post(velocity: f64, lead: Option<LeadInfo>) -> Perception {
        Perception {
            velocity,
            accel: 0.0,
            over_velocity: false,
            over_accel: false,
            over_brake: false,
            is_stopped: velocity < 0.01,
            reached_goal: false,
            distance_next_intersection: 100.0,
            lead,
            is_collision: lead.map_or(false, |l| l.gap < 0.0),
            signal: None,
        }
    }

    #[test]
    fn imminent_collision_is_penalized_harder_than_a_distant_one() {
        let policy = TtcHeadwayReward::default();
        let near = post(
            10.0,
            Some(LeadInfo {
                gap: 10.0,
                velocity: 5.0,
                accel: 0.0,
            }),
        );
        let far = post(
            10.0,
            Some(LeadInfo {
                gap: 18.0,
                velocity: 5.0,
                accel: 0.0,
            }),
        );
        let pre = near.clone();
        assert!(policy.reward(&pre, &near) < policy.reward(&pre, &far));
    }

    #[test]
    fn ttc_term_vanishes_beyond_the_horizon() {
        let policy = TtcHeadwayReward::default();
        // A 12.6 m gap at 10 m/s is exactly the target headway, and the
        // closing velocity is zero, so both terms contribute nothing.
        let snap = post(
            10.0,
            Some(LeadInfo {
                gap: 12.6,
                velocity: 10.0,
                accel: 0.0,
            }),
        );
        assert_approx_eq!(policy.reward(&snap.clone(), &snap), 0.0);
    }

    #[test]
    fn reward_is_clamped_to_the_floor() {
        let policy = TtcHeadwayReward::default();
        let snap = post(
            0.0,
            Some(LeadInfo {
                gap: 500.0,
                velocity: 0.0,
                accel: 0.0,
            }),
        );
        assert_approx_eq!(policy.reward(&snap.clone(), &snap), policy.floor);
    }

    #[test]
    fn no_lead_vehicle_means_no_penalty() {
        let policy = TtcHeadwayReward::default();
        let snap = post(10.0, None);
        assert_approx_eq!(policy.reward(&snap.clone(), &snap), 0.0);
    }

    #[test]
    fn speed_control_tracks_the_target() {
        let policy = SpeedControlReward {
            target_velocity: 20.0,
            limit_accel: 2.0,
            limit_brake: -3.0,
            step_penalty: 0.5,
            floor: -1000.0,
        };
        let on_target = post(20.0, None);
        let off_target = post(10.0, None);
        let pre = on_target.clone();
        assert_approx_eq!(policy.reward(&pre, &on_target), -0.5);
        assert_approx_eq!(policy.reward(&pre, &off_target), -100.0 / 20.0 - 0.5);
    }
}
