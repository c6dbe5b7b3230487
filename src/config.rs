//! Scenario configuration.
//!
//! A scenario is plain data: the topology graph, the vehicle roster and
//! the tuning values the engine consumes. Identity numbers in the
//! configuration are translated into slotmap ids while building the
//! simulation; dangling references are configuration errors.

use crate::intersection::IntersectionAttributes;
use crate::lane::LaneAttributes;
use crate::learner::LearningParams;
use crate::reward::{RewardPolicy, SpeedControlReward, TtcHeadwayReward};
use crate::signal::SignalAttributes;
use crate::simulation::{GoalRule, Simulation, SimulationParams};
use crate::vehicle::{CarFollowing, DecisionStrategy, VehicleAttributes};
use crate::{SimError, SimResult};
use cgmath::Point2;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A complete scenario: topology, vehicles and tuning values.
#[derive(Clone, Debug, Deserialize)]
pub struct ScenarioConfig {
    /// Tick duration in s.
    pub delta_t: f64,
    /// Step ceiling after which an episode is cut off.
    pub limit_step_count: u64,
    /// Desired (limit) velocity in m/s, shared by all vehicles.
    pub limit_velocity: f64,
    /// Maximum acceleration in m/s^2.
    pub limit_accel: f64,
    /// Maximum deceleration, a negative number in m/s^2.
    pub limit_brake: f64,
    /// The discrete jerk values a learned policy chooses between.
    pub jerk_candidates: Vec<f64>,
    /// When the goal condition ends the episode.
    #[serde(default)]
    pub goal_rule: GoalRule,
    /// Which reward shaping to apply.
    #[serde(default)]
    pub reward: RewardConfig,
    /// Persist logs only every this many episodes; zero disables logging.
    #[serde(default)]
    pub log_interval: u32,
    /// Where episode logs are written, if anywhere.
    #[serde(default)]
    pub result_dir: Option<PathBuf>,
    /// The intersections of the network.
    pub intersections: Vec<IntersectionConfig>,
    /// The signals of the network.
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
    /// The lanes of the network.
    pub lanes: Vec<LaneConfig>,
    /// The vehicle roster.
    pub vehicles: Vec<VehicleConfig>,
    /// Parameters of the learning controller.
    pub learning: LearningConfig,
}

/// One signal: identity, phase offset and the four phase durations.
#[derive(Clone, Debug, Deserialize)]
pub struct SignalConfig {
    pub number: u32,
    #[serde(default)]
    pub offset: f64,
    pub durations: Vec<f64>,
}

/// One intersection: identity, grid coordinates and optional signal.
#[derive(Clone, Debug, Deserialize)]
pub struct IntersectionConfig {
    pub number: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub signal: Option<u32>,
}

/// One lane: identity, length and its two endpoint intersections.
#[derive(Clone, Debug, Deserialize)]
pub struct LaneConfig {
    pub number: u32,
    pub length: f64,
    pub from: u32,
    pub to: u32,
}

/// One vehicle of the roster.
#[derive(Clone, Debug, Deserialize)]
pub struct VehicleConfig {
    pub number: u32,
    pub length: f64,
    pub strategy: StrategyConfig,
    pub velocity: f64,
    #[serde(default)]
    pub accel: f64,
    #[serde(default)]
    pub jerk: f64,
    pub lane_place: f64,
    pub route: Vec<u32>,
}

/// The decision strategy tags accepted in a scenario.
///
/// Anything else fails deserialization, which the episode driver reports
/// as a fatal diagnostic.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyConfig {
    Learned,
    Heuristic,
}

impl StrategyConfig {
    fn build(self) -> DecisionStrategy {
        match self {
            StrategyConfig::Learned => DecisionStrategy::Learned,
            StrategyConfig::Heuristic => DecisionStrategy::Heuristic(CarFollowing::default()),
        }
    }
}

/// The reward shaping variants.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardConfig {
    /// Time-to-collision and headway-efficiency shaping.
    #[default]
    TtcHeadway,
    /// Velocity tracking with limit, stop and per-tick penalties.
    SpeedControl,
}

impl RewardConfig {
    fn build(self, config: &ScenarioConfig) -> Box<dyn RewardPolicy> {
        match self {
            RewardConfig::TtcHeadway => Box::new(TtcHeadwayReward::default()),
            RewardConfig::SpeedControl => Box::new(SpeedControlReward {
                target_velocity: config.limit_velocity,
                limit_accel: config.limit_accel,
                limit_brake: config.limit_brake,
                step_penalty: 0.5,
                floor: -1000.0,
            }),
        }
    }
}

/// Parameters of the learning controller and its external model.
#[derive(Clone, Debug, Deserialize)]
pub struct LearningConfig {
    /// Capacity of the replay memory.
    pub buffer_capacity: usize,
    /// Transitions drawn per optimize pass.
    pub batch_size: usize,
    /// Optimize is a no-op below this many stored transitions;
    /// zero means the batch size.
    #[serde(default)]
    pub warmup: usize,
    /// Discount factor.
    pub discount: f64,
    /// Soft-update rate for the model's tracking estimator; consumed by
    /// the model implementation, carried here with the other tuning values.
    pub target_update_rate: f64,
    /// Episode horizon, for both the training loop and epsilon decay.
    pub max_episode: u32,
    /// Exploration rate at episode zero.
    #[serde(default = "default_initial_epsilon")]
    pub initial_epsilon: f64,
    /// Exploration rate at the horizon midpoint.
    #[serde(default = "default_midpoint_epsilon")]
    pub midpoint_epsilon: f64,
    /// Seed for action selection and replay sampling.
    #[serde(default)]
    pub seed: u64,
}

fn default_initial_epsilon() -> f64 {
    0.5
}

fn default_midpoint_epsilon() -> f64 {
    0.1
}

impl ScenarioConfig {
    /// Loads a scenario from a JSON file.
    pub fn from_path(path: &Path) -> SimResult<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// The learning-controller parameters this scenario implies.
    pub fn learning_params(&self) -> LearningParams {
        LearningParams {
            action_count: self.jerk_candidates.len(),
            buffer_capacity: self.learning.buffer_capacity,
            batch_size: self.learning.batch_size,
            warmup: self.learning.warmup,
            discount: self.learning.discount,
            initial_epsilon: self.learning.initial_epsilon,
            midpoint_epsilon: self.learning.midpoint_epsilon,
            max_episode: self.learning.max_episode,
            seed: self.learning.seed,
        }
    }

    /// Builds a fresh simulation for the given episode index.
    pub fn build(&self, episode: u32) -> SimResult<Simulation> {
        let mut sim = Simulation::new(
            SimulationParams {
                delta_t: self.delta_t,
                step_limit: self.limit_step_count,
                episode,
                log_interval: self.log_interval,
                result_dir: self.result_dir.clone(),
            },
            self.reward.build(self),
            self.goal_rule,
        );

        let mut signals = HashMap::new();
        for signal in &self.signals {
            let id = sim.add_signal(&SignalAttributes {
                number: signal.number,
                offset: signal.offset,
                durations: signal.durations.clone(),
            })?;
            if signals.insert(signal.number, id).is_some() {
                return Err(SimError::Config(format!("duplicate signal {}", signal.number)));
            }
        }

        let mut intersections = HashMap::new();
        for inter in &self.intersections {
            let signal = inter
                .signal
                .map(|number| {
                    signals.get(&number).copied().ok_or_else(|| {
                        SimError::Config(format!(
                            "intersection {} references unknown signal {number}",
                            inter.number
                        ))
                    })
                })
                .transpose()?;
            let id = sim.add_intersection(&IntersectionAttributes {
                number: inter.number,
                place: Point2::new(inter.x, inter.y),
                signal,
            });
            if intersections.insert(inter.number, id).is_some() {
                return Err(SimError::Config(format!(
                    "duplicate intersection {}",
                    inter.number
                )));
            }
        }

        let lookup_intersection = |number: u32| {
            intersections.get(&number).copied().ok_or_else(|| {
                SimError::Config(format!("unknown intersection {number}"))
            })
        };
        let mut lanes = HashMap::new();
        for lane in &self.lanes {
            let id = sim.add_lane(&LaneAttributes {
                number: lane.number,
                length: lane.length,
                from: lookup_intersection(lane.from)?,
                to: lookup_intersection(lane.to)?,
            })?;
            if lanes.insert(lane.number, id).is_some() {
                return Err(SimError::Config(format!("duplicate lane {}", lane.number)));
            }
        }

        for vehicle in &self.vehicles {
            let route = vehicle
                .route
                .iter()
                .map(|number| {
                    lanes.get(number).copied().ok_or_else(|| {
                        SimError::Config(format!(
                            "vehicle {} routes over unknown lane {number}",
                            vehicle.number
                        ))
                    })
                })
                .collect::<SimResult<Vec<_>>>()?;
            sim.add_vehicle(
                &VehicleAttributes {
                    number: vehicle.number,
                    length: vehicle.length,
                    strategy: vehicle.strategy.build(),
                    velocity: vehicle.velocity,
                    accel: vehicle.accel,
                    jerk: vehicle.jerk,
                    lane_place: vehicle.lane_place,
                    desired_velocity: self.limit_velocity,
                    limit_accel: self.limit_accel,
                    limit_brake: self.limit_brake,
                    jerk_candidates: self.jerk_candidates.clone(),
                },
                &route,
            )?;
        }

        Ok(sim)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_a_minimal_scenario() {
        let json = r#"{
            "delta_t": 0.2,
            "limit_step_count": 300,
            "limit_velocity": 20.0,
            "limit_accel": 2.0,
            "limit_brake": -3.0,
            "jerk_candidates": [-2.0, 0.0, 2.0],
            "intersections": [
                { "number": 0, "x": 0.0, "y": 0.0 },
                { "number": 1, "x": 400.0, "y": 0.0, "signal": 0 }
            ],
            "signals": [
                { "number": 0, "durations": [5.0, 1.0, 5.0, 1.0] }
            ],
            "lanes": [
                { "number": 0, "length": 400.0, "from": 0, "to": 1 }
            ],
            "vehicles": [
                {
                    "number": 0, "length": 4.4, "strategy": "learned",
                    "velocity": 2.0, "lane_place": 0.0, "route": [0]
                }
            ],
            "learning": {
                "buffer_capacity": 10000, "batch_size": 128,
                "discount": 0.995, "target_update_rate": 0.005,
                "max_episode": 5000
            }
        }"#;
        let config: ScenarioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.jerk_candidates.len(), 3);
        let sim = config.build(1).unwrap();
        assert_eq!(sim.iter_vehicles().count(), 1);
        assert_eq!(sim.iter_lanes().count(), 1);
    }

    #[test]
    fn unknown_strategy_tags_fail_to_parse() {
        let err = serde_json::from_str::<StrategyConfig>("\"psychic\"");
        assert!(err.is_err());
    }

    #[test]
    fn dangling_route_is_a_config_error() {
        let json = r#"{
            "delta_t": 0.2,
            "limit_step_count": 300,
            "limit_velocity": 20.0,
            "limit_accel": 2.0,
            "limit_brake": -3.0,
            "jerk_candidates": [0.0],
            "intersections": [
                { "number": 0, "x": 0.0, "y": 0.0 },
                { "number": 1, "x": 100.0, "y": 0.0 }
            ],
            "lanes": [
                { "number": 0, "length": 100.0, "from": 0, "to": 1 }
            ],
            "vehicles": [
                {
                    "number": 0, "length": 4.4, "strategy": "heuristic",
                    "velocity": 10.0, "lane_place": 0.0, "route": [0, 7]
                }
            ],
            "learning": {
                "buffer_capacity": 100, "batch_size": 4,
                "discount": 0.99, "target_update_rate": 0.005,
                "max_episode": 10
            }
        }"#;
        let config: ScenarioConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.build(1), Err(SimError::Config(_))));
    }
}
