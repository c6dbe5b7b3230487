//! The simulation orchestrator.
//!
//! Owns the entity sets, the tick pipeline and the termination policy.
//! Every stage of the pipeline is a barrier: all vehicles complete one
//! stage before any vehicle begins the next, so no vehicle's decision can
//! observe another's post-integration state within the same tick.

use crate::error::{InvariantKind, SimError, SimResult};
use crate::intersection::{Intersection, IntersectionAttributes};
use crate::lane::{Lane, LaneAttributes};
use crate::learner::LearningController;
use crate::record::{EpisodeLog, VehicleRecord};
use crate::reward::RewardPolicy;
use crate::signal::{Signal, SignalAttributes};
use crate::vehicle::{Vehicle, VehicleAttributes};
use crate::world::WorldView;
use crate::{
    IntersectionId, IntersectionSet, LaneId, LaneSet, SignalId, SignalSet, VehicleId, VehicleSet,
};
use itertools::Itertools;
use serde::Deserialize;
use std::path::PathBuf;

/// Why an episode ended. Checked in this order; the first true condition
/// is the recorded reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationReason {
    /// The step ceiling was reached.
    TimeOver,
    /// The goal rule was satisfied.
    VehicleGoal,
    /// A vehicle's lead gap went negative.
    Collision,
}

/// When the goal condition ends the episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalRule {
    /// The episode ends as soon as one vehicle finishes its route; the
    /// usual choice when heuristic neighbours never finish.
    #[default]
    AnyVehicle,
    /// The episode continues until every vehicle has finished.
    AllVehicles,
}

/// The orchestrator's own parameters.
#[derive(Clone, Debug)]
pub struct SimulationParams {
    /// Tick duration in s.
    pub delta_t: f64,
    /// Step ceiling after which the episode is cut off.
    pub step_limit: u64,
    /// Index of the episode this simulation runs.
    pub episode: u32,
    /// Persist logs only every this many episodes; zero disables logging.
    pub log_interval: u32,
    /// Where episode logs are written, if anywhere.
    pub result_dir: Option<PathBuf>,
}

/// The result of a completed episode.
#[derive(Debug)]
pub struct EpisodeOutcome {
    /// Why the episode ended.
    pub reason: TerminationReason,
    /// The tick at which it ended.
    pub steps: u64,
}

/// A traffic simulation, one episode's worth.
pub struct Simulation {
    /// The lanes in the network.
    lanes: LaneSet,
    /// The intersections in the network.
    intersections: IntersectionSet,
    /// The signals in the network.
    signals: SignalSet,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// Orchestrator parameters.
    params: SimulationParams,
    /// The reward shaping in effect.
    reward: Box<dyn RewardPolicy>,
    /// The goal termination rule in effect.
    goal_rule: GoalRule,
    /// The current tick.
    step: u64,
    /// Set once the episode has terminated.
    finished: Option<TerminationReason>,
    /// The episode's accumulating log.
    log: EpisodeLog,
}

impl Simulation {
    /// Creates an empty simulation.
    pub fn new(
        params: SimulationParams,
        reward: Box<dyn RewardPolicy>,
        goal_rule: GoalRule,
    ) -> Self {
        let log = EpisodeLog::new(params.episode, params.log_interval);
        Self {
            lanes: LaneSet::default(),
            intersections: IntersectionSet::default(),
            signals: SignalSet::default(),
            vehicles: VehicleSet::default(),
            params,
            reward,
            goal_rule,
            step: 0,
            finished: None,
            log,
        }
    }

    /// Adds a signal to the network.
    pub fn add_signal(&mut self, attribs: &SignalAttributes) -> SimResult<SignalId> {
        self.signals.try_insert_with_key(|id| Signal::new(id, attribs))
    }

    /// Adds an intersection to the network.
    pub fn add_intersection(&mut self, attribs: &IntersectionAttributes) -> IntersectionId {
        self.intersections
            .insert_with_key(|id| Intersection::new(id, attribs))
    }

    /// Adds a lane to the network.
    ///
    /// The endpoints must lie on a shared grid axis.
    pub fn add_lane(&mut self, attribs: &LaneAttributes) -> SimResult<LaneId> {
        self.intersections[attribs.from].grid_distance(&self.intersections[attribs.to])?;
        Ok(self.lanes.insert_with_key(|id| Lane::new(id, attribs)))
    }

    /// Adds a vehicle at the start of its route.
    pub fn add_vehicle(
        &mut self,
        attribs: &VehicleAttributes,
        route: &[LaneId],
    ) -> SimResult<VehicleId> {
        let first = route
            .first()
            .ok_or(InvariantKind::EmptyRoute(attribs.number))?;
        let length = self.lanes[*first].length();
        if !(0.0..length).contains(&attribs.lane_place) {
            return Err(SimError::Config(format!(
                "vehicle {} starts at {} on a lane of length {}",
                attribs.number, attribs.lane_place, length
            )));
        }
        let id = self
            .vehicles
            .try_insert_with_key(|id| Vehicle::new(id, attribs, route))?;
        self.refresh_lanes();
        Ok(id)
    }

    /// Gets the current tick.
    pub fn tick(&self) -> u64 {
        self.step
    }

    /// The reason the episode ended, once it has.
    pub fn finished(&self) -> Option<TerminationReason> {
        self.finished
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> &Vehicle {
        &self.vehicles[vehicle_id]
    }

    /// Gets a reference to the lane with the given ID.
    pub fn get_lane(&self, lane_id: LaneId) -> &Lane {
        &self.lanes[lane_id]
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Returns an iterator over all the lanes in the simulation.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// A read-only view of the simulation world.
    pub fn world(&self) -> WorldView {
        WorldView::new(
            &self.lanes,
            &self.intersections,
            &self.signals,
            &self.vehicles,
        )
    }

    /// The episode's accumulated log.
    pub fn log(&self) -> &EpisodeLog {
        &self.log
    }

    /// Advances the simulation by one tick.
    ///
    /// Returns the termination reason once the episode has ended; further
    /// calls are no-ops returning the same reason.
    pub fn step(&mut self, controller: &mut LearningController) -> SimResult<Option<TerminationReason>> {
        if self.finished.is_some() {
            return Ok(self.finished);
        }

        // Perception of the situation every decision reads from.
        self.recognize_all()?;
        self.decide_all(controller)?;
        self.update_all();

        // The integration just carried the world one tick forward; the
        // signals are advanced to that instant before anyone observes it.
        let now = self.params.delta_t * (self.step + 1) as f64;
        for signal in self.signals.values_mut() {
            signal.update(now);
        }
        self.refresh_lanes();
        self.step += 1;

        // Post-integration perception, keyed by the advanced tick so it
        // doubles as the next tick's pre-state.
        self.recognize_all()?;

        let reason = self.check_termination();
        if let Some(reason) = reason {
            self.finished = Some(reason);
            for vehicle in self.vehicles.values_mut() {
                vehicle.force_goal();
            }
            log::debug!(
                "episode {} ended at tick {}: {:?}",
                self.params.episode,
                self.step,
                reason
            );
        }

        self.push_experiences(controller)?;
        controller.optimize();
        Ok(reason)
    }

    /// Runs the episode to termination and flushes the log.
    pub fn run(&mut self, controller: &mut LearningController) -> SimResult<EpisodeOutcome> {
        loop {
            if let Some(reason) = self.step(controller)? {
                if let Some(dir) = self.params.result_dir.clone() {
                    self.log.flush(&dir)?;
                }
                return Ok(EpisodeOutcome {
                    reason,
                    steps: self.step,
                });
            }
        }
    }

    /// Takes a perception snapshot of every vehicle, keyed by the current
    /// tick. Vehicles already holding a snapshot for this tick keep it
    /// untouched; the post-state of one tick is thereby reused as the
    /// pre-state of the next.
    fn recognize_all(&mut self) -> SimResult<()> {
        let tick = self.step;
        let mut fresh = Vec::new();
        {
            let world = self.world();
            for (id, vehicle) in &self.vehicles {
                if vehicle.snapshot(tick).is_some() {
                    continue;
                }
                fresh.push((id, vehicle.perceive(&world)?));
            }
        }
        for (id, snapshot) in fresh {
            self.vehicles[id].store_snapshot(tick, snapshot);
        }
        Ok(())
    }

    /// Lets every vehicle choose its jerk from this tick's snapshot.
    fn decide_all(&mut self, controller: &mut LearningController) -> SimResult<()> {
        let (tick, dt) = (self.step, self.params.delta_t);
        for vehicle in self.vehicles.values_mut() {
            vehicle.decide(tick, dt, controller)?;
        }
        Ok(())
    }

    /// Integrates every vehicle's kinematics.
    fn update_all(&mut self) {
        let dt = self.params.delta_t;
        for vehicle in self.vehicles.values_mut() {
            vehicle.update(dt, &self.lanes, &self.intersections, &self.signals);
        }
    }

    /// Rebuilds every lane's occupancy roster from the vehicles' current
    /// positions, front-most first.
    fn refresh_lanes(&mut self) {
        let lane_ids: Vec<LaneId> = self.lanes.keys().collect();
        for lane_id in lane_ids {
            let occupancy = self
                .vehicles
                .iter()
                .filter(|(_, vehicle)| vehicle.lane_id() == Some(lane_id))
                .sorted_by(|(_, a), (_, b)| b.lane_place().total_cmp(&a.lane_place()))
                .map(|(id, _)| id)
                .collect();
            self.lanes[lane_id].set_occupancy(occupancy);
        }
    }

    /// Evaluates the termination conditions in priority order.
    fn check_termination(&self) -> Option<TerminationReason> {
        if self.step >= self.params.step_limit {
            return Some(TerminationReason::TimeOver);
        }

        let goal = match self.goal_rule {
            GoalRule::AnyVehicle => self.vehicles.values().any(Vehicle::reached_goal),
            GoalRule::AllVehicles => self.vehicles.values().all(Vehicle::reached_goal),
        };
        if goal {
            return Some(TerminationReason::VehicleGoal);
        }

        // A vehicle that has no snapshot yet contributes no collision.
        let collided = self.vehicles.values().any(|vehicle| {
            vehicle
                .snapshot(self.step)
                .map_or(false, |snap| snap.is_collision)
        });
        collided.then_some(TerminationReason::Collision)
    }

    /// Pairs each vehicle's pre/post snapshots, computes the reward, logs
    /// the row and forwards the transition to the controller.
    fn push_experiences(&mut self, controller: &mut LearningController) -> SimResult<()> {
        let (pre_tick, post_tick) = (self.step - 1, self.step);
        let mut rows: Vec<(u32, VehicleRecord)> = Vec::new();
        for vehicle in self.vehicles.values() {
            let Some(pre) = vehicle.snapshot(pre_tick) else {
                continue;
            };
            // Vehicles that finished before this tick are inert.
            if pre.reached_goal {
                continue;
            }
            let post = vehicle
                .snapshot(post_tick)
                .ok_or(InvariantKind::MissingSnapshot {
                    vehicle: vehicle.number(),
                    tick: post_tick,
                })?;
            // Only learned vehicles are being trained; the rest get zero.
            let reward = if vehicle.is_learned() {
                self.reward.reward(pre, post)
            } else {
                0.0
            };
            vehicle.push_experience(pre, post, reward, controller);

            let lane_number = vehicle
                .lane_id()
                .map(|id| self.lanes[id].number() as i64)
                .unwrap_or(-1);
            rows.push((
                vehicle.number(),
                VehicleRecord::new(
                    post,
                    reward,
                    vehicle.jerk(),
                    vehicle.ignored_signal(),
                    lane_number,
                    vehicle.lane_place(),
                ),
            ));
        }
        for (number, row) in rows {
            self.log.record(number, row);
        }
        Ok(())
    }
}
