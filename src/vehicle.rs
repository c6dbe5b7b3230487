//! Simulated vehicles.

pub use self::decision::{CarFollowing, DecisionStrategy};
use crate::error::{InvariantKind, SimResult};
use crate::learner::LearningController;
use crate::perception::Perception;
use crate::world::WorldView;
use crate::{IntersectionSet, LaneId, LaneSet, SignalSet, VehicleId};
use arrayvec::ArrayVec;
use smallvec::SmallVec;

mod decision;

/// Below this velocity a vehicle counts as stopped, in m/s.
const STOP_VELOCITY: f64 = 0.01;

/// How many perception snapshots a vehicle retains: the current tick's
/// and the previous tick's. Older snapshots are evicted by age.
const SNAPSHOT_RING: usize = 2;

/// A simulated vehicle.
pub struct Vehicle {
    /// The vehicle's ID.
    id: VehicleId,
    /// User-facing identity number, used in configuration and logs.
    number: u32,
    /// Half the vehicle's length in m.
    half_len: f64,
    /// How the vehicle chooses its jerk each tick.
    strategy: DecisionStrategy,
    /// The velocity in m/s; never negative.
    vel: f64,
    /// The acceleration in m/s^2, clamped to the configured limits.
    acc: f64,
    /// The commanded jerk in m/s^3.
    jerk: f64,
    /// The desired (limit) velocity in m/s.
    desired_velocity: f64,
    /// The maximum acceleration in m/s^2.
    limit_accel: f64,
    /// The maximum deceleration, a negative number in m/s^2.
    limit_brake: f64,
    /// The discrete jerk values a learned policy chooses between.
    jerk_candidates: SmallVec<[f64; 8]>,
    /// The lanes the vehicle travels, in order.
    route: SmallVec<[LaneId; 8]>,
    /// Index into `route` of the lane the vehicle is currently on.
    route_idx: usize,
    /// The longitudinal position along the current lane in m.
    lane_place: f64,
    /// Whether the vehicle has completed its route.
    reached_goal: bool,
    /// The action index chosen this tick, for learned vehicles.
    action: Option<usize>,
    /// Whether the vehicle crossed a stop line against its signal this tick.
    ignored_signal: bool,
    /// Recent perception snapshots keyed by tick, oldest first.
    snapshots: ArrayVec<(u64, Perception), SNAPSHOT_RING>,
}

/// The attributes of a simulated vehicle.
#[derive(Clone)]
pub struct VehicleAttributes {
    /// User-facing identity number.
    pub number: u32,
    /// The vehicle length in m.
    pub length: f64,
    /// How the vehicle chooses its jerk each tick.
    pub strategy: DecisionStrategy,
    /// Initial velocity in m/s.
    pub velocity: f64,
    /// Initial acceleration in m/s^2.
    pub accel: f64,
    /// Initial jerk in m/s^3.
    pub jerk: f64,
    /// Initial position along the first route lane in m.
    pub lane_place: f64,
    /// The desired (limit) velocity in m/s.
    pub desired_velocity: f64,
    /// The maximum acceleration in m/s^2.
    pub limit_accel: f64,
    /// The maximum deceleration, a negative number in m/s^2.
    pub limit_brake: f64,
    /// The discrete jerk values a learned policy chooses between.
    pub jerk_candidates: Vec<f64>,
}

impl Vehicle {
    /// Creates a new vehicle on the first lane of its route.
    pub(crate) fn new(
        id: VehicleId,
        attribs: &VehicleAttributes,
        route: &[LaneId],
    ) -> SimResult<Self> {
        if route.is_empty() {
            return Err(InvariantKind::EmptyRoute(attribs.number).into());
        }
        Ok(Self {
            id,
            number: attribs.number,
            half_len: 0.5 * attribs.length,
            strategy: attribs.strategy.clone(),
            vel: attribs.velocity,
            acc: attribs.accel,
            jerk: attribs.jerk,
            desired_velocity: attribs.desired_velocity,
            limit_accel: attribs.limit_accel,
            limit_brake: attribs.limit_brake,
            jerk_candidates: SmallVec::from_slice(&attribs.jerk_candidates),
            route: SmallVec::from_slice(route),
            route_idx: 0,
            lane_place: attribs.lane_place,
            reached_goal: false,
            action: None,
            ignored_signal: false,
            snapshots: ArrayVec::new(),
        })
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Gets the vehicle's identity number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Half the vehicle's length in m.
    pub fn half_length(&self) -> f64 {
        self.half_len
    }

    /// The vehicle's velocity in m/s.
    pub fn velocity(&self) -> f64 {
        self.vel
    }

    /// The vehicle's acceleration in m/s^2.
    pub fn accel(&self) -> f64 {
        self.acc
    }

    /// The jerk commanded this tick in m/s^3.
    pub fn jerk(&self) -> f64 {
        self.jerk
    }

    /// The lane the vehicle is currently on, or `None` once it has
    /// driven off the end of its route.
    pub fn lane_id(&self) -> Option<LaneId> {
        self.route.get(self.route_idx).copied()
    }

    /// The position along the current lane in m.
    pub fn lane_place(&self) -> f64 {
        self.lane_place
    }

    /// Whether the vehicle has completed its route.
    pub fn reached_goal(&self) -> bool {
        self.reached_goal
    }

    /// Whether the vehicle crossed a stop line against its signal this tick.
    pub fn ignored_signal(&self) -> bool {
        self.ignored_signal
    }

    /// Whether the vehicle is controlled by a learned policy.
    pub fn is_learned(&self) -> bool {
        matches!(self.strategy, DecisionStrategy::Learned)
    }

    /// The desired (limit) velocity in m/s.
    pub fn desired_velocity(&self) -> f64 {
        self.desired_velocity
    }

    /// The lanes remaining on the route beyond the current one.
    pub(crate) fn future_route(&self) -> &[LaneId] {
        &self.route[self.route_idx + 1..]
    }

    /// Distance to the next intersection in m; zero once the goal is reached.
    pub fn distance_next_intersection(&self, lanes: &LaneSet) -> f64 {
        if self.reached_goal {
            return 0.0;
        }
        match self.lane_id() {
            Some(lane) => lanes[lane].length() - self.lane_place,
            None => 0.0,
        }
    }

    /// Distance travelled from the previous intersection in m.
    ///
    /// Never meaningful after the goal is reached; querying then is an
    /// invariant violation.
    pub fn distance_prev_intersection(&self) -> SimResult<f64> {
        if self.reached_goal {
            return Err(InvariantKind::PositionAfterGoal(self.number).into());
        }
        Ok(self.lane_place)
    }

    /// Gets the cached perception snapshot for `tick`, if one exists.
    pub fn snapshot(&self, tick: u64) -> Option<&Perception> {
        self.snapshots
            .iter()
            .find(|(t, _)| *t == tick)
            .map(|(_, snap)| snap)
    }

    /// Builds a fresh perception snapshot of the vehicle's situation.
    pub(crate) fn perceive(&self, world: &WorldView) -> SimResult<Perception> {
        let lead = world.find_lead(self)?;
        Ok(Perception {
            velocity: self.vel,
            accel: self.acc,
            over_velocity: self.vel > self.desired_velocity,
            over_accel: self.acc > self.limit_accel,
            over_brake: self.acc < self.limit_brake,
            is_stopped: self.vel < STOP_VELOCITY,
            reached_goal: self.reached_goal,
            distance_next_intersection: world.distance_next_intersection(self),
            lead,
            is_collision: lead.map_or(false, |l| l.gap < 0.0),
            signal: world.signal_ahead(self),
        })
    }

    /// Caches a snapshot for `tick`, evicting the oldest retained one.
    pub(crate) fn store_snapshot(&mut self, tick: u64, snapshot: Perception) {
        debug_assert!(self.snapshot(tick).is_none());
        if self.snapshots.is_full() {
            self.snapshots.remove(0);
        }
        self.snapshots.push((tick, snapshot));
    }

    /// Chooses the jerk to command this tick from the snapshot keyed `tick`.
    pub(crate) fn decide(
        &mut self,
        tick: u64,
        dt: f64,
        controller: &mut LearningController,
    ) -> SimResult<()> {
        if self.reached_goal {
            return Ok(());
        }
        let snapshot = self
            .snapshot(tick)
            .ok_or(InvariantKind::MissingSnapshot {
                vehicle: self.number,
                tick,
            })?
            .clone();
        match &self.strategy {
            DecisionStrategy::Learned => {
                let features = snapshot.features(self.desired_velocity);
                let action = controller.select_action(&features);
                self.jerk = self.jerk_candidates[action];
                self.action = Some(action);
            }
            DecisionStrategy::Heuristic(model) => {
                self.jerk = model.jerk(&snapshot, self.desired_velocity, dt);
                self.action = None;
            }
        }
        Ok(())
    }

    /// Integrates the vehicle's kinematics over one tick and advances it
    /// across the lane boundary if it runs off the end of its lane.
    pub(crate) fn update(
        &mut self,
        dt: f64,
        lanes: &LaneSet,
        intersections: &IntersectionSet,
        signals: &SignalSet,
    ) {
        if self.reached_goal {
            return;
        }
        self.ignored_signal = false;

        let prev_vel = self.vel;
        self.acc = (self.acc + self.jerk * dt).clamp(self.limit_brake, self.limit_accel);
        self.vel = f64::max(self.vel + self.acc * dt, 0.0);
        // With velocity clamped at zero, the raw displacement can go negative.
        let travel = f64::max(prev_vel * dt + 0.5 * self.acc * dt * dt, 0.0);

        let lane = &lanes[self.route[self.route_idx]];
        if self.lane_place + travel < lane.length() {
            self.lane_place += travel;
            return;
        }

        // Crossing the stop line against the signal is recorded, not prevented.
        let signal = intersections[lane.to_intersection()]
            .signal()
            .map(|id| &signals[id]);
        if signal.map_or(false, |s| s.phase().forbids_entry()) {
            self.ignored_signal = true;
            log::debug!("vehicle {} ran signal at lane {}", self.number, lane.number());
        }

        self.route_idx += 1;
        if self.route_idx == self.route.len() {
            self.reached_goal = true;
            self.lane_place = 0.0;
            log::debug!("vehicle {} reached its goal", self.number);
        } else {
            self.lane_place = self.lane_place + travel - lane.length();
        }
    }

    /// Marks the vehicle as finished so no further kinematic updates occur.
    pub(crate) fn force_goal(&mut self) {
        self.reached_goal = true;
    }

    /// Forwards this tick's transition to the learning controller.
    ///
    /// Only learned vehicles feed the replay memory. Terminal transitions
    /// carry no next state, so the value function cannot bootstrap across
    /// the episode boundary.
    pub(crate) fn push_experience(
        &self,
        pre: &Perception,
        post: &Perception,
        reward: f64,
        controller: &mut LearningController,
    ) {
        let (DecisionStrategy::Learned, Some(action)) = (&self.strategy, self.action) else {
            return;
        };
        let state = pre.features(self.desired_velocity);
        let next = (!self.reached_goal).then(|| post.features(self.desired_velocity));
        controller.push_experience(state, action, next, reward, self.reached_goal);
    }
}
