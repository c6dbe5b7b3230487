pub use cgmath;
pub use config::ScenarioConfig;
pub use error::{InvariantKind, SimError, SimResult};
pub use intersection::{Intersection, IntersectionAttributes};
pub use lane::{Lane, LaneAttributes};
pub use learner::{ActionValueModel, LearningController, LearningParams};
pub use perception::{Features, LeadInfo, Perception, SignalView};
pub use reward::{RewardPolicy, SpeedControlReward, TtcHeadwayReward};
pub use signal::{Signal, SignalAttributes, SignalPhase};
pub use simulation::{EpisodeOutcome, GoalRule, Simulation, SimulationParams, TerminationReason};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use vehicle::{CarFollowing, DecisionStrategy, Vehicle, VehicleAttributes};
pub use world::WorldView;

pub mod config;
mod error;
mod intersection;
mod lane;
pub mod learner;
mod perception;
pub mod record;
mod reward;
mod signal;
mod simulation;
pub mod util;
mod vehicle;
mod world;

new_key_type! {
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of an [Intersection].
    pub struct IntersectionId;
    /// Unique ID of a [Signal].
    pub struct SignalId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type LaneSet = SlotMap<LaneId, Lane>;
type IntersectionSet = SlotMap<IntersectionId, Intersection>;
type SignalSet = SlotMap<SignalId, Signal>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
