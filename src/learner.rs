//! The learning controller and its replay pipeline.
//!
//! The function approximator itself lives outside this crate, behind
//! [`ActionValueModel`]; the controller owns everything the simulation
//! needs around it: epsilon-greedy action selection, the replay memory,
//! and the gate on the optimize pass.

pub use self::replay::{ReplayMemory, Transition};
use crate::perception::Features;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

mod replay;

/// The contract with the external function approximator.
///
/// How the model computes its estimates and trains (network shape,
/// target-network soft updates, gradient steps) is its own business.
pub trait ActionValueModel {
    /// Estimates the value of each discrete action in `state`.
    fn action_values(&self, state: &[f64]) -> Vec<f64>;

    /// Performs one training step on a sampled batch of transitions.
    fn optimize(&mut self, batch: &[&Transition], discount: f64);
}

/// Parameters of the learning controller.
#[derive(Clone, Debug)]
pub struct LearningParams {
    /// Number of discrete actions.
    pub action_count: usize,
    /// Capacity of the replay memory.
    pub buffer_capacity: usize,
    /// Transitions drawn per optimize pass.
    pub batch_size: usize,
    /// The optimize pass is a no-op until this many transitions exist.
    pub warmup: usize,
    /// Discount factor handed to the model.
    pub discount: f64,
    /// Exploration rate at episode zero.
    pub initial_epsilon: f64,
    /// Exploration rate at the horizon midpoint.
    pub midpoint_epsilon: f64,
    /// Episode horizon over which exploration decays.
    pub max_episode: u32,
    /// Seed for action selection and replay sampling.
    pub seed: u64,
}

/// Piecewise-linear exploration schedule over the episode horizon.
///
/// Decays from the initial rate to a small floor at the midpoint, then
/// from the floor towards zero at the horizon; clamped to zero beyond.
#[derive(Clone, Copy, Debug)]
pub struct EpsilonSchedule {
    initial: f64,
    midpoint: f64,
    horizon: u32,
}

impl EpsilonSchedule {
    pub fn new(initial: f64, midpoint: f64, horizon: u32) -> Self {
        Self {
            initial,
            midpoint,
            horizon: horizon.max(2),
        }
    }

    /// The exploration rate for the given episode index.
    pub fn epsilon(&self, episode: u32) -> f64 {
        let half = self.horizon / 2;
        if episode < half {
            let t = (half - episode) as f64 / half as f64;
            self.midpoint + t * (self.initial - self.midpoint)
        } else if episode < self.horizon {
            let t = (self.horizon - episode) as f64 / (self.horizon - half) as f64;
            t * self.midpoint
        } else {
            0.0
        }
    }
}

/// Drives the external approximator from the simulation's experience.
pub struct LearningController {
    model: Box<dyn ActionValueModel>,
    memory: ReplayMemory,
    schedule: EpsilonSchedule,
    action_count: usize,
    batch_size: usize,
    warmup: usize,
    discount: f64,
    episode: u32,
    rng: StdRng,
}

impl LearningController {
    /// Creates a new controller around the given model.
    pub fn new(model: Box<dyn ActionValueModel>, params: &LearningParams) -> Self {
        Self {
            model,
            memory: ReplayMemory::new(params.buffer_capacity),
            schedule: EpsilonSchedule::new(
                params.initial_epsilon,
                params.midpoint_epsilon,
                params.max_episode,
            ),
            action_count: params.action_count,
            batch_size: params.batch_size,
            warmup: params.warmup.max(params.batch_size),
            discount: params.discount,
            episode: 0,
            rng: StdRng::seed_from_u64(params.seed),
        }
    }

    /// Sets the episode index the epsilon schedule reads.
    pub fn begin_episode(&mut self, episode: u32) {
        self.episode = episode;
    }

    /// The replay memory, for inspection.
    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    /// The exploration rate in effect for the current episode.
    pub fn epsilon(&self) -> f64 {
        self.schedule.epsilon(self.episode)
    }

    /// Chooses a discrete action for `state`, epsilon-greedily.
    pub fn select_action(&mut self, state: &[f64]) -> usize {
        if self.rng.gen::<f64>() <= self.epsilon() {
            return self.rng.gen_range(0..self.action_count);
        }
        let values = self.model.action_values(state);
        debug_assert_eq!(values.len(), self.action_count);
        values
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    /// Appends one transition to the replay memory.
    ///
    /// `next` is `None` exactly when the transition is terminal, so the
    /// model never bootstraps across an episode boundary.
    pub fn push_experience(
        &mut self,
        state: Features,
        action: usize,
        next: Option<Features>,
        reward: f64,
        terminal: bool,
    ) {
        debug_assert_eq!(terminal, next.is_none());
        self.memory.push(Transition {
            state,
            action,
            next,
            reward,
        });
    }

    /// Attempts one optimize pass on the model.
    ///
    /// Skips silently until the replay memory has warmed up.
    pub fn optimize(&mut self) {
        if self.memory.len() < self.warmup {
            return;
        }
        let batch = self.memory.sample(self.batch_size, &mut self.rng);
        self.model.optimize(&batch, self.discount);
    }
}
