use jerk_sim::learner::{ActionValueModel, Transition};
use jerk_sim::util::fatal_banner;
use jerk_sim::{LearningController, ScenarioConfig, SimResult};
use std::path::Path;

/// Stand-in for an external function approximator.
///
/// Estimates every action as equally valuable and learns nothing, which
/// makes the driver runnable without a tensor backend; a real deployment
/// plugs its own [`ActionValueModel`] in here.
struct UniformModel {
    actions: usize,
}

impl ActionValueModel for UniformModel {
    fn action_values(&self, _state: &[f64]) -> Vec<f64> {
        vec![0.0; self.actions]
    }

    fn optimize(&mut self, _batch: &[&Transition], _discount: f64) {}
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => ScenarioConfig::from_path(Path::new(&path)),
        None => Ok(demo_scenario()),
    };
    let result = config.and_then(run);
    if let Err(err) = result {
        eprintln!("{}", fatal_banner(&err.to_string()));
        std::process::exit(1);
    }
}

fn run(config: ScenarioConfig) -> SimResult<()> {
    let params = config.learning_params();
    let mut controller = LearningController::new(
        Box::new(UniformModel {
            actions: params.action_count,
        }),
        &params,
    );

    for episode in 1..=config.learning.max_episode {
        controller.begin_episode(episode);
        let mut sim = config.build(episode)?;
        let outcome = sim.run(&mut controller)?;
        println!(
            "episode {episode}: {:?} after {} ticks (epsilon {:.3})",
            outcome.reason,
            outcome.steps,
            controller.epsilon()
        );
    }
    Ok(())
}

/// A single signalized road: one learned vehicle approaching the signal
/// with a heuristic follower behind it.
fn demo_scenario() -> ScenarioConfig {
    serde_json::from_value(serde_json::json!({
        "delta_t": 0.2,
        "limit_step_count": 300,
        "limit_velocity": 20.0,
        "limit_accel": 2.0,
        "limit_brake": -3.0,
        "jerk_candidates": [-2.0, 0.0, 2.0],
        "goal_rule": "any_vehicle",
        "reward": "ttc_headway",
        "log_interval": 100,
        "result_dir": "./result",
        "intersections": [
            { "number": 0, "x": 0.0, "y": 0.0 },
            { "number": 1, "x": 400.0, "y": 0.0, "signal": 0 }
        ],
        "signals": [
            { "number": 0, "offset": 0.0, "durations": [5.0, 1.0, 5.0, 1.0] }
        ],
        "lanes": [
            { "number": 0, "length": 400.0, "from": 0, "to": 1 }
        ],
        "vehicles": [
            {
                "number": 0, "length": 4.4, "strategy": "learned",
                "velocity": 2.0, "lane_place": 40.0, "route": [0]
            },
            {
                "number": 1, "length": 4.4, "strategy": "heuristic",
                "velocity": 2.0, "lane_place": 0.0, "route": [0]
            }
        ],
        "learning": {
            "buffer_capacity": 10000,
            "batch_size": 128,
            "discount": 0.995,
            "target_update_rate": 0.005,
            "max_episode": 5000,
            "initial_epsilon": 0.5,
            "midpoint_epsilon": 0.1,
            "seed": 0
        }
    }))
    .expect("demo scenario is well-formed")
}
