//! Tests that drive small end-to-end scenarios.

use assert_approx_eq::assert_approx_eq;
use cgmath::Point2;
use jerk_sim::learner::{ActionValueModel, Transition};
use jerk_sim::{
    GoalRule, IntersectionAttributes, LaneAttributes, LaneId, LearningController, LearningParams,
    SignalAttributes, SignalPhase, SignalView, Simulation, SimulationParams, TerminationReason,
    TtcHeadwayReward, VehicleAttributes, VehicleId,
};

struct ZeroModel {
    actions: usize,
}

impl ActionValueModel for ZeroModel {
    fn action_values(&self, _state: &[f64]) -> Vec<f64> {
        vec![0.0; self.actions]
    }

    fn optimize(&mut self, _batch: &[&Transition], _discount: f64) {}
}

fn controller(actions: usize) -> LearningController {
    LearningController::new(
        Box::new(ZeroModel { actions }),
        &LearningParams {
            action_count: actions,
            buffer_capacity: 1000,
            batch_size: 4,
            warmup: 4,
            discount: 0.99,
            initial_epsilon: 0.0,
            midpoint_epsilon: 0.0,
            max_episode: 100,
            seed: 0,
        },
    )
}

fn empty_sim(step_limit: u64) -> Simulation {
    Simulation::new(
        SimulationParams {
            delta_t: 0.2,
            step_limit,
            episode: 1,
            log_interval: 0,
            result_dir: None,
        },
        Box::new(TtcHeadwayReward::default()),
        GoalRule::AnyVehicle,
    )
}

/// A straight chain of `lane_lengths.len()` lanes along the x axis.
fn add_chain(sim: &mut Simulation, lane_lengths: &[f64]) -> Vec<LaneId> {
    let mut x = 0.0;
    let mut prev = sim.add_intersection(&IntersectionAttributes {
        number: 0,
        place: Point2::new(0.0, 0.0),
        signal: None,
    });
    let mut lanes = vec![];
    for (i, length) in lane_lengths.iter().enumerate() {
        x += length;
        let next = sim.add_intersection(&IntersectionAttributes {
            number: i as u32 + 1,
            place: Point2::new(x, 0.0),
            signal: None,
        });
        lanes.push(
            sim.add_lane(&LaneAttributes {
                number: i as u32,
                length: *length,
                from: prev,
                to: next,
            })
            .unwrap(),
        );
        prev = next;
    }
    lanes
}

/// A vehicle that always commands zero jerk (single candidate).
fn coasting_vehicle(
    sim: &mut Simulation,
    number: u32,
    velocity: f64,
    lane_place: f64,
    route: &[LaneId],
) -> VehicleId {
    sim.add_vehicle(
        &VehicleAttributes {
            number,
            length: 4.4,
            strategy: jerk_sim::DecisionStrategy::Learned,
            velocity,
            accel: 0.0,
            jerk: 0.0,
            lane_place,
            desired_velocity: 20.0,
            limit_accel: 2.0,
            limit_brake: -3.0,
            jerk_candidates: vec![0.0],
        },
        route,
    )
    .unwrap()
}

#[test]
fn coasting_vehicle_reaches_its_goal_on_the_expected_tick() {
    let mut sim = empty_sim(300);
    let lanes = add_chain(&mut sim, &[100.0]);
    let veh = coasting_vehicle(&mut sim, 0, 15.0, 0.0, &lanes);
    let mut ctl = controller(1);

    let outcome = sim.run(&mut ctl).unwrap();
    // 15 m/s * 0.2 s = 3 m per tick; position first meets 100 m on tick 34.
    assert_eq!(outcome.reason, TerminationReason::VehicleGoal);
    assert_eq!(outcome.steps, 34);
    assert!(sim.get_vehicle(veh).reached_goal());
    assert_eq!(sim.get_vehicle(veh).lane_id(), None);
    let rows = sim.log().rows(0);
    assert_eq!(rows.len(), 34);
    assert_eq!(rows.last().unwrap().lane_number, -1);
}

#[test]
fn a_slow_vehicle_never_changes_lane() {
    let mut sim = empty_sim(300);
    let lanes = add_chain(&mut sim, &[100.0]);
    let veh = coasting_vehicle(&mut sim, 0, 1.0, 0.0, &lanes);
    let mut ctl = controller(1);

    for _ in 0..50 {
        assert_eq!(sim.step(&mut ctl).unwrap(), None);
        assert_eq!(sim.get_vehicle(veh).lane_id(), Some(lanes[0]));
    }
    assert_approx_eq!(sim.get_vehicle(veh).lane_place(), 10.0);
}

#[test]
fn lead_lookup_crosses_lane_boundaries() {
    let mut sim = empty_sim(300);
    let lanes = add_chain(&mut sim, &[100.0, 100.0]);
    let rear = coasting_vehicle(&mut sim, 0, 10.0, 10.0, &lanes);
    let front = coasting_vehicle(&mut sim, 1, 10.0, 20.0, &lanes[1..]);

    let world = sim.world();
    let lead = world.find_lead(sim.get_vehicle(rear)).unwrap().unwrap();
    // 90 m to the intersection plus 20 m into the next lane, minus both
    // half-lengths.
    assert_approx_eq!(lead.gap, 90.0 + 20.0 - 4.4);
    assert_approx_eq!(lead.velocity, 10.0);

    // Nothing is ahead of the front vehicle anywhere on its route.
    assert!(world.find_lead(sim.get_vehicle(front)).unwrap().is_none());
}

#[test]
fn occupancy_roster_is_ordered_front_to_back() {
    let mut sim = empty_sim(300);
    let lanes = add_chain(&mut sim, &[100.0]);
    coasting_vehicle(&mut sim, 0, 0.0, 10.0, &lanes);
    coasting_vehicle(&mut sim, 1, 0.0, 80.0, &lanes);
    coasting_vehicle(&mut sim, 2, 0.0, 50.0, &lanes);

    let numbers: Vec<u32> = sim
        .get_lane(lanes[0])
        .vehicles()
        .iter()
        .map(|id| sim.get_vehicle(*id).number())
        .collect();
    assert_eq!(numbers, vec![1, 2, 0]);
}

#[test]
fn overlapping_vehicles_terminate_the_episode_as_a_collision() {
    let mut sim = empty_sim(300);
    let lanes = add_chain(&mut sim, &[100.0]);
    coasting_vehicle(&mut sim, 0, 0.0, 50.0, &lanes);
    coasting_vehicle(&mut sim, 1, 0.0, 52.0, &lanes);
    let mut ctl = controller(1);

    let outcome = sim.run(&mut ctl).unwrap();
    assert_eq!(outcome.reason, TerminationReason::Collision);
    assert_eq!(outcome.steps, 1);
}

#[test]
fn the_step_ceiling_outranks_a_collision() {
    let mut sim = empty_sim(1);
    let lanes = add_chain(&mut sim, &[100.0]);
    coasting_vehicle(&mut sim, 0, 0.0, 50.0, &lanes);
    coasting_vehicle(&mut sim, 1, 0.0, 52.0, &lanes);
    let mut ctl = controller(1);

    let outcome = sim.run(&mut ctl).unwrap();
    assert_eq!(outcome.reason, TerminationReason::TimeOver);
}

#[test]
fn a_goal_outranks_a_collision() {
    let mut sim = empty_sim(300);
    let lanes = add_chain(&mut sim, &[100.0, 100.0]);
    // An overlapping pair parked on the first lane...
    coasting_vehicle(&mut sim, 0, 0.0, 50.0, &lanes[..1]);
    coasting_vehicle(&mut sim, 1, 0.0, 52.0, &lanes[..1]);
    // ...while a third vehicle finishes its route on the second.
    coasting_vehicle(&mut sim, 2, 15.0, 99.0, &lanes[1..]);
    let mut ctl = controller(1);

    let outcome = sim.run(&mut ctl).unwrap();
    assert_eq!(outcome.reason, TerminationReason::VehicleGoal);
    assert_eq!(outcome.steps, 1);
}

#[test]
fn running_a_red_signal_is_recorded() {
    let mut sim = empty_sim(300);
    let signal = sim
        .add_signal(&SignalAttributes {
            number: 0,
            offset: 0.0,
            // Red for the whole cycle.
            durations: vec![0.0, 0.0, 10.0, 0.0],
        })
        .unwrap();
    let from = sim.add_intersection(&IntersectionAttributes {
        number: 0,
        place: Point2::new(0.0, 0.0),
        signal: None,
    });
    let to = sim.add_intersection(&IntersectionAttributes {
        number: 1,
        place: Point2::new(100.0, 0.0),
        signal: Some(signal),
    });
    let lane = sim
        .add_lane(&LaneAttributes {
            number: 0,
            length: 100.0,
            from,
            to,
        })
        .unwrap();
    let veh = coasting_vehicle(&mut sim, 0, 15.0, 98.0, &[lane]);
    let mut ctl = controller(1);

    let outcome = sim.run(&mut ctl).unwrap();
    assert_eq!(outcome.reason, TerminationReason::VehicleGoal);
    assert!(sim.get_vehicle(veh).ignored_signal());
    let rows = sim.log().rows(0);
    assert!(rows.last().unwrap().ignored_signal);
    // The pre-crossing snapshot saw the red phase ahead.
    let pre = sim.get_vehicle(veh).snapshot(0).unwrap();
    assert_eq!(
        pre.signal,
        Some(SignalView {
            phase: SignalPhase::Red,
            remaining: 10.0,
        })
    );
}

#[test]
fn the_post_snapshot_becomes_the_next_pre_snapshot() {
    let mut sim = empty_sim(300);
    let lanes = add_chain(&mut sim, &[100.0]);
    let veh = coasting_vehicle(&mut sim, 0, 1.0, 0.0, &lanes);
    let mut ctl = controller(1);

    sim.step(&mut ctl).unwrap();
    let post = sim.get_vehicle(veh).snapshot(1).unwrap().clone();
    sim.step(&mut ctl).unwrap();
    // Tick 2's pre-recognition found tick 1's snapshot in the ring and
    // left it untouched.
    assert_eq!(sim.get_vehicle(veh).snapshot(1), Some(&post));
}
