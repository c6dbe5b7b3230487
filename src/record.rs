//! Episode logging.
//!
//! Rows accumulate in memory during an episode and are flushed to one
//! CSV file per vehicle at episode end, gated by the configured log
//! interval so that long training runs only persist every Nth episode.

use crate::error::SimResult;
use crate::perception::{Perception, NO_LEAD_GAP};
use std::collections::BTreeMap;
use std::path::Path;

/// One per-vehicle, per-tick log row.
#[derive(Clone, Debug)]
pub struct VehicleRecord {
    pub reward: f64,
    pub velocity: f64,
    pub accel: f64,
    pub jerk: f64,
    pub lead_exists: bool,
    pub lead_velocity: f64,
    pub lead_accel: f64,
    pub lead_distance: f64,
    pub distance_next_intersection: f64,
    pub ignored_signal: bool,
    /// One-hot over the four signal phases; all zero when unsignalled.
    pub signal_one_hot: [f64; 4],
    pub signal_remaining: f64,
    /// The lane's identity number, or -1 once the goal is reached.
    pub lane_number: i64,
    pub lane_place: f64,
}

impl VehicleRecord {
    /// Builds a row from a post-integration snapshot.
    pub(crate) fn new(
        post: &Perception,
        reward: f64,
        jerk: f64,
        ignored_signal: bool,
        lane_number: i64,
        lane_place: f64,
    ) -> Self {
        let (lead_exists, lead_velocity, lead_accel, lead_distance) = match post.lead {
            Some(lead) => (true, lead.velocity, lead.accel, lead.gap),
            None => (false, 0.0, 0.0, NO_LEAD_GAP),
        };
        let (signal_one_hot, signal_remaining) = match post.signal {
            Some(view) => (view.phase.one_hot(), view.remaining),
            None => ([0.0; 4], 0.0),
        };
        Self {
            reward,
            velocity: post.velocity,
            accel: post.accel,
            jerk,
            lead_exists,
            lead_velocity,
            lead_accel,
            lead_distance,
            distance_next_intersection: post.distance_next_intersection,
            ignored_signal,
            signal_one_hot,
            signal_remaining,
            lane_number,
            lane_place,
        }
    }
}

/// The in-memory log of one episode.
pub struct EpisodeLog {
    episode: u32,
    interval: u32,
    rows: BTreeMap<u32, Vec<VehicleRecord>>,
}

impl EpisodeLog {
    /// Creates an empty log for the given episode index.
    pub fn new(episode: u32, interval: u32) -> Self {
        Self {
            episode,
            interval,
            rows: BTreeMap::new(),
        }
    }

    /// Appends a row for the given vehicle number.
    pub(crate) fn record(&mut self, vehicle: u32, row: VehicleRecord) {
        self.rows.entry(vehicle).or_default().push(row);
    }

    /// The recorded rows for a vehicle, oldest first.
    pub fn rows(&self, vehicle: u32) -> &[VehicleRecord] {
        self.rows.get(&vehicle).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether this episode falls on the persistence interval.
    pub fn should_persist(&self) -> bool {
        self.interval > 0 && self.episode % self.interval == 0
    }

    /// Writes one CSV file per vehicle under
    /// `<dir>/episode_<n>/vehicle/number_<v>.csv`.
    ///
    /// Episodes off the persistence interval flush nothing.
    pub fn flush(&self, dir: &Path) -> SimResult<()> {
        if !self.should_persist() {
            return Ok(());
        }
        let vehicle_dir = dir
            .join(format!("episode_{:04}", self.episode))
            .join("vehicle");
        std::fs::create_dir_all(&vehicle_dir)?;

        for (vehicle, rows) in &self.rows {
            let path = vehicle_dir.join(format!("number_{vehicle}.csv"));
            let mut writer = csv::Writer::from_path(path)?;
            writer.write_record([
                "reward",
                "velocity",
                "accel",
                "jerk",
                "lead_exists",
                "lead_velocity",
                "lead_accel",
                "lead_distance",
                "distance_next_intersection",
                "ignored_signal",
                "signal_green",
                "signal_amber_to_red",
                "signal_red",
                "signal_amber_to_green",
                "signal_remaining",
                "lane_number",
                "lane_place",
            ])?;
            for row in rows {
                writer.write_record(&[
                    format!("{:.3}", row.reward),
                    format!("{:.2}", row.velocity),
                    format!("{:.2}", row.accel),
                    format!("{:.2}", row.jerk),
                    (row.lead_exists as u8).to_string(),
                    format!("{:.2}", row.lead_velocity),
                    format!("{:.2}", row.lead_accel),
                    format!("{:.2}", row.lead_distance),
                    format!("{:.2}", row.distance_next_intersection),
                    (row.ignored_signal as u8).to_string(),
                    format!("{}", row.signal_one_hot[0]),
                    format!("{}", row.signal_one_hot[1]),
                    format!("{}", row.signal_one_hot[2]),
                    format!("{}", row.signal_one_hot[3]),
                    format!("{:.3}", row.signal_remaining),
                    row.lane_number.to_string(),
                    format!("{:.2}", row.lane_place),
                ])?;
            }
            writer.flush()?;
        }
        log::info!(
            "episode {}: wrote logs for {} vehicles",
            self.episode,
            self.rows.len()
        );
        Ok(())
    }
}
