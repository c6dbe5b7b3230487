//! Crate-wide error types.
//!
//! Invariant violations indicate a topology or bookkeeping bug that would
//! corrupt subsequent reward computation, so they are never recovered:
//! they propagate with `?` to the episode driver, which reports and aborts.
//! A collision, by contrast, is a data condition folded into reward and
//! termination, not an error.

use thiserror::Error;

/// The top-level error type of the simulator.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantKind),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("scenario parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log write error: {0}")]
    Csv(#[from] csv::Error),
}

/// The internal invariants the simulator checks as it runs.
#[derive(Debug, Error)]
pub enum InvariantKind {
    #[error("vehicle {vehicle} is not on the roster of lane {lane}")]
    VehicleNotOnLane { vehicle: u32, lane: u32 },

    #[error("intersections {a} and {b} are not aligned on a grid axis")]
    NotGridAligned { a: u32, b: u32 },

    #[error("vehicle {0} queried for its lane position after reaching its goal")]
    PositionAfterGoal(u32),

    #[error("signal {number} was given {count} phase durations, expected 4")]
    PhaseCount { number: u32, count: usize },

    #[error("signal {0} has a zero-length cycle")]
    ZeroCycle(u32),

    #[error("no perception snapshot for vehicle {vehicle} at tick {tick}")]
    MissingSnapshot { vehicle: u32, tick: u64 },

    #[error("vehicle {0} has an empty route")]
    EmptyRoute(u32),
}

/// Shorthand result type used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;
