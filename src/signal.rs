//! Traffic signals with a fixed four-phase cycle.

use crate::error::{InvariantKind, SimResult};
use crate::SignalId;

/// The phase of a signal cycle, in cyclic order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalPhase {
    /// Vehicles may enter the intersection.
    Green,
    /// Transitioning towards red; entering is still permitted.
    AmberToRed,
    /// Vehicles must stop.
    Red,
    /// Transitioning towards green; entering is not yet permitted.
    AmberToGreen,
}

impl SignalPhase {
    const ALL: [SignalPhase; 4] = [
        SignalPhase::Green,
        SignalPhase::AmberToRed,
        SignalPhase::Red,
        SignalPhase::AmberToGreen,
    ];

    /// Whether a vehicle crossing the stop line in this phase is running the signal.
    pub fn forbids_entry(self) -> bool {
        matches!(self, SignalPhase::Red | SignalPhase::AmberToGreen)
    }

    /// One-hot encoding over the four phases, in cycle order.
    pub fn one_hot(self) -> [f64; 4] {
        let mut enc = [0.0; 4];
        enc[self as usize] = 1.0;
        enc
    }
}

/// A signal governing entry into an intersection.
///
/// The active phase is a pure function of elapsed simulated time modulo
/// the cycle length. The modular arithmetic is done in integer
/// milliseconds so that phase boundaries are exact.
pub struct Signal {
    /// The signal's ID.
    id: SignalId,
    /// User-facing identity number, used in configuration and logs.
    number: u32,
    /// The four phase durations in ms, in cycle order starting at green.
    durations_ms: [u64; 4],
    /// The cycle length in ms.
    cycle_ms: u64,
    /// Offset added to the elapsed time, in seconds.
    offset: f64,
    /// The currently active phase.
    phase: SignalPhase,
    /// Seconds remaining in the active phase.
    remaining: f64,
}

/// The attributes of a signal.
pub struct SignalAttributes {
    /// User-facing identity number.
    pub number: u32,
    /// Phase offset at time zero, in seconds.
    pub offset: f64,
    /// The phase durations in seconds; must contain exactly four entries.
    pub durations: Vec<f64>,
}

impl Signal {
    /// Creates a new signal and initialises it to time zero.
    pub(crate) fn new(id: SignalId, attribs: &SignalAttributes) -> SimResult<Self> {
        let durations: [f64; 4] =
            attribs
                .durations
                .as_slice()
                .try_into()
                .map_err(|_| InvariantKind::PhaseCount {
                    number: attribs.number,
                    count: attribs.durations.len(),
                })?;
        let durations_ms = durations.map(|d| (d.max(0.0) * 1000.0).round() as u64);
        let cycle_ms = durations_ms.iter().sum();
        if cycle_ms == 0 {
            return Err(InvariantKind::ZeroCycle(attribs.number).into());
        }
        let mut signal = Self {
            id,
            number: attribs.number,
            durations_ms,
            cycle_ms,
            offset: attribs.offset,
            phase: SignalPhase::Green,
            remaining: 0.0,
        };
        signal.update(0.0);
        Ok(signal)
    }

    /// Gets the signal's ID.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Gets the signal's identity number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The active phase as of the last update.
    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    /// Seconds remaining in the active phase as of the last update.
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    /// Computes the active phase and the seconds remaining in it at `now`.
    ///
    /// Pure; `update` caches its result on the signal.
    pub fn phase_at(&self, now: f64) -> (SignalPhase, f64) {
        let elapsed_ms = ((self.offset + now) * 1000.0).round() as u64 % self.cycle_ms;
        let mut sum = 0;
        for (phase, duration_ms) in SignalPhase::ALL.into_iter().zip(self.durations_ms) {
            sum += duration_ms;
            if sum > elapsed_ms {
                return (phase, (sum - elapsed_ms) as f64 / 1000.0);
            }
        }
        // elapsed_ms < cycle_ms = sum of durations, so the loop always returns.
        unreachable!()
    }

    /// Recomputes the active phase for the given elapsed simulated time.
    pub(crate) fn update(&mut self, now: f64) {
        let (phase, remaining) = self.phase_at(now);
        self.phase = phase;
        self.remaining = remaining;
    }
}
