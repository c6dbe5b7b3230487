//! Intersections on the road grid.

use crate::error::{InvariantKind, SimResult};
use crate::{IntersectionId, SignalId};
use cgmath::Point2;

/// A node of the road network, placed on a rectilinear grid.
pub struct Intersection {
    /// The intersection's ID.
    id: IntersectionId,
    /// User-facing identity number, used in configuration and logs.
    number: u32,
    /// Grid coordinates in m.
    place: Point2<f64>,
    /// The signal governing entry, if any.
    signal: Option<SignalId>,
}

/// The attributes of an intersection.
pub struct IntersectionAttributes {
    /// User-facing identity number.
    pub number: u32,
    /// Grid coordinates in m.
    pub place: Point2<f64>,
    /// The signal governing entry, if any.
    pub signal: Option<SignalId>,
}

impl Intersection {
    /// Creates a new intersection.
    pub(crate) fn new(id: IntersectionId, attribs: &IntersectionAttributes) -> Self {
        Self {
            id,
            number: attribs.number,
            place: attribs.place,
            signal: attribs.signal,
        }
    }

    /// Gets the intersection's ID.
    pub fn id(&self) -> IntersectionId {
        self.id
    }

    /// Gets the intersection's identity number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Gets the intersection's grid coordinates.
    pub fn place(&self) -> Point2<f64> {
        self.place
    }

    /// Gets the signal governing entry into this intersection, if any.
    pub fn signal(&self) -> Option<SignalId> {
        self.signal
    }

    /// Computes the distance to another intersection along the grid.
    ///
    /// Connected intersections differ along exactly one axis; a query on a
    /// pair that is not grid-aligned is an invariant violation.
    pub fn grid_distance(&self, other: &Intersection) -> SimResult<f64> {
        if self.place.x == other.place.x {
            Ok((self.place.y - other.place.y).abs())
        } else if self.place.y == other.place.y {
            Ok((self.place.x - other.place.x).abs())
        } else {
            Err(InvariantKind::NotGridAligned {
                a: self.number,
                b: other.number,
            }
            .into())
        }
    }
}
