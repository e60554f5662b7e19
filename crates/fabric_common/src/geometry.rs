//! Grid geometry: positions, channel dimensions, directions and orientations.
//!
//! Every routing structure in the fabric is addressed on an integer grid. A
//! tile at `(x, y)` owns the horizontal (X) routing channel directly north of
//! it and the vertical (Y) routing channel directly east of it; the switch box
//! at `(x, y)` sits at the north-east corner of the tile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// An integer `(x, y)` grid coordinate.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// The X coordinate.
    pub x: i32,
    /// The Y coordinate.
    pub y: i32,
}

impl Position {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    /// Creates a new position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Position {
    fn sub_assign(&mut self, rhs: Position) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position::new(-self.x, -self.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The dimension of a routing channel or segment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    /// Horizontal.
    X,
    /// Vertical.
    Y,
}

impl Dimension {
    /// Returns the perpendicular dimension.
    pub fn perpendicular(self) -> Dimension {
        match self {
            Dimension::X => Dimension::Y,
            Dimension::Y => Dimension::X,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::X => write!(f, "horizontal"),
            Dimension::Y => write!(f, "vertical"),
        }
    }
}

/// Direction along a dimension.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards increasing coordinates.
    Inc,
    /// Towards decreasing coordinates.
    Dec,
}

impl Direction {
    /// Both directions, increasing first.
    pub const ALL: [Direction; 2] = [Direction::Inc, Direction::Dec];

    /// Returns the opposite direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Inc => Direction::Dec,
            Direction::Dec => Direction::Inc,
        }
    }
}

/// Orientation on the grid.
///
/// `Auto` is a placeholder meaning "determined by context"; it only carries
/// meaning for IO block ports and is rejected wherever a concrete side is
/// required.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Increasing Y.
    North,
    /// Increasing X.
    East,
    /// Decreasing Y.
    South,
    /// Decreasing X.
    West,
    /// Context-dependent.
    Auto,
}

impl Orientation {
    /// The four concrete orientations in north, east, south, west order.
    pub const ALL: [Orientation; 4] = [
        Orientation::North,
        Orientation::East,
        Orientation::South,
        Orientation::West,
    ];

    /// Returns the dimension of this orientation, or `None` for `Auto`.
    pub fn dimension(self) -> Option<Dimension> {
        match self {
            Orientation::North | Orientation::South => Some(Dimension::Y),
            Orientation::East | Orientation::West => Some(Dimension::X),
            Orientation::Auto => None,
        }
    }

    /// Returns the direction of this orientation, or `None` for `Auto`.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Orientation::North | Orientation::East => Some(Direction::Inc),
            Orientation::South | Orientation::West => Some(Direction::Dec),
            Orientation::Auto => None,
        }
    }

    /// Returns the opposite orientation. `Auto` is its own opposite.
    pub fn opposite(self) -> Orientation {
        match self {
            Orientation::North => Orientation::South,
            Orientation::East => Orientation::West,
            Orientation::South => Orientation::North,
            Orientation::West => Orientation::East,
            Orientation::Auto => Orientation::Auto,
        }
    }

    /// Composes a dimension and a direction into a concrete orientation.
    pub fn compose(dimension: Dimension, direction: Direction) -> Orientation {
        match (dimension, direction) {
            (Dimension::X, Direction::Inc) => Orientation::East,
            (Dimension::X, Direction::Dec) => Orientation::West,
            (Dimension::Y, Direction::Inc) => Orientation::North,
            (Dimension::Y, Direction::Dec) => Orientation::South,
        }
    }

    /// Returns `true` for `Auto`.
    pub fn is_auto(self) -> bool {
        self == Orientation::Auto
    }

    /// Returns the offset of `n` grid steps in this orientation.
    ///
    /// `Auto` does not move.
    pub fn step(self, n: i32) -> Position {
        match self {
            Orientation::North => Position::new(0, n),
            Orientation::East => Position::new(n, 0),
            Orientation::South => Position::new(0, -n),
            Orientation::West => Position::new(-n, 0),
            Orientation::Auto => Position::ORIGIN,
        }
    }

    /// Returns the lowercase single-letter tag used in generated names.
    pub fn initial(self) -> char {
        match self {
            Orientation::North => 'n',
            Orientation::East => 'e',
            Orientation::South => 's',
            Orientation::West => 'w',
            Orientation::Auto => 'a',
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::North => "north",
            Orientation::East => "east",
            Orientation::South => "south",
            Orientation::West => "west",
            Orientation::Auto => "auto",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_arithmetic() {
        let a = Position::new(2, -1);
        let b = Position::new(-3, 4);
        assert_eq!(a + b, Position::new(-1, 3));
        assert_eq!(a - b, Position::new(5, -5));
        assert_eq!(-a, Position::new(-2, 1));

        let mut c = a;
        c += b;
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn position_display() {
        assert_eq!(format!("{}", Position::new(3, -2)), "(3, -2)");
    }

    #[test]
    fn compose_inverts_decompose() {
        for ori in Orientation::ALL {
            let dim = ori.dimension().unwrap();
            let dir = ori.direction().unwrap();
            assert_eq!(Orientation::compose(dim, dir), ori);
        }
    }

    #[test]
    fn opposite_is_involution() {
        for ori in Orientation::ALL {
            assert_ne!(ori.opposite(), ori);
            assert_eq!(ori.opposite().opposite(), ori);
            assert_eq!(ori.opposite().dimension(), ori.dimension());
        }
        assert_eq!(Direction::Inc.opposite(), Direction::Dec);
        assert_eq!(Dimension::X.perpendicular(), Dimension::Y);
    }

    #[test]
    fn auto_has_no_dimension() {
        assert_eq!(Orientation::Auto.dimension(), None);
        assert_eq!(Orientation::Auto.direction(), None);
        assert_eq!(Orientation::Auto.step(5), Position::ORIGIN);
    }

    #[test]
    fn step_follows_orientation() {
        assert_eq!(Orientation::North.step(2), Position::new(0, 2));
        assert_eq!(Orientation::East.step(2), Position::new(2, 0));
        assert_eq!(Orientation::South.step(2), Position::new(0, -2));
        assert_eq!(Orientation::West.step(-1), Position::new(1, 0));
    }

    #[test]
    fn orientation_serde_lowercase() {
        let json = serde_json::to_string(&Orientation::West).unwrap();
        assert_eq!(json, "\"west\"");
        let back: Orientation = serde_json::from_str("\"north\"").unwrap();
        assert_eq!(back, Orientation::North);
    }
}
