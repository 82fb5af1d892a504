// Grid coordinates and facing directions.

use std::fmt;
use std::str::FromStr;

/// A cell on the playfield grid. Both axes run from 0 to the boundary inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Moves one cell towards `direction`.
    ///
    /// A step that would leave `[0, boundary]` on its axis is dropped, so the
    /// position stays where it is instead of wrapping.
    pub fn stepped(self, direction: Direction, boundary: i32) -> Self {
        let mut next = self;
        match direction {
            Direction::Up if next.y > 0 => next.y -= 1,
            Direction::Down if next.y < boundary => next.y += 1,
            Direction::Left if next.x > 0 => next.x -= 1,
            Direction::Right if next.x < boundary => next.x += 1,
            _ => {}
        }
        next
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X: {} Y: {}", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Wire token for this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a token is not one of the four direction names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            "LEFT" => Ok(Direction::Left),
            "RIGHT" => Ok(Direction::Right),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}
