use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WallError;

/// Supported wall arrangements. Always square: `rows * cols == slots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum GridSize {
    Single,
    Quad,
    Nine,
    Sixteen,
}

impl GridSize {
    pub const ALL: [GridSize; 4] = [
        GridSize::Single,
        GridSize::Quad,
        GridSize::Nine,
        GridSize::Sixteen,
    ];

    pub fn slots(self) -> usize {
        let side = self.side();
        side * side
    }

    pub fn rows(self) -> usize {
        self.side()
    }

    pub fn cols(self) -> usize {
        self.side()
    }

    fn side(self) -> usize {
        match self {
            GridSize::Single => 1,
            GridSize::Quad => 2,
            GridSize::Nine => 3,
            GridSize::Sixteen => 4,
        }
    }

    /// "2x2" style label used by the layout selector.
    pub fn label(self) -> String {
        format!("{}x{}", self.rows(), self.cols())
    }

    /// Row-major (row, col) of a slot, `None` past the end of the grid.
    pub fn position(self, index: usize) -> Option<(usize, usize)> {
        (index < self.slots()).then(|| (index / self.cols(), index % self.cols()))
    }
}

impl Default for GridSize {
    fn default() -> Self {
        GridSize::Quad
    }
}

impl TryFrom<usize> for GridSize {
    type Error = WallError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        GridSize::ALL
            .into_iter()
            .find(|size| size.slots() == value)
            .ok_or_else(|| WallError::invalid("grid size", value))
    }
}

impl From<GridSize> for usize {
    fn from(value: GridSize) -> Self {
        value.slots()
    }
}

impl FromStr for GridSize {
    type Err = WallError;

    /// Accepts a slot count ("9") or a label ("3x3").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(slots) = s.parse::<usize>() {
            return GridSize::try_from(slots);
        }
        GridSize::ALL
            .into_iter()
            .find(|size| size.label() == s)
            .ok_or_else(|| WallError::invalid("grid size", s))
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slots())
    }
}
