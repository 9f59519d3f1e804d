use serde::{Deserialize, Serialize};

/// State of a single board cell.
///
/// Serialized as its integer discriminant so clients can render boards as
/// plain number grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CellState {
    Empty = 0,
    Ship = 1,
    Hit = 2,
    Miss = 3,
}

impl CellState {
    /// Hit and Miss are never overwritten.
    pub fn is_resolved(self) -> bool {
        matches!(self, CellState::Hit | CellState::Miss)
    }
}

impl From<CellState> for u8 {
    fn from(cell: CellState) -> Self {
        cell as u8
    }
}

impl TryFrom<u8> for CellState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CellState::Empty),
            1 => Ok(CellState::Ship),
            2 => Ok(CellState::Hit),
            3 => Ok(CellState::Miss),
            other => Err(format!("invalid cell state {other}")),
        }
    }
}

/// Board coordinate as sent by clients. Signed so that negative input is
/// reported as out of bounds instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Square grid of cells, indexed `[x][y]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board(Vec<Vec<CellState>>);

impl Board {
    pub fn new(size: usize) -> Self {
        Self(vec![vec![CellState::Empty; size]; size])
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn in_bounds(&self, p: Point) -> bool {
        self.index(p).is_some()
    }

    pub fn cell(&self, p: Point) -> Option<CellState> {
        self.index(p).map(|(x, y)| self.0[x][y])
    }

    /// Overwrites a cell. Callers are responsible for transition legality.
    pub(crate) fn set(&mut self, p: Point, state: CellState) -> bool {
        match self.index(p) {
            Some((x, y)) => {
                self.0[x][y] = state;
                true
            }
            None => false,
        }
    }

    pub fn count(&self, state: CellState) -> usize {
        self.0
            .iter()
            .flat_map(|row| row.iter())
            .filter(|c| **c == state)
            .count()
    }

    /// Copy of the board as an opponent sees it: ships not yet hit read as Empty.
    pub fn masked(&self) -> Board {
        Board(
            self.0
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|c| match c {
                            CellState::Ship => CellState::Empty,
                            other => *other,
                        })
                        .collect()
                })
                .collect(),
        )
    }

    pub fn rows(&self) -> &[Vec<CellState>] {
        &self.0
    }

    fn index(&self, p: Point) -> Option<(usize, usize)> {
        let x = usize::try_from(p.x).ok()?;
        let y = usize::try_from(p.y).ok()?;
        let size = self.size();
        (x < size && y < size).then_some((x, y))
    }
}
