//! Occupancy grid and coordinate types shared by the planners.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer grid cell. Ordering is lexicographic on `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn distance(self, other: Cell) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        dx.hypot(dy)
    }

    /// The four axis-aligned neighbours, in `+x, -x, +y, -y` order.
    pub fn neighbors(self) -> [Cell; 4] {
        [
            Cell::new(self.x + 1, self.y),
            Cell::new(self.x - 1, self.y),
            Cell::new(self.x, self.y + 1),
            Cell::new(self.x, self.y - 1),
        ]
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<Cell> for Point {
    fn from(cell: Cell) -> Self {
        Point::new(f64::from(cell.x), f64::from(cell.y))
    }
}

/// Real-valued point in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Nearest cell, rounding halves to even.
    pub fn to_cell(self) -> Cell {
        Cell::new(round_to_i32(self.x), round_to_i32(self.y))
    }
}

fn round_to_i32(value: f64) -> i32 {
    let rounded = value.round_ties_even();
    if rounded >= f64::from(i32::MAX) {
        i32::MAX
    } else if rounded <= f64::from(i32::MIN) {
        i32::MIN
    } else {
        rounded as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid has {actual} cells but {width}x{height} needs {expected}")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error("grid row {row} has {actual} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Boolean occupancy field, `true` marks an obstacle.
///
/// Storage is row-major with `y` selecting the row, so `(x, y)` lives at
/// `y * width + x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// Create a grid with every cell free.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    pub fn from_cells(width: usize, height: usize, cells: Vec<bool>) -> Result<Self, GridError> {
        let expected = width * height;
        if cells.len() != expected {
            return Err(GridError::SizeMismatch {
                width,
                height,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Build a grid from rows indexed by `y`; every row must have the same length.
    pub fn from_rows(rows: &[Vec<bool>]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(width * height);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != width {
                return Err(GridError::RaggedRow {
                    row,
                    expected: width,
                    actual: values.len(),
                });
            }
            cells.extend_from_slice(values);
        }
        Self::from_cells(width, height, cells)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Out-of-bounds cells count as blocked.
    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.index(cell).is_none_or(|idx| self.cells[idx])
    }

    pub fn is_free(&self, cell: Cell) -> bool {
        !self.is_blocked(cell)
    }

    /// Set a single cell; out-of-bounds cells are ignored.
    pub fn set(&mut self, cell: Cell, blocked: bool) {
        if let Some(idx) = self.index(cell) {
            self.cells[idx] = blocked;
        }
    }

    /// Set every in-bounds cell with `x0 <= x < x1` and `y0 <= y < y1`.
    pub fn fill_rect(&mut self, x0: i32, x1: i32, y0: i32, y1: i32, blocked: bool) {
        for x in x0..x1 {
            for y in y0..y1 {
                self.set(Cell::new(x, y), blocked);
            }
        }
    }

    /// Block the outermost ring of cells.
    pub fn wall_borders(&mut self) {
        let (w, h) = (self.width as i32, self.height as i32);
        self.fill_rect(0, w, 0, 1, true);
        self.fill_rect(0, w, h - 1, h, true);
        self.fill_rect(0, 1, 0, h, true);
        self.fill_rect(w - 1, w, 0, h, true);
    }

    pub fn obstacle_count(&self) -> usize {
        self.cells.iter().filter(|blocked| **blocked).count()
    }

    pub(crate) fn index(&self, cell: Cell) -> Option<usize> {
        let x = usize::try_from(cell.x).ok()?;
        let y = usize::try_from(cell.y).ok()?;
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub(crate) fn blocked_at(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.width + x]
    }
}
