//! Test-only helpers: a recording environment and grid builders.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::core::grid::{Cell, OccupancyGrid};
use crate::core::locations::target_cell;
use crate::io::env::{Environment, GRASP_RADIUS};

/// Environment that records calls and can be told to refuse actions.
///
/// Moves into blocked cells are ignored, like the table-top simulator.
/// `calls` logs `reset`, `grasp(..)` and `place(..)` in order.
#[derive(Debug, Clone)]
pub struct ScriptedEnv {
    pub grid: OccupancyGrid,
    pub start: Cell,
    pub gripper: Cell,
    pub initial_objects: BTreeMap<String, Cell>,
    pub objects: BTreeMap<String, Cell>,
    pub holding: Option<String>,
    /// Accepted end-effector moves since the last reset.
    pub moves: Vec<Cell>,
    /// Locations where an object was released.
    pub placed: Vec<String>,
    pub calls: Vec<String>,
    pub refuse_grasp: bool,
    pub refuse_place: bool,
}

impl ScriptedEnv {
    /// Obstacle-free `width` x `height` grid with the end-effector at `start`.
    pub fn open(width: usize, height: usize, start: Cell) -> Self {
        Self::with_grid(OccupancyGrid::new(width, height), start)
    }

    pub fn with_grid(grid: OccupancyGrid, start: Cell) -> Self {
        Self {
            grid,
            start,
            gripper: start,
            initial_objects: BTreeMap::new(),
            objects: BTreeMap::new(),
            holding: None,
            moves: Vec::new(),
            placed: Vec::new(),
            calls: Vec::new(),
            refuse_grasp: false,
            refuse_place: false,
        }
    }

    pub fn with_object(mut self, name: &str, cell: Cell) -> Self {
        self.initial_objects.insert(name.to_string(), cell);
        self.objects.insert(name.to_string(), cell);
        self
    }
}

impl Environment for ScriptedEnv {
    fn reset(&mut self) {
        self.calls.push("reset".to_string());
        self.gripper = self.start;
        self.objects = self.initial_objects.clone();
        self.holding = None;
        self.moves.clear();
    }

    fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    fn perceive(&self, object: &str) -> Option<Cell> {
        if self.holding.as_deref() == Some(object) {
            return Some(self.gripper);
        }
        self.objects.get(object).copied()
    }

    fn is_holding(&self) -> bool {
        self.holding.is_some()
    }

    fn gripper(&self) -> Cell {
        self.gripper
    }

    fn set_gripper(&mut self, cell: Cell) {
        if self.grid.is_free(cell) {
            self.gripper = cell;
            self.moves.push(cell);
        }
    }

    fn grasp(&mut self, object: &str) -> bool {
        self.calls.push(format!("grasp({object})"));
        if self.refuse_grasp {
            return false;
        }
        if let Some(held) = &self.holding {
            return held == object;
        }
        match self.objects.get(object) {
            Some(cell) if self.gripper.distance(*cell) <= GRASP_RADIUS => {
                self.holding = Some(object.to_string());
                true
            }
            _ => false,
        }
    }

    fn place(&mut self, location: &str) -> bool {
        self.calls.push(format!("place({location})"));
        if self.refuse_place {
            return false;
        }
        let Some(object) = self.holding.take() else {
            return false;
        };
        self.objects.insert(object, target_cell(location));
        self.placed.push(location.to_string());
        true
    }
}

/// Build a grid from text rows indexed by `y`; `#` marks an obstacle.
pub fn grid_from_ascii(rows: &[&str]) -> OccupancyGrid {
    let rows: Vec<Vec<bool>> = rows
        .iter()
        .map(|row| row.chars().map(|c| c == '#').collect())
        .collect();
    OccupancyGrid::from_rows(&rows).expect("rectangular ascii grid")
}

/// 10x10 grid whose column `x = 5` is blocked except at `y = 0` and `y = 9`.
pub fn wall_with_gaps() -> OccupancyGrid {
    let mut grid = OccupancyGrid::new(10, 10);
    grid.fill_rect(5, 6, 1, 9, true);
    grid
}

/// Temporary directory holding a `taskbot.toml` with `contents`.
pub fn config_file(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("taskbot.toml");
    std::fs::write(&path, contents).expect("write config");
    (dir, path)
}
