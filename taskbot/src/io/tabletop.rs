//! Simulated table-top workspace.
//!
//! The layout is described by a [`SceneConfig`] and rebuilt on every
//! [`Environment::reset`]: border walls first, then cleared regions, then
//! obstacle regions. Objects are points on the grid; a held object travels
//! with the end-effector.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::grid::{Cell, OccupancyGrid};
use crate::core::locations::target_cell;
use crate::io::env::{Environment, GRASP_RADIUS};

/// Half-open rectangle `x0 <= x < x1`, `y0 <= y < y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x0: i32,
    pub x1: i32,
    pub y0: i32,
    pub y1: i32,
}

impl Region {
    pub const fn new(x0: i32, x1: i32, y0: i32, y1: i32) -> Self {
        Self { x0, x1, y0, y1 }
    }

    fn apply(&self, grid: &mut OccupancyGrid, blocked: bool) {
        grid.fill_rect(self.x0, self.x1, self.y0, self.y1, blocked);
    }
}

/// Scene layout (TOML `[scene]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SceneConfig {
    pub width: usize,
    pub height: usize,
    /// Block the outermost ring of cells.
    pub walls: bool,
    /// End-effector cell after reset.
    pub start: Cell,
    /// Regions forced free after walls are drawn.
    pub clear: Vec<Region>,
    /// Regions blocked last; they override `clear`.
    pub obstacles: Vec<Region>,
    /// Initial object cells by name.
    pub objects: BTreeMap<String, Cell>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: 60,
            height: 60,
            walls: true,
            start: Cell::new(5, 5),
            clear: vec![Region::new(45, 55, 5, 15)],
            obstacles: vec![Region::new(25, 30, 25, 35)],
            objects: BTreeMap::from([
                ("blue_block".to_string(), Cell::new(35, 40)),
                ("red_mug".to_string(), Cell::new(20, 20)),
            ]),
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width < 2 || self.height < 2 {
            return Err(anyhow!(
                "scene must be at least 2x2, got {}x{}",
                self.width,
                self.height
            ));
        }
        let in_bounds = |cell: Cell| {
            usize::try_from(cell.x).is_ok_and(|x| x < self.width)
                && usize::try_from(cell.y).is_ok_and(|y| y < self.height)
        };
        if !in_bounds(self.start) {
            return Err(anyhow!(
                "scene.start ({}, {}) is outside the workspace",
                self.start.x,
                self.start.y
            ));
        }
        for region in self.clear.iter().chain(&self.obstacles) {
            if region.x0 >= region.x1 || region.y0 >= region.y1 {
                return Err(anyhow!("scene region {region:?} is empty"));
            }
        }
        for (name, cell) in &self.objects {
            if name.trim().is_empty() {
                return Err(anyhow!("scene object names must be non-empty"));
            }
            if !in_bounds(*cell) {
                return Err(anyhow!(
                    "scene object '{name}' at ({}, {}) is outside the workspace",
                    cell.x,
                    cell.y
                ));
            }
        }
        Ok(())
    }

    /// Occupancy grid for this layout.
    pub fn build_grid(&self) -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(self.width, self.height);
        if self.walls {
            grid.wall_borders();
        }
        for region in &self.clear {
            region.apply(&mut grid, false);
        }
        for region in &self.obstacles {
            region.apply(&mut grid, true);
        }
        grid
    }
}

/// Grid-based table-top simulator.
#[derive(Debug, Clone)]
pub struct TableTopSim {
    scene: SceneConfig,
    grid: OccupancyGrid,
    objects: BTreeMap<String, Cell>,
    gripper: Cell,
    held: Option<String>,
}

impl Default for TableTopSim {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl TableTopSim {
    /// Build a simulator already reset to `scene`.
    pub fn new(scene: SceneConfig) -> Self {
        let mut sim = Self {
            grid: scene.build_grid(),
            objects: scene.objects.clone(),
            gripper: scene.start,
            held: None,
            scene,
        };
        sim.reset();
        sim
    }

    /// Name of the held object, if any.
    pub fn held(&self) -> Option<&str> {
        self.held.as_deref()
    }

    /// Release the held object where the end-effector is, without placing it.
    pub fn detach(&mut self) {
        if let Some(name) = self.held.take() {
            self.objects.insert(name.clone(), self.gripper);
            debug!(object = %name, "detached");
        }
    }
}

impl Environment for TableTopSim {
    fn reset(&mut self) {
        self.grid = self.scene.build_grid();
        self.objects = self.scene.objects.clone();
        self.gripper = self.scene.start;
        self.held = None;
        info!(
            width = self.grid.width(),
            height = self.grid.height(),
            obstacles = self.grid.obstacle_count(),
            "scene reset"
        );
    }

    fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    fn perceive(&self, object: &str) -> Option<Cell> {
        if self.held.as_deref() == Some(object) {
            return Some(self.gripper);
        }
        self.objects.get(object).copied()
    }

    fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    fn gripper(&self) -> Cell {
        self.gripper
    }

    fn set_gripper(&mut self, cell: Cell) {
        if self.grid.is_blocked(cell) {
            warn!(x = cell.x, y = cell.y, "refusing to move gripper into blocked cell");
            return;
        }
        self.gripper = cell;
    }

    fn grasp(&mut self, object: &str) -> bool {
        if let Some(held) = &self.held {
            return held == object;
        }
        let Some(cell) = self.objects.get(object).copied() else {
            debug!(object, "grasp of unknown object");
            return false;
        };
        if self.gripper.distance(cell) > GRASP_RADIUS {
            debug!(
                object,
                distance = self.gripper.distance(cell),
                "object out of reach"
            );
            return false;
        }
        self.held = Some(object.to_string());
        debug!(object, "grasped");
        true
    }

    fn place(&mut self, location: &str) -> bool {
        let Some(name) = self.held.clone() else {
            debug!(location, "place with empty gripper");
            return false;
        };
        let target = target_cell(location);
        if self.grid.is_blocked(target) {
            warn!(location, x = target.x, y = target.y, "place target is blocked");
            return false;
        }
        self.objects.insert(name.clone(), target);
        self.held = None;
        debug!(object = %name, location, "placed");
        true
    }
}
