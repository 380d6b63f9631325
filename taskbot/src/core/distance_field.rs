//! Euclidean distance field over an occupancy grid and its gradient.
//!
//! Distances are exact: the squared transform is computed separably with the
//! lower-envelope-of-parabolas method (one pass along `y`, one along `x`).

use crate::core::grid::{Cell, OccupancyGrid};

/// Per-cell distance to the nearest obstacle, with its spatial gradient.
#[derive(Debug, Clone)]
pub struct DistanceField {
    width: usize,
    height: usize,
    dist: Vec<f64>,
    grad_x: Vec<f64>,
    grad_y: Vec<f64>,
}

impl DistanceField {
    /// Compute the field for `grid`.
    ///
    /// Obstacle cells have distance 0. A grid without obstacles gets the grid
    /// diagonal length everywhere. The gradient uses central differences in
    /// the interior and one-sided differences on the border; an axis with a
    /// single cell has a zero gradient along it.
    pub fn compute(grid: &OccupancyGrid) -> Self {
        let (width, height) = (grid.width(), grid.height());
        let mut sq = vec![f64::INFINITY; width * height];
        for y in 0..height {
            for x in 0..width {
                if grid.blocked_at(x, y) {
                    sq[y * width + x] = 0.0;
                }
            }
        }

        let mut line_in = Vec::with_capacity(width.max(height));
        let mut line_out = vec![0.0; width.max(height)];

        for x in 0..width {
            line_in.clear();
            line_in.extend((0..height).map(|y| sq[y * width + x]));
            squared_edt_1d(&line_in, &mut line_out[..height]);
            for y in 0..height {
                sq[y * width + x] = line_out[y];
            }
        }
        for y in 0..height {
            line_in.clear();
            line_in.extend_from_slice(&sq[y * width..(y + 1) * width]);
            squared_edt_1d(&line_in, &mut line_out[..width]);
            sq[y * width..(y + 1) * width].copy_from_slice(&line_out[..width]);
        }

        let unbounded = (width as f64).hypot(height as f64);
        let dist: Vec<f64> = sq
            .into_iter()
            .map(|v| if v.is_finite() { v.sqrt() } else { unbounded })
            .collect();

        let mut grad_x = vec![0.0; width * height];
        let mut grad_y = vec![0.0; width * height];
        for y in 0..height {
            for x in 0..width {
                let at = |xx: usize, yy: usize| dist[yy * width + xx];
                grad_x[y * width + x] = axis_difference(width, x, |i| at(i, y));
                grad_y[y * width + x] = axis_difference(height, y, |i| at(x, i));
            }
        }

        Self {
            width,
            height,
            dist,
            grad_x,
            grad_y,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Distance at `cell` after clamping it into bounds.
    pub fn distance(&self, cell: Cell) -> f64 {
        self.dist[self.clamped_index(cell)]
    }

    /// `(d/dx, d/dy)` at `cell` after clamping it into bounds.
    pub fn gradient(&self, cell: Cell) -> (f64, f64) {
        let idx = self.clamped_index(cell);
        (self.grad_x[idx], self.grad_y[idx])
    }

    fn clamped_index(&self, cell: Cell) -> usize {
        let x = clamp_axis(cell.x, self.width);
        let y = clamp_axis(cell.y, self.height);
        y * self.width + x
    }
}

fn clamp_axis(value: i32, len: usize) -> usize {
    let max = len.saturating_sub(1);
    usize::try_from(value).map_or(0, |v| v.min(max))
}

/// First-order finite difference of `f` at `i` along an axis of length `len`.
fn axis_difference(len: usize, i: usize, f: impl Fn(usize) -> f64) -> f64 {
    if len < 2 {
        return 0.0;
    }
    if i == 0 {
        f(1) - f(0)
    } else if i == len - 1 {
        f(i) - f(i - 1)
    } else {
        (f(i + 1) - f(i - 1)) / 2.0
    }
}

/// Squared distance transform of a sampled function along one line.
///
/// `f[q]` is `0` at sites and `+inf` elsewhere after the first pass, or a
/// squared distance from the previous pass. Infinite samples never become
/// envelope parabolas, so a line with no finite samples stays infinite.
fn squared_edt_1d(f: &[f64], out: &mut [f64]) {
    let mut sites: Vec<usize> = Vec::with_capacity(f.len());
    let mut bounds: Vec<f64> = Vec::with_capacity(f.len());

    for (q, &fq) in f.iter().enumerate() {
        if !fq.is_finite() {
            continue;
        }
        let qf = q as f64;
        while let Some(&p) = sites.last() {
            let pf = p as f64;
            let s = ((fq + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf);
            if s <= bounds[bounds.len() - 1] {
                sites.pop();
                bounds.pop();
            } else {
                sites.push(q);
                bounds.push(s);
                break;
            }
        }
        if sites.is_empty() {
            sites.push(q);
            bounds.push(f64::NEG_INFINITY);
        }
    }

    if sites.is_empty() {
        out.fill(f64::INFINITY);
        return;
    }

    let mut k = 0;
    for (q, slot) in out.iter_mut().enumerate() {
        let qf = q as f64;
        while k + 1 < sites.len() && bounds[k + 1] < qf {
            k += 1;
        }
        let d = qf - sites[k] as f64;
        *slot = d * d + f[sites[k]];
    }
}
