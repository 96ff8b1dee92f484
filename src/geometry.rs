//! Grid geometry.
//!
//! The [`Grid`] owns the discretization parameters shared by every
//! grid-resident module: cell counts, cell sizes, the physical box and the
//! per-axis boundary policy. It is a small `Copy` value; each module keeps
//! its own copy, set once at construction.

use crate::{Error, Result};

/// Geometry of the 2D simulation domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    /// Physical cell counts per axis.
    pub nx: [usize; 2],
    /// Physical box size per axis.
    pub box_size: [f64; 2],
    /// Cell size per axis, `box_size / nx`.
    pub dx: [f64; 2],
    /// Periodicity per axis; open axes apply absorbing/truncating boundaries.
    pub periodic: [bool; 2],
}

impl Grid {
    /// Create a periodic grid and validate its parameters.
    ///
    /// Rejects fewer than 2 cells or a non-positive box extent on either
    /// axis.
    pub fn new(nx: [usize; 2], box_size: [f64; 2]) -> Result<Self> {
        for axis in 0..2 {
            if nx[axis] < 2 {
                return Err(Error::Config(format!(
                    "nx[{axis}] = {} but at least 2 cells are required",
                    nx[axis]
                )));
            }
            if !(box_size[axis] > 0.0) {
                return Err(Error::Config(format!(
                    "box[{axis}] = {} but the box extent must be positive",
                    box_size[axis]
                )));
            }
        }
        let dx = [box_size[0] / nx[0] as f64, box_size[1] / nx[1] as f64];
        Ok(Self {
            nx,
            box_size,
            dx,
            periodic: [true, true],
        })
    }

    /// Courant limit for the explicit field solver, `min(dx)` with `c = 1`.
    pub fn courant_limit(&self) -> f64 {
        self.dx[0].min(self.dx[1])
    }

    /// Check a timestep against the Courant condition.
    pub fn check_dt(&self, dt: f64) -> Result<()> {
        if !(dt > 0.0) {
            return Err(Error::Config(format!("dt = {dt} but must be positive")));
        }
        if dt >= self.courant_limit() {
            return Err(Error::Config(format!(
                "dt = {dt} violates the Courant condition (limit {})",
                self.courant_limit()
            )));
        }
        Ok(())
    }

    /// Physical x coordinate of the center of cell `i` on the given axis.
    #[inline]
    pub fn cell_center(&self, i: i64, axis: usize) -> f64 {
        (i as f64 + 0.5) * self.dx[axis]
    }
}
