//! Electromagnetic field state and the Yee solver.
//!
//! E and B live on a staggered (Yee) grid with consistent curl placement:
//!
//! ```text
//! Ex(i+½, j)   Ey(i, j+½)   Ez(i, j)
//! Bx(i, j+½)   By(i+½, j)   Bz(i+½, j+½)
//! ```
//!
//! E is stored at time n+½ and B at time n. One [`Emf::advance`] performs
//! the leapfrog B half-step, E full-step (driven by the deposited current)
//! and the closing B half-step, refreshing guard cells after every
//! sub-update. Periodic axes copy from the opposite physical edge; open
//! axes apply a first-order Mur absorbing condition to the tangential
//! components; the moving-window axis zero-fills its right edge.
//!
//! An optional external-field overlay holds a frozen uniform E/B pair in a
//! separate pair of buffers; the particle-facing fields are the cell-wise
//! sum of the self-consistent and external contributions. The overlay is
//! never touched by the Yee update.

pub mod laser;

use crate::arrays::{ScalarField2D, VectorField2D, GUARD};
use crate::current::Current;
use crate::geometry::Grid;
use crate::zdf::{self, GridAxis, GridMeta};
use crate::Result;
use laser::{Laser, LaserKind};
use std::path::Path;

/// Field quantity selector for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmfQuantity {
    /// Self-consistent electric field.
    E,
    /// Self-consistent magnetic field.
    B,
    /// Particle-facing electric field (self + external).
    EPart,
    /// Particle-facing magnetic field (self + external).
    BPart,
}

/// Frozen external field overlay.
#[derive(Debug, Clone)]
struct External {
    e0: [f64; 3],
    b0: [f64; 3],
    e: VectorField2D,
    b: VectorField2D,
}

/// Particle-facing summed buffers, maintained while an overlay is active.
#[derive(Debug, Clone)]
struct PartFields {
    e: VectorField2D,
    b: VectorField2D,
}

/// Stored previous boundary values for the Mur condition: one
/// `(guard, interior)` pair per grid line crossing the boundary.
type MurLine = Vec<(f64, f64)>;

/// Electromagnetic field state.
#[derive(Debug, Clone)]
pub struct Emf {
    e: VectorField2D,
    b: VectorField2D,
    ext: Option<External>,
    part: Option<PartFields>,
    grid: Grid,
    dt: f64,
    moving_window: bool,
    /// Mur history, indexed `[axis][side][tangential component]` with
    /// components 0, 1 = tangential E and 2, 3 = tangential B.
    mur: [[[MurLine; 4]; 2]; 2],
}

impl Emf {
    /// Create zeroed fields on the given grid.
    pub fn new(grid: Grid, dt: f64) -> Self {
        let lines = |axis: usize| grid.nx[1 - axis] + 2 * GUARD;
        let mk = |axis: usize| -> [MurLine; 4] {
            [
                vec![(0.0, 0.0); lines(axis)],
                vec![(0.0, 0.0); lines(axis)],
                vec![(0.0, 0.0); lines(axis)],
                vec![(0.0, 0.0); lines(axis)],
            ]
        };
        Self {
            e: VectorField2D::new(grid.nx),
            b: VectorField2D::new(grid.nx),
            ext: None,
            part: None,
            grid,
            dt,
            moving_window: false,
            mur: [[mk(0), mk(0)], [mk(1), mk(1)]],
        }
    }

    /// Self-consistent electric field.
    pub fn e(&self) -> &VectorField2D {
        &self.e
    }

    /// Self-consistent magnetic field.
    pub fn b(&self) -> &VectorField2D {
        &self.b
    }

    /// Particle-facing electric field, including any external overlay.
    pub fn e_part(&self) -> &VectorField2D {
        match &self.part {
            Some(p) => &p.e,
            None => &self.e,
        }
    }

    /// Particle-facing magnetic field, including any external overlay.
    pub fn b_part(&self) -> &VectorField2D {
        match &self.part {
            Some(p) => &p.b,
            None => &self.b,
        }
    }

    /// Mutable access to the raw E and B buffers, for setup and tests.
    ///
    /// With an external overlay active the particle-facing sums refresh on
    /// the next [`Emf::advance`].
    pub fn fields_mut(&mut self) -> (&mut VectorField2D, &mut VectorField2D) {
        (&mut self.e, &mut self.b)
    }

    /// Switch the x axis to moving-window mode: non-periodic, right edge
    /// zero-filled.
    pub(crate) fn set_moving_window(&mut self) {
        self.grid.periodic[0] = false;
        self.moving_window = true;
    }

    /// Change the per-axis boundary policy; open axes absorb.
    pub(crate) fn set_periodic(&mut self, periodic: [bool; 2]) {
        self.grid.periodic = periodic;
        self.reset_mur_history();
    }

    /// Install a frozen uniform external field overlay.
    pub fn set_external(&mut self, e0: [f64; 3], b0: [f64; 3]) {
        let mut e = VectorField2D::new(self.grid.nx);
        let mut b = VectorField2D::new(self.grid.nx);
        e.x.fill(e0[0]);
        e.y.fill(e0[1]);
        e.z.fill(e0[2]);
        b.x.fill(b0[0]);
        b.y.fill(b0[1]);
        b.z.fill(b0[2]);
        self.ext = Some(External { e0, b0, e, b });
        self.update_part();
    }

    /// Sum a laser pulse into the fields.
    ///
    /// Pulses are injected at setup time; Gaussian pulses receive a
    /// divergence correction so the injected fields satisfy `∇·E = ∇·B = 0`.
    pub fn add_laser(&mut self, laser: &Laser) -> Result<()> {
        laser.validate()?;
        let [nx0, nx1] = self.grid.nx;
        let [dx0, dx1] = self.grid.dx;
        let amp = laser.a0 * laser.omega0;
        let (cos_pol, sin_pol) = (laser.polarization.cos(), laser.polarization.sin());
        let gaussian = matches!(laser.kind, LaserKind::Gaussian { .. });

        for j in 0..nx1 as isize {
            let y_int = j as f64 * dx1;
            let y_half = (j as f64 + 0.5) * dx1;
            for i in 0..nx0 as isize {
                let x_int = i as f64 * dx0;
                let x_half = (i as f64 + 0.5) * dx0;

                let (w_int, w_half_e, w_half_b);
                if gaussian {
                    // transverse positions differ per component
                    w_int = amp * laser.envelope(x_int) * laser.gauss_phase(x_int, y_half);
                    w_half_e = amp * laser.envelope(x_int) * laser.gauss_phase(x_int, y_int);
                    w_half_b = amp * laser.envelope(x_half) * laser.gauss_phase(x_half, y_int);
                } else {
                    let c_int = amp * laser.envelope(x_int) * laser.carrier(x_int);
                    w_int = c_int;
                    w_half_e = c_int;
                    w_half_b = amp * laser.envelope(x_half) * laser.carrier(x_half);
                }
                let w_half_bz = if gaussian {
                    amp * laser.envelope(x_half) * laser.gauss_phase(x_half, y_half)
                } else {
                    w_half_b
                };

                self.e.y.add(i, j, w_int * cos_pol);
                self.e.z.add(i, j, w_half_e * sin_pol);
                self.b.y.add(i, j, -w_half_b * sin_pol);
                self.b.z.add(i, j, w_half_bz * cos_pol);
            }
        }

        self.refresh_all_guards();
        if gaussian {
            self.divergence_correction();
            self.refresh_all_guards();
        }
        self.reset_mur_history();
        self.update_part();
        Ok(())
    }

    /// Per-component field energy, `[Ex², Ey², Ez², Bx², By², Bz²]`
    /// integrated over the physical domain.
    pub fn energy(&self) -> [f64; 6] {
        let cell = 0.5 * self.grid.dx[0] * self.grid.dx[1];
        [
            cell * self.e.x.squared_sum(),
            cell * self.e.y.squared_sum(),
            cell * self.e.z.squared_sum(),
            cell * self.b.x.squared_sum(),
            cell * self.b.y.squared_sum(),
            cell * self.b.z.squared_sum(),
        ]
    }

    /// Total field energy.
    pub fn total_energy(&self) -> f64 {
        self.energy().iter().sum()
    }

    /// Advance the fields one timestep under the deposited current.
    pub fn advance(&mut self, current: &Current) {
        let dt = self.dt;
        let dt2 = 0.5 * dt;
        self.advance_b(dt2);
        self.update_gc_b(dt2);
        self.advance_e(dt, current);
        self.update_gc_e(dt);
        self.advance_b(dt2);
        self.update_gc_b(dt2);
        self.update_part();
    }

    /// B half-step: `B ← B − Δt ∇×E`.
    fn advance_b(&mut self, dtb: f64) {
        let [nx0, nx1] = self.grid.nx;
        let (cx, cy) = (dtb / self.grid.dx[0], dtb / self.grid.dx[1]);
        for j in 0..nx1 as isize {
            for i in 0..nx0 as isize {
                let bx = self.b.x.get(i, j) - cy * (self.e.z.get(i, j + 1) - self.e.z.get(i, j));
                self.b.x.set(i, j, bx);
                let by = self.b.y.get(i, j) + cx * (self.e.z.get(i + 1, j) - self.e.z.get(i, j));
                self.b.y.set(i, j, by);
                let bz = self.b.z.get(i, j)
                    - cx * (self.e.y.get(i + 1, j) - self.e.y.get(i, j))
                    + cy * (self.e.x.get(i, j + 1) - self.e.x.get(i, j));
                self.b.z.set(i, j, bz);
            }
        }
    }

    /// E full-step: `E ← E + Δt (∇×B − J)`.
    fn advance_e(&mut self, dt: f64, current: &Current) {
        let [nx0, nx1] = self.grid.nx;
        let (cx, cy) = (dt / self.grid.dx[0], dt / self.grid.dx[1]);
        let j_fld = &current.j;
        for j in 0..nx1 as isize {
            for i in 0..nx0 as isize {
                let ex = self.e.x.get(i, j)
                    + cy * (self.b.z.get(i, j) - self.b.z.get(i, j - 1))
                    - dt * j_fld.x.get(i, j);
                self.e.x.set(i, j, ex);
                let ey = self.e.y.get(i, j)
                    - cx * (self.b.z.get(i, j) - self.b.z.get(i - 1, j))
                    - dt * j_fld.y.get(i, j);
                self.e.y.set(i, j, ey);
                let ez = self.e.z.get(i, j)
                    + cx * (self.b.y.get(i, j) - self.b.y.get(i - 1, j))
                    - cy * (self.b.x.get(i, j) - self.b.x.get(i, j - 1))
                    - dt * j_fld.z.get(i, j);
                self.e.z.set(i, j, ez);
            }
        }
    }

    /// Interpolate the particle-facing fields at an in-cell position with
    /// linear (CIC) weights at the staggered Yee offsets.
    pub fn interpolate(&self, ix: i32, iy: i32, x: f64, y: f64) -> ([f64; 3], [f64; 3]) {
        let (ef, bf) = (self.e_part(), self.b_part());
        let i = ix as isize;
        let j = iy as isize;
        let (ih, wxh) = if x < 0.5 { (i - 1, x + 0.5) } else { (i, x - 0.5) };
        let (jh, wyh) = if y < 0.5 { (j - 1, y + 0.5) } else { (j, y - 0.5) };

        let e = [
            bilinear(&ef.x, ih, j, wxh, y),
            bilinear(&ef.y, i, jh, x, wyh),
            bilinear(&ef.z, i, j, x, y),
        ];
        let b = [
            bilinear(&bf.x, i, jh, x, wyh),
            bilinear(&bf.y, ih, j, wxh, y),
            bilinear(&bf.z, ih, jh, wxh, wyh),
        ];
        (e, b)
    }

    /// Shift the fields one cell with the moving window, zeroing the newly
    /// exposed right column; an external overlay re-evaluates its values
    /// there.
    pub(crate) fn move_window(&mut self) {
        self.e.shift_left();
        self.b.shift_left();
        let nx0 = self.grid.nx[0] as isize;
        for f in [
            &mut self.e.x,
            &mut self.e.y,
            &mut self.e.z,
            &mut self.b.x,
            &mut self.b.y,
            &mut self.b.z,
        ] {
            zero_columns(f, nx0 - 1, self.grid.nx[1]);
        }
        if let Some(ext) = &mut self.ext {
            ext.e.shift_left();
            ext.b.shift_left();
            let fill = [
                (&mut ext.e.x, ext.e0[0]),
                (&mut ext.e.y, ext.e0[1]),
                (&mut ext.e.z, ext.e0[2]),
                (&mut ext.b.x, ext.b0[0]),
                (&mut ext.b.y, ext.b0[1]),
                (&mut ext.b.z, ext.b0[2]),
            ];
            for (f, v) in fill {
                fill_columns(f, nx0 - 1, self.grid.nx[1], v);
            }
        }
        self.reset_mur_history();
        self.update_part();
    }

    /// Recompute the particle-facing sums when an overlay is active.
    fn update_part(&mut self) {
        if let Some(ext) = &self.ext {
            let part = self.part.get_or_insert_with(|| PartFields {
                e: VectorField2D::new(self.grid.nx),
                b: VectorField2D::new(self.grid.nx),
            });
            part.e.clone_from(&self.e);
            part.b.clone_from(&self.b);
            part.e.accumulate(&ext.e);
            part.b.accumulate(&ext.b);
        }
    }

    /// Refresh guard cells of every component per the axis policies.
    fn refresh_all_guards(&mut self) {
        for axis in 0..2 {
            if self.grid.periodic[axis] {
                for f in [
                    &mut self.e.x,
                    &mut self.e.y,
                    &mut self.e.z,
                    &mut self.b.x,
                    &mut self.b.y,
                    &mut self.b.z,
                ] {
                    f.copy_periodic_axis(axis);
                }
            } else {
                for f in [
                    &mut self.e.x,
                    &mut self.e.y,
                    &mut self.e.z,
                    &mut self.b.x,
                    &mut self.b.y,
                    &mut self.b.z,
                ] {
                    copy_edge_axis(f, axis, false);
                    copy_edge_axis(f, axis, true);
                }
                if self.moving_window && axis == 0 {
                    for f in [
                        &mut self.e.x,
                        &mut self.e.y,
                        &mut self.e.z,
                        &mut self.b.x,
                        &mut self.b.y,
                        &mut self.b.z,
                    ] {
                        f.zero_guards_axis(0, true);
                    }
                }
            }
        }
    }

    /// Guard update after an E sub-step.
    fn update_gc_e(&mut self, dt_sub: f64) {
        for axis in 0..2 {
            if self.grid.periodic[axis] {
                self.e.x.copy_periodic_axis(axis);
                self.e.y.copy_periodic_axis(axis);
                self.e.z.copy_periodic_axis(axis);
            } else {
                // tangential components absorb, normal component extrapolates
                let k = mur_coefficient(dt_sub, self.grid.dx[axis]);
                let (t1, t2, normal) = match axis {
                    0 => (&mut self.e.y, &mut self.e.z, &mut self.e.x),
                    _ => (&mut self.e.x, &mut self.e.z, &mut self.e.y),
                };
                for (side, hi) in [(0usize, false), (1usize, true)] {
                    if self.moving_window && axis == 0 && hi {
                        t1.zero_guards_axis(0, true);
                        t2.zero_guards_axis(0, true);
                        normal.zero_guards_axis(0, true);
                        continue;
                    }
                    mur_pass(t1, &mut self.mur[axis][side][0], axis, hi, k);
                    mur_pass(t2, &mut self.mur[axis][side][1], axis, hi, k);
                    copy_edge_axis(normal, axis, hi);
                }
            }
        }
    }

    /// Guard update after a B sub-step.
    fn update_gc_b(&mut self, dt_sub: f64) {
        for axis in 0..2 {
            if self.grid.periodic[axis] {
                self.b.x.copy_periodic_axis(axis);
                self.b.y.copy_periodic_axis(axis);
                self.b.z.copy_periodic_axis(axis);
            } else {
                let k = mur_coefficient(dt_sub, self.grid.dx[axis]);
                let (t1, t2, normal) = match axis {
                    0 => (&mut self.b.y, &mut self.b.z, &mut self.b.x),
                    _ => (&mut self.b.x, &mut self.b.z, &mut self.b.y),
                };
                for (side, hi) in [(0usize, false), (1usize, true)] {
                    if self.moving_window && axis == 0 && hi {
                        t1.zero_guards_axis(0, true);
                        t2.zero_guards_axis(0, true);
                        normal.zero_guards_axis(0, true);
                        continue;
                    }
                    mur_pass(t1, &mut self.mur[axis][side][2], axis, hi, k);
                    mur_pass(t2, &mut self.mur[axis][side][3], axis, hi, k);
                    copy_edge_axis(normal, axis, hi);
                }
            }
        }
    }

    /// Seed the Mur history from the current field values so the first
    /// absorbing update after setup sees consistent previous values.
    fn reset_mur_history(&mut self) {
        for axis in 0..2 {
            if self.grid.periodic[axis] {
                continue;
            }
            let comps: [&ScalarField2D; 4] = match axis {
                0 => [&self.e.y, &self.e.z, &self.b.y, &self.b.z],
                _ => [&self.e.x, &self.e.z, &self.b.x, &self.b.z],
            };
            for (side, hi) in [(0usize, false), (1usize, true)] {
                for (c, f) in comps.iter().enumerate() {
                    record_mur_history(f, &mut self.mur[axis][side][c], axis, hi);
                }
            }
        }
    }

    /// Correct the longitudinal components of a freshly injected pulse so
    /// that its divergence vanishes, integrating inwards from the right
    /// edge where the pulse amplitude is zero.
    fn divergence_correction(&mut self) {
        let [nx0, nx1] = self.grid.nx;
        let r = self.grid.dx[0] / self.grid.dx[1];
        for j in 0..nx1 as isize {
            for i in (0..nx0 as isize).rev() {
                let ex = self.e.x.get(i + 1, j)
                    + r * (self.e.y.get(i + 1, j) - self.e.y.get(i + 1, j - 1));
                self.e.x.set(i, j, ex);
                let bx =
                    self.b.x.get(i + 1, j) + r * (self.b.y.get(i, j + 1) - self.b.y.get(i, j));
                self.b.x.set(i, j, bx);
            }
        }
    }

    /// Write one field component as a scalar grid record.
    pub fn report(
        &self,
        quantity: EmfQuantity,
        comp: usize,
        path: &Path,
        n: u64,
        t: f64,
    ) -> Result<()> {
        let (field, tag) = match quantity {
            EmfQuantity::E => (self.e(), "E"),
            EmfQuantity::B => (self.b(), "B"),
            EmfQuantity::EPart => (self.e_part(), "E_part"),
            EmfQuantity::BPart => (self.b_part(), "B_part"),
        };
        let comp_name = ["x", "y", "z"][comp];
        let data: Vec<f32> = field
            .component(comp)
            .interior()
            .iter()
            .map(|&v| v as f32)
            .collect();
        let meta = GridMeta {
            name: format!("{tag}{comp_name}"),
            label: format!("{tag}_{comp_name}"),
            units: "m_e c \\omega_n e^{-1}".into(),
            axes: vec![
                GridAxis {
                    label: "x".into(),
                    units: "c/\\omega_n".into(),
                    min: 0.0,
                    max: self.grid.box_size[0],
                },
                GridAxis {
                    label: "y".into(),
                    units: "c/\\omega_n".into(),
                    min: 0.0,
                    max: self.grid.box_size[1],
                },
            ],
            iteration: n,
            time: t,
        };
        zdf::write_grid(path, &data, self.grid.nx, &meta)
    }
}

/// Standard bilinear gather from four surrounding nodes.
#[inline]
fn bilinear(f: &ScalarField2D, i0: isize, j0: isize, wx: f64, wy: f64) -> f64 {
    f.get(i0, j0) * (1.0 - wx) * (1.0 - wy)
        + f.get(i0 + 1, j0) * wx * (1.0 - wy)
        + f.get(i0, j0 + 1) * (1.0 - wx) * wy
        + f.get(i0 + 1, j0 + 1) * wx * wy
}

/// First-order Mur coefficient for a sub-step of length `dt` (c = 1).
#[inline]
fn mur_coefficient(dt: f64, dx: f64) -> f64 {
    (dt - dx) / (dt + dx)
}

/// Apply the first-order Mur update to the guard cells of one side:
/// `g^{n+1} = f_int^n + k (f_int^{n+1} − g^n)`, advecting outgoing waves
/// through the boundary. The outer guard copies the inner one.
fn mur_pass(f: &mut ScalarField2D, hist: &mut MurLine, axis: usize, hi: bool, k: f64) {
    let [nx0, nx1] = f.nx();
    let n = if axis == 0 { nx0 } else { nx1 } as isize;
    let lines = if axis == 0 { nx1 } else { nx0 } as isize;
    let (i_guard, i_int) = if hi { (n, n - 1) } else { (-1, 0) };
    let i_outer = if hi { n + 1 } else { -2 };
    let g = GUARD as isize;
    for l in -g..lines + g {
        let idx = (l + g) as usize;
        let (guard_prev, int_prev) = hist[idx];
        let int_new = if axis == 0 {
            f.get(i_int, l)
        } else {
            f.get(l, i_int)
        };
        let guard_new = int_prev + k * (int_new - guard_prev);
        if axis == 0 {
            f.set(i_guard, l, guard_new);
            f.set(i_outer, l, guard_new);
        } else {
            f.set(l, i_guard, guard_new);
            f.set(l, i_outer, guard_new);
        }
        hist[idx] = (guard_new, int_new);
    }
}

/// Record the present guard/interior values as the Mur history.
fn record_mur_history(f: &ScalarField2D, hist: &mut MurLine, axis: usize, hi: bool) {
    let [nx0, nx1] = f.nx();
    let n = if axis == 0 { nx0 } else { nx1 } as isize;
    let lines = if axis == 0 { nx1 } else { nx0 } as isize;
    let (i_guard, i_int) = if hi { (n, n - 1) } else { (-1, 0) };
    let g = GUARD as isize;
    for l in -g..lines + g {
        let idx = (l + g) as usize;
        hist[idx] = if axis == 0 {
            (f.get(i_guard, l), f.get(i_int, l))
        } else {
            (f.get(l, i_guard), f.get(l, i_int))
        };
    }
}

/// Zero-order extrapolation of one open edge: guards copy the edge cell.
fn copy_edge_axis(f: &mut ScalarField2D, axis: usize, hi: bool) {
    let [nx0, nx1] = f.nx();
    let n = if axis == 0 { nx0 } else { nx1 } as isize;
    let lines = if axis == 0 { nx1 } else { nx0 } as isize;
    let (edge, g0, g1) = if hi { (n - 1, n, n + 1) } else { (0, -1, -2) };
    let g = GUARD as isize;
    for l in -g..lines + g {
        if axis == 0 {
            let v = f.get(edge, l);
            f.set(g0, l, v);
            f.set(g1, l, v);
        } else {
            let v = f.get(l, edge);
            f.set(l, g0, v);
            f.set(l, g1, v);
        }
    }
}

/// Zero the columns `[first, first + GUARD]` over every row.
fn zero_columns(f: &mut ScalarField2D, first: isize, nx1: usize) {
    let g = GUARD as isize;
    for j in -g..nx1 as isize + g {
        for i in first..first + 1 + g {
            f.set(i, j, 0.0);
        }
    }
}

/// Fill the columns `[first, first + GUARD]` over every row.
fn fill_columns(f: &mut ScalarField2D, first: isize, nx1: usize, v: f64) {
    let g = GUARD as isize;
    for j in -g..nx1 as isize + g {
        for i in first..first + 1 + g {
            f.set(i, j, v);
        }
    }
}
