//! Current density accumulation.
//!
//! The current buffer is shared by every species during deposition and
//! consumed by the field advance. Each step: [`Current::zero`], particle
//! deposition (species write through [`deposit_split`]), then
//! [`Current::update`] applies boundary conditions followed by the
//! configured smoothing.

use crate::arrays::VectorField2D;
use crate::filter::{smooth_field, Smooth};
use crate::geometry::Grid;

/// Current density on the guard-extended grid.
#[derive(Debug, Clone)]
pub struct Current {
    /// The accumulated current density, one 3-vector per cell.
    pub j: VectorField2D,
    grid: Grid,
    smooth: Smooth,
}

impl Current {
    /// Create a zeroed current buffer for the given grid.
    pub fn new(grid: Grid) -> Self {
        Self {
            j: VectorField2D::new(grid.nx),
            grid,
            smooth: Smooth::none(),
        }
    }

    /// Configure the smoothing applied by [`Current::update`].
    pub fn set_smooth(&mut self, smooth: Smooth) {
        self.smooth = smooth;
    }

    /// Active smoothing configuration.
    pub fn smooth(&self) -> Smooth {
        self.smooth
    }

    /// Mark the x axis non-periodic (moving-window mode).
    pub(crate) fn set_moving_window(&mut self) {
        self.grid.periodic[0] = false;
    }

    /// Change the per-axis boundary policy; open axes truncate.
    pub(crate) fn set_periodic(&mut self, periodic: [bool; 2]) {
        self.grid.periodic = periodic;
    }

    /// Zero the buffer; called at the start of every step.
    pub fn zero(&mut self) {
        self.j.clear();
    }

    /// Apply boundary conditions, then smoothing.
    ///
    /// Periodic axes fold guard-cell deposits back into the opposite
    /// physical edge and refresh the guards; open axes truncate (guard
    /// deposits are simply dropped at the next [`Current::zero`]).
    pub fn update(&mut self) {
        for axis in 0..2 {
            if self.grid.periodic[axis] {
                self.j.x.wrap_add_axis(axis);
                self.j.y.wrap_add_axis(axis);
                self.j.z.wrap_add_axis(axis);
            }
        }
        if self.smooth.is_active() {
            for comp in [&mut self.j.x, &mut self.j.y, &mut self.j.z] {
                smooth_field(comp, &self.grid, &self.smooth);
            }
        }
    }

    /// Shift the buffer with the moving window.
    pub(crate) fn move_window(&mut self) {
        self.j.shift_left();
    }
}

/// One straight sub-trajectory fully contained in a single cell.
#[derive(Debug, Clone, Copy, Default)]
struct Segment {
    ix: i32,
    iy: i32,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

/// Deposit the current of one pushed particle with a charge-conserving
/// zigzag split.
///
/// The motion from in-cell position `(x0, y0)` in cell `(ix, iy)` by the
/// continuous offset `(dxp, dyp)` (cell units, pre-rebinning, so the final
/// position lies in `(-1, 2)`) is decomposed into at most three straight
/// segments, one per crossed cell: at most one x crossing (`di`) and one y
/// crossing (`dj`). Every segment deposits onto the four surrounding Yee
/// half-points with linear weights such that the discrete continuity
/// equation holds exactly against CIC charge deposition.
///
/// * `qnx = q / (dt · dx1)` scales the x face flux,
/// * `qny = q / (dt · dx0)` scales the y face flux,
/// * `qvz = q · uz/γ / (dx0 · dx1)` is the out-of-plane current density,
///   weighted by each segment's share of the timestep and its mean in-cell
///   position.
#[allow(clippy::too_many_arguments)]
pub(crate) fn deposit_split(
    j: &mut VectorField2D,
    ix: i32,
    iy: i32,
    di: i32,
    dj: i32,
    x0: f64,
    y0: f64,
    dxp: f64,
    dyp: f64,
    qnx: f64,
    qny: f64,
    qvz: f64,
) {
    let mut segs = [Segment::default(); 3];
    let mut n = 1;

    segs[0] = Segment {
        ix,
        iy,
        x0,
        y0,
        x1: x0 + dxp,
        y1: y0 + dyp,
    };

    // Split at the x boundary crossing.
    let mut t_x = 1.0;
    if di != 0 {
        let xb = if di > 0 { 1.0 } else { 0.0 };
        t_x = (xb - x0) / dxp;
        let ycross = y0 + dyp * t_x;
        segs[1] = Segment {
            ix: ix + di,
            iy,
            x0: xb - di as f64,
            y0: ycross,
            x1: x0 + dxp - di as f64,
            y1: y0 + dyp,
        };
        segs[0].x1 = xb;
        segs[0].y1 = ycross;
        n = 2;
    }

    // Split at the y boundary crossing; it may fall in either x segment.
    if dj != 0 {
        let yb = if dj > 0 { 1.0 } else { 0.0 };
        let djf = dj as f64;
        let t_y = (yb - y0) / dyp;
        let k = if n == 2 && t_y >= t_x { 1 } else { 0 };
        let s = segs[k];
        let den = s.y1 - s.y0;
        let frac = if den != 0.0 { (yb - s.y0) / den } else { 1.0 };
        let xcross = s.x0 + (s.x1 - s.x0) * frac;
        segs[n] = Segment {
            ix: s.ix,
            iy: s.iy + dj,
            x0: xcross,
            y0: yb - djf,
            x1: s.x1,
            y1: s.y1 - djf,
        };
        segs[k].x1 = xcross;
        segs[k].y1 = yb;
        // An x segment entirely after the y crossing moves cell too.
        if n == 2 && k == 0 {
            segs[1].iy += dj;
            segs[1].y0 -= djf;
            segs[1].y1 -= djf;
        }
        n += 1;
    }

    for s in &segs[..n] {
        let (ix, iy) = (s.ix as isize, s.iy as isize);
        let dxs = s.x1 - s.x0;
        let dys = s.y1 - s.y0;
        let xm = 0.5 * (s.x0 + s.x1);
        let ym = 0.5 * (s.y0 + s.y1);

        j.x.add(ix, iy, qnx * dxs * (1.0 - ym));
        j.x.add(ix, iy + 1, qnx * dxs * ym);

        j.y.add(ix, iy, qny * dys * (1.0 - xm));
        j.y.add(ix + 1, iy, qny * dys * xm);

        // Share of the timestep spent in this segment.
        let frac = if dxp != 0.0 {
            dxs / dxp
        } else if dyp != 0.0 {
            dys / dyp
        } else {
            1.0
        };
        let wz = qvz * frac;
        j.z.add(ix, iy, wz * (1.0 - xm) * (1.0 - ym));
        j.z.add(ix + 1, iy, wz * xm * (1.0 - ym));
        j.z.add(ix, iy + 1, wz * (1.0 - xm) * ym);
        j.z.add(ix + 1, iy + 1, wz * xm * ym);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::ScalarField2D;

    fn interior_sum(f: &ScalarField2D) -> f64 {
        f.interior().iter().sum()
    }

    /// CIC charge at the nodes for a particle at (ix + x, iy + y).
    fn cic_charge(rho: &mut ScalarField2D, ix: isize, iy: isize, x: f64, y: f64, q: f64) {
        rho.add(ix, iy, q * (1.0 - x) * (1.0 - y));
        rho.add(ix + 1, iy, q * x * (1.0 - y));
        rho.add(ix, iy + 1, q * (1.0 - x) * y);
        rho.add(ix + 1, iy + 1, q * x * y);
    }

    /// Verify discrete continuity for one particle motion: the deposited
    /// current divergence must exactly balance the CIC charge difference.
    fn check_continuity(x0: f64, y0: f64, dxp: f64, dyp: f64) {
        let nx = [8usize, 8usize];
        let (dx0, dx1, dt) = (0.5, 0.25, 0.1);
        let q = 1.3;
        let (ix, iy) = (3i32, 4i32);

        let mut j = VectorField2D::new(nx);
        let di = (x0 + dxp).floor() as i32;
        let dj = (y0 + dyp).floor() as i32;
        deposit_split(
            &mut j,
            ix,
            iy,
            di,
            dj,
            x0,
            y0,
            dxp,
            dyp,
            q / (dt * dx1),
            q / (dt * dx0),
            0.0,
        );

        let mut rho0 = ScalarField2D::new(nx);
        let mut rho1 = ScalarField2D::new(nx);
        let qd = q / (dx0 * dx1);
        cic_charge(&mut rho0, ix as isize, iy as isize, x0, y0, qd);
        cic_charge(
            &mut rho1,
            (ix + di) as isize,
            (iy + dj) as isize,
            x0 + dxp - di as f64,
            y0 + dyp - dj as f64,
            qd,
        );

        for jj in 0..7isize {
            for ii in 0..7isize {
                let div = (j.x.get(ii, jj) - j.x.get(ii - 1, jj)) / dx0
                    + (j.y.get(ii, jj) - j.y.get(ii, jj - 1)) / dx1;
                let drho = (rho1.get(ii, jj) - rho0.get(ii, jj)) / dt;
                assert!(
                    (drho + div).abs() < 1e-12,
                    "continuity violated at ({ii},{jj}): drho={drho}, div={div}"
                );
            }
        }
    }

    #[test]
    fn test_continuity_no_crossing() {
        check_continuity(0.3, 0.6, 0.2, -0.1);
    }

    #[test]
    fn test_continuity_x_crossing() {
        check_continuity(0.9, 0.5, 0.3, 0.05);
        check_continuity(0.1, 0.5, -0.4, 0.05);
    }

    #[test]
    fn test_continuity_y_crossing() {
        check_continuity(0.5, 0.85, 0.1, 0.3);
        check_continuity(0.5, 0.05, 0.1, -0.2);
    }

    #[test]
    fn test_continuity_double_crossing() {
        // y crossing before the x crossing
        check_continuity(0.8, 0.95, 0.45, 0.1);
        // x crossing before the y crossing
        check_continuity(0.95, 0.8, 0.1, 0.45);
        // both negative
        check_continuity(0.05, 0.1, -0.3, -0.35);
        // mixed signs
        check_continuity(0.9, 0.1, 0.25, -0.3);
    }

    #[test]
    fn test_static_particle_deposits_only_jz() {
        let mut j = VectorField2D::new([4, 4]);
        deposit_split(&mut j, 1, 1, 0, 0, 0.25, 0.75, 0.0, 0.0, 2.0, 2.0, 1.0);
        assert_eq!(interior_sum(&j.x), 0.0);
        assert_eq!(interior_sum(&j.y), 0.0);
        let total_z = interior_sum(&j.z);
        assert!((total_z - 1.0).abs() < 1e-15);
        // CIC weights at the mean position
        assert!((j.z.get(1, 1) - 0.75 * 0.25).abs() < 1e-15);
        assert!((j.z.get(2, 2) - 0.25 * 0.75).abs() < 1e-15);
    }

    #[test]
    fn test_jz_split_shares_sum_to_total() {
        let mut j = VectorField2D::new([8, 8]);
        deposit_split(
            &mut j, 3, 3, 1, 1, 0.9, 0.85, 0.3, 0.3, 0.0, 0.0, 2.0,
        );
        // the segment time fractions partition the step
        assert!((interior_sum(&j.z) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_update_periodic_wrap() {
        let grid = Grid::new([4, 4], [1.0, 1.0]).unwrap();
        let mut c = Current::new(grid);
        c.j.x.set(-1, 2, 1.0);
        c.j.x.set(4, 0, 2.0);
        c.update();
        assert_eq!(c.j.x.get(3, 2), 1.0);
        assert_eq!(c.j.x.get(0, 0), 2.0);
    }

    #[test]
    fn test_update_without_smoothing_is_boundary_only() {
        let grid = Grid::new([4, 4], [1.0, 1.0]).unwrap();
        let mut c = Current::new(grid);
        c.j.y.set(1, 1, 3.0);
        c.update();
        // interior deposits away from the edges are untouched
        assert_eq!(c.j.y.get(1, 1), 3.0);
        assert_eq!(interior_sum(&c.j.y), 3.0);
    }
}
