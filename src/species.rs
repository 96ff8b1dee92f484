//! Particle species: storage, loading, push and deposition.
//!
//! A species owns a contiguous array of macro-particles with cell-indexed
//! positions. Particles are loaded from a density profile on a per-cell
//! lattice, pushed with the relativistic Boris rotation using fields
//! interpolated at the staggered Yee offsets, and deposit their current
//! through the charge-conserving zigzag split in [`crate::current`].
//!
//! Positions are split into an integer cell index and a normalized in-cell
//! offset in `[0, 1)`; after every step each offset is renormalized by
//! shifting the cell index. A cell index of `-1` marks a removed particle
//! awaiting compaction.

use crate::arrays::ScalarField2D;
use crate::current::{deposit_split, Current};
use crate::emf::Emf;
use crate::geometry::Grid;
use crate::random::Rng;
use crate::zdf::{self, GridAxis, GridMeta, ParticleMeta};
use crate::{Error, Result};
use rayon::prelude::*;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// One macro-particle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Particle {
    /// Cell index along x; `-1` marks a removed particle.
    pub ix: i32,
    /// Cell index along y.
    pub iy: i32,
    /// Normalized in-cell position along x, in `[0, 1)`.
    pub x: f64,
    /// Normalized in-cell position along y, in `[0, 1)`.
    pub y: f64,
    /// Proper velocity γβx.
    pub ux: f64,
    /// Proper velocity γβy.
    pub uy: f64,
    /// Proper velocity γβz.
    pub uz: f64,
}

impl Particle {
    /// Lorentz factor.
    #[inline]
    pub fn gamma(&self) -> f64 {
        (1.0 + self.ux * self.ux + self.uy * self.uy + self.uz * self.uz).sqrt()
    }
}

/// Per-particle boundary policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleBoundary {
    /// Wrap cell indices modulo the grid; the preferred policy.
    Periodic,
    /// Mark leaving particles removed; compacted at the next sort.
    Open,
    /// The caller guarantees no particle leaves the domain. Leaving is a
    /// checked-build assertion failure and undefined behavior in release.
    None,
}

/// Initial density profile, sampled along x at load time only.
#[derive(Clone)]
pub enum DensityProfile {
    /// Constant density everywhere.
    Uniform {
        /// Reference density.
        n: f64,
    },
    /// Zero below `start`, `n` above.
    Step {
        /// Reference density.
        n: f64,
        /// Step position.
        start: f64,
    },
    /// `n` between `start` and `end`, zero outside.
    Slab {
        /// Reference density.
        n: f64,
        /// Slab start.
        start: f64,
        /// Slab end.
        end: f64,
    },
    /// Linear rise from zero at `start` over `ramp`, then flat `n` until
    /// `end`.
    Ramp {
        /// Reference density.
        n: f64,
        /// Ramp start.
        start: f64,
        /// Profile end.
        end: f64,
        /// Ramp length.
        ramp: f64,
    },
    /// User-supplied pure function of the physical x position.
    Custom {
        /// Reference density used for charge normalization.
        n: f64,
        /// Density callback; must be pure and non-negative.
        f: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
    },
}

impl fmt::Debug for DensityProfile {
    fn fmt(&self, fm: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform { n } => write!(fm, "Uniform {{ n: {n} }}"),
            Self::Step { n, start } => write!(fm, "Step {{ n: {n}, start: {start} }}"),
            Self::Slab { n, start, end } => {
                write!(fm, "Slab {{ n: {n}, start: {start}, end: {end} }}")
            }
            Self::Ramp {
                n,
                start,
                end,
                ramp,
            } => write!(fm, "Ramp {{ n: {n}, start: {start}, end: {end}, ramp: {ramp} }}"),
            Self::Custom { n, .. } => write!(fm, "Custom {{ n: {n}, f: <fn> }}"),
        }
    }
}

impl DensityProfile {
    /// Build a custom profile from a pure density function.
    pub fn custom(n: f64, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self::Custom { n, f: Arc::new(f) }
    }

    /// Reference density used for the macro-particle charge.
    pub fn n_ref(&self) -> f64 {
        match self {
            Self::Uniform { n }
            | Self::Step { n, .. }
            | Self::Slab { n, .. }
            | Self::Ramp { n, .. }
            | Self::Custom { n, .. } => *n,
        }
    }

    /// Density at the physical position x.
    pub fn density(&self, x: f64) -> f64 {
        match self {
            Self::Uniform { n } => *n,
            Self::Step { n, start } => {
                if x >= *start {
                    *n
                } else {
                    0.0
                }
            }
            Self::Slab { n, start, end } => {
                if x >= *start && x <= *end {
                    *n
                } else {
                    0.0
                }
            }
            Self::Ramp {
                n,
                start,
                end,
                ramp,
            } => {
                if x < *start || x > *end {
                    0.0
                } else if x < *start + *ramp {
                    *n * (x - *start) / *ramp
                } else {
                    *n
                }
            }
            Self::Custom { f, .. } => f(x),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.n_ref() < 0.0 {
            return Err(Error::Config(format!(
                "density n = {} but must be non-negative",
                self.n_ref()
            )));
        }
        match self {
            Self::Slab { start, end, .. } => {
                if start > end {
                    return Err(Error::Config(format!(
                        "slab start = {start} lies past end = {end}"
                    )));
                }
            }
            Self::Ramp {
                start, end, ramp, ..
            } => {
                if start > end {
                    return Err(Error::Config(format!(
                        "ramp start = {start} lies past end = {end}"
                    )));
                }
                if *ramp <= 0.0 {
                    return Err(Error::Config(format!(
                        "ramp length = {ramp} but must be positive"
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Quantities a phasespace axis can bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhasespaceQuantity {
    /// Physical x position.
    X,
    /// Physical y position.
    Y,
    /// Proper velocity x component.
    Ux,
    /// Proper velocity y component.
    Uy,
    /// Proper velocity z component.
    Uz,
}

impl PhasespaceQuantity {
    fn label(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Ux => "ux",
            Self::Uy => "uy",
            Self::Uz => "uz",
        }
    }
}

/// Cells with a relative density below this threshold are not loaded.
const MIN_DENSITY: f64 = 1e-6;

/// Constants hoisted out of the push loop.
struct PushConsts {
    tem: f64,
    dt_dx0: f64,
    dt_dx1: f64,
    qnx: f64,
    qny: f64,
    qvz: f64,
}

/// Boundary policy applied to one particle right after its push, while
/// its cell index may sit one cell outside the domain.
#[derive(Clone, Copy)]
struct BoundaryCtx {
    nx0: i32,
    nx1: i32,
    x_open: bool,
    policy: ParticleBoundary,
}

impl BoundaryCtx {
    #[inline]
    fn apply(&self, p: &mut Particle) {
        if self.x_open && (p.ix < 0 || p.ix >= self.nx0) {
            p.ix = -1;
            return;
        }
        match self.policy {
            ParticleBoundary::Periodic => {
                if !self.x_open {
                    p.ix = p.ix.rem_euclid(self.nx0);
                }
                p.iy = p.iy.rem_euclid(self.nx1);
            }
            ParticleBoundary::Open => {
                if p.iy < 0 || p.iy >= self.nx1 {
                    p.ix = -1;
                }
            }
            ParticleBoundary::None => {
                debug_assert!(
                    p.ix >= 0 && p.ix < self.nx0 && p.iy >= 0 && p.iy < self.nx1,
                    "particle left a none-bounded domain at ({}, {})",
                    p.ix,
                    p.iy
                );
            }
        }
    }
}

/// A particle species.
#[derive(Debug, Clone)]
pub struct Species {
    name: String,
    particles: Vec<Particle>,
    /// Mass-to-charge ratio; the sign carries the charge sign.
    m_q: f64,
    ppc: [usize; 2],
    ufl: [f64; 3],
    uth: [f64; 3],
    profile: DensityProfile,
    boundary: ParticleBoundary,
    /// Sort interval in steps; 0 disables sorting.
    n_sort: usize,
    /// Macro-particle charge, set at initialization.
    q: f64,
    grid: Grid,
    dt: f64,
    iter: u64,
    n_move: u64,
    moving_window: bool,
}

impl Species {
    /// Configure a species; particles are loaded when the simulation is
    /// built.
    ///
    /// # Arguments
    /// * `name` - identifier used in diagnostics
    /// * `m_q` - mass-to-charge ratio; `-1.0` for electrons
    /// * `ppc` - particles per cell, per axis
    /// * `ufl` - fluid drift proper velocity
    /// * `uth` - thermal proper velocity spread per component
    /// * `profile` - initial density profile
    /// * `boundary` - particle boundary policy
    pub fn new(
        name: impl Into<String>,
        m_q: f64,
        ppc: [usize; 2],
        ufl: [f64; 3],
        uth: [f64; 3],
        profile: DensityProfile,
        boundary: ParticleBoundary,
    ) -> Result<Self> {
        if m_q == 0.0 || !m_q.is_finite() {
            return Err(Error::Config(format!(
                "m_q = {m_q} but must be finite and non-zero"
            )));
        }
        if ppc[0] == 0 || ppc[1] == 0 {
            return Err(Error::Config(format!(
                "ppc = {ppc:?} but both counts must be at least 1"
            )));
        }
        if uth.iter().any(|&u| u < 0.0) {
            return Err(Error::Config(format!(
                "uth = {uth:?} but thermal spreads must be non-negative"
            )));
        }
        profile.validate()?;
        Ok(Self {
            name: name.into(),
            particles: Vec::new(),
            m_q,
            ppc,
            ufl,
            uth,
            profile,
            boundary,
            n_sort: 0,
            q: 0.0,
            grid: Grid {
                nx: [0, 0],
                box_size: [0.0, 0.0],
                dx: [0.0, 0.0],
                periodic: [true, true],
            },
            dt: 0.0,
            iter: 0,
            n_move: 0,
            moving_window: false,
        })
    }

    /// Species name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sort interval in steps; 0 disables sorting.
    pub fn set_n_sort(&mut self, n_sort: usize) {
        self.n_sort = n_sort;
    }

    /// Macro-particle charge.
    pub fn charge(&self) -> f64 {
        self.q
    }

    /// Raw particle storage, removed entries (`ix == -1`) included.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Live particles.
    pub fn alive(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.ix >= 0)
    }

    /// Number of live particles.
    pub fn count(&self) -> usize {
        self.alive().count()
    }

    /// Bind the species to a grid and load particles from its profile.
    pub(crate) fn initialize(&mut self, grid: Grid, dt: f64, rng: &mut Rng) {
        self.grid = grid;
        self.dt = dt;
        self.q = self.m_q.signum() * self.profile.n_ref() * grid.dx[0] * grid.dx[1]
            / (self.ppc[0] * self.ppc[1]) as f64;
        self.particles.clear();
        self.inject_columns(0..grid.nx[0] as i32, rng);
    }

    /// Switch on moving-window handling: the x axis stops wrapping and
    /// leaving particles are dropped.
    pub(crate) fn set_moving_window(&mut self) {
        self.grid.periodic[0] = false;
        self.moving_window = true;
    }

    /// Change the per-axis grid periodicity seen by the diagnostics.
    pub(crate) fn set_periodic(&mut self, periodic: [bool; 2]) {
        self.grid.periodic = periodic;
    }

    /// Load particles into the cell columns `cols` from the density
    /// profile.
    fn inject_columns(&mut self, cols: std::ops::Range<i32>, rng: &mut Rng) {
        let n_ref = self.profile.n_ref();
        if n_ref <= 0.0 {
            return;
        }
        let ppc_total = self.ppc[0] * self.ppc[1];
        for ix in cols {
            let x = (self.n_move as f64 + ix as f64 + 0.5) * self.grid.dx[0];
            let local = self.profile.density(x);
            if local < MIN_DENSITY {
                continue;
            }
            let npc = ((ppc_total as f64 * local / n_ref).round() as usize).min(ppc_total);
            if npc == 0 {
                continue;
            }
            for iy in 0..self.grid.nx[1] as i32 {
                let mut placed = 0;
                'lattice: for k1 in 0..self.ppc[1] {
                    for k0 in 0..self.ppc[0] {
                        if placed == npc {
                            break 'lattice;
                        }
                        let mut p = Particle {
                            ix,
                            iy,
                            x: (k0 as f64 + 0.5) / self.ppc[0] as f64,
                            y: (k1 as f64 + 0.5) / self.ppc[1] as f64,
                            ..Default::default()
                        };
                        p.ux = self.ufl[0] + self.uth[0] * rng.normal();
                        p.uy = self.ufl[1] + self.uth[1] * rng.normal();
                        p.uz = self.ufl[2] + self.uth[2] * rng.normal();
                        self.particles.push(p);
                        placed += 1;
                    }
                }
            }
        }
    }

    fn push_consts(&self) -> PushConsts {
        let [dx0, dx1] = self.grid.dx;
        PushConsts {
            tem: 0.5 * self.dt / self.m_q,
            dt_dx0: self.dt / dx0,
            dt_dx1: self.dt / dx1,
            qnx: self.q / (self.dt * dx1),
            qny: self.q / (self.dt * dx0),
            qvz: self.q / (dx0 * dx1),
        }
    }

    fn boundary_ctx(&self) -> BoundaryCtx {
        BoundaryCtx {
            nx0: self.grid.nx[0] as i32,
            nx1: self.grid.nx[1] as i32,
            x_open: self.moving_window || self.boundary == ParticleBoundary::Open,
            policy: self.boundary,
        }
    }

    /// Push every particle one step and deposit its current; the serial
    /// reference path, bit-deterministic for a fixed seed.
    pub fn advance(&mut self, emf: &Emf, current: &mut Current) {
        let c = self.push_consts();
        let bc = self.boundary_ctx();
        for p in &mut self.particles {
            if p.ix < 0 {
                continue;
            }
            push_and_deposit(p, emf, &c, &mut current.j);
            bc.apply(p);
        }
        self.post_advance();
    }

    /// Parallel push+deposit: particle chunks deposit into private current
    /// buffers which are then reduced. No locks anywhere; results may
    /// differ from the serial path only within floating-point
    /// associativity.
    pub fn advance_parallel(&mut self, emf: &Emf, current: &mut Current) {
        let c = self.push_consts();
        let bc = self.boundary_ctx();
        let nx = self.grid.nx;
        let chunk_len = (self.particles.len() / rayon::current_num_threads()).max(1);
        let partials: Vec<crate::arrays::VectorField2D> = self
            .particles
            .par_chunks_mut(chunk_len)
            .map(|chunk| {
                let mut j = crate::arrays::VectorField2D::new(nx);
                for p in chunk {
                    if p.ix >= 0 {
                        push_and_deposit(p, emf, &c, &mut j);
                        bc.apply(p);
                    }
                }
                j
            })
            .collect();
        for part in &partials {
            current.j.accumulate(part);
        }
        self.post_advance();
    }

    /// Bookkeeping and the optional periodic sort.
    fn post_advance(&mut self) {
        self.iter += 1;
        if self.n_sort > 0 && self.iter % self.n_sort as u64 == 0 {
            self.sort();
        }
    }

    /// Stable bucket sort by linear cell index; compacts removed
    /// particles. Improves deposition locality without changing physics.
    pub fn sort(&mut self) {
        let nx0 = self.grid.nx[0];
        let ncells = nx0 * self.grid.nx[1];
        let cell = |p: &Particle| p.iy as usize * nx0 + p.ix as usize;

        let mut counts = vec![0usize; ncells + 1];
        for p in &self.particles {
            if p.ix >= 0 {
                counts[cell(p) + 1] += 1;
            }
        }
        for c in 1..=ncells {
            counts[c] += counts[c - 1];
        }
        let total = counts[ncells];
        let mut sorted = vec![Particle::default(); total];
        for p in &self.particles {
            if p.ix >= 0 {
                let c = cell(p);
                sorted[counts[c]] = *p;
                counts[c] += 1;
            }
        }
        self.particles = sorted;
    }

    /// Moving-window update: drop particles shifted off the left edge and
    /// load the fresh right-edge column from the density profile.
    pub(crate) fn move_window(&mut self, rng: &mut Rng) {
        for p in &mut self.particles {
            if p.ix >= 0 {
                p.ix -= 1;
            }
        }
        self.particles.retain(|p| p.ix >= 0);
        self.n_move += 1;
        let nx0 = self.grid.nx[0] as i32;
        self.inject_columns(nx0 - 1..nx0, rng);
    }

    /// CIC charge density of the species on the node grid, guard
    /// contributions folded per the axis periodicity.
    pub fn charge_density(&self) -> ScalarField2D {
        let mut rho = ScalarField2D::new(self.grid.nx);
        let qd = self.q / (self.grid.dx[0] * self.grid.dx[1]);
        for p in self.alive() {
            let (i, j) = (p.ix as isize, p.iy as isize);
            rho.add(i, j, qd * (1.0 - p.x) * (1.0 - p.y));
            rho.add(i + 1, j, qd * p.x * (1.0 - p.y));
            rho.add(i, j + 1, qd * (1.0 - p.x) * p.y);
            rho.add(i + 1, j + 1, qd * p.x * p.y);
        }
        for axis in 0..2 {
            if self.grid.periodic[axis] {
                rho.wrap_add_axis(axis);
            }
        }
        rho
    }

    /// Total kinetic energy, `Σ m (γ - 1)` evaluated as `m u²/(γ+1)`.
    pub fn energy(&self) -> f64 {
        let m = (self.q * self.m_q).abs();
        self.alive()
            .map(|p| {
                let usq = p.ux * p.ux + p.uy * p.uy + p.uz * p.uz;
                m * usq / (p.gamma() + 1.0)
            })
            .sum()
    }

    /// Physical value of one phasespace quantity for a particle.
    fn quantity(&self, p: &Particle, q: PhasespaceQuantity) -> f64 {
        match q {
            PhasespaceQuantity::X => {
                (self.n_move as f64 + p.ix as f64 + p.x) * self.grid.dx[0]
            }
            PhasespaceQuantity::Y => (p.iy as f64 + p.y) * self.grid.dx[1],
            PhasespaceQuantity::Ux => p.ux,
            PhasespaceQuantity::Uy => p.uy,
            PhasespaceQuantity::Uz => p.uz,
        }
    }

    /// Bin the charge of every particle over a pair of quantities.
    ///
    /// Returns the histogram row-major with `bins[0]` varying fastest.
    pub fn phasespace(
        &self,
        quants: [PhasespaceQuantity; 2],
        bins: [usize; 2],
        range: [[f64; 2]; 2],
    ) -> Vec<f64> {
        let mut hist = vec![0.0; bins[0] * bins[1]];
        let span = [range[0][1] - range[0][0], range[1][1] - range[1][0]];
        for p in self.alive() {
            let v0 = (self.quantity(p, quants[0]) - range[0][0]) / span[0];
            let v1 = (self.quantity(p, quants[1]) - range[1][0]) / span[1];
            if !(0.0..1.0).contains(&v0) || !(0.0..1.0).contains(&v1) {
                continue;
            }
            let b0 = (v0 * bins[0] as f64) as usize;
            let b1 = (v1 * bins[1] as f64) as usize;
            hist[b1 * bins[0] + b0] += self.q;
        }
        hist
    }

    /// Dump the live particles as per-quantity arrays.
    pub fn report_particles(&self, path: &Path, n: u64, t: f64) -> Result<()> {
        let quants = [
            PhasespaceQuantity::X,
            PhasespaceQuantity::Y,
            PhasespaceQuantity::Ux,
            PhasespaceQuantity::Uy,
            PhasespaceQuantity::Uz,
        ];
        let arrays: Vec<(String, Vec<f32>)> = quants
            .iter()
            .map(|&q| {
                (
                    q.label().to_string(),
                    self.alive().map(|p| self.quantity(p, q) as f32).collect(),
                )
            })
            .collect();
        let meta = ParticleMeta {
            name: self.name.clone(),
            iteration: n,
            time: t,
            count: self.count() as u64,
        };
        zdf::write_particles(path, &arrays, &meta)
    }

    /// Dump the species charge density as a scalar grid.
    pub fn report_charge(&self, path: &Path, n: u64, t: f64) -> Result<()> {
        let rho = self.charge_density();
        let data: Vec<f32> = rho.interior().iter().map(|&v| v as f32).collect();
        let meta = GridMeta {
            name: format!("{}-charge", self.name),
            label: "\\rho".into(),
            units: "n_0 e".into(),
            axes: vec![
                GridAxis {
                    label: "x".into(),
                    units: "c/\\omega_n".into(),
                    min: self.n_move as f64 * self.grid.dx[0],
                    max: self.n_move as f64 * self.grid.dx[0] + self.grid.box_size[0],
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

    /// Dump a phasespace histogram.
    #[allow(clippy::too_many_arguments)]
    pub fn report_phasespace(
        &self,
        path: &Path,
        quants: [PhasespaceQuantity; 2],
        bins: [usize; 2],
        range: [[f64; 2]; 2],
        n: u64,
        t: f64,
    ) -> Result<()> {
        let hist = self.phasespace(quants, bins, range);
        let data: Vec<f32> = hist.iter().map(|&v| v as f32).collect();
        let meta = GridMeta {
            name: format!(
                "{}-{}{}",
                self.name,
                quants[0].label(),
                quants[1].label()
            ),
            label: format!("{}-{}", quants[0].label(), quants[1].label()),
            units: "n_0 e".into(),
            axes: vec![
                GridAxis {
                    label: quants[0].label().into(),
                    units: "".into(),
                    min: range[0][0],
                    max: range[0][1],
                },
                GridAxis {
                    label: quants[1].label().into(),
                    units: "".into(),
                    min: range[1][0],
                    max: range[1][1],
                },
            ],
            iteration: n,
            time: t,
        };
        zdf::write_grid(path, &data, bins, &meta)
    }
}

/// Boris rotation, position advance and current deposition for one
/// particle.
#[inline]
fn push_and_deposit(
    p: &mut Particle,
    emf: &Emf,
    c: &PushConsts,
    j: &mut crate::arrays::VectorField2D,
) {
    let (e, b) = emf.interpolate(p.ix, p.iy, p.x, p.y);

    // first half of the electric impulse
    let utx = p.ux + c.tem * e[0];
    let uty = p.uy + c.tem * e[1];
    let utz = p.uz + c.tem * e[2];

    // magnetic rotation at the half-step Lorentz factor
    let gamma_minus = (1.0 + utx * utx + uty * uty + utz * utz).sqrt();
    let gt = c.tem / gamma_minus;
    let tx = b[0] * gt;
    let ty = b[1] * gt;
    let tz = b[2] * gt;

    let upx = utx + uty * tz - utz * ty;
    let upy = uty + utz * tx - utx * tz;
    let upz = utz + utx * ty - uty * tx;

    let s = 2.0 / (1.0 + tx * tx + ty * ty + tz * tz);
    let (sx, sy, sz) = (tx * s, ty * s, tz * s);

    // second half of the electric impulse
    p.ux = utx + upy * sz - upz * sy + c.tem * e[0];
    p.uy = uty + upz * sx - upx * sz + c.tem * e[1];
    p.uz = utz + upx * sy - upy * sx + c.tem * e[2];

    // position advance in cell units; |Δ| < 1 by the Courant condition
    let rg = 1.0 / p.gamma();
    let dxp = p.ux * rg * c.dt_dx0;
    let dyp = p.uy * rg * c.dt_dx1;
    let x1 = p.x + dxp;
    let y1 = p.y + dyp;
    let di = x1.floor() as i32;
    let dj = y1.floor() as i32;

    deposit_split(
        j,
        p.ix,
        p.iy,
        di,
        dj,
        p.x,
        p.y,
        dxp,
        dyp,
        c.qnx,
        c.qny,
        c.qvz * p.uz * rg,
    );

    // rebin into [0, 1)
    p.x = x1 - di as f64;
    p.y = y1 - dj as f64;
    p.ix += di;
    p.iy += dj;
}
