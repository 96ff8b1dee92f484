//! High-level simulation control.
//!
//! [`Simulation`] composes the grid, field, current and species modules
//! and drives the coupled integration loop. One [`Simulation::step`]:
//!
//! 1. invokes the report callback, if any
//! 2. zeroes the current buffer
//! 3. pushes every species and deposits its current
//! 4. applies current boundaries and smoothing
//! 5. advances the fields under the deposited current
//! 6. shifts the moving window when the front light cone has advanced
//!
//! Within a step every particle sees the fields from the start of the
//! step, and every current contribution is visible to the field advance.
//! Configuration errors surface at construction; a constructed simulation
//! always runs.

use crate::current::Current;
use crate::emf::laser::Laser;
use crate::emf::Emf;
use crate::filter::Smooth;
use crate::geometry::Grid;
use crate::random::Rng;
use crate::species::Species;
use crate::{Error, Result};

use indicatif::{ProgressBar, ProgressStyle};
use instant::Instant;
use log::info;

/// Callback invoked before every step, e.g. to write diagnostics.
pub type ReportFn = Box<dyn FnMut(&Simulation)>;

/// Statistics from a [`Simulation::run`] call.
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Steps executed.
    pub steps: u64,
    /// Wall clock time in seconds.
    pub wall_time: f64,
    /// Particle pushes per second.
    pub pushes_per_sec: f64,
    /// Field energy at the end of the run.
    pub field_energy: f64,
    /// Kinetic energy at the end of the run.
    pub kinetic_energy: f64,
}

/// A complete PIC simulation instance.
pub struct Simulation {
    grid: Grid,
    dt: f64,
    n: u64,
    n_move: u64,
    moving_window: bool,
    parallel: bool,
    emf: Emf,
    current: Current,
    species: Vec<Species>,
    rng: Rng,
    report: Option<ReportFn>,
}

impl Simulation {
    /// Build a simulation and load every species.
    ///
    /// # Arguments
    /// * `nx` - physical cell counts
    /// * `box_size` - physical box extent
    /// * `dt` - timestep; must satisfy the Courant condition
    /// * `species` - configured species, loaded here in order
    /// * `seed` - RNG seed pair; all randomness flows from it
    pub fn new(
        nx: [usize; 2],
        box_size: [f64; 2],
        dt: f64,
        species: Vec<Species>,
        seed: (u32, u32),
    ) -> Result<Self> {
        let grid = Grid::new(nx, box_size)?;
        grid.check_dt(dt)?;

        let mut rng = Rng::new(seed);
        let mut species = species;
        for sp in &mut species {
            sp.initialize(grid, dt, &mut rng);
        }

        let total: usize = species.iter().map(|s| s.count()).sum();
        info!(
            "PIC simulation {}x{} cells, {} species, {} particles, dt = {:.4e}",
            nx[0],
            nx[1],
            species.len(),
            total,
            dt
        );

        Ok(Self {
            grid,
            dt,
            n: 0,
            n_move: 0,
            moving_window: false,
            parallel: false,
            emf: Emf::new(grid, dt),
            current: Current::new(grid),
            species,
            rng,
            report: None,
        })
    }

    /// Current iteration number.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Current simulation time, `n · dt`.
    pub fn t(&self) -> f64 {
        self.n as f64 * self.dt
    }

    /// Timestep.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Grid geometry.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Electromagnetic field state.
    pub fn emf(&self) -> &Emf {
        &self.emf
    }

    /// Mutable field state, for setup.
    pub fn emf_mut(&mut self) -> &mut Emf {
        &mut self.emf
    }

    /// Current buffer.
    pub fn current(&self) -> &Current {
        &self.current
    }

    /// Species list.
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// Mutable species list.
    pub fn species_mut(&mut self) -> &mut [Species] {
        &mut self.species
    }

    /// Number of moving-window shifts so far.
    pub fn n_move(&self) -> u64 {
        self.n_move
    }

    /// Install a report callback, invoked before every step.
    pub fn set_report(&mut self, report: ReportFn) {
        self.report = Some(report);
    }

    /// Activate the moving window along x.
    ///
    /// The x axis becomes non-periodic for fields and particles; the
    /// window advances one cell whenever the front light cone does.
    pub fn set_moving_window(&mut self) {
        self.moving_window = true;
        self.grid.periodic[0] = false;
        self.emf.set_moving_window();
        self.current.set_moving_window();
        for sp in &mut self.species {
            sp.set_moving_window();
        }
    }

    /// Set the per-axis field boundary policy: `true` is periodic, `false`
    /// applies absorbing boundaries. Moving-window mode forces the x axis
    /// open regardless.
    pub fn set_boundaries(&mut self, periodic: [bool; 2]) {
        let mut periodic = periodic;
        if self.moving_window {
            periodic[0] = false;
        }
        self.grid.periodic = periodic;
        self.emf.set_periodic(periodic);
        self.current.set_periodic(periodic);
        for sp in &mut self.species {
            sp.set_periodic(periodic);
        }
    }

    /// Configure current smoothing.
    pub fn set_smooth(&mut self, smooth: Smooth) {
        self.current.set_smooth(smooth);
    }

    /// Opt into the rayon push+deposit path.
    ///
    /// Serial execution is bit-deterministic; the parallel path reduces
    /// per-chunk private current buffers and may differ within
    /// floating-point associativity.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    /// Sum a laser pulse into the fields.
    pub fn add_laser(&mut self, laser: &Laser) -> Result<()> {
        self.emf.add_laser(laser)
    }

    /// Install a frozen uniform external E/B overlay.
    pub fn set_external(&mut self, e0: [f64; 3], b0: [f64; 3]) {
        self.emf.set_external(e0, b0);
    }

    /// Total field energy and total kinetic energy.
    pub fn energy(&self) -> (f64, f64) {
        let field = self.emf.total_energy();
        let kinetic = self.species.iter().map(|s| s.energy()).sum();
        (field, kinetic)
    }

    /// Advance the simulation one timestep.
    pub fn step(&mut self) {
        if let Some(mut report) = self.report.take() {
            report(self);
            self.report = Some(report);
        }

        self.current.zero();
        for sp in &mut self.species {
            if self.parallel {
                sp.advance_parallel(&self.emf, &mut self.current);
            } else {
                sp.advance(&self.emf, &mut self.current);
            }
        }
        self.current.update();
        self.emf.advance(&self.current);

        self.n += 1;

        // shift once the front light cone has outrun the window
        if self.moving_window && self.n as f64 * self.dt > self.grid.dx[0] * (self.n_move + 1) as f64
        {
            self.emf.move_window();
            self.current.move_window();
            for sp in &mut self.species {
                sp.move_window(&mut self.rng);
            }
            self.n_move += 1;
        }
    }

    /// Run until `tmax`, with a progress bar and end-of-run statistics.
    pub fn run(&mut self, tmax: f64) -> Result<RunStats> {
        if !(tmax > self.t()) {
            return Err(Error::Config(format!(
                "tmax = {tmax} does not lie past the current time {}",
                self.t()
            )));
        }
        let steps = ((tmax - self.t()) / self.dt).ceil() as u64;
        let progress = ProgressBar::new(steps);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({per_sec})")
                .unwrap()
                .progress_chars("##-"),
        );

        let start = Instant::now();
        let mut pushes = 0u64;
        for _ in 0..steps {
            self.step();
            pushes += self.species.iter().map(|s| s.count() as u64).sum::<u64>();
            progress.inc(1);
        }
        progress.finish_and_clear();

        let wall_time = start.elapsed().as_secs_f64();
        let (field_energy, kinetic_energy) = self.energy();
        let stats = RunStats {
            steps,
            wall_time,
            pushes_per_sec: pushes as f64 / wall_time.max(1e-9),
            field_energy,
            kinetic_energy,
        };
        info!(
            "completed {} steps in {:.2}s ({:.2e} pushes/s), U_f = {:.4e}, U_k = {:.4e}",
            stats.steps, stats.wall_time, stats.pushes_per_sec, field_energy, kinetic_energy
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::{DensityProfile, ParticleBoundary};

    fn electrons(ufl: [f64; 3]) -> Species {
        Species::new(
            "electrons",
            -1.0,
            [2, 2],
            ufl,
            [0.0; 3],
            DensityProfile::Uniform { n: 1.0 },
            ParticleBoundary::Periodic,
        )
        .unwrap()
    }

    #[test]
    fn test_construction_validation() {
        assert!(Simulation::new([1, 8], [1.0, 1.0], 0.05, vec![], (1, 2)).is_err());
        assert!(Simulation::new([8, 8], [-1.0, 1.0], 0.05, vec![], (1, 2)).is_err());
        assert!(Simulation::new([8, 8], [0.8, 0.8], 0.0, vec![], (1, 2)).is_err());
        // Courant: dt >= min(dx)
        assert!(Simulation::new([8, 8], [0.8, 0.8], 0.1, vec![], (1, 2)).is_err());
        assert!(Simulation::new([8, 8], [0.8, 0.8], 0.05, vec![], (1, 2)).is_ok());
    }

    #[test]
    fn test_time_advances() {
        let mut sim = Simulation::new([8, 8], [0.8, 0.8], 0.05, vec![], (1, 2)).unwrap();
        assert_eq!(sim.n(), 0);
        sim.step();
        sim.step();
        assert_eq!(sim.n(), 2);
        assert!((sim.t() - 0.1).abs() < 1e-15);
    }

    #[test]
    fn test_empty_step_leaves_fields_untouched() {
        let mut sim = Simulation::new([8, 8], [0.8, 0.8], 0.05, vec![], (1, 2)).unwrap();
        sim.step();
        assert_eq!(sim.emf().total_energy(), 0.0);
    }

    #[test]
    fn test_report_callback_runs_before_each_step() {
        use std::cell::Cell;
        use std::rc::Rc;
        let mut sim = Simulation::new([8, 8], [0.8, 0.8], 0.05, vec![], (1, 2)).unwrap();
        let seen = Rc::new(Cell::new(0u64));
        let seen_cb = Rc::clone(&seen);
        sim.set_report(Box::new(move |s| {
            seen_cb.set(seen_cb.get() + 1);
            // the callback observes the state before the step
            assert!(s.t() <= 0.05 * seen_cb.get() as f64);
        }));
        sim.step();
        sim.step();
        sim.step();
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn test_deterministic_reruns() {
        let run = || {
            let mut sim = Simulation::new(
                [16, 16],
                [1.6, 1.6],
                0.05,
                vec![Species::new(
                    "e",
                    -1.0,
                    [2, 2],
                    [0.1, 0.0, 0.0],
                    [0.01; 3],
                    DensityProfile::Uniform { n: 1.0 },
                    ParticleBoundary::Periodic,
                )
                .unwrap()],
                (99, 7),
            )
            .unwrap();
            for _ in 0..20 {
                sim.step();
            }
            sim
        };
        let a = run();
        let b = run();
        assert_eq!(a.species()[0].particles(), b.species()[0].particles());
        assert_eq!(a.emf().total_energy(), b.emf().total_energy());
    }

    #[test]
    fn test_moving_window_trigger_cadence() {
        let mut sim = Simulation::new([16, 8], [1.6, 0.8], 0.07, vec![], (1, 2)).unwrap();
        sim.set_moving_window();
        // dx0 = 0.1: first shift once n*dt > 0.1 -> n = 2
        sim.step();
        assert_eq!(sim.n_move(), 0);
        sim.step();
        assert_eq!(sim.n_move(), 1);
        // second shift once n*dt > 0.2 -> n = 3
        sim.step();
        assert_eq!(sim.n_move(), 2);
    }

    #[test]
    fn test_window_injects_right_edge_column() {
        let mut sim = Simulation::new(
            [16, 4],
            [1.6, 0.4],
            0.07,
            vec![electrons([0.0; 3])],
            (3, 5),
        )
        .unwrap();
        sim.set_moving_window();
        let n0 = sim.species()[0].count();
        for _ in 0..10 {
            sim.step();
        }
        assert!(sim.n_move() > 0);
        // density stays replenished: the right edge column is refilled
        let count = sim.species()[0].count();
        assert!(count >= n0 - sim.n_move() as usize * 4 * 4);
        let has_right_edge = sim.species()[0].alive().any(|p| p.ix == 15);
        assert!(has_right_edge);
    }
}
