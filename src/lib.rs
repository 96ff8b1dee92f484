//! empic: a 2D fully relativistic electromagnetic particle-in-cell code.
//!
//! The engine couples a population of charged macro-particles to electric
//! and magnetic fields discretized on a staggered (Yee) grid. One timestep
//! performs the classic self-consistent leapfrog cycle:
//!
//! 1. zero the current buffer
//! 2. push every particle (Boris rotation) and deposit its current with a
//!    charge-conserving zigzag split
//! 3. apply current boundary conditions and optional smoothing
//! 4. advance E and B with the Yee update driven by the deposited current
//! 5. optionally shift the moving window
//!
//! All quantities use normalized units with `c = ε₀ = μ₀ = 1`: distances in
//! units of `c/ωₙ`, times in `1/ωₙ`, proper velocities `u = γβ`, densities
//! relative to the normalizing density. Single-threaded execution is
//! bit-deterministic for a fixed RNG seed; the optional rayon path (see
//! [`Simulation::set_parallel`]) reduces per-chunk private current buffers
//! and may differ only within floating-point associativity.
//!
//! # Example
//!
//! ```no_run
//! use empic::{DensityProfile, ParticleBoundary, Simulation, Species};
//!
//! let electrons = Species::new(
//!     "electrons",
//!     -1.0,                       // mass-to-charge ratio (electron)
//!     [2, 2],                     // particles per cell
//!     [0.0; 3],                   // fluid drift
//!     [0.001; 3],                 // thermal spread
//!     DensityProfile::Uniform { n: 1.0 },
//!     ParticleBoundary::Periodic,
//! ).unwrap();
//!
//! let mut sim = Simulation::new(
//!     [64, 64],                   // cells
//!     [6.4, 6.4],                 // physical box
//!     0.07,                       // timestep
//!     vec![electrons],
//!     (12345, 67890),             // RNG seed
//! ).unwrap();
//!
//! sim.run(7.0).unwrap();
//! ```

pub mod arrays;
pub mod current;
pub mod emf;
pub mod filter;
pub mod geometry;
pub mod random;
pub mod simulation;
pub mod species;
pub mod zdf;

pub use current::Current;
pub use emf::laser::{Laser, LaserKind};
pub use emf::Emf;
pub use filter::Smooth;
pub use geometry::Grid;
pub use random::Rng;
pub use simulation::{RunStats, Simulation};
pub use species::{DensityProfile, Particle, ParticleBoundary, Species};

use thiserror::Error;

/// Errors produced by the simulation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration detected during construction or setup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A particle left a `none`-bounded domain (checked builds only).
    #[error("particle boundary violation: {0}")]
    Boundary(String),

    /// Diagnostic output failure; simulation state is unaffected.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;
