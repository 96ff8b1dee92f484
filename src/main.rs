//! Command-line driver.
//!
//! Runs one of the bundled test cases, writing diagnostics under
//! `out/<case>/`. Exits 0 on success and non-zero when initialization
//! fails.

use empic::emf::EmfQuantity;
use empic::species::{DensityProfile, ParticleBoundary, PhasespaceQuantity};
use empic::{Laser, LaserKind, Simulation, Smooth, Species};
use std::path::PathBuf;
use std::process::ExitCode;

const SEED: (u32, u32) = (12345, 67890);

fn out_dir(case: &str) -> PathBuf {
    PathBuf::from("out").join(case)
}

/// Free-streaming neutralized beam pair.
fn beam() -> empic::Result<Simulation> {
    let drift = [0.1, 0.0, 0.0];
    let mk = |name: &str, m_q: f64| {
        Species::new(
            name,
            m_q,
            [2, 2],
            drift,
            [0.0; 3],
            DensityProfile::Uniform { n: 1.0 },
            ParticleBoundary::Periodic,
        )
    };
    Simulation::new(
        [64, 64],
        [6.4, 6.4],
        0.07,
        vec![mk("electrons", -1.0)?, mk("positrons", 1.0)?],
        SEED,
    )
}

/// Two counter-streaming cold beams.
fn twostream() -> empic::Result<Simulation> {
    let mk = |name: &str, ux: f64| {
        Species::new(
            name,
            -1.0,
            [4, 4],
            [ux, 0.0, 0.0],
            [0.001; 3],
            DensityProfile::Uniform { n: 0.5 },
            ParticleBoundary::Periodic,
        )
    };
    Simulation::new(
        [64, 64],
        [6.4, 6.4],
        0.07,
        vec![mk("right", 0.2)?, mk("left", -0.2)?],
        SEED,
    )
}

/// Plane pulse in vacuum.
fn laser() -> empic::Result<Simulation> {
    let mut sim = Simulation::new([64, 32], [6.4, 3.2], 0.07, vec![], SEED)?;
    sim.add_laser(&Laser {
        a0: 0.1,
        omega0: 2.0,
        start: 3.0,
        fwhm: 2.0,
        ..Default::default()
    })?;
    Ok(sim)
}

/// Gaussian pulse onto a plasma slab.
fn slab() -> empic::Result<Simulation> {
    let plasma = Species::new(
        "plasma",
        -1.0,
        [4, 4],
        [0.0; 3],
        [0.001; 3],
        DensityProfile::Slab {
            n: 1.0,
            start: 5.0,
            end: 10.0,
        },
        ParticleBoundary::Periodic,
    )?;
    let mut sim = Simulation::new([128, 64], [12.8, 6.4], 0.07, vec![plasma], SEED)?;
    sim.set_smooth(Smooth::compensated(2, 2));
    sim.add_laser(&Laser {
        kind: LaserKind::Gaussian {
            w0: 1.5,
            focus: 5.0,
            axis: 3.2,
        },
        a0: 1.0,
        omega0: 2.0,
        start: 4.0,
        fwhm: 2.0,
        ..Default::default()
    })?;
    Ok(sim)
}

/// Copropagating pulse with the moving window.
fn window() -> empic::Result<Simulation> {
    let plasma = Species::new(
        "plasma",
        -1.0,
        [2, 2],
        [0.0; 3],
        [0.001; 3],
        DensityProfile::Uniform { n: 1.0 },
        ParticleBoundary::Periodic,
    )?;
    let mut sim = Simulation::new([128, 32], [12.8, 3.2], 0.07, vec![plasma], SEED)?;
    sim.add_laser(&Laser {
        a0: 0.5,
        omega0: 5.0,
        start: 10.0,
        fwhm: 2.0,
        ..Default::default()
    })?;
    sim.set_moving_window();
    Ok(sim)
}

fn run_case(case: &str) -> empic::Result<()> {
    let (mut sim, tmax) = match case {
        "beam" => (beam()?, 35.0),
        "twostream" => (twostream()?, 35.0),
        "laser" => (laser()?, 6.4),
        "slab" => (slab()?, 20.0),
        "window" => (window()?, 12.8),
        other => {
            return Err(empic::Error::Config(format!(
                "unknown test case '{other}' (available: beam, twostream, laser, slab, window)"
            )))
        }
    };

    let dir = out_dir(case);
    let dumps = 10u64;
    let stride = ((tmax / sim.dt()).ceil() as u64 / dumps).max(1);

    let (u_f0, u_k0) = sim.energy();
    println!("running '{case}' to t = {tmax}");

    while sim.t() < tmax {
        if sim.n() % stride == 0 {
            let n = sim.n();
            let t = sim.t();
            sim.emf()
                .report(EmfQuantity::E, 2, &dir.join(format!("Ez-{n:06}.zdf")), n, t)?;
            sim.emf()
                .report(EmfQuantity::B, 2, &dir.join(format!("Bz-{n:06}.zdf")), n, t)?;
            for sp in sim.species() {
                sp.report_charge(&dir.join(format!("{}-rho-{n:06}.zdf", sp.name())), n, t)?;
                sp.report_phasespace(
                    &dir.join(format!("{}-x-ux-{n:06}.zdf", sp.name())),
                    [PhasespaceQuantity::X, PhasespaceQuantity::Ux],
                    [128, 128],
                    [[0.0, sim.grid().box_size[0]], [-2.0, 2.0]],
                    n,
                    t,
                )?;
            }
        }
        sim.step();
    }

    let (u_f1, u_k1) = sim.energy();
    println!(
        "done: {} steps, field energy {u_f0:.4e} -> {u_f1:.4e}, kinetic {u_k0:.4e} -> {u_k1:.4e}",
        sim.n()
    );
    println!("diagnostics in {}", dir.display());
    Ok(())
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(case) = args.next() else {
        eprintln!("usage: empic <case>  (beam, twostream, laser, slab, window)");
        return ExitCode::from(2);
    };
    match run_case(&case) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
