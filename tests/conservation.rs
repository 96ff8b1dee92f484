//! Conservation and invariant tests for the coupled integration loop.

use empic::species::{DensityProfile, ParticleBoundary};
use empic::{Simulation, Smooth, Species};

fn warm_plasma() -> Simulation {
    let electrons = Species::new(
        "electrons",
        -1.0,
        [2, 2],
        [0.2, 0.1, 0.3],
        [0.1, 0.1, 0.1],
        DensityProfile::Uniform { n: 1.0 },
        ParticleBoundary::Periodic,
    )
    .unwrap();
    Simulation::new([16, 16], [1.6, 1.6], 0.05, vec![electrons], (12345, 67890)).unwrap()
}

/// CIC charge density of the single species these tests run with.
fn charge(sim: &Simulation) -> empic::arrays::ScalarField2D {
    sim.species()[0].charge_density()
}

#[test]
fn test_charge_conservation_per_step() {
    let mut sim = warm_plasma();
    let [dx0, dx1] = sim.grid().dx;
    let dt = sim.dt();

    for _ in 0..5 {
        let rho0 = charge(&sim);
        sim.step();
        let rho1 = charge(&sim);
        let j = &sim.current().j;
        for jj in 0..16isize {
            for ii in 0..16isize {
                let div = (j.x.get(ii, jj) - j.x.get(ii - 1, jj)) / dx0
                    + (j.y.get(ii, jj) - j.y.get(ii, jj - 1)) / dx1;
                let drho = (rho1.get(ii, jj) - rho0.get(ii, jj)) / dt;
                assert!(
                    (drho + div).abs() < 1e-10,
                    "continuity violated at ({ii},{jj}): {}",
                    drho + div
                );
            }
        }
    }
}

#[test]
fn test_gauss_law_residual_is_preserved() {
    let mut sim = warm_plasma();
    let [dx0, dx1] = sim.grid().dx;

    let residual = |sim: &Simulation| -> Vec<f64> {
        let rho = charge(sim);
        let e = sim.emf().e();
        let mut out = Vec::with_capacity(16 * 16);
        for j in 0..16isize {
            for i in 0..16isize {
                let div = (e.x.get(i, j) - e.x.get(i - 1, j)) / dx0
                    + (e.y.get(i, j) - e.y.get(i, j - 1)) / dx1;
                out.push(div - rho.get(i, j));
            }
        }
        out
    };

    let r0 = residual(&sim);
    for _ in 0..50 {
        sim.step();
    }
    let r1 = residual(&sim);
    for (a, b) in r0.iter().zip(&r1) {
        assert!((a - b).abs() < 1e-9, "Gauss residual drifted: {a} -> {b}");
    }
}

#[test]
fn test_energy_conservation_cold_plasma() {
    // cold, closed, periodic, laser-free: a k=0 plasma oscillation
    let electrons = Species::new(
        "electrons",
        -1.0,
        [2, 2],
        [0.05, 0.0, 0.0],
        [0.0; 3],
        DensityProfile::Uniform { n: 1.0 },
        ParticleBoundary::Periodic,
    )
    .unwrap();
    let mut sim =
        Simulation::new([16, 16], [1.6, 1.6], 0.07, vec![electrons], (12345, 67890)).unwrap();

    let (uf0, uk0) = sim.energy();
    let u0 = uf0 + uk0;
    assert!(u0 > 0.0);
    for _ in 0..1000 {
        sim.step();
    }
    let (uf1, uk1) = sim.energy();
    let u1 = uf1 + uk1;
    assert!(
        ((u1 - u0) / u0).abs() < 0.01,
        "energy drifted by {:.3}%",
        100.0 * (u1 - u0) / u0
    );
    // the oscillation did exchange energy with the field
    assert!(uf1 >= 0.0);
}

#[test]
fn test_zero_smoothing_update_is_identity() {
    // a level-0 filter must leave update() equal to the boundary exchange
    // alone, bit for bit, in every smoothing mode
    let mut sim = warm_plasma();
    sim.step();

    let mut plain = sim.current().clone();
    plain.set_smooth(Smooth::none());
    let mut zero_binomial = plain.clone();
    zero_binomial.set_smooth(Smooth::binomial(0, 0));
    let mut zero_compensated = plain.clone();
    zero_compensated.set_smooth(Smooth::compensated(0, 0));

    plain.update();
    zero_binomial.update();
    zero_compensated.update();
    assert_eq!(plain.j, zero_binomial.j);
    assert_eq!(plain.j, zero_compensated.j);
}

#[test]
fn test_sort_does_not_change_physics() {
    let mk = |n_sort: usize| {
        let mut electrons = Species::new(
            "electrons",
            -1.0,
            [2, 2],
            [0.2, 0.1, 0.0],
            [0.05; 3],
            DensityProfile::Uniform { n: 1.0 },
            ParticleBoundary::Periodic,
        )
        .unwrap();
        electrons.set_n_sort(n_sort);
        let mut sim =
            Simulation::new([16, 16], [1.6, 1.6], 0.05, vec![electrons], (4, 9)).unwrap();
        for _ in 0..20 {
            sim.step();
        }
        sim
    };
    let plain = mk(0);
    let sorted = mk(5);

    assert_eq!(plain.species()[0].count(), sorted.species()[0].count());
    let (ufa, uka) = plain.energy();
    let (ufb, ukb) = sorted.energy();
    assert!((uka - ukb).abs() <= 1e-10 * uka.abs().max(1e-30));
    assert!((ufa - ufb).abs() <= 1e-9 * ufa.abs().max(1e-12));

    let rho_a = plain.species()[0].charge_density();
    let rho_b = sorted.species()[0].charge_density();
    for j in 0..16isize {
        for i in 0..16isize {
            assert!((rho_a.get(i, j) - rho_b.get(i, j)).abs() < 1e-10);
        }
    }
}

#[test]
fn test_parallel_run_matches_serial_loosely() {
    let mk = |parallel: bool| {
        let electrons = Species::new(
            "electrons",
            -1.0,
            [2, 2],
            [0.2, 0.0, 0.1],
            [0.02; 3],
            DensityProfile::Uniform { n: 1.0 },
            ParticleBoundary::Periodic,
        )
        .unwrap();
        let mut sim =
            Simulation::new([16, 16], [1.6, 1.6], 0.05, vec![electrons], (8, 15)).unwrap();
        sim.set_parallel(parallel);
        for _ in 0..10 {
            sim.step();
        }
        sim
    };
    let serial = mk(false);
    let parallel = mk(true);
    let (ufs, uks) = serial.energy();
    let (ufp, ukp) = parallel.energy();
    assert!((ufs - ufp).abs() <= 1e-9 * ufs.abs().max(1e-12));
    assert!((uks - ukp).abs() <= 1e-9 * uks);
}
