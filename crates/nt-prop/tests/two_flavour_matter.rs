mod common;

use std::f64::consts::PI;

use common::{assert_close, energies, masses, rotation_pmns, TwoFlavourBarger};
use nt_core::constants::GROOT2;
use nt_prop::{ConstDensitySolver, MatterSolver, Propagator};
use nt_tensor::{Complex64, Tensor, TensorOptions};

const M1: f64 = 1.0;
const M2: f64 = 2.0;
const DENSITY: f64 = 2.6;

#[test]
fn solver_reproduces_barger_effective_parameters() {
    let energy = 100.0;
    let energy_tensor = Tensor::from_values(&[energy], TensorOptions::real()).reshape(&[1, 1, 1]);
    let mut solver = ConstDensitySolver::new(2, DENSITY);
    solver.set_masses(&masses(&[M1, M2])).expect("masses");

    for i in 0..=20 {
        let theta = (-1.0 + 2.0 * i as f64 / 20.0) * 0.49 * PI;
        let pmns = rotation_pmns(theta);
        solver.set_pmns(&pmns).expect("pmns");
        let (eigenvectors, eigenvalues) = solver
            .calculate_eigenvalues(&energy_tensor)
            .expect("eigensystem");
        assert_eq!(eigenvalues.shape(), vec![1, 2]);
        assert_eq!(eigenvectors.shape(), vec![1, 2, 2]);

        let reference = TwoFlavourBarger {
            m1: M1,
            m2: M2,
            theta,
            baseline: 0.0,
            density: DENSITY,
        };
        let effective = pmns.matmul(&eigenvectors);
        for alpha in 0..2 {
            for beta in 0..2 {
                assert_close(
                    effective.real_value(&[0, alpha, beta]),
                    reference.pmns_element(energy, alpha, beta),
                    &format!("theta={theta:.4} U_eff[{alpha},{beta}]"),
                );
            }
        }
        let split = (eigenvalues.real_value(&[0, 0]) - eigenvalues.real_value(&[0, 1])) * 2.0 * energy;
        assert_close(split, reference.effective_dm2(energy), &format!("theta={theta:.4} dM2"));
    }
}

#[test]
fn propagator_in_matter_matches_barger_probabilities() {
    let baseline = 500.0;
    let grid = [40.0, 100.0, 310.0];
    for theta in [0.2, 0.55, 1.0] {
        let mut propagator = Propagator::new(2, baseline);
        propagator.set_masses(&masses(&[M1, M2])).expect("masses");
        propagator.set_pmns(&rotation_pmns(theta)).expect("pmns");
        propagator
            .set_matter_solver(Box::new(ConstDensitySolver::new(2, DENSITY)))
            .expect("solver");
        let probs = propagator.calculate_probs(&energies(&grid)).expect("probabilities");

        let reference = TwoFlavourBarger {
            m1: M1,
            m2: M2,
            theta,
            baseline,
            density: DENSITY,
        };
        for (b, energy) in grid.iter().enumerate() {
            for alpha in 0..2 {
                for beta in 0..2 {
                    assert_close(
                        probs.real_value(&[b, alpha, beta]),
                        reference.probability(*energy, alpha, beta),
                        &format!("theta={theta} E={energy} P[{alpha},{beta}]"),
                    );
                }
            }
        }
    }
}

#[test]
fn zero_density_matches_vacuum() {
    let grid = energies(&[0.7, 2.0]);
    let mut vacuum = Propagator::new(2, 3.0);
    vacuum.set_masses(&masses(&[0.1, 0.5])).expect("masses");
    vacuum.set_pmns(&rotation_pmns(0.3)).expect("pmns");
    let expected = vacuum.calculate_probs(&grid).expect("vacuum");

    vacuum
        .set_matter_solver(Box::new(ConstDensitySolver::new(2, 0.0)))
        .expect("solver");
    let with_solver = vacuum.calculate_probs(&grid).expect("matter");
    for (a, b) in expected
        .to_real_array()
        .iter()
        .zip(with_solver.to_real_array().iter())
    {
        assert!((a - b).abs() < 1e-9, "{a} vs {b}");
    }
}

fn stacked_rotations(thetas: &[f64]) -> Tensor {
    let values: Vec<f64> = thetas
        .iter()
        .flat_map(|theta| {
            let (s, c) = theta.sin_cos();
            [c, -s, s, c]
        })
        .collect();
    Tensor::from_values(&values, TensorOptions::complex()).reshape(&[thetas.len(), 2, 2])
}

fn matter_propagator(masses_tensor: &Tensor, pmns: &Tensor) -> Propagator {
    let mut propagator = Propagator::new(2, 500.0);
    propagator.set_masses(masses_tensor).expect("masses");
    propagator.set_pmns(pmns).expect("pmns");
    propagator
        .set_matter_solver(Box::new(ConstDensitySolver::new(2, DENSITY)))
        .expect("solver");
    propagator
}

#[test]
fn batched_mixing_matrices_each_get_their_own_hamiltonian() {
    let thetas = [0.2, 1.0];
    let batched = matter_propagator(&masses(&[M1, M2]), &stacked_rotations(&thetas))
        .calculate_probs(&energies(&[100.0, 100.0]))
        .expect("batched");
    for (b, theta) in thetas.iter().enumerate() {
        let single = matter_propagator(&masses(&[M1, M2]), &rotation_pmns(*theta))
            .calculate_probs(&energies(&[100.0]))
            .expect("single");
        let reference = TwoFlavourBarger {
            m1: M1,
            m2: M2,
            theta: *theta,
            baseline: 500.0,
            density: DENSITY,
        };
        for alpha in 0..2 {
            for beta in 0..2 {
                let value = batched.real_value(&[b, alpha, beta]);
                assert!((value - single.real_value(&[0, alpha, beta])).abs() < 1e-12);
                assert_close(
                    value,
                    reference.probability(100.0, alpha, beta),
                    &format!("batch {b} P[{alpha},{beta}]"),
                );
            }
        }
    }
}

#[test]
fn batched_masses_each_get_their_own_hamiltonian() {
    let batched_masses = Tensor::from_values(&[M1, M2, 0.5, 3.0], TensorOptions::real())
        .reshape(&[2, 2]);
    let batched = matter_propagator(&batched_masses, &rotation_pmns(0.55))
        .calculate_probs(&energies(&[100.0, 40.0]))
        .expect("batched");
    for (b, (m, energy)) in [([M1, M2], 100.0), ([0.5, 3.0], 40.0)].iter().enumerate() {
        let reference = TwoFlavourBarger {
            m1: m[0],
            m2: m[1],
            theta: 0.55,
            baseline: 500.0,
            density: DENSITY,
        };
        for alpha in 0..2 {
            for beta in 0..2 {
                assert_close(
                    batched.real_value(&[b, alpha, beta]),
                    reference.probability(*energy, alpha, beta),
                    &format!("batch {b} P[{alpha},{beta}]"),
                );
            }
        }
    }
}

#[test]
fn incompatible_batches_are_shape_errors() {
    let propagator = matter_propagator(&masses(&[M1, M2]), &stacked_rotations(&[0.2, 1.0]));
    let err = propagator
        .calculate_probs(&energies(&[10.0, 20.0, 30.0]))
        .unwrap_err();
    assert_eq!(err.info().code, "batch-mismatch");
    assert_eq!(err.info().context.get("pmns").map(String::as_str), Some("2"));

    let mut solver = ConstDensitySolver::new(2, DENSITY);
    solver.set_masses(&masses(&[M1, M2])).expect("masses");
    solver.set_pmns(&stacked_rotations(&[0.2, 1.0])).expect("pmns");
    let err = solver
        .calculate_eigenvalues(&energies(&[10.0, 20.0, 30.0]))
        .unwrap_err();
    assert_eq!(err.info().code, "batch-mismatch");
    assert!(solver.calculate_eigenvalues(&energies(&[10.0])).is_ok());
}

#[test]
fn potential_term_pairs_electron_row_with_its_conjugate() {
    let (s, c) = 0.4_f64.sin_cos();
    let phase = Complex64::from_polar(1.0, 0.7);
    let pmns = Tensor::from_values(
        &[Complex64::new(c, 0.0), phase.conj() * s, -phase * s, Complex64::new(c, 0.0)],
        TensorOptions::complex(),
    )
    .reshape(&[1, 2, 2]);
    let mut solver = ConstDensitySolver::new(2, DENSITY);
    solver.set_pmns(&pmns).expect("pmns");

    let outer = solver.electron_outer().expect("potential term");
    assert_eq!(outer.shape(), vec![1, 2, 2]);
    let strength = GROOT2 * DENSITY;
    let expected = phase * (c * s * strength);
    assert!((outer.value(&[0, 0, 1]) - expected).norm() < 1e-18);
    assert!((outer.value(&[0, 1, 0]) - expected.conj()).norm() < 1e-18);
    assert!((outer.value(&[0, 0, 0]).re - c * c * strength).abs() < 1e-18);
}
