mod common;

use std::f64::consts::PI;

use common::{assert_close, energies, masses, rotation_pmns, TwoFlavourBarger};
use nt_prop::Propagator;
use nt_tensor::{Index, Tensor};
use proptest::prelude::*;

const M1: f64 = 0.1;
const M2: f64 = 0.5;
const BASELINE: f64 = 0.5;

fn vacuum_propagator(theta: f64) -> Propagator {
    let mut propagator = Propagator::new(2, BASELINE);
    propagator.set_masses(&masses(&[M1, M2])).expect("masses");
    propagator.set_pmns(&rotation_pmns(theta)).expect("pmns");
    propagator
}

#[test]
fn probabilities_match_closed_form_over_theta() {
    let energy = 1.0;
    for i in 0..20 {
        let theta = -PI + 2.0 * PI * (i + 1) as f64 / 20.0;
        let probs = vacuum_propagator(theta)
            .calculate_probs(&energies(&[energy]))
            .expect("probabilities");
        assert_eq!(probs.shape(), vec![1, 2, 2]);
        let reference = TwoFlavourBarger::vacuum(M1, M2, theta, BASELINE);
        for alpha in 0..2 {
            for beta in 0..2 {
                assert_close(
                    probs.real_value(&[0, alpha, beta]),
                    reference.probability(energy, alpha, beta),
                    &format!("theta={theta:.4} P[{alpha},{beta}]"),
                );
            }
        }
    }
}

#[test]
fn energy_batches_are_independent() {
    let theta = 0.6;
    let grid = [0.05, 0.3, 1.0, 7.5];
    let propagator = vacuum_propagator(theta);
    let batched = propagator.calculate_probs(&energies(&grid)).expect("batched");
    assert_eq!(batched.shape(), vec![4, 2, 2]);
    for (b, energy) in grid.iter().enumerate() {
        let single = propagator.calculate_probs(&energies(&[*energy])).expect("single");
        let row = batched.get_values(&[Index::At(b), Index::Ellipsis]).to_real_array();
        let expected = single.get_values(&[Index::At(0), Index::Ellipsis]).to_real_array();
        for (x, y) in row.iter().zip(expected.iter()) {
            assert!((x - y).abs() < 1e-14, "E={energy}: {x} vs {y}");
        }
    }
}

#[test]
fn energy_layouts_are_equivalent() {
    let propagator = vacuum_propagator(0.4);
    let flat = Tensor::from_values(&[0.5, 2.0], nt_tensor::TensorOptions::real());
    let column = flat.reshape(&[2, 1]);
    let cube = flat.reshape(&[2, 1, 1]);
    let from_flat = propagator.calculate_probs(&flat).expect("flat");
    assert_eq!(from_flat, propagator.calculate_probs(&column).expect("column"));
    assert_eq!(from_flat, propagator.calculate_probs(&cube).expect("cube"));
}

#[test]
fn repeated_calls_are_bit_identical() {
    let propagator = vacuum_propagator(1.1);
    let grid = energies(&[0.2, 0.9, 3.3]);
    let first = propagator.calculate_probs(&grid).expect("first");
    let second = propagator.calculate_probs(&grid).expect("second");
    assert_eq!(first, second);
}

proptest! {
    #[test]
    fn rows_sum_to_one(theta in -PI..PI, energy in 0.01f64..50.0) {
        let probs = vacuum_propagator(theta)
            .calculate_probs(&energies(&[energy]))
            .expect("probabilities");
        let rows = probs.sum_dims(&[2]);
        for alpha in 0..2 {
            prop_assert!((rows.real_value(&[0, alpha]) - 1.0).abs() < 1e-12);
        }
    }
}
