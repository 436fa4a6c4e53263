use ndarray::array;
use nt_core::NtError;
use nt_tensor::{Complex64, Tensor, TensorOptions};
use proptest::prelude::*;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

#[test]
fn matmul_broadcasts_a_single_matrix_over_the_batch() {
    let batch = Tensor::from_array(
        array![[[1.0, 0.0], [0.0, 1.0]], [[0.0, 1.0], [1.0, 0.0]]],
        TensorOptions::real(),
    );
    let matrix = Tensor::from_array(array![[1.0, 2.0], [3.0, 4.0]], TensorOptions::real());
    let product = matrix.matmul(&batch);
    assert_eq!(product.shape(), vec![2, 2, 2]);
    assert_eq!(product.real_value(&[0, 1, 0]), 3.0);
    assert_eq!(product.real_value(&[1, 0, 0]), 2.0);

    let plain = matrix.matmul(&matrix);
    assert_eq!(plain.shape(), vec![2, 2]);
    assert_eq!(plain.real_value(&[1, 1]), 22.0);
}

#[test]
#[should_panic(expected = "inner dimensions differ")]
fn matmul_rejects_mismatched_inner_dimensions() {
    let a = Tensor::ones(&[2, 3], TensorOptions::real());
    let _ = a.matmul(&a);
}

#[test]
fn outer_transpose_and_diag() {
    let a = Tensor::from_values(&[c(1.0, 1.0), c(2.0, 0.0)], TensorOptions::complex());
    let b = Tensor::from_values(&[c(0.0, 1.0), c(3.0, 0.0), c(1.0, 0.0)], TensorOptions::complex());
    let outer = a.outer(&b);
    assert_eq!(outer.shape(), vec![2, 3]);
    assert_eq!(outer.value(&[0, 0]), c(-1.0, 1.0));
    assert_eq!(outer.transpose(0, 1).value(&[2, 1]), c(2.0, 0.0));

    let masses = Tensor::from_array(array![[1.0, 2.0, 3.0]], TensorOptions::real());
    let diag = masses.diag();
    assert_eq!(diag.shape(), vec![1, 3, 3]);
    assert_eq!(diag.real_value(&[0, 2, 2]), 3.0);
    assert_eq!(diag.real_value(&[0, 0, 1]), 0.0);
}

#[test]
fn eig_returns_ascending_phase_fixed_pairs() {
    let h = Tensor::from_array(
        array![[c(1.0, 0.0), c(0.0, 0.5)], [c(0.0, -0.5), c(3.0, 0.0)]],
        TensorOptions::complex(),
    );
    let (vectors, values) = h.eig().expect("hermitian");
    assert_eq!(values.shape(), vec![2]);
    let split = 1.25_f64.sqrt();
    assert!((values.real_value(&[0]) - (2.0 - split)).abs() < 1e-12);
    assert!((values.real_value(&[1]) - (2.0 + split)).abs() < 1e-12);
    for column in 0..2 {
        let mut pivot = c(0.0, 0.0);
        for row in 0..2 {
            let z = vectors.value(&[row, column]);
            if z.norm() > pivot.norm() {
                pivot = z;
            }
        }
        assert!(pivot.im.abs() < 1e-12 && pivot.re > 0.0);
    }
}

#[test]
fn eig_rejects_non_hermitian_input() {
    let h = Tensor::from_array(array![[[1.0, 2.0], [0.0, 1.0]]], TensorOptions::real());
    let err = h.eig().unwrap_err();
    assert!(matches!(err, NtError::Backend(_)));
    assert_eq!(err.info().code, "eig-not-hermitian");
    assert_eq!(err.info().context.get("batch_index").map(String::as_str), Some("0"));
}

proptest! {
    #[test]
    fn eig_reconstructs_hermitian_batches(
        diag in proptest::collection::vec(-5.0f64..5.0, 6),
        off in proptest::collection::vec(-2.0f64..2.0, 6),
    ) {
        let mut data = ndarray::Array3::<Complex64>::zeros((2, 3, 3));
        for b in 0..2 {
            for i in 0..3 {
                data[[b, i, i]] = c(diag[b * 3 + i], 0.0);
            }
            let z = c(off[b * 3], off[b * 3 + 1]);
            data[[b, 0, 1]] = z;
            data[[b, 1, 0]] = z.conj();
            data[[b, 1, 2]] = c(off[b * 3 + 2], 0.0);
            data[[b, 2, 1]] = c(off[b * 3 + 2], 0.0);
        }
        let h = Tensor::from_array(data, TensorOptions::complex());
        let (vectors, values) = h.eig().expect("hermitian");
        prop_assert_eq!(values.shape(), vec![2, 3]);
        let rebuilt = vectors
            .matmul(&values.diag())
            .matmul(&vectors.conj().transpose(1, 2));
        let error = (&rebuilt - &h).abs().to_real_array().fold(0.0f64, |acc, v| acc.max(*v));
        prop_assert!(error < 1e-9, "reconstruction error {}", error);
        for b in 0..2 {
            prop_assert!(values.real_value(&[b, 0]) <= values.real_value(&[b, 1]));
            prop_assert!(values.real_value(&[b, 1]) <= values.real_value(&[b, 2]));
        }
    }
}
