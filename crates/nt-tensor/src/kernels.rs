//! Array-level kernels shared by forward operations and their adjoints.

use ndarray::{Array3, ArrayD, ArrayView3, ArrayViewD, ArrayViewMutD, Axis, Ix3, IxDyn, Zip};
use num_complex::Complex64;
use nt_core::ScalarType;

pub(crate) type C = Complex64;

pub(crate) const ZERO: C = C::new(0.0, 0.0);
pub(crate) const ONE: C = C::new(1.0, 0.0);

/// Rounds every element to the precision of `scalar_type`.
pub(crate) fn quantize(mut data: ArrayD<C>, scalar_type: ScalarType) -> ArrayD<C> {
    match scalar_type {
        ScalarType::ComplexDouble => {}
        ScalarType::ComplexFloat => data.mapv_inplace(|z| {
            C::new(f64::from(z.re as f32), f64::from(z.im as f32))
        }),
        ScalarType::Double => data.mapv_inplace(|z| C::new(z.re, 0.0)),
        ScalarType::Float => data.mapv_inplace(|z| C::new(f64::from(z.re as f32), 0.0)),
        ScalarType::Int => data.mapv_inplace(|z| C::new(f64::from(z.re as i32), 0.0)),
    }
    data
}

/// Numpy-style broadcast of two shapes, or `None` when incompatible.
pub(crate) fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0; ndim];
    for (i, slot) in out.iter_mut().enumerate() {
        let da = if i + a.len() >= ndim { a[i + a.len() - ndim] } else { 1 };
        let db = if i + b.len() >= ndim { b[i + b.len() - ndim] } else { 1 };
        *slot = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

/// Elementwise combination of two arrays under broadcasting.
pub(crate) fn zip_with(a: &ArrayD<C>, b: &ArrayD<C>, f: impl Fn(C, C) -> C) -> ArrayD<C> {
    let shape = broadcast_shape(a.shape(), b.shape()).unwrap_or_else(|| {
        panic!(
            "shapes {:?} and {:?} are not broadcast compatible",
            a.shape(),
            b.shape()
        )
    });
    let dim = IxDyn(&shape);
    match (a.broadcast(dim.clone()), b.broadcast(dim)) {
        (Some(av), Some(bv)) => Zip::from(&av).and(&bv).map_collect(|x, y| f(*x, *y)),
        _ => unreachable!("broadcast_shape accepted both operands"),
    }
}

/// Sums a broadcast gradient back down to `shape`.
pub(crate) fn reduce_to_shape(mut grad: ArrayD<C>, shape: &[usize]) -> ArrayD<C> {
    while grad.ndim() > shape.len() {
        grad = grad.sum_axis(Axis(0));
    }
    for (axis, len) in shape.iter().enumerate() {
        if *len == 1 && grad.shape()[axis] != 1 {
            grad = grad.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
    }
    grad
}

/// Swaps two axes, returning an owned standard-layout array.
pub(crate) fn transpose_axes(data: &ArrayD<C>, d1: usize, d2: usize) -> ArrayD<C> {
    let mut view = data.view();
    view.swap_axes(d1, d2);
    view.as_standard_layout().into_owned()
}

/// Conjugate transpose of the two trailing axes.
pub(crate) fn adjoint(data: &ArrayD<C>) -> ArrayD<C> {
    let n = data.ndim();
    transpose_axes(data, n - 2, n - 1).mapv(|z| z.conj())
}

fn as_batched(data: &ArrayD<C>) -> ArrayView3<'_, C> {
    let view = match data.ndim() {
        2 => data.view().insert_axis(Axis(0)),
        3 => data.view(),
        n => panic!("matmul expects 2-D or 3-D operands, got rank {n}"),
    };
    view.into_dimensionality::<Ix3>()
        .unwrap_or_else(|_| unreachable!("rank checked above"))
}

/// Batched matrix product with broadcasting over a leading batch axis.
pub(crate) fn matmul(a: &ArrayD<C>, b: &ArrayD<C>) -> ArrayD<C> {
    let av = as_batched(a);
    let bv = as_batched(b);
    let (na, m, k) = av.dim();
    let (nb, k2, p) = bv.dim();
    assert_eq!(
        k, k2,
        "matmul inner dimensions differ: {:?} x {:?}",
        a.shape(),
        b.shape()
    );
    assert!(
        na == nb || na == 1 || nb == 1,
        "matmul batch sizes {na} and {nb} are not broadcast compatible"
    );
    let batch = na.max(nb);
    let mut out = Array3::<C>::zeros((batch, m, p));
    for (i, mut slot) in out.outer_iter_mut().enumerate() {
        let lhs = av.index_axis(Axis(0), if na == 1 { 0 } else { i });
        let rhs = bv.index_axis(Axis(0), if nb == 1 { 0 } else { i });
        slot.assign(&lhs.dot(&rhs));
    }
    let out = out.into_dyn();
    if a.ndim() == 2 && b.ndim() == 2 {
        out.index_axis_move(Axis(0), 0)
    } else {
        out
    }
}

/// Running sum along `axis`, optionally accumulated from the far end.
pub(crate) fn cumsum(data: &ArrayD<C>, axis: usize, reverse: bool) -> ArrayD<C> {
    let mut out = data.clone();
    for mut lane in out.lanes_mut(Axis(axis)) {
        let mut acc = ZERO;
        let len = lane.len();
        for step in 0..len {
            let pos = if reverse { len - 1 - step } else { step };
            acc += lane[pos];
            lane[pos] = acc;
        }
    }
    out
}

/// Read-only view with the given `(axis, position)` pairs fixed.
pub(crate) fn select<'a>(data: &'a ArrayD<C>, fixed: &[(usize, usize)]) -> ArrayViewD<'a, C> {
    let mut view = data.view();
    for (axis, pos) in fixed.iter().rev() {
        view = view.index_axis_move(Axis(*axis), *pos);
    }
    view
}

/// Mutable view with the given `(axis, position)` pairs fixed.
pub(crate) fn select_mut<'a>(
    data: &'a mut ArrayD<C>,
    fixed: &[(usize, usize)],
) -> ArrayViewMutD<'a, C> {
    let mut view = data.view_mut();
    for (axis, pos) in fixed.iter().rev() {
        view = view.index_axis_move(Axis(*axis), *pos);
    }
    view
}

/// Largest absolute deviation between `data` and its conjugate transpose.
pub(crate) fn hermitian_defect(data: &ArrayD<C>) -> f64 {
    let adj = adjoint(data);
    Zip::from(data)
        .and(&adj)
        .fold(0.0_f64, |acc, x, y| acc.max((x - y).norm()))
}
