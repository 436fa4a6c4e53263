//! Reverse-mode tape: recorded operations and the backward sweep.
//!
//! Gradients follow the convention `dL/dRe + i dL/dIm` for a real loss `L`.
//! Under it the adjoint of a holomorphic map `f` is `g * conj(f'(z))`, and
//! real tensors receive only the real part.

use std::collections::{HashMap, HashSet};
use ndarray::{Array, Array2, ArrayD, Axis, Dimension, Ix1, Ix2, Ix3, IxDyn};
use nt_core::{ErrorInfo, NtError};

use crate::kernels::{self, C, ONE, ZERO};
use crate::tensor::Tensor;

fn backend_error(code: &str, message: impl Into<String>) -> NtError {
    NtError::Backend(ErrorInfo::new(code, message))
}

/// Operation recorded on the tape, with whatever forward values its adjoint needs.
pub(crate) enum Op {
    Add,
    Sub,
    Neg,
    Mul,
    Div,
    Scale(C),
    Pow(C),
    Exp { out: ArrayD<C> },
    Sin,
    Cos,
    Conj,
    Real,
    Imag,
    Abs,
    AbsSq,
    Angle,
    Reshape,
    Transpose(usize, usize),
    MatMul,
    Outer,
    Sum,
    SumDims(Vec<usize>),
    CumSum(usize),
    Diag,
    Select(Vec<(usize, usize)>),
    Assign(Vec<(usize, usize)>),
    EigValues { vecs: ArrayD<C> },
    EigVectors { vals: ArrayD<C>, vecs: ArrayD<C> },
}

/// Input of a recorded operation, pinned to the version it had when consumed.
pub(crate) struct Edge {
    pub(crate) tensor: Tensor,
    pub(crate) version: u64,
}

pub(crate) struct Node {
    pub(crate) op: Op,
    pub(crate) inputs: Vec<Edge>,
}

impl Node {
    pub(crate) fn new(op: Op, inputs: &[&Tensor]) -> Self {
        let inputs = inputs
            .iter()
            .map(|tensor| Edge {
                tensor: (*tensor).clone(),
                version: tensor.version(),
            })
            .collect();
        Self { op, inputs }
    }

    fn check_versions(&self) -> Result<(), NtError> {
        for edge in &self.inputs {
            let current = edge.tensor.version();
            if current != edge.version {
                return Err(NtError::Backend(
                    ErrorInfo::new(
                        "modified-in-place",
                        format!(
                            "an input of {} was modified in place after it was used",
                            self.op.name()
                        ),
                    )
                    .with_context("recorded_version", edge.version.to_string())
                    .with_context("current_version", current.to_string())
                    .with_hint("clone the tensor before calling set_value"),
                ));
            }
        }
        Ok(())
    }
}

impl Op {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Neg => "neg",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Scale(_) => "scale",
            Op::Pow(_) => "pow",
            Op::Exp { .. } => "exp",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Conj => "conj",
            Op::Real => "real",
            Op::Imag => "imag",
            Op::Abs => "abs",
            Op::AbsSq => "abs_sq",
            Op::Angle => "angle",
            Op::Reshape => "reshape",
            Op::Transpose(..) => "transpose",
            Op::MatMul => "matmul",
            Op::Outer => "outer",
            Op::Sum => "sum",
            Op::SumDims(_) => "sum_dims",
            Op::CumSum(_) => "cumsum",
            Op::Diag => "diag",
            Op::Select(_) => "get_values",
            Op::Assign(_) => "set_value",
            Op::EigValues { .. } => "eig_values",
            Op::EigVectors { .. } => "eig_vectors",
        }
    }

    /// Pulls `grad` back to every input; results have the inputs' shapes.
    fn backward(&self, grad: &ArrayD<C>, inputs: &[ArrayD<C>]) -> Vec<ArrayD<C>> {
        let unary = |f: &dyn Fn(C, C) -> C| vec![kernels::zip_with(grad, &inputs[0], f)];
        match self {
            Op::Add => vec![
                kernels::reduce_to_shape(grad.clone(), inputs[0].shape()),
                kernels::reduce_to_shape(grad.clone(), inputs[1].shape()),
            ],
            Op::Sub => vec![
                kernels::reduce_to_shape(grad.clone(), inputs[0].shape()),
                kernels::reduce_to_shape(grad.mapv(|g| -g), inputs[1].shape()),
            ],
            Op::Neg => vec![grad.mapv(|g| -g)],
            Op::Mul => {
                let (a, b) = (&inputs[0], &inputs[1]);
                vec![
                    kernels::reduce_to_shape(
                        kernels::zip_with(grad, b, |g, b| g * b.conj()),
                        a.shape(),
                    ),
                    kernels::reduce_to_shape(
                        kernels::zip_with(grad, a, |g, a| g * a.conj()),
                        b.shape(),
                    ),
                ]
            }
            Op::Div => {
                let (a, b) = (&inputs[0], &inputs[1]);
                let db = kernels::zip_with(a, b, |a, b| -a / (b * b));
                vec![
                    kernels::reduce_to_shape(
                        kernels::zip_with(grad, b, |g, b| g * b.inv().conj()),
                        a.shape(),
                    ),
                    kernels::reduce_to_shape(
                        kernels::zip_with(grad, &db, |g, d| g * d.conj()),
                        b.shape(),
                    ),
                ]
            }
            Op::Scale(s) => vec![grad.mapv(|g| g * s.conj())],
            Op::Pow(s) => {
                let s = *s;
                unary(&|g: C, z: C| g * (s * z.powc(s - ONE)).conj())
            }
            Op::Exp { out } => vec![kernels::zip_with(grad, out, |g, e| g * e.conj())],
            Op::Sin => unary(&|g: C, z: C| g * z.cos().conj()),
            Op::Cos => unary(&|g: C, z: C| g * (-z.sin()).conj()),
            Op::Conj => vec![grad.mapv(|g| g.conj())],
            Op::Real => vec![grad.mapv(|g| C::new(g.re, 0.0))],
            Op::Imag => vec![grad.mapv(|g| C::new(0.0, g.re))],
            Op::Abs => unary(&|g: C, z: C| {
                let norm = z.norm();
                if norm == 0.0 {
                    ZERO
                } else {
                    z * (g.re / norm)
                }
            }),
            Op::AbsSq => unary(&|g: C, z: C| z * (2.0 * g.re)),
            Op::Angle => unary(&|g: C, z: C| {
                let norm_sqr = z.norm_sqr();
                if norm_sqr == 0.0 {
                    ZERO
                } else {
                    C::i() * z * (g.re / norm_sqr)
                }
            }),
            Op::Reshape => vec![reshape(grad, inputs[0].shape())],
            Op::Transpose(d1, d2) => vec![kernels::transpose_axes(grad, *d1, *d2)],
            Op::MatMul => {
                let (a, b) = (&inputs[0], &inputs[1]);
                vec![
                    kernels::reduce_to_shape(
                        kernels::matmul(grad, &kernels::adjoint(b)),
                        a.shape(),
                    ),
                    kernels::reduce_to_shape(
                        kernels::matmul(&kernels::adjoint(a), grad),
                        b.shape(),
                    ),
                ]
            }
            Op::Outer => {
                let g = view2(grad);
                let a_conj = view1(&inputs[0]).mapv(|z| z.conj());
                let b_conj = view1(&inputs[1]).mapv(|z| z.conj());
                vec![
                    g.dot(&b_conj).into_dyn(),
                    g.t().dot(&a_conj).into_dyn(),
                ]
            }
            Op::Sum => {
                let total = grad.iter().copied().next().unwrap_or(ZERO);
                vec![ArrayD::from_elem(IxDyn(inputs[0].shape()), total)]
            }
            Op::SumDims(dims) => {
                let mut view = grad.view();
                for dim in dims {
                    view = view.insert_axis(Axis(*dim));
                }
                let expanded = view
                    .broadcast(IxDyn(inputs[0].shape()))
                    .unwrap_or_else(|| unreachable!("summed axes re-expand to the input shape"))
                    .to_owned();
                vec![expanded]
            }
            Op::CumSum(axis) => vec![kernels::cumsum(grad, *axis, true)],
            Op::Diag => {
                let input = &inputs[0];
                let last = input.ndim() - 1;
                let mut out = ArrayD::<C>::zeros(IxDyn(input.shape()));
                for i in 0..input.shape()[last] {
                    let diagonal = grad
                        .index_axis(Axis(last + 1), i)
                        .index_axis_move(Axis(last), i);
                    out.index_axis_mut(Axis(last), i).assign(&diagonal);
                }
                vec![out]
            }
            Op::Select(fixed) => {
                let mut out = ArrayD::<C>::zeros(IxDyn(inputs[0].shape()));
                kernels::select_mut(&mut out, fixed).assign(grad);
                vec![out]
            }
            Op::Assign(fixed) => {
                let mut base = grad.clone();
                kernels::select_mut(&mut base, fixed).fill(ZERO);
                let written = kernels::select(grad, fixed).to_owned();
                vec![base, kernels::reduce_to_shape(written, inputs[1].shape())]
            }
            Op::EigValues { vecs } => vec![eig_adjoint(None, vecs, Some(grad), None)],
            Op::EigVectors { vals, vecs } => vec![eig_adjoint(Some(vals), vecs, None, Some(grad))],
        }
    }
}

fn reshape(data: &ArrayD<C>, shape: &[usize]) -> ArrayD<C> {
    data.as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(shape))
        .unwrap_or_else(|_| unreachable!("reshape preserves the element count"))
}

fn reshape_fixed<D: Dimension>(data: &ArrayD<C>, shape: &[usize]) -> Array<C, D> {
    reshape(data, shape)
        .into_dimensionality::<D>()
        .unwrap_or_else(|_| unreachable!("target rank matches the requested shape"))
}

fn view2(data: &ArrayD<C>) -> ndarray::ArrayView2<'_, C> {
    data.view()
        .into_dimensionality::<Ix2>()
        .unwrap_or_else(|_| unreachable!("outer product gradients are matrices"))
}

fn view1(data: &ArrayD<C>) -> ndarray::ArrayView1<'_, C> {
    data.view()
        .into_dimensionality::<Ix1>()
        .unwrap_or_else(|_| unreachable!("outer product operands are vectors"))
}

/// Adjoint of the Hermitian eigendecomposition `A = V diag(l) V^H`.
///
/// With `M = V^H gV`, the pullback is `V K V^H` where `K_ii = Re(gl_i)` and
/// `K_ij = (M_ij - conj(M_ji)) / (2 (l_j - l_i))` off the diagonal. The result
/// is Hermitian and ignores the column phase gauge.
fn eig_adjoint(
    vals: Option<&ArrayD<C>>,
    vecs: &ArrayD<C>,
    grad_vals: Option<&ArrayD<C>>,
    grad_vecs: Option<&ArrayD<C>>,
) -> ArrayD<C> {
    let shape = vecs.shape().to_vec();
    let n = shape[shape.len() - 1];
    let batch: usize = shape[..shape.len() - 2].iter().product();
    let vecs_b: Array<C, Ix3> = reshape_fixed(vecs, &[batch, n, n]);
    let vals_b: Option<Array<C, Ix2>> = vals.map(|v| reshape_fixed(v, &[batch, n]));
    let gvals_b: Option<Array<C, Ix2>> = grad_vals.map(|g| reshape_fixed(g, &[batch, n]));
    let gvecs_b: Option<Array<C, Ix3>> = grad_vecs.map(|g| reshape_fixed(g, &[batch, n, n]));

    let mut out = ArrayD::<C>::zeros(IxDyn(&[batch, n, n]));
    for b in 0..batch {
        let v = vecs_b.index_axis(Axis(0), b).to_owned();
        let v_h = v.t().mapv(|z| z.conj());
        let mut k = Array2::<C>::zeros((n, n));
        if let Some(gvals) = &gvals_b {
            for i in 0..n {
                k[[i, i]] = C::new(gvals[[b, i]].re, 0.0);
            }
        }
        if let (Some(gvecs), Some(vals)) = (&gvecs_b, &vals_b) {
            let m = v_h.dot(&gvecs.index_axis(Axis(0), b));
            for i in 0..n {
                for j in 0..n {
                    let gap = vals[[b, j]].re - vals[[b, i]].re;
                    if i != j && gap != 0.0 {
                        k[[i, j]] += (m[[i, j]] - m[[j, i]].conj()) / (2.0 * gap);
                    }
                }
            }
        }
        out.index_axis_mut(Axis(0), b)
            .assign(&v.dot(&k).dot(&v_h).into_dyn());
    }
    reshape(&out, &shape)
}

fn project(grad: ArrayD<C>, tensor: &Tensor) -> ArrayD<C> {
    if tensor.scalar_type().is_complex() {
        grad
    } else {
        grad.mapv(|g| C::new(g.re, 0.0))
    }
}

fn topo_order(root: &Tensor) -> Vec<Tensor> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![(root.clone(), false)];
    while let Some((tensor, expanded)) = stack.pop() {
        if expanded {
            order.push(tensor);
            continue;
        }
        if !seen.insert(tensor.key()) {
            continue;
        }
        let node = tensor.grad_fn();
        stack.push((tensor, true));
        if let Some(node) = node {
            for edge in &node.inputs {
                if edge.tensor.requires_grad() && !seen.contains(&edge.tensor.key()) {
                    stack.push((edge.tensor.clone(), false));
                }
            }
        }
    }
    order
}

/// Runs the backward sweep from `root`, seeding it with ones.
pub(crate) fn run_backward(root: &Tensor) -> Result<(), NtError> {
    if !root.requires_grad() {
        return Err(backend_error(
            "backward-untracked",
            "backward called on a tensor that does not require gradients",
        ));
    }
    let order = topo_order(root);
    log::trace!("backward sweep over {} tensors", order.len());

    let mut grads: HashMap<usize, ArrayD<C>> = HashMap::new();
    grads.insert(
        root.key(),
        project(ArrayD::from_elem(IxDyn(&root.shape()), ONE), root),
    );

    for tensor in order.iter().rev() {
        let Some(grad) = grads.remove(&tensor.key()) else {
            continue;
        };
        let Some(node) = tensor.grad_fn() else {
            tensor.accumulate_grad(grad);
            continue;
        };
        node.check_versions()?;
        let values: Vec<ArrayD<C>> = node
            .inputs
            .iter()
            .map(|edge| edge.tensor.data_clone())
            .collect();
        let input_grads = node.op.backward(&grad, &values);
        for (edge, input_grad) in node.inputs.iter().zip(input_grads) {
            if !edge.tensor.requires_grad() {
                continue;
            }
            let input_grad = project(input_grad, &edge.tensor);
            grads
                .entry(edge.tensor.key())
                .and_modify(|acc| *acc += &input_grad)
                .or_insert(input_grad);
        }
    }
    Ok(())
}
