//! The [`Tensor`] handle: construction, element access and gradient bookkeeping.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use ndarray::{Array, ArrayD, Dimension, IxDyn};
use num_complex::Complex64;
use nt_core::{DeviceType, NtError, RngHandle, ScalarType};

use crate::autograd::{self, Node, Op};
use crate::index::{self, Index};
use crate::kernels::{self, C, ONE};
use crate::options::{Scalar, TensorOptions};

pub(crate) struct TensorCell {
    data: RefCell<ArrayD<C>>,
    scalar_type: ScalarType,
    device: DeviceType,
    requires_grad: Cell<bool>,
    grad: RefCell<Option<ArrayD<C>>>,
    grad_fn: RefCell<Option<Rc<Node>>>,
    version: Cell<u64>,
}

/// Batched N-dimensional numeric array with optional gradient tracking.
///
/// Cloning a `Tensor` is cheap and yields a handle to the same storage, so an
/// in-place write through one handle is visible through every clone.
#[derive(Clone)]
pub struct Tensor {
    inner: Rc<TensorCell>,
}

impl Tensor {
    fn build(data: ArrayD<C>, scalar_type: ScalarType, device: DeviceType) -> Self {
        assert!(
            device.is_available(),
            "device '{device}' is not provided by the bundled backend"
        );
        Self {
            inner: Rc::new(TensorCell {
                data: RefCell::new(kernels::quantize(data, scalar_type)),
                scalar_type,
                device,
                requires_grad: Cell::new(false),
                grad: RefCell::new(None),
                grad_fn: RefCell::new(None),
                version: Cell::new(0),
            }),
        }
    }

    fn leaf(data: ArrayD<C>, options: TensorOptions) -> Self {
        let tensor = Self::build(data, options.scalar_type(), options.device());
        tensor.set_requires_grad(options.requires_grad());
        tensor
    }

    /// Result of a recorded operation. Tracks gradients when any input does.
    pub(crate) fn from_op(
        data: ArrayD<C>,
        scalar_type: ScalarType,
        op: Op,
        inputs: &[&Tensor],
    ) -> Self {
        let device = inputs.first().map_or(DeviceType::Cpu, |t| t.device());
        let tensor = Self::build(data, scalar_type, device);
        if inputs.iter().any(|t| t.requires_grad()) {
            tensor.inner.requires_grad.set(true);
            *tensor.inner.grad_fn.borrow_mut() = Some(Rc::new(Node::new(op, inputs)));
        }
        tensor
    }

    /// Tensor of zeros.
    pub fn zeros(shape: &[usize], options: TensorOptions) -> Self {
        Self::leaf(ArrayD::zeros(IxDyn(shape)), options)
    }

    /// Tensor of ones.
    pub fn ones(shape: &[usize], options: TensorOptions) -> Self {
        Self::leaf(ArrayD::from_elem(IxDyn(shape), ONE), options)
    }

    /// Identity matrix of size `n x n`.
    pub fn eye(n: usize, options: TensorOptions) -> Self {
        Self::leaf(ndarray::Array2::<C>::eye(n).into_dyn(), options)
    }

    /// Uniform samples from `[0, 1)`; complex types draw both parts independently.
    pub fn rand(shape: &[usize], options: TensorOptions, rng: &mut RngHandle) -> Self {
        let complex = options.scalar_type().is_complex();
        let data = ArrayD::from_shape_simple_fn(IxDyn(shape), || {
            let re = rng.uniform();
            let im = if complex { rng.uniform() } else { 0.0 };
            C::new(re, im)
        });
        Self::leaf(data, options)
    }

    /// One-dimensional tensor from a list of real or complex values.
    pub fn from_values<T>(values: &[T], options: TensorOptions) -> Self
    where
        T: Copy + Into<Complex64>,
    {
        let data: Vec<C> = values.iter().map(|v| (*v).into()).collect();
        Self::leaf(ndarray::Array1::from_vec(data).into_dyn(), options)
    }

    /// Tensor of arbitrary rank from an `ndarray` array of real or complex values.
    pub fn from_array<T, D>(array: Array<T, D>, options: TensorOptions) -> Self
    where
        T: Copy + Into<Complex64>,
        D: Dimension,
    {
        Self::leaf(array.mapv(Into::into).into_dyn(), options)
    }

    /// Rank-0 tensor holding `value`.
    pub fn scalar(value: impl Into<Complex64>, options: TensorOptions) -> Self {
        Self::leaf(ArrayD::from_elem(IxDyn(&[]), value.into()), options)
    }

    /// Name of the array library backing the storage.
    pub fn library() -> &'static str {
        "ndarray"
    }

    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn data(&self) -> Ref<'_, ArrayD<C>> {
        self.inner.data.borrow()
    }

    pub(crate) fn data_clone(&self) -> ArrayD<C> {
        self.inner.data.borrow().clone()
    }

    pub(crate) fn version(&self) -> u64 {
        self.inner.version.get()
    }

    pub(crate) fn grad_fn(&self) -> Option<Rc<Node>> {
        self.inner.grad_fn.borrow().clone()
    }

    /// Copy of the raw storage as complex doubles.
    pub fn to_array(&self) -> ArrayD<Complex64> {
        self.data_clone()
    }

    /// Copy of the real parts of the storage.
    pub fn to_real_array(&self) -> ArrayD<f64> {
        self.data().mapv(|z| z.re)
    }

    /// Declared scalar type.
    pub fn scalar_type(&self) -> ScalarType {
        self.inner.scalar_type
    }

    /// Device the tensor lives on.
    pub fn device(&self) -> DeviceType {
        self.inner.device
    }

    /// Length of every axis.
    pub fn shape(&self) -> Vec<usize> {
        self.data().shape().to_vec()
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.data().ndim()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Size of the leading batch dimension (1 for rank-0 tensors).
    pub fn batch_size(&self) -> usize {
        self.data().shape().first().copied().unwrap_or(1)
    }

    /// Element at a full position.
    pub fn value(&self, position: &[usize]) -> Complex64 {
        let data = self.data();
        assert_eq!(
            position.len(),
            data.ndim(),
            "position {position:?} does not address a single element of shape {:?}",
            data.shape()
        );
        data[position]
    }

    /// Real part of the element at a full position.
    pub fn real_value(&self, position: &[usize]) -> f64 {
        self.value(position).re
    }

    /// Element at a full position, typed by the tensor's scalar type.
    pub fn variant_value(&self, position: &[usize]) -> Scalar {
        Scalar::from_storage(self.value(position), self.scalar_type())
    }

    /// The single element of a one-element tensor.
    pub fn item(&self) -> Complex64 {
        let data = self.data();
        assert_eq!(data.len(), 1, "item() on a tensor with {} elements", data.len());
        data.iter().copied().next().unwrap_or(kernels::ZERO)
    }

    /// Sub-tensor at `indices`; fixed axes are removed from the result.
    pub fn get_values(&self, indices: &[Index]) -> Tensor {
        let fixed = index::resolve(indices, &self.shape());
        let data = kernels::select(&self.data(), &fixed).to_owned();
        Tensor::from_op(data, self.scalar_type(), Op::Select(fixed), &[self])
    }

    /// Writes `value` (broadcast) into the sub-tensor at `indices`.
    ///
    /// The write rebases this tensor's history: afterwards it is the output of
    /// an assignment whose inputs are its previous contents and `value`, so
    /// gradients flow into both. Consumers that read the old contents fail in
    /// [`Tensor::backward`].
    ///
    /// # Panics
    ///
    /// Panics when the tensor is a leaf that requires gradients, or when
    /// `value` does not broadcast to the selected shape.
    pub fn set_value(&self, indices: &[Index], value: &Tensor) {
        assert!(
            !(self.is_leaf() && self.requires_grad()),
            "a leaf tensor that requires grad cannot be written in place"
        );
        let fixed = index::resolve(indices, &self.shape());
        let tracked = self.requires_grad() || value.requires_grad();
        let previous = tracked.then(|| self.snapshot());
        {
            let incoming = value.data_clone();
            let mut data = self.inner.data.borrow_mut();
            let target_shape = index::selected_shape(data.shape(), &fixed);
            let source = incoming.broadcast(IxDyn(&target_shape)).unwrap_or_else(|| {
                panic!(
                    "value of shape {:?} cannot be written to {} of shape {:?}",
                    incoming.shape(),
                    index::render(indices),
                    data.shape()
                )
            });
            let source = kernels::quantize(source.to_owned(), self.scalar_type());
            kernels::select_mut(&mut data, &fixed).assign(&source);
        }
        self.bump_version();
        if let Some(previous) = previous {
            self.inner.requires_grad.set(true);
            *self.inner.grad_fn.borrow_mut() =
                Some(Rc::new(Node::new(Op::Assign(fixed), &[&previous, value])));
        }
    }

    /// Writes a single element.
    pub fn set_scalar(&self, position: &[usize], value: impl Into<Complex64>) {
        let indices: Vec<Index> = position.iter().map(|p| Index::At(*p)).collect();
        let value = Tensor::scalar(value, TensorOptions::complex());
        self.set_value(&indices, &value);
    }

    fn snapshot(&self) -> Tensor {
        let copy = Self::build(self.data_clone(), self.scalar_type(), self.device());
        copy.inner.requires_grad.set(self.requires_grad());
        *copy.inner.grad_fn.borrow_mut() = self.grad_fn();
        copy
    }

    fn bump_version(&self) {
        self.inner.version.set(self.inner.version.get() + 1);
    }

    /// Whether gradients are tracked for this tensor.
    pub fn requires_grad(&self) -> bool {
        self.inner.requires_grad.get()
    }

    /// Whether the tensor was created by the user rather than by an operation.
    pub fn is_leaf(&self) -> bool {
        self.inner.grad_fn.borrow().is_none()
    }

    /// Marks a leaf tensor for gradient tracking.
    ///
    /// Enabling tracking on a tensor that already carries history is a no-op.
    ///
    /// # Panics
    ///
    /// Panics for integer tensors, and when disabling tracking on a tensor
    /// with history (use [`Tensor::detach`] instead).
    pub fn set_requires_grad(&self, requires_grad: bool) {
        if !self.is_leaf() {
            assert!(
                requires_grad,
                "cannot disable gradient tracking on a non-leaf tensor; detach it instead"
            );
            return;
        }
        assert!(
            !requires_grad || self.scalar_type().is_floating(),
            "only floating point tensors can require gradients"
        );
        self.inner.requires_grad.set(requires_grad);
    }

    /// Back-propagates from this tensor, seeding its gradient with ones.
    ///
    /// For a tensor with more than one element this is the gradient of the sum
    /// of its elements. Leaf tensors that require gradients accumulate into
    /// [`Tensor::grad`].
    pub fn backward(&self) -> Result<(), NtError> {
        autograd::run_backward(self)
    }

    /// Accumulated gradient of a leaf tensor.
    pub fn grad(&self) -> Option<Tensor> {
        self.inner
            .grad
            .borrow()
            .as_ref()
            .map(|grad| Self::build(grad.clone(), self.scalar_type(), self.device()))
    }

    /// Clears the accumulated gradient.
    pub fn zero_grad(&self) {
        *self.inner.grad.borrow_mut() = None;
    }

    pub(crate) fn accumulate_grad(&self, grad: ArrayD<C>) {
        let mut slot = self.inner.grad.borrow_mut();
        match slot.as_mut() {
            Some(acc) => *acc += &grad,
            None => *slot = Some(grad),
        }
    }

    /// Copy of the values without history or gradient tracking.
    pub fn detach(&self) -> Tensor {
        Self::build(self.data_clone(), self.scalar_type(), self.device())
    }

    /// Copy converted to another scalar type; history is not kept.
    pub fn to_scalar_type(&self, scalar_type: ScalarType) -> Tensor {
        Self::build(self.data_clone(), scalar_type, self.device())
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        *self.data() == *other.data()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("scalar_type", &self.scalar_type())
            .field("device", &self.device())
            .field("requires_grad", &self.requires_grad())
            .finish_non_exhaustive()
    }
}
